//! Database vocabulary to target vocabulary: names and types

use std::collections::HashMap;

use tera::Context;
use tracing::warn;

use crate::error::{error_chain, GenError, Result};
use crate::template::TemplateSet;

const TEMPLATE_NAME: &str = "name_conversion";

/// Converts database names by evaluating one template with the name bound as `name`
#[derive(Debug, Clone)]
pub struct NameConverter {
    templates: TemplateSet,
}

impl NameConverter {
    /// Compile the conversion template once
    pub fn new(template: &str) -> Result<Self> {
        let mut templates = TemplateSet::new();
        templates.add(TEMPLATE_NAME, template)?;
        Ok(Self { templates })
    }

    /// Convert one name; any template failure is fatal for the run
    pub fn convert(&self, db_name: &str) -> Result<String> {
        let mut context = Context::new();
        context.insert("name", db_name);
        self.templates
            .render(TEMPLATE_NAME, &context)
            .map_err(|e| GenError::NameConversion {
                name: db_name.to_string(),
                message: match e {
                    GenError::TemplateRender { message, .. } => message,
                    other => error_chain(&other),
                },
            })
    }
}

/// Maps database types to target types via the configured lookup tables
#[derive(Debug, Clone, Default)]
pub struct TypeMapper {
    type_map: HashMap<String, String>,
    nullable_type_map: HashMap<String, String>,
}

impl TypeMapper {
    pub fn new(
        type_map: HashMap<String, String>,
        nullable_type_map: HashMap<String, String>,
    ) -> Self {
        Self {
            type_map,
            nullable_type_map,
        }
    }

    /// Look up a type in the map selected by `nullable`.
    ///
    /// A miss is logged and returns `None`; it never fails the run.
    pub fn map(&self, db_type: &str, nullable: bool) -> Option<&str> {
        let (map, kind) = if nullable {
            (&self.nullable_type_map, "nullable type")
        } else {
            (&self.type_map, "type")
        };
        let mapped = map.get(db_type).map(String::as_str);
        if mapped.is_none() {
            warn!("Unmapped {}: {}", kind, db_type);
        }
        mapped
    }

    /// Mapping for a type, or "" when unmapped
    pub fn map_type(&self, db_type: &str, nullable: bool) -> String {
        self.map(db_type, nullable).unwrap_or_default().to_string()
    }

    /// Current mapping of a type in one of the maps, without logging
    pub fn lookup(&self, db_type: &str, nullable: bool) -> Option<&str> {
        let map = if nullable {
            &self.nullable_type_map
        } else {
            &self.type_map
        };
        map.get(db_type).map(String::as_str)
    }
}
