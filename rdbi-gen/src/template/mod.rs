//! In-process template engine
//!
//! Templates are Tera templates with autoescaping disabled, extended with the
//! filters in [`filters`].

pub mod filters;

use tera::{Context, Tera};

use crate::error::{GenError, Result};

/// A compiled set of named templates
#[derive(Debug, Clone)]
pub struct TemplateSet {
    tera: Tera,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateSet {
    /// An empty set with the filter library registered
    pub fn new() -> Self {
        let mut tera = Tera::default();
        // Generated output is source code, not HTML
        tera.autoescape_on(vec![]);
        filters::register(&mut tera);
        Self { tera }
    }

    /// Compile a single template
    pub fn add(&mut self, name: &str, source: &str) -> Result<()> {
        self.tera
            .add_raw_template(name, source)
            .map_err(|e| GenError::parse(name, &e))
    }

    /// Compile several templates at once.
    ///
    /// Templates that extend one another must be added together so that
    /// parents are known when inheritance chains are built.
    pub fn add_all<N, S>(&mut self, templates: impl IntoIterator<Item = (N, S)>) -> Result<()>
    where
        N: AsRef<str>,
        S: AsRef<str>,
    {
        let templates: Vec<(N, S)> = templates.into_iter().collect();
        let names = templates
            .iter()
            .map(|(n, _)| n.as_ref())
            .collect::<Vec<_>>()
            .join(", ");
        self.tera
            .add_raw_templates(
                templates
                    .iter()
                    .map(|(n, s)| (n.as_ref(), s.as_ref()))
                    .collect::<Vec<_>>(),
            )
            .map_err(|e| GenError::parse(names, &e))
    }

    /// Whether a template with this name has been added
    pub fn contains(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Render a template against a context
    pub fn render(&self, name: &str, context: &Context) -> Result<String> {
        self.tera
            .render(name, context)
            .map_err(|e| GenError::render(name, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_autoescape() {
        let mut set = TemplateSet::new();
        set.add("t.rs", "{{ code }}").unwrap();
        let mut ctx = Context::new();
        ctx.insert("code", "Vec<&'a str>");
        assert_eq!(set.render("t.rs", &ctx).unwrap(), "Vec<&'a str>");
    }

    #[test]
    fn test_include_between_templates() {
        let mut set = TemplateSet::new();
        set.add_all([
            ("header.tpl", "// {{ name | pascal }}\n"),
            ("body.tpl", "{% include \"header.tpl\" %}struct {{ name | pascal }};"),
        ])
        .unwrap();
        assert!(set.contains("header.tpl"));

        let mut ctx = Context::new();
        ctx.insert("name", "user_roles");
        assert_eq!(
            set.render("body.tpl", &ctx).unwrap(),
            "// UserRoles\nstruct UserRoles;"
        );
    }

    #[test]
    fn test_parse_error_names_template() {
        let mut set = TemplateSet::new();
        let err = set.add("broken", "{{ name").unwrap_err();
        assert!(matches!(err, GenError::TemplateParse { template, .. } if template == "broken"));
    }

    #[test]
    fn test_render_error_is_reported() {
        let mut set = TemplateSet::new();
        set.add("t", "{{ missing.field }}").unwrap();
        let err = set.render("t", &Context::new()).unwrap_err();
        assert!(matches!(err, GenError::TemplateRender { .. }));
    }
}
