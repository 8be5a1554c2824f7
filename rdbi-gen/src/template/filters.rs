//! Case-conversion and pluralization filters available to every template

use std::collections::HashMap;

use heck::{
    ToKebabCase, ToLowerCamelCase, ToShoutyKebabCase, ToShoutySnakeCase, ToSnakeCase,
    ToUpperCamelCase,
};
use tera::{Filter, Tera, Value};

/// Register the filter library on a template set
pub fn register(tera: &mut Tera) {
    tera.register_filter("pascal", string_filter("pascal", |s| s.to_upper_camel_case()));
    tera.register_filter("camel", string_filter("camel", |s| s.to_lower_camel_case()));
    tera.register_filter("snake", string_filter("snake", |s| s.to_snake_case()));
    tera.register_filter("kebab", string_filter("kebab", |s| s.to_kebab_case()));
    tera.register_filter(
        "snake_upper",
        string_filter("snake_upper", |s| s.to_shouty_snake_case()),
    );
    tera.register_filter(
        "kebab_upper",
        string_filter("kebab_upper", |s| s.to_shouty_kebab_case()),
    );
    tera.register_filter("plural", string_filter("plural", pluralize));
}

fn string_filter(name: &'static str, convert: fn(&str) -> String) -> impl Filter {
    move |value: &Value, _args: &HashMap<String, Value>| -> tera::Result<Value> {
        let s = value.as_str().ok_or_else(|| {
            tera::Error::msg(format!(
                "Filter `{}` expects a string, got `{}`",
                name, value
            ))
        })?;
        Ok(Value::String(convert(s)))
    }
}

/// Pluralize a word using English grammar rules.
///
/// Only a fixed list of irregular words is special-cased; everything else
/// follows the sibilant, consonant-y and plain `s` rules.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return word.to_string();
    }

    let irregulars: &[(&str, &str)] = &[
        ("person", "people"),
        ("child", "children"),
        ("man", "men"),
        ("woman", "women"),
        ("mouse", "mice"),
        ("index", "indices"),
        ("analysis", "analyses"),
        ("axis", "axes"),
        ("knife", "knives"),
        ("leaf", "leaves"),
        ("half", "halves"),
        ("hero", "heroes"),
        ("potato", "potatoes"),
    ];
    if let Some((_, plural)) = irregulars.iter().find(|(singular, _)| *singular == word) {
        return plural.to_string();
    }

    // Sibilant endings: status -> statuses, box -> boxes
    if word.ends_with('s')
        || word.ends_with('x')
        || word.ends_with('z')
        || word.ends_with("ch")
        || word.ends_with("sh")
    {
        return format!("{}es", word);
    }

    // category -> categories, but key -> keys
    if let Some(stem) = word.strip_suffix('y') {
        let vowel_before = stem
            .chars()
            .last()
            .is_some_and(|c| "aeiouAEIOU".contains(c));
        if !stem.is_empty() && !vowel_before {
            return format!("{}ies", stem);
        }
    }

    format!("{}s", word)
}
