//! Process environment snapshot and `$VAR` expansion

use std::collections::BTreeMap;
use std::ffi::OsString;

use tracing::debug;

/// A read-only copy of the process environment, taken once per run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environ {
    vars: BTreeMap<String, String>,
}

impl Environ {
    /// Capture the current process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are left out.
    pub fn capture() -> Self {
        Self::from_os_pairs(std::env::vars_os())
    }

    fn from_os_pairs(pairs: impl IntoIterator<Item = (OsString, OsString)>) -> Self {
        let vars = pairs
            .into_iter()
            .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) => Some((key, value)),
                (key, _) => {
                    debug!("Ignoring non UTF-8 environment variable {:?}", key);
                    None
                }
            })
            .collect();
        Self { vars }
    }

    /// Build an environment from explicit pairs (useful for tests)
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up a variable
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Return a copy with one extra variable set
    pub fn with_var(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut vars = self.vars.clone();
        vars.insert(key.into(), value.into());
        Self { vars }
    }

    /// Iterate over all variables in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Expand `$VAR` and `${VAR}` references; unknown variables expand to ""
    pub fn expand(&self, input: &str) -> String {
        expand_with(input, |key| self.get(key).unwrap_or_default().to_string())
    }
}

/// Shell-style variable expansion with a caller-supplied lookup.
///
/// A `$` that is not followed by a name or `{` is kept literally, as is an
/// unterminated `${`.
pub fn expand_with(input: &str, lookup: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => {
                    out.push_str(&lookup(&braced[..end]));
                    rest = &braced[end + 1..];
                }
                None => {
                    out.push('$');
                    rest = after;
                }
            }
            continue;
        }

        let name_len = after
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
            .map(|(i, _)| i)
            .unwrap_or(after.len());
        if name_len == 0 {
            out.push('$');
        } else {
            out.push_str(&lookup(&after[..name_len]));
        }
        rest = &after[name_len..];
    }

    out.push_str(rest);
    out
}
