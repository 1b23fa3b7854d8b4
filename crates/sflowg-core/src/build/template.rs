//! Value Template Parser (C3): resolves `${VAR}`, `${VAR:default}`, and plain
//! literal strings against an environment-like lookup, per spec §4.2.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// A parsed template: either a literal string or a variable reference with
/// an optional default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    Literal(String),
    Variable { name: String, default: Option<String> },
}

fn variable_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z_][A-Z0-9_]*$").unwrap())
}

impl Template {
    /// Parses `raw` per spec §4.2/§8: a well-formed `${NAME}`/`${NAME:default}`
    /// reference whose name matches `[A-Z_][A-Z0-9_]*` becomes a `Variable`;
    /// anything else, including a malformed `${...}` shell with an invalid
    /// name, is always a `Literal` and never an error (spec §8 Property 2).
    pub fn parse(raw: &str) -> Template {
        let trimmed = raw.trim();
        if let Some(inner) = trimmed
            .strip_prefix("${")
            .and_then(|s| s.strip_suffix('}'))
        {
            let (name, default) = match inner.split_once(':') {
                Some((name, default)) => (name.trim(), Some(default.to_string())),
                None => (inner.trim(), None),
            };
            if variable_name_pattern().is_match(name) {
                return Template::Variable {
                    name: name.to_string(),
                    default,
                };
            }
        }
        Template::Literal(raw.to_string())
    }

    /// Resolves the template against `env`. Missing variables with no
    /// default resolve to an empty string, matching spec §4.2's "absent and
    /// no default" edge case.
    pub fn resolve(&self, env: &HashMap<String, String>) -> String {
        match self {
            Template::Literal(value) => value.clone(),
            Template::Variable { name, default } => env
                .get(name)
                .cloned()
                .or_else(|| default.clone())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn literal_passes_through() {
        let t = Template::parse("plain-value");
        assert_eq!(t.resolve(&env(&[])), "plain-value");
    }

    #[test]
    fn variable_resolves_from_env() {
        let t = Template::parse("${API_KEY}");
        assert_eq!(t.resolve(&env(&[("API_KEY", "secret")])), "secret");
    }

    #[test]
    fn variable_falls_back_to_default() {
        let t = Template::parse("${PORT:8080}");
        assert_eq!(t.resolve(&env(&[])), "8080");
        assert_eq!(t.resolve(&env(&[("PORT", "9090")])), "9090");
    }

    #[test]
    fn missing_variable_without_default_is_empty() {
        let t = Template::parse("${MISSING}");
        assert_eq!(t.resolve(&env(&[])), "");
    }

    #[test]
    fn default_may_contain_colon() {
        let t = Template::parse("${URL:http://localhost:8080}");
        assert_eq!(t.resolve(&env(&[])), "http://localhost:8080");
    }

    #[test]
    fn invalid_variable_name_is_a_literal() {
        assert_eq!(Template::parse("${lower_case}"), Template::Literal("${lower_case}".to_string()));
        assert_eq!(Template::parse("${1LEADING_DIGIT}"), Template::Literal("${1LEADING_DIGIT}".to_string()));
        assert_eq!(Template::parse("${HAS-DASH}"), Template::Literal("${HAS-DASH}".to_string()));
    }

    #[test]
    fn round_trips_valid_references() {
        assert_eq!(
            Template::parse("${X}"),
            Template::Variable { name: "X".to_string(), default: None }
        );
        assert_eq!(
            Template::parse("${X:d}"),
            Template::Variable { name: "X".to_string(), default: Some("d".to_string()) }
        );
    }
}
