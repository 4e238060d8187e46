//! Upstream path-template compilation.
//!
//! # Responsibilities
//! - Compile `{placeholder}` templates into anchored match patterns
//! - Assign a specificity priority (bounded templates beat catch-alls)
//! - Extract placeholder values from a concrete request path
//!
//! # Design Decisions
//! - A template without a query part is only ever matched against the bare
//!   request path, so path wildcards cannot swallow query text
//! - Bounded placeholders match one path segment (`[^/]+`); a placeholder
//!   occupying the entire final segment is a catch-all (`.*`) with an
//!   optional preceding slash
//! - Matching is case-insensitive unless the route opts into case sensitivity

use regex::Regex;

const MATCH_EVERYTHING: &str = ".*";
const MATCH_ONE_SEGMENT: &str = "[^/]+";
const ROOT_ONLY: &str = "^/$";
const SLASH_AND_ONE_PLACEHOLDER: &str = "^/.*";
const QUERY_BOUNDARY: &str = r"(/$|/\?|\?|$)";

/// Error type for template compilation.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// A `{` without a matching `}`.
    #[error("unclosed placeholder in template '{0}'")]
    UnclosedPlaceholder(String),

    /// The generated pattern failed to compile.
    #[error("invalid pattern for template '{template}': {source}")]
    InvalidPattern {
        template: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled upstream path template.
///
/// Immutable once built; routes hold these for the lifetime of a
/// configuration generation.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    original: String,
    pattern: Regex,
    priority: u32,
    contains_query_string: bool,
    // Value-capturing pattern and placeholder names, precompiled so the hot
    // path never builds a regex.
    finder: Option<Regex>,
    placeholder_names: Vec<String>,
}

impl CompiledTemplate {
    /// Compile an upstream path template such as `/api/products/{id}`.
    pub fn compile(template: &str, case_sensitive: bool) -> Result<Self, TemplateError> {
        let placeholders = collect_placeholders(template)?;

        // /{placeholder} with nothing else matches the whole URL space.
        if template.len() >= 2
            && template.starts_with("/{")
            && placeholders.len() == 1
            && template.ends_with('}')
            && placeholders[0].len() == template.len() - 1
        {
            return Self::finish(SLASH_AND_ONE_PLACEHOLDER.to_string(), template, false);
        }

        let mut working = template.to_string();

        let contains_query_string = working.contains('?');
        if contains_query_string {
            let needle = if working.contains("/?") { "/?" } else { "?" };
            working = working.replacen(needle, QUERY_BOUNDARY, 1);
        }

        for placeholder in &placeholders {
            let Some(idx) = working.find(placeholder.as_str()) else {
                continue;
            };
            let has_slash_after = working[idx..].contains('/');
            let after_query_boundary = contains_query_string
                && working.find('?').is_some_and(|q| q < idx);

            let wildcard = if !has_slash_after || after_query_boundary {
                MATCH_EVERYTHING
            } else {
                MATCH_ONE_SEGMENT
            };
            working = working.replace(placeholder.as_str(), wildcard);
        }

        if working == "/" {
            return Self::finish(ROOT_ONLY.to_string(), template, contains_query_string);
        }

        // A trailing catch-all also matches the path without its final
        // segment: /orders/{all} accepts /orders as well as /orders/5/6.
        if let Some(idx) = working.rfind('/') {
            if idx + 1 < working.len() && working.as_bytes()[idx + 1] == b'.' {
                working = format!("{}(?:|/{})", &working[..idx], &working[idx + 1..]);
            }
        }

        if let Some(stripped) = working.strip_suffix('/') {
            working = format!("{stripped}(/|)");
        }

        let pattern = if case_sensitive {
            format!("^{working}$")
        } else {
            format!("^(?i){working}$")
        };

        Self::finish(pattern, template, contains_query_string)
    }

    fn finish(
        pattern: String,
        original: &str,
        contains_query_string: bool,
    ) -> Result<Self, TemplateError> {
        let priority = if pattern.contains(MATCH_EVERYTHING) { 0 } else { 1 };
        let pattern = Regex::new(&pattern).map_err(|source| TemplateError::InvalidPattern {
            template: original.to_string(),
            source,
        })?;

        Ok(Self {
            original: original.to_string(),
            pattern,
            priority,
            contains_query_string,
            finder: build_finder_pattern(original).ok(),
            placeholder_names: placeholder_names(original),
        })
    }

    /// The template string this pattern was compiled from.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Specificity priority: 1 for bounded templates, 0 for catch-alls.
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Whether the template carries a `?key={value}` query part.
    pub fn contains_query_string(&self) -> bool {
        self.contains_query_string
    }

    /// Match a request against the compiled pattern.
    ///
    /// `query` is the raw query string including its leading `?`, or empty.
    /// Templates without a query part never see the query text.
    pub fn matches(&self, path: &str, query: &str) -> bool {
        if self.contains_query_string {
            self.pattern.is_match(&format!("{path}{query}"))
        } else {
            self.pattern.is_match(path)
        }
    }

    /// Extract placeholder names and their matched values from a request.
    ///
    /// Bounded placeholders capture one segment; a trailing catch-all
    /// captures the whole remainder (empty when the remainder is absent).
    pub fn extract_placeholders(&self, path: &str, query: &str) -> Vec<PlaceholderValue> {
        let Some(finder) = &self.finder else {
            return Vec::new();
        };

        let tested = if self.contains_query_string {
            format!("{path}{query}")
        } else {
            path.to_string()
        };

        if let Some(values) = capture_values(finder, &tested, &self.placeholder_names) {
            return values;
        }

        // Catch-all templates also match the bare prefix; retry with a
        // trailing slash so the catch-all group captures an empty value.
        if self.original.ends_with('}') {
            if let Some(values) = capture_values(finder, &format!("{tested}/"), &self.placeholder_names)
            {
                return values;
            }
        }

        Vec::new()
    }
}

/// A placeholder name paired with the value it matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderValue {
    pub name: String,
    pub value: String,
}

/// Substitute `{name}` occurrences in a downstream path template.
pub fn substitute_placeholders(template: &str, values: &[PlaceholderValue]) -> String {
    let mut out = template.to_string();
    for pv in values {
        out = out.replace(&format!("{{{}}}", pv.name), &pv.value);
    }
    out
}

fn collect_placeholders(template: &str) -> Result<Vec<String>, TemplateError> {
    let mut placeholders = Vec::new();
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            let close = template[i..]
                .find('}')
                .ok_or_else(|| TemplateError::UnclosedPlaceholder(template.to_string()))?;
            placeholders.push(template[i..i + close + 1].to_string());
            i += close + 1;
        } else {
            i += 1;
        }
    }
    Ok(placeholders)
}

fn placeholder_names(template: &str) -> Vec<String> {
    collect_placeholders(template)
        .unwrap_or_default()
        .into_iter()
        .map(|p| p[1..p.len() - 1].to_string())
        .collect()
}

/// Build the value-capturing pattern: template literals escaped, each
/// placeholder turned into a named group. Only the final placeholder may
/// span multiple segments.
fn build_finder_pattern(template: &str) -> Result<Regex, regex::Error> {
    let placeholders = collect_placeholders(template).unwrap_or_default();
    let count = placeholders.len();

    let mut pattern = String::from("^(?i)");
    let mut rest = template;
    for (i, placeholder) in placeholders.iter().enumerate() {
        let idx = rest.find(placeholder.as_str()).unwrap_or(rest.len());
        pattern.push_str(&regex::escape(&rest[..idx]));
        let name = &placeholder[1..placeholder.len() - 1];
        if i + 1 == count {
            pattern.push_str(&format!("(?P<{name}>[^&]*)"));
        } else {
            pattern.push_str(&format!("(?P<{name}>[^/&]*)"));
        }
        rest = &rest[(idx + placeholder.len()).min(rest.len())..];
    }
    pattern.push_str(&regex::escape(rest));

    Regex::new(&pattern)
}

fn capture_values(finder: &Regex, tested: &str, names: &[String]) -> Option<Vec<PlaceholderValue>> {
    let caps = finder.captures(tested)?;
    Some(
        names
            .iter()
            .map(|name| PlaceholderValue {
                name: name.clone(),
                value: caps
                    .name(name)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_template_priority() {
        let t = CompiledTemplate::compile("/api/products/{id}", false).unwrap();
        assert_eq!(t.priority(), 1);

        let t = CompiledTemplate::compile("/api/products", false).unwrap();
        assert_eq!(t.priority(), 1);
    }

    #[test]
    fn test_catch_all_template_priority() {
        let t = CompiledTemplate::compile("/orders/{catchAll}", false).unwrap();
        assert_eq!(t.priority(), 0);

        let t = CompiledTemplate::compile("/{everything}", false).unwrap();
        assert_eq!(t.priority(), 0);
    }

    #[test]
    fn test_bounded_placeholder_matches_one_segment() {
        let t = CompiledTemplate::compile("/api/products/{id}/details", false).unwrap();
        assert!(t.matches("/api/products/42/details", ""));
        assert!(!t.matches("/api/products/42/7/details", ""));
        assert!(!t.matches("/api/products//details", ""));
    }

    #[test]
    fn test_catch_all_matches_with_and_without_remainder() {
        let t = CompiledTemplate::compile("/orders/{catchAll}", false).unwrap();
        assert!(t.matches("/orders", ""));
        assert!(t.matches("/orders/5", ""));
        assert!(t.matches("/orders/5/6", ""));
        assert!(!t.matches("/ordersextra", ""));
    }

    #[test]
    fn test_single_placeholder_matches_everything() {
        let t = CompiledTemplate::compile("/{url}", false).unwrap();
        assert!(t.matches("/", ""));
        assert!(t.matches("/a/b/c", ""));
        assert_eq!(t.priority(), 0);
    }

    #[test]
    fn test_trailing_slash_is_optional() {
        let t = CompiledTemplate::compile("/api/products/", false).unwrap();
        assert!(t.matches("/api/products", ""));
        assert!(t.matches("/api/products/", ""));
        assert!(!t.matches("/api/products/1", ""));
    }

    #[test]
    fn test_case_sensitivity_flag() {
        let insensitive = CompiledTemplate::compile("/API/Products", false).unwrap();
        assert!(insensitive.matches("/api/products", ""));

        let sensitive = CompiledTemplate::compile("/API/Products", true).unwrap();
        assert!(!sensitive.matches("/api/products", ""));
        assert!(sensitive.matches("/API/Products", ""));
    }

    #[test]
    fn test_query_template_matches_path_and_query() {
        let t = CompiledTemplate::compile("/api/units?unitId={id}", false).unwrap();
        assert!(t.contains_query_string());
        assert!(t.matches("/api/units", "?unitId=5"));
        assert!(!t.matches("/api/units", "?otherId=5"));
    }

    #[test]
    fn test_path_wildcard_does_not_leak_into_query() {
        // No query part in the template: the query text is never matched.
        let t = CompiledTemplate::compile("/invoices/{url}", false).unwrap();
        assert!(t.matches("/invoices/1", "?unitId=2"));
        assert!(!t.matches("/invoicesunitId=2", ""));
    }

    #[test]
    fn test_root_template() {
        let t = CompiledTemplate::compile("/", false).unwrap();
        assert!(t.matches("/", ""));
        assert!(!t.matches("/a", ""));
        assert_eq!(t.priority(), 1);
    }

    #[test]
    fn test_extract_bounded_placeholder() {
        let t = CompiledTemplate::compile("/api/products/{id}", false).unwrap();
        let values = t.extract_placeholders("/api/products/42", "");
        assert_eq!(
            values,
            vec![PlaceholderValue {
                name: "id".into(),
                value: "42".into()
            }]
        );
    }

    #[test]
    fn test_extract_catch_all_remainder() {
        let t = CompiledTemplate::compile("/orders/{catchAll}", false).unwrap();
        let values = t.extract_placeholders("/orders/5/6", "");
        assert_eq!(values[0].value, "5/6");

        let values = t.extract_placeholders("/orders", "");
        assert_eq!(values[0].value, "");
    }

    #[test]
    fn test_substitute_placeholders() {
        let values = vec![
            PlaceholderValue {
                name: "id".into(),
                value: "42".into(),
            },
            PlaceholderValue {
                name: "section".into(),
                value: "reviews".into(),
            },
        ];
        assert_eq!(
            substitute_placeholders("/products/{id}/{section}", &values),
            "/products/42/reviews"
        );
    }

    #[test]
    fn test_unclosed_placeholder_is_an_error() {
        assert!(CompiledTemplate::compile("/api/{id", false).is_err());
    }
}
