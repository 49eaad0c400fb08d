//! Route path template rendering
//!
//! Templates carry `{service}`, `{stage}`, and `{version}` placeholders that
//! are substituted when a deployment's route path is computed.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9]+)\}").expect("placeholder regex"));

/// Template rendering errors
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template references a placeholder this tool does not know
    #[error("unknown placeholder '{{{0}}}' (allowed: service, stage, version)")]
    UnknownPlaceholder(String),

    /// A referenced placeholder has no usable value
    #[error("placeholder '{{{0}}}' has an empty value")]
    EmptyValue(&'static str),
}

/// Values substituted into a route path template
#[derive(Debug, Clone, Copy)]
pub struct RouteVars<'a> {
    pub service: &'a str,
    pub stage: &'a str,
    pub version: &'a str,
}

/// Render `template`, substituting every `{placeholder}` occurrence.
///
/// A template without placeholders renders to itself unchanged.
pub fn render(template: &str, vars: &RouteVars<'_>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let whole = caps.get(0).expect("capture 0 always present");
        out.push_str(&template[last..whole.start()]);

        let (key, value) = match &caps[1] {
            "service" => ("service", vars.service),
            "stage" => ("stage", vars.stage),
            "version" => ("version", vars.version),
            other => return Err(TemplateError::UnknownPlaceholder(other.to_string())),
        };
        if value.is_empty() {
            return Err(TemplateError::EmptyValue(key));
        }
        out.push_str(value);
        last = whole.end();
    }

    out.push_str(&template[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: RouteVars<'static> = RouteVars {
        service: "orders",
        stage: "dev",
        version: "1-2-3",
    };

    #[test]
    fn renders_all_placeholders() {
        let path = render("/{service}/{stage}/{version}", &VARS).unwrap();
        assert_eq!(path, "/orders/dev/1-2-3");
    }

    #[test]
    fn identity_without_placeholders() {
        assert_eq!(render("/static/path", &VARS).unwrap(), "/static/path");
        assert_eq!(render("", &VARS).unwrap(), "");
    }

    #[test]
    fn repeated_placeholder_renders_each_occurrence() {
        let path = render("/{stage}/{stage}", &VARS).unwrap();
        assert_eq!(path, "/dev/dev");
    }

    #[test]
    fn unknown_placeholder_is_rejected() {
        let err = render("/{service}/{environment}", &VARS).unwrap_err();
        assert!(matches!(err, TemplateError::UnknownPlaceholder(name) if name == "environment"));
    }

    #[test]
    fn empty_value_is_rejected() {
        let vars = RouteVars {
            service: "orders",
            stage: "",
            version: "1",
        };
        let err = render("/{service}/{stage}", &vars).unwrap_err();
        assert!(matches!(err, TemplateError::EmptyValue("stage")));
    }
}
