//! Translation of filter trees into expression strings.
//!
//! One traversal handles the logical operators for every target language.
//! A [`Dialect`] supplies the leaf fragments and the way two operands are
//! joined. Rendering yields `Ok(None)` when a subtree contributes no condition
//! (an SQL BBOX, a feature id list without usable ids), which the logical
//! operators treat as "true".

mod common;
mod sql;

pub use common::CommonExpression;
pub use sql::SqlExpression;

use crate::ast::*;
use crate::config::FilterConfig;
use crate::error::RenderError;
use crate::layer::Layer;

pub type Rendered = Result<Option<String>, RenderError>;

/// Leaf emitter of one expression language.
pub trait Dialect {
    /// Backend name used in error reports.
    const NAME: &'static str;

    fn comparison(&self, comparison: &Comparison, layer: &dyn Layer) -> Rendered;

    fn spatial(&self, spatial: &Spatial, layer: &dyn Layer) -> Rendered;

    fn temporal(&self, temporal: &Temporal, layer: &dyn Layer) -> Rendered;

    fn feature_ids(&self, ids: &FeatureIds, layer: &dyn Layer) -> Rendered;

    fn and(&self, left: &str, right: &str) -> String;

    fn or(&self, left: &str, right: &str) -> String;

    fn not(&self, operand: &str) -> String;

    /// Whether an operand of `And`/`Or` is handled outside the expression,
    /// in which case the operator reduces to its other operand.
    fn handled_elsewhere(&self, _operand: &Filter, _layer: &dyn Layer) -> bool { false }
}

/// Renders `filter` with `dialect`.
pub fn render<D: Dialect>(dialect: &D, filter: &Filter, layer: &dyn Layer) -> Rendered {
    match filter {
        Filter::And(left, right) | Filter::Or(left, right) => {
            if dialect.handled_elsewhere(left, layer) {
                return render(dialect, right, layer);
            }
            if dialect.handled_elsewhere(right, layer) {
                return render(dialect, left, layer);
            }
            let is_and = matches!(filter, Filter::And(..));
            let left = render(dialect, left, layer)?;
            let right = render(dialect, right, layer)?;
            Ok(match (left, right) {
                (Some(left), Some(right)) => Some(if is_and { dialect.and(&left, &right) } else { dialect.or(&left, &right) }),
                // an operand without a condition is true: neutral for And, absorbing for Or
                (Some(only), None) | (None, Some(only)) if is_and => Some(only),
                _ => None,
            })
        }
        Filter::Not(inner) => match render(dialect, inner, layer)? {
            Some(inner) => Ok(Some(dialect.not(&inner))),
            None => Err(RenderError::EmptyNegation),
        },
        Filter::Comparison(comparison) => dialect.comparison(comparison, layer),
        Filter::Spatial(spatial) => dialect.spatial(spatial, layer),
        Filter::Temporal(temporal) => dialect.temporal(temporal, layer),
        Filter::FeatureId(ids) => dialect.feature_ids(ids, layer),
    }
}

/// Expression for the built-in evaluator of the host.
pub fn common_expression(filter: &Filter, layer: &dyn Layer, config: &FilterConfig) -> Rendered {
    render(&CommonExpression::new(config), filter, layer)
}

/// SQL fragment for layers that evaluate filters in their database.
pub fn sql_expression(filter: &Filter, layer: &dyn Layer, config: &FilterConfig) -> Rendered {
    render(&SqlExpression::new(config), filter, layer)
}

/// How a literal is quoted in a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueKind {
    Number,
    String,
    Date,
}

/// Types the values compared against `property`.
///
/// A `<property>_type` metadata entry of `Character` (or `Date` when `dates` is
/// set) wins. Otherwise the first value that is not numeric makes the
/// comparison a string comparison.
pub(crate) fn value_kind(layer: &dyn Layer, config: &FilterConfig, property: &str, values: &[&str], dates: bool) -> ValueKind {
    let declared = layer.metadata().lookup(&config.metadata_namespaces, &format!("{property}_type"));
    match declared {
        Some(kind) if kind.eq_ignore_ascii_case("Character") => ValueKind::String,
        Some(kind) if dates && kind.eq_ignore_ascii_case("Date") => ValueKind::Date,
        _ if values.iter().any(|value| !is_numeric(value)) => ValueKind::String,
        _ => ValueKind::Number,
    }
}

/// A value is numeric when the whole text, without leading blanks, reads as a number.
pub fn is_numeric(text: &str) -> bool {
    !text.is_empty() && !text.starts_with(char::is_whitespace) && text.parse::<f64>().is_ok()
}

/// Backslash-escapes `"` and `\` for double-quoted strings of the host expression language.
pub(crate) fn escape_string(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `printf("%g")` formatting: six significant digits, trailing zeros removed.
pub(crate) fn format_g(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    let scientific = format!("{value:.5e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if (-4..6).contains(&exponent) {
        let decimals = (5 - exponent) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exponent.abs())
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::fixtures::TestLayer;
    use crate::layer::ConnectionType;

    #[test]
    fn test_is_numeric() {
        assert!(is_numeric("5"));
        assert!(is_numeric("-1.5e3"));
        assert!(!is_numeric("7 "));
        assert!(!is_numeric(" 7"));
        assert!(!is_numeric(""));
        assert!(!is_numeric("12abc"));
        assert!(!is_numeric("Paris"));
    }

    #[test]
    fn test_format_g() {
        assert_eq!(format_g(0.0), "0");
        assert_eq!(format_g(10.0), "10");
        assert_eq!(format_g(0.5), "0.5");
        assert_eq!(format_g(1609.344), "1609.34");
        assert_eq!(format_g(1234567.0), "1.23457e+06");
        assert_eq!(format_g(0.00001), "1e-05");
        assert_eq!(format_g(-2.25), "-2.25");
    }

    #[test]
    fn test_value_kind() {
        let config = FilterConfig::default();
        let layer = TestLayer::new("roads", ConnectionType::Local)
            .with_metadata("gml_CODE_type", "Character")
            .with_metadata("wfs_BUILT_type", "Date");
        assert_eq!(value_kind(&layer, &config, "CODE", &["12"], true), ValueKind::String);
        assert_eq!(value_kind(&layer, &config, "BUILT", &["2001-01-01"], true), ValueKind::Date);
        assert_eq!(value_kind(&layer, &config, "BUILT", &["2001-01-01"], false), ValueKind::String);
        assert_eq!(value_kind(&layer, &config, "POP", &["12", "x"], true), ValueKind::String);
        assert_eq!(value_kind(&layer, &config, "POP", &["12", "13.5"], true), ValueKind::Number);
        assert_eq!(escape_string(r#"say "hi" \o/"#), r#"say \"hi\" \\o/"#);
    }
}
