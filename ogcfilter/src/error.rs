use crate::grammar;
use thiserror::Error;

/// Reasons a Filter Encoding document is rejected.
///
/// No partial filter is ever produced: any of these aborts the whole parse.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Empty filter document")]
    EmptyDocument,
    #[error("XML error: {0}")]
    Xml(String),
    #[error("No Filter element found")]
    MissingFilter,
    #[error("Filter contains no supported operator")]
    NoSupportedOperator,
    #[error("Logical operator {0} needs {1} operand(s)")]
    LogicalArity(&'static str, &'static str),
    #[error("{operator}: missing {what}")]
    Missing { operator: String, what: &'static str },
    #[error("{operator}: invalid {what}")]
    Invalid { operator: String, what: &'static str },
    #[error("Invalid time value: {0}")]
    InvalidTime(String),
}

impl ParseError {
    pub(crate) fn missing(operator: &str, what: &'static str) -> Self { ParseError::Missing { operator: operator.to_string(), what } }
    pub(crate) fn invalid(operator: &str, what: &'static str) -> Self { ParseError::Invalid { operator: operator.to_string(), what } }
}

impl From<quick_xml::Error> for ParseError {
    fn from(error: quick_xml::Error) -> Self { ParseError::Xml(error.to_string()) }
}

impl From<quick_xml::events::attributes::AttrError> for ParseError {
    fn from(error: quick_xml::events::attributes::AttrError) -> Self { ParseError::Xml(error.to_string()) }
}

impl From<pest::error::Error<grammar::Rule>> for ParseError {
    fn from(error: pest::error::Error<grammar::Rule>) -> Self { ParseError::InvalidTime(error.to_string()) }
}

/// Errors raised while turning a filter tree into an expression string
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Unsupported operator {operator} for {backend} rendering")]
    UnsupportedOperator { operator: &'static str, backend: &'static str },
    #[error("Like operator requires wildcard, single character and escape character")]
    IncompleteLike,
    #[error("Single quote character is not allowed as an escaping character.")]
    QuoteEscapeChar,
    #[error("Invalid boundary: {0}")]
    InvalidBoundary(String),
    #[error("Missing metadata {0}")]
    MissingMetadata(&'static str),
    #[error("Invalid time filter: {0}")]
    InvalidTime(String),
    #[error("NOT applied to an empty expression")]
    EmptyNegation,
}

/// Errors raised by the rewrite and validation passes
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Feature id {id} not consistent with feature type name {layer}.")]
    FeatureIdMismatch { id: String, layer: String },
    #[error("Operand '{0}' is invalid in comparison.")]
    InvalidOperand(String),
    #[error("Property '{0}' is unknown.")]
    UnknownProperty(String),
    #[error(transparent)]
    Layer(#[from] LayerError),
}

/// Opaque failure reported by a layer implementation
#[derive(Debug, Error)]
#[error("{0}")]
pub struct LayerError(pub String);

impl LayerError {
    pub fn new(message: impl Into<String>) -> Self { LayerError(message.into()) }
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Layer(#[from] LayerError),
    #[error("Filter has no renderable expression")]
    NoExpression,
}
