use serde::{Deserialize, Serialize};

/// Knobs of the filter engine that depend on the serving protocol.
///
/// Namespace strings are sequences of OWS namespace letters, see [`crate::layer::Metadata::lookup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Namespaces searched for `<item>_type` and `featureid`
    pub metadata_namespaces: String,
    /// Namespaces searched for `<item>_alias`, `groups` and the item visibility lists
    pub alias_namespaces: String,
    /// Namespaces searched for `use_default_extent_for_getfeature`
    pub extent_namespaces: String,
    /// Swap axes of operands that carry no `srsName`
    pub default_srs_needs_axis_swap: bool,
    /// Advertise `Temporal_Capabilities`
    pub temporal_capabilities: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            metadata_namespaces: "OFG".to_string(),
            alias_namespaces: "G".to_string(),
            extent_namespaces: "OF".to_string(),
            default_srs_needs_axis_swap: false,
            temporal_capabilities: true,
        }
    }
}

impl FilterConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> { serde_json::from_str(json) }
}
