//! The layer side of filter application.
//!
//! A [`Layer`] is the data source a filter is applied to. The engine reads its
//! metadata, escapes identifiers and literals through it, stores the rendered
//! expression in its filter slot and finally asks it to run a query.

use crate::error::LayerError;
use crate::time::TimeSyntax;
use crate::units::Units;
use geo_types::{Geometry, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pseudo properties every GML feature carries.
pub const GML_DEFAULT_PROPERTIES: [&str; 6] =
    ["gml:name", "gml:description", "gml:descriptionReference", "gml:identifier", "gml:boundedBy", "@gml:id"];

pub fn is_gml_default_property(name: &str) -> bool { GML_DEFAULT_PROPERTIES.contains(&name) }

/// Layer metadata: a case-insensitive key/value table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) { self.0.insert(key.into(), value.into()); }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v.as_str())
    }

    /// Namespaced lookup: each letter of `namespaces` selects a key prefix
    /// (`O` ows, `F` wfs, `G` gml, `M` wms, `C` wcs, `S` sos) and the first
    /// prefixed key present wins.
    pub fn lookup(&self, namespaces: &str, name: &str) -> Option<&str> {
        namespaces.chars().find_map(|namespace| {
            let prefix = match namespace {
                'O' => "ows",
                'F' => "wfs",
                'G' => "gml",
                'M' => "wms",
                'C' => "wcs",
                'S' => "sos",
                _ => return None,
            };
            self.get(&format!("{prefix}_{name}"))
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Metadata(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionType {
    /// Shapefiles and other files read by the built-in drivers
    Local,
    Ogr,
    PostGis,
    OracleSpatial,
    Wfs,
    Plugin { library: String },
}

impl ConnectionType {
    pub fn is_plugin(&self, name: &str) -> bool {
        matches!(self, ConnectionType::Plugin { library } if library.contains(name))
    }
}

/// Content of a layer's filter slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerFilter {
    #[default]
    None,
    /// A parenthesised logical expression, kept verbatim
    Expression(String),
    /// A `/regex/`, stored without its delimiters
    Regex(String),
    String(String),
}

impl LayerFilter {
    /// Classifies filter text the way layer filters are loaded from configuration.
    pub fn load(text: &str) -> LayerFilter {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            LayerFilter::None
        } else if trimmed.starts_with('(') && trimmed.ends_with(')') {
            LayerFilter::Expression(trimmed.to_string())
        } else if trimmed.len() > 1 && trimmed.starts_with('/') && trimmed.ends_with('/') {
            LayerFilter::Regex(trimmed[1..trimmed.len() - 1].to_string())
        } else if trimmed.len() > 1 && trimmed.starts_with('"') && trimmed.ends_with('"') {
            LayerFilter::String(trimmed[1..trimmed.len() - 1].to_string())
        } else {
            LayerFilter::String(trimmed.to_string())
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            LayerFilter::None => None,
            LayerFilter::Expression(text) | LayerFilter::Regex(text) | LayerFilter::String(text) => Some(text),
        }
    }

    pub fn is_expression(&self) -> bool { matches!(self, LayerFilter::Expression(_)) }
}

/// How a layer wants filters applied to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterStrategy {
    /// Generic expression evaluated by the engine, plus a rectangle pre-filter
    #[default]
    Plain,
    /// SQL fragment merged into the layer filter and executed by the data source
    NativeSql,
}

/// Coordinate transformations between spatial reference systems.
///
/// Systems are identified by the `srsName` strings found in filters
/// (`EPSG:4326`, `urn:ogc:def:crs:EPSG::4326`, ...).
pub trait Projector {
    fn project_rect(&self, from: &str, to: &str, rect: &Rect<f64>) -> Result<Rect<f64>, LayerError>;
    fn project_geometry(&self, from: &str, to: &str, geometry: &Geometry<f64>) -> Result<Geometry<f64>, LayerError>;
    /// Whether the system declares northing before easting.
    fn is_axis_inverted(&self, srs: &str) -> bool;
}

/// Identity projector.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unprojected;

impl Projector for Unprojected {
    fn project_rect(&self, _from: &str, _to: &str, rect: &Rect<f64>) -> Result<Rect<f64>, LayerError> { Ok(*rect) }

    fn project_geometry(&self, _from: &str, _to: &str, geometry: &Geometry<f64>) -> Result<Geometry<f64>, LayerError> {
        Ok(geometry.clone())
    }

    fn is_axis_inverted(&self, _srs: &str) -> bool { false }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QueryMode {
    Single,
    #[default]
    Multiple,
}

/// Query control block handed to the layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Query {
    pub mode: QueryMode,
    pub layer: Option<usize>,
    pub rect: Option<Rect<f64>>,
    /// Expression evaluated per feature; `None` for a pure rectangle query
    pub filter: Option<String>,
    pub start_index: Option<usize>,
    pub max_features: Option<usize>,
    pub only_cache_result_count: bool,
    pub cache_shapes: bool,
    pub max_cached_shape_count: usize,
    pub max_cached_shape_ram_amount: usize,
}

pub trait Layer {
    fn name(&self) -> &str;

    fn connection_type(&self) -> &ConnectionType;

    fn metadata(&self) -> &Metadata;

    /// Attribute names of the data source.
    fn items(&self) -> &[String];

    /// Items exposed to clients, driven by the `include_items` and `exclude_items` metadata.
    fn visible_items(&self, namespaces: &str) -> Vec<String> {
        let metadata = self.metadata();
        let listed = |key: &str| -> Vec<String> {
            metadata.lookup(namespaces, key).map(|list| list.split(',').map(|s| s.trim().to_string()).collect()).unwrap_or_default()
        };
        let included = listed("include_items");
        let excluded = listed("exclude_items");
        let all = included.iter().any(|item| item == "all");
        self.items()
            .iter()
            .filter(|item| all || included.iter().any(|i| i.eq_ignore_ascii_case(item)))
            .filter(|item| !excluded.iter().any(|e| e.eq_ignore_ascii_case(item)))
            .cloned()
            .collect()
    }

    /// Attribute groups declared by the `groups` metadata.
    fn group_names(&self, namespaces: &str) -> Vec<String> {
        match self.metadata().lookup(namespaces, "groups") {
            Some(groups) => groups.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            None => Vec::new(),
        }
    }

    fn escape_property_name(&self, name: &str) -> String {
        let mut escaped = String::with_capacity(name.len() + 2);
        escaped.push('"');
        for c in name.chars() {
            if c == '"' || c == '\\' {
                escaped.push(c);
            }
            escaped.push(c);
        }
        escaped.push('"');
        escaped
    }

    fn escape_sql_param(&self, value: &str) -> String {
        let mut escaped = String::with_capacity(value.len());
        for c in value.chars() {
            match c {
                '\'' => escaped.push_str("''"),
                '\\' => escaped.push_str("\\\\"),
                c => escaped.push(c),
            }
        }
        escaped
    }

    /// Whether the data source can test attributes for NULL.
    fn supports_is_null(&self) -> bool { false }

    fn time_syntax(&self) -> TimeSyntax {
        match self.connection_type() {
            ConnectionType::Local | ConnectionType::Ogr | ConnectionType::Wfs => TimeSyntax::Backticks,
            _ => TimeSyntax::Plain,
        }
    }

    fn filter(&self) -> &LayerFilter;

    fn set_filter(&mut self, filter: LayerFilter);

    fn units(&self) -> Units { Units::Meters }

    fn projection(&self) -> Option<&str> { None }

    /// Projection of the map the layer is drawn in.
    fn map_projection(&self) -> Option<&str> { None }

    fn projector(&self) -> &dyn Projector { &Unprojected }

    fn filter_strategy(&self) -> FilterStrategy { FilterStrategy::Plain }

    /// Value of a `PROCESSING "KEY=value"` directive.
    fn processing(&self, _key: &str) -> Option<&str> { None }

    fn query_by_rect(&mut self, query: &Query) -> Result<(), LayerError>;

    fn query_by_filter(&mut self, query: &Query) -> Result<(), LayerError>;
}
