//! Running a filter against a layer.
//!
//! Layers either evaluate the generic expression themselves, with the map
//! rectangle as a spatial pre-filter, or receive an SQL fragment merged into
//! their own filter and only run a rectangle query.

use crate::ast::Filter;
use crate::config::FilterConfig;
use crate::error::{ApplyError, ValidationError};
use crate::inspect;
use crate::layer::{ConnectionType, FilterStrategy, Layer, LayerFilter, Query, QueryMode};
use crate::render::{self, is_numeric};
use crate::rewrite::{self, Simplified};
use geo_types::{coord, Rect};
use tracing::debug;

/// Processing key holding a backend filter appended to the rendered SQL.
pub const NATIVE_FILTER: &str = "NATIVE_FILTER";

/// Map level state shared by the layers of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct MapContext {
    pub extent: Rect<f64>,
    pub projection: Option<String>,
    pub query: Query,
}

impl MapContext {
    pub fn new(extent: Rect<f64>) -> Self { MapContext { extent, projection: None, query: Query::default() } }

    pub fn with_projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = Some(projection.into());
        self
    }
}

/// Rectangle telling data sources not to filter spatially.
pub fn invalid_rect() -> Rect<f64> { Rect::new(coord! { x: -1e300, y: -1e300 }, coord! { x: 1e300, y: 1e300 }) }

/// Runs the rewrite passes a parsed filter goes through before rendering:
/// namespace stripping, group and alias resolution, feature id and operand
/// checks, null test translation, axis swapping and constant folding.
pub fn prepare(mut filter: Filter, layer: &dyn Layer, config: &FilterConfig) -> Result<Simplified, ValidationError> {
    rewrite::resolve_aliases(&mut filter, layer, &config.alias_namespaces);
    rewrite::check_feature_ids(&filter, layer.name())?;
    rewrite::check_invalid_operand(&filter)?;
    rewrite::process_property_is_null(&mut filter, layer);
    rewrite::swap_axes(&mut filter, layer.projector(), config.default_srs_needs_axis_swap);
    Ok(rewrite::simplify(filter))
}

/// Applies `filter` to the layer at `layer_index` with the strategy the layer asks for.
pub fn apply_filter_to_layer(
    filter: &Filter,
    map: &mut MapContext,
    layer: &mut dyn Layer,
    layer_index: usize,
    config: &FilterConfig,
) -> Result<(), ApplyError> {
    match layer.filter_strategy() {
        FilterStrategy::Plain => apply_plain_filter(filter, map, layer, layer_index, config),
        FilterStrategy::NativeSql => apply_native_filter(filter, map, layer, layer_index, config),
    }
}

/// Generic expression plus rectangle. A filter made of a single BBOX in the
/// map projection becomes a pure rectangle query.
pub fn apply_plain_filter(
    filter: &Filter,
    map: &mut MapContext,
    layer: &mut dyn Layer,
    layer_index: usize,
    config: &FilterConfig,
) -> Result<(), ApplyError> {
    let expression = render::common_expression(filter, &*layer, config)?.ok_or(ApplyError::NoExpression)?;
    let (rect, removable) = query_rect(filter, map, &*layer, config);
    let expression = if removable && filter.is_bbox() { None } else { Some(expression) };

    let (min, max) = (rect.min(), rect.max());
    match &expression {
        Some(expression) => debug!("apply_plain_filter(): {expression}, rect={},{},{},{}", min.x, min.y, max.x, max.y),
        None => debug!("apply_plain_filter(): rect={},{},{},{}", min.x, min.y, max.x, max.y),
    }
    apply_with_rect(map, layer, layer_index, expression, rect)
}

/// SQL fragment merged into the layer filter, then a rectangle query.
pub fn apply_native_filter(
    filter: &Filter,
    map: &mut MapContext,
    layer: &mut dyn Layer,
    layer_index: usize,
    config: &FilterConfig,
) -> Result<(), ApplyError> {
    let expression = render::sql_expression(filter, &*layer, config)?;
    let native = layer.processing(NATIVE_FILTER).map(str::to_string);
    let combined = match (expression, native) {
        (Some(expression), Some(native)) => Some(format!("{expression} AND ({native})")),
        (Some(expression), None) => Some(expression),
        (None, Some(native)) => Some(format!("({native})")),
        (None, None) => None,
    };
    if let Some(combined) = &combined {
        debug!("apply_native_filter(): {combined}");
        apply_expression_to_layer(layer, combined);
    }
    let (rect, _) = query_rect(filter, map, &*layer, config);
    apply_with_rect(map, layer, layer_index, None, rect)
}

/// Query rectangle of a filter, and whether it equals the BBOX operand as written.
fn query_rect(filter: &Filter, map: &MapContext, layer: &dyn Layer, config: &FilterConfig) -> (Rect<f64>, bool) {
    let mut rect = map.extent;
    invalid_rect_if_supported(layer, &mut rect, &config.extent_namespaces);

    let mut removable = true;
    if let Some(bbox) = inspect::top_bbox(filter) {
        rect = bbox.envelope;
        if let (Some(srs), Some(target)) = (bbox.srs.as_deref(), map.projection.as_deref()) {
            if let Ok(projected) = layer.projector().project_rect(srs, target, &bbox.envelope) {
                removable = projected == bbox.envelope;
                rect = projected;
            }
        }
    }
    (rect, removable)
}

/// Replaces `rect` by [`invalid_rect`] when the layer opts out of the default
/// extent (`use_default_extent_for_getfeature=false`) and its data source
/// understands that rectangle.
pub fn invalid_rect_if_supported(layer: &dyn Layer, rect: &mut Rect<f64>, namespaces: &str) -> bool {
    let opted_out = layer.metadata().lookup(namespaces, "use_default_extent_for_getfeature").is_some_and(|value| !is_true(value));
    let supported = match layer.connection_type() {
        ConnectionType::Ogr | ConnectionType::PostGis => true,
        connection => connection.is_plugin("msplugin_mssql2008"),
    };
    if opted_out && supported {
        *rect = invalid_rect();
        return true;
    }
    false
}

fn is_true(value: &str) -> bool { !["NO", "FALSE", "OFF", "0"].iter().any(|no| value.eq_ignore_ascii_case(no)) }

/// Issues the layer query. The pagination and shape cache settings of the
/// previous query survive, everything else is reset.
pub fn apply_with_rect(
    map: &mut MapContext,
    layer: &mut dyn Layer,
    layer_index: usize,
    expression: Option<String>,
    rect: Rect<f64>,
) -> Result<(), ApplyError> {
    let previous = std::mem::take(&mut map.query);
    map.query = Query {
        mode: QueryMode::Multiple,
        layer: Some(layer_index),
        rect: Some(rect),
        start_index: previous.start_index,
        max_features: previous.max_features,
        only_cache_result_count: previous.only_cache_result_count,
        cache_shapes: previous.cache_shapes,
        max_cached_shape_count: previous.max_cached_shape_count,
        max_cached_shape_ram_amount: previous.max_cached_shape_ram_amount,
        ..Query::default()
    };

    match expression {
        Some(expression) => {
            map.query.filter = Some(expression);
            layer.query_by_filter(&map.query)?;
        }
        None => layer.query_by_rect(&map.query)?,
    }
    Ok(())
}

/// Stores `expression` in the layer filter, and'ed with an existing expression filter.
///
/// Database layers get the expression parenthesised. OGR layers use their
/// `WHERE` syntax unless the current filter is an expression in the generic
/// language.
pub fn apply_expression_to_layer(layer: &mut dyn Layer, expression: &str) {
    let existing = layer.filter().clone();
    let has_where = matches!(&existing, LayerFilter::Expression(text) if text.get(..6).is_some_and(|p| p.eq_ignore_ascii_case("WHERE ")));

    let (expression, add_where) = match layer.connection_type() {
        ConnectionType::PostGis | ConnectionType::OracleSpatial | ConnectionType::Plugin { .. } => (format!("({expression})"), false),
        ConnectionType::Ogr => (expression.to_string(), !existing.is_expression() || has_where),
        _ => (expression.to_string(), false),
    };

    let mut buffer = String::new();
    if add_where {
        buffer.push_str("WHERE ");
    }
    match &existing {
        LayerFilter::Expression(old) => {
            let old = if has_where { &old[6..] } else { old.as_str() };
            buffer.push_str(&format!("(({old}) and {expression})"));
        }
        _ => buffer.push_str(&expression),
    }
    layer.set_filter(LayerFilter::load(&buffer));
}

/// Expression selecting `values` of `item`.
///
/// `values` is either a comma separated list (`a,b`) compared for equality,
/// quoted when `force_character` is set or the first value is not numeric, or
/// a comma separated list of `min/max` ranges.
pub fn expression_for_values_ranges(layer: &dyn Layer, item: &str, values: &str, force_character: bool) -> String {
    let terms: Vec<String> = if !values.contains('/') {
        let character = force_character || !values.split(',').next().is_some_and(is_numeric);
        values
            .split(',')
            .map(|value| {
                let value = layer.escape_sql_param(value);
                if character {
                    format!("(\"[{item}]\" = \"{value}\")")
                } else {
                    format!("([{item}] = {value})")
                }
            })
            .collect()
    } else {
        values
            .split(',')
            .filter_map(|range| {
                let bounds: Vec<&str> = range.split('/').collect();
                match bounds.as_slice() {
                    [single] => Some(format!("([{item}] = {})", layer.escape_sql_param(single))),
                    [min, max] | [min, max, _] => Some(format!(
                        "([{item}] >= {} AND [{item}] <= {})",
                        layer.escape_sql_param(min),
                        layer.escape_sql_param(max)
                    )),
                    _ => None,
                }
            })
            .collect()
    };
    format!("({})", terms.join(" OR "))
}

/// Splits `(<Filter>...</Filter>)(<Filter>...</Filter>)` into the filter documents.
///
/// Parentheses inside XML markup or quoted attribute values do not end a filter.
pub fn split_filters(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    if bytes.first() != Some(&b'(') {
        return Vec::new();
    }

    let mut filters = Vec::new();
    let mut quote: Option<u8> = None;
    let mut depth = 0i32;
    let mut in_tag = false;
    let mut start = 1;
    let mut i = 1;
    while i < bytes.len() {
        let c = bytes[i];
        let next = bytes.get(i + 1).copied();
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
        } else if in_tag && (c == b'\'' || c == b'"') {
            quote = Some(c);
        } else if c == b'<' {
            in_tag = true;
            match next {
                Some(b'/') => depth -= 1,
                Some(b'!') => {}
                _ => depth += 1,
            }
        } else if c == b'/' && next == Some(b'>') {
            in_tag = false;
            depth -= 1;
            i += 1;
        } else if c == b'>' {
            in_tag = false;
        } else if depth == 0 && c == b')' {
            filters.push(text[start..i].to_string());
            if next != Some(b'(') {
                break;
            }
            i += 1;
            start = i + 1;
        }
        i += 1;
    }
    filters
}
