//! Expressions in the host's built-in expression language.
//!
//! Attributes are written `[ITEM]`, strings are double-quoted, dates use
//! backticks and geometry predicates are function calls over `[shape]`.

use super::{escape_string, format_g, value_kind, Dialect, Rendered, ValueKind};
use crate::ast::*;
use crate::config::FilterConfig;
use crate::error::RenderError;
use crate::gml;
use crate::layer::Layer;
use crate::time;
use crate::units::Units;
use geo_types::{Geometry, Rect};
use tracing::trace;

/// Characters with a meaning in POSIX regular expressions, plus the string quote.
const REGEX_SPECIAL: &str = "\\^${[().*+?|\"";

/// Rectangles reprojected from the whole world end up below this bound.
const WORLD_REPROJECTED_MIN: f64 = -1e14;

pub struct CommonExpression<'a> {
    config: &'a FilterConfig,
}

impl<'a> CommonExpression<'a> {
    pub fn new(config: &'a FilterConfig) -> Self { CommonExpression { config } }

    fn binary(&self, layer: &dyn Layer, operator: BinaryOperator, property: &str, literal: &Literal) -> String {
        let kind = match &literal.value {
            Some(value) => value_kind(layer, self.config, property, &[value], true),
            None => ValueKind::String,
        };
        let operator = match operator {
            BinaryOperator::EqualTo if literal.case_insensitive => "=*",
            BinaryOperator::EqualTo => "=",
            BinaryOperator::NotEqualTo => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::LessThanOrEqualTo => "<=",
            BinaryOperator::GreaterThanOrEqualTo => ">=",
        };
        let value = literal.value.as_deref().map(escape_string).unwrap_or_default();
        match kind {
            ValueKind::String => format!("(\"[{property}]\" {operator} \"{value}\")"),
            ValueKind::Date => format!("([{property}] {operator} `{value}`)"),
            ValueKind::Number => format!("([{property}] {operator} {value})"),
        }
    }

    fn between(&self, layer: &dyn Layer, property: &str, bounds: &Boundary) -> Rendered {
        if bounds.lower.contains(';') || bounds.upper.contains(';') {
            return Err(RenderError::InvalidBoundary(bounds.to_string()));
        }
        let kind = value_kind(layer, self.config, property, &[&bounds.lower, &bounds.upper], true);
        let (lower, upper) = (escape_string(&bounds.lower), escape_string(&bounds.upper));
        Ok(Some(match kind {
            ValueKind::String => format!("(\"[{property}]\"  >= \"{lower}\" AND  \"[{property}]\"  <= \"{upper}\")"),
            ValueKind::Date => format!("([{property}]  >= `{lower}` AND  [{property}]  <= `{upper}`)"),
            ValueKind::Number => format!("([{property}]  >= {lower} AND  [{property}]  <= {upper})"),
        }))
    }

    fn spatial_operand(&self, spatial: &Spatial, layer: &dyn Layer) -> (&'static str, Geometry<f64>, Option<f64>) {
        match spatial {
            Spatial::BBox(bbox) => {
                let (geometry, reprojected) = world_rect_polygon(&bbox.envelope, bbox.srs.as_deref(), layer);
                let geometry = if reprojected { geometry } else { reproject(geometry, bbox.srs.as_deref(), layer) };
                ("intersects", geometry, None)
            }
            Spatial::Binary { operator, shape, srs, .. } => {
                (operator.function_name(), reproject(shape.geometry.clone(), srs.as_deref(), layer), None)
            }
            Spatial::Distance { operator, shape, distance, srs, .. } => {
                let mut value = distance.magnitude();
                let units = distance.unit_name().and_then(Units::from_distance_unit);
                if value > 0.0 {
                    if let Some(units) = units {
                        value = units.convert(value, layer.units());
                    }
                }
                let name = match operator {
                    DistanceOperator::DWithin => "dwithin",
                    DistanceOperator::Beyond => "beyond",
                };
                (name, reproject(shape.geometry.clone(), srs.as_deref(), layer), Some(value))
            }
        }
    }
}

/// Polygon of a BBOX rectangle. A rectangle covering the whole world in
/// geographic coordinates is projected to the layer up front; when that
/// projection yields the unbounded rectangle the polygon is used as is.
fn world_rect_polygon(rect: &Rect<f64>, srs: Option<&str>, layer: &dyn Layer) -> (Geometry<f64>, bool) {
    let (min, max) = (rect.min(), rect.max());
    let is_world = (min.x + 180.0).abs() < 1e-5 && (min.y + 90.0).abs() < 1e-5 && (max.x - 180.0).abs() < 1e-5 && (max.y - 90.0).abs() < 1e-5;
    if let (true, Some(target)) = (is_world, layer.projection()) {
        if let Some(source) = srs.or(layer.map_projection()) {
            if let Ok(projected) = layer.projector().project_rect(source, target, rect) {
                if projected.min().x <= WORLD_REPROJECTED_MIN {
                    return (Geometry::Polygon(gml::rect_polygon(&projected)), true);
                }
            }
        }
    }
    (Geometry::Polygon(gml::rect_polygon(rect)), false)
}

/// Moves an operand into the layer projection. Operands without `srsName`
/// are taken to be in the map projection.
fn reproject(geometry: Geometry<f64>, srs: Option<&str>, layer: &dyn Layer) -> Geometry<f64> {
    let Some(target) = layer.projection() else {
        return geometry;
    };
    let Some(source) = srs.or(layer.map_projection()) else {
        return geometry;
    };
    match layer.projector().project_geometry(source, target, &geometry) {
        Ok(projected) => projected,
        Err(error) => {
            trace!("keeping operand in {source}: {error}");
            geometry
        }
    }
}

/// Regular expression equivalent of a `PropertyIsLike` pattern, anchored when not empty.
fn like_regex(pattern: &str, options: &LikeOptions) -> Result<String, RenderError> {
    let (Some(wild), Some(single), Some(escape)) =
        (options.wild_card.chars().next(), options.single_char.chars().next(), options.escape_char.chars().next())
    else {
        return Err(RenderError::IncompleteLike);
    };

    let mut regex = String::with_capacity(pattern.len() + 2);
    if !pattern.is_empty() {
        regex.push('^');
    }
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c == single {
            regex.push('.');
        } else if let Some(&next) = chars.peek().filter(|&&next| c == escape && (next == single || next == wild || next == escape)) {
            chars.next();
            push_literal(&mut regex, next);
        } else if c == wild {
            regex.push_str(".*");
        } else {
            push_literal(&mut regex, c);
        }
    }
    if !pattern.is_empty() {
        regex.push('$');
    }
    Ok(regex)
}

/// Appends `c` so that it matches itself inside a quoted regular expression.
fn push_literal(regex: &mut String, c: char) {
    match c {
        // once for the regular expression, once more for the string literal
        '\\' => regex.push_str("\\\\\\\\"),
        c if REGEX_SPECIAL.contains(c) => {
            regex.push('\\');
            regex.push(c);
        }
        c => regex.push(c),
    }
}

impl Dialect for CommonExpression<'_> {
    const NAME: &'static str = "expression";

    fn comparison(&self, comparison: &Comparison, layer: &dyn Layer) -> Rendered {
        match comparison {
            Comparison::Binary { operator, property, literal } => Ok(Some(self.binary(layer, *operator, property, literal))),
            Comparison::Between { property, bounds } => self.between(layer, property, bounds),
            Comparison::Like { property, pattern, options } => {
                let operator = if options.case_insensitive { "~*" } else { "~" };
                Ok(Some(format!("(\"[{property}]\" {operator} \"{}\")", like_regex(pattern, options)?)))
            }
            Comparison::IsNull { .. } | Comparison::IsNil { .. } => {
                Err(RenderError::UnsupportedOperator { operator: comparison.operator_name(), backend: Self::NAME })
            }
        }
    }

    fn spatial(&self, spatial: &Spatial, layer: &dyn Layer) -> Rendered {
        let (name, geometry, distance) = self.spatial_operand(spatial, layer);
        let mut expression = format!("{name}([shape],fromText('{}')", gml::to_wkt(&geometry));
        if let Some(distance) = distance {
            expression.push(',');
            expression.push_str(&format_g(distance));
        }
        expression.push_str(") = TRUE");
        Ok(Some(expression))
    }

    fn temporal(&self, temporal: &Temporal, layer: &dyn Layer) -> Rendered {
        let Temporal::During { property, period } = temporal;
        match time::time_filter(property, &period.to_string(), layer.time_syntax()) {
            Some(expression) => Ok(Some(expression)),
            None => Err(RenderError::InvalidTime(period.to_string())),
        }
    }

    fn feature_ids(&self, ids: &FeatureIds, layer: &dyn Layer) -> Rendered {
        let attribute = layer
            .metadata()
            .lookup(&self.config.metadata_namespaces, "featureid")
            .ok_or(RenderError::MissingMetadata("featureid"))?;
        let local = |id: &'_ str| -> String { id.rsplit('.').next().unwrap_or(id).to_string() };
        let quoted = ids.0.first().is_some_and(|first| !super::is_numeric(&local(first)));

        let terms: Vec<String> = ids
            .0
            .iter()
            .map(|id| {
                let id = local(id);
                if quoted {
                    format!("(\"[{attribute}]\" == \"{}\")", escape_string(&id))
                } else {
                    format!("([{attribute}] == {id})")
                }
            })
            .collect();
        if terms.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!("({})", terms.join(" OR "))))
    }

    fn and(&self, left: &str, right: &str) -> String { format!("({left} AND {right})") }

    fn or(&self, left: &str, right: &str) -> String { format!("({left} OR {right})") }

    fn not(&self, operand: &str) -> String { format!("(NOT {operand})") }
}
