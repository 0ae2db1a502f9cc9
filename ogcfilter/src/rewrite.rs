//! Passes that rewrite or validate a parsed filter against its target layer.

use crate::ast::*;
use crate::error::ValidationError;
use crate::gml;
use crate::layer::{is_gml_default_property, ConnectionType, Layer, Projector};
use tracing::warn;

/// Literal standing for SQL NULL in equality tests.
pub const NULL_LITERAL: &str = "_MAPSERVER_NULL_";

/// Removes `prefix:` qualifiers from property names.
///
/// Comparisons on GML default properties (`gml:name`, `@gml:id`, ...) keep their prefix.
pub fn strip_namespaces(filter: &mut Filter) {
    filter.for_each_predicate_mut(&mut |predicate| {
        if let Filter::Comparison(comparison) = predicate {
            if is_gml_default_property(comparison.property()) {
                return;
            }
        }
        if let Some(property) = predicate.property_mut() {
            let parts: Vec<&str> = property.split(':').collect();
            if parts.len() == 2 {
                *property = parts[1].to_string();
            }
        }
    });
}

/// Turns `group/item` property paths into `item` for the given attribute groups.
pub fn remove_group_names(filter: &mut Filter, groups: &[String]) {
    if groups.is_empty() {
        return;
    }
    filter.for_each_predicate_mut(&mut |predicate| {
        if let Some(property) = predicate.property_mut() {
            if let Some(leaf) = ungrouped(property, groups) {
                *property = leaf;
            }
        }
    });
}

fn ungrouped(name: &str, groups: &[String]) -> Option<String> {
    let slash = name.find('/')?;
    let path = match name.find(':') {
        Some(colon) if colon < slash => &name[colon + 1..],
        _ => name,
    };
    groups.iter().find_map(|group| {
        let prefix = path.get(..group.len())?;
        let rest = path[group.len()..].strip_prefix('/')?;
        if !prefix.eq_ignore_ascii_case(group) {
            return None;
        }
        Some(match rest.find(':') {
            Some(colon) => rest[colon + 1..].to_string(),
            None => rest.to_string(),
        })
    })
}

/// Renames every property equal to `old` (case-insensitive) to `new`.
pub fn replace_property_name(filter: &mut Filter, old: &str, new: &str) {
    filter.for_each_predicate_mut(&mut |predicate| {
        if let Some(property) = predicate.property_mut() {
            if property.eq_ignore_ascii_case(old) {
                *property = new.to_string();
            }
        }
    });
}

/// Maps client-facing property names back to layer items: namespaces are
/// stripped, group paths removed and `<item>_alias` names replaced.
pub fn resolve_aliases(filter: &mut Filter, layer: &dyn Layer, namespaces: &str) {
    strip_namespaces(filter);
    remove_group_names(filter, &layer.group_names(namespaces));
    for item in layer.items().iter().filter(|item| !item.is_empty()) {
        if let Some(alias) = layer.metadata().lookup(namespaces, &format!("{item}_alias")) {
            replace_property_name(filter, alias, item);
        }
    }
}

/// Dotted feature ids must be prefixed by the layer name.
pub fn check_feature_ids(filter: &Filter, layer_name: &str) -> Result<(), ValidationError> {
    let mut result = Ok(());
    filter.for_each_predicate(&mut |predicate| {
        let Filter::FeatureId(ids) = predicate else { return };
        if result.is_err() {
            return;
        }
        for id in &ids.0 {
            if let Some(dot) = id.rfind('.') {
                if !id[..dot].eq_ignore_ascii_case(layer_name) {
                    warn!("feature id {} does not belong to layer {}", id, layer_name);
                    result = Err(ValidationError::FeatureIdMismatch { id: id.clone(), layer: layer_name.to_string() });
                    return;
                }
            }
        }
    });
    result
}

/// `gml:boundedBy` can only be tested for null.
pub fn check_invalid_operand(filter: &Filter) -> Result<(), ValidationError> {
    let mut result = Ok(());
    filter.for_each_predicate(&mut |predicate| {
        if let Filter::Comparison(comparison) = predicate {
            if result.is_ok() && comparison.property() == "gml:boundedBy" && !comparison.is_null_test() {
                result = Err(ValidationError::InvalidOperand(comparison.property().to_string()));
            }
        }
    });
    result
}

/// Every compared property must be a visible item of the layer.
pub fn check_invalid_property(filter: &Filter, layer: &dyn Layer, namespaces: &str) -> Result<(), ValidationError> {
    let visible = layer.visible_items(namespaces);
    let mut result = Ok(());
    filter.for_each_predicate(&mut |predicate| {
        let Filter::Comparison(comparison) = predicate else { return };
        if result.is_err() || (comparison.is_null_test() && is_gml_default_property(comparison.property())) {
            return;
        }
        let known = visible.iter().any(|item| !item.is_empty() && item.eq_ignore_ascii_case(comparison.property()));
        if !known {
            result = Err(ValidationError::UnknownProperty(comparison.property().to_string()));
        }
    });
    result
}

/// Rewrites `PropertyIsNull` into an equality with [`NULL_LITERAL`] on data
/// sources that translate that literal into a NULL test.
pub fn process_property_is_null(filter: &mut Filter, layer: &dyn Layer) {
    let translates_null = match layer.connection_type() {
        ConnectionType::PostGis => true,
        ConnectionType::Ogr => layer.supports_is_null(),
        _ => false,
    };
    if !translates_null {
        return;
    }
    filter.for_each_predicate_mut(&mut |predicate| {
        if let Filter::Comparison(Comparison::IsNull { property }) = predicate {
            if !is_gml_default_property(property) {
                *predicate = Filter::Comparison(Comparison::Binary {
                    operator: BinaryOperator::EqualTo,
                    property: std::mem::take(property),
                    literal: Literal { value: Some(NULL_LITERAL.to_string()), case_insensitive: false },
                });
            }
        }
    });
}

/// Outcome of [`simplify`].
#[derive(Debug, Clone, PartialEq)]
pub enum Simplified {
    Filter(Filter),
    /// The whole filter evaluates to this constant
    Constant(bool),
}

/// Folds null tests, which have a known outcome for every property, and
/// propagates the constants through the logical operators.
///
/// Only the GML default properties other than `@gml:id` and `gml:boundedBy`
/// are ever null.
pub fn simplify(filter: Filter) -> Simplified {
    match filter {
        Filter::Comparison(Comparison::IsNull { property }) => Simplified::Constant(
            is_gml_default_property(&property) && property != "@gml:id" && property != "gml:boundedBy",
        ),
        Filter::Comparison(Comparison::IsNil { .. }) => Simplified::Constant(false),
        Filter::Not(inner) => match simplify(*inner) {
            Simplified::Constant(value) => Simplified::Constant(!value),
            Simplified::Filter(inner) => Simplified::Filter(Filter::Not(Box::new(inner))),
        },
        Filter::And(left, right) => simplify_binary(*left, *right, false),
        Filter::Or(left, right) => simplify_binary(*left, *right, true),
        other => Simplified::Filter(other),
    }
}

/// `fast_exit` is the operand value deciding the whole operator: false for And, true for Or.
fn simplify_binary(left: Filter, right: Filter, fast_exit: bool) -> Simplified {
    let left = match simplify(left) {
        Simplified::Constant(value) if value == fast_exit => return Simplified::Constant(value),
        Simplified::Constant(_) => return simplify(right),
        Simplified::Filter(left) => left,
    };
    let right = match simplify(right) {
        Simplified::Constant(value) if value == fast_exit => return Simplified::Constant(value),
        Simplified::Constant(_) => return Simplified::Filter(left),
        Simplified::Filter(right) => right,
    };
    let (left, right) = (Box::new(left), Box::new(right));
    Simplified::Filter(if fast_exit { Filter::Or(left, right) } else { Filter::And(left, right) })
}

/// Swaps X and Y of every box and geometry whose reference system lists
/// northing first. Operands without `srsName` follow `default_needs_swap`.
pub fn swap_axes(filter: &mut Filter, projector: &dyn Projector, default_needs_swap: bool) {
    let needs_swap = |srs: Option<&str>| match srs {
        Some(srs) => projector.is_axis_inverted(srs),
        None => default_needs_swap,
    };
    filter.for_each_predicate_mut(&mut |predicate| match predicate {
        Filter::Spatial(Spatial::BBox(bbox)) => {
            if needs_swap(bbox.srs.as_deref()) {
                bbox.envelope = gml::swap_rect(&bbox.envelope);
            }
        }
        Filter::Spatial(Spatial::Binary { shape, srs, .. }) | Filter::Spatial(Spatial::Distance { shape, srs, .. }) => {
            if needs_swap(srs.as_deref()) {
                gml::swap_axes(&mut shape.geometry);
            }
        }
        _ => {}
    });
}
