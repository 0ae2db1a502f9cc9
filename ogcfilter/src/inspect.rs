//! Read-only queries over filter trees.

use crate::ast::*;
use crate::units::Units;
use geo_types::Rect;

/// Counts the operators named `name` (case-insensitive) anywhere in the tree.
pub fn count_operator(filter: &Filter, name: &str) -> usize {
    let own = usize::from(filter.operator_name().eq_ignore_ascii_case(name));
    own + match filter {
        Filter::And(left, right) | Filter::Or(left, right) => count_operator(left, name) + count_operator(right, name),
        Filter::Not(inner) => count_operator(inner, name),
        _ => 0,
    }
}

/// True when the tree holds no BBOX, or a single BBOX reachable through `And` nodes only.
pub fn valid_for_bbox(filter: &Filter) -> bool {
    match count_operator(filter, "BBOX") {
        0 => true,
        1 => match filter {
            Filter::Spatial(Spatial::BBox(_)) => true,
            Filter::And(left, right) => valid_for_bbox(left) && valid_for_bbox(right),
            _ => false,
        },
        _ => false,
    }
}

/// Attribute predicates plus at most one BBOX, with no other spatial operator.
pub fn is_simple(filter: &Filter) -> bool {
    const GEOMETRIC: [&str; 11] =
        ["DWithin", "Intersect", "Intersects", "Equals", "Disjoint", "Touches", "Crosses", "Within", "Contains", "Overlaps", "Beyond"];
    valid_for_bbox(filter) && GEOMETRIC.iter().all(|name| count_operator(filter, name) == 0)
}

/// The BBOX reachable from the root through `And` nodes, if it is the only one on that path.
pub fn top_bbox(filter: &Filter) -> Option<&BBox> {
    fn walk<'a>(filter: &'a Filter, found: &mut Option<&'a BBox>, count: &mut usize) -> bool {
        match filter {
            Filter::Spatial(Spatial::BBox(bbox)) => {
                *count += 1;
                if *count == 1 {
                    *found = Some(bbox);
                    true
                } else {
                    *found = None;
                    false
                }
            }
            Filter::And(left, right) => walk(left, found, count) && walk(right, found, count),
            _ => true,
        }
    }

    let mut found = None;
    let mut count = 0;
    walk(filter, &mut found, &mut count);
    found
}

/// Rectangle and `srsName` of the first BBOX in document order that names its
/// coordinate system. When none does, the last BBOX visited is returned without one.
///
/// This looks through `Or` and `Not`, so the rectangle is not a bound on the
/// filter's matches; use [`top_bbox`] for that.
pub fn first_bbox(filter: &Filter) -> Option<(Rect<f64>, Option<&str>)> {
    fn walk<'a>(filter: &'a Filter, last: &mut Option<&'a BBox>) -> Option<&'a BBox> {
        match filter {
            Filter::Spatial(Spatial::BBox(bbox)) => {
                *last = Some(bbox);
                bbox.srs.is_some().then_some(bbox)
            }
            Filter::And(left, right) | Filter::Or(left, right) => walk(left, last).or_else(|| walk(right, last)),
            Filter::Not(inner) => walk(inner, last),
            _ => None,
        }
    }

    let mut last = None;
    walk(filter, &mut last).or(last).map(|bbox| (bbox.envelope, bbox.srs.as_deref()))
}

/// Time field and period of the first `During` in document order.
pub fn first_during(filter: &Filter) -> Option<(&str, &TimePeriod)> {
    match filter {
        Filter::Temporal(Temporal::During { property, period }) => Some((property, period)),
        Filter::And(left, right) | Filter::Or(left, right) => first_during(left).or_else(|| first_during(right)),
        Filter::Not(inner) => first_during(inner),
        _ => None,
    }
}

pub fn has_spatial(filter: &Filter) -> bool {
    match filter {
        Filter::And(left, right) | Filter::Or(left, right) => has_spatial(left) || has_spatial(right),
        Filter::Not(inner) => has_spatial(inner),
        Filter::Spatial(_) => true,
        _ => false,
    }
}

/// Geometry operand of a spatial predicate with its buffer distance.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialOperand<'a> {
    pub shape: &'a Shape,
    pub distance: Option<f64>,
    /// Unit of `distance`; `None` when absent or not recognised
    pub units: Option<Units>,
}

pub fn shape_and_distance(filter: &Filter) -> Option<SpatialOperand<'_>> {
    match filter {
        Filter::Spatial(Spatial::Binary { shape, .. }) => Some(SpatialOperand { shape, distance: None, units: None }),
        Filter::Spatial(Spatial::Distance { shape, distance, .. }) => Some(SpatialOperand {
            shape,
            distance: Some(distance.magnitude()),
            units: distance.unit_name().and_then(Units::from_distance_unit),
        }),
        _ => None,
    }
}
