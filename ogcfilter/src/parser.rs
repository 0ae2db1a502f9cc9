//! Filter Encoding 1.0/1.1/2.0 documents to [`Filter`] trees.

use crate::ast::*;
use crate::error::ParseError;
use crate::gml;
use crate::time;
use crate::xml::{self, Element};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Logical,
    Spatial,
    Comparison,
    FeatureId,
    Temporal,
}

fn family(name: &str) -> Option<Family> {
    const LOGICAL: [&str; 3] = ["And", "Or", "Not"];
    const SPATIAL: [&str; 12] =
        ["BBOX", "DWithin", "Intersect", "Intersects", "Equals", "Disjoint", "Touches", "Crosses", "Within", "Contains", "Overlaps", "Beyond"];
    const COMPARISON: [&str; 4] = ["PropertyIsLike", "PropertyIsBetween", "PropertyIsNull", "PropertyIsNil"];
    const FEATURE_ID: [&str; 3] = ["FeatureId", "GmlObjectId", "ResourceId"];

    let among = |names: &[&str]| names.iter().any(|n| n.eq_ignore_ascii_case(name));
    if among(&LOGICAL) {
        Some(Family::Logical)
    } else if among(&SPATIAL) {
        Some(Family::Spatial)
    } else if BinaryOperator::from_element_name(name).is_some() || among(&COMPARISON) {
        Some(Family::Comparison)
    } else if among(&FEATURE_ID) {
        Some(Family::FeatureId)
    } else if name.eq_ignore_ascii_case("During") {
        Some(Family::Temporal)
    } else {
        None
    }
}

/// Parses a Filter Encoding document.
///
/// The first supported operator below the root `Filter` element becomes the
/// filter; anything after it is ignored. Any malformed operator anywhere in
/// that subtree rejects the whole document.
pub fn parse(text: &str) -> Result<Filter, ParseError> {
    let result = parse_document(text);
    if let Err(e) = &result {
        debug!("rejected filter document: {}", e);
    }
    result
}

fn parse_document(text: &str) -> Result<Filter, ParseError> {
    if text.is_empty() || !text.contains("Filter") {
        return Err(ParseError::EmptyDocument);
    }
    let roots = xml::parse_document(text)?;
    let root = roots.iter().find(|e| e.name == "Filter").ok_or(ParseError::MissingFilter)?;

    let children: Vec<&Element> = root.elements().collect();
    let first = children.iter().position(|e| family(&e.name).is_some()).ok_or(ParseError::NoSupportedOperator)?;
    operator(&children[first..])
}

/// Builds the operator `elements[0]`; the rest of the slice holds its following siblings.
fn operator(elements: &[&Element]) -> Result<Filter, ParseError> {
    let element = elements[0];
    match family(&element.name) {
        Some(Family::Logical) => logical(element),
        Some(Family::Spatial) => spatial(element).map(Filter::Spatial),
        Some(Family::Comparison) => comparison(element).map(Filter::Comparison),
        Some(Family::FeatureId) => feature_ids(element, &elements[1..]),
        Some(Family::Temporal) => temporal(element).map(Filter::Temporal),
        None => Err(ParseError::invalid(&element.name, "operator")),
    }
}

fn logical(element: &Element) -> Result<Filter, ParseError> {
    let operands: Vec<&Element> = element.elements().collect();
    if element.is("Not") {
        if operands.is_empty() {
            return Err(ParseError::LogicalArity("Not", "one"));
        }
        return Ok(Filter::Not(Box::new(operator(&operands)?)));
    }

    let and = element.is("And");
    if operands.len() < 2 {
        return Err(ParseError::LogicalArity(if and { "And" } else { "Or" }, "at least two"));
    }
    let combine = |left: Filter, right: Filter| {
        if and {
            Filter::And(Box::new(left), Box::new(right))
        } else {
            Filter::Or(Box::new(left), Box::new(right))
        }
    };

    let last = operands.len() - 1;
    let mut chain = operator(&operands[last..])?;
    for i in (0..last).rev() {
        chain = combine(operator(&operands[i..])?, chain);
    }
    Ok(chain)
}

fn property_name(element: &Element) -> Option<String> {
    element.path_value("PropertyName").or_else(|| element.path_value("ValueReference")).map(str::to_string)
}

fn required_property(element: &Element) -> Result<String, ParseError> {
    property_name(element).ok_or_else(|| ParseError::missing(&element.name, "property name"))
}

fn case_insensitive(element: &Element) -> bool { element.path_value("matchCase").is_some_and(|m| m.eq_ignore_ascii_case("false")) }

fn comparison(element: &Element) -> Result<Comparison, ParseError> {
    if let Some(operator) = BinaryOperator::from_element_name(&element.name) {
        let property = required_property(element)?;
        let literal = element.search("Literal").ok_or_else(|| ParseError::missing(&element.name, "literal"))?;
        let value = literal.value().map(str::to_string);
        let case_insensitive = value.is_some() && case_insensitive(element);
        return Ok(Comparison::Binary { operator, property, literal: Literal { value, case_insensitive } });
    }

    if element.is("PropertyIsBetween") {
        let property = required_property(element)?;
        let lower = boundary(element.child("LowerBoundary")).ok_or_else(|| ParseError::missing(&element.name, "lower boundary"))?;
        let upper = boundary(element.child("UpperBoundary")).ok_or_else(|| ParseError::missing(&element.name, "upper boundary"))?;
        return Ok(Comparison::Between { property, bounds: Boundary { lower, upper } });
    }

    if element.is("PropertyIsLike") {
        let property = required_property(element)?;
        let pattern = element.path_value("Literal").ok_or_else(|| ParseError::missing(&element.name, "literal"))?.to_string();
        let attribute = |name: &str| element.path_value(name).map(str::to_string);
        let (Some(wild_card), Some(single_char), Some(escape_char)) =
            (attribute("wildCard"), attribute("singleChar"), attribute("escape").or_else(|| attribute("escapeChar")))
        else {
            return Err(ParseError::missing(&element.name, "wildCard, singleChar or escape attribute"));
        };
        let options = LikeOptions { wild_card, single_char, escape_char, case_insensitive: case_insensitive(element) };
        return Ok(Comparison::Like { property, pattern, options });
    }

    let property = required_property(element)?;
    if element.is("PropertyIsNull") {
        Ok(Comparison::IsNull { property })
    } else {
        Ok(Comparison::IsNil { property })
    }
}

/// A boundary is either wrapped in a `Literal` or given as direct text.
fn boundary(element: Option<&Element>) -> Option<String> {
    let element = element?;
    let value = match element.child("Literal") {
        Some(literal) => literal.value(),
        None => element.value(),
    };
    value.map(str::to_string)
}

fn spatial(element: &Element) -> Result<Spatial, ParseError> {
    let name = element.name.as_str();

    if element.is("BBOX") {
        let property = property_name(element);
        let parsed = match element.child("Box").or_else(|| element.child("BoxType")) {
            Some(box_element) => gml::parse_box(box_element),
            None => element.child("Envelope").and_then(gml::parse_envelope),
        };
        let (envelope, srs) = parsed.ok_or_else(|| ParseError::invalid(name, "box coordinates"))?;
        return Ok(Spatial::BBox(BBox { property, envelope, srs }));
    }

    let property = required_property(element)?;
    let (geometry_element, kind) = gml::find_geometry(element).ok_or_else(|| ParseError::missing(name, "geometry"))?;

    if element.is("DWithin") || element.is("Beyond") {
        let distance_element = element.child("Distance").ok_or_else(|| ParseError::missing(name, "distance"))?;
        let value = distance_element.value().ok_or_else(|| ParseError::missing(name, "distance"))?.to_string();
        let units = distance_element.attribute("units").or_else(|| distance_element.attribute("uom")).map(str::to_string);
        let (geometry, srs) = gml::parse_geometry(geometry_element).ok_or_else(|| ParseError::invalid(name, "geometry"))?;
        let operator = if element.is("DWithin") { DistanceOperator::DWithin } else { DistanceOperator::Beyond };
        return Ok(Spatial::Distance { operator, property, shape: Shape { kind, geometry }, distance: Distance { value, units }, srs });
    }

    let operator = SpatialOperator::from_element_name(name).ok_or_else(|| ParseError::invalid(name, "operator"))?;
    let (geometry, srs) = gml::parse_geometry(geometry_element).ok_or_else(|| ParseError::invalid(name, "geometry"))?;
    Ok(Spatial::Binary { operator, property, shape: Shape { kind, geometry }, srs })
}

fn feature_ids(element: &Element, siblings: &[&Element]) -> Result<Filter, ParseError> {
    let ids: Vec<String> = std::iter::once(element)
        .chain(siblings.iter().copied().filter(|sibling| sibling.is(&element.name)))
        .filter_map(|e| e.attribute("fid").or_else(|| e.attribute("id")).or_else(|| e.attribute("rid")))
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return Err(ParseError::missing(&element.name, "feature id"));
    }
    Ok(Filter::FeatureId(FeatureIds(ids)))
}

fn temporal(element: &Element) -> Result<Temporal, ParseError> {
    let name = element.name.as_str();
    let property = required_property(element)?;
    let begin = element
        .path_value("TimePeriod.begin.TimeInstant.timePosition")
        .or_else(|| element.path_value("TimePeriod.beginPosition"))
        .ok_or_else(|| ParseError::missing(name, "begin time"))?;
    let end = element
        .path_value("TimePeriod.end.TimeInstant.timePosition")
        .or_else(|| element.path_value("TimePeriod.endPosition"))
        .ok_or_else(|| ParseError::missing(name, "end time"))?;

    for instant in [begin, end] {
        if instant.contains(['\'', '\\']) {
            return Err(ParseError::InvalidTime(instant.to_string()));
        }
        time::resolution(instant)?;
    }
    Ok(Temporal::During { property, period: TimePeriod { begin: begin.to_string(), end: end.to_string() } })
}
