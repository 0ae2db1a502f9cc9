use geo_types::{Geometry, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed Filter Encoding expression.
///
/// Logical chains of more than two operands are stored right-leaning, so
/// `And(a, b, c)` becomes `And(a, And(b, c))`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
    Comparison(Comparison),
    Spatial(Spatial),
    Temporal(Temporal),
    FeatureId(FeatureIds),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Comparison {
    Binary { operator: BinaryOperator, property: String, literal: Literal },
    Between { property: String, bounds: Boundary },
    Like { property: String, pattern: String, options: LikeOptions },
    IsNull { property: String },
    IsNil { property: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    EqualTo,              // PropertyIsEqualTo
    NotEqualTo,           // PropertyIsNotEqualTo
    LessThan,             // PropertyIsLessThan
    GreaterThan,          // PropertyIsGreaterThan
    LessThanOrEqualTo,    // PropertyIsLessThanOrEqualTo
    GreaterThanOrEqualTo, // PropertyIsGreaterThanOrEqualTo
}

/// Right-hand operand of a binary comparison.
///
/// `value` is `None` for a present but empty `<Literal/>`, which still takes part
/// in the comparison as an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Literal {
    pub value: Option<String>,
    pub case_insensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundary {
    pub lower: String,
    pub upper: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeOptions {
    pub wild_card: String,
    pub single_char: String,
    pub escape_char: String,
    pub case_insensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Spatial {
    BBox(BBox),
    Binary { operator: SpatialOperator, property: String, shape: Shape, srs: Option<String> },
    Distance { operator: DistanceOperator, property: String, shape: Shape, distance: Distance, srs: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    /// Optional since FE 1.1, in which case the box applies to the default geometry.
    pub property: Option<String>,
    pub envelope: Rect<f64>,
    pub srs: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpatialOperator {
    Intersects,
    Equals,
    Disjoint,
    Touches,
    Crosses,
    Within,
    Contains,
    Overlaps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceOperator {
    DWithin,
    Beyond,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    Point,
    Line,
    Polygon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub kind: ShapeKind,
    pub geometry: Geometry<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distance {
    pub value: String,
    pub units: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Temporal {
    During { property: String, period: TimePeriod },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePeriod {
    pub begin: String,
    pub end: String,
}

/// Identifiers of a FeatureId, GmlObjectId or ResourceId selection, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureIds(pub Vec<String>);

impl Filter {
    /// Builds a feature id selection from a comma separated list.
    pub fn feature_ids(csv: &str) -> Filter { Filter::FeatureId(FeatureIds(csv.split(',').map(str::to_string).collect())) }

    /// The Filter Encoding element name this node was parsed from.
    pub fn operator_name(&self) -> &'static str {
        match self {
            Filter::And(..) => "And",
            Filter::Or(..) => "Or",
            Filter::Not(_) => "Not",
            Filter::Comparison(comparison) => comparison.operator_name(),
            Filter::Spatial(spatial) => spatial.operator_name(),
            Filter::Temporal(Temporal::During { .. }) => "During",
            Filter::FeatureId(_) => "FeatureId",
        }
    }

    /// The property the predicate is evaluated against, if it has one.
    pub fn property(&self) -> Option<&str> {
        match self {
            Filter::Comparison(comparison) => Some(comparison.property()),
            Filter::Spatial(Spatial::BBox(bbox)) => bbox.property.as_deref(),
            Filter::Spatial(Spatial::Binary { property, .. }) | Filter::Spatial(Spatial::Distance { property, .. }) => Some(property),
            Filter::Temporal(Temporal::During { property, .. }) => Some(property),
            _ => None,
        }
    }

    pub fn property_mut(&mut self) -> Option<&mut String> {
        match self {
            Filter::Comparison(comparison) => Some(comparison.property_mut()),
            Filter::Spatial(Spatial::BBox(bbox)) => bbox.property.as_mut(),
            Filter::Spatial(Spatial::Binary { property, .. }) | Filter::Spatial(Spatial::Distance { property, .. }) => Some(property),
            Filter::Temporal(Temporal::During { property, .. }) => Some(property),
            _ => None,
        }
    }

    pub fn is_logical(&self) -> bool { matches!(self, Filter::And(..) | Filter::Or(..) | Filter::Not(_)) }

    pub fn is_bbox(&self) -> bool { matches!(self, Filter::Spatial(Spatial::BBox(_))) }

    /// Applies `f` to every predicate node, descending through logical operators.
    pub fn for_each_predicate_mut<F: FnMut(&mut Filter)>(&mut self, f: &mut F) {
        match self {
            Filter::And(left, right) | Filter::Or(left, right) => {
                left.for_each_predicate_mut(f);
                right.for_each_predicate_mut(f);
            }
            Filter::Not(inner) => inner.for_each_predicate_mut(f),
            _ => f(self),
        }
    }

    pub fn for_each_predicate<'a, F: FnMut(&'a Filter)>(&'a self, f: &mut F) {
        match self {
            Filter::And(left, right) | Filter::Or(left, right) => {
                left.for_each_predicate(f);
                right.for_each_predicate(f);
            }
            Filter::Not(inner) => inner.for_each_predicate(f),
            _ => f(self),
        }
    }
}

impl Comparison {
    pub fn operator_name(&self) -> &'static str {
        match self {
            Comparison::Binary { operator, .. } => operator.element_name(),
            Comparison::Between { .. } => "PropertyIsBetween",
            Comparison::Like { .. } => "PropertyIsLike",
            Comparison::IsNull { .. } => "PropertyIsNull",
            Comparison::IsNil { .. } => "PropertyIsNil",
        }
    }

    pub fn property(&self) -> &str {
        match self {
            Comparison::Binary { property, .. }
            | Comparison::Between { property, .. }
            | Comparison::Like { property, .. }
            | Comparison::IsNull { property }
            | Comparison::IsNil { property } => property,
        }
    }

    pub fn property_mut(&mut self) -> &mut String {
        match self {
            Comparison::Binary { property, .. }
            | Comparison::Between { property, .. }
            | Comparison::Like { property, .. }
            | Comparison::IsNull { property }
            | Comparison::IsNil { property } => property,
        }
    }

    pub fn is_null_test(&self) -> bool { matches!(self, Comparison::IsNull { .. } | Comparison::IsNil { .. }) }
}

impl BinaryOperator {
    pub fn element_name(&self) -> &'static str {
        match self {
            BinaryOperator::EqualTo => "PropertyIsEqualTo",
            BinaryOperator::NotEqualTo => "PropertyIsNotEqualTo",
            BinaryOperator::LessThan => "PropertyIsLessThan",
            BinaryOperator::GreaterThan => "PropertyIsGreaterThan",
            BinaryOperator::LessThanOrEqualTo => "PropertyIsLessThanOrEqualTo",
            BinaryOperator::GreaterThanOrEqualTo => "PropertyIsGreaterThanOrEqualTo",
        }
    }

    pub fn from_element_name(name: &str) -> Option<Self> {
        [
            BinaryOperator::EqualTo,
            BinaryOperator::NotEqualTo,
            BinaryOperator::LessThan,
            BinaryOperator::GreaterThan,
            BinaryOperator::LessThanOrEqualTo,
            BinaryOperator::GreaterThanOrEqualTo,
        ]
        .into_iter()
        .find(|op| op.element_name().eq_ignore_ascii_case(name))
    }
}

impl Spatial {
    pub fn operator_name(&self) -> &'static str {
        match self {
            Spatial::BBox(_) => "BBOX",
            Spatial::Binary { operator, .. } => operator.element_name(),
            Spatial::Distance { operator: DistanceOperator::DWithin, .. } => "DWithin",
            Spatial::Distance { operator: DistanceOperator::Beyond, .. } => "Beyond",
        }
    }

    pub fn srs(&self) -> Option<&str> {
        match self {
            Spatial::BBox(bbox) => bbox.srs.as_deref(),
            Spatial::Binary { srs, .. } | Spatial::Distance { srs, .. } => srs.as_deref(),
        }
    }
}

impl SpatialOperator {
    pub fn element_name(&self) -> &'static str {
        match self {
            SpatialOperator::Intersects => "Intersects",
            SpatialOperator::Equals => "Equals",
            SpatialOperator::Disjoint => "Disjoint",
            SpatialOperator::Touches => "Touches",
            SpatialOperator::Crosses => "Crosses",
            SpatialOperator::Within => "Within",
            SpatialOperator::Contains => "Contains",
            SpatialOperator::Overlaps => "Overlaps",
        }
    }

    /// Resolves an element name, accepting the FE 1.0 `Intersect` spelling.
    pub fn from_element_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("Intersect") {
            return Some(SpatialOperator::Intersects);
        }
        [
            SpatialOperator::Intersects,
            SpatialOperator::Equals,
            SpatialOperator::Disjoint,
            SpatialOperator::Touches,
            SpatialOperator::Crosses,
            SpatialOperator::Within,
            SpatialOperator::Contains,
            SpatialOperator::Overlaps,
        ]
        .into_iter()
        .find(|op| op.element_name().eq_ignore_ascii_case(name))
    }

    /// Name of the geometry function used by the generic expression language.
    pub fn function_name(&self) -> &'static str {
        match self {
            SpatialOperator::Intersects => "intersects",
            SpatialOperator::Equals => "equals",
            SpatialOperator::Disjoint => "disjoint",
            SpatialOperator::Touches => "touches",
            SpatialOperator::Crosses => "crosses",
            SpatialOperator::Within => "within",
            SpatialOperator::Contains => "contains",
            SpatialOperator::Overlaps => "overlaps",
        }
    }
}

impl Distance {
    /// Leading numeric part of the distance text, zero when there is none.
    pub fn magnitude(&self) -> f64 { leading_float(&self.value) }

    /// Unit name with any `uri#` prefix removed.
    pub fn unit_name(&self) -> Option<&str> {
        self.units.as_deref().map(|units| match units.rfind('#') {
            Some(pos) => &units[pos + 1..],
            None => units,
        })
    }
}

/// Longest numeric prefix of `text`, like C `atof`.
pub(crate) fn leading_float(text: &str) -> f64 {
    let text = text.trim_start();
    let mut end = 0;
    let mut best = 0.0;
    for (i, c) in text.char_indices() {
        if !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')) {
            break;
        }
        end = i + c.len_utf8();
        if let Ok(value) = text[..end].parse::<f64>() {
            best = value;
        }
    }
    if end == 0 {
        0.0
    } else {
        best
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{};{}", self.lower, self.upper) }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.units {
            Some(units) => write!(f, "{};{}", self.value, units),
            None => write!(f, "{}", self.value),
        }
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}/{}", self.begin, self.end) }
}

impl fmt::Display for FeatureIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0.join(",")) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_values() {
        assert_eq!(Boundary { lower: "400".into(), upper: "800".into() }.to_string(), "400;800");
        assert_eq!(Distance { value: "10".into(), units: Some("m".into()) }.to_string(), "10;m");
        assert_eq!(Distance { value: "10".into(), units: None }.to_string(), "10");
        assert_eq!(TimePeriod { begin: "2005-05-17".into(), end: "2005-05-23".into() }.to_string(), "2005-05-17/2005-05-23");
        assert_eq!(Filter::feature_ids("A.1,A.2").operator_name(), "FeatureId");
    }

    #[test]
    fn test_distance_units() {
        let distance = Distance { value: "12.5km".into(), units: Some("http://www.opengis.net/uom#km".into()) };
        assert_eq!(distance.magnitude(), 12.5);
        assert_eq!(distance.unit_name(), Some("km"));
        assert_eq!(leading_float("abc"), 0.0);
        assert_eq!(leading_float(" -3e2x"), -300.0);
    }

    #[test]
    fn test_operator_lookup() {
        assert_eq!(SpatialOperator::from_element_name("intersect"), Some(SpatialOperator::Intersects));
        assert_eq!(BinaryOperator::from_element_name("propertyislessthan"), Some(BinaryOperator::LessThan));
        assert_eq!(BinaryOperator::from_element_name("PropertyIsLike"), None);
    }
}
