use serde::{Deserialize, Serialize};

/// Distance units of layers and `DWithin`/`Beyond` operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Units {
    Inches,
    Feet,
    Miles,
    Meters,
    Kilometers,
    DecimalDegrees,
    Pixels,
    NauticalMiles,
}

impl Units {
    pub fn inches_per_unit(&self) -> f64 {
        match self {
            Units::Inches => 1.0,
            Units::Feet => 12.0,
            Units::Miles => 63360.0,
            Units::Meters => 39.3701,
            Units::Kilometers => 39370.1,
            Units::DecimalDegrees => 4374754.0,
            Units::Pixels => 1.0,
            Units::NauticalMiles => 72913.3858,
        }
    }

    /// Parses the unit names accepted in a `Distance` element (case-insensitive).
    pub fn from_distance_unit(name: &str) -> Option<Units> {
        let units = match name.to_ascii_lowercase().as_str() {
            "m" | "meters" => Units::Meters,
            "km" | "kilometers" => Units::Kilometers,
            "nm" | "nauticalmiles" => Units::NauticalMiles,
            "mi" | "miles" => Units::Miles,
            "in" | "inches" => Units::Inches,
            "ft" | "feet" => Units::Feet,
            "deg" | "dd" => Units::DecimalDegrees,
            "px" => Units::Pixels,
            _ => return None,
        };
        Some(units)
    }

    /// Converts `distance` expressed in `self` into `target` units.
    pub fn convert(&self, distance: f64, target: Units) -> f64 {
        if *self == target {
            distance
        } else {
            distance * self.inches_per_unit() / target.inches_per_unit()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_names() {
        assert_eq!(Units::from_distance_unit("NM"), Some(Units::NauticalMiles));
        assert_eq!(Units::from_distance_unit("Meters"), Some(Units::Meters));
        assert_eq!(Units::from_distance_unit("furlong"), None);
    }

    #[test]
    fn test_convert() {
        assert_eq!(Units::Kilometers.convert(2.0, Units::Meters), 2.0 * 39370.1 / 39.3701);
        assert_eq!(Units::Feet.convert(3.0, Units::Feet), 3.0);
        assert_eq!(Units::Feet.convert(24.0, Units::Inches), 288.0);
    }
}
