//! `Filter_Capabilities` section of service capabilities documents.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use tracing::error;

const OGC_NAMESPACE: &str = "http://www.opengis.net/ogc";
const GML_NAMESPACE: &str = "http://www.opengis.net/gml";

const GEOMETRY_OPERANDS: [&str; 4] = ["gml:Point", "gml:LineString", "gml:Polygon", "gml:Envelope"];

#[cfg(feature = "geos")]
const SPATIAL_OPERATORS: &[&str] =
    &["Equals", "Disjoint", "Touches", "Within", "Overlaps", "Crosses", "Intersects", "Contains", "DWithin", "Beyond", "BBOX"];
#[cfg(not(feature = "geos"))]
const SPATIAL_OPERATORS: &[&str] = &["BBOX"];

const COMPARISON_OPERATORS: [&str; 8] =
    ["LessThan", "GreaterThan", "LessThanEqualTo", "GreaterThanEqualTo", "EqualTo", "NotEqualTo", "Like", "Between"];

/// Writes the operators this crate evaluates as an indented `ogc:Filter_Capabilities` element.
///
/// `temporal` adds the `Temporal_Capabilities` block, which only some protocol
/// versions advertise.
pub fn filter_capabilities(temporal: bool) -> String {
    let mut doc = CapabilitiesWriter::new();

    let mut root = BytesStart::new("ogc:Filter_Capabilities");
    root.push_attribute(("xmlns:ogc", OGC_NAMESPACE));
    root.push_attribute(("xmlns:gml", GML_NAMESPACE));
    doc.write(Event::Start(root));

    doc.open("ogc:Spatial_Capabilities");
    doc.open("ogc:GeometryOperands");
    for operand in GEOMETRY_OPERANDS {
        doc.text_element("ogc:GeometryOperand", operand);
    }
    doc.close("ogc:GeometryOperands");
    doc.open("ogc:SpatialOperators");
    for operator in SPATIAL_OPERATORS {
        doc.named_element("ogc:SpatialOperator", operator);
    }
    doc.close("ogc:SpatialOperators");
    doc.close("ogc:Spatial_Capabilities");

    if temporal {
        doc.open("ogc:Temporal_Capabilities");
        doc.open("ogc:TemporalOperands");
        doc.text_element("ogc:TemporalOperand", "gml:TimePeriod");
        doc.text_element("ogc:TemporalOperand", "gml:TimeInstant");
        doc.close("ogc:TemporalOperands");
        doc.open("ogc:TemporalOperators");
        doc.named_element("ogc:TemporalOperator", "TM_Equals");
        doc.close("ogc:TemporalOperators");
        doc.close("ogc:Temporal_Capabilities");
    }

    doc.open("ogc:Scalar_Capabilities");
    doc.write(Event::Empty(BytesStart::new("ogc:LogicalOperators")));
    doc.open("ogc:ComparisonOperators");
    for operator in COMPARISON_OPERATORS {
        doc.text_element("ogc:ComparisonOperator", operator);
    }
    doc.close("ogc:ComparisonOperators");
    doc.close("ogc:Scalar_Capabilities");

    doc.open("ogc:Id_Capabilities");
    doc.write(Event::Empty(BytesStart::new("ogc:EID")));
    doc.write(Event::Empty(BytesStart::new("ogc:FID")));
    doc.close("ogc:Id_Capabilities");

    doc.close("ogc:Filter_Capabilities");
    doc.finish()
}

struct CapabilitiesWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl CapabilitiesWriter {
    fn new() -> Self { CapabilitiesWriter { writer: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2) } }

    fn write(&mut self, event: Event) {
        // the sink is an in-memory buffer
        if let Err(e) = self.writer.write_event(event) {
            error!("filter_capabilities(): {e}");
        }
    }

    fn open(&mut self, name: &str) { self.write(Event::Start(BytesStart::new(name))) }

    fn close(&mut self, name: &str) { self.write(Event::End(BytesEnd::new(name))) }

    fn text_element(&mut self, name: &str, text: &str) {
        self.open(name);
        self.write(Event::Text(BytesText::new(text)));
        self.close(name);
    }

    fn named_element(&mut self, name: &str, value: &str) {
        let mut element = BytesStart::new(name);
        element.push_attribute(("name", value));
        self.write(Event::Empty(element));
    }

    fn finish(self) -> String { String::from_utf8_lossy(&self.writer.into_inner().into_inner()).into_owned() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;
    use anyhow::Result;

    #[test]
    fn test_capabilities_sections() -> Result<()> {
        let text = filter_capabilities(true);
        assert!(text.starts_with(r#"<ogc:Filter_Capabilities xmlns:ogc="http://www.opengis.net/ogc""#));
        assert!(text.contains(r#"<ogc:SpatialOperator name="BBOX"/>"#));
        assert!(text.contains("<ogc:TemporalOperand>gml:TimeInstant</ogc:TemporalOperand>"));
        assert!(text.contains("<ogc:EID/>"));

        let roots = parse_document(&text)?;
        let root = &roots[0];
        assert!(root.is("Filter_Capabilities"));
        let sections: Vec<&str> = root.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(sections, vec!["Spatial_Capabilities", "Temporal_Capabilities", "Scalar_Capabilities", "Id_Capabilities"]);

        let operands: Vec<&str> = root
            .search("GeometryOperands")
            .map(|e| e.elements().filter_map(|o| o.value()).collect())
            .unwrap_or_default();
        assert_eq!(operands, GEOMETRY_OPERANDS);

        let comparisons = root.search("ComparisonOperators").map(|e| e.elements().count());
        assert_eq!(comparisons, Some(8));
        Ok(())
    }

    #[test]
    fn test_capabilities_without_temporal() -> Result<()> {
        let text = filter_capabilities(false);
        assert!(!text.contains("Temporal_Capabilities"));
        let roots = parse_document(&text)?;
        let operators: Vec<&str> = roots[0]
            .search("SpatialOperators")
            .map(|e| e.elements().filter_map(|o| o.attribute("name")).collect())
            .unwrap_or_default();
        assert_eq!(operators.last(), Some(&"BBOX"));
        assert_eq!(operators.len(), if cfg!(feature = "geos") { 11 } else { 1 });
        Ok(())
    }
}
