//! GML operands embedded in spatial predicates: boxes, envelopes and geometries,
//! plus the WKT text handed to geometry functions.

use crate::ast::ShapeKind;
use crate::xml::Element;
use geo_types::{coord, Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, Rect, Triangle};

/// Reads an FE 1.0 `gml:Box`, returning the rectangle and its `srsName`.
pub fn parse_box(element: &Element) -> Option<(Rect<f64>, Option<String>)> {
    let srs = element.attribute("srsName").map(str::to_string);

    let rect = match element.child("coordinates") {
        Some(coordinates) if coordinates.value().is_some() => {
            let text = coordinates.value()?;
            let ts = separator(coordinates.attribute("ts"), ' ');
            let cs = separator(coordinates.attribute("cs"), ',');
            let tuples: Vec<&str> = text.split(ts).collect();
            if tuples.len() != 2 {
                return None;
            }
            let first = corner(tuples[0], cs)?;
            let second = corner(tuples[1], cs)?;
            Rect::new(first, second)
        }
        _ => {
            let mut coords = element.children_named("coord");
            let first = coord_element(coords.next()?)?;
            let second = coord_element(coords.next()?)?;
            Rect::new(first, second)
        }
    };
    Some((rect, srs))
}

/// Reads an FE 1.1 `gml:Envelope` from its lower and upper corners.
pub fn parse_envelope(element: &Element) -> Option<(Rect<f64>, Option<String>)> {
    let srs = element.attribute("srsName").map(str::to_string);
    let lower = position(element.search("lowerCorner")?.value()?)?;
    let upper = position(element.search("upperCorner")?.value()?)?;
    Some((Rect::new(lower, upper), srs))
}

fn separator(attribute: Option<&str>, default: char) -> char { attribute.and_then(|value| value.chars().next()).unwrap_or(default) }

fn corner(tuple: &str, cs: char) -> Option<Coord<f64>> {
    let parts: Vec<&str> = tuple.split(cs).collect();
    if parts.len() != 2 {
        return None;
    }
    Some(coord! { x: number(parts[0])?, y: number(parts[1])? })
}

fn position(text: &str) -> Option<Coord<f64>> {
    let parts: Vec<&str> = text.split(' ').collect();
    if parts.len() < 2 {
        return None;
    }
    Some(coord! { x: number(parts[0])?, y: number(parts[1])? })
}

fn coord_element(element: &Element) -> Option<Coord<f64>> {
    Some(coord! { x: number(element.path_value("X")?)?, y: number(element.path_value("Y")?)? })
}

fn number(text: &str) -> Option<f64> { text.trim().parse().ok() }

/// Locates the geometry operand of a spatial predicate, checking the
/// element names in a fixed order.
pub fn find_geometry(parent: &Element) -> Option<(&Element, ShapeKind)> {
    const ORDER: [(&str, ShapeKind); 13] = [
        ("Point", ShapeKind::Point),
        ("PointType", ShapeKind::Point),
        ("Polygon", ShapeKind::Polygon),
        ("MultiPolygon", ShapeKind::Polygon),
        ("Surface", ShapeKind::Polygon),
        ("MultiSurface", ShapeKind::Polygon),
        ("Box", ShapeKind::Polygon),
        ("Envelope", ShapeKind::Polygon),
        ("LineString", ShapeKind::Line),
        ("MultiLineString", ShapeKind::Line),
        ("Curve", ShapeKind::Line),
        ("MultiCurve", ShapeKind::Line),
        ("MultiPoint", ShapeKind::Point),
    ];
    ORDER.iter().find_map(|(name, kind)| parent.child(name).map(|element| (element, *kind)))
}

/// Converts a GML 2/3 geometry element, returning the geometry and its `srsName`.
pub fn parse_geometry(element: &Element) -> Option<(Geometry<f64>, Option<String>)> {
    let srs = element.attribute("srsName").or_else(|| nested_srs(element)).map(str::to_string);
    Some((geometry(element)?, srs))
}

fn nested_srs(element: &Element) -> Option<&str> { element.elements().find_map(|e| e.attribute("srsName").or_else(|| nested_srs(e))) }

fn geometry(element: &Element) -> Option<Geometry<f64>> {
    let name = element.name.to_ascii_lowercase();
    let geometry = match name.as_str() {
        "point" | "pointtype" => Geometry::Point(Point(*coordinates(element)?.first()?)),
        "linestring" | "linearring" => Geometry::LineString(line(element)?),
        "curve" => Geometry::LineString(curve(element)?),
        "polygon" | "polygonpatch" => Geometry::Polygon(polygon(element)?),
        "surface" => {
            let mut polygons = surface(element)?;
            if polygons.len() == 1 {
                Geometry::Polygon(polygons.remove(0))
            } else {
                Geometry::MultiPolygon(MultiPolygon(polygons))
            }
        }
        "box" => Geometry::Polygon(rect_polygon(&parse_box(element)?.0)),
        "envelope" => Geometry::Polygon(rect_polygon(&parse_envelope(element)?.0)),
        "multipoint" => {
            let mut points = Vec::new();
            for member in members(element)? {
                match member {
                    Geometry::Point(point) => points.push(point),
                    Geometry::MultiPoint(multi) => points.extend(multi.0),
                    _ => return None,
                }
            }
            Geometry::MultiPoint(MultiPoint(points))
        }
        "multilinestring" | "multicurve" => {
            let mut lines = Vec::new();
            for member in members(element)? {
                match member {
                    Geometry::LineString(line) => lines.push(line),
                    Geometry::MultiLineString(multi) => lines.extend(multi.0),
                    _ => return None,
                }
            }
            Geometry::MultiLineString(MultiLineString(lines))
        }
        "multipolygon" | "multisurface" => {
            let mut polygons = Vec::new();
            for member in members(element)? {
                match member {
                    Geometry::Polygon(polygon) => polygons.push(polygon),
                    Geometry::MultiPolygon(multi) => polygons.extend(multi.0),
                    _ => return None,
                }
            }
            Geometry::MultiPolygon(MultiPolygon(polygons))
        }
        _ => return None,
    };
    Some(geometry)
}

/// Geometries held by the `*Member`/`*Members` children of a collection.
fn members(element: &Element) -> Option<Vec<Geometry<f64>>> {
    let mut geometries = Vec::new();
    for member in element.elements().filter(|e| {
        let name = e.name.to_ascii_lowercase();
        name.ends_with("member") || name.ends_with("members")
    }) {
        for child in member.elements() {
            geometries.push(geometry(child)?);
        }
    }
    if geometries.is_empty() {
        None
    } else {
        Some(geometries)
    }
}

fn line(element: &Element) -> Option<LineString<f64>> {
    let coords = coordinates(element)?;
    if coords.len() < 2 {
        return None;
    }
    Some(LineString(coords))
}

fn curve(element: &Element) -> Option<LineString<f64>> {
    let mut coords = Vec::new();
    for segment in element.child("segments")?.elements() {
        coords.extend(coordinates(segment)?);
    }
    if coords.len() < 2 {
        return None;
    }
    Some(LineString(coords))
}

fn ring(boundary: &Element) -> Option<LineString<f64>> {
    let ring = boundary.child("LinearRing").or_else(|| boundary.child("Ring"))?;
    match ring.child("curveMember") {
        Some(member) => member.elements().next().and_then(|curve_element| geometry(curve_element)).and_then(|g| match g {
            Geometry::LineString(line) => Some(line),
            _ => None,
        }),
        None => line(ring),
    }
}

fn polygon(element: &Element) -> Option<Polygon<f64>> {
    let exterior = element.child("outerBoundaryIs").or_else(|| element.child("exterior"))?;
    let mut interiors = Vec::new();
    for boundary in element.elements().filter(|e| e.is("innerBoundaryIs") || e.is("interior")) {
        interiors.push(ring(boundary)?);
    }
    Some(Polygon::new(ring(exterior)?, interiors))
}

fn surface(element: &Element) -> Option<Vec<Polygon<f64>>> {
    let patches = element.child("patches").or_else(|| element.child("polygonPatches"))?;
    let polygons = patches.elements().map(polygon).collect::<Option<Vec<_>>>()?;
    if polygons.is_empty() {
        None
    } else {
        Some(polygons)
    }
}

/// Coordinates of a point, line or ring in any of the GML 2/3 encodings.
fn coordinates(element: &Element) -> Option<Vec<Coord<f64>>> {
    if let Some(coordinates) = element.child("coordinates") {
        let text = coordinates.value()?;
        let cs = separator(coordinates.attribute("cs"), ',');
        let tuples: Vec<&str> = match coordinates.attribute("ts").and_then(|ts| ts.chars().next()) {
            Some(ts) if !ts.is_whitespace() => text.split(ts).map(str::trim).filter(|t| !t.is_empty()).collect(),
            _ => text.split_whitespace().collect(),
        };
        return tuples
            .into_iter()
            .map(|tuple| {
                let mut parts = tuple.split(cs);
                Some(coord! { x: number(parts.next()?)?, y: number(parts.next()?)? })
            })
            .collect();
    }

    if let Some(pos_list) = element.child("posList") {
        let dimension = srs_dimension(pos_list).or_else(|| srs_dimension(element)).unwrap_or(2);
        let values = pos_list.value()?.split_whitespace().map(number).collect::<Option<Vec<f64>>>()?;
        if dimension < 2 || values.len() % dimension != 0 {
            return None;
        }
        return Some(values.chunks(dimension).map(|chunk| coord! { x: chunk[0], y: chunk[1] }).collect());
    }

    let positions: Vec<&Element> = element.children_named("pos").collect();
    if !positions.is_empty() {
        return positions
            .into_iter()
            .map(|pos| {
                let mut values = pos.value()?.split_whitespace();
                Some(coord! { x: number(values.next()?)?, y: number(values.next()?)? })
            })
            .collect();
    }

    let coords: Vec<&Element> = element.children_named("coord").collect();
    if !coords.is_empty() {
        return coords.into_iter().map(coord_element).collect();
    }
    None
}

fn srs_dimension(element: &Element) -> Option<usize> { element.attribute("srsDimension").and_then(|value| value.parse().ok()) }

/// The closed ring of a rectangle, walking minx/miny, minx/maxy, maxx/maxy, maxx/miny.
pub fn rect_polygon(rect: &Rect<f64>) -> Polygon<f64> {
    let (min, max) = (rect.min(), rect.max());
    Polygon::new(
        LineString(vec![
            coord! { x: min.x, y: min.y },
            coord! { x: min.x, y: max.y },
            coord! { x: max.x, y: max.y },
            coord! { x: max.x, y: min.y },
            coord! { x: min.x, y: min.y },
        ]),
        vec![],
    )
}

pub fn swap_rect(rect: &Rect<f64>) -> Rect<f64> {
    let (min, max) = (rect.min(), rect.max());
    Rect::new(coord! { x: min.y, y: min.x }, coord! { x: max.y, y: max.x })
}

fn swap_coord(c: &mut Coord<f64>) { std::mem::swap(&mut c.x, &mut c.y) }

fn swap_line(line: &mut LineString<f64>) { line.coords_mut().for_each(swap_coord) }

fn swap_polygon(polygon: &mut Polygon<f64>) {
    polygon.exterior_mut(swap_line);
    polygon.interiors_mut(|rings| rings.iter_mut().for_each(swap_line));
}

/// Exchanges X and Y of every coordinate.
pub fn swap_axes(geometry: &mut Geometry<f64>) {
    match geometry {
        Geometry::Point(point) => swap_coord(&mut point.0),
        Geometry::Line(line) => {
            swap_coord(&mut line.start);
            swap_coord(&mut line.end);
        }
        Geometry::LineString(line) => swap_line(line),
        Geometry::Polygon(polygon) => swap_polygon(polygon),
        Geometry::MultiPoint(points) => points.0.iter_mut().for_each(|point| swap_coord(&mut point.0)),
        Geometry::MultiLineString(lines) => lines.0.iter_mut().for_each(swap_line),
        Geometry::MultiPolygon(polygons) => polygons.0.iter_mut().for_each(swap_polygon),
        Geometry::GeometryCollection(collection) => collection.0.iter_mut().for_each(swap_axes),
        Geometry::Rect(rect) => *rect = swap_rect(rect),
        Geometry::Triangle(triangle) => {
            let [mut v1, mut v2, mut v3] = [triangle.v1(), triangle.v2(), triangle.v3()];
            [&mut v1, &mut v2, &mut v3].into_iter().for_each(swap_coord);
            *triangle = Triangle::new(v1, v2, v3);
        }
    }
}

/// Serialises a geometry as WKT, e.g. `POLYGON ((0 0, 0 1, 1 1, 1 0, 0 0))`.
pub fn to_wkt(geometry: &Geometry<f64>) -> String {
    let mut buffer = String::new();
    write_wkt(geometry, &mut buffer);
    buffer
}

fn write_wkt(geometry: &Geometry<f64>, buffer: &mut String) {
    match geometry {
        Geometry::Point(point) => {
            buffer.push_str("POINT (");
            write_coord(&point.0, buffer);
            buffer.push(')');
        }
        Geometry::Line(line) => {
            buffer.push_str("LINESTRING ");
            write_coords([line.start, line.end].iter(), buffer);
        }
        Geometry::LineString(line) => {
            buffer.push_str("LINESTRING ");
            write_coords(line.0.iter(), buffer);
        }
        Geometry::Polygon(polygon) => {
            buffer.push_str("POLYGON ");
            write_polygon_rings(polygon, buffer);
        }
        Geometry::MultiPoint(points) => {
            buffer.push_str("MULTIPOINT (");
            for (i, point) in points.0.iter().enumerate() {
                if i > 0 {
                    buffer.push_str(", ");
                }
                buffer.push('(');
                write_coord(&point.0, buffer);
                buffer.push(')');
            }
            buffer.push(')');
        }
        Geometry::MultiLineString(lines) => {
            buffer.push_str("MULTILINESTRING (");
            for (i, line) in lines.0.iter().enumerate() {
                if i > 0 {
                    buffer.push_str(", ");
                }
                write_coords(line.0.iter(), buffer);
            }
            buffer.push(')');
        }
        Geometry::MultiPolygon(polygons) => {
            buffer.push_str("MULTIPOLYGON (");
            for (i, polygon) in polygons.0.iter().enumerate() {
                if i > 0 {
                    buffer.push_str(", ");
                }
                write_polygon_rings(polygon, buffer);
            }
            buffer.push(')');
        }
        Geometry::GeometryCollection(collection) => {
            buffer.push_str("GEOMETRYCOLLECTION (");
            for (i, member) in collection.0.iter().enumerate() {
                if i > 0 {
                    buffer.push_str(", ");
                }
                write_wkt(member, buffer);
            }
            buffer.push(')');
        }
        Geometry::Rect(rect) => write_wkt(&Geometry::Polygon(rect_polygon(rect)), buffer),
        Geometry::Triangle(triangle) => write_wkt(&Geometry::Polygon(triangle.to_polygon()), buffer),
    }
}

fn write_polygon_rings(polygon: &Polygon<f64>, buffer: &mut String) {
    buffer.push('(');
    write_coords(polygon.exterior().0.iter(), buffer);
    for interior in polygon.interiors() {
        buffer.push_str(", ");
        write_coords(interior.0.iter(), buffer);
    }
    buffer.push(')');
}

fn write_coords<'a>(coords: impl Iterator<Item = &'a Coord<f64>>, buffer: &mut String) {
    buffer.push('(');
    for (i, c) in coords.enumerate() {
        if i > 0 {
            buffer.push_str(", ");
        }
        write_coord(c, buffer);
    }
    buffer.push(')');
}

fn write_coord(c: &Coord<f64>, buffer: &mut String) { buffer.push_str(&format!("{} {}", c.x, c.y)) }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;
    use anyhow::Result;

    fn element(text: &str) -> Result<Element> { Ok(parse_document(text)?.remove(0)) }

    #[test]
    fn test_box_coordinates() -> Result<()> {
        let gml = element(r#"<gml:Box srsName="EPSG:4326"><gml:coordinates>10,20 30,40</gml:coordinates></gml:Box>"#)?;
        let (rect, srs) = parse_box(&gml).expect("box");
        assert_eq!(rect, Rect::new(coord! { x: 10.0, y: 20.0 }, coord! { x: 30.0, y: 40.0 }));
        assert_eq!(srs.as_deref(), Some("EPSG:4326"));

        let custom = element(r#"<Box><coordinates ts=";" cs=" ">1 2;3 4</coordinates></Box>"#)?;
        assert_eq!(parse_box(&custom).expect("box").0, Rect::new(coord! { x: 1.0, y: 2.0 }, coord! { x: 3.0, y: 4.0 }));

        let coords = element("<Box><coord><X>1</X><Y>2</Y></coord><coord><X>3</X><Y>4</Y></coord></Box>")?;
        assert_eq!(parse_box(&coords).expect("box").1, None);

        for bad in ["<Box><coordinates>10,20</coordinates></Box>", "<Box><coordinates>10,20 30,40 50,60</coordinates></Box>", "<Box><coordinates>a,20 30,40</coordinates></Box>"] {
            assert!(parse_box(&element(bad)?).is_none(), "{}", bad);
        }
        Ok(())
    }

    #[test]
    fn test_envelope() -> Result<()> {
        let gml = element(r#"<Envelope srsName="urn:ogc:def:crs:EPSG::4326"><lowerCorner>42 -5</lowerCorner><upperCorner>51 8</upperCorner></Envelope>"#)?;
        let (rect, srs) = parse_envelope(&gml).expect("envelope");
        assert_eq!(rect, Rect::new(coord! { x: 42.0, y: -5.0 }, coord! { x: 51.0, y: 8.0 }));
        assert_eq!(srs.as_deref(), Some("urn:ogc:def:crs:EPSG::4326"));
        assert!(parse_envelope(&element("<Envelope><lowerCorner>42</lowerCorner><upperCorner>51 8</upperCorner></Envelope>")?).is_none());
        Ok(())
    }

    #[test]
    fn test_geometries_to_wkt() -> Result<()> {
        let cases = [
            ("<Point><coordinates>13.0983,31.5899</coordinates></Point>", "POINT (13.0983 31.5899)"),
            ("<Point><pos>1 2</pos></Point>", "POINT (1 2)"),
            ("<LineString><posList>0 0 1 1 2 0</posList></LineString>", "LINESTRING (0 0, 1 1, 2 0)"),
            (
                "<Polygon><exterior><LinearRing><posList>0 0 0 10 10 10 10 0 0 0</posList></LinearRing></exterior>\
                 <interior><LinearRing><posList>1 1 1 2 2 2 2 1 1 1</posList></LinearRing></interior></Polygon>",
                "POLYGON ((0 0, 0 10, 10 10, 10 0, 0 0), (1 1, 1 2, 2 2, 2 1, 1 1))",
            ),
            (
                "<Polygon><outerBoundaryIs><LinearRing><coordinates>0,0 0,1 1,1 0,0</coordinates></LinearRing></outerBoundaryIs></Polygon>",
                "POLYGON ((0 0, 0 1, 1 1, 0 0))",
            ),
            (
                "<MultiPoint><pointMember><Point><pos>1 2</pos></Point></pointMember><pointMember><Point><pos>3 4</pos></Point></pointMember></MultiPoint>",
                "MULTIPOINT ((1 2), (3 4))",
            ),
            (
                "<Curve><segments><LineStringSegment><posList>0 0 5 5</posList></LineStringSegment></segments></Curve>",
                "LINESTRING (0 0, 5 5)",
            ),
            (
                "<Surface><patches><PolygonPatch><exterior><LinearRing><posList>0 0 0 1 1 1 0 0</posList></LinearRing></exterior></PolygonPatch></patches></Surface>",
                "POLYGON ((0 0, 0 1, 1 1, 0 0))",
            ),
            ("<Envelope><lowerCorner>10 20</lowerCorner><upperCorner>30 40</upperCorner></Envelope>", "POLYGON ((10 20, 10 40, 30 40, 30 20, 10 20))"),
        ];
        for (gml, wkt) in cases {
            let (geometry, _) = parse_geometry(&element(gml)?).expect(gml);
            assert_eq!(to_wkt(&geometry), wkt);
        }
        Ok(())
    }

    #[test]
    fn test_find_geometry_order() -> Result<()> {
        let parent = element("<DWithin><PropertyName>geom</PropertyName><LineString/><Point/><Distance>5</Distance></DWithin>")?;
        let (found, kind) = find_geometry(&parent).expect("geometry");
        assert_eq!(found.name, "Point");
        assert_eq!(kind, ShapeKind::Point);
        let surface = element("<Within><MultiCurve/><Surface/></Within>")?;
        assert_eq!(find_geometry(&surface).map(|(_, kind)| kind), Some(ShapeKind::Polygon));
        assert!(find_geometry(&element("<Within><Distance>1</Distance></Within>")?).is_none());
        Ok(())
    }

    #[test]
    fn test_swap_axes() {
        let mut geometry = Geometry::Polygon(rect_polygon(&Rect::new(coord! { x: 1.0, y: 2.0 }, coord! { x: 3.0, y: 4.0 })));
        swap_axes(&mut geometry);
        assert_eq!(to_wkt(&geometry), "POLYGON ((2 1, 4 1, 4 3, 2 3, 2 1))");
        assert_eq!(swap_rect(&Rect::new(coord! { x: 1.0, y: 2.0 }, coord! { x: 3.0, y: 4.0 })), Rect::new(coord! { x: 2.0, y: 1.0 }, coord! { x: 4.0, y: 3.0 }));

        let mut triangle = Geometry::Triangle(Triangle::new(coord! { x: 1.0, y: 2.0 }, coord! { x: 3.0, y: 4.0 }, coord! { x: 5.0, y: 6.0 }));
        swap_axes(&mut triangle);
        assert_eq!(triangle, Geometry::Triangle(Triangle::new(coord! { x: 2.0, y: 1.0 }, coord! { x: 4.0, y: 3.0 }, coord! { x: 6.0, y: 5.0 })));
    }
}
