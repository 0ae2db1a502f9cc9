mod common;

use anyhow::{anyhow, Result};
use common::MapLayer;
use geo_types::{coord, Rect};
use ogcfilter::layer::LayerFilter;
use ogcfilter::{apply_filter_to_layer, inspect, parse, prepare, ConnectionType, Filter, FilterConfig, MapContext, Simplified};

const BOX: &str = r#"<Filter><BBOX><PropertyName>Geometry</PropertyName><gml:Box srsName="EPSG:4326"><gml:coordinates>2,40 4,42</gml:coordinates></gml:Box></BBOX></Filter>"#;

fn world() -> MapContext { MapContext::new(Rect::new(coord! { x: -180.0, y: -90.0 }, coord! { x: 180.0, y: 90.0 })) }

fn prepared(xml: &str, layer: &MapLayer) -> Result<Filter> {
    match prepare(parse(xml)?, layer, &FilterConfig::default())? {
        Simplified::Filter(filter) => Ok(filter),
        Simplified::Constant(value) => Err(anyhow!("filter folded to {value}")),
    }
}

#[test]
fn bbox_only_filter_becomes_rect_query() -> Result<()> {
    let mut layer = MapLayer::new("cities", ConnectionType::Local);
    let filter = prepared(BOX, &layer)?;
    assert!(inspect::valid_for_bbox(&filter));

    let mut map = world().with_projection("EPSG:4326");
    map.query.max_features = Some(10);
    map.query.filter = Some("stale".to_string());
    apply_filter_to_layer(&filter, &mut map, &mut layer, 3, &FilterConfig::default())?;

    let (query, rect_only) = layer.last_query().ok_or_else(|| anyhow!("no query issued"))?;
    assert!(*rect_only);
    assert_eq!(query.rect, Some(Rect::new(coord! { x: 2.0, y: 40.0 }, coord! { x: 4.0, y: 42.0 })));
    assert_eq!(query.layer, Some(3));
    assert_eq!(query.filter, None);
    assert_eq!(query.max_features, Some(10));
    Ok(())
}

#[test]
fn reprojected_bbox_keeps_expression() -> Result<()> {
    let mut layer = MapLayer::new("cities", ConnectionType::Local);
    let filter = prepared(BOX, &layer)?;

    let mut map = world().with_projection("EPSG:3857");
    apply_filter_to_layer(&filter, &mut map, &mut layer, 0, &FilterConfig::default())?;

    let (query, rect_only) = layer.last_query().ok_or_else(|| anyhow!("no query issued"))?;
    assert!(!*rect_only);
    assert_eq!(query.rect, Some(Rect::new(coord! { x: 20.0, y: 400.0 }, coord! { x: 40.0, y: 420.0 })));
    assert_eq!(
        query.filter.as_deref(),
        Some("intersects([shape],fromText('POLYGON ((2 40, 2 42, 4 42, 4 40, 2 40))')) = TRUE")
    );
    Ok(())
}

#[test]
fn urn_envelope_is_swapped_to_easting_first() -> Result<()> {
    let xml = r#"<Filter><BBOX><gml:Envelope srsName="urn:ogc:def:crs:EPSG::4326"><gml:lowerCorner>40 2</gml:lowerCorner><gml:upperCorner>42 4</gml:upperCorner></gml:Envelope></BBOX></Filter>"#;
    let mut layer = MapLayer::new("cities", ConnectionType::Local);
    let filter = prepared(xml, &layer)?;

    let mut map = world().with_projection("EPSG:4326");
    apply_filter_to_layer(&filter, &mut map, &mut layer, 0, &FilterConfig::default())?;
    let (query, rect_only) = layer.last_query().ok_or_else(|| anyhow!("no query issued"))?;
    assert!(*rect_only);
    assert_eq!(query.rect, Some(Rect::new(coord! { x: 2.0, y: 40.0 }, coord! { x: 4.0, y: 42.0 })));
    Ok(())
}

#[test]
fn bbox_and_attribute_filter() -> Result<()> {
    let xml = r#"<Filter><And><BBOX><PropertyName>Geometry</PropertyName><gml:Box><gml:coordinates>0,0 10,10</gml:coordinates></gml:Box></BBOX><PropertyIsGreaterThan><PropertyName>POP</PropertyName><Literal>100</Literal></PropertyIsGreaterThan></And></Filter>"#;
    let mut layer = MapLayer::new("cities", ConnectionType::Local);
    let filter = prepared(xml, &layer)?;
    assert!(inspect::valid_for_bbox(&filter));
    assert!(inspect::is_simple(&filter));

    let mut map = world();
    apply_filter_to_layer(&filter, &mut map, &mut layer, 1, &FilterConfig::default())?;
    let (query, rect_only) = layer.last_query().ok_or_else(|| anyhow!("no query issued"))?;
    assert!(!*rect_only);
    assert_eq!(query.rect, Some(Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 10.0 })));
    assert_eq!(
        query.filter.as_deref(),
        Some("(intersects([shape],fromText('POLYGON ((0 0, 0 10, 10 10, 10 0, 0 0))')) = TRUE AND ([POP] > 100))")
    );
    Ok(())
}

#[test]
fn two_bboxes_are_not_a_rect_query() -> Result<()> {
    let xml = r#"<Filter><Or><BBOX><gml:Box><gml:coordinates>0,0 1,1</gml:coordinates></gml:Box></BBOX><BBOX><gml:Box><gml:coordinates>5,5 6,6</gml:coordinates></gml:Box></BBOX></Or></Filter>"#;
    let filter = parse(xml)?;
    assert!(!inspect::valid_for_bbox(&filter));
    assert_eq!(inspect::count_operator(&filter, "bbox"), 2);
    assert!(inspect::top_bbox(&filter).is_none());
    Ok(())
}

#[test]
fn rect_is_taken_from_the_bbox_every_match_satisfies() -> Result<()> {
    let xml = r#"<Filter><And><Or><BBOX><gml:Box><gml:coordinates>0,0 1,1</gml:coordinates></gml:Box></BBOX><PropertyIsEqualTo><PropertyName>NAME</PropertyName><Literal>x</Literal></PropertyIsEqualTo></Or><BBOX><gml:Box><gml:coordinates>10,10 20,20</gml:coordinates></gml:Box></BBOX></And></Filter>"#;
    let mut layer = MapLayer::new("cities", ConnectionType::Local);
    let filter = prepared(xml, &layer)?;
    assert!(!inspect::valid_for_bbox(&filter));

    let mut map = world();
    apply_filter_to_layer(&filter, &mut map, &mut layer, 0, &FilterConfig::default())?;
    let (query, rect_only) = layer.last_query().ok_or_else(|| anyhow!("no query issued"))?;
    assert!(!*rect_only);
    assert_eq!(query.rect, Some(Rect::new(coord! { x: 10.0, y: 10.0 }, coord! { x: 20.0, y: 20.0 })));
    Ok(())
}

#[test]
fn native_filter_is_merged_into_layer_filter() -> Result<()> {
    let xml = r#"<Filter><And><BBOX><gml:Box><gml:coordinates>0,0 10,10</gml:coordinates></gml:Box></BBOX><PropertyIsEqualTo><PropertyName>NAME</PropertyName><Literal>x</Literal></PropertyIsEqualTo></And></Filter>"#;
    let mut layer = MapLayer::new("roads", ConnectionType::PostGis).native(Some("pop > 0"));
    let filter = prepared(xml, &layer)?;

    let mut map = world();
    apply_filter_to_layer(&filter, &mut map, &mut layer, 0, &FilterConfig::default())?;
    assert_eq!(layer.filter, LayerFilter::Expression(r#"( ("NAME"= 'x')  AND (pop > 0))"#.to_string()));

    let (query, rect_only) = layer.last_query().ok_or_else(|| anyhow!("no query issued"))?;
    assert!(*rect_only);
    assert_eq!(query.rect, Some(Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 10.0 })));
    Ok(())
}

#[test]
fn opted_out_extent_uses_unbounded_rect() -> Result<()> {
    let xml = "<Filter><PropertyIsEqualTo><PropertyName>TYPE</PropertyName><Literal>3</Literal></PropertyIsEqualTo></Filter>";
    let mut layer = MapLayer::new("roads", ConnectionType::Ogr).meta("wfs_use_default_extent_for_getfeature", "no");
    let filter = prepared(xml, &layer)?;

    let mut map = world();
    apply_filter_to_layer(&filter, &mut map, &mut layer, 0, &FilterConfig::default())?;
    let (query, _) = layer.last_query().ok_or_else(|| anyhow!("no query issued"))?;
    assert_eq!(query.rect, Some(ogcfilter::apply::invalid_rect()));
    assert_eq!(query.filter.as_deref(), Some("([TYPE] = 3)"));
    Ok(())
}
