mod common;

use anyhow::{anyhow, Result};
use common::MapLayer;
use ogcfilter::xml::parse_document;
use ogcfilter::{
    common_expression, filter_capabilities, parse, prepare, sql_expression, ConnectionType, Filter, FilterConfig, ParseError, RenderError,
    Simplified, ValidationError,
};

fn prepared(xml: &str, layer: &MapLayer, config: &FilterConfig) -> Result<Filter> {
    match prepare(parse(xml)?, layer, config)? {
        Simplified::Filter(filter) => Ok(filter),
        Simplified::Constant(value) => Err(anyhow!("filter folded to {value}")),
    }
}

#[test]
fn feature_ids_keep_document_order() -> Result<()> {
    let xml = r#"<Filter><FeatureId fid="cities.3"/><FeatureId fid="cities.1"/><FeatureId fid="cities.7"/></Filter>"#;
    let config = FilterConfig::default();
    let shapes = MapLayer::new("cities", ConnectionType::Local).meta("gml_featureid", "ID");
    let filter = prepared(xml, &shapes, &config)?;
    assert_eq!(common_expression(&filter, &shapes, &config)?.as_deref(), Some("(([ID] == 3) OR ([ID] == 1) OR ([ID] == 7))"));

    let table = MapLayer::new("cities", ConnectionType::OracleSpatial).meta("wfs_featureid", "GID");
    assert_eq!(sql_expression(&filter, &table, &config)?.as_deref(), Some("((GID = 3) OR (GID = 1) OR (GID = 7))"));
    Ok(())
}

#[test]
fn feature_ids_of_another_type_are_rejected() -> Result<()> {
    let xml = r#"<Filter><GmlObjectId gml:id="roads.12"/></Filter>"#;
    let layer = MapLayer::new("cities", ConnectionType::Local);
    let error = prepare(parse(xml)?, &layer, &FilterConfig::default()).err();
    assert!(matches!(error, Some(ValidationError::FeatureIdMismatch { id, layer }) if id == "roads.12" && layer == "cities"));
    Ok(())
}

#[test]
fn null_tests_fold_to_constants() -> Result<()> {
    let layer = MapLayer::new("cities", ConnectionType::Local);
    let config = FilterConfig::default();

    let negated = "<Filter><Not><PropertyIsNull><PropertyName>POP</PropertyName></PropertyIsNull></Not></Filter>";
    assert_eq!(prepare(parse(negated)?, &layer, &config)?, Simplified::Constant(true));

    let absorbed = "<Filter><And><PropertyIsNull><PropertyName>NAME</PropertyName></PropertyIsNull><PropertyIsEqualTo><PropertyName>POP</PropertyName><Literal>1</Literal></PropertyIsEqualTo></And></Filter>";
    assert_eq!(prepare(parse(absorbed)?, &layer, &config)?, Simplified::Constant(false));

    let kept = "<Filter><And><Not><PropertyIsNull><PropertyName>NAME</PropertyName></PropertyIsNull></Not><PropertyIsEqualTo><PropertyName>POP</PropertyName><Literal>1</Literal></PropertyIsEqualTo></And></Filter>";
    let filter = prepared(kept, &layer, &config)?;
    assert_eq!(common_expression(&filter, &layer, &config)?.as_deref(), Some("([POP] = 1)"));
    Ok(())
}

#[test]
fn postgis_null_test_becomes_equality() -> Result<()> {
    let xml = "<Filter><PropertyIsNull><PropertyName>NAME</PropertyName></PropertyIsNull></Filter>";
    let layer = MapLayer::new("roads", ConnectionType::PostGis);
    let filter = prepared(xml, &layer, &FilterConfig::default())?;
    assert_eq!(
        sql_expression(&filter, &layer, &FilterConfig::default())?.as_deref(),
        Some(r#" ("NAME"= '_MAPSERVER_NULL_') "#)
    );
    Ok(())
}

#[test]
fn literals_cannot_break_out_of_sql() -> Result<()> {
    let layer = MapLayer::new("roads", ConnectionType::PostGis);
    let config = FilterConfig::default();

    let quoted = "<Filter><PropertyIsEqualTo><PropertyName>NAME</PropertyName><Literal>x') OR 1=1 --</Literal></PropertyIsEqualTo></Filter>";
    assert_eq!(sql_expression(&parse(quoted)?, &layer, &config)?.as_deref(), Some(r#" ("NAME"= 'x'') OR 1=1 --') "#));

    let like = r#"<Filter><PropertyIsLike wildCard="*" singleChar="." escapeChar="'"><PropertyName>NAME</PropertyName><Literal>a*</Literal></PropertyIsLike></Filter>"#;
    assert!(matches!(sql_expression(&parse(like)?, &layer, &config), Err(RenderError::QuoteEscapeChar)));

    let between = "<Filter><PropertyIsBetween><PropertyName>POP</PropertyName><LowerBoundary><Literal>1; DROP TABLE roads</Literal></LowerBoundary><UpperBoundary><Literal>2</Literal></UpperBoundary></PropertyIsBetween></Filter>";
    assert!(matches!(sql_expression(&parse(between)?, &layer, &config), Err(RenderError::InvalidBoundary(_))));

    let during = r#"<Filter><During><PropertyName>BUILT</PropertyName><gml:TimePeriod><gml:beginPosition>2005' OR '1</gml:beginPosition><gml:endPosition>2006</gml:endPosition></gml:TimePeriod></During></Filter>"#;
    assert!(matches!(parse(during), Err(ParseError::InvalidTime(_))));
    Ok(())
}

#[test]
fn during_per_backend() -> Result<()> {
    let xml = r#"<Filter><During><PropertyName>BUILT</PropertyName><gml:TimePeriod><gml:beginPosition>2005-01-01</gml:beginPosition><gml:endPosition>2006-01-01</gml:endPosition></gml:TimePeriod></During></Filter>"#;
    let filter = parse(xml)?;
    let config = FilterConfig::default();

    let shapes = MapLayer::new("cities", ConnectionType::Local);
    assert_eq!(
        common_expression(&filter, &shapes, &config)?.as_deref(),
        Some("((`[BUILT]` >= `2005-01-01` AND `[BUILT]` <= `2006-01-01`))")
    );
    let table = MapLayer::new("cities", ConnectionType::PostGis);
    assert_eq!(sql_expression(&filter, &table, &config)?.as_deref(), Some("((BUILT >= '2005-01-01' AND BUILT <= '2006-01-01'))"));
    let ogr = MapLayer::new("cities", ConnectionType::Ogr);
    assert!(matches!(sql_expression(&filter, &ogr, &config), Err(RenderError::UnsupportedOperator { operator: "During", .. })));
    Ok(())
}

#[test]
fn metadata_namespaces_come_from_config() -> Result<()> {
    let config = FilterConfig::from_json(r#"{ "metadata_namespaces": "F" }"#)?;
    let layer = MapLayer::new("cities", ConnectionType::Local).meta("gml_NAME_type", "Character").meta("wfs_POP_type", "Character");
    let xml = |property: &str| {
        format!("<Filter><PropertyIsEqualTo><PropertyName>{property}</PropertyName><Literal>5</Literal></PropertyIsEqualTo></Filter>")
    };
    assert_eq!(common_expression(&parse(&xml("NAME"))?, &layer, &config)?.as_deref(), Some("([NAME] = 5)"));
    assert_eq!(common_expression(&parse(&xml("POP"))?, &layer, &config)?.as_deref(), Some(r#"("[POP]" = "5")"#));
    Ok(())
}

#[test]
fn capabilities_follow_config() -> Result<()> {
    let config = FilterConfig { temporal_capabilities: false, ..Default::default() };
    let roots = parse_document(&filter_capabilities(config.temporal_capabilities))?;
    let root = roots.first().ok_or_else(|| anyhow!("empty capabilities"))?;
    assert!(root.child("Temporal_Capabilities").is_none());
    assert!(root.search("FID").is_some());
    Ok(())
}
