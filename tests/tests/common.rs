use tracing::Level;

use geo_types::{coord, Geometry, Rect};
use ogcfilter::layer::{FilterStrategy, LayerFilter, Projector, Query};
use ogcfilter::{ConnectionType, Layer, LayerError, Metadata};

// Initialize tracing for tests
#[ctor::ctor]
fn init_tracing() { tracing_subscriber::fmt().with_max_level(Level::INFO).with_test_writer().init(); }

/// Urn style names of EPSG:4326 list latitude first; `EPSG:3857` is a tenfold scale of `EPSG:4326`.
pub struct Epsg;

impl Projector for Epsg {
    fn project_rect(&self, from: &str, to: &str, rect: &Rect<f64>) -> Result<Rect<f64>, LayerError> {
        let factor = scale(from, to)?;
        Ok(Rect::new(
            coord! { x: rect.min().x * factor, y: rect.min().y * factor },
            coord! { x: rect.max().x * factor, y: rect.max().y * factor },
        ))
    }

    fn project_geometry(&self, from: &str, to: &str, geometry: &Geometry<f64>) -> Result<Geometry<f64>, LayerError> {
        let factor = scale(from, to)?;
        match geometry {
            Geometry::Point(point) => Ok(Geometry::Point((point.x() * factor, point.y() * factor).into())),
            _ => Err(LayerError::new("only points are projected")),
        }
    }

    fn is_axis_inverted(&self, srs: &str) -> bool { srs.starts_with("urn:ogc:def:crs:EPSG::4326") }
}

fn scale(from: &str, to: &str) -> Result<f64, LayerError> {
    let code = |srs: &str| srs.rsplit(':').next().map(str::to_string);
    match (code(from).as_deref(), code(to).as_deref()) {
        (Some(a), Some(b)) if a == b => Ok(1.0),
        (Some("4326"), Some("3857")) => Ok(10.0),
        (Some("3857"), Some("4326")) => Ok(0.1),
        _ => Err(LayerError::new(format!("no transformation from {from} to {to}"))),
    }
}

/// Layer double recording every query it receives.
pub struct MapLayer {
    pub name: String,
    pub connection: ConnectionType,
    pub metadata: Metadata,
    pub items: Vec<String>,
    pub filter: LayerFilter,
    pub projection: Option<String>,
    pub strategy: FilterStrategy,
    pub processing: Vec<(String, String)>,
    pub queries: Vec<(Query, bool)>,
}

#[allow(unused)]
impl MapLayer {
    pub fn new(name: &str, connection: ConnectionType) -> Self {
        MapLayer {
            name: name.to_string(),
            connection,
            metadata: Metadata::new(),
            items: ["NAME", "POP", "TYPE", "BUILT"].iter().map(|s| s.to_string()).collect(),
            filter: LayerFilter::None,
            projection: None,
            strategy: FilterStrategy::Plain,
            processing: Vec::new(),
            queries: Vec::new(),
        }
    }

    pub fn meta(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key, value);
        self
    }

    pub fn native(mut self, native_filter: Option<&str>) -> Self {
        self.strategy = FilterStrategy::NativeSql;
        if let Some(native_filter) = native_filter {
            self.processing.push(("NATIVE_FILTER".to_string(), native_filter.to_string()));
        }
        self
    }

    /// Queries issued so far: the query block and whether it was a rectangle-only query.
    pub fn last_query(&self) -> Option<&(Query, bool)> { self.queries.last() }
}

impl Layer for MapLayer {
    fn name(&self) -> &str { &self.name }
    fn connection_type(&self) -> &ConnectionType { &self.connection }
    fn metadata(&self) -> &Metadata { &self.metadata }
    fn items(&self) -> &[String] { &self.items }
    fn filter(&self) -> &LayerFilter { &self.filter }
    fn set_filter(&mut self, filter: LayerFilter) { self.filter = filter; }
    fn projection(&self) -> Option<&str> { self.projection.as_deref() }
    fn projector(&self) -> &dyn Projector { &Epsg }
    fn filter_strategy(&self) -> FilterStrategy { self.strategy }
    fn processing(&self, key: &str) -> Option<&str> {
        self.processing.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v.as_str())
    }
    fn query_by_rect(&mut self, query: &Query) -> Result<(), LayerError> {
        self.queries.push((query.clone(), true));
        Ok(())
    }
    fn query_by_filter(&mut self, query: &Query) -> Result<(), LayerError> {
        self.queries.push((query.clone(), false));
        Ok(())
    }
}
