//! # ogcfilter
//!
//! Parser and translation engine for OGC Filter Encoding documents, as sent in
//! WFS, WMS (SLD) and SOS requests.
//!
//! - **Parsing**: a `<Filter>` document becomes a [`Filter`] tree of logical,
//!   comparison, spatial, temporal and feature id predicates
//! - **Inspection**: helpers that find the BBOX, the first temporal predicate
//!   or tell whether a tree is simple enough for a given data source
//! - **Rewriting**: namespace and alias resolution, validation against the
//!   layer schema, axis order handling and constant folding of null tests
//! - **Rendering**: the host's generic expression language or an SQL
//!   fragment for database backed layers
//! - **Application**: running a filter against a [`Layer`]
//!
//! ```rust
//! let filter = ogcfilter::parse(
//!     "<Filter><BBOX><PropertyName>Geometry</PropertyName>\
//!      <gml:Box><gml:coordinates>0,0 10,10</gml:coordinates></gml:Box></BBOX></Filter>",
//! )?;
//! assert!(ogcfilter::inspect::valid_for_bbox(&filter));
//! assert_eq!(ogcfilter::inspect::count_operator(&filter, "BBOX"), 1);
//! # Ok::<(), ogcfilter::ParseError>(())
//! ```

pub mod apply;
pub mod ast;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod gml;
mod grammar;
pub mod inspect;
pub mod layer;
pub mod parser;
pub mod render;
pub mod rewrite;
pub mod time;
pub mod units;
pub mod xml;

pub use apply::{apply_filter_to_layer, prepare, MapContext};
pub use ast::Filter;
pub use capabilities::filter_capabilities;
pub use config::FilterConfig;
pub use error::{ApplyError, LayerError, ParseError, RenderError, ValidationError};
pub use layer::{ConnectionType, Layer, Metadata};
pub use parser::parse;
pub use render::{common_expression, sql_expression};
pub use rewrite::Simplified;
