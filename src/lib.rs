pub mod converter;
pub mod document;
pub mod error;
pub mod model;
pub mod tree;
pub mod writer;

pub use converter::{BatchConverter, BatchOutcome};
pub use document::{GridDocument, RowValues};
pub use error::ConvertError;
pub use model::{Envelope, GeoTransform, GridExtent, NODATA};
pub use writer::Rasterizer;
