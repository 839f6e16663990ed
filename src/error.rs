use thiserror::Error;

/// Failure of a single conversion unit. Every variant aborts only the
/// document it occurred in; the batch keeps going.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("malformed XML document: {0}")]
    ParseFailure(#[from] quick_xml::Error),

    #[error("element <{0}> not found")]
    StructureNotFound(&'static str),

    /// Historical documents encode the envelope corners as
    /// `gml:low`/`gml:high`. Those must be rejected explicitly rather than
    /// misread as grid indices.
    #[error("unsupported corner variant <{0}>, expected gml:lowerCorner/gml:upperCorner")]
    UnsupportedVariant(&'static str),

    #[error("malformed token {token:?} in <{element}>")]
    MalformedToken {
        element: &'static str,
        token: String,
    },

    /// Two sources in one batch would write the same `<stem>.tif`.
    #[error("output name {0}.tif collides with another source in this batch")]
    DuplicateOutput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("raster I/O error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
