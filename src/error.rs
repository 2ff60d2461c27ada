use std::path::PathBuf;

/// Errors raised while loading, converting or writing a ground-truth dataset.
///
/// Structural variants abort a run. Per-image problems are absorbed by the
/// pipelines and only surface in their statistics.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid ground-truth JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("mismatch: imageFiles={images} vs labelPolys rows={rows}")]
    ImageCountMismatch { images: usize, rows: usize },

    #[error("labelPolys row {row} has {found} cells, expected {expected}")]
    RowWidthMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("mismatch: labelNames={names} vs labelPolys columns={classes}")]
    CatalogLengthMismatch { names: usize, classes: usize },

    #[error("image size must be positive, got {width}x{height}")]
    InvalidImageSize { width: u32, height: u32 },

    #[error("image {path} is too large: {width}x{height}")]
    ImageTooLarge {
        path: PathBuf,
        width: usize,
        height: usize,
    },

    #[error("failed to read image dimensions for {path}: {source}")]
    ImageDimensionRead {
        path: PathBuf,
        #[source]
        source: imagesize::ImageError,
    },

    #[error("class '{name}' not found in names of {path}")]
    UnknownClass { name: String, path: PathBuf },

    #[error("invalid class mapping: {0}")]
    InvalidClassMapping(String),
}

pub type Result<T> = std::result::Result<T, Error>;
