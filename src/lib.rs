//! Flat polygon ground truth to YOLO segmentation converter
//!
//! This library normalizes polygon annotations exported from a labeling tool as
//! an image x class table into YOLO segmentation labels, filters out images
//! without usable polygons, and merges third-party YOLO datasets into the
//! unified class catalog.

pub mod cell_json;
pub mod config;
pub mod conversion;
pub mod dataset;
pub mod error;
pub mod io;
pub mod polygon;
pub mod remap;
pub mod types;
pub mod utils;
pub mod yolo_dataset;

// Re-export commonly used types and functions
pub use config::{ConvertArgs, FilterArgs, RemapArgs};
pub use conversion::{build_image_record, row_to_label_lines, CoordinateNormalizer};
pub use dataset::{filter_dataset, filter_ground_truth, FilterReport, FilteredDataset};
pub use error::{Error, Result};
pub use io::{load_ground_truth, save_ground_truth};
pub use polygon::{flatten_cell, row_has_any_polygon, validate_polygon};
pub use remap::process_external_dataset;
pub use types::{
    AnnotationTable, CellValue, ClassCatalog, GroundTruth, ImageRecord, LabeledPolygon,
    NumericArray, Polygon, ProcessingStats,
};
pub use yolo_dataset::process_dataset;
