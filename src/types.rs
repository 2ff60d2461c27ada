use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use crate::error::{Error, Result};

// Supported image formats
pub const IMG_FORMATS: &[&str] = &[
    "bmp", "dng", "jpeg", "jpg", "mpo", "png", "tif", "tiff", "webp", "pfm",
];

// Precomputed HashSet of image extensions for fast lookup
pub static IMAGE_EXTENSIONS_SET: OnceLock<HashSet<String>> = OnceLock::new();

/// Get the image extensions set
pub fn get_image_extensions_set() -> &'static HashSet<String> {
    IMAGE_EXTENSIONS_SET.get_or_init(|| IMG_FORMATS.iter().map(|ext| ext.to_lowercase()).collect())
}

/// A dense numeric array as exported by the labeling tool.
///
/// The shape is kept alongside the row-major values so that entries with the
/// wrong dimensionality or column count survive loading and can be rejected
/// later instead of failing the whole table.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    shape: Vec<usize>,
    values: Vec<f64>,
}

impl NumericArray {
    /// Build an array from a shape and row-major values. Returns `None` when
    /// the number of values does not match the shape.
    pub fn new(shape: Vec<usize>, values: Vec<f64>) -> Option<Self> {
        if shape.iter().product::<usize>() != values.len() {
            return None;
        }
        Some(Self { shape, values })
    }

    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            values: vec![value],
        }
    }

    pub fn vector(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            values,
        }
    }

    /// An `n x 2` array of vertices.
    pub fn from_points(points: &[(f64, f64)]) -> Self {
        Self {
            shape: vec![points.len(), 2],
            values: points.iter().flat_map(|&(x, y)| [x, y]).collect(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }
}

/// One (image, class) cell of the ground-truth table.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// No annotation for this class in this image.
    #[default]
    Empty,
    /// A single numeric entry, expected to be an `n x 2` vertex list.
    Polygon(NumericArray),
    /// Several entries for the same cell, possibly nested.
    Container(Vec<CellValue>),
}

impl CellValue {
    pub fn polygon(points: &[(f64, f64)]) -> Self {
        CellValue::Polygon(NumericArray::from_points(points))
    }

    pub fn container<I>(items: I) -> Self
    where
        I: IntoIterator<Item = CellValue>,
    {
        CellValue::Container(items.into_iter().collect())
    }
}

// Nested containers are released through a heap stack so dropping a deeply
// nested cell cannot overflow the call stack
impl Drop for CellValue {
    fn drop(&mut self) {
        let CellValue::Container(items) = self else {
            return;
        };
        let mut pending = std::mem::take(items);
        while let Some(mut item) = pending.pop() {
            if let CellValue::Container(children) = &mut item {
                pending.append(children);
            }
        }
    }
}

/// An ordered list of vertices.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    pub points: Vec<(f64, f64)>,
}

impl Polygon {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }
}

/// A polygon in normalized coordinates tagged with its class index.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledPolygon {
    pub class_id: usize,
    pub polygon: Polygon,
}

/// Label content for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub image_file: String,
    pub width: u32,
    pub height: u32,
    pub labels: Vec<LabeledPolygon>,
}

/// Ordered class names. The position of a name is its class identifier.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassCatalog {
    names: Vec<String>,
}

impl ClassCatalog {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Index -> name mapping as written to `data.yaml`.
    pub fn to_index_map(&self) -> BTreeMap<usize, String> {
        self.names.iter().cloned().enumerate().collect()
    }
}

/// Rows are images, columns are classes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnnotationTable {
    num_classes: usize,
    rows: Vec<Vec<CellValue>>,
}

impl AnnotationTable {
    /// Build a table, checking that every row holds exactly `num_classes` cells.
    pub fn new(rows: Vec<Vec<CellValue>>, num_classes: usize) -> Result<Self> {
        if let Some((row, cells)) = rows
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != num_classes)
        {
            return Err(Error::RowWidthMismatch {
                row,
                expected: num_classes,
                found: cells.len(),
            });
        }
        Ok(Self { num_classes, rows })
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn row(&self, index: usize) -> Option<&[CellValue]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[CellValue]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Copy out the given rows in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            num_classes: self.num_classes,
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    pub fn into_rows(self) -> Vec<Vec<CellValue>> {
        self.rows
    }
}

/// The ground-truth export: image identifiers, class catalog and the
/// row-aligned annotation table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroundTruth {
    image_files: Vec<String>,
    catalog: ClassCatalog,
    table: AnnotationTable,
}

impl GroundTruth {
    /// Assemble and validate a ground-truth table.
    ///
    /// The class count comes from the first row, or from the catalog when the
    /// table has no rows.
    pub fn new(
        image_files: Vec<String>,
        label_names: Vec<String>,
        label_polys: Vec<Vec<CellValue>>,
    ) -> Result<Self> {
        let num_classes = label_polys
            .first()
            .map_or(label_names.len(), |row| row.len());
        let table = AnnotationTable::new(label_polys, num_classes)?;

        if label_names.len() != num_classes {
            return Err(Error::CatalogLengthMismatch {
                names: label_names.len(),
                classes: num_classes,
            });
        }
        if image_files.len() != table.num_rows() {
            return Err(Error::ImageCountMismatch {
                images: image_files.len(),
                rows: table.num_rows(),
            });
        }

        Ok(Self {
            image_files,
            catalog: ClassCatalog::new(label_names),
            table,
        })
    }

    pub fn from_file(file: GroundTruthFile) -> Result<Self> {
        Self::new(file.image_files, file.label_names, file.label_polys)
    }

    pub fn to_file(&self) -> GroundTruthFile {
        GroundTruthFile {
            image_files: self.image_files.clone(),
            label_names: self.catalog.names().to_vec(),
            label_polys: self.table.rows().map(<[CellValue]>::to_vec).collect(),
        }
    }

    /// Replace the rows with a subset while keeping the catalog.
    pub fn with_rows(&self, image_files: Vec<String>, table: AnnotationTable) -> Result<Self> {
        if image_files.len() != table.num_rows() {
            return Err(Error::ImageCountMismatch {
                images: image_files.len(),
                rows: table.num_rows(),
            });
        }
        Ok(Self {
            image_files,
            catalog: self.catalog.clone(),
            table,
        })
    }

    pub fn image_files(&self) -> &[String] {
        &self.image_files
    }

    pub fn catalog(&self) -> &ClassCatalog {
        &self.catalog
    }

    pub fn table(&self) -> &AnnotationTable {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.image_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_files.is_empty()
    }
}

// The on-disk layout of a ground-truth export
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroundTruthFile {
    pub image_files: Vec<String>,
    pub label_names: Vec<String>,
    pub label_polys: Vec<Vec<CellValue>>,
}

// The data.yaml sidecar written next to a YOLO dataset
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DatasetYaml {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub train: String,
    pub val: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    pub names: BTreeMap<usize, String>,
}

// The subset of a third-party data.yaml needed for remapping
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalDataYaml {
    pub names: DataYamlNames,
    pub train: Option<String>,
    pub val: Option<String>,
    pub test: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DataYamlNames {
    Sequence(Vec<String>),
    Mapping(BTreeMap<usize, String>),
}

impl DataYamlNames {
    /// Names in class-index order. Mappings are ordered by their integer keys.
    pub fn into_names(self) -> Vec<String> {
        match self {
            DataYamlNames::Sequence(names) => names,
            DataYamlNames::Mapping(mapping) => mapping.into_values().collect(),
        }
    }
}

// Struct to hold label-writing statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub total_images: usize,
    pub labels_written: usize,
    pub empty_labels: usize,
    pub polygons_written: usize,
    pub skipped_missing_image: usize,
    pub skipped_bad_dimensions: usize,
    pub dropped_empty: usize,
    pub superseded: usize,
    pub failed_writes: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Combine counters gathered on different worker threads.
    pub fn merge(mut self, other: Self) -> Self {
        self.total_images += other.total_images;
        self.labels_written += other.labels_written;
        self.empty_labels += other.empty_labels;
        self.polygons_written += other.polygons_written;
        self.skipped_missing_image += other.skipped_missing_image;
        self.skipped_bad_dimensions += other.skipped_bad_dimensions;
        self.dropped_empty += other.dropped_empty;
        self.superseded += other.superseded;
        self.failed_writes += other.failed_writes;
        self
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped_missing_image + self.skipped_bad_dimensions
    }

    pub fn print_summary(&self) {
        log::info!("=== Processing Summary ===");
        log::info!("Total images: {}", self.total_images);
        log::info!("Labels written: {}", self.labels_written);
        log::info!("Empty labels: {}", self.empty_labels);
        log::info!("Polygons written: {}", self.polygons_written);
        log::info!("Dropped (no polygons): {}", self.dropped_empty);
        log::info!("Superseded (same label file): {}", self.superseded);
        log::info!("Failed writes: {}", self.failed_writes);

        if self.total_skipped() > 0 {
            log::warn!(
                "Total skipped images: {} (missing image file: {}, unreadable dimensions: {})",
                self.total_skipped(),
                self.skipped_missing_image,
                self.skipped_bad_dimensions
            );
        }
    }
}
