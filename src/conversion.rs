use std::fmt::Write;

use crate::error::{Error, Result};
use crate::polygon::flatten_cell;
use crate::types::{CellValue, ImageRecord, LabeledPolygon, Polygon};

/// Decimal places used for normalized coordinates.
pub const DEFAULT_PRECISION: usize = 6;

/// Lower clamp bound for pixel coordinates. The labeling tool uses 1-based
/// pixel indices, so valid coordinates lie in `[1, W] x [1, H]`.
pub const CLAMP_MIN: f64 = 1.0;

/// Maps pixel-space polygons of one image into YOLO segmentation lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateNormalizer {
    width: u32,
    height: u32,
    precision: usize,
}

impl CoordinateNormalizer {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidImageSize { width, height });
        }
        Ok(Self {
            width,
            height,
            precision: DEFAULT_PRECISION,
        })
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    /// Clamp a pixel coordinate to the image and scale it to the unit interval.
    pub fn normalize_point(&self, (x, y): (f64, f64)) -> (f64, f64) {
        let width = self.width as f64;
        let height = self.height as f64;
        (
            x.clamp(CLAMP_MIN, width) / width,
            y.clamp(CLAMP_MIN, height) / height,
        )
    }

    /// Normalize every vertex, keeping order and count.
    pub fn normalize(&self, polygon: &Polygon) -> Polygon {
        Polygon::new(
            polygon
                .points
                .iter()
                .map(|&point| self.normalize_point(point))
                .collect(),
        )
    }

    /// Format an already normalized polygon at this normalizer's precision.
    pub fn format_line(&self, class_id: usize, normalized: &Polygon) -> String {
        format_label_line(class_id, normalized, self.precision)
    }

    /// Normalize a pixel-space polygon and format it as one label line.
    pub fn label_line(&self, class_id: usize, polygon: &Polygon) -> String {
        self.format_line(class_id, &self.normalize(polygon))
    }
}

/// Format a normalized polygon as `class x0 y0 x1 y1 ...` with `precision` decimals.
pub fn format_label_line(class_id: usize, normalized: &Polygon, precision: usize) -> String {
    let mut line = String::with_capacity(normalized.points.len() * 2 * (precision + 3) + 4);
    line.push_str(&class_id.to_string());
    for &(x, y) in &normalized.points {
        let _ = write!(line, " {:.*} {:.*}", precision, x, precision, y);
    }
    line
}

/// Normalized polygons of one row, class-major and in polygon order within a class.
pub fn labeled_polygons(
    row: &[CellValue],
    normalizer: &CoordinateNormalizer,
) -> Vec<LabeledPolygon> {
    row.iter()
        .enumerate()
        .flat_map(|(class_id, cell)| {
            flatten_cell(cell)
                .into_iter()
                .map(move |polygon| LabeledPolygon {
                    class_id,
                    polygon: normalizer.normalize(&polygon),
                })
        })
        .collect()
}

/// Label lines for one row of the annotation table.
pub fn row_to_label_lines(row: &[CellValue], normalizer: &CoordinateNormalizer) -> Vec<String> {
    labeled_polygons(row, normalizer)
        .iter()
        .map(|labeled| normalizer.format_line(labeled.class_id, &labeled.polygon))
        .collect()
}

/// Build the label record of one image.
pub fn build_image_record(
    image_file: &str,
    row: &[CellValue],
    normalizer: &CoordinateNormalizer,
) -> ImageRecord {
    ImageRecord {
        image_file: image_file.to_string(),
        width: normalizer.width(),
        height: normalizer.height(),
        labels: labeled_polygons(row, normalizer),
    }
}

/// Render an image record as label lines.
pub fn record_to_label_lines(record: &ImageRecord, precision: usize) -> Vec<String> {
    record
        .labels
        .iter()
        .map(|labeled| format_label_line(labeled.class_id, &labeled.polygon, precision))
        .collect()
}
