use log::info;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::polygon::{count_polygons, row_has_any_polygon};
use crate::types::{AnnotationTable, GroundTruth};

/// Counts reported by the dataset filter.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterReport {
    pub total: usize,
    pub retained: usize,
    pub dropped: usize,
    /// Valid polygons across the retained rows
    pub polygons: usize,
}

impl FilterReport {
    pub fn print_summary(&self) {
        info!("Total images:   {}", self.total);
        info!("With polygons:  {}", self.retained);
        info!("Removed:        {}", self.dropped);
        info!("Polygons kept:  {}", self.polygons);
    }
}

/// Rows that survived filtering, still aligned with their image identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredDataset {
    pub image_files: Vec<String>,
    pub table: AnnotationTable,
    pub report: FilterReport,
}

/// Indices of the rows holding at least one valid polygon, in row order.
pub fn retained_rows(table: &AnnotationTable) -> Vec<usize> {
    let rows: Vec<_> = table.rows().collect();
    rows.par_iter()
        .enumerate()
        .filter(|(_, row)| row_has_any_polygon(row))
        .map(|(index, _)| index)
        .collect()
}

/// Drop the images whose row has no valid polygon in any class.
///
/// The filter is stable: retained rows keep their original order and stay
/// aligned with `image_files`.
pub fn filter_dataset(image_files: &[String], table: &AnnotationTable) -> Result<FilteredDataset> {
    if image_files.len() != table.num_rows() {
        return Err(Error::ImageCountMismatch {
            images: image_files.len(),
            rows: table.num_rows(),
        });
    }

    let keep = retained_rows(table);
    let filtered_table = table.select_rows(&keep);
    let polygons = filtered_table
        .rows()
        .flat_map(|row| row.iter())
        .map(count_polygons)
        .sum();

    let report = FilterReport {
        total: table.num_rows(),
        retained: keep.len(),
        dropped: table.num_rows() - keep.len(),
        polygons,
    };

    Ok(FilteredDataset {
        image_files: keep.iter().map(|&i| image_files[i].clone()).collect(),
        table: filtered_table,
        report,
    })
}

/// Filter a loaded ground truth, keeping its class catalog.
pub fn filter_ground_truth(ground_truth: &GroundTruth) -> Result<(GroundTruth, FilterReport)> {
    let filtered = filter_dataset(ground_truth.image_files(), ground_truth.table())?;
    let report = filtered.report;
    let ground_truth = ground_truth.with_rows(filtered.image_files, filtered.table)?;
    Ok((ground_truth, report))
}
