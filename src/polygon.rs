//! Polygon validation and cell flattening
//!
//! Every "is there a usable polygon here" question in the crate goes through
//! [`for_each_valid_entry`], so filtering and label writing agree on what a
//! valid polygon is.

use std::ops::ControlFlow;

use crate::types::{CellValue, NumericArray, Polygon};

/// Minimum number of vertices for a usable polygon.
pub const MIN_POLYGON_POINTS: usize = 3;

/// True if the entry is an `n x 2` array with at least three rows.
pub fn is_valid_polygon(array: &NumericArray) -> bool {
    matches!(array.shape(), &[rows, 2] if rows >= MIN_POLYGON_POINTS)
}

/// Convert a numeric entry into a polygon, or `None` if it is not usable.
pub fn validate_polygon(array: &NumericArray) -> Option<Polygon> {
    if !is_valid_polygon(array) {
        return None;
    }
    Some(Polygon::new(
        array
            .values()
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .collect(),
    ))
}

/// Visit the valid polygon entries of a cell in depth-first, left-to-right
/// order, stopping early when `visit` breaks.
///
/// Nesting depth is unbounded; traversal uses an explicit stack.
pub fn for_each_valid_entry<'a, B, F>(cell: &'a CellValue, mut visit: F) -> ControlFlow<B>
where
    F: FnMut(&'a NumericArray) -> ControlFlow<B>,
{
    let mut stack = vec![std::slice::from_ref(cell).iter()];
    while let Some(top) = stack.last_mut() {
        match top.next() {
            None => {
                stack.pop();
            }
            Some(CellValue::Empty) => {}
            Some(CellValue::Container(items)) => stack.push(items.iter()),
            Some(CellValue::Polygon(array)) => {
                if is_valid_polygon(array) {
                    if let ControlFlow::Break(value) = visit(array) {
                        return ControlFlow::Break(value);
                    }
                }
            }
        }
    }
    ControlFlow::Continue(())
}

/// Flatten a cell into its valid polygons, preserving traversal order.
pub fn flatten_cell(cell: &CellValue) -> Vec<Polygon> {
    let mut polygons = Vec::new();
    let _ = for_each_valid_entry(cell, |array| {
        polygons.extend(validate_polygon(array));
        ControlFlow::<()>::Continue(())
    });
    polygons
}

/// Number of valid polygons in a cell.
pub fn count_polygons(cell: &CellValue) -> usize {
    let mut count = 0;
    let _ = for_each_valid_entry(cell, |_| {
        count += 1;
        ControlFlow::<()>::Continue(())
    });
    count
}

/// True if the cell holds at least one valid polygon.
pub fn cell_has_polygon(cell: &CellValue) -> bool {
    for_each_valid_entry(cell, |_| ControlFlow::Break(())).is_break()
}

/// True if any class in the row has at least one valid polygon.
///
/// Stops at the first match.
pub fn row_has_any_polygon(row: &[CellValue]) -> bool {
    row.iter().any(cell_has_polygon)
}
