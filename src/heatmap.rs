use crate::error::{Error, Result};
use crate::offset_index::OffsetIndex;
use serde::Serialize;

pub const DEFAULT_ROWS: usize = 50;
/// One row per millisecond is as fine as the grid gets.
pub const MAX_ROWS: usize = 1000;
// 128 MiB of counters
const MAX_CELLS: usize = 16 * 1024 * 1024;

// rows are labelled in milliseconds
const ROW_SCALE: f64 = 1000.0;

/// Sample density: one column per second of the trace, one row per
/// `1 / rows` slice of a second.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Heatmap {
    #[serde(rename = "rows")]
    pub row_boundaries: Vec<f64>,
    pub columns: Vec<u64>,
    /// Indexed as `grid[column][row]`.
    #[serde(rename = "values")]
    pub grid: Vec<Vec<u64>>,
    #[serde(rename = "maxvalue")]
    pub max_value: u64,
}

pub fn compute(index: &OffsetIndex, rows: usize) -> Result<Heatmap> {
    if rows == 0 || rows > MAX_ROWS {
        return Err(Error::InvalidRows);
    }
    let bounds = index.bounds()?;
    let first_second = bounds.start.floor();
    // A trace that starts and ends on the same whole second still gets a column.
    let col_count = ((bounds.end.ceil() - first_second) as usize).max(1);
    match col_count.checked_mul(rows) {
        Some(cells) if cells <= MAX_CELLS => {}
        _ => return Err(Error::InvalidRows),
    }

    let row_boundaries = (0..rows)
        .map(|i| ROW_SCALE * i as f64 / rows as f64)
        .collect();
    let columns = (0..col_count as u64).collect();
    let mut grid = vec![vec![0u64; rows]; col_count];
    let mut max_value = 0;

    for &ts in index.offsets() {
        let col = bucket(ts - first_second, col_count);
        let row = bucket(rows as f64 * ts.fract(), rows);
        let cell = &mut grid[col][row];
        *cell += 1;
        max_value = max_value.max(*cell);
    }

    Ok(Heatmap {
        row_boundaries,
        columns,
        grid,
        max_value,
    })
}

/// Floors `position` and clamps it into `0..count`, so a timestamp landing
/// exactly on the far edge goes to the last bucket.
fn bucket(position: f64, count: usize) -> usize {
    (position.floor().max(0.0) as usize).min(count - 1)
}
