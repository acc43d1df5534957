//! All text scraping of external tool output lives here, so the pipeline only
//! ever sees typed values.

use std::sync::LazyLock;

use regex::Regex;

use super::{AssignedCellCount, LibraryId};

/// Marks the BAM header line describing the gene expression library.
const GEX_HEADER_MARKER: &str = "Gene Expression";
/// Metric name of the per-sample cell count in `metrics_summary.csv`.
const ASSIGNED_CELLS_METRIC: &str = "Cells assigned to this sample";

static LIBRARY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""library_id":\s*(\d+)"#).expect("valid regex"));

// values >= 1000 are quoted with thousands separators, e.g. "1,234"
static ASSIGNED_CELLS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Cells assigned to this sample,(?:"([\d,]+)"|(\d+))"#).expect("valid regex")
});

/// Find the numeric library id of the gene expression library in a BAM header
/// (the output of `samtools view -H`).
pub fn parse_gex_library_id(header: &str) -> Option<LibraryId> {
    header
        .lines()
        .filter(|line| line.contains(GEX_HEADER_MARKER))
        .find_map(|line| LIBRARY_ID.captures(line))
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .map(LibraryId)
}

/// Find the "Cells assigned to this sample" value in a per-sample `metrics_summary.csv`.
pub fn parse_assigned_cells(metrics: &str) -> Option<AssignedCellCount> {
    metrics
        .lines()
        .filter(|line| line.contains(ASSIGNED_CELLS_METRIC))
        .find_map(|line| ASSIGNED_CELLS.captures(line))
        .and_then(|caps| {
            let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
            raw.replace(',', "").parse::<u64>().ok()
        })
        .map(AssignedCellCount)
}
