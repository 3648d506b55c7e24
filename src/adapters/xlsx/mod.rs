pub mod error;
pub mod sheet_patch;
pub mod workbook;

use std::path::Path;

pub use error::WorkbookError;
pub use workbook::Workbook;

use crate::config::workbook_config::WorkbookConfig;
use crate::domain::ReportingWeek;

/// Copies `source` to `destination` with the week's first and last day
/// written into the configured cells of the active sheet.
pub fn write_week(
    source: &Path,
    destination: &Path,
    config: &WorkbookConfig,
    week: &ReportingWeek,
) -> error_stack::Result<(), WorkbookError> {
    let (start, end) = week.cell_values();
    let mut workbook = Workbook::open(source)?;
    tracing::trace!(
        "Setting {}={} and {}={} in {}",
        config.start_cell,
        start,
        config.end_cell,
        end,
        workbook.active_sheet()
    );
    workbook.set_cell(config.start_cell, start);
    workbook.set_cell(config.end_cell, end);
    workbook.save_as(destination)
}
