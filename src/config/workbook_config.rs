use crate::domain::CellPosition;
use crate::domain::cell_position::{Column, Row};

#[derive(serde::Deserialize, Debug, Clone)]
pub struct WorkbookConfig {
    #[serde(default = "default_start_cell")]
    pub start_cell: CellPosition,
    #[serde(default = "default_end_cell")]
    pub end_cell: CellPosition,
    #[serde(default = "default_output_prefix")]
    pub output_prefix: Box<str>,
    #[serde(default = "default_output_suffix")]
    pub output_suffix: Box<str>,
}

impl Default for WorkbookConfig {
    fn default() -> Self {
        Self {
            start_cell: default_start_cell(),
            end_cell: default_end_cell(),
            output_prefix: default_output_prefix(),
            output_suffix: default_output_suffix(),
        }
    }
}

fn default_start_cell() -> CellPosition {
    CellPosition {
        col: Column::from(2),
        row: Row::from(22),
    }
}

fn default_end_cell() -> CellPosition {
    CellPosition {
        col: Column::from(13),
        row: Row::from(22),
    }
}

fn default_output_prefix() -> Box<str> {
    "w-e_".into()
}

fn default_output_suffix() -> Box<str> {
    "_Retail_Response_Timesheet.xlsx".into()
}
