pub mod cell_position;
pub mod token_cache;
pub mod week;

pub use cell_position::CellPosition;
pub use week::ReportingWeek;
