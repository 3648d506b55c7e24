pub mod messages;
pub mod scheduler;
pub mod service;
pub mod timesheet_routine;
