use chrono::{Datelike, Duration, NaiveDate};

/// Format written into the workbook cells and embedded in the output file name.
pub const CELL_DATE_FORMAT: &str = "%m.%d.%Y";

/// Format used in the email subject, body and chat message.
pub const MESSAGE_DATE_FORMAT: &str = "%d.%m.%Y";

/// The Monday-to-Sunday span a timesheet is filed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReportingWeek {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportingWeek {
    /// Week containing `date`: the Monday on or before it, plus six days.
    pub fn containing(date: NaiveDate) -> Self {
        let offset = i64::from(date.weekday().num_days_from_monday());
        let start = date - Duration::days(offset);
        Self {
            start,
            end: start + Duration::days(6),
        }
    }

    /// (start, end) as `MM.DD.YYYY` strings, in cell order.
    pub fn cell_values(&self) -> (String, String) {
        (
            self.start.format(CELL_DATE_FORMAT).to_string(),
            self.end.format(CELL_DATE_FORMAT).to_string(),
        )
    }

    pub fn output_file_name(&self, prefix: &str, suffix: &str) -> String {
        format!(
            "{}{}{}",
            prefix,
            self.start.format(CELL_DATE_FORMAT),
            suffix
        )
    }

    /// `DD.MM.YYYY-DD.MM.YYYY`, or with `separator` between the two dates.
    pub fn message_span(&self, separator: &str) -> String {
        format!(
            "{}{}{}",
            self.start.format(MESSAGE_DATE_FORMAT),
            separator,
            self.end.format(MESSAGE_DATE_FORMAT)
        )
    }
}

pub fn parse_cell_date(value: &str) -> chrono::ParseResult<NaiveDate> {
    NaiveDate::parse_from_str(value, CELL_DATE_FORMAT)
}
