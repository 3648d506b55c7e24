use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkbookError {
    #[error("failed to read the workbook file")]
    Read,
    #[error("file is not an xlsx (zip) container")]
    NotAZip,
    #[error("workbook is missing the part {part}")]
    MissingPart { part: String },
    #[error("active sheet index {tab} is out of range ({sheets} sheets)")]
    ActiveTabOutOfRange { tab: usize, sheets: usize },
    #[error("sheet relationship {id} does not resolve to a worksheet part")]
    UnresolvedRelationship { id: String },
    #[error("malformed XML in {part}")]
    MalformedXml { part: String },
    #[error("failed to write the edited workbook")]
    Write,
}
