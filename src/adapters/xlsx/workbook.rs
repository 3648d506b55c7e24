use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use error_stack::{report, Report, ResultExt};
use quick_xml::events::Event;
use quick_xml::Reader;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::error::WorkbookError;
use super::sheet_patch::{patch_sheet, Edits};
use crate::domain::CellPosition;

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";

type Archive = ZipArchive<Cursor<Vec<u8>>>;

/// An xlsx package opened for editing cells of its active sheet.
pub struct Workbook {
    source: PathBuf,
    archive: Archive,
    active_sheet: String,
    edits: Edits,
}

impl std::fmt::Debug for Workbook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workbook")
            .field("source", &self.source)
            .field("active_sheet", &self.active_sheet)
            .field("edits", &self.edits)
            .finish()
    }
}

impl Workbook {
    #[tracing::instrument(name = "Workbook::open")]
    pub fn open(path: &Path) -> error_stack::Result<Self, WorkbookError> {
        let bytes = std::fs::read(path)
            .change_context(WorkbookError::Read)
            .attach_printable_lazy(|| format!("path: {}", path.display()))?;

        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .change_context(WorkbookError::NotAZip)
            .attach_printable_lazy(|| format!("path: {}", path.display()))?;

        if archive.by_name(CONTENT_TYPES_PART).is_err() {
            return Err(missing_part(CONTENT_TYPES_PART));
        }

        let workbook_xml = read_part(&mut archive, WORKBOOK_PART)?;
        let (active_tab, sheet_ids) = parse_workbook(&workbook_xml)?;
        let rels_xml = read_part(&mut archive, WORKBOOK_RELS_PART)?;
        let sheet_paths = parse_worksheet_rels(&rels_xml)?;

        let sheet_id = sheet_ids
            .get(active_tab)
            .ok_or_else(|| {
                report!(WorkbookError::ActiveTabOutOfRange {
                    tab: active_tab,
                    sheets: sheet_ids.len(),
                })
            })?;
        let active_sheet = sheet_paths
            .get(sheet_id)
            .cloned()
            .ok_or_else(|| {
                report!(WorkbookError::UnresolvedRelationship {
                    id: sheet_id.clone()
                })
            })?;

        if archive.by_name(&active_sheet).is_err() {
            return Err(missing_part(&active_sheet));
        }

        tracing::trace!("Active sheet is {} ({})", active_tab, active_sheet);
        Ok(Self {
            source: path.to_path_buf(),
            archive,
            active_sheet,
            edits: Edits::new(),
        })
    }

    /// Part path of the sheet that edits apply to, e.g. `xl/worksheets/sheet1.xml`.
    pub fn active_sheet(&self) -> &str {
        &self.active_sheet
    }

    pub fn set_cell(&mut self, position: CellPosition, value: impl Into<String>) {
        self.edits.insert(position, value.into());
    }

    /// Writes a copy of the package to `destination` with the edited sheet
    /// recompressed and every other entry copied as-is.
    #[tracing::instrument(name = "Workbook::save_as", skip(self), fields(source = %self.source.display()))]
    pub fn save_as(mut self, destination: &Path) -> error_stack::Result<(), WorkbookError> {
        let sheet_xml = read_part(&mut self.archive, &self.active_sheet)?;
        let patched = patch_sheet(&sheet_xml, &self.edits).map_err(|err| {
            report!(err).change_context(WorkbookError::MalformedXml {
                part: self.active_sheet.clone(),
            })
        })?;

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for index in 0..self.archive.len() {
            let entry = self
                .archive
                .by_index_raw(index)
                .change_context(WorkbookError::NotAZip)?;

            if entry.name() == self.active_sheet {
                drop(entry);
                writer
                    .start_file(self.active_sheet.as_str(), options)
                    .change_context(WorkbookError::Write)?;
                writer
                    .write_all(&patched)
                    .change_context(WorkbookError::Write)?;
            } else {
                writer
                    .raw_copy_file(entry)
                    .change_context(WorkbookError::Write)?;
            }
        }

        let bytes = writer
            .finish()
            .change_context(WorkbookError::Write)?
            .into_inner();
        std::fs::write(destination, bytes)
            .change_context(WorkbookError::Write)
            .attach_printable_lazy(|| format!("destination: {}", destination.display()))?;

        tracing::trace!(
            "Wrote {} cell(s) to {}",
            self.edits.len(),
            destination.display()
        );
        Ok(())
    }
}

fn missing_part(part: &str) -> Report<WorkbookError> {
    report!(WorkbookError::MissingPart {
        part: part.to_owned()
    })
}

fn read_part(archive: &mut Archive, part: &str) -> error_stack::Result<Vec<u8>, WorkbookError> {
    let mut file = archive.by_name(part).map_err(|_| missing_part(part))?;
    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .change_context(WorkbookError::Read)
        .attach_printable_lazy(|| format!("part: {}", part))?;
    Ok(content)
}

fn malformed(part: &str) -> impl Fn(quick_xml::Error) -> Report<WorkbookError> + '_ {
    move |err| {
        report!(err).change_context(WorkbookError::MalformedXml {
            part: part.to_owned(),
        })
    }
}

/// Returns the active tab index (first `workbookView`, default 0) and the
/// relationship id of every sheet in tab order.
fn parse_workbook(xml: &[u8]) -> error_stack::Result<(usize, Vec<String>), WorkbookError> {
    let mut reader = Reader::from_reader(xml);
    let mut active_tab = None;
    let mut sheet_ids = Vec::new();

    loop {
        match reader.read_event().map_err(malformed(WORKBOOK_PART))? {
            Event::Empty(e) | Event::Start(e) => match e.local_name().as_ref() {
                b"workbookView" if active_tab.is_none() => {
                    let tab = e
                        .attributes()
                        .flatten()
                        .find(|attr| attr.key.as_ref() == b"activeTab")
                        .and_then(|attr| attr.unescape_value().ok()?.parse::<usize>().ok());
                    active_tab = Some(tab.unwrap_or(0));
                }
                b"sheet" => {
                    // `r:id`, whatever the relationships prefix is bound to.
                    let r_id = e
                        .attributes()
                        .flatten()
                        .find(|attr| {
                            attr.key.prefix().is_some() && attr.key.local_name().as_ref() == b"id"
                        })
                        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()));
                    if let Some(r_id) = r_id {
                        sheet_ids.push(r_id);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok((active_tab.unwrap_or(0), sheet_ids))
}

/// Maps worksheet relationship ids to part paths inside the package.
fn parse_worksheet_rels(
    xml: &[u8],
) -> error_stack::Result<HashMap<String, String>, WorkbookError> {
    let mut reader = Reader::from_reader(xml);
    let mut rels = HashMap::new();

    loop {
        match reader.read_event().map_err(malformed(WORKBOOK_RELS_PART))? {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut target = None;
                let mut rel_type = None;

                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value().ok().map(|v| v.into_owned());
                    match attr.key.as_ref() {
                        b"Id" => id = value,
                        b"Target" => target = value,
                        b"Type" => rel_type = value,
                        _ => {}
                    }
                }

                if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                    if rel_type.ends_with("/worksheet") {
                        rels.insert(id, resolve_target(&target));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(rels)
}

/// Targets are relative to `xl/` unless absolute within the package.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_owned(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}
