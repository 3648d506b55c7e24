//! Streaming rewrite of a worksheet part that overwrites a handful of cells
//! and leaves every other event untouched.

use std::collections::BTreeMap;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::domain::cell_position::{Column, Row};
use crate::domain::CellPosition;

pub type Edits = BTreeMap<CellPosition, String>;

type PendingRows = BTreeMap<Row, BTreeMap<Column, String>>;

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    #[error("worksheet has no sheetData element")]
    NoSheetData,
}

/// Element names inside `sheetData`, carrying the namespace prefix the part
/// uses (usually none).
struct Names {
    row: String,
    cell: String,
    inline: String,
    text: String,
}

impl Names {
    fn for_prefix(prefix: Option<&[u8]>) -> Self {
        let qualify = |local: &str| match prefix {
            Some(prefix) => format!("{}:{}", String::from_utf8_lossy(prefix), local),
            None => local.to_owned(),
        };
        Self {
            row: qualify("row"),
            cell: qualify("c"),
            inline: qualify("is"),
            text: qualify("t"),
        }
    }
}

struct Patcher<'a> {
    reader: Reader<&'a [u8]>,
    writer: Writer<Vec<u8>>,
    pending: PendingRows,
    names: Names,
    seen_sheet_data: bool,
    // Rows and cells may omit `r`; their position follows the previous one.
    last_row: u32,
    last_col: u32,
    current_row: Option<(Row, BTreeMap<Column, String>)>,
}

pub fn patch_sheet(xml: &[u8], edits: &Edits) -> Result<Vec<u8>, PatchError> {
    let mut pending = PendingRows::new();
    for (position, value) in edits {
        pending
            .entry(position.row)
            .or_default()
            .insert(position.col, value.clone());
    }

    Patcher {
        reader: Reader::from_reader(xml),
        writer: Writer::new(Vec::with_capacity(xml.len() + 256)),
        pending,
        names: Names::for_prefix(None),
        seen_sheet_data: false,
        last_row: 0,
        last_col: 0,
        current_row: None,
    }
    .run()
}

impl<'a> Patcher<'a> {
    fn run(mut self) -> Result<Vec<u8>, PatchError> {
        loop {
            let event = self.reader.read_event()?;
            match event {
                Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                    self.enter_sheet_data(&e);
                    self.writer.write_event(Event::Start(e))?;
                }
                Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => {
                    self.enter_sheet_data(&e);
                    let end = e.to_end().into_owned();
                    self.writer.write_event(Event::Start(e))?;
                    self.flush_rows_before(None)?;
                    self.writer.write_event(Event::End(end))?;
                }
                Event::End(e) if e.local_name().as_ref() == b"sheetData" => {
                    self.flush_rows_before(None)?;
                    self.writer.write_event(Event::End(e))?;
                }
                Event::Start(e) if e.local_name().as_ref() == b"row" => {
                    let row = self.row_number(&e);
                    self.flush_rows_before(Some(row))?;
                    let cells = self.pending.remove(&row).unwrap_or_default();
                    self.current_row = Some((row, cells));
                    self.writer.write_event(Event::Start(e))?;
                }
                Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                    let row = self.row_number(&e);
                    self.flush_rows_before(Some(row))?;
                    match self.pending.remove(&row) {
                        Some(cells) => {
                            let end = e.to_end().into_owned();
                            self.writer.write_event(Event::Start(e))?;
                            self.write_cells(row, cells)?;
                            self.writer.write_event(Event::End(end))?;
                        }
                        None => self.writer.write_event(Event::Empty(e))?,
                    }
                }
                Event::End(e) if e.local_name().as_ref() == b"row" => {
                    if let Some((row, cells)) = self.current_row.take() {
                        self.write_cells(row, cells)?;
                    }
                    self.writer.write_event(Event::End(e))?;
                }
                Event::Start(e) if e.local_name().as_ref() == b"c" => {
                    if self.take_replacement(&e)? {
                        self.reader.read_to_end(e.name())?;
                    } else {
                        self.writer.write_event(Event::Start(e))?;
                    }
                }
                Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                    if !self.take_replacement(&e)? {
                        self.writer.write_event(Event::Empty(e))?;
                    }
                }
                Event::Eof => break,
                other => self.writer.write_event(other)?,
            }
        }

        if !self.seen_sheet_data {
            return Err(PatchError::NoSheetData);
        }
        Ok(self.writer.into_inner())
    }

    fn enter_sheet_data(&mut self, element: &BytesStart) {
        self.seen_sheet_data = true;
        let name = element.name();
        self.names = Names::for_prefix(name.prefix().map(|prefix| prefix.into_inner()));
    }

    fn row_number(&mut self, element: &BytesStart) -> Row {
        let row = attribute(element, b"r")
            .and_then(|value| value.parse::<Row>().ok())
            .unwrap_or_else(|| Row::from(self.last_row + 1));
        self.last_row = row.value();
        self.last_col = 0;
        row
    }

    /// Writes the pending cells of the current row that sort before this
    /// cell. If the cell itself is a target, writes its replacement and
    /// returns true.
    fn take_replacement(&mut self, element: &BytesStart) -> Result<bool, PatchError> {
        let col = attribute(element, b"r")
            .and_then(|value| value.parse::<CellPosition>().ok())
            .map(|position| position.col)
            .unwrap_or_else(|| Column::from(self.last_col + 1));
        self.last_col = col.value();

        let Some((row, cells)) = self.current_row.as_mut() else {
            return Ok(false);
        };
        let row = *row;

        let from_here = cells.split_off(&col);
        let before = std::mem::replace(cells, from_here);
        let replacement = cells.remove(&col);

        self.write_cells(row, before)?;

        match replacement {
            Some(value) => {
                let style = attribute(element, b"s");
                self.write_cell(CellPosition { col, row }, style.as_deref(), &value)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Emits whole pending rows numbered below `limit` (all of them when
    /// `limit` is `None`).
    fn flush_rows_before(&mut self, limit: Option<Row>) -> Result<(), PatchError> {
        let rows: Vec<Row> = match limit {
            Some(limit) => self.pending.range(..limit).map(|(row, _)| *row).collect(),
            None => self.pending.keys().copied().collect(),
        };

        for row in rows {
            let Some(cells) = self.pending.remove(&row) else {
                continue;
            };
            let row_number = row.to_string();
            let start =
                BytesStart::new(self.names.row.as_str()).with_attributes([("r", row_number.as_str())]);
            self.writer.write_event(Event::Start(start))?;
            self.write_cells(row, cells)?;
            self.writer
                .write_event(Event::End(BytesEnd::new(self.names.row.as_str())))?;
        }
        Ok(())
    }

    fn write_cells(&mut self, row: Row, cells: BTreeMap<Column, String>) -> Result<(), PatchError> {
        for (col, value) in cells {
            self.write_cell(CellPosition { col, row }, None, &value)?;
        }
        Ok(())
    }

    /// `<c r=".." s=".." t="inlineStr"><is><t>value</t></is></c>`
    fn write_cell(
        &mut self,
        position: CellPosition,
        style: Option<&str>,
        value: &str,
    ) -> Result<(), PatchError> {
        let reference = position.to_string();
        let mut start = BytesStart::new(self.names.cell.as_str());
        start.push_attribute(("r", reference.as_str()));
        if let Some(style) = style {
            start.push_attribute(("s", style));
        }
        start.push_attribute(("t", "inlineStr"));

        self.writer.write_event(Event::Start(start))?;
        self.writer
            .write_event(Event::Start(BytesStart::new(self.names.inline.as_str())))?;
        self.writer
            .write_event(Event::Start(BytesStart::new(self.names.text.as_str())))?;
        self.writer.write_event(Event::Text(BytesText::new(value)))?;
        self.writer
            .write_event(Event::End(BytesEnd::new(self.names.text.as_str())))?;
        self.writer
            .write_event(Event::End(BytesEnd::new(self.names.inline.as_str())))?;
        self.writer
            .write_event(Event::End(BytesEnd::new(self.names.cell.as_str())))?;
        Ok(())
    }
}

fn attribute(element: &BytesStart, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|value| value.into_owned()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn edits(cells: &[(&str, &str)]) -> Edits {
        cells
            .iter()
            .map(|(cell, value)| (cell.parse().unwrap(), (*value).to_owned()))
            .collect()
    }

    fn patch(xml: &str, cells: &[(&str, &str)]) -> String {
        String::from_utf8(patch_sheet(xml.as_bytes(), &edits(cells)).unwrap()).unwrap()
    }

    #[test]
    fn test_existing_cells_keep_their_style() {
        let xml = r#"<worksheet><sheetData><row r="22"><c r="A22" s="1" t="s"><v>0</v></c><c r="B22" s="2"><v>45000</v></c><c r="M22" s="2" t="s"><v>3</v></c></row></sheetData></worksheet>"#;

        assert_eq!(
            patch(xml, &[("B22", "09.02.2024"), ("M22", "09.08.2024")]),
            r#"<worksheet><sheetData><row r="22"><c r="A22" s="1" t="s"><v>0</v></c><c r="B22" s="2" t="inlineStr"><is><t>09.02.2024</t></is></c><c r="M22" s="2" t="inlineStr"><is><t>09.08.2024</t></is></c></row></sheetData></worksheet>"#
        );
    }

    #[test]
    fn test_missing_cells_are_inserted_in_column_order() {
        let xml = r#"<worksheet><sheetData><row r="22" spans="1:13"><c r="A22"><v>1</v></c><c r="C22"><v>2</v></c></row></sheetData></worksheet>"#;

        assert_eq!(
            patch(xml, &[("B22", "x"), ("M22", "y")]),
            r#"<worksheet><sheetData><row r="22" spans="1:13"><c r="A22"><v>1</v></c><c r="B22" t="inlineStr"><is><t>x</t></is></c><c r="C22"><v>2</v></c><c r="M22" t="inlineStr"><is><t>y</t></is></c></row></sheetData></worksheet>"#
        );
    }

    #[test]
    fn test_missing_rows_are_inserted_in_row_order() {
        let xml = r#"<worksheet><sheetData><row r="1"><c r="A1"><v>1</v></c></row><row r="30"><c r="A30"><v>2</v></c></row></sheetData></worksheet>"#;

        assert_eq!(
            patch(xml, &[("M22", "end"), ("B22", "start"), ("A40", "tail")]),
            r#"<worksheet><sheetData><row r="1"><c r="A1"><v>1</v></c></row><row r="22"><c r="B22" t="inlineStr"><is><t>start</t></is></c><c r="M22" t="inlineStr"><is><t>end</t></is></c></row><row r="30"><c r="A30"><v>2</v></c></row><row r="40"><c r="A40" t="inlineStr"><is><t>tail</t></is></c></row></sheetData></worksheet>"#
        );
    }

    #[test]
    fn test_empty_sheet_data_and_empty_elements() {
        assert_eq!(
            patch(r#"<worksheet><sheetData/></worksheet>"#, &[("B22", "x")]),
            r#"<worksheet><sheetData><row r="22"><c r="B22" t="inlineStr"><is><t>x</t></is></c></row></sheetData></worksheet>"#
        );

        let xml = r#"<worksheet><sheetData><row r="22" ht="15"/><row r="23"><c r="B23" s="4"/></row></sheetData></worksheet>"#;
        assert_eq!(
            patch(xml, &[("B22", "x"), ("B23", "y")]),
            r#"<worksheet><sheetData><row r="22" ht="15"><c r="B22" t="inlineStr"><is><t>x</t></is></c></row><row r="23"><c r="B23" s="4" t="inlineStr"><is><t>y</t></is></c></row></sheetData></worksheet>"#
        );
    }

    #[test]
    fn test_rows_and_cells_without_references() {
        let xml = r#"<worksheet><sheetData><row><c><v>1</v></c></row><row><c><v>2</v></c><c><v>3</v></c></row></sheetData></worksheet>"#;

        assert_eq!(
            patch(xml, &[("B2", "x")]),
            r#"<worksheet><sheetData><row><c><v>1</v></c></row><row><c><v>2</v></c><c r="B2" t="inlineStr"><is><t>x</t></is></c></row></sheetData></worksheet>"#
        );
    }

    #[test]
    fn test_prefixed_namespace_and_escaping() {
        let xml = r#"<x:worksheet xmlns:x="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><x:sheetData></x:sheetData></x:worksheet>"#;

        assert_eq!(
            patch(xml, &[("A1", "a < b & c")]),
            r#"<x:worksheet xmlns:x="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><x:sheetData><x:row r="1"><x:c r="A1" t="inlineStr"><x:is><x:t>a &lt; b &amp; c</x:t></x:is></x:c></x:row></x:sheetData></x:worksheet>"#
        );
    }

    #[test]
    fn test_untouched_content_is_preserved() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetViews><sheetView workbookViewId="0"/></sheetViews><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><f>SUM(B2:B3)</f><v>5</v></c></row></sheetData><mergeCells count="1"><mergeCell ref="A1:B1"/></mergeCells></worksheet>"#;

        assert_eq!(patch(xml, &[]), xml);
    }

    #[test]
    fn test_missing_sheet_data_is_an_error() {
        let result = patch_sheet(b"<worksheet/>", &edits(&[("A1", "x")]));
        assert!(matches!(result, Err(PatchError::NoSheetData)));
    }

    #[test]
    fn test_mismatched_tags_are_an_error() {
        let result = patch_sheet(
            b"<worksheet><sheetData><row r=\"1\"></c></sheetData></worksheet>",
            &edits(&[("A1", "x")]),
        );
        assert!(matches!(result, Err(PatchError::Xml(_))));
    }
}
