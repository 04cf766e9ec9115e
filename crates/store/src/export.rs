//! Tabular export of conversation histories.
//!
//! One row per history with the columns `date,title,selected_words,suggested_words`.
//! Word lists are joined with `;`. Two formats:
//! - **CSV**: fields quoted per RFC 4180, rows end with CRLF
//! - **XLSX**: a single-sheet SpreadsheetML workbook with inline strings and a
//!   right-to-left sheet view

use std::io::{Seek, Write};

use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::history::ConversationHistory;

pub const HEADER: [&str; 4] = ["date", "title", "selected_words", "suggested_words"];

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";
const COLUMNS: [char; 4] = ['A', 'B', 'C', 'D'];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    /// Pick a format from a file extension. Unknown extensions are refused
    /// rather than written in a format the name does not promise.
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("csv") {
            Some(Self::Csv)
        } else if ext.eq_ignore_ascii_case("xlsx") {
            Some(Self::Xlsx)
        } else {
            None
        }
    }
}

/// One row of cells per history, header first.
fn rows(histories: &[ConversationHistory]) -> Vec<[String; 4]> {
    let mut rows = vec![HEADER.map(str::to_string)];
    for history in histories {
        rows.push([
            history.created_at.format(DATE_FORMAT).to_string(),
            history.title.clone(),
            history.selected_words().collect::<Vec<_>>().join(";"),
            history.topic_groups.all_words().collect::<Vec<_>>().join(";"),
        ]);
    }
    rows
}

/// Render histories as a single CSV document.
pub fn to_csv(histories: &[ConversationHistory]) -> String {
    let mut out = String::new();
    for row in rows(histories) {
        let line = row.iter().map(|f| escape(f)).collect::<Vec<_>>().join(",");
        out.push_str(&line);
        out.push_str("\r\n");
    }
    out
}

/// Write the CSV document to `writer`.
pub fn write_csv<W: Write>(writer: &mut W, histories: &[ConversationHistory]) -> std::io::Result<()> {
    writer.write_all(to_csv(histories).as_bytes())
}

/// Write an XLSX workbook to `writer`.
pub fn write_xlsx<W: Write + Seek>(
    writer: W,
    histories: &[ConversationHistory],
) -> Result<(), ExportError> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", WORKBOOK.to_string()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/worksheets/sheet1.xml", sheet_xml(histories)),
    ];
    for (name, body) in parts {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
    }
    zip.finish()?;
    Ok(())
}

/// Write histories in `format`.
pub fn export<W: Write + Seek>(
    mut writer: W,
    histories: &[ConversationHistory],
    format: ExportFormat,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Csv => Ok(write_csv(&mut writer, histories)?),
        ExportFormat::Xlsx => write_xlsx(writer, histories),
    }
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn sheet_xml(histories: &[ConversationHistory]) -> String {
    let mut xml = String::from(SHEET_OPEN);
    for (i, row) in rows(histories).iter().enumerate() {
        let r = i + 1;
        xml.push_str(&format!(r#"<row r="{r}">"#));
        for (col, value) in COLUMNS.iter().zip(row) {
            xml.push_str(&format!(
                r#"<c r="{col}{r}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                xml_escape(value)
            ));
        }
        xml.push_str("</row>");
    }
    xml.push_str(SHEET_CLOSE);
    xml
}

/// Escape markup characters and drop control characters XML 1.0 forbids.
fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Histories" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

const SHEET_OPEN: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetViews><sheetView rightToLeft="1" workbookViewId="0"/></sheetViews><sheetData>"#;

const SHEET_CLOSE: &str = "</sheetData></worksheet>";

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use milim_core::{ConversationEntry, StructuredSuggestion};
    use milim_suggest::TopicGroups;
    use std::collections::BTreeSet;
    use std::io::{Cursor, Read};

    fn history() -> ConversationHistory {
        let mut groups = TopicGroups::new();
        let id = groups.begin(BTreeSet::from(["ים".to_string()]));
        groups.accept(id, StructuredSuggestion::new("חוף", ["חול", "ים", "גלים"]).unwrap());
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        ConversationHistory {
            id: "h1".into(),
            title: "ים, שמש".into(),
            created_at: at,
            updated_at: at,
            entries: vec![
                ConversationEntry::user("ים"),
                ConversationEntry::user("חול"),
                ConversationEntry::system("אני רוצה ללכת לים"),
            ],
            topic_groups: groups,
        }
    }

    fn xlsx_bytes(histories: &[ConversationHistory]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        write_xlsx(&mut cursor, histories).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn csv_rows_and_columns() {
        let csv = to_csv(&[history()]);
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines[0], "date,title,selected_words,suggested_words");
        assert_eq!(lines[1], "2024-05-01 09:30,\"ים, שמש\",ים;חול,חול;גלים");
        assert_eq!(lines[2], "");
    }

    #[test]
    fn quotes_are_doubled() {
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a\nb"), "\"a\nb\"");
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ExportFormat::from_extension("CSV"), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::from_extension("xlsx"), Some(ExportFormat::Xlsx));
        assert_eq!(ExportFormat::from_extension("ods"), None);
        assert_eq!(ExportFormat::from_extension(""), None);
    }

    #[test]
    fn write_csv_emits_bytes() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &[history()]).unwrap();
        assert!(String::from_utf8(buf).unwrap().contains("חול;גלים"));
    }

    #[test]
    fn xlsx_is_a_zip_workbook() {
        let bytes = xlsx_bytes(&[history()]);
        assert_eq!(&bytes[..2], b"PK");

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        for part in ["[Content_Types].xml", "_rels/.rels", "xl/workbook.xml", "xl/_rels/workbook.xml.rels"] {
            assert!(archive.by_name(part).is_ok(), "missing {part}");
        }
        let mut sheet = String::new();
        archive
            .by_name("xl/worksheets/sheet1.xml")
            .unwrap()
            .read_to_string(&mut sheet)
            .unwrap();
        assert!(sheet.contains(r#"<c r="A1" t="inlineStr"><is><t xml:space="preserve">date</t>"#));
        assert!(sheet.contains(r#"<c r="B2" t="inlineStr"><is><t xml:space="preserve">ים, שמש</t>"#));
        assert!(sheet.contains(">חול;גלים<"));
        assert!(sheet.contains(r#"rightToLeft="1""#));
    }

    #[test]
    fn export_dispatches_by_format() {
        let mut csv = Cursor::new(Vec::new());
        export(&mut csv, &[history()], ExportFormat::Csv).unwrap();
        assert!(csv.into_inner().starts_with(b"date,"));

        let mut xlsx = Cursor::new(Vec::new());
        export(&mut xlsx, &[], ExportFormat::Xlsx).unwrap();
        assert!(xlsx.into_inner().starts_with(b"PK"));
    }

    #[test]
    fn xml_markup_is_escaped() {
        assert_eq!(xml_escape("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
        assert_eq!(xml_escape("x\u{1}y"), "xy");
    }
}
