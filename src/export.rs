use std::io::Cursor;

use chrono::NaiveDateTime;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;
use rocket::http::ContentType;
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rusqlite::types::{ToSql, ValueRef};
use serde_json::{Map, Value};

/// Body written for a CSV export with no rows.
pub const EMPTY_CSV: &str = "No data available\n";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExportFormat {
    Csv,
    Json,
    Xml,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "" | "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            "xml" => Some(ExportFormat::Xml),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Xml => "xml",
        }
    }

    pub fn content_type(self) -> ContentType {
        match self {
            ExportFormat::Csv => ContentType::CSV,
            ExportFormat::Json => ContentType::JSON,
            ExportFormat::Xml => ContentType::new("application", "xml"),
        }
    }
}

/// A result set with its column order kept, ready to serialize.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Records {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Records {
    pub fn query(conn: &rusqlite::Connection, sql: &str, params: &[&dyn ToSql]) -> rusqlite::Result<Records> {
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();
        let rows = stmt
            .query_map(params, |row| {
                let mut out = Vec::with_capacity(width);
                for i in 0..width {
                    out.push(sql_to_json(row.get_ref(i)?));
                }
                Ok(out)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Records { columns, rows })
    }

    pub fn from_json_rows(columns: &[&str], items: &[Value]) -> Records {
        let rows = items
            .iter()
            .map(|item| {
                columns
                    .iter()
                    .map(|c| item.get(*c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Records {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(hex::encode(b)),
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => if *b { "1".into() } else { "0".into() },
        other => other.to_string(),
    }
}

pub fn to_csv(records: &Records) -> Result<String, String> {
    if records.is_empty() {
        return Ok(EMPTY_CSV.to_string());
    }
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(&records.columns).map_err(|e| e.to_string())?;
    for row in &records.rows {
        wtr.write_record(row.iter().map(cell_text)).map_err(|e| e.to_string())?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

pub fn to_json(records: &Records) -> Result<String, String> {
    let items: Vec<Value> = records
        .rows
        .iter()
        .map(|row| {
            let obj: Map<String, Value> = records
                .columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect();
            Value::Object(obj)
        })
        .collect();
    serde_json::to_string_pretty(&items).map_err(|e| e.to_string())
}

/// XML element names must start with a letter and hold no spaces or punctuation.
fn element_name(column: &str) -> String {
    let mut name: String = column
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if !name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        name.insert(0, '_');
    }
    name
}

pub fn to_xml(records: &Records, root: &str) -> Result<String, String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| e.to_string())?;
    writer
        .write_event(Event::Start(BytesStart::new(root)))
        .map_err(|e| e.to_string())?;

    let names: Vec<String> = records.columns.iter().map(|c| element_name(c)).collect();
    for row in &records.rows {
        writer
            .write_event(Event::Start(BytesStart::new("record")))
            .map_err(|e| e.to_string())?;
        for (name, value) in names.iter().zip(row.iter()) {
            writer
                .write_event(Event::Start(BytesStart::new(name.as_str())))
                .map_err(|e| e.to_string())?;
            let text = cell_text(value);
            writer
                .write_event(Event::Text(BytesText::new(&text)))
                .map_err(|e| e.to_string())?;
            writer
                .write_event(Event::End(BytesEnd::new(name.as_str())))
                .map_err(|e| e.to_string())?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("record")))
            .map_err(|e| e.to_string())?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(root)))
        .map_err(|e| e.to_string())?;
    String::from_utf8(writer.into_inner().into_inner()).map_err(|e| e.to_string())
}

pub fn render(records: &Records, format: ExportFormat, xml_root: &str) -> Result<String, String> {
    match format {
        ExportFormat::Csv => to_csv(records),
        ExportFormat::Json => to_json(records),
        ExportFormat::Xml => to_xml(records, xml_root),
    }
}

/// `<prefix>_<YYYY-mm-dd_HH-MM-SS>.<ext>`
pub fn export_filename(prefix: &str, now: NaiveDateTime, format: ExportFormat) -> String {
    format!("{}_{}.{}", prefix, now.format("%Y-%m-%d_%H-%M-%S"), format.extension())
}

/// A file delivered as an attachment.
pub struct Download {
    pub filename: String,
    pub content_type: ContentType,
    pub body: Vec<u8>,
}

impl<'r> Responder<'r, 'static> for Download {
    fn respond_to(self, _req: &'r Request<'_>) -> response::Result<'static> {
        Response::build()
            .header(self.content_type)
            .raw_header(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", self.filename),
            )
            .raw_header("Cache-Control", "no-store")
            .sized_body(self.body.len(), Cursor::new(self.body))
            .ok()
    }
}
