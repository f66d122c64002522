//! Recipient and message loading from `contacts.csv` / `messages.csv`.

use std::path::Path;

use tracing::{debug, error};

use crate::error::{CoreError, Result};
use crate::message::Message;
use crate::recipient::Recipient;

pub const PHONE_COLUMN: &str = "phone_number";
pub const GATEWAY_COLUMN: &str = "phone_number@carrier";
pub const MESSAGE_COLUMN: &str = "message";

/// Everything a batch needs from the data files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSet {
    /// Recipients for the phone-addressed channels.
    pub phone: Vec<Recipient>,
    /// Recipients for the email-gateway channel.
    pub gateway: Vec<Recipient>,
    pub messages: Vec<String>,
}

impl DataSet {
    /// All recipients, phone list first.
    pub fn recipients(&self) -> Vec<Recipient> {
        self.phone.iter().chain(&self.gateway).cloned().collect()
    }

    pub fn message(&self) -> Message {
        Message::select(self.messages.as_slice())
    }
}

/// Load both files. Read or parse failures are logged and yield an empty
/// data set so the run can still complete.
pub fn load_data(contacts: &Path, messages: &Path) -> DataSet {
    debug!(contacts = %contacts.display(), messages = %messages.display(), "loading data files");

    let result = load_contacts(contacts).and_then(|(phone, gateway)| {
        load_messages(messages).map(|messages| DataSet {
            phone,
            gateway,
            messages,
        })
    });

    match result {
        Ok(data) => {
            debug!(
                phone = data.phone.len(),
                gateway = data.gateway.len(),
                messages = data.messages.len(),
                "loaded data files"
            );
            data
        }
        Err(e) => {
            error!(error = %e, "failed to load data files");
            DataSet::default()
        }
    }
}

/// Returns `(phone, gateway)` recipient lists.
pub fn load_contacts(path: &Path) -> Result<(Vec<Recipient>, Vec<Recipient>)> {
    let text = std::fs::read_to_string(path)?;
    let table = Table::parse(&text).map_err(|reason| csv_error(path, reason))?;
    debug!(headers = ?table.headers, "contacts headers");

    let phone_idx = table.column(PHONE_COLUMN);
    let gateway_idx = table.column(GATEWAY_COLUMN);
    if phone_idx.is_none() && gateway_idx.is_none() {
        return Err(csv_error(
            path,
            format!("expected a {PHONE_COLUMN} or {GATEWAY_COLUMN} column"),
        ));
    }

    let mut phone = Vec::new();
    let mut gateway = Vec::new();
    for row in &table.rows {
        if let Some(v) = phone_idx.and_then(|i| non_empty(row, i)) {
            phone.push(Recipient::phone(v));
        }
        if let Some(v) = gateway_idx.and_then(|i| non_empty(row, i)) {
            gateway.push(Recipient::gateway(v));
        }
    }
    Ok((phone, gateway))
}

pub fn load_messages(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    let table = Table::parse(&text).map_err(|reason| csv_error(path, reason))?;
    let idx = table
        .column(MESSAGE_COLUMN)
        .ok_or_else(|| csv_error(path, format!("missing {MESSAGE_COLUMN} column")))?;

    Ok(table
        .rows
        .iter()
        .filter_map(|row| non_empty(row, idx).map(str::to_string))
        .collect())
}

fn csv_error(path: &Path, reason: String) -> CoreError {
    CoreError::Csv {
        file: path.display().to_string(),
        reason,
    }
}

fn non_empty(row: &[String], idx: usize) -> Option<&str> {
    row.get(idx).map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Header row plus data rows of a small comma-separated file.
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut iter = parse_records(text)?.into_iter();
        let headers = iter
            .next()
            .ok_or_else(|| "file is empty".to_string())?
            .into_iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect();
        Ok(Self {
            headers,
            rows: iter.collect(),
        })
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Split text into comma-separated records. Double-quoted fields may hold
/// commas, `""` and line breaks; blank lines are skipped.
fn parse_records(text: &str) -> std::result::Result<Vec<Vec<String>>, String> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut quote_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
                quote_line = line;
            }
            (',', false) => record.push(std::mem::take(&mut field)),
            ('\r', false) if chars.peek() == Some(&'\n') => {}
            ('\n', false) => {
                line += 1;
                record.push(std::mem::take(&mut field));
                push_record(&mut records, std::mem::take(&mut record));
            }
            ('\n', true) => {
                line += 1;
                field.push('\n');
            }
            (c, _) => field.push(c),
        }
    }
    if in_quotes {
        return Err(format!("line {quote_line}: unterminated quoted field"));
    }
    if !record.is_empty() || !field.is_empty() {
        record.push(field);
        push_record(&mut records, record);
    }
    Ok(records)
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    let blank = record.len() == 1 && record[0].trim().is_empty();
    if !blank {
        records.push(record);
    }
}
