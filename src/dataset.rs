use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const NULL_MARKERS: [&str; 8] = ["", "na", "n/a", "nan", "null", "none", "<na>", "-"];

/// Untyped table as read from a CSV file or a JSON records payload, with
/// standardized column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("failed reading dataset: {}", path.display()))?;
        let text = decode_text(&bytes);
        Self::from_csv_str(&text)
            .with_context(|| format!("failed parsing CSV dataset: {}", path.display()))
    }

    pub fn from_csv_str(text: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(detect_delimiter(text))
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()?
            .iter()
            .map(standardize_column_name)
            .collect::<Vec<_>>();
        let width = headers.len();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row = record.iter().map(str::to_string).collect::<Vec<_>>();
            row.resize(width, String::new());
            rows.push(row);
        }
        Ok(Self { headers, rows })
    }

    /// Flattens an array of JSON objects into a table. Accepts a bare array or
    /// one nested under `records`, `result`, `data` or `items`.
    pub fn from_json_records(value: &Value) -> Result<Self> {
        let array = record_array(value).ok_or_else(|| anyhow!("no record array in JSON payload"))?;

        let mut headers: Vec<String> = Vec::new();
        let mut objects = Vec::with_capacity(array.len());
        for entry in array {
            let Some(object) = entry.as_object() else {
                continue;
            };
            let mut flat = Map::new();
            flatten_object("", object, &mut flat);
            for key in flat.keys() {
                let name = standardize_column_name(key);
                if !headers.contains(&name) {
                    headers.push(name);
                }
            }
            objects.push(flat);
        }

        let rows = objects
            .iter()
            .map(|flat| {
                let mut row = vec![String::new(); headers.len()];
                for (key, value) in flat {
                    let name = standardize_column_name(key);
                    if let Some(idx) = headers.iter().position(|h| *h == name) {
                        row[idx] = scalar_to_string(value);
                    }
                }
                row
            })
            .collect();
        Ok(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = standardize_column_name(name);
        self.headers.iter().position(|h| *h == wanted)
    }

    pub fn head(&self, n: usize) -> Self {
        Self {
            headers: self.headers.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}

pub fn standardize_column_name(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .replace(' ', "_")
}

pub fn is_null(value: &str) -> bool {
    let trimmed = value.trim().to_ascii_lowercase();
    NULL_MARKERS.contains(&trimmed.as_str())
}

/// Open-data portals often publish `;`-separated files; pick whichever of `;`
/// and `,` is more frequent on the header line.
pub fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

/// UTF-8 when valid, otherwise Latin-1.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn record_array(value: &Value) -> Option<&Vec<Value>> {
    if let Some(array) = value.as_array() {
        return Some(array);
    }
    let object = value.as_object()?;
    for key in ["records", "result", "data", "items"] {
        if let Some(nested) = object.get(key) {
            if let Some(found) = record_array(nested) {
                return Some(found);
            }
        }
    }
    None
}

fn flatten_object(prefix: &str, object: &Map<String, Value>, out: &mut Map<String, Value>) {
    for (key, value) in object {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => flatten_object(&name, nested, out),
            other => {
                out.insert(name, other.clone());
            }
        }
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn standardizes_header_names() {
        assert_eq!(standardize_column_name(" District ID "), "district_id");
        assert_eq!(standardize_column_name("OPEX"), "opex");
        assert_eq!(standardize_column_name("\u{feff}tech"), "tech");
    }

    #[test]
    fn reads_semicolon_separated_csv() {
        let table = RawTable::from_csv_str("District ID;Tech\n10;heat_pump\n11;\n").unwrap();
        assert_eq!(table.headers, vec!["district_id", "tech"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1], vec!["11".to_string(), String::new()]);
        assert_eq!(table.column_index("Tech"), Some(1));
    }

    #[test]
    fn pads_short_rows() {
        let table = RawTable::from_csv_str("a,b,c\n1,2\n").unwrap();
        assert_eq!(table.rows[0], vec!["1", "2", ""]);
    }

    #[test]
    fn decodes_latin1_fallback() {
        let bytes = [b'C', 0xe1, b'd', b'i', b'z'];
        assert_eq!(decode_text(&bytes), "Cádiz");
    }

    #[test]
    fn flattens_nested_json_records() {
        let payload = json!({
            "records": [
                { "station": 4, "reading": { "no2": 31.5 } },
                { "station": 8, "reading": { "no2": null }, "Extra Field": "x" }
            ]
        });
        let table = RawTable::from_json_records(&payload).unwrap();
        assert_eq!(table.headers, vec!["station", "reading.no2", "extra_field"]);
        assert_eq!(table.rows[0], vec!["4", "31.5", ""]);
        assert_eq!(table.rows[1], vec!["8", "", "x"]);
    }

    #[test]
    fn null_markers_are_case_insensitive() {
        assert!(is_null(" NaN "));
        assert!(is_null(""));
        assert!(!is_null("0"));
    }
}
