use crate::IoError;
use crate::traits::{CellData, SaveDestination, SheetData, SpreadsheetReader, SpreadsheetWriter};
use chrono::{NaiveDate, NaiveDateTime};
use dashsync_common::CellValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
struct JsonWorkbook {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    sheets: BTreeMap<String, JsonSheet>,
}

fn default_version() -> u32 {
    1
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
struct JsonSheet {
    #[serde(default)]
    cells: Vec<JsonCell>,
    #[serde(default)]
    dimensions: Option<(u32, u32)>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct JsonCell {
    row: u32,
    col: u32,
    #[serde(default)]
    value: Option<JsonValue>,
    #[serde(default)]
    formula: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", content = "value")]
enum JsonValue {
    Int(i64),
    Number(f64),
    Text(String),
    Boolean(bool),
    Empty,
    Date(String),
    DateTime(String),
}

/// Workbook persisted as a single JSON document.
///
/// Used for fixtures and for dashboards that are not kept in xlsx.
#[derive(Default)]
pub struct JsonAdapter {
    data: JsonWorkbook,
    path: Option<PathBuf>,
}

impl JsonAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn to_sheet_data(name: &str, js: &JsonSheet) -> Result<SheetData, IoError> {
        let mut cells = BTreeMap::new();
        for c in &js.cells {
            let value = c
                .value
                .as_ref()
                .map(json_to_value)
                .transpose()
                .map_err(|message| crate::error::with_cell_context(name, c.row, c.col, message))?;
            cells.insert(
                (c.row, c.col),
                CellData {
                    value,
                    formula: c.formula.clone(),
                },
            );
        }
        Ok(SheetData {
            cells,
            dimensions: js.dimensions,
        })
    }

    pub fn to_json_string(&self) -> Result<String, IoError> {
        Ok(serde_json::to_string_pretty(&self.data)?)
    }

    pub fn set_dimensions(&mut self, sheet: &str, dims: Option<(u32, u32)>) {
        self.data
            .sheets
            .entry(sheet.to_string())
            .or_default()
            .dimensions = dims;
    }

    fn write_to_path(&self, path: &Path) -> Result<(), IoError> {
        let mut file = File::create(path)?;
        let s = serde_json::to_string_pretty(&self.data)?;
        file.write_all(s.as_bytes())?;
        Ok(())
    }
}

impl SpreadsheetReader for JsonAdapter {
    type Error = IoError;

    fn sheet_names(&self) -> Result<Vec<String>, Self::Error> {
        Ok(self.data.sheets.keys().cloned().collect())
    }

    fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, Self::Error>
    where
        Self: Sized,
    {
        let file = File::open(path.as_ref())?;
        let data: JsonWorkbook = serde_json::from_reader(BufReader::new(file))?;
        Ok(JsonAdapter {
            data,
            path: Some(path.as_ref().to_path_buf()),
        })
    }

    fn open_bytes(bytes: Vec<u8>) -> Result<Self, Self::Error>
    where
        Self: Sized,
    {
        let data: JsonWorkbook = serde_json::from_slice(&bytes)?;
        Ok(JsonAdapter { data, path: None })
    }

    fn read_sheet(&mut self, sheet: &str) -> Result<SheetData, Self::Error> {
        match self.data.sheets.get(sheet) {
            Some(js) => Self::to_sheet_data(sheet, js),
            None => Err(IoError::MissingSheet(sheet.to_string())),
        }
    }

    fn sheet_bounds(&self, sheet: &str) -> Option<(u32, u32)> {
        let js = self.data.sheets.get(sheet)?;
        let extent = js
            .cells
            .iter()
            .fold((0u32, 0u32), |acc, c| (acc.0.max(c.row), acc.1.max(c.col)));
        Some(match js.dimensions {
            Some((r, c)) => (r.max(extent.0), c.max(extent.1)),
            None => extent,
        })
    }
}

impl SpreadsheetWriter for JsonAdapter {
    type Error = IoError;

    fn write_cell(
        &mut self,
        sheet: &str,
        row: u32,
        col: u32,
        data: CellData,
    ) -> Result<(), Self::Error> {
        let sheet_entry = self.data.sheets.entry(sheet.to_string()).or_default();
        let value = data.value.as_ref().map(value_to_json);
        if let Some(cell) = sheet_entry
            .cells
            .iter_mut()
            .find(|c| c.row == row && c.col == col)
        {
            cell.value = value;
            cell.formula = data.formula;
        } else {
            sheet_entry.cells.push(JsonCell {
                row,
                col,
                value,
                formula: data.formula,
            });
        }
        if let Some((max_row, max_col)) = sheet_entry.dimensions.as_mut() {
            *max_row = (*max_row).max(row);
            *max_col = (*max_col).max(col);
        }
        Ok(())
    }

    fn create_sheet(&mut self, name: &str) -> Result<(), Self::Error> {
        self.data.sheets.entry(name.to_string()).or_default();
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn save_to<'a>(&mut self, dest: SaveDestination<'a>) -> Result<Option<Vec<u8>>, Self::Error> {
        match dest {
            SaveDestination::InPlace => {
                if let Some(path) = self.path.clone() {
                    self.write_to_path(&path)?;
                }
                Ok(None)
            }
            SaveDestination::Path(path) => {
                self.write_to_path(path)?;
                self.path = Some(path.to_path_buf());
                Ok(None)
            }
            SaveDestination::Writer(writer) => {
                let s = serde_json::to_string_pretty(&self.data)?;
                writer.write_all(s.as_bytes())?;
                Ok(None)
            }
            SaveDestination::Bytes => Ok(Some(serde_json::to_vec_pretty(&self.data)?)),
        }
    }
}

fn value_to_json(v: &CellValue) -> JsonValue {
    match v {
        CellValue::Int(i) => JsonValue::Int(*i),
        CellValue::Number(n) => JsonValue::Number(*n),
        CellValue::Text(s) => JsonValue::Text(s.clone()),
        CellValue::Boolean(b) => JsonValue::Boolean(*b),
        CellValue::Empty => JsonValue::Empty,
        CellValue::Date(d) => JsonValue::Date(d.format("%Y-%m-%d").to_string()),
        CellValue::DateTime(dt) => JsonValue::DateTime(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
    }
}

fn json_to_value(v: &JsonValue) -> Result<CellValue, String> {
    Ok(match v {
        JsonValue::Int(i) => CellValue::Int(*i),
        JsonValue::Number(n) => CellValue::Number(*n),
        JsonValue::Text(s) => CellValue::Text(s.clone()),
        JsonValue::Boolean(b) => CellValue::Boolean(*b),
        JsonValue::Empty => CellValue::Empty,
        JsonValue::Date(s) => CellValue::Date(
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("bad date {s:?}: {e}"))?,
        ),
        JsonValue::DateTime(s) => CellValue::DateTime(
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                .map_err(|e| format!("bad datetime {s:?}: {e}"))?,
        ),
    })
}
