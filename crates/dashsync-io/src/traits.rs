use dashsync_common::CellValue;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

#[derive(Clone, Debug, PartialEq)]
pub struct CellData {
    pub value: Option<CellValue>,
    pub formula: Option<String>,
}

impl CellData {
    pub fn from_value<V: IntoCellValue>(value: V) -> Self {
        Self {
            value: Some(value.into_cell_value()),
            formula: None,
        }
    }

    pub fn from_formula(formula: impl Into<String>) -> Self {
        Self {
            value: None,
            formula: Some(formula.into()),
        }
    }

    /// A cell holding neither a value nor a formula.
    pub fn is_blank(&self) -> bool {
        let formula_blank = self.formula.as_deref().is_none_or(str::is_empty);
        let value_blank = self.value.as_ref().is_none_or(CellValue::is_blank);
        formula_blank && value_blank
    }
}

/// Local conversion trait so tests and callers can pass primitives directly
pub trait IntoCellValue {
    fn into_cell_value(self) -> CellValue;
}

impl IntoCellValue for CellValue {
    fn into_cell_value(self) -> CellValue {
        self
    }
}

impl IntoCellValue for f64 {
    fn into_cell_value(self) -> CellValue {
        CellValue::Number(self)
    }
}

impl IntoCellValue for i64 {
    fn into_cell_value(self) -> CellValue {
        CellValue::Int(self)
    }
}

impl IntoCellValue for i32 {
    fn into_cell_value(self) -> CellValue {
        CellValue::Int(self as i64)
    }
}

impl IntoCellValue for bool {
    fn into_cell_value(self) -> CellValue {
        CellValue::Boolean(self)
    }
}

impl IntoCellValue for String {
    fn into_cell_value(self) -> CellValue {
        CellValue::Text(self)
    }
}

impl IntoCellValue for &str {
    fn into_cell_value(self) -> CellValue {
        CellValue::Text(self.to_string())
    }
}

#[derive(Clone, Debug, Default)]
pub struct SheetData {
    pub cells: BTreeMap<(u32, u32), CellData>,
    /// `(max_row, max_col)` when the backend knows it.
    pub dimensions: Option<(u32, u32)>,
}

pub enum SaveDestination<'a> {
    /// Overwrite the file the store was opened from.
    InPlace,
    Path(&'a Path),
    Writer(&'a mut dyn Write),
    Bytes,
}

pub trait SpreadsheetReader: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn sheet_names(&self) -> Result<Vec<String>, Self::Error>;

    fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, Self::Error>
    where
        Self: Sized;

    fn open_bytes(data: Vec<u8>) -> Result<Self, Self::Error>
    where
        Self: Sized;

    fn has_sheet(&self, sheet: &str) -> Result<bool, Self::Error> {
        Ok(self.sheet_names()?.iter().any(|name| name == sheet))
    }

    fn read_range(
        &mut self,
        sheet: &str,
        start: (u32, u32),
        end: (u32, u32),
    ) -> Result<BTreeMap<(u32, u32), CellData>, Self::Error> {
        // Default: read the whole sheet then filter
        let data = self.read_sheet(sheet)?;
        Ok(data
            .cells
            .into_iter()
            .filter(|((r, c), _)| *r >= start.0 && *r <= end.0 && *c >= start.1 && *c <= end.1)
            .collect())
    }

    fn read_sheet(&mut self, sheet: &str) -> Result<SheetData, Self::Error>;

    /// `(max_row, max_col)` of the populated area, if the sheet exists.
    fn sheet_bounds(&self, sheet: &str) -> Option<(u32, u32)>;
}

pub trait SpreadsheetWriter: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn write_cell(
        &mut self,
        sheet: &str,
        row: u32,
        col: u32,
        data: CellData,
    ) -> Result<(), Self::Error>;

    fn write_range(
        &mut self,
        sheet: &str,
        cells: BTreeMap<(u32, u32), CellData>,
    ) -> Result<(), Self::Error> {
        for ((r, c), d) in cells {
            self.write_cell(sheet, r, c, d)?;
        }
        Ok(())
    }

    fn create_sheet(&mut self, name: &str) -> Result<(), Self::Error>;

    fn flush(&mut self) -> Result<(), Self::Error>;

    fn save(&mut self) -> Result<(), Self::Error> {
        self.save_to(SaveDestination::InPlace).map(|_| ())
    }

    fn save_to<'a>(&mut self, dest: SaveDestination<'a>) -> Result<Option<Vec<u8>>, Self::Error>;

    fn save_to_bytes(&mut self) -> Result<Vec<u8>, Self::Error> {
        Ok(self.save_to(SaveDestination::Bytes)?.unwrap_or_default())
    }
}

pub trait SpreadsheetIO: SpreadsheetReader + SpreadsheetWriter {}

impl<T: SpreadsheetReader + SpreadsheetWriter> SpreadsheetIO for T {}
