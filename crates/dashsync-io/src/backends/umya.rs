#![cfg(feature = "umya")]

use crate::traits::{CellData, SaveDestination, SheetData, SpreadsheetReader, SpreadsheetWriter};
use chrono::NaiveTime;
use dashsync_common::{CellValue, datetime_to_serial};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use umya_spreadsheet::{CellRawValue, Spreadsheet, XlsxError, reader::xlsx};

/// xlsx workbook held in memory by `umya-spreadsheet`.
pub struct UmyaAdapter {
    workbook: RwLock<Spreadsheet>,
    original_path: Option<PathBuf>,
}

fn unsupported(msg: &str) -> XlsxError {
    XlsxError::Io(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        msg.to_string(),
    ))
}

impl UmyaAdapter {
    fn convert_cell_value(cv: &umya_spreadsheet::CellValue) -> Option<CellValue> {
        let raw = cv.get_raw_value();
        if raw.is_empty() {
            return None;
        }
        match raw {
            CellRawValue::Numeric(n) => Some(CellValue::from_f64(*n)),
            CellRawValue::Bool(b) => Some(CellValue::Boolean(*b)),
            CellRawValue::String(s) => Some(CellValue::Text(s.to_string())),
            CellRawValue::RichText(rt) => Some(CellValue::Text(rt.get_text().to_string())),
            CellRawValue::Lazy(s) => {
                let txt = s.as_ref();
                if let Some(v) = CellValue::from_numeric_str(txt) {
                    Some(v)
                } else if txt.eq_ignore_ascii_case("TRUE") {
                    Some(CellValue::Boolean(true))
                } else if txt.eq_ignore_ascii_case("FALSE") {
                    Some(CellValue::Boolean(false))
                } else {
                    Some(CellValue::Text(txt.to_string()))
                }
            }
            // Error literals (#N/A, ...) surface as their text
            CellRawValue::Error(_) => Some(CellValue::Text(cv.get_value().to_string())),
            CellRawValue::Empty => None,
        }
    }

    /// Deserialize every sheet so the writer sees the whole book.
    fn load_all(wb: &mut Spreadsheet) {
        let count = wb.get_sheet_count();
        for i in 0..count {
            wb.read_sheet(i);
        }
    }

    /// The zip writer needs `Seek`, so buffer through a cursor.
    fn to_bytes(wb: &Spreadsheet) -> Result<Vec<u8>, XlsxError> {
        let mut buf = Cursor::new(Vec::new());
        umya_spreadsheet::writer::xlsx::write_writer(wb, &mut buf)?;
        Ok(buf.into_inner())
    }
}

impl SpreadsheetReader for UmyaAdapter {
    type Error = XlsxError;

    fn sheet_names(&self) -> Result<Vec<String>, Self::Error> {
        let mut wb = self.workbook.write();
        let count = wb.get_sheet_count();
        let mut names = Vec::with_capacity(count);
        for i in 0..count {
            wb.read_sheet(i);
            if let Some(s) = wb.get_sheet(&i) {
                names.push(s.get_name().to_string());
            }
        }
        Ok(names)
    }

    fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, Self::Error>
    where
        Self: Sized,
    {
        // Full read: lazily read books trip assertions on save
        let book = xlsx::read(path.as_ref())?;
        Ok(Self {
            workbook: RwLock::new(book),
            original_path: Some(path.as_ref().to_path_buf()),
        })
    }

    fn open_bytes(data: Vec<u8>) -> Result<Self, Self::Error>
    where
        Self: Sized,
    {
        let book = xlsx::read_reader(Cursor::new(data), true)?;
        Ok(Self {
            workbook: RwLock::new(book),
            original_path: None,
        })
    }

    fn read_sheet(&mut self, sheet: &str) -> Result<SheetData, Self::Error> {
        let mut wb = self.workbook.write();
        wb.read_sheet_by_name(sheet);
        let ws = wb
            .get_sheet_by_name(sheet)
            .ok_or_else(|| XlsxError::CellError(format!("sheet `{sheet}` not found")))?;
        let mut cells: BTreeMap<(u32, u32), CellData> = BTreeMap::new();
        for cell in ws.get_cell_collection() {
            let coord = cell.get_coordinate();
            let col = *coord.get_col_num();
            let row = *coord.get_row_num();
            let cv = cell.get_cell_value();
            let formula = if cv.is_formula() {
                let f = cv.get_formula();
                (!f.is_empty()).then(|| {
                    if f.starts_with('=') {
                        f.to_string()
                    } else {
                        format!("={f}")
                    }
                })
            } else {
                None
            };
            let value = Self::convert_cell_value(cv);
            if value.is_none() && formula.is_none() {
                continue;
            }
            cells.insert((row, col), CellData { value, formula });
        }
        let dims = cells
            .keys()
            .fold((0u32, 0u32), |acc, (r, c)| (acc.0.max(*r), acc.1.max(*c)));
        Ok(SheetData {
            cells,
            dimensions: Some(dims),
        })
    }

    fn sheet_bounds(&self, sheet: &str) -> Option<(u32, u32)> {
        let wb = self.workbook.read();
        let ws = wb.get_sheet_by_name(sheet)?;
        Some(ws.get_cell_collection().iter().fold((0u32, 0u32), |acc, cell| {
            let coord = cell.get_coordinate();
            (acc.0.max(*coord.get_row_num()), acc.1.max(*coord.get_col_num()))
        }))
    }
}

impl SpreadsheetWriter for UmyaAdapter {
    type Error = XlsxError;

    fn write_cell(
        &mut self,
        sheet: &str,
        row: u32,
        col: u32,
        data: CellData,
    ) -> Result<(), Self::Error> {
        let mut wb = self.workbook.write();
        if wb.get_sheet_by_name(sheet).is_none() {
            let _ = wb.new_sheet(sheet);
            wb.read_sheet_collection();
        }
        let ws = wb
            .get_sheet_by_name_mut(sheet)
            .ok_or_else(|| XlsxError::CellError(format!("sheet `{sheet}` could not be loaded")))?;
        // umya addresses cells as (col, row)
        let cell = ws.get_cell_mut((col, row));
        match data.value {
            Some(CellValue::Number(n)) => {
                cell.set_value_number(n);
            }
            Some(CellValue::Int(i)) => {
                cell.set_value_number(i as f64);
            }
            Some(CellValue::Boolean(b)) => {
                cell.set_value_bool(b);
            }
            Some(CellValue::Text(s)) => {
                cell.set_value(s);
            }
            Some(CellValue::Date(d)) => {
                cell.set_value_number(datetime_to_serial(&d.and_time(NaiveTime::MIN)));
            }
            Some(CellValue::DateTime(dt)) => {
                cell.set_value_number(datetime_to_serial(&dt));
            }
            Some(CellValue::Empty) | None => {
                cell.set_blank();
            }
        }
        if let Some(f) = data.formula {
            cell.set_formula(f.strip_prefix('=').unwrap_or(&f).to_string());
        }
        Ok(())
    }

    fn create_sheet(&mut self, name: &str) -> Result<(), Self::Error> {
        let mut wb = self.workbook.write();
        if wb.get_sheet_by_name(name).is_none() {
            let _ = wb.new_sheet(name);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn save_to<'a>(&mut self, dest: SaveDestination<'a>) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut wb = self.workbook.write();
        Self::load_all(&mut wb);
        match dest {
            SaveDestination::InPlace => {
                let path = self.original_path.as_ref().ok_or_else(|| {
                    unsupported("in-place save needs the path the book was opened from")
                })?;
                umya_spreadsheet::writer::xlsx::write(&*wb, path)?;
                Ok(None)
            }
            SaveDestination::Path(p) => {
                umya_spreadsheet::writer::xlsx::write(&*wb, p)?;
                self.original_path = Some(p.to_path_buf());
                Ok(None)
            }
            SaveDestination::Writer(w) => {
                let bytes = Self::to_bytes(&wb)?;
                w.write_all(&bytes).map_err(XlsxError::Io)?;
                Ok(None)
            }
            SaveDestination::Bytes => Ok(Some(Self::to_bytes(&wb)?)),
        }
    }
}
