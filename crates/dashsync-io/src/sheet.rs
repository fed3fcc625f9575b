use crate::traits::{CellData, SheetData, SpreadsheetReader, SpreadsheetWriter};
use crate::transaction::WriteTransaction;
use dashsync_common::CellValue;
use std::collections::BTreeMap;

/// One worksheet held in memory while it is reconciled.
///
/// Coordinates are 1-based `(row, col)`. Every [`Sheet::set`] is recorded so
/// the caller can persist exactly the cells that changed.
#[derive(Clone, Debug, Default)]
pub struct Sheet {
    name: String,
    cells: BTreeMap<(u32, u32), CellData>,
    max_row: u32,
    max_col: u32,
    changes: BTreeMap<(u32, u32), CellValue>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_data(name: impl Into<String>, data: SheetData) -> Self {
        let (mut max_row, mut max_col) = data.dimensions.unwrap_or((0, 0));
        for &(r, c) in data.cells.keys() {
            max_row = max_row.max(r);
            max_col = max_col.max(c);
        }
        Self {
            name: name.into(),
            cells: data.cells,
            max_row,
            max_col,
            changes: BTreeMap::new(),
        }
    }

    pub fn load<R: SpreadsheetReader>(reader: &mut R, name: &str) -> Result<Self, R::Error> {
        let data = reader.read_sheet(name)?;
        Ok(Self::from_data(name, data))
    }

    /// Build a sheet from literal rows, starting at row 1 column 1.
    pub fn from_rows<I, R>(name: impl Into<String>, rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = CellValue>,
    {
        let mut cells = BTreeMap::new();
        for (r, row) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                if value.is_blank() {
                    continue;
                }
                cells.insert(
                    (r as u32 + 1, c as u32 + 1),
                    CellData {
                        value: Some(value),
                        formula: None,
                    },
                );
            }
        }
        Self::from_data(
            name,
            SheetData {
                cells,
                dimensions: None,
            },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_row(&self) -> u32 {
        self.max_row
    }

    pub fn max_col(&self) -> u32 {
        self.max_col
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&CellData> {
        self.cells.get(&(row, col))
    }

    pub fn get(&self, row: u32, col: u32) -> Option<&CellValue> {
        self.cells.get(&(row, col)).and_then(|c| c.value.as_ref())
    }

    /// A cell with a formula counts as filled even before it has a cached value.
    pub fn is_blank(&self, row: u32, col: u32) -> bool {
        self.cells.get(&(row, col)).is_none_or(CellData::is_blank)
    }

    /// Trimmed text of the cell, `None` when blank.
    pub fn text(&self, row: u32, col: u32) -> Option<String> {
        self.get(row, col).and_then(CellValue::as_text)
    }

    /// Row `row` as text, columns `1..=max_col`.
    pub fn row_text(&self, row: u32) -> Vec<Option<String>> {
        (1..=self.max_col).map(|c| self.text(row, c)).collect()
    }

    pub fn set(&mut self, row: u32, col: u32, value: CellValue) {
        self.max_row = self.max_row.max(row);
        self.max_col = self.max_col.max(col);
        self.cells.insert(
            (row, col),
            CellData {
                value: Some(value.clone()),
                formula: None,
            },
        );
        self.changes.insert((row, col), value);
    }

    pub fn changes(&self) -> &BTreeMap<(u32, u32), CellValue> {
        &self.changes
    }

    pub fn take_changes(&mut self) -> BTreeMap<(u32, u32), CellValue> {
        std::mem::take(&mut self.changes)
    }

    /// Queue every recorded change on `tx`, draining the change log.
    pub fn stage<W: SpreadsheetWriter>(&mut self, tx: &mut WriteTransaction<'_, W>) -> usize {
        let changes = self.take_changes();
        let n = changes.len();
        for ((row, col), value) in changes {
            tx.write_cell(&self.name, row, col, CellData::from_value(value));
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_tracks_changes_and_extent() {
        let mut sheet = Sheet::from_rows("S", vec![vec![CellValue::text("a"), CellValue::Int(1)]]);
        assert_eq!((sheet.max_row(), sheet.max_col()), (1, 2));
        assert!(sheet.changes().is_empty());

        sheet.set(3, 4, CellValue::Int(9));
        assert_eq!((sheet.max_row(), sheet.max_col()), (3, 4));
        assert_eq!(sheet.get(3, 4), Some(&CellValue::Int(9)));
        assert_eq!(sheet.take_changes().len(), 1);
        assert!(sheet.changes().is_empty());
    }

    #[test]
    fn formula_and_whitespace_cells_are_not_blank() {
        let mut data = SheetData::default();
        data.cells.insert((1, 1), CellData::from_formula("=A2*2"));
        data.cells.insert((1, 2), CellData::from_value("  "));
        data.cells.insert((1, 3), CellData::from_value(""));
        let sheet = Sheet::from_data("S", data);
        assert!(!sheet.is_blank(1, 1));
        assert!(!sheet.is_blank(1, 2));
        assert!(sheet.is_blank(1, 3));
        assert!(sheet.is_blank(9, 9));
        assert_eq!(sheet.text(1, 2), None);
    }
}
