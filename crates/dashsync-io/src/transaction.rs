use crate::traits::{CellData, SpreadsheetWriter};

#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    Cell {
        sheet: String,
        row: u32,
        col: u32,
        data: CellData,
    },
    CreateSheet {
        name: String,
    },
}

/// Buffers writes against a backend until [`WriteTransaction::commit`].
///
/// Dropping an uncommitted transaction discards the buffered operations.
pub struct WriteTransaction<'a, W: SpreadsheetWriter> {
    writer: &'a mut W,
    ops: Vec<WriteOp>,
    committed: bool,
}

impl<'a, W: SpreadsheetWriter> WriteTransaction<'a, W> {
    pub fn new(writer: &'a mut W) -> Self {
        Self {
            writer,
            ops: Vec::new(),
            committed: false,
        }
    }

    pub fn write_cell(&mut self, sheet: &str, row: u32, col: u32, data: CellData) -> &mut Self {
        self.ops.push(WriteOp::Cell {
            sheet: sheet.to_string(),
            row,
            col,
            data,
        });
        self
    }

    pub fn create_sheet(&mut self, name: &str) -> &mut Self {
        self.ops.push(WriteOp::CreateSheet {
            name: name.to_string(),
        });
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every buffered op, then flush and save the backend.
    ///
    /// An empty transaction leaves the backend (and its file) untouched.
    /// Returns the number of cells written.
    pub fn commit(mut self) -> Result<usize, W::Error> {
        self.committed = true;
        if self.ops.is_empty() {
            return Ok(0);
        }
        let mut cells = 0;
        for op in std::mem::take(&mut self.ops) {
            match op {
                WriteOp::Cell {
                    sheet,
                    row,
                    col,
                    data,
                } => {
                    self.writer.write_cell(&sheet, row, col, data)?;
                    cells += 1;
                }
                WriteOp::CreateSheet { name } => self.writer.create_sheet(&name)?,
            }
        }
        self.writer.flush()?;
        self.writer.save()?;
        Ok(cells)
    }

    pub fn rollback(mut self) {
        self.ops.clear();
        self.committed = true;
    }
}

impl<W: SpreadsheetWriter> Drop for WriteTransaction<'_, W> {
    fn drop(&mut self) {
        if !self.committed && !self.ops.is_empty() {
            tracing::debug!(
                discarded = self.ops.len(),
                "write transaction dropped without commit"
            );
        }
    }
}
