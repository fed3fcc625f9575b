use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{backend} backend error: {message}")]
    Backend { backend: String, message: String },

    #[error("sheet `{0}` not found")]
    MissingSheet(String),

    #[error("{sheet}!{cell}: {message}")]
    Cell {
        sheet: String,
        cell: String,
        message: String,
    },
}

impl IoError {
    pub fn from_backend<E: std::error::Error>(backend: &str, err: E) -> Self {
        IoError::Backend {
            backend: backend.to_string(),
            message: err.to_string(),
        }
    }
}

/// Attach an A1 location to an error raised while touching a cell.
pub fn with_cell_context<E: std::fmt::Display>(sheet: &str, row: u32, col: u32, err: E) -> IoError {
    IoError::Cell {
        sheet: sheet.to_string(),
        cell: cell_ref(row, col),
        message: err.to_string(),
    }
}

/// 1-based column number to letters (`1` → `A`, `28` → `AB`).
pub fn col_to_a1(col: u32) -> String {
    let mut n = col;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

pub fn cell_ref(row: u32, col: u32) -> String {
    format!("{}{}", col_to_a1(col), row)
}
