use thiserror::Error;

/// A page request that could not be completed. Ends pagination early.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode page response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failures while persisting a result set.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("no items to export")]
    Empty,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("XLSX error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}
