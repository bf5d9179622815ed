use thiserror::Error;

pub type Result<T> = std::result::Result<T, CaseLogError>;

/// Failures raised while turning a case log export into a progress report.
///
/// Row numbers are 1-based CSV line numbers, so the header is line 1.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaseLogError {
    /// Unparseable date or malformed row shape; aborts the run.
    #[error("row {row}: {message}")]
    Parse { row: usize, message: String },

    /// Role outside `Surgeon`/`Assistant`; aborts the run.
    #[error("row {row}: unknown resident role `{role}`")]
    UnknownRole { row: usize, role: String },

    /// Category that truncates to an empty label. The row is excluded, the run continues.
    #[error("row {row}: category `{label}` has no text before the compound delimiter")]
    MalformedCategory { row: usize, label: String },

    /// Requirements table missing, unreadable or invalid; fatal.
    #[error("requirements table {source_name}: {message}")]
    Config { source_name: String, message: String },
}

impl CaseLogError {
    pub(crate) fn from_csv(fallback_row: usize, err: &csv::Error) -> Self {
        let row = err
            .position()
            .map(|position| position.line() as usize)
            .unwrap_or(fallback_row);
        CaseLogError::Parse {
            row,
            message: err.to_string(),
        }
    }
}
