use thiserror::Error as ThisError;

/// A type alias for `Result<T, csv_toolkit::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// The position at which a read-side error occurred.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ErrorPosition {
    /// 0-based logical row index (the header row does not count).
    pub row_index: u64,
    /// 1-based physical line number.
    pub line_number: u64,
    /// 0-based field index within the row, if the error is field-scoped.
    pub field_index: Option<usize>,
}

impl ErrorPosition {
    pub(crate) fn new(row_index: u64, line_number: u64, field_index: Option<usize>) -> Self {
        ErrorPosition { row_index, line_number, field_index }
    }
}

impl std::fmt::Display for ErrorPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.field_index {
            Some(i) => write!(f, "row {}, line {}, field {}", self.row_index, self.line_number, i),
            None => write!(f, "row {}, line {}", self.row_index, self.line_number),
        }
    }
}

/// An error that can occur when reading or writing CSV data.
///
/// There are important scenarios where an error is impossible: for example,
/// writing raw string fields with `flexible` enabled can never fail.
#[derive(Debug, ThisError)]
#[non_exhaustive]
pub enum Error {
    /// Malformed input under the configured dialect: a stray quote, data
    /// after a closing quote, an unterminated quoted field at EOF, or (with
    /// `detect_column_count`) a field count that disagrees with the first
    /// row.
    #[error("bad data at {pos}: {message}")]
    BadData { pos: ErrorPosition, message: &'static str },

    /// A column map references a column that the current row does not have.
    #[error("missing field at {pos}: column {column:?} has no value in this row")]
    MissingField { pos: ErrorPosition, column: Option<String> },

    /// A field slice could not be converted to the member's declared type.
    #[error("conversion failed at {pos}: could not convert {raw:?} to {target}")]
    Conversion { pos: ErrorPosition, raw: String, target: &'static str },

    /// Two records were written (or read, with `detect_column_count`) with
    /// an unequal number of fields and `flexible`/lenient recovery did not
    /// apply.
    #[error("found record with {len} fields, but the previous record has {expected_len} fields")]
    UnequalLengths { expected_len: u64, len: u64 },

    /// Invalid configuration or some other caller error unrelated to the
    /// data being read or written.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// A cooperative-async operation observed a cancellation request.
    #[error("operation cancelled")]
    Cancelled,

    /// The underlying character source or sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn bad_data(pos: ErrorPosition, message: &'static str) -> Error {
        Error::BadData { pos, message }
    }

    pub(crate) fn conversion(raw: impl Into<String>, target: &'static str) -> Error {
        Error::Conversion { pos: ErrorPosition::default(), raw: raw.into(), target }
    }

    /// Fill in the position of a position-carrying error raised before its
    /// row/line context was known (e.g. by a converter, which only knows
    /// `row_index`/`field_index`, not `line_number`).
    pub(crate) fn with_position(self, pos: ErrorPosition) -> Error {
        match self {
            Error::BadData { message, .. } => Error::BadData { pos, message },
            Error::MissingField { column, .. } => Error::MissingField { pos, column },
            Error::Conversion { raw, target, .. } => Error::Conversion { pos, raw, target },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_position() {
        let err = Error::bad_data(ErrorPosition::new(1, 3, Some(0)), "Unexpected quote in unquoted field");
        let msg = err.to_string();
        assert!(msg.contains("row 1, line 3, field 0"));
        assert!(msg.contains("Unexpected quote in unquoted field"));
    }
}
