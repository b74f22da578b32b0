//! Row loop, header handling, column binding, record materialization.

use std::collections::HashMap;

use crate::buffer::FieldToken;
use crate::error::{Error, ErrorPosition, Result};
use crate::map::ColumnMap;
use crate::options::Options;
use crate::parser::{Parser, RowMeta};
use crate::row::RowView;
use crate::source::CharSource;

/// The captured header row: column names in declaration order, plus a
/// name→index lookup (first occurrence wins on duplicate names).
#[derive(Clone, Debug, Default)]
pub struct Header {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Header {
    fn from_row(row: &RowView) -> Header {
        let names: Vec<String> = row.fields().map(|s| s.to_string()).collect();
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Header { names, index }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}

/// An ordered header-name → field-value mapping, as returned by
/// [`Reader::try_read_dictionary`]. Missing header names synthesize
/// `Column<N>` (1-based).
pub type OrderedRecord = Vec<(String, String)>;

/// Owns a [`Parser`] plus the header it captured (if any), and exposes the
/// four read styles described in the external interface: row view,
/// `read`/`get_field`, dictionary, and typed record.
pub struct Reader<S> {
    parser: Parser<S>,
    header: Option<Header>,
    header_attempted: bool,
    last_row_meta: Option<RowMeta>,
}

impl<S: CharSource> Reader<S> {
    pub fn new(source: S, options: Options) -> Reader<S> {
        Reader {
            parser: Parser::new(source, options),
            header: None,
            header_attempted: false,
            last_row_meta: None,
        }
    }

    pub fn options(&self) -> &Options {
        self.parser.options()
    }

    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// The first observed newline sequence, once at least one row has been
    /// read.
    pub fn detected_newline(&self) -> Option<&'static str> {
        self.parser.detected_newline()
    }

    fn ensure_header(&mut self) -> Result<bool> {
        if self.header_attempted {
            return Ok(true);
        }
        self.header_attempted = true;
        if !self.parser.options().has_header() {
            return Ok(true);
        }
        match self.parser.read_row()? {
            Some(meta) => {
                let view = RowView::new(self.parser.buffer(), meta.row_index, meta.line_number);
                self.header = Some(Header::from_row(&view));
                log::debug!("captured header with {} columns", view.field_count());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn adjust_row_index(&self, idx: u64) -> u64 {
        if self.header.is_some() {
            idx.saturating_sub(1)
        } else {
            idx
        }
    }

    fn adjust_error(&self, err: Error) -> Error {
        let adjust = |pos: ErrorPosition| ErrorPosition { row_index: self.adjust_row_index(pos.row_index), ..pos };
        match err {
            Error::BadData { pos, message } => Error::BadData { pos: adjust(pos), message },
            Error::MissingField { pos, column } => Error::MissingField { pos: adjust(pos), column },
            Error::Conversion { pos, raw, target } => Error::Conversion { pos: adjust(pos), raw, target },
            other => other,
        }
    }

    fn advance(&mut self) -> Result<Option<RowMeta>> {
        if !self.ensure_header().map_err(|e| self.adjust_error(e))? {
            return Ok(None);
        }
        let result = match self.parser.read_row() {
            Ok(meta) => meta,
            Err(e) => return Err(self.adjust_error(e)),
        };
        let adjusted = result.map(|meta| RowMeta { row_index: self.adjust_row_index(meta.row_index), line_number: meta.line_number });
        self.last_row_meta = adjusted;
        Ok(adjusted)
    }

    /// Read the next row as a zero-copy [`RowView`].
    pub fn try_read_row(&mut self) -> Result<Option<RowView<'_>>> {
        match self.advance()? {
            Some(meta) => Ok(Some(RowView::new(self.parser.buffer(), meta.row_index, meta.line_number))),
            None => Ok(None),
        }
    }

    /// Read the next row; `true` if one was available. Field access then
    /// goes through [`Reader::get_field`]/[`Reader::get_field_span`].
    pub fn read(&mut self) -> Result<bool> {
        Ok(self.advance()?.is_some())
    }

    /// The `(start, length)` span of field `index` in the last-read row.
    pub fn get_field_span(&self, index: usize) -> Option<FieldToken> {
        self.last_row_meta?;
        self.parser.buffer().tokens().get(index).copied()
    }

    /// The text of field `index` in the last-read row.
    pub fn get_field(&self, index: usize) -> Option<&str> {
        self.get_field_span(index).map(|token| self.parser.buffer().field_str(token))
    }

    /// Read the next row as an ordered header-name → value mapping.
    pub fn try_read_dictionary(&mut self) -> Result<Option<OrderedRecord>> {
        match self.advance()? {
            Some(meta) => {
                let view = RowView::new(self.parser.buffer(), meta.row_index, meta.line_number);
                let mut out = Vec::with_capacity(view.field_count());
                for i in 0..view.field_count() {
                    let name = self
                        .header
                        .as_ref()
                        .and_then(|h| h.names().get(i).cloned())
                        .unwrap_or_else(|| format!("Column{}", i + 1));
                    out.push((name, view.get_field(i).unwrap_or("").to_string()));
                }
                Ok(Some(out))
            }
            None => Ok(None),
        }
    }

    /// Read the next row and bind it to `T` via `map`.
    pub fn get_record<T: Default + 'static>(&mut self, map: &ColumnMap<T>) -> Result<Option<T>> {
        match self.advance()? {
            Some(meta) => {
                let view = RowView::new(self.parser.buffer(), meta.row_index, meta.line_number);
                let options = self.parser.options();
                let record = map.bind(
                    &view,
                    self.header.as_ref(),
                    options.culture(),
                    options.converters(),
                    options.mode(),
                    meta.row_index,
                    meta.line_number,
                    options.bad_data_callback(),
                )?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}

/// The async twin of [`Reader`], gated behind the `stream` feature.
///
/// Rather than duplicating the character-level state machine in an
/// async-compatible form (Rust has no async trait methods without boxing,
/// and this codebase has no `async-trait` dependency), this drains the
/// async source into memory once and then drives the same synchronous
/// [`Parser`] over it. Suspension still happens only at I/O — a single
/// await up front — just not per-refill as the sync path does; see
/// DESIGN.md for the tradeoff.
#[cfg(feature = "stream")]
type OwnedCharSource = crate::source::IterCharSource<std::vec::IntoIter<char>>;

#[cfg(feature = "stream")]
pub struct AsyncReader<R> {
    inner: Option<Reader<OwnedCharSource>>,
    source: Option<R>,
    byte_buffer_size: usize,
    options: Option<Options>,
}

#[cfg(feature = "stream")]
impl<R: futures::io::AsyncRead + Unpin> AsyncReader<R> {
    pub fn new(source: R, options: Options) -> AsyncReader<R> {
        AsyncReader {
            inner: None,
            source: Some(source),
            byte_buffer_size: options.byte_buffer_size,
            options: Some(options),
        }
    }

    async fn ensure_loaded(&mut self, cancel: &crate::cancel::CancellationToken) -> Result<()> {
        use futures::io::AsyncReadExt;

        if self.inner.is_some() {
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut source = self.source.take().expect("AsyncReader polled after completion");
        let mut bytes = Vec::with_capacity(self.byte_buffer_size);
        source.read_to_end(&mut bytes).await?;
        let text = String::from_utf8(bytes).map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        let chars: Vec<char> = text.chars().collect();
        let options = self.options.take().expect("AsyncReader polled after completion");
        self.inner = Some(Reader::new(crate::source::IterCharSource::new(chars.into_iter()), options));
        Ok(())
    }

    pub async fn try_read_row_async(&mut self, cancel: &crate::cancel::CancellationToken) -> Result<Option<OrderedRecord>> {
        self.ensure_loaded(cancel).await?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.inner.as_mut().unwrap().try_read_dictionary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MapBuilder;
    use crate::options::OptionsBuilder;
    use crate::source::StrCharSource;

    #[derive(Default, Debug, PartialEq)]
    struct Record {
        id: i32,
        name: String,
    }

    #[test]
    fn captures_header_and_binds_by_name() {
        let options = OptionsBuilder::new().build().unwrap();
        let mut reader = Reader::new(StrCharSource::new("name,id\nAda,1\n"), options);
        let map: ColumnMap<Record> = MapBuilder::new()
            .column("id", |r: &Record| r.id, |r, v| r.id = v)
            .column("name", |r: &Record| r.name.clone(), |r, v| r.name = v)
            .build();
        let record = reader.get_record(&map).unwrap().unwrap();
        assert_eq!(record, Record { id: 1, name: "Ada".to_string() });
        assert_eq!(reader.header().unwrap().names(), &["name".to_string(), "id".to_string()]);
    }

    #[test]
    fn try_read_dictionary_synthesizes_missing_header_names() {
        let options = OptionsBuilder::new().has_header(false).build().unwrap();
        let mut reader = Reader::new(StrCharSource::new("1,2,3\n"), options);
        let dict = reader.try_read_dictionary().unwrap().unwrap();
        assert_eq!(dict[0].0, "Column1");
        assert_eq!(dict[2].1, "3");
    }

    #[test]
    fn row_index_excludes_header_in_errors() {
        let options = OptionsBuilder::new().detect_column_count(true).build().unwrap();
        let mut reader = Reader::new(StrCharSource::new("a,b\n1,2\n3\n"), options);
        assert!(reader.try_read_row().unwrap().is_some());
        let err = reader.try_read_row().unwrap_err();
        match err {
            Error::BadData { pos, .. } => {
                assert_eq!(pos.row_index, 1);
                assert_eq!(pos.line_number, 3);
            }
            other => panic!("expected BadData, got {other:?}"),
        }
    }

    #[test]
    fn get_field_reads_last_row() {
        let options = OptionsBuilder::new().build().unwrap();
        let mut reader = Reader::new(StrCharSource::new("a,b\n1,2\n"), options);
        assert!(reader.read().unwrap());
        assert_eq!(reader.get_field(0), Some("1"));
        assert_eq!(reader.get_field(1), Some("2"));
    }

    #[test]
    fn get_field_span_content_matches_get_field() {
        let options = OptionsBuilder::new().build().unwrap();
        let mut reader = Reader::new(StrCharSource::new("a,b\n1,22\n"), options);
        assert!(reader.read().unwrap());
        let span = reader.get_field_span(1).unwrap();
        assert_eq!(span.len(), 2);
        assert_eq!(&reader.get_field(1).unwrap()[..span.len()], "22");
        assert_eq!(reader.get_field_span(2), None);
    }
}
