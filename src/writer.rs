//! Field-by-field emission with quoting, escaping, and newline policy.
//!
//! ```
//! use csv_toolkit::{Options, Writer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut wtr = Writer::new(String::new(), Options::builder().build()?);
//! wtr.write_field("a")?;
//! wtr.write_field("b,c")?;
//! wtr.next_record()?;
//! assert_eq!(wtr.into_inner(), "a,\"b,c\"\n");
//! # Ok(())
//! # }
//! ```

use crate::convert::{convert_to_field, ConverterContext, ToField};
use crate::error::Result;
use crate::map::ColumnMap;
use crate::options::Options;
use crate::sink::CharSink;

/// Writes CSV rows to a [`CharSink`], one field at a time.
///
/// Not safe for concurrent use from multiple tasks; independent `Writer`s
/// over independent sinks are fully parallel-safe.
pub struct Writer<W> {
    sink: W,
    options: Options,
    row_index: u64,
    field_index: usize,
}

impl<W: CharSink> Writer<W> {
    pub fn new(sink: W, options: Options) -> Writer<W> {
        Writer { sink, options, row_index: 0, field_index: 0 }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Emit one raw field, quoting it if required by the dialect (§4.5):
    /// non-empty and either edge-whitespace, or containing the delimiter,
    /// quote, CR, or LF.
    pub fn write_field(&mut self, value: &str) -> Result<()> {
        if self.field_index > 0 {
            self.sink.write_char(self.options.delimiter())?;
        }
        if needs_quoting(value, &self.options) {
            self.write_quoted(value)?;
        } else {
            self.sink.write_str(value)?;
        }
        self.field_index += 1;
        Ok(())
    }

    fn write_quoted(&mut self, value: &str) -> Result<()> {
        let quote = self.options.quote();
        let escape = self.options.escape();
        self.sink.write_char(quote)?;
        for c in value.chars() {
            if c == quote {
                self.sink.write_char(escape)?;
            }
            self.sink.write_char(c)?;
        }
        self.sink.write_char(quote)
    }

    /// Emit `value` via the converter chain (custom converter, else the
    /// built-in [`ToField`] impl): `itoa`/`ryu` back the primitive impls, so
    /// formatting a number never allocates beyond the field's own text.
    pub fn write_value<T: ToField + 'static>(&mut self, value: &T) -> Result<()> {
        let ctx = ConverterContext {
            culture: self.options.culture().clone(),
            row_index: self.row_index,
            field_index: self.field_index,
            column_name: None,
        };
        let formatted = convert_to_field(value, &ctx, self.options.converters())?;
        self.write_field(&formatted)
    }

    /// Emit each non-ignored mapping's column name, then a record
    /// terminator.
    pub fn write_header<T: 'static>(&mut self, map: &ColumnMap<T>) -> Result<()> {
        for name in map.header_names() {
            self.write_field(name)?;
        }
        self.next_record()
    }

    /// Project `record` through `map` and write one field per non-ignored
    /// member, then a record terminator.
    pub fn write_record<T: 'static>(&mut self, record: &T, map: &ColumnMap<T>) -> Result<()> {
        let fields = map.project(record, self.options.culture(), self.options.converters(), self.row_index)?;
        for field in &fields {
            self.write_field(field)?;
        }
        self.next_record()
    }

    /// Terminate the current record: write the configured (or platform
    /// default) newline, then reset the field cursor and advance the row
    /// counter.
    pub fn next_record(&mut self) -> Result<()> {
        self.sink.write_str(self.options.newline_str())?;
        self.field_index = 0;
        self.row_index += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()
    }
}

fn needs_quoting(value: &str, options: &Options) -> bool {
    if value.is_empty() {
        return false;
    }
    let edge_whitespace = value.starts_with(char::is_whitespace) || value.ends_with(char::is_whitespace);
    edge_whitespace
        || value
            .chars()
            .any(|c| c == options.delimiter() || c == options.quote() || c == '\r' || c == '\n')
}

/// The async twin of [`Writer`], gated behind the `stream` feature. Suspends
/// only at the sink's async write/flush calls; quoting/formatting logic is
/// identical to the sync path (duplicated rather than shared, since Rust has
/// no async trait methods without boxing — see [`crate::reader::AsyncReader`]
/// for the same tradeoff on the read side).
#[cfg(feature = "stream")]
pub struct AsyncWriter<W> {
    sink: crate::sink::AsyncIoCharSink<W>,
    options: Options,
    row_index: u64,
    field_index: usize,
}

#[cfg(feature = "stream")]
impl<W: futures::io::AsyncWrite + Unpin> AsyncWriter<W> {
    pub fn new(sink: W, options: Options) -> AsyncWriter<W> {
        AsyncWriter { sink: crate::sink::AsyncIoCharSink::new(sink), options, row_index: 0, field_index: 0 }
    }

    pub async fn write_field(&mut self, value: &str, cancel: &crate::cancel::CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(crate::error::Error::Cancelled);
        }
        if self.field_index > 0 {
            self.sink.write_char(self.options.delimiter()).await?;
        }
        if needs_quoting(value, &self.options) {
            let quote = self.options.quote();
            let escape = self.options.escape();
            self.sink.write_char(quote).await?;
            for c in value.chars() {
                if c == quote {
                    self.sink.write_char(escape).await?;
                }
                self.sink.write_char(c).await?;
            }
            self.sink.write_char(quote).await?;
        } else {
            self.sink.write_str(value).await?;
        }
        self.field_index += 1;
        Ok(())
    }

    pub async fn next_record(&mut self, cancel: &crate::cancel::CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(crate::error::Error::Cancelled);
        }
        self.sink.write_str(self.options.newline_str()).await?;
        self.field_index = 0;
        self.row_index += 1;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.sink.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MapBuilder;
    use crate::options::OptionsBuilder;

    #[derive(Default)]
    struct Person {
        name: String,
        age: i32,
    }

    #[test]
    fn plain_fields_are_not_quoted() {
        let mut wtr = Writer::new(String::new(), OptionsBuilder::new().build().unwrap());
        wtr.write_field("hello").unwrap();
        wtr.next_record().unwrap();
        assert_eq!(wtr.into_inner(), "hello\n");
    }

    #[test]
    fn fields_needing_quotes_round_trip() {
        for value in ["a,b", "a\"b", "a\nb", " a", "a "] {
            let mut wtr = Writer::new(String::new(), OptionsBuilder::new().build().unwrap());
            wtr.write_field(value).unwrap();
            wtr.next_record().unwrap();
            let written = wtr.into_inner();

            let mut parser = crate::parser::Parser::new(
                crate::source::StrCharSource::new(&written),
                OptionsBuilder::new().build().unwrap(),
            );
            parser.read_row().unwrap();
            assert_eq!(parser.buffer().field_str(parser.buffer().tokens()[0]), value);
        }
    }

    #[test]
    fn write_record_projects_through_map() {
        let map: ColumnMap<Person> = MapBuilder::new()
            .column("Name", |p: &Person| p.name.clone(), |p, v| p.name = v)
            .column("Age", |p: &Person| p.age, |p, v| p.age = v)
            .build();
        let mut wtr = Writer::new(String::new(), OptionsBuilder::new().build().unwrap());
        wtr.write_header(&map).unwrap();
        wtr.write_record(&Person { name: "Ada".to_string(), age: 36 }, &map).unwrap();
        assert_eq!(wtr.into_inner(), "Name,Age\nAda,36\n");
    }

    #[test]
    fn delimiter_only_between_fields() {
        let mut wtr = Writer::new(String::new(), OptionsBuilder::new().build().unwrap());
        wtr.write_field("a").unwrap();
        wtr.write_field("b").unwrap();
        wtr.next_record().unwrap();
        assert_eq!(wtr.into_inner(), "a,b\n");
    }
}
