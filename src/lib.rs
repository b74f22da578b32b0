//! A streaming, low-allocation CSV reader and writer with culture-aware
//! typed conversion.
//!
//! Fields are never copied out of the row buffer until the caller asks: the
//! parser ([`parser`]) slices a pooled, reused character buffer, [`Reader`]
//! exposes those slices as [`row::RowView`]s (or converts them into typed
//! records via a [`map::ColumnMap`]), and [`Writer`] mirrors the same
//! quoting/escaping rules back out.
//!
//! ```
//! use csv_toolkit::{Options, Reader, StrCharSource};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut rdr = Reader::new(StrCharSource::new("id,name\n1,\"Ada,Lovelace\"\n"), Options::default());
//! let row = rdr.try_read_row()?.unwrap();
//! assert_eq!(row.get_field(1), Some("Ada,Lovelace"));
//! # Ok(())
//! # }
//! ```

mod buffer;
mod cancel;
mod convert;
mod culture;
mod error;
mod iter;
mod map;
mod options;
mod parser;
mod pool;
mod reader;
mod row;
mod sink;
mod source;
#[cfg(feature = "stream")]
mod stream;
mod writer;

pub use cancel::CancellationToken;
pub use convert::{ConverterContext, ConverterRegistry, EnumField, FromField, ToField};
pub use culture::{Culture, DateOrder};
pub use error::{Error, ErrorPosition, Result};
pub use iter::RecordIter;
pub use map::{ColumnMap, MapBuilder, MapRegistry, MemberMapping};
pub use options::{BadDataCallback, BadDataContext, CsvConfig, Mode, Newline, Options, OptionsBuilder, Trim};
pub use reader::{Header, OrderedRecord, Reader};
pub use row::RowView;
pub use sink::{CharSink, IoCharSink};
pub use source::{CharSource, IoCharSource, IterCharSource, StrCharSource};
#[cfg(feature = "stream")]
pub use source::AsyncIoCharSource;
#[cfg(feature = "stream")]
pub use sink::AsyncIoCharSink;
#[cfg(feature = "stream")]
pub use reader::AsyncReader;
#[cfg(feature = "stream")]
pub use stream::RecordStream;
#[cfg(feature = "stream")]
pub use writer::AsyncWriter;
pub use writer::Writer;
