//! An iterator adapter that serializes each item to its own CSV-encoded
//! `String`, one allocation per record — handy for streaming a record
//! source straight into a chunked HTTP body or similar sink.
//!
//! ```
//! use std::sync::Arc;
//! use csv_toolkit::{MapBuilder, Options, RecordIter};
//!
//! #[derive(Default)]
//! struct Row { city: String, population: u64 }
//!
//! # fn main() {
//! let map = Arc::new(
//!     MapBuilder::<Row>::new()
//!         .column("city", |r: &Row| r.city.clone(), |r, v| r.city = v)
//!         .column("population", |r: &Row| r.population, |r, v| r.population = v)
//!         .build(),
//! );
//! let rows = vec![Row { city: "Boston".into(), population: 4_628_910 }];
//! let mut csv_iter = RecordIter::new(rows, map, Options::default());
//!
//! let mut out = String::new();
//! for chunk in &mut csv_iter {
//!     out.push_str(&chunk.unwrap());
//! }
//! assert_eq!(out, "city,population\nBoston,4628910\n");
//! # }
//! ```

use std::sync::Arc;

use crate::error::Result;
use crate::map::ColumnMap;
use crate::options::Options;
use crate::writer::Writer;

pub struct RecordIter<T, I> {
    iter: I,
    map: Arc<ColumnMap<T>>,
    options: Options,
    header_pending: bool,
}

impl<T, I: Iterator<Item = T>> RecordIter<T, I> {
    pub fn new(iter: impl IntoIterator<IntoIter = I>, map: Arc<ColumnMap<T>>, options: Options) -> RecordIter<T, I> {
        let header_pending = options.has_header();
        RecordIter { iter: iter.into_iter(), map, options, header_pending }
    }
}

impl<T: 'static, I: Iterator<Item = T>> Iterator for RecordIter<T, I> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.header_pending {
            self.header_pending = false;
            let mut wtr = Writer::new(String::new(), self.options.clone());
            return Some(wtr.write_header(&self.map).map(|_| wtr.into_inner()));
        }
        let record = self.iter.next()?;
        let mut wtr = Writer::new(String::new(), self.options.clone());
        Some(wtr.write_record(&record, &self.map).map(|_| wtr.into_inner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MapBuilder;
    use crate::options::OptionsBuilder;

    #[derive(Default)]
    struct Row {
        city: String,
        population: u64,
    }

    fn sample_map() -> Arc<ColumnMap<Row>> {
        Arc::new(
            MapBuilder::<Row>::new()
                .column("city", |r: &Row| r.city.clone(), |r, v| r.city = v)
                .column("population", |r: &Row| r.population, |r, v| r.population = v)
                .build(),
        )
    }

    #[test]
    fn yields_header_then_one_chunk_per_record() {
        let rows = vec![
            Row { city: "Boston".to_string(), population: 4_628_910 },
            Row { city: "Concord".to_string(), population: 42_695 },
        ];
        let iter = RecordIter::new(rows, sample_map(), OptionsBuilder::new().build().unwrap());
        let chunks: Vec<String> = iter.map(Result::unwrap).collect();
        assert_eq!(chunks, vec!["city,population\n".to_string(), "Boston,4628910\n".to_string(), "Concord,42695\n".to_string()]);
    }

    #[test]
    fn skips_header_when_disabled() {
        let rows = vec![Row { city: "Boston".to_string(), population: 1 }];
        let options = OptionsBuilder::new().has_header(false).build().unwrap();
        let iter = RecordIter::new(rows, sample_map(), options);
        let chunks: Vec<String> = iter.map(Result::unwrap).collect();
        assert_eq!(chunks, vec!["Boston,1\n".to_string()]);
    }
}
