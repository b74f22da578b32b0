//! A `futures::Stream` adapter, mirroring [`crate::iter::RecordIter`] but
//! over an async record source. Formatting itself never suspends (§5); only
//! the upstream `poll_next` can return `Pending`.

use pin_project::pin_project;

use crate::error::Result;
use crate::map::ColumnMap;
use crate::options::Options;
use crate::writer::Writer;
use std::sync::Arc;

#[pin_project]
pub struct RecordStream<T, S> {
    #[pin]
    stream: S,

    map: Arc<ColumnMap<T>>,
    options: Options,
    header_pending: bool,
}

impl<T, S> RecordStream<T, S> {
    pub fn new(stream: S, map: Arc<ColumnMap<T>>, options: Options) -> RecordStream<T, S> {
        let header_pending = options.has_header();
        RecordStream { stream, map, options, header_pending }
    }
}

impl<T: 'static, S: futures::Stream<Item = T>> futures::Stream for RecordStream<T, S> {
    type Item = Result<String>;

    fn poll_next(self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Option<Self::Item>> {
        let mut p = self.project();

        if *p.header_pending {
            *p.header_pending = false;
            let mut wtr = Writer::new(String::new(), p.options.clone());
            let out = wtr.write_header(p.map).map(|_| wtr.into_inner());
            return std::task::Poll::Ready(Some(out));
        }

        let item = match p.stream.as_mut().poll_next(cx) {
            std::task::Poll::Pending => return std::task::Poll::Pending,
            std::task::Poll::Ready(None) => return std::task::Poll::Ready(None),
            std::task::Poll::Ready(Some(item)) => item,
        };

        let mut wtr = Writer::new(String::new(), p.options.clone());
        std::task::Poll::Ready(Some(wtr.write_record(&item, p.map).map(|_| wtr.into_inner())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MapBuilder;
    use crate::options::OptionsBuilder;
    use futures::StreamExt;

    #[derive(Default)]
    struct Row {
        city: String,
        population: u64,
    }

    #[tokio::test]
    async fn streams_header_then_records() {
        let map = Arc::new(
            MapBuilder::<Row>::new()
                .column("city", |r: &Row| r.city.clone(), |r, v| r.city = v)
                .column("population", |r: &Row| r.population, |r, v| r.population = v)
                .build(),
        );
        let rows = vec![Row { city: "Boston".to_string(), population: 4_628_910 }];
        let row_stream = futures::stream::iter(rows);
        let csv_stream = RecordStream::new(row_stream, map, OptionsBuilder::new().build().unwrap());

        let chunks: Vec<String> = csv_stream.map(Result::unwrap).collect().await;
        assert_eq!(chunks, vec!["city,population\n".to_string(), "Boston,4628910\n".to_string()]);
    }
}
