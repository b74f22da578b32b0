//! A borrowed view over one parsed row, backed by a [`RowBuffer`].

use crate::buffer::{FieldToken, RowBuffer};

/// A read-only, zero-copy handle to the fields of one row.
///
/// Borrows the [`RowBuffer`] it was built from, so it cannot outlive the
/// `try_read_row` call that produced it; callers that need to keep field
/// data around past the next read must copy it out with [`RowView::get_field`].
pub struct RowView<'a> {
    buffer: &'a RowBuffer,
    row_index: u64,
    line_number: u64,
}

impl<'a> RowView<'a> {
    pub(crate) fn new(buffer: &'a RowBuffer, row_index: u64, line_number: u64) -> RowView<'a> {
        RowView { buffer, row_index, line_number }
    }

    /// The 0-based logical row index (the header row, if any, does not count).
    pub fn row_index(&self) -> u64 {
        self.row_index
    }

    /// The 1-based physical line number at which this row started.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    pub fn field_count(&self) -> usize {
        self.buffer.field_count()
    }

    /// The raw `(start, length)` byte span of field `index` within the
    /// underlying buffer, for callers that want to slice it themselves.
    pub fn get_field_span(&self, index: usize) -> Option<FieldToken> {
        self.buffer.tokens().get(index).copied()
    }

    /// The text a [`FieldToken`] spans, as returned by
    /// [`RowView::get_field_span`]. `row.resolve(row.get_field_span(i).unwrap())`
    /// always equals `row.get_field(i).unwrap()`.
    pub fn resolve(&self, token: FieldToken) -> &str {
        self.buffer.field_str(token)
    }

    /// The text of field `index`, or `None` if the row has no such field.
    pub fn get_field(&self, index: usize) -> Option<&str> {
        self.get_field_span(index).map(|tok| self.resolve(tok))
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> + '_ {
        self.buffer.tokens().iter().map(move |tok| self.buffer.field_str(*tok))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_fields_by_index() {
        let mut buffer = RowBuffer::default();
        buffer.start_field();
        for c in "a".chars() {
            buffer.push_char(c);
        }
        buffer.commit_field();
        buffer.start_field();
        for c in "bb".chars() {
            buffer.push_char(c);
        }
        buffer.commit_field();

        let view = RowView::new(&buffer, 0, 1);
        assert_eq!(view.field_count(), 2);
        assert_eq!(view.get_field(0), Some("a"));
        assert_eq!(view.get_field(1), Some("bb"));
        assert_eq!(view.get_field(2), None);
        assert_eq!(view.fields().collect::<Vec<_>>(), vec!["a", "bb"]);
    }

    #[test]
    fn get_field_span_resolves_to_the_same_text_as_get_field() {
        let mut buffer = RowBuffer::default();
        buffer.start_field();
        for c in "hello".chars() {
            buffer.push_char(c);
        }
        buffer.commit_field();

        let view = RowView::new(&buffer, 0, 1);
        let span = view.get_field_span(0).unwrap();
        assert_eq!(span.len(), "hello".len());
        assert_eq!(view.resolve(span), view.get_field(0).unwrap());
        assert_eq!(view.get_field_span(1), None);
    }
}
