//! The pooled, append-only buffer the parser fills one row at a time.
//!
//! Fields are never copied out of `buf`: each completed field is recorded as
//! a `(start, length)` byte-offset pair into `buf`, and [`crate::row::RowView`]
//! slices back into it on demand.

use crate::pool::{Pool, Poolable};

/// A zero-copy reference to one field's bytes within a [`RowBuffer`].
///
/// The offsets are public so a caller holding a [`FieldToken`] from
/// [`crate::row::RowView::get_field_span`] can slice the row's text itself
/// (e.g. `&row.get_field(0).unwrap()[..span.len()]`), or resolve it back to
/// a `&str` via [`crate::row::RowView::resolve`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldToken {
    pub start: usize,
    pub length: usize,
}

impl FieldToken {
    pub(crate) fn new(start: usize, length: usize) -> FieldToken {
        FieldToken { start, length }
    }

    /// The byte length of the field this token spans.
    pub fn len(self) -> usize {
        self.length
    }

    pub fn is_empty(self) -> bool {
        self.length == 0
    }

    pub fn range(self) -> std::ops::Range<usize> {
        self.start..self.start + self.length
    }
}

/// One row's worth of character data plus the field tokens that slice it.
///
/// Reused row over row via [`Pool`]: `reset` truncates `buf` and `tokens`
/// without freeing their backing allocations, so steady-state parsing of a
/// large file performs no further heap activity once the pool has warmed up.
#[derive(Default)]
pub struct RowBuffer {
    buf: String,
    tokens: Vec<FieldToken>,
    field_start: usize,
}

impl RowBuffer {
    /// Begin a new field at the buffer's current end.
    pub(crate) fn start_field(&mut self) {
        self.field_start = self.buf.len();
    }

    /// Append one decoded character to the field currently being built.
    pub(crate) fn push_char(&mut self, c: char) {
        self.buf.push(c);
    }

    /// Drop the last pushed character, if any. Used to undo a speculative
    /// push (e.g. a quote character later found to close a quoted field).
    pub(crate) fn pop_char(&mut self) {
        self.buf.pop();
    }

    /// The current length, in bytes, of the field being built.
    pub(crate) fn current_field_len(&self) -> usize {
        self.buf.len() - self.field_start
    }

    /// Truncate the field currently being built to `len` bytes, measured
    /// from its start. Used to apply trailing-trim without rescanning.
    pub(crate) fn truncate_field_to(&mut self, len: usize) {
        self.buf.truncate(self.field_start + len);
    }

    /// The raw bytes of the field currently being built, not yet committed
    /// as a token.
    pub(crate) fn current_field_str(&self) -> &str {
        &self.buf[self.field_start..]
    }

    /// Commit the field currently being built as a token and start the next
    /// one immediately after it.
    pub(crate) fn commit_field(&mut self) {
        let len = self.buf.len() - self.field_start;
        self.tokens.push(FieldToken::new(self.field_start, len));
        self.field_start = self.buf.len();
    }

    pub(crate) fn tokens(&self) -> &[FieldToken] {
        &self.tokens
    }

    pub(crate) fn field_str(&self, token: FieldToken) -> &str {
        &self.buf[token.range()]
    }

    pub(crate) fn field_count(&self) -> usize {
        self.tokens.len()
    }
}

impl Poolable for RowBuffer {
    fn reset(&mut self) {
        self.buf.clear();
        self.tokens.clear();
        self.field_start = 0;
    }
}

static ROW_BUFFER_POOL: Pool<RowBuffer> = Pool::new();

/// Rent a [`RowBuffer`] from the process-wide pool.
pub(crate) fn rent_row_buffer() -> crate::pool::Pooled<RowBuffer> {
    ROW_BUFFER_POOL.rent()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commits_tokens_at_correct_offsets() {
        let mut buf = RowBuffer::default();
        buf.start_field();
        for c in "hello".chars() {
            buf.push_char(c);
        }
        buf.commit_field();
        buf.start_field();
        for c in "world".chars() {
            buf.push_char(c);
        }
        buf.commit_field();

        let tokens = buf.tokens();
        assert_eq!(tokens.len(), 2);
        assert_eq!(buf.field_str(tokens[0]), "hello");
        assert_eq!(buf.field_str(tokens[1]), "world");
    }

    #[test]
    fn reset_clears_without_deallocating() {
        let mut buf = RowBuffer::default();
        buf.start_field();
        buf.push_char('x');
        buf.commit_field();
        let cap_before = {
            buf.reset();
            buf.field_count()
        };
        assert_eq!(cap_before, 0);
    }

    #[test]
    fn truncate_field_to_trims_trailing_bytes() {
        let mut buf = RowBuffer::default();
        buf.start_field();
        for c in "value  ".chars() {
            buf.push_char(c);
        }
        buf.truncate_field_to(5);
        assert_eq!(buf.current_field_str(), "value");
    }
}
