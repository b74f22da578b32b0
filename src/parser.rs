//! The character-level state machine that turns a [`CharSource`] into rows.
//!
//! Field state (`InField`/`InQuotedField`/`AfterClosingQuote`) is local to
//! one field and never persisted across calls; only `detected_newline`,
//! `row_index`, `line_number`, and (with `detect_column_count`) the expected
//! field count survive between rows.

use crate::buffer::{rent_row_buffer, RowBuffer};
use crate::error::{Error, ErrorPosition, Result};
use crate::options::{BadDataContext, Mode, Options};
use crate::pool::Pooled;
use crate::source::CharSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FieldState {
    InField,
    InQuotedField,
    AfterClosingQuote,
}

/// The row-scoped facts a successful [`Parser::read_row`] hands back. The
/// row's fields themselves live in [`Parser::buffer`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct RowMeta {
    pub row_index: u64,
    pub line_number: u64,
}

/// Drives one [`CharSource`] through the field state machine, one row at a
/// time, into a pooled [`RowBuffer`].
pub(crate) struct Parser<S> {
    source: S,
    options: Options,
    buffer: Pooled<RowBuffer>,
    row_index: u64,
    line_number: u64,
    detected_newline: Option<&'static str>,
    expected_field_count: Option<usize>,
}

impl<S: CharSource> Parser<S> {
    pub(crate) fn new(source: S, options: Options) -> Parser<S> {
        Parser {
            source,
            options,
            buffer: rent_row_buffer(),
            row_index: 0,
            line_number: 1,
            detected_newline: None,
            expected_field_count: None,
        }
    }

    pub(crate) fn options(&self) -> &Options {
        &self.options
    }

    pub(crate) fn buffer(&self) -> &RowBuffer {
        &self.buffer
    }

    pub(crate) fn detected_newline(&self) -> Option<&'static str> {
        self.detected_newline
    }

    /// Read the next row, or `Ok(None)` at a clean end of stream.
    pub(crate) fn read_row(&mut self) -> Result<Option<RowMeta>> {
        loop {
            self.buffer.reset();
            let row_index = self.row_index;
            let start_line = self.line_number;

            if !self.parse_one_row(row_index, start_line)? {
                return Ok(None);
            }

            if self.options.ignore_blank_lines && is_blank_row(&self.buffer) {
                log::trace!("discarding blank line at line {}", start_line);
                continue;
            }

            self.row_index += 1;
            self.enforce_column_count(row_index, start_line)?;

            log::trace!("parsed row {} ({} fields)", row_index, self.buffer.field_count());
            return Ok(Some(RowMeta { row_index, line_number: start_line }));
        }
    }

    /// Parse one row's worth of characters into `self.buffer`. Returns
    /// `false` only for a clean end of stream with no data pending.
    fn parse_one_row(&mut self, row_index: u64, start_line: u64) -> Result<bool> {
        let mut state = FieldState::InField;
        let mut any_char_seen = false;
        let mut field_index: usize = 0;
        self.buffer.start_field();

        loop {
            let c = match self.source.next_char()? {
                Some(c) => c,
                None => {
                    if !any_char_seen {
                        return Ok(false);
                    }
                    if state == FieldState::InQuotedField {
                        self.raise_bad_data(
                            row_index,
                            start_line,
                            field_index,
                            "Unexpected end of file while inside a quoted field",
                        )?;
                    }
                    self.complete_field();
                    return Ok(true);
                }
            };
            any_char_seen = true;

            match state {
                FieldState::InField => {
                    if c == self.options.delimiter {
                        self.complete_field();
                        field_index += 1;
                        self.buffer.start_field();
                    } else if c == self.options.quote && self.buffer.current_field_len() == 0 {
                        state = FieldState::InQuotedField;
                    } else if c == self.options.quote {
                        self.raise_bad_data(
                            row_index,
                            start_line,
                            field_index,
                            "Unexpected quote in unquoted field",
                        )?;
                        self.buffer.push_char(c);
                    } else if is_newline_start(c) {
                        self.consume_newline_suffix(c)?;
                        self.complete_field();
                        return Ok(true);
                    } else if self.buffer.current_field_len() == 0
                        && self.options.trim.trims_start()
                        && c.is_whitespace()
                    {
                        // dropped: leading whitespace on an empty field
                    } else {
                        self.buffer.push_char(c);
                    }
                }

                FieldState::InQuotedField => {
                    if self.options.escape != self.options.quote && c == self.options.escape {
                        match self.source.next_char()? {
                            Some(d) if d == self.options.quote => self.buffer.push_char(self.options.quote),
                            Some(d) => {
                                self.source.pushback(d);
                                self.buffer.push_char(c);
                            }
                            None => self.buffer.push_char(c),
                        }
                    } else if c == self.options.quote {
                        match self.source.next_char()? {
                            Some(d) if d == self.options.quote => self.buffer.push_char(self.options.quote),
                            Some(d) => {
                                self.source.pushback(d);
                                state = FieldState::AfterClosingQuote;
                            }
                            None => state = FieldState::AfterClosingQuote,
                        }
                    } else {
                        self.buffer.push_char(c);
                    }
                }

                FieldState::AfterClosingQuote => {
                    if c == self.options.delimiter {
                        self.complete_field();
                        field_index += 1;
                        self.buffer.start_field();
                        state = FieldState::InField;
                    } else if is_newline_start(c) {
                        self.consume_newline_suffix(c)?;
                        self.complete_field();
                        return Ok(true);
                    } else if c.is_whitespace() {
                        // dropped: trailing whitespace after a closing quote
                    } else {
                        self.raise_bad_data(
                            row_index,
                            start_line,
                            field_index,
                            "Unexpected character after closing quote",
                        )?;
                        self.buffer.push_char(c);
                        state = FieldState::InField;
                    }
                }
            }
        }
    }

    fn consume_newline_suffix(&mut self, c: char) -> Result<()> {
        let newline = if c == '\r' {
            match self.source.next_char()? {
                Some('\n') => "\r\n",
                Some(d) => {
                    self.source.pushback(d);
                    "\r"
                }
                None => "\r",
            }
        } else {
            "\n"
        };
        if self.detected_newline.is_none() {
            self.detected_newline = Some(newline);
        }
        self.line_number += 1;
        Ok(())
    }

    /// Apply the trailing-trim policy to the just-finished field (applies to
    /// the raw completed token regardless of whether it was quoted) and
    /// commit it as a token.
    fn complete_field(&mut self) {
        if self.options.trim.trims_end() {
            let trimmed_len = self.buffer.current_field_str().trim_end().len();
            self.buffer.truncate_field_to(trimmed_len);
        }
        self.buffer.commit_field();
    }

    fn enforce_column_count(&mut self, row_index: u64, start_line: u64) -> Result<()> {
        if !self.options.detect_column_count {
            return Ok(());
        }
        let len = self.buffer.field_count();
        match self.expected_field_count {
            None => self.expected_field_count = Some(len),
            Some(expected) if expected != len => {
                self.raise_bad_data(
                    row_index,
                    start_line,
                    0,
                    "Row field count does not match the first row's field count",
                )?;
            }
            Some(_) => {}
        }
        Ok(())
    }

    /// Handle one bad-data event: always logged, and in `strict` mode this
    /// returns an error instead of letting the caller apply its recovery
    /// action.
    fn raise_bad_data(
        &mut self,
        row_index: u64,
        line_number: u64,
        field_index: usize,
        message: &'static str,
    ) -> Result<()> {
        log::warn!(
            "bad data at row {}, line {}, field {}: {}",
            row_index, line_number, field_index, message
        );
        match self.options.mode {
            Mode::Strict => Err(Error::bad_data(ErrorPosition::new(row_index, line_number, Some(field_index)), message)),
            Mode::Lenient => {
                if let Some(cb) = self.options.bad_data_callback() {
                    let ctx = BadDataContext {
                        row_index,
                        line_number,
                        field_index,
                        message,
                        raw_field: self.buffer.current_field_str().to_string(),
                    };
                    cb(&ctx);
                }
                Ok(())
            }
        }
    }
}

fn is_newline_start(c: char) -> bool {
    c == '\r' || c == '\n'
}

fn is_blank_row(buffer: &RowBuffer) -> bool {
    let tokens = buffer.tokens();
    tokens.len() == 1 && buffer.field_str(tokens[0]).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionsBuilder;
    use crate::source::StrCharSource;

    fn rows(input: &str, options: Options) -> Vec<Vec<String>> {
        let mut parser = Parser::new(StrCharSource::new(input), options);
        let mut out = Vec::new();
        while parser.read_row().unwrap().is_some() {
            out.push(parser.buffer().tokens().iter().map(|t| parser.buffer().field_str(*t).to_string()).collect());
        }
        out
    }

    #[test]
    fn quoted_delimiter() {
        let got = rows("id,name\n1,\"Ada,Lovelace\"\n", OptionsBuilder::new().build().unwrap());
        assert_eq!(got[1], vec!["1", "Ada,Lovelace"]);
    }

    #[test]
    fn embedded_newline_inside_quotes() {
        let got = rows("id,notes\n1,\"line1\nline2\"\n", OptionsBuilder::new().build().unwrap());
        assert_eq!(got[1][1], "line1\nline2");
    }

    #[test]
    fn doubled_quote_escape() {
        let got = rows("id,text\n1,\"a \"\"quote\"\" b\"\n", OptionsBuilder::new().build().unwrap());
        assert_eq!(got[1][1], "a \"quote\" b");
    }

    #[test]
    fn strict_column_count_mismatch_raises_at_expected_position() {
        let opts = OptionsBuilder::new().detect_column_count(true).build().unwrap();
        let mut parser = Parser::new(StrCharSource::new("a,b\n1,2\n3\n"), opts);
        assert!(parser.read_row().unwrap().is_some());
        let err = parser.read_row().unwrap_err();
        match err {
            Error::BadData { pos, .. } => {
                assert_eq!(pos.row_index, 1);
                assert_eq!(pos.line_number, 3);
                assert_eq!(pos.field_index, Some(0));
            }
            other => panic!("expected BadData, got {other:?}"),
        }
    }

    #[test]
    fn lenient_bad_data_invokes_callback_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let opts = OptionsBuilder::new()
            .mode(Mode::Lenient)
            .bad_data_found(move |ctx| {
                calls2.fetch_add(1, Ordering::SeqCst);
                assert_eq!(ctx.field_index, 1);
                assert_eq!(ctx.message, "Unexpected quote in unquoted field");
            })
            .build()
            .unwrap();
        let got = rows("a,b\n1,te\"st\n", opts);
        assert_eq!(got[0], vec!["1", "te\"st"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ignore_blank_lines_skips_empty_rows() {
        let opts = OptionsBuilder::new().ignore_blank_lines(true).build().unwrap();
        let got = rows("a\n\nb\n", opts);
        assert_eq!(got, vec![vec!["a".to_string()], vec!["b".to_string()]]);
    }

    #[test]
    fn detected_newline_is_first_observed_separator() {
        let mut parser = Parser::new(StrCharSource::new("a\r\nb\n"), OptionsBuilder::new().build().unwrap());
        parser.read_row().unwrap();
        assert_eq!(parser.detected_newline(), Some("\r\n"));
    }

    #[test]
    fn trims_fields_per_policy() {
        let opts = OptionsBuilder::new().trim(crate::options::Trim::Both).build().unwrap();
        let got = rows("  a  , b\n", opts);
        assert_eq!(got[0], vec!["a", "b"]);
    }

    /// Mirrors how this codebase's CLI-shaped relatives call `env_logger::init()`
    /// once at startup (see `other_examples/54e3fc2b_faradayio-scrubcsv__src-main.rs.rs`);
    /// a library has no `main` to do that in, so this test installs the logger
    /// instead and exercises the `trace!`/`warn!` call sites in `read_row` and
    /// `raise_bad_data` under it. Run with `RUST_LOG=trace` to see the output.
    #[test]
    fn log_call_sites_run_under_an_installed_logger() {
        let _ = env_logger::try_init();

        let opts = OptionsBuilder::new().ignore_blank_lines(true).build().unwrap();
        assert_eq!(rows("a\n\nb\n", opts), vec![vec!["a".to_string()], vec!["b".to_string()]]);

        let opts = OptionsBuilder::new().mode(Mode::Lenient).bad_data_found(|_| {}).build().unwrap();
        assert_eq!(rows("a,b\n1,te\"st\n", opts)[0], vec!["1", "te\"st"]);
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;
    use crate::options::{OptionsBuilder, Trim};
    use crate::source::StrCharSource;
    use crate::writer::Writer;

    /// A field alphabet that stresses the quoting/escaping transitions:
    /// the delimiter, the quote character, both newline forms, and plain
    /// whitespace/ASCII/non-ASCII content.
    fn field_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                Just(','),
                Just('"'),
                Just('\n'),
                Just('\r'),
                Just(' '),
                Just('a'),
                Just('z'),
                Just('é'),
            ],
            0..16,
        )
        .prop_map(|chars| chars.into_iter().collect())
    }

    fn plain_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec(prop_oneof![Just('a'), Just('b'), Just('1'), Just('9')], 0..8)
            .prop_map(|chars| chars.into_iter().collect())
    }

    proptest! {
        /// Whatever `Writer` decides to quote/escape, `Parser` must read
        /// back exactly the value that was written — the two halves of
        /// the dialect (§4.1 read transitions, §4.5 write quoting rule)
        /// must agree on every input, not just the hand-picked examples
        /// above.
        #[test]
        fn write_then_parse_round_trips_arbitrary_fields(value in field_strategy()) {
            let opts = OptionsBuilder::new().build().unwrap();
            let mut wtr = Writer::new(String::new(), opts.clone());
            wtr.write_field(&value).unwrap();
            wtr.next_record().unwrap();
            let written = wtr.into_inner();

            let mut parser = Parser::new(StrCharSource::new(&written), opts);
            parser.read_row().unwrap().unwrap();
            let token = parser.buffer().tokens()[0];
            prop_assert_eq!(parser.buffer().field_str(token), value.as_str());
        }

        /// `Trim::End` must remove exactly the whitespace appended after a
        /// trim-safe value, regardless of how much was appended, and leave
        /// the rest of the value untouched.
        #[test]
        fn trim_end_removes_exactly_the_appended_whitespace(base in plain_strategy(), pad in 0usize..6) {
            let input = format!("{}{}\n", base, " ".repeat(pad));
            let opts = OptionsBuilder::new().trim(Trim::End).build().unwrap();
            let mut parser = Parser::new(StrCharSource::new(&input), opts);
            parser.read_row().unwrap().unwrap();
            let token = parser.buffer().tokens()[0];
            prop_assert_eq!(parser.buffer().field_str(token), base.as_str());
        }
    }
}
