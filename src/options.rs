use std::sync::Arc;

use serde::Deserialize;

use crate::convert::ConverterRegistry;
use crate::culture::Culture;
use crate::error::{Error, Result};

/// Whitespace trimming policy applied to completed field tokens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trim {
    /// Preserve fields exactly as they appear in the source. This is the
    /// default.
    #[default]
    None,
    /// Drop leading whitespace. Only takes effect while a field is still
    /// empty, so quoted content is never affected.
    Start,
    /// Drop trailing whitespace from the completed token, quoted or not.
    End,
    /// Both `Start` and `End`.
    Both,
}

impl Trim {
    pub(crate) fn trims_start(self) -> bool {
        matches!(self, Trim::Start | Trim::Both)
    }

    pub(crate) fn trims_end(self) -> bool {
        matches!(self, Trim::End | Trim::Both)
    }
}

/// Global parser policy: raise on bad data, or recover and keep going.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Any bad-data condition raises an error and aborts the current read.
    #[default]
    Strict,
    /// Bad-data conditions invoke the `bad_data_found` callback and parsing
    /// recovers using the action defined for that transition.
    Lenient,
}

/// The record terminator used when writing. Reading always recognizes
/// `\n`, `\r\n`, and `\r` regardless of this setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Newline {
    Lf,
    CrLf,
    Cr,
}

impl Newline {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Newline::Lf => "\n",
            Newline::CrLf => "\r\n",
            Newline::Cr => "\r",
        }
    }

    /// The newline convention of the platform this crate was built for.
    pub fn platform_default() -> Newline {
        if cfg!(windows) {
            Newline::CrLf
        } else {
            Newline::Lf
        }
    }
}

/// Structured context handed to a `bad_data_found` callback (lenient mode)
/// or logged as a `warn!` event.
#[derive(Clone, Debug)]
pub struct BadDataContext {
    pub row_index: u64,
    pub line_number: u64,
    pub field_index: usize,
    pub message: &'static str,
    pub raw_field: String,
}

/// A callback invoked once per recovered bad-data event in lenient mode.
pub type BadDataCallback = Arc<dyn Fn(&BadDataContext) + Send + Sync>;

/// Immutable, validated configuration shared by a parser/reader/writer.
///
/// Built once via [`OptionsBuilder`] and then cheaply cloned (it is a thin
/// `Arc`-backed value) across however many reader/writer instances need it.
#[derive(Clone)]
pub struct Options {
    pub(crate) delimiter: char,
    pub(crate) quote: char,
    pub(crate) escape: char,
    pub(crate) has_header: bool,
    pub(crate) newline: Option<Newline>,
    pub(crate) trim: Trim,
    pub(crate) mode: Mode,
    pub(crate) detect_column_count: bool,
    pub(crate) ignore_blank_lines: bool,
    pub(crate) culture: Culture,
    pub(crate) char_buffer_size: usize,
    pub(crate) byte_buffer_size: usize,
    pub(crate) bad_data_found: Option<BadDataCallback>,
    pub(crate) converters: ConverterRegistry,
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("delimiter", &self.delimiter)
            .field("quote", &self.quote)
            .field("escape", &self.escape)
            .field("has_header", &self.has_header)
            .field("newline", &self.newline)
            .field("trim", &self.trim)
            .field("mode", &self.mode)
            .field("detect_column_count", &self.detect_column_count)
            .field("ignore_blank_lines", &self.ignore_blank_lines)
            .field("culture", &self.culture.name())
            .field("char_buffer_size", &self.char_buffer_size)
            .field("byte_buffer_size", &self.byte_buffer_size)
            .field("bad_data_found", &self.bad_data_found.is_some())
            .finish()
    }
}

impl Options {
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn quote(&self) -> char {
        self.quote
    }

    pub fn escape(&self) -> char {
        self.escape
    }

    pub fn has_header(&self) -> bool {
        self.has_header
    }

    pub fn trim(&self) -> Trim {
        self.trim
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn culture(&self) -> &Culture {
        &self.culture
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    pub(crate) fn newline_str(&self) -> &'static str {
        self.newline.unwrap_or_else(Newline::platform_default).as_str()
    }

    pub(crate) fn bad_data_callback(&self) -> Option<&BadDataCallback> {
        self.bad_data_found.as_ref()
    }
}

impl Default for Options {
    fn default() -> Options {
        OptionsBuilder::default().build().expect("default options are always valid")
    }
}

/// A deserializable subset of [`Options`], for embedding applications that
/// load CSV dialect settings from TOML/JSON/etc. This crate depends only on
/// `serde`'s derive machinery, not on any particular format.
///
/// Fields not present in the source document take the same defaults as
/// [`OptionsBuilder::default`]. `culture` is a name (`"en-US"`, `"fr-FR"`,
/// or anything else, which falls back to the invariant culture) rather than
/// a `Culture` value, since `Culture` itself has no stable textual encoding.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    pub delimiter: char,
    pub quote: char,
    pub escape: Option<char>,
    pub has_header: bool,
    pub trim: Trim,
    pub mode: Mode,
    pub detect_column_count: bool,
    pub ignore_blank_lines: bool,
    pub culture: String,
    pub char_buffer_size: usize,
    pub byte_buffer_size: usize,
}

impl Default for CsvConfig {
    fn default() -> CsvConfig {
        let defaults = OptionsBuilder::default();
        CsvConfig {
            delimiter: defaults.delimiter,
            quote: defaults.quote,
            escape: defaults.escape,
            has_header: defaults.has_header,
            trim: defaults.trim,
            mode: defaults.mode,
            detect_column_count: defaults.detect_column_count,
            ignore_blank_lines: defaults.ignore_blank_lines,
            culture: defaults.culture.name().to_string(),
            char_buffer_size: defaults.char_buffer_size,
            byte_buffer_size: defaults.byte_buffer_size,
        }
    }
}

/// Builder for [`Options`]. Mirrors this crate's `ReaderBuilder`/
/// `WriterBuilder` shape: every setter takes `&mut self` and returns `self`
/// so calls chain, and `build()` performs validation once.
pub struct OptionsBuilder {
    delimiter: char,
    quote: char,
    escape: Option<char>,
    has_header: bool,
    newline: Option<Newline>,
    trim: Trim,
    mode: Mode,
    detect_column_count: bool,
    ignore_blank_lines: bool,
    culture: Culture,
    char_buffer_size: usize,
    byte_buffer_size: usize,
    bad_data_found: Option<BadDataCallback>,
    converters: ConverterRegistry,
}

impl Default for OptionsBuilder {
    fn default() -> OptionsBuilder {
        OptionsBuilder {
            delimiter: ',',
            quote: '"',
            escape: None,
            has_header: true,
            newline: None,
            trim: Trim::None,
            mode: Mode::Strict,
            detect_column_count: false,
            ignore_blank_lines: false,
            culture: Culture::default(),
            char_buffer_size: 1024,
            byte_buffer_size: 1024,
            bad_data_found: None,
            converters: ConverterRegistry::new(),
        }
    }
}

impl OptionsBuilder {
    pub fn new() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    pub fn delimiter(&mut self, delimiter: char) -> &mut Self {
        self.delimiter = delimiter;
        self
    }

    pub fn quote(&mut self, quote: char) -> &mut Self {
        self.quote = quote;
        self
    }

    pub fn escape(&mut self, escape: char) -> &mut Self {
        self.escape = Some(escape);
        self
    }

    pub fn has_header(&mut self, yes: bool) -> &mut Self {
        self.has_header = yes;
        self
    }

    pub fn newline(&mut self, newline: Newline) -> &mut Self {
        self.newline = Some(newline);
        self
    }

    pub fn trim(&mut self, trim: Trim) -> &mut Self {
        self.trim = trim;
        self
    }

    pub fn mode(&mut self, mode: Mode) -> &mut Self {
        self.mode = mode;
        self
    }

    pub fn detect_column_count(&mut self, yes: bool) -> &mut Self {
        self.detect_column_count = yes;
        self
    }

    pub fn ignore_blank_lines(&mut self, yes: bool) -> &mut Self {
        self.ignore_blank_lines = yes;
        self
    }

    pub fn culture(&mut self, culture: Culture) -> &mut Self {
        self.culture = culture;
        self
    }

    pub fn char_buffer_size(&mut self, size: usize) -> &mut Self {
        self.char_buffer_size = size;
        self
    }

    pub fn byte_buffer_size(&mut self, size: usize) -> &mut Self {
        self.byte_buffer_size = size;
        self
    }

    pub fn bad_data_found<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&BadDataContext) + Send + Sync + 'static,
    {
        self.bad_data_found = Some(Arc::new(callback));
        self
    }

    pub fn converters(&mut self, converters: ConverterRegistry) -> &mut Self {
        self.converters = converters;
        self
    }

    /// Populate this builder from a deserialized [`CsvConfig`], e.g. one
    /// loaded from a TOML or JSON settings file. Overwrites every field
    /// `apply_config` knows about; call earlier setters first if mixing
    /// config-file and programmatic overrides.
    pub fn apply_config(&mut self, config: &CsvConfig) -> &mut Self {
        self.delimiter = config.delimiter;
        self.quote = config.quote;
        self.escape = config.escape;
        self.has_header = config.has_header;
        self.trim = config.trim;
        self.mode = config.mode;
        self.detect_column_count = config.detect_column_count;
        self.ignore_blank_lines = config.ignore_blank_lines;
        self.culture = Culture::by_name(&config.culture);
        self.char_buffer_size = config.char_buffer_size;
        self.byte_buffer_size = config.byte_buffer_size;
        self
    }

    pub fn build(&self) -> Result<Options> {
        let escape = self.escape.unwrap_or(self.quote);

        if self.delimiter == self.quote {
            return Err(Error::Argument("delimiter and quote must differ".into()));
        }
        if self.delimiter == '\r' || self.delimiter == '\n' {
            return Err(Error::Argument("delimiter must not be CR or LF".into()));
        }
        if self.char_buffer_size < 16 {
            return Err(Error::Argument("char_buffer_size must be at least 16".into()));
        }
        if self.byte_buffer_size < 16 {
            return Err(Error::Argument("byte_buffer_size must be at least 16".into()));
        }

        Ok(Options {
            delimiter: self.delimiter,
            quote: self.quote,
            escape,
            has_header: self.has_header,
            newline: self.newline,
            trim: self.trim,
            mode: self.mode,
            detect_column_count: self.detect_column_count,
            ignore_blank_lines: self.ignore_blank_lines,
            culture: self.culture.clone(),
            char_buffer_size: self.char_buffer_size,
            byte_buffer_size: self.byte_buffer_size,
            bad_data_found: self.bad_data_found.clone(),
            converters: self.converters.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_matching_delimiter_and_quote() {
        let err = OptionsBuilder::new().delimiter('"').build().unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
    }

    #[test]
    fn rejects_newline_delimiter() {
        let err = OptionsBuilder::new().delimiter('\n').build().unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
    }

    #[test]
    fn rejects_tiny_buffers() {
        let err = OptionsBuilder::new().char_buffer_size(4).build().unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
    }

    #[test]
    fn escape_defaults_to_quote() {
        let opts = OptionsBuilder::new().build().unwrap();
        assert_eq!(opts.escape(), opts.quote());
    }

    #[test]
    fn config_glue_parses_toml_like_json_and_applies() {
        let config: CsvConfig = serde_json::from_str(
            r#"{"delimiter": ";", "trim": "both", "mode": "lenient", "culture": "fr-FR"}"#,
        )
        .unwrap();
        let opts = OptionsBuilder::new().apply_config(&config).build().unwrap();
        assert_eq!(opts.delimiter(), ';');
        assert_eq!(opts.trim(), Trim::Both);
        assert_eq!(opts.mode(), Mode::Lenient);
        assert_eq!(opts.culture().name(), "fr-FR");
    }

    #[test]
    fn config_defaults_match_builder_defaults() {
        let config = CsvConfig::default();
        let opts = OptionsBuilder::new().apply_config(&config).build().unwrap();
        assert_eq!(opts.delimiter(), ',');
        assert_eq!(opts.mode(), Mode::Strict);
    }
}
