//! Converting field slices to typed values and back.
//!
//! Resolution order for parsing (and its mirror for formatting) is:
//! per-member converter (handled by [`crate::map`]), then a per-type custom
//! converter from [`ConverterRegistry`], then the built-in impls below, then
//! (for parsing) failure — there is no further generic fallback because Rust
//! has no runtime "change type" operation to fall back to.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::culture::{Culture, DateOrder};
use crate::error::{Error, Result};

/// Context passed by reference to every convert/format call.
#[derive(Clone, Debug)]
pub struct ConverterContext {
    pub culture: Culture,
    pub row_index: u64,
    pub field_index: usize,
    pub column_name: Option<String>,
}

/// Parses a field slice into `Self`.
pub trait FromField: Sized {
    fn from_field(raw: &str, ctx: &ConverterContext) -> Result<Self>;
}

/// Formats `Self` back into a field's textual form.
pub trait ToField {
    fn to_field(&self, ctx: &ConverterContext) -> Result<String>;
}

/// User-implemented for enum types, since this crate has no derive macro to
/// generate the case-insensitive name matching a reflective mapper would get
/// for free. Registered per-type through [`ConverterRegistry`] rather than
/// blanket-implementing `FromField`/`ToField`, so ordinary enums opt in
/// explicitly instead of silently competing with future built-ins.
pub trait EnumField: Sized {
    fn from_name(name: &str) -> Option<Self>;
    fn to_name(&self) -> &'static str;
}

/// Parse helper for types implementing [`EnumField`]: case-insensitive name
/// match, as the built-in conversion table's enum entry (§4.3) specifies.
pub fn parse_enum_field<T: EnumField>(raw: &str) -> Result<T> {
    T::from_name(raw.trim()).ok_or_else(|| Error::conversion(raw, std::any::type_name::<T>()))
}

impl FromField for String {
    fn from_field(raw: &str, _ctx: &ConverterContext) -> Result<String> {
        Ok(raw.to_string())
    }
}

impl ToField for String {
    fn to_field(&self, _ctx: &ConverterContext) -> Result<String> {
        Ok(self.clone())
    }
}

impl ToField for str {
    fn to_field(&self, _ctx: &ConverterContext) -> Result<String> {
        Ok(self.to_string())
    }
}

impl FromField for bool {
    fn from_field(raw: &str, _ctx: &ConverterContext) -> Result<bool> {
        match raw.trim() {
            s if s.eq_ignore_ascii_case("true") || s == "1" => Ok(true),
            s if s.eq_ignore_ascii_case("false") || s == "0" => Ok(false),
            _ => Err(Error::conversion(raw, "bool")),
        }
    }
}

impl ToField for bool {
    fn to_field(&self, _ctx: &ConverterContext) -> Result<String> {
        Ok(if *self { "true".to_string() } else { "false".to_string() })
    }
}

impl FromField for char {
    fn from_field(raw: &str, _ctx: &ConverterContext) -> Result<char> {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(Error::conversion(raw, "char")),
        }
    }
}

impl ToField for char {
    fn to_field(&self, _ctx: &ConverterContext) -> Result<String> {
        Ok(self.to_string())
    }
}

macro_rules! impl_integer_field {
    ($($t:ty),+ $(,)?) => {
        $(
            impl FromField for $t {
                fn from_field(raw: &str, ctx: &ConverterContext) -> Result<$t> {
                    ctx.culture.normalize_numeric(raw.trim())
                        .parse::<$t>()
                        .map_err(|_| Error::conversion(raw, stringify!($t)))
                }
            }

            impl ToField for $t {
                fn to_field(&self, _ctx: &ConverterContext) -> Result<String> {
                    let mut buf = itoa::Buffer::new();
                    Ok(buf.format(*self).to_string())
                }
            }
        )+
    };
}

impl_integer_field!(i8, i16, i32, i64, u8, u16, u32, u64);

macro_rules! impl_float_field {
    ($($t:ty),+ $(,)?) => {
        $(
            impl FromField for $t {
                fn from_field(raw: &str, ctx: &ConverterContext) -> Result<$t> {
                    ctx.culture.normalize_numeric(raw.trim())
                        .parse::<$t>()
                        .map_err(|_| Error::conversion(raw, stringify!($t)))
                }
            }

            impl ToField for $t {
                fn to_field(&self, _ctx: &ConverterContext) -> Result<String> {
                    let mut buf = ryu::Buffer::new();
                    Ok(buf.format(*self).to_string())
                }
            }
        )+
    };
}

impl_float_field!(f32, f64);

impl FromField for Decimal {
    fn from_field(raw: &str, ctx: &ConverterContext) -> Result<Decimal> {
        let normalized = ctx.culture.normalize_numeric(raw.trim());
        normalized.parse::<Decimal>().map_err(|_| Error::conversion(raw, "Decimal"))
    }
}

impl ToField for Decimal {
    fn to_field(&self, _ctx: &ConverterContext) -> Result<String> {
        Ok(self.to_string())
    }
}

impl FromField for Uuid {
    fn from_field(raw: &str, _ctx: &ConverterContext) -> Result<Uuid> {
        Uuid::parse_str(raw.trim()).map_err(|_| Error::conversion(raw, "Uuid"))
    }
}

impl ToField for Uuid {
    fn to_field(&self, _ctx: &ConverterContext) -> Result<String> {
        Ok(self.to_string())
    }
}

/// Splits a short date's three numeric components, in whatever order the
/// culture declares, into `(year, month, day)`.
fn split_date_components(raw: &str, culture: &Culture) -> Option<(i32, u32, u32)> {
    let sep = culture.date_component_separator();
    let parts: Vec<&str> = raw.trim().split(sep).collect();
    if parts.len() != 3 {
        return None;
    }
    let nums: Vec<i64> = parts.iter().filter_map(|p| p.parse::<i64>().ok()).collect();
    if nums.len() != 3 {
        return None;
    }
    let (y, m, d) = match culture.date_order() {
        DateOrder::Ymd => (nums[0], nums[1], nums[2]),
        DateOrder::Mdy => (nums[2], nums[0], nums[1]),
        DateOrder::Dmy => (nums[2], nums[1], nums[0]),
    };
    Some((y as i32, m as u32, d as u32))
}

impl FromField for NaiveDate {
    fn from_field(raw: &str, ctx: &ConverterContext) -> Result<NaiveDate> {
        split_date_components(raw, &ctx.culture)
            .and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
            .ok_or_else(|| Error::conversion(raw, "NaiveDate"))
    }
}

impl ToField for NaiveDate {
    fn to_field(&self, ctx: &ConverterContext) -> Result<String> {
        let sep = ctx.culture.date_component_separator();
        let (a, b, c) = match ctx.culture.date_order() {
            DateOrder::Ymd => (self.format("%Y").to_string(), self.format("%m").to_string(), self.format("%d").to_string()),
            DateOrder::Mdy => (self.format("%m").to_string(), self.format("%d").to_string(), self.format("%Y").to_string()),
            DateOrder::Dmy => (self.format("%d").to_string(), self.format("%m").to_string(), self.format("%Y").to_string()),
        };
        Ok(format!("{a}{sep}{b}{sep}{c}"))
    }
}

impl FromField for NaiveTime {
    fn from_field(raw: &str, _ctx: &ConverterContext) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M"))
            .map_err(|_| Error::conversion(raw, "NaiveTime"))
    }
}

impl ToField for NaiveTime {
    fn to_field(&self, _ctx: &ConverterContext) -> Result<String> {
        Ok(self.format("%H:%M:%S").to_string())
    }
}

impl FromField for NaiveDateTime {
    fn from_field(raw: &str, ctx: &ConverterContext) -> Result<NaiveDateTime> {
        let raw = raw.trim();
        let (date_part, time_part) = raw
            .split_once(' ')
            .or_else(|| raw.split_once('T'))
            .ok_or_else(|| Error::conversion(raw, "NaiveDateTime"))?;
        let date = NaiveDate::from_field(date_part, ctx)?;
        let time = NaiveTime::from_field(time_part, ctx)?;
        Ok(NaiveDateTime::new(date, time))
    }
}

impl ToField for NaiveDateTime {
    fn to_field(&self, ctx: &ConverterContext) -> Result<String> {
        Ok(format!("{} {}", self.date().to_field(ctx)?, self.time().to_field(ctx)?))
    }
}

impl<T: FromField> FromField for Option<T> {
    fn from_field(raw: &str, ctx: &ConverterContext) -> Result<Option<T>> {
        if raw.is_empty() {
            Ok(None)
        } else {
            T::from_field(raw, ctx).map(Some)
        }
    }
}

impl<T: ToField> ToField for Option<T> {
    fn to_field(&self, ctx: &ConverterContext) -> Result<String> {
        match self {
            Some(v) => v.to_field(ctx),
            None => Ok(String::new()),
        }
    }
}

type ParseFn<T> = Arc<dyn Fn(&str, &ConverterContext) -> Result<T> + Send + Sync>;
type FormatFn<T> = Arc<dyn Fn(&T, &ConverterContext) -> Result<String> + Send + Sync>;

#[derive(Default)]
struct Registered {
    parse: Option<Box<dyn Any + Send + Sync>>,
    format: Option<Box<dyn Any + Send + Sync>>,
}

/// A type-erased registry of per-type custom converters, consulted before
/// the built-in table (§4.3). Keyed by `TypeId`, behind a mutex, so it can
/// be populated and read from any thread; cheap to clone since the storage
/// is shared via `Arc`.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    inner: Arc<Mutex<HashMap<TypeId, Registered>>>,
}

impl ConverterRegistry {
    pub fn new() -> ConverterRegistry {
        ConverterRegistry::default()
    }

    pub fn register_parser<T, F>(&self, f: F)
    where
        T: 'static,
        F: Fn(&str, &ConverterContext) -> Result<T> + Send + Sync + 'static,
    {
        let boxed: ParseFn<T> = Arc::new(f);
        let mut map = self.inner.lock().unwrap();
        map.entry(TypeId::of::<T>()).or_default().parse = Some(Box::new(boxed));
    }

    pub fn register_formatter<T, F>(&self, f: F)
    where
        T: 'static,
        F: Fn(&T, &ConverterContext) -> Result<String> + Send + Sync + 'static,
    {
        let boxed: FormatFn<T> = Arc::new(f);
        let mut map = self.inner.lock().unwrap();
        map.entry(TypeId::of::<T>()).or_default().format = Some(Box::new(boxed));
    }

    pub(crate) fn parser<T: 'static>(&self) -> Option<ParseFn<T>> {
        let map = self.inner.lock().unwrap();
        map.get(&TypeId::of::<T>())?.parse.as_ref()?.downcast_ref::<ParseFn<T>>().cloned()
    }

    pub(crate) fn formatter<T: 'static>(&self) -> Option<FormatFn<T>> {
        let map = self.inner.lock().unwrap();
        map.get(&TypeId::of::<T>())?.format.as_ref()?.downcast_ref::<FormatFn<T>>().cloned()
    }
}

/// Parse `raw` into `T`: custom converter first, then the built-in impl.
pub fn convert_from_field<T: FromField + 'static>(raw: &str, ctx: &ConverterContext, registry: &ConverterRegistry) -> Result<T> {
    if let Some(custom) = registry.parser::<T>() {
        return custom(raw, ctx);
    }
    T::from_field(raw, ctx)
}

/// Format `value`: custom converter first, then the built-in impl.
pub fn convert_to_field<T: ToField + 'static>(value: &T, ctx: &ConverterContext, registry: &ConverterRegistry) -> Result<String> {
    if let Some(custom) = registry.formatter::<T>() {
        return custom(value, ctx);
    }
    value.to_field(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(culture: Culture) -> ConverterContext {
        ConverterContext { culture, row_index: 0, field_index: 0, column_name: None }
    }

    #[test]
    fn parses_fr_fr_decimal() {
        let v = f64::from_field("12,5", &ctx(Culture::fr_fr())).unwrap();
        assert!((v - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_dmy_date() {
        let d = NaiveDate::from_field("31/12/2025", &ctx(Culture::fr_fr())).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn empty_slice_is_none_for_option() {
        let v: Option<i32> = Option::<i32>::from_field("", &ctx(Culture::invariant())).unwrap();
        assert_eq!(v, None);
    }

    #[test]
    fn custom_parser_overrides_builtin() {
        let registry = ConverterRegistry::new();
        registry.register_parser::<i32, _>(|_raw, _ctx| Ok(999));
        let v = convert_from_field::<i32>("7", &ctx(Culture::invariant()), &registry).unwrap();
        assert_eq!(v, 999);
    }

    #[test]
    fn bool_accepts_numeric_and_word_forms() {
        let c = ctx(Culture::invariant());
        assert_eq!(bool::from_field("TRUE", &c).unwrap(), true);
        assert_eq!(bool::from_field("0", &c).unwrap(), false);
        assert!(bool::from_field("nope", &c).is_err());
    }
}
