//! Binding CSV columns to record fields.
//!
//! Rust has no runtime reflection, so a [`ColumnMap`] is built once per type
//! from closures — either hand-written via [`MapBuilder`], or generated at
//! compile time by the [`crate::define_columns`] macro, which expands
//! `record.field` accesses directly rather than walking an attribute list.
//! Either way the result is the same closure-based shape, cached per type by
//! [`MapRegistry`].

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use crate::convert::{convert_from_field, convert_to_field, ConverterContext, ConverterRegistry, FromField, ToField};
use crate::culture::Culture;
use crate::error::{Error, ErrorPosition, Result};
use crate::options::{BadDataCallback, BadDataContext, Mode};
use crate::reader::Header;
use crate::row::RowView;

type Getter<T> = Arc<dyn Fn(&T, &ConverterContext, &ConverterRegistry) -> Result<String> + Send + Sync>;
type Setter<T> = Arc<dyn Fn(&mut T, &str, &ConverterContext, &ConverterRegistry) -> Result<()> + Send + Sync>;

/// One record field's binding to a CSV column.
pub struct MemberMapping<T> {
    name: String,
    index: Option<usize>,
    ignore: bool,
    property_type: &'static str,
    getter: Getter<T>,
    setter: Setter<T>,
}

impl<T> MemberMapping<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn is_ignored(&self) -> bool {
        self.ignore
    }

    pub fn property_type(&self) -> &'static str {
        self.property_type
    }

    fn resolve_index(&self, declared_position: usize, header: Option<&Header>) -> Option<usize> {
        if let Some(idx) = self.index {
            return Some(idx);
        }
        if let Some(header) = header {
            if let Some(idx) = header.index_of(&self.name) {
                return Some(idx);
            }
        }
        Some(declared_position)
    }
}

/// An ordered set of [`MemberMapping`]s for one record type `T`.
pub struct ColumnMap<T> {
    mappings: Vec<MemberMapping<T>>,
}

impl<T> ColumnMap<T> {
    pub fn mappings(&self) -> &[MemberMapping<T>] {
        &self.mappings
    }

    /// Emit the header row text for this map's non-ignored columns, in
    /// declaration order.
    pub(crate) fn header_names(&self) -> Vec<&str> {
        self.mappings.iter().filter(|m| !m.ignore).map(|m| m.name.as_str()).collect()
    }
}

impl<T: Default + 'static> ColumnMap<T> {
    /// Build a `T` from one row, using `header` (if any) to resolve columns
    /// that have no explicit index, falling back to declaration order.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn bind(
        &self,
        row: &RowView,
        header: Option<&Header>,
        culture: &Culture,
        registry: &ConverterRegistry,
        mode: Mode,
        row_index: u64,
        line_number: u64,
        bad_data_cb: Option<&BadDataCallback>,
    ) -> Result<T> {
        let mut record = T::default();
        let mut declared_position = 0usize;

        for mapping in &self.mappings {
            if mapping.ignore {
                continue;
            }
            let col_index = mapping.resolve_index(declared_position, header);
            declared_position += 1;

            let raw = match col_index.and_then(|idx| row.get_field(idx)) {
                Some(s) => s,
                None => match mode {
                    Mode::Strict => {
                        return Err(Error::MissingField {
                            pos: ErrorPosition::new(row_index, line_number, col_index),
                            column: Some(mapping.name.clone()),
                        })
                    }
                    Mode::Lenient => "",
                },
            };

            let ctx = ConverterContext {
                culture: culture.clone(),
                row_index,
                field_index: col_index.unwrap_or(declared_position - 1),
                column_name: Some(mapping.name.clone()),
            };

            if let Err(err) = (mapping.setter)(&mut record, raw, &ctx, registry) {
                match mode {
                    Mode::Strict => {
                        return Err(err.with_position(ErrorPosition::new(row_index, line_number, Some(ctx.field_index))))
                    }
                    Mode::Lenient => {
                        log::warn!(
                            "conversion failed at row {}, field {} ({}): leaving default value",
                            row_index, ctx.field_index, mapping.name
                        );
                        if let Some(cb) = bad_data_cb {
                            cb(&BadDataContext {
                                row_index,
                                line_number,
                                field_index: ctx.field_index,
                                message: "conversion failed, default value used",
                                raw_field: raw.to_string(),
                            });
                        }
                    }
                }
            }
        }

        Ok(record)
    }
}

impl<T: 'static> ColumnMap<T> {
    /// Project `record` into field strings, in declaration order, skipping
    /// ignored members.
    pub(crate) fn project(&self, record: &T, culture: &Culture, registry: &ConverterRegistry, row_index: u64) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(self.mappings.len());
        for (i, mapping) in self.mappings.iter().filter(|m| !m.ignore).enumerate() {
            let ctx = ConverterContext {
                culture: culture.clone(),
                row_index,
                field_index: i,
                column_name: Some(mapping.name.clone()),
            };
            out.push((mapping.getter)(record, &ctx, registry)?);
        }
        Ok(out)
    }
}

/// Fluent builder for a [`ColumnMap`]. Each `.column(...)` call registers one
/// member; `.name()`/`.index()`/`.ignore()` modify the most recently added
/// entry, mirroring a chained configuration call.
pub struct MapBuilder<T> {
    mappings: Vec<MemberMapping<T>>,
}

impl<T> Default for MapBuilder<T> {
    fn default() -> MapBuilder<T> {
        MapBuilder { mappings: Vec::new() }
    }
}

impl<T: 'static> MapBuilder<T> {
    pub fn new() -> MapBuilder<T> {
        MapBuilder::default()
    }

    /// Register a member bound through the built-in [`FromField`]/[`ToField`]
    /// conversions.
    pub fn column<V>(
        mut self,
        column_name: &str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> MapBuilder<T>
    where
        V: FromField + ToField + 'static,
    {
        let getter: Getter<T> = Arc::new(move |record, ctx, registry| convert_to_field(&get(record), ctx, registry));
        let setter: Setter<T> = Arc::new(move |record, raw, ctx, registry| {
            let value = convert_from_field::<V>(raw, ctx, registry)?;
            set(record, value);
            Ok(())
        });
        self.mappings.push(MemberMapping {
            name: column_name.to_string(),
            index: None,
            ignore: false,
            property_type: std::any::type_name::<V>(),
            getter,
            setter,
        });
        self
    }

    /// Register a member with caller-supplied parse/format closures,
    /// bypassing `FromField`/`ToField` — the escape hatch for types such as
    /// [`crate::convert::EnumField`] implementors that don't carry a
    /// built-in conversion.
    pub fn column_with_converter<V>(
        mut self,
        column_name: &str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
        parse: impl Fn(&str, &ConverterContext) -> Result<V> + Send + Sync + 'static,
        format: impl Fn(&V, &ConverterContext) -> Result<String> + Send + Sync + 'static,
    ) -> MapBuilder<T>
    where
        V: 'static,
    {
        let getter: Getter<T> = Arc::new(move |record, ctx, _registry| format(&get(record), ctx));
        let setter: Setter<T> = Arc::new(move |record, raw, ctx, _registry| {
            let value = parse(raw, ctx)?;
            set(record, value);
            Ok(())
        });
        self.mappings.push(MemberMapping {
            name: column_name.to_string(),
            index: None,
            ignore: false,
            property_type: std::any::type_name::<V>(),
            getter,
            setter,
        });
        self
    }

    /// Override the most recently added member's column name.
    pub fn name(mut self, name: &str) -> MapBuilder<T> {
        if let Some(last) = self.mappings.last_mut() {
            last.name = name.to_string();
        }
        self
    }

    /// Pin the most recently added member to an explicit column index.
    pub fn index(mut self, index: usize) -> MapBuilder<T> {
        if let Some(last) = self.mappings.last_mut() {
            last.index = Some(index);
        }
        self
    }

    /// Mark the most recently added member as ignored: it is skipped by both
    /// `bind` and `project`.
    pub fn ignore(mut self) -> MapBuilder<T> {
        if let Some(last) = self.mappings.last_mut() {
            last.ignore = true;
        }
        self
    }

    pub fn build(self) -> ColumnMap<T> {
        ColumnMap { mappings: self.mappings }
    }
}

static MAP_REGISTRY: Lazy<Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// The process-wide cache of one [`ColumnMap`] per concrete record type.
pub struct MapRegistry;

impl MapRegistry {
    /// Return the cached map for `T`, building and caching it with `build`
    /// on first use.
    pub fn get_or_create<T: 'static>(build: impl FnOnce() -> ColumnMap<T>) -> Arc<ColumnMap<T>> {
        let type_id = TypeId::of::<T>();
        {
            let cache = MAP_REGISTRY.lock().unwrap();
            if let Some(existing) = cache.get(&type_id) {
                return existing.clone().downcast::<ColumnMap<T>>().expect("TypeId collision");
            }
        }
        let built = Arc::new(build());
        let mut cache = MAP_REGISTRY.lock().unwrap();
        let entry = cache.entry(type_id).or_insert_with(|| built.clone() as Arc<dyn Any + Send + Sync>);
        entry.clone().downcast::<ColumnMap<T>>().expect("TypeId collision")
    }
}

/// Declares a [`ColumnMap`] for a struct at compile time, expanding each
/// `field: "Column Name"` entry directly into a `record.field` getter/setter
/// pair. Plays the role attributes play in a reflective mapper; for index
/// pinning, ignoring members, or custom per-member converters, build the map
/// with [`MapBuilder`] directly instead.
#[macro_export]
macro_rules! define_columns {
    ($ty:ty { $($field:ident : $column:literal),* $(,)? }) => {{
        let mut builder = $crate::map::MapBuilder::<$ty>::new();
        $(
            builder = builder.column(
                $column,
                |record: &$ty| record.$field.clone(),
                |record: &mut $ty, value| { record.$field = value; },
            );
        )*
        builder.build()
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Clone, Debug, PartialEq)]
    struct Person {
        name: String,
        age: i32,
    }

    fn sample_map() -> ColumnMap<Person> {
        define_columns!(Person {
            name: "Name",
            age: "Age",
        })
    }

    #[test]
    fn projects_record_to_strings() {
        let map = sample_map();
        let person = Person { name: "Ada".to_string(), age: 36 };
        let registry = ConverterRegistry::new();
        let fields = map.project(&person, &Culture::invariant(), &registry, 0).unwrap();
        assert_eq!(fields, vec!["Ada".to_string(), "36".to_string()]);
    }

    #[test]
    fn builder_supports_ignore_and_index_overrides() {
        let map: ColumnMap<Person> = MapBuilder::new()
            .column("Name", |p: &Person| p.name.clone(), |p, v| p.name = v)
            .index(0)
            .column("Age", |p: &Person| p.age, |p, v| p.age = v)
            .ignore()
            .build();
        assert_eq!(map.mappings()[0].index(), Some(0));
        assert!(map.mappings()[1].is_ignored());
    }
}
