//! Dotted-path presence checks over configuration records.
//!
//! The record is serialized into a [`Shape`]: structs keep their fields,
//! every other value collapses to a leaf that only remembers whether it is a
//! zero value. Maps and sequences are leaves, so their keys are never
//! mistaken for fields.

use std::fmt;

use serde::ser::{self, Serialize};
use thiserror::Error;

/// Reports whether the field at a dotted `path` of `record` is set.
///
/// Each segment names a struct field of the record reached so far, using the
/// field's serialized name. A terminal zero value (`None`, `false`, `0`,
/// empty string, empty collection, or a struct whose fields are all zero)
/// counts as unset unless the path starts with `0`.
///
/// Only structs are traversed. A segment that names no field, or that
/// reaches into a map, sequence or scalar, gives `false`.
///
/// # Example
///
/// ```rust
/// use keel_config::is_set;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Server { port: u16, name: String }
///
/// #[derive(Serialize)]
/// struct Config { server: Server }
///
/// let config = Config { server: Server { port: 8080, name: String::new() } };
/// assert!(is_set("server.port", &config));
/// assert!(!is_set("server.name", &config));
/// assert!(is_set("0server.name", &config));
/// assert!(!is_set("server.host", &config));
/// ```
pub fn is_set<T: Serialize + ?Sized>(path: &str, record: &T) -> bool {
    let (allow_zero, path) = match path.strip_prefix('0') {
        Some(rest) => (true, rest),
        None => (false, path),
    };
    if path.is_empty() {
        return false;
    }

    let Ok(shape) = record.serialize(ShapeSerializer) else {
        return false;
    };

    let mut current = &shape;
    for segment in path.split('.') {
        match current.field(segment) {
            Some(next) => current = next,
            None => return false,
        }
    }

    allow_zero || !current.is_zero()
}

#[derive(Debug)]
enum Shape {
    Record(Vec<(&'static str, Shape)>),
    Leaf { zero: bool },
}

impl Shape {
    const fn leaf(zero: bool) -> Self {
        Self::Leaf { zero }
    }

    fn field(&self, name: &str) -> Option<&Self> {
        match self {
            Self::Record(fields) => fields
                .iter()
                .find(|(field, _)| *field == name)
                .map(|(_, shape)| shape),
            Self::Leaf { .. } => None,
        }
    }

    fn is_zero(&self) -> bool {
        match self {
            Self::Record(fields) => fields.iter().all(|(_, shape)| shape.is_zero()),
            Self::Leaf { zero } => *zero,
        }
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct ShapeError(String);

impl ser::Error for ShapeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

struct ShapeSerializer;

/// Counts the entries of a map or sequence without looking inside them.
#[derive(Default)]
struct Entries(usize);

/// Fields of a struct or struct variant.
struct Fields(Vec<(&'static str, Shape)>);

impl ser::Serializer for ShapeSerializer {
    type Ok = Shape;
    type Error = ShapeError;
    type SerializeSeq = Entries;
    type SerializeTuple = Entries;
    type SerializeTupleStruct = Entries;
    type SerializeTupleVariant = Entries;
    type SerializeMap = Entries;
    type SerializeStruct = Fields;
    type SerializeStructVariant = Fields;

    fn serialize_bool(self, v: bool) -> Result<Shape, ShapeError> {
        Ok(Shape::leaf(!v))
    }

    fn serialize_i8(self, v: i8) -> Result<Shape, ShapeError> {
        self.serialize_i64(v.into())
    }

    fn serialize_i16(self, v: i16) -> Result<Shape, ShapeError> {
        self.serialize_i64(v.into())
    }

    fn serialize_i32(self, v: i32) -> Result<Shape, ShapeError> {
        self.serialize_i64(v.into())
    }

    fn serialize_i64(self, v: i64) -> Result<Shape, ShapeError> {
        Ok(Shape::leaf(v == 0))
    }

    fn serialize_i128(self, v: i128) -> Result<Shape, ShapeError> {
        Ok(Shape::leaf(v == 0))
    }

    fn serialize_u8(self, v: u8) -> Result<Shape, ShapeError> {
        self.serialize_u64(v.into())
    }

    fn serialize_u16(self, v: u16) -> Result<Shape, ShapeError> {
        self.serialize_u64(v.into())
    }

    fn serialize_u32(self, v: u32) -> Result<Shape, ShapeError> {
        self.serialize_u64(v.into())
    }

    fn serialize_u64(self, v: u64) -> Result<Shape, ShapeError> {
        Ok(Shape::leaf(v == 0))
    }

    fn serialize_u128(self, v: u128) -> Result<Shape, ShapeError> {
        Ok(Shape::leaf(v == 0))
    }

    fn serialize_f32(self, v: f32) -> Result<Shape, ShapeError> {
        self.serialize_f64(v.into())
    }

    fn serialize_f64(self, v: f64) -> Result<Shape, ShapeError> {
        Ok(Shape::leaf(v == 0.0))
    }

    fn serialize_char(self, v: char) -> Result<Shape, ShapeError> {
        Ok(Shape::leaf(v == '\0'))
    }

    fn serialize_str(self, v: &str) -> Result<Shape, ShapeError> {
        Ok(Shape::leaf(v.is_empty()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Shape, ShapeError> {
        Ok(Shape::leaf(v.is_empty()))
    }

    fn serialize_none(self) -> Result<Shape, ShapeError> {
        Ok(Shape::leaf(true))
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Shape, ShapeError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Shape, ShapeError> {
        Ok(Shape::leaf(true))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Shape, ShapeError> {
        Ok(Shape::leaf(true))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
    ) -> Result<Shape, ShapeError> {
        Ok(Shape::leaf(false))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Shape, ShapeError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<Shape, ShapeError> {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Entries, ShapeError> {
        Ok(Entries::default())
    }

    fn serialize_tuple(self, _len: usize) -> Result<Entries, ShapeError> {
        Ok(Entries::default())
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Entries, ShapeError> {
        Ok(Entries::default())
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Entries, ShapeError> {
        Ok(Entries::default())
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Entries, ShapeError> {
        Ok(Entries::default())
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<Fields, ShapeError> {
        Ok(Fields(Vec::with_capacity(len)))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        len: usize,
    ) -> Result<Fields, ShapeError> {
        Ok(Fields(Vec::with_capacity(len)))
    }
}

impl Entries {
    fn count(&mut self) -> Result<(), ShapeError> {
        self.0 += 1;
        Ok(())
    }

    fn finish(self) -> Result<Shape, ShapeError> {
        Ok(Shape::leaf(self.0 == 0))
    }
}

impl ser::SerializeSeq for Entries {
    type Ok = Shape;
    type Error = ShapeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, _value: &T) -> Result<(), ShapeError> {
        self.count()
    }

    fn end(self) -> Result<Shape, ShapeError> {
        self.finish()
    }
}

impl ser::SerializeTuple for Entries {
    type Ok = Shape;
    type Error = ShapeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, _value: &T) -> Result<(), ShapeError> {
        self.count()
    }

    fn end(self) -> Result<Shape, ShapeError> {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for Entries {
    type Ok = Shape;
    type Error = ShapeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, _value: &T) -> Result<(), ShapeError> {
        self.count()
    }

    fn end(self) -> Result<Shape, ShapeError> {
        self.finish()
    }
}

impl ser::SerializeTupleVariant for Entries {
    type Ok = Shape;
    type Error = ShapeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, _value: &T) -> Result<(), ShapeError> {
        self.count()
    }

    fn end(self) -> Result<Shape, ShapeError> {
        self.finish()
    }
}

impl ser::SerializeMap for Entries {
    type Ok = Shape;
    type Error = ShapeError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, _key: &T) -> Result<(), ShapeError> {
        self.count()
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, _value: &T) -> Result<(), ShapeError> {
        Ok(())
    }

    fn end(self) -> Result<Shape, ShapeError> {
        self.finish()
    }
}

impl ser::SerializeStruct for Fields {
    type Ok = Shape;
    type Error = ShapeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), ShapeError> {
        self.0.push((key, value.serialize(ShapeSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Shape, ShapeError> {
        Ok(Shape::Record(self.0))
    }
}

impl ser::SerializeStructVariant for Fields {
    type Ok = Shape;
    type Error = ShapeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), ShapeError> {
        ser::SerializeStruct::serialize_field(self, key, value)
    }

    fn end(self) -> Result<Shape, ShapeError> {
        Ok(Shape::Record(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};

    #[derive(Serialize, Default)]
    #[serde(rename_all = "PascalCase")]
    struct Role {
        name: String,
    }

    #[derive(Serialize, Default)]
    #[serde(rename_all = "PascalCase")]
    struct User {
        role: Role,
    }

    #[derive(Serialize, Default)]
    #[serde(rename_all = "PascalCase")]
    struct Record {
        user: User,
    }

    #[test]
    fn test_nested_zero_value() {
        let mut record = Record::default();
        assert!(!is_set("User.Role.Name", &record));
        assert!(is_set("0User.Role.Name", &record));
        assert!(!is_set("User.Roles", &record));

        record.user.role.name = "Wall-E".to_string();
        assert!(is_set("User.Role.Name", &record));
    }

    #[test]
    fn test_intermediate_record_zero() {
        let record = Record::default();
        assert!(!is_set("User", &record));
        assert!(is_set("0User", &record));
    }

    #[test]
    fn test_non_record_is_false() {
        assert!(!is_set("len", &vec![1, 2, 3]));
        assert!(!is_set("a", &json!({"a": 5})));
        assert!(!is_set("0a", &json!({"a": 5})));
        assert!(!is_set("", &Record::default()));
    }

    #[derive(Serialize, Default)]
    struct Connection {
        params: BTreeMap<String, String>,
        headers: HashMap<String, String>,
        tags: Vec<String>,
    }

    #[test]
    fn test_maps_are_not_traversed() {
        let mut conn = Connection::default();
        conn.params.insert("charset".into(), "utf8mb4".into());
        conn.headers.insert("accept".into(), "*/*".into());
        conn.tags.push("primary".into());

        assert!(!is_set("params.charset", &conn));
        assert!(!is_set("0params.charset", &conn));
        assert!(!is_set("headers.accept", &conn));
        assert!(!is_set("tags.0", &conn));

        assert!(is_set("params", &conn));
        assert!(!is_set("params", &Connection::default()));
        assert!(is_set("0params", &Connection::default()));
    }

    #[derive(Serialize, Default)]
    struct Scalars {
        off: bool,
        on: bool,
        zero: u32,
        negative: i64,
        float: f64,
        none: Option<String>,
        some_empty: Option<String>,
        list: Vec<u8>,
    }

    #[test]
    fn test_zero_values() {
        let scalars = Scalars {
            on: true,
            negative: -1,
            some_empty: Some(String::new()),
            ..Scalars::default()
        };
        for unset in ["off", "zero", "float", "none", "some_empty", "list"] {
            assert!(!is_set(unset, &scalars), "{unset}");
            assert!(is_set(&format!("0{unset}"), &scalars), "0{unset}");
        }
        assert!(is_set("on", &scalars));
        assert!(is_set("negative", &scalars));
    }

    #[derive(Serialize, Debug)]
    struct Pool {
        host: String,
        port: u16,
        params: BTreeMap<String, String>,
    }

    #[derive(Serialize, Debug)]
    struct Settings {
        pool: Pool,
        debug: bool,
    }

    fn settings() -> impl Strategy<Value = Settings> {
        (
            "[a-z]{0,8}",
            any::<u16>(),
            proptest::collection::btree_map("[a-z]{1,6}", "[a-z]{0,6}", 0..4),
            any::<bool>(),
        )
            .prop_map(|(host, port, params, debug)| Settings {
                pool: Pool { host, port, params },
                debug,
            })
    }

    proptest! {
        #[test]
        fn zero_prefix_holds_for_every_field(settings in settings()) {
            for path in ["pool", "pool.host", "pool.port", "pool.params", "debug"] {
                let prefixed = format!("0{path}");
                prop_assert!(is_set(&prefixed, &settings));
            }
        }

        #[test]
        fn unprefixed_tracks_non_zero(settings in settings()) {
            prop_assert_eq!(is_set("pool.host", &settings), !settings.pool.host.is_empty());
            prop_assert_eq!(is_set("pool.port", &settings), settings.pool.port != 0);
            prop_assert_eq!(is_set("debug", &settings), settings.debug);
        }

        #[test]
        fn map_keys_are_never_fields(settings in settings(), key in "[a-z]{1,6}") {
            let path = format!("0pool.params.{key}");
            prop_assert!(!is_set(&path, &settings));
        }
    }
}
