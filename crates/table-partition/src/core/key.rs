//! Typed primary-key columns, values and tuples.
//!
//! A [`KeyTuple`] is one row's primary-key values in declared key order.
//! Tuples of the same run share one [`KeySchema`] and compare
//! lexicographically: first column, then second on a tie, and so on.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{PartitionError, Result};

/// Ordering-comparable key column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    Integer,
    String,
    Decimal,
    Date,
    Timestamp,
}

impl KeyType {
    /// Every key type the model can represent.
    pub const ALL: &'static [KeyType] = &[
        KeyType::Integer,
        KeyType::String,
        KeyType::Decimal,
        KeyType::Date,
        KeyType::Timestamp,
    ];

    /// Widest declared `numeric`/`decimal` precision a key value can hold.
    pub const MAX_DECIMAL_PRECISION: u32 = 28;

    /// Map a declared database type name onto a key type.
    ///
    /// Length suffixes are ignored (`varchar(50)`). A `numeric(p, s)` with
    /// `p` above [`Self::MAX_DECIMAL_PRECISION`] is rejected; an unqualified
    /// `numeric` is accepted, and values wider than 28 significant digits
    /// then fail when parsed.
    pub fn parse(column: &str, declared: &str) -> Result<Self> {
        let lowered = declared.trim().to_lowercase();
        let base = lowered.split('(').next().unwrap_or_default().trim();

        let key_type = match base {
            "int" | "integer" | "bigint" | "smallint" | "tinyint" | "int2" | "int4" | "int8"
            | "serial" | "bigserial" => KeyType::Integer,
            "varchar" | "nvarchar" | "char" | "nchar" | "text" | "character varying"
            | "character" | "bpchar" | "string" => KeyType::String,
            "decimal" | "numeric" => KeyType::Decimal,
            "date" => KeyType::Date,
            "timestamp" | "timestamp without time zone" | "datetime" | "datetime2"
            | "smalldatetime" => KeyType::Timestamp,
            _ => return Err(PartitionError::unsupported(column, declared)),
        };

        if key_type == KeyType::Decimal {
            let precision = lowered
                .split_once('(')
                .and_then(|(_, args)| args.split([',', ')']).next())
                .and_then(|p| p.trim().parse::<u32>().ok());
            if precision.is_some_and(|p| p > Self::MAX_DECIMAL_PRECISION) {
                return Err(PartitionError::unsupported(column, declared));
            }
        }

        Ok(key_type)
    }

    /// Short lowercase name used in messages and configs.
    pub fn name(&self) -> &'static str {
        match self {
            KeyType::Integer => "integer",
            KeyType::String => "string",
            KeyType::Decimal => "decimal",
            KeyType::Date => "date",
            KeyType::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One primary-key value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyValue {
    Int(i64),
    String(String),
    Decimal(Decimal),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl KeyValue {
    /// The key type this value belongs to.
    pub fn key_type(&self) -> KeyType {
        match self {
            KeyValue::Int(_) => KeyType::Integer,
            KeyValue::String(_) => KeyType::String,
            KeyValue::Decimal(_) => KeyType::Decimal,
            KeyValue::Date(_) => KeyType::Date,
            KeyValue::Timestamp(_) => KeyType::Timestamp,
        }
    }

    /// Parse a value of `key_type` from its textual form.
    pub fn parse(key_type: KeyType, text: &str) -> Result<Self> {
        let invalid = || PartitionError::mismatch(key_type.name(), format!("'{}'", text));

        match key_type {
            KeyType::Integer => text.trim().parse().map(KeyValue::Int).map_err(|_| invalid()),
            KeyType::String => Ok(KeyValue::String(text.to_string())),
            KeyType::Decimal => Decimal::from_str(text.trim())
                .map(KeyValue::Decimal)
                .map_err(|_| invalid()),
            KeyType::Date => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                .map(KeyValue::Date)
                .map_err(|_| invalid()),
            KeyType::Timestamp => {
                let trimmed = text.trim();
                NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f"))
                    .map(KeyValue::Timestamp)
                    .map_err(|_| invalid())
            }
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Int(v) => write!(f, "{}", v),
            KeyValue::String(v) => write!(f, "{}", v),
            KeyValue::Decimal(v) => write!(f, "{}", v),
            KeyValue::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            KeyValue::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        KeyValue::Int(v)
    }
}

impl From<i32> for KeyValue {
    fn from(v: i32) -> Self {
        KeyValue::Int(v as i64)
    }
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self {
        KeyValue::String(v.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(v: String) -> Self {
        KeyValue::String(v)
    }
}

impl From<Decimal> for KeyValue {
    fn from(v: Decimal) -> Self {
        KeyValue::Decimal(v)
    }
}

/// A primary-key column and its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyColumn {
    pub name: String,
    pub key_type: KeyType,
}

impl KeyColumn {
    /// Create a key column, rejecting types outside `supported`.
    ///
    /// `supported` is the capability set of the predicate renderer that will
    /// consume the generated filters (see [`crate::dialect::Dialect`]).
    pub fn new(name: impl Into<String>, key_type: KeyType, supported: &[KeyType]) -> Result<Self> {
        let name = name.into();
        if !supported.contains(&key_type) {
            return Err(PartitionError::unsupported(name, key_type.name()));
        }
        Ok(Self { name, key_type })
    }

    /// Create a key column from a declared database type name.
    pub fn from_declared(name: &str, declared: &str, supported: &[KeyType]) -> Result<Self> {
        let key_type = KeyType::parse(name, declared)?;
        if !supported.contains(&key_type) {
            return Err(PartitionError::unsupported(name, declared));
        }
        Ok(Self {
            name: name.to_string(),
            key_type,
        })
    }
}

/// Ordered primary-key column sequence shared by every tuple of a run.
#[derive(Debug, Clone)]
pub struct KeySchema(Arc<[KeyColumn]>);

impl KeySchema {
    /// Build a schema from columns in declared key order.
    pub fn new(columns: Vec<KeyColumn>) -> Result<Self> {
        if columns.is_empty() {
            return Err(PartitionError::Config(
                "at least one primary key column is required".into(),
            ));
        }
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(PartitionError::Config(format!(
                    "primary key column '{}' is listed twice",
                    col.name
                )));
            }
        }
        Ok(Self(columns.into()))
    }

    pub fn columns(&self) -> &[KeyColumn] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Column names in key order.
    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|c| c.name.clone()).collect()
    }

    /// Position of a column by name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|c| c.name == name)
    }

    /// Build a tuple in this schema from textual values.
    pub fn parse_tuple<S: AsRef<str>>(&self, texts: &[S]) -> Result<KeyTuple> {
        if texts.len() != self.len() {
            return Err(PartitionError::mismatch(
                format!("{} key values", self.len()),
                format!("{} values", texts.len()),
            ));
        }
        let values = self
            .0
            .iter()
            .zip(texts)
            .map(|(col, text)| KeyValue::parse(col.key_type, text.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        KeyTuple::new(self.clone(), values)
    }
}

impl PartialEq for KeySchema {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for KeySchema {}

impl fmt::Display for KeySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, col) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", col.name, col.key_type)?;
        }
        f.write_str(")")
    }
}

/// One row's primary-key values, in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTuple {
    schema: KeySchema,
    values: Vec<KeyValue>,
}

impl KeyTuple {
    /// Create a tuple, checking arity and value types against `schema`.
    pub fn new(schema: KeySchema, values: Vec<KeyValue>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(PartitionError::mismatch(
                schema.to_string(),
                format!("{} values", values.len()),
            ));
        }
        for (col, value) in schema.columns().iter().zip(&values) {
            if value.key_type() != col.key_type {
                return Err(PartitionError::mismatch(
                    format!("{} {}", col.name, col.key_type),
                    format!("{} {}", col.name, value.key_type()),
                ));
            }
        }
        Ok(Self { schema, values })
    }

    pub fn schema(&self) -> &KeySchema {
        &self.schema
    }

    pub fn values(&self) -> &[KeyValue] {
        &self.values
    }

    /// Value of a column by name.
    pub fn get(&self, column: &str) -> Option<&KeyValue> {
        self.schema.position(column).map(|i| &self.values[i])
    }

    /// Iterate `(column, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&KeyColumn, &KeyValue)> {
        self.schema.columns().iter().zip(self.values.iter())
    }

    /// Lexicographic comparison.
    ///
    /// Fails with `SchemaMismatch` when the tuples were built from different
    /// column sequences.
    pub fn compare(&self, other: &KeyTuple) -> Result<Ordering> {
        if self.schema != other.schema {
            return Err(PartitionError::mismatch(
                self.schema.to_string(),
                other.schema.to_string(),
            ));
        }
        Ok(self.values.iter().cmp(other.values.iter()))
    }
}

impl fmt::Display for KeyTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", value)?;
        }
        f.write_str(")")
    }
}

impl Serialize for KeyTuple {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (col, value) in self.iter() {
            map.serialize_entry(&col.name, &value.to_string())?;
        }
        map.end()
    }
}
