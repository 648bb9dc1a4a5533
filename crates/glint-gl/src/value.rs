//! Call values, typed buffer views, and return classification.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use glint_proto::BufferKind;
use thiserror::Error;

/// An opaque, non-serializable operation result held in the variable table.
///
/// Operations downcast these back to their concrete resource types; a
/// failed downcast is an invocation-type error at the call site.
#[derive(Clone)]
pub struct OpaqueValue(Arc<dyn Any + Send + Sync>);

impl OpaqueValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast().ok()
    }

    pub fn is<T: Any + Send + Sync>(&self) -> bool {
        self.0.is::<T>()
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OpaqueValue(..)")
    }
}

/// Typed view over the backing storage of a raw buffer.
///
/// The storage is shared, not copied: cloning a view clones the `Arc`.
#[derive(Debug, Clone)]
pub struct TypedView {
    kind: BufferKind,
    data: Arc<[u8]>,
}

#[derive(Debug, Clone, Error)]
#[error("{len}-byte buffer does not divide into {width}-byte {key} elements")]
pub struct TypedViewError {
    pub key: &'static str,
    pub width: usize,
    pub len: usize,
}

impl TypedView {
    pub fn new(kind: BufferKind, data: Vec<u8>) -> Result<Self, TypedViewError> {
        if data.len() % kind.width() != 0 {
            return Err(TypedViewError {
                key: kind.key(),
                width: kind.width(),
                len: data.len(),
            });
        }
        Ok(Self {
            kind,
            data: data.into(),
        })
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len() / self.kind.width()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Decode the element at `index` as a number (little-endian storage).
    pub fn number_at(&self, index: usize) -> f64 {
        let width = self.kind.width();
        let bytes = &self.data[index * width..(index + 1) * width];
        match self.kind {
            BufferKind::Int8 => bytes[0] as i8 as f64,
            BufferKind::Uint8 | BufferKind::Uint8Clamped => bytes[0] as f64,
            BufferKind::Int16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            BufferKind::Uint16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            BufferKind::Int32 => {
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            BufferKind::Uint32 => {
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            BufferKind::Float32 => {
                f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            BufferKind::Float64 => f64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]),
        }
    }

    pub fn numbers(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.number_at(i)).collect()
    }
}

/// A concrete call argument after resolution.
#[derive(Debug, Clone)]
pub enum Value {
    /// An unresolved variable reference; passed through as-is.
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    /// JSON arrays and objects, passed through unchanged.
    Json(serde_json::Value),
    View(TypedView),
    Opaque(OpaqueValue),
}

impl Value {
    /// Map a JSON literal argument to a call value.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s),
            other => Value::Json(other),
        }
    }

    /// Short kind name used in invocation-type error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Json(_) => "json",
            Value::View(_) => "typed view",
            Value::Opaque(_) => "opaque handle",
        }
    }
}

/// Wire-representable primitive results.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

impl Primitive {
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Primitive::Null => serde_json::Value::Null,
            Primitive::Bool(b) => serde_json::Value::Bool(b),
            Primitive::Number(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Primitive::Str(s) => serde_json::Value::String(s),
        }
    }
}

/// Classified operation return value.
///
/// `Opaque` results never cross the session boundary directly; the
/// interpreter mints a variable handle for them instead.
#[derive(Debug, Clone)]
pub enum Return {
    Undefined,
    Primitive(Primitive),
    Opaque(OpaqueValue),
}

impl Return {
    pub fn null() -> Self {
        Return::Primitive(Primitive::Null)
    }

    pub fn boolean(value: bool) -> Self {
        Return::Primitive(Primitive::Bool(value))
    }

    pub fn number(value: f64) -> Self {
        Return::Primitive(Primitive::Number(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Return::Primitive(Primitive::Str(value.into()))
    }

    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Return::Opaque(OpaqueValue::new(value))
    }
}
