//! Explicit operation/constant registry.
//!
//! Replaces reflective member lookup with tables built once when the
//! capability is constructed: every callable is a named closure over
//! [`GlState`], every constant a named number.

use std::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::InvokeError;
use crate::state::GlState;
use crate::value::{Return, TypedView, Value};

/// A registered operation.
pub type OpFn = Box<dyn FnMut(&mut GlState, CallArgs) -> Result<Return, InvokeError> + Send>;

/// Resolved arguments for one invocation, with typed accessors.
///
/// Accessors report arity and argument-type mismatches as [`InvokeError`]
/// values carrying the operation name, so each operation checks its own
/// signature with `exactly` plus per-index accessors.
pub struct CallArgs {
    op: Arc<str>,
    args: Vec<Value>,
}

impl CallArgs {
    pub fn new(op: &str, args: Vec<Value>) -> Self {
        Self {
            op: Arc::from(op),
            args,
        }
    }

    pub fn op(&self) -> &str {
        &self.op
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn exactly(&self, expected: usize) -> Result<(), InvokeError> {
        if self.args.len() != expected {
            return Err(InvokeError::Arity {
                op: self.op.to_string(),
                expected,
                got: self.args.len(),
            });
        }
        Ok(())
    }

    fn get(&self, index: usize) -> &Value {
        self.args.get(index).unwrap_or(&Value::Undefined)
    }

    fn type_error(&self, index: usize, expected: &'static str) -> InvokeError {
        InvokeError::ArgumentType {
            op: self.op.to_string(),
            index,
            expected,
            got: self.get(index).kind_name(),
        }
    }

    pub fn number(&self, index: usize) -> Result<f64, InvokeError> {
        match self.get(index) {
            Value::Number(n) => Ok(*n),
            _ => Err(self.type_error(index, "number")),
        }
    }

    pub fn integer(&self, index: usize) -> Result<i64, InvokeError> {
        let n = self.number(index)?;
        if !n.is_finite() {
            return Err(self.type_error(index, "integer"));
        }
        Ok(n as i64)
    }

    /// A number interpreted as a GLenum or bitmask.
    pub fn enum_value(&self, index: usize) -> Result<u32, InvokeError> {
        let n = self.number(index)?;
        if !n.is_finite() || n < 0.0 {
            return Err(self.type_error(index, "enum"));
        }
        Ok(n as u32)
    }

    pub fn boolean(&self, index: usize) -> Result<bool, InvokeError> {
        match self.get(index) {
            Value::Bool(b) => Ok(*b),
            _ => Err(self.type_error(index, "boolean")),
        }
    }

    pub fn string(&self, index: usize) -> Result<&str, InvokeError> {
        match self.get(index) {
            Value::Str(s) => Ok(s),
            _ => Err(self.type_error(index, "string")),
        }
    }

    pub fn view(&self, index: usize) -> Result<&TypedView, InvokeError> {
        match self.get(index) {
            Value::View(view) => Ok(view),
            _ => Err(self.type_error(index, "typed view")),
        }
    }

    /// Downcast an opaque argument to a concrete resource type.
    pub fn opaque<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>, InvokeError> {
        match self.get(index) {
            Value::Opaque(value) => value
                .downcast::<T>()
                .ok_or_else(|| self.type_error(index, "resource handle")),
            _ => Err(self.type_error(index, "resource handle")),
        }
    }

    /// Like [`CallArgs::opaque`], but `null` (and `undefined`) yield `None`.
    pub fn nullable_opaque<T: Any + Send + Sync>(
        &self,
        index: usize,
    ) -> Result<Option<Arc<T>>, InvokeError> {
        match self.get(index) {
            Value::Null | Value::Undefined => Ok(None),
            _ => self.opaque(index).map(Some),
        }
    }

    /// Accept a float view or a JSON array of numbers.
    pub fn f32_array(&self, index: usize) -> Result<Vec<f32>, InvokeError> {
        match self.get(index) {
            Value::View(view) => Ok(view.numbers().into_iter().map(|n| n as f32).collect()),
            Value::Json(serde_json::Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_f64()
                        .map(|n| n as f32)
                        .ok_or_else(|| self.type_error(index, "array of numbers"))
                })
                .collect(),
            _ => Err(self.type_error(index, "typed view or array of numbers")),
        }
    }
}

/// Name-to-operation and name-to-constant tables, built once.
pub struct Registry {
    ops: IndexMap<String, OpFn>,
    constants: IndexMap<String, f64>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            ops: IndexMap::new(),
            constants: IndexMap::new(),
        }
    }

    /// Invoke a named operation with already-resolved arguments.
    pub fn invoke(
        &mut self,
        state: &mut GlState,
        op: &str,
        args: Vec<Value>,
    ) -> Result<Return, InvokeError> {
        let f = self
            .ops
            .get_mut(op)
            .ok_or_else(|| InvokeError::UnknownOp(op.to_string()))?;
        f(state, CallArgs::new(op, args))
    }

    pub fn op_names(&self) -> Vec<String> {
        self.ops.keys().cloned().collect()
    }

    pub fn constants(&self) -> &IndexMap<String, f64> {
        &self.constants
    }

    pub fn constant(&self, name: &str) -> Option<f64> {
        self.constants.get(name).copied()
    }
}

pub struct RegistryBuilder {
    ops: IndexMap<String, OpFn>,
    constants: IndexMap<String, f64>,
}

impl RegistryBuilder {
    pub fn op(
        mut self,
        name: &str,
        f: impl FnMut(&mut GlState, CallArgs) -> Result<Return, InvokeError> + Send + 'static,
    ) -> Self {
        self.ops.insert(name.to_string(), Box::new(f));
        self
    }

    pub fn constant(mut self, name: &str, value: f64) -> Self {
        self.constants.insert(name.to_string(), value);
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            ops: self.ops,
            constants: self.constants,
        }
    }
}

/// A registry paired with the state its operations act on.
pub struct Capability {
    pub registry: Registry,
    pub state: GlState,
}

impl Capability {
    pub fn new(registry: Registry, state: GlState) -> Self {
        Self { registry, state }
    }

    /// The stock GL surface.
    pub fn webgl() -> Self {
        Self::new(crate::webgl::registry(), GlState::new())
    }

    pub fn invoke(&mut self, op: &str, args: Vec<Value>) -> Result<Return, InvokeError> {
        self.registry.invoke(&mut self.state, op, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Primitive;

    fn scripted() -> Registry {
        Registry::builder()
            .op("add", |_, args| {
                args.exactly(2)?;
                Ok(Return::number(args.number(0)? + args.number(1)?))
            })
            .op("fail", |_, args| {
                Err(InvokeError::Failed {
                    op: args.op().to_string(),
                    message: "scripted failure".into(),
                })
            })
            .constant("FOO", 1.0)
            .constant("BAR", 2.0)
            .build()
    }

    #[test]
    fn unknown_op_is_an_invoke_error() {
        let mut registry = scripted();
        let mut state = GlState::new();
        let err = registry.invoke(&mut state, "nope", vec![]).unwrap_err();
        assert_eq!(err.to_string(), "no such operation: nope");
    }

    #[test]
    fn arity_and_argument_type_errors_name_the_op() {
        let mut registry = scripted();
        let mut state = GlState::new();

        let err = registry
            .invoke(&mut state, "add", vec![Value::Number(1.0)])
            .unwrap_err();
        assert_eq!(err.to_string(), "add expects 2 arguments, got 1");

        let err = registry
            .invoke(
                &mut state,
                "add",
                vec![Value::Number(1.0), Value::Str("two".into())],
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "add argument 1: expected number, got string");
    }

    #[test]
    fn invocation_returns_classified_values() {
        let mut registry = scripted();
        let mut state = GlState::new();
        let ret = registry
            .invoke(&mut state, "add", vec![Value::Number(2.0), Value::Number(3.0)])
            .unwrap();
        assert!(matches!(ret, Return::Primitive(Primitive::Number(n)) if n == 5.0));
    }

    #[test]
    fn builder_preserves_registration_order() {
        let registry = scripted();
        assert_eq!(registry.op_names(), vec!["add".to_string(), "fail".to_string()]);
        assert_eq!(
            registry.constants().keys().collect::<Vec<_>>(),
            vec!["FOO", "BAR"]
        );
        assert_eq!(registry.constant("BAR"), Some(2.0));
        assert_eq!(registry.constant("BAZ"), None);
    }

    #[test]
    fn nullable_opaque_accepts_null_and_undefined() {
        let args = CallArgs::new("useProgram", vec![Value::Null]);
        assert!(args.nullable_opaque::<u32>(0).unwrap().is_none());
        let args = CallArgs::new("useProgram", vec![Value::Undefined]);
        assert!(args.nullable_opaque::<u32>(0).unwrap().is_none());
        let args = CallArgs::new("useProgram", vec![Value::Bool(true)]);
        assert!(args.nullable_opaque::<u32>(0).is_err());
    }
}
