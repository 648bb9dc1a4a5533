//! Wire protocol for the glint rendering bridge.
//!
//! Defines the envelope and reply shapes exchanged between a computational
//! client and the display process, the instruction descriptors they carry,
//! and the lexical argument-token conventions (buffer references and
//! variable handles). Framing for the socket transport lives in [`framing`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub mod framing;

/// Prefix marking a string argument as a buffer reference.
///
/// The suffix after the prefix is a [`BufferKind`] key, e.g. `"bufferfloat32"`.
pub const BUFFER_PREFIX: &str = "buffer";

/// Prefix marking a string argument as a variable handle, e.g. `"key3"`.
pub const VARIABLE_PREFIX: &str = "key";

/// Format the handle string for a minted variable id.
pub fn variable_handle(id: u64) -> String {
    format!("{VARIABLE_PREFIX}{id}")
}

/// Element interpretation for a raw binary buffer.
///
/// Multi-byte elements are little-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Int8,
    Uint8,
    /// Clamped 8-bit unsigned; reads identically to [`BufferKind::Uint8`],
    /// the clamping applies only when such a view is written through.
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
}

impl BufferKind {
    pub const ALL: [BufferKind; 9] = [
        BufferKind::Int8,
        BufferKind::Uint8,
        BufferKind::Uint8Clamped,
        BufferKind::Int16,
        BufferKind::Uint16,
        BufferKind::Int32,
        BufferKind::Uint32,
        BufferKind::Float32,
        BufferKind::Float64,
    ];

    /// The token suffix naming this kind on the wire.
    pub fn key(self) -> &'static str {
        match self {
            BufferKind::Int8 => "int8",
            BufferKind::Uint8 => "uint8",
            BufferKind::Uint8Clamped => "uint8C",
            BufferKind::Int16 => "int16",
            BufferKind::Uint16 => "uint16",
            BufferKind::Int32 => "int32",
            BufferKind::Uint32 => "uint32",
            BufferKind::Float32 => "float32",
            BufferKind::Float64 => "float64",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    /// Element width in bytes.
    pub fn width(self) -> usize {
        match self {
            BufferKind::Int8 | BufferKind::Uint8 | BufferKind::Uint8Clamped => 1,
            BufferKind::Int16 | BufferKind::Uint16 => 2,
            BufferKind::Int32 | BufferKind::Uint32 | BufferKind::Float32 => 4,
            BufferKind::Float64 => 8,
        }
    }
}

/// Per-instruction tag carried on the wire.
///
/// Batch position, not this tag, decides whether an instruction's result is
/// kept: only the last instruction of a `query` envelope is queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionKind {
    Exec,
    Query,
}

/// One operation-call descriptor within an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(rename = "type")]
    pub kind: InstructionKind,
    pub op: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
}

impl Instruction {
    pub fn exec(op: impl Into<String>, args: Vec<serde_json::Value>) -> Self {
        Self {
            kind: InstructionKind::Exec,
            op: op.into(),
            args,
        }
    }

    pub fn query(op: impl Into<String>, args: Vec<serde_json::Value>) -> Self {
        Self {
            kind: InstructionKind::Query,
            op: op.into(),
            args,
        }
    }
}

/// Introspection target selector. Only the rendering context is addressable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntrospectionTarget {
    Context,
}

/// Payload of a `command` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub op: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

/// Inbound envelope payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    Exec { instructions: Vec<Instruction> },
    Query { instructions: Vec<Instruction> },
    GetConstants { target: IntrospectionTarget },
    GetMethods { target: IntrospectionTarget },
    Command { command: Command },
}

/// Error payload of a `queryError` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    pub message: String,
}

/// Outbound reply payload.
///
/// Sent only for `query`, `getConstants` and `getMethods` envelopes; `exec`
/// and `command` have no reply channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Reply {
    QueryReply {
        data: serde_json::Value,
    },
    QueryError {
        data: ErrorData,
    },
    ConstantsReply {
        target: IntrospectionTarget,
        data: IndexMap<String, f64>,
    },
    MethodsReply {
        target: IntrospectionTarget,
        data: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn buffer_kind_keys_round_trip() {
        for kind in BufferKind::ALL {
            assert_eq!(BufferKind::from_key(kind.key()), Some(kind));
        }
        assert_eq!(BufferKind::from_key("float16"), None);
        assert_eq!(BufferKind::Uint8Clamped.key(), "uint8C");
        assert_eq!(BufferKind::Float64.width(), 8);
    }

    #[test]
    fn variable_handles_carry_the_key_prefix() {
        assert_eq!(variable_handle(1), "key1");
        assert_eq!(variable_handle(42), "key42");
    }

    #[test]
    fn instruction_wire_shape() {
        let instruction = Instruction::exec("clearColor", vec![json!(0.0), json!(1.0)]);
        assert_eq!(
            serde_json::to_value(&instruction).unwrap(),
            json!({"type": "exec", "op": "clearColor", "args": [0.0, 1.0]})
        );

        let parsed: Instruction =
            serde_json::from_value(json!({"type": "query", "op": "getError"})).unwrap();
        assert_eq!(parsed.kind, InstructionKind::Query);
        assert!(parsed.args.is_empty());
    }

    #[test]
    fn message_wire_shapes() {
        let exec = Message::Exec {
            instructions: vec![Instruction::exec("finish", vec![])],
        };
        assert_eq!(
            serde_json::to_value(&exec).unwrap(),
            json!({
                "type": "exec",
                "instructions": [{"type": "exec", "op": "finish", "args": []}]
            })
        );

        let constants = Message::GetConstants {
            target: IntrospectionTarget::Context,
        };
        assert_eq!(
            serde_json::to_value(&constants).unwrap(),
            json!({"type": "getConstants", "target": "context"})
        );

        let command: Message = serde_json::from_value(json!({
            "type": "command",
            "command": {"op": "orbitView", "args": [{"fps": 10}], "instructions": []}
        }))
        .unwrap();
        match command {
            Message::Command { command } => assert_eq!(command.op, "orbitView"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn reply_wire_shapes() {
        assert_eq!(
            serde_json::to_value(Reply::QueryReply { data: json!(7) }).unwrap(),
            json!({"type": "queryReply", "data": 7})
        );
        assert_eq!(
            serde_json::to_value(Reply::QueryError {
                data: ErrorData {
                    message: "no such operation: foo".into()
                }
            })
            .unwrap(),
            json!({"type": "queryError", "data": {"message": "no such operation: foo"}})
        );

        let mut constants = IndexMap::new();
        constants.insert("FOO".to_string(), 1.0);
        constants.insert("BAR".to_string(), 2.0);
        assert_eq!(
            serde_json::to_value(Reply::ConstantsReply {
                target: IntrospectionTarget::Context,
                data: constants,
            })
            .unwrap(),
            json!({"type": "constantsReply", "target": "context", "data": {"FOO": 1.0, "BAR": 2.0}})
        );
        assert_eq!(
            serde_json::to_value(Reply::MethodsReply {
                target: IntrospectionTarget::Context,
                data: vec!["clear".into()],
            })
            .unwrap(),
            json!({"type": "methodsReply", "target": "context", "data": ["clear"]})
        );
    }
}
