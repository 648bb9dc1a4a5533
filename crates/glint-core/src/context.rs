//! The session context: argument resolution, instruction interpretation,
//! batch execution, and envelope dispatch.

use std::collections::VecDeque;

use glint_gl::{Capability, Return, TypedView, Value};
use glint_proto::{
    variable_handle, BufferKind, Command, ErrorData, Instruction, IntrospectionTarget, Message,
    Reply, BUFFER_PREFIX, VARIABLE_PREFIX,
};
use indexmap::IndexMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::BridgeError;
use crate::view::{FrameTick, OrbitParams, OrbitView};

/// One display session's state.
///
/// Exactly one `Context` exists per session. The capability is created on
/// first access and cached; the variable table and handle counter live for
/// the whole session with no eviction, since opaque results must stay
/// addressable for as long as instructions may reference them.
pub struct Context {
    capability: Option<Capability>,
    variables: IndexMap<String, glint_gl::OpaqueValue>,
    next_handle: u64,
    /// Bound for the duration of one envelope, consumed front-to-back.
    buffers: VecDeque<Vec<u8>>,
    view: Option<OrbitView>,
    frames: mpsc::Sender<FrameTick>,
}

impl Context {
    /// A context over the stock GL capability, constructed lazily.
    pub fn new(frames: mpsc::Sender<FrameTick>) -> Self {
        Self {
            capability: None,
            variables: IndexMap::new(),
            next_handle: 1,
            buffers: VecDeque::new(),
            view: None,
            frames,
        }
    }

    /// A context over a caller-supplied capability.
    pub fn with_capability(capability: Capability, frames: mpsc::Sender<FrameTick>) -> Self {
        Self {
            capability: Some(capability),
            ..Self::new(frames)
        }
    }

    pub fn capability(&mut self) -> &mut Capability {
        self.capability.get_or_insert_with(Capability::webgl)
    }

    pub fn active_view(&self) -> Option<&OrbitView> {
        self.view.as_ref()
    }

    /// Dispatch one envelope. Returns the reply to send, if any: exactly
    /// one for `query`/`getConstants`/`getMethods`, none for the rest.
    pub fn handle_message(
        &mut self,
        message: Message,
        buffers: Vec<Vec<u8>>,
    ) -> Result<Option<Reply>, BridgeError> {
        match message {
            Message::Exec { instructions } => {
                self.with_buffers(buffers, |ctx| ctx.exec_batch(&instructions))?;
                Ok(None)
            }
            Message::Query { instructions } => {
                let outcome = self.with_buffers(buffers, |ctx| ctx.query_batch(&instructions));
                match outcome {
                    Ok(data) => Ok(Some(Reply::QueryReply { data })),
                    Err(err) if err.is_invocation_error() => {
                        debug!(error = %err, "query failed with a reportable error");
                        Ok(Some(Reply::QueryError {
                            data: ErrorData {
                                message: err.to_string(),
                            },
                        }))
                    }
                    Err(err) => Err(err),
                }
            }
            Message::GetConstants {
                target: IntrospectionTarget::Context,
            } => Ok(Some(Reply::ConstantsReply {
                target: IntrospectionTarget::Context,
                data: self.capability().registry.constants().clone(),
            })),
            Message::GetMethods {
                target: IntrospectionTarget::Context,
            } => Ok(Some(Reply::MethodsReply {
                target: IntrospectionTarget::Context,
                data: self.capability().registry.op_names(),
            })),
            Message::Command { command } => {
                self.handle_command(command);
                Ok(None)
            }
        }
    }

    /// Bind a buffer list for the duration of one envelope's processing.
    /// The list is cleared on the way out whether or not `f` succeeded.
    fn with_buffers<T>(
        &mut self,
        buffers: Vec<Vec<u8>>,
        f: impl FnOnce(&mut Self) -> Result<T, BridgeError>,
    ) -> Result<T, BridgeError> {
        self.buffers = buffers.into();
        let result = f(self);
        self.buffers.clear();
        result
    }

    /// Run every instruction, discarding results. The first failure aborts
    /// the rest of the sequence.
    fn exec_batch(&mut self, instructions: &[Instruction]) -> Result<(), BridgeError> {
        for instruction in instructions {
            self.exec_instruction(instruction)?;
        }
        Ok(())
    }

    /// Run all but the last instruction for effect, then the last for its
    /// classified result.
    fn query_batch(
        &mut self,
        instructions: &[Instruction],
    ) -> Result<serde_json::Value, BridgeError> {
        let (last, rest) = instructions.split_last().ok_or(BridgeError::EmptyBatch)?;
        self.exec_batch(rest)?;
        self.query_instruction(last)
    }

    fn exec_instruction(&mut self, instruction: &Instruction) -> Result<(), BridgeError> {
        debug!(op = %instruction.op, "exec");
        let args = self.resolve_args(&instruction.args)?;
        self.capability().invoke(&instruction.op, args)?;
        Ok(())
    }

    fn query_instruction(
        &mut self,
        instruction: &Instruction,
    ) -> Result<serde_json::Value, BridgeError> {
        debug!(op = %instruction.op, "query");
        let args = self.resolve_args(&instruction.args)?;
        let ret = self.capability().invoke(&instruction.op, args)?;
        Ok(match ret {
            Return::Undefined => serde_json::Value::Null,
            Return::Primitive(primitive) => primitive.into_json(),
            // Opaque results cannot cross the session boundary; mint a
            // handle and hand that back instead.
            Return::Opaque(value) => {
                let handle = variable_handle(self.next_handle);
                self.next_handle += 1;
                self.variables.insert(handle.clone(), value);
                serde_json::Value::String(handle)
            }
        })
    }

    /// Expand raw instruction arguments into concrete call arguments.
    ///
    /// String arguments are tested against the buffer prefix first, then
    /// the variable prefix; anything else passes through as a literal.
    fn resolve_args(&mut self, args: &[serde_json::Value]) -> Result<Vec<Value>, BridgeError> {
        args.iter().map(|arg| self.resolve_arg(arg)).collect()
    }

    fn resolve_arg(&mut self, arg: &serde_json::Value) -> Result<Value, BridgeError> {
        let Some(s) = arg.as_str() else {
            return Ok(Value::from_json(arg.clone()));
        };
        if let Some(type_key) = s.strip_prefix(BUFFER_PREFIX) {
            let raw = self
                .buffers
                .pop_front()
                .ok_or(BridgeError::BufferUnderflow)?;
            let kind = BufferKind::from_key(type_key)
                .ok_or_else(|| BridgeError::UnknownBufferKind(type_key.to_string()))?;
            Ok(Value::View(TypedView::new(kind, raw)?))
        } else if s.starts_with(VARIABLE_PREFIX) {
            match self.variables.get(s) {
                Some(value) => Ok(Value::Opaque(value.clone())),
                None => {
                    // Preserved permissiveness: a miss flows on as
                    // undefined rather than failing resolution.
                    warn!(handle = s, "unresolved variable reference");
                    Ok(Value::Undefined)
                }
            }
        } else {
            Ok(Value::Str(s.to_string()))
        }
    }

    /// Handle a `command` envelope. One op is recognized; anything else is
    /// a no-op.
    fn handle_command(&mut self, command: Command) {
        if command.op == "orbitView" {
            // At most one side-view per context: dispose of the old one
            // and its pacing task before constructing the replacement.
            if let Some(previous) = self.view.take() {
                previous.remove();
            }
            let params = OrbitParams::from_args(&command.args);
            debug!(?params, "starting orbit view");
            self.view = Some(OrbitView::spawn(
                params,
                command.instructions,
                self.frames.clone(),
            ));
        } else {
            debug!(op = %command.op, "ignoring unrecognized command");
        }
    }

    /// Run the active view's frame batch once.
    ///
    /// Frame batches run with an empty buffer list bound, so a buffer
    /// reference inside one underflows.
    pub fn view_frame(&mut self) -> Result<(), BridgeError> {
        let Some(view) = self.view.as_mut() else {
            return Ok(());
        };
        let eye = view.advance();
        debug!(angle = view.angle(), ?eye, "orbit frame");
        let instructions = view.instructions().to_vec();
        self.with_buffers(Vec::new(), |ctx| ctx.exec_batch(&instructions))
    }
}
