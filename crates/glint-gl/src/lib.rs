//! Registry-backed software GL capability for the glint bridge.
//!
//! The capability surface the bridge dispatches into is an explicit
//! registry: a name-to-operation table plus a name-to-number constant
//! table, built once at construction. Operations act on a [`GlState`],
//! a state-tracking context that records resources, bindings and draw
//! calls without rasterizing anything.

pub mod consts;
pub mod error;
pub mod registry;
pub mod state;
pub mod value;
pub mod webgl;

pub use error::InvokeError;
pub use registry::{Capability, CallArgs, OpFn, Registry, RegistryBuilder};
pub use state::GlState;
pub use value::{OpaqueValue, Primitive, Return, TypedView, TypedViewError, Value};
