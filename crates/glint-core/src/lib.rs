//! Instruction interpreter and session context for the glint bridge.
//!
//! A [`Context`] owns everything one display session needs: the capability
//! registry it dispatches instructions into, the variable table holding
//! opaque results across calls, the transient per-envelope buffer list,
//! and at most one active orbit side-view.

pub mod context;
pub mod error;
pub mod view;

pub use context::Context;
pub use error::BridgeError;
pub use view::{FrameTick, OrbitParams, OrbitView};
