//! Client library for the glint bridge.
//!
//! [`BridgeClient`] speaks the envelope protocol over a Unix socket; the
//! [`glu`] module carries the camera-matrix and shader-building helpers
//! that live on the computational side of the bridge.

use std::path::Path;

use anyhow::{bail, Context as _};
use glint_proto::framing::{self, Frame};
use glint_proto::{Command, Instruction, IntrospectionTarget, Message, Reply};
use indexmap::IndexMap;
use tokio::net::UnixStream;
use tracing::debug;

pub mod glu;

/// Outcome of a `query` envelope, mirroring the two reply types.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Reply(serde_json::Value),
    Error(String),
}

impl QueryOutcome {
    /// The reply data, or an error if the bridge reported a `queryError`.
    pub fn into_reply(self) -> anyhow::Result<serde_json::Value> {
        match self {
            QueryOutcome::Reply(data) => Ok(data),
            QueryOutcome::Error(message) => bail!("bridge reported: {message}"),
        }
    }
}

/// One connection to a bridge display session.
pub struct BridgeClient {
    stream: UnixStream,
}

impl BridgeClient {
    pub async fn connect(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path)
            .await
            .with_context(|| format!("connect to bridge at {}", path.display()))?;
        debug!("connected to {}", path.display());
        Ok(Self { stream })
    }

    async fn send(&mut self, message: &Message, buffers: &[Vec<u8>]) -> anyhow::Result<()> {
        framing::write_frame(&mut self.stream, message, &serde_json::Value::Null, buffers)
            .await
            .context("send envelope")
    }

    async fn recv(&mut self) -> anyhow::Result<Reply> {
        let frame: Frame<Reply> = framing::read_frame(&mut self.stream)
            .await
            .context("read reply")?;
        Ok(frame.content)
    }

    /// Run instructions for effect only. No reply is expected.
    pub async fn exec(
        &mut self,
        instructions: Vec<Instruction>,
        buffers: Vec<Vec<u8>>,
    ) -> anyhow::Result<()> {
        self.send(&Message::Exec { instructions }, &buffers).await
    }

    /// Run instructions and return the last one's classified result.
    pub async fn query(
        &mut self,
        instructions: Vec<Instruction>,
        buffers: Vec<Vec<u8>>,
    ) -> anyhow::Result<QueryOutcome> {
        self.send(&Message::Query { instructions }, &buffers).await?;
        match self.recv().await? {
            Reply::QueryReply { data } => Ok(QueryOutcome::Reply(data)),
            Reply::QueryError { data } => Ok(QueryOutcome::Error(data.message)),
            other => bail!("unexpected reply to query: {other:?}"),
        }
    }

    pub async fn constants(&mut self) -> anyhow::Result<IndexMap<String, f64>> {
        self.send(
            &Message::GetConstants {
                target: IntrospectionTarget::Context,
            },
            &[],
        )
        .await?;
        match self.recv().await? {
            Reply::ConstantsReply { data, .. } => Ok(data),
            other => bail!("unexpected reply to getConstants: {other:?}"),
        }
    }

    pub async fn methods(&mut self) -> anyhow::Result<Vec<String>> {
        self.send(
            &Message::GetMethods {
                target: IntrospectionTarget::Context,
            },
            &[],
        )
        .await?;
        match self.recv().await? {
            Reply::MethodsReply { data, .. } => Ok(data),
            other => bail!("unexpected reply to getMethods: {other:?}"),
        }
    }

    /// Start (or replace) the orbit side-view with a per-frame batch.
    pub async fn orbit_view(
        &mut self,
        args: Vec<serde_json::Value>,
        instructions: Vec<Instruction>,
    ) -> anyhow::Result<()> {
        self.send(
            &Message::Command {
                command: Command {
                    op: "orbitView".to_string(),
                    args,
                    instructions,
                },
            },
            &[],
        )
        .await
    }
}

/// Little-endian bytes of an `f32` slice, for buffer payloads.
pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_outcome_unwraps_replies_and_surfaces_errors() {
        let outcome = QueryOutcome::Reply(serde_json::json!(1));
        assert_eq!(outcome.into_reply().unwrap(), serde_json::json!(1));

        let outcome = QueryOutcome::Error("no such operation: zap".into());
        let err = outcome.into_reply().unwrap_err();
        assert!(err.to_string().contains("no such operation"));
    }

    #[test]
    fn f32_bytes_are_little_endian() {
        assert_eq!(f32_bytes(&[1.0]), 1.0f32.to_le_bytes().to_vec());
        assert_eq!(f32_bytes(&[]), Vec::<u8>::new());
    }
}
