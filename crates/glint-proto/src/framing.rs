//! Length-prefixed multipart framing for the socket transport.
//!
//! One frame carries a JSON header plus an ordered list of raw binary
//! buffers. All length prefixes are little-endian `u32`:
//!
//! ```text
//! header_len, header_json, buffer_count, (buffer_len, buffer_bytes)*
//! ```
//!
//! The header is `{"content": <payload>, "metadata": <json>}`; metadata is
//! pass-through and echoed verbatim on the reply to the same envelope.

use std::io;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum accepted header length in bytes.
pub const MAX_HEADER_LEN: u32 = 64 * 1024 * 1024;

/// Maximum accepted length for a single binary buffer.
pub const MAX_BUFFER_LEN: u32 = 256 * 1024 * 1024;

/// A decoded frame: typed payload, pass-through metadata, binary buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<T> {
    pub content: T,
    pub metadata: serde_json::Value,
    pub buffers: Vec<Vec<u8>>,
}

/// A frame read off the wire with its header still undecoded.
///
/// Splitting read from decode lets a session drop a frame whose header does
/// not parse while keeping the stream aligned on frame boundaries.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub header: Vec<u8>,
    pub buffers: Vec<Vec<u8>>,
}

#[derive(Deserialize)]
struct Header<T> {
    content: T,
    #[serde(default)]
    metadata: serde_json::Value,
}

#[derive(Serialize)]
struct HeaderRef<'a, T> {
    content: &'a T,
    metadata: &'a serde_json::Value,
}

impl RawFrame {
    /// Decode the header into a typed [`Frame`].
    pub fn decode<T: DeserializeOwned>(self) -> Result<Frame<T>, serde_json::Error> {
        let header: Header<T> = serde_json::from_slice(&self.header)?;
        Ok(Frame {
            content: header.content,
            metadata: header.metadata,
            buffers: self.buffers,
        })
    }
}

/// Read one frame without decoding its header.
pub async fn read_raw<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<RawFrame> {
    let header_len = reader.read_u32_le().await?;
    if header_len > MAX_HEADER_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame header of {header_len} bytes exceeds limit"),
        ));
    }
    let mut header = vec![0u8; header_len as usize];
    reader.read_exact(&mut header).await?;

    let buffer_count = reader.read_u32_le().await?;
    let mut buffers = Vec::with_capacity(buffer_count.min(1024) as usize);
    for _ in 0..buffer_count {
        let len = reader.read_u32_le().await?;
        if len > MAX_BUFFER_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame buffer of {len} bytes exceeds limit"),
            ));
        }
        let mut buffer = vec![0u8; len as usize];
        reader.read_exact(&mut buffer).await?;
        buffers.push(buffer);
    }
    Ok(RawFrame { header, buffers })
}

/// Read and decode one frame.
pub async fn read_frame<R, T>(reader: &mut R) -> io::Result<Frame<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let raw = read_raw(reader).await?;
    raw.decode()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

/// Write one frame: payload, metadata, and binary buffers.
pub async fn write_frame<W, T>(
    writer: &mut W,
    content: &T,
    metadata: &serde_json::Value,
    buffers: &[Vec<u8>],
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let header = serde_json::to_vec(&HeaderRef { content, metadata })
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    // Same limits as the read side, checked before anything hits the wire;
    // a bare `as u32` cast would silently truncate the length prefix.
    if header.len() > MAX_HEADER_LEN as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame header of {} bytes exceeds limit", header.len()),
        ));
    }
    if let Some(oversized) = buffers.iter().find(|b| b.len() > MAX_BUFFER_LEN as usize) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame buffer of {} bytes exceeds limit", oversized.len()),
        ));
    }
    writer.write_u32_le(header.len() as u32).await?;
    writer.write_all(&header).await?;
    writer.write_u32_le(buffers.len() as u32).await?;
    for buffer in buffers {
        writer.write_u32_le(buffer.len() as u32).await?;
        writer.write_all(buffer).await?;
    }
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Instruction, Message};
    use serde_json::json;

    #[tokio::test]
    async fn round_trip_with_buffers() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        let message = Message::Exec {
            instructions: vec![Instruction::exec("bufferData", vec![json!("bufferfloat32")])],
        };
        let buffers = vec![vec![1u8, 2, 3, 4], vec![]];
        write_frame(&mut client, &message, &json!({"id": 7}), &buffers)
            .await
            .unwrap();

        let frame: Frame<Message> = read_frame(&mut server).await.unwrap();
        assert_eq!(frame.content, message);
        assert_eq!(frame.metadata, json!({"id": 7}));
        assert_eq!(frame.buffers, buffers);
    }

    #[tokio::test]
    async fn metadata_defaults_to_null_when_absent() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        let header = br#"{"content":{"type":"getMethods","target":"context"}}"#;
        client
            .write_u32_le(header.len() as u32)
            .await
            .unwrap();
        client.write_all(header).await.unwrap();
        client.write_u32_le(0).await.unwrap();
        client.flush().await.unwrap();

        let frame: Frame<Message> = read_frame(&mut server).await.unwrap();
        assert_eq!(frame.metadata, serde_json::Value::Null);
        assert!(frame.buffers.is_empty());
    }

    #[tokio::test]
    async fn oversized_header_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_u32_le(MAX_HEADER_LEN + 1).await.unwrap();
        client.flush().await.unwrap();

        let err = read_raw(&mut server).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn oversized_header_is_rejected_before_writing() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let message = Message::GetMethods {
            target: crate::IntrospectionTarget::Context,
        };
        let metadata = json!("a".repeat(MAX_HEADER_LEN as usize));

        let err = write_frame(&mut client, &message, &metadata, &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        // Nothing reached the wire: a well-formed frame is still first.
        write_frame(&mut client, &message, &serde_json::Value::Null, &[])
            .await
            .unwrap();
        let frame: Frame<Message> = read_frame(&mut server).await.unwrap();
        assert_eq!(frame.content, message);
    }

    #[tokio::test]
    async fn undecodable_header_keeps_the_stream_aligned() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        let bad = br#"{"content":{"type":"noSuchType"}}"#;
        client.write_u32_le(bad.len() as u32).await.unwrap();
        client.write_all(bad).await.unwrap();
        client.write_u32_le(0).await.unwrap();

        let good = Message::GetMethods {
            target: crate::IntrospectionTarget::Context,
        };
        write_frame(&mut client, &good, &serde_json::Value::Null, &[])
            .await
            .unwrap();

        let raw = read_raw(&mut server).await.unwrap();
        assert!(raw.decode::<Message>().is_err());
        let frame: Frame<Message> = read_frame(&mut server).await.unwrap();
        assert_eq!(frame.content, good);
    }
}
