//! Per-connection session event loop.
//!
//! One task owns the [`Context`] and the socket write half and consumes a
//! single event channel carrying both decoded envelopes and side-view frame
//! ticks. Processing is strictly sequential: a frame batch can interleave
//! between envelopes but never within one, which is all the ordering the
//! bridge guarantees.

use anyhow::Context as _;
use glint_core::{Context, FrameTick};
use glint_proto::framing::{self, Frame};
use glint_proto::Message;
use tokio::net::unix::OwnedReadHalf;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub enum SessionEvent {
    Envelope(Frame<Message>),
    Frame,
    Closed,
}

/// Run one session to completion.
pub async fn run_session(stream: UnixStream) -> anyhow::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let (event_tx, mut event_rx) = mpsc::channel::<SessionEvent>(64);
    let (frame_tx, mut frame_rx) = mpsc::channel::<FrameTick>(8);

    // Side-view frame ticks join the envelope stream so the session task
    // stays the only consumer of the context.
    let pacing_tx = event_tx.clone();
    let forwarder = tokio::spawn(async move {
        while frame_rx.recv().await.is_some() {
            if pacing_tx.send(SessionEvent::Frame).await.is_err() {
                break;
            }
        }
    });

    let reader = tokio::spawn(read_loop(read_half, event_tx));

    let mut context = Context::new(frame_tx);
    while let Some(event) = event_rx.recv().await {
        match event {
            SessionEvent::Envelope(frame) => {
                let Frame {
                    content,
                    metadata,
                    buffers,
                } = frame;
                match context.handle_message(content, buffers) {
                    Ok(Some(reply)) => {
                        framing::write_frame(&mut write_half, &reply, &metadata, &[])
                            .await
                            .context("write reply frame")?;
                    }
                    Ok(None) => {}
                    // Fatal for the envelope, not for the session.
                    Err(err) => error!("envelope processing failed: {err}"),
                }
            }
            SessionEvent::Frame => {
                if let Err(err) = context.view_frame() {
                    error!("orbit frame batch failed: {err}");
                }
            }
            SessionEvent::Closed => break,
        }
    }

    forwarder.abort();
    reader.abort();
    Ok(())
}

/// Decode frames off the socket into session events.
///
/// A frame whose header does not decode as a [`Message`] is logged and
/// dropped; the stream stays aligned on frame boundaries.
async fn read_loop(mut read_half: OwnedReadHalf, events: mpsc::Sender<SessionEvent>) {
    loop {
        match framing::read_raw(&mut read_half).await {
            Ok(raw) => match raw.decode::<Message>() {
                Ok(frame) => {
                    debug!("envelope received");
                    if events.send(SessionEvent::Envelope(frame)).await.is_err() {
                        break;
                    }
                }
                Err(err) => warn!("dropping undecodable envelope: {err}"),
            },
            Err(err) => {
                if err.kind() == std::io::ErrorKind::UnexpectedEof {
                    info!("client disconnected");
                } else {
                    error!("socket read failed: {err}");
                }
                let _ = events.send(SessionEvent::Closed).await;
                break;
            }
        }
    }
}
