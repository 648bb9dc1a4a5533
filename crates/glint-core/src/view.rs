//! Orbit side-view.
//!
//! The view owns a frame-pacing task that emits one [`FrameTick`] per tick
//! into the session event loop. The session turns each tick into a call to
//! [`crate::Context::view_frame`], so frame batches never overlap an
//! envelope: both arrive on the same single-consumer event channel.

use glint_proto::Instruction;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// One frame event emitted by the pacing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTick;

/// Orbit parameters, taken from an optional leading JSON object of the
/// `orbitView` command arguments.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct OrbitParams {
    /// Frame events per second.
    pub fps: f64,
    /// Orbit circle radius.
    pub radius: f64,
    /// Degrees advanced per frame.
    pub speed: f64,
}

impl Default for OrbitParams {
    fn default() -> Self {
        Self {
            fps: 30.0,
            radius: 5.0,
            speed: 1.0,
        }
    }
}

impl OrbitParams {
    /// Parse from the command's argument list. A missing, non-object or
    /// malformed leading argument falls back to the defaults.
    pub fn from_args(args: &[serde_json::Value]) -> Self {
        args.first()
            .filter(|value| value.is_object())
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }
}

/// The active side-view: orbit state plus the frame-pacing task.
pub struct OrbitView {
    params: OrbitParams,
    angle: f64,
    instructions: Vec<Instruction>,
    pacer: JoinHandle<()>,
}

impl OrbitView {
    /// Spawn the pacing task and return the view. Requires a Tokio runtime.
    pub fn spawn(
        params: OrbitParams,
        instructions: Vec<Instruction>,
        frames: mpsc::Sender<FrameTick>,
    ) -> Self {
        let period = Duration::from_secs_f64(1.0 / params.fps.max(1.0));
        let pacer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if frames.send(FrameTick).await.is_err() {
                    break;
                }
            }
        });
        Self {
            params,
            angle: 0.0,
            instructions,
            pacer,
        }
    }

    pub fn params(&self) -> OrbitParams {
        self.params
    }

    /// Current orbit angle in degrees.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Eye position on the orbit circle at the current angle.
    pub fn eye(&self) -> [f32; 3] {
        let rad = self.angle.to_radians();
        [
            (self.params.radius * rad.cos()) as f32,
            0.0,
            (self.params.radius * rad.sin()) as f32,
        ]
    }

    /// Advance the orbit by one frame and return the new eye position.
    pub fn advance(&mut self) -> [f32; 3] {
        self.angle = (self.angle + self.params.speed).rem_euclid(360.0);
        self.eye()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Dispose of the view, stopping its pacing task.
    pub fn remove(self) {
        drop(self);
    }
}

impl Drop for OrbitView {
    fn drop(&mut self) {
        self.pacer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn params_default_when_absent_or_malformed() {
        assert_eq!(OrbitParams::from_args(&[]), OrbitParams::default());
        assert_eq!(
            OrbitParams::from_args(&[json!("not an object")]),
            OrbitParams::default()
        );
        assert_eq!(
            OrbitParams::from_args(&[json!({"fps": "fast"})]),
            OrbitParams::default()
        );
    }

    #[test]
    fn params_merge_with_defaults() {
        let params = OrbitParams::from_args(&[json!({"radius": 2.0})]);
        assert_eq!(params.radius, 2.0);
        assert_eq!(params.fps, 30.0);
        assert_eq!(params.speed, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_task_emits_frames_until_dropped() {
        let (tx, mut rx) = mpsc::channel(8);
        let params = OrbitParams {
            fps: 10.0,
            ..OrbitParams::default()
        };
        let view = OrbitView::spawn(params, vec![], tx);

        // The first interval tick fires immediately.
        assert_eq!(rx.recv().await, Some(FrameTick));
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(rx.recv().await, Some(FrameTick));

        view.remove();
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn advance_wraps_the_angle() {
        let (tx, _rx) = mpsc::channel(1);
        let params = OrbitParams {
            speed: 350.0,
            radius: 1.0,
            ..OrbitParams::default()
        };
        let mut view = OrbitView::spawn(params, vec![], tx);
        view.advance();
        assert_eq!(view.angle(), 350.0);
        view.advance();
        assert!((view.angle() - 340.0).abs() < 1e-9);
        let eye = view.eye();
        assert!((eye[0] - 340.0f32.to_radians().cos()).abs() < 1e-6);
    }
}
