//! Seam between the simulation thread and the renderer
//!
//! The renderer runs on its own refresh cadence. After every tick the loop
//! calls [`RenderTarget::frame_ready`], which must not block; the renderer then
//! reads the world through a [`WorldHandle`](crate::ecs::WorldHandle) read lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub use crossbeam_channel::RecvTimeoutError;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

use crate::core::config::DisplayConfig;
use crate::core::error::{EngineError, Result};
use crate::core::types::Tick;

/// Presentation state read by the renderer each frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Asset name of the background image; `None` shows only the color
    pub background_image: Option<String>,
    /// 0xAARRGGBB
    pub background_color: u32,
    /// Viewport zoom (2.0 = 200%)
    pub zoom: f32,
}

impl RenderSettings {
    pub fn from_config(display: &DisplayConfig) -> Self {
        Self {
            background_image: None,
            background_color: display.background_color,
            zoom: display.zoom,
        }
    }

    pub fn set_zoom(&mut self, zoom: f32) -> Result<()> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(EngineError::InvalidZoom(zoom));
        }
        self.zoom = zoom;
        Ok(())
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from_config(&DisplayConfig::default())
    }
}

/// Notification sent after a tick completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Number of ticks completed so far
    pub tick: Tick,
    /// Wall-clock time the tick took
    pub tick_time: Duration,
}

/// Receives one notification per completed tick
///
/// Called on the simulation thread with no locks held. Implementations must
/// return promptly.
pub trait RenderTarget: Send + Sync {
    fn frame_ready(&self, frame: FrameInfo);
}

/// Sending half of a frame channel
///
/// Holds at most one pending frame; when the renderer falls behind, newer
/// notifications are dropped rather than blocking the simulation.
pub struct FrameSignal {
    tx: Sender<FrameInfo>,
    dropped: Arc<AtomicU64>,
}

impl FrameSignal {
    /// Notifications discarded because the renderer had not caught up
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl RenderTarget for FrameSignal {
    fn frame_ready(&self, frame: FrameInfo) {
        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::trace!(tick = frame.tick, "renderer gone, frame signal ignored");
            }
        }
    }
}

/// Receiving half of a frame channel, owned by the renderer
pub struct FrameReceiver {
    rx: Receiver<FrameInfo>,
    dropped: Arc<AtomicU64>,
}

impl FrameReceiver {
    /// Block until the next frame. `None` once the signal is dropped.
    pub fn recv(&self) -> Option<FrameInfo> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<FrameInfo, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Option<FrameInfo> {
        self.rx.try_recv().ok()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Create a connected signal/receiver pair
pub fn frame_channel() -> (FrameSignal, FrameReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        FrameSignal {
            tx,
            dropped: Arc::clone(&dropped),
        },
        FrameReceiver { rx, dropped },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tick: Tick) -> FrameInfo {
        FrameInfo {
            tick,
            tick_time: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_signal_never_blocks() {
        let (signal, receiver) = frame_channel();
        signal.frame_ready(frame(1));
        signal.frame_ready(frame(2));
        signal.frame_ready(frame(3));

        assert_eq!(receiver.try_recv(), Some(frame(1)));
        assert_eq!(receiver.try_recv(), None);
        assert_eq!(receiver.dropped(), 2);
    }

    #[test]
    fn test_receiver_sees_disconnect() {
        let (signal, receiver) = frame_channel();
        drop(signal);
        assert!(receiver.recv().is_none());
        assert_eq!(
            receiver.recv_timeout(Duration::from_millis(1)),
            Err(RecvTimeoutError::Disconnected)
        );
    }

    #[test]
    fn test_signal_survives_missing_receiver() {
        let (signal, receiver) = frame_channel();
        drop(receiver);
        signal.frame_ready(frame(1));
        assert_eq!(signal.dropped(), 0);
    }

    #[test]
    fn test_zoom_validation() {
        let mut settings = RenderSettings::default();
        assert!(settings.set_zoom(2.0).is_ok());
        assert_eq!(settings.zoom, 2.0);
        assert!(matches!(settings.set_zoom(0.0), Err(EngineError::InvalidZoom(_))));
        assert_eq!(settings.zoom, 2.0);
    }
}
