//! Hand-off from the frame worker to the UI thread.
//!
//! The worker never touches a display surface. It posts
//! [`PresentationTask`]s on an unbounded channel and returns; the UI thread
//! owns the [`PresentationBridge`] and drains the tasks in order.

mod bridge;
mod surface;

pub use bridge::PresentationBridge;
pub use surface::{ContextLostCallback, DisplaySurface};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::rendering::SurfaceHandle;

/// Work run on the UI thread once the surface has adopted a new texture.
/// Typically drops the superseded texture pair under the handler lock.
pub type Retirement = Box<dyn FnOnce() + Send + 'static>;

/// Invoked when a surface reports context loss.
pub type ContextLostHook = Arc<dyn Fn() + Send + Sync + 'static>;

/// Closed flag of one render handler, shared with every task it posts.
///
/// Tasks still queued when the handler closes must not reach the surface.
#[derive(Debug, Clone, Default)]
pub struct CloseSignal(Arc<AtomicBool>);

impl CloseSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark closed. Returns `true` if it already was.
    pub fn close(&self) -> bool {
        self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One unit of UI work.
pub enum PresentationTask<T> {
    /// New content is in `texture`; attach the surface on first use,
    /// otherwise just invalidate it.
    Present {
        surface: SurfaceHandle,
        texture: Arc<T>,
        on_context_lost: ContextLostHook,
        closed: CloseSignal,
    },
    /// The texture pair was replaced: bind `texture`, then run `retire`.
    /// `retire` runs even when the handler has closed.
    Adopt {
        surface: SurfaceHandle,
        texture: Arc<T>,
        retire: Retirement,
        closed: CloseSignal,
    },
}

impl<T> PresentationTask<T> {
    pub fn surface(&self) -> SurfaceHandle {
        match self {
            Self::Present { surface, .. } | Self::Adopt { surface, .. } => *surface,
        }
    }
}

/// Worker side of the presentation channel.
pub struct PresentationSender<T> {
    tx: flume::Sender<PresentationTask<T>>,
}

impl<T> Clone for PresentationSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> PresentationSender<T> {
    /// Post a task without blocking. Returns `false` once the bridge is gone.
    pub fn send(&self, task: PresentationTask<T>) -> bool {
        match self.tx.send(task) {
            Ok(()) => true,
            Err(flume::SendError(task)) => {
                log::debug!(
                    "[PresentationBridge] Bridge dropped, discarding task for surface {}",
                    task.surface().id()
                );
                false
            },
        }
    }

    /// Tasks posted but not yet drained.
    pub fn pending(&self) -> usize {
        self.tx.len()
    }
}

/// Create a connected sender / bridge pair.
pub fn channel<T, S>() -> (PresentationSender<T>, PresentationBridge<T, S>)
where
    S: DisplaySurface<T>,
{
    let (tx, rx) = flume::unbounded();
    (PresentationSender { tx }, PresentationBridge::new(rx))
}
