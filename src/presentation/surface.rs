//! UI-side display surface seam.

use std::sync::Arc;

/// Called by the surface when its rendering context is lost.
pub type ContextLostCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// A surface owned by the UI thread that shows a presentation texture.
///
/// Implementations are driven only from the thread draining the
/// [`PresentationBridge`](super::PresentationBridge), so they need not be `Send`.
pub trait DisplaySurface<T> {
    /// Make `texture` the surface's source. Replaces any previous binding.
    fn bind(&mut self, texture: Arc<T>);

    /// Schedule a redraw of the bound texture.
    fn invalidate(&mut self);

    /// Subscribe to context loss. Called once per surface.
    fn on_context_lost(&mut self, callback: ContextLostCallback);
}
