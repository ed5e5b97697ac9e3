//! Double-buffered off-screen frame compositor.
//!
//! A browser engine painting off-screen hands over BGRA buffers on a worker
//! thread. Each [`RenderHandler`] writes them into a staging texture, stamps
//! the popup overlay when one is visible, copies staging into a presentation
//! texture, and posts the result to a [`PresentationBridge`] that the UI
//! thread drains to bind and invalidate its display surfaces.
//!
//! Handlers share one device through [`SharedGraphicsContext`]. On a GPU,
//! `SharedGraphicsContext::wgpu_from(&config)` opens the wgpu device the
//! config's `device` section describes; the example below uses the
//! in-memory [`SoftwareDevice`].
//!
//! ```no_run
//! use osr_compositor::{
//!     channel, CompositorConfig, Rect, RenderHandler, SharedGraphicsContext, SoftwareDevice,
//!     SoftwarePresentation, SurfaceHandle,
//! };
//! # use osr_compositor::{ContextLostCallback, DisplaySurface};
//! # use std::sync::Arc;
//! # struct View;
//! # impl DisplaySurface<SoftwarePresentation> for View {
//! #     fn bind(&mut self, _: Arc<SoftwarePresentation>) {}
//! #     fn invalidate(&mut self) {}
//! #     fn on_context_lost(&mut self, _: ContextLostCallback) {}
//! # }
//!
//! let context = SharedGraphicsContext::new(|| Ok(SoftwareDevice::new()));
//! let (sender, mut bridge) = channel();
//! let handler = RenderHandler::new(&context, CompositorConfig::from_env(), sender)?;
//!
//! let surface = SurfaceHandle::next();
//! bridge.register(surface, View);
//!
//! let frame = vec![0u8; 64 * 64 * 4];
//! handler.deliver_frame(false, Rect::full(64, 64), Some(&frame), 64, 64, surface);
//! bridge.drain();
//! # Ok::<(), osr_compositor::CompositorError>(())
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod presentation;
pub mod rendering;

pub use config::{CompositorConfig, DirtyCopyMode};
pub use error::{CompositorError, CompositorResult};
pub use handler::{FrameOutcome, RenderHandler};
pub use presentation::{
    channel, CloseSignal, ContextLostCallback, DisplaySurface, PresentationBridge,
    PresentationSender, PresentationTask,
};
pub use rendering::{
    CompositePath, DropReason, FrameDescriptor, FrameKind, GraphicsDevice, Rect,
    SharedGraphicsContext, SoftwareDevice, SoftwarePresentation, SurfaceHandle, WgpuDevice,
};
