//! Render handler: the inbound side of the compositor.
//!
//! One handler per browser view. The paint callback calls
//! [`RenderHandler::deliver_frame`] on the worker thread; everything that
//! touches the texture pair runs under one lock, and surface work is posted
//! to the [`PresentationBridge`](crate::presentation::PresentationBridge).
//! Per-frame failures are logged and reported as [`FrameOutcome::Dropped`];
//! they never propagate back into the browser.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::CompositorConfig;
use crate::error::{CompositorError, CompositorResult};
use crate::presentation::{CloseSignal, ContextLostHook, PresentationSender, PresentationTask};
use crate::rendering::{
    CompositeOutcome, CompositePath, DropReason, FrameCompositor, FrameDescriptor, FrameKind,
    GraphicsDevice, Rect, RetiredTextures, SharedGraphicsContext, SurfaceHandle,
};

/// What a delivery did, for callers that care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// First base frame sized the texture pair.
    Initialized,
    /// Frame size changed; a new pair is being adopted and this frame's
    /// pixels were discarded.
    Resized,
    /// Popup frame stored before any base frame arrived.
    OverlayStored,
    Composited(CompositePath),
    Dropped(DropReason),
}

struct Shared<D: GraphicsDevice> {
    compositor: Mutex<FrameCompositor<D>>,
    sender: PresentationSender<D::Presentation>,
    reinit_pending: AtomicBool,
    closed: CloseSignal,
    /// One context-lost hook per surface, reused by every Present.
    hooks: Mutex<HashMap<SurfaceHandle, ContextLostHook>>,
}

impl<D: GraphicsDevice> Shared<D> {
    /// Post adoption of `presentation`; `retired` is dropped on the UI thread
    /// under the handler lock once the surface has rebound.
    fn post_adopt(
        self: &Arc<Self>,
        surface: SurfaceHandle,
        presentation: Arc<D::Presentation>,
        retired: RetiredTextures<D>,
    ) {
        let shared = Arc::downgrade(self);
        self.sender.send(PresentationTask::Adopt {
            surface,
            texture: presentation,
            retire: Box::new(move || match shared.upgrade() {
                Some(shared) => {
                    let _compositor = shared.compositor.lock();
                    drop(retired);
                },
                None => drop(retired),
            }),
            closed: self.closed.clone(),
        });
    }

    /// Hook handed to the surface: rebuild the pair and re-post adoption.
    fn context_lost_hook(self: &Arc<Self>, surface: SurfaceHandle) -> ContextLostHook {
        let mut hooks = self.hooks.lock();
        let hook = hooks
            .entry(surface)
            .or_insert_with(|| Self::build_context_lost_hook(Arc::downgrade(self), surface));
        Arc::clone(hook)
    }

    fn build_context_lost_hook(shared: Weak<Self>, surface: SurfaceHandle) -> ContextLostHook {
        Arc::new(move || {
            if let Some(shared) = shared.upgrade() {
                log::warn!(
                    "[RenderHandler] Surface {} lost its context, reinitializing textures",
                    surface.id()
                );
                if let Err(e) = shared.reinitialize(surface) {
                    log::error!("[RenderHandler] Reinitialization failed: {}", e);
                    if e.is_recoverable() {
                        shared.reinit_pending.store(true, Ordering::SeqCst);
                    }
                }
            }
        })
    }

    fn reinitialize(self: &Arc<Self>, surface: SurfaceHandle) -> CompositorResult<bool> {
        if self.closed.is_closed() {
            return Ok(false);
        }
        let mut compositor = self.compositor.lock();
        self.reinitialize_locked(&mut compositor, surface)
    }

    fn reinitialize_locked(
        self: &Arc<Self>,
        compositor: &mut FrameCompositor<D>,
        surface: SurfaceHandle,
    ) -> CompositorResult<bool> {
        match compositor.reinitialize()? {
            Some(reinit) => {
                self.post_adopt(surface, reinit.presentation, reinit.retired);
                Ok(true)
            },
            None => Ok(false),
        }
    }
}

/// Receives paint frames for one view and drives compositing.
pub struct RenderHandler<D: GraphicsDevice> {
    shared: Arc<Shared<D>>,
    slow_frame_threshold: Duration,
    log_frame_rate: bool,
}

impl<D: GraphicsDevice> RenderHandler<D> {
    /// Create a handler on the shared device.
    ///
    /// Fails only when the device cannot be created.
    pub fn new(
        context: &SharedGraphicsContext<D>,
        config: CompositorConfig,
        sender: PresentationSender<D::Presentation>,
    ) -> CompositorResult<Self> {
        let mut config = config;
        config.validate();

        let device = context.get()?;
        let shared = Arc::new(Shared {
            compositor: Mutex::new(FrameCompositor::new(Arc::clone(&device), &config)),
            sender,
            reinit_pending: AtomicBool::new(false),
            closed: CloseSignal::new(),
            hooks: Mutex::new(HashMap::new()),
        });

        let weak: Weak<Shared<D>> = Arc::downgrade(&shared);
        device.add_device_lost_listener(Box::new(move |reason| {
            if let Some(shared) = weak.upgrade() {
                log::warn!(
                    "[RenderHandler] Device lost ({}), textures will be rebuilt on next frame",
                    reason
                );
                shared.reinit_pending.store(true, Ordering::SeqCst);
            }
        }));

        log::info!("[RenderHandler] Created on {}", device.name());

        Ok(Self {
            shared,
            slow_frame_threshold: Duration::from_millis(config.slow_frame_warn_ms),
            log_frame_rate: config.log_frame_rate,
        })
    }

    /// Paint callback entry point. `buffer` is only borrowed for this call.
    pub fn deliver_frame(
        &self,
        is_overlay: bool,
        dirty_rect: Rect,
        buffer: Option<&[u8]>,
        width: u32,
        height: u32,
        surface: SurfaceHandle,
    ) -> FrameOutcome {
        let kind = if is_overlay {
            FrameKind::Overlay
        } else {
            FrameKind::Base
        };
        self.deliver(&FrameDescriptor::new(
            kind, dirty_rect, buffer, width, height, surface,
        ))
    }

    pub fn deliver(&self, frame: &FrameDescriptor<'_>) -> FrameOutcome {
        let start = Instant::now();

        if self.is_closed() {
            return FrameOutcome::Dropped(DropReason::Closed);
        }

        let mut compositor = self.shared.compositor.lock();
        let lock_time = start.elapsed();

        // close() may have won the lock race.
        if self.is_closed() {
            return FrameOutcome::Dropped(DropReason::Closed);
        }

        if self.shared.reinit_pending.swap(false, Ordering::SeqCst) {
            if let Err(e) = self.shared.reinitialize_locked(&mut compositor, frame.surface) {
                log::warn!("[RenderHandler] Texture rebuild failed, dropping frame: {}", e);
                if e.is_recoverable() {
                    self.shared.reinit_pending.store(true, Ordering::SeqCst);
                }
                return FrameOutcome::Dropped(DropReason::DeviceLost);
            }
        }

        let outcome = match compositor.composite(frame) {
            Ok(outcome) => self.dispatch(outcome, frame.surface),
            Err(e) => self.drop_reason(e),
        };

        if matches!(outcome, FrameOutcome::Composited(path) if path != CompositePath::OverlaySnapshot) {
            if let Some(rate) = compositor.record_frame() {
                if self.log_frame_rate {
                    log::debug!("[RenderHandler] {} fps", rate);
                }
            }
        }
        drop(compositor);

        let total = start.elapsed();
        if total > self.slow_frame_threshold {
            log::warn!(
                "[RenderHandler] Slow frame {}x{}: total {:?} (lock {:?}, {} queued) -> {:?}",
                frame.width,
                frame.height,
                total,
                lock_time,
                self.shared.sender.pending(),
                outcome
            );
        }

        outcome
    }

    fn dispatch(&self, outcome: CompositeOutcome<D>, surface: SurfaceHandle) -> FrameOutcome {
        match outcome {
            CompositeOutcome::Initialized => FrameOutcome::Initialized,
            CompositeOutcome::OverlayStored => FrameOutcome::OverlayStored,
            CompositeOutcome::Resized {
                retired,
                presentation,
            } => {
                self.shared.post_adopt(surface, presentation, retired);
                FrameOutcome::Resized
            },
            CompositeOutcome::Presented { path, presentation } => {
                self.shared.sender.send(PresentationTask::Present {
                    surface,
                    texture: presentation,
                    on_context_lost: self.shared.context_lost_hook(surface),
                    closed: self.shared.closed.clone(),
                });
                FrameOutcome::Composited(path)
            },
            CompositeOutcome::Dropped(reason) => FrameOutcome::Dropped(reason),
        }
    }

    fn drop_reason(&self, error: CompositorError) -> FrameOutcome {
        let reason = match &error {
            CompositorError::DeviceLost(_) => {
                self.shared.reinit_pending.store(true, Ordering::SeqCst);
                DropReason::DeviceLost
            },
            CompositorError::InvalidFrame(_) => DropReason::InvalidFrame,
            _ => DropReason::Failed,
        };
        log::warn!("[RenderHandler] Dropping frame: {}", error);
        FrameOutcome::Dropped(reason)
    }

    /// Popup shown or hidden by the browser.
    pub fn set_popup_visible(&self, visible: bool) {
        self.shared.compositor.lock().set_popup_visible(visible);
    }

    /// Popup placement reported by the browser.
    pub fn set_popup_rect(&self, rect: Rect) {
        self.shared.compositor.lock().set_popup_rect(rect);
    }

    /// Base frames composited during the last full wall-clock second.
    pub fn frame_rate(&self) -> u32 {
        self.shared.compositor.lock().frame_rate()
    }

    /// Current texture pair size, if any frame has sized it.
    pub fn texture_size(&self) -> Option<(u32, u32)> {
        self.shared.compositor.lock().textures().size()
    }

    /// Rebuild textures before the next delivery.
    pub fn request_reinit(&self) {
        self.shared.reinit_pending.store(true, Ordering::SeqCst);
    }

    /// Rebuild textures now and post adoption for `surface`.
    /// Returns `false` when there was nothing to rebuild.
    pub fn reinitialize_textures(&self, surface: SurfaceHandle) -> CompositorResult<bool> {
        self.shared.reinitialize(surface)
    }

    /// Presentation tasks posted by any handler on this channel and not yet
    /// drained by the UI thread.
    pub fn pending_presentations(&self) -> usize {
        self.shared.sender.pending()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_closed()
    }

    /// Stop presenting and release the texture pair and popup snapshot.
    ///
    /// A delivery already holding the lock completes first. Presents still
    /// queued on the bridge are skipped; queued adoptions only retire their
    /// old pair. Safe to call more than once.
    pub fn close(&self) {
        if self.shared.closed.close() {
            return;
        }
        self.shared.hooks.lock().clear();
        let released = self.shared.compositor.lock().release();
        if released.is_some() {
            log::info!("[RenderHandler] Closed, texture pair released");
        }
    }
}

impl<D: GraphicsDevice> Drop for RenderHandler<D> {
    fn drop(&mut self) {
        self.close();
    }
}
