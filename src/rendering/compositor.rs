//! Per-frame compositing decision.
//!
//! [`FrameCompositor`] is the state a render handler keeps behind its lock:
//! the texture pair, the popup snapshot and the frame-rate counter. Each
//! delivered frame goes through [`FrameCompositor::composite`], which picks
//! one path, writes staging, and copies staging into the presentation
//! texture. Nothing here talks to the UI; the outcome tells the caller what
//! to hand over.

use std::sync::Arc;

use super::device::{GraphicsDevice, StagingWriteGuard};
use super::frame_ops;
use super::frame_rate::FrameRateMonitor;
use super::overlay::OverlayState;
use super::textures::{RetiredTextures, TextureChange, TextureLifecycleManager};
use super::types::{FrameDescriptor, Rect};
use crate::config::{CompositorConfig, DirtyCopyMode};
use crate::error::{CompositorResult, OptionExt};

/// How a steady-state frame reached staging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositePath {
    /// Overlay frame: snapshot replaced, staging untouched.
    OverlaySnapshot,
    /// Base frame copied whole, visible popup stamped on top.
    OverlayComposite,
    /// Base frame copied whole after the popup was hidden; snapshot released.
    OverlayTeardown,
    /// Only the clamped dirty rect copied.
    DirtyRect,
    /// Whole frame copied because staging held no content yet.
    FullCopy,
}

/// Why a frame was not composited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Zero width or height.
    EmptyFrame,
    /// No paint buffer attached.
    NoContent,
    /// Buffer or rect inconsistent with the frame size.
    InvalidFrame,
    /// Device lost; textures are rebuilt on a later delivery.
    DeviceLost,
    /// Handler closed.
    Closed,
    /// Any other texture or device failure.
    Failed,
}

/// Result of one [`FrameCompositor::composite`] call.
pub enum CompositeOutcome<D: GraphicsDevice> {
    /// First base frame allocated the pair. Nothing to present yet.
    Initialized,
    /// Popup frame arrived before any base frame; only the snapshot was kept.
    OverlayStored,
    /// A new pair replaced the old one. The surface must adopt
    /// `presentation` before `retired` is dropped.
    Resized {
        retired: RetiredTextures<D>,
        presentation: Arc<D::Presentation>,
    },
    /// Staging was written and copied; the surface should redraw.
    Presented {
        path: CompositePath,
        presentation: Arc<D::Presentation>,
    },
    Dropped(DropReason),
}

impl<D: GraphicsDevice> std::fmt::Debug for CompositeOutcome<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized => write!(f, "Initialized"),
            Self::OverlayStored => write!(f, "OverlayStored"),
            Self::Resized { .. } => write!(f, "Resized"),
            Self::Presented { path, .. } => write!(f, "Presented({:?})", path),
            Self::Dropped(reason) => write!(f, "Dropped({:?})", reason),
        }
    }
}

/// A replacement pair after reinitialization.
pub struct Reinitialized<D: GraphicsDevice> {
    pub retired: RetiredTextures<D>,
    pub presentation: Arc<D::Presentation>,
}

/// Texture pair, popup snapshot and frame counter of one handler.
pub struct FrameCompositor<D: GraphicsDevice> {
    textures: TextureLifecycleManager<D>,
    overlay: OverlayState,
    frame_rate: FrameRateMonitor,
    dirty_copy_mode: DirtyCopyMode,
}

impl<D: GraphicsDevice> FrameCompositor<D> {
    pub fn new(device: Arc<D>, config: &CompositorConfig) -> Self {
        Self {
            textures: TextureLifecycleManager::new(device),
            overlay: OverlayState::new(),
            frame_rate: FrameRateMonitor::new(),
            dirty_copy_mode: config.dirty_copy_mode,
        }
    }

    pub fn textures(&self) -> &TextureLifecycleManager<D> {
        &self.textures
    }

    pub fn overlay(&self) -> &OverlayState {
        &self.overlay
    }

    pub fn set_popup_visible(&mut self, visible: bool) {
        self.overlay.set_visible(visible);
    }

    pub fn set_popup_rect(&mut self, rect: Rect) {
        self.overlay.set_rect(rect);
    }

    /// Count one presented base frame. Returns the new rate on a second rollover.
    pub fn record_frame(&mut self) -> Option<u32> {
        self.frame_rate.record_frame()
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate.rate()
    }

    /// Replace the wall clock the frame counter reads.
    pub fn set_frame_clock(&mut self, clock: fn() -> u32) {
        self.frame_rate.set_clock(clock);
    }

    /// Composite one delivered frame.
    pub fn composite(&mut self, frame: &FrameDescriptor<'_>) -> CompositorResult<CompositeOutcome<D>> {
        if frame.width == 0 || frame.height == 0 {
            return Ok(CompositeOutcome::Dropped(DropReason::EmptyFrame));
        }

        if !self.textures.is_initialized() {
            if frame.is_overlay() {
                if frame.buffer.is_none() {
                    return Ok(CompositeOutcome::Dropped(DropReason::NoContent));
                }
                self.overlay.store(frame)?;
                return Ok(CompositeOutcome::OverlayStored);
            }
            self.textures.ensure_textures(frame)?;
            return Ok(CompositeOutcome::Initialized);
        }

        match self.textures.ensure_textures(frame)? {
            TextureChange::Unchanged => {},
            TextureChange::Created => return Ok(CompositeOutcome::Initialized),
            TextureChange::Resized(retired) => {
                let presentation = Arc::clone(
                    self.textures
                        .pair()
                        .context("texture pair missing after resize")?
                        .presentation(),
                );
                return Ok(CompositeOutcome::Resized {
                    retired,
                    presentation,
                });
            },
        }

        let Some(pixels) = frame.pixels()? else {
            return Ok(CompositeOutcome::Dropped(DropReason::NoContent));
        };

        let path = self.choose_path(frame);
        let device = Arc::clone(self.textures.device());
        let pair = self
            .textures
            .pair_mut()
            .context("texture pair missing in steady state")?;

        {
            let mut guard = StagingWriteGuard::lock(device.as_ref(), &mut pair.staging)?;
            let staging = guard.pixels()?;

            match path {
                CompositePath::OverlaySnapshot => self.overlay.store(frame)?,
                CompositePath::OverlayComposite => {
                    frame_ops::copy_full(pixels, staging)?;
                    if let Some(overlay) = self.overlay.buffer() {
                        frame_ops::composite_overlay(staging, frame.width, frame.height, overlay)?;
                    }
                },
                CompositePath::OverlayTeardown | CompositePath::FullCopy => {
                    frame_ops::copy_full(pixels, staging)?;
                },
                CompositePath::DirtyRect => {
                    if let Some(rect) = frame.dirty_rect.clamp_to(frame.width, frame.height) {
                        frame_ops::copy_dirty_rect(
                            pixels,
                            staging,
                            frame.width,
                            rect,
                            self.dirty_copy_mode,
                        )?;
                    }
                },
            }

            guard.unlock()?;
        }

        device.copy_texture(&pair.staging, pair.presentation())?;

        if !frame.is_overlay() {
            pair.mark_filled();
        }
        let presentation = Arc::clone(pair.presentation());

        if path == CompositePath::OverlayTeardown {
            self.overlay.release();
            log::debug!("[FrameCompositor] Popup hidden, overlay released");
        }

        Ok(CompositeOutcome::Presented { path, presentation })
    }

    fn choose_path(&self, frame: &FrameDescriptor<'_>) -> CompositePath {
        if frame.is_overlay() {
            return CompositePath::OverlaySnapshot;
        }
        if self.overlay.is_held() {
            return if self.overlay.is_visible() {
                CompositePath::OverlayComposite
            } else {
                CompositePath::OverlayTeardown
            };
        }
        let needs_full_copy = self
            .textures
            .pair()
            .map(|pair| pair.needs_full_copy())
            .unwrap_or(true);
        if needs_full_copy {
            CompositePath::FullCopy
        } else {
            CompositePath::DirtyRect
        }
    }

    /// Replace the pair with a blank one of the same size.
    pub fn reinitialize(&mut self) -> CompositorResult<Option<Reinitialized<D>>> {
        let Some(retired) = self.textures.reinitialize()? else {
            return Ok(None);
        };
        let presentation = Arc::clone(
            self.textures
                .pair()
                .context("texture pair missing after reinitialize")?
                .presentation(),
        );
        Ok(Some(Reinitialized {
            retired,
            presentation,
        }))
    }

    /// Drop the popup snapshot and hand back the pair for disposal.
    pub fn release(&mut self) -> Option<RetiredTextures<D>> {
        self.overlay.release();
        self.textures.release()
    }
}
