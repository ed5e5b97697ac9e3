//! Popup overlay snapshot.
//!
//! The browser paints popups (select dropdowns, autocomplete) as a separate
//! element. The last delivered popup frame is copied out of the paint buffer
//! and kept here, independent of the base frame's texture lifecycle, so it
//! can be stamped onto every base frame while the popup is visible.

use super::types::{FrameDescriptor, Rect, BYTES_PER_PIXEL};
use crate::error::{CompositorError, CompositorResult};

/// Owned copy of the last overlay frame and where it sits on the base frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayBuffer {
    pub position_x: i32,
    pub position_y: i32,
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: usize,
    pixels: Vec<u8>,
}

impl OverlayBuffer {
    /// Copy an overlay frame's pixels; the paint buffer is not retained.
    pub fn from_frame(
        frame: &FrameDescriptor<'_>,
        position_x: i32,
        position_y: i32,
    ) -> CompositorResult<Self> {
        let pixels = frame
            .pixels()?
            .ok_or_else(|| CompositorError::InvalidFrame("overlay frame has no buffer".into()))?;

        Ok(Self {
            position_x,
            position_y,
            width: frame.width,
            height: frame.height,
            bytes_per_pixel: BYTES_PER_PIXEL,
            pixels: pixels.to_vec(),
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn row_stride(&self) -> usize {
        self.width as usize * self.bytes_per_pixel
    }

    /// Bytes of overlay row `index`.
    pub fn row(&self, index: u32) -> Option<&[u8]> {
        if index >= self.height {
            return None;
        }
        let start = index as usize * self.row_stride();
        self.pixels.get(start..start + self.row_stride())
    }
}

/// Popup state guarded by the handler lock.
#[derive(Debug, Default)]
pub struct OverlayState {
    buffer: Option<OverlayBuffer>,
    visible: bool,
    position_x: i32,
    position_y: i32,
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> Option<&OverlayBuffer> {
        self.buffer.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_held(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn position(&self) -> (i32, i32) {
        (self.position_x, self.position_y)
    }

    /// Show or hide the popup. Hiding keeps the snapshot until the next base
    /// frame has been composited without it.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Popup placement from the browser's popup rect; only the origin is used,
    /// the size comes from the delivered overlay frames.
    pub fn set_rect(&mut self, rect: Rect) {
        self.position_x = rect.x;
        self.position_y = rect.y;
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.position_x = rect.x;
            buffer.position_y = rect.y;
        }
    }

    /// Replace the snapshot with the pixels of `frame`.
    pub fn store(&mut self, frame: &FrameDescriptor<'_>) -> CompositorResult<()> {
        let buffer = OverlayBuffer::from_frame(frame, self.position_x, self.position_y)?;
        self.buffer = Some(buffer);
        Ok(())
    }

    /// Drop the snapshot.
    pub fn release(&mut self) -> Option<OverlayBuffer> {
        self.buffer.take()
    }
}
