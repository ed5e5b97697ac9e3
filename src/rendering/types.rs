//! Core data types shared across the rendering pipeline.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{CompositorError, CompositorResult};

/// Paint buffers are always 32-bit BGRA.
pub const BYTES_PER_PIXEL: usize = 4;

/// Rectangle in frame pixel space, as delivered by the paint callback.
///
/// Signed because the browser may report rects that hang off the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rect covering a whole `width` x `height` frame.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, clamp_i32(width), clamp_i32(height))
    }

    /// Intersect with `[0,width) x [0,height)`. `None` when nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<PixelRect> {
        let left = i64::from(self.x).max(0);
        let top = i64::from(self.y).max(0);
        let right = (i64::from(self.x) + i64::from(self.width)).min(i64::from(width));
        let bottom = (i64::from(self.y) + i64::from(self.height)).min(i64::from(height));

        if right <= left || bottom <= top {
            return None;
        }

        Some(PixelRect {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }
}

fn clamp_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// A dirty rect that has been clamped to its frame and has non-zero area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn covers(&self, width: u32, height: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width == width && self.height == height
    }
}

/// Opaque identifier of a display surface owned by the UI thread.
///
/// Frames carry the handle; only the presentation bridge can resolve it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(u64);

impl SurfaceHandle {
    /// Allocate a process-unique handle.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Which paint element a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// The main view.
    Base,
    /// The popup widget (select dropdown, autocomplete box).
    Overlay,
}

/// One delivered frame, valid only for the duration of the delivery call.
#[derive(Debug, Clone, Copy)]
pub struct FrameDescriptor<'a> {
    pub kind: FrameKind,
    pub dirty_rect: Rect,
    /// Borrowed paint buffer. `None` means "no pixel content".
    pub buffer: Option<&'a [u8]>,
    pub width: u32,
    pub height: u32,
    pub surface: SurfaceHandle,
}

impl<'a> FrameDescriptor<'a> {
    pub fn new(
        kind: FrameKind,
        dirty_rect: Rect,
        buffer: Option<&'a [u8]>,
        width: u32,
        height: u32,
        surface: SurfaceHandle,
    ) -> Self {
        Self {
            kind,
            dirty_rect,
            buffer,
            width,
            height,
            surface,
        }
    }

    /// Build a descriptor straight from paint-callback arguments.
    ///
    /// A null `buffer` yields a descriptor without content. Negative sizes
    /// are rejected.
    ///
    /// # Safety
    /// When non-null, `buffer` must point to at least
    /// `width * height * BYTES_PER_PIXEL` readable bytes that stay valid and
    /// unmodified for `'a`.
    pub unsafe fn from_raw(
        is_overlay: bool,
        dirty_rect: Rect,
        buffer: *const u8,
        width: i32,
        height: i32,
        surface: SurfaceHandle,
    ) -> CompositorResult<Self> {
        let (width, height) = match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(CompositorError::InvalidFrame(format!(
                    "negative frame size {}x{}",
                    width, height
                )))
            },
        };

        let kind = if is_overlay {
            FrameKind::Overlay
        } else {
            FrameKind::Base
        };

        let len = width as usize * height as usize * BYTES_PER_PIXEL;
        let buffer = if buffer.is_null() || len == 0 {
            None
        } else {
            // SAFETY: caller guarantees `len` readable bytes for `'a`.
            Some(std::slice::from_raw_parts(buffer, len))
        };

        Ok(Self::new(kind, dirty_rect, buffer, width, height, surface))
    }

    pub fn is_overlay(&self) -> bool {
        self.kind == FrameKind::Overlay
    }

    /// `width * height * 4`.
    pub fn byte_count(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    pub fn row_stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The paint buffer trimmed to `byte_count`, if present.
    ///
    /// A buffer shorter than the frame claims is an error rather than a
    /// partial read.
    pub fn pixels(&self) -> CompositorResult<Option<&'a [u8]>> {
        let Some(buffer) = self.buffer else {
            return Ok(None);
        };
        let needed = self.byte_count();
        if buffer.len() < needed {
            return Err(CompositorError::InvalidFrame(format!(
                "buffer holds {} bytes, {}x{} frame needs {}",
                buffer.len(),
                self.width,
                self.height,
                needed
            )));
        }
        Ok(Some(&buffer[..needed]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_inner_rect() {
        let r = Rect::new(10, 20, 30, 40);
        assert_eq!(
            r.clamp_to(100, 100),
            Some(PixelRect {
                x: 10,
                y: 20,
                width: 30,
                height: 40
            })
        );
    }

    #[test]
    fn clamp_trims_overhang() {
        let r = Rect::new(-5, 90, 20, 50);
        assert_eq!(
            r.clamp_to(100, 100),
            Some(PixelRect {
                x: 0,
                y: 90,
                width: 15,
                height: 10
            })
        );
    }

    #[test]
    fn clamp_rejects_degenerate() {
        assert_eq!(Rect::new(0, 0, 0, 10).clamp_to(100, 100), None);
        assert_eq!(Rect::new(100, 0, 10, 10).clamp_to(100, 100), None);
        assert_eq!(Rect::new(0, 0, -4, 10).clamp_to(100, 100), None);
        assert_eq!(Rect::new(0, 0, 10, 10).clamp_to(0, 0), None);
    }

    #[test]
    fn clamp_survives_extreme_values() {
        let r = Rect::new(i32::MAX, i32::MAX, i32::MAX, i32::MAX);
        assert_eq!(r.clamp_to(100, 100), None);
        let r = Rect::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert_eq!(r.clamp_to(4, 4), None);
        let r = Rect::new(-10, -10, i32::MAX, i32::MAX);
        assert_eq!(r.clamp_to(4, 4).map(|p| p.covers(4, 4)), Some(true));
    }

    #[test]
    fn full_rect_covers_frame() {
        let r = Rect::full(64, 32).clamp_to(64, 32).unwrap();
        assert!(r.covers(64, 32));
    }

    #[test]
    fn surface_handles_are_unique() {
        let a = SurfaceHandle::next();
        let b = SurfaceHandle::next();
        assert_ne!(a, b);
    }

    #[test]
    fn pixels_rejects_short_buffer() {
        let data = vec![0u8; 15];
        let frame = FrameDescriptor::new(
            FrameKind::Base,
            Rect::full(2, 2),
            Some(&data),
            2,
            2,
            SurfaceHandle::next(),
        );
        assert_eq!(frame.byte_count(), 16);
        assert!(frame.pixels().is_err());
    }

    #[test]
    fn pixels_trims_long_buffer() {
        let data = vec![1u8; 20];
        let frame = FrameDescriptor::new(
            FrameKind::Base,
            Rect::full(2, 2),
            Some(&data),
            2,
            2,
            SurfaceHandle::next(),
        );
        assert_eq!(frame.pixels().unwrap().map(<[u8]>::len), Some(16));
    }

    #[test]
    fn from_raw_null_buffer_has_no_content() {
        let frame = unsafe {
            FrameDescriptor::from_raw(
                false,
                Rect::full(8, 8),
                std::ptr::null(),
                8,
                8,
                SurfaceHandle::next(),
            )
        }
        .unwrap();
        assert!(frame.buffer.is_none());
        assert_eq!(frame.kind, FrameKind::Base);
    }

    #[test]
    fn from_raw_reads_buffer() {
        let data = vec![7u8; 2 * 3 * BYTES_PER_PIXEL];
        let frame = unsafe {
            FrameDescriptor::from_raw(
                true,
                Rect::full(2, 3),
                data.as_ptr(),
                2,
                3,
                SurfaceHandle::next(),
            )
        }
        .unwrap();
        assert!(frame.is_overlay());
        assert_eq!(frame.buffer.map(<[u8]>::len), Some(24));
    }

    #[test]
    fn from_raw_rejects_negative_size() {
        let result = unsafe {
            FrameDescriptor::from_raw(
                false,
                Rect::default(),
                std::ptr::null(),
                -1,
                4,
                SurfaceHandle::next(),
            )
        };
        assert!(result.is_err());
    }
}
