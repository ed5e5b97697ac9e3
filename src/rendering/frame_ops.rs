//! Byte-level frame operations on tightly packed BGRA buffers.
//!
//! Full copies, dirty-rect copies and the popup overlay stamp. Every copy is
//! range-checked against both buffers; nothing here writes past a row.

use super::overlay::OverlayBuffer;
use super::types::{PixelRect, BYTES_PER_PIXEL};
use crate::config::DirtyCopyMode;
use crate::error::{CompositorError, CompositorResult};

/// Copy a whole frame into staging.
pub fn copy_full(source: &[u8], target: &mut [u8]) -> CompositorResult<()> {
    if source.len() != target.len() {
        return Err(CompositorError::InvalidFrame(format!(
            "full copy of {} bytes into {} byte staging",
            source.len(),
            target.len()
        )));
    }
    target.copy_from_slice(source);
    Ok(())
}

/// Copy the dirty region of a `frame_width` wide frame from `source` into
/// `target` at the same offsets. `rect` must already be clamped to the frame.
pub fn copy_dirty_rect(
    source: &[u8],
    target: &mut [u8],
    frame_width: u32,
    rect: PixelRect,
    mode: DirtyCopyMode,
) -> CompositorResult<()> {
    let stride = frame_width as usize * BYTES_PER_PIXEL;
    let offset = rect.y as usize * stride + rect.x as usize * BYTES_PER_PIXEL;
    let run = rect.width as usize * BYTES_PER_PIXEL;

    match mode {
        DirtyCopyMode::Contiguous => {
            let length = (rect.height as usize - 1) * stride + run;
            let range = offset..offset + length;
            let src = source.get(range.clone()).ok_or_else(|| out_of_range("source", &range))?;
            let dst = target
                .get_mut(range.clone())
                .ok_or_else(|| out_of_range("staging", &range))?;
            dst.copy_from_slice(src);
        },
        DirtyCopyMode::RowWise => {
            for row in 0..rect.height as usize {
                let start = offset + row * stride;
                let range = start..start + run;
                let src = source.get(range.clone()).ok_or_else(|| out_of_range("source", &range))?;
                let dst = target
                    .get_mut(range.clone())
                    .ok_or_else(|| out_of_range("staging", &range))?;
                dst.copy_from_slice(src);
            }
        },
    }
    Ok(())
}

/// Stamp `overlay` onto a `base_width` x `base_height` frame held in `target`.
///
/// Opaque replace, no blending. Parts of the overlay outside the base frame
/// are clipped. Returns the number of rows written.
pub fn composite_overlay(
    target: &mut [u8],
    base_width: u32,
    base_height: u32,
    overlay: &OverlayBuffer,
) -> CompositorResult<u32> {
    let base_stride = base_width as usize * BYTES_PER_PIXEL;
    let expected = base_stride * base_height as usize;
    if target.len() < expected {
        return Err(CompositorError::Texture(format!(
            "staging holds {} bytes, base frame needs {}",
            target.len(),
            expected
        )));
    }

    let left = i64::from(overlay.position_x);
    let top = i64::from(overlay.position_y);
    let col_start = left.max(0);
    let col_end = (left + i64::from(overlay.width)).min(i64::from(base_width));
    if col_end <= col_start {
        return Ok(0);
    }

    // Byte offset into each overlay row where the visible part starts.
    let skip = (col_start - left) as usize * BYTES_PER_PIXEL;
    let run = (col_end - col_start) as usize * BYTES_PER_PIXEL;

    let mut written = 0;
    for i in 0..overlay.height {
        let y = top + i64::from(i);
        if y < 0 {
            continue;
        }
        if y >= i64::from(base_height) {
            break;
        }

        let row = overlay.row(i).ok_or_else(|| {
            CompositorError::InvalidFrame(format!("overlay row {} missing", i))
        })?;
        let src = row
            .get(skip..skip + run)
            .ok_or_else(|| out_of_range("overlay", &(skip..skip + run)))?;

        let start = y as usize * base_stride + col_start as usize * BYTES_PER_PIXEL;
        let range = start..start + run;
        let dst = target
            .get_mut(range.clone())
            .ok_or_else(|| out_of_range("staging", &range))?;
        dst.copy_from_slice(src);
        written += 1;
    }

    Ok(written)
}

fn out_of_range(what: &str, range: &std::ops::Range<usize>) -> CompositorError {
    CompositorError::InvalidFrame(format!(
        "{} range {}..{} out of bounds",
        what, range.start, range.end
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::types::{FrameDescriptor, FrameKind, Rect, SurfaceHandle};

    /// Frame whose every pixel encodes its own coordinates.
    fn pattern(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 0xAA, 0xFF]);
            }
        }
        data
    }

    fn px(data: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let o = ((y * width + x) * 4) as usize;
        [data[o], data[o + 1], data[o + 2], data[o + 3]]
    }

    fn overlay(x: i32, y: i32, w: u32, h: u32, fill: u8) -> OverlayBuffer {
        let data = vec![fill; (w * h * 4) as usize];
        let frame = FrameDescriptor::new(
            FrameKind::Overlay,
            Rect::full(w, h),
            Some(&data),
            w,
            h,
            SurfaceHandle::next(),
        );
        OverlayBuffer::from_frame(&frame, x, y).unwrap()
    }

    #[test]
    fn full_copy_requires_equal_sizes() {
        let mut target = vec![0u8; 8];
        copy_full(&[1u8; 8], &mut target).unwrap();
        assert_eq!(target, vec![1u8; 8]);
        assert!(copy_full(&[1u8; 4], &mut target).is_err());
    }

    #[test]
    fn row_wise_touches_only_the_rect() {
        let source = pattern(8, 6);
        let mut target = vec![0u8; source.len()];
        let rect = PixelRect {
            x: 2,
            y: 1,
            width: 3,
            height: 2,
        };

        copy_dirty_rect(&source, &mut target, 8, rect, DirtyCopyMode::RowWise).unwrap();

        for y in 0..6 {
            for x in 0..8 {
                let inside = (2..5).contains(&x) && (1..3).contains(&y);
                let expected = if inside { px(&source, 8, x, y) } else { [0; 4] };
                assert_eq!(px(&target, 8, x, y), expected, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn contiguous_copies_interior_row_gaps() {
        let source = pattern(8, 6);
        let mut target = vec![0u8; source.len()];
        let rect = PixelRect {
            x: 2,
            y: 1,
            width: 3,
            height: 2,
        };

        copy_dirty_rect(&source, &mut target, 8, rect, DirtyCopyMode::Contiguous).unwrap();

        // Span runs from (2,1) to (4,2), so the tail of row 1 and the head
        // of row 2 come along.
        assert_eq!(px(&target, 8, 7, 1), px(&source, 8, 7, 1));
        assert_eq!(px(&target, 8, 0, 2), px(&source, 8, 0, 2));
        assert_eq!(px(&target, 8, 1, 1), [0; 4]);
        assert_eq!(px(&target, 8, 5, 2), [0; 4]);
        assert_eq!(px(&target, 8, 2, 0), [0; 4]);
    }

    #[test]
    fn dirty_rect_past_buffer_is_an_error() {
        let source = vec![0u8; 16];
        let mut target = vec![0u8; 16];
        let rect = PixelRect {
            x: 0,
            y: 1,
            width: 2,
            height: 2,
        };
        assert!(copy_dirty_rect(&source, &mut target, 2, rect, DirtyCopyMode::RowWise).is_err());
    }

    #[test]
    fn overlay_replaces_exact_region() {
        let mut target = vec![0u8; 10 * 10 * 4];
        let written = composite_overlay(&mut target, 10, 10, &overlay(3, 4, 2, 3, 0xFF)).unwrap();

        assert_eq!(written, 3);
        for y in 0..10 {
            for x in 0..10 {
                let inside = (3..5).contains(&x) && (4..7).contains(&y);
                let expected = if inside { [0xFF; 4] } else { [0; 4] };
                assert_eq!(px(&target, 10, x, y), expected);
            }
        }
    }

    #[test]
    fn overlay_is_clipped_at_every_edge() {
        let mut target = vec![0u8; 4 * 4 * 4];
        let written = composite_overlay(&mut target, 4, 4, &overlay(-1, -1, 6, 6, 7)).unwrap();
        assert_eq!(written, 4);
        assert!(target.iter().all(|b| *b == 7));

        let mut target = vec![0u8; 4 * 4 * 4];
        let written = composite_overlay(&mut target, 4, 4, &overlay(3, 3, 5, 5, 7)).unwrap();
        assert_eq!(written, 1);
        assert_eq!(px(&target, 4, 3, 3), [7; 4]);
        assert_eq!(px(&target, 4, 2, 3), [0; 4]);
    }

    #[test]
    fn overlay_fully_outside_writes_nothing() {
        let mut target = vec![0u8; 4 * 4 * 4];
        assert_eq!(
            composite_overlay(&mut target, 4, 4, &overlay(10, 0, 2, 2, 1)).unwrap(),
            0
        );
        assert_eq!(
            composite_overlay(&mut target, 4, 4, &overlay(0, -5, 2, 2, 1)).unwrap(),
            0
        );
        assert!(target.iter().all(|b| *b == 0));
    }

    #[test]
    fn overlay_onto_short_staging_fails() {
        let mut target = vec![0u8; 8];
        assert!(composite_overlay(&mut target, 4, 4, &overlay(0, 0, 1, 1, 1)).is_err());
    }
}
