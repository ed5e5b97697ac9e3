//! Staging/presentation texture pair lifecycle.
//!
//! The pair is created on the first base frame and recreated whenever a base
//! frame arrives with a different size. Overlay frames never resize it. A
//! superseded pair is handed back to the caller as [`RetiredTextures`] so it
//! can be released only after the display surface has adopted the new one.

use std::sync::Arc;

use super::device::{GraphicsDevice, StagingWriteGuard};
use super::types::FrameDescriptor;
use crate::error::{CompositorError, CompositorResult};

/// Staging and presentation textures of identical size.
pub struct TexturePair<D: GraphicsDevice> {
    pub(crate) staging: D::Staging,
    presentation: Arc<D::Presentation>,
    width: u32,
    height: u32,
    /// Staging holds no frame content yet; the next composite must copy the
    /// whole frame instead of a dirty rect.
    needs_full_copy: bool,
}

impl<D: GraphicsDevice> TexturePair<D> {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn presentation(&self) -> &Arc<D::Presentation> {
        &self.presentation
    }

    pub fn needs_full_copy(&self) -> bool {
        self.needs_full_copy
    }

    pub(crate) fn mark_filled(&mut self) {
        self.needs_full_copy = false;
    }

    fn retire(self) -> RetiredTextures<D> {
        RetiredTextures {
            _staging: self.staging,
            presentation: self.presentation,
        }
    }
}

/// A superseded pair awaiting release. Dropping it releases the textures
/// (the presentation texture once no surface holds it any more).
pub struct RetiredTextures<D: GraphicsDevice> {
    _staging: D::Staging,
    presentation: Arc<D::Presentation>,
}

impl<D: GraphicsDevice> RetiredTextures<D> {
    pub fn presentation(&self) -> &Arc<D::Presentation> {
        &self.presentation
    }
}

/// What `ensure_textures` did.
pub enum TextureChange<D: GraphicsDevice> {
    /// Existing pair fits the frame.
    Unchanged,
    /// First pair allocated.
    Created,
    /// Pair recreated at a new size; the old one must be retired after adoption.
    Resized(RetiredTextures<D>),
}

/// Owns the texture pair of one output surface.
pub struct TextureLifecycleManager<D: GraphicsDevice> {
    device: Arc<D>,
    pair: Option<TexturePair<D>>,
}

impl<D: GraphicsDevice> TextureLifecycleManager<D> {
    pub fn new(device: Arc<D>) -> Self {
        Self { device, pair: None }
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    pub fn is_initialized(&self) -> bool {
        self.pair.is_some()
    }

    /// Size of the current pair (the last base frame size that allocated it).
    pub fn size(&self) -> Option<(u32, u32)> {
        self.pair.as_ref().map(TexturePair::size)
    }

    pub fn pair(&self) -> Option<&TexturePair<D>> {
        self.pair.as_ref()
    }

    pub fn pair_mut(&mut self) -> Option<&mut TexturePair<D>> {
        self.pair.as_mut()
    }

    /// Whether `frame` would trigger a resize of an existing pair.
    pub fn needs_resize(&self, frame: &FrameDescriptor<'_>) -> bool {
        match self.size() {
            Some(size) => !frame.is_overlay() && size != frame.size(),
            None => false,
        }
    }

    /// Make sure a pair fitting `frame` exists.
    ///
    /// The first pair is filled with the frame's pixels when it has any.
    /// A resized pair starts blank: the frame that caused the resize is
    /// not applied to it.
    pub fn ensure_textures(
        &mut self,
        frame: &FrameDescriptor<'_>,
    ) -> CompositorResult<TextureChange<D>> {
        if self.pair.is_none() {
            if frame.is_overlay() {
                return Err(CompositorError::InvalidFrame(
                    "overlay frames cannot size the texture pair".into(),
                ));
            }
            let pair = self.allocate(frame.width, frame.height, frame.pixels()?)?;
            self.pair = Some(pair);
            log::info!(
                "[TextureManager] Created {}x{} texture pair on {}",
                frame.width,
                frame.height,
                self.device.name()
            );
            return Ok(TextureChange::Created);
        }

        if !self.needs_resize(frame) {
            return Ok(TextureChange::Unchanged);
        }

        let pair = self.allocate(frame.width, frame.height, None)?;
        let old = self.pair.replace(pair).map(TexturePair::retire);
        log::info!(
            "[TextureManager] Resized texture pair to {}x{}",
            frame.width,
            frame.height
        );
        match old {
            Some(old) => Ok(TextureChange::Resized(old)),
            None => Ok(TextureChange::Created),
        }
    }

    /// Recreate the pair at its current size with blank content, e.g. after
    /// the device or the surface's context was lost.
    pub fn reinitialize(&mut self) -> CompositorResult<Option<RetiredTextures<D>>> {
        let Some((width, height)) = self.size() else {
            return Ok(None);
        };
        let pair = self.allocate(width, height, None)?;
        log::info!(
            "[TextureManager] Reinitialized {}x{} texture pair",
            width,
            height
        );
        Ok(self.pair.replace(pair).map(TexturePair::retire))
    }

    /// Give up the current pair (on close).
    pub fn release(&mut self) -> Option<RetiredTextures<D>> {
        self.pair.take().map(TexturePair::retire)
    }

    fn allocate(
        &self,
        width: u32,
        height: u32,
        initial: Option<&[u8]>,
    ) -> CompositorResult<TexturePair<D>> {
        let mut staging = self.device.create_staging_texture(width, height)?;

        if let Some(pixels) = initial {
            let mut guard = StagingWriteGuard::lock(self.device.as_ref(), &mut staging)?;
            let target = guard.pixels()?;
            if target.len() != pixels.len() {
                return Err(CompositorError::Texture(format!(
                    "staging holds {} bytes, frame has {}",
                    target.len(),
                    pixels.len()
                )));
            }
            target.copy_from_slice(pixels);
            guard.unlock()?;
        }

        let presentation = self.device.create_presentation_texture(width, height)?;

        Ok(TexturePair {
            staging,
            presentation: Arc::new(presentation),
            width,
            height,
            needs_full_copy: initial.is_none(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::software::SoftwareDevice;
    use crate::rendering::types::{FrameKind, Rect, SurfaceHandle};

    fn frame(kind: FrameKind, data: Option<&[u8]>, w: u32, h: u32) -> FrameDescriptor<'_> {
        FrameDescriptor::new(kind, Rect::full(w, h), data, w, h, SurfaceHandle::next())
    }

    #[test]
    fn first_frame_creates_filled_pair() {
        let device = Arc::new(SoftwareDevice::new());
        let mut manager = TextureLifecycleManager::new(Arc::clone(&device));
        let data = vec![5u8; 4 * 3 * 4];

        let change = manager
            .ensure_textures(&frame(FrameKind::Base, Some(&data), 4, 3))
            .unwrap();

        assert!(matches!(change, TextureChange::Created));
        assert_eq!(manager.size(), Some((4, 3)));
        let pair = manager.pair().unwrap();
        assert!(!pair.needs_full_copy());
        assert_eq!(pair.staging.pixels(), &data[..]);
        assert_eq!(device.live_textures(), 2);
    }

    #[test]
    fn first_frame_without_buffer_initializes_only() {
        let device = Arc::new(SoftwareDevice::new());
        let mut manager = TextureLifecycleManager::new(device);

        manager
            .ensure_textures(&frame(FrameKind::Base, None, 2, 2))
            .unwrap();

        let pair = manager.pair().unwrap();
        assert!(pair.needs_full_copy());
        assert!(pair.staging.pixels().iter().all(|b| *b == 0));
    }

    #[test]
    fn same_size_is_unchanged() {
        let device = Arc::new(SoftwareDevice::new());
        let mut manager = TextureLifecycleManager::new(Arc::clone(&device));
        manager
            .ensure_textures(&frame(FrameKind::Base, None, 2, 2))
            .unwrap();

        let change = manager
            .ensure_textures(&frame(FrameKind::Base, None, 2, 2))
            .unwrap();
        assert!(matches!(change, TextureChange::Unchanged));
        assert_eq!(device.textures_created(), 2);
    }

    #[test]
    fn resize_starts_blank_and_retires_old_pair() {
        let device = Arc::new(SoftwareDevice::new());
        let mut manager = TextureLifecycleManager::new(Arc::clone(&device));
        manager
            .ensure_textures(&frame(FrameKind::Base, None, 2, 2))
            .unwrap();

        let data = vec![9u8; 3 * 3 * 4];
        let change = manager
            .ensure_textures(&frame(FrameKind::Base, Some(&data), 3, 3))
            .unwrap();

        let TextureChange::Resized(retired) = change else {
            panic!("expected resize");
        };
        assert_eq!(retired.presentation().size(), (2, 2));
        assert_eq!(device.live_textures(), 4);

        let pair = manager.pair().unwrap();
        assert_eq!(pair.size(), (3, 3));
        assert!(pair.needs_full_copy());
        assert!(pair.staging.pixels().iter().all(|b| *b == 0));

        drop(retired);
        assert_eq!(device.live_textures(), 2);
    }

    #[test]
    fn overlay_never_resizes() {
        let device = Arc::new(SoftwareDevice::new());
        let mut manager = TextureLifecycleManager::new(device);
        manager
            .ensure_textures(&frame(FrameKind::Base, None, 8, 8))
            .unwrap();

        let overlay = frame(FrameKind::Overlay, None, 2, 2);
        assert!(!manager.needs_resize(&overlay));
        assert!(matches!(
            manager.ensure_textures(&overlay).unwrap(),
            TextureChange::Unchanged
        ));
        assert_eq!(manager.size(), Some((8, 8)));
    }

    #[test]
    fn overlay_cannot_create_first_pair() {
        let device = Arc::new(SoftwareDevice::new());
        let mut manager = TextureLifecycleManager::new(device);
        assert!(manager
            .ensure_textures(&frame(FrameKind::Overlay, None, 2, 2))
            .is_err());
        assert!(!manager.is_initialized());
    }

    #[test]
    fn reinitialize_keeps_size() {
        let device = Arc::new(SoftwareDevice::new());
        let mut manager = TextureLifecycleManager::new(device);
        assert!(manager.reinitialize().unwrap().is_none());

        manager
            .ensure_textures(&frame(FrameKind::Base, None, 5, 4))
            .unwrap();
        let retired = manager.reinitialize().unwrap();
        assert!(retired.is_some());
        assert_eq!(manager.size(), Some((5, 4)));
        assert!(manager.pair().unwrap().needs_full_copy());
    }

    #[test]
    fn release_empties_manager() {
        let device = Arc::new(SoftwareDevice::new());
        let mut manager = TextureLifecycleManager::new(Arc::clone(&device));
        manager
            .ensure_textures(&frame(FrameKind::Base, None, 1, 1))
            .unwrap();
        drop(manager.release());
        assert!(!manager.is_initialized());
        assert_eq!(device.live_textures(), 0);
    }
}
