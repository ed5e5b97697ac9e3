//! In-memory graphics device.
//!
//! Textures are plain byte vectors. Used headless (tests, demos, CI without
//! a GPU) and as the reference behaviour for the lock/copy protocol.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::device::{DeviceLostCallback, GraphicsDevice};
use super::types::BYTES_PER_PIXEL;
use crate::error::{CompositorError, CompositorResult};

/// Counts textures that are still alive, shared by every texture of a device.
#[derive(Debug, Default)]
struct LiveCounter(AtomicUsize);

impl LiveCounter {
    fn acquire(self: &Arc<Self>) -> Arc<Self> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Arc::clone(self)
    }

    fn release(&self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// CPU-side staging texture.
#[derive(Debug)]
pub struct SoftwareStaging {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    locked: bool,
    live: Arc<LiveCounter>,
}

impl SoftwareStaging {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl Drop for SoftwareStaging {
    fn drop(&mut self) {
        self.live.release();
    }
}

/// "GPU" presentation texture; readable from any thread for verification.
#[derive(Debug)]
pub struct SoftwarePresentation {
    width: u32,
    height: u32,
    pixels: Mutex<Vec<u8>>,
    live: Arc<LiveCounter>,
}

impl SoftwarePresentation {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.pixels.lock().clone()
    }

    /// BGRA bytes of one pixel, `None` outside the texture.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let pixels = self.pixels.lock();
        let bytes = pixels.get(offset..offset + BYTES_PER_PIXEL)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl Drop for SoftwarePresentation {
    fn drop(&mut self) {
        self.live.release();
    }
}

/// Device whose textures live in host memory.
pub struct SoftwareDevice {
    live: Arc<LiveCounter>,
    textures_created: AtomicUsize,
    copies: AtomicUsize,
    lost: AtomicBool,
    lost_listeners: Mutex<Vec<DeviceLostCallback>>,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self {
            live: Arc::new(LiveCounter::default()),
            textures_created: AtomicUsize::new(0),
            copies: AtomicUsize::new(0),
            lost: AtomicBool::new(false),
            lost_listeners: Mutex::new(Vec::new()),
        }
    }

    /// Textures (staging and presentation) not yet dropped.
    pub fn live_textures(&self) -> usize {
        self.live.0.load(Ordering::SeqCst)
    }

    pub fn textures_created(&self) -> usize {
        self.textures_created.load(Ordering::SeqCst)
    }

    /// Number of staging→presentation copies issued.
    pub fn copies(&self) -> usize {
        self.copies.load(Ordering::SeqCst)
    }

    /// Simulate a driver reset: notify listeners and fail texture work until
    /// [`SoftwareDevice::restore`] is called.
    pub fn simulate_device_lost(&self, reason: &str) {
        self.lost.store(true, Ordering::SeqCst);
        log::warn!("[SoftwareDevice] Device lost: {}", reason);
        for listener in self.lost_listeners.lock().iter() {
            listener(reason);
        }
    }

    pub fn restore(&self) {
        self.lost.store(false, Ordering::SeqCst);
    }

    fn check_alive(&self) -> CompositorResult<()> {
        if self.lost.load(Ordering::SeqCst) {
            return Err(CompositorError::DeviceLost("software device reset".into()));
        }
        Ok(())
    }

    fn allocate(&self, width: u32, height: u32) -> CompositorResult<Vec<u8>> {
        self.check_alive()?;
        if width == 0 || height == 0 {
            return Err(CompositorError::Texture(format!(
                "cannot allocate {}x{} texture",
                width, height
            )));
        }
        self.textures_created.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0u8; width as usize * height as usize * BYTES_PER_PIXEL])
    }
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for SoftwareDevice {
    type Staging = SoftwareStaging;
    type Presentation = SoftwarePresentation;

    fn name(&self) -> String {
        "software".to_string()
    }

    fn create_staging_texture(&self, width: u32, height: u32) -> CompositorResult<SoftwareStaging> {
        let pixels = self.allocate(width, height)?;
        Ok(SoftwareStaging {
            width,
            height,
            pixels,
            locked: false,
            live: self.live.acquire(),
        })
    }

    fn create_presentation_texture(
        &self,
        width: u32,
        height: u32,
    ) -> CompositorResult<SoftwarePresentation> {
        let pixels = self.allocate(width, height)?;
        Ok(SoftwarePresentation {
            width,
            height,
            pixels: Mutex::new(pixels),
            live: self.live.acquire(),
        })
    }

    fn lock_staging(&self, staging: &mut SoftwareStaging) -> CompositorResult<()> {
        self.check_alive()?;
        if staging.locked {
            return Err(CompositorError::Lock("staging texture is already locked".into()));
        }
        staging.locked = true;
        Ok(())
    }

    fn staging_pixels<'t>(&self, staging: &'t mut SoftwareStaging) -> CompositorResult<&'t mut [u8]> {
        if !staging.locked {
            return Err(CompositorError::Lock("staging texture is not locked".into()));
        }
        Ok(&mut staging.pixels)
    }

    fn unlock_staging(&self, staging: &mut SoftwareStaging) -> CompositorResult<()> {
        if !staging.locked {
            return Err(CompositorError::Lock("staging texture is not locked".into()));
        }
        staging.locked = false;
        Ok(())
    }

    fn copy_texture(
        &self,
        source: &SoftwareStaging,
        destination: &SoftwarePresentation,
    ) -> CompositorResult<()> {
        self.check_alive()?;
        if source.locked {
            return Err(CompositorError::Lock("cannot copy from a locked texture".into()));
        }
        if source.size() != destination.size() {
            return Err(CompositorError::Texture(format!(
                "copy size mismatch: {:?} -> {:?}",
                source.size(),
                destination.size()
            )));
        }
        destination.pixels.lock().copy_from_slice(&source.pixels);
        self.copies.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn add_device_lost_listener(&self, callback: DeviceLostCallback) {
        self.lost_listeners.lock().push(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn textures_are_zeroed_and_counted() {
        let device = SoftwareDevice::new();
        let staging = device.create_staging_texture(3, 2).unwrap();
        let presentation = device.create_presentation_texture(3, 2).unwrap();

        assert_eq!(staging.pixels().len(), 24);
        assert!(staging.pixels().iter().all(|b| *b == 0));
        assert_eq!(presentation.pixel(2, 1), Some([0, 0, 0, 0]));
        assert_eq!(presentation.pixel(3, 0), None);
        assert_eq!(device.live_textures(), 2);

        drop(staging);
        drop(presentation);
        assert_eq!(device.live_textures(), 0);
        assert_eq!(device.textures_created(), 2);
    }

    #[test]
    fn zero_sized_texture_is_rejected() {
        let device = SoftwareDevice::new();
        assert!(device.create_staging_texture(0, 10).is_err());
    }

    #[test]
    fn copy_moves_staging_bytes() {
        let device = SoftwareDevice::new();
        let mut staging = device.create_staging_texture(1, 1).unwrap();
        let presentation = device.create_presentation_texture(1, 1).unwrap();

        device.lock_staging(&mut staging).unwrap();
        device
            .staging_pixels(&mut staging)
            .unwrap()
            .copy_from_slice(&[1, 2, 3, 4]);
        device.unlock_staging(&mut staging).unwrap();
        device.copy_texture(&staging, &presentation).unwrap();

        assert_eq!(presentation.pixel(0, 0), Some([1, 2, 3, 4]));
        assert_eq!(device.copies(), 1);
    }

    #[test]
    fn copy_from_locked_staging_fails() {
        let device = SoftwareDevice::new();
        let mut staging = device.create_staging_texture(1, 1).unwrap();
        let presentation = device.create_presentation_texture(1, 1).unwrap();
        device.lock_staging(&mut staging).unwrap();
        assert!(device.copy_texture(&staging, &presentation).is_err());
    }

    #[test]
    fn copy_size_mismatch_fails() {
        let device = SoftwareDevice::new();
        let staging = device.create_staging_texture(2, 1).unwrap();
        let presentation = device.create_presentation_texture(1, 2).unwrap();
        assert!(device.copy_texture(&staging, &presentation).is_err());
    }

    #[test]
    fn pixels_require_lock() {
        let device = SoftwareDevice::new();
        let mut staging = device.create_staging_texture(1, 1).unwrap();
        assert!(device.staging_pixels(&mut staging).is_err());
        assert!(device.unlock_staging(&mut staging).is_err());
    }

    #[test]
    fn device_lost_notifies_and_blocks_work() {
        let device = SoftwareDevice::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        device.add_device_lost_listener(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        device.simulate_device_lost("test");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(matches!(
            device.create_staging_texture(1, 1),
            Err(CompositorError::DeviceLost(_))
        ));

        device.restore();
        assert!(device.create_staging_texture(1, 1).is_ok());
    }
}
