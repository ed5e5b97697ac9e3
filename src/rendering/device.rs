//! GPU device seam.
//!
//! The compositor needs five things from a graphics backend: allocate a
//! CPU-writable staging texture, allocate a GPU render-target presentation
//! texture, lock/unlock staging for writing, copy staging into presentation,
//! and tell us when the device is lost. Everything else about the backend
//! stays behind this trait.

use crate::error::{CompositorError, CompositorResult};

/// Invoked (from any thread) with a human-readable reason when the device is lost.
pub type DeviceLostCallback = Box<dyn Fn(&str) + Send + Sync + 'static>;

pub trait GraphicsDevice: Send + Sync + 'static {
    /// CPU-writable, GPU-readable texture.
    type Staging: Send + 'static;
    /// GPU-resident texture handed to display surfaces.
    type Presentation: Send + Sync + 'static;

    /// Short description for logs.
    fn name(&self) -> String;

    fn create_staging_texture(&self, width: u32, height: u32) -> CompositorResult<Self::Staging>;

    fn create_presentation_texture(
        &self,
        width: u32,
        height: u32,
    ) -> CompositorResult<Self::Presentation>;

    /// Begin a write. Fails if the texture is already locked.
    fn lock_staging(&self, staging: &mut Self::Staging) -> CompositorResult<()>;

    /// Tightly packed BGRA bytes of a locked staging texture
    /// (`width * 4` bytes per row). Fails if the texture is not locked.
    fn staging_pixels<'t>(&self, staging: &'t mut Self::Staging) -> CompositorResult<&'t mut [u8]>;

    /// End a write; makes the written bytes visible to the GPU.
    fn unlock_staging(&self, staging: &mut Self::Staging) -> CompositorResult<()>;

    /// Device-level copy of the whole staging texture into `destination`.
    /// Both textures have identical dimensions.
    fn copy_texture(
        &self,
        source: &Self::Staging,
        destination: &Self::Presentation,
    ) -> CompositorResult<()>;

    /// Register a listener for device loss. Listeners are never removed.
    fn add_device_lost_listener(&self, callback: DeviceLostCallback);
}

/// Scoped write access to a staging texture.
///
/// Unlocks on drop; call [`StagingWriteGuard::unlock`] to observe the
/// unlock result instead of having it logged.
pub struct StagingWriteGuard<'a, D: GraphicsDevice> {
    device: &'a D,
    staging: &'a mut D::Staging,
    locked: bool,
}

impl<'a, D: GraphicsDevice> StagingWriteGuard<'a, D> {
    pub fn lock(device: &'a D, staging: &'a mut D::Staging) -> CompositorResult<Self> {
        device.lock_staging(staging)?;
        Ok(Self {
            device,
            staging,
            locked: true,
        })
    }

    pub fn pixels(&mut self) -> CompositorResult<&mut [u8]> {
        if !self.locked {
            return Err(CompositorError::Lock("staging texture already unlocked".into()));
        }
        self.device.staging_pixels(self.staging)
    }

    pub fn unlock(mut self) -> CompositorResult<()> {
        self.locked = false;
        self.device.unlock_staging(self.staging)
    }
}

impl<D: GraphicsDevice> Drop for StagingWriteGuard<'_, D> {
    fn drop(&mut self) {
        if self.locked {
            if let Err(e) = self.device.unlock_staging(self.staging) {
                log::error!("[StagingWriteGuard] Unlock on drop failed: {}", e);
            }
        }
    }
}
