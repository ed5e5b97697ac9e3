//! wgpu-backed graphics device.
//!
//! Staging is a host shadow buffer plus a `COPY_SRC` texture: locking hands
//! out the shadow, unlocking uploads it with `Queue::write_texture`.
//! Presentation textures are render targets that surfaces sample from.

use std::sync::Arc;

use parking_lot::Mutex;

use super::device::{DeviceLostCallback, GraphicsDevice};
use super::types::BYTES_PER_PIXEL;
use crate::config::{DeviceConfig, PowerPreference};
use crate::error::{CompositorError, CompositorResult};

/// Paint buffers are BGRA; keep the textures in the same layout so uploads
/// are straight byte copies.
pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8Unorm;

/// Host-writable staging texture.
pub struct WgpuStaging {
    texture: wgpu::Texture,
    shadow: Vec<u8>,
    width: u32,
    height: u32,
    locked: bool,
}

impl WgpuStaging {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Render-target texture bound to display surfaces.
pub struct WgpuPresentation {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl WgpuPresentation {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// Default view for sampling in the surface's own render pass.
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// GPU device managing wgpu resources.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    lost_listeners: Arc<Mutex<Vec<DeviceLostCallback>>>,
}

impl WgpuDevice {
    /// Create a device with GPU initialization.
    pub async fn new(config: &DeviceConfig) -> CompositorResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: config.backends.to_wgpu(),
            ..Default::default()
        });

        let power_preference = match config.power_preference {
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
        };

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| CompositorError::DeviceCreation(format!("no GPU adapter: {}", e)))?;

        let adapter_name = adapter.get_info().name;
        log::info!("[WgpuDevice] Using GPU adapter: {:?}", adapter_name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some(config.label.as_str()),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                ..Default::default()
            })
            .await
            .map_err(|e| CompositorError::DeviceCreation(format!("request_device: {}", e)))?;

        let lost_listeners: Arc<Mutex<Vec<DeviceLostCallback>>> = Arc::new(Mutex::new(Vec::new()));
        let listeners = Arc::clone(&lost_listeners);
        device.set_device_lost_callback(move |reason, message| {
            let reason = format!("{:?}: {}", reason, message);
            log::error!("[WgpuDevice] Device lost: {}", reason);
            for listener in listeners.lock().iter() {
                listener(&reason);
            }
        });

        Ok(Self {
            device,
            queue,
            adapter_name,
            lost_listeners,
        })
    }

    /// Blocking constructor for callers outside an async runtime.
    pub fn new_blocking(config: &DeviceConfig) -> CompositorResult<Self> {
        pollster::block_on(Self::new(config))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn create_texture(
        &self,
        label: &str,
        width: u32,
        height: u32,
        usage: wgpu::TextureUsages,
    ) -> CompositorResult<wgpu::Texture> {
        if width == 0 || height == 0 {
            return Err(CompositorError::Texture(format!(
                "cannot allocate {}x{} texture",
                width, height
            )));
        }

        let max = self.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(CompositorError::Texture(format!(
                "{}x{} exceeds the device limit of {}",
                width, height, max
            )));
        }

        Ok(self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(width, height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage,
            view_formats: &[],
        }))
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

fn whole_texture(texture: &wgpu::Texture) -> wgpu::TexelCopyTextureInfo<'_> {
    wgpu::TexelCopyTextureInfo {
        texture,
        mip_level: 0,
        origin: wgpu::Origin3d::ZERO,
        aspect: wgpu::TextureAspect::All,
    }
}

impl GraphicsDevice for WgpuDevice {
    type Staging = WgpuStaging;
    type Presentation = WgpuPresentation;

    fn name(&self) -> String {
        format!("wgpu ({})", self.adapter_name)
    }

    fn create_staging_texture(&self, width: u32, height: u32) -> CompositorResult<WgpuStaging> {
        let texture = self.create_texture(
            "Staging Texture",
            width,
            height,
            wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
        )?;

        Ok(WgpuStaging {
            texture,
            shadow: vec![0u8; width as usize * height as usize * BYTES_PER_PIXEL],
            width,
            height,
            locked: false,
        })
    }

    fn create_presentation_texture(
        &self,
        width: u32,
        height: u32,
    ) -> CompositorResult<WgpuPresentation> {
        let texture = self.create_texture(
            "Presentation Texture",
            width,
            height,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
        )?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(WgpuPresentation { texture, view })
    }

    fn lock_staging(&self, staging: &mut WgpuStaging) -> CompositorResult<()> {
        if staging.locked {
            return Err(CompositorError::Lock("staging texture is already locked".into()));
        }
        staging.locked = true;
        Ok(())
    }

    fn staging_pixels<'t>(&self, staging: &'t mut WgpuStaging) -> CompositorResult<&'t mut [u8]> {
        if !staging.locked {
            return Err(CompositorError::Lock("staging texture is not locked".into()));
        }
        Ok(&mut staging.shadow)
    }

    fn unlock_staging(&self, staging: &mut WgpuStaging) -> CompositorResult<()> {
        if !staging.locked {
            return Err(CompositorError::Lock("staging texture is not locked".into()));
        }
        staging.locked = false;

        // write_texture has no row alignment requirement, unlike buffer copies.
        self.queue.write_texture(
            whole_texture(&staging.texture),
            &staging.shadow,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(BYTES_PER_PIXEL as u32 * staging.width),
                rows_per_image: Some(staging.height),
            },
            extent(staging.width, staging.height),
        );
        Ok(())
    }

    fn copy_texture(
        &self,
        source: &WgpuStaging,
        destination: &WgpuPresentation,
    ) -> CompositorResult<()> {
        if source.locked {
            return Err(CompositorError::Lock("cannot copy from a locked texture".into()));
        }
        let dest_size = destination.texture.size();
        if (dest_size.width, dest_size.height) != source.size() {
            return Err(CompositorError::Texture(format!(
                "copy size mismatch: {:?} -> {}x{}",
                source.size(),
                dest_size.width,
                dest_size.height
            )));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Staging Copy Encoder"),
            });
        encoder.copy_texture_to_texture(
            whole_texture(&source.texture),
            whole_texture(&destination.texture),
            extent(source.width, source.height),
        );
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn add_device_lost_listener(&self, callback: DeviceLostCallback) {
        self.lost_listeners.lock().push(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::device::StagingWriteGuard;

    fn try_device() -> Option<WgpuDevice> {
        match WgpuDevice::new_blocking(&DeviceConfig::default()) {
            Ok(device) => Some(device),
            Err(e) => {
                eprintln!("skipping wgpu test: {}", e);
                None
            },
        }
    }

    #[test]
    fn staging_to_presentation_round() {
        let Some(device) = try_device() else {
            return;
        };

        let mut staging = device.create_staging_texture(4, 4).unwrap();
        let presentation = device.create_presentation_texture(4, 4).unwrap();
        {
            let mut guard = StagingWriteGuard::lock(&device, &mut staging).unwrap();
            guard.pixels().unwrap().fill(0x80);
            guard.unlock().unwrap();
        }
        device.copy_texture(&staging, &presentation).unwrap();
        assert_eq!(presentation.texture().size().width, 4);
    }

    #[test]
    fn zero_sized_texture_is_rejected() {
        let Some(device) = try_device() else {
            return;
        };
        assert!(device.create_presentation_texture(0, 4).is_err());
    }
}
