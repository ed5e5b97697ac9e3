//! Shared graphics context.
//!
//! Device creation is expensive, so one device is created lazily and handed
//! to every render handler in the process. The context is an explicit object
//! owned by the embedder rather than a static.

use std::sync::Arc;

use parking_lot::RwLock;

use super::device::GraphicsDevice;
use super::wgpu_device::WgpuDevice;
use crate::config::{CompositorConfig, DeviceConfig};
use crate::error::{CompositorError, CompositorResult};

type DeviceFactory<D> = Box<dyn Fn() -> CompositorResult<D> + Send + Sync>;

/// Lazily created device shared by all texture managers.
pub struct SharedGraphicsContext<D: GraphicsDevice> {
    device: RwLock<Option<Arc<D>>>,
    factory: DeviceFactory<D>,
}

impl<D: GraphicsDevice> SharedGraphicsContext<D> {
    /// Context that builds its device with `factory` on first access.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> CompositorResult<D> + Send + Sync + 'static,
    {
        Self {
            device: RwLock::new(None),
            factory: Box::new(factory),
        }
    }

    /// Context around an already created device.
    pub fn with_device(device: D) -> Self {
        Self {
            device: RwLock::new(Some(Arc::new(device))),
            factory: Box::new(|| {
                Err(CompositorError::DeviceCreation(
                    "context was built from a fixed device".into(),
                ))
            }),
        }
    }

    /// Get or create the shared device.
    ///
    /// A failed creation is not cached; the next call tries again.
    pub fn get(&self) -> CompositorResult<Arc<D>> {
        // Fast path: check if already initialized
        if let Some(device) = self.device.read().as_ref() {
            return Ok(Arc::clone(device));
        }

        let mut slot = self.device.write();

        // Double-check after acquiring write lock
        if let Some(device) = slot.as_ref() {
            return Ok(Arc::clone(device));
        }

        log::info!("[SharedGraphicsContext] Initializing shared GPU device...");
        let device = (self.factory)().map_err(|e| match e {
            CompositorError::DeviceCreation(_) => e,
            other => CompositorError::DeviceCreation(other.to_string()),
        })?;

        let device = Arc::new(device);
        *slot = Some(Arc::clone(&device));

        log::info!(
            "[SharedGraphicsContext] Shared GPU device initialized: {}",
            device.name()
        );
        Ok(device)
    }

    pub fn is_initialized(&self) -> bool {
        self.device.read().is_some()
    }
}

impl SharedGraphicsContext<WgpuDevice> {
    /// Context that creates a wgpu device from `config` on first use.
    pub fn wgpu(config: DeviceConfig) -> Self {
        Self::new(move || WgpuDevice::new_blocking(&config))
    }

    /// Context built from the `device` section of a compositor config.
    pub fn wgpu_from(config: &CompositorConfig) -> Self {
        Self::wgpu(config.device.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::software::SoftwareDevice;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn device_is_created_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let context = SharedGraphicsContext::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(SoftwareDevice::new())
        });

        assert!(!context.is_initialized());
        let a = context.get().unwrap();
        let b = context.get().unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(context.is_initialized());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_creation_is_fatal_and_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let context = SharedGraphicsContext::<SoftwareDevice>::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(CompositorError::Other("driver missing".into()))
        });

        let err = context.get().err().unwrap();
        assert!(matches!(err, CompositorError::DeviceCreation(_)));
        assert!(context.get().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!context.is_initialized());
    }

    #[test]
    fn fixed_device_is_returned() {
        let context = SharedGraphicsContext::with_device(SoftwareDevice::new());
        assert!(context.is_initialized());
        assert_eq!(context.get().unwrap().name(), "software");
    }

    #[test]
    fn shared_across_threads() {
        let context = Arc::new(SharedGraphicsContext::new(|| Ok(SoftwareDevice::new())));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let context = Arc::clone(&context);
                std::thread::spawn(move || context.get().unwrap())
            })
            .collect();
        let devices: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(devices.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn wgpu_context_from_config_is_lazy() {
        let mut config = CompositorConfig::default();
        config.device.label = "handler device".to_string();
        let context = SharedGraphicsContext::wgpu_from(&config);
        assert!(!context.is_initialized());
    }
}
