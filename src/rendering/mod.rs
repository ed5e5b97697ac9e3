//! Off-screen frame compositing.
//!
//! Paint buffers are written into a CPU-writable staging texture and copied
//! into a GPU presentation texture that display surfaces sample from.
//!
//! ## Components
//! - `types`: Frame descriptors, rects and surface handles
//! - `device`: The graphics backend seam and the staging write guard
//! - `software`: In-memory backend for headless use
//! - `wgpu_device`: wgpu backend
//! - `renderer_state`: Lazily created device shared by all handlers
//! - `textures`: Staging/presentation pair lifecycle
//! - `overlay`: Popup snapshot
//! - `frame_ops`: Dirty-rect and overlay byte copies
//! - `frame_rate`: Per-second frame counter
//! - `compositor`: Per-frame path selection

pub mod compositor;
pub mod device;
pub mod frame_ops;
pub mod frame_rate;
pub mod overlay;
pub mod renderer_state;
pub mod software;
pub mod textures;
pub mod types;
pub mod wgpu_device;

pub use compositor::{CompositeOutcome, CompositePath, DropReason, FrameCompositor};
pub use device::{DeviceLostCallback, GraphicsDevice, StagingWriteGuard};
pub use frame_rate::FrameRateMonitor;
pub use overlay::{OverlayBuffer, OverlayState};
pub use renderer_state::SharedGraphicsContext;
pub use software::{SoftwareDevice, SoftwarePresentation, SoftwareStaging};
pub use textures::{RetiredTextures, TextureLifecycleManager, TexturePair};
pub use types::*;
pub use wgpu_device::{WgpuDevice, WgpuPresentation, WgpuStaging};
