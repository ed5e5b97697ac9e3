//! Compositor configuration.
//!
//! - `CompositorConfig`: copy strategy, diagnostics and GPU device settings.
//! - `env`: `OSR_COMPOSITOR_*` overrides applied on top of file/default values.
//!
//! Configs are plain values handed to each `RenderHandler` at construction;
//! there is no process-global config.

pub mod compositor;
mod env;

pub use compositor::{
    BackendSelection, CompositorConfig, DeviceConfig, DirtyCopyMode, PowerPreference,
};
