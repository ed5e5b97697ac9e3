//! Compositor configuration.
//!
//! One typed struct per handler. Values come from defaults, an optional JSON
//! file, then `OSR_COMPOSITOR_*` environment overrides, and are clamped by
//! `validate()` before use.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::env;
use crate::error::{CompositorError, CompositorResult};

const ENV_DIRTY_COPY: &str = "OSR_COMPOSITOR_DIRTY_COPY";
const ENV_LOG_FRAME_RATE: &str = "OSR_COMPOSITOR_LOG_FRAME_RATE";
const ENV_SLOW_FRAME_MS: &str = "OSR_COMPOSITOR_SLOW_FRAME_MS";
const ENV_POWER: &str = "OSR_COMPOSITOR_POWER";
const ENV_BACKENDS: &str = "OSR_COMPOSITOR_BACKENDS";

/// How the dirty rectangle of a base frame is transferred into staging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DirtyCopyMode {
    /// `h` copies of exactly `w * 4` bytes.
    #[default]
    RowWise,
    /// One run from the first dirty pixel to the last, including the
    /// full-stride gap on interior rows.
    Contiguous,
}

impl DirtyCopyMode {
    fn parse(raw: &str) -> Option<Self> {
        match env::normalize(raw)?.as_str() {
            "rowwise" | "row-wise" | "rows" => Some(Self::RowWise),
            "contiguous" | "span" => Some(Self::Contiguous),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerPreference {
    #[default]
    HighPerformance,
    LowPower,
}

/// Which wgpu backends the shared device may be created on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendSelection {
    #[default]
    All,
    Primary,
    Vulkan,
    Dx12,
    Metal,
    Gl,
}

impl BackendSelection {
    fn parse(raw: &str) -> Option<Self> {
        match env::normalize(raw)?.as_str() {
            "all" => Some(Self::All),
            "primary" => Some(Self::Primary),
            "vulkan" => Some(Self::Vulkan),
            "dx12" | "d3d12" => Some(Self::Dx12),
            "metal" => Some(Self::Metal),
            "gl" | "opengl" => Some(Self::Gl),
            _ => None,
        }
    }

    pub fn to_wgpu(self) -> wgpu::Backends {
        match self {
            Self::All => wgpu::Backends::all(),
            Self::Primary => wgpu::Backends::PRIMARY,
            Self::Vulkan => wgpu::Backends::VULKAN,
            Self::Dx12 => wgpu::Backends::DX12,
            Self::Metal => wgpu::Backends::METAL,
            Self::Gl => wgpu::Backends::GL,
        }
    }
}

/// GPU device settings used when the shared context is first created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceConfig {
    /// Debug label attached to the device.
    pub label: String,
    pub power_preference: PowerPreference,
    pub backends: BackendSelection,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            label: "OSR Compositor".to_string(),
            power_preference: PowerPreference::default(),
            backends: BackendSelection::default(),
        }
    }
}

/// Settings for one render handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompositorConfig {
    /// Dirty-rect transfer strategy for steady-state base frames.
    pub dirty_copy_mode: DirtyCopyMode,

    /// Log the measured frame rate each time the wall-clock second rolls over.
    pub log_frame_rate: bool,

    /// Deliveries slower than this (milliseconds) are logged as warnings (1-1000).
    pub slow_frame_warn_ms: u64,

    pub device: DeviceConfig,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            dirty_copy_mode: DirtyCopyMode::default(),
            log_frame_rate: false,
            slow_frame_warn_ms: 10,
            device: DeviceConfig::default(),
        }
    }
}

impl CompositorConfig {
    /// Validate and clamp settings to acceptable ranges.
    pub fn validate(&mut self) {
        self.slow_frame_warn_ms = self.slow_frame_warn_ms.clamp(1, 1000);
        if self.device.label.trim().is_empty() {
            self.device.label = DeviceConfig::default().label;
        }
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> CompositorResult<Self> {
        let mut config: Self = serde_json::from_str(json)?;
        config.validate();
        Ok(config)
    }

    /// Load from a JSON file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> CompositorResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let mut config = Self::from_json_str(&raw).map_err(|e| {
            CompositorError::Config(format!("{}: {}", path.display(), e))
        })?;
        config.apply_env_overrides();
        log::info!("[Config] Loaded compositor config from {}", path.display());
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(env::process_env);
    }

    /// Apply `OSR_COMPOSITOR_*` overrides read through `lookup`.
    /// Unparseable values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_DIRTY_COPY) {
            match DirtyCopyMode::parse(&raw) {
                Some(mode) => self.dirty_copy_mode = mode,
                None => log::warn!("[Config] Ignoring {}={:?}", ENV_DIRTY_COPY, raw),
            }
        }

        if let Some(raw) = lookup(ENV_LOG_FRAME_RATE) {
            match env::parse_bool(&raw) {
                Some(enabled) => self.log_frame_rate = enabled,
                None => log::warn!("[Config] Ignoring {}={:?}", ENV_LOG_FRAME_RATE, raw),
            }
        }

        if let Some(raw) = lookup(ENV_SLOW_FRAME_MS) {
            match env::parse_positive_u64(&raw) {
                Some(ms) => self.slow_frame_warn_ms = ms,
                None => log::warn!("[Config] Ignoring {}={:?}", ENV_SLOW_FRAME_MS, raw),
            }
        }

        if let Some(raw) = lookup(ENV_POWER) {
            match env::normalize(&raw).as_deref() {
                Some("high") | Some("high-performance") => {
                    self.device.power_preference = PowerPreference::HighPerformance
                },
                Some("low") | Some("low-power") => {
                    self.device.power_preference = PowerPreference::LowPower
                },
                _ => log::warn!("[Config] Ignoring {}={:?}", ENV_POWER, raw),
            }
        }

        if let Some(raw) = lookup(ENV_BACKENDS) {
            match BackendSelection::parse(&raw) {
                Some(backends) => self.device.backends = backends,
                None => log::warn!("[Config] Ignoring {}={:?}", ENV_BACKENDS, raw),
            }
        }

        self.validate();
    }
}
