use std::fmt;
use std::time::Duration;

use serde::Serialize;
use wgpu::naga::ShaderStage;

/// Programmable stage a piece of GLSL is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl StageKind {
    pub(crate) fn naga_stage(self) -> ShaderStage {
        match self {
            StageKind::Vertex => ShaderStage::Vertex,
            StageKind::Fragment => ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Vertex => f.write_str("vertex"),
            StageKind::Fragment => f.write_str("fragment"),
        }
    }
}

/// Adapter selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    /// Prefer integrated or low-power adapters.
    #[default]
    Low,
    /// Prefer discrete or high-performance adapters.
    High,
}

/// Knobs that influence how the GPU context is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpuOptions {
    pub power: GpuPowerPreference,
    /// Ask wgpu for a software fallback adapter (useful on CI machines).
    pub force_fallback_adapter: bool,
}

/// Lightweight description of the adapter wgpu picked for us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
    pub max_texture_dimension: u32,
}

impl AdapterProfile {
    pub(crate) fn from_wgpu(info: &wgpu::AdapterInfo, limits: &wgpu::Limits) -> Self {
        Self {
            name: info.name.clone(),
            backend: info.backend,
            device_type: info.device_type,
            max_texture_dimension: limits.max_texture_dimension_2d,
        }
    }

    /// Software rasterisers (llvmpipe, WARP, SwiftShader) report themselves as CPU devices.
    pub fn is_software(&self) -> bool {
        matches!(self.device_type, wgpu::DeviceType::Cpu)
            || self.name.to_ascii_lowercase().contains("llvmpipe")
    }
}

/// Start-up configuration for the interactive window host.
///
/// The CLI assembles this from the config file and command line flags; the
/// host never reads either directly.
#[derive(Debug, Clone, PartialEq)]
pub struct HostOptions {
    /// Initial window size in physical pixels.
    pub window_size: (u32, u32),
    pub title: String,
    /// Logical pixels per rendered pixel; values above 1 render fewer pixels.
    pub scale_factor: f32,
    /// Overrides the device pixel ratio reported by the windowing system.
    pub device_pixel_ratio: Option<f64>,
    /// Optional frames-per-second cap; `None` renders on every redraw.
    pub target_fps: Option<f32>,
    /// Stop the frame loop after this much wall-clock time.
    pub run_for: Option<Duration>,
    pub gpu: GpuOptions,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            window_size: (1280, 720),
            title: "shaderdeck".to_string(),
            scale_factor: 1.0,
            device_pixel_ratio: None,
            target_fps: None,
            run_for: None,
            gpu: GpuOptions::default(),
        }
    }
}
