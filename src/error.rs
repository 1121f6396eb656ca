//! Error types for windflow.
//!
//! Only conditions the caller has to act on are errors. A missing velocity
//! field, a zero particle count or a texel without data are normal states of
//! the pipeline and never surface here.

use thiserror::Error;

/// Fatal GPU conditions. The pipeline cannot proceed after any of these.
#[derive(Debug, Error)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    #[error("Failed to create GPU surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    #[error("No compatible GPU adapter found. Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support.")]
    NoAdapter,
    /// Failed to create GPU device.
    #[error("Failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),
    /// The device rejected a resource, shader or pipeline descriptor.
    #[error("GPU validation failed for {label}: {message}")]
    Validation { label: &'static str, message: String },
    /// A configuration needs more than the device allows.
    #[error("{resource} needs {requested}, device limit is {limit}")]
    ResourceLimit {
        resource: &'static str,
        requested: u64,
        limit: u64,
    },
    /// The device ran out of memory while allocating pipeline resources.
    #[error("Out of GPU memory while allocating {0}")]
    OutOfMemory(&'static str),
}

/// Errors building a velocity field.
#[derive(Debug, Error)]
pub enum FieldError {
    /// Failed to open or decode the image. Missing files land here too.
    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),
    /// Texel data does not cover `width * height` texels.
    #[error("Field data size mismatch: expected {expected} values, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    /// Width or height is zero.
    #[error("Field dimensions must be non-zero, got {width}x{height}")]
    EmptyGrid { width: u32, height: u32 },
    /// Bounds have a non-positive or non-finite span.
    #[error("Invalid field bounds {0:?}")]
    InvalidBounds([f32; 4]),
    /// Interpolation needs at least one sample.
    #[error("Interpolation requires at least one sample")]
    NoSamples,
}

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid JSON for the expected schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    /// The configured field source could not be built.
    #[error("Failed to build velocity field: {0}")]
    Field(#[from] FieldError),
}

/// Errors that can occur when running the demo window.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Failed to create event loop.
    #[error("Failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    /// Failed to create window.
    #[error("Failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    /// GPU initialization failed.
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
