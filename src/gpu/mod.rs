//! Hardware backend boundary.
//!
//! The dispatcher drives devices only through [`KernelBackend`]: compiled
//! entry lookup, buffer and surface handles, binding and dispatch. Two
//! implementations ship with the crate: [`host::HostBackend`], a device
//! simulated in host memory, and [`device::WgpuBackend`], which runs WGSL
//! kernels through wgpu (Metal, Vulkan, DX12).

pub mod device;
pub mod host;

use thiserror::Error;

use crate::runtime::{Float4, TextureFormat, Uint3};

pub use device::WgpuBackend;
pub use host::HostBackend;

/// Device-side buffer owned by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u64);

/// Device-side 2D surface owned by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceHandle(pub u64);

/// A failed backend call. Never retried by the dispatcher.
#[derive(Clone, Debug, Error)]
#[error("{backend} backend: {operation} failed: {message}")]
pub struct BackendError {
    pub backend: &'static str,
    pub operation: &'static str,
    pub message: String,
}

impl BackendError {
    pub fn new(backend: &'static str, operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            backend,
            operation,
            message: message.into(),
        }
    }
}

/// Operations the dispatcher needs from a compute device.
///
/// Entry points are addressed by ordinal (their position in the compiled
/// kernel), resources by the slot name the kernel declares.
pub trait KernelBackend: Send {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &'static str;

    /// Ordinal of the compiled entry point called `name`.
    fn find_entry_index(&self, name: &str) -> Option<usize>;

    /// Allocate room for `count` elements of `stride` bytes.
    fn create_buffer(&mut self, count: usize, stride: usize) -> Result<BufferHandle, BackendError>;
    /// Replace the buffer contents; `bytes` covers the whole buffer.
    fn upload(&mut self, buffer: BufferHandle, bytes: &[u8]) -> Result<(), BackendError>;
    /// Copy the whole buffer into `out`. Blocks until the device is done.
    fn download(&mut self, buffer: BufferHandle, out: &mut [u8]) -> Result<(), BackendError>;
    fn release_buffer(&mut self, buffer: BufferHandle);

    fn create_surface(
        &mut self,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<SurfaceHandle, BackendError>;
    /// Copy a full host image (row-major) onto the surface.
    fn blit(&mut self, surface: SurfaceHandle, pixels: &[Float4]) -> Result<(), BackendError>;
    /// Copy the full surface (row-major) into `out`. Blocks until the device is done.
    fn read_back(&mut self, surface: SurfaceHandle, out: &mut [Float4]) -> Result<(), BackendError>;
    fn release_surface(&mut self, surface: SurfaceHandle);

    fn bind_buffer(&mut self, entry: usize, slot: &str, buffer: BufferHandle) -> Result<(), BackendError>;
    fn bind_texture(&mut self, entry: usize, slot: &str, surface: SurfaceHandle) -> Result<(), BackendError>;

    /// Queue one dispatch of `groups` thread groups. Does not wait.
    fn dispatch(&mut self, entry: usize, groups: Uint3) -> Result<(), BackendError>;
}

/// Try to create a wgpu device and queue.
/// Returns None if no GPU adapter is available.
pub fn try_create_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))?;
    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("rspu-gpu"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
        },
        None,
    ))
    .ok()?;
    Some((device, queue))
}
