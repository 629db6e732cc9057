//! Read-write 2D textures with a two-way host/device cache.
//!
//! A texture has a host pixel array (written by emulated lanes and the
//! host), a committed host image that blits read from, and a lazily created
//! device surface. Two flags track which side is behind:
//!
//! - `gpu_dirty`: the host wrote pixels; the surface needs a blit before the
//!   device reads it.
//! - `cpu_dirty`: the device wrote the surface; the host needs a read-back
//!   before it reads pixels.
//!
//! Materializing a side clears that side's flag and nothing else. A host
//! write clears `cpu_dirty` as well, so at most one flag is ever set.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::types::{Float4, Uint2};
use crate::gpu::{BackendError, KernelBackend, SurfaceHandle};

/// Texel layout of the device surface. The host side always holds `Float4`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    #[default]
    Rgba32Float,
    Rgba8Unorm,
}

impl TextureFormat {
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            TextureFormat::Rgba32Float => 16,
            TextureFormat::Rgba8Unorm => 4,
        }
    }
}

impl fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureFormat::Rgba32Float => write!(f, "rgba32float"),
            TextureFormat::Rgba8Unorm => write!(f, "rgba8unorm"),
        }
    }
}

struct DeviceCache {
    surface: Option<SurfaceHandle>,
    image: Vec<Float4>,
}

struct TextureInner {
    width: u32,
    height: u32,
    format: TextureFormat,
    /// Four words (f32 bits) per texel, row-major.
    pixels: Box<[AtomicU32]>,
    cpu_dirty: AtomicBool,
    gpu_dirty: AtomicBool,
    cache: Mutex<DeviceCache>,
}

/// A shared read-write texture. Clones refer to the same texture.
///
/// Texel writes go through `&self` and may come from many emulated lanes at
/// once; like buffers, two lanes writing the same texel race benignly.
#[derive(Clone)]
pub struct RWTexture2D {
    inner: Arc<TextureInner>,
}

impl RWTexture2D {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_format(width, height, TextureFormat::default())
    }

    pub fn with_format(width: u32, height: u32, format: TextureFormat) -> Self {
        let texels = width as usize * height as usize;
        let pixels = (0..texels * 4).map(|_| AtomicU32::new(0)).collect();
        Self {
            inner: Arc::new(TextureInner {
                width,
                height,
                format,
                pixels,
                cpu_dirty: AtomicBool::new(false),
                gpu_dirty: AtomicBool::new(true),
                cache: Mutex::new(DeviceCache {
                    surface: None,
                    image: vec![Float4::ZERO; texels],
                }),
            }),
        }
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    pub fn format(&self) -> TextureFormat {
        self.inner.format
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn texel_words(&self, uv: Uint2) -> &[AtomicU32] {
        assert!(
            uv.x < self.inner.width && uv.y < self.inner.height,
            "texel ({}, {}) out of range for {}x{} texture",
            uv.x,
            uv.y,
            self.inner.width,
            self.inner.height
        );
        let base = (uv.y as usize * self.inner.width as usize + uv.x as usize) * 4;
        &self.inner.pixels[base..base + 4]
    }

    /// Host pixel value, without consulting the device.
    pub fn get(&self, uv: Uint2) -> Float4 {
        let w = self.texel_words(uv);
        Float4::new(
            f32::from_bits(w[0].load(Ordering::Relaxed)),
            f32::from_bits(w[1].load(Ordering::Relaxed)),
            f32::from_bits(w[2].load(Ordering::Relaxed)),
            f32::from_bits(w[3].load(Ordering::Relaxed)),
        )
    }

    /// Write a host pixel and mark the device surface stale.
    ///
    /// The host becomes the source of truth: device writes not yet read
    /// back are discarded. Use [`Self::write_pixel`] to keep them.
    pub fn set(&self, uv: Uint2, value: Float4) {
        let w = self.texel_words(uv);
        for (word, component) in w.iter().zip(value.to_array()) {
            word.store(component.to_bits(), Ordering::Relaxed);
        }
        if self.inner.cpu_dirty.load(Ordering::Relaxed) {
            self.inner.cpu_dirty.store(false, Ordering::Release);
        }
        if !self.inner.gpu_dirty.load(Ordering::Relaxed) {
            self.inner.gpu_dirty.store(true, Ordering::Release);
        }
    }

    /// Write a host pixel after reading the surface back if it is newer, so
    /// earlier device writes survive.
    pub fn write_pixel(
        &self,
        backend: &mut dyn KernelBackend,
        uv: Uint2,
        value: Float4,
    ) -> Result<(), BackendError> {
        self.materialize_to_host(backend)?;
        self.set(uv, value);
        Ok(())
    }

    /// Whether the surface is behind the host.
    pub fn is_device_stale(&self) -> bool {
        self.inner.gpu_dirty.load(Ordering::Acquire)
    }

    /// Whether the host is behind the surface.
    pub fn is_host_stale(&self) -> bool {
        self.inner.cpu_dirty.load(Ordering::Acquire)
    }

    /// The host side is now the source of truth.
    pub fn hint_host_changed(&self) {
        self.inner.cpu_dirty.store(false, Ordering::Release);
        self.inner.gpu_dirty.store(true, Ordering::Release);
    }

    /// The device side is now the source of truth.
    pub fn hint_device_changed(&self) {
        self.inner.gpu_dirty.store(false, Ordering::Release);
        self.inner.cpu_dirty.store(true, Ordering::Release);
    }

    fn snapshot(&self) -> Vec<Float4> {
        (0..self.inner.height)
            .flat_map(|y| (0..self.inner.width).map(move |x| Uint2::new(x, y)))
            .map(|uv| self.get(uv))
            .collect()
    }

    fn store_pixels(&self, image: &[Float4]) {
        for (texel, value) in self.inner.pixels.chunks_exact(4).zip(image) {
            for (word, component) in texel.iter().zip(value.to_array()) {
                word.store(component.to_bits(), Ordering::Relaxed);
            }
        }
    }

    /// Commit the host pixels to the host image. The surface becomes stale.
    pub fn apply_host_changes(&self) {
        let image = self.snapshot();
        self.inner.cache.lock().image = image;
        self.inner.gpu_dirty.store(true, Ordering::Release);
    }

    /// Committed host image, row-major.
    pub fn image(&self) -> Vec<Float4> {
        self.inner.cache.lock().image.clone()
    }

    /// Make the device surface current, creating it on first use, and
    /// return its handle. Blits at most once per host change.
    pub fn materialize_to_device(
        &self,
        backend: &mut dyn KernelBackend,
    ) -> Result<SurfaceHandle, BackendError> {
        let mut cache = self.inner.cache.lock();
        let surface = match cache.surface {
            Some(surface) => surface,
            None => {
                let surface =
                    backend.create_surface(self.inner.width, self.inner.height, self.inner.format)?;
                cache.surface = Some(surface);
                self.inner.gpu_dirty.store(true, Ordering::Release);
                surface
            }
        };
        if self.inner.gpu_dirty.load(Ordering::Acquire) {
            cache.image = self.snapshot();
            debug!(
                width = self.inner.width,
                height = self.inner.height,
                "blitting texture to device"
            );
            backend.blit(surface, &cache.image)?;
            self.inner.gpu_dirty.store(false, Ordering::Release);
        }
        Ok(surface)
    }

    /// Make the host pixels current, reading the surface back if the device
    /// wrote it since the last host access.
    pub fn materialize_to_host(&self, backend: &mut dyn KernelBackend) -> Result<(), BackendError> {
        if !self.inner.cpu_dirty.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut cache = self.inner.cache.lock();
        if let Some(surface) = cache.surface {
            debug!(
                width = self.inner.width,
                height = self.inner.height,
                "reading texture back from device"
            );
            backend.read_back(surface, &mut cache.image)?;
            self.store_pixels(&cache.image);
        }
        self.inner.cpu_dirty.store(false, Ordering::Release);
        Ok(())
    }

    /// Host pixel value, reading the surface back first if it is newer.
    pub fn read_pixel(&self, backend: &mut dyn KernelBackend, uv: Uint2) -> Result<Float4, BackendError> {
        self.materialize_to_host(backend)?;
        Ok(self.get(uv))
    }

    pub fn device_surface(&self) -> Option<SurfaceHandle> {
        self.inner.cache.lock().surface
    }

    /// Release the device surface. The next device access recreates it from
    /// the host pixels.
    pub fn release(&self, backend: &mut dyn KernelBackend) {
        if let Some(surface) = self.inner.cache.lock().surface.take() {
            backend.release_surface(surface);
            self.inner.gpu_dirty.store(true, Ordering::Release);
        }
    }
}

impl Default for RWTexture2D {
    /// An empty 0x0 texture, a placeholder until one is bound.
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl fmt::Debug for RWTexture2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RWTexture2D")
            .field("width", &self.inner.width)
            .field("height", &self.inner.height)
            .field("format", &self.inner.format)
            .field("cpu_dirty", &self.is_host_stale())
            .field("gpu_dirty", &self.is_device_stale())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HostBackend;

    #[test]
    fn test_host_write_blits_exactly_once() {
        let mut backend = HostBackend::new(&["Main"]);
        let texture = RWTexture2D::new(4, 4);
        texture.set(Uint2::new(1, 2), Float4::new(1.0, 0.5, 0.25, 1.0));

        let surface = texture.materialize_to_device(&mut backend).unwrap();
        assert_eq!(backend.stats().blits, 1);
        let pixels = backend.surface_pixels(surface).unwrap();
        assert_eq!(pixels[2 * 4 + 1], Float4::new(1.0, 0.5, 0.25, 1.0));

        assert_eq!(texture.materialize_to_device(&mut backend).unwrap(), surface);
        assert_eq!(backend.stats().blits, 1);
        assert_eq!(backend.stats().surfaces_created, 1);
    }

    #[test]
    fn test_device_write_reads_back_exactly_once() {
        let mut backend = HostBackend::new(&["Main"]);
        let texture = RWTexture2D::new(2, 2);
        let surface = texture.materialize_to_device(&mut backend).unwrap();

        assert!(backend.write_surface_pixel(surface, 1, 0, Float4::splat(0.75)));
        texture.hint_device_changed();
        assert!(texture.is_host_stale());

        let value = texture.read_pixel(&mut backend, Uint2::new(1, 0)).unwrap();
        assert_eq!(value, Float4::splat(0.75));
        texture.read_pixel(&mut backend, Uint2::new(0, 0)).unwrap();
        assert_eq!(backend.stats().read_backs, 1);
        assert!(!texture.is_host_stale());
        assert_eq!(texture.image()[1], Float4::splat(0.75));
    }

    #[test]
    fn test_flags_are_exclusive() {
        let texture = RWTexture2D::new(1, 1);
        texture.hint_device_changed();
        assert!(texture.is_host_stale() && !texture.is_device_stale());
        texture.hint_host_changed();
        assert!(!texture.is_host_stale() && texture.is_device_stale());
    }

    #[test]
    fn test_host_write_discards_unread_device_changes() {
        let mut backend = HostBackend::new(&["Main"]);
        let texture = RWTexture2D::new(2, 1);
        let surface = texture.materialize_to_device(&mut backend).unwrap();
        assert!(backend.write_surface_pixel(surface, 0, 0, Float4::splat(9.0)));
        texture.hint_device_changed();

        texture.set(Uint2::new(1, 0), Float4::splat(1.0));
        assert!(!texture.is_host_stale());
        assert!(texture.is_device_stale());

        let value = texture.read_pixel(&mut backend, Uint2::new(1, 0)).unwrap();
        assert_eq!(value, Float4::splat(1.0));
        assert_eq!(texture.get(Uint2::new(0, 0)), Float4::ZERO);
        assert_eq!(backend.stats().read_backs, 0);
    }

    #[test]
    fn test_write_pixel_keeps_device_changes() {
        let mut backend = HostBackend::new(&["Main"]);
        let texture = RWTexture2D::new(2, 1);
        let surface = texture.materialize_to_device(&mut backend).unwrap();
        assert!(backend.write_surface_pixel(surface, 0, 0, Float4::splat(9.0)));
        texture.hint_device_changed();

        texture
            .write_pixel(&mut backend, Uint2::new(1, 0), Float4::splat(1.0))
            .unwrap();
        assert_eq!(backend.stats().read_backs, 1);
        assert!(!texture.is_host_stale());
        assert!(texture.is_device_stale());
        assert_eq!(texture.get(Uint2::new(0, 0)), Float4::splat(9.0));
        assert_eq!(texture.get(Uint2::new(1, 0)), Float4::splat(1.0));

        texture.materialize_to_device(&mut backend).unwrap();
        let pixels = backend.surface_pixels(surface).unwrap();
        assert_eq!(pixels, vec![Float4::splat(9.0), Float4::splat(1.0)]);
    }

    #[test]
    fn test_apply_commits_pixels_to_image() {
        let texture = RWTexture2D::new(3, 1);
        texture.set(Uint2::new(2, 0), Float4::splat(1.0));
        assert_eq!(texture.image()[2], Float4::ZERO);
        texture.apply_host_changes();
        assert_eq!(texture.image()[2], Float4::splat(1.0));
    }

    #[test]
    fn test_read_back_without_surface_is_a_no_op() {
        let mut backend = HostBackend::new(&["Main"]);
        let texture = RWTexture2D::new(1, 1);
        texture.hint_device_changed();
        texture.materialize_to_host(&mut backend).unwrap();
        assert_eq!(backend.stats().read_backs, 0);
        assert!(!texture.is_host_stale());
    }

    #[test]
    fn test_release_recreates_on_next_use() {
        let mut backend = HostBackend::new(&["Main"]);
        let texture = RWTexture2D::with_format(2, 1, TextureFormat::Rgba8Unorm);
        let first = texture.materialize_to_device(&mut backend).unwrap();
        assert_eq!(
            backend.surface_size(first),
            Some((2, 1, TextureFormat::Rgba8Unorm))
        );
        texture.release(&mut backend);
        assert_eq!(texture.device_surface(), None);
        let second = texture.materialize_to_device(&mut backend).unwrap();
        assert_ne!(first, second);
        assert_eq!(backend.stats().blits, 2);
    }
}
