//! A compute device simulated in host memory.
//!
//! `HostBackend` keeps buffers and surfaces in plain vectors, records every
//! transfer and dispatch, and never executes kernels. Clones share one
//! device, so a test can hand one clone to a dispatcher and keep another to
//! inspect or overwrite device memory, standing in for work a real kernel
//! would have done.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{BackendError, BufferHandle, KernelBackend, SurfaceHandle};
use crate::runtime::{Float4, TextureFormat, Uint3};

const NAME: &str = "host";

/// Call counters, cumulative since the device was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HostStats {
    pub buffers_created: usize,
    pub buffers_released: usize,
    pub uploads: usize,
    pub downloads: usize,
    pub surfaces_created: usize,
    pub surfaces_released: usize,
    pub blits: usize,
    pub read_backs: usize,
    pub dispatches: usize,
}

/// One recorded dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchRecord {
    pub entry: usize,
    pub groups: Uint3,
    /// Slots bound for the entry at dispatch time, sorted by name.
    pub buffers: Vec<(String, BufferHandle)>,
    pub textures: Vec<(String, SurfaceHandle)>,
}

struct HostSurface {
    width: u32,
    height: u32,
    format: TextureFormat,
    pixels: Vec<Float4>,
}

#[derive(Default)]
struct HostDevice {
    entries: Vec<String>,
    next_handle: u64,
    buffers: HashMap<u64, Vec<u8>>,
    surfaces: HashMap<u64, HostSurface>,
    bound_buffers: HashMap<(usize, String), BufferHandle>,
    bound_textures: HashMap<(usize, String), SurfaceHandle>,
    stats: HostStats,
    log: Vec<DispatchRecord>,
}

impl HostDevice {
    fn allocate(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn check_entry(&self, operation: &'static str, entry: usize) -> Result<(), BackendError> {
        if entry < self.entries.len() {
            Ok(())
        } else {
            Err(BackendError::new(
                NAME,
                operation,
                format!("no entry point with ordinal {}", entry),
            ))
        }
    }
}

/// In-memory [`KernelBackend`]. See the module docs.
#[derive(Clone, Default)]
pub struct HostBackend {
    device: Arc<Mutex<HostDevice>>,
}

impl HostBackend {
    /// A device whose compiled kernel exposes `entries`, in order.
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Self {
        let device = HostDevice {
            entries: entries.iter().map(|e| e.as_ref().to_string()).collect(),
            ..HostDevice::default()
        };
        Self {
            device: Arc::new(Mutex::new(device)),
        }
    }

    pub fn stats(&self) -> HostStats {
        self.device.lock().stats
    }

    pub fn dispatch_log(&self) -> Vec<DispatchRecord> {
        self.device.lock().log.clone()
    }

    /// Number of live (created, not released) buffers.
    pub fn live_buffers(&self) -> usize {
        self.device.lock().buffers.len()
    }

    pub fn live_surfaces(&self) -> usize {
        self.device.lock().surfaces.len()
    }

    pub fn buffer_bytes(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.device.lock().buffers.get(&buffer.0).cloned()
    }

    /// Overwrite device memory directly, as a kernel would. `bytes` must
    /// match the buffer size.
    pub fn write_buffer(&self, buffer: BufferHandle, bytes: &[u8]) -> bool {
        let mut device = self.device.lock();
        match device.buffers.get_mut(&buffer.0) {
            Some(data) if data.len() == bytes.len() => {
                data.copy_from_slice(bytes);
                true
            }
            _ => false,
        }
    }

    pub fn surface_pixels(&self, surface: SurfaceHandle) -> Option<Vec<Float4>> {
        self.device
            .lock()
            .surfaces
            .get(&surface.0)
            .map(|s| s.pixels.clone())
    }

    pub fn surface_size(&self, surface: SurfaceHandle) -> Option<(u32, u32, TextureFormat)> {
        self.device
            .lock()
            .surfaces
            .get(&surface.0)
            .map(|s| (s.width, s.height, s.format))
    }

    /// Overwrite one texel of a surface, as a kernel would.
    pub fn write_surface_pixel(&self, surface: SurfaceHandle, x: u32, y: u32, value: Float4) -> bool {
        let mut device = self.device.lock();
        match device.surfaces.get_mut(&surface.0) {
            Some(s) if x < s.width && y < s.height => {
                let index = (y * s.width + x) as usize;
                s.pixels[index] = value;
                true
            }
            _ => false,
        }
    }

    pub fn bound_buffer(&self, entry: usize, slot: &str) -> Option<BufferHandle> {
        self.device
            .lock()
            .bound_buffers
            .get(&(entry, slot.to_string()))
            .copied()
    }

    pub fn bound_texture(&self, entry: usize, slot: &str) -> Option<SurfaceHandle> {
        self.device
            .lock()
            .bound_textures
            .get(&(entry, slot.to_string()))
            .copied()
    }
}

impl KernelBackend for HostBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn find_entry_index(&self, name: &str) -> Option<usize> {
        self.device.lock().entries.iter().position(|e| e == name)
    }

    fn create_buffer(&mut self, count: usize, stride: usize) -> Result<BufferHandle, BackendError> {
        let size = count.checked_mul(stride).ok_or_else(|| {
            BackendError::new(NAME, "create_buffer", format!("{} x {} bytes overflows", count, stride))
        })?;
        let mut device = self.device.lock();
        let id = device.allocate();
        device.buffers.insert(id, vec![0; size]);
        device.stats.buffers_created += 1;
        Ok(BufferHandle(id))
    }

    fn upload(&mut self, buffer: BufferHandle, bytes: &[u8]) -> Result<(), BackendError> {
        let mut device = self.device.lock();
        let data = device
            .buffers
            .get_mut(&buffer.0)
            .ok_or_else(|| BackendError::new(NAME, "upload", format!("unknown buffer {:?}", buffer)))?;
        if data.len() != bytes.len() {
            return Err(BackendError::new(
                NAME,
                "upload",
                format!("expected {} bytes, got {}", data.len(), bytes.len()),
            ));
        }
        data.copy_from_slice(bytes);
        device.stats.uploads += 1;
        Ok(())
    }

    fn download(&mut self, buffer: BufferHandle, out: &mut [u8]) -> Result<(), BackendError> {
        let mut device = self.device.lock();
        let data = device
            .buffers
            .get(&buffer.0)
            .ok_or_else(|| BackendError::new(NAME, "download", format!("unknown buffer {:?}", buffer)))?;
        if data.len() != out.len() {
            return Err(BackendError::new(
                NAME,
                "download",
                format!("buffer holds {} bytes, destination {}", data.len(), out.len()),
            ));
        }
        out.copy_from_slice(data);
        device.stats.downloads += 1;
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        let mut device = self.device.lock();
        if device.buffers.remove(&buffer.0).is_some() {
            device.stats.buffers_released += 1;
        }
        device.bound_buffers.retain(|_, bound| *bound != buffer);
    }

    fn create_surface(
        &mut self,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<SurfaceHandle, BackendError> {
        let mut device = self.device.lock();
        let id = device.allocate();
        device.surfaces.insert(
            id,
            HostSurface {
                width,
                height,
                format,
                pixels: vec![Float4::ZERO; width as usize * height as usize],
            },
        );
        device.stats.surfaces_created += 1;
        Ok(SurfaceHandle(id))
    }

    fn blit(&mut self, surface: SurfaceHandle, pixels: &[Float4]) -> Result<(), BackendError> {
        let mut device = self.device.lock();
        let target = device
            .surfaces
            .get_mut(&surface.0)
            .ok_or_else(|| BackendError::new(NAME, "blit", format!("unknown surface {:?}", surface)))?;
        if target.pixels.len() != pixels.len() {
            return Err(BackendError::new(
                NAME,
                "blit",
                format!("surface holds {} texels, image {}", target.pixels.len(), pixels.len()),
            ));
        }
        target.pixels.copy_from_slice(pixels);
        device.stats.blits += 1;
        Ok(())
    }

    fn read_back(&mut self, surface: SurfaceHandle, out: &mut [Float4]) -> Result<(), BackendError> {
        let mut device = self.device.lock();
        let source = device.surfaces.get(&surface.0).ok_or_else(|| {
            BackendError::new(NAME, "read_back", format!("unknown surface {:?}", surface))
        })?;
        if source.pixels.len() != out.len() {
            return Err(BackendError::new(
                NAME,
                "read_back",
                format!("surface holds {} texels, image {}", source.pixels.len(), out.len()),
            ));
        }
        out.copy_from_slice(&source.pixels);
        device.stats.read_backs += 1;
        Ok(())
    }

    fn release_surface(&mut self, surface: SurfaceHandle) {
        let mut device = self.device.lock();
        if device.surfaces.remove(&surface.0).is_some() {
            device.stats.surfaces_released += 1;
        }
        device.bound_textures.retain(|_, bound| *bound != surface);
    }

    fn bind_buffer(&mut self, entry: usize, slot: &str, buffer: BufferHandle) -> Result<(), BackendError> {
        let mut device = self.device.lock();
        device.check_entry("bind_buffer", entry)?;
        if !device.buffers.contains_key(&buffer.0) {
            return Err(BackendError::new(
                NAME,
                "bind_buffer",
                format!("unknown buffer {:?}", buffer),
            ));
        }
        device.bound_buffers.insert((entry, slot.to_string()), buffer);
        Ok(())
    }

    fn bind_texture(&mut self, entry: usize, slot: &str, surface: SurfaceHandle) -> Result<(), BackendError> {
        let mut device = self.device.lock();
        device.check_entry("bind_texture", entry)?;
        if !device.surfaces.contains_key(&surface.0) {
            return Err(BackendError::new(
                NAME,
                "bind_texture",
                format!("unknown surface {:?}", surface),
            ));
        }
        device.bound_textures.insert((entry, slot.to_string()), surface);
        Ok(())
    }

    fn dispatch(&mut self, entry: usize, groups: Uint3) -> Result<(), BackendError> {
        let mut device = self.device.lock();
        device.check_entry("dispatch", entry)?;
        let mut buffers: Vec<(String, BufferHandle)> = device
            .bound_buffers
            .iter()
            .filter(|((e, _), _)| *e == entry)
            .map(|((_, slot), handle)| (slot.clone(), *handle))
            .collect();
        buffers.sort();
        let mut textures: Vec<(String, SurfaceHandle)> = device
            .bound_textures
            .iter()
            .filter(|((e, _), _)| *e == entry)
            .map(|((_, slot), handle)| (slot.clone(), *handle))
            .collect();
        textures.sort();
        device.log.push(DispatchRecord {
            entry,
            groups,
            buffers,
            textures,
        });
        device.stats.dispatches += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_lookup_follows_declaration_order() {
        let backend = HostBackend::new(&["First", "Second"]);
        assert_eq!(backend.find_entry_index("First"), Some(0));
        assert_eq!(backend.find_entry_index("Second"), Some(1));
        assert_eq!(backend.find_entry_index("Third"), None);
    }

    #[test]
    fn test_buffer_transfers_are_counted() {
        let mut backend = HostBackend::new(&["Main"]);
        let handle = backend.create_buffer(2, 4).unwrap();
        backend.upload(handle, &[1, 0, 0, 0, 2, 0, 0, 0]).unwrap();
        let mut out = [0u8; 8];
        backend.download(handle, &mut out).unwrap();
        assert_eq!(out, [1, 0, 0, 0, 2, 0, 0, 0]);

        let stats = backend.stats();
        assert_eq!(stats.buffers_created, 1);
        assert_eq!(stats.uploads, 1);
        assert_eq!(stats.downloads, 1);
    }

    #[test]
    fn test_size_mismatch_is_an_error() {
        let mut backend = HostBackend::new(&["Main"]);
        let handle = backend.create_buffer(2, 4).unwrap();
        let err = backend.upload(handle, &[0; 4]).unwrap_err();
        assert_eq!(err.operation, "upload");
        assert!(err.to_string().contains("expected 8 bytes, got 4"));
    }

    #[test]
    fn test_clones_share_device_memory() {
        let mut backend = HostBackend::new(&["Main"]);
        let observer = backend.clone();
        let surface = backend.create_surface(2, 2, TextureFormat::Rgba32Float).unwrap();
        assert!(observer.write_surface_pixel(surface, 1, 1, Float4::splat(0.5)));
        let mut out = vec![Float4::ZERO; 4];
        backend.read_back(surface, &mut out).unwrap();
        assert_eq!(out[3], Float4::splat(0.5));
        assert!(!observer.write_surface_pixel(surface, 2, 0, Float4::ZERO));
    }

    #[test]
    fn test_dispatch_records_bindings() {
        let mut backend = HostBackend::new(&["Main"]);
        let buffer = backend.create_buffer(4, 4).unwrap();
        backend.bind_buffer(0, "data", buffer).unwrap();
        backend.dispatch(0, Uint3::new(2, 1, 1)).unwrap();
        assert!(backend.dispatch(3, Uint3::new(1, 1, 1)).is_err());

        let log = backend.dispatch_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].groups, Uint3::new(2, 1, 1));
        assert_eq!(log[0].buffers, vec![("data".to_string(), buffer)]);
    }

    #[test]
    fn test_release_unbinds() {
        let mut backend = HostBackend::new(&["Main"]);
        let buffer = backend.create_buffer(1, 4).unwrap();
        backend.bind_buffer(0, "data", buffer).unwrap();
        backend.release_buffer(buffer);
        assert_eq!(backend.bound_buffer(0, "data"), None);
        assert_eq!(backend.live_buffers(), 0);
        assert_eq!(backend.stats().buffers_released, 1);
    }
}
