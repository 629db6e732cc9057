//! wgpu compute backend.
//!
//! wgpu has no HLSL front end, so the backend is built from WGSL module
//! source plus the two tables the dispatcher cannot infer: entry point
//! names in declaration order, and the `@binding` index of each slot (all
//! resources live in bind group 0). Buffers become storage buffers and
//! surfaces storage textures. Downloads and read-backs copy through a mapped
//! staging buffer and block on the device.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use super::{BackendError, BufferHandle, KernelBackend, SurfaceHandle};
use crate::runtime::{Float4, TextureFormat, Uint3};

const NAME: &str = "wgpu";

fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
    }
}

/// Host texels → surface bytes.
fn encode_texels(format: TextureFormat, pixels: &[Float4]) -> Vec<u8> {
    match format {
        TextureFormat::Rgba32Float => bytemuck::cast_slice(pixels).to_vec(),
        TextureFormat::Rgba8Unorm => pixels
            .iter()
            .flat_map(|p| p.to_array().map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
            .collect(),
    }
}

/// Surface bytes → host texels.
fn decode_texels(format: TextureFormat, bytes: &[u8], out: &mut [Float4]) {
    match format {
        TextureFormat::Rgba32Float => {
            for (texel, chunk) in out.iter_mut().zip(bytes.chunks_exact(16)) {
                *texel = bytemuck::pod_read_unaligned(chunk);
            }
        }
        TextureFormat::Rgba8Unorm => {
            for (texel, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
                *texel = Float4::from(chunk_to_unit(chunk));
            }
        }
    }
}

fn chunk_to_unit(chunk: &[u8]) -> [f32; 4] {
    [
        chunk[0] as f32 / 255.0,
        chunk[1] as f32 / 255.0,
        chunk[2] as f32 / 255.0,
        chunk[3] as f32 / 255.0,
    ]
}

fn padded_row(width: u32, format: TextureFormat) -> u32 {
    let row = width * format.bytes_per_texel();
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    row.div_ceil(align) * align
}

struct DeviceSurface {
    texture: wgpu::Texture,
    width: u32,
    height: u32,
    format: TextureFormat,
}

#[derive(Clone, Copy)]
enum Bound {
    Buffer(BufferHandle),
    Surface(SurfaceHandle),
}

/// A [`KernelBackend`] running WGSL kernels on a wgpu device.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    module: wgpu::ShaderModule,
    entries: Vec<String>,
    bindings: HashMap<String, u32>,
    pipelines: Vec<Option<wgpu::ComputePipeline>>,
    next_handle: u64,
    buffers: HashMap<u64, wgpu::Buffer>,
    surfaces: HashMap<u64, DeviceSurface>,
    /// Per entry: binding index → resource.
    bound: Vec<BTreeMap<u32, Bound>>,
}

impl WgpuBackend {
    /// Compile `wgsl` on the default adapter.
    ///
    /// `entries` lists the module's entry points in the order the kernel
    /// class registers them; `bindings` maps slot names to binding indices.
    pub fn new(wgsl: &str, entries: &[&str], bindings: &[(&str, u32)]) -> Result<Self, BackendError> {
        let (device, queue) = super::try_create_device()
            .ok_or_else(|| BackendError::new(NAME, "create_device", "no GPU adapter available"))?;
        Self::with_device(device, queue, wgsl, entries, bindings)
    }

    pub fn with_device(
        device: wgpu::Device,
        queue: wgpu::Queue,
        wgsl: &str,
        entries: &[&str],
        bindings: &[(&str, u32)],
    ) -> Result<Self, BackendError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("rspu_kernel"),
            source: wgpu::ShaderSource::Wgsl(wgsl.into()),
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(BackendError::new(NAME, "compile", err.to_string()));
        }
        debug!(entries = entries.len(), "compiled WGSL module");
        Ok(Self {
            device,
            queue,
            module,
            entries: entries.iter().map(|e| e.to_string()).collect(),
            bindings: bindings
                .iter()
                .map(|(slot, index)| (slot.to_string(), *index))
                .collect(),
            pipelines: entries.iter().map(|_| None).collect(),
            next_handle: 0,
            buffers: HashMap::new(),
            surfaces: HashMap::new(),
            bound: entries.iter().map(|_| BTreeMap::new()).collect(),
        })
    }

    fn allocate(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn buffer(&self, operation: &'static str, handle: BufferHandle) -> Result<&wgpu::Buffer, BackendError> {
        self.buffers
            .get(&handle.0)
            .ok_or_else(|| BackendError::new(NAME, operation, format!("unknown buffer {:?}", handle)))
    }

    fn surface(&self, operation: &'static str, handle: SurfaceHandle) -> Result<&DeviceSurface, BackendError> {
        self.surfaces
            .get(&handle.0)
            .ok_or_else(|| BackendError::new(NAME, operation, format!("unknown surface {:?}", handle)))
    }

    fn binding(&self, operation: &'static str, entry: usize, slot: &str) -> Result<u32, BackendError> {
        if entry >= self.entries.len() {
            return Err(BackendError::new(
                NAME,
                operation,
                format!("no entry point with ordinal {}", entry),
            ));
        }
        self.bindings
            .get(slot)
            .copied()
            .ok_or_else(|| BackendError::new(NAME, operation, format!("slot `{}` has no binding index", slot)))
    }

    /// Copy `size` bytes out of `source` (already recorded into `encoder`)
    /// and wait for them.
    fn read_staged(
        &self,
        operation: &'static str,
        mut encoder: wgpu::CommandEncoder,
        record: impl FnOnce(&mut wgpu::CommandEncoder, &wgpu::Buffer),
        size: u64,
    ) -> Result<Vec<u8>, BackendError> {
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("rspu_staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        record(&mut encoder, &staging);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| BackendError::new(NAME, operation, "readback channel closed"))?
            .map_err(|e| BackendError::new(NAME, operation, e.to_string()))?;

        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(bytes)
    }

    fn pipeline(&mut self, entry: usize) -> Result<&wgpu::ComputePipeline, BackendError> {
        if self.pipelines[entry].is_none() {
            self.device.push_error_scope(wgpu::ErrorFilter::Validation);
            let pipeline = self
                .device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(&self.entries[entry]),
                    layout: None,
                    module: &self.module,
                    entry_point: Some(&self.entries[entry]),
                    compilation_options: Default::default(),
                    cache: None,
                });
            if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
                return Err(BackendError::new(NAME, "create_pipeline", err.to_string()));
            }
            self.pipelines[entry] = Some(pipeline);
        }
        self.pipelines[entry]
            .as_ref()
            .ok_or_else(|| BackendError::new(NAME, "create_pipeline", "pipeline missing"))
    }
}

impl KernelBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn find_entry_index(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e == name)
    }

    fn create_buffer(&mut self, count: usize, stride: usize) -> Result<BufferHandle, BackendError> {
        let size = count
            .checked_mul(stride)
            .ok_or_else(|| BackendError::new(NAME, "create_buffer", "size overflows"))?;
        // Zero-sized storage bindings are invalid.
        let size = (size as u64).max(wgpu::COPY_BUFFER_ALIGNMENT);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("rspu_buffer"),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let id = self.allocate();
        self.buffers.insert(id, buffer);
        Ok(BufferHandle(id))
    }

    fn upload(&mut self, handle: BufferHandle, bytes: &[u8]) -> Result<(), BackendError> {
        let buffer = self.buffer("upload", handle)?;
        if !bytes.is_empty() {
            self.queue.write_buffer(buffer, 0, bytes);
        }
        Ok(())
    }

    fn download(&mut self, handle: BufferHandle, out: &mut [u8]) -> Result<(), BackendError> {
        if out.is_empty() {
            return Ok(());
        }
        let buffer = self.buffer("download", handle)?;
        let size = out.len() as u64;
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("rspu_download"),
            });
        let bytes = self.read_staged(
            "download",
            encoder,
            |encoder, staging| encoder.copy_buffer_to_buffer(buffer, 0, staging, 0, size),
            size,
        )?;
        out.copy_from_slice(&bytes);
        Ok(())
    }

    fn release_buffer(&mut self, handle: BufferHandle) {
        if let Some(buffer) = self.buffers.remove(&handle.0) {
            buffer.destroy();
        }
        for bound in &mut self.bound {
            bound.retain(|_, r| !matches!(r, Bound::Buffer(h) if *h == handle));
        }
    }

    fn create_surface(
        &mut self,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<SurfaceHandle, BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::new(
                NAME,
                "create_surface",
                format!("{}x{} surface", width, height),
            ));
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("rspu_surface"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(format),
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let id = self.allocate();
        self.surfaces.insert(
            id,
            DeviceSurface {
                texture,
                width,
                height,
                format,
            },
        );
        Ok(SurfaceHandle(id))
    }

    fn blit(&mut self, handle: SurfaceHandle, pixels: &[Float4]) -> Result<(), BackendError> {
        let surface = self.surface("blit", handle)?;
        let bytes = encode_texels(surface.format, pixels);
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &surface.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(surface.width * surface.format.bytes_per_texel()),
                rows_per_image: Some(surface.height),
            },
            wgpu::Extent3d {
                width: surface.width,
                height: surface.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn read_back(&mut self, handle: SurfaceHandle, out: &mut [Float4]) -> Result<(), BackendError> {
        let surface = self.surface("read_back", handle)?;
        let row = surface.width * surface.format.bytes_per_texel();
        let padded = padded_row(surface.width, surface.format);
        let size = padded as u64 * surface.height as u64;
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("rspu_read_back"),
            });
        let bytes = self.read_staged(
            "read_back",
            encoder,
            |encoder, staging| {
                encoder.copy_texture_to_buffer(
                    wgpu::TexelCopyTextureInfo {
                        texture: &surface.texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    wgpu::TexelCopyBufferInfo {
                        buffer: staging,
                        layout: wgpu::TexelCopyBufferLayout {
                            offset: 0,
                            bytes_per_row: Some(padded),
                            rows_per_image: Some(surface.height),
                        },
                    },
                    wgpu::Extent3d {
                        width: surface.width,
                        height: surface.height,
                        depth_or_array_layers: 1,
                    },
                )
            },
            size,
        )?;
        let width = surface.width as usize;
        for (y, line) in bytes.chunks_exact(padded as usize).enumerate() {
            let start = y * width;
            let Some(texels) = out.get_mut(start..start + width) else {
                break;
            };
            decode_texels(surface.format, &line[..row as usize], texels);
        }
        Ok(())
    }

    fn release_surface(&mut self, handle: SurfaceHandle) {
        if let Some(surface) = self.surfaces.remove(&handle.0) {
            surface.texture.destroy();
        }
        for bound in &mut self.bound {
            bound.retain(|_, r| !matches!(r, Bound::Surface(h) if *h == handle));
        }
    }

    fn bind_buffer(&mut self, entry: usize, slot: &str, handle: BufferHandle) -> Result<(), BackendError> {
        let index = self.binding("bind_buffer", entry, slot)?;
        self.buffer("bind_buffer", handle)?;
        self.bound[entry].insert(index, Bound::Buffer(handle));
        Ok(())
    }

    fn bind_texture(&mut self, entry: usize, slot: &str, handle: SurfaceHandle) -> Result<(), BackendError> {
        let index = self.binding("bind_texture", entry, slot)?;
        self.surface("bind_texture", handle)?;
        self.bound[entry].insert(index, Bound::Surface(handle));
        Ok(())
    }

    fn dispatch(&mut self, entry: usize, groups: Uint3) -> Result<(), BackendError> {
        if entry >= self.entries.len() {
            return Err(BackendError::new(
                NAME,
                "dispatch",
                format!("no entry point with ordinal {}", entry),
            ));
        }
        self.pipeline(entry)?;
        let Some(pipeline) = self.pipelines[entry].as_ref() else {
            return Err(BackendError::new(NAME, "dispatch", "pipeline missing"));
        };

        let mut views = Vec::new();
        for (index, resource) in &self.bound[entry] {
            if let Bound::Surface(handle) = resource {
                let surface = self.surface("dispatch", *handle)?;
                views.push((*index, surface.texture.create_view(&Default::default())));
            }
        }
        let mut layout_entries = Vec::new();
        for (index, resource) in &self.bound[entry] {
            let binding = match resource {
                Bound::Buffer(handle) => self.buffer("dispatch", *handle)?.as_entire_binding(),
                Bound::Surface(_) => match views.iter().find(|(i, _)| i == index) {
                    Some((_, view)) => wgpu::BindingResource::TextureView(view),
                    None => continue,
                },
            };
            layout_entries.push(wgpu::BindGroupEntry {
                binding: *index,
                resource: binding,
            });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("rspu_bind_group"),
            layout: &pipeline.get_bind_group_layout(0),
            entries: &layout_entries,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("rspu_dispatch"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("rspu_dispatch_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups.x, groups.y, groups.z);
        }
        let commands = encoder.finish();
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(BackendError::new(NAME, "dispatch", err.to_string()));
        }
        self.queue.submit(std::iter::once(commands));
        debug!(entry = self.entries[entry].as_str(), groups = %groups, "queued dispatch");
        Ok(())
    }
}
