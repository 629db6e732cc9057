//! The dual dispatch engine.
//!
//! A [`Dispatcher`] owns one kernel instance and runs its entry points
//! either on a hardware backend or by emulating the thread grid on the host.
//!
//! Emulated grid layout: for an entry with extent `(Ex, Ey, Ez)` dispatched
//! with group counts `(Gx, Gy, Gz)`, one rayon task runs per lane
//! `(lx, ly, lz)` of the extent, and each task walks every
//! `(ix, iy, iz)` of the group counts, invoking the entry with global id
//! `(lx*Gx + ix, ly*Gy + iy, lz*Gz + iz)`. Every id in
//! `[0, Ex*Gx) x [0, Ey*Gy) x [0, Ez*Gz)` is produced exactly once.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytemuck::Pod;
use rayon::prelude::*;
use tracing::{debug, warn};

use super::buffer::{BufferResource, RWStructuredBuffer};
use super::error::DispatchError;
use super::kernel::{Capability, KernelClass, KernelLayout, SlotDescriptor};
use super::table::ResourceTable;
use super::texture::RWTexture2D;
use super::types::Uint3;
use crate::config::Project;
use crate::gpu::KernelBackend;

/// How an entry point was last executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchPath {
    Hardware,
    Emulated,
}

impl fmt::Display for DispatchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchPath::Hardware => write!(f, "hardware"),
            DispatchPath::Emulated => write!(f, "emulated"),
        }
    }
}

/// Runs the entry points of one kernel instance.
///
/// Dispatch methods take `&mut self`, so at most one dispatch per engine is
/// in flight. Dropping the engine releases every device buffer and surface
/// it created.
pub struct Dispatcher<K: KernelClass> {
    kernel: K,
    layout: KernelLayout<K>,
    tables: Vec<ResourceTable>,
    last: Vec<Option<DispatchPath>>,
    backend: Option<Box<dyn KernelBackend>>,
    source: Option<PathBuf>,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl<K: KernelClass> Dispatcher<K> {
    /// Register `kernel`'s entry points and slots.
    pub fn new(kernel: K) -> Result<Self, DispatchError> {
        let layout = KernelLayout::of()?;
        let count = layout.entries().len();
        debug!(
            kernel = std::any::type_name::<K>(),
            entries = count,
            slots = layout.slots().len(),
            "registered kernel"
        );
        Ok(Self {
            kernel,
            layout,
            tables: (0..count).map(|_| ResourceTable::default()).collect(),
            last: vec![None; count],
            backend: None,
            source: None,
            pool: None,
        })
    }

    /// Attach the hardware backend used by [`Self::dispatch_hardware`].
    pub fn with_backend(mut self, backend: impl KernelBackend + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    /// Record the file the kernel class is declared in.
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Run emulated lanes on a dedicated pool of `workers` threads instead of
    /// the global rayon pool. Zero keeps the global pool.
    pub fn with_workers(mut self, workers: usize) -> Result<Self, DispatchError> {
        self.pool = if workers == 0 {
            None
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("rspu-lane-{}", i))
                .build()?;
            Some(Arc::new(pool))
        };
        Ok(self)
    }

    /// Apply the `[dispatch]` settings of a project.
    pub fn with_project(self, project: &Project) -> Result<Self, DispatchError> {
        self.with_workers(project.workers)
    }

    /// Worker threads of the dedicated pool, or `None` on the global pool.
    pub fn workers(&self) -> Option<usize> {
        self.pool.as_ref().map(|pool| pool.current_num_threads())
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }

    pub fn layout(&self) -> &KernelLayout<K> {
        &self.layout
    }

    pub fn backend(&self) -> Option<&dyn KernelBackend> {
        self.backend.as_deref()
    }

    /// Declaring file of the kernel class.
    pub fn source_path(&self) -> Result<&Path, DispatchError> {
        self.source.as_deref().ok_or(DispatchError::SourceUnknown)
    }

    /// Ordinal of the entry point called `name`, or `None` if the kernel
    /// declares no such entry point.
    pub fn find_kernel(&self, name: &str) -> Option<usize> {
        self.layout.find_kernel(name)
    }

    /// How `entry` ran most recently, if it ran at all.
    pub fn last_dispatch(&self, entry: usize) -> Option<DispatchPath> {
        self.last.get(entry).copied().flatten()
    }

    fn slot(&self, entry: usize, slot: &str) -> Result<&SlotDescriptor<K>, DispatchError> {
        let point = self.layout.entry(entry)?;
        self.layout.slot(slot).ok_or_else(|| DispatchError::UnknownSlot {
            entry: point.name.clone(),
            slot: slot.to_string(),
            reason: "is not declared",
        })
    }

    /// Bind `buffer` to `slot` for `entry`. The slot must be declared as a
    /// buffer of `T`.
    pub fn set_buffer<T: Pod>(
        &mut self,
        entry: usize,
        slot: &str,
        buffer: &RWStructuredBuffer<T>,
    ) -> Result<(), DispatchError> {
        let descriptor = self.slot(entry, slot)?;
        let found = Capability::buffer_of::<T>();
        if descriptor.capability != found {
            return Err(DispatchError::FieldTypeMismatch {
                slot: slot.to_string(),
                expected: descriptor.capability.to_string(),
                found: found.to_string(),
            });
        }
        debug!(entry, slot, elements = buffer.len(), "binding buffer");
        self.tables[entry].bind_buffer(slot, Box::new(buffer.clone()));
        Ok(())
    }

    /// Bind `texture` to `slot` for `entry`. The slot must be declared as a
    /// texture.
    pub fn set_texture(
        &mut self,
        entry: usize,
        slot: &str,
        texture: &RWTexture2D,
    ) -> Result<(), DispatchError> {
        let descriptor = self.slot(entry, slot)?;
        if descriptor.capability != Capability::Texture {
            return Err(DispatchError::FieldTypeMismatch {
                slot: slot.to_string(),
                expected: descriptor.capability.to_string(),
                found: Capability::Texture.to_string(),
            });
        }
        debug!(
            entry,
            slot,
            width = texture.width(),
            height = texture.height(),
            "binding texture"
        );
        self.tables[entry].bind_texture(slot, texture.clone());
        Ok(())
    }

    /// Texture bound to `slot` for `entry`.
    pub fn texture(&self, entry: usize, slot: &str) -> Result<&RWTexture2D, DispatchError> {
        self.slot(entry, slot)?;
        self.tables[entry]
            .texture(slot)
            .ok_or_else(|| DispatchError::UnknownSlot {
                entry: self.layout.entries()[entry].name.clone(),
                slot: slot.to_string(),
                reason: "has no texture bound",
            })
    }

    /// Run `entry` on the hardware backend.
    ///
    /// Uploads bound buffers whose host copy changed since the last upload
    /// (see [`Self::invalidate_buffers`]), materializes and binds every
    /// bound texture (which then counts as device-fresh), and queues one dispatch
    /// of `groups` thread groups. Does not wait for the device; use
    /// [`Self::download_buffers`] to observe buffer results.
    pub fn dispatch_hardware(&mut self, entry: usize, groups: Uint3) -> Result<(), DispatchError> {
        let point = self.layout.entry(entry)?;
        let backend = self.backend.as_deref_mut().ok_or(DispatchError::NoBackend)?;

        let backend_index = backend.find_entry_index(&point.name);
        if backend_index != Some(entry) {
            return Err(DispatchError::KernelIndexMismatch {
                name: point.name.clone(),
                ordinal: entry,
                backend: backend.name(),
                backend_index,
            });
        }

        let table = &mut self.tables[entry];
        for (slot, state) in table.buffers_mut() {
            let handle = state.materialize_to_device(backend)?;
            backend.bind_buffer(entry, slot, handle)?;
        }
        for (slot, texture) in table.textures() {
            let surface = texture.materialize_to_device(backend)?;
            backend.bind_texture(entry, slot, surface)?;
            texture.hint_device_changed();
        }

        debug!(
            entry = point.name.as_str(),
            groups = %groups,
            backend = backend.name(),
            "hardware dispatch"
        );
        backend.dispatch(entry, groups)?;
        self.last[entry] = Some(DispatchPath::Hardware);
        Ok(())
    }

    /// Mark every buffer bound to `entry` as changed on the host, so the next
    /// hardware dispatch uploads it again.
    ///
    /// Writes through a shared [`RWStructuredBuffer`] handle are not tracked.
    /// Call this after such writes; otherwise the device keeps its own copy,
    /// including results of earlier dispatches.
    pub fn invalidate_buffers(&mut self, entry: usize) -> Result<(), DispatchError> {
        self.layout.entry(entry)?;
        for (_, state) in self.tables[entry].buffers_mut() {
            state.mark_dirty();
        }
        Ok(())
    }

    /// Read every buffer bound to `entry` back from the device.
    pub fn download_buffers(&mut self, entry: usize) -> Result<(), DispatchError> {
        self.layout.entry(entry)?;
        let backend = self.backend.as_deref_mut().ok_or(DispatchError::NoBackend)?;
        for (_, state) in self.tables[entry].buffers_mut() {
            state.materialize_to_host(backend)?;
        }
        Ok(())
    }

    /// Run `entry` on host threads, emulating the hardware thread grid.
    ///
    /// Bound resources are written into the kernel's fields first. Blocks
    /// until every lane finishes; a panic in any lane is re-raised here once
    /// all lanes have stopped. Afterwards texture pixels are committed to
    /// their host images and bound buffers are marked for re-upload.
    pub fn dispatch_emulated(&mut self, entry: usize, groups: Uint3) -> Result<(), DispatchError> {
        let point = self.layout.entry(entry)?;
        let extent = point.numthreads;
        let grid = match (
            extent.x.checked_mul(groups.x),
            extent.y.checked_mul(groups.y),
            extent.z.checked_mul(groups.z),
        ) {
            (Some(x), Some(y), Some(z)) => Uint3::new(x, y, z),
            _ => {
                return Err(DispatchError::GridOverflow {
                    entry: point.name.clone(),
                    extent,
                    groups,
                })
            }
        };

        let table = &mut self.tables[entry];
        for (slot, state) in table.buffers() {
            let bound = self
                .layout
                .slot(slot)
                .is_some_and(|d| d.bind_buffer(&mut self.kernel, state.resource()));
            if !bound {
                return Err(slot_rejected(&self.layout, slot, state.resource()));
            }
        }
        for (slot, texture) in table.textures() {
            let bound = self
                .layout
                .slot(slot)
                .is_some_and(|d| d.bind_texture(&mut self.kernel, texture));
            if !bound {
                return Err(DispatchError::FieldTypeMismatch {
                    slot: slot.to_string(),
                    expected: slot_capability(&self.layout, slot),
                    found: Capability::Texture.to_string(),
                });
            }
            if texture.is_host_stale() {
                if let Some(backend) = self.backend.as_deref_mut() {
                    texture.materialize_to_host(backend)?;
                }
            }
            texture.hint_host_changed();
        }

        if grid.x == 0 || grid.y == 0 || grid.z == 0 {
            warn!(
                entry = point.name.as_str(),
                groups = %groups,
                "empty dispatch grid, nothing to run"
            );
        } else {
            debug!(
                entry = point.name.as_str(),
                extent = %extent,
                groups = %groups,
                "emulated dispatch"
            );
            let func = point.func;
            let kernel = &self.kernel;
            let lanes = extent.volume().unwrap_or(0);
            let run = || {
                (0..lanes).into_par_iter().for_each(|lane| {
                    let lx = (lane % extent.x as u64) as u32;
                    let ly = (lane / extent.x as u64 % extent.y as u64) as u32;
                    let lz = (lane / (extent.x as u64 * extent.y as u64)) as u32;
                    for iz in 0..groups.z {
                        for iy in 0..groups.y {
                            for ix in 0..groups.x {
                                let id = Uint3::new(
                                    lx * groups.x + ix,
                                    ly * groups.y + iy,
                                    lz * groups.z + iz,
                                );
                                func(kernel, id);
                            }
                        }
                    }
                });
            };
            match &self.pool {
                Some(pool) => pool.install(run),
                None => run(),
            }
        }

        let table = &mut self.tables[entry];
        for (_, texture) in table.textures() {
            texture.apply_host_changes();
        }
        for (_, state) in table.buffers_mut() {
            state.mark_dirty();
        }
        self.last[entry] = Some(DispatchPath::Emulated);
        Ok(())
    }

    /// Release every device buffer and surface bound to any entry point.
    /// Host resources stay with their owners. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };
        for table in &mut self.tables {
            for (_, state) in table.buffers_mut() {
                state.release(backend);
            }
            for (_, texture) in table.textures() {
                texture.release(backend);
            }
        }
        debug!(backend = backend.name(), "released device resources");
    }
}

impl<K: KernelClass> Drop for Dispatcher<K> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn slot_capability<K: KernelClass>(layout: &KernelLayout<K>, slot: &str) -> String {
    layout
        .slot(slot)
        .map(|d| d.capability.to_string())
        .unwrap_or_else(|| "nothing".to_string())
}

fn slot_rejected<K: KernelClass>(
    layout: &KernelLayout<K>,
    slot: &str,
    resource: &dyn BufferResource,
) -> DispatchError {
    DispatchError::FieldTypeMismatch {
        slot: slot.to_string(),
        expected: slot_capability(layout, slot),
        found: format!("RWStructuredBuffer<{}>", resource.element_type_name()),
    }
}
