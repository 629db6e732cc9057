//! Structured buffers and their host/device dual state.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::mem::size_of;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bytemuck::Pod;
use tracing::{debug, warn};

use crate::gpu::{BackendError, BufferHandle, KernelBackend};

/// A fixed-length array of `T` shared between the host, emulated lanes and
/// (through [`BufferState`]) a device.
///
/// Clones share storage. Elements are stored as relaxed atomic words, so
/// lanes may write distinct elements through `&self` concurrently. Two lanes
/// writing the same element race: the result is some interleaving of their
/// words, never undefined behavior.
///
/// `T` must be a whole number of 32-bit words (every kernel scalar and
/// vector type is).
pub struct RWStructuredBuffer<T> {
    words: Arc<[AtomicU32]>,
    len: usize,
    _element: PhantomData<fn() -> T>,
}

impl<T: Pod> RWStructuredBuffer<T> {
    const WORDS: usize = {
        assert!(
            size_of::<T>() > 0 && size_of::<T>() % 4 == 0,
            "buffer elements must be a whole number of 32-bit words"
        );
        size_of::<T>() / 4
    };

    /// `len` zeroed elements.
    pub fn new(len: usize) -> Self {
        let words = (0..len * Self::WORDS).map(|_| AtomicU32::new(0)).collect();
        Self {
            words,
            len,
            _element: PhantomData,
        }
    }

    pub fn from_slice(values: &[T]) -> Self {
        let buffer = Self::new(values.len());
        buffer.copy_from_slice(values);
        buffer
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn element_words(&self, index: usize) -> &[AtomicU32] {
        assert!(
            index < self.len,
            "index {} out of range for buffer of length {}",
            index,
            self.len
        );
        let base = index * Self::WORDS;
        &self.words[base..base + Self::WORDS]
    }

    pub fn get(&self, index: usize) -> T {
        let mut value = T::zeroed();
        let bytes = bytemuck::bytes_of_mut(&mut value);
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(self.element_words(index)) {
            chunk.copy_from_slice(&word.load(Ordering::Relaxed).to_ne_bytes());
        }
        value
    }

    pub fn set(&self, index: usize, value: T) {
        let bytes = bytemuck::bytes_of(&value);
        for (chunk, word) in bytes.chunks_exact(4).zip(self.element_words(index)) {
            word.store(
                u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
                Ordering::Relaxed,
            );
        }
    }

    pub fn to_vec(&self) -> Vec<T> {
        (0..self.len).map(|i| self.get(i)).collect()
    }

    /// Overwrite every element. Panics if the lengths differ.
    pub fn copy_from_slice(&self, values: &[T]) {
        assert_eq!(values.len(), self.len, "source length differs from buffer length");
        for (i, value) in values.iter().enumerate() {
            self.set(i, *value);
        }
    }

    /// Whether both handles share the same storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.words, &other.words)
    }
}

impl<T> Clone for RWStructuredBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            words: Arc::clone(&self.words),
            len: self.len,
            _element: PhantomData,
        }
    }
}

impl<T: Pod> Default for RWStructuredBuffer<T> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<T: Pod + fmt::Debug> fmt::Debug for RWStructuredBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

/// Element-type-erased view of a structured buffer, as the resource table
/// stores it.
pub trait BufferResource: Send + Sync {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Bytes per element.
    fn stride(&self) -> usize;
    fn element_type(&self) -> TypeId;
    fn element_type_name(&self) -> &'static str;
    /// Whole contents in native byte order.
    fn read_bytes(&self) -> Vec<u8>;
    /// Overwrite the contents from native-order bytes covering the whole
    /// buffer.
    fn write_bytes(&self, bytes: &[u8]);
    fn as_any(&self) -> &dyn Any;
}

impl<T: Pod> BufferResource for RWStructuredBuffer<T> {
    fn len(&self) -> usize {
        self.len
    }

    fn stride(&self) -> usize {
        size_of::<T>()
    }

    fn element_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn element_type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn read_bytes(&self) -> Vec<u8> {
        self.words
            .iter()
            .flat_map(|w| w.load(Ordering::Relaxed).to_ne_bytes())
            .collect()
    }

    fn write_bytes(&self, bytes: &[u8]) {
        debug_assert_eq!(bytes.len(), self.words.len() * 4);
        for (chunk, word) in bytes.chunks_exact(4).zip(self.words.iter()) {
            word.store(
                u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
                Ordering::Relaxed,
            );
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Clone, Copy, Debug)]
struct DeviceBuffer {
    handle: BufferHandle,
    count: usize,
}

/// Host array plus a lazily created device copy.
///
/// The device buffer is recreated whenever its element count no longer
/// matches the host array. `dirty` means the device copy is behind the host
/// and must be uploaded before the next device access.
pub struct BufferState {
    cpu: Box<dyn BufferResource>,
    device: Option<DeviceBuffer>,
    dirty: bool,
}

impl BufferState {
    pub fn new(cpu: Box<dyn BufferResource>) -> Self {
        Self {
            cpu,
            device: None,
            dirty: true,
        }
    }

    pub fn resource(&self) -> &dyn BufferResource {
        self.cpu.as_ref()
    }

    /// Swap in a new host array. The device copy is kept but marked stale.
    pub fn update(&mut self, cpu: Box<dyn BufferResource>) {
        self.cpu = cpu;
        self.dirty = true;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn device_handle(&self) -> Option<BufferHandle> {
        self.device.map(|d| d.handle)
    }

    /// Make the device copy current, creating or recreating it as needed.
    pub fn materialize_to_device(
        &mut self,
        backend: &mut dyn KernelBackend,
    ) -> Result<BufferHandle, BackendError> {
        let count = self.cpu.len();
        let handle = match self.device {
            Some(device) if device.count == count => device.handle,
            stale => {
                if let Some(old) = stale {
                    debug!(old = old.count, new = count, "buffer length changed, recreating");
                    backend.release_buffer(old.handle);
                }
                let handle = backend.create_buffer(count, self.cpu.stride())?;
                self.device = Some(DeviceBuffer { handle, count });
                self.dirty = true;
                handle
            }
        };
        if self.dirty {
            debug!(
                elements = count,
                element = self.cpu.element_type_name(),
                "uploading buffer"
            );
            backend.upload(handle, &self.cpu.read_bytes())?;
            self.dirty = false;
        }
        Ok(handle)
    }

    /// Copy the device contents back into the host array. No-op when the
    /// buffer never reached the device, or when the host array was replaced
    /// by one of a different length since the last upload (logged).
    pub fn materialize_to_host(&mut self, backend: &mut dyn KernelBackend) -> Result<(), BackendError> {
        let Some(device) = self.device else {
            return Ok(());
        };
        if device.count != self.cpu.len() {
            warn!(
                device = device.count,
                host = self.cpu.len(),
                "host buffer length changed since upload, skipping download"
            );
            return Ok(());
        }
        let mut bytes = vec![0u8; device.count * self.cpu.stride()];
        backend.download(device.handle, &mut bytes)?;
        debug!(elements = device.count, "downloaded buffer");
        self.cpu.write_bytes(&bytes);
        self.dirty = false;
        Ok(())
    }

    /// Release the device copy, if any.
    pub fn release(&mut self, backend: &mut dyn KernelBackend) {
        if let Some(device) = self.device.take() {
            backend.release_buffer(device.handle);
        }
        self.dirty = true;
    }
}

impl fmt::Debug for BufferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferState")
            .field("element", &self.cpu.element_type_name())
            .field("len", &self.cpu.len())
            .field("device", &self.device)
            .field("dirty", &self.dirty)
            .finish()
    }
}
