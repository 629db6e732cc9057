//! Kernel classes and their registered layout.
//!
//! A kernel class is a plain struct whose resource fields are
//! [`RWStructuredBuffer`]s and [`RWTexture2D`]s. It declares its entry
//! points and resource slots once, in [`KernelClass::register`]; the
//! dispatcher uses the resulting [`KernelLayout`] to look up entry points
//! by name, type-check bindings and write bound resources into the fields.
//!
//! ```ignore
//! struct Doubler {
//!     data: RWStructuredBuffer<u32>,
//! }
//!
//! impl KernelClass for Doubler {
//!     fn register(kernel: &mut KernelBuilder<Self>) {
//!         kernel
//!             .entry("CSMain", [64, 1, 1], Doubler::main)
//!             .buffer("data", |k| &mut k.data);
//!     }
//! }
//! ```

use std::any::{type_name, TypeId};
use std::collections::HashSet;
use std::fmt;

use bytemuck::Pod;

use super::buffer::{BufferResource, RWStructuredBuffer};
use super::error::DispatchError;
use super::texture::RWTexture2D;
use super::types::Uint3;

/// Entry point body. Receives the global dispatch thread id.
pub type KernelFn<K> = fn(&K, Uint3);

/// A struct whose methods can be dispatched as compute kernels.
pub trait KernelClass: Sized + Send + Sync + 'static {
    fn register(kernel: &mut KernelBuilder<Self>);
}

/// One registered entry point. Immutable once built.
pub struct EntryPoint<K> {
    pub name: String,
    /// Thread-group extent, every component positive.
    pub numthreads: Uint3,
    /// Position in registration order.
    pub ordinal: usize,
    pub func: KernelFn<K>,
}

impl<K> fmt::Debug for EntryPoint<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoint")
            .field("name", &self.name)
            .field("numthreads", &self.numthreads)
            .field("ordinal", &self.ordinal)
            .finish()
    }
}

/// What a slot accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    Buffer {
        element: TypeId,
        element_name: &'static str,
    },
    Texture,
}

impl Capability {
    pub fn buffer_of<T: Pod>() -> Self {
        Capability::Buffer {
            element: TypeId::of::<T>(),
            element_name: type_name::<T>(),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Buffer { element_name, .. } => {
                write!(f, "RWStructuredBuffer<{}>", element_name)
            }
            Capability::Texture => write!(f, "RWTexture2D"),
        }
    }
}

type BufferBinder<K> = Box<dyn Fn(&mut K, &dyn BufferResource) -> bool + Send + Sync>;

enum SlotBinder<K> {
    Buffer(BufferBinder<K>),
    Texture(fn(&mut K) -> &mut RWTexture2D),
}

/// A named resource field of a kernel class.
pub struct SlotDescriptor<K> {
    pub name: String,
    pub capability: Capability,
    binder: SlotBinder<K>,
}

impl<K> SlotDescriptor<K> {
    /// Point the kernel's field at `resource`. Returns false if the
    /// resource is not a buffer of this slot's element type.
    pub(crate) fn bind_buffer(&self, kernel: &mut K, resource: &dyn BufferResource) -> bool {
        match &self.binder {
            SlotBinder::Buffer(bind) => bind(kernel, resource),
            SlotBinder::Texture(_) => false,
        }
    }

    /// Point the kernel's field at `texture`. Returns false for buffer slots.
    pub(crate) fn bind_texture(&self, kernel: &mut K, texture: &RWTexture2D) -> bool {
        match &self.binder {
            SlotBinder::Texture(field) => {
                *field(kernel) = texture.clone();
                true
            }
            SlotBinder::Buffer(_) => false,
        }
    }
}

impl<K> fmt::Debug for SlotDescriptor<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotDescriptor")
            .field("name", &self.name)
            .field("capability", &self.capability)
            .finish()
    }
}

/// Collects a kernel class's declarations. Duplicates and zero extents are
/// reported once registration finishes.
pub struct KernelBuilder<K> {
    entries: Vec<EntryPoint<K>>,
    slots: Vec<SlotDescriptor<K>>,
}

impl<K: KernelClass> KernelBuilder<K> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            slots: Vec::new(),
        }
    }

    /// Declare an entry point with its `[numthreads(x, y, z)]` extent.
    pub fn entry(&mut self, name: &str, numthreads: [u32; 3], func: KernelFn<K>) -> &mut Self {
        let ordinal = self.entries.len();
        self.entries.push(EntryPoint {
            name: name.to_string(),
            numthreads: Uint3::from(numthreads),
            ordinal,
            func,
        });
        self
    }

    /// Declare a structured buffer field.
    pub fn buffer<T: Pod>(
        &mut self,
        name: &str,
        field: fn(&mut K) -> &mut RWStructuredBuffer<T>,
    ) -> &mut Self {
        let bind = move |kernel: &mut K, resource: &dyn BufferResource| {
            match resource.as_any().downcast_ref::<RWStructuredBuffer<T>>() {
                Some(buffer) => {
                    *field(kernel) = buffer.clone();
                    true
                }
                None => false,
            }
        };
        self.slots.push(SlotDescriptor {
            name: name.to_string(),
            capability: Capability::buffer_of::<T>(),
            binder: SlotBinder::Buffer(Box::new(bind)),
        });
        self
    }

    /// Declare a texture field.
    pub fn texture(&mut self, name: &str, field: fn(&mut K) -> &mut RWTexture2D) -> &mut Self {
        self.slots.push(SlotDescriptor {
            name: name.to_string(),
            capability: Capability::Texture,
            binder: SlotBinder::Texture(field),
        });
        self
    }

    fn build(self) -> Result<KernelLayout<K>, DispatchError> {
        if let Some(name) = first_duplicate(self.entries.iter().map(|e| e.name.as_str())) {
            return Err(DispatchError::DuplicateEntry(name.to_string()));
        }
        if let Some(name) = first_duplicate(self.slots.iter().map(|s| s.name.as_str())) {
            return Err(DispatchError::DuplicateSlot(name.to_string()));
        }
        for entry in &self.entries {
            let extent = entry.numthreads;
            if extent.x == 0 || extent.y == 0 || extent.z == 0 {
                return Err(DispatchError::ZeroExtent {
                    entry: entry.name.clone(),
                    extent,
                });
            }
        }
        Ok(KernelLayout {
            entries: self.entries,
            slots: self.slots,
        })
    }
}

fn first_duplicate<'a>(mut names: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    names.find(|name| !seen.insert(*name))
}

/// The validated declarations of one kernel class.
pub struct KernelLayout<K> {
    entries: Vec<EntryPoint<K>>,
    slots: Vec<SlotDescriptor<K>>,
}

impl<K: KernelClass> KernelLayout<K> {
    /// Run `K::register` and validate the result.
    pub fn of() -> Result<Self, DispatchError> {
        let mut builder = KernelBuilder::new();
        K::register(&mut builder);
        builder.build()
    }

    /// Ordinal of the entry point called `name`; `None` when no such entry
    /// point is registered.
    pub fn find_kernel(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    pub fn entry(&self, ordinal: usize) -> Result<&EntryPoint<K>, DispatchError> {
        self.entries.get(ordinal).ok_or(DispatchError::InvalidKernel {
            ordinal,
            count: self.entries.len(),
        })
    }

    pub fn entries(&self) -> &[EntryPoint<K>] {
        &self.entries
    }

    pub fn slot(&self, name: &str) -> Option<&SlotDescriptor<K>> {
        self.slots.iter().find(|s| s.name == name)
    }

    pub fn slots(&self) -> &[SlotDescriptor<K>] {
        &self.slots
    }
}
