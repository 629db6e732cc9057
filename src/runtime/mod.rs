//! Dual-mode kernel runtime.
//!
//! Kernel classes are plain Rust structs registered through
//! [`KernelClass`]. A [`Dispatcher`] runs their entry points either on a
//! hardware backend (see [`crate::gpu`]) or by emulating the thread grid on
//! host threads, keeping bound buffers and textures consistent between the
//! host and device copies.

pub mod buffer;
pub mod dispatch;
pub mod error;
pub mod kernel;
pub mod table;
pub mod texture;
pub mod types;

pub use buffer::{BufferResource, BufferState, RWStructuredBuffer};
pub use dispatch::{DispatchPath, Dispatcher};
pub use error::DispatchError;
pub use kernel::{Capability, EntryPoint, KernelBuilder, KernelClass, KernelFn, KernelLayout};
pub use table::ResourceTable;
pub use texture::{RWTexture2D, TextureFormat};
pub use types::{Float4, Uint2, Uint3};
