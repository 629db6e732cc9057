//! Kernel vector types shared by emulated entry points and device memory.
//!
//! All types are `#[repr(C)]` and `Pod`, so a buffer of them has the same
//! byte layout on the host and on the device.

use std::fmt;
use std::ops::Add;

use bytemuck::{Pod, Zeroable};

/// Two unsigned components, used for texel coordinates.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Uint2 {
    pub x: u32,
    pub y: u32,
}

impl Uint2 {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Three unsigned components: dispatch ids, group counts, thread-group
/// extents.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Uint3 {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Uint3 {
    pub const ZERO: Uint3 = Uint3::new(0, 0, 0);

    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub const fn xy(self) -> Uint2 {
        Uint2::new(self.x, self.y)
    }

    /// Product of the three components, or `None` on overflow.
    pub fn volume(self) -> Option<u64> {
        (self.x as u64)
            .checked_mul(self.y as u64)?
            .checked_mul(self.z as u64)
    }
}

impl Add for Uint3 {
    type Output = Uint3;

    fn add(self, rhs: Uint3) -> Uint3 {
        Uint3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl From<[u32; 3]> for Uint3 {
    fn from([x, y, z]: [u32; 3]) -> Self {
        Uint3::new(x, y, z)
    }
}

impl fmt::Display for Uint3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Four float components; one texel of an RGBA surface.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Float4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Float4 {
    pub const ZERO: Float4 = Float4::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub const fn splat(v: f32) -> Self {
        Self::new(v, v, v, v)
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }
}

impl From<[f32; 4]> for Float4 {
    fn from([x, y, z, w]: [f32; 4]) -> Self {
        Float4::new(x, y, z, w)
    }
}
