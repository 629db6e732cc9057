//! Per-entry-point resource bindings.

use std::collections::BTreeMap;

use super::buffer::{BufferResource, BufferState};
use super::texture::RWTexture2D;

/// Slot name → bound resource, for one entry point.
#[derive(Debug, Default)]
pub struct ResourceTable {
    buffers: BTreeMap<String, BufferState>,
    textures: BTreeMap<String, RWTexture2D>,
}

impl ResourceTable {
    /// Bind a buffer to `slot`. Rebinding keeps the slot's device buffer
    /// and marks it for re-upload.
    pub fn bind_buffer(&mut self, slot: &str, buffer: Box<dyn BufferResource>) {
        match self.buffers.get_mut(slot) {
            Some(state) => state.update(buffer),
            None => {
                self.buffers.insert(slot.to_string(), BufferState::new(buffer));
            }
        }
    }

    pub fn bind_texture(&mut self, slot: &str, texture: RWTexture2D) {
        self.textures.insert(slot.to_string(), texture);
    }

    pub fn buffer(&self, slot: &str) -> Option<&BufferState> {
        self.buffers.get(slot)
    }

    pub fn texture(&self, slot: &str) -> Option<&RWTexture2D> {
        self.textures.get(slot)
    }

    pub fn buffers(&self) -> impl Iterator<Item = (&str, &BufferState)> {
        self.buffers.iter().map(|(slot, state)| (slot.as_str(), state))
    }

    pub fn buffers_mut(&mut self) -> impl Iterator<Item = (&str, &mut BufferState)> {
        self.buffers.iter_mut().map(|(slot, state)| (slot.as_str(), state))
    }

    pub fn textures(&self) -> impl Iterator<Item = (&str, &RWTexture2D)> {
        self.textures.iter().map(|(slot, texture)| (slot.as_str(), texture))
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty() && self.textures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HostBackend;
    use crate::runtime::RWStructuredBuffer;

    #[test]
    fn test_rebinding_keeps_device_buffer() {
        let mut backend = HostBackend::new(&["Main"]);
        let mut table = ResourceTable::default();
        assert!(table.is_empty());

        table.bind_buffer("data", Box::new(RWStructuredBuffer::<u32>::new(4)));
        let handle = table
            .buffers_mut()
            .next()
            .map(|(_, state)| state.materialize_to_device(&mut backend).unwrap())
            .unwrap();

        table.bind_buffer("data", Box::new(RWStructuredBuffer::<u32>::new(4)));
        let state = table.buffer("data").unwrap();
        assert!(state.is_dirty());
        assert_eq!(state.device_handle(), Some(handle));
        assert_eq!(table.buffers().count(), 1);
    }

    #[test]
    fn test_textures_replace_by_slot() {
        let mut table = ResourceTable::default();
        let first = RWTexture2D::new(2, 2);
        let second = RWTexture2D::new(4, 4);
        table.bind_texture("image", first);
        table.bind_texture("image", second.clone());
        assert!(table.texture("image").unwrap().ptr_eq(&second));
        assert!(table.texture("other").is_none());
    }
}
