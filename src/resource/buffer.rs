//! Buffer and buffer-view records (§3, §4.2).

use vulkanalia::prelude::v1_0::*;

use crate::device::allocator::Allocation;
use crate::handle::Handle;
use crate::types::{BufferUsage, Format, MemoryProperties};

use super::sync::BufferState;

#[derive(Clone, Debug)]
pub struct BufferDesc {
    pub size: vk::DeviceSize,
    pub usage: BufferUsage,
    pub memory_properties: MemoryProperties,
    pub label: Option<String>,
}

pub struct Buffer {
    pub desc: BufferDesc,
    pub(crate) vk_buffer: vk::Buffer,
    pub(crate) allocation: Allocation,
    pub state: BufferState,
}

impl Buffer {
    /// Host-mapped pointer, valid for `[0, desc.size)` until destruction
    /// (data-model invariant) — `None` for device-local-only buffers.
    pub fn host_map(&self) -> Option<*mut std::ffi::c_void> {
        self.allocation.mapped
    }
}

#[derive(Clone, Debug)]
pub struct BufferViewDesc {
    pub buffer: Handle<Buffer>,
    pub format: Format,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
}

pub struct BufferView {
    pub desc: BufferViewDesc,
    pub(crate) vk_view: vk::BufferView,
}
