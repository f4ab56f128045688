//! Device memory allocation.
//!
//! One `vkAllocateMemory` call per resource, sized and typed by
//! `VkMemoryRequirements` — the same dedicated-allocation strategy the
//! teacher's buffer/image creation uses. The GAL's external-interfaces
//! contract (§6) only requires `create/destroy/map/flush/invalidate/bind`;
//! it does not require sub-allocation, so no pooling allocator is introduced.

use vulkanalia::prelude::v1_0::*;

use crate::error::{Error, Result};

pub struct Allocation {
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
    pub mapped: Option<*mut std::ffi::c_void>,
}

// SAFETY: the mapped pointer is only ever dereferenced by the thread that
// owns the `Device` — the GAL is explicitly single-threaded (§5).
unsafe impl Send for Allocation {}

pub struct Allocator {
    memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl Allocator {
    pub fn new(instance: &Instance, physical_device: vk::PhysicalDevice) -> Self {
        Self {
            memory_properties: unsafe {
                instance.get_physical_device_memory_properties(physical_device)
            },
        }
    }

    fn memory_type_index(
        &self,
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<u32> {
        (0..self.memory_properties.memory_type_count)
            .find(|i| {
                let suitable = (type_bits & (1 << i)) != 0;
                let candidate = self.memory_properties.memory_types[*i as usize];
                suitable && candidate.property_flags.contains(properties)
            })
            .ok_or(Error::FeatureNotPresent)
    }

    /// Allocates and binds memory for `buffer`, mapping it immediately if
    /// `properties` includes any host-visibility flag (buffer invariant,
    /// data model §3: mapped once, never remapped until destruction).
    pub fn allocate_for_buffer(
        &self,
        device: &Device,
        buffer: vk::Buffer,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<Allocation> {
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type_index =
            self.memory_type_index(requirements.memory_type_bits, properties)?;

        let info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        let memory = unsafe { device.allocate_memory(&info, None)? };
        unsafe { device.bind_buffer_memory(buffer, memory, 0)? };

        let mapped = if properties.intersects(
            vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT
                | vk::MemoryPropertyFlags::HOST_CACHED,
        ) {
            Some(unsafe {
                device.map_memory(memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())?
            })
        } else {
            None
        };

        Ok(Allocation {
            memory,
            size: requirements.size,
            mapped,
        })
    }

    pub fn allocate_for_image(
        &self,
        device: &Device,
        image: vk::Image,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<Allocation> {
        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory_type_index =
            self.memory_type_index(requirements.memory_type_bits, properties)?;

        let info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        let memory = unsafe { device.allocate_memory(&info, None)? };
        unsafe { device.bind_image_memory(image, memory, 0)? };

        Ok(Allocation {
            memory,
            size: requirements.size,
            mapped: None,
        })
    }

    /// Flushes host writes so they become visible to the device. A no-op on
    /// host-coherent memory, but always issued — the caller may not know
    /// whether the allocation was coherent (S1).
    pub fn flush(
        &self,
        device: &Device,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> Result<()> {
        let range = vk::MappedMemoryRange::builder()
            .memory(memory)
            .offset(offset)
            .size(size);
        unsafe { device.flush_mapped_memory_ranges(&[range])? };
        Ok(())
    }

    pub fn invalidate(
        &self,
        device: &Device,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> Result<()> {
        let range = vk::MappedMemoryRange::builder()
            .memory(memory)
            .offset(offset)
            .size(size);
        unsafe { device.invalidate_mapped_memory_ranges(&[range])? };
        Ok(())
    }

    pub fn free(&self, device: &Device, allocation: &Allocation) {
        unsafe { device.free_memory(allocation.memory, None) };
    }
}
