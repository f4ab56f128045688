//! Queue family selection: exactly one graphics+present queue (§4.1).

use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::KhrSurfaceExtension;

use crate::error::{Error, Result};

#[derive(Copy, Clone, Debug)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Finds a single family supporting both graphics and present against
    /// `surface`, falling back to two distinct families if no family
    /// supports both — either way the GAL exposes one queue of each kind.
    pub fn get(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self> {
        let properties =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

        let mut graphics = None;
        let mut present = None;

        for (index, family) in properties.iter().enumerate() {
            let index = index as u32;
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics.is_none() {
                graphics = Some(index);
            }
            let supports_present = unsafe {
                instance.get_physical_device_surface_support_khr(physical_device, index, surface)
            }
            .map_err(Error::from)?;
            if supports_present && present.is_none() {
                present = Some(index);
            }
        }

        match (graphics, present) {
            (Some(graphics), Some(present)) => Ok(Self { graphics, present }),
            _ => Err(Error::FeatureNotPresent),
        }
    }
}
