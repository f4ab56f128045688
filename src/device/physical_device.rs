//! Physical-device enumeration and preference-ordered selection (§4.1).

use std::collections::HashSet;

use log::*;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::KhrSurfaceExtension;

use crate::error::{Error, Result};
use crate::types::DeviceType;

use super::queue::QueueFamilyIndices;

pub const REQUIRED_DEVICE_EXTENSIONS: &[vk::ExtensionName] =
    &[vk::KHR_SWAPCHAIN_EXTENSION.name];
pub const OPTIONAL_DEVICE_EXTENSIONS: &[vk::ExtensionName] =
    &[vk::EXT_DEBUG_UTILS_EXTENSION.name];

/// Caller-supplied ordering of acceptable device types; the first type with
/// at least one suitable device wins.
#[derive(Clone, Debug)]
pub struct DevicePreference(pub Vec<DeviceType>);

impl Default for DevicePreference {
    fn default() -> Self {
        Self(vec![
            DeviceType::Discrete,
            DeviceType::Virtual,
            DeviceType::Integrated,
            DeviceType::Cpu,
            DeviceType::Other,
        ])
    }
}

pub struct SelectedDevice {
    pub physical_device: vk::PhysicalDevice,
    pub queue_families: QueueFamilyIndices,
    pub device_type: DeviceType,
    pub supports_debug_utils: bool,
}

pub fn pick_physical_device(
    instance: &Instance,
    surface: vk::SurfaceKHR,
    preference: &DevicePreference,
) -> Result<SelectedDevice> {
    let candidates: Vec<_> = unsafe { instance.enumerate_physical_devices()? }
        .into_iter()
        .filter_map(|physical_device| {
            let properties = unsafe { instance.get_physical_device_properties(physical_device) };
            match check_physical_device(instance, physical_device, surface) {
                Ok(queue_families) => Some((
                    physical_device,
                    DeviceType::from_vk(properties.device_type),
                    queue_families,
                )),
                Err(error) => {
                    warn!(
                        "Skipping physical device ('{}'): {}",
                        properties.device_name, error
                    );
                    None
                }
            }
        })
        .collect();

    for wanted in &preference.0 {
        if let Some((physical_device, device_type, queue_families)) =
            candidates.iter().find(|(_, ty, _)| ty == wanted)
        {
            let supports_debug_utils =
                unsafe { check_extension_supported(instance, *physical_device, &vk::EXT_DEBUG_UTILS_EXTENSION.name) };
            info!("Selected physical device of type {:?}.", device_type);
            return Ok(SelectedDevice {
                physical_device: *physical_device,
                queue_families: *queue_families,
                device_type: *device_type,
                supports_debug_utils,
            });
        }
    }

    Err(Error::FeatureNotPresent)
}

fn check_physical_device(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<QueueFamilyIndices> {
    let queue_families = QueueFamilyIndices::get(instance, physical_device, surface)?;

    let formats = unsafe {
        instance.get_physical_device_surface_formats_khr(physical_device, surface)?
    };
    let present_modes = unsafe {
        instance.get_physical_device_surface_present_modes_khr(physical_device, surface)?
    };
    if formats.is_empty() || present_modes.is_empty() {
        return Err(Error::FeatureNotPresent);
    }

    let extensions = unsafe {
        instance
            .enumerate_device_extension_properties(physical_device, None)?
            .iter()
            .map(|e| e.extension_name)
            .collect::<HashSet<_>>()
    };
    if !REQUIRED_DEVICE_EXTENSIONS.iter().all(|e| extensions.contains(e)) {
        return Err(Error::ExtensionNotPresent);
    }

    Ok(queue_families)
}

unsafe fn check_extension_supported(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    name: &vk::ExtensionName,
) -> bool {
    instance
        .enumerate_device_extension_properties(physical_device, None)
        .map(|extensions| extensions.iter().any(|e| &e.extension_name == name))
        .unwrap_or(false)
}
