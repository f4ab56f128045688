//! Driver discovery and `VkInstance` bring-up.

use std::ffi::CStr;

use log::*;
use vulkanalia::loader::{LibloadingLoader, LIBRARY};
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::{ExtDebugUtilsExtension, KhrSurfaceExtension};
use vulkanalia::Version;

use crate::error::{Error, Result};

pub const VALIDATION_LAYER: vk::ExtensionName =
    vk::ExtensionName::from_bytes(b"VK_LAYER_KHRONOS_validation");
pub const PORTABILITY_MACOS_VERSION: Version = Version::new(1, 3, 216);

/// Owns the loaded Vulkan entry point, the instance and (optionally) the
/// debug messenger. Surfaces are supplied by the caller (§6 surface contract)
/// and are never created or destroyed here.
pub struct Instance {
    entry: Entry,
    pub(crate) instance: vulkanalia::Instance,
    messenger: Option<vk::DebugUtilsMessengerEXT>,
    pub(crate) validation_enabled: bool,
}

pub struct InstanceConfig {
    pub application_name: &'static CStr,
    pub validation_enabled: bool,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            application_name: c"vk-gal",
            validation_enabled: cfg!(debug_assertions),
        }
    }
}

impl Instance {
    pub fn create(config: InstanceConfig) -> Result<Self> {
        let loader = unsafe { LibloadingLoader::new(LIBRARY) }
            .map_err(|_| Error::InitializationFailed)?;
        let entry =
            unsafe { Entry::new(loader) }.map_err(|_| Error::InitializationFailed)?;

        let available_layers = unsafe { entry.enumerate_instance_layer_properties()? }
            .iter()
            .map(|l| l.layer_name)
            .collect::<std::collections::HashSet<_>>();

        let validation_enabled =
            config.validation_enabled && available_layers.contains(&VALIDATION_LAYER);
        if config.validation_enabled && !validation_enabled {
            warn!("Validation layer requested but not available; continuing without it.");
        }

        let application_info = vk::ApplicationInfo::builder()
            .application_name(config.application_name.to_bytes())
            .application_version(vk::make_version(1, 0, 0))
            .engine_name(b"vk-gal\0")
            .engine_version(vk::make_version(1, 0, 0))
            .api_version(vk::make_version(1, 3, 0));

        let layers = if validation_enabled {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let mut extensions = vec![vk::KHR_SURFACE_EXTENSION.name.as_ptr()];
        if validation_enabled {
            extensions.push(vk::EXT_DEBUG_UTILS_EXTENSION.name.as_ptr());
        }

        let mut info = vk::InstanceCreateInfo::builder()
            .application_info(&application_info)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions);

        let mut debug_info = debug_messenger_info();
        if validation_enabled {
            info = info.push_next(&mut debug_info);
        }

        let instance = unsafe { entry.create_instance(&info, None)? };

        let messenger = if validation_enabled {
            Some(unsafe { instance.create_debug_utils_messenger_ext(&debug_info, None)? })
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            messenger,
            validation_enabled,
        })
    }

    pub fn handle(&self) -> &vulkanalia::Instance {
        &self.instance
    }

    /// macOS SDKs since 1.3.216 require `VK_KHR_portability_subset` to be
    /// enabled explicitly on the device when it is advertised.
    pub fn needs_portability_subset(&self) -> bool {
        cfg!(target_os = "macos")
            && self
                .entry
                .version()
                .map(|v| v >= PORTABILITY_MACOS_VERSION)
                .unwrap_or(false)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some(messenger) = self.messenger.take() {
                self.instance.destroy_debug_utils_messenger_ext(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn debug_messenger_info() -> vk::DebugUtilsMessengerCreateInfoEXT {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .user_callback(Some(debug_callback))
        .build()
}

extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    type_: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = unsafe { CStr::from_ptr((*data).message) }.to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!("({:?}) {}", type_, message);
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!("({:?}) {}", type_, message);
    } else {
        debug!("({:?}) {}", type_, message);
    }
    vk::FALSE
}
