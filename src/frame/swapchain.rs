//! Swapchain bring-up and (re)creation (§4.6).

use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::{KhrSurfaceExtension, KhrSwapchainExtension};

use crate::device::Device;
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::instance::Instance;
use crate::resource::{
    ComponentMapping, Extent3D, Image, ImageDesc, ImageSubresourceRange, ImageType, ImageView,
    ImageViewDesc,
};
use crate::types::{CompositeAlpha, Format, ImageAspects, ImageUsage, PresentMode, MAX_SWAPCHAIN_IMAGES};

#[derive(Clone, Copy, Debug)]
pub struct SwapchainDesc {
    pub preferred_extent: (u32, u32),
    pub preferred_buffering: u32,
    pub present_mode: PresentMode,
    pub composite_alpha: CompositeAlpha,
}

fn to_vk_present_mode(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

fn to_vk_composite_alpha(alpha: CompositeAlpha) -> vk::CompositeAlphaFlagsKHR {
    match alpha {
        CompositeAlpha::Opaque => vk::CompositeAlphaFlagsKHR::OPAQUE,
        CompositeAlpha::PreMultiplied => vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        CompositeAlpha::PostMultiplied => vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        CompositeAlpha::Inherit => vk::CompositeAlphaFlagsKHR::INHERIT,
    }
}

fn clamp_extent(preferred: (u32, u32), caps: &vk::SurfaceCapabilitiesKHR) -> (u32, u32) {
    if caps.current_extent.width != u32::MAX {
        (caps.current_extent.width, caps.current_extent.height)
    } else {
        (
            preferred.0.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            preferred.1.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        )
    }
}

fn clamp_buffering(preferred: u32, caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = preferred.max(caps.min_image_count);
    if caps.max_image_count != 0 {
        count = count.min(caps.max_image_count);
    }
    count.min(MAX_SWAPCHAIN_IMAGES as u32)
}

fn pick_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .find(|f| f.format == Format::B8g8r8a8Unorm.to_vk() && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .copied()
        .unwrap_or(formats[0])
}

fn pick_present_mode(available: &[vk::PresentModeKHR], preferred: PresentMode) -> vk::PresentModeKHR {
    let wanted = to_vk_present_mode(preferred);
    if available.contains(&wanted) {
        wanted
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// `{desc, is_valid, is_optimal, current_extent, image array, current_image_index, generation}`.
pub struct Swapchain {
    surface: vk::SurfaceKHR,
    desc: SwapchainDesc,
    vk_swapchain: vk::SwapchainKHR,
    format: Format,
    pub current_extent: (u32, u32),
    pub images: Vec<Handle<Image>>,
    pub image_views: Vec<Handle<ImageView>>,
    pub current_image_index: Option<u32>,
    pub is_valid: bool,
    pub is_optimal: bool,
    pub generation: u64,
}

impl Swapchain {
    pub fn create(instance: &Instance, device: &mut Device, surface: vk::SurfaceKHR, desc: SwapchainDesc) -> Result<Self> {
        let mut swapchain = Self {
            surface,
            desc,
            vk_swapchain: vk::SwapchainKHR::null(),
            format: Format::B8g8r8a8Unorm,
            current_extent: (0, 0),
            images: Vec::new(),
            image_views: Vec::new(),
            current_image_index: None,
            is_valid: false,
            is_optimal: true,
            generation: 0,
        };
        swapchain.recreate(instance, device)?;
        Ok(swapchain)
    }

    /// Invariant: renderable iff `is_valid` and the current extent is non-zero.
    pub fn is_renderable(&self) -> bool {
        self.is_valid && self.current_extent.0 > 0 && self.current_extent.1 > 0
    }

    pub fn vk_handle(&self) -> vk::SwapchainKHR {
        self.vk_swapchain
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Queries capabilities, clamps extent/buffering, creates a new swapchain
    /// passing the current one as `oldSwapchain`, and only then tears the old
    /// one down — unconditionally, even when creation failed (§4.6).
    pub fn recreate(&mut self, instance: &Instance, device: &mut Device) -> Result<()> {
        let old_swapchain = self.vk_swapchain;
        let old_images = std::mem::take(&mut self.images);
        let old_views = std::mem::take(&mut self.image_views);

        let caps = unsafe {
            instance
                .handle()
                .get_physical_device_surface_capabilities_khr(device.physical_device, self.surface)?
        };
        let formats = unsafe {
            instance
                .handle()
                .get_physical_device_surface_formats_khr(device.physical_device, self.surface)?
        };
        let present_modes = unsafe {
            instance
                .handle()
                .get_physical_device_surface_present_modes_khr(device.physical_device, self.surface)?
        };

        let extent = clamp_extent(self.desc.preferred_extent, &caps);
        let image_count = clamp_buffering(self.desc.preferred_buffering, &caps);
        let surface_format = pick_surface_format(&formats);
        let present_mode = pick_present_mode(&present_modes, self.desc.present_mode);

        let queue_indices = [device.queue_families.graphics, device.queue_families.present];
        let (sharing_mode, indices): (vk::SharingMode, &[u32]) = if device.queue_families.graphics == device.queue_families.present {
            (vk::SharingMode::EXCLUSIVE, &[])
        } else {
            (vk::SharingMode::CONCURRENT, &queue_indices)
        };

        let info = vk::SwapchainCreateInfoKHR::builder()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(vk::Extent2D { width: extent.0, height: extent.1 })
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(indices)
            .pre_transform(caps.current_transform)
            .composite_alpha(to_vk_composite_alpha(self.desc.composite_alpha))
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let create_result = unsafe { device.device.create_swapchain_khr(&info, None) };

        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { device.device.destroy_swapchain_khr(old_swapchain, None) };
        }
        for view in old_views {
            device.unref_image_view(view);
        }
        for image in old_images {
            device.unref_image(image);
        }

        let vk_swapchain = match create_result {
            Ok(sc) => sc,
            Err(err) => {
                self.vk_swapchain = vk::SwapchainKHR::null();
                self.is_valid = false;
                return Err(Error::from(err));
            }
        };

        let format = format_from_vk(surface_format.format);
        let vk_images = unsafe { device.device.get_swapchain_images_khr(vk_swapchain)? };

        let mut images = Vec::with_capacity(vk_images.len());
        let mut image_views = Vec::with_capacity(vk_images.len());
        for vk_image in vk_images {
            let desc = ImageDesc {
                image_type: ImageType::TwoD,
                format,
                usage: ImageUsage::COLOR_ATTACHMENT,
                aspects: ImageAspects::COLOR,
                extent: Extent3D { width: extent.0, height: extent.1, depth: 1 },
                mip_levels: 1,
                array_layers: 1,
                sample_count: vk::SampleCountFlags::_1,
                label: None,
            };
            let image = device.insert_swapchain_image(desc, vk_image);
            let view = device.create_image_view(ImageViewDesc {
                image,
                format,
                components: ComponentMapping::default(),
                subresource_range: ImageSubresourceRange {
                    aspects: ImageAspects::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                },
            })?;
            images.push(image);
            image_views.push(view);
        }

        self.vk_swapchain = vk_swapchain;
        self.format = format;
        self.current_extent = extent;
        self.images = images;
        self.image_views = image_views;
        self.current_image_index = None;
        self.is_valid = true;
        self.is_optimal = true;
        self.generation += 1;
        Ok(())
    }

    /// Returns `Ok(index)` and records `current_image_index`; a `SUBOPTIMAL_KHR`
    /// success marks `is_optimal=false` without failing acquisition.
    pub fn acquire_next_image(&mut self, device: &Device, timeout: u64, signal: vk::Semaphore) -> Result<u32> {
        let result = unsafe {
            device
                .device
                .acquire_next_image_khr(self.vk_swapchain, timeout, signal, vk::Fence::null())
        };
        match result {
            Ok((index, success)) => {
                if crate::error::is_suboptimal(success) {
                    self.is_optimal = false;
                }
                self.current_image_index = Some(index);
                Ok(index)
            }
            Err(vk::ErrorCode::OUT_OF_DATE_KHR) => {
                self.is_valid = false;
                Err(Error::OutOfDate)
            }
            Err(err) => Err(Error::from(err)),
        }
    }

    /// Presents `self.current_image_index`; `OUT_OF_DATE_KHR` invalidates the
    /// swapchain for the next `begin_frame` to recreate (§4.6).
    pub fn present(&mut self, device: &Device, wait: vk::Semaphore) -> Result<()> {
        let Some(index) = self.current_image_index else {
            return Err(Error::InvalidHandle);
        };
        let swapchains = [self.vk_swapchain];
        let indices = [index];
        let waits = [wait];
        let info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&waits)
            .swapchains(&swapchains)
            .image_indices(&indices);
        let result = unsafe { device.device.queue_present_khr(device.present_queue, &info) };
        match result {
            Ok(success) => {
                if crate::error::is_suboptimal(success) {
                    self.is_optimal = false;
                }
                Ok(())
            }
            Err(vk::ErrorCode::OUT_OF_DATE_KHR) => {
                self.is_valid = false;
                Err(Error::OutOfDate)
            }
            Err(err) => Err(Error::from(err)),
        }
    }

    pub fn destroy(mut self, device: &mut Device) {
        for view in std::mem::take(&mut self.image_views) {
            device.unref_image_view(view);
        }
        for image in std::mem::take(&mut self.images) {
            device.unref_image(image);
        }
        if self.vk_swapchain != vk::SwapchainKHR::null() {
            unsafe { device.device.destroy_swapchain_khr(self.vk_swapchain, None) };
        }
    }
}

fn format_from_vk(format: vk::Format) -> Format {
    match format {
        f if f == Format::B8g8r8a8Unorm.to_vk() => Format::B8g8r8a8Unorm,
        f if f == Format::R8g8b8a8Unorm.to_vk() => Format::R8g8b8a8Unorm,
        f if f == Format::R8g8b8a8Srgb.to_vk() => Format::R8g8b8a8Srgb,
        _ => Format::B8g8r8a8Unorm,
    }
}
