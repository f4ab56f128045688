//! Image and image-view records (§3, §4.2).

use vulkanalia::prelude::v1_0::*;

use crate::device::allocator::Allocation;
use crate::handle::Handle;
use crate::types::{Format, ImageAspects, ImageUsage};

use super::sync::ImageState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageType {
    OneD,
    TwoD,
    ThreeD,
}

#[derive(Clone, Copy, Debug)]
pub struct Extent3D {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent3D {
    pub fn visible(&self) -> bool {
        self.width > 0 && self.height > 0 && self.depth > 0
    }
}

#[derive(Clone, Debug)]
pub struct ImageDesc {
    pub image_type: ImageType,
    pub format: Format,
    pub usage: ImageUsage,
    pub aspects: ImageAspects,
    pub extent: Extent3D,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub sample_count: vk::SampleCountFlags,
    pub label: Option<String>,
}

pub struct Image {
    pub desc: ImageDesc,
    pub(crate) vk_image: vk::Image,
    /// `None` for swapchain-owned images (no underlying allocation, §4.6).
    pub(crate) allocation: Option<Allocation>,
    pub is_swapchain_owned: bool,
    pub state: ImageState,
}

#[derive(Clone, Copy, Debug)]
pub struct ComponentMapping {
    pub r: vk::ComponentSwizzle,
    pub g: vk::ComponentSwizzle,
    pub b: vk::ComponentSwizzle,
    pub a: vk::ComponentSwizzle,
}

impl Default for ComponentMapping {
    fn default() -> Self {
        Self {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ImageSubresourceRange {
    pub aspects: ImageAspects,
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

#[derive(Clone, Debug)]
pub struct ImageViewDesc {
    pub image: Handle<Image>,
    pub format: Format,
    pub components: ComponentMapping,
    pub subresource_range: ImageSubresourceRange,
}

pub struct ImageView {
    pub desc: ImageViewDesc,
    pub(crate) vk_view: vk::ImageView,
}
