//! Framebuffer records (§4.2).

use vulkanalia::prelude::v1_0::*;

use crate::error::{Error, Result};
use crate::handle::Handle;

use super::image::ImageView;
use super::render_pass::{RenderPass, RenderPassDesc};

#[derive(Clone, Debug)]
pub struct FramebufferDesc {
    pub render_pass: Handle<RenderPass>,
    pub attachments: Vec<Handle<ImageView>>,
    pub compatible_render_pass: RenderPassDesc,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub label: Option<String>,
}

pub struct Framebuffer {
    pub desc: FramebufferDesc,
    pub(crate) vk_framebuffer: vk::Framebuffer,
}

impl FramebufferDesc {
    /// Checked on every `begin_render_pass` and on framebuffer creation.
    pub fn check_compatible(&self, render_pass: &RenderPassDesc) -> Result<()> {
        if self.compatible_render_pass.is_compatible_with(render_pass) {
            Ok(())
        } else {
            Err(Error::FormatNotSupported)
        }
    }

    pub fn render_area_fits(&self, offset: (i32, i32), extent: (u32, u32)) -> bool {
        offset.0 >= 0
            && offset.1 >= 0
            && (offset.0 as u32) + extent.0 <= self.width
            && (offset.1 as u32) + extent.1 <= self.height
    }
}
