//! Render pass records and render-pass/framebuffer compatibility (§4.2, S6).

use vulkanalia::prelude::v1_0::*;

use crate::types::{Format, LoadOp, StoreOp, MAX_COLOR_ATTACHMENTS};

#[derive(Clone, Copy, Debug)]
pub struct AttachmentDesc {
    pub format: Format,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub sample_count: vk::SampleCountFlags,
}

#[derive(Clone, Debug)]
pub struct RenderPassDesc {
    pub color_attachments: Vec<AttachmentDesc>,
    pub depth_stencil_attachment: Option<AttachmentDesc>,
    pub input_attachments: Vec<AttachmentDesc>,
    pub label: Option<String>,
}

impl RenderPassDesc {
    /// §4.2: color-attachment counts + per-index formats + depth-stencil
    /// presence and format must match exactly.
    pub fn is_compatible_with(&self, other: &RenderPassDesc) -> bool {
        if self.color_attachments.len() != other.color_attachments.len() {
            return false;
        }
        if !self
            .color_attachments
            .iter()
            .zip(&other.color_attachments)
            .all(|(a, b)| a.format == b.format)
        {
            return false;
        }
        match (&self.depth_stencil_attachment, &other.depth_stencil_attachment) {
            (None, None) => true,
            (Some(a), Some(b)) => a.format == b.format,
            _ => false,
        }
    }
}

pub struct RenderPass {
    pub desc: RenderPassDesc,
    pub(crate) vk_render_pass: vk::RenderPass,
}

impl RenderPassDesc {
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        if self.color_attachments.len() > MAX_COLOR_ATTACHMENTS {
            return Err(crate::error::Error::FeatureNotPresent);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(format: Format) -> AttachmentDesc {
        AttachmentDesc {
            format,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            stencil_load_op: LoadOp::DontCare,
            stencil_store_op: StoreOp::DontCare,
            sample_count: vk::SampleCountFlags::_1,
        }
    }

    #[test]
    fn compatible_when_formats_and_depth_presence_match() {
        let a = RenderPassDesc {
            color_attachments: vec![
                attachment(Format::B8g8r8a8Unorm),
                attachment(Format::R8g8b8a8Unorm),
            ],
            depth_stencil_attachment: None,
            input_attachments: vec![],
            label: None,
        };
        let b = a.clone();
        assert!(a.is_compatible_with(&b));
    }

    #[test]
    fn incompatible_when_formats_swapped() {
        let a = RenderPassDesc {
            color_attachments: vec![
                attachment(Format::B8g8r8a8Unorm),
                attachment(Format::R8g8b8a8Unorm),
            ],
            depth_stencil_attachment: None,
            input_attachments: vec![],
            label: None,
        };
        let b = RenderPassDesc {
            color_attachments: vec![
                attachment(Format::R8g8b8a8Unorm),
                attachment(Format::B8g8r8a8Unorm),
            ],
            depth_stencil_attachment: None,
            input_attachments: vec![],
            label: None,
        };
        assert!(!a.is_compatible_with(&b));
    }

    #[test]
    fn incompatible_when_depth_presence_differs() {
        let a = RenderPassDesc {
            color_attachments: vec![attachment(Format::B8g8r8a8Unorm)],
            depth_stencil_attachment: None,
            input_attachments: vec![],
            label: None,
        };
        let b = RenderPassDesc {
            color_attachments: vec![attachment(Format::B8g8r8a8Unorm)],
            depth_stencil_attachment: Some(attachment(Format::D32Sfloat)),
            input_attachments: vec![],
            label: None,
        };
        assert!(!a.is_compatible_with(&b));
    }
}
