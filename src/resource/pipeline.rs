//! Pipeline cache, compute and graphics pipeline records (§4.5).

use vulkanalia::prelude::v1_0::*;

use crate::handle::Handle;
use crate::types::{
    BlendFactor, BlendOp, ColorComponents, CompareOp, CullMode, FrontFace, PolygonMode,
    PrimitiveTopology, StencilOp, MAX_PIPELINE_DESCRIPTOR_SETS, MAX_PUSH_CONSTANT_SIZE,
};

use super::descriptor_layout::DescriptorSetLayout;
use super::shader::Shader;

pub struct PipelineCache {
    pub(crate) vk_cache: vk::PipelineCache,
}

#[derive(Clone, Debug)]
pub struct PipelineLayoutDesc {
    pub descriptor_set_layouts: Vec<Handle<DescriptorSetLayout>>,
    pub push_constant_size: u32,
}

impl PipelineLayoutDesc {
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        if self.descriptor_set_layouts.len() > MAX_PIPELINE_DESCRIPTOR_SETS {
            return Err(crate::error::Error::FeatureNotPresent);
        }
        if self.push_constant_size as usize > MAX_PUSH_CONSTANT_SIZE {
            return Err(crate::error::Error::FeatureNotPresent);
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct ComputePipelineDesc {
    pub shader: Handle<Shader>,
    pub entry_point: String,
    pub layout: PipelineLayoutDesc,
    pub label: Option<String>,
}

pub struct ComputePipeline {
    pub desc: ComputePipelineDesc,
    pub(crate) vk_pipeline: vk::Pipeline,
    pub(crate) vk_layout: vk::PipelineLayout,
}

#[derive(Clone, Copy, Debug)]
pub struct VertexAttributeDesc {
    pub location: u32,
    pub binding: u32,
    pub format: crate::types::Format,
    pub offset: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct VertexBindingDesc {
    pub binding: u32,
    pub stride: u32,
    pub per_instance: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct RasterizationStateDesc {
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub polygon_mode: PolygonMode,
    pub depth_clamp_enable: bool,
    pub depth_bias_enable: bool,
    pub depth_bias_constant_factor: f32,
    pub depth_bias_slope_factor: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct StencilOpState {
    pub fail_op: StencilOp,
    pub pass_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub compare_op: CompareOp,
}

#[derive(Clone, Copy, Debug)]
pub struct DepthStencilStateDesc {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: CompareOp,
    pub depth_bounds_test_enable: bool,
    pub min_depth_bounds: f32,
    pub max_depth_bounds: f32,
    pub stencil_test_enable: bool,
    pub front: StencilOpState,
    pub back: StencilOpState,
}

#[derive(Clone, Copy, Debug)]
pub struct ColorBlendAttachmentDesc {
    pub blend_enable: bool,
    pub src_color_factor: BlendFactor,
    pub dst_color_factor: BlendFactor,
    pub color_blend_op: BlendOp,
    pub src_alpha_factor: BlendFactor,
    pub dst_alpha_factor: BlendFactor,
    pub alpha_blend_op: BlendOp,
    pub color_write_mask: ColorComponents,
}

#[derive(Clone, Debug)]
pub struct GraphicsPipelineDesc {
    pub vertex_shader: Handle<Shader>,
    pub fragment_shader: Option<Handle<Shader>>,
    pub layout: PipelineLayoutDesc,
    pub vertex_bindings: Vec<VertexBindingDesc>,
    pub vertex_attributes: Vec<VertexAttributeDesc>,
    pub topology: PrimitiveTopology,
    pub rasterization: RasterizationStateDesc,
    pub depth_stencil: DepthStencilStateDesc,
    pub color_blend_attachments: Vec<ColorBlendAttachmentDesc>,
    pub blend_constants: [f32; 4],
    pub label: Option<String>,
}

pub struct GraphicsPipeline {
    pub desc: GraphicsPipelineDesc,
    pub(crate) render_pass: Handle<super::render_pass::RenderPass>,
    pub(crate) vk_pipeline: vk::Pipeline,
    pub(crate) vk_layout: vk::PipelineLayout,
}

/// Fixed dynamic-state set baked into every graphics pipeline (§4.5).
pub const DYNAMIC_STATES: &[vk::DynamicState] = &[
    vk::DynamicState::VIEWPORT,
    vk::DynamicState::SCISSOR,
    vk::DynamicState::BLEND_CONSTANTS,
    vk::DynamicState::STENCIL_COMPARE_MASK,
    vk::DynamicState::STENCIL_REFERENCE,
    vk::DynamicState::STENCIL_WRITE_MASK,
];
