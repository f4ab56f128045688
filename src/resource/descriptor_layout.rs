//! Descriptor set layout records (§3).

use vulkanalia::prelude::v1_0::*;

use crate::types::DescriptorType;

#[derive(Clone, Copy, Debug)]
pub struct DescriptorBindingDesc {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub count: u32,
    pub variable_length: bool,
    pub stages: vk::ShaderStageFlags,
}

#[derive(Clone, Debug, Default)]
pub struct DescriptorSetLayoutDesc {
    pub bindings: Vec<DescriptorBindingDesc>,
    pub label: Option<String>,
}

impl DescriptorSetLayoutDesc {
    /// Size, in elements, of the CPU binding shadow for one group's worth of
    /// this layout (summed across all bindings).
    pub fn shadow_len(&self) -> usize {
        self.bindings.iter().map(|b| b.count as usize).sum()
    }

    /// Precomputes the (set-local) element offset of each binding into the
    /// shadow buffer, in declaration order.
    pub fn binding_offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.bindings.len());
        let mut cursor = 0usize;
        for binding in &self.bindings {
            offsets.push(cursor);
            cursor += binding.count as usize;
        }
        offsets
    }
}

pub struct DescriptorSetLayout {
    pub desc: DescriptorSetLayoutDesc,
    pub(crate) vk_layout: vk::DescriptorSetLayout,
}
