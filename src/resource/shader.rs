//! Shader module records. SPIR-V bytecode is the only accepted binary format
//! (§6); compiling GLSL/HLSL to SPIR-V is out of scope.

use vulkanalia::prelude::v1_0::*;

pub struct ShaderDesc {
    pub label: Option<String>,
}

pub struct Shader {
    pub desc: ShaderDesc,
    pub(crate) vk_module: vk::ShaderModule,
}
