//! Resource factory (§4.2): the `Device::create_*`/`ref_*`/`unref_*` family.

pub mod buffer;
pub mod descriptor_layout;
pub mod fence;
pub mod framebuffer;
pub mod image;
pub mod pipeline;
pub mod render_pass;
pub mod sampler;
pub mod shader;
pub mod sync;

pub use buffer::{Buffer, BufferDesc, BufferView, BufferViewDesc};
pub use descriptor_layout::{DescriptorBindingDesc, DescriptorSetLayout, DescriptorSetLayoutDesc};
pub use fence::{Fence, FenceDesc};
pub use framebuffer::{Framebuffer, FramebufferDesc};
pub use image::{ComponentMapping, Extent3D, Image, ImageDesc, ImageSubresourceRange, ImageType, ImageView, ImageViewDesc};
pub use pipeline::{ComputePipeline, ComputePipelineDesc, GraphicsPipeline, GraphicsPipelineDesc, PipelineCache};
pub use render_pass::{AttachmentDesc, RenderPass, RenderPassDesc};
pub use sampler::{Sampler, SamplerDesc};
pub use shader::{Shader, ShaderDesc};
pub use sync::{AccessSequence, BufferAccess, BufferBarrier, BufferState, ImageAccess, ImageBarrier, ImageState};
