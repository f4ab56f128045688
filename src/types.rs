//! Stable, process-wide ABI types: bitflag usage masks and the constant table.
//!
//! Numeric values match `vulkanalia::vk` one-for-one so conversion is a
//! free `as` cast, per the external-interfaces contract.

use bitflags::bitflags;
use vulkanalia::vk;

pub const MAX_COLOR_ATTACHMENTS: usize = 8;
pub const MAX_INPUT_ATTACHMENTS: usize = 8;
pub const MAX_VERTEX_ATTRIBUTES: usize = 16;
pub const MAX_PIPELINE_DESCRIPTOR_SETS: usize = 8;
pub const MAX_PUSH_CONSTANT_SIZE: usize = 128;
pub const MAX_FRAME_BUFFERING: usize = 4;
pub const MAX_SWAPCHAIN_IMAGES: usize = 8;
pub const MAX_COMPUTE_GROUP_COUNT_X: u32 = 65535;
pub const MAX_COMPUTE_GROUP_COUNT_Y: u32 = 65535;
pub const MAX_COMPUTE_GROUP_COUNT_Z: u32 = 65535;
pub const WHOLE_SIZE: u64 = u64::MAX;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC = 0x1;
        const TRANSFER_DST = 0x2;
        const UNIFORM_TEXEL_BUFFER = 0x4;
        const STORAGE_TEXEL_BUFFER = 0x8;
        const UNIFORM_BUFFER = 0x10;
        const STORAGE_BUFFER = 0x20;
        const INDEX_BUFFER = 0x40;
        const VERTEX_BUFFER = 0x80;
        const INDIRECT_BUFFER = 0x100;
    }
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
    pub struct ImageUsage: u32 {
        const TRANSFER_SRC = 0x1;
        const TRANSFER_DST = 0x2;
        const SAMPLED = 0x4;
        const STORAGE = 0x8;
        const COLOR_ATTACHMENT = 0x10;
        const DEPTH_STENCIL_ATTACHMENT = 0x20;
        const INPUT_ATTACHMENT = 0x80;
    }
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
    pub struct ImageAspects: u32 {
        const COLOR = 0x1;
        const DEPTH = 0x2;
        const STENCIL = 0x4;
    }
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
    pub struct MemoryProperties: u32 {
        const DEVICE_LOCAL = 0x1;
        const HOST_VISIBLE = 0x2;
        const HOST_COHERENT = 0x4;
        const HOST_CACHED = 0x8;
    }
}

impl MemoryProperties {
    pub fn needs_host_map(self) -> bool {
        self.intersects(
            MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT | MemoryProperties::HOST_CACHED,
        )
    }
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
    pub struct ColorComponents: u32 {
        const R = 0x1;
        const G = 0x2;
        const B = 0x4;
        const A = 0x8;
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
#[repr(u32)]
pub enum Format {
    Undefined = vk::Format::UNDEFINED.0 as u32,
    R8Unorm = vk::Format::R8_UNORM.0 as u32,
    R8g8b8a8Unorm = vk::Format::R8G8B8A8_UNORM.0 as u32,
    B8g8r8a8Unorm = vk::Format::B8G8R8A8_UNORM.0 as u32,
    R8g8b8a8Srgb = vk::Format::R8G8B8A8_SRGB.0 as u32,
    D32Sfloat = vk::Format::D32_SFLOAT.0 as u32,
    D24UnormS8Uint = vk::Format::D24_UNORM_S8_UINT.0 as u32,
}

impl Format {
    pub fn to_vk(self) -> vk::Format {
        vk::Format(self as i32)
    }

    pub fn has_depth(self) -> bool {
        matches!(self, Format::D32Sfloat | Format::D24UnormS8Uint)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum SamplerAddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementAndClamp,
    DecrementAndClamp,
    Invert,
    IncrementAndWrap,
    DecrementAndWrap,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
    FrontAndBack,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum PolygonMode {
    Fill,
    Line,
    Point,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum IndexType {
    U16,
    U32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum DescriptorType {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformTexelBuffer,
    StorageTexelBuffer,
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    StorageBufferDynamic,
    InputAttachment,
}

impl DescriptorType {
    /// The `ImageUsage`/`BufferUsage` flag a resource must carry to be bound
    /// through this descriptor type.
    pub fn required_image_usage(self) -> Option<ImageUsage> {
        match self {
            DescriptorType::CombinedImageSampler | DescriptorType::SampledImage => {
                Some(ImageUsage::SAMPLED)
            }
            DescriptorType::StorageImage => Some(ImageUsage::STORAGE),
            DescriptorType::InputAttachment => Some(ImageUsage::INPUT_ATTACHMENT),
            _ => None,
        }
    }

    pub fn required_buffer_usage(self) -> Option<BufferUsage> {
        match self {
            DescriptorType::UniformTexelBuffer => Some(BufferUsage::UNIFORM_TEXEL_BUFFER),
            DescriptorType::StorageTexelBuffer => Some(BufferUsage::STORAGE_TEXEL_BUFFER),
            DescriptorType::UniformBuffer | DescriptorType::UniformBufferDynamic => {
                Some(BufferUsage::UNIFORM_BUFFER)
            }
            DescriptorType::StorageBuffer | DescriptorType::StorageBufferDynamic => {
                Some(BufferUsage::STORAGE_BUFFER)
            }
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum StoreOp {
    Store,
    DontCare,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum BorderColor {
    FloatTransparentBlack,
    IntTransparentBlack,
    FloatOpaqueBlack,
    IntOpaqueBlack,
    FloatOpaqueWhite,
    IntOpaqueWhite,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum ComponentSwizzle {
    Identity,
    Zero,
    One,
    R,
    G,
    B,
    A,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum PresentMode {
    Immediate,
    Mailbox,
    Fifo,
    FifoRelaxed,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum CompositeAlpha {
    Opaque,
    PreMultiplied,
    PostMultiplied,
    Inherit,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum ColorSpace {
    SrgbNonlinear,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum SampleCount {
    S1 = 1,
    S2 = 2,
    S4 = 4,
    S8 = 8,
    S16 = 16,
    S32 = 32,
    S64 = 64,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum DeviceType {
    Discrete,
    Virtual,
    Integrated,
    Cpu,
    Other,
}

impl DeviceType {
    pub(crate) fn from_vk(ty: vk::PhysicalDeviceType) -> Self {
        match ty {
            vk::PhysicalDeviceType::DISCRETE_GPU => DeviceType::Discrete,
            vk::PhysicalDeviceType::VIRTUAL_GPU => DeviceType::Virtual,
            vk::PhysicalDeviceType::INTEGRATED_GPU => DeviceType::Integrated,
            vk::PhysicalDeviceType::CPU => DeviceType::Cpu,
            _ => DeviceType::Other,
        }
    }
}
