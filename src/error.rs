//! Error taxonomy surfaced by the GAL.

use thiserror::Error;
use vulkanalia::vk;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("out of host memory")]
    OutOfHostMemory,
    #[error("out of device memory")]
    OutOfDeviceMemory,
    #[error("device lost")]
    DeviceLost,
    #[error("surface lost")]
    SurfaceLost,
    #[error("swapchain out of date")]
    OutOfDate,
    #[error("swapchain suboptimal")]
    SuboptimalSwapchain,
    #[error("initialization failed")]
    InitializationFailed,
    #[error("layer not present")]
    LayerNotPresent,
    #[error("extension not present")]
    ExtensionNotPresent,
    #[error("feature not present")]
    FeatureNotPresent,
    #[error("format not supported")]
    FormatNotSupported,
    #[error("descriptor pool fragmented")]
    FragmentedPool,
    #[error("descriptor pool out of memory")]
    OutOfPoolMemory,
    #[error("unknown backend error: {0:?}")]
    Unknown(vk::ErrorCode),
    #[error("stale or out-of-range handle")]
    InvalidHandle,
    #[error("command recorded in the wrong render-pass state")]
    InvalidOperation,
}

impl From<vk::ErrorCode> for Error {
    fn from(code: vk::ErrorCode) -> Self {
        match code {
            vk::ErrorCode::OUT_OF_HOST_MEMORY => Error::OutOfHostMemory,
            vk::ErrorCode::OUT_OF_DEVICE_MEMORY => Error::OutOfDeviceMemory,
            vk::ErrorCode::DEVICE_LOST => Error::DeviceLost,
            vk::ErrorCode::SURFACE_LOST_KHR => Error::SurfaceLost,
            vk::ErrorCode::OUT_OF_DATE_KHR => Error::OutOfDate,
            vk::ErrorCode::INITIALIZATION_FAILED => Error::InitializationFailed,
            vk::ErrorCode::LAYER_NOT_PRESENT => Error::LayerNotPresent,
            vk::ErrorCode::EXTENSION_NOT_PRESENT => Error::ExtensionNotPresent,
            vk::ErrorCode::FEATURE_NOT_PRESENT => Error::FeatureNotPresent,
            vk::ErrorCode::FORMAT_NOT_SUPPORTED => Error::FormatNotSupported,
            vk::ErrorCode::FRAGMENTED_POOL => Error::FragmentedPool,
            vk::ErrorCode::OUT_OF_POOL_MEMORY => Error::OutOfPoolMemory,
            other => Error::Unknown(other),
        }
    }
}

/// `VK_SUBOPTIMAL_KHR` is a success code in Vulkan, never routed through
/// `vk::ErrorCode`; callers of `acquire_next_image_khr`/`queue_present_khr`
/// check the returned [`vk::SuccessCode`] separately (see `frame/swapchain.rs`).
pub(crate) fn is_suboptimal(code: vk::SuccessCode) -> bool {
    code == vk::SuccessCode::SUBOPTIMAL_KHR
}
