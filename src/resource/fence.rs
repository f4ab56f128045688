//! Fence records (§3). Submit-fences owned by the frame context (§4.6) are
//! created directly against `vulkanalia::Device` rather than through the
//! resource factory — they are not user-visible resources.

use vulkanalia::prelude::v1_0::*;

pub struct FenceDesc {
    pub signaled: bool,
    pub label: Option<String>,
}

pub struct Fence {
    pub desc: FenceDesc,
    pub(crate) vk_fence: vk::Fence,
}
