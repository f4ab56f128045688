//! `vk-gal`: a reference-counted, handle-based Vulkan graphics abstraction
//! layer with automatic per-resource synchronization, multi-frame-in-flight
//! submission, and a descriptor-set heap.
//!
//! Callers bring their own windowing/surface code; this crate owns
//! everything from `VkInstance` selection down to command recording.

pub mod command;
pub mod descriptor_heap;
pub mod device;
pub mod error;
pub mod frame;
pub mod handle;
pub mod instance;
pub mod resource;
pub mod types;

pub use command::{Encoder, EncoderStatus, PipelineBindTarget};
pub use descriptor_heap::{DescriptorHeap, DescriptorHeapDesc, DescriptorHeapStats};
pub use device::Device;
pub use error::{Error, Result};
pub use frame::{FrameContext, Swapchain, SwapchainDesc};
pub use handle::{Arena, Handle};
pub use instance::{Instance, InstanceConfig};
