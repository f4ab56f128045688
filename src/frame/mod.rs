//! Frame Context (§4.6): the ring of in-flight slots driving `begin_frame`/
//! `submit_frame`, plus [`swapchain`] bring-up and (re)creation.

pub mod swapchain;

pub use swapchain::{Swapchain, SwapchainDesc};

use vulkanalia::prelude::v1_0::*;

use crate::command::Encoder;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::types::MAX_FRAME_BUFFERING;

/// One ring slot: an encoder plus the three sync objects tying its
/// recording to a particular swapchain image (§4.6). Created directly
/// against the backend device rather than through the resource arenas —
/// these are not user-visible resources (see `resource::fence`).
struct FrameSlot {
    encoder: Encoder,
    acquire_semaphore: vk::Semaphore,
    submit_semaphore: vk::Semaphore,
    submit_fence: vk::Fence,
}

impl FrameSlot {
    fn create(device: &Device) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::empty())
            .queue_family_index(device.queue_families.graphics);
        let vk_pool = unsafe { device.device.create_command_pool(&pool_info, None)? };

        let buffer_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(vk_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let vk_buffer = match unsafe { device.device.allocate_command_buffers(&buffer_info) } {
            Ok(buffers) => buffers[0],
            Err(err) => {
                unsafe { device.device.destroy_command_pool(vk_pool, None) };
                return Err(Error::from(err));
            }
        };

        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        let make = || -> Result<(vk::Semaphore, vk::Semaphore, vk::Fence)> {
            let acquire = unsafe { device.device.create_semaphore(&semaphore_info, None)? };
            let submit = match unsafe { device.device.create_semaphore(&semaphore_info, None) } {
                Ok(s) => s,
                Err(err) => {
                    unsafe { device.device.destroy_semaphore(acquire, None) };
                    return Err(Error::from(err));
                }
            };
            let fence = match unsafe { device.device.create_fence(&fence_info, None) } {
                Ok(f) => f,
                Err(err) => {
                    unsafe {
                        device.device.destroy_semaphore(acquire, None);
                        device.device.destroy_semaphore(submit, None);
                    }
                    return Err(Error::from(err));
                }
            };
            Ok((acquire, submit, fence))
        };

        let (acquire_semaphore, submit_semaphore, submit_fence) = match make() {
            Ok(triple) => triple,
            Err(err) => {
                unsafe {
                    device.device.free_command_buffers(vk_pool, &[vk_buffer]);
                    device.device.destroy_command_pool(vk_pool, None);
                }
                return Err(err);
            }
        };

        Ok(Self {
            encoder: Encoder::new(vk_pool, vk_buffer),
            acquire_semaphore,
            submit_semaphore,
            submit_fence,
        })
    }

    fn destroy(self, device: &Device) {
        unsafe {
            device.device.destroy_semaphore(self.acquire_semaphore, None);
            device.device.destroy_semaphore(self.submit_semaphore, None);
            device.device.destroy_fence(self.submit_fence, None);
        }
        self.encoder.destroy(device);
    }
}

/// Fixed-size ring of 1..=`MAX_FRAME_BUFFERING` slots driving the
/// acquire/record/submit/present cycle against one swapchain (§4.6).
pub struct FrameContext {
    slots: Vec<FrameSlot>,
    current_command_encoder: usize,
    current_frame: u64,
    trailing_frame: u64,
}

impl FrameContext {
    pub fn create(device: &Device, buffering: u32) -> Result<Self> {
        let n = (buffering.max(1) as usize).min(MAX_FRAME_BUFFERING);
        let mut slots = Vec::with_capacity(n);
        for _ in 0..n {
            match FrameSlot::create(device) {
                Ok(slot) => slots.push(slot),
                Err(err) => {
                    for slot in slots {
                        slot.destroy(device);
                    }
                    return Err(err);
                }
            }
        }
        Ok(Self {
            slots,
            current_command_encoder: 0,
            current_frame: 0,
            trailing_frame: 0,
        })
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    pub fn trailing_frame(&self) -> u64 {
        self.trailing_frame
    }

    pub fn current_command_encoder(&self) -> usize {
        self.current_command_encoder
    }

    fn buffering(&self) -> usize {
        self.slots.len()
    }

    /// If the swapchain is invalid, waits for the device to idle and
    /// recreates it; then acquires the next image into the current slot's
    /// acquire-semaphore and begins recording into that slot's encoder.
    pub fn begin_frame(
        &mut self,
        instance: &Instance,
        device: &mut Device,
        swapchain: &mut Swapchain,
    ) -> Result<&mut Encoder> {
        if !swapchain.is_valid {
            unsafe { device.device.device_wait_idle()? };
            swapchain.recreate(instance, device)?;
        }

        let slot = &mut self.slots[self.current_command_encoder];
        swapchain.acquire_next_image(device, u64::MAX, slot.acquire_semaphore)?;

        slot.encoder.begin(device)?;
        Ok(&mut slot.encoder)
    }

    /// Waits the slot's submit-fence (retiring the slot's previous use),
    /// resets it, submits the slot's recorded commands waiting on the
    /// acquire-semaphore and signalling the submit-semaphore and fence,
    /// advances the frame counters unconditionally, rotates the current
    /// slot, then presents using the submit-semaphore (§4.6). A present
    /// failure with `OUT_OF_DATE_KHR` invalidates the swapchain without
    /// being treated as a hard error.
    pub fn submit_frame(&mut self, device: &Device, swapchain: &mut Swapchain) -> Result<()> {
        let n = self.buffering() as u64;
        let slot = &mut self.slots[self.current_command_encoder];
        slot.encoder.end(device)?;

        unsafe {
            device
                .device
                .wait_for_fences(&[slot.submit_fence], true, u64::MAX)?;
            device.device.reset_fences(&[slot.submit_fence])?;
        }

        let waits = [slot.acquire_semaphore];
        let stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let buffers = [slot.encoder.vk_buffer];
        let signals = [slot.submit_semaphore];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&waits)
            .wait_dst_stage_mask(&stages)
            .command_buffers(&buffers)
            .signal_semaphores(&signals);

        unsafe {
            device
                .device
                .queue_submit(device.graphics_queue, &[submit_info], slot.submit_fence)?;
        }

        let submit_semaphore = slot.submit_semaphore;

        let (current_frame, trailing_frame) = advance_counters(self.current_frame, n);
        self.current_frame = current_frame;
        self.trailing_frame = trailing_frame;
        self.current_command_encoder = (self.current_command_encoder + 1) % self.slots.len();

        match swapchain.present(device, submit_semaphore) {
            Ok(()) | Err(Error::OutOfDate) => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub fn destroy(self, device: &Device) {
        for slot in self.slots {
            slot.destroy(device);
        }
    }
}

/// `current_frame += 1; trailing_frame = max(current_frame, n) - n` (§4.6).
fn advance_counters(current_frame: u64, n: u64) -> (u64, u64) {
    let current_frame = current_frame + 1;
    let trailing_frame = current_frame.max(n) - n;
    (current_frame, trailing_frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_ring_retirement_matches_s4() {
        // N=2, three submits: current_frame 0->1->2->3, trailing 0,0,1.
        let n = 2;
        let mut current_frame = 0u64;
        let mut trailing = Vec::new();
        for _ in 0..3 {
            let (cf, tf) = advance_counters(current_frame, n);
            current_frame = cf;
            trailing.push(tf);
        }
        assert_eq!(current_frame, 3);
        assert_eq!(trailing, vec![0, 0, 1]);
    }

    #[test]
    fn command_encoder_rotates_modulo_buffering() {
        let buffering = 3usize;
        let mut current = 0usize;
        let mut seen = Vec::new();
        for _ in 0..7 {
            seen.push(current);
            current = (current + 1) % buffering;
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
    }
}
