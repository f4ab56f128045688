//! Command encoder (§4.4): one wrapper per command buffer plus the automatic
//! synchronization that derives barriers from each resource's access history.

use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::ExtDebugUtilsExtension;

use crate::descriptor_heap::DescriptorHeap;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::resource::sync::{BufferAccess, ImageAccess};
use crate::resource::{Buffer, ComputePipeline, Framebuffer, GraphicsPipeline, Image, RenderPass};

/// Cumulative recording status (§7 propagation policy): once non-`Success`,
/// every further recording call becomes a silent no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncoderStatus {
    Success,
    OutOfHostMemory,
    InvalidOperation,
}

struct RenderPassState {
    render_pass: Handle<RenderPass>,
    framebuffer: Handle<Framebuffer>,
}

/// Which pipeline's layout a descriptor-set bind or push-constant update
/// targets.
#[derive(Clone, Copy, Debug)]
pub enum PipelineBindTarget {
    Compute(Handle<ComputePipeline>),
    Graphics(Handle<GraphicsPipeline>),
}

/// Records one command buffer. Not `Send`/`Sync`: the concurrency model
/// (§5) binds one encoder to one thread for the lifetime of a frame.
pub struct Encoder {
    pub(crate) vk_pool: vk::CommandPool,
    pub(crate) vk_buffer: vk::CommandBuffer,
    status: EncoderStatus,
    in_render_pass: Option<RenderPassState>,
}

impl Encoder {
    pub(crate) fn new(vk_pool: vk::CommandPool, vk_buffer: vk::CommandBuffer) -> Self {
        Self {
            vk_pool,
            vk_buffer,
            status: EncoderStatus::Success,
            in_render_pass: None,
        }
    }

    pub fn status(&self) -> EncoderStatus {
        self.status
    }

    fn fail_if_bad(&self) -> bool {
        self.status != EncoderStatus::Success
    }

    /// Guards commands that require recording inside a render pass (draws).
    /// Returns `true` (and stamps the failure) if called outside one.
    fn fail_if_outside_render_pass(&mut self) -> bool {
        if self.in_render_pass.is_none() {
            self.status = EncoderStatus::InvalidOperation;
            return true;
        }
        false
    }

    /// Guards commands that require recording outside a render pass
    /// (dispatch, copies, clears). Returns `true` (and stamps the failure)
    /// if called inside one.
    fn fail_if_inside_render_pass(&mut self) -> bool {
        if self.in_render_pass.is_some() {
            self.status = EncoderStatus::InvalidOperation;
            return true;
        }
        false
    }

    /// Resets recorded state (begin-resets semantics, per the resolved reset
    /// contract) and starts a new recording.
    pub fn begin(&mut self, device: &Device) -> Result<()> {
        unsafe {
            device
                .device
                .reset_command_buffer(self.vk_buffer, vk::CommandBufferResetFlags::empty())?;
        }
        self.status = EncoderStatus::Success;
        self.in_render_pass = None;
        let info = vk::CommandBufferBeginInfo::builder();
        unsafe { device.device.begin_command_buffer(self.vk_buffer, &info)? };
        Ok(())
    }

    pub fn end(&mut self, device: &Device) -> Result<()> {
        unsafe { device.device.end_command_buffer(self.vk_buffer)? };
        match self.status {
            EncoderStatus::Success => Ok(()),
            EncoderStatus::OutOfHostMemory => Err(Error::OutOfHostMemory),
            EncoderStatus::InvalidOperation => Err(Error::InvalidOperation),
        }
    }

    /// Re-arms the underlying command pool; heavier than `begin` and only
    /// needed to reclaim pool memory between large recording bursts.
    pub fn reset(&mut self, device: &Device) -> Result<()> {
        unsafe {
            device
                .device
                .reset_command_pool(self.vk_pool, vk::CommandPoolResetFlags::empty())?;
        }
        self.status = EncoderStatus::Success;
        self.in_render_pass = None;
        Ok(())
    }

    pub(crate) fn destroy(self, device: &Device) {
        unsafe {
            device.device.free_command_buffers(self.vk_pool, &[self.vk_buffer]);
            device.device.destroy_command_pool(self.vk_pool, None);
        }
    }

    fn access_buffer(
        &mut self,
        device: &mut Device,
        buffer: Handle<Buffer>,
        incoming: BufferAccess,
    ) -> Option<vk::Buffer> {
        let b = device.buffer_mut(buffer)?;
        let barrier = b.state.access(incoming);
        let vk_buffer = b.vk_buffer;
        if let Some(barrier) = barrier {
            let buffer_barrier = vk::BufferMemoryBarrier::builder()
                .src_access_mask(barrier.src_access)
                .dst_access_mask(barrier.dst_access)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .buffer(vk_buffer)
                .offset(0)
                .size(vk::WHOLE_SIZE);
            unsafe {
                device.device.cmd_pipeline_barrier(
                    self.vk_buffer,
                    barrier.src_stages,
                    barrier.dst_stages,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[buffer_barrier],
                    &[],
                );
            }
        }
        Some(vk_buffer)
    }

    fn access_image(
        &mut self,
        device: &mut Device,
        image: Handle<Image>,
        subresource: vk::ImageSubresourceRange,
        incoming: ImageAccess,
    ) -> Option<(vk::Image, vk::ImageLayout)> {
        let img = device.image_mut(image)?;
        let barrier = img.state.access(incoming);
        let vk_image = img.vk_image;
        if let Some(barrier) = barrier {
            let image_barrier = vk::ImageMemoryBarrier::builder()
                .src_access_mask(barrier.src_access)
                .dst_access_mask(barrier.dst_access)
                .old_layout(barrier.old_layout)
                .new_layout(barrier.new_layout)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(vk_image)
                .subresource_range(subresource);
            unsafe {
                device.device.cmd_pipeline_barrier(
                    self.vk_buffer,
                    barrier.src_stages,
                    barrier.dst_stages,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[image_barrier],
                );
            }
        }
        Some((vk_image, incoming.layout))
    }

    // ---- Buffer commands ---------------------------------------------

    pub fn fill_buffer(&mut self, device: &mut Device, buffer: Handle<Buffer>, offset: vk::DeviceSize, size: vk::DeviceSize, data: u32) {
        if self.fail_if_bad() || self.fail_if_inside_render_pass() {
            return;
        }
        let Some(vk_buffer) = self.access_buffer(
            device,
            buffer,
            BufferAccess { stages: vk::PipelineStageFlags::TRANSFER, access: vk::AccessFlags::TRANSFER_WRITE },
        ) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        unsafe { device.device.cmd_fill_buffer(self.vk_buffer, vk_buffer, offset, size, data) };
    }

    pub fn update_buffer(&mut self, device: &mut Device, buffer: Handle<Buffer>, offset: vk::DeviceSize, data: &[u8]) {
        if self.fail_if_bad() || self.fail_if_inside_render_pass() {
            return;
        }
        let Some(vk_buffer) = self.access_buffer(
            device,
            buffer,
            BufferAccess { stages: vk::PipelineStageFlags::TRANSFER, access: vk::AccessFlags::TRANSFER_WRITE },
        ) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        unsafe { device.device.cmd_update_buffer(self.vk_buffer, vk_buffer, offset, data) };
    }

    pub fn copy_buffer(&mut self, device: &mut Device, src: Handle<Buffer>, dst: Handle<Buffer>, regions: &[vk::BufferCopy]) {
        if self.fail_if_bad() || self.fail_if_inside_render_pass() {
            return;
        }
        let read = BufferAccess { stages: vk::PipelineStageFlags::TRANSFER, access: vk::AccessFlags::TRANSFER_READ };
        let write = BufferAccess { stages: vk::PipelineStageFlags::TRANSFER, access: vk::AccessFlags::TRANSFER_WRITE };
        let (Some(vk_src), Some(vk_dst)) = (
            self.access_buffer(device, src, read),
            self.access_buffer(device, dst, write),
        ) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        unsafe { device.device.cmd_copy_buffer(self.vk_buffer, vk_src, vk_dst, regions) };
    }

    // ---- Image commands ------------------------------------------------

    pub fn clear_color_image(
        &mut self,
        device: &mut Device,
        image: Handle<Image>,
        subresource: vk::ImageSubresourceRange,
        color: vk::ClearColorValue,
    ) {
        if self.fail_if_bad() || self.fail_if_inside_render_pass() {
            return;
        }
        let incoming = ImageAccess {
            stages: vk::PipelineStageFlags::TRANSFER,
            access: vk::AccessFlags::TRANSFER_WRITE,
            layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        };
        let Some((vk_image, layout)) = self.access_image(device, image, subresource, incoming) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        unsafe { device.device.cmd_clear_color_image(self.vk_buffer, vk_image, layout, &color, &[subresource]) };
    }

    pub fn clear_depth_stencil_image(
        &mut self,
        device: &mut Device,
        image: Handle<Image>,
        subresource: vk::ImageSubresourceRange,
        value: vk::ClearDepthStencilValue,
    ) {
        if self.fail_if_bad() || self.fail_if_inside_render_pass() {
            return;
        }
        let incoming = ImageAccess {
            stages: vk::PipelineStageFlags::TRANSFER,
            access: vk::AccessFlags::TRANSFER_WRITE,
            layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        };
        let Some((vk_image, layout)) = self.access_image(device, image, subresource, incoming) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        unsafe { device.device.cmd_clear_depth_stencil_image(self.vk_buffer, vk_image, layout, &value, &[subresource]) };
    }

    pub fn copy_image(
        &mut self,
        device: &mut Device,
        src: Handle<Image>,
        src_subresource: vk::ImageSubresourceRange,
        dst: Handle<Image>,
        dst_subresource: vk::ImageSubresourceRange,
        regions: &[vk::ImageCopy],
    ) {
        if self.fail_if_bad() || self.fail_if_inside_render_pass() {
            return;
        }
        let read = ImageAccess { stages: vk::PipelineStageFlags::TRANSFER, access: vk::AccessFlags::TRANSFER_READ, layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL };
        let write = ImageAccess { stages: vk::PipelineStageFlags::TRANSFER, access: vk::AccessFlags::TRANSFER_WRITE, layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL };
        let (Some((vk_src, src_layout)), Some((vk_dst, dst_layout))) = (
            self.access_image(device, src, src_subresource, read),
            self.access_image(device, dst, dst_subresource, write),
        ) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        unsafe { device.device.cmd_copy_image(self.vk_buffer, vk_src, src_layout, vk_dst, dst_layout, regions) };
    }

    pub fn copy_buffer_to_image(
        &mut self,
        device: &mut Device,
        src: Handle<Buffer>,
        dst: Handle<Image>,
        dst_subresource: vk::ImageSubresourceRange,
        regions: &[vk::BufferImageCopy],
    ) {
        if self.fail_if_bad() || self.fail_if_inside_render_pass() {
            return;
        }
        let read = BufferAccess { stages: vk::PipelineStageFlags::TRANSFER, access: vk::AccessFlags::TRANSFER_READ };
        let write = ImageAccess { stages: vk::PipelineStageFlags::TRANSFER, access: vk::AccessFlags::TRANSFER_WRITE, layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL };
        let (Some(vk_src), Some((vk_dst, layout))) = (
            self.access_buffer(device, src, read),
            self.access_image(device, dst, dst_subresource, write),
        ) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        unsafe { device.device.cmd_copy_buffer_to_image(self.vk_buffer, vk_src, vk_dst, layout, regions) };
    }

    pub fn copy_image_to_buffer(
        &mut self,
        device: &mut Device,
        src: Handle<Image>,
        src_subresource: vk::ImageSubresourceRange,
        dst: Handle<Buffer>,
        regions: &[vk::BufferImageCopy],
    ) {
        if self.fail_if_bad() || self.fail_if_inside_render_pass() {
            return;
        }
        let read = ImageAccess { stages: vk::PipelineStageFlags::TRANSFER, access: vk::AccessFlags::TRANSFER_READ, layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL };
        let write = BufferAccess { stages: vk::PipelineStageFlags::TRANSFER, access: vk::AccessFlags::TRANSFER_WRITE };
        let (Some((vk_src, layout)), Some(vk_dst)) = (
            self.access_image(device, src, src_subresource, read),
            self.access_buffer(device, dst, write),
        ) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        unsafe { device.device.cmd_copy_image_to_buffer(self.vk_buffer, vk_src, layout, vk_dst, regions) };
    }

    pub fn blit_image(
        &mut self,
        device: &mut Device,
        src: Handle<Image>,
        src_subresource: vk::ImageSubresourceRange,
        dst: Handle<Image>,
        dst_subresource: vk::ImageSubresourceRange,
        regions: &[vk::ImageBlit],
        filter: vk::Filter,
    ) {
        if self.fail_if_bad() || self.fail_if_inside_render_pass() {
            return;
        }
        let read = ImageAccess { stages: vk::PipelineStageFlags::TRANSFER, access: vk::AccessFlags::TRANSFER_READ, layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL };
        let write = ImageAccess { stages: vk::PipelineStageFlags::TRANSFER, access: vk::AccessFlags::TRANSFER_WRITE, layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL };
        let (Some((vk_src, src_layout)), Some((vk_dst, dst_layout))) = (
            self.access_image(device, src, src_subresource, read),
            self.access_image(device, dst, dst_subresource, write),
        ) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        unsafe { device.device.cmd_blit_image(self.vk_buffer, vk_src, src_layout, vk_dst, dst_layout, regions, filter) };
    }

    pub fn resolve_image(
        &mut self,
        device: &mut Device,
        src: Handle<Image>,
        src_subresource: vk::ImageSubresourceRange,
        dst: Handle<Image>,
        dst_subresource: vk::ImageSubresourceRange,
        regions: &[vk::ImageResolve],
    ) {
        if self.fail_if_bad() || self.fail_if_inside_render_pass() {
            return;
        }
        let read = ImageAccess { stages: vk::PipelineStageFlags::TRANSFER, access: vk::AccessFlags::TRANSFER_READ, layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL };
        let write = ImageAccess { stages: vk::PipelineStageFlags::TRANSFER, access: vk::AccessFlags::TRANSFER_WRITE, layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL };
        let (Some((vk_src, src_layout)), Some((vk_dst, dst_layout))) = (
            self.access_image(device, src, src_subresource, read),
            self.access_image(device, dst, dst_subresource, write),
        ) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        unsafe { device.device.cmd_resolve_image(self.vk_buffer, vk_src, src_layout, vk_dst, dst_layout, regions) };
    }

    // ---- Render pass -----------------------------------------------------

    /// Derives the color/depth-stencil attachment access from load/store ops
    /// (§4.4 render-pass edge cases) and transitions each attachment image.
    pub fn begin_render_pass(
        &mut self,
        device: &mut Device,
        render_pass: Handle<RenderPass>,
        framebuffer: Handle<Framebuffer>,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) {
        if self.fail_if_bad() {
            return;
        }
        let Some(fb) = device.framebuffer(framebuffer) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        let Some(rp) = device.render_pass(render_pass) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        if fb.desc.check_compatible(&rp.desc).is_err() {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        }
        let offset = (render_area.offset.x, render_area.offset.y);
        let extent = (render_area.extent.width, render_area.extent.height);
        if !fb.desc.render_area_fits(offset, extent) {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        }

        let attachments = fb.desc.attachments.clone();
        let color_descs = rp.desc.color_attachments.clone();
        let depth_desc = rp.desc.depth_stencil_attachment.clone();
        let vk_render_pass = rp.vk_render_pass;
        let vk_framebuffer = fb.vk_framebuffer;

        for (i, attachment_desc) in color_descs.iter().enumerate() {
            let view_handle = attachments[i];
            let Some(view) = device.image_view(view_handle) else { continue };
            let image = view.desc.image;
            let subresource = vk::ImageSubresourceRange::builder()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1)
                .build();
            let writes = matches!(attachment_desc.load_op, crate::types::LoadOp::Clear)
                || matches!(attachment_desc.store_op, crate::types::StoreOp::Store | crate::types::StoreOp::DontCare);
            let mut access = vk::AccessFlags::empty();
            if writes {
                access |= vk::AccessFlags::COLOR_ATTACHMENT_WRITE;
            }
            if matches!(attachment_desc.load_op, crate::types::LoadOp::Load) {
                access |= vk::AccessFlags::COLOR_ATTACHMENT_READ;
            }
            self.access_image(
                device,
                image,
                subresource,
                ImageAccess {
                    stages: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                    access,
                    layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                },
            );
        }

        if let Some(depth_desc) = &depth_desc {
            if let Some(&view_handle) = attachments.get(color_descs.len()) {
                if let Some(view) = device.image_view(view_handle) {
                    let image = view.desc.image;
                    let subresource = vk::ImageSubresourceRange::builder()
                        .aspect_mask(vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1)
                        .build();
                    let writes = matches!(depth_desc.load_op, crate::types::LoadOp::Clear)
                        || matches!(depth_desc.store_op, crate::types::StoreOp::Store | crate::types::StoreOp::DontCare);
                    let layout = if writes {
                        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
                    } else {
                        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
                    };
                    let mut access = vk::AccessFlags::empty();
                    if writes {
                        access |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
                    }
                    if matches!(depth_desc.load_op, crate::types::LoadOp::Load) {
                        access |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ;
                    }
                    self.access_image(
                        device,
                        image,
                        subresource,
                        ImageAccess {
                            stages: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
                            access,
                            layout,
                        },
                    );
                }
            }
        }

        let info = vk::RenderPassBeginInfo::builder()
            .render_pass(vk_render_pass)
            .framebuffer(vk_framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);
        unsafe {
            device
                .device
                .cmd_begin_render_pass(self.vk_buffer, &info, vk::SubpassContents::INLINE)
        };
        self.in_render_pass = Some(RenderPassState { render_pass, framebuffer });
    }

    pub fn end_render_pass(&mut self, device: &Device) {
        if self.fail_if_bad() {
            return;
        }
        unsafe { device.device.cmd_end_render_pass(self.vk_buffer) };
        self.in_render_pass = None;
    }

    // ---- Pipeline / descriptor binding ------------------------------------

    pub fn bind_compute_pipeline(&mut self, device: &Device, pipeline: Handle<ComputePipeline>) {
        if self.fail_if_bad() {
            return;
        }
        let Some(p) = device.compute_pipeline(pipeline) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        unsafe { device.device.cmd_bind_pipeline(self.vk_buffer, vk::PipelineBindPoint::COMPUTE, p.vk_pipeline) };
    }

    pub fn bind_graphics_pipeline(&mut self, device: &Device, pipeline: Handle<GraphicsPipeline>) {
        if self.fail_if_bad() {
            return;
        }
        let Some(p) = device.graphics_pipeline(pipeline) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        unsafe { device.device.cmd_bind_pipeline(self.vk_buffer, vk::PipelineBindPoint::GRAPHICS, p.vk_pipeline) };
    }

    pub fn bind_descriptor_sets(
        &mut self,
        device: &Device,
        target: PipelineBindTarget,
        heap: Handle<DescriptorHeap>,
        group: u32,
        first_set: u32,
        dynamic_offsets: &[u32],
    ) {
        if self.fail_if_bad() {
            return;
        }
        let Some((bind_point, vk_layout)) = self.resolve_bind_target(device, target) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        let Some(heap) = device.descriptor_heap(heap) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        let num_sets = heap.vk_set_layouts.len();
        let mut sets = Vec::with_capacity(num_sets);
        for set_index in 0..num_sets {
            match heap.set_handle(group, set_index) {
                Some(s) => sets.push(s),
                None => {
                    self.status = EncoderStatus::OutOfHostMemory;
                    return;
                }
            }
        }
        unsafe {
            device.device.cmd_bind_descriptor_sets(
                self.vk_buffer,
                bind_point,
                vk_layout,
                first_set,
                &sets,
                dynamic_offsets,
            );
        }
    }

    pub fn push_constants(&mut self, device: &Device, target: PipelineBindTarget, stages: vk::ShaderStageFlags, offset: u32, data: &[u8]) {
        if self.fail_if_bad() {
            return;
        }
        let Some((_, vk_layout)) = self.resolve_bind_target(device, target) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        unsafe { device.device.cmd_push_constants(self.vk_buffer, vk_layout, stages, offset, data) };
    }

    fn resolve_bind_target(&self, device: &Device, target: PipelineBindTarget) -> Option<(vk::PipelineBindPoint, vk::PipelineLayout)> {
        match target {
            PipelineBindTarget::Compute(handle) => {
                let p = device.compute_pipeline(handle)?;
                Some((vk::PipelineBindPoint::COMPUTE, p.vk_layout))
            }
            PipelineBindTarget::Graphics(handle) => {
                let p = device.graphics_pipeline(handle)?;
                Some((vk::PipelineBindPoint::GRAPHICS, p.vk_layout))
            }
        }
    }

    pub fn dispatch(&mut self, device: &Device, group_count_x: u32, group_count_y: u32, group_count_z: u32) {
        if self.fail_if_bad() || self.fail_if_inside_render_pass() {
            return;
        }
        unsafe { device.device.cmd_dispatch(self.vk_buffer, group_count_x, group_count_y, group_count_z) };
    }

    pub fn dispatch_indirect(&mut self, device: &mut Device, buffer: Handle<Buffer>, offset: vk::DeviceSize) {
        if self.fail_if_bad() || self.fail_if_inside_render_pass() {
            return;
        }
        let Some(vk_buffer) = self.access_buffer(
            device,
            buffer,
            BufferAccess { stages: vk::PipelineStageFlags::DRAW_INDIRECT, access: vk::AccessFlags::INDIRECT_COMMAND_READ },
        ) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        unsafe { device.device.cmd_dispatch_indirect(self.vk_buffer, vk_buffer, offset) };
    }

    // ---- Dynamic state ---------------------------------------------------

    pub fn set_viewport(&mut self, device: &Device, viewport: vk::Viewport) {
        if self.fail_if_bad() {
            return;
        }
        unsafe { device.device.cmd_set_viewport(self.vk_buffer, 0, &[viewport]) };
    }

    pub fn set_scissor(&mut self, device: &Device, scissor: vk::Rect2D) {
        if self.fail_if_bad() {
            return;
        }
        unsafe { device.device.cmd_set_scissor(self.vk_buffer, 0, &[scissor]) };
    }

    pub fn set_blend_constants(&mut self, device: &Device, constants: [f32; 4]) {
        if self.fail_if_bad() {
            return;
        }
        unsafe { device.device.cmd_set_blend_constants(self.vk_buffer, constants) };
    }

    pub fn set_stencil_compare_mask(&mut self, device: &Device, face: vk::StencilFaceFlags, mask: u32) {
        if self.fail_if_bad() {
            return;
        }
        unsafe { device.device.cmd_set_stencil_compare_mask(self.vk_buffer, face, mask) };
    }

    pub fn set_stencil_reference(&mut self, device: &Device, face: vk::StencilFaceFlags, reference: u32) {
        if self.fail_if_bad() {
            return;
        }
        unsafe { device.device.cmd_set_stencil_reference(self.vk_buffer, face, reference) };
    }

    pub fn set_stencil_write_mask(&mut self, device: &Device, face: vk::StencilFaceFlags, mask: u32) {
        if self.fail_if_bad() {
            return;
        }
        unsafe { device.device.cmd_set_stencil_write_mask(self.vk_buffer, face, mask) };
    }

    // ---- Vertex / index / draw --------------------------------------------

    pub fn bind_vertex_buffers(&mut self, device: &mut Device, first_binding: u32, buffers: &[Handle<Buffer>], offsets: &[vk::DeviceSize]) {
        if self.fail_if_bad() {
            return;
        }
        let mut vk_buffers = Vec::with_capacity(buffers.len());
        for &buffer in buffers {
            match self.access_buffer(
                device,
                buffer,
                BufferAccess { stages: vk::PipelineStageFlags::VERTEX_INPUT, access: vk::AccessFlags::VERTEX_ATTRIBUTE_READ },
            ) {
                Some(vk_buffer) => vk_buffers.push(vk_buffer),
                None => {
                    self.status = EncoderStatus::OutOfHostMemory;
                    return;
                }
            }
        }
        unsafe { device.device.cmd_bind_vertex_buffers(self.vk_buffer, first_binding, &vk_buffers, offsets) };
    }

    pub fn bind_index_buffer(&mut self, device: &mut Device, buffer: Handle<Buffer>, offset: vk::DeviceSize, index_type: vk::IndexType) {
        if self.fail_if_bad() {
            return;
        }
        let Some(vk_buffer) = self.access_buffer(
            device,
            buffer,
            BufferAccess { stages: vk::PipelineStageFlags::VERTEX_INPUT, access: vk::AccessFlags::INDEX_READ },
        ) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        unsafe { device.device.cmd_bind_index_buffer(self.vk_buffer, vk_buffer, offset, index_type) };
    }

    pub fn draw(&mut self, device: &Device, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        if self.fail_if_bad() || self.fail_if_outside_render_pass() {
            return;
        }
        unsafe { device.device.cmd_draw(self.vk_buffer, vertex_count, instance_count, first_vertex, first_instance) };
    }

    pub fn draw_indexed(&mut self, device: &Device, index_count: u32, instance_count: u32, first_index: u32, vertex_offset: i32, first_instance: u32) {
        if self.fail_if_bad() || self.fail_if_outside_render_pass() {
            return;
        }
        unsafe {
            device.device.cmd_draw_indexed(
                self.vk_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            )
        };
    }

    pub fn draw_indirect(&mut self, device: &mut Device, buffer: Handle<Buffer>, offset: vk::DeviceSize, draw_count: u32, stride: u32) {
        if self.fail_if_bad() || self.fail_if_outside_render_pass() {
            return;
        }
        let Some(vk_buffer) = self.access_buffer(
            device,
            buffer,
            BufferAccess { stages: vk::PipelineStageFlags::DRAW_INDIRECT, access: vk::AccessFlags::INDIRECT_COMMAND_READ },
        ) else {
            self.status = EncoderStatus::OutOfHostMemory;
            return;
        };
        unsafe { device.device.cmd_draw_indirect(self.vk_buffer, vk_buffer, offset, draw_count, stride) };
    }

    // ---- Debug markers -----------------------------------------------------

    pub fn debug_marker_begin(&mut self, device: &Device, label: &str, color: [f32; 4]) {
        if self.fail_if_bad() || !device.supports_debug_utils() {
            return;
        }
        let Ok(c_label) = std::ffi::CString::new(label) else { return };
        let info = vk::DebugUtilsLabelEXT::builder()
            .label_name(c_label.as_bytes_with_nul())
            .color(color);
        unsafe { device.device.cmd_begin_debug_utils_label_ext(self.vk_buffer, &info) };
    }

    pub fn debug_marker_end(&mut self, device: &Device) {
        if self.fail_if_bad() || !device.supports_debug_utils() {
            return;
        }
        unsafe { device.device.cmd_end_debug_utils_label_ext(self.vk_buffer) };
    }
}
