//! Logical device bring-up and the resource factory (§4.1, §4.2).

pub mod allocator;
pub mod physical_device;
pub mod queue;

use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::{ExtDebugUtilsExtension, Handle as VkHandle, KhrSwapchainExtension};

use crate::descriptor_heap::{DescriptorHeap, DescriptorHeapDesc, DescriptorHeapStats, Pool, ShadowElement};
use crate::error::{Error, Result};
use crate::handle::{Arena, Handle};
use crate::instance::{Instance, VALIDATION_LAYER};
use crate::resource::*;
use crate::types::{BufferUsage, DescriptorType, MemoryProperties};

use allocator::Allocator;
use physical_device::{pick_physical_device, DevicePreference, SelectedDevice};
use queue::QueueFamilyIndices;

/// Owns the logical device, its function table (`vulkanalia::Device` itself
/// acts as the dispatch table the teacher otherwise hand-rolls), the
/// allocator, and every resource arena.
pub struct Device {
    pub(crate) device: vulkanalia::Device,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) queue_families: QueueFamilyIndices,
    pub(crate) graphics_queue: vk::Queue,
    pub(crate) present_queue: vk::Queue,
    allocator: Allocator,
    supports_debug_utils: bool,

    buffers: Arena<Buffer>,
    buffer_views: Arena<BufferView>,
    images: Arena<Image>,
    image_views: Arena<ImageView>,
    samplers: Arena<Sampler>,
    shaders: Arena<Shader>,
    render_passes: Arena<RenderPass>,
    framebuffers: Arena<Framebuffer>,
    descriptor_set_layouts: Arena<DescriptorSetLayout>,
    pipeline_caches: Arena<PipelineCache>,
    compute_pipelines: Arena<ComputePipeline>,
    graphics_pipelines: Arena<GraphicsPipeline>,
    fences: Arena<Fence>,
    descriptor_heaps: Arena<DescriptorHeap>,
}

impl Device {
    pub fn create(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        preference: &DevicePreference,
    ) -> Result<Self> {
        let SelectedDevice {
            physical_device,
            queue_families,
            supports_debug_utils,
            ..
        } = pick_physical_device(instance.handle(), surface, preference)?;

        let unique_families: std::collections::HashSet<u32> =
            [queue_families.graphics, queue_families.present].into_iter().collect();
        let queue_priorities = [1.0f32];
        let queue_infos: Vec<_> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
                    .build()
            })
            .collect();

        let layers = if instance.validation_enabled {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let mut extensions = vec![vk::KHR_SWAPCHAIN_EXTENSION.name.as_ptr()];
        if supports_debug_utils {
            extensions.push(vk::EXT_DEBUG_UTILS_EXTENSION.name.as_ptr());
        }
        if instance.needs_portability_subset() {
            extensions.push(vk::KHR_PORTABILITY_SUBSET_EXTENSION.name.as_ptr());
        }

        let features = vk::PhysicalDeviceFeatures::builder();
        let info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = unsafe { instance.handle().create_device(physical_device, &info, None)? };
        let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };
        let allocator = Allocator::new(instance.handle(), physical_device);

        Ok(Self {
            device,
            physical_device,
            queue_families,
            graphics_queue,
            present_queue,
            allocator,
            supports_debug_utils,
            buffers: Arena::new(),
            buffer_views: Arena::new(),
            images: Arena::new(),
            image_views: Arena::new(),
            samplers: Arena::new(),
            shaders: Arena::new(),
            render_passes: Arena::new(),
            framebuffers: Arena::new(),
            descriptor_set_layouts: Arena::new(),
            pipeline_caches: Arena::new(),
            compute_pipelines: Arena::new(),
            graphics_pipelines: Arena::new(),
            fences: Arena::new(),
            descriptor_heaps: Arena::new(),
        })
    }

    pub fn handle(&self) -> &vulkanalia::Device {
        &self.device
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Tags a backend object with a debug label if the extension is
    /// available and the caller supplied one; a no-op stub otherwise (§6).
    fn set_debug_label(
        &self,
        object_handle: u64,
        object_type: vk::ObjectType,
        label: Option<&str>,
    ) {
        let (Some(label), true) = (label, self.supports_debug_utils) else {
            return;
        };
        let Ok(c_label) = std::ffi::CString::new(label) else {
            return;
        };
        let info = vk::DebugUtilsObjectNameInfoEXT::builder()
            .object_type(object_type)
            .object_handle(object_handle)
            .object_name(c_label.as_bytes_with_nul());
        unsafe {
            let _ = self.device.set_debug_utils_object_name_ext(&info);
        }
    }

    pub fn supports_debug_utils(&self) -> bool {
        self.supports_debug_utils
    }

    /// Raw physical-device properties (limits, device name, vendor/device
    /// ids) for diagnostics — `original_source`'s `DeviceInterface::
    /// get_device_properties`.
    pub fn get_device_properties(&self, instance: &Instance) -> vk::PhysicalDeviceProperties {
        unsafe { instance.handle().get_physical_device_properties(self.physical_device) }
    }

    /// Format capability query — `original_source`'s `DeviceInterface::
    /// get_format_properties`.
    pub fn get_format_properties(&self, instance: &Instance, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            instance
                .handle()
                .get_physical_device_format_properties(self.physical_device, format)
        }
    }

    // ---- Buffer -----------------------------------------------------

    pub fn create_buffer(&mut self, desc: BufferDesc) -> Result<Handle<Buffer>> {
        if desc.size == 0 || desc.usage.is_empty() {
            return Err(Error::FeatureNotPresent);
        }

        let info = vk::BufferCreateInfo::builder()
            .size(desc.size)
            .usage(to_vk_buffer_usage(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let vk_buffer = unsafe { self.device.create_buffer(&info, None)? };

        let mem_props = to_vk_memory_properties(desc.memory_properties);
        let allocation = match self.allocator.allocate_for_buffer(&self.device, vk_buffer, mem_props) {
            Ok(allocation) => allocation,
            Err(err) => {
                unsafe { self.device.destroy_buffer(vk_buffer, None) };
                return Err(err);
            }
        };

        self.set_debug_label(
            vk_buffer.as_raw(),
            vk::ObjectType::BUFFER,
            desc.label.as_deref(),
        );

        Ok(self.buffers.insert(Buffer {
            desc,
            vk_buffer,
            allocation,
            state: BufferState::default(),
        }))
    }

    pub fn ref_buffer(&self, handle: Handle<Buffer>) -> u64 {
        self.buffers.inc_ref(handle)
    }

    pub fn unref_buffer(&mut self, handle: Handle<Buffer>) {
        if let Some(buffer) = self.buffers.dec_ref(handle) {
            self.allocator.free(&self.device, &buffer.allocation);
            unsafe { self.device.destroy_buffer(buffer.vk_buffer, None) };
        }
    }

    pub fn buffer(&self, handle: Handle<Buffer>) -> Option<&Buffer> {
        self.buffers.get(handle)
    }

    pub fn buffer_mut(&mut self, handle: Handle<Buffer>) -> Option<&mut Buffer> {
        self.buffers.get_mut(handle)
    }

    pub fn flush_buffer_memory_map(
        &self,
        handle: Handle<Buffer>,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> Result<()> {
        let buffer = self.buffers.get(handle).ok_or(Error::InvalidHandle)?;
        self.allocator.flush(&self.device, buffer.allocation.memory, offset, size)
    }

    pub fn invalidate_buffer_memory_map(
        &self,
        handle: Handle<Buffer>,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> Result<()> {
        let buffer = self.buffers.get(handle).ok_or(Error::InvalidHandle)?;
        self.allocator.invalidate(&self.device, buffer.allocation.memory, offset, size)
    }

    pub fn create_buffer_view(&mut self, desc: BufferViewDesc) -> Result<Handle<BufferView>> {
        let buffer = self.buffers.get(desc.buffer).ok_or(Error::InvalidHandle)?;
        let info = vk::BufferViewCreateInfo::builder()
            .buffer(buffer.vk_buffer)
            .format(desc.format.to_vk())
            .offset(desc.offset)
            .range(desc.size);
        let vk_view = unsafe { self.device.create_buffer_view(&info, None)? };
        self.buffers.inc_ref(desc.buffer);
        Ok(self.buffer_views.insert(BufferView { desc, vk_view }))
    }

    pub fn unref_buffer_view(&mut self, handle: Handle<BufferView>) {
        if let Some(view) = self.buffer_views.dec_ref(handle) {
            unsafe { self.device.destroy_buffer_view(view.vk_view, None) };
            self.unref_buffer(view.desc.buffer);
        }
    }

    // ---- Image --------------------------------------------------------

    pub fn create_image(&mut self, desc: ImageDesc) -> Result<Handle<Image>> {
        if !desc.extent.visible() || desc.usage.is_empty() || desc.mip_levels == 0 || desc.array_layers == 0 {
            return Err(Error::FeatureNotPresent);
        }

        let info = vk::ImageCreateInfo::builder()
            .image_type(to_vk_image_type(desc.image_type))
            .format(desc.format.to_vk())
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: desc.extent.depth,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(desc.array_layers)
            .samples(desc.sample_count)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(to_vk_image_usage(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let vk_image = unsafe { self.device.create_image(&info, None)? };

        let allocation = match self.allocator.allocate_for_image(
            &self.device,
            vk_image,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) {
            Ok(allocation) => allocation,
            Err(err) => {
                unsafe { self.device.destroy_image(vk_image, None) };
                return Err(err);
            }
        };

        self.set_debug_label(vk_image.as_raw(), vk::ObjectType::IMAGE, desc.label.as_deref());

        Ok(self.images.insert(Image {
            desc,
            vk_image,
            allocation: Some(allocation),
            is_swapchain_owned: false,
            state: ImageState::default(),
        }))
    }

    /// Installs a swapchain-owned image record: refcount 1, no allocation,
    /// layout UNDEFINED (§4.6).
    pub(crate) fn insert_swapchain_image(&mut self, desc: ImageDesc, vk_image: vk::Image) -> Handle<Image> {
        self.images.insert(Image {
            desc,
            vk_image,
            allocation: None,
            is_swapchain_owned: true,
            state: ImageState::default(),
        })
    }

    pub fn ref_image(&self, handle: Handle<Image>) -> u64 {
        self.images.inc_ref(handle)
    }

    pub fn unref_image(&mut self, handle: Handle<Image>) {
        if let Some(image) = self.images.dec_ref(handle) {
            if let Some(allocation) = &image.allocation {
                self.allocator.free(&self.device, allocation);
            }
            if !image.is_swapchain_owned {
                unsafe { self.device.destroy_image(image.vk_image, None) };
            }
        }
    }

    pub fn image(&self, handle: Handle<Image>) -> Option<&Image> {
        self.images.get(handle)
    }

    pub fn image_mut(&mut self, handle: Handle<Image>) -> Option<&mut Image> {
        self.images.get_mut(handle)
    }

    pub fn create_image_view(&mut self, desc: ImageViewDesc) -> Result<Handle<ImageView>> {
        let image = self.images.get(desc.image).ok_or(Error::InvalidHandle)?;
        let range = desc.subresource_range;
        let info = vk::ImageViewCreateInfo::builder()
            .image(image.vk_image)
            .view_type(match image.desc.image_type {
                crate::resource::ImageType::OneD => vk::ImageViewType::_1D,
                crate::resource::ImageType::TwoD => vk::ImageViewType::_2D,
                crate::resource::ImageType::ThreeD => vk::ImageViewType::_3D,
            })
            .format(desc.format.to_vk())
            .components(vk::ComponentMapping {
                r: desc.components.r,
                g: desc.components.g,
                b: desc.components.b,
                a: desc.components.a,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: to_vk_aspects(range.aspects),
                base_mip_level: range.base_mip_level,
                level_count: range.level_count,
                base_array_layer: range.base_array_layer,
                layer_count: range.layer_count,
            });
        let vk_view = unsafe { self.device.create_image_view(&info, None)? };
        self.images.inc_ref(desc.image);
        Ok(self.image_views.insert(ImageView { desc, vk_view }))
    }

    pub fn unref_image_view(&mut self, handle: Handle<ImageView>) {
        if let Some(view) = self.image_views.dec_ref(handle) {
            unsafe { self.device.destroy_image_view(view.vk_view, None) };
            self.unref_image(view.desc.image);
        }
    }

    pub fn image_view(&self, handle: Handle<ImageView>) -> Option<&ImageView> {
        self.image_views.get(handle)
    }

    // ---- Sampler --------------------------------------------------------

    pub fn create_sampler(&mut self, desc: SamplerDesc) -> Result<Handle<Sampler>> {
        let info = vk::SamplerCreateInfo::builder()
            .mag_filter(to_vk_filter(desc.mag_filter))
            .min_filter(to_vk_filter(desc.min_filter))
            .mipmap_mode(to_vk_mipmap_mode(desc.mipmap_mode))
            .address_mode_u(to_vk_address_mode(desc.address_mode_u))
            .address_mode_v(to_vk_address_mode(desc.address_mode_v))
            .address_mode_w(to_vk_address_mode(desc.address_mode_w))
            .mip_lod_bias(desc.mip_lod_bias)
            .anisotropy_enable(desc.anisotropy_enable)
            .max_anisotropy(desc.max_anisotropy)
            .compare_enable(desc.compare.is_some())
            .compare_op(desc.compare.map(to_vk_compare_op).unwrap_or(vk::CompareOp::ALWAYS))
            .min_lod(desc.min_lod)
            .max_lod(desc.max_lod)
            .border_color(to_vk_border_color(desc.border_color))
            .unnormalized_coordinates(desc.unnormalized_coordinates);
        let vk_sampler = unsafe { self.device.create_sampler(&info, None)? };
        Ok(self.samplers.insert(Sampler { desc, vk_sampler }))
    }

    pub fn ref_sampler(&self, handle: Handle<Sampler>) -> u64 {
        self.samplers.inc_ref(handle)
    }

    pub fn unref_sampler(&mut self, handle: Handle<Sampler>) {
        if let Some(sampler) = self.samplers.dec_ref(handle) {
            unsafe { self.device.destroy_sampler(sampler.vk_sampler, None) };
        }
    }

    // ---- Shader ---------------------------------------------------------

    /// `code` must be SPIR-V bytecode (32-bit words, §6).
    pub fn create_shader(&mut self, code: &[u8], label: Option<String>) -> Result<Handle<Shader>> {
        if code.len() % 4 != 0 {
            return Err(Error::FormatNotSupported);
        }
        let info = vk::ShaderModuleCreateInfo::builder().code_size(code.len()).code(
            bytemuck_words(code),
        );
        let vk_module = unsafe { self.device.create_shader_module(&info, None)? };
        self.set_debug_label(vk_module.as_raw(), vk::ObjectType::SHADER_MODULE, label.as_deref());
        Ok(self.shaders.insert(Shader { desc: ShaderDesc { label }, vk_module }))
    }

    pub fn ref_shader(&self, handle: Handle<Shader>) -> u64 {
        self.shaders.inc_ref(handle)
    }

    pub fn unref_shader(&mut self, handle: Handle<Shader>) {
        if let Some(shader) = self.shaders.dec_ref(handle) {
            unsafe { self.device.destroy_shader_module(shader.vk_module, None) };
        }
    }

    // ---- RenderPass -----------------------------------------------------

    pub fn create_render_pass(&mut self, desc: RenderPassDesc) -> Result<Handle<RenderPass>> {
        desc.validate()?;

        let mut attachments = Vec::new();
        let mut color_refs = Vec::new();
        for attachment in &desc.color_attachments {
            color_refs.push(vk::AttachmentReference::builder()
                .attachment(attachments.len() as u32)
                .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .build());
            attachments.push(attachment_description(attachment, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL));
        }
        let depth_ref = desc.depth_stencil_attachment.as_ref().map(|attachment| {
            let reference = vk::AttachmentReference::builder()
                .attachment(attachments.len() as u32)
                .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .build();
            attachments.push(attachment_description(
                attachment,
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ));
            reference
        });
        let mut input_refs = Vec::new();
        for attachment in &desc.input_attachments {
            input_refs.push(vk::AttachmentReference::builder()
                .attachment(attachments.len() as u32)
                .layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .build());
            attachments.push(attachment_description(attachment, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL));
        }

        let mut subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .input_attachments(&input_refs);
        if let Some(depth_ref) = &depth_ref {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }
        let subpasses = &[subpass];

        let info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(subpasses);
        let vk_render_pass = unsafe { self.device.create_render_pass(&info, None)? };
        self.set_debug_label(vk_render_pass.as_raw(), vk::ObjectType::RENDER_PASS, desc.label.as_deref());
        Ok(self.render_passes.insert(RenderPass { desc, vk_render_pass }))
    }

    pub fn ref_render_pass(&self, handle: Handle<RenderPass>) -> u64 {
        self.render_passes.inc_ref(handle)
    }

    pub fn unref_render_pass(&mut self, handle: Handle<RenderPass>) {
        if let Some(render_pass) = self.render_passes.dec_ref(handle) {
            unsafe { self.device.destroy_render_pass(render_pass.vk_render_pass, None) };
        }
    }

    pub fn render_pass(&self, handle: Handle<RenderPass>) -> Option<&RenderPass> {
        self.render_passes.get(handle)
    }

    // ---- Framebuffer ------------------------------------------------

    pub fn create_framebuffer(&mut self, desc: FramebufferDesc) -> Result<Handle<Framebuffer>> {
        let render_pass = self
            .render_passes
            .get(desc.render_pass)
            .ok_or(Error::InvalidHandle)?;
        desc.check_compatible(&render_pass.desc)?;

        let attachments: Vec<vk::ImageView> = desc
            .attachments
            .iter()
            .map(|&handle| self.image_views.get(handle).map(|v| v.vk_view))
            .collect::<Option<_>>()
            .ok_or(Error::InvalidHandle)?;

        let info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass.vk_render_pass)
            .attachments(&attachments)
            .width(desc.width)
            .height(desc.height)
            .layers(desc.layers);
        let vk_framebuffer = unsafe { self.device.create_framebuffer(&info, None)? };

        self.render_passes.inc_ref(desc.render_pass);
        for &view in &desc.attachments {
            self.image_views.inc_ref(view);
        }

        Ok(self.framebuffers.insert(Framebuffer { desc, vk_framebuffer }))
    }

    pub fn unref_framebuffer(&mut self, handle: Handle<Framebuffer>) {
        if let Some(framebuffer) = self.framebuffers.dec_ref(handle) {
            unsafe { self.device.destroy_framebuffer(framebuffer.vk_framebuffer, None) };
            self.unref_render_pass(framebuffer.desc.render_pass);
            for view in framebuffer.desc.attachments {
                self.unref_image_view(view);
            }
        }
    }

    pub fn framebuffer(&self, handle: Handle<Framebuffer>) -> Option<&Framebuffer> {
        self.framebuffers.get(handle)
    }

    // ---- DescriptorSetLayout ------------------------------------------

    pub fn create_descriptor_set_layout(
        &mut self,
        desc: DescriptorSetLayoutDesc,
    ) -> Result<Handle<DescriptorSetLayout>> {
        let bindings: Vec<_> = desc
            .bindings
            .iter()
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(binding.binding)
                    .descriptor_type(to_vk_descriptor_type(binding.descriptor_type))
                    .descriptor_count(binding.count)
                    .stage_flags(binding.stages)
                    .build()
            })
            .collect();
        let info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        let vk_layout = unsafe { self.device.create_descriptor_set_layout(&info, None)? };
        Ok(self.descriptor_set_layouts.insert(DescriptorSetLayout { desc, vk_layout }))
    }

    pub fn ref_descriptor_set_layout(&self, handle: Handle<DescriptorSetLayout>) -> u64 {
        self.descriptor_set_layouts.inc_ref(handle)
    }

    pub fn unref_descriptor_set_layout(&mut self, handle: Handle<DescriptorSetLayout>) {
        if let Some(layout) = self.descriptor_set_layouts.dec_ref(handle) {
            unsafe { self.device.destroy_descriptor_set_layout(layout.vk_layout, None) };
        }
    }

    pub fn descriptor_set_layout(&self, handle: Handle<DescriptorSetLayout>) -> Option<&DescriptorSetLayout> {
        self.descriptor_set_layouts.get(handle)
    }

    // ---- PipelineCache --------------------------------------------------

    pub fn create_pipeline_cache(&mut self, initial_data: &[u8]) -> Result<Handle<PipelineCache>> {
        let info = vk::PipelineCacheCreateInfo::builder().initial_data(initial_data);
        let vk_cache = unsafe { self.device.create_pipeline_cache(&info, None)? };
        Ok(self.pipeline_caches.insert(PipelineCache { vk_cache }))
    }

    pub fn get_pipeline_cache_data(&self, handle: Handle<PipelineCache>) -> Result<Vec<u8>> {
        let cache = self.pipeline_caches.get(handle).ok_or(Error::InvalidHandle)?;
        Ok(unsafe { self.device.get_pipeline_cache_data(cache.vk_cache)? })
    }

    pub fn merge_pipeline_cache(
        &self,
        dst: Handle<PipelineCache>,
        srcs: &[Handle<PipelineCache>],
    ) -> Result<()> {
        let dst = self.pipeline_caches.get(dst).ok_or(Error::InvalidHandle)?;
        let srcs: Vec<vk::PipelineCache> = srcs
            .iter()
            .map(|&h| self.pipeline_caches.get(h).map(|c| c.vk_cache))
            .collect::<Option<_>>()
            .ok_or(Error::InvalidHandle)?;
        unsafe { self.device.merge_pipeline_caches(dst.vk_cache, &srcs)? };
        Ok(())
    }

    pub fn unref_pipeline_cache(&mut self, handle: Handle<PipelineCache>) {
        if let Some(cache) = self.pipeline_caches.dec_ref(handle) {
            unsafe { self.device.destroy_pipeline_cache(cache.vk_cache, None) };
        }
    }

    // ---- Pipelines --------------------------------------------------------

    fn create_pipeline_layout(
        &self,
        layout: &crate::resource::pipeline::PipelineLayoutDesc,
    ) -> Result<vk::PipelineLayout> {
        layout.validate()?;
        let set_layouts: Vec<vk::DescriptorSetLayout> = layout
            .descriptor_set_layouts
            .iter()
            .map(|&h| self.descriptor_set_layouts.get(h).map(|l| l.vk_layout))
            .collect::<Option<_>>()
            .ok_or(Error::InvalidHandle)?;
        let push_constant_ranges = if layout.push_constant_size > 0 {
            vec![vk::PushConstantRange::builder()
                .stage_flags(vk::ShaderStageFlags::ALL)
                .offset(0)
                .size(layout.push_constant_size)
                .build()]
        } else {
            vec![]
        };
        let info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);
        Ok(unsafe { self.device.create_pipeline_layout(&info, None)? })
    }

    pub fn create_compute_pipeline(
        &mut self,
        desc: ComputePipelineDesc,
        cache: Option<Handle<PipelineCache>>,
    ) -> Result<Handle<ComputePipeline>> {
        let shader = self.shaders.get(desc.shader).ok_or(Error::InvalidHandle)?;
        let entry_point = std::ffi::CString::new(desc.entry_point.clone())
            .map_err(|_| Error::InitializationFailed)?;

        let vk_layout = self.create_pipeline_layout(&desc.layout)?;

        let stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(shader.vk_module)
            .name(entry_point.as_bytes_with_nul());
        let info = vk::ComputePipelineCreateInfo::builder()
            .stage(stage)
            .layout(vk_layout);
        let vk_cache = cache
            .and_then(|h| self.pipeline_caches.get(h))
            .map(|c| c.vk_cache)
            .unwrap_or(vk::PipelineCache::null());

        let vk_pipeline = match unsafe {
            self.device.create_compute_pipelines(vk_cache, &[info], None)
        } {
            Ok((pipelines, _)) => pipelines[0],
            Err(err) => {
                unsafe { self.device.destroy_pipeline_layout(vk_layout, None) };
                return Err(Error::from(err));
            }
        };

        self.set_debug_label(vk_pipeline.as_raw(), vk::ObjectType::PIPELINE, desc.label.as_deref());
        for &set_layout in &desc.layout.descriptor_set_layouts {
            self.descriptor_set_layouts.inc_ref(set_layout);
        }
        self.shaders.inc_ref(desc.shader);

        Ok(self.compute_pipelines.insert(ComputePipeline {
            desc,
            vk_pipeline,
            vk_layout,
        }))
    }

    pub fn unref_compute_pipeline(&mut self, handle: Handle<ComputePipeline>) {
        if let Some(pipeline) = self.compute_pipelines.dec_ref(handle) {
            unsafe {
                self.device.destroy_pipeline(pipeline.vk_pipeline, None);
                self.device.destroy_pipeline_layout(pipeline.vk_layout, None);
            }
            self.unref_shader(pipeline.desc.shader);
            for set_layout in pipeline.desc.layout.descriptor_set_layouts {
                self.unref_descriptor_set_layout(set_layout);
            }
        }
    }

    pub fn create_graphics_pipeline(
        &mut self,
        desc: GraphicsPipelineDesc,
        render_pass: Handle<RenderPass>,
        cache: Option<Handle<PipelineCache>>,
    ) -> Result<Handle<GraphicsPipeline>> {
        let vertex_shader = self.shaders.get(desc.vertex_shader).ok_or(Error::InvalidHandle)?.vk_module;
        let fragment_shader = match desc.fragment_shader {
            Some(h) => Some(self.shaders.get(h).ok_or(Error::InvalidHandle)?.vk_module),
            None => None,
        };
        let render_pass_vk = self
            .render_passes
            .get(render_pass)
            .ok_or(Error::InvalidHandle)?
            .vk_render_pass;

        let vk_layout = self.create_pipeline_layout(&desc.layout)?;

        let entry = c"main";
        let mut stages = vec![vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex_shader)
            .name(entry.to_bytes_with_nul())
            .build()];
        if let Some(fragment_shader) = fragment_shader {
            stages.push(
                vk::PipelineShaderStageCreateInfo::builder()
                    .stage(vk::ShaderStageFlags::FRAGMENT)
                    .module(fragment_shader)
                    .name(entry.to_bytes_with_nul())
                    .build(),
            );
        }

        let bindings: Vec<_> = desc
            .vertex_bindings
            .iter()
            .map(|b| {
                vk::VertexInputBindingDescription::builder()
                    .binding(b.binding)
                    .stride(b.stride)
                    .input_rate(if b.per_instance {
                        vk::VertexInputRate::INSTANCE
                    } else {
                        vk::VertexInputRate::VERTEX
                    })
                    .build()
            })
            .collect();
        let attributes: Vec<_> = desc
            .vertex_attributes
            .iter()
            .map(|a| {
                vk::VertexInputAttributeDescription::builder()
                    .location(a.location)
                    .binding(a.binding)
                    .format(a.format.to_vk())
                    .offset(a.offset)
                    .build()
            })
            .collect();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(to_vk_topology(desc.topology))
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(desc.rasterization.depth_clamp_enable)
            .rasterizer_discard_enable(false)
            .polygon_mode(to_vk_polygon_mode(desc.rasterization.polygon_mode))
            .line_width(1.0)
            .cull_mode(to_vk_cull_mode(desc.rasterization.cull_mode))
            .front_face(to_vk_front_face(desc.rasterization.front_face))
            .depth_bias_enable(desc.rasterization.depth_bias_enable)
            .depth_bias_constant_factor(desc.rasterization.depth_bias_constant_factor)
            .depth_bias_slope_factor(desc.rasterization.depth_bias_slope_factor);

        // Fixed single-sample multisample state (§4.5; MSAA is out of scope).
        let multisample = vk::PipelineMultisampleStateCreateInfo::builder()
            .rasterization_samples(vk::SampleCountFlags::_1)
            .sample_shading_enable(false);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(desc.depth_stencil.depth_test_enable)
            .depth_write_enable(desc.depth_stencil.depth_write_enable)
            .depth_compare_op(to_vk_compare_op(desc.depth_stencil.depth_compare_op))
            .depth_bounds_test_enable(desc.depth_stencil.depth_bounds_test_enable)
            .min_depth_bounds(desc.depth_stencil.min_depth_bounds)
            .max_depth_bounds(desc.depth_stencil.max_depth_bounds)
            .stencil_test_enable(desc.depth_stencil.stencil_test_enable)
            .front(to_vk_stencil_op_state(desc.depth_stencil.front))
            .back(to_vk_stencil_op_state(desc.depth_stencil.back));

        let attachments: Vec<_> = desc
            .color_blend_attachments
            .iter()
            .map(to_vk_blend_attachment)
            .collect();
        let color_blend = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&attachments)
            .blend_constants(desc.blend_constants);

        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder()
            .dynamic_states(crate::resource::pipeline::DYNAMIC_STATES);

        let info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(vk_layout)
            .render_pass(render_pass_vk)
            .subpass(0);

        let vk_cache = cache
            .and_then(|h| self.pipeline_caches.get(h))
            .map(|c| c.vk_cache)
            .unwrap_or(vk::PipelineCache::null());

        let vk_pipeline = match unsafe {
            self.device.create_graphics_pipelines(vk_cache, &[info], None)
        } {
            Ok((pipelines, _)) => pipelines[0],
            Err(err) => {
                unsafe { self.device.destroy_pipeline_layout(vk_layout, None) };
                return Err(Error::from(err));
            }
        };

        self.set_debug_label(vk_pipeline.as_raw(), vk::ObjectType::PIPELINE, desc.label.as_deref());
        self.shaders.inc_ref(desc.vertex_shader);
        if let Some(fragment_shader) = desc.fragment_shader {
            self.shaders.inc_ref(fragment_shader);
        }
        self.render_passes.inc_ref(render_pass);
        for &set_layout in &desc.layout.descriptor_set_layouts {
            self.descriptor_set_layouts.inc_ref(set_layout);
        }

        Ok(self.graphics_pipelines.insert(GraphicsPipeline {
            desc,
            render_pass,
            vk_pipeline,
            vk_layout,
        }))
    }

    pub fn unref_graphics_pipeline(&mut self, handle: Handle<GraphicsPipeline>) {
        if let Some(pipeline) = self.graphics_pipelines.dec_ref(handle) {
            unsafe {
                self.device.destroy_pipeline(pipeline.vk_pipeline, None);
                self.device.destroy_pipeline_layout(pipeline.vk_layout, None);
            }
            self.unref_shader(pipeline.desc.vertex_shader);
            if let Some(fragment_shader) = pipeline.desc.fragment_shader {
                self.unref_shader(fragment_shader);
            }
            self.unref_render_pass(pipeline.render_pass);
            for set_layout in pipeline.desc.layout.descriptor_set_layouts {
                self.unref_descriptor_set_layout(set_layout);
            }
        }
    }

    pub fn compute_pipeline(&self, handle: Handle<ComputePipeline>) -> Option<&ComputePipeline> {
        self.compute_pipelines.get(handle)
    }

    pub fn graphics_pipeline(&self, handle: Handle<GraphicsPipeline>) -> Option<&GraphicsPipeline> {
        self.graphics_pipelines.get(handle)
    }

    // ---- Fence ----------------------------------------------------------

    pub fn create_fence(&mut self, desc: FenceDesc) -> Result<Handle<Fence>> {
        let flags = if desc.signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let info = vk::FenceCreateInfo::builder().flags(flags);
        let vk_fence = unsafe { self.device.create_fence(&info, None)? };
        self.set_debug_label(vk_fence.as_raw(), vk::ObjectType::FENCE, desc.label.as_deref());
        Ok(self.fences.insert(Fence { desc, vk_fence }))
    }

    pub fn wait_for_fences(&self, handles: &[Handle<Fence>], wait_all: bool, timeout: u64) -> Result<()> {
        let fences: Vec<vk::Fence> = handles
            .iter()
            .map(|&h| self.fences.get(h).map(|f| f.vk_fence))
            .collect::<Option<_>>()
            .ok_or(Error::InvalidHandle)?;
        unsafe { self.device.wait_for_fences(&fences, wait_all, timeout)? };
        Ok(())
    }

    pub fn reset_fences(&self, handles: &[Handle<Fence>]) -> Result<()> {
        let fences: Vec<vk::Fence> = handles
            .iter()
            .map(|&h| self.fences.get(h).map(|f| f.vk_fence))
            .collect::<Option<_>>()
            .ok_or(Error::InvalidHandle)?;
        unsafe { self.device.reset_fences(&fences)? };
        Ok(())
    }

    pub fn unref_fence(&mut self, handle: Handle<Fence>) {
        if let Some(fence) = self.fences.dec_ref(handle) {
            unsafe { self.device.destroy_fence(fence.vk_fence, None) };
        }
    }

    pub fn fence(&self, handle: Handle<Fence>) -> Option<&Fence> {
        self.fences.get(handle)
    }

    // ---- Descriptor heap --------------------------------------------------

    pub fn create_descriptor_heap(
        &mut self,
        desc: DescriptorHeapDesc,
    ) -> Result<Handle<DescriptorHeap>> {
        let mut layout_descs = Vec::with_capacity(desc.set_layouts.len());
        let mut vk_set_layouts = Vec::with_capacity(desc.set_layouts.len());
        for &h in &desc.set_layouts {
            let layout = self.descriptor_set_layouts.get(h).ok_or(Error::InvalidHandle)?;
            layout_descs.push(layout.desc.clone());
            vk_set_layouts.push(layout.vk_layout);
        }
        for &h in &desc.set_layouts {
            self.descriptor_set_layouts.inc_ref(h);
        }
        let heap = DescriptorHeap::new(desc, layout_descs, vk_set_layouts);
        Ok(self.descriptor_heaps.insert(heap))
    }

    pub fn unref_descriptor_heap(&mut self, handle: Handle<DescriptorHeap>) {
        if let Some(heap) = self.descriptor_heaps.dec_ref(handle) {
            for pool in &heap.pools {
                unsafe { self.device.destroy_descriptor_pool(pool.vk_pool, None) };
            }
            for set_layout in heap.desc.set_layouts {
                self.unref_descriptor_set_layout(set_layout);
            }
        }
    }

    pub fn descriptor_heap(&self, handle: Handle<DescriptorHeap>) -> Option<&DescriptorHeap> {
        self.descriptor_heaps.get(handle)
    }

    pub fn descriptor_heap_stats(&self, handle: Handle<DescriptorHeap>) -> Option<DescriptorHeapStats> {
        self.descriptor_heaps.get(handle).map(|h| h.get_stats())
    }

    pub fn mark_group_in_use(&mut self, handle: Handle<DescriptorHeap>, group: u32, current_frame: u64) {
        if let Some(heap) = self.descriptor_heaps.get_mut(handle) {
            heap.mark_in_use(group, current_frame);
        }
    }

    pub fn is_group_in_use(&self, handle: Handle<DescriptorHeap>, group: u32, trailing_frame: u64) -> bool {
        self.descriptor_heaps
            .get(handle)
            .map(|h| h.is_in_use(group, trailing_frame))
            .unwrap_or(false)
    }

    pub fn release_group(&mut self, handle: Handle<DescriptorHeap>, group: u32) {
        if let Some(heap) = self.descriptor_heaps.get_mut(handle) {
            heap.release(group);
        }
    }

    /// Implements the promote/reuse/grow algorithm of §4.3.
    pub fn add_group(&mut self, handle: Handle<DescriptorHeap>, trailing_frame: u64) -> Result<u32> {
        let heap = self.descriptor_heaps.get_mut(handle).ok_or(Error::InvalidHandle)?;
        heap.promote(trailing_frame);
        if heap.free.is_empty() {
            self.grow_descriptor_heap(handle)?;
        }
        let heap = self.descriptor_heaps.get_mut(handle).ok_or(Error::InvalidHandle)?;
        let group = heap.free.pop().expect("grow_descriptor_heap must populate free");
        heap.zero_shadow(group);
        Ok(group)
    }

    fn grow_descriptor_heap(&mut self, handle: Handle<DescriptorHeap>) -> Result<()> {
        let heap = self.descriptor_heaps.get(handle).ok_or(Error::InvalidHandle)?;
        let ngpp = heap.desc.num_groups_per_pool;
        let num_sets = heap.vk_set_layouts.len();

        let mut pool_sizes: Vec<(vk::DescriptorType, u32)> = Vec::new();
        for layout in &heap.layout_descs {
            for binding in &layout.bindings {
                let ty = to_vk_descriptor_type(binding.descriptor_type);
                let count = binding.count * ngpp;
                match pool_sizes.iter_mut().find(|(t, _)| *t == ty) {
                    Some(entry) => entry.1 += count,
                    None => pool_sizes.push((ty, count)),
                }
            }
        }
        let pool_sizes: Vec<vk::DescriptorPoolSize> = pool_sizes
            .into_iter()
            .map(|(ty, count)| {
                vk::DescriptorPoolSize::builder()
                    .type_(ty)
                    .descriptor_count(count)
                    .build()
            })
            .collect();

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&pool_sizes)
            .max_sets(ngpp * num_sets as u32);
        let vk_pool = unsafe { self.device.create_descriptor_pool(&pool_info, None)? };

        let mut set_layouts_flat = Vec::with_capacity(ngpp as usize * num_sets);
        for _ in 0..ngpp {
            set_layouts_flat.extend_from_slice(&heap.vk_set_layouts);
        }
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(vk_pool)
            .set_layouts(&set_layouts_flat);
        let flat_sets = match unsafe { self.device.allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => sets,
            Err(err) => {
                unsafe { self.device.destroy_descriptor_pool(vk_pool, None) };
                return Err(Error::from(err));
            }
        };
        let sets: Vec<Vec<vk::DescriptorSet>> =
            flat_sets.chunks(num_sets).map(|c| c.to_vec()).collect();

        let heap = self.descriptor_heaps.get_mut(handle).ok_or(Error::InvalidHandle)?;
        let pool_index = heap.pools.len() as u32;
        heap.pools.push(Pool { vk_pool, sets });
        for _ in 0..ngpp {
            let shadow: Vec<Vec<ShadowElement>> = heap
                .layout_descs
                .iter()
                .map(|l| vec![ShadowElement::Empty; l.shadow_len()])
                .collect();
            heap.shadows.push(shadow);
            heap.last_use.push(0);
        }
        let start = pool_index * ngpp;
        for i in (0..ngpp).rev() {
            heap.free.push(start + i);
        }
        Ok(())
    }

    fn descriptor_write_target(
        &self,
        handle: Handle<DescriptorHeap>,
        group: u32,
        set_index: usize,
        binding: u32,
        element_start: u32,
        count: u32,
        expected: DescriptorType,
    ) -> Result<vk::DescriptorSet> {
        let heap = self.descriptor_heaps.get(handle).ok_or(Error::InvalidHandle)?;
        let layout = heap.layout_descs.get(set_index).ok_or(Error::InvalidHandle)?;
        let binding_desc = layout
            .bindings
            .iter()
            .find(|b| b.binding == binding)
            .ok_or(Error::InvalidHandle)?;
        if binding_desc.descriptor_type != expected {
            return Err(Error::InvalidHandle);
        }
        if element_start + count > binding_desc.count {
            return Err(Error::InvalidHandle);
        }
        heap.set_handle(group, set_index).ok_or(Error::InvalidHandle)
    }

    fn shadow_offset(
        &self,
        handle: Handle<DescriptorHeap>,
        set_index: usize,
        binding: u32,
        element_start: u32,
    ) -> usize {
        let heap = self.descriptor_heaps.get(handle).expect("validated above");
        let layout = &heap.layout_descs[set_index];
        let binding_index = layout.bindings.iter().position(|b| b.binding == binding).unwrap();
        heap.binding_offsets[set_index][binding_index] + element_start as usize
    }

    pub fn write_sampler(
        &mut self,
        handle: Handle<DescriptorHeap>,
        group: u32,
        set_index: usize,
        binding: u32,
        element_start: u32,
        samplers: &[Handle<Sampler>],
    ) -> Result<()> {
        let vk_set = self.descriptor_write_target(
            handle,
            group,
            set_index,
            binding,
            element_start,
            samplers.len() as u32,
            DescriptorType::Sampler,
        )?;
        let offset = self.shadow_offset(handle, set_index, binding, element_start);

        let mut infos = Vec::with_capacity(samplers.len());
        for &h in samplers {
            let sampler = self.samplers.get(h).ok_or(Error::InvalidHandle)?;
            infos.push(
                vk::DescriptorImageInfo::builder()
                    .sampler(sampler.vk_sampler)
                    .build(),
            );
        }
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(vk_set)
            .dst_binding(binding)
            .dst_array_element(element_start)
            .descriptor_type(vk::DescriptorType::SAMPLER)
            .image_info(&infos);
        unsafe { self.device.update_descriptor_sets(&[write], &[] as &[vk::CopyDescriptorSet]) };

        let heap = self.descriptor_heaps.get_mut(handle).unwrap();
        for (i, &h) in samplers.iter().enumerate() {
            heap.shadows[group as usize][set_index][offset + i] = ShadowElement::Sampler(h);
        }
        Ok(())
    }

    pub fn write_combined_image_sampler(
        &mut self,
        handle: Handle<DescriptorHeap>,
        group: u32,
        set_index: usize,
        binding: u32,
        element_start: u32,
        images: &[(Handle<ImageView>, Handle<Sampler>)],
    ) -> Result<()> {
        let vk_set = self.descriptor_write_target(
            handle,
            group,
            set_index,
            binding,
            element_start,
            images.len() as u32,
            DescriptorType::CombinedImageSampler,
        )?;
        let offset = self.shadow_offset(handle, set_index, binding, element_start);

        let mut infos = Vec::with_capacity(images.len());
        let mut layout = vk::ImageLayout::UNDEFINED;
        for &(view_handle, sampler_handle) in images {
            let view = self.image_views.get(view_handle).ok_or(Error::InvalidHandle)?;
            let image = self.images.get(view.desc.image).ok_or(Error::InvalidHandle)?;
            if !image.desc.usage.contains(crate::types::ImageUsage::SAMPLED) {
                return Err(Error::InvalidHandle);
            }
            let sampler = self.samplers.get(sampler_handle).ok_or(Error::InvalidHandle)?;
            layout = image.state.current_layout();
            infos.push(
                vk::DescriptorImageInfo::builder()
                    .sampler(sampler.vk_sampler)
                    .image_view(view.vk_view)
                    .image_layout(layout)
                    .build(),
            );
        }
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(vk_set)
            .dst_binding(binding)
            .dst_array_element(element_start)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&infos);
        unsafe { self.device.update_descriptor_sets(&[write], &[] as &[vk::CopyDescriptorSet]) };

        let heap = self.descriptor_heaps.get_mut(handle).unwrap();
        for (i, &(view_handle, sampler_handle)) in images.iter().enumerate() {
            heap.shadows[group as usize][set_index][offset + i] = ShadowElement::CombinedImageSampler {
                view: view_handle,
                sampler: sampler_handle,
                layout,
            };
        }
        Ok(())
    }

    fn write_sampled_or_storage_image(
        &mut self,
        handle: Handle<DescriptorHeap>,
        group: u32,
        set_index: usize,
        binding: u32,
        element_start: u32,
        views: &[Handle<ImageView>],
        descriptor_type: DescriptorType,
        vk_descriptor_type: vk::DescriptorType,
        required_usage: crate::types::ImageUsage,
    ) -> Result<()> {
        let vk_set = self.descriptor_write_target(
            handle,
            group,
            set_index,
            binding,
            element_start,
            views.len() as u32,
            descriptor_type,
        )?;
        let offset = self.shadow_offset(handle, set_index, binding, element_start);

        let mut infos = Vec::with_capacity(views.len());
        let mut layouts = Vec::with_capacity(views.len());
        for &view_handle in views {
            let view = self.image_views.get(view_handle).ok_or(Error::InvalidHandle)?;
            let image = self.images.get(view.desc.image).ok_or(Error::InvalidHandle)?;
            if !image.desc.usage.contains(required_usage) {
                return Err(Error::InvalidHandle);
            }
            let layout = image.state.current_layout();
            layouts.push(layout);
            infos.push(
                vk::DescriptorImageInfo::builder()
                    .image_view(view.vk_view)
                    .image_layout(layout)
                    .build(),
            );
        }
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(vk_set)
            .dst_binding(binding)
            .dst_array_element(element_start)
            .descriptor_type(vk_descriptor_type)
            .image_info(&infos);
        unsafe { self.device.update_descriptor_sets(&[write], &[] as &[vk::CopyDescriptorSet]) };

        let heap = self.descriptor_heaps.get_mut(handle).unwrap();
        for (i, (&view_handle, &layout)) in views.iter().zip(layouts.iter()).enumerate() {
            heap.shadows[group as usize][set_index][offset + i] =
                ShadowElement::Image { view: view_handle, layout };
        }
        Ok(())
    }

    pub fn write_sampled_image(
        &mut self,
        handle: Handle<DescriptorHeap>,
        group: u32,
        set_index: usize,
        binding: u32,
        element_start: u32,
        views: &[Handle<ImageView>],
    ) -> Result<()> {
        self.write_sampled_or_storage_image(
            handle,
            group,
            set_index,
            binding,
            element_start,
            views,
            DescriptorType::SampledImage,
            vk::DescriptorType::SAMPLED_IMAGE,
            crate::types::ImageUsage::SAMPLED,
        )
    }

    pub fn write_storage_image(
        &mut self,
        handle: Handle<DescriptorHeap>,
        group: u32,
        set_index: usize,
        binding: u32,
        element_start: u32,
        views: &[Handle<ImageView>],
    ) -> Result<()> {
        self.write_sampled_or_storage_image(
            handle,
            group,
            set_index,
            binding,
            element_start,
            views,
            DescriptorType::StorageImage,
            vk::DescriptorType::STORAGE_IMAGE,
            crate::types::ImageUsage::STORAGE,
        )
    }

    pub fn write_input_attachment(
        &mut self,
        handle: Handle<DescriptorHeap>,
        group: u32,
        set_index: usize,
        binding: u32,
        element_start: u32,
        views: &[Handle<ImageView>],
    ) -> Result<()> {
        self.write_sampled_or_storage_image(
            handle,
            group,
            set_index,
            binding,
            element_start,
            views,
            DescriptorType::InputAttachment,
            vk::DescriptorType::INPUT_ATTACHMENT,
            crate::types::ImageUsage::INPUT_ATTACHMENT,
        )
    }

    fn write_texel_buffer_view(
        &mut self,
        handle: Handle<DescriptorHeap>,
        group: u32,
        set_index: usize,
        binding: u32,
        element_start: u32,
        views: &[Handle<BufferView>],
        descriptor_type: DescriptorType,
        vk_descriptor_type: vk::DescriptorType,
        required_usage: BufferUsage,
    ) -> Result<()> {
        let vk_set = self.descriptor_write_target(
            handle,
            group,
            set_index,
            binding,
            element_start,
            views.len() as u32,
            descriptor_type,
        )?;
        let offset = self.shadow_offset(handle, set_index, binding, element_start);

        let mut vk_views = Vec::with_capacity(views.len());
        for &view_handle in views {
            let view = self.buffer_views.get(view_handle).ok_or(Error::InvalidHandle)?;
            let buffer = self.buffers.get(view.desc.buffer).ok_or(Error::InvalidHandle)?;
            if !buffer.desc.usage.contains(required_usage) {
                return Err(Error::InvalidHandle);
            }
            vk_views.push(view.vk_view);
        }
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(vk_set)
            .dst_binding(binding)
            .dst_array_element(element_start)
            .descriptor_type(vk_descriptor_type)
            .texel_buffer_view(&vk_views);
        unsafe { self.device.update_descriptor_sets(&[write], &[] as &[vk::CopyDescriptorSet]) };

        let heap = self.descriptor_heaps.get_mut(handle).unwrap();
        for (i, &view_handle) in views.iter().enumerate() {
            heap.shadows[group as usize][set_index][offset + i] =
                ShadowElement::TexelBufferView(view_handle);
        }
        Ok(())
    }

    pub fn write_uniform_texel_buffer(
        &mut self,
        handle: Handle<DescriptorHeap>,
        group: u32,
        set_index: usize,
        binding: u32,
        element_start: u32,
        views: &[Handle<BufferView>],
    ) -> Result<()> {
        self.write_texel_buffer_view(
            handle,
            group,
            set_index,
            binding,
            element_start,
            views,
            DescriptorType::UniformTexelBuffer,
            vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
            BufferUsage::UNIFORM_TEXEL_BUFFER,
        )
    }

    pub fn write_storage_texel_buffer(
        &mut self,
        handle: Handle<DescriptorHeap>,
        group: u32,
        set_index: usize,
        binding: u32,
        element_start: u32,
        views: &[Handle<BufferView>],
    ) -> Result<()> {
        self.write_texel_buffer_view(
            handle,
            group,
            set_index,
            binding,
            element_start,
            views,
            DescriptorType::StorageTexelBuffer,
            vk::DescriptorType::STORAGE_TEXEL_BUFFER,
            BufferUsage::STORAGE_TEXEL_BUFFER,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn write_buffer_descriptor(
        &mut self,
        handle: Handle<DescriptorHeap>,
        group: u32,
        set_index: usize,
        binding: u32,
        element_start: u32,
        buffers: &[(Handle<Buffer>, vk::DeviceSize, vk::DeviceSize)],
        descriptor_type: DescriptorType,
        vk_descriptor_type: vk::DescriptorType,
        required_usage: BufferUsage,
    ) -> Result<()> {
        let vk_set = self.descriptor_write_target(
            handle,
            group,
            set_index,
            binding,
            element_start,
            buffers.len() as u32,
            descriptor_type,
        )?;
        let offset = self.shadow_offset(handle, set_index, binding, element_start);

        let mut infos = Vec::with_capacity(buffers.len());
        for &(buffer_handle, buf_offset, range) in buffers {
            let buffer = self.buffers.get(buffer_handle).ok_or(Error::InvalidHandle)?;
            if !buffer.desc.usage.contains(required_usage) {
                return Err(Error::InvalidHandle);
            }
            infos.push(
                vk::DescriptorBufferInfo::builder()
                    .buffer(buffer.vk_buffer)
                    .offset(buf_offset)
                    .range(range)
                    .build(),
            );
        }
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(vk_set)
            .dst_binding(binding)
            .dst_array_element(element_start)
            .descriptor_type(vk_descriptor_type)
            .buffer_info(&infos);
        unsafe { self.device.update_descriptor_sets(&[write], &[] as &[vk::CopyDescriptorSet]) };

        let heap = self.descriptor_heaps.get_mut(handle).unwrap();
        for (i, &(buffer_handle, buf_offset, range)) in buffers.iter().enumerate() {
            heap.shadows[group as usize][set_index][offset + i] = ShadowElement::Buffer {
                buffer: buffer_handle,
                offset: buf_offset,
                range,
            };
        }
        Ok(())
    }

    pub fn write_uniform_buffer(
        &mut self,
        handle: Handle<DescriptorHeap>,
        group: u32,
        set_index: usize,
        binding: u32,
        element_start: u32,
        buffers: &[(Handle<Buffer>, vk::DeviceSize, vk::DeviceSize)],
    ) -> Result<()> {
        self.write_buffer_descriptor(
            handle,
            group,
            set_index,
            binding,
            element_start,
            buffers,
            DescriptorType::UniformBuffer,
            vk::DescriptorType::UNIFORM_BUFFER,
            BufferUsage::UNIFORM_BUFFER,
        )
    }

    pub fn write_storage_buffer(
        &mut self,
        handle: Handle<DescriptorHeap>,
        group: u32,
        set_index: usize,
        binding: u32,
        element_start: u32,
        buffers: &[(Handle<Buffer>, vk::DeviceSize, vk::DeviceSize)],
    ) -> Result<()> {
        self.write_buffer_descriptor(
            handle,
            group,
            set_index,
            binding,
            element_start,
            buffers,
            DescriptorType::StorageBuffer,
            vk::DescriptorType::STORAGE_BUFFER,
            BufferUsage::STORAGE_BUFFER,
        )
    }

    pub fn write_dynamic_uniform_buffer(
        &mut self,
        handle: Handle<DescriptorHeap>,
        group: u32,
        set_index: usize,
        binding: u32,
        element_start: u32,
        buffers: &[(Handle<Buffer>, vk::DeviceSize, vk::DeviceSize)],
    ) -> Result<()> {
        self.write_buffer_descriptor(
            handle,
            group,
            set_index,
            binding,
            element_start,
            buffers,
            DescriptorType::UniformBufferDynamic,
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            BufferUsage::UNIFORM_BUFFER,
        )
    }

    pub fn write_dynamic_storage_buffer(
        &mut self,
        handle: Handle<DescriptorHeap>,
        group: u32,
        set_index: usize,
        binding: u32,
        element_start: u32,
        buffers: &[(Handle<Buffer>, vk::DeviceSize, vk::DeviceSize)],
    ) -> Result<()> {
        self.write_buffer_descriptor(
            handle,
            group,
            set_index,
            binding,
            element_start,
            buffers,
            DescriptorType::StorageBufferDynamic,
            vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
            BufferUsage::STORAGE_BUFFER,
        )
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe { self.device.destroy_device(None) };
    }
}

fn attachment_description(attachment: &AttachmentDesc, final_layout: vk::ImageLayout) -> vk::AttachmentDescription {
    vk::AttachmentDescription::builder()
        .format(attachment.format.to_vk())
        .samples(attachment.sample_count)
        .load_op(to_vk_load_op(attachment.load_op))
        .store_op(to_vk_store_op(attachment.store_op))
        .stencil_load_op(to_vk_load_op(attachment.stencil_load_op))
        .stencil_store_op(to_vk_store_op(attachment.stencil_store_op))
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(final_layout)
        .build()
}

fn bytemuck_words(code: &[u8]) -> &[u32] {
    // SAFETY: length checked to be a multiple of 4 by the caller; SPIR-V
    // words are little-endian on every platform this crate targets.
    unsafe {
        std::slice::from_raw_parts(code.as_ptr().cast::<u32>(), code.len() / 4)
    }
}

fn to_vk_buffer_usage(usage: BufferUsage) -> vk::BufferUsageFlags {
    vk::BufferUsageFlags::from_bits_truncate(usage.bits())
}

fn to_vk_image_usage(usage: crate::types::ImageUsage) -> vk::ImageUsageFlags {
    vk::ImageUsageFlags::from_bits_truncate(usage.bits())
}

fn to_vk_aspects(aspects: crate::types::ImageAspects) -> vk::ImageAspectFlags {
    vk::ImageAspectFlags::from_bits_truncate(aspects.bits())
}

fn to_vk_memory_properties(properties: MemoryProperties) -> vk::MemoryPropertyFlags {
    vk::MemoryPropertyFlags::from_bits_truncate(properties.bits())
}

fn to_vk_image_type(image_type: crate::resource::ImageType) -> vk::ImageType {
    match image_type {
        crate::resource::ImageType::OneD => vk::ImageType::_1D,
        crate::resource::ImageType::TwoD => vk::ImageType::_2D,
        crate::resource::ImageType::ThreeD => vk::ImageType::_3D,
    }
}

fn to_vk_filter(filter: crate::types::Filter) -> vk::Filter {
    match filter {
        crate::types::Filter::Nearest => vk::Filter::NEAREST,
        crate::types::Filter::Linear => vk::Filter::LINEAR,
    }
}

fn to_vk_mipmap_mode(filter: crate::types::Filter) -> vk::SamplerMipmapMode {
    match filter {
        crate::types::Filter::Nearest => vk::SamplerMipmapMode::NEAREST,
        crate::types::Filter::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

fn to_vk_address_mode(mode: crate::types::SamplerAddressMode) -> vk::SamplerAddressMode {
    use crate::types::SamplerAddressMode::*;
    match mode {
        Repeat => vk::SamplerAddressMode::REPEAT,
        MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

fn to_vk_compare_op(op: crate::types::CompareOp) -> vk::CompareOp {
    use crate::types::CompareOp::*;
    match op {
        Never => vk::CompareOp::NEVER,
        Less => vk::CompareOp::LESS,
        Equal => vk::CompareOp::EQUAL,
        LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        Greater => vk::CompareOp::GREATER,
        NotEqual => vk::CompareOp::NOT_EQUAL,
        GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        Always => vk::CompareOp::ALWAYS,
    }
}

fn to_vk_topology(topology: crate::types::PrimitiveTopology) -> vk::PrimitiveTopology {
    use crate::types::PrimitiveTopology::*;
    match topology {
        PointList => vk::PrimitiveTopology::POINT_LIST,
        LineList => vk::PrimitiveTopology::LINE_LIST,
        LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        TriangleFan => vk::PrimitiveTopology::TRIANGLE_FAN,
    }
}

fn to_vk_polygon_mode(mode: crate::types::PolygonMode) -> vk::PolygonMode {
    match mode {
        crate::types::PolygonMode::Fill => vk::PolygonMode::FILL,
        crate::types::PolygonMode::Line => vk::PolygonMode::LINE,
        crate::types::PolygonMode::Point => vk::PolygonMode::POINT,
    }
}

fn to_vk_cull_mode(mode: crate::types::CullMode) -> vk::CullModeFlags {
    use crate::types::CullMode::*;
    match mode {
        None => vk::CullModeFlags::NONE,
        Front => vk::CullModeFlags::FRONT,
        Back => vk::CullModeFlags::BACK,
        FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

fn to_vk_front_face(face: crate::types::FrontFace) -> vk::FrontFace {
    match face {
        crate::types::FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        crate::types::FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

fn to_vk_stencil_op(op: crate::types::StencilOp) -> vk::StencilOp {
    use crate::types::StencilOp::*;
    match op {
        Keep => vk::StencilOp::KEEP,
        Zero => vk::StencilOp::ZERO,
        Replace => vk::StencilOp::REPLACE,
        IncrementAndClamp => vk::StencilOp::INCREMENT_AND_CLAMP,
        DecrementAndClamp => vk::StencilOp::DECREMENT_AND_CLAMP,
        Invert => vk::StencilOp::INVERT,
        IncrementAndWrap => vk::StencilOp::INCREMENT_AND_WRAP,
        DecrementAndWrap => vk::StencilOp::DECREMENT_AND_WRAP,
    }
}

fn to_vk_stencil_op_state(
    state: crate::resource::pipeline::StencilOpState,
) -> vk::StencilOpState {
    vk::StencilOpState::builder()
        .fail_op(to_vk_stencil_op(state.fail_op))
        .pass_op(to_vk_stencil_op(state.pass_op))
        .depth_fail_op(to_vk_stencil_op(state.depth_fail_op))
        .compare_op(to_vk_compare_op(state.compare_op))
        .compare_mask(0xff)
        .write_mask(0xff)
        .reference(0)
        .build()
}

fn to_vk_blend_factor(factor: crate::types::BlendFactor) -> vk::BlendFactor {
    use crate::types::BlendFactor::*;
    match factor {
        Zero => vk::BlendFactor::ZERO,
        One => vk::BlendFactor::ONE,
        SrcColor => vk::BlendFactor::SRC_COLOR,
        OneMinusSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        DstColor => vk::BlendFactor::DST_COLOR,
        OneMinusDstColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        DstAlpha => vk::BlendFactor::DST_ALPHA,
        OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
    }
}

fn to_vk_blend_op(op: crate::types::BlendOp) -> vk::BlendOp {
    use crate::types::BlendOp::*;
    match op {
        Add => vk::BlendOp::ADD,
        Subtract => vk::BlendOp::SUBTRACT,
        ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        Min => vk::BlendOp::MIN,
        Max => vk::BlendOp::MAX,
    }
}

fn to_vk_color_components(mask: crate::types::ColorComponents) -> vk::ColorComponentFlags {
    use crate::types::ColorComponents;
    let mut out = vk::ColorComponentFlags::empty();
    if mask.contains(ColorComponents::R) {
        out |= vk::ColorComponentFlags::R;
    }
    if mask.contains(ColorComponents::G) {
        out |= vk::ColorComponentFlags::G;
    }
    if mask.contains(ColorComponents::B) {
        out |= vk::ColorComponentFlags::B;
    }
    if mask.contains(ColorComponents::A) {
        out |= vk::ColorComponentFlags::A;
    }
    out
}

fn to_vk_blend_attachment(
    desc: &crate::resource::pipeline::ColorBlendAttachmentDesc,
) -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::builder()
        .blend_enable(desc.blend_enable)
        .src_color_blend_factor(to_vk_blend_factor(desc.src_color_factor))
        .dst_color_blend_factor(to_vk_blend_factor(desc.dst_color_factor))
        .color_blend_op(to_vk_blend_op(desc.color_blend_op))
        .src_alpha_blend_factor(to_vk_blend_factor(desc.src_alpha_factor))
        .dst_alpha_blend_factor(to_vk_blend_factor(desc.dst_alpha_factor))
        .alpha_blend_op(to_vk_blend_op(desc.alpha_blend_op))
        .color_write_mask(to_vk_color_components(desc.color_write_mask))
        .build()
}

fn to_vk_border_color(color: crate::types::BorderColor) -> vk::BorderColor {
    use crate::types::BorderColor::*;
    match color {
        FloatTransparentBlack => vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
        IntTransparentBlack => vk::BorderColor::INT_TRANSPARENT_BLACK,
        FloatOpaqueBlack => vk::BorderColor::FLOAT_OPAQUE_BLACK,
        IntOpaqueBlack => vk::BorderColor::INT_OPAQUE_BLACK,
        FloatOpaqueWhite => vk::BorderColor::FLOAT_OPAQUE_WHITE,
        IntOpaqueWhite => vk::BorderColor::INT_OPAQUE_WHITE,
    }
}

fn to_vk_load_op(op: crate::types::LoadOp) -> vk::AttachmentLoadOp {
    match op {
        crate::types::LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        crate::types::LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        crate::types::LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

fn to_vk_store_op(op: crate::types::StoreOp) -> vk::AttachmentStoreOp {
    match op {
        crate::types::StoreOp::Store => vk::AttachmentStoreOp::STORE,
        crate::types::StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

pub(crate) fn to_vk_descriptor_type(ty: crate::types::DescriptorType) -> vk::DescriptorType {
    use crate::types::DescriptorType::*;
    match ty {
        Sampler => vk::DescriptorType::SAMPLER,
        CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        UniformTexelBuffer => vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
        StorageTexelBuffer => vk::DescriptorType::STORAGE_TEXEL_BUFFER,
        UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        StorageBufferDynamic => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
        InputAttachment => vk::DescriptorType::INPUT_ATTACHMENT,
    }
}
