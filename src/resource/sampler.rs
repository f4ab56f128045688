//! Sampler records (§3).

use vulkanalia::prelude::v1_0::*;

use crate::types::{BorderColor, CompareOp, Filter, SamplerAddressMode};

#[derive(Clone, Copy, Debug)]
pub struct SamplerDesc {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub mipmap_mode: Filter,
    pub address_mode_u: SamplerAddressMode,
    pub address_mode_v: SamplerAddressMode,
    pub address_mode_w: SamplerAddressMode,
    pub mip_lod_bias: f32,
    pub anisotropy_enable: bool,
    pub max_anisotropy: f32,
    pub compare: Option<CompareOp>,
    pub min_lod: f32,
    pub max_lod: f32,
    pub border_color: BorderColor,
    pub unnormalized_coordinates: bool,
}

pub struct Sampler {
    pub desc: SamplerDesc,
    pub(crate) vk_sampler: vk::Sampler,
}
