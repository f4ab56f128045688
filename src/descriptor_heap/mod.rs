//! Descriptor heap (§4.3): grow-on-demand descriptor pools amortizing
//! backend allocation and handing callers a dense `u32` group id cheap to
//! rebind across frames.

use vulkanalia::prelude::v1_0::*;

use crate::handle::Handle;
use crate::resource::{Buffer, BufferView, DescriptorSetLayoutDesc, Image, ImageView, Sampler};

#[derive(Clone, Debug)]
pub struct DescriptorHeapDesc {
    pub set_layouts: Vec<Handle<crate::resource::DescriptorSetLayout>>,
    pub num_groups_per_pool: u32,
    pub label: Option<String>,
}

pub(crate) struct Pool {
    pub(crate) vk_pool: vk::DescriptorPool,
    /// `sets[group_in_pool][set_index]`
    pub(crate) sets: Vec<Vec<vk::DescriptorSet>>,
}

/// What is currently bound at one shadow slot; kept for diagnostics and so
/// `add_group`'s reuse path has something concrete to zero (§4.3 step 2).
#[derive(Clone, Debug, Default)]
pub enum ShadowElement {
    #[default]
    Empty,
    Sampler(Handle<Sampler>),
    CombinedImageSampler {
        view: Handle<ImageView>,
        sampler: Handle<Sampler>,
        layout: vk::ImageLayout,
    },
    Image {
        view: Handle<ImageView>,
        layout: vk::ImageLayout,
    },
    TexelBufferView(Handle<BufferView>),
    Buffer {
        buffer: Handle<Buffer>,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    },
}

/// Diagnostic snapshot returned by `get_stats`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DescriptorHeapStats {
    pub num_pools: u32,
    pub num_groups_per_pool: u32,
    pub free: u32,
    pub released: u32,
    pub in_use: u32,
}

pub struct DescriptorHeap {
    pub desc: DescriptorHeapDesc,
    /// Snapshot of each set layout's shape at heap-creation time, so writes
    /// never need to reach back into the layout arena.
    pub(crate) layout_descs: Vec<DescriptorSetLayoutDesc>,
    pub(crate) vk_set_layouts: Vec<vk::DescriptorSetLayout>,
    pub(crate) binding_offsets: Vec<Vec<usize>>,
    pub(crate) shadow_len: Vec<usize>,
    pub(crate) pools: Vec<Pool>,
    /// Dense by group id across every pool: `shadows[group][set][element]`.
    pub(crate) shadows: Vec<Vec<Vec<ShadowElement>>>,
    pub(crate) last_use: Vec<u64>,
    pub(crate) free: Vec<u32>,
    pub(crate) released: Vec<u32>,
}

impl DescriptorHeap {
    pub(crate) fn new(
        desc: DescriptorHeapDesc,
        layout_descs: Vec<DescriptorSetLayoutDesc>,
        vk_set_layouts: Vec<vk::DescriptorSetLayout>,
    ) -> Self {
        let binding_offsets = layout_descs.iter().map(|l| l.binding_offsets()).collect();
        let shadow_len = layout_descs.iter().map(|l| l.shadow_len()).collect();
        Self {
            desc,
            layout_descs,
            vk_set_layouts,
            binding_offsets,
            shadow_len,
            pools: Vec::new(),
            shadows: Vec::new(),
            last_use: Vec::new(),
            free: Vec::new(),
            released: Vec::new(),
        }
    }

    fn num_groups_per_pool(&self) -> u32 {
        self.desc.num_groups_per_pool
    }

    pub(crate) fn group_location(&self, group: u32) -> (usize, usize) {
        let ngpp = self.num_groups_per_pool();
        ((group / ngpp) as usize, (group % ngpp) as usize)
    }

    pub(crate) fn set_handle(&self, group: u32, set_index: usize) -> Option<vk::DescriptorSet> {
        let (pool, local) = self.group_location(group);
        self.pools.get(pool)?.sets.get(local)?.get(set_index).copied()
    }

    /// Walks `released`, moving every group whose `last_use` predates
    /// `trailing_frame` into `free` (§4.3 step 1).
    pub(crate) fn promote(&mut self, trailing_frame: u64) {
        let mut i = 0;
        let mut promoted = false;
        while i < self.released.len() {
            let group = self.released[i];
            if self.last_use[group as usize] < trailing_frame {
                self.released.swap_remove(i);
                self.free.push(group);
                promoted = true;
            } else {
                i += 1;
            }
        }
        if promoted {
            // Keep `free` sorted so the next caller gets the smallest id.
            self.free.sort_unstable_by(|a, b| b.cmp(a));
        }
    }

    pub(crate) fn zero_shadow(&mut self, group: u32) {
        for set in &mut self.shadows[group as usize] {
            set.fill(ShadowElement::Empty);
        }
    }

    pub fn mark_in_use(&mut self, group: u32, current_frame: u64) {
        let slot = &mut self.last_use[group as usize];
        debug_assert!(current_frame >= *slot, "last_use must be monotonic");
        *slot = current_frame;
    }

    pub fn is_in_use(&self, group: u32, trailing_frame: u64) -> bool {
        self.last_use[group as usize] >= trailing_frame
    }

    pub fn release(&mut self, group: u32) {
        self.released.push(group);
    }

    pub fn get_stats(&self) -> DescriptorHeapStats {
        DescriptorHeapStats {
            num_pools: self.pools.len() as u32,
            num_groups_per_pool: self.num_groups_per_pool(),
            free: self.free.len() as u32,
            released: self.released.len() as u32,
            in_use: self.last_use.len() as u32 - self.free.len() as u32 - self.released.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_heap(num_groups_per_pool: u32) -> DescriptorHeap {
        DescriptorHeap::new(
            DescriptorHeapDesc { set_layouts: Vec::new(), num_groups_per_pool, label: None },
            vec![],
            vec![],
        )
    }

    /// Mirrors `Device::grow_descriptor_heap`'s pure bookkeeping (pool
    /// allocation itself needs a live device, so it is exercised here
    /// without the backend calls).
    fn grow(heap: &mut DescriptorHeap) {
        let ngpp = heap.desc.num_groups_per_pool;
        let pool_index = heap.pools.len() as u32;
        heap.pools.push(Pool { vk_pool: vk::DescriptorPool::null(), sets: Vec::new() });
        for _ in 0..ngpp {
            heap.shadows.push(Vec::new());
            heap.last_use.push(0);
        }
        let start = pool_index * ngpp;
        for i in (0..ngpp).rev() {
            heap.free.push(start + i);
        }
    }

    fn add_group(heap: &mut DescriptorHeap, trailing_frame: u64) -> u32 {
        heap.promote(trailing_frame);
        if heap.free.is_empty() {
            grow(heap);
        }
        heap.free.pop().expect("grow must populate free")
    }

    #[test]
    fn allocate_release_cycle_matches_pool_math() {
        // S3: num_groups_per_pool=200, 1002 allocations -> 6 pools total.
        let mut heap = empty_heap(200);
        let mut last = 0;
        for _ in 0..1002 {
            last = add_group(&mut heap, 0);
        }
        assert_eq!(heap.pools.len(), 6);
        assert_eq!(last, 1001);

        heap.release(1);
        heap.mark_in_use(1, 0);
        assert!(heap.is_in_use(1, 0));
        heap.mark_in_use(1, 5);
        heap.release(1);

        // Not yet retired: trailing_frame hasn't passed last_use.
        let reused = add_group(&mut heap, 5);
        assert_ne!(reused, 1);

        // Advance trailing_frame past last_use(1) == 5.
        let reused = add_group(&mut heap, 6);
        assert_eq!(reused, 1);
    }

    #[test]
    fn accounting_identity_holds() {
        let mut heap = empty_heap(4);
        for _ in 0..4 {
            add_group(&mut heap, 0);
        }
        heap.release(0);
        heap.release(1);
        let stats = heap.get_stats();
        assert_eq!(stats.free + stats.released + stats.in_use, stats.num_pools * stats.num_groups_per_pool);
    }

    #[test]
    fn promote_only_moves_groups_past_trailing_frame() {
        let mut heap = empty_heap(2);
        add_group(&mut heap, 0);
        add_group(&mut heap, 0);
        heap.mark_in_use(0, 10);
        heap.release(0);
        heap.promote(5);
        assert_eq!(heap.released.len(), 1);
        heap.promote(11);
        assert_eq!(heap.released.len(), 0);
        assert!(heap.free.contains(&0));
    }
}
