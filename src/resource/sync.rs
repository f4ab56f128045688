//! Per-resource access history and the automatic barrier state machine (§4.4).
//!
//! Grounded on the reference `sync_buffer`/`sync_image`/`access_buffer`/
//! `access_image` routines: each resource remembers up to two pending
//! accesses and a coarse `AccessSequence`, from which the minimal barrier is
//! derived on every subsequent touch.

use vulkanalia::vk;

/// Write-access bits recognised across the sync machinery.
const WRITE_ACCESS_MASK: vk::AccessFlags = vk::AccessFlags::from_bits_truncate(
    vk::AccessFlags::SHADER_WRITE.bits()
        | vk::AccessFlags::COLOR_ATTACHMENT_WRITE.bits()
        | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE.bits()
        | vk::AccessFlags::TRANSFER_WRITE.bits()
        | vk::AccessFlags::HOST_WRITE.bits()
        | vk::AccessFlags::MEMORY_WRITE.bits(),
);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AccessSequence {
    #[default]
    None,
    Reads,
    Write,
    ReadAfterWrite,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BufferAccess {
    pub stages: vk::PipelineStageFlags,
    pub access: vk::AccessFlags,
}

#[derive(Clone, Copy, Debug)]
pub struct ImageAccess {
    pub stages: vk::PipelineStageFlags,
    pub access: vk::AccessFlags,
    pub layout: vk::ImageLayout,
}

/// A barrier the caller must emit ahead of the triggering command.
#[derive(Clone, Copy, Debug)]
pub struct BufferBarrier {
    pub src_stages: vk::PipelineStageFlags,
    pub src_access: vk::AccessFlags,
    pub dst_stages: vk::PipelineStageFlags,
    pub dst_access: vk::AccessFlags,
}

#[derive(Clone, Copy, Debug)]
pub struct ImageBarrier {
    pub src_stages: vk::PipelineStageFlags,
    pub src_access: vk::AccessFlags,
    pub dst_stages: vk::PipelineStageFlags,
    pub dst_access: vk::AccessFlags,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
}

fn is_write(access: vk::AccessFlags) -> bool {
    access.intersects(WRITE_ACCESS_MASK)
}

fn is_subset(requested: BufferAccess, recorded: BufferAccess) -> bool {
    recorded.stages.contains(requested.stages) && recorded.access.contains(requested.access)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BufferState {
    pub sequence: AccessSequence,
    access: [BufferAccess; 2],
}

impl BufferState {
    /// Runs one step of the table in §4.4 and returns the barrier to emit,
    /// if any.
    pub fn access(&mut self, incoming: BufferAccess) -> Option<BufferBarrier> {
        let write = is_write(incoming.access);
        match (self.sequence, write) {
            (AccessSequence::None, false) => {
                self.sequence = AccessSequence::Reads;
                self.access[0] = incoming;
                None
            }
            (AccessSequence::None, true) => {
                self.sequence = AccessSequence::Write;
                self.access[0] = incoming;
                None
            }
            (AccessSequence::Reads, false) => {
                self.access[0].stages |= incoming.stages;
                self.access[0].access |= incoming.access;
                None
            }
            (AccessSequence::Reads, true) => {
                let barrier = BufferBarrier {
                    src_stages: self.access[0].stages,
                    src_access: self.access[0].access,
                    dst_stages: incoming.stages,
                    dst_access: incoming.access,
                };
                self.sequence = AccessSequence::Write;
                self.access[0] = incoming;
                Some(barrier)
            }
            (AccessSequence::Write, false) => {
                let barrier = BufferBarrier {
                    src_stages: self.access[0].stages,
                    src_access: self.access[0].access,
                    dst_stages: incoming.stages,
                    dst_access: incoming.access,
                };
                self.sequence = AccessSequence::ReadAfterWrite;
                self.access[1] = incoming;
                Some(barrier)
            }
            (AccessSequence::Write, true) => {
                let barrier = BufferBarrier {
                    src_stages: self.access[0].stages,
                    src_access: self.access[0].access,
                    dst_stages: incoming.stages,
                    dst_access: incoming.access,
                };
                self.sequence = AccessSequence::Write;
                self.access[0] = incoming;
                Some(barrier)
            }
            (AccessSequence::ReadAfterWrite, false) => {
                if is_subset(incoming, self.access[1]) {
                    None
                } else {
                    let barrier = BufferBarrier {
                        src_stages: self.access[0].stages,
                        src_access: self.access[0].access,
                        dst_stages: incoming.stages,
                        dst_access: incoming.access,
                    };
                    self.access[1].stages |= incoming.stages;
                    self.access[1].access |= incoming.access;
                    Some(barrier)
                }
            }
            (AccessSequence::ReadAfterWrite, true) => {
                let barrier = BufferBarrier {
                    src_stages: self.access[1].stages,
                    src_access: self.access[1].access,
                    dst_stages: incoming.stages,
                    dst_access: incoming.access,
                };
                self.sequence = AccessSequence::Write;
                self.access[0] = incoming;
                Some(barrier)
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ImageState {
    pub sequence: AccessSequence,
    access: [ImageAccess; 2],
}

impl Default for ImageState {
    fn default() -> Self {
        let undefined = ImageAccess {
            stages: vk::PipelineStageFlags::empty(),
            access: vk::AccessFlags::empty(),
            layout: vk::ImageLayout::UNDEFINED,
        };
        Self {
            sequence: AccessSequence::None,
            access: [undefined, undefined],
        }
    }
}

impl ImageState {
    pub fn current_layout(&self) -> vk::ImageLayout {
        let slot = if self.sequence == AccessSequence::ReadAfterWrite { 1 } else { 0 };
        self.access[slot].layout
    }

    fn slot(&self, index: usize) -> BufferAccess {
        BufferAccess {
            stages: self.access[index].stages,
            access: self.access[index].access,
        }
    }

    /// As [`BufferState::access`], but a layout change is always treated as
    /// a write (§4.4's "extra rule for images"): it forces a barrier and the
    /// new layout replaces the stored one regardless of sequence.
    pub fn access(&mut self, incoming: ImageAccess) -> Option<ImageBarrier> {
        let old_layout = self.current_layout();
        let layout_changes = incoming.layout != old_layout;
        let write = is_write(incoming.access) || layout_changes;
        let plain = BufferAccess { stages: incoming.stages, access: incoming.access };

        let buffer_barrier = match (self.sequence, write) {
            (AccessSequence::None, false) => {
                self.sequence = AccessSequence::Reads;
                self.access[0] = incoming;
                None
            }
            (AccessSequence::None, true) => {
                self.sequence = AccessSequence::Write;
                self.access[0] = incoming;
                None
            }
            (AccessSequence::Reads, false) => {
                self.access[0].stages |= incoming.stages;
                self.access[0].access |= incoming.access;
                self.access[0].layout = incoming.layout;
                None
            }
            (AccessSequence::Reads, true) => {
                let barrier = (self.slot(0), plain);
                self.sequence = AccessSequence::Write;
                self.access[0] = incoming;
                Some(barrier)
            }
            (AccessSequence::Write, false) => {
                let barrier = (self.slot(0), plain);
                self.sequence = AccessSequence::ReadAfterWrite;
                self.access[1] = incoming;
                Some(barrier)
            }
            (AccessSequence::Write, true) => {
                let barrier = (self.slot(0), plain);
                self.sequence = AccessSequence::Write;
                self.access[0] = incoming;
                Some(barrier)
            }
            (AccessSequence::ReadAfterWrite, false) => {
                if !layout_changes && is_subset(plain, self.slot(1)) {
                    None
                } else {
                    let barrier = (self.slot(0), plain);
                    self.access[1].stages |= incoming.stages;
                    self.access[1].access |= incoming.access;
                    self.access[1].layout = incoming.layout;
                    Some(barrier)
                }
            }
            (AccessSequence::ReadAfterWrite, true) => {
                let barrier = (self.slot(1), plain);
                self.sequence = AccessSequence::Write;
                self.access[0] = incoming;
                Some(barrier)
            }
        };

        match buffer_barrier {
            Some((src, dst)) => Some(ImageBarrier {
                src_stages: src.stages,
                src_access: src.access,
                dst_stages: dst.stages,
                dst_access: dst.access,
                old_layout,
                new_layout: incoming.layout,
            }),
            None if layout_changes => Some(ImageBarrier {
                src_stages: vk::PipelineStageFlags::TOP_OF_PIPE,
                src_access: vk::AccessFlags::empty(),
                dst_stages: incoming.stages,
                dst_access: incoming.access,
                old_layout,
                new_layout: incoming.layout,
            }),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(stage: vk::PipelineStageFlags, access: vk::AccessFlags) -> BufferAccess {
        BufferAccess { stages: stage, access }
    }

    #[test]
    fn first_read_emits_no_barrier() {
        let mut state = BufferState::default();
        let barrier = state.access(read(
            vk::PipelineStageFlags::VERTEX_SHADER,
            vk::AccessFlags::SHADER_READ,
        ));
        assert!(barrier.is_none());
        assert_eq!(state.sequence, AccessSequence::Reads);
    }

    #[test]
    fn write_after_read_emits_barrier() {
        let mut state = BufferState::default();
        state.access(read(vk::PipelineStageFlags::VERTEX_SHADER, vk::AccessFlags::SHADER_READ));
        let barrier = state.access(read(
            vk::PipelineStageFlags::TRANSFER,
            vk::AccessFlags::TRANSFER_WRITE,
        ));
        assert!(barrier.is_some());
        assert_eq!(state.sequence, AccessSequence::Write);
    }

    #[test]
    fn repeated_subset_read_after_write_emits_zero_additional_barriers() {
        let mut state = BufferState::default();
        state.access(read(vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_WRITE));
        let first = state.access(read(
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::AccessFlags::SHADER_READ,
        ));
        assert!(first.is_some());
        assert_eq!(state.sequence, AccessSequence::ReadAfterWrite);

        let second = state.access(read(
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::AccessFlags::SHADER_READ,
        ));
        assert!(second.is_none(), "subset read-after-write must not re-barrier");
    }

    #[test]
    fn write_write_replaces_access_without_accumulating() {
        let mut state = BufferState::default();
        state.access(read(vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_WRITE));
        state.access(read(vk::PipelineStageFlags::COMPUTE_SHADER, vk::AccessFlags::SHADER_WRITE));
        assert_eq!(state.sequence, AccessSequence::Write);
    }

    #[test]
    fn image_layout_mismatch_always_barriers_and_updates_layout() {
        let mut state = ImageState::default();
        let barrier = state.access(ImageAccess {
            stages: vk::PipelineStageFlags::TRANSFER,
            access: vk::AccessFlags::TRANSFER_WRITE,
            layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        });
        assert!(barrier.is_some());
        assert_eq!(state.current_layout(), vk::ImageLayout::TRANSFER_DST_OPTIMAL);
    }

    #[test]
    fn image_same_layout_reads_do_not_barrier() {
        let mut state = ImageState::default();
        state.access(ImageAccess {
            stages: vk::PipelineStageFlags::TRANSFER,
            access: vk::AccessFlags::TRANSFER_WRITE,
            layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        });
        state.access(ImageAccess {
            stages: vk::PipelineStageFlags::FRAGMENT_SHADER,
            access: vk::AccessFlags::SHADER_READ,
            layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        });
        let second = state.access(ImageAccess {
            stages: vk::PipelineStageFlags::FRAGMENT_SHADER,
            access: vk::AccessFlags::SHADER_READ,
            layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        });
        assert!(second.is_none());
    }
}
