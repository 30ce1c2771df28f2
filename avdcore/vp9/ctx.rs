// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::alloc::{anchor, fallback_rvra_sizes, AllocMap};

use super::probs::{ProbsRing, PROBS_SIZE};
use super::types::{SegFeatureData, NUM_REF_FRAMES};

/// One physical frame-buffer slot (spec.md §4.2: "a separate 'free frame
/// buffer' pool ... `ref_count` tracks uses").
#[derive(Copy, Clone, Debug, Default)]
pub struct FrameBuf {
    pub addr: u64,
    pub ref_count: u32,
    pub width: u32,
    pub height: u32,
}

pub const VP9_FRAME_BUFFERS: usize = NUM_REF_FRAMES + 2;

pub struct Vp9Context {
    pub width: u32,
    pub height: u32,

    pub alloc: AllocMap,

    /// 8 named reference slots, each an index into `frame_bufs`.
    pub ref_frame_map: [Option<usize>; NUM_REF_FRAMES],
    pub frame_bufs: [FrameBuf; VP9_FRAME_BUFFERS],

    pub access_idx: u64,
    pub inst_fifo_idx: u32,

    /// Display-plane addresses (spec.md §3 Allocator map, §6 "fixed y/uv/
    /// slice_data addresses depending on dimension preset").
    pub disp_y_addr: u64,
    pub disp_uv_addr: u64,

    /// Probability-table ring (spec.md §3: "`access_idx` ... is used to
    /// index the `sps_tile` and `probs` rings"), plus the base iova of
    /// its backing allocator range.
    pub probs: ProbsRing,
    pub probs_addr: u64,

    /// Persisted segmentation feature data (spec.md §9 supplemented
    /// feature): carries forward across frames that leave
    /// `segmentation_update_data` unset.
    pub seg_feature_data: SegFeatureData,
    pub seg_enabled: bool,
    pub seg_abs_or_delta_update: bool,

    /// Persisted loop-filter ref/mode deltas, carried forward across
    /// frames that leave `loop_filter_delta_update` unset.
    pub lf_ref_deltas: [i8; 4],
    pub lf_mode_deltas: [i8; 2],
}

impl Vp9Context {
    pub fn new(width: u32, height: u32) -> Self {
        Vp9Context {
            width,
            height,
            alloc: AllocMap::new(),
            ref_frame_map: [None; NUM_REF_FRAMES],
            frame_bufs: [FrameBuf::default(); VP9_FRAME_BUFFERS],
            access_idx: 0,
            inst_fifo_idx: 0,
            disp_y_addr: 0,
            disp_uv_addr: 0,
            probs: ProbsRing::new(VP9_FRAME_BUFFERS),
            probs_addr: 0,
            seg_feature_data: Default::default(),
            seg_enabled: false,
            seg_abs_or_delta_update: false,
            // libvpx `vp9_loop_filter_init`/`setup_past_independence`:
            // ref_deltas = [INTRA: 1, LAST: 0, GOLDEN: -1, ALTREF: -1],
            // mode_deltas all 0.
            lf_ref_deltas: [1, 0, -1, -1],
            lf_mode_deltas: [0, 0],
        }
    }

    /// Rebuilds the allocator map bottom-up from current dimensions
    /// (spec.md §4.1 "VP9 anchors": `inst_fifo` at `0x2c000`), assigning
    /// every `frame_bufs` slot its own working-buffer address up front
    /// (no codec-specific capture exists to size these from, so the same
    /// fallback formula H.264/H.265 use applies here too).
    pub fn rebuild_allocator(&mut self) {
        self.alloc.reset();
        self.alloc.bump_to(anchor::INST_FIFO_VP9);
        self.alloc.alloc(4 * 0xe68, 0x1000, 0, 0, "inst_fifo");

        let sizes = fallback_rvra_sizes(self.width, self.height);
        for slot in 0..VP9_FRAME_BUFFERS {
            let addr = self.alloc.alloc(sizes.total(), 0x4000, 0, 0, format!("frame_buf{slot}"));
            self.frame_bufs[slot].addr = addr;
        }

        let luma_size = (self.width as u64) * (self.height as u64);
        self.disp_y_addr = self.alloc.alloc(luma_size, 0x4000, 0, 0, "disp_y");
        self.disp_uv_addr = self.alloc.alloc(luma_size / 2, 0x4000, 0, 0, "disp_uv");

        self.probs_addr = self.alloc.alloc(
            (PROBS_SIZE * VP9_FRAME_BUFFERS) as u64,
            0x40,
            0,
            0,
            "probs",
        );
    }

    /// The current frame's slot address in the probability-table ring
    /// (spec.md §3: ring-addressed by `access_idx`, same scheme as
    /// `sps_tile` for H.264/H.265).
    pub fn probs_slot_addr(&self, access_idx: u64) -> u64 {
        self.probs_addr + (access_idx % VP9_FRAME_BUFFERS as u64) * PROBS_SIZE as u64
    }

    /// Finds a buffer slot with `ref_count == 0`, or the lowest-refcount
    /// slot if the pool is fully held (spec.md §4.2: "swapping is a
    /// two-phase ref increment then decrement").
    pub fn get_free_fb(&mut self) -> crate::error::DecodeResult<usize> {
        if let Some(i) = self.frame_bufs.iter().position(|fb| fb.ref_count == 0) {
            return Ok(i);
        }
        Err(base::Error::from(base::ErrorKind::DpbExhausted))
    }
}
