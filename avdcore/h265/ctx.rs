// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::HashMap;

use crate::alloc::{anchor, fallback_rvra_sizes, AllocMap, Rvra264Sizes};
use crate::dpb::{PictureId, PicturePool};

use super::types::{Pps, Sps, NB_RPS_TYPE};

/// `sps_tile` ring depth (spec.md §4.3 "SPS/PPS tile ring", grounded on
/// `original_source/avid/h265/decoder.py`'s `ctx.sps_tile_count = 16`;
/// H.264 uses 24 for the same concept).
pub const SPS_TILE_COUNT: usize = 16;

pub struct H265Context {
    pub width: u32,
    pub height: u32,

    pub sps_table: HashMap<u32, Sps>,
    pub pps_table: HashMap<u32, Pps>,
    pub active_sps_id: Option<u32>,

    pub alloc: AllocMap,
    pub pool: PicturePool,
    pub dpb_list: Vec<PictureId>,

    /// `ctx.ref_lst[bucket]` / `ctx.ref_lst_cnt[bucket]` from
    /// `avid/h265/rlm.py`'s `do_frame_rps`.
    pub ref_lst: [Vec<PictureId>; NB_RPS_TYPE],

    pub access_idx: u64,

    /// CTB-quadrant bookkeeping state (spec.md §4.3 "CTB-quadrant
    /// bookkeeping"), reset to -1 at the start of each slice.
    pub last_q1_row: i32,
    pub last_q1_col: i32,
    pub last_ctx_row: i32,
    /// CTB column the previous slice's last tile ended on; consulted by
    /// the next slice's `vflip` hint.
    pub last_slice_col: i32,

    pub inst_fifo_idx: u32,

    /// RVRA-equivalent working-buffer sizing (spec.md §3 "Allocator map"
    /// is codec-generic; no H.265-specific canonical captures exist so
    /// this reuses the same 4:2:0 8-bit fallback formula H.264 falls back
    /// to for uncaptured dimensions).
    pub rvra_sizes: Rvra264Sizes,
    pub disp_y_addr: u64,
    pub disp_uv_addr: u64,

    /// SPS-tile ring (spec.md §4.3 "SPS/PPS tile ring"), indexed directly
    /// by a picture's pool slot (`original_source/avid/h265/halv3.py`'s
    /// `set_refs`: `ctx.sps_tile_addrs[sl.pic.idx]`), not by `access_idx`.
    pub sps_tile_addrs: [u64; SPS_TILE_COUNT],

    /// The most recently decoded independent slice segment's header,
    /// kept so a following dependent segment can inherit it (spec.md §4.5,
    /// SPEC_FULL.md §2 "H.265 dependent slice segment handling").
    pub last_independent_header: Option<super::types::SliceHeader>,
}

impl H265Context {
    pub fn new(width: u32, height: u32) -> Self {
        H265Context {
            width,
            height,
            sps_table: HashMap::new(),
            pps_table: HashMap::new(),
            active_sps_id: None,
            alloc: AllocMap::new(),
            pool: PicturePool::new(16, |_| 0),
            dpb_list: Vec::new(),
            ref_lst: Default::default(),
            access_idx: 0,
            last_q1_row: -1,
            last_q1_col: -1,
            last_ctx_row: -1,
            last_slice_col: -1,
            inst_fifo_idx: 0,
            rvra_sizes: fallback_rvra_sizes(round_even(width), round_even(height)),
            disp_y_addr: 0,
            disp_uv_addr: 0,
            sps_tile_addrs: [0; SPS_TILE_COUNT],
            last_independent_header: None,
        }
    }

    /// Rebuilds the allocator map bottom-up from current dimensions,
    /// mirroring `h264::ctx::H264Context::rebuild_allocator` (spec.md
    /// §4.1: "rebuilt each time dimensions change").
    pub fn rebuild_allocator(&mut self, dpb_slots: usize) {
        self.alloc.reset();
        self.alloc.bump_to(anchor::INST_FIFO_H265);
        self.alloc.alloc(4 * 0xe68, 0x1000, 0, 0, "inst_fifo");

        for slot in 0..dpb_slots {
            let addr = self.alloc.alloc(self.rvra_sizes.total(), 0x4000, 0, 0, format!("rvra{slot}"));
            self.pool.get_mut(PictureId(slot)).addr = addr;
        }

        let luma_size = (round_even(self.width) as u64) * (round_even(self.height) as u64);
        self.disp_y_addr = self.alloc.alloc(luma_size, 0x4000, 0, 0, "disp_y");
        self.disp_uv_addr = self.alloc.alloc(luma_size / 2, 0x4000, 0, 0, "disp_uv");

        // `avid/h265/decoder.py:allocate_buffers`: `n = max(rounddiv(height *
        // width, 0x40000), 1) + 1; sps_tile_size = n * 0x4000`, one slot per
        // ring entry.
        let tiles_in_frame = (self.height as u64 * self.width as u64 + 0x3ffff) / 0x40000;
        let sps_tile_size = (tiles_in_frame.max(1) + 1) * 0x4000;
        for i in 0..SPS_TILE_COUNT {
            self.sps_tile_addrs[i] = self.alloc.alloc(sps_tile_size, 0x4000, 0, 0, format!("sps_tile{i}"));
        }
    }

    /// The byte offset of one of a picture's RVRA sub-planes (same role as
    /// `h264::ctx::H264Context::rvra_offset`; H.265 only needs the first
    /// two planes since HEVC's RVRA mirror carries luma+chroma, not four
    /// separate motion-compensation planes).
    pub fn rvra_offset(&self, plane: u8) -> u64 {
        match plane {
            0 => 0,
            _ => self.rvra_sizes.size0,
        }
    }

    pub fn get_sps(&self, id: u32) -> crate::error::DecodeResult<&Sps> {
        self.sps_table
            .get(&id)
            .ok_or_else(|| base::Error::new(base::ErrorKind::MalformedStream, format!("unknown sps id {id}")))
    }

    pub fn get_pps(&self, id: u32) -> crate::error::DecodeResult<&Pps> {
        self.pps_table
            .get(&id)
            .ok_or_else(|| base::Error::new(base::ErrorKind::MalformedStream, format!("unknown pps id {id}")))
    }

    /// spec.md §4.3 "Slices reset `last_q1_{row,col}` to -1".
    pub fn reset_ctb_bookkeeping(&mut self) {
        self.last_q1_row = -1;
        self.last_q1_col = -1;
        self.last_ctx_row = -1;
    }
}

/// spec.md §7: H.265 dimensions must be "multiples of 2".
fn round_even(v: u32) -> u32 {
    (v + 1) & !1
}
