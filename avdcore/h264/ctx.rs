// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Per-stream mutable state for H.264 decoding (spec.md §3 "Context").

use std::collections::HashMap;

use crate::alloc::{anchor, AllocMap, Rvra264Sizes};
use crate::dpb::{PictureId, PicturePool};
use crate::error::{DecodeError, DecodeResult};

use super::types::{PicParameterSet, SeqParameterSet};

/// `sps_tile` ring depth (spec.md §4.3 "SPS/PPS tile ring": "24 for
/// H.264").
pub const SPS_TILE_COUNT: usize = 24;

#[derive(Clone)]
pub struct H264Context {
    pub width: u32,
    pub height: u32,
    pub width_aligned: u32,
    pub height_aligned: u32,

    pub sps_table: HashMap<u32, SeqParameterSet>,
    pub pps_table: HashMap<u32, PicParameterSet>,
    pub active_sps_id: Option<u32>,

    pub alloc: AllocMap,
    pub pool: PicturePool,
    pub dpb_list: Vec<PictureId>,

    pub access_idx: u64,
    pub prev_poc_lsb: i64,
    pub prev_poc_msb: i64,
    pub poc_msb: i64,
    pub max_pic_num: i64,
    pub max_frame_num: i64,
    pub max_lt_idx: i64,

    pub inst_fifo_idx: u32,
    pub inst_fifo_count: u32,

    pub rvra_sizes: Rvra264Sizes,
    pub sps_tile_addrs: [u64; SPS_TILE_COUNT],
    pub pps_tile_addrs: [u64; 5],

    /// Display-plane addresses (spec.md §3 Allocator map: `disp_y`,
    /// `disp_uv`; §6 frame-params table `0x210..0x21c`).
    pub disp_y_addr: u64,
    pub disp_uv_addr: u64,
}

impl H264Context {
    pub fn new(width: u32, height: u32) -> Self {
        let width_aligned = round16(width);
        let height_aligned = round16(height);
        let rvra_sizes = Rvra264Sizes::for_dims(width_aligned, height_aligned);
        let pool = PicturePool::new(16, |_| 0);
        H264Context {
            width,
            height,
            width_aligned,
            height_aligned,
            sps_table: HashMap::new(),
            pps_table: HashMap::new(),
            active_sps_id: None,
            alloc: AllocMap::new(),
            pool,
            dpb_list: Vec::new(),
            access_idx: 0,
            prev_poc_lsb: -1,
            prev_poc_msb: 0,
            poc_msb: 0,
            max_pic_num: 1 << 8,
            max_frame_num: 1 << 8,
            max_lt_idx: -1,
            inst_fifo_idx: 0,
            inst_fifo_count: 4,
            rvra_sizes,
            sps_tile_addrs: [0; SPS_TILE_COUNT],
            pps_tile_addrs: [0; 5],
            disp_y_addr: 0,
            disp_uv_addr: 0,
        }
    }

    pub fn get_sps(&self, id: u32) -> DecodeResult<&SeqParameterSet> {
        self.sps_table.get(&id).ok_or_else(|| {
            DecodeError::new(base::ErrorKind::MalformedStream, format!("slice references unknown sps id {id}"))
        })
    }

    pub fn get_pps(&self, id: u32) -> DecodeResult<&PicParameterSet> {
        self.pps_table.get(&id).ok_or_else(|| {
            DecodeError::new(base::ErrorKind::MalformedStream, format!("slice references unknown pps id {id}"))
        })
    }

    /// Rebuilds the allocator map bottom-up from current dimensions
    /// (spec.md §4.1: "rebuilt each time dimensions change"). Order
    /// follows `avid/h264/decoder.py:allocate`: `inst_fifo` -> `rvra0`
    /// (the picture pool's first slot, planted at the fixed anchor) ->
    /// `disp_y`/`disp_uv` -> `slice_data` (allocated on demand by
    /// `ensure_slice_data`) -> `sps_tile` -> `pps_tile` -> `rvra1[..]`
    /// (the remaining pool slots). spec.md §4.1: rvra0 sits at
    /// `0x734000` "after the allocator is moved up past the inst-FIFO
    /// region" — nothing else may land between the two.
    pub fn rebuild_allocator(&mut self, dpb_slots: usize) {
        self.alloc.reset();
        self.alloc.bump_to(anchor::INST_FIFO_H264);
        self.alloc
            .alloc(self.inst_fifo_count as u64 * 0xe68, 0x1000, 0, 0, "inst_fifo");

        self.alloc.bump_to(anchor::RVRA0_H264);
        for slot in 0..dpb_slots {
            let addr = self.alloc.alloc(
                self.rvra_sizes.total(),
                0x4000,
                0,
                0,
                format!("rvra{slot}"),
            );
            self.pool.get_mut(crate::dpb::PictureId(slot)).addr = addr;
        }

        let luma_size = (self.width_aligned as u64) * (self.height_aligned as u64);
        self.disp_y_addr = self.alloc.alloc(luma_size, 0x4000, 0, 0, "disp_y");
        self.disp_uv_addr = self.alloc.alloc(luma_size / 2, 0x4000, 0, 0, "disp_uv");

        for i in 0..SPS_TILE_COUNT {
            let iova = self.alloc.alloc(0x4000, 0x1000, 0, 0, format!("sps_tile{i}"));
            self.sps_tile_addrs[i] = iova;
        }
        for (i, size) in crate::alloc::pps_tile_sizes(self.width_aligned / 16).iter().enumerate() {
            let iova = self.alloc.alloc(*size, 0x40, 0, 0, format!("pps_tile{i}"));
            self.pps_tile_addrs[i] = iova;
        }
    }

    /// The byte offset of one of the four RVRA sub-planes within a
    /// picture's RVRA allocation (spec.md §4.3 "rvra_offset index 0..3").
    pub fn rvra_offset(&self, plane: u8) -> u64 {
        match plane {
            0 => 0,
            1 => self.rvra_sizes.size0,
            2 => self.rvra_sizes.size0 + self.rvra_sizes.size1,
            _ => self.rvra_sizes.size0 + self.rvra_sizes.size1 + self.rvra_sizes.size2,
        }
    }
}

fn round16(v: u32) -> u32 {
    (v + 15) & !15
}
