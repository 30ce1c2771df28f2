// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! H.265 syntax-element shapes (spec.md §4.2 "H.265 specifics").

pub const HEVC_MAX_REFS: usize = 16;

/// The five RPS buckets a reference is classified into (spec.md §4.2
/// "RPS"). Order matches `avid/h265/rlm.py`'s `NB_RPS_TYPE` indexing.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(usize)]
pub enum RpsBucket {
    StCurrBef = 0,
    StCurrAft = 1,
    StFoll = 2,
    LtCurr = 3,
    LtFoll = 4,
}

pub const NB_RPS_TYPE: usize = 5;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SliceType {
    B,
    P,
    I,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum NalUnitType {
    Idr,
    Cra,
    Bla,
    TrailOrOther(u8),
}

impl NalUnitType {
    pub fn is_irap(self) -> bool {
        matches!(self, NalUnitType::Idr | NalUnitType::Cra | NalUnitType::Bla)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Vps {
    pub id: u32,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Sps {
    pub id: u32,
    pub chroma_format_idc: u32,
    pub bit_depth_luma: u32,
    pub ctb_log2_size: u32,
    pub pic_width_in_ctbs: u32,
    pub pic_height_in_ctbs: u32,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Pps {
    pub id: u32,
    pub sps_id: u32,
    pub tiles_enabled_flag: bool,
    pub num_tile_columns: u32,
    pub num_tile_rows: u32,
}

/// One short-term RPS delta-POC entry, already resolved to an absolute
/// POC by the pre-parser (spec.md §4.2: "classifies references ... from
/// `st_rps_poc[]` and `st_rps_used[]`").
#[derive(Copy, Clone, Debug)]
pub struct StRpsEntry {
    pub poc: i64,
    pub used: bool,
}

#[derive(Clone, Debug)]
pub struct SliceHeader {
    pub nal_unit_type: NalUnitType,
    pub slice_type: SliceType,
    pub pps_id: u32,
    pub poc: i64,
    pub pic_output_flag: bool,
    pub num_ref_idx_l0_active_minus1: u32,
    pub num_ref_idx_l1_active_minus1: u32,
    pub st_rps: Vec<StRpsEntry>,
    pub st_rps_num_negative_pics: usize,
    pub slice_qp_delta: i32,
    pub slice_segment_address: u32,
    pub dependent_slice_segment_flag: bool,
    /// Tile/wavefront entry points signalled in the slice segment header
    /// (spec.md §4.3 step 7). `num_entry_point_offsets == entry_point_offsets.len()`;
    /// the HAL emits one coded-slice descriptor per entry point plus one
    /// for the slice segment itself (spec.md §8: "emits exactly k+1 coded-slice
    /// descriptors").
    pub entry_point_offsets: Vec<u32>,
}
