// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! H.264 syntax-element shapes consumed by the DPB manager and HAL.
//! Field names follow the bitstream spec rather than any particular
//! parser crate, so the pre-parser adaptor (`src/preparse/h264.rs`) only
//! has to translate, not redesign.

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SliceType {
    P,
    B,
    I,
    Sp,
    Si,
}

impl SliceType {
    pub fn from_u8(v: u8) -> SliceType {
        match v % 5 {
            0 => SliceType::P,
            1 => SliceType::B,
            2 => SliceType::I,
            3 => SliceType::Sp,
            _ => SliceType::Si,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum NalUnitType {
    NonIdr,
    Idr,
    Other(u8),
}

/// MMCO opcodes (spec.md §4.2 "MMCO").
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Mmco {
    End,
    ForgetShort { abs_diff_pic_num_minus1: u32 },
    ForgetLong { long_term_pic_num: u32 },
    ShortToLong { abs_diff_pic_num_minus1: u32, long_term_frame_idx: u32 },
    ForgetLongMax { max_long_term_frame_idx_plus1: u32 },
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct SeqParameterSet {
    pub id: u32,
    pub log2_max_frame_num_minus4: u32,
    pub pic_order_cnt_type: u32,
    pub log2_max_pic_order_cnt_lsb_minus4: u32,
    pub gaps_in_frame_num_value_allowed_flag: bool,
    pub max_num_ref_frames: u32,
    pub chroma_format_idc: u32,
    pub direct_8x8_inference_flag: bool,
    pub seq_scaling_matrix_present_flag: bool,
    pub mb_width: u32,
    pub mb_height: u32,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct PicParameterSet {
    pub id: u32,
    pub sps_id: u32,
    pub entropy_coding_mode_flag: bool,
    pub transform_8x8_mode_flag: bool,
    pub pic_scaling_matrix_present_flag: bool,
    /// Used by the pre-parser as the slice header's `num_ref_idx_lX_active_minus1`
    /// when that slice leaves `num_ref_idx_active_override_flag` unset.
    pub num_ref_idx_l0_default_active_minus1: u32,
    pub num_ref_idx_l1_default_active_minus1: u32,
    pub weighted_pred_flag: bool,
    /// 0 = off, 1 = explicit, 2 = implicit (7.4.3 Table 7-4).
    pub weighted_bipred_idc: u8,
}

/// One reference's entry in a slice's weighted-prediction table (7.4.3.3
/// `pred_weight_table`). `None` means that component's `_flag` was unset
/// and the default (denom-derived) weight applies, so the HAL skips it.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct WeightEntry {
    pub luma: Option<(i32, i32)>,
    /// Cb then Cr, each `(weight, offset)`.
    pub chroma: Option<[(i32, i32); 2]>,
}

#[derive(Clone, Debug)]
pub struct RefPicListModOp {
    pub idc: u8,
    pub abs_diff_pic_num_minus1: u32,
}

#[derive(Clone, Debug)]
pub struct SliceHeader {
    pub nal_unit_type: NalUnitType,
    pub nal_ref_idc: u8,
    pub slice_type: SliceType,
    pub pps_id: u32,
    pub frame_num: i64,
    pub field_pic_flag: bool,
    pub pic_order_cnt_lsb: i64,
    pub num_ref_idx_l0_active_minus1: u32,
    pub num_ref_idx_l1_active_minus1: u32,
    pub ref_pic_list_modification_flag_l0: bool,
    pub ref_pic_list_modification_flag_l1: bool,
    pub ref_pic_list_mod_l0: Vec<RefPicListModOp>,
    pub ref_pic_list_mod_l1: Vec<RefPicListModOp>,
    pub adaptive_ref_pic_marking_mode_flag: bool,
    pub mmco: Vec<Mmco>,
    pub slice_qp_delta: i32,
    pub luma_log2_weight_denom: u32,
    pub chroma_log2_weight_denom: u32,
    /// Indexed by `ref_idx`, one entry per active reference in the
    /// corresponding list; empty when `pred_weight_table` wasn't present.
    pub weights_l0: Vec<WeightEntry>,
    pub weights_l1: Vec<WeightEntry>,
}
