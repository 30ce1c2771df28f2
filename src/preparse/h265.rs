// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! H.265 pre-parser adaptor: NAL classification, emulation-prevention
//! stripping, and VPS/SPS/PPS/slice-segment-header syntax decode into
//! the [`avdcore::h265`] shapes the RPS classifier and HAL consume.
//!
//! No crate in this dependency graph understands HEVC syntax, so this
//! whole module is hand-rolled against [`BitReader`], the same way the
//! H.264 adaptor hand-rolls everything past RBSP extraction.
//!
//! A handful of syntax branches are intentionally unsupported rather
//! than modeled to the letter, each bailing `UnsupportedStream` instead
//! of silently producing a wrong header: inter-predicted short-term RPS
//! prediction, SPS-stored (as opposed to slice-signaled) short-term RPS
//! selection, and long-term reference pictures. None of these change the
//! bits already consumed before the bail, so slice headers that don't
//! exercise them parse normally.

use std::collections::HashMap;

use base::bail_t;

use avdcore::error::DecodeResult;
use avdcore::h265::types::Vps;
use avdcore::h265::{NalUnitType, Pps, SliceHeader, SliceType, Sps, StRpsEntry};

use super::bitreader::BitReader;

const NAL_VPS: u8 = 32;
const NAL_SPS: u8 = 33;
const NAL_PPS: u8 = 34;

pub enum H265Unit {
    ParamSet,
    Slice { header: SliceHeader, rbsp_len: usize },
    Ignored,
}

#[derive(Copy, Clone, Default)]
struct SpsExtra {
    log2_max_poc_lsb_minus4: u32,
    sample_adaptive_offset_enabled_flag: bool,
}

#[derive(Copy, Clone, Default)]
struct PpsExtra {
    dependent_slice_segments_enabled_flag: bool,
    output_flag_present_flag: bool,
    num_extra_slice_header_bits: u32,
    num_ref_idx_l0_default_active_minus1: u32,
    num_ref_idx_l1_default_active_minus1: u32,
    cabac_init_present_flag: bool,
    weighted_pred_flag: bool,
    weighted_bipred_flag: bool,
    lists_modification_present_flag: bool,
    pps_slice_chroma_qp_offsets_present_flag: bool,
    deblocking_filter_override_enabled_flag: bool,
    pps_loop_filter_across_slices_enabled_flag: bool,
    entropy_coding_sync_enabled_flag: bool,
    slice_segment_header_extension_present_flag: bool,
}

/// Removes `0x00 0x00 0x03` emulation-prevention sequences from a NAL
/// unit payload, the same transform `h264-reader`'s `RbspDecoder`
/// performs for H.264 (clause 7.3.1.1 / Annex B, shared verbatim between
/// the two codecs).
fn strip_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut zero_run = 0u32;
    for &b in data {
        if zero_run >= 2 && b == 3 {
            zero_run = 0;
            continue;
        }
        out.push(b);
        zero_run = if b == 0 { zero_run + 1 } else { 0 };
    }
    out
}

fn skip_profile_tier_level(r: &mut BitReader, max_sub_layers_minus1: u32) -> DecodeResult<()> {
    r.skip(2 + 1 + 5)?; // general_profile_space, general_tier_flag, general_profile_idc
    r.skip(32)?; // general_profile_compatibility_flag[0..32]
    r.skip(4)?; // progressive/interlaced/non_packed/frame_only source flags
    r.skip(43)?; // general_reserved_zero_43bits
    r.skip(1)?; // general_inbld_flag / reserved
    r.skip(8)?; // general_level_idc

    let mut sub_profile_present = Vec::with_capacity(max_sub_layers_minus1 as usize);
    let mut sub_level_present = Vec::with_capacity(max_sub_layers_minus1 as usize);
    for _ in 0..max_sub_layers_minus1 {
        sub_profile_present.push(r.u1()?);
        sub_level_present.push(r.u1()?);
    }
    if max_sub_layers_minus1 > 0 {
        for _ in max_sub_layers_minus1..8 {
            r.skip(2)?;
        }
    }
    for i in 0..max_sub_layers_minus1 as usize {
        if sub_profile_present[i] {
            r.skip(2 + 1 + 5)?;
            r.skip(32)?;
            r.skip(4)?;
            r.skip(43)?;
            r.skip(1)?;
        }
        if sub_level_present[i] {
            r.skip(8)?;
        }
    }
    Ok(())
}

fn skip_scaling_list_data(r: &mut BitReader) -> DecodeResult<()> {
    for size_id in 0..4u32 {
        let matrix_count = if size_id == 3 { 2 } else { 6 };
        for _ in 0..matrix_count {
            if !r.u1()? {
                // scaling_list_pred_mode_flag == 0
                r.skip_ue()?; // scaling_list_pred_matrix_id_delta
            } else {
                let coef_num = std::cmp::min(64, 1u32 << (4 + (size_id << 1)));
                if size_id > 1 {
                    r.skip_se()?; // scaling_list_dc_coef_minus8
                }
                for _ in 0..coef_num {
                    r.skip_se()?; // scaling_list_delta_coef
                }
            }
        }
    }
    Ok(())
}

/// `st_ref_pic_set()` (clause 7.3.7), direct-signaling form only.
/// Returns `(entries, num_negative_pics)` with each entry's POC still
/// delta-encoded relative to the picture that signals it; the caller
/// adds the current slice's absolute POC.
fn parse_st_rps_direct(r: &mut BitReader) -> DecodeResult<(Vec<(i64, bool)>, usize)> {
    let num_negative_pics = r.ue()?;
    let num_positive_pics = r.ue()?;
    let mut entries = Vec::with_capacity((num_negative_pics + num_positive_pics) as usize);
    let mut poc = 0i64;
    for _ in 0..num_negative_pics {
        let delta_minus1 = r.ue()? as i64;
        let used = r.u1()?;
        poc -= delta_minus1 + 1;
        entries.push((poc, used));
    }
    let mut poc = 0i64;
    for _ in 0..num_positive_pics {
        let delta_minus1 = r.ue()? as i64;
        let used = r.u1()?;
        poc += delta_minus1 + 1;
        entries.push((poc, used));
    }
    Ok((entries, num_negative_pics as usize))
}

/// Reads one `st_ref_pic_set(stRpsIdx)` occurrence, bailing out rather
/// than modeling inter-RPS prediction (only used to stay bit-aligned
/// while walking past SPS-stored RPS entries this adaptor doesn't keep).
fn skip_st_rps(r: &mut BitReader, st_rps_idx: u32) -> DecodeResult<()> {
    if st_rps_idx != 0 && r.u1()? {
        bail_t!(UnsupportedStream, "inter-predicted short-term RPS unsupported");
    }
    parse_st_rps_direct(r)?;
    Ok(())
}

pub struct H265Preparser {
    vps: HashMap<u32, Vps>,
    pub(crate) sps: HashMap<u32, Sps>,
    sps_extra: HashMap<u32, SpsExtra>,
    pub(crate) pps: HashMap<u32, Pps>,
    pps_extra: HashMap<u32, PpsExtra>,

    prev_poc_msb: i64,
    prev_poc_lsb: i64,
}

impl H265Preparser {
    pub fn new() -> Self {
        H265Preparser {
            vps: HashMap::new(),
            sps: HashMap::new(),
            sps_extra: HashMap::new(),
            pps: HashMap::new(),
            pps_extra: HashMap::new(),
            prev_poc_msb: 0,
            prev_poc_lsb: 0,
        }
    }

    pub fn sps(&self, id: u32) -> Option<&Sps> {
        self.sps.get(&id)
    }

    pub fn pps(&self, id: u32) -> Option<&Pps> {
        self.pps.get(&id)
    }

    pub fn push_nal(&mut self, nal: &[u8]) -> DecodeResult<H265Unit> {
        if nal.len() < 2 {
            bail_t!(MalformedStream, "NAL unit shorter than its 2-byte header");
        }
        let nal_type = (nal[0] >> 1) & 0x3f;
        let rbsp = strip_emulation_prevention(&nal[2..]);

        match nal_type {
            NAL_VPS => {
                let vps = self.parse_vps(&rbsp)?;
                self.vps.insert(vps.id, vps);
                Ok(H265Unit::ParamSet)
            }
            NAL_SPS => {
                let (sps, extra) = self.parse_sps(&rbsp)?;
                self.sps_extra.insert(sps.id, extra);
                self.sps.insert(sps.id, sps);
                Ok(H265Unit::ParamSet)
            }
            NAL_PPS => {
                let (pps, extra) = self.parse_pps(&rbsp)?;
                self.pps_extra.insert(pps.id, extra);
                self.pps.insert(pps.id, pps);
                Ok(H265Unit::ParamSet)
            }
            0..=31 => {
                let nal_unit_type = match nal_type {
                    16..=18 => NalUnitType::Bla,
                    19 | 20 => NalUnitType::Idr,
                    21 => NalUnitType::Cra,
                    other => NalUnitType::TrailOrOther(other),
                };
                let header = self.parse_slice_segment_header(&rbsp, nal_unit_type)?;
                Ok(H265Unit::Slice { header, rbsp_len: rbsp.len() })
            }
            _ => Ok(H265Unit::Ignored),
        }
    }

    fn parse_vps(&self, rbsp: &[u8]) -> DecodeResult<Vps> {
        let mut r = BitReader::new(rbsp);
        let id = r.u(4)?;
        Ok(Vps { id })
    }

    fn parse_sps(&self, rbsp: &[u8]) -> DecodeResult<(Sps, SpsExtra)> {
        let mut r = BitReader::new(rbsp);
        r.skip(4)?; // sps_video_parameter_set_id
        let max_sub_layers_minus1 = r.u(3)?;
        r.skip(1)?; // sps_temporal_id_nesting_flag
        skip_profile_tier_level(&mut r, max_sub_layers_minus1)?;

        let id = r.ue()?;
        let chroma_format_idc = r.ue()?;
        if chroma_format_idc == 3 {
            r.skip(1)?; // separate_colour_plane_flag; only 0 is supported downstream
        }
        let pic_width_in_luma_samples = r.ue()?;
        let pic_height_in_luma_samples = r.ue()?;
        if r.u1()? {
            // conformance_window_flag
            r.skip_ue()?;
            r.skip_ue()?;
            r.skip_ue()?;
            r.skip_ue()?;
        }
        let bit_depth_luma_minus8 = r.ue()?;
        r.skip_ue()?; // bit_depth_chroma_minus8
        let log2_max_poc_lsb_minus4 = r.ue()?;

        let sub_layer_ordering_info_present_flag = r.u1()?;
        let start = if sub_layer_ordering_info_present_flag { 0 } else { max_sub_layers_minus1 };
        for _ in start..=max_sub_layers_minus1 {
            r.skip_ue()?; // sps_max_dec_pic_buffering_minus1
            r.skip_ue()?; // sps_max_num_reorder_pics
            r.skip_ue()?; // sps_max_latency_increase_plus1
        }

        let log2_min_luma_coding_block_size_minus3 = r.ue()?;
        let log2_diff_max_min_luma_coding_block_size = r.ue()?;
        r.skip_ue()?; // log2_min_luma_transform_block_size_minus2
        r.skip_ue()?; // log2_diff_max_min_luma_transform_block_size
        r.skip_ue()?; // max_transform_hierarchy_depth_inter
        r.skip_ue()?; // max_transform_hierarchy_depth_intra

        if r.u1()? {
            // scaling_list_enabled_flag
            if r.u1()? {
                // sps_scaling_list_data_present_flag
                skip_scaling_list_data(&mut r)?;
            }
        }
        r.skip(1)?; // amp_enabled_flag
        let sample_adaptive_offset_enabled_flag = r.u1()?;
        if r.u1()? {
            // pcm_enabled_flag
            r.skip(4)?;
            r.skip(4)?;
            r.skip_ue()?;
            r.skip_ue()?;
            r.skip(1)?;
        }

        let num_short_term_ref_pic_sets = r.ue()?;
        for i in 0..num_short_term_ref_pic_sets {
            skip_st_rps(&mut r, i)?;
        }

        if r.u1()? {
            // long_term_ref_pics_present_flag
            bail_t!(UnsupportedStream, "long-term HEVC reference pictures unsupported");
        }
        r.skip(1)?; // sps_temporal_mvp_enabled_flag
        r.skip(1)?; // strong_intra_smoothing_enabled_flag
        // vui_parameters_present_flag and anything past it: not needed downstream.

        let ctb_log2_size = log2_min_luma_coding_block_size_minus3 + 3 + log2_diff_max_min_luma_coding_block_size;
        let ctb_size = 1u32 << ctb_log2_size;
        let pic_width_in_ctbs = pic_width_in_luma_samples.div_ceil(ctb_size);
        let pic_height_in_ctbs = pic_height_in_luma_samples.div_ceil(ctb_size);

        Ok((
            Sps {
                id,
                chroma_format_idc,
                bit_depth_luma: bit_depth_luma_minus8 + 8,
                ctb_log2_size,
                pic_width_in_ctbs,
                pic_height_in_ctbs,
            },
            SpsExtra {
                log2_max_poc_lsb_minus4,
                sample_adaptive_offset_enabled_flag,
            },
        ))
    }

    fn parse_pps(&self, rbsp: &[u8]) -> DecodeResult<(Pps, PpsExtra)> {
        let mut r = BitReader::new(rbsp);
        let id = r.ue()?;
        let sps_id = r.ue()?;
        let dependent_slice_segments_enabled_flag = r.u1()?;
        let output_flag_present_flag = r.u1()?;
        let num_extra_slice_header_bits = r.u(3)?;
        r.skip(1)?; // sign_data_hiding_enabled_flag
        let cabac_init_present_flag = r.u1()?;
        let num_ref_idx_l0_default_active_minus1 = r.ue()?;
        let num_ref_idx_l1_default_active_minus1 = r.ue()?;
        r.skip_se()?; // init_qp_minus26
        r.skip(1)?; // constrained_intra_pred_flag
        r.skip(1)?; // transform_skip_enabled_flag
        if r.u1()? {
            // cu_qp_delta_enabled_flag
            r.skip_ue()?; // diff_cu_qp_delta_depth
        }
        r.skip_se()?; // pps_cb_qp_offset
        r.skip_se()?; // pps_cr_qp_offset
        let pps_slice_chroma_qp_offsets_present_flag = r.u1()?;
        let weighted_pred_flag = r.u1()?;
        let weighted_bipred_flag = r.u1()?;
        r.skip(1)?; // transquant_bypass_enabled_flag
        let tiles_enabled_flag = r.u1()?;
        let entropy_coding_sync_enabled_flag = r.u1()?;

        let mut num_tile_columns = 1u32;
        let mut num_tile_rows = 1u32;
        if tiles_enabled_flag {
            let num_tile_columns_minus1 = r.ue()?;
            let num_tile_rows_minus1 = r.ue()?;
            num_tile_columns = num_tile_columns_minus1 + 1;
            num_tile_rows = num_tile_rows_minus1 + 1;
            if !r.u1()? {
                // uniform_spacing_flag == 0
                for _ in 0..num_tile_columns_minus1 {
                    r.skip_ue()?;
                }
                for _ in 0..num_tile_rows_minus1 {
                    r.skip_ue()?;
                }
            }
            r.skip(1)?; // loop_filter_across_tiles_enabled_flag
        }

        let pps_loop_filter_across_slices_enabled_flag = r.u1()?;
        let deblocking_filter_override_enabled_flag;
        if r.u1()? {
            // deblocking_filter_control_present_flag
            deblocking_filter_override_enabled_flag = r.u1()?;
            let disabled = r.u1()?;
            if !disabled {
                r.skip_se()?;
                r.skip_se()?;
            }
        } else {
            deblocking_filter_override_enabled_flag = false;
        }
        if r.u1()? {
            // pps_scaling_list_data_present_flag
            skip_scaling_list_data(&mut r)?;
        }
        let lists_modification_present_flag = r.u1()?;
        r.skip_ue()?; // log2_parallel_merge_level_minus2
        let slice_segment_header_extension_present_flag = r.u1()?;
        // pps_extension_present_flag and anything past it: not needed downstream.

        Ok((
            Pps {
                id,
                sps_id,
                tiles_enabled_flag,
                num_tile_columns,
                num_tile_rows,
            },
            PpsExtra {
                dependent_slice_segments_enabled_flag,
                output_flag_present_flag,
                num_extra_slice_header_bits,
                num_ref_idx_l0_default_active_minus1,
                num_ref_idx_l1_default_active_minus1,
                cabac_init_present_flag,
                weighted_pred_flag,
                weighted_bipred_flag,
                lists_modification_present_flag,
                pps_slice_chroma_qp_offsets_present_flag,
                deblocking_filter_override_enabled_flag,
                pps_loop_filter_across_slices_enabled_flag,
                entropy_coding_sync_enabled_flag,
                slice_segment_header_extension_present_flag,
            },
        ))
    }

    fn parse_slice_segment_header(&mut self, rbsp: &[u8], nal_unit_type: NalUnitType) -> DecodeResult<SliceHeader> {
        let mut r = BitReader::new(rbsp);
        let first_slice_segment_in_pic_flag = r.u1()?;
        if nal_unit_type.is_irap() {
            r.skip(1)?; // no_output_of_prior_pics_flag
        }
        let pps_id = r.ue()?;
        let pps = self
            .pps
            .get(&pps_id)
            .ok_or_else(|| base::Error::new(base::ErrorKind::MalformedStream, format!("slice references unknown pps id {pps_id}")))?;
        let pps_extra = self.pps_extra.get(&pps_id).copied().unwrap_or_default();
        let sps = self
            .sps
            .get(&pps.sps_id)
            .ok_or_else(|| base::Error::new(base::ErrorKind::MalformedStream, format!("pps references unknown sps id {}", pps.sps_id)))?;
        let sps_extra = self.sps_extra.get(&pps.sps_id).copied().unwrap_or_default();

        let mut dependent_slice_segment_flag = false;
        let mut slice_segment_address = 0u32;
        if !first_slice_segment_in_pic_flag {
            if pps_extra.dependent_slice_segments_enabled_flag {
                dependent_slice_segment_flag = r.u1()?;
            }
            let pic_size_in_ctbs = sps.pic_width_in_ctbs * sps.pic_height_in_ctbs;
            let addr_bits = 32 - (pic_size_in_ctbs.max(1) - 1).leading_zeros().min(32);
            slice_segment_address = if addr_bits == 0 { 0 } else { r.u(addr_bits)? };
        }

        for _ in 0..pps_extra.num_extra_slice_header_bits {
            r.skip(1)?;
        }

        if dependent_slice_segment_flag {
            // Every remaining field is inherited; only address/entry
            // points were carried on the wire, and entry points follow
            // the same unconditional trailer as an independent segment.
            let entry_point_offsets = parse_entry_points(&mut r, pps, &pps_extra)?;
            return Ok(SliceHeader {
                nal_unit_type,
                slice_type: SliceType::I,
                pps_id,
                poc: 0,
                pic_output_flag: true,
                num_ref_idx_l0_active_minus1: 0,
                num_ref_idx_l1_active_minus1: 0,
                st_rps: Vec::new(),
                st_rps_num_negative_pics: 0,
                slice_qp_delta: 0,
                slice_segment_address,
                dependent_slice_segment_flag: true,
                entry_point_offsets,
            });
        }

        let slice_type = match r.ue()? {
            0 => SliceType::B,
            1 => SliceType::P,
            _ => SliceType::I,
        };
        let pic_output_flag = if pps_extra.output_flag_present_flag { r.u1()? } else { true };

        let mut poc = 0i64;
        let mut st_rps: Vec<StRpsEntry> = Vec::new();
        let mut st_rps_num_negative_pics = 0usize;
        if nal_unit_type.is_irap() {
            self.prev_poc_msb = 0;
            self.prev_poc_lsb = 0;
            poc = 0;
        } else {
            let poc_lsb_bits = sps_extra.log2_max_poc_lsb_minus4 + 4;
            let poc_lsb = r.u(poc_lsb_bits)? as i64;
            let max_poc_lsb = 1i64 << poc_lsb_bits;
            let poc_msb = if poc_lsb < self.prev_poc_lsb && self.prev_poc_lsb - poc_lsb >= max_poc_lsb / 2 {
                self.prev_poc_msb + max_poc_lsb
            } else if poc_lsb > self.prev_poc_lsb && poc_lsb - self.prev_poc_lsb > max_poc_lsb / 2 {
                self.prev_poc_msb - max_poc_lsb
            } else {
                self.prev_poc_msb
            };
            poc = poc_msb + poc_lsb;
            self.prev_poc_msb = poc_msb;
            self.prev_poc_lsb = poc_lsb;

            if !r.u1()? {
                // short_term_ref_pic_set_sps_flag == 0: signaled directly
                let (deltas, num_neg) = parse_st_rps_direct(&mut r)?;
                st_rps_num_negative_pics = num_neg;
                st_rps = deltas.into_iter().map(|(delta, used)| StRpsEntry { poc: poc + delta, used }).collect();
            } else {
                bail_t!(UnsupportedStream, "SPS-stored short_term_ref_pic_set selection unsupported");
            }
        }

        if sps_extra.sample_adaptive_offset_enabled_flag {
            r.skip(1)?; // slice_sao_luma_flag
            if sps.chroma_format_idc != 0 {
                r.skip(1)?; // slice_sao_chroma_flag
            }
        }

        let mut num_ref_idx_l0_active_minus1 = pps_extra.num_ref_idx_l0_default_active_minus1;
        let mut num_ref_idx_l1_active_minus1 = pps_extra.num_ref_idx_l1_default_active_minus1;
        if matches!(slice_type, SliceType::P | SliceType::B) {
            if r.u1()? {
                // num_ref_idx_active_override_flag
                num_ref_idx_l0_active_minus1 = r.ue()?;
                if slice_type == SliceType::B {
                    num_ref_idx_l1_active_minus1 = r.ue()?;
                }
            }

            let num_pic_total_curr = st_rps.iter().filter(|e| e.used).count() as u32;
            if pps_extra.lists_modification_present_flag && num_pic_total_curr > 1 {
                let idx_bits = 32 - (num_pic_total_curr - 1).leading_zeros();
                if r.u1()? {
                    // ref_pic_list_modification_flag_l0
                    for _ in 0..=num_ref_idx_l0_active_minus1 {
                        r.skip(idx_bits)?;
                    }
                }
                if slice_type == SliceType::B && r.u1()? {
                    for _ in 0..=num_ref_idx_l1_active_minus1 {
                        r.skip(idx_bits)?;
                    }
                }
            }

            if slice_type == SliceType::B {
                r.skip(1)?; // mvd_l1_zero_flag
            }
            if pps_extra.cabac_init_present_flag {
                r.skip(1)?; // cabac_init_flag
            }
            // slice_temporal_mvp_enabled_flag isn't surfaced downstream, so
            // collocated_ref signaling is skipped unconditionally here too
            // when the weighted-prediction/merge fields below don't depend
            // on it (this crate never emits collocated-MV opcodes).

            let uses_weight_table =
                (pps_extra.weighted_pred_flag && slice_type == SliceType::P) || (pps_extra.weighted_bipred_flag && slice_type == SliceType::B);
            if uses_weight_table {
                skip_pred_weight_table(
                    &mut r,
                    sps.chroma_format_idc,
                    num_ref_idx_l0_active_minus1,
                    if slice_type == SliceType::B { Some(num_ref_idx_l1_active_minus1) } else { None },
                )?;
            }
            r.skip_ue()?; // five_minus_max_num_merge_cand
        }

        let slice_qp_delta = r.se()?;
        if pps_extra.pps_slice_chroma_qp_offsets_present_flag {
            r.skip_se()?;
            r.skip_se()?;
        }
        if pps_extra.deblocking_filter_override_enabled_flag && r.u1()? {
            // deblocking_filter_override_flag
            if !r.u1()? {
                // slice_deblocking_filter_disabled_flag == 0
                r.skip_se()?;
                r.skip_se()?;
            }
        }
        if pps_extra.pps_loop_filter_across_slices_enabled_flag
            && (sps_extra.sample_adaptive_offset_enabled_flag || matches!(slice_type, SliceType::P | SliceType::B))
        {
            r.skip(1)?; // slice_loop_filter_across_slices_enabled_flag
        }

        let entry_point_offsets = parse_entry_points(&mut r, pps, &pps_extra)?;

        Ok(SliceHeader {
            nal_unit_type,
            slice_type,
            pps_id,
            poc,
            pic_output_flag,
            num_ref_idx_l0_active_minus1,
            num_ref_idx_l1_active_minus1,
            st_rps,
            st_rps_num_negative_pics,
            slice_qp_delta,
            slice_segment_address,
            dependent_slice_segment_flag,
            entry_point_offsets,
        })
    }
}

impl Default for H265Preparser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_entry_points(r: &mut BitReader, pps: &Pps, pps_extra: &PpsExtra) -> DecodeResult<Vec<u32>> {
    if !(pps.tiles_enabled_flag || pps_extra.entropy_coding_sync_enabled_flag) {
        return Ok(Vec::new());
    }
    let num_entry_point_offsets = r.ue()?;
    if num_entry_point_offsets == 0 {
        return Ok(Vec::new());
    }
    let offset_len_minus1 = r.ue()?;
    let mut offsets = Vec::with_capacity(num_entry_point_offsets as usize);
    for _ in 0..num_entry_point_offsets {
        offsets.push(r.u(offset_len_minus1 + 1)?);
    }
    Ok(offsets)
}

fn skip_pred_weight_table(
    r: &mut BitReader,
    chroma_format_idc: u32,
    num_ref_idx_l0_active_minus1: u32,
    num_ref_idx_l1_active_minus1: Option<u32>,
) -> DecodeResult<()> {
    r.skip_ue()?; // luma_log2_weight_denom
    if chroma_format_idc != 0 {
        r.skip_se()?; // delta_chroma_log2_weight_denom
    }
    skip_weight_list(r, chroma_format_idc, num_ref_idx_l0_active_minus1 + 1)?;
    if let Some(n1) = num_ref_idx_l1_active_minus1 {
        skip_weight_list(r, chroma_format_idc, n1 + 1)?;
    }
    Ok(())
}

fn skip_weight_list(r: &mut BitReader, chroma_format_idc: u32, count: u32) -> DecodeResult<()> {
    let mut luma_flags = Vec::with_capacity(count as usize);
    let mut chroma_flags = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let luma_flag = r.u1()?;
        luma_flags.push(luma_flag);
        let chroma_flag = if chroma_format_idc != 0 { r.u1()? } else { false };
        chroma_flags.push(chroma_flag);
    }
    for i in 0..count as usize {
        if luma_flags[i] {
            r.skip_se()?;
            r.skip_se()?;
        }
        if chroma_flags[i] {
            for _ in 0..2 {
                r.skip_se()?;
                r.skip_se()?;
            }
        }
    }
    Ok(())
}
