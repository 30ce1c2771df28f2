// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! H.264 pre-parser adaptor: Annex-B NAL splitting, RBSP extraction, and
//! SPS/PPS/slice-header syntax decode, normalized into the
//! [`avdcore::h264`] shapes the DPB manager and HAL consume.
//!
//! RBSP extraction (stripping emulation-prevention bytes) goes through
//! the real `h264-reader` crate exactly as it's used elsewhere in this
//! dependency graph: push the NAL payload through its `RbspDecoder` via a
//! small [`NalHandler`] sink. The rest of this module — SPS/PPS/slice
//! header syntax decode — is hand-rolled against [`BitReader`], since
//! `h264-reader`'s own higher-level parsers assume a state-tracking
//! `Context` this thin adaptor doesn't maintain.

use std::collections::HashMap;

use base::bail_t;
use h264_reader::nal::{NalHandler, NalHeader};
use h264_reader::rbsp::RbspDecoder;
use h264_reader::Context as ReaderContext;

use avdcore::error::DecodeResult;
use avdcore::h264::{Mmco, NalUnitType, PicParameterSet, RefPicListModOp, SeqParameterSet, SliceHeader, SliceType};
use avdcore::h264::types::WeightEntry;

use super::bitreader::BitReader;

pub use super::split_annex_b;

const NAL_SEQ_PARAMETER_SET: u8 = 7;
const NAL_PIC_PARAMETER_SET: u8 = 8;

/// One classified NAL unit, handed back by [`H264Preparser::push_nal`].
pub enum H264Unit {
    /// An SPS or PPS was parsed and stored in the preparser's tables.
    ParamSet,
    /// A coded slice, ready to run through `avdcore::h264::decode_slice`.
    Slice { header: SliceHeader, rbsp_len: usize },
    /// A NAL type this adaptor doesn't need (SEI, AUD, filler, ...).
    Ignored,
}

/// Per-PPS syntax elements the slice-header parser needs but `avdcore`'s
/// [`PicParameterSet`] has no use for downstream (kept here, not in core).
#[derive(Copy, Clone, Default)]
struct PpsExtra {
    weighted_pred_flag: bool,
    weighted_bipred_idc: u8,
}

struct NalSink(Vec<u8>);

impl NalHandler for NalSink {
    type Ctx = ();
    fn start(&mut self, _ctx: &mut ReaderContext<Self::Ctx>, _header: NalHeader) {}
    fn push(&mut self, _ctx: &mut ReaderContext<Self::Ctx>, buf: &[u8]) {
        self.0.extend_from_slice(buf);
    }
    fn end(&mut self, _ctx: &mut ReaderContext<Self::Ctx>) {}
}

/// Strips emulation-prevention (`0x03`) bytes from a NAL payload, exactly
/// as the teacher's own `decode()` helper does for the same purpose.
fn decode_rbsp(payload: &[u8]) -> Vec<u8> {
    let mut decoder = RbspDecoder::new(NalSink(Vec::new()));
    let mut ctx = ReaderContext::new(());
    decoder.push(&mut ctx, payload);
    decoder.into_handler().0
}

fn skip_scaling_list(r: &mut BitReader, size: usize) -> DecodeResult<()> {
    let mut last_scale = 8i32;
    let mut next_scale = 8i32;
    for _ in 0..size {
        if next_scale != 0 {
            let delta_scale = r.se()?;
            next_scale = (last_scale + delta_scale + 256) % 256;
        }
        last_scale = if next_scale == 0 { last_scale } else { next_scale };
    }
    Ok(())
}

pub struct H264Preparser {
    pub(crate) sps: HashMap<u32, SeqParameterSet>,
    pub(crate) pps: HashMap<u32, PicParameterSet>,
    pps_extra: HashMap<u32, PpsExtra>,
}

impl H264Preparser {
    pub fn new() -> Self {
        H264Preparser {
            sps: HashMap::new(),
            pps: HashMap::new(),
            pps_extra: HashMap::new(),
        }
    }

    pub fn sps(&self, id: u32) -> Option<&SeqParameterSet> {
        self.sps.get(&id)
    }

    pub fn pps(&self, id: u32) -> Option<&PicParameterSet> {
        self.pps.get(&id)
    }

    /// Classifies and, for parameter sets and slices, fully parses one
    /// Annex-B NAL unit (header byte included).
    pub fn push_nal(&mut self, nal: &[u8]) -> DecodeResult<H264Unit> {
        if nal.is_empty() {
            bail_t!(MalformedStream, "empty NAL unit");
        }
        let nal_ref_idc = (nal[0] >> 5) & 0x3;
        let nal_type = nal[0] & 0x1f;
        let rbsp = decode_rbsp(&nal[1..]);

        match nal_type {
            NAL_SEQ_PARAMETER_SET => {
                let sps = self.parse_sps(&rbsp)?;
                self.sps.insert(sps.id, sps);
                Ok(H264Unit::ParamSet)
            }
            NAL_PIC_PARAMETER_SET => {
                let (pps, extra) = self.parse_pps(&rbsp)?;
                self.pps_extra.insert(pps.id, extra);
                self.pps.insert(pps.id, pps);
                Ok(H264Unit::ParamSet)
            }
            1 | 5 => {
                let nal_unit_type = if nal_type == 5 { NalUnitType::Idr } else { NalUnitType::NonIdr };
                let header = self.parse_slice_header(&rbsp, nal_ref_idc, nal_unit_type)?;
                Ok(H264Unit::Slice { header, rbsp_len: rbsp.len() })
            }
            other => {
                let _ = other;
                Ok(H264Unit::Ignored)
            }
        }
    }

    fn parse_sps(&self, rbsp: &[u8]) -> DecodeResult<SeqParameterSet> {
        let mut r = BitReader::new(rbsp);
        let profile_idc = r.u(8)?;
        r.skip(8)?; // constraint_set flags + reserved_zero_2bits
        r.skip(8)?; // level_idc
        let id = r.ue()?;

        let mut chroma_format_idc = 1u32;
        let mut seq_scaling_matrix_present_flag = false;
        if matches!(profile_idc, 100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135) {
            chroma_format_idc = r.ue()?;
            if chroma_format_idc == 3 {
                r.skip(1)?; // separate_colour_plane_flag
            }
            r.skip_ue()?; // bit_depth_luma_minus8
            r.skip_ue()?; // bit_depth_chroma_minus8
            r.skip(1)?; // qpprime_y_zero_transform_bypass_flag
            seq_scaling_matrix_present_flag = r.u1()?;
            if seq_scaling_matrix_present_flag {
                let count = if chroma_format_idc != 3 { 8 } else { 12 };
                for i in 0..count {
                    if r.u1()? {
                        skip_scaling_list(&mut r, if i < 6 { 16 } else { 64 })?;
                    }
                }
            }
        }

        let log2_max_frame_num_minus4 = r.ue()?;
        let pic_order_cnt_type = r.ue()?;
        let mut log2_max_pic_order_cnt_lsb_minus4 = 0u32;
        if pic_order_cnt_type == 0 {
            log2_max_pic_order_cnt_lsb_minus4 = r.ue()?;
        } else if pic_order_cnt_type == 1 {
            r.skip(1)?; // delta_pic_order_always_zero_flag
            r.skip_se()?; // offset_for_non_ref_pic
            r.skip_se()?; // offset_for_top_to_bottom_field
            let num_ref_frames_in_pic_order_cnt_cycle = r.ue()?;
            for _ in 0..num_ref_frames_in_pic_order_cnt_cycle {
                r.skip_se()?;
            }
        }

        let max_num_ref_frames = r.ue()?;
        let gaps_in_frame_num_value_allowed_flag = r.u1()?;
        let pic_width_in_mbs_minus1 = r.ue()?;
        let pic_height_in_map_units_minus1 = r.ue()?;
        let frame_mbs_only_flag = r.u1()?;
        if !frame_mbs_only_flag {
            bail_t!(UnsupportedStream, "interlaced H.264 (frame_mbs_only_flag=0) unsupported");
        }
        let direct_8x8_inference_flag = r.u1()?;
        let frame_cropping_flag = r.u1()?;
        if frame_cropping_flag {
            r.skip_ue()?;
            r.skip_ue()?;
            r.skip_ue()?;
            r.skip_ue()?;
        }
        // vui_parameters_present_flag and any VUI payload: unused downstream.

        Ok(SeqParameterSet {
            id,
            log2_max_frame_num_minus4,
            pic_order_cnt_type,
            log2_max_pic_order_cnt_lsb_minus4,
            gaps_in_frame_num_value_allowed_flag,
            max_num_ref_frames,
            chroma_format_idc,
            direct_8x8_inference_flag,
            seq_scaling_matrix_present_flag,
            mb_width: pic_width_in_mbs_minus1 + 1,
            mb_height: pic_height_in_map_units_minus1 + 1,
        })
    }

    fn parse_pps(&self, rbsp: &[u8]) -> DecodeResult<(PicParameterSet, PpsExtra)> {
        let mut r = BitReader::new(rbsp);
        let id = r.ue()?;
        let sps_id = r.ue()?;
        let entropy_coding_mode_flag = r.u1()?;
        r.skip(1)?; // bottom_field_pic_order_in_frame_present_flag
        let num_slice_groups_minus1 = r.ue()?;
        if num_slice_groups_minus1 > 0 {
            bail_t!(UnsupportedStream, "num_slice_groups_minus1 > 0 (FMO) unsupported");
        }
        let num_ref_idx_l0_default_active_minus1 = r.ue()?;
        let num_ref_idx_l1_default_active_minus1 = r.ue()?;
        let weighted_pred_flag = r.u1()?;
        let weighted_bipred_idc = r.u(2)? as u8;
        r.skip_se()?; // pic_init_qp_minus26
        r.skip_se()?; // pic_init_qs_minus26
        r.skip_se()?; // chroma_qp_index_offset
        r.skip(1)?; // deblocking_filter_control_present_flag
        r.skip(1)?; // constrained_intra_pred_flag
        r.skip(1)?; // redundant_pic_cnt_present_flag

        let mut transform_8x8_mode_flag = false;
        let mut pic_scaling_matrix_present_flag = false;
        if r.more_rbsp_data() {
            transform_8x8_mode_flag = r.u1()?;
            pic_scaling_matrix_present_flag = r.u1()?;
            if pic_scaling_matrix_present_flag {
                let sps_chroma_format_idc = self.sps.get(&sps_id).map(|s| s.chroma_format_idc).unwrap_or(1);
                let count = 6 + if sps_chroma_format_idc != 3 { 2 } else { 6 } * transform_8x8_mode_flag as u32;
                for i in 0..count {
                    if r.u1()? {
                        skip_scaling_list(&mut r, if i < 6 { 16 } else { 64 })?;
                    }
                }
            }
            if r.more_rbsp_data() {
                r.skip_se()?; // second_chroma_qp_index_offset
            }
        }

        Ok((
            PicParameterSet {
                id,
                sps_id,
                entropy_coding_mode_flag,
                transform_8x8_mode_flag,
                pic_scaling_matrix_present_flag,
                num_ref_idx_l0_default_active_minus1,
                num_ref_idx_l1_default_active_minus1,
            },
            PpsExtra {
                weighted_pred_flag,
                weighted_bipred_idc,
            },
        ))
    }

    fn parse_slice_header(&self, rbsp: &[u8], nal_ref_idc: u8, nal_unit_type: NalUnitType) -> DecodeResult<SliceHeader> {
        let mut r = BitReader::new(rbsp);
        r.skip_ue()?; // first_mb_in_slice
        let slice_type = SliceType::from_u8(r.ue()? as u8);
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

        let frame_num = r.u(sps.log2_max_frame_num_minus4 + 4)? as i64;
        // field_pic_flag is only present when !frame_mbs_only_flag, which
        // the SPS parser already rejects as UnsupportedStream.
        let field_pic_flag = false;

        if nal_unit_type == NalUnitType::Idr {
            r.skip_ue()?; // idr_pic_id
        }

        if sps.pic_order_cnt_type != 0 {
            bail_t!(UnsupportedStream, "pic_order_cnt_type {} unsupported", sps.pic_order_cnt_type);
        }
        let pic_order_cnt_lsb = r.u(sps.log2_max_pic_order_cnt_lsb_minus4 + 4)? as i64;

        if slice_type == SliceType::B {
            r.skip(1)?; // direct_spatial_mv_pred_flag
        }

        let mut num_ref_idx_l0_active_minus1 = pps.num_ref_idx_l0_default_active_minus1;
        let mut num_ref_idx_l1_active_minus1 = pps.num_ref_idx_l1_default_active_minus1;
        if matches!(slice_type, SliceType::P | SliceType::Sp | SliceType::B) {
            if r.u1()? {
                // num_ref_idx_active_override_flag
                num_ref_idx_l0_active_minus1 = r.ue()?;
                if slice_type == SliceType::B {
                    num_ref_idx_l1_active_minus1 = r.ue()?;
                }
            }
        }

        let (ref_pic_list_modification_flag_l0, ref_pic_list_mod_l0) =
            parse_ref_pic_list_modification(&mut r, matches!(slice_type, SliceType::P | SliceType::Sp | SliceType::B))?;
        let (ref_pic_list_modification_flag_l1, ref_pic_list_mod_l1) =
            parse_ref_pic_list_modification(&mut r, slice_type == SliceType::B)?;

        let uses_weight_table = (pps_extra.weighted_pred_flag && matches!(slice_type, SliceType::P | SliceType::Sp))
            || (pps_extra.weighted_bipred_idc == 1 && slice_type == SliceType::B);
        let mut luma_log2_weight_denom = 0u32;
        let mut chroma_log2_weight_denom = 0u32;
        let mut weights_l0 = Vec::new();
        let mut weights_l1 = Vec::new();
        if uses_weight_table {
            let (ldenom, cdenom, w0, w1) = parse_pred_weight_table(
                &mut r,
                sps.chroma_format_idc,
                num_ref_idx_l0_active_minus1,
                if slice_type == SliceType::B { Some(num_ref_idx_l1_active_minus1) } else { None },
            )?;
            luma_log2_weight_denom = ldenom;
            chroma_log2_weight_denom = cdenom;
            weights_l0 = w0;
            weights_l1 = w1;
        }

        let mut adaptive_ref_pic_marking_mode_flag = false;
        let mut mmco = Vec::new();
        if nal_unit_type == NalUnitType::Idr {
            r.skip(1)?; // no_output_of_prior_pics_flag
            r.skip(1)?; // long_term_reference_flag
        } else if nal_ref_idc != 0 {
            adaptive_ref_pic_marking_mode_flag = r.u1()?;
            if adaptive_ref_pic_marking_mode_flag {
                loop {
                    let op = r.ue()?;
                    match op {
                        0 => {
                            mmco.push(Mmco::End);
                            break;
                        }
                        1 => mmco.push(Mmco::ForgetShort { abs_diff_pic_num_minus1: r.ue()? }),
                        2 => mmco.push(Mmco::ForgetLong { long_term_pic_num: r.ue()? }),
                        3 => {
                            let abs_diff_pic_num_minus1 = r.ue()?;
                            let long_term_frame_idx = r.ue()?;
                            mmco.push(Mmco::ShortToLong { abs_diff_pic_num_minus1, long_term_frame_idx });
                        }
                        4 => mmco.push(Mmco::ForgetLongMax { max_long_term_frame_idx_plus1: r.ue()? }),
                        5 | 6 => bail_t!(UnsupportedStream, "MMCO op {op} unsupported"),
                        other => bail_t!(MalformedStream, "unknown MMCO op {other}"),
                    }
                }
            }
        }

        let _ = r.ue(); // cabac_init_idc, only if entropy_coding_mode_flag && slice_type not I/SI — best-effort, not relied on downstream
        let slice_qp_delta = r.se().unwrap_or(0);

        Ok(SliceHeader {
            nal_unit_type,
            nal_ref_idc,
            slice_type,
            pps_id,
            frame_num,
            field_pic_flag,
            pic_order_cnt_lsb,
            num_ref_idx_l0_active_minus1,
            num_ref_idx_l1_active_minus1,
            ref_pic_list_modification_flag_l0,
            ref_pic_list_modification_flag_l1,
            ref_pic_list_mod_l0,
            ref_pic_list_mod_l1,
            adaptive_ref_pic_marking_mode_flag,
            mmco,
            slice_qp_delta,
            luma_log2_weight_denom,
            chroma_log2_weight_denom,
            weights_l0,
            weights_l1,
        })
    }
}

impl Default for H264Preparser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_ref_pic_list_modification(r: &mut BitReader, applicable: bool) -> DecodeResult<(bool, Vec<RefPicListModOp>)> {
    if !applicable {
        return Ok((false, Vec::new()));
    }
    let flag = r.u1()?;
    let mut ops = Vec::new();
    if flag {
        loop {
            let idc = r.ue()? as u8;
            if idc == 3 {
                break;
            }
            match idc {
                0 | 1 => ops.push(RefPicListModOp { idc, abs_diff_pic_num_minus1: r.ue()? }),
                2 => ops.push(RefPicListModOp { idc, abs_diff_pic_num_minus1: r.ue()? }),
                other => bail_t!(MalformedStream, "unknown ref_pic_list_modification idc {other}"),
            }
        }
    }
    Ok((flag, ops))
}

/// `pred_weight_table()` (7.3.3.2): returns the two log2 denominators plus
/// one [`WeightEntry`] per active reference in each list. Entries whose
/// `luma_weight_l{x}_flag`/`chroma_weight_l{x}_flag` was unset carry
/// `None`, so the HAL knows to fall back to the denom-derived default
/// weight (2^denom) rather than emit a stray zero (spec.md §4.2
/// "weighted-prediction tables").
#[allow(clippy::type_complexity)]
fn parse_pred_weight_table(
    r: &mut BitReader,
    chroma_format_idc: u32,
    num_ref_idx_l0_active_minus1: u32,
    num_ref_idx_l1_active_minus1: Option<u32>,
) -> DecodeResult<(u32, u32, Vec<WeightEntry>, Vec<WeightEntry>)> {
    let luma_log2_weight_denom = r.ue()?;
    let chroma_log2_weight_denom = if chroma_format_idc != 0 { r.ue()? } else { 0 };
    let weights_l0 = parse_weight_list(r, chroma_format_idc, num_ref_idx_l0_active_minus1 + 1)?;
    let weights_l1 = match num_ref_idx_l1_active_minus1 {
        Some(n1) => parse_weight_list(r, chroma_format_idc, n1 + 1)?,
        None => Vec::new(),
    };
    Ok((luma_log2_weight_denom, chroma_log2_weight_denom, weights_l0, weights_l1))
}

fn parse_weight_list(r: &mut BitReader, chroma_format_idc: u32, count: u32) -> DecodeResult<Vec<WeightEntry>> {
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut entry = WeightEntry::default();
        if r.u1()? {
            // luma_weight_l{x}_flag
            let weight = r.se()?;
            let offset = r.se()?;
            entry.luma = Some((weight, offset));
        }
        if chroma_format_idc != 0 && r.u1()? {
            // chroma_weight_l{x}_flag
            let mut chroma = [(0i32, 0i32); 2];
            for c in chroma.iter_mut() {
                let weight = r.se()?;
                let offset = r.se()?;
                *c = (weight, offset);
            }
            entry.chroma = Some(chroma);
        }
        out.push(entry);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit_ue(bits: &mut Vec<bool>, v: u32) {
        if v == 0 {
            bits.push(true);
            return;
        }
        let code = v + 1;
        let nbits = 32 - code.leading_zeros();
        for _ in 0..nbits - 1 {
            bits.push(false);
        }
        for i in (0..nbits).rev() {
            bits.push((code >> i) & 1 == 1);
        }
    }

    fn emit_u(bits: &mut Vec<bool>, v: u32, n: u32) {
        for i in (0..n).rev() {
            bits.push((v >> i) & 1 == 1);
        }
    }

    fn pack(bits: &[bool]) -> Vec<u8> {
        let mut out = vec![0u8; bits.len().div_ceil(8)];
        for (i, &b) in bits.iter().enumerate() {
            if b {
                out[i / 8] |= 1 << (7 - (i % 8));
            }
        }
        out
    }

    /// A minimal baseline-profile SPS: 64x64 luma (4x4 macroblocks),
    /// frame_mbs_only, pic_order_cnt_type 0, no scaling matrices.
    fn minimal_sps_bytes(id: u32) -> Vec<u8> {
        let mut bits = Vec::new();
        emit_u(&mut bits, 66, 8); // profile_idc (baseline, no high-profile fields)
        emit_u(&mut bits, 0, 8); // constraint flags + reserved
        emit_u(&mut bits, 30, 8); // level_idc
        emit_ue(&mut bits, id);
        emit_ue(&mut bits, 0); // log2_max_frame_num_minus4
        emit_ue(&mut bits, 0); // pic_order_cnt_type
        emit_ue(&mut bits, 4); // log2_max_pic_order_cnt_lsb_minus4
        emit_ue(&mut bits, 2); // max_num_ref_frames
        bits.push(false); // gaps_in_frame_num_value_allowed_flag
        emit_ue(&mut bits, 3); // pic_width_in_mbs_minus1 -> mb_width 4
        emit_ue(&mut bits, 3); // pic_height_in_map_units_minus1 -> mb_height 4
        bits.push(true); // frame_mbs_only_flag
        bits.push(false); // direct_8x8_inference_flag
        bits.push(false); // frame_cropping_flag
        bits.push(false); // vui_parameters_present_flag
        bits.push(true); // rbsp_stop_bit
        pack(&bits)
    }

    fn minimal_pps_bytes(id: u32, sps_id: u32) -> Vec<u8> {
        let mut bits = Vec::new();
        emit_ue(&mut bits, id);
        emit_ue(&mut bits, sps_id);
        bits.push(false); // entropy_coding_mode_flag
        bits.push(false); // bottom_field_pic_order_in_frame_present_flag
        emit_ue(&mut bits, 0); // num_slice_groups_minus1
        emit_ue(&mut bits, 0); // num_ref_idx_l0_default_active_minus1
        emit_ue(&mut bits, 0); // num_ref_idx_l1_default_active_minus1
        bits.push(false); // weighted_pred_flag
        emit_u(&mut bits, 0, 2); // weighted_bipred_idc
        emit_ue(&mut bits, 0); // pic_init_qp_minus26 (se encoded as ue 0 == 0)
        emit_ue(&mut bits, 0); // pic_init_qs_minus26
        emit_ue(&mut bits, 0); // chroma_qp_index_offset
        bits.push(false); // deblocking_filter_control_present_flag
        bits.push(false); // constrained_intra_pred_flag
        bits.push(false); // redundant_pic_cnt_present_flag
        bits.push(true); // rbsp_stop_bit, no extension
        pack(&bits)
    }

    fn minimal_idr_slice_bytes(pps_id: u32) -> Vec<u8> {
        let mut bits = Vec::new();
        emit_ue(&mut bits, 0); // first_mb_in_slice
        emit_ue(&mut bits, 2); // slice_type I (7 or 2 both decode to I; use 2)
        emit_ue(&mut bits, pps_id);
        emit_u(&mut bits, 0, 4); // frame_num (log2_max_frame_num_minus4+4 = 4 bits)
        emit_ue(&mut bits, 0); // idr_pic_id
        emit_u(&mut bits, 0, 8); // pic_order_cnt_lsb (log2_max_pic_order_cnt_lsb_minus4+4 = 8 bits)
        bits.push(false); // no_output_of_prior_pics_flag
        bits.push(false); // long_term_reference_flag
        emit_ue(&mut bits, 0); // slice_qp_delta (se 0)
        bits.push(true); // rbsp_stop_bit
        pack(&bits)
    }

    #[test]
    fn split_annex_b_finds_three_units() {
        let stream = [0, 0, 1, 0xAA, 0, 0, 1, 0xBB, 0xCC, 0, 0, 0, 1, 0xDD];
        let units = split_annex_b(&stream);
        assert_eq!(units, vec![&[0xAAu8][..], &[0xBB, 0xCC][..], &[0xDD][..]]);
    }

    #[test]
    fn parses_sps_pps_and_idr_slice_end_to_end() {
        let mut p = H264Preparser::new();

        let mut sps_nal = vec![0x67u8]; // nal_ref_idc=3, type=7
        sps_nal.extend(minimal_sps_bytes(0));
        match p.push_nal(&sps_nal).unwrap() {
            H264Unit::ParamSet => {}
            _ => panic!("expected ParamSet"),
        }
        assert_eq!(p.sps(0).unwrap().mb_width, 4);
        assert_eq!(p.sps(0).unwrap().mb_height, 4);

        let mut pps_nal = vec![0x68u8]; // type=8
        pps_nal.extend(minimal_pps_bytes(0, 0));
        p.push_nal(&pps_nal).unwrap();
        assert_eq!(p.pps(0).unwrap().sps_id, 0);

        let mut slice_nal = vec![0x65u8]; // nal_ref_idc=3, type=5 (IDR)
        slice_nal.extend(minimal_idr_slice_bytes(0));
        match p.push_nal(&slice_nal).unwrap() {
            H264Unit::Slice { header, .. } => {
                assert_eq!(header.nal_unit_type, NalUnitType::Idr);
                assert_eq!(header.slice_type, SliceType::I);
                assert_eq!(header.pps_id, 0);
            }
            _ => panic!("expected Slice"),
        }
    }

    #[test]
    fn interlaced_sps_is_rejected_as_unsupported() {
        let mut bits = Vec::new();
        emit_u(&mut bits, 66, 8);
        emit_u(&mut bits, 0, 8);
        emit_u(&mut bits, 30, 8);
        emit_ue(&mut bits, 0);
        emit_ue(&mut bits, 0);
        emit_ue(&mut bits, 0);
        emit_ue(&mut bits, 4);
        emit_ue(&mut bits, 2);
        bits.push(false);
        emit_ue(&mut bits, 3);
        emit_ue(&mut bits, 3);
        bits.push(false); // frame_mbs_only_flag = 0
        bits.push(true); // rbsp_stop_bit (truncated early; we bail before reading further)
        let rbsp = pack(&bits);

        let mut nal = vec![0x67u8];
        nal.extend(rbsp);
        let mut p = H264Preparser::new();
        let err = p.push_nal(&nal).unwrap_err();
        assert_eq!(err.kind(), base::ErrorKind::UnsupportedStream);
    }
}
