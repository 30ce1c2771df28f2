// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! VP9 pre-parser adaptor: decodes the uncompressed frame header (VP9
//! bitstream spec clause 6.2) into [`avdcore::vp9::FrameHeader`]. VP9
//! frames have no Annex-B-style start codes; callers hand this adaptor
//! one already-demuxed frame (an IVF payload, or one superframe index
//! entry) at a time.
//!
//! Only the syntax elements `avdcore::vp9` actually consumes are parsed
//! to completion; parsing stops once `segmentation_params()` is read,
//! since nothing after `tile_info()` reaches the DPB manager or HAL.

use avdcore::error::DecodeResult;
use avdcore::vp9::types::{NUM_REF_FRAMES, REFS_PER_FRAME};
use avdcore::vp9::FrameHeader;

use base::bail_t;

use super::bitreader::BitReader;

const FRAME_MARKER: u32 = 2;
const CS_RGB: u32 = 7;

const SEG_FEATURE_BITS: [u32; 4] = [8, 6, 2, 0];
const SEG_FEATURE_SIGNED: [bool; 4] = [true, true, false, false];

fn su(r: &mut BitReader, n: u32) -> DecodeResult<i32> {
    let value = r.u(n)? as i32;
    if r.u1()? {
        Ok(-value)
    } else {
        Ok(value)
    }
}

/// Tracks just enough decoded-frame history (one width/height per
/// reference slot) to resolve `frame_size_with_refs()`, without needing
/// a full `avdcore::vp9::Vp9Context` at parse time.
pub struct Vp9Preparser {
    ref_size: [(u32, u32); NUM_REF_FRAMES],
}

impl Vp9Preparser {
    pub fn new() -> Self {
        Vp9Preparser {
            ref_size: [(0, 0); NUM_REF_FRAMES],
        }
    }

    /// Call after a frame has been successfully handed to
    /// `avdcore::vp9::decode_frame`, so later frames referencing it via
    /// `frame_size_with_refs()` see its dimensions.
    pub fn record_frame(&mut self, hdr: &FrameHeader) {
        let flags = if hdr.is_keyframe { 0xFFu8 } else { hdr.refresh_frame_flags };
        for slot in 0..NUM_REF_FRAMES {
            if flags & (1 << slot) != 0 {
                self.ref_size[slot] = (hdr.width, hdr.height);
            }
        }
    }

    pub fn parse_frame(&self, data: &[u8]) -> DecodeResult<FrameHeader> {
        let mut r = BitReader::new(data);
        let mut hdr = FrameHeader::default();

        if r.u(2)? != FRAME_MARKER {
            bail_t!(MalformedStream, "VP9 frame_marker mismatch");
        }
        let profile_low_bit = r.u1()?;
        let profile_high_bit = r.u1()?;
        hdr.profile = ((profile_high_bit as u8) << 1) | profile_low_bit as u8;
        if hdr.profile == 3 {
            r.skip(1)?; // reserved_zero
        }

        hdr.show_existing_frame = r.u1()?;
        if hdr.show_existing_frame {
            hdr.frame_to_show_map_idx = r.u(3)? as u8;
            return Ok(hdr);
        }

        let frame_is_key = !r.u1()?; // frame_type: 0 == KEY_FRAME
        hdr.is_keyframe = frame_is_key;
        hdr.show_frame = r.u1()?;
        let error_resilient_mode = r.u1()?;

        if frame_is_key {
            read_sync_code(&mut r)?;
            read_color_config(&mut r, hdr.profile)?;
            let (width, height) = read_frame_size(&mut r)?;
            hdr.width = width;
            hdr.height = height;
            read_render_size(&mut r)?;
            hdr.refresh_frame_flags = 0xFF;
        } else {
            if !error_resilient_mode {
                r.skip(2)?; // reset_frame_context
            }
            hdr.intra_only = r.u1()?;
            if hdr.intra_only {
                read_sync_code(&mut r)?;
                if hdr.profile > 0 {
                    read_color_config(&mut r, hdr.profile)?;
                }
                hdr.refresh_frame_flags = r.u(8)? as u8;
                let (width, height) = read_frame_size(&mut r)?;
                hdr.width = width;
                hdr.height = height;
                read_render_size(&mut r)?;
            } else {
                hdr.refresh_frame_flags = r.u(8)? as u8;
                for i in 0..REFS_PER_FRAME {
                    hdr.ref_frame_idx[i] = r.u(3)? as u8;
                    r.skip(1)?; // ref_frame_sign_bias
                }
                let (width, height) = read_frame_size_with_refs(&mut r, &hdr.ref_frame_idx, &self.ref_size)?;
                hdr.width = width;
                hdr.height = height;
                read_render_size(&mut r)?;
                r.skip(1)?; // allow_high_precision_mv
                if !r.u1()? {
                    // is_filter_switchable == 0
                    r.skip(2)?; // raw_interpolation_filter
                }
            }
        }

        if !error_resilient_mode {
            r.skip(1)?; // refresh_frame_context
            r.skip(1)?; // frame_parallel_decoding_mode
        }
        r.skip(2)?; // frame_context_idx

        read_loop_filter_params(&mut r, &mut hdr)?;
        read_quantization_params(&mut r, &mut hdr)?;
        read_segmentation_params(&mut r, &mut hdr)?;

        Ok(hdr)
    }
}

impl Default for Vp9Preparser {
    fn default() -> Self {
        Self::new()
    }
}

fn read_sync_code(r: &mut BitReader) -> DecodeResult<()> {
    let code = r.u(24)?;
    if code != 0x49_83_42 {
        bail_t!(MalformedStream, "VP9 frame_sync_code mismatch: {code:#x}");
    }
    Ok(())
}

fn read_color_config(r: &mut BitReader, profile: u8) -> DecodeResult<()> {
    if profile >= 2 {
        r.skip(1)?; // ten_or_twelve_bit
    }
    let color_space = r.u(3)?;
    if color_space != CS_RGB {
        r.skip(1)?; // color_range
        if profile == 1 || profile == 3 {
            r.skip(2)?; // subsampling_x, subsampling_y
            r.skip(1)?; // reserved_zero
        }
    } else if profile == 1 || profile == 3 {
        r.skip(1)?; // reserved_zero
    }
    Ok(())
}

fn read_frame_size(r: &mut BitReader) -> DecodeResult<(u32, u32)> {
    let width = r.u(16)? + 1;
    let height = r.u(16)? + 1;
    Ok((width, height))
}

fn read_render_size(r: &mut BitReader) -> DecodeResult<()> {
    if r.u1()? {
        // render_and_frame_size_different
        r.skip(16)?;
        r.skip(16)?;
    }
    Ok(())
}

fn read_frame_size_with_refs(r: &mut BitReader, ref_frame_idx: &[u8; REFS_PER_FRAME], ref_size: &[(u32, u32); NUM_REF_FRAMES]) -> DecodeResult<(u32, u32)> {
    for &idx in ref_frame_idx {
        if r.u1()? {
            // found_ref
            let (w, h) = ref_size[idx as usize];
            return Ok((w, h));
        }
    }
    read_frame_size(r)
}

fn read_loop_filter_params(r: &mut BitReader, hdr: &mut FrameHeader) -> DecodeResult<()> {
    r.skip(6)?; // loop_filter_level
    r.skip(3)?; // loop_filter_sharpness
    hdr.loop_filter_delta_enabled = r.u1()?;
    if hdr.loop_filter_delta_enabled {
        hdr.loop_filter_delta_update = r.u1()?;
        if hdr.loop_filter_delta_update {
            for i in 0..4 {
                if r.u1()? {
                    hdr.loop_filter_ref_deltas[i] = su(r, 6)? as i8;
                }
            }
            for i in 0..2 {
                if r.u1()? {
                    hdr.loop_filter_mode_deltas[i] = su(r, 6)? as i8;
                }
            }
        }
    }
    Ok(())
}

fn read_delta_q(r: &mut BitReader) -> DecodeResult<i32> {
    if r.u1()? {
        su(r, 4)
    } else {
        Ok(0)
    }
}

fn read_quantization_params(r: &mut BitReader, hdr: &mut FrameHeader) -> DecodeResult<()> {
    hdr.base_q_idx = r.u(8)? as u8;
    read_delta_q(r)?; // delta_q_y_dc
    read_delta_q(r)?; // delta_q_uv_dc
    read_delta_q(r)?; // delta_q_uv_ac
    Ok(())
}

fn read_segmentation_params(r: &mut BitReader, hdr: &mut FrameHeader) -> DecodeResult<()> {
    hdr.segmentation_enabled = r.u1()?;
    if !hdr.segmentation_enabled {
        return Ok(());
    }

    hdr.segmentation_update_map = r.u1()?;
    if hdr.segmentation_update_map {
        for _ in 0..7 {
            if r.u1()? {
                r.skip(8)?; // segmentation_tree_probs[i]
            }
        }
        let segmentation_temporal_update = r.u1()?;
        for _ in 0..3 {
            if segmentation_temporal_update && r.u1()? {
                r.skip(8)?; // segmentation_pred_prob[i]
            }
        }
    }

    hdr.segmentation_update_data = r.u1()?;
    if hdr.segmentation_update_data {
        hdr.segmentation_abs_or_delta_update = r.u1()?;
        for seg in 0..8 {
            for feature in 0..4 {
                let feature_enabled = r.u1()?;
                if feature_enabled {
                    let bits = SEG_FEATURE_BITS[feature];
                    let mut value = if bits > 0 { r.u(bits)? as i32 } else { 0 };
                    if SEG_FEATURE_SIGNED[feature] && r.u1()? {
                        value = -value;
                    }
                    hdr.segmentation_feature_data[seg][feature] = value as i16;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

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

    /// Profile 0 keyframe, 64x48, base_q_idx 42, no loop filter deltas,
    /// no segmentation.
    fn minimal_keyframe_bytes() -> Vec<u8> {
        let mut bits = Vec::new();
        emit_u(&mut bits, 2, 2); // frame_marker
        bits.push(false); // profile_low_bit
        bits.push(false); // profile_high_bit -> profile 0
        bits.push(false); // show_existing_frame
        bits.push(false); // frame_type = KEY_FRAME
        bits.push(true); // show_frame
        bits.push(false); // error_resilient_mode
        emit_u(&mut bits, 0x498342, 24); // frame_sync_code
        emit_u(&mut bits, 0, 3); // color_space
        bits.push(false); // color_range
        emit_u(&mut bits, 63, 16); // width_minus_1 -> 64
        emit_u(&mut bits, 47, 16); // height_minus_1 -> 48
        bits.push(false); // render_and_frame_size_different
        bits.push(false); // refresh_frame_context
        bits.push(false); // frame_parallel_decoding_mode
        emit_u(&mut bits, 0, 2); // frame_context_idx
        emit_u(&mut bits, 10, 6); // loop_filter_level
        emit_u(&mut bits, 0, 3); // loop_filter_sharpness
        bits.push(false); // loop_filter_delta_enabled
        emit_u(&mut bits, 42, 8); // base_q_idx
        bits.push(false); // delta_q_y_dc coded
        bits.push(false); // delta_q_uv_dc coded
        bits.push(false); // delta_q_uv_ac coded
        bits.push(false); // segmentation_enabled
        pack(&bits)
    }

    #[test]
    fn parses_minimal_keyframe() {
        let p = Vp9Preparser::new();
        let hdr = p.parse_frame(&minimal_keyframe_bytes()).unwrap();
        assert!(hdr.is_keyframe);
        assert_eq!(hdr.width, 64);
        assert_eq!(hdr.height, 48);
        assert_eq!(hdr.base_q_idx, 42);
        assert_eq!(hdr.refresh_frame_flags, 0xFF);
        assert!(!hdr.segmentation_enabled);
    }

    #[test]
    fn bad_frame_marker_is_malformed() {
        let bits = vec![true, true, true]; // frame_marker = 3
        let data = pack(&bits);
        let p = Vp9Preparser::new();
        let err = p.parse_frame(&data).unwrap_err();
        assert_eq!(err.kind(), base::ErrorKind::MalformedStream);
    }

    #[test]
    fn show_existing_frame_short_circuits() {
        let mut bits = Vec::new();
        emit_u(&mut bits, 2, 2);
        bits.push(false);
        bits.push(false);
        bits.push(true); // show_existing_frame
        emit_u(&mut bits, 5, 3); // frame_to_show_map_idx
        let data = pack(&bits);
        let p = Vp9Preparser::new();
        let hdr = p.parse_frame(&data).unwrap();
        assert!(hdr.show_existing_frame);
        assert_eq!(hdr.frame_to_show_map_idx, 5);
    }
}
