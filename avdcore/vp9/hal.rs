// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! VP9 opcode emitter. One call per frame (not per slice segment, spec.md
//! §3: "One per frame (VP9) or per slice segment (H.264/H.265)").

use crate::coding::xy;
use crate::error::DecodeResult;
use crate::instr::{Emitter, FpField, Instruction};

use super::ctx::Vp9Context;
use super::dpb::resolve_ref;
use super::types::{FrameHeader, REFS_PER_FRAME};

const FIFO_START: u32 = 0x2b000000;
const FIFO_END: u32 = 0x2b000000;
const EXEC: u32 = 0x2c000000;
const REF_TYPE: u32 = 0x2d000000;
const HDR_START: u32 = 0x2db00000;
const QUANT: u32 = 0x2d900000;
const SEG_FLAGS: u32 = 0x2dd00000;
const SEG_FEATURE: u32 = 0x2de00000;
const LF_DELTA: u32 = 0x2df00000;

pub fn decode(
    ctx: &Vp9Context,
    hdr: &FrameHeader,
    fb_idx: usize,
    fp: &mut super::fp::Vp9FrameParams,
) -> DecodeResult<Vec<Instruction>> {
    let mut e = Emitter::new(fp);

    e.push(FIFO_START | 0x100 | (ctx.inst_fifo_idx * 0x10), FpField::FifoStart, None);

    let mut start = 0x1000u32;
    if hdr.is_keyframe {
        start |= 0x2000;
    }
    start |= 0x2e0;
    e.push(HDR_START | start, FpField::HeaderStart, None);

    e.push((((hdr.height - 1) & 0xffff) << 16) | ((hdr.width - 1) & 0xffff), FpField::Width, None);
    e.push(xy((hdr.width + 7) / 8, (hdr.height + 7) / 8), FpField::MbDims, None);
    e.push(QUANT | ((hdr.base_q_idx as u32) << 10), FpField::Quant, None);
    e.push((ctx.frame_bufs[fb_idx].addr >> 7) as u32, FpField::CurRvraAddr, None);
    e.push((ctx.disp_y_addr >> 7) as u32, FpField::DispYAddr, None);
    e.push((ctx.disp_uv_addr >> 7) as u32, FpField::DispUvAddr, None);
    e.push((ctx.probs_slot_addr(ctx.access_idx) >> 8) as u32, FpField::ProbsAddr, None);

    let ref_type_flags = if hdr.is_keyframe { 0x2u32 } else if hdr.intra_only { 0x12 } else { 0x0 };
    e.push(REF_TYPE | ref_type_flags, FpField::RefType, None);

    if !hdr.is_keyframe && !hdr.intra_only {
        for which in 0..REFS_PER_FRAME {
            let addr = resolve_ref(ctx, hdr, which)?;
            e.push((addr >> 7) as u32, FpField::RefAddrPlane, Some(which as u16));
        }
    }

    emit_segmentation(ctx, &mut e);
    emit_loop_filter_deltas(ctx, &mut e);

    e.push(EXEC | xy((hdr.width + 7) / 8, (hdr.height + 7) / 8), FpField::ExecCmd, None);
    e.push(FIFO_END | 0x400, FpField::FifoEnd, None);

    Ok(e.finish())
}

/// Mirrors the segmentation state persisted in [`Vp9Context`] (spec.md §9
/// supplemented feature), not just what this frame's header carried.
/// Frames that leave `segmentation_update_data` unset still decode against
/// whatever the last frame that did set it left behind.
fn emit_segmentation<F: crate::fp::FrameParams>(ctx: &Vp9Context, e: &mut Emitter<F>) {
    let flags = (ctx.seg_enabled as u32) | ((ctx.seg_abs_or_delta_update as u32) << 1);
    e.push(SEG_FLAGS | flags, FpField::SegFlags, None);

    for (seg, features) in ctx.seg_feature_data.iter().enumerate() {
        for (lvl, &val) in features.iter().enumerate() {
            let i = (seg * super::types::SEG_LVL_MAX + lvl) as u16;
            e.push(SEG_FEATURE | (val as u16 as u32), FpField::SegFeature, Some(i));
        }
    }
}

fn emit_loop_filter_deltas<F: crate::fp::FrameParams>(ctx: &Vp9Context, e: &mut Emitter<F>) {
    for (i, &delta) in ctx.lf_ref_deltas.iter().enumerate() {
        e.push(LF_DELTA | (delta as u8 as u32), FpField::LfRefDelta, Some(i as u16));
    }
    for (i, &delta) in ctx.lf_mode_deltas.iter().enumerate() {
        e.push(LF_DELTA | (delta as u8 as u32), FpField::LfModeDelta, Some(i as u16));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::fp::Vp9FrameParams;

    fn key_hdr(width: u32, height: u32) -> FrameHeader {
        FrameHeader {
            is_keyframe: true,
            show_frame: true,
            width,
            height,
            ..Default::default()
        }
    }

    #[test]
    fn keyframe_emits_ref_type_with_keyframe_bit() {
        let mut ctx = Vp9Context::new(64, 64);
        ctx.rebuild_allocator();
        let mut fp = Vp9FrameParams::new();
        let stream = decode(&ctx, &key_hdr(64, 64), 0, &mut fp).unwrap();
        let ref_type = stream.iter().find(|i| i.field == FpField::RefType).unwrap();
        assert_eq!(ref_type.val, REF_TYPE | 0x2);
    }

    #[test]
    fn persisted_segmentation_feature_is_emitted() {
        let mut ctx = Vp9Context::new(64, 64);
        ctx.rebuild_allocator();
        ctx.seg_enabled = true;
        ctx.seg_feature_data[2][0] = 7;

        let mut fp = Vp9FrameParams::new();
        let stream = decode(&ctx, &key_hdr(64, 64), 0, &mut fp).unwrap();

        let entry = stream
            .iter()
            .find(|i| i.field == FpField::SegFeature && i.idx == Some(2 * super::super::types::SEG_LVL_MAX as u16))
            .unwrap();
        assert_eq!(entry.val, SEG_FEATURE | 7);

        let flags = stream.iter().find(|i| i.field == FpField::SegFlags).unwrap();
        assert_eq!(flags.val, SEG_FLAGS | 0x1);
    }

    #[test]
    fn default_loop_filter_ref_deltas_match_libvpx_reset() {
        let mut ctx = Vp9Context::new(64, 64);
        ctx.rebuild_allocator();
        let mut fp = Vp9FrameParams::new();
        let stream = decode(&ctx, &key_hdr(64, 64), 0, &mut fp).unwrap();

        let first = stream.iter().find(|i| i.field == FpField::LfRefDelta && i.idx == Some(0)).unwrap();
        assert_eq!(first.val, LF_DELTA | 1);
    }

    #[test]
    fn probs_addr_advances_with_access_idx() {
        let mut ctx = Vp9Context::new(64, 64);
        ctx.rebuild_allocator();
        ctx.access_idx = 3;
        let mut fp = Vp9FrameParams::new();
        let stream = decode(&ctx, &key_hdr(64, 64), 0, &mut fp).unwrap();

        let entry = stream.iter().find(|i| i.field == FpField::ProbsAddr).unwrap();
        let expected = (ctx.probs_slot_addr(3) >> 8) as u32;
        assert_eq!(entry.val, expected);
    }

    #[test]
    fn rebuilt_allocator_produces_nonzero_cur_and_disp_addresses() {
        let mut ctx = Vp9Context::new(64, 64);
        ctx.rebuild_allocator();
        let mut fp = Vp9FrameParams::new();
        let stream = decode(&ctx, &key_hdr(64, 64), 0, &mut fp).unwrap();

        assert!(stream.iter().any(|i| i.field == FpField::CurRvraAddr && i.val != 0));
        assert!(stream.iter().any(|i| i.field == FpField::DispYAddr && i.val != 0));
        assert!(stream.iter().any(|i| i.field == FpField::DispUvAddr && i.val != 0));
        assert!(ctx.alloc.is_disjoint_and_sorted());
    }
}
