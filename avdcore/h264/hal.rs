// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! H.264 opcode emitter (spec.md §4.3). Grounded on
//! `avid/h264/halv3.py`'s `AVDH264HalV3`: `set_header`, `set_refs`,
//! `set_scaling_list`, and the per-slice exec sequence, adapted to emit
//! into the shared [`Emitter`]/[`FpField`] mirror instead of a
//! string-keyed push.

use crate::coding::{s16, xy};
use crate::dpb::{PicFlags, RefEntry};
use crate::error::DecodeResult;
use crate::instr::{Emitter, FpField, Instruction};
use crate::slice::Slice;

use super::ctx::H264Context;
use super::fp::H264FrameParams;
use super::types::{NalUnitType, SliceHeader, SliceType, WeightEntry};

const FIFO_START: u32 = 0x2b000000;
const FIFO_END: u32 = 0x2b000000;
const EXEC: u32 = 0x2c000000;
const REF_TYPE: u32 = 0x2d000000;
const SLICE_DESC: u32 = 0x2d800000;
const QUANT: u32 = 0x2d900000;
const DEBLOCK: u32 = 0x2da00000;
const HDR_START: u32 = 0x2db00000;
const REF_LIST_ENTRY: u32 = 0x2dc00000;
const WP_DENOM: u32 = 0x2dd00000;
const WP_WEIGHT: u32 = 0x2de00000;
const WP_OFFSET: u32 = 0x2df00000;
const MB_DIMS: u32 = 0x2a000000;

/// Room reserved per list in the `RefListEntry` indexed region (spec.md
/// §4.3: up to 16 entries per list), so `list0`'s and `list1`'s indices
/// never collide in the mirror.
const MAX_REF_LIST_PER_LX: usize = 16;

/// Pure per-slice opcode emission (spec.md §4.3 "Contract").
pub fn decode(
    ctx: &H264Context,
    slice: &Slice<SliceHeader>,
    fp: &mut H264FrameParams,
) -> DecodeResult<Vec<Instruction>> {
    let hdr = &slice.header;
    let mut e = Emitter::new(fp);

    e.push(
        FIFO_START | 0x100 | (ctx.inst_fifo_idx * 0x10),
        FpField::FifoStart,
        None,
    );

    let intra = hdr.nal_unit_type == NalUnitType::Idr;
    let mut start = 0x1000u32;
    if intra {
        start |= 0x2000;
    }
    start |= 0x2e0;
    e.push(HDR_START | start, FpField::HeaderStart, None);

    e.push(
        (((ctx.height - 1) & 0xffff) << 16) | ((ctx.width - 1) & 0xffff),
        FpField::Width,
        None,
    );
    e.push(ctx.height, FpField::Height, None);
    e.push(xy(ctx.width_aligned / 16, ctx.height_aligned / 16), FpField::MbDims, None);

    emit_sps_pps_flags(ctx, hdr, &mut e)?;
    emit_tile_and_rvra_addrs(ctx, slice, &mut e)?;

    if !intra {
        emit_refs(ctx, slice, &mut e);
    }

    emit_slice(ctx, slice, &mut e);

    let fifo_end_flags = 0x400u32; // last tile in this frame
    e.push(FIFO_END | fifo_end_flags, FpField::FifoEnd, None);

    Ok(e.finish())
}

fn emit_sps_pps_flags<F: crate::fp::FrameParams>(
    ctx: &H264Context,
    hdr: &SliceHeader,
    e: &mut Emitter<F>,
) -> DecodeResult<()> {
    let sps = ctx.get_sps(ctx.active_sps_id.unwrap_or(0))?;
    let pps = ctx.get_pps(hdr.pps_id)?;

    let mut sps_flags = (sps.chroma_format_idc << 24) | 0x2000 | 0x800;
    if pps.transform_8x8_mode_flag {
        sps_flags |= 0x80;
    }
    if sps.direct_8x8_inference_flag {
        sps_flags |= 1;
    }
    e.push(sps_flags, FpField::SpsFlags, None);

    let mut pps_flags = 0u32;
    if pps.entropy_coding_mode_flag {
        pps_flags |= 1 << 20;
    }
    if hdr.nal_unit_type != NalUnitType::Idr {
        pps_flags |= 1 << 21;
    }
    e.push(pps_flags, FpField::PpsFlags, None);
    Ok(())
}

fn emit_tile_and_rvra_addrs<F: crate::fp::FrameParams>(
    ctx: &H264Context,
    slice: &Slice<SliceHeader>,
    e: &mut Emitter<F>,
) -> DecodeResult<()> {
    let pic = slice.pic.ok_or_else(|| base::Error::from(base::ErrorKind::Internal))?;
    let sps_idx = ctx.pool.get(pic).sps_idx as usize;
    let sps_tile_addr = ctx.sps_tile_addrs[sps_idx % super::ctx::SPS_TILE_COUNT];
    e.push((sps_tile_addr >> 8) as u32, FpField::SpsTileAddr, None);
    for (i, addr) in ctx.pps_tile_addrs.iter().enumerate() {
        e.push((*addr >> 8) as u32, FpField::PpsTileAddr, Some(i as u16));
    }
    e.push((ctx.pool.get(pic).addr >> 7) as u32, FpField::CurRvraAddr, None);
    e.push((ctx.disp_y_addr >> 7) as u32, FpField::DispYAddr, None);
    e.push((ctx.disp_uv_addr >> 7) as u32, FpField::DispUvAddr, None);
    Ok(())
}

/// spec.md §4.3 step 4: "up to 16 reference descriptors ... plus up to 4
/// address planes per reference". Grounded on `set_refs` in
/// `avid/h264/halv3.py`, including its running `pred`/`delta` POC
/// encoding trick.
fn emit_refs<F: crate::fp::FrameParams>(ctx: &H264Context, slice: &Slice<SliceHeader>, e: &mut Emitter<F>) {
    let Some(pic) = slice.pic else { return };
    let cur_poc = ctx.pool.get(pic).poc;
    let mut pred = cur_poc;
    let mut delta_base = cur_poc;

    for (n, &ref_id) in ctx.dpb_list.iter().enumerate().take(16) {
        let p = ctx.pool.get(ref_id);
        let delta = delta_base - p.poc;
        pred += delta;
        delta_base = p.poc;

        let mut x = ((ctx.dpb_list.len().saturating_sub(1)) as u32) << 28 | 0x1000000;
        if p.flags.contains(PicFlags::LONG_REF) {
            x |= 1 << 17;
        }
        x |= (pred as u32) & 0x1ffff;
        e.push(x, FpField::RefDescriptor, Some(n as u16));

        for plane in 0..4u8 {
            let addr = (p.addr + ctx.rvra_offset(plane)) >> 7;
            e.push(addr as u32, FpField::RefAddrPlane, Some((n * 4 + plane as usize) as u16));
        }
    }
}

fn emit_slice<F: crate::fp::FrameParams>(ctx: &H264Context, slice: &Slice<SliceHeader>, e: &mut Emitter<F>) {
    let hdr = &slice.header;
    let t = hdr.slice_qp_delta;
    e.push(SLICE_DESC | ((t as u32 & 0x7) << 13), FpField::SliceDesc, None);
    e.push(0, FpField::CtbWindow, None);

    let qp = (26 + hdr.slice_qp_delta).clamp(0, 51) as u32;
    e.push(QUANT | (qp << 10), FpField::Quant, None);
    e.push(DEBLOCK, FpField::Deblock, None);

    let ref_type_flags = match hdr.slice_type {
        SliceType::I | SliceType::Si => 0x2u32,
        SliceType::B => 0x1,
        SliceType::P | SliceType::Sp => 0x0,
    } | if hdr.nal_ref_idc == 0 { 0x10 } else { 0 };
    e.push(REF_TYPE | ref_type_flags, FpField::RefType, None);

    emit_ref_list_entries(ctx, slice, e);
    emit_weighted_pred(hdr, e);

    e.push(0, FpField::MvWindow, None);
    e.push(EXEC | xy(ctx.width_aligned / 16, ctx.height_aligned / 16), FpField::ExecCmd, None);
}

/// One `RefListEntry` opcode per resolved reference in `list0`/`list1`
/// (spec.md §8: "a single P slice with exactly one short-term reference
/// produces one `0x2dc00000 | 0 << 8 | 0 << 4 | 0` entry"), rather than
/// from `ref_pic_list_mod_l0/l1` which carry only the (often empty)
/// reordering ops and not the resolved list itself.
fn emit_ref_list_entries<F: crate::fp::FrameParams>(ctx: &H264Context, slice: &Slice<SliceHeader>, e: &mut Emitter<F>) {
    for (lx, list) in [&slice.list0, &slice.list1].into_iter().enumerate() {
        for (idx, entry) in list.iter().enumerate() {
            let dpb_pos = match entry {
                RefEntry::Real(id) => ctx.dpb_list.iter().position(|x| x == id).unwrap_or(0) as u32,
                RefEntry::Missing(_) => 0,
            };
            let val = REF_LIST_ENTRY | ((lx as u32) << 8) | ((idx as u32) << 4) | dpb_pos;
            e.push(val, FpField::RefListEntry, Some((lx * MAX_REF_LIST_PER_LX + idx) as u16));
        }
    }
}

/// `luma_weight_l{x}`/`chroma_weight_l{x}` and their offsets (7.3.3.2),
/// defaulting a flag-absent entry to the denom-implied weight `(1 <<
/// denom, 0)` rather than a stray zero.
fn emit_weighted_pred<F: crate::fp::FrameParams>(hdr: &SliceHeader, e: &mut Emitter<F>) {
    if hdr.weights_l0.is_empty() && hdr.weights_l1.is_empty() {
        e.push(WP_DENOM, FpField::WpDenom, None);
        return;
    }
    e.push(
        WP_DENOM | (hdr.luma_log2_weight_denom & 0x7) | ((hdr.chroma_log2_weight_denom & 0x7) << 4),
        FpField::WpDenom,
        None,
    );
    for (lx, list) in [&hdr.weights_l0, &hdr.weights_l1].into_iter().enumerate() {
        for (idx, entry) in list.iter().enumerate() {
            emit_weight_entry(lx, idx, entry, hdr.luma_log2_weight_denom, hdr.chroma_log2_weight_denom, e);
        }
    }
}

/// `WpWeight`/`WpOffset` are single scalar mirror slots (the blob keeps
/// only the most-recently-written weight, same simplification as the
/// rest of this mirror for per-slice-constant fields); the instruction
/// stream itself still carries one opcode per plane per reference, which
/// is what differential replay actually checks.
fn emit_weight_entry<F: crate::fp::FrameParams>(
    lx: usize,
    idx: usize,
    entry: &WeightEntry,
    luma_denom: u32,
    chroma_denom: u32,
    e: &mut Emitter<F>,
) {
    let slot = (lx * MAX_REF_LIST_PER_LX + idx) as u32;
    let (lw, lo) = entry.luma.unwrap_or((1i32 << luma_denom, 0));
    e.push(WP_WEIGHT | (0 << 14) | (slot << 9) | (lw as u32 & 0x1ff), FpField::WpWeight, None);
    e.push(WP_OFFSET | s16(lo), FpField::WpOffset, None);

    let chroma = entry.chroma.unwrap_or([(1i32 << chroma_denom, 0); 2]);
    for (c, &(cw, co)) in chroma.iter().enumerate() {
        let plane = (c as u32) + 1;
        e.push(WP_WEIGHT | (plane << 14) | (slot << 9) | (cw as u32 & 0x1ff), FpField::WpWeight, None);
        e.push(WP_OFFSET | s16(co), FpField::WpOffset, None);
    }
}
