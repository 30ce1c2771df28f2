// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! H.265 opcode emitter. Shares its opcode vocabulary with H.264
//! (spec.md §4.3's table is codec-generic); the part that's genuinely
//! H.265-specific is the CTB-quadrant bookkeeping below.

use crate::coding::xy;
use crate::dpb::PicFlags;
use crate::error::DecodeResult;
use crate::instr::{Emitter, FpField, Instruction};
use crate::slice::Slice;

use super::ctx::{H265Context, SPS_TILE_COUNT};
use super::types::{SliceHeader, SliceType};

const FIFO_START: u32 = 0x2b000000;
const FIFO_END: u32 = 0x2b000000;
const EXEC: u32 = 0x2c000000;
const REF_TYPE: u32 = 0x2d000000;
const SLICE_DESC: u32 = 0x2d800000;
const QUANT: u32 = 0x2d900000;
const DEBLOCK: u32 = 0x2da00000;
const HDR_START: u32 = 0x2db00000;

/// spec.md §4.3 "CTB-quadrant bookkeeping (H.265)": computes the 4-bit
/// quadrant hint for bits 28..31 of the CTB-window word, given the
/// current tile's CTB row/col and the slice's last row/col.
///
/// - bit 2 ("hflip"): `sx == last_ctx_row + 1`.
/// - bit 3 ("vflip"): below-and-at-or-right-of the last slice position,
///   or below-and-at-or-left-of the last hflip-set Q1 tile.
pub fn ctb_quadrant_hint(ctx: &mut H265Context, sx: i32, sy: i32, last_slice_col: i32) -> u32 {
    let mut hint = 0u32;

    let hflip = sx == ctx.last_ctx_row + 1;
    if hflip {
        hint |= 1 << 2;
        ctx.last_q1_row = sx;
        ctx.last_q1_col = sy;
    }

    let below_last_slice = sx > ctx.last_ctx_row && sy >= last_slice_col;
    let below_last_q1 = ctx.last_q1_row >= 0 && sx > ctx.last_q1_row && sy <= ctx.last_q1_col;
    if below_last_slice || below_last_q1 {
        hint |= 1 << 3;
    }

    hint
}

pub fn decode(
    ctx: &mut H265Context,
    slice: &Slice<SliceHeader>,
    fp: &mut super::fp::H265FrameParams,
) -> DecodeResult<Vec<Instruction>> {
    let hdr = &slice.header;
    let sps = ctx.get_sps(ctx.active_sps_id.unwrap_or(0))?.clone();
    let pps = ctx.get_pps(hdr.pps_id)?.clone();
    let mut e = Emitter::new(fp);

    e.push(FIFO_START | 0x100 | (ctx.inst_fifo_idx * 0x10), FpField::FifoStart, None);

    let is_irap = hdr.nal_unit_type.is_irap();
    let mut start = 0x1000u32;
    if is_irap {
        start |= 0x2000;
    }
    start |= 0x2e0;
    e.push(HDR_START | start, FpField::HeaderStart, None);

    e.push((((ctx.height - 1) & 0xffff) << 16) | ((ctx.width - 1) & 0xffff), FpField::Width, None);
    e.push(xy(sps.pic_width_in_ctbs, sps.pic_height_in_ctbs), FpField::MbDims, None);

    let ref_type_flags = match hdr.slice_type {
        SliceType::I => 0x2u32,
        SliceType::B => 0x1,
        SliceType::P => 0x0,
    } | if is_irap { 0x10 } else { 0 };
    e.push(REF_TYPE | ref_type_flags, FpField::RefType, None);

    if let Some(pic) = slice.pic {
        e.push((ctx.pool.get(pic).addr >> 7) as u32, FpField::CurRvraAddr, None);
    }
    e.push((ctx.disp_y_addr >> 7) as u32, FpField::DispYAddr, None);
    e.push((ctx.disp_uv_addr >> 7) as u32, FpField::DispUvAddr, None);

    if !is_irap {
        // `avid/h265/halv3.py:set_refs`: `n = sl.pic.idx; push(ctx.sps_tile_addrs[n]
        // >> 8, "hdr_bc_sps_tile_addr_lsb8")`, indexed by the current picture's
        // pool slot, emitted for every non-IRAP slice.
        if let Some(pic) = slice.pic {
            e.push((ctx.sps_tile_addrs[pic.0 % SPS_TILE_COUNT] >> 8) as u32, FpField::SpsTileAddr, None);
        }
        emit_refs(ctx, slice, &mut e);

        // `avid/h265/halv3.py:set_slice_mv`: B-slices additionally mirror the
        // collocated reference's `sps_tile` slot (`slc_bd4_sps_tile_addr2_lsb8`).
        // The collocated picture is `reflist[n][0]` with `n = not
        // collocated_from_l0_flag`; this parser doesn't carry that flag off the
        // bitstream, so this follows HEVC's default (`collocated_from_l0_flag ==
        // 1` when absent), i.e. list0's first entry, falling back to list1's.
        if hdr.slice_type == SliceType::B && !hdr.dependent_slice_segment_flag {
            let collocated = slice.list0.first().or_else(|| slice.list1.first());
            if let Some(crate::dpb::RefEntry::Real(id)) = collocated {
                e.push((ctx.sps_tile_addrs[id.0 % SPS_TILE_COUNT] >> 8) as u32, FpField::SpsTileAddr2, None);
            }
        }
    }

    // spec.md §4.3 steps 6-7: the slice segment itself is entry point 0;
    // `num_entry_point_offsets == k` additional entries each get their own
    // coded-slice descriptor / CTB-window / exec sequence, for k+1 total
    // (spec.md §8 "emits exactly k+1 coded-slice descriptors").
    ctx.reset_ctb_bookkeeping();
    let num_tile_columns = pps.num_tile_columns.max(1);
    let num_tiles = hdr.entry_point_offsets.len() + 1;
    let mut last_row = -1i32;
    let mut last_col = -1i32;
    for tile in 0..num_tiles {
        let sx = (tile as i32) / num_tile_columns as i32;
        let sy = (tile as i32) % num_tile_columns as i32;
        let quadrant = ctb_quadrant_hint(ctx, sx, sy, ctx.last_slice_col);
        let idx = Some(tile as u16);

        e.push(
            (quadrant << 28) | slice_desc_base(hdr.slice_qp_delta),
            FpField::CtbWindow,
            idx,
        );
        e.push(QUANT | (((26 + hdr.slice_qp_delta).clamp(0, 51) as u32) << 10), FpField::Quant, idx);
        e.push(DEBLOCK, FpField::Deblock, idx);
        e.push(SLICE_DESC | ((hdr.slice_segment_address + tile as u32) << 2), FpField::SliceDesc, idx);
        e.push(EXEC | xy(sps.pic_width_in_ctbs, sps.pic_height_in_ctbs), FpField::ExecCmd, idx);

        last_row = sx;
        last_col = sy;
    }
    ctx.last_ctx_row = last_row;
    ctx.last_slice_col = last_col;

    e.push(FIFO_END | 0x400, FpField::FifoEnd, None);

    Ok(e.finish())
}

fn slice_desc_base(qp_delta: i32) -> u32 {
    (qp_delta as u32) & 0x7
}

fn emit_refs<F: crate::fp::FrameParams>(ctx: &H265Context, slice: &Slice<SliceHeader>, e: &mut Emitter<F>) {
    for (n, entry) in slice.list0.iter().chain(slice.list1.iter()).enumerate().take(16) {
        let pic = entry.resolve(&ctx.pool);
        let mut x = (n as u32) << 28 | 0x1000000;
        if pic.flags.contains(PicFlags::LONG_REF) {
            x |= 1 << 17;
        }
        e.push(x, FpField::RefDescriptor, Some(n as u16));
        for plane in 0..2u8 {
            let addr = (pic.addr + ctx.rvra_offset(plane)) >> 7;
            e.push(addr as u32, FpField::RefAddrPlane, Some(n as u16 * 2 + plane as u16));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h265::dpb::init_slice;
    use crate::h265::fp::H265FrameParams;
    use crate::h265::types::{NalUnitType, Pps, Sps, SliceType};

    fn ctx_with_4x1_tiling(width: u32, height: u32) -> H265Context {
        let mut ctx = H265Context::new(width, height);
        ctx.sps_table.insert(
            0,
            Sps {
                id: 0,
                chroma_format_idc: 1,
                bit_depth_luma: 8,
                ctb_log2_size: 6,
                pic_width_in_ctbs: (width + 63) / 64,
                pic_height_in_ctbs: (height + 63) / 64,
            },
        );
        ctx.pps_table.insert(
            0,
            Pps {
                id: 0,
                sps_id: 0,
                tiles_enabled_flag: true,
                num_tile_columns: 4,
                num_tile_rows: 1,
            },
        );
        ctx.active_sps_id = Some(0);
        ctx.rebuild_allocator(16);
        ctx
    }

    fn idr_hdr(entry_point_offsets: Vec<u32>) -> SliceHeader {
        SliceHeader {
            nal_unit_type: NalUnitType::Idr,
            slice_type: SliceType::I,
            pps_id: 0,
            poc: 0,
            pic_output_flag: true,
            num_ref_idx_l0_active_minus1: 0,
            num_ref_idx_l1_active_minus1: 0,
            st_rps: Vec::new(),
            st_rps_num_negative_pics: 0,
            slice_qp_delta: 0,
            slice_segment_address: 0,
            dependent_slice_segment_flag: false,
            entry_point_offsets,
        }
    }

    /// spec.md §8 "Tile-enabled H.265 with `num_entry_point_offsets == k`
    /// emits exactly `k+1` coded-slice descriptors and exactly one
    /// end-FIFO terminator with the `0x400` bit set".
    #[test]
    fn four_by_one_tiling_emits_k_plus_1_slice_descriptors() {
        let mut ctx = ctx_with_4x1_tiling(1920, 1088);
        let mut slice = Slice::new(idr_hdr(vec![1, 2, 3]), 0);
        init_slice(&mut ctx, &slice.header, &mut slice).unwrap();

        let mut fp = H265FrameParams::new();
        let stream = decode(&mut ctx, &slice, &mut fp).unwrap();

        let slice_desc_count = stream.iter().filter(|i| matches!(i.field, FpField::SliceDesc)).count();
        assert_eq!(slice_desc_count, 4);

        let fifo_end_with_terminator = stream
            .iter()
            .filter(|i| i.val == (FIFO_END | 0x400))
            .count();
        assert_eq!(fifo_end_with_terminator, 1);
    }

    #[test]
    fn idr_slice_emits_nonzero_disp_and_rvra_addresses() {
        let mut ctx = ctx_with_4x1_tiling(1920, 1088);
        let mut slice = Slice::new(idr_hdr(Vec::new()), 0);
        init_slice(&mut ctx, &slice.header, &mut slice).unwrap();

        let mut fp = H265FrameParams::new();
        let stream = decode(&mut ctx, &slice, &mut fp).unwrap();

        assert!(stream.iter().any(|i| i.field == FpField::CurRvraAddr && i.val != 0));
        assert!(stream.iter().any(|i| i.field == FpField::DispYAddr && i.val != 0));
        assert!(stream.iter().any(|i| i.field == FpField::DispUvAddr && i.val != 0));
        assert!(ctx.alloc.is_disjoint_and_sorted());
        assert!(ctx.sps_tile_addrs.iter().all(|&a| a != 0));
        let mut sorted = ctx.sps_tile_addrs;
        sorted.sort_unstable();
        assert_eq!(sorted, ctx.sps_tile_addrs, "sps_tile ring must be allocated in slot order");
    }

    #[test]
    fn idr_slice_emits_ref_type_with_irap_bit_set() {
        let mut ctx = ctx_with_4x1_tiling(1920, 1088);
        let mut slice = Slice::new(idr_hdr(Vec::new()), 0);
        init_slice(&mut ctx, &slice.header, &mut slice).unwrap();

        let mut fp = H265FrameParams::new();
        let stream = decode(&mut ctx, &slice, &mut fp).unwrap();

        let ref_type = stream.iter().find(|i| i.field == FpField::RefType).unwrap();
        assert_eq!(ref_type.val, REF_TYPE | 0x2 | 0x10);
    }

    #[test]
    fn non_irap_slice_emits_sps_tile_addr_for_its_own_pool_slot() {
        let mut ctx = ctx_with_4x1_tiling(1920, 1088);
        let mut idr = Slice::new(idr_hdr(Vec::new()), 0);
        init_slice(&mut ctx, &idr.header, &mut idr).unwrap();
        let mut fp = H265FrameParams::new();
        decode(&mut ctx, &idr, &mut fp).unwrap();

        let mut p_hdr = idr_hdr(Vec::new());
        p_hdr.nal_unit_type = NalUnitType::TrailOrOther(1);
        p_hdr.slice_type = SliceType::P;
        p_hdr.poc = 1;
        p_hdr.st_rps = vec![crate::h265::types::StRpsEntry { poc: 0, used: true }];
        p_hdr.st_rps_num_negative_pics = 1;
        let mut p_slice = Slice::new(p_hdr, 0);
        init_slice(&mut ctx, &p_slice.header, &mut p_slice).unwrap();

        let mut fp2 = H265FrameParams::new();
        let stream = decode(&mut ctx, &p_slice, &mut fp2).unwrap();

        let pic_slot = p_slice.pic.unwrap().0;
        let expect = (ctx.sps_tile_addrs[pic_slot] >> 8) as u32;
        let emitted = stream.iter().find(|i| i.field == FpField::SpsTileAddr).unwrap();
        assert_eq!(emitted.val, expect);
        assert_ne!(expect, 0);
    }

    #[test]
    fn b_slice_emits_collocated_sps_tile_addr2() {
        let mut ctx = ctx_with_4x1_tiling(1920, 1088);
        let mut idr = Slice::new(idr_hdr(Vec::new()), 0);
        init_slice(&mut ctx, &idr.header, &mut idr).unwrap();
        let mut fp = H265FrameParams::new();
        decode(&mut ctx, &idr, &mut fp).unwrap();

        let mut b_hdr = idr_hdr(Vec::new());
        b_hdr.nal_unit_type = NalUnitType::TrailOrOther(1);
        b_hdr.slice_type = SliceType::B;
        b_hdr.poc = 1;
        b_hdr.st_rps = vec![crate::h265::types::StRpsEntry { poc: 0, used: true }];
        b_hdr.st_rps_num_negative_pics = 1;
        let mut b_slice = Slice::new(b_hdr, 0);
        init_slice(&mut ctx, &b_slice.header, &mut b_slice).unwrap();

        let collocated_slot = match &b_slice.list0[0] {
            crate::dpb::RefEntry::Real(id) => id.0,
            _ => panic!("expected a real collocated reference for this fixture"),
        };

        let mut fp2 = H265FrameParams::new();
        let stream = decode(&mut ctx, &b_slice, &mut fp2).unwrap();

        let expect = (ctx.sps_tile_addrs[collocated_slot] >> 8) as u32;
        let emitted = stream.iter().find(|i| i.field == FpField::SpsTileAddr2).unwrap();
        assert_eq!(emitted.val, expect);
    }

    #[test]
    fn first_tile_of_first_slice_has_no_quadrant_bits() {
        let mut ctx = ctx_with_4x1_tiling(1920, 1088);
        let hint = ctb_quadrant_hint(&mut ctx, 0, 0, -1);
        assert_eq!(hint, 0);
    }

    #[test]
    fn tile_directly_below_prior_slice_row_sets_hflip_bit() {
        let mut ctx = ctx_with_4x1_tiling(1920, 1088);
        ctx.last_ctx_row = 0;
        let hint = ctb_quadrant_hint(&mut ctx, 1, 0, -1);
        assert_eq!(hint & 0b100, 0b100, "hflip (bit 2 of the 4-bit hint) must be set");
    }
}
