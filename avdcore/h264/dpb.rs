// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! H.264 reference-list construction and MMCO handling (spec.md §4.2
//! "H.264 specifics"). Grounded directly on `avid/h264/rlm.py`'s
//! `AVDH264RLM`: `get_free_pic`, `construct_ref_list_{p,b}`,
//! `modify_ref_list`, `finish_slice`'s MMCO dispatch.

use base::{bail_t, ErrorKind};

use crate::dpb::{PicFlags, Picture, PictureId, RefEntry};
use crate::error::DecodeResult;
use crate::slice::{ListId, Slice};

use super::ctx::H264Context;
use super::types::{Mmco, NalUnitType, PicParameterSet, RefPicListModOp, SeqParameterSet, SliceHeader, SliceType};

/// Picks, without mutating `ctx`, which pool slot the next picture would
/// use (spec.md §4.2 "Slot acquisition"). Fails with `DpbExhausted`
/// (fatal) if the pool has no unused slot and no candidate lacking
/// `OUTPUT` either; nothing has been written to `ctx` yet at that point.
fn select_free_pic(ctx: &H264Context) -> DecodeResult<PictureId> {
    if let Some(id) = ctx.pool.first_unused() {
        return Ok(id);
    }
    ctx.pool
        .lowest_key_without_output(|pic| pic.poc)
        .ok_or_else(|| base::Error::from(ErrorKind::DpbExhausted))
}

/// Commits to `pic` as the frame's acquired slot: clears `UNUSED`, and on
/// IDR wipes every other pool slot and clears `dpb_list` (spec.md §4.2:
/// "On IDR ..., mark all other pool slots as `UNUSED` and clear
/// `dpb_list`"). Callers must not invoke this until nothing that can
/// still fail (`construct_ref_list`) remains for this slice — spec.md §7:
/// "Propagation: categories 1-4 abort the current decode call and leave
/// `ctx` unchanged".
fn commit_free_pic(ctx: &mut H264Context, pic: PictureId, nal_unit_type: NalUnitType) {
    ctx.pool.get_mut(pic).flags &= !PicFlags::UNUSED;
    if nal_unit_type == NalUnitType::Idr {
        ctx.pool.reset_all_except(pic);
        ctx.dpb_list.clear();
    }
}

/// spec.md §4.2 "Slot acquisition (`get_free_pic`)": selects and
/// immediately commits a free pool slot. `init_slice` below uses the
/// split `select_free_pic`/`commit_free_pic` pair instead, so it can
/// defer the commit past `construct_ref_list`'s fallible reorder step;
/// this combined entry point remains for callers that want a slot
/// acquired unconditionally (tests, direct pool setup).
pub fn get_free_pic(ctx: &mut H264Context, nal_unit_type: NalUnitType) -> DecodeResult<PictureId> {
    let pic = select_free_pic(ctx)?;
    commit_free_pic(ctx, pic, nal_unit_type);
    Ok(pic)
}

fn short_refs(ctx: &H264Context) -> Vec<PictureId> {
    ctx.dpb_list
        .iter()
        .copied()
        .filter(|&id| ctx.pool.get(id).flags.contains(PicFlags::SHORT_REF))
        .collect()
}

fn long_refs(ctx: &H264Context) -> Vec<PictureId> {
    ctx.dpb_list
        .iter()
        .copied()
        .filter(|&id| ctx.pool.get(id).flags.contains(PicFlags::LONG_REF))
        .collect()
}

/// `8.4.2.1` reordering, ops 0 (subtract), 1 (add), 3 (end). Op 2
/// (long-term reorder) is not implemented, matching spec.md §4.2's
/// explicit carve-out ("fails cleanly").
fn apply_modification(
    ctx: &H264Context,
    base_list: &[PictureId],
    cur_pic_num: i64,
    ops: &[RefPicListModOp],
    num_active: usize,
) -> DecodeResult<Vec<PictureId>> {
    let mut lst: Vec<PictureId> = base_list.to_vec();
    let mut pred = cur_pic_num;

    for (index, op) in ops.iter().enumerate() {
        match op.idc {
            3 => break,
            0 | 1 => {
                let abs_diff = op.abs_diff_pic_num_minus1 as i64 + 1;
                if abs_diff > ctx.max_pic_num {
                    bail_t!(UnsupportedStream, "abs_diff_pic_num {abs_diff} exceeds max_pic_num");
                }
                if op.idc == 0 {
                    pred -= abs_diff;
                } else {
                    pred += abs_diff;
                }
                pred &= ctx.max_pic_num - 1;

                let sref = base_list
                    .iter()
                    .copied()
                    .find(|&id| ctx.pool.get(id).pic_num == pred)
                    .ok_or_else(|| base::Error::new(ErrorKind::MalformedStream, "ref_pic_list_modification target not found in short/long refs"))?;

                if num_active + 1 >= 32 {
                    bail_t!(UnsupportedStream, "num_ref_idx_active too large for reorder buffer");
                }
                if lst.len() < num_active + 1 {
                    lst.resize(num_active + 1, sref);
                }
                let mut i = num_active;
                while i > index {
                    lst[i] = lst[i - 1];
                    i -= 1;
                }
                lst[index] = sref;
                let mut nidx = index;
                for i in index..=num_active {
                    if ctx.pool.get(lst[i]).pic_num != pred {
                        lst[nidx] = lst[i];
                        nidx += 1;
                    }
                }
            }
            2 => bail_t!(UnsupportedStream, "long-term ref_pic_list_modification (op 2) unsupported"),
            other => bail_t!(MalformedStream, "unknown ref_pic_list_modification idc {other}"),
        }
    }
    Ok(lst)
}

/// spec.md §4.2 "Resize to `num_ref_idx_lx_active_minus1 + 1`, padding
/// with synthetic entries ... when short" (8.4.2.2). Truncates an
/// over-long list or pads a short one with [`RefEntry::Missing`].
fn resize_ref_list(ctx: &H264Context, lst: Vec<PictureId>, num_active: usize, lx: ListId) -> Vec<RefEntry> {
    let mut out: Vec<RefEntry> = lst.into_iter().map(RefEntry::Real).collect();
    if out.len() > num_active {
        out.truncate(num_active);
    }
    if out.len() < num_active {
        let mut pic_num = out
            .last()
            .map(|e| e.pic_num(&ctx.pool))
            .unwrap_or(0);
        while out.len() < num_active {
            pic_num = match lx {
                ListId::List0 => pic_num + 1,
                ListId::List1 => pic_num - 1,
            };
            out.push(RefEntry::Missing(Picture::missing_reference(pic_num)));
        }
    }
    out
}

/// spec.md §4.2 "Reference list construction". Populates `slice.list0`
/// (and `list1` for B-slices) with resolved [`RefEntry`]s, already
/// padded to their final active length.
///
/// Takes the current picture's `pic_num`/`poc` by value rather than a
/// [`PictureId`] into `ctx.pool`: `init_slice` calls this before the
/// current picture's slot has actually been written (spec.md §7, "leave
/// `ctx` unchanged" on failure means the slot can't be committed until
/// this — the one fallible step in picture setup — has already
/// succeeded), so there is no pool entry to read `cur_pic_num`/`cur_poc`
/// from yet.
pub fn construct_ref_list(
    ctx: &H264Context,
    hdr: &SliceHeader,
    cur_pic_num: i64,
    cur_poc: i64,
) -> DecodeResult<(Vec<RefEntry>, Vec<RefEntry>)> {
    match hdr.slice_type {
        SliceType::P | SliceType::Sp => {
            let mut srefs = short_refs(ctx);
            srefs.sort_by_key(|&id| std::cmp::Reverse(ctx.pool.get(id).frame_num_wrap));
            let mut lrefs = long_refs(ctx);
            lrefs.sort_by_key(|&id| ctx.pool.get(id).pic_num);

            let mut combined = srefs.clone();
            combined.extend(lrefs.iter().copied());
            let mut list0 = combined.clone();
            if hdr.ref_pic_list_modification_flag_l0 {
                list0 = apply_modification(
                    ctx,
                    &combined,
                    cur_pic_num,
                    &hdr.ref_pic_list_mod_l0,
                    hdr.num_ref_idx_l0_active_minus1 as usize,
                )?;
            }
            let list0 = resize_ref_list(ctx, list0, hdr.num_ref_idx_l0_active_minus1 as usize + 1, ListId::List0);
            Ok((list0, Vec::new()))
        }
        SliceType::B => {
            let mut srefs = short_refs(ctx);
            srefs.sort_by_key(|&id| std::cmp::Reverse(ctx.pool.get(id).poc));

            let mut list0: Vec<PictureId> = srefs
                .iter()
                .copied()
                .filter(|&id| ctx.pool.get(id).poc < cur_poc)
                .collect();
            list0.sort_by_key(|&id| std::cmp::Reverse(ctx.pool.get(id).poc));

            let mut list1: Vec<PictureId> = srefs
                .iter()
                .copied()
                .filter(|&id| ctx.pool.get(id).poc > cur_poc)
                .collect();
            list1.sort_by_key(|&id| ctx.pool.get(id).poc);

            if hdr.ref_pic_list_modification_flag_l0 {
                list0 = apply_modification(
                    ctx,
                    &srefs,
                    cur_pic_num,
                    &hdr.ref_pic_list_mod_l0,
                    hdr.num_ref_idx_l0_active_minus1 as usize,
                )?;
            }
            if hdr.ref_pic_list_modification_flag_l1 {
                list1 = apply_modification(
                    ctx,
                    &srefs,
                    cur_pic_num,
                    &hdr.ref_pic_list_mod_l1,
                    hdr.num_ref_idx_l1_active_minus1 as usize,
                )?;
            }
            let list0 = resize_ref_list(ctx, list0, hdr.num_ref_idx_l0_active_minus1 as usize + 1, ListId::List0);
            let list1 = resize_ref_list(ctx, list1, hdr.num_ref_idx_l1_active_minus1 as usize + 1, ListId::List1);
            Ok((list0, list1))
        }
        SliceType::I | SliceType::Si => Ok((Vec::new(), Vec::new())),
    }
}

/// spec.md §4.2 "MMCO": invoked once per slice after emission, folding
/// the picture into the DPB and applying any memory-management ops.
pub fn finish_slice(ctx: &mut H264Context, hdr: &SliceHeader, pic: PictureId) -> DecodeResult<()> {
    let sps_id = ctx.active_sps_id.ok_or_else(|| base::Error::from(ErrorKind::Internal))?;
    let sps = ctx.get_sps(sps_id)?.clone();

    if hdr.nal_unit_type == NalUnitType::Idr || hdr.nal_ref_idc != 0 {
        ctx.pool.get_mut(pic).flags |= PicFlags::SHORT_REF;
        ctx.dpb_list.push(pic);
    }

    if hdr.nal_unit_type != NalUnitType::Idr && hdr.nal_ref_idc == 0 {
        ctx.pool.get_mut(pic).flags &= !(PicFlags::OUTPUT | PicFlags::SHORT_REF);
    }

    if hdr.nal_ref_idc != 0 {
        if hdr.nal_unit_type == NalUnitType::Idr || !hdr.adaptive_ref_pic_marking_mode_flag {
            let limit = sps.max_num_ref_frames.max(1) as usize;
            if ctx.dpb_list.len() > limit {
                if let Some(&oldest) = ctx
                    .dpb_list
                    .iter()
                    .filter(|&&id| ctx.pool.get(id).flags.contains(PicFlags::SHORT_REF))
                    .min_by_key(|&&id| ctx.pool.get(id).access_idx)
                {
                    ctx.pool.get_mut(oldest).flags &= !(PicFlags::OUTPUT | PicFlags::SHORT_REF);
                }
            }
        } else {
            apply_mmco(ctx, hdr, pic)?;
        }
    }

    ctx.dpb_list
        .retain(|&id| ctx.pool.get(id).flags.contains(PicFlags::OUTPUT));

    ctx.prev_poc_lsb = hdr.pic_order_cnt_lsb;
    ctx.prev_poc_msb = ctx.poc_msb;
    Ok(())
}

fn apply_mmco(ctx: &mut H264Context, hdr: &SliceHeader, cur_pic: PictureId) -> DecodeResult<()> {
    let cur_pic_num = ctx.pool.get(cur_pic).pic_num;
    for op in &hdr.mmco {
        match *op {
            Mmco::End => break,
            Mmco::ForgetShort { abs_diff_pic_num_minus1 } => {
                let mut pic_num = cur_pic_num - (abs_diff_pic_num_minus1 as i64 + 1);
                pic_num &= ctx.max_frame_num - 1;
                if let Some(&id) = ctx.dpb_list.iter().find(|&&id| ctx.pool.get(id).pic_num == pic_num) {
                    ctx.pool.get_mut(id).flags &= !(PicFlags::OUTPUT | PicFlags::SHORT_REF);
                }
            }
            Mmco::ForgetLong { long_term_pic_num } => {
                let pic_num = long_term_pic_num as i64;
                if let Some(&id) = ctx.dpb_list.iter().find(|&&id| ctx.pool.get(id).pic_num == pic_num) {
                    ctx.pool.get_mut(id).flags &= !(PicFlags::OUTPUT | PicFlags::LONG_REF);
                }
            }
            Mmco::ShortToLong { abs_diff_pic_num_minus1, long_term_frame_idx } => {
                let mut pic_num = cur_pic_num - (abs_diff_pic_num_minus1 as i64 + 1);
                pic_num &= ctx.max_frame_num - 1;
                let new_lt_num = long_term_frame_idx as i64;
                // 8.2.5.4.3: any existing long-term picture already holding
                // this long_term_frame_idx loses its long-term status first.
                for &id in &ctx.dpb_list.clone() {
                    let p = ctx.pool.get_mut(id);
                    if p.flags.contains(PicFlags::LONG_REF) && p.pic_num == new_lt_num {
                        p.flags &= !PicFlags::LONG_REF;
                    }
                }
                if let Some(&id) = ctx.dpb_list.iter().find(|&&id| ctx.pool.get(id).pic_num == pic_num) {
                    let p = ctx.pool.get_mut(id);
                    p.flags &= !PicFlags::SHORT_REF;
                    p.flags |= PicFlags::LONG_REF;
                    p.pic_num = new_lt_num;
                }
            }
            Mmco::ForgetLongMax { max_long_term_frame_idx_plus1 } => {
                ctx.max_lt_idx = max_long_term_frame_idx_plus1 as i64 - 1;
                for &id in &ctx.dpb_list.clone() {
                    let p = ctx.pool.get_mut(id);
                    if p.flags.contains(PicFlags::LONG_REF) && p.pic_num >= ctx.max_lt_idx {
                        p.flags &= !PicFlags::LONG_REF;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Initializes `slice.pic`/list fields for a freshly parsed slice header,
/// mirroring `AVDH264RLM.init_slice` (POC derivation per spec.md §4.2
/// "POC").
///
/// Everything through `construct_ref_list` below is computed into locals
/// only; `ctx.pool`/`ctx.dpb_list`/`ctx.active_sps_id` are written only
/// once list construction has actually succeeded, so a failure (e.g. an
/// unsupported `ref_pic_list_modification` op) leaves `ctx` exactly as it
/// was before this call (spec.md §7: "categories 1-4 abort the current
/// decode call and leave `ctx` unchanged").
pub fn init_slice<P>(
    ctx: &mut H264Context,
    hdr: &SliceHeader,
    slice: &mut Slice<P>,
) -> DecodeResult<()> {
    let sps_id = hdr_sps_id(ctx, hdr)?;
    let sps = ctx.get_sps(sps_id)?.clone();

    if sps.pic_order_cnt_type != 0 {
        bail_t!(UnsupportedStream, "pic_order_cnt_type {} unsupported", sps.pic_order_cnt_type);
    }
    if sps.gaps_in_frame_num_value_allowed_flag {
        bail_t!(UnsupportedStream, "gaps_in_frame_num_value_allowed_flag unsupported");
    }
    if hdr.field_pic_flag {
        bail_t!(UnsupportedStream, "field pictures unsupported by the hardware");
    }

    let pic = select_free_pic(ctx)?;

    let max_pic_num = 1i64 << (sps.log2_max_frame_num_minus4 + 4);
    let max_frame_num = max_pic_num;
    let pic_num = hdr.frame_num;

    let max_poc_lsb = 1i64 << (sps.log2_max_pic_order_cnt_lsb_minus4 + 4);
    let poc_lsb = hdr.pic_order_cnt_lsb;
    let prev_lsb = if ctx.prev_poc_lsb < 0 { poc_lsb } else { ctx.prev_poc_lsb };
    let poc_msb = if poc_lsb < prev_lsb && prev_lsb - poc_lsb >= max_poc_lsb / 2 {
        ctx.prev_poc_msb + max_poc_lsb
    } else if poc_lsb > prev_lsb && prev_lsb - poc_lsb < -max_poc_lsb / 2 {
        ctx.prev_poc_msb - max_poc_lsb
    } else {
        ctx.prev_poc_msb
    };
    let poc = poc_msb + poc_lsb;
    let sps_idx = (ctx.access_idx % super::ctx::SPS_TILE_COUNT as u64) as u32;

    // The one step that can still fail; `pic`'s slot is read-only to it
    // (its pic_num/poc are passed in rather than read back from `ctx`,
    // since they haven't been committed yet).
    let (list0, list1) = construct_ref_list(ctx, hdr, pic_num, poc)?;

    // Nothing past this point can fail: commit the pool/DPB side effects
    // of acquiring `pic` together with this slice's derived state.
    commit_free_pic(ctx, pic, hdr.nal_unit_type);
    ctx.active_sps_id = Some(sps_id);
    ctx.max_pic_num = max_pic_num;
    ctx.max_frame_num = max_frame_num;
    ctx.poc_msb = poc_msb;

    let p = ctx.pool.get_mut(pic);
    p.flags |= PicFlags::OUTPUT;
    p.pic_num = pic_num;
    p.frame_num_wrap = pic_num;
    p.poc = poc;
    p.access_idx = ctx.access_idx;
    p.sps_idx = sps_idx;

    slice.pic = Some(pic);
    slice.list0 = list0;
    slice.list1 = list1;
    Ok(())
}

fn hdr_sps_id(ctx: &H264Context, hdr: &SliceHeader) -> DecodeResult<u32> {
    ctx.get_pps(hdr.pps_id).map(|pps| pps.sps_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_hdr() -> SliceHeader {
        SliceHeader {
            nal_unit_type: NalUnitType::NonIdr,
            nal_ref_idc: 1,
            slice_type: SliceType::P,
            pps_id: 0,
            frame_num: 0,
            field_pic_flag: false,
            pic_order_cnt_lsb: 0,
            num_ref_idx_l0_active_minus1: 0,
            num_ref_idx_l1_active_minus1: 0,
            ref_pic_list_modification_flag_l0: false,
            ref_pic_list_modification_flag_l1: false,
            ref_pic_list_mod_l0: Vec::new(),
            ref_pic_list_mod_l1: Vec::new(),
            adaptive_ref_pic_marking_mode_flag: false,
            mmco: Vec::new(),
            slice_qp_delta: 0,
            luma_log2_weight_denom: 0,
            chroma_log2_weight_denom: 0,
            weights_l0: Vec::new(),
            weights_l1: Vec::new(),
        }
    }

    #[test]
    fn get_free_pic_drains_unused_slots_first() {
        let mut ctx = H264Context::new(128, 64);
        let a = get_free_pic(&mut ctx, NalUnitType::NonIdr).unwrap();
        let b = get_free_pic(&mut ctx, NalUnitType::NonIdr).unwrap();
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn idr_resets_dpb_list() {
        let mut ctx = H264Context::new(128, 64);
        let a = get_free_pic(&mut ctx, NalUnitType::NonIdr).unwrap();
        ctx.dpb_list.push(a);
        let _ = get_free_pic(&mut ctx, NalUnitType::Idr).unwrap();
        assert!(ctx.dpb_list.is_empty());
    }

    #[test]
    fn p_slice_ref_list_sorted_by_frame_num_wrap_desc() {
        let mut ctx = H264Context::new(128, 64);
        let a = get_free_pic(&mut ctx, NalUnitType::Idr).unwrap();
        ctx.pool.get_mut(a).flags |= PicFlags::SHORT_REF;
        ctx.pool.get_mut(a).frame_num_wrap = 1;
        ctx.pool.get_mut(a).pic_num = 1;
        ctx.dpb_list.push(a);

        let b = get_free_pic(&mut ctx, NalUnitType::NonIdr).unwrap();
        ctx.pool.get_mut(b).flags |= PicFlags::SHORT_REF;
        ctx.pool.get_mut(b).frame_num_wrap = 3;
        ctx.pool.get_mut(b).pic_num = 3;
        ctx.dpb_list.push(b);

        let cur = get_free_pic(&mut ctx, NalUnitType::NonIdr).unwrap();
        ctx.pool.get_mut(cur).pic_num = 4;

        let mut hdr = base_hdr();
        hdr.num_ref_idx_l0_active_minus1 = 1;
        let (list0, list1) = construct_ref_list(&ctx, &hdr, 4, 0).unwrap();
        assert!(matches!(list0[0], RefEntry::Real(id) if id == b));
        assert!(matches!(list0[1], RefEntry::Real(id) if id == a));
        assert!(list1.is_empty());
    }

    #[test]
    fn mmco_forget_short_removes_matching_pic_num_from_dpb() {
        let mut ctx = H264Context::new(1024, 512);
        ctx.sps_table.insert(
            0,
            SeqParameterSet {
                id: 0,
                max_num_ref_frames: 4,
                mb_width: 64,
                mb_height: 32,
                ..Default::default()
            },
        );
        ctx.pps_table.insert(0, PicParameterSet { id: 0, sps_id: 0, ..Default::default() });
        ctx.active_sps_id = Some(0);

        let removed = get_free_pic(&mut ctx, NalUnitType::NonIdr).unwrap();
        ctx.pool.get_mut(removed).flags |= PicFlags::SHORT_REF;
        ctx.pool.get_mut(removed).pic_num = 3;
        ctx.dpb_list.push(removed);

        let cur = get_free_pic(&mut ctx, NalUnitType::NonIdr).unwrap();
        ctx.pool.get_mut(cur).pic_num = 4;
        ctx.pool.get_mut(cur).flags |= PicFlags::OUTPUT;

        let mut hdr = base_hdr();
        hdr.nal_ref_idc = 1;
        hdr.frame_num = 4;
        hdr.adaptive_ref_pic_marking_mode_flag = true;
        hdr.mmco = vec![
            Mmco::ForgetShort { abs_diff_pic_num_minus1: 0 },
            Mmco::End,
        ];

        finish_slice(&mut ctx, &hdr, cur).unwrap();

        assert!(ctx
            .dpb_list
            .iter()
            .all(|&id| ctx.pool.get(id).pic_num != 3));
    }

    #[test]
    fn ref_pic_list_modification_ops_reorder_list0_front_entry() {
        let mut ctx = H264Context::new(128, 64);

        let a = get_free_pic(&mut ctx, NalUnitType::Idr).unwrap();
        ctx.pool.get_mut(a).flags |= PicFlags::SHORT_REF;
        ctx.pool.get_mut(a).frame_num_wrap = 3;
        ctx.pool.get_mut(a).pic_num = 3;
        ctx.dpb_list.push(a);

        let b = get_free_pic(&mut ctx, NalUnitType::NonIdr).unwrap();
        ctx.pool.get_mut(b).flags |= PicFlags::SHORT_REF;
        ctx.pool.get_mut(b).frame_num_wrap = 4;
        ctx.pool.get_mut(b).pic_num = 4;
        ctx.dpb_list.push(b);

        let cur = get_free_pic(&mut ctx, NalUnitType::NonIdr).unwrap();
        ctx.pool.get_mut(cur).pic_num = 5;

        let mut hdr = base_hdr();
        hdr.num_ref_idx_l0_active_minus1 = 1;
        hdr.ref_pic_list_modification_flag_l0 = true;
        hdr.ref_pic_list_mod_l0 = vec![
            RefPicListModOp { idc: 0, abs_diff_pic_num_minus1: 0 },
            RefPicListModOp { idc: 3, abs_diff_pic_num_minus1: 0 },
        ];

        let (list0, _) = construct_ref_list(&ctx, &hdr, 5, 0).unwrap();
        assert!(matches!(list0[0], RefEntry::Real(id) if id == b));
    }

    /// The review-flagged regression: an `init_slice` call whose
    /// `construct_ref_list` step fails (here, an unsupported op-2
    /// long-term reorder) must not leave a picture slot claimed or the
    /// pool/`dpb_list` otherwise mutated (spec.md §7: "leave `ctx`
    /// unchanged").
    #[test]
    fn init_slice_leaves_ctx_unchanged_when_ref_list_construction_fails() {
        let mut ctx = H264Context::new(128, 64);
        ctx.sps_table.insert(0, SeqParameterSet { id: 0, ..Default::default() });
        ctx.pps_table.insert(0, PicParameterSet { id: 0, sps_id: 0, ..Default::default() });

        let before = ctx.clone();

        let mut hdr = base_hdr();
        hdr.slice_type = SliceType::P;
        hdr.num_ref_idx_l0_active_minus1 = 0;
        hdr.ref_pic_list_modification_flag_l0 = true;
        hdr.ref_pic_list_mod_l0 = vec![RefPicListModOp { idc: 2, abs_diff_pic_num_minus1: 0 }];

        let mut slice = Slice::new(hdr.clone(), 0);
        let err = init_slice(&mut ctx, &hdr, &mut slice).unwrap_err();
        assert_eq!(err.kind(), base::ErrorKind::UnsupportedStream);

        assert_eq!(ctx.pool.first_unused(), before.pool.first_unused());
        assert_eq!(ctx.dpb_list, before.dpb_list);
        assert_eq!(ctx.active_sps_id, before.active_sps_id);
        assert!(slice.pic.is_none());
    }
}
