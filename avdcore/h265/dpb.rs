// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! H.265 RPS classification and reference-list construction (spec.md
//! §4.2 "H.265 specifics"). Grounded on `avid/h265/rlm.py`'s
//! `AVDH265RLM`: `do_frame_rps`, `construct_ref_list`, `set_new_ref`.

use base::ErrorKind;

use crate::dpb::{PicFlags, PictureId, RefEntry};
use crate::error::DecodeResult;
use crate::slice::Slice;

use super::ctx::H265Context;
use super::types::{NalUnitType, RpsBucket, SliceHeader, SliceType, HEVC_MAX_REFS, NB_RPS_TYPE};

/// spec.md §4.2 "Slot acquisition": simplified pool discipline noted in
/// `rlm.py` as "this refill algo isn't same as macOS but it doesn't
/// matter" — any slot without `SHORT_REF` set is eligible.
pub fn get_free_pic(ctx: &mut H265Context) -> DecodeResult<PictureId> {
    let id = ctx
        .pool
        .ids()
        .iter()
        .copied()
        .find(|&id| !ctx.pool.get(id).flags.contains(PicFlags::SHORT_REF))
        .ok_or_else(|| base::Error::from(ErrorKind::DpbExhausted))?;
    ctx.pool.get_mut(id).flags |= PicFlags::SHORT_REF;
    Ok(id)
}

fn find_by_poc(ctx: &H265Context, poc: i64) -> Option<PictureId> {
    ctx.pool.ids().iter().copied().find(|&id| ctx.pool.get(id).poc == poc)
}

/// spec.md §4.2 "Non-IDR frames rebuild buckets each frame". Classifies
/// every `st_rps` delta-POC entry into one of the five buckets and
/// refills `ctx.ref_lst`.
pub fn do_frame_rps(ctx: &mut H265Context, hdr: &SliceHeader, cur_pic: PictureId) -> DecodeResult<()> {
    if hdr.nal_unit_type != NalUnitType::Idr {
        for &id in ctx.pool.ids().to_vec().iter() {
            if id != cur_pic {
                ctx.pool.get_mut(id).flags &= !PicFlags::SHORT_REF;
            }
        }
        for bucket in ctx.ref_lst.iter_mut() {
            bucket.clear();
        }

        for (i, entry) in hdr.st_rps.iter().enumerate() {
            let bucket = if !entry.used {
                RpsBucket::StFoll
            } else if i < hdr.st_rps_num_negative_pics {
                RpsBucket::StCurrBef
            } else {
                RpsBucket::StCurrAft
            };
            add_candidate_ref(ctx, bucket, entry.poc)?;
        }
    }
    Ok(())
}

fn add_candidate_ref(ctx: &mut H265Context, bucket: RpsBucket, poc: i64) -> DecodeResult<()> {
    let id = match find_by_poc(ctx, poc) {
        Some(id) => id,
        None => {
            // spec.md §9: a reference that cannot be found is handled
            // inline with a synthetic placeholder, not surfaced as an
            // error (category 5, `ReferenceMissing`).
            ctx.ref_lst[bucket as usize].push(PictureId(usize::MAX));
            return Ok(());
        }
    };
    ctx.pool.get_mut(id).flags |= PicFlags::SHORT_REF;
    ctx.ref_lst[bucket as usize].push(id);
    Ok(())
}

/// spec.md §4.2 "fills `list0` (and for B, `list1`) by round-robin
/// across the candidate buckets". Bucket order: list0
/// `{ST_CURR_BEF, ST_CURR_AFT, LT_CURR}`; list1 swaps the first two.
pub fn construct_ref_list(ctx: &mut H265Context, hdr: &SliceHeader) -> DecodeResult<(Vec<RefEntry>, Vec<RefEntry>)> {
    let lx_count = if hdr.slice_type == SliceType::P { 1 } else { 2 };
    let mut lists = [Vec::new(), Vec::new()];
    let mut dpb_list = Vec::new();

    for lx in 0..lx_count {
        let num_active = if lx == 0 {
            hdr.num_ref_idx_l0_active_minus1
        } else {
            hdr.num_ref_idx_l1_active_minus1
        } as usize
            + 1;

        let cand_lists: [RpsBucket; 3] = if lx == 0 {
            [RpsBucket::StCurrBef, RpsBucket::StCurrAft, RpsBucket::LtCurr]
        } else {
            [RpsBucket::StCurrAft, RpsBucket::StCurrBef, RpsBucket::LtCurr]
        };

        let mut out = Vec::with_capacity(num_active);
        'outer: loop {
            let before = out.len();
            for &bucket in &cand_lists {
                for &id in ctx.ref_lst[bucket as usize].iter().take(HEVC_MAX_REFS) {
                    if out.len() >= num_active {
                        break 'outer;
                    }
                    out.push(id);
                }
            }
            if out.len() == before {
                // no bucket produced anything this pass; pad the rest
                // with missing-reference placeholders rather than loop
                // forever.
                while out.len() < num_active {
                    out.push(PictureId(usize::MAX));
                }
                break;
            }
        }

        for &id in &out {
            if id.0 != usize::MAX && !dpb_list.contains(&id) {
                dpb_list.push(id);
            }
        }
        lists[lx] = out
            .into_iter()
            .map(|id| {
                if id.0 == usize::MAX {
                    RefEntry::Missing(crate::dpb::Picture::missing_reference(-1))
                } else {
                    RefEntry::Real(id)
                }
            })
            .collect();
    }

    ctx.dpb_list = dpb_list;
    let [list0, list1] = lists;
    Ok((list0, list1))
}

/// spec.md §4.2 `set_new_ref`: assigns a fresh DPB slot to the current
/// picture before list construction runs.
pub fn init_slice<P>(ctx: &mut H265Context, hdr: &SliceHeader, slice: &mut Slice<P>) -> DecodeResult<()> {
    ctx.active_sps_id = Some(ctx.get_pps(hdr.pps_id)?.sps_id);
    ctx.reset_ctb_bookkeeping();
    let pic = get_free_pic(ctx)?;
    {
        let p = ctx.pool.get_mut(pic);
        p.poc = hdr.poc;
        p.access_idx = ctx.access_idx;
        p.flags |= PicFlags::SHORT_REF;
        if hdr.pic_output_flag {
            p.flags |= PicFlags::OUTPUT;
        }
    }
    slice.pic = Some(pic);

    do_frame_rps(ctx, hdr, pic)?;
    let (list0, list1) = construct_ref_list(ctx, hdr)?;
    slice.list0 = list0;
    slice.list1 = list1;
    Ok(())
}
