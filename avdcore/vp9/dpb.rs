// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! VP9 reference-slot bookkeeping (spec.md §4.2 "VP9 specifics"): no
//! POC/MMCO, just an 8-entry `ref_frame_map` and a refcounted
//! `frame_bufs` pool, updated by `refresh_frame_flags` after each frame.

use base::ErrorKind;

use crate::error::DecodeResult;

use super::ctx::Vp9Context;
use super::types::{FrameHeader, NUM_REF_FRAMES, REFS_PER_FRAME};

/// Assigns the current frame its own buffer slot, with one reference
/// held for the duration of decode (spec.md §4.2: "swapping is a
/// two-phase ref increment then decrement").
pub fn acquire_output_buffer(ctx: &mut Vp9Context) -> DecodeResult<usize> {
    let idx = ctx.get_free_fb()?;
    ctx.frame_bufs[idx].ref_count += 1;
    ctx.frame_bufs[idx].width = ctx.width;
    ctx.frame_bufs[idx].height = ctx.height;
    Ok(idx)
}

/// Resolves one of the three `ref_frame_idx` slots to a physical buffer
/// address, for the HAL to emit as a reference plane pointer.
pub fn resolve_ref(ctx: &Vp9Context, hdr: &FrameHeader, which: usize) -> DecodeResult<u64> {
    let slot = hdr.ref_frame_idx[which] as usize;
    let fb = ctx.ref_frame_map[slot]
        .ok_or_else(|| base::Error::new(ErrorKind::MalformedStream, format!("ref_frame_map[{slot}] unset")))?;
    Ok(ctx.frame_bufs[fb].addr)
}

/// Applies `refresh_frame_flags`: increments the ref count of the
/// current frame's buffer once per slot it now occupies, then decrements
/// whatever buffer it displaced (phase order matters only when the
/// outgoing and incoming buffer are the same slot, which must not drop
/// to zero mid-update).
pub fn apply_refresh(ctx: &mut Vp9Context, hdr: &FrameHeader, fb_idx: usize) {
    let flags = if hdr.is_keyframe { 0xFFu8 } else { hdr.refresh_frame_flags };

    for slot in 0..NUM_REF_FRAMES {
        if flags & (1 << slot) == 0 {
            continue;
        }
        ctx.frame_bufs[fb_idx].ref_count += 1;
        if let Some(old) = ctx.ref_frame_map[slot] {
            if ctx.frame_bufs[old].ref_count > 0 {
                ctx.frame_bufs[old].ref_count -= 1;
            }
        }
        ctx.ref_frame_map[slot] = Some(fb_idx);
    }

    // Release the decode-duration hold taken by `acquire_output_buffer`.
    if ctx.frame_bufs[fb_idx].ref_count > 0 {
        ctx.frame_bufs[fb_idx].ref_count -= 1;
    }
}

/// Resolves this frame's effective segmentation/loop-filter-delta state
/// against what persisted from the previous frame (spec.md §9
/// supplemented feature: "seg_feature_data and ref_frame_idx persist
/// across inter frames when segmentation_update_map is unset").
///
/// A keyframe always re-derives from its own header (libvpx
/// `setup_past_independence` resets segmentation/loop-filter state on
/// every key frame and every error-resilient/intra-only frame that
/// requests it; this crate models the keyframe case, the common one the
/// HAL actually needs to be bit-exact for).
pub fn apply_persisted_state(ctx: &mut Vp9Context, hdr: &FrameHeader) {
    if hdr.is_keyframe {
        ctx.seg_feature_data = Default::default();
        ctx.seg_enabled = false;
        ctx.seg_abs_or_delta_update = false;
        ctx.lf_ref_deltas = [1, 0, -1, -1];
        ctx.lf_mode_deltas = [0, 0];
        ctx.probs.reset_all();
    }

    ctx.seg_enabled = hdr.segmentation_enabled;
    if hdr.segmentation_enabled && hdr.segmentation_update_data {
        ctx.seg_feature_data = hdr.segmentation_feature_data;
        ctx.seg_abs_or_delta_update = hdr.segmentation_abs_or_delta_update;
    }
    // else: ctx.seg_feature_data/seg_abs_or_delta_update carry forward
    // from the previous frame untouched.

    if hdr.loop_filter_delta_enabled && hdr.loop_filter_delta_update {
        ctx.lf_ref_deltas = hdr.loop_filter_ref_deltas;
        ctx.lf_mode_deltas = hdr.loop_filter_mode_deltas;
    }
}

pub fn init_slice(ctx: &mut Vp9Context, hdr: &FrameHeader) -> DecodeResult<usize> {
    if hdr.ref_frame_idx.iter().any(|&i| i as usize >= NUM_REF_FRAMES) {
        return Err(base::Error::from(ErrorKind::MalformedStream));
    }
    apply_persisted_state(ctx, hdr);
    acquire_output_buffer(ctx)
}

pub fn finish_slice(ctx: &mut Vp9Context, hdr: &FrameHeader, fb_idx: usize) {
    apply_refresh(ctx, hdr, fb_idx);
}

#[allow(dead_code)]
const _: () = {
    // compile-time reminder that REFS_PER_FRAME bounds ref_frame_idx.
    assert!(REFS_PER_FRAME == 3);
};

#[cfg(test)]
mod tests {
    use super::*;

    fn key_hdr(width: u32, height: u32) -> FrameHeader {
        FrameHeader {
            is_keyframe: true,
            show_frame: true,
            width,
            height,
            refresh_frame_flags: 0,
            ..Default::default()
        }
    }

    #[test]
    fn keyframe_refreshes_all_eight_slots() {
        let mut ctx = Vp9Context::new(128, 64);
        let hdr = key_hdr(128, 64);
        let fb = init_slice(&mut ctx, &hdr).unwrap();
        finish_slice(&mut ctx, &hdr, fb);
        assert!(ctx.ref_frame_map.iter().all(|slot| *slot == Some(fb)));
    }

    #[test]
    fn non_refreshed_slot_keeps_old_buffer() {
        let mut ctx = Vp9Context::new(128, 64);
        let hdr0 = key_hdr(128, 64);
        let fb0 = init_slice(&mut ctx, &hdr0).unwrap();
        finish_slice(&mut ctx, &hdr0, fb0);

        let hdr1 = FrameHeader {
            is_keyframe: false,
            refresh_frame_flags: 0b0000_0001,
            ref_frame_idx: [0, 1, 2],
            ..Default::default()
        };
        let fb1 = init_slice(&mut ctx, &hdr1).unwrap();
        finish_slice(&mut ctx, &hdr1, fb1);

        assert_eq!(ctx.ref_frame_map[0], Some(fb1));
        assert_eq!(ctx.ref_frame_map[1], Some(fb0));
    }

    #[test]
    fn segmentation_data_persists_when_update_data_unset() {
        let mut ctx = Vp9Context::new(128, 64);
        let mut hdr0 = key_hdr(128, 64);
        hdr0.segmentation_enabled = true;
        hdr0.segmentation_update_data = true;
        hdr0.segmentation_feature_data[2][0] = 7;
        let fb0 = init_slice(&mut ctx, &hdr0).unwrap();
        finish_slice(&mut ctx, &hdr0, fb0);
        assert_eq!(ctx.seg_feature_data[2][0], 7);

        let hdr1 = FrameHeader {
            is_keyframe: false,
            segmentation_enabled: true,
            segmentation_update_data: false,
            refresh_frame_flags: 0b0000_0001,
            ref_frame_idx: [0, 1, 2],
            ..Default::default()
        };
        let fb1 = init_slice(&mut ctx, &hdr1).unwrap();
        finish_slice(&mut ctx, &hdr1, fb1);
        assert_eq!(ctx.seg_feature_data[2][0], 7, "unset segmentation_update_data must not clear persisted data");
    }

    #[test]
    fn ten_inter_frames_after_keyframe_never_exhaust_the_buffer_pool() {
        let mut ctx = Vp9Context::new(128, 64);
        let key = key_hdr(128, 64);
        let fb = init_slice(&mut ctx, &key).unwrap();
        finish_slice(&mut ctx, &key, fb);

        for i in 0..10u8 {
            let hdr = FrameHeader {
                is_keyframe: false,
                refresh_frame_flags: 1 << (i % 8),
                ref_frame_idx: [0, 1, 2],
                ..Default::default()
            };
            let fb = init_slice(&mut ctx, &hdr).unwrap();
            finish_slice(&mut ctx, &hdr, fb);
        }

        assert!(ctx.ref_frame_map.iter().all(|slot| slot.is_some()));
        assert!(ctx.frame_bufs.iter().all(|fb| fb.ref_count <= NUM_REF_FRAMES as u32));
    }

    #[test]
    fn keyframe_resets_segmentation_and_loop_filter_deltas() {
        let mut ctx = Vp9Context::new(128, 64);
        ctx.seg_feature_data[0][0] = 42;
        ctx.lf_ref_deltas = [9, 9, 9, 9];

        let hdr = key_hdr(128, 64);
        let fb = init_slice(&mut ctx, &hdr).unwrap();
        finish_slice(&mut ctx, &hdr, fb);

        assert_eq!(ctx.seg_feature_data[0][0], 0);
        assert_eq!(ctx.lf_ref_deltas, [1, 0, -1, -1]);
    }

    #[test]
    fn keyframe_resets_the_probs_ring() {
        let mut ctx = Vp9Context::new(128, 64);
        ctx.probs.slot_mut(0).as_bytes_mut()[0] = 77;

        let hdr = key_hdr(128, 64);
        let fb = init_slice(&mut ctx, &hdr).unwrap();
        finish_slice(&mut ctx, &hdr, fb);

        assert_eq!(ctx.probs.slot(0).as_bytes()[0], 128);
    }
}
