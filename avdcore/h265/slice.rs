// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Dependent slice segment resolution (SPEC_FULL.md §2, grounded on
//! `avid/h265/decoder.py`'s handling of `dependent_slice_segment_flag`).
//!
//! A dependent slice segment carries only `slice_segment_address` and the
//! entry-point table; every other slice-header field is inherited
//! verbatim from the most recently decoded *independent* segment of the
//! same picture. The pre-parser hands this module whatever it actually
//! parsed off the wire (just the independent-segment-shaped fields the
//! syntax permits for a dependent segment) and this module produces the
//! header the rest of the pipeline should act on.

use super::ctx::H265Context;
use super::types::SliceHeader;
use crate::error::DecodeResult;

use base::bail_t;

/// Resolves `parsed` against `ctx.last_independent_header`, per spec.md
/// §4.5's description of the pre-parser's normalization duties.
///
/// If `parsed.dependent_slice_segment_flag` is unset, `parsed` is itself
/// an independent segment: it is returned unchanged and becomes the new
/// `last_independent_header` for any dependent segments that follow.
///
/// If it is set, every field except `slice_segment_address` and
/// `entry_point_offsets` is copied from the stored independent header;
/// those two fields come from `parsed` (the only ones a dependent segment
/// actually carries on the wire).
pub fn resolve_dependent_segment(ctx: &mut H265Context, parsed: SliceHeader) -> DecodeResult<SliceHeader> {
    if !parsed.dependent_slice_segment_flag {
        ctx.last_independent_header = Some(parsed.clone());
        return Ok(parsed);
    }

    let Some(base) = ctx.last_independent_header.clone() else {
        bail_t!(MalformedStream, "dependent slice segment with no preceding independent segment");
    };

    Ok(SliceHeader {
        slice_segment_address: parsed.slice_segment_address,
        entry_point_offsets: parsed.entry_point_offsets,
        dependent_slice_segment_flag: true,
        ..base
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h265::types::{NalUnitType, SliceType};

    fn independent_hdr(addr: u32) -> SliceHeader {
        SliceHeader {
            nal_unit_type: NalUnitType::TrailOrOther(1),
            slice_type: SliceType::P,
            pps_id: 0,
            poc: 4,
            pic_output_flag: true,
            num_ref_idx_l0_active_minus1: 0,
            num_ref_idx_l1_active_minus1: 0,
            st_rps: Vec::new(),
            st_rps_num_negative_pics: 0,
            slice_qp_delta: -2,
            slice_segment_address: addr,
            dependent_slice_segment_flag: false,
            entry_point_offsets: Vec::new(),
        }
    }

    #[test]
    fn independent_segment_is_stored_and_returned_unchanged() {
        let mut ctx = H265Context::new(1920, 1088);
        let hdr = independent_hdr(0);
        let resolved = resolve_dependent_segment(&mut ctx, hdr.clone()).unwrap();
        assert_eq!(resolved.slice_segment_address, hdr.slice_segment_address);
        assert!(ctx.last_independent_header.is_some());
    }

    #[test]
    fn dependent_segment_inherits_independent_fields() {
        let mut ctx = H265Context::new(1920, 1088);
        resolve_dependent_segment(&mut ctx, independent_hdr(0)).unwrap();

        let mut dep = independent_hdr(0);
        dep.dependent_slice_segment_flag = true;
        dep.slice_segment_address = 120;
        dep.slice_qp_delta = 99; // must be overridden by inherited value
        dep.entry_point_offsets = vec![10, 20];

        let resolved = resolve_dependent_segment(&mut ctx, dep).unwrap();
        assert_eq!(resolved.slice_segment_address, 120);
        assert_eq!(resolved.entry_point_offsets, vec![10, 20]);
        assert_eq!(resolved.slice_qp_delta, -2, "qp delta must come from the independent segment");
    }

    #[test]
    fn dependent_segment_without_prior_independent_fails() {
        let mut ctx = H265Context::new(1920, 1088);
        let mut dep = independent_hdr(0);
        dep.dependent_slice_segment_flag = true;
        let err = resolve_dependent_segment(&mut ctx, dep).unwrap_err();
        assert_eq!(err.kind(), base::ErrorKind::MalformedStream);
    }
}
