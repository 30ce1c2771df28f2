// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! VP9 frame-header shapes (spec.md §4.2 "VP9 specifics"). VP9 has no
//! POC/MMCO; a frame carries its own `ref_frame_idx` into the 8-slot
//! `ref_frame_map` plus a `refresh_frame_flags` bitmask.

pub const NUM_REF_FRAMES: usize = 8;
pub const REFS_PER_FRAME: usize = 3;
pub const MAX_SEGMENTS: usize = 8;
pub const SEG_LVL_MAX: usize = 4;

/// One segment's per-feature data, in VP9 `SEG_LVL_{ALT_Q,ALT_L,REF_FRAME,SKIP}`
/// order (spec.md §9 supplemented feature: "VP9 loop filter level deltas /
/// segmentation map persistence").
pub type SegFeatureData = [[i16; SEG_LVL_MAX]; MAX_SEGMENTS];

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct FrameHeader {
    pub profile: u8,
    pub show_existing_frame: bool,
    pub frame_to_show_map_idx: u8,
    pub is_keyframe: bool,
    pub show_frame: bool,
    pub width: u32,
    pub height: u32,
    pub refresh_frame_flags: u8,
    pub ref_frame_idx: [u8; REFS_PER_FRAME],
    pub base_q_idx: u8,
    pub intra_only: bool,

    /// `segmentation_enabled` (uncompressed header). When false the
    /// persisted segmentation state is irrelevant for this frame but is
    /// left untouched for a future frame that re-enables it.
    pub segmentation_enabled: bool,
    /// `segmentation_update_map`: when unset, the previous frame's
    /// segment map (not modeled byte-for-byte here, only its feature
    /// data) carries forward unchanged.
    pub segmentation_update_map: bool,
    /// `segmentation_update_data`: when set, `segmentation_feature_data`
    /// below replaces the persisted table; when unset the persisted
    /// table from the last frame that did set it carries forward.
    pub segmentation_update_data: bool,
    pub segmentation_abs_or_delta_update: bool,
    pub segmentation_feature_data: SegFeatureData,

    pub loop_filter_delta_enabled: bool,
    pub loop_filter_delta_update: bool,
    pub loop_filter_ref_deltas: [i8; 4],
    pub loop_filter_mode_deltas: [i8; 2],
}
