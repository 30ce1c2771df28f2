// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Shared decoded-picture-buffer shape (spec.md §3 "Picture (DPB entry)",
//! §4.2 "Common pattern for all codecs").
//!
//! Per the REDESIGN FLAGS in spec.md §9 ("cyclic references (picture in
//! DPB list and pool)"), pictures live in a single dense arena
//! (`slab::Slab`) and are referenced everywhere by [`PictureId`] rather
//! than by pointer or `Rc`. `dpb_list` becomes `Vec<PictureId>`.

use bitflags::bitflags;
use slab::Slab;

bitflags! {
    /// Per-picture state bits (spec.md §3 Picture invariants).
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct PicFlags: u8 {
        const OUTPUT     = 0b0001;
        const SHORT_REF  = 0b0010;
        const LONG_REF   = 0b0100;
        const UNUSED     = 0b1000;
    }
}

/// Index into a [`PicturePool`]'s arena. Stable for the lifetime of the
/// decode context; slot reuse preserves the index (spec.md §3: "`idx` is
/// stable for the lifetime of the decode context").
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PictureId(pub usize);

/// A DPB entry (spec.md §3 "Picture (DPB entry)").
///
/// `pic_num`/`frame_num_wrap` are H.264-only and default to 0 for the
/// other two codecs, which key references differently (RPS buckets for
/// H.265, `ref_frame_map` slots for VP9); keeping one flat struct here
/// (rather than an enum per codec) avoids duplicating the pool-discipline
/// logic in §4.2, which is identical across all three.
#[derive(Clone, Debug)]
pub struct Picture {
    pub addr: u64,
    pub pic_num: i64,
    pub poc: i64,
    pub frame_num_wrap: i64,
    pub flags: PicFlags,
    pub access_idx: u64,
    pub sps_idx: u32,
}

impl Picture {
    pub fn unused(addr: u64) -> Self {
        Picture {
            addr,
            pic_num: -1,
            poc: -1,
            frame_num_wrap: -1,
            flags: PicFlags::UNUSED,
            access_idx: 0,
            sps_idx: 0xffff_ffff,
        }
    }

    /// A synthetic placeholder for a reference that could not be found in
    /// the DPB after list construction (spec.md §7 category 5,
    /// `ReferenceMissing`): `addr=0xdead, flags=0`, decoding continues.
    pub fn missing_reference(pic_num: i64) -> Self {
        Picture {
            addr: 0xdead,
            pic_num,
            poc: -1,
            frame_num_wrap: -1,
            flags: PicFlags::empty(),
            access_idx: 0,
            sps_idx: 0xffff_ffff,
        }
    }
}

/// Fixed-size arena of [`Picture`] slots, one per RVRA allocation
/// (spec.md §4.2 "Pool discipline"). `dpb_list` is carried alongside as
/// `Vec<PictureId>` by each codec's DPB manager, not by this type, since
/// list-construction policy (P-list vs B-list, RPS buckets, ref_frame_map)
/// is genuinely codec-specific.
#[derive(Clone, Debug)]
pub struct PicturePool {
    slots: Slab<Picture>,
    ids_in_order: Vec<PictureId>,
}

impl PicturePool {
    /// Builds a pool of `count` slots, each backed by one RVRA allocation
    /// whose IOVA is given by `addr_of(slot_index)`.
    pub fn new(count: usize, mut addr_of: impl FnMut(usize) -> u64) -> Self {
        let mut slots = Slab::with_capacity(count);
        let mut ids_in_order = Vec::with_capacity(count);
        for i in 0..count {
            let key = slots.insert(Picture::unused(addr_of(i)));
            debug_assert_eq!(key, i, "slab must hand out slots in order for idx stability");
            ids_in_order.push(PictureId(key));
        }
        PicturePool {
            slots,
            ids_in_order,
        }
    }

    pub fn get(&self, id: PictureId) -> &Picture {
        &self.slots[id.0]
    }

    pub fn get_mut(&mut self, id: PictureId) -> &mut Picture {
        &mut self.slots[id.0]
    }

    pub fn ids(&self) -> &[PictureId] {
        &self.ids_in_order
    }

    pub fn len(&self) -> usize {
        self.ids_in_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids_in_order.is_empty()
    }

    /// spec.md §4.2 step 1: return any slot still marked `UNUSED`.
    pub fn first_unused(&self) -> Option<PictureId> {
        self.ids_in_order
            .iter()
            .copied()
            .find(|&id| self.slots[id.0].flags.contains(PicFlags::UNUSED))
    }

    /// spec.md §4.2 step 2: the lowest-POC slot without `OUTPUT` set.
    /// Pool discipline is shared; POC/comparison key differs per codec,
    /// so the key is supplied by the caller.
    pub fn lowest_key_without_output(
        &self,
        mut key: impl FnMut(&Picture) -> i64,
    ) -> Option<PictureId> {
        self.ids_in_order
            .iter()
            .copied()
            .filter(|&id| !self.slots[id.0].flags.contains(PicFlags::OUTPUT))
            .min_by_key(|&id| key(self.get(id)))
    }

    /// spec.md §4.2 step 3: on IDR/keyframe/IRAP, mark every slot except
    /// `keep` as `UNUSED`.
    pub fn reset_all_except(&mut self, keep: PictureId) {
        for &id in &self.ids_in_order {
            if id != keep {
                self.slots[id.0].flags |= PicFlags::UNUSED;
            }
        }
    }
}

/// One entry in a constructed reference list: either a real DPB slot, or
/// a synthetic placeholder for a reference the list-construction step
/// could not resolve (spec.md §4.2 "padding with synthetic entries
/// (addr=0xdead, flags=0) when short").
#[derive(Clone, Debug)]
pub enum RefEntry {
    Real(PictureId),
    Missing(Picture),
}

impl RefEntry {
    pub fn pic_num(&self, pool: &PicturePool) -> i64 {
        match self {
            RefEntry::Real(id) => pool.get(*id).pic_num,
            RefEntry::Missing(pic) => pic.pic_num,
        }
    }

    /// Borrows the resolved picture, whichever variant this is.
    pub fn resolve<'a>(&'a self, pool: &'a PicturePool) -> &'a Picture {
        match self {
            RefEntry::Real(id) => pool.get(*id),
            RefEntry::Missing(pic) => pic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_unused_then_lowest_poc() {
        let mut pool = PicturePool::new(3, |i| 0x1000 * i as u64);
        let a = pool.first_unused().unwrap();
        pool.get_mut(a).flags &= !PicFlags::UNUSED;
        pool.get_mut(a).flags |= PicFlags::OUTPUT;
        pool.get_mut(a).poc = 4;

        let b = pool.first_unused().unwrap();
        pool.get_mut(b).flags &= !PicFlags::UNUSED;
        pool.get_mut(b).flags |= PicFlags::OUTPUT;
        pool.get_mut(b).poc = 1;

        // third slot is still UNUSED, so first_unused must find it before
        // falling back to POC-ordered search.
        let c = pool.first_unused().unwrap();
        assert_ne!(c, a);
        assert_ne!(c, b);
    }

    #[test]
    fn reset_all_except_marks_others_unused() {
        let mut pool = PicturePool::new(2, |_| 0);
        let ids: Vec<_> = pool.ids().to_vec();
        for &id in &ids {
            pool.get_mut(id).flags &= !PicFlags::UNUSED;
        }
        pool.reset_all_except(ids[0]);
        assert!(!pool.get(ids[0]).flags.contains(PicFlags::UNUSED));
        assert!(pool.get(ids[1]).flags.contains(PicFlags::UNUSED));
    }
}
