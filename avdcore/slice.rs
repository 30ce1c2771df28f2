// This file is part of avd-gen.
// SPDX-License-Identifier: GPL-3.0-or-later

//! The common slice/frame unit shape (spec.md §3 "Slice/Frame unit").
//! Codec-specific syntax-element headers are supplied by the generic
//! parameter `H`; list construction and DPB-assigned fields are uniform
//! across codecs.

use crate::dpb::{PictureId, RefEntry};

/// Which of the two reference lists an entry belongs to (H.265/H.264
/// B-slices only; VP9 and H.264 P-slices only ever populate `List0`).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ListId {
    List0,
    List1,
}

/// One slice or frame unit (spec.md §3): the codec-specific syntax
/// elements in `header`, plus the fields the DPB manager attaches before
/// handing the unit to the HAL.
#[derive(Clone, Debug)]
pub struct Slice<H> {
    pub header: H,
    /// The DPB slot assigned to this slice's output picture.
    pub pic: Option<PictureId>,
    pub list0: Vec<RefEntry>,
    pub list1: Vec<RefEntry>,
    /// IOVA of this slice's staged RBSP bytes (the `slice_data` range).
    pub payload_addr: u64,
}

impl<H> Slice<H> {
    pub fn new(header: H, payload_addr: u64) -> Self {
        Slice {
            header,
            pic: None,
            list0: Vec::new(),
            list1: Vec::new(),
            payload_addr,
        }
    }

    pub fn list(&self, which: ListId) -> &[RefEntry] {
        match which {
            ListId::List0 => &self.list0,
            ListId::List1 => &self.list1,
        }
    }

    pub fn list_mut(&mut self, which: ListId) -> &mut Vec<RefEntry> {
        match which {
            ListId::List0 => &mut self.list0,
            ListId::List1 => &mut self.list1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_mut_targets_requested_list() {
        let mut s: Slice<()> = Slice::new((), 0);
        s.list_mut(ListId::List0).push(RefEntry::Real(PictureId(1)));
        s.list_mut(ListId::List1).push(RefEntry::Real(PictureId(2)));
        assert!(matches!(s.list(ListId::List0)[0], RefEntry::Real(PictureId(1))));
        assert!(matches!(s.list(ListId::List1)[0], RefEntry::Real(PictureId(2))));
    }
}
