//! Channel Mapper: pairs the ports of two endpoints.
//!
//! Ports sharing a known channel tag pair first, in tag preference order.
//! Whatever is left on both sides pairs positionally by ordinal. Leftovers on
//! the longer side stay unpaired, which is not an error.

use std::collections::{BTreeMap, BTreeSet};

use crate::{ChannelTag, Port};

/// Anything the mapper can pair: live ports and hub template ports alike.
pub trait Channelled {
    fn tag(&self) -> ChannelTag;
    fn ordinal(&self) -> u32;
}

impl Channelled for Port {
    fn tag(&self) -> ChannelTag {
        self.tag
    }

    fn ordinal(&self) -> u32 {
        self.ordinal
    }
}

impl<T: Channelled + ?Sized> Channelled for &T {
    fn tag(&self) -> ChannelTag {
        (**self).tag()
    }

    fn ordinal(&self) -> u32 {
        (**self).ordinal()
    }
}

/// How a pair was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairedBy {
    Tag(ChannelTag),
    Ordinal,
}

#[derive(Debug)]
pub struct ChannelMap<'a, S, D> {
    pub pairs: Vec<(&'a S, &'a D, PairedBy)>,
    pub unmatched_sources: usize,
    pub unmatched_destinations: usize,
}

impl<S, D> ChannelMap<'_, S, D> {
    /// One side had no ports at all; nothing could be mapped.
    pub fn is_skipped(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Pair `sources` with `destinations`.
///
/// Deterministic: the same inputs always produce the same pairs in the same
/// order (tag matches in preference order, then ordinal matches).
pub fn map_channels<'a, S: Channelled, D: Channelled>(
    sources: &'a [S],
    destinations: &'a [D],
) -> ChannelMap<'a, S, D> {
    if sources.is_empty() || destinations.is_empty() {
        return ChannelMap {
            pairs: Vec::new(),
            unmatched_sources: sources.len(),
            unmatched_destinations: destinations.len(),
        };
    }

    let src_by_tag = index_by_tag(sources);
    let dst_by_tag = index_by_tag(destinations);

    let mut pairs = Vec::new();
    let mut used_src = BTreeSet::new();
    let mut used_dst = BTreeSet::new();

    for (tag, &si) in &src_by_tag {
        if let Some(&di) = dst_by_tag.get(tag) {
            pairs.push((&sources[si], &destinations[di], PairedBy::Tag(*tag)));
            used_src.insert(si);
            used_dst.insert(di);
        }
    }

    let rest_src = remaining_by_ordinal(sources, &used_src);
    let rest_dst = remaining_by_ordinal(destinations, &used_dst);
    let positional = rest_src.len().min(rest_dst.len());

    for (&si, &di) in rest_src.iter().zip(rest_dst.iter()) {
        pairs.push((&sources[si], &destinations[di], PairedBy::Ordinal));
    }

    ChannelMap {
        pairs,
        unmatched_sources: rest_src.len() - positional,
        unmatched_destinations: rest_dst.len() - positional,
    }
}

/// Known tags only; the first port carrying a tag wins.
fn index_by_tag<P: Channelled>(ports: &[P]) -> BTreeMap<ChannelTag, usize> {
    let mut by_tag = BTreeMap::new();
    for (i, port) in ports.iter().enumerate() {
        let tag = port.tag();
        if tag.is_known() {
            by_tag.entry(tag).or_insert(i);
        }
    }
    by_tag
}

fn remaining_by_ordinal<P: Channelled>(ports: &[P], used: &BTreeSet<usize>) -> Vec<usize> {
    let mut rest: Vec<usize> = (0..ports.len()).filter(|i| !used.contains(i)).collect();
    rest.sort_by_key(|&i| (ports[i].ordinal(), i));
    rest
}
