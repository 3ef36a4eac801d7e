//! An immutable, read-only store of haplotype ancestors as per-site
//! run-length segments.
//!
//! Modelled on `tsinfer`'s C `ancestor_store_alloc` /
//! `ancestor_store_get_state` / `ancestor_store_get_ancestor` /
//! `ancestor_store_get_epoch_ancestors` / `ancestor_store_check_state`,
//! translated from a single hand-rolled arena per site into a
//! `Vec<Segment>` per site.

use crate::error::{Result, TsinferError};
use crate::ids::{AncestorId, SiteId};

/// A half-open `[start, end)` run of ancestor ids carrying the derived
/// allele at one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: AncestorId,
    pub end: AncestorId,
}

#[derive(Debug, Clone)]
struct Site {
    position: f64,
    segments: Vec<Segment>,
}

/// A maximal contiguous run of ancestors sharing the same age.
///
/// Epoch 0 holds only the synthetic root ancestor (id 0); epoch
/// `num_epochs - 1` holds the youngest ancestors.
/// The original C source computes an inverted,
/// off-by-one numbering internally (a dead epoch 0 its own query function
/// refuses to serve with `assert(epoch > 0)`); see DESIGN.md for why we
/// follow the documented numbering instead of that artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch {
    pub first_ancestor: AncestorId,
    pub num_ancestors: usize,
}

impl Epoch {
    /// Ancestor ids belonging to this epoch, in ascending order.
    pub fn ancestors(&self) -> impl Iterator<Item = AncestorId> {
        let first = self.first_ancestor.0;
        (first..first + self.num_ancestors as i64).map(AncestorId)
    }
}

#[derive(Debug, Clone)]
struct AncestorMeta {
    age: u32,
    num_older_ancestors: usize,
    focal_sites: Vec<SiteId>,
    start_site: SiteId,
    end_site: SiteId,
}

/// A fully materialised ancestor: its derived-state vector plus the
/// metadata [`AncestorStore::get_ancestor`] returns alongside it.
#[derive(Debug, Clone)]
pub struct AncestorData {
    /// `state[site] ∈ {-1, 0, 1}`; `-1` outside `[start_site, end_site)`.
    pub state: Vec<i8>,
    pub start_site: SiteId,
    pub end_site: SiteId,
    pub num_older_ancestors: usize,
    pub focal_sites: Vec<SiteId>,
}

/// Immutable-after-build, read-only store of ancestral haplotypes.
///
/// Construct via [`AncestorStoreBuilder`]; once built, queries
/// ([`AncestorStore::get_state`], [`AncestorStore::get_ancestor`],
/// [`AncestorStore::get_epoch_ancestors`]) never fail: out-of-range ids are
/// programming errors, not recoverable conditions.
#[derive(Debug, Clone)]
pub struct AncestorStore {
    sites: Vec<Site>,
    ancestors: Vec<AncestorMeta>,
    epochs: Vec<Epoch>,
    total_segments: usize,
}

impl AncestorStore {
    pub fn num_sites(&self) -> usize {
        self.sites.len()
    }

    pub fn num_ancestors(&self) -> usize {
        self.ancestors.len()
    }

    pub fn num_epochs(&self) -> usize {
        self.epochs.len()
    }

    pub fn total_segments(&self) -> usize {
        self.total_segments
    }

    pub fn position(&self, site: SiteId) -> f64 {
        self.sites[site.as_usize()].position
    }

    pub fn segments(&self, site: SiteId) -> &[Segment] {
        &self.sites[site.as_usize()].segments
    }

    pub fn epoch(&self, epoch: usize) -> &Epoch {
        &self.epochs[epoch]
    }

    /// Ancestor ids of the given epoch, in ascending order.
    pub fn get_epoch_ancestors(&self, epoch: usize) -> impl Iterator<Item = AncestorId> + '_ {
        self.epochs[epoch].ancestors()
    }

    /// The derived-allele state of `ancestor` at `site`, within the site's
    /// segment list: 1 if covered by a segment, 0 otherwise. Does not
    /// account for `ancestor`'s own support range — see
    /// [`AncestorStore::get_ancestor`] for the full `{-1, 0, 1}` state.
    ///
    /// Implemented as a binary search over the site's end-ordered segment
    /// list, in place of the C source's linear scan.
    pub fn get_state(&self, site: SiteId, ancestor: AncestorId) -> u8 {
        let segments = &self.sites[site.as_usize()].segments;
        let idx = segments.partition_point(|s| s.end <= ancestor);
        match segments.get(idx) {
            Some(s) if s.start <= ancestor => 1,
            _ => 0,
        }
    }

    /// Materialise the full per-site state vector for `ancestor`, plus its
    /// support range, older-ancestor count, and focal sites.
    pub fn get_ancestor(&self, ancestor: AncestorId) -> AncestorData {
        let meta = &self.ancestors[ancestor.as_usize()];
        let mut state = vec![-1i8; self.num_sites()];
        for l in meta.start_site.as_usize()..meta.end_site.as_usize() {
            state[l] = self.get_state(SiteId::from(l), ancestor) as i8;
        }
        AncestorData {
            state,
            start_site: meta.start_site,
            end_site: meta.end_site,
            num_older_ancestors: meta.num_older_ancestors,
            focal_sites: meta.focal_sites.clone(),
        }
    }

    fn check_state(&self) -> Result<()> {
        let mut total = 0usize;
        for site in &self.sites {
            total += site.segments.len();
        }
        if total != self.total_segments {
            return Err(TsinferError::AssertionFailure("segment count mismatch"));
        }
        for ancestor in 0..self.num_ancestors() {
            let data = self.get_ancestor(AncestorId::from(ancestor));
            if data.start_site > data.end_site {
                return Err(TsinferError::AssertionFailure(
                    "ancestor start_site must be <= end_site",
                ));
            }
            for l in 0..self.num_sites() {
                let in_support = SiteId::from(l) >= data.start_site && SiteId::from(l) < data.end_site;
                if in_support == (data.state[l] == -1) {
                    return Err(TsinferError::AssertionFailure(
                        "ancestor state/support mismatch",
                    ));
                }
            }
        }
        for epoch in &self.epochs[1..] {
            let age0 = self.ancestors[epoch.first_ancestor.as_usize()].age;
            for a in epoch.ancestors() {
                if self.ancestors[a.as_usize()].age != age0 {
                    return Err(TsinferError::AssertionFailure("epoch age mismatch"));
                }
            }
        }
        Ok(())
    }

    /// Traces a summary of this store's shape at `log::Level::Trace`.
    /// Diagnostic only; mirrors `ancestor_store_print_state`.
    pub fn log_state(&self) {
        log::trace!(
            "ancestor store: {} sites, {} ancestors, {} epochs, {} segments",
            self.num_sites(),
            self.num_ancestors(),
            self.num_epochs(),
            self.total_segments,
        );
    }
}

/// Bulk constructor for an [`AncestorStore`].
///
/// Mirrors `ancestor_store_alloc`'s four parallel-array input groups: site
/// positions, ancestor ages, grouped focal sites, and grouped segments.
#[derive(Debug, Default)]
pub struct AncestorStoreBuilder {
    positions: Vec<f64>,
    ancestor_age: Vec<u32>,
    focal_site_ancestor: Vec<AncestorId>,
    focal_site: Vec<SiteId>,
    segment_site: Vec<SiteId>,
    segment_start: Vec<AncestorId>,
    segment_end: Vec<AncestorId>,
}

impl AncestorStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `position[num_sites]`, strictly increasing.
    pub fn with_sites(mut self, positions: Vec<f64>) -> Self {
        self.positions = positions;
        self
    }

    /// `ancestor_age[num_ancestors]`, non-increasing from id 1 on (id 0's
    /// age is forced to `u32::MAX` regardless of what is passed here,
    /// matching `ancestor_store_alloc`'s unconditional
    /// `self->ancestors.age[0] = UINT32_MAX`).
    pub fn with_ancestor_ages(mut self, ancestor_age: Vec<u32>) -> Self {
        self.ancestor_age = ancestor_age;
        self
    }

    /// Parallel arrays `focal_site_ancestor[k]`, `focal_site[k]`, grouped by
    /// ancestor in strictly increasing ancestor order starting at 1.
    pub fn with_focal_sites(
        mut self,
        focal_site_ancestor: Vec<AncestorId>,
        focal_site: Vec<SiteId>,
    ) -> Self {
        self.focal_site_ancestor = focal_site_ancestor;
        self.focal_site = focal_site;
        self
    }

    /// Parallel arrays `site[s]`, `start[s]`, `end[s]`, grouped by site in
    /// ascending site order, end-ordered within a site.
    pub fn with_segments(
        mut self,
        segment_site: Vec<SiteId>,
        segment_start: Vec<AncestorId>,
        segment_end: Vec<AncestorId>,
    ) -> Self {
        self.segment_site = segment_site;
        self.segment_start = segment_start;
        self.segment_end = segment_end;
        self
    }

    pub fn build(self) -> Result<AncestorStore> {
        let num_sites = self.positions.len();
        let num_ancestors = self.ancestor_age.len();
        if num_sites == 0 {
            return Err(TsinferError::BadInput("num_sites must be > 0"));
        }
        if num_ancestors == 0 {
            return Err(TsinferError::BadInput("num_ancestors must be > 0"));
        }
        for w in self.positions.windows(2) {
            if !(w[1] > w[0]) {
                return Err(TsinferError::BadInput("site positions must strictly increase"));
            }
        }
        for w in self.ancestor_age[1..].windows(2) {
            if w[1] > w[0] {
                return Err(TsinferError::BadInput(
                    "ancestor ages must be non-increasing from ancestor 1 onward",
                ));
            }
        }

        // --- focal sites, grouped by ancestor ---
        let mut focal_sites: Vec<Vec<SiteId>> = vec![Vec::new(); num_ancestors];
        let mut current_ancestor = AncestorId(0);
        for (&a, &site) in self.focal_site_ancestor.iter().zip(self.focal_site.iter()) {
            if a.as_usize() == 0 {
                return Err(TsinferError::BadInput("ancestor 0 cannot have focal sites"));
            }
            if a != current_ancestor {
                if a.0 != current_ancestor.0 + 1 {
                    return Err(TsinferError::BadInput(
                        "focal sites must be grouped by strictly sequential ancestor id",
                    ));
                }
                current_ancestor = a;
            }
            if site.as_usize() >= num_sites {
                return Err(TsinferError::BadInput("focal site id out of range"));
            }
            focal_sites[a.as_usize()].push(site);
        }

        // --- segments, grouped by site ---
        let mut sites: Vec<Site> = self
            .positions
            .iter()
            .map(|&position| Site {
                position,
                segments: Vec::new(),
            })
            .collect();
        let mut total_segments = 0usize;
        let mut max_seen_end = AncestorId(0);
        {
            let mut current_site: Option<SiteId> = None;
            for ((&site, &start), &end) in self
                .segment_site
                .iter()
                .zip(self.segment_start.iter())
                .zip(self.segment_end.iter())
            {
                if site.as_usize() >= num_sites {
                    return Err(TsinferError::BadInput("segment site id out of range"));
                }
                if let Some(cur) = current_site {
                    if site < cur {
                        return Err(TsinferError::BadInput(
                            "segments must be grouped by non-decreasing site id",
                        ));
                    }
                }
                current_site = Some(site);
                if !(start < end) {
                    return Err(TsinferError::BadInput("segment start must be < end"));
                }
                if let Some(last) = sites[site.as_usize()].segments.last() {
                    if !(end > last.end) {
                        return Err(TsinferError::BadInput(
                            "segments within a site must strictly increase in end",
                        ));
                    }
                }
                sites[site.as_usize()].segments.push(Segment { start, end });
                total_segments += 1;
                if end > max_seen_end {
                    max_seen_end = end;
                }
            }
        }
        if max_seen_end.as_usize() > num_ancestors {
            return Err(TsinferError::BadInput(
                "a segment end exceeds the declared number of ancestors",
            ));
        }

        // --- epochs: maximal runs of equal age, oldest (ancestor 0) first ---
        let mut ages = self.ancestor_age.clone();
        ages[0] = u32::MAX;
        let mut epochs = Vec::new();
        let mut i = 0usize;
        while i < num_ancestors {
            let age = ages[i];
            let start = i;
            while i < num_ancestors && ages[i] == age {
                i += 1;
            }
            epochs.push(Epoch {
                first_ancestor: AncestorId::from(start),
                num_ancestors: i - start,
            });
        }

        // --- per-ancestor support range ---
        // Ancestor 0 is the synthetic universal background: it carries the
        // ancestral (0) state over the whole chromosome. Every other
        // ancestor's support is the smallest contiguous span covering its
        // focal sites and every site at which it is marked derived in a
        // segment — the only per-ancestor extent this data model encodes.
        let mut support: Vec<Option<(SiteId, SiteId)>> = vec![None; num_ancestors];
        support[0] = Some((SiteId(0), SiteId::from(num_sites.saturating_sub(1))));
        for (l, site) in sites.iter().enumerate() {
            for seg in &site.segments {
                for a in seg.start.as_usize()..seg.end.as_usize().min(num_ancestors) {
                    if a == 0 {
                        continue;
                    }
                    widen(&mut support[a], SiteId::from(l));
                }
            }
        }
        for (a, focal) in focal_sites.iter().enumerate() {
            if a == 0 {
                continue;
            }
            for &site in focal {
                widen(&mut support[a], site);
            }
        }
        if support[1..].iter().any(Option::is_none) {
            return Err(TsinferError::BadInput(
                "ancestor has no focal or derived sites to anchor its support",
            ));
        }

        let mut ancestors = Vec::with_capacity(num_ancestors);
        for (idx, focal) in focal_sites.into_iter().enumerate() {
            let epoch = epochs
                .iter()
                .find(|e| {
                    idx >= e.first_ancestor.as_usize()
                        && idx < e.first_ancestor.as_usize() + e.num_ancestors
                })
                .expect("every ancestor belongs to exactly one epoch");
            let (start_site, last_site) = support[idx].expect("support computed above");
            ancestors.push(AncestorMeta {
                age: ages[idx],
                num_older_ancestors: epoch.first_ancestor.as_usize(),
                focal_sites: focal,
                start_site,
                end_site: SiteId::from(last_site.as_usize() + 1),
            });
        }

        let store = AncestorStore {
            sites,
            ancestors,
            epochs,
            total_segments,
        };
        store.check_state()?;
        Ok(store)
    }
}

/// Widen a `(min_site, max_site)` accumulator to include `site`.
fn widen(slot: &mut Option<(SiteId, SiteId)>, site: SiteId) {
    match slot {
        None => *slot = Some((site, site)),
        Some((min, max)) => {
            if site < *min {
                *min = site;
            }
            if site > *max {
                *max = site;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_s5() -> AncestorStore {
        // A small self-consistent fixture: a segment
        // only marks an ancestor derived where it is actually meant to be,
        // so every get_state call agrees with get_ancestor's state vector.
        AncestorStoreBuilder::new()
            .with_sites(vec![0.1, 0.5, 0.9])
            .with_ancestor_ages(vec![u32::MAX, 2, 2, 1])
            .with_focal_sites(
                vec![AncestorId(1), AncestorId(2), AncestorId(3)],
                vec![SiteId(0), SiteId(1), SiteId(2)],
            )
            .with_segments(
                vec![SiteId(0), SiteId(1), SiteId(2)],
                vec![AncestorId(1), AncestorId(2), AncestorId(3)],
                vec![AncestorId(3), AncestorId(3), AncestorId(4)],
            )
            .build()
            .unwrap()
    }

    #[test]
    fn get_state_matches_segment_definition() {
        let store = store_s5();
        assert_eq!(store.get_state(SiteId(0), AncestorId(1)), 1);
        assert_eq!(store.get_state(SiteId(0), AncestorId(2)), 1);
        assert_eq!(store.get_state(SiteId(0), AncestorId(3)), 0);
    }

    #[test]
    fn get_ancestor_reports_support_and_missing() {
        let store = store_s5();
        let a2 = store.get_ancestor(AncestorId(2));
        assert_eq!(a2.start_site, SiteId(0));
        assert_eq!(a2.end_site, SiteId(2));
        assert_eq!(a2.state, vec![1, 1, -1]);
        assert_eq!(a2.num_older_ancestors, 1);
    }

    #[test]
    fn epochs_group_by_age_oldest_first() {
        let store = store_s5();
        assert_eq!(store.num_epochs(), 3);
        assert_eq!(store.epoch(0).ancestors().collect::<Vec<_>>(), vec![AncestorId(0)]);
        assert_eq!(
            store.epoch(1).ancestors().collect::<Vec<_>>(),
            vec![AncestorId(1), AncestorId(2)]
        );
        assert_eq!(store.epoch(2).ancestors().collect::<Vec<_>>(), vec![AncestorId(3)]);
    }

    #[test]
    fn rejects_nonincreasing_positions() {
        let err = AncestorStoreBuilder::new()
            .with_sites(vec![0.5, 0.4])
            .with_ancestor_ages(vec![u32::MAX, 1])
            .build()
            .unwrap_err();
        assert!(matches!(err, TsinferError::BadInput(_)));
    }

    #[test]
    fn rejects_nonincreasing_ages() {
        let err = AncestorStoreBuilder::new()
            .with_sites(vec![0.1, 0.2])
            .with_ancestor_ages(vec![u32::MAX, 1, 2])
            .build()
            .unwrap_err();
        assert!(matches!(err, TsinferError::BadInput(_)));
    }
}
