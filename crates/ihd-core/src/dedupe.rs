//! Hit deduplication.

use std::collections::BTreeSet;

use ihd_model::CriterionHit;

/// An ordered set of hits with at most one entry per
/// (patient_id, index_date, event_date, flag).
///
/// Several matching patterns or several result rows on the same day
/// collapse into one hit. Inserting the same hits again is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HitSet {
    hits: BTreeSet<CriterionHit>,
}

impl HitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when an equal hit was already present.
    pub fn insert(&mut self, hit: CriterionHit) -> bool {
        self.hits.insert(hit)
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Distinct patient ids among the hits.
    pub fn unique_patients(&self) -> usize {
        self.hits
            .iter()
            .map(|hit| hit.key.patient_id.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CriterionHit> + '_ {
        self.hits.iter()
    }

    /// Hits sorted by key, event date, flag.
    pub fn into_sorted_vec(self) -> Vec<CriterionHit> {
        self.hits.into_iter().collect()
    }
}

impl FromIterator<CriterionHit> for HitSet {
    fn from_iter<I: IntoIterator<Item = CriterionHit>>(iter: I) -> Self {
        Self {
            hits: iter.into_iter().collect(),
        }
    }
}

impl Extend<CriterionHit> for HitSet {
    fn extend<I: IntoIterator<Item = CriterionHit>>(&mut self, iter: I) {
        self.hits.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use ihd_model::PatientKey;
    use proptest::prelude::*;

    fn hit(pid: u8, index_offset: i64, event_offset: i64) -> CriterionHit {
        let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let key = PatientKey::new(format!("P{pid}"), base + Duration::days(index_offset)).unwrap();
        CriterionHit::new(key, base + Duration::days(event_offset))
    }

    #[test]
    fn same_day_hits_collapse() {
        let mut set = HitSet::new();
        assert!(set.insert(hit(1, 0, 10)));
        assert!(!set.insert(hit(1, 0, 10)));
        assert!(set.insert(hit(1, 0, 11)));
        assert!(set.insert(hit(1, 5, 10)));
        assert_eq!(set.len(), 3);
        assert_eq!(set.unique_patients(), 1);
    }

    proptest! {
        #[test]
        fn dedup_is_idempotent(raw in prop::collection::vec((0u8..5, 0i64..3, 0i64..20), 0..60)) {
            let hits: Vec<CriterionHit> = raw.iter().map(|&(p, i, e)| hit(p, i, e)).collect();
            let once: HitSet = hits.iter().cloned().collect();
            let mut twice = once.clone();
            twice.extend(once.clone().into_sorted_vec());
            twice.extend(hits);
            prop_assert_eq!(&once, &twice);

            let sorted = once.into_sorted_vec();
            prop_assert!(sorted.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
