use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Tracks which registered regions have come into view.
///
/// Each key is reported once, by the first [`update`](Self::update) whose
/// viewport (widened by the lookahead margin) overlaps its region. After that
/// it stays revealed until [`reset`](Self::reset).
#[derive(Debug)]
pub struct VisibilityObserver<K> {
    regions: HashMap<K, (usize, usize)>,
    revealed: HashSet<K>,
    margin: usize,
}

impl<K: Eq + Hash + Clone> VisibilityObserver<K> {
    /// `margin` extends the viewport on both sides so items just out of view
    /// are revealed early.
    pub fn new(margin: usize) -> Self {
        Self {
            regions: HashMap::new(),
            revealed: HashSet::new(),
            margin,
        }
    }

    /// Registers `key` as occupying `start..start + extent`. Re-registering
    /// moves the region; revealed keys are ignored.
    pub fn observe(&mut self, key: K, start: usize, extent: usize) {
        if self.revealed.contains(&key) {
            return;
        }
        self.regions.insert(key, (start, extent.max(1)));
    }

    pub fn unobserve(&mut self, key: &K) {
        self.regions.remove(key);
    }

    /// Applies a new viewport and returns keys that became visible, ordered by
    /// region start.
    pub fn update(&mut self, offset: usize, extent: usize) -> Vec<K> {
        let lo = offset.saturating_sub(self.margin);
        let hi = offset.saturating_add(extent).saturating_add(self.margin);

        let mut hits: Vec<(usize, K)> = self
            .regions
            .iter()
            .filter(|&(_, &(start, len))| start < hi && start.saturating_add(len) > lo)
            .map(|(k, &(start, _))| (start, k.clone()))
            .collect();
        hits.sort_by_key(|(start, _)| *start);

        hits.into_iter()
            .map(|(_, key)| {
                self.regions.remove(&key);
                self.revealed.insert(key.clone());
                key
            })
            .collect()
    }

    pub fn is_revealed(&self, key: &K) -> bool {
        self.revealed.contains(key)
    }

    pub fn revealed_count(&self) -> usize {
        self.revealed.len()
    }

    /// Forgets every region and reveal, e.g. when the list is replaced.
    pub fn reset(&mut self) {
        self.regions.clear();
        self.revealed.clear();
    }
}
