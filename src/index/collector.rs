//! Bounded top-K collection of scored hits.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A hit identified by segment and local id.
#[derive(Debug, Clone, Copy)]
pub struct ScoredHit {
    /// Segment sequence number.
    pub segment: u32,
    /// Local document id inside the segment.
    pub doc_id: u32,
    /// Relevance score.
    pub score: f64,
}

impl PartialEq for ScoredHit {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredHit {}

impl PartialOrd for ScoredHit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredHit {
    // Greater means better: higher score, then older segment, then lower id.
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.segment.cmp(&self.segment))
            .then_with(|| other.doc_id.cmp(&self.doc_id))
    }
}

/// Keeps the best `limit` hits seen so far.
#[derive(Debug)]
pub struct TopDocsCollector {
    limit: Option<usize>,
    // Min-heap: the worst kept hit is on top.
    hits: BinaryHeap<Reverse<ScoredHit>>,
    total_hits: u64,
}

impl TopDocsCollector {
    /// Collector keeping at most `limit` hits; `None` keeps all of them.
    pub fn new(limit: Option<usize>) -> Self {
        TopDocsCollector {
            limit,
            hits: BinaryHeap::new(),
            total_hits: 0,
        }
    }

    /// Offer a hit.
    pub fn collect(&mut self, hit: ScoredHit) {
        self.total_hits += 1;
        match self.limit {
            Some(0) => {}
            Some(limit) if self.hits.len() >= limit => {
                if let Some(Reverse(worst)) = self.hits.peek()
                    && hit > *worst
                {
                    self.hits.pop();
                    self.hits.push(Reverse(hit));
                }
            }
            _ => self.hits.push(Reverse(hit)),
        }
    }

    /// Number of hits offered.
    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    /// Kept hits, best first.
    pub fn into_sorted_vec(self) -> Vec<ScoredHit> {
        // Ascending order of Reverse is descending order of hits.
        self.hits
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(hit)| hit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(segment: u32, doc_id: u32, score: f64) -> ScoredHit {
        ScoredHit {
            segment,
            doc_id,
            score,
        }
    }

    #[test]
    fn test_keeps_best() {
        let mut collector = TopDocsCollector::new(Some(2));
        collector.collect(hit(0, 0, 0.5));
        collector.collect(hit(0, 1, 0.9));
        collector.collect(hit(1, 0, 0.1));
        collector.collect(hit(1, 1, 0.7));

        let hits = collector.into_sorted_vec();
        assert_eq!(hits.len(), 2);
        assert_eq!((hits[0].segment, hits[0].doc_id), (0, 1));
        assert_eq!((hits[1].segment, hits[1].doc_id), (1, 1));
    }

    #[test]
    fn test_ties_prefer_older_segment_then_lower_id() {
        let mut collector = TopDocsCollector::new(None);
        collector.collect(hit(1, 0, 1.0));
        collector.collect(hit(0, 3, 1.0));
        collector.collect(hit(0, 2, 1.0));

        let order: Vec<(u32, u32)> = collector
            .into_sorted_vec()
            .iter()
            .map(|h| (h.segment, h.doc_id))
            .collect();
        assert_eq!(order, vec![(0, 2), (0, 3), (1, 0)]);
    }

    #[test]
    fn test_zero_limit() {
        let mut collector = TopDocsCollector::new(Some(0));
        collector.collect(hit(0, 0, 1.0));
        assert_eq!(collector.total_hits(), 1);
        assert!(collector.into_sorted_vec().is_empty());
    }
}
