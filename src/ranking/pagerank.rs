//! PageRank over a link graph, and its combination with TF-IDF.
//!
//! ```text
//! PR(p) = (1 - d) + d · Σ PR(q) / out(q)     over every edge q → p
//! ```
//!
//! Every iteration reads only the previous iteration's scores.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::document::Document;
use crate::error::{PagedexError, Result};
use crate::index::manager::InvertedIndex;
use crate::index::search::ScoredDocument;

/// Damping factor `d`.
pub const DAMPING_FACTOR: f64 = 0.85;

/// Score every page holds before the first iteration.
pub const INITIAL_SCORE: f64 = 1.0;

#[derive(Debug, Clone)]
struct Page {
    incoming: Vec<u64>,
    out_degree: u32,
    score: f64,
}

impl Default for Page {
    fn default() -> Self {
        Page {
            incoming: Vec::new(),
            out_degree: 0,
            score: INITIAL_SCORE,
        }
    }
}

/// Link graph with PageRank scores.
#[derive(Debug, Clone)]
pub struct PageRank {
    pages: BTreeMap<u64, Page>,
    damping: f64,
}

impl Default for PageRank {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRank {
    /// Empty graph with the default damping factor.
    pub fn new() -> Self {
        Self::with_damping(DAMPING_FACTOR)
    }

    /// Empty graph with a custom damping factor.
    pub fn with_damping(damping: f64) -> Self {
        PageRank {
            pages: BTreeMap::new(),
            damping,
        }
    }

    /// Graph built from `(source, target)` edges.
    pub fn from_edges<I: IntoIterator<Item = (u64, u64)>>(edges: I) -> Self {
        let mut graph = Self::new();
        for (source, target) in edges {
            graph.add_edge(source, target);
        }
        graph
    }

    /// Read an edge list: one `source target` pair per line, separated by
    /// whitespace. Blank lines are skipped.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let graph = Self::from_edges(parse_edges(&text)?);
        info!(
            "Loaded link graph {} ({} pages)",
            path.as_ref().display(),
            graph.len()
        );
        Ok(graph)
    }

    /// Add one link. Repeated links count repeatedly.
    pub fn add_edge(&mut self, source: u64, target: u64) {
        self.pages.entry(source).or_default().out_degree += 1;
        self.pages.entry(target).or_default().incoming.push(source);
    }

    /// Number of pages in the graph.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether the graph has no pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Run `iterations` rounds of the power iteration.
    pub fn compute(&mut self, iterations: usize) {
        for _ in 0..iterations {
            // Share each page passes along every one of its links.
            let shares: BTreeMap<u64, f64> = self
                .pages
                .iter()
                .filter(|(_, page)| page.out_degree > 0)
                .map(|(id, page)| (*id, page.score / page.out_degree as f64))
                .collect();

            for page in self.pages.values_mut() {
                let incoming: f64 = page
                    .incoming
                    .iter()
                    .filter_map(|source| shares.get(source))
                    .sum();
                page.score = (1.0 - self.damping) + self.damping * incoming;
            }
        }
        debug!(
            "PageRank: {iterations} iterations over {} pages",
            self.pages.len()
        );
    }

    /// Score of one page.
    pub fn score(&self, id: u64) -> Option<f64> {
        self.pages.get(&id).map(|page| page.score)
    }

    /// All scores, highest first. Ties are ordered by ascending id.
    pub fn scores(&self) -> Vec<(u64, f64)> {
        let mut scores: Vec<(u64, f64)> = self
            .pages
            .iter()
            .map(|(id, page)| (*id, page.score))
            .collect();
        scores.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scores
    }
}

/// Parse a whitespace-separated edge list.
pub fn parse_edges(text: &str) -> Result<Vec<(u64, u64)>> {
    let mut edges = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let mut fields = line.split_whitespace();
        let (Some(source), Some(target)) = (fields.next(), fields.next()) else {
            if line.trim().is_empty() {
                continue;
            }
            return Err(PagedexError::precondition(format!(
                "line {}: expected `source target`",
                number + 1
            )));
        };
        let parse = |field: &str| {
            field.parse::<u64>().map_err(|e| {
                PagedexError::precondition(format!("line {}: bad page id {field:?}: {e}", number + 1))
            })
        };
        edges.push((parse(source)?, parse(target)?));
    }
    Ok(edges)
}

/// External id of a document: its first line parsed as an integer.
pub fn first_line_id(document: &Document) -> Option<u64> {
    document.first_line().trim().parse().ok()
}

/// Rank every TF-IDF match of `query` by `tfidf + weight · pagerank` and
/// keep the best `top_k`.
///
/// `doc_id_of` maps a document to its page id; documents without an id, or
/// whose id is not in the graph, get a PageRank of 0.
pub fn combined_search<S, F>(
    index: &InvertedIndex,
    ranks: &PageRank,
    query: &[S],
    top_k: usize,
    weight: f64,
    doc_id_of: F,
) -> Result<Vec<ScoredDocument>>
where
    S: AsRef<str>,
    F: Fn(&Document) -> Option<u64>,
{
    let mut results: Vec<ScoredDocument> = index
        .search_tf_idf(query, None)?
        .into_iter()
        .map(|hit| {
            let rank = doc_id_of(&hit.document)
                .and_then(|id| ranks.score(id))
                .unwrap_or(0.0);
            ScoredDocument {
                score: hit.score + weight * rank,
                document: hit.document,
            }
        })
        .collect();

    // Stable: equal combined scores keep their TF-IDF order.
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(top_k);
    Ok(results)
}
