//! Query evaluation over the flushed segments.
//!
//! Every query visits segments from oldest to newest. Boolean and phrase
//! results come out in segment order and then ascending local id; TF-IDF
//! results are ordered by score.

use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashMap;
use log::debug;

use crate::document::Document;
use crate::error::{PagedexError, Result};
use crate::index::collector::{ScoredHit, TopDocsCollector};
use crate::index::manager::InvertedIndex;

/// A document with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    /// The matching document.
    pub document: Document,
    /// Cosine similarity between the document and the query.
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BooleanOperator {
    And,
    Or,
}

impl InvertedIndex {
    /// Documents containing every term of `keyword` after analysis.
    pub fn search_query(&self, keyword: &str) -> Result<Vec<Document>> {
        if keyword.is_empty() {
            return Ok(Vec::new());
        }
        let terms = self.analyze(keyword)?;
        self.search_boolean(&terms, BooleanOperator::And)
    }

    /// Documents containing every keyword.
    ///
    /// An empty list, or any empty keyword, matches nothing.
    pub fn search_and_query<S: AsRef<str>>(&self, keywords: &[S]) -> Result<Vec<Document>> {
        if keywords.is_empty() || keywords.iter().any(|k| k.as_ref().is_empty()) {
            return Ok(Vec::new());
        }
        let terms = self.analyze_all(keywords)?;
        self.search_boolean(&terms, BooleanOperator::And)
    }

    /// Documents containing at least one keyword.
    pub fn search_or_query<S: AsRef<str>>(&self, keywords: &[S]) -> Result<Vec<Document>> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        let terms = self.analyze_all(keywords)?;
        self.search_boolean(&terms, BooleanOperator::Or)
    }

    fn analyze_all<S: AsRef<str>>(&self, keywords: &[S]) -> Result<Vec<String>> {
        let mut terms = Vec::new();
        for keyword in keywords {
            terms.extend(self.analyze(keyword.as_ref())?);
        }
        Ok(terms)
    }

    fn search_boolean(&self, terms: &[String], operator: BooleanOperator) -> Result<Vec<Document>> {
        let mut results = Vec::new();
        if terms.is_empty() {
            return Ok(results);
        }

        for segment in 0..self.num_segments() {
            let reader = self.open_segment(segment)?;
            let slots = reader.lookup_all(terms.iter().map(String::as_str))?;

            let mut matched: Option<BTreeSet<u32>> = None;
            for term in terms {
                let ids: BTreeSet<u32> = match slots.get(term) {
                    Some(slot) => reader.read_doc_ids(slot)?.into_iter().collect(),
                    None => BTreeSet::new(),
                };
                matched = Some(match (matched, operator) {
                    (None, _) => ids,
                    (Some(acc), BooleanOperator::And) => acc.intersection(&ids).copied().collect(),
                    (Some(mut acc), BooleanOperator::Or) => {
                        acc.extend(ids);
                        acc
                    }
                });
            }

            let matched = matched.unwrap_or_default();
            debug!(
                "Segment {segment}: {} matches for {operator:?} over {} terms",
                matched.len(),
                terms.len()
            );
            for id in matched {
                results.push(reader.document(id)?);
            }
        }
        Ok(results)
    }

    /// Documents containing the analyzed phrase as consecutive terms.
    ///
    /// Fails with [`PagedexError::UnsupportedOperation`] on a non-positional
    /// index.
    pub fn search_phrase_query<S: AsRef<str>>(&self, phrase: &[S]) -> Result<Vec<Document>> {
        if !self.is_positional() {
            return Err(PagedexError::unsupported(
                "phrase queries require a positional index",
            ));
        }
        let mut results = Vec::new();
        if phrase.is_empty() {
            return Ok(results);
        }

        let joined = phrase
            .iter()
            .map(|w| w.as_ref())
            .collect::<Vec<_>>()
            .join(" ");
        let terms = self.analyze(&joined)?;
        if terms.is_empty() {
            return Ok(results);
        }

        for segment in 0..self.num_segments() {
            let reader = self.open_segment(segment)?;
            let slots = reader.lookup_all(terms.iter().map(String::as_str))?;
            if terms.iter().any(|t| !slots.contains_key(t)) {
                continue;
            }

            // Per candidate document, the anchor positions of the first term
            // that are still consistent with every term checked so far.
            let mut candidates: BTreeMap<u32, Vec<u32>> = reader.read_positions(&slots[&terms[0]])?;
            for (offset, term) in terms.iter().enumerate().skip(1) {
                let next = reader.read_positions(&slots[term])?;
                candidates = candidates
                    .into_iter()
                    .filter_map(|(doc_id, anchors)| {
                        let positions = next.get(&doc_id)?;
                        let anchors: Vec<u32> = anchors
                            .into_iter()
                            .filter(|p| positions.binary_search(&(p + offset as u32)).is_ok())
                            .collect();
                        (!anchors.is_empty()).then_some((doc_id, anchors))
                    })
                    .collect();
                if candidates.is_empty() {
                    break;
                }
            }

            debug!("Segment {segment}: {} phrase matches", candidates.len());
            for doc_id in candidates.keys() {
                results.push(reader.document(*doc_id)?);
            }
        }
        Ok(results)
    }

    /// Rank documents by TF-IDF cosine similarity to the keywords.
    ///
    /// Returns at most `top_k` documents (all matches when `None`), best
    /// first. Documents that share no weighted term with the query are left
    /// out.
    pub fn search_tf_idf<S: AsRef<str>>(
        &self,
        keywords: &[S],
        top_k: Option<usize>,
    ) -> Result<Vec<ScoredDocument>> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        let joined = keywords
            .iter()
            .map(|w| w.as_ref())
            .collect::<Vec<_>>()
            .join(" ");
        let tokens = self.analyze(&joined)?;
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_counts: BTreeMap<&str, f64> = BTreeMap::new();
        for token in &tokens {
            *query_counts.entry(token.as_str()).or_default() += 1.0;
        }

        // Pass 1: global document frequencies.
        let mut total_documents = 0u64;
        let mut frequencies: AHashMap<String, u64> = AHashMap::new();
        for segment in 0..self.num_segments() {
            let reader = self.open_segment(segment)?;
            total_documents += reader.num_documents() as u64;
            for (term, slot) in reader.lookup_all(query_counts.keys().copied())? {
                *frequencies.entry(term).or_default() += slot.doc_count as u64;
            }
        }

        let idf: AHashMap<&str, f64> = query_counts
            .keys()
            .map(|&term| {
                let df = frequencies.get(term).copied().unwrap_or(0);
                let idf = if df == 0 {
                    0.0
                } else {
                    (total_documents as f64 / df as f64).log10()
                };
                (term, idf)
            })
            .collect();
        let query_weights: AHashMap<&str, f64> = query_counts
            .iter()
            .map(|(&term, &count)| (term, count * idf[term]))
            .collect();

        // Pass 2: score per segment.
        let mut collector = TopDocsCollector::new(top_k);
        for segment in 0..self.num_segments() {
            let reader = self.open_segment(segment)?;
            let slots = reader.lookup_all(query_counts.keys().copied())?;

            let mut dot: BTreeMap<u32, f64> = BTreeMap::new();
            let mut length: BTreeMap<u32, f64> = BTreeMap::new();
            for (term, slot) in &slots {
                let term_idf = idf[term.as_str()];
                let weight = query_weights[term.as_str()];
                for entry in reader.read_posting_list(slot)? {
                    let tf_idf = entry.frequency as f64 * term_idf;
                    *dot.entry(entry.doc_id).or_default() += tf_idf * weight;
                    *length.entry(entry.doc_id).or_default() += tf_idf * tf_idf;
                }
            }

            for (doc_id, dot) in dot {
                let length = length.get(&doc_id).copied().unwrap_or(0.0);
                if length == 0.0 {
                    continue;
                }
                collector.collect(ScoredHit {
                    segment,
                    doc_id,
                    score: dot / length.sqrt(),
                });
            }
        }

        debug!(
            "TF-IDF over {} documents: {} scored",
            total_documents,
            collector.total_hits()
        );

        let mut results = Vec::new();
        for hit in collector.into_sorted_vec() {
            let reader = self.open_segment(hit.segment)?;
            results.push(ScoredDocument {
                document: reader.document(hit.doc_id)?,
                score: hit.score,
            });
        }
        Ok(results)
    }
}
