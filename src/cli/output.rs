//! Output formatting for CLI commands.

use std::fmt;

use serde::Serialize;

use crate::cli::args::{OutputFormat, PagedexArgs, SearchMode};
use crate::document::Document;
use crate::error::Result;

/// Result of an `index` run.
#[derive(Debug, Serialize)]
pub struct IndexingResult {
    pub index_path: String,
    pub documents_added: usize,
    pub segments: u32,
    pub duration_ms: u64,
}

/// One search hit.
#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub rank: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub text: String,
}

impl SearchHit {
    /// Hit without a score, as returned by boolean and phrase queries.
    pub fn unscored(rank: usize, document: Document) -> Self {
        SearchHit {
            rank,
            score: None,
            text: document.into_text(),
        }
    }

    /// Hit with a relevance score.
    pub fn scored(rank: usize, document: Document, score: f64) -> Self {
        SearchHit {
            rank,
            score: Some(score),
            text: document.into_text(),
        }
    }
}

/// Result of a `search` run.
#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub mode: SearchMode,
    pub query: Vec<String>,
    pub hits: Vec<SearchHit>,
    pub duration_ms: u64,
}

/// Statistics of one segment.
#[derive(Debug, Serialize)]
pub struct SegmentStats {
    pub segment: u32,
    pub documents: u32,
    pub terms: u32,
    pub size_bytes: u64,
}

/// Result of a `stats` run.
#[derive(Debug, Serialize)]
pub struct IndexStats {
    pub index_path: String,
    pub positional: bool,
    pub page_size: usize,
    pub total_documents: u64,
    pub total_size_bytes: u64,
    pub segments: Vec<SegmentStats>,
}

/// Result of a `merge` run.
#[derive(Debug, Serialize)]
pub struct MergeResult {
    pub segments_before: u32,
    pub segments_after: u32,
    pub duration_ms: u64,
}

/// Print `result` in the format selected on the command line.
pub fn output_result<T>(result: &T, args: &PagedexArgs) -> Result<()>
where
    T: Serialize + fmt::Display,
{
    match args.output_format {
        OutputFormat::Human => {
            if args.verbosity() > 0 {
                print!("{result}");
            }
        }
        OutputFormat::Json => {
            let json = if args.pretty {
                serde_json::to_string_pretty(result)?
            } else {
                serde_json::to_string(result)?
            };
            println!("{json}");
        }
    }
    Ok(())
}

impl fmt::Display for IndexingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Indexed {} documents into {} ({} segments) in {} ms",
            self.documents_added, self.index_path, self.segments, self.duration_ms
        )
    }
}

impl fmt::Display for SearchResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} hits for {:?} ({} ms)",
            self.hits.len(),
            self.query.join(" "),
            self.duration_ms
        )?;
        for hit in &self.hits {
            let preview = preview(&hit.text, 72);
            match hit.score {
                Some(score) => writeln!(f, "{:>4}. [{score:.4}] {preview}", hit.rank)?,
                None => writeln!(f, "{:>4}. {preview}", hit.rank)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Index: {}", self.index_path)?;
        writeln!(
            f,
            "  positional: {}, page size: {}",
            self.positional,
            format_bytes(self.page_size as u64)
        )?;
        writeln!(
            f,
            "  {} documents in {} segments, {}",
            self.total_documents,
            self.segments.len(),
            format_bytes(self.total_size_bytes)
        )?;
        for segment in &self.segments {
            writeln!(
                f,
                "  segment_{}: {} documents, {} terms, {}",
                segment.segment,
                segment.documents,
                segment.terms,
                format_bytes(segment.size_bytes)
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for MergeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Merged {} segments into {} in {} ms",
            self.segments_before, self.segments_after, self.duration_ms
        )
    }
}

/// First line of `text`, cut to at most `max_chars` characters.
fn preview(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() <= max_chars {
        line.to_string()
    } else {
        let cut: String = line.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

/// Format bytes into human-readable format.
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let unit = UNITS[unit_index];
    if unit_index == 0 {
        format!("{bytes} {unit}")
    } else {
        format!("{size:.1} {unit}")
    }
}
