//! Command implementations for the pagedex CLI.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use log::{debug, info};

use crate::analysis::StandardAnalyzer;
use crate::cli::args::*;
use crate::cli::output::*;
use crate::document::Document;
use crate::error::{PagedexError, Result};
use crate::index::{IndexConfig, IndexManifest, InvertedIndex};
use crate::ranking::{PageRank, combined_search, first_line_id};
use crate::segment::format::SegmentFile;

/// Execute a CLI command.
pub fn execute_command(args: PagedexArgs) -> Result<()> {
    match &args.command {
        Command::Index(index_args) => index_directory(index_args, &args),
        Command::Search(search_args) => search_index(search_args, &args),
        Command::Stats(stats_args) => show_stats(stats_args, &args),
        Command::Merge(merge_args) => merge_index(merge_args, &args),
    }
}

/// Index every regular file of a directory.
fn index_directory(args: &IndexArgs, cli_args: &PagedexArgs) -> Result<()> {
    let start_time = Instant::now();
    let config = indexing_config(args)?;
    let mut index = InvertedIndex::create_or_open(
        &args.index_path,
        Arc::new(StandardAnalyzer::new()?),
        config,
    )?;

    let files = document_files(&args.docs_dir)?;
    info!(
        "Indexing {} files from {}",
        files.len(),
        args.docs_dir.display()
    );
    for path in &files {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read document {}", path.display()))?;
        debug!("Adding {}", path.display());
        index.add_document(Document::new(text))?;
    }
    index.flush()?;

    output_result(
        &IndexingResult {
            index_path: args.index_path.display().to_string(),
            documents_added: files.len(),
            segments: index.num_segments(),
            duration_ms: start_time.elapsed().as_millis() as u64,
        },
        cli_args,
    )
}

/// Configuration for `index`: flags override the existing manifest, which
/// overrides the defaults.
fn indexing_config(args: &IndexArgs) -> Result<IndexConfig> {
    let mut config = match IndexManifest::load(&args.index_path)? {
        Some(manifest) => IndexConfig::default()
            .with_page_size(manifest.page_size)
            .with_positional(manifest.positional || args.positional),
        None => IndexConfig::default().with_positional(args.positional),
    };
    if let Some(page_size) = args.page_size {
        config = config.with_page_size(page_size);
    }
    if let Some(flush_threshold) = args.flush_threshold {
        config = config.with_flush_threshold(flush_threshold);
    }
    if let Some(merge_threshold) = args.merge_threshold {
        config = config.with_merge_threshold(merge_threshold);
    }
    Ok(config)
}

/// Regular files directly inside `dir`, sorted by file name.
fn document_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to list documents in {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Open an index that must already exist, with its stored settings.
fn open_existing(index_path: &Path) -> Result<InvertedIndex> {
    let manifest = IndexManifest::load(index_path)?.ok_or_else(|| {
        PagedexError::precondition(format!("no index found at {}", index_path.display()))
    })?;
    let config = IndexConfig::default()
        .with_page_size(manifest.page_size)
        .with_positional(manifest.positional);
    InvertedIndex::create_or_open(index_path, Arc::new(StandardAnalyzer::new()?), config)
}

/// Run a query.
fn search_index(args: &SearchArgs, cli_args: &PagedexArgs) -> Result<()> {
    let start_time = Instant::now();
    let index = open_existing(&args.index_path)?;

    if args.links.is_some() && args.mode != SearchMode::Tfidf {
        return Err(PagedexError::precondition(
            "--links can only be combined with --mode tfidf",
        ));
    }

    let hits = match args.mode {
        SearchMode::And => unscored(index.search_and_query(&args.query)?),
        SearchMode::Or => unscored(index.search_or_query(&args.query)?),
        SearchMode::Phrase => unscored(index.search_phrase_query(&args.query)?),
        SearchMode::Tfidf => {
            let scored = match &args.links {
                Some(links) => {
                    let mut graph = PageRank::load(links)?;
                    graph.compute(args.iterations);
                    combined_search(
                        &index,
                        &graph,
                        &args.query,
                        args.top_k,
                        args.rank_weight,
                        first_line_id,
                    )?
                }
                None => index.search_tf_idf(&args.query, Some(args.top_k))?,
            };
            scored
                .into_iter()
                .enumerate()
                .map(|(i, hit)| SearchHit::scored(i + 1, hit.document, hit.score))
                .collect()
        }
    };

    output_result(
        &SearchResults {
            mode: args.mode,
            query: args.query.clone(),
            hits,
            duration_ms: start_time.elapsed().as_millis() as u64,
        },
        cli_args,
    )
}

fn unscored(documents: Vec<Document>) -> Vec<SearchHit> {
    documents
        .into_iter()
        .enumerate()
        .map(|(i, doc)| SearchHit::unscored(i + 1, doc))
        .collect()
}

/// Collect per-segment statistics.
fn show_stats(args: &StatsArgs, cli_args: &PagedexArgs) -> Result<()> {
    let index = open_existing(&args.index_path)?;
    let stats = collect_stats(&index)?;
    output_result(&stats, cli_args)
}

fn collect_stats(index: &InvertedIndex) -> Result<IndexStats> {
    let mut segments = Vec::new();
    for segment in 0..index.num_segments() {
        let reader = index.open_segment(segment)?;
        let mut size_bytes = 0;
        for file in SegmentFile::all(index.is_positional()) {
            size_bytes += fs::metadata(reader.files().path(*file))?.len();
        }
        segments.push(SegmentStats {
            segment,
            documents: reader.num_documents(),
            terms: reader.term_count(),
            size_bytes,
        });
    }

    Ok(IndexStats {
        index_path: index.directory().display().to_string(),
        positional: index.is_positional(),
        page_size: index.config().page_size,
        total_documents: segments.iter().map(|s| s.documents as u64).sum(),
        total_size_bytes: segments.iter().map(|s| s.size_bytes).sum(),
        segments,
    })
}

/// Merge all segments pairwise.
fn merge_index(args: &MergeArgs, cli_args: &PagedexArgs) -> Result<()> {
    let start_time = Instant::now();
    let mut index = open_existing(&args.index_path)?;
    let segments_before = index.num_segments();
    index.merge_all_segments()?;

    output_result(
        &MergeResult {
            segments_before,
            segments_after: index.num_segments(),
            duration_ms: start_time.elapsed().as_millis() as u64,
        },
        cli_args,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn run(argv: &[&str]) -> Result<()> {
        let mut full = vec!["pagedex", "-q"];
        full.extend_from_slice(argv);
        execute_command(PagedexArgs::try_parse_from(full).unwrap())
    }

    fn write_docs(dir: &Path, docs: &[(&str, &str)]) {
        for (name, text) in docs {
            fs::write(dir.join(name), text).unwrap();
        }
    }

    #[test]
    fn test_index_then_query() {
        let docs = TempDir::new().unwrap();
        let index_dir = TempDir::new().unwrap();
        write_docs(docs.path(), &[("b.txt", "cat bird"), ("a.txt", "cat dog")]);
        let index_path = index_dir.path().join("idx");
        let index_str = index_path.to_str().unwrap();

        run(&["index", index_str, docs.path().to_str().unwrap(), "--positional"]).unwrap();

        let index = open_existing(&index_path).unwrap();
        assert!(index.is_positional());
        assert_eq!(index.num_segments(), 1);
        // Files are indexed in name order.
        let documents = index.documents().unwrap();
        assert_eq!(documents[0].text(), "cat dog");
        assert_eq!(documents[1].text(), "cat bird");

        run(&["search", index_str, "cat", "dog", "--mode", "phrase"]).unwrap();
        run(&["search", index_str, "bird", "--mode", "tfidf", "-k", "1"]).unwrap();

        let stats = collect_stats(&index).unwrap();
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.segments.len(), 1);
        assert!(stats.total_size_bytes > 0);
    }

    #[test]
    fn test_indexing_config_keeps_manifest() {
        let index_dir = TempDir::new().unwrap();
        let config = IndexConfig::positional().with_page_size(256);
        IndexManifest::from_config(&config)
            .store(index_dir.path())
            .unwrap();

        let args = IndexArgs {
            index_path: index_dir.path().to_path_buf(),
            docs_dir: index_dir.path().to_path_buf(),
            positional: false,
            page_size: None,
            flush_threshold: Some(5),
            merge_threshold: None,
        };
        let resolved = indexing_config(&args).unwrap();
        assert_eq!(resolved.page_size, 256);
        assert!(resolved.positional);
        assert_eq!(resolved.flush_threshold, 5);
    }

    #[test]
    fn test_search_missing_index() {
        let index_dir = TempDir::new().unwrap();
        let missing = index_dir.path().join("missing");
        let err = run(&["search", missing.to_str().unwrap(), "cat"]).unwrap_err();
        assert!(matches!(err, PagedexError::Precondition(_)));
        assert!(!missing.exists());
    }

    #[test]
    fn test_merge_odd_segments_fails() {
        let docs = TempDir::new().unwrap();
        let index_dir = TempDir::new().unwrap();
        write_docs(docs.path(), &[("1", "one"), ("2", "two"), ("3", "three")]);
        let index_str = index_dir.path().to_str().unwrap();

        run(&[
            "index",
            index_str,
            docs.path().to_str().unwrap(),
            "--flush-threshold",
            "1",
        ])
        .unwrap();
        assert!(run(&["merge", index_str]).is_err());
    }

    #[test]
    fn test_links_require_tfidf() {
        let docs = TempDir::new().unwrap();
        let index_dir = TempDir::new().unwrap();
        write_docs(docs.path(), &[("1", "1\ncat")]);
        let index_str = index_dir.path().to_str().unwrap();
        run(&["index", index_str, docs.path().to_str().unwrap()]).unwrap();

        let links = docs.path().join("links");
        fs::write(&links, "1 1\n").unwrap();
        let links_str = links.to_str().unwrap();
        assert!(run(&["search", index_str, "cat", "--links", links_str]).is_err());
        run(&["search", index_str, "cat", "--mode", "tfidf", "--links", links_str]).unwrap();
    }
}
