//! Document scanning and incremental reindexing.
//!
//! [`scan_documents`] walks the docs root and loads every file matching
//! the configured globs. [`Indexer`] diffs the scan against the store's
//! recorded content hashes and re-embeds only documents whose content
//! actually changed; unchanged documents cost zero embedding calls.
//! Each document is chunked, embedded in batches, and written through
//! one [`VectorStore::replace_document`] transaction, so a failure
//! mid-run leaves every other document intact.

use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::path::Path;
use walkdir::WalkDir;

use crate::chunk::chunk_document;
use crate::config::{Config, DocsConfig};
use crate::embedding::{create_embedder, Embedder};
use crate::error::{Error, Result};
use crate::models::{Document, IndexEntry, ReindexReport};
use crate::store::VectorStore;

/// Walk the docs root and load every matching document.
///
/// Returns the documents sorted by id, plus `(id, error)` pairs for
/// files that matched the globs but could not be read (non-UTF-8,
/// permission errors). Unreadable files never abort the scan.
pub fn scan_documents(config: &DocsConfig) -> Result<(Vec<Document>, Vec<(String, String)>)> {
    let include = build_globset(&config.include_globs)?;
    let exclude = build_globset(&config.exclude_globs)?;

    let mut documents = Vec::new();
    let mut failures = Vec::new();

    for entry in WalkDir::new(&config.root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("scan error under {}: {}", config.root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = match entry.path().strip_prefix(&config.root) {
            Ok(r) => r,
            Err(_) => continue,
        };
        if !include.is_match(rel) || exclude.is_match(rel) {
            continue;
        }

        let id = rel.to_string_lossy().replace('\\', "/");
        match load_document(entry.path(), &id) {
            Ok(doc) => documents.push(doc),
            Err(e) => {
                tracing::warn!(document = %id, "failed to read: {}", e);
                failures.push((id, e.to_string()));
            }
        }
    }

    documents.sort_by(|a, b| a.id.cmp(&b.id));
    Ok((documents, failures))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::Config(format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("invalid glob set: {}", e)))
}

fn load_document(path: &Path, id: &str) -> Result<Document> {
    let body = std::fs::read_to_string(path)?;

    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    let content_hash = format!("{:x}", hasher.finalize());

    let modified_at = std::fs::metadata(path)?
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    Ok(Document {
        id: id.to_string(),
        path: path.to_path_buf(),
        body,
        modified_at,
        content_hash,
    })
}

/// What a reindex run would do, computed by diffing the filesystem scan
/// against the store's recorded content hashes.
pub struct ReindexPlan {
    /// Documents to (re)embed, with whether each is new to the index.
    pub to_index: Vec<(Document, bool)>,
    pub unchanged: u64,
    /// Indexed documents whose source file no longer exists.
    pub removed: Vec<String>,
    /// Documents that could not be read during the scan.
    pub failed: Vec<(String, String)>,
}

impl ReindexPlan {
    pub fn added(&self) -> u64 {
        self.to_index.iter().filter(|(_, is_new)| *is_new).count() as u64
    }

    pub fn updated(&self) -> u64 {
        self.to_index.iter().filter(|(_, is_new)| !*is_new).count() as u64
    }
}

/// Drives incremental reindexing against one store and embedder.
pub struct Indexer<'a> {
    store: &'a VectorStore,
    embedder: &'a dyn Embedder,
    config: &'a Config,
}

impl<'a> Indexer<'a> {
    pub fn new(store: &'a VectorStore, embedder: &'a dyn Embedder, config: &'a Config) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Diff the filesystem against the index without writing anything.
    ///
    /// Fails with [`Error::ModelMismatch`] when the index was built
    /// with a different embedding model, unless `force` is set.
    pub async fn plan(&self, force: bool) -> Result<ReindexPlan> {
        if let Some(indexed) = self.store.embedding_model().await? {
            if indexed != self.embedder.model_name() && !force {
                return Err(Error::ModelMismatch {
                    indexed,
                    configured: self.embedder.model_name().to_string(),
                });
            }
        }

        let (documents, failed) = scan_documents(&self.config.docs)?;
        let indexed_hashes = self.store.document_hashes().await?;

        // Unreadable files stay in the index; only files that are gone
        // from disk count as removed.
        let scanned: std::collections::BTreeSet<String> = documents
            .iter()
            .map(|d| d.id.clone())
            .chain(failed.iter().map(|(id, _)| id.clone()))
            .collect();
        let removed: Vec<String> = indexed_hashes
            .keys()
            .filter(|id| !scanned.contains(*id))
            .cloned()
            .collect();

        let mut to_index = Vec::new();
        let mut unchanged = 0u64;
        for doc in documents {
            match indexed_hashes.get(&doc.id) {
                Some(hash) if *hash == doc.content_hash && !force => unchanged += 1,
                Some(_) => to_index.push((doc, false)),
                None => to_index.push((doc, true)),
            }
        }

        Ok(ReindexPlan {
            to_index,
            unchanged,
            removed,
            failed,
        })
    }

    /// Execute a full incremental reindex and return the report.
    ///
    /// Per-document failures (embedding errors, chunking errors) are
    /// recorded in the report and do not abort the run.
    pub async fn reindex(&self, force: bool) -> Result<ReindexReport> {
        let prior_model = self.store.embedding_model().await?;
        let plan = self.plan(force).await?;
        let mut report = ReindexReport {
            unchanged: plan.unchanged,
            failed: plan.failed,
            ..ReindexReport::default()
        };

        for (doc, is_new) in &plan.to_index {
            match self.index_document(doc).await {
                Ok(chunks) => {
                    tracing::info!(document = %doc.id, chunks, "indexed");
                    if *is_new {
                        report.added += 1;
                    } else {
                        report.updated += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(document = %doc.id, "indexing failed: {}", e);
                    report.failed.push((doc.id.clone(), e.to_string()));
                }
            }
        }

        for id in &plan.removed {
            self.store.delete_by_document(id).await?;
            report.removed += 1;
        }

        // On a model switch, entries of documents that failed to
        // re-embed still hold vectors from the old model. They must
        // not survive behind the new model identifier.
        let switched = prior_model
            .as_deref()
            .map_or(false, |m| m != self.embedder.model_name());
        if switched {
            for (id, _) in &report.failed {
                self.store.delete_by_document(id).await?;
            }
        }

        self.store
            .set_embedding_model(self.embedder.model_name())
            .await?;

        Ok(report)
    }

    /// Chunk, embed, and atomically store one document. Returns the
    /// number of chunks written.
    async fn index_document(&self, doc: &Document) -> Result<u64> {
        let chunks = chunk_document(doc, &self.config.chunking)?;

        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.config.embedding.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            for (chunk, vector) in batch.iter().zip(vectors) {
                entries.push(IndexEntry {
                    chunk: chunk.clone(),
                    vector,
                });
            }
        }

        self.store.replace_document(doc, &entries).await
    }
}

/// Run `dqa reindex` against the configured store and embedder.
pub async fn run_reindex(config: &Config, force: bool, dry_run: bool) -> Result<()> {
    let store = VectorStore::open(&config.db.path).await?;
    let embedder = create_embedder(&config.embedding)?;
    let indexer = Indexer::new(&store, embedder.as_ref(), config);

    if dry_run {
        let plan = indexer.plan(force).await?;
        println!("reindex (dry-run):");
        println!("  new:       {}", plan.added());
        println!("  changed:   {}", plan.updated());
        println!("  unchanged: {}", plan.unchanged);
        println!("  removed:   {}", plan.removed.len());
        for (id, err) in &plan.failed {
            println!("  unreadable: {} ({})", id, err);
        }
        store.close().await;
        return Ok(());
    }

    let report = indexer.reindex(force).await?;
    println!("reindex:");
    println!("  added:     {}", report.added);
    println!("  updated:   {}", report.updated);
    println!("  removed:   {}", report.removed);
    println!("  unchanged: {}", report.unchanged);
    if !report.failed.is_empty() {
        println!("  failed:    {}", report.failed.len());
        for (id, err) in &report.failed {
            println!("    {} ({})", id, err);
        }
    }
    println!("ok");

    store.close().await;
    Ok(())
}
