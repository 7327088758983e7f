//! Comparison driver: per-document control flow and checkpointing.
//!
//! For every document the driver pulls that document's spans from each
//! source, preprocesses them, matches every unordered pair of sources, folds
//! the per-document statistics into the run-wide aggregate and decides
//! whether the document goes to the export.

use anyhow::{ensure, Result};
use serde::Serialize;
use tokio::io::AsyncWrite;
use tracing::{debug, info};

use super::matcher::compare_document_spans;
use super::preprocess::{Preprocessor, TypeFilter};
use super::report::ReportWriter;
use super::sampler::ExportSampler;
use super::selection::{Selection, SelectionPolicy};
use super::stats::Stats;
use crate::adapters::{DocumentEntry, DocumentSource, Exporter, SpanSource};
use crate::domain::{source_pairs, Document, OffsetUnit, Span, TextIndex};

/// Default trim ratio applied at checkpoints
pub const DEFAULT_TRIM_RATIO: u64 = 10_000;

/// Default number of documents between progress messages
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

/// Run-wide comparison settings
#[derive(Debug, Clone)]
pub struct ComparisonOptions {
    /// Count overlapping spans of the same type as matches
    pub overlap: bool,

    pub offset_unit: OffsetUnit,

    pub types: TypeFilter,

    /// Write the report, flush the export and trim every N documents
    pub checkpoint_interval: Option<u64>,

    pub trim_ratio: u64,

    /// Stop after this many documents
    pub max_documents: Option<u64>,

    pub progress_interval: u64,

    pub selection: SelectionPolicy,
}

impl Default for ComparisonOptions {
    fn default() -> Self {
        Self {
            overlap: false,
            offset_unit: OffsetUnit::default(),
            types: TypeFilter::allow_all(),
            checkpoint_interval: None,
            trim_ratio: DEFAULT_TRIM_RATIO,
            max_documents: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            selection: SelectionPolicy::default(),
        }
    }
}

/// Result of processing a single document
#[derive(Debug, Clone, Default)]
pub struct DocumentOutcome {
    /// At least one compared pair selected the document
    pub selected: bool,

    /// Preprocessed spans of all sources, in source order
    pub spans: Vec<Span>,
}

/// Counters describing a finished (or interrupted) run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub documents: u64,
    pub selected: u64,
    pub exported: u64,
    pub malformed_documents: usize,
    pub malformed_spans: usize,
    pub text_mismatches: usize,
    pub filtered_spans: usize,
    pub merged_duplicates: usize,
    pub checkpoints: u64,
}

/// Compares N span sources over one document stream
pub struct Comparison {
    options: ComparisonOptions,
    names: Vec<String>,
    preprocessor: Preprocessor,
    stats: Stats,
    sampler: ExportSampler,
    report: ReportWriter,
    summary: RunSummary,
}

impl Comparison {
    /// `names` are the display names of the sources, in the order their
    /// spans will be supplied
    pub fn new(
        options: ComparisonOptions,
        names: Vec<String>,
        sampler: ExportSampler,
        report: ReportWriter,
    ) -> Self {
        let mut stats = Stats::new();
        for (i, j) in source_pairs(names.len()) {
            stats.merge(&Stats::for_pair(&names[i], &names[j]));
        }

        Self {
            preprocessor: Preprocessor::new(options.offset_unit, options.types.clone()),
            options,
            names,
            stats,
            sampler,
            report,
            summary: RunSummary::default(),
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Compare the spans of one document, one list per source.
    ///
    /// Updates the aggregate statistics; does not touch the sampler or any
    /// output.
    pub fn process_document(&mut self, doc: &Document, per_source: Vec<Vec<Span>>) -> DocumentOutcome {
        let index = TextIndex::new(&doc.text, self.options.offset_unit);

        let mut prepared = Vec::with_capacity(per_source.len());
        for spans in per_source {
            let result = self.preprocessor.prepare(&doc.id, &index, spans);
            self.summary.text_mismatches += result.mismatched;
            self.summary.filtered_spans += result.filtered;
            self.summary.merged_duplicates += result.merged;
            prepared.push(result.spans);
        }

        let mut selected = false;
        for (i, j) in source_pairs(prepared.len()) {
            let doc_stats = compare_document_spans(
                &doc.id,
                &self.names[i],
                &self.names[j],
                &prepared[i],
                &prepared[j],
                self.options.overlap,
            );
            self.stats.merge(&doc_stats);

            match self.options.selection.evaluate(&doc_stats, index.len()) {
                Selection::Selected => selected = true,
                Selection::Excluded(reason) => debug!(
                    doc_id = %doc.id,
                    gold = %self.names[i],
                    predicted = %self.names[j],
                    reason = reason.as_str(),
                    "document not selected"
                ),
            }
        }

        DocumentOutcome {
            selected,
            spans: prepared.into_iter().flatten().collect(),
        }
    }

    /// Run over the whole document stream, writing the final report at the end.
    ///
    /// `sources` must be in the same order as the names given to
    /// [`Comparison::new`]. Selected documents are sampled into `export` when
    /// one is given.
    pub async fn run<D, W>(
        &mut self,
        documents: &mut D,
        sources: &mut [Box<dyn SpanSource>],
        mut export: Option<&mut Exporter<W>>,
    ) -> Result<RunSummary>
    where
        D: DocumentSource + ?Sized,
        W: AsyncWrite + Unpin + Send,
    {
        ensure!(
            sources.len() == self.names.len(),
            "{} span sources given for {} source names",
            sources.len(),
            self.names.len()
        );

        loop {
            if let Some(max) = self.options.max_documents.filter(|&max| max > 0) {
                if self.summary.documents >= max {
                    info!("reached maximum of {} documents", max);
                    break;
                }
            }

            let Some(entry) = documents.next_document().await? else {
                break;
            };

            let doc = match entry {
                DocumentEntry::Document(doc) => doc,
                DocumentEntry::Malformed { id } => {
                    // keep the span streams aligned with the document stream
                    for source in sources.iter_mut() {
                        let drained = source.document_spans(&id).await?;
                        debug!(
                            doc_id = %id,
                            source = source.name(),
                            drained = drained.len(),
                            "skipped spans of malformed document"
                        );
                    }
                    continue;
                }
            };

            let mut per_source = Vec::with_capacity(sources.len());
            for source in sources.iter_mut() {
                per_source.push(source.document_spans(&doc.id).await?);
            }

            let outcome = self.process_document(&doc, per_source);
            if outcome.selected {
                self.summary.selected += 1;
                if let Some(exporter) = export.as_deref_mut() {
                    if self.sampler.keep() {
                        exporter.write_document(&doc, &outcome.spans).await?;
                        self.summary.exported += 1;
                    }
                }
            }

            self.summary.documents += 1;
            let count = self.summary.documents;
            if self.options.progress_interval > 0 && count % self.options.progress_interval == 0 {
                info!(documents = count, "processed {} documents", count);
            }
            if let Some(interval) = self.options.checkpoint_interval {
                if interval > 0 && count % interval == 0 {
                    self.checkpoint(export.as_deref_mut()).await?;
                }
            }
        }

        self.summary.malformed_documents = documents.malformed();
        self.summary.malformed_spans = sources.iter().map(|s| s.malformed()).sum();

        self.report.write(&self.stats).await?;
        if let Some(exporter) = export {
            exporter.flush().await?;
        }

        info!(
            documents = self.summary.documents,
            selected = self.summary.selected,
            exported = self.summary.exported,
            malformed_documents = self.summary.malformed_documents,
            malformed_spans = self.summary.malformed_spans,
            text_mismatches = self.summary.text_mismatches,
            "comparison finished"
        );

        Ok(self.summary.clone())
    }

    /// Write the report, flush the export and trim the aggregate
    async fn checkpoint<W>(&mut self, export: Option<&mut Exporter<W>>) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.report.write(&self.stats).await?;
        if let Some(exporter) = export {
            exporter.flush().await?;
        }
        self.stats.trim(self.options.trim_ratio);
        self.summary.checkpoints += 1;
        info!(
            documents = self.summary.documents,
            checkpoints = self.summary.checkpoints,
            "checkpoint written"
        );
        Ok(())
    }
}
