//! Command-line interface for tagcompare.
//!
//! Provides commands for comparing span sources, checking a span file
//! against its documents, and showing the resolved configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::fs::File;
use tokio::io::{BufReader, BufWriter};

use crate::adapters::{DocumentReader, Exporter, SpanReader, SpanSource};
use crate::config::{load_settings, Overrides, Settings};
use crate::core::{check_spans, Comparison, ExportSampler, ReportWriter, RunSummary};
use crate::domain::OffsetUnit;

/// tagcompare - agreement statistics between annotation sources
#[derive(Parser, Debug)]
#[command(name = "tagcompare")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: .tagcompare/config.yaml in this or a parent directory)
    #[arg(long, global = true, env = "TAGCOMPARE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare two or more tag files over a document corpus
    Compare(CompareArgs),

    /// Check that span texts in a tag file match the documents
    Check {
        /// Documents in database_documents.tsv format
        docs: PathBuf,

        /// Tagged strings in all_matches.tsv format
        tags: PathBuf,

        /// Offsets are character- instead of byte-based. Byte offsets are
        /// the default here as for `compare`, unlike the older checkspans
        /// script, which counted characters unless told otherwise
        #[arg(long)]
        char_offsets: bool,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    /// Apply overlap matching (default: exact)
    #[arg(long)]
    pub overlap: bool,

    /// Offsets are character- instead of byte-based
    #[arg(long)]
    pub char_offsets: bool,

    /// Random seed for export sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Save results, flush the export and trim statistics every N documents
    #[arg(long)]
    pub save_interval: Option<u64>,

    /// Probability of exporting a selected document
    #[arg(long)]
    pub sample: Option<f64>,

    /// Stop after N documents (0 means no limit)
    #[arg(long)]
    pub max_docs: Option<u64>,

    /// Only compare spans of these types (comma-separated, case-insensitive)
    #[arg(long)]
    pub types: Option<String>,

    /// Results report path (default: comparison-results.txt)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Source names (comma-separated, one per tag file)
    #[arg(long)]
    pub names: Option<String>,

    /// Exported documents path (default: comparison-docs.tsv)
    #[arg(long)]
    pub doc_output: Option<PathBuf>,

    /// Exported tags path (default: comparison-tags.tsv)
    #[arg(long)]
    pub tag_output: Option<PathBuf>,

    /// Do not write the document/tag export
    #[arg(long)]
    pub no_export: bool,

    /// Also write a JSON summary to this path
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Entries listed per table and direction in the report
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Trim table entries rarer than max/RATIO at checkpoints
    #[arg(long)]
    pub trim_ratio: Option<u64>,

    /// Documents in database_documents.tsv format
    pub docs: PathBuf,

    /// Tagged strings in all_matches.tsv format
    #[arg(required = true, num_args = 1..)]
    pub tags: Vec<PathBuf>,
}

impl CompareArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            overlap: self.overlap,
            char_offsets: self.char_offsets,
            seed: self.seed,
            checkpoint_interval: self.save_interval,
            trim_ratio: self.trim_ratio,
            sample: self.sample,
            max_documents: self.max_docs,
            types: self.types.clone(),
            names: self.names.clone(),
            output: self.output.clone(),
            doc_output: self.doc_output.clone(),
            tag_output: self.tag_output.clone(),
            no_export: self.no_export,
            summary: self.summary.clone(),
            top_n: self.top_n,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = self.config.as_deref();
        match self.command {
            Commands::Compare(args) => run_compare(config, &args).await,
            Commands::Check {
                docs,
                tags,
                char_offsets,
            } => run_check(&docs, &tags, char_offsets).await,
            Commands::Config => show_config(config),
        }
    }
}

async fn open_reader(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

async fn create_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Compare tag files
async fn run_compare(config: Option<&Path>, args: &CompareArgs) -> Result<()> {
    // Configuration errors surface here, before any input is opened
    let settings = load_settings(config, &args.overrides())?;
    let names = settings.source_names(&args.tags)?;
    let type_names: HashMap<String, String> = settings.type_names.clone().into_iter().collect();

    let mut documents = DocumentReader::new(
        open_reader(&args.docs).await?,
        args.docs.display().to_string(),
    );
    let mut sources: Vec<Box<dyn SpanSource>> = Vec::with_capacity(args.tags.len());
    for (path, name) in args.tags.iter().zip(&names) {
        let reader = SpanReader::new(open_reader(path).await?, path.display().to_string(), name.clone())
            .with_type_names(type_names.clone());
        sources.push(Box::new(reader));
    }

    let report = ReportWriter::new(&settings.output, settings.top_n).with_summary(settings.summary.clone());
    let sampler = ExportSampler::new(settings.seed, settings.sample);
    let mut comparison = Comparison::new(settings.comparison_options(), names, sampler, report);

    let summary = if settings.export {
        let mut exporter = Exporter::new(
            create_writer(&settings.doc_output).await?,
            create_writer(&settings.tag_output).await?,
        );
        comparison
            .run(&mut documents, &mut sources, Some(&mut exporter))
            .await?
    } else {
        comparison
            .run::<_, BufWriter<File>>(&mut documents, &mut sources, None)
            .await?
    };

    print_summary(&summary, &settings);
    Ok(())
}

fn print_summary(summary: &RunSummary, settings: &Settings) {
    eprintln!(
        "Compared {} documents ({} selected, {} exported)",
        summary.documents, summary.selected, summary.exported
    );
    if summary.malformed_documents > 0 || summary.malformed_spans > 0 {
        eprintln!(
            "Skipped {} malformed document records and {} malformed span records",
            summary.malformed_documents, summary.malformed_spans
        );
    }
    if summary.text_mismatches > 0 {
        eprintln!("Dropped {} spans with mismatched text", summary.text_mismatches);
    }
    eprintln!("Results: {}", settings.output.display());
    if settings.export {
        eprintln!(
            "Export:  {}, {}",
            settings.doc_output.display(),
            settings.tag_output.display()
        );
    }
}

/// Check one tag file against the documents
async fn run_check(docs: &Path, tags: &Path, char_offsets: bool) -> Result<()> {
    let unit = if char_offsets {
        OffsetUnit::Char
    } else {
        OffsetUnit::Byte
    };

    let mut documents = DocumentReader::new(open_reader(docs).await?, docs.display().to_string());
    let mut spans = SpanReader::new(open_reader(tags).await?, tags.display().to_string(), "tags");
    let report = check_spans(&mut documents, &mut spans, unit).await?;

    println!("{}", report);
    Ok(())
}

/// Show resolved configuration
fn show_config(config: Option<&Path>) -> Result<()> {
    let settings = load_settings(config, &Overrides::default())?;

    println!(
        "Config file: {}",
        settings
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    print!(
        "{}",
        serde_yaml::to_string(&settings).context("Failed to serialize configuration")?
    );

    Ok(())
}
