//! A command line front end for composing homologies and transcribing
//! features of aligned sequences.
//!
//! ```shell
//! cargo run --release --bin=varscope --features=binaries -- compose a.tsv b.tsv.gz
//! ```
//!
//! Segment files hold one segment per line as four tab-separated, 1-based,
//! inclusive columns: `refStart refEnd queryStart queryEnd`. Blank lines and
//! lines starting with `#` are ignored; files ending in `.gz` are
//! decompressed on the fly.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use clap::Parser;
use clap::Subcommand;
use clap_verbosity_flag::Verbosity;
use flate2::read::GzDecoder;
use noodles::fasta;
use tracing::debug;
use tracing::info;
use tracing_log::AsTrace as _;
use tracing_subscriber::EnvFilter;
use varscope::codon;
use varscope::codon::FeatureLocation;
use varscope::codon::GeneticCode;
use varscope::pipeline;
use varscope::segment::algebra::invert_list;
use varscope::segment::algebra::merge_abutting;
use varscope::segment::algebra::translate_segments;
use varscope::segment::NtQueryAlignedSegment;
use varscope::segment::QueryAlignedSegment;
use varscope::segment::ReferenceBounds as _;
use varscope::segment::ReferenceSegment;
use varscope::variation;
use varscope::variation::TranslationFormat;
use varscope::variation::Variation;

////////////////////////////////////////////////////////////////////////////////////////
// Segment files
////////////////////////////////////////////////////////////////////////////////////////

/// Opens a file, decompressing it if its name ends in `.gz`.
fn open(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;

    let reader: Box<dyn Read> = match path.extension().and_then(|ext| ext.to_str()) {
        Some("gz") => Box::new(GzDecoder::new(file)),
        _ => Box::new(file),
    };

    Ok(Box::new(BufReader::new(reader)))
}

/// Reads a segment file.
fn read_segments(path: &Path) -> Result<Vec<QueryAlignedSegment>> {
    let mut segments = Vec::new();

    for (i, line) in open(path)?.lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields = line
            .split('\t')
            .map(|field| field.trim().parse::<i64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("{}:{}: non-integer field", path.display(), i + 1))?;

        let [ref_start, ref_end, query_start, query_end] = fields[..] else {
            bail!(
                "{}:{}: expected four fields, found {}",
                path.display(),
                i + 1,
                fields.len()
            );
        };

        segments.push(
            QueryAlignedSegment::try_new(ref_start, ref_end, query_start, query_end)
                .with_context(|| format!("{}:{}", path.display(), i + 1))?,
        );
    }

    debug!(path = %path.display(), segments = segments.len(), "read segments");
    Ok(segments)
}

/// Reads every record of a FASTA file, keyed by name.
fn read_fasta(path: &Path) -> Result<HashMap<String, String>> {
    let mut sequences = HashMap::new();

    for result in fasta::reader::Builder
        .build_from_path(path)
        .with_context(|| format!("opening {}", path.display()))?
        .records()
    {
        let record = result.with_context(|| format!("reading {}", path.display()))?;
        let name = String::from_utf8_lossy(record.name()).to_string();

        let bases: &[u8] = record.sequence().as_ref();
        if !bases.is_ascii() {
            bail!("{}: sequence {name} contains non-ASCII bases", path.display());
        }

        let sequence = String::from_utf8_lossy(bases).to_string();
        sequences.insert(name, sequence);
    }

    Ok(sequences)
}

////////////////////////////////////////////////////////////////////////////////////////
// Commands
////////////////////////////////////////////////////////////////////////////////////////

/// Composes a chain of segment files.
///
/// The query axis of each file must be the reference axis of the next. The
/// result relates the reference axis of the first file to the query axis of
/// the last.
#[derive(clap::Args)]
struct ComposeArgs {
    /// The segment files, in chain order.
    #[arg(required = true, num_args = 2..)]
    files: Vec<PathBuf>,

    /// Swap the reference and query axes of the result.
    #[arg(short, long, default_value_t = false)]
    invert: bool,

    /// Join segments that continue each other on both axes.
    #[arg(short, long, default_value_t = false)]
    merge: bool,
}

fn compose(args: &ComposeArgs) -> Result<()> {
    let mut files = args.files.iter();
    let mut segments = match files.next() {
        Some(path) => read_segments(path)?,
        None => bail!("no segment files provided"),
    };

    for path in files {
        segments = translate_segments(&segments, &read_segments(path)?);
    }

    if args.invert {
        segments = invert_list(&segments);
    }

    if args.merge {
        segments = merge_abutting(
            segments,
            QueryAlignedSegment::merged,
            QueryAlignedSegment::abuts_query,
        );
    }

    info!(segments = segments.len(), "composed segments");

    let mut stdout = std::io::stdout().lock();
    for segment in segments {
        writeln!(
            stdout,
            "{}\t{}\t{}\t{}",
            segment.ref_start(),
            segment.ref_end(),
            segment.query_start(),
            segment.query_end()
        )?;
    }

    Ok(())
}

/// Transcribes a feature of a query sequence and optionally scans it for a
/// variation.
#[derive(clap::Args)]
struct TranslateArgs {
    /// A FASTA file containing the query sequence.
    fasta: PathBuf,

    /// The name of the query sequence within the FASTA file.
    query: String,

    /// A segment file relating the feature's reference (reference axis) to
    /// the query (query axis).
    segments: PathBuf,

    /// The first reference nucleotide of the feature.
    #[arg(long)]
    feature_start: i64,

    /// The last reference nucleotide of the feature.
    #[arg(long)]
    feature_end: i64,

    /// The first reference nucleotide of codon 1. Defaults to the feature
    /// start.
    #[arg(long)]
    codon1_start: Option<i64>,

    /// A variation to scan for, as `START-END:PATTERN`.
    #[arg(long)]
    variation: Option<String>,

    /// Scan the variation against nucleotides instead of amino acids.
    #[arg(long, default_value_t = false)]
    nucleotide: bool,
}

/// Parses a `START-END:PATTERN` variation.
fn parse_variation(value: &str, format: TranslationFormat) -> Result<Variation> {
    let Some((range, pattern)) = value.split_once(':') else {
        bail!("invalid variation `{value}`: expected START-END:PATTERN");
    };

    let Some((start, end)) = range.split_once('-') else {
        bail!("invalid variation range `{range}`: expected START-END");
    };

    let start = start.parse().with_context(|| format!("invalid start `{start}`"))?;
    let end = end.parse().with_context(|| format!("invalid end `{end}`"))?;

    Ok(Variation::try_new(
        "reference",
        "feature",
        value,
        start,
        end,
        format,
        pattern,
    )?)
}

fn translate(args: &TranslateArgs) -> Result<()> {
    let sequences = read_fasta(&args.fasta)?;
    let query = match sequences.get(&args.query) {
        Some(query) => query,
        None => bail!("sequence {} not found in {}", args.query, args.fasta.display()),
    };

    let feature = vec![ReferenceSegment::try_new(args.feature_start, args.feature_end)?];
    let codon1_start = args.codon1_start.unwrap_or(args.feature_start);
    let location = FeatureLocation::new("reference", "feature", feature, Some(codon1_start));

    let segments =
        pipeline::restrict_to_feature(&read_segments(&args.segments)?, location.segments());
    info!(
        coverage = pipeline::feature_coverage(&segments, location.segments()),
        "restricted segments to the feature"
    );

    let realized = segments
        .into_iter()
        .map(|segment| NtQueryAlignedSegment::realize(segment, query))
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("realizing query nucleotides")?;

    let code = GeneticCode::standard();
    let amino_acids = codon::transcribe(&code, codon1_start, &realized);

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "codon\trefNt\tqueryNt\taminoAcid")?;

    for labeled in location.label_amino_acids(&amino_acids)? {
        writeln!(
            stdout,
            "{}\t{}\t{}\t{}",
            labeled.codon().label(),
            labeled.codon().nt_start(),
            labeled.query_nt_start(),
            labeled.amino_acid()
        )?;
    }

    if let Some(value) = &args.variation {
        let format = match args.nucleotide {
            true => TranslationFormat::Nucleotide,
            false => TranslationFormat::AminoAcid,
        };

        let variation = parse_variation(value, format)?;
        let result = variation::scan(&variation, &code, Some(codon1_start), &realized)?;

        let status = match (result.sufficient_coverage(), result.present()) {
            (false, _) => "insufficient coverage",
            (true, true) => "present",
            (true, false) => "absent",
        };

        writeln!(stdout, "# variation {}: {status}", variation.name())?;
    }

    Ok(())
}

////////////////////////////////////////////////////////////////////////////////////////
// Main
////////////////////////////////////////////////////////////////////////////////////////

/// The available commands.
#[derive(Subcommand)]
enum Command {
    /// Composes a chain of segment files.
    Compose(ComposeArgs),

    /// Transcribes a feature of a query sequence.
    Translate(TranslateArgs),
}

/// Segment algebra and transcription over aligned sequences.
#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    verbose: Verbosity,
}

fn main() -> Result<()> {
    let args = Args::parse();

    match std::env::var("RUST_LOG") {
        Ok(_) => tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init(),
        Err(_) => tracing_subscriber::fmt()
            .with_max_level(args.verbose.log_level_filter().as_trace())
            .init(),
    };

    match &args.command {
        Command::Compose(args) => compose(args),
        Command::Translate(args) => translate(args),
    }
}
