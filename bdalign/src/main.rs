use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use bdalign::align::{unmapped_sam_line, AlignConfig, AlignerIndex, IndexMeta};
use bdalign::io::{FastaReader, ReadSource};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// 每批读取的 read 数，也是进度日志的间隔
const BATCH_SIZE: usize = 10_000;

#[derive(Parser, Debug)]
#[command(
    name = "bdalign",
    author,
    version,
    about = "Approximate read alignment with a bidirectional FM-index",
    arg_required_else_help = true
)]
struct Cli {
    /// Only log warnings and errors
    #[arg(long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the forward/reverse FM-index of a reference FASTA
    Index {
        /// Reference FASTA file
        reference: String,
        /// Output prefix; the index is written to <prefix>.bdi
        #[arg(short, long, default_value = "ref")]
        output: String,
        /// Suffix array sampling step
        #[arg(long = "sa-step", default_value_t = 32)]
        sa_step: usize,
    },
    /// Align reads (FASTA/FASTQ, or a single --query) and write SAM
    Align {
        /// Index file (.bdi)
        #[arg(short = 'i', long = "index")]
        index: String,
        /// Reads file; format is detected from the first record
        #[arg(required_unless_present = "query", conflicts_with = "query")]
        reads: Option<String>,
        /// Align a single query sequence given on the command line
        #[arg(short = 'q', long = "query")]
        query: Option<String>,
        /// Max edit distance: a fraction of the read length if in (0, 1), an absolute count otherwise
        #[arg(short = 'k', long = "max-edit", default_value_t = 0.04)]
        max_edit: f64,
        /// Max candidate intervals verified per read
        #[arg(long = "max-candidates", default_value_t = 64)]
        max_candidates: usize,
        /// Max text positions located per candidate interval
        #[arg(long = "max-positions", default_value_t = 32)]
        max_positions: usize,
        /// Output SAM path (stdout if omitted)
        #[arg(short, long)]
        out: Option<String>,
        #[arg(short = 't', long = "threads", default_value_t = 1)]
        threads: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Index { reference, output, sa_step } => run_index(&reference, &output, sa_step),
        Commands::Align {
            index,
            reads,
            query,
            max_edit,
            max_candidates,
            max_positions,
            out,
            threads,
        } => {
            let config = AlignConfig { max_edit, max_candidates, max_positions, threads };
            let source = match (reads, query) {
                (_, Some(q)) => ReadSource::single(&q),
                (Some(path), None) => ReadSource::open(&path)?,
                (None, None) => bail!("either a reads file or --query is required"),
            };
            run_align(&index, source, out.as_deref(), &config)
        }
    }
}

fn run_index(reference: &str, output: &str, sa_step: usize) -> Result<()> {
    let fh = File::open(reference).with_context(|| format!("cannot open reference FASTA '{}'", reference))?;
    let records = FastaReader::new(BufReader::new(fh))
        .map(|rec| rec.map(|r| (r.id, r.seq)))
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("cannot parse reference FASTA '{}'", reference))?;
    if records.iter().all(|(_, seq)| seq.is_empty()) {
        bail!("FASTA file '{}' contains no sequence data", reference);
    }
    info!("reference: {} ({} sequences)", reference, records.len());

    let started = Instant::now();
    let mut index = AlignerIndex::build(records, sa_step)
        .with_context(|| format!("cannot build index for '{}'", reference))?;
    index.set_meta(IndexMeta {
        reference_file: Some(reference.to_string()),
        build_args: Some(std::env::args().collect::<Vec<_>>().join(" ")),
        build_timestamp: Some(chrono::Utc::now().to_rfc3339()),
        sa_step,
    });

    let out_path = format!("{}.bdi", output);
    index
        .save_to_file(&out_path)
        .with_context(|| format!("cannot write index to '{}'", out_path))?;
    info!("index saved: {} ({:.2}s)", out_path, started.elapsed().as_secs_f64());
    Ok(())
}

fn run_align(index_path: &str, mut source: ReadSource, out_path: Option<&str>, config: &AlignConfig) -> Result<()> {
    let index = AlignerIndex::load_from_file(index_path)
        .with_context(|| format!("cannot load index '{}'", index_path))?;
    if let Some(ts) = &index.meta.build_timestamp {
        info!("loaded index {} (built {})", index_path, ts);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads.max(1))
        .build()
        .context("cannot start worker threads")?;

    let mut out: Box<dyn Write> = match out_path {
        Some(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("cannot create output '{}'", p))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };
    index.write_sam_header(&mut out)?;

    let started = Instant::now();
    let (mut total, mut mapped) = (0usize, 0usize);
    loop {
        let batch = source.next_batch(BATCH_SIZE)?;
        if batch.is_empty() {
            break;
        }
        let results = pool.install(|| index.align_batch(&batch, config));
        for (read, hits) in batch.iter().zip(&results) {
            if hits.is_empty() {
                writeln!(out, "{}", unmapped_sam_line(read))?;
                continue;
            }
            mapped += 1;
            for (i, hit) in hits.iter().enumerate() {
                writeln!(out, "{}", hit.to_sam_line(read, i > 0))?;
            }
        }
        total += batch.len();
        info!(
            "processed {} reads ({:.0} reads/s)",
            total,
            total as f64 / started.elapsed().as_secs_f64().max(1e-9)
        );
    }
    out.flush()?;

    if total == 0 {
        warn!("no reads in input");
    } else {
        info!("{} / {} reads mapped ({:.1}%)", mapped, total, 100.0 * mapped as f64 / total as f64);
    }
    Ok(())
}
