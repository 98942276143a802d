//! Command line entrypoint.
//!
//! ```sh
//! kgx-edges --file edges.tsv --collection nodes --output edges_import.tsv
//! kgx-edges --file edges.tsv --threads 8 --segments-dir out/
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use kgx_edges::config::ConvertOptions;
use kgx_edges::execution::{ConversionEngine, TracingObserver};
use kgx_edges::ConvertResult;

#[derive(Parser, Debug)]
#[command(about = "Convert a KGX edge TSV into a graph-database edge import file")]
struct Args {
    /// The input TSV file in KGX format [default: file.tsv].
    #[arg(long)]
    file: Option<PathBuf>,

    /// The collection the _from and _to nodes in the edges are in [default: nodes].
    #[arg(long)]
    collection: Option<String>,

    /// Number of threads (and output segments) to use for conversion [default: 1].
    #[arg(long)]
    threads: Option<usize>,

    /// The file to place the converted data in, when not partitioning [default: output.tsv].
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write `headers.tsv` and `<n>.tsv` segments into this directory. With more than one thread
    /// and no directory, segments go to the current directory.
    #[arg(long)]
    segments_dir: Option<PathBuf>,

    /// JSON file with conversion options. Flags given on the command line override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop the remaining workers as soon as one segment fails.
    #[arg(long, default_value_t = false)]
    fail_fast: bool,

    /// Print the run summary as JSON on stdout.
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl Args {
    fn into_options(self) -> ConvertResult<ConvertOptions> {
        let mut opts = match &self.config {
            Some(path) => ConvertOptions::from_json_path(path)?,
            None => ConvertOptions::default(),
        };
        if let Some(file) = self.file {
            opts.input = file;
        }
        if let Some(collection) = self.collection {
            opts.collection = collection;
        }
        if let Some(threads) = self.threads {
            opts.threads = threads;
        }
        if let Some(output) = self.output {
            opts.output = output;
        }
        if self.segments_dir.is_some() {
            opts.segments_dir = self.segments_dir;
        }
        opts.fail_fast |= self.fail_fast;
        Ok(opts)
    }
}

fn run(args: Args) -> ConvertResult<()> {
    let json = args.json;
    let opts = args.into_options()?;
    let engine = ConversionEngine::new(opts)?.with_observer(Arc::new(TracingObserver));

    let summary = engine.convert()?;
    info!(
        rows = summary.rows_written(),
        segments = summary.segments.len(),
        header = %summary.header_path.display(),
        "done"
    );
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(severity = ?e.severity(), "{e}");
            ExitCode::FAILURE
        }
    }
}
