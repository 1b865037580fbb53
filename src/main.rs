#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::*;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "inflate-gz", about = "Decompress a gzip file")]
struct Opts {
    /// Compressed input file
    #[structopt(parse(from_os_str))]
    input: PathBuf,

    /// Output file, stdout if not present
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,

    /// Verbose mode (-v, -vv, -vvv, etc)
    #[structopt(short, long, parse(from_occurrences))]
    verbose: usize,

    /// Silence all output
    #[structopt(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let opts = Opts::from_args();

    stderrlog::new()
        .module(module_path!())
        .quiet(opts.quiet)
        .verbosity(opts.verbose)
        .init()?;

    let mut file = File::open(&opts.input)
        .with_context(|| format!("failed to open {}", opts.input.display()))?;
    let original_size = inflate_gz::read_original_size(&mut file)?;
    info!("original size: {} bytes", original_size);

    let input = BufReader::new(file);
    let written = match &opts.output {
        Some(path) => {
            let output = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            inflate_gz::decompress(input, BufWriter::new(output))?
        }
        None => inflate_gz::decompress(input, io::stdout().lock())?,
    };
    info!("decompressed {} bytes", written);

    Ok(())
}
