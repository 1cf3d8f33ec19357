use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "ngfuzz")]
#[command(
    about = "Generate a protobuf call-sequence schema and a dispatcher harness for fuzzing a Rust crate API.",
    long_about = None
)]
struct Cli {
    /// Target package: a crate directory (with src/) or a single .rs file.
    package: PathBuf,
    /// Output directory for ngolofuzz.proto and fuzz_ng.rs.
    outdir: Option<PathBuf>,
    /// Comma-separated substrings; functions whose name contains one are dropped.
    #[arg(long, default_value = "")]
    exclude: String,
    /// Comma-separated <Recv><fn>.<arg> keys masked with % 0x10001 at call time.
    #[arg(long, default_value = "")]
    limits: String,
}

fn main() -> Result<()> {
    try_main().map_err(|err| {
        eprintln!("{err:#}");
        err
    })
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let outdir = match cli.outdir {
        Some(dir) => dir,
        None => {
            eprintln!("Defaulting to output directory fuzz_ng");
            PathBuf::from("fuzz_ng")
        }
    };
    ngfuzz_core::generate::package_to_fuzzer(&cli.package, &outdir, &cli.exclude, &cli.limits)
}
