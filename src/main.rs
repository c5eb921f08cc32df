use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use sapf::repl::repl;
use sapf::vm::{Thread, Vm};
use sapf::write::load_file;

/// A tool for the expression of sound as pure form.
#[derive(Parser, Debug)]
#[command(name = "sapf", version)]
struct Args {
    /// Audio sample rate in Hz (1000..768000)
    #[arg(short = 'r', long = "rate")]
    sample_rate: Option<f64>,

    /// Prelude file to load before the REPL starts
    #[arg(short = 'p', long = "prelude")]
    prelude: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut vm = match args.sample_rate {
        Some(sr) => {
            if !(1000.0..=768000.0).contains(&sr) {
                eprintln!("sample rate out of range.");
                return ExitCode::FAILURE;
            }
            println!("sample rate set to {sr}");
            Vm::with_sample_rate(sr)
        }
        None => Vm::default(),
    };
    vm.recordings_dir = std::env::var_os("SAPF_RECORDINGS").map(PathBuf::from);

    let mut th = Thread::new(Arc::new(vm));

    let prelude = args
        .prelude
        .or_else(|| std::env::var_os("SAPF_PRELUDE").map(PathBuf::from));
    if let Some(path) = prelude {
        if let Err(e) = load_file(&mut th, &path) {
            eprintln!("prelude : {e}");
            return ExitCode::FAILURE;
        }
    }

    let log_path = std::env::var_os("SAPF_LOG").map(PathBuf::from).unwrap_or_else(|| {
        let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
        home.join("sapf-log.txt")
    });

    repl(&mut th, &log_path);
    ExitCode::SUCCESS
}
