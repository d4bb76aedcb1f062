//! Cohort CLI for generating deterministic synthetic members.
//!
//! This binary delegates to `membersim::cohort_cli` for parsing and
//! generation, keeping the CLI behaviour testable without spawning a process.
//! Logs go to stderr and are filtered with `RUST_LOG`.

use std::env;
use std::io::{self, Write};
use std::process::ExitCode;

use membersim::cohort_cli::{CliError, ParseOutcome, parse_args, run, success_message};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> ExitCode {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Err(write_err) = writeln!(io::stderr().lock(), "{err}") {
                drop(write_err);
            }
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> Result<(), CliError> {
    match parse_args(env::args().skip(1))? {
        ParseOutcome::Help => {
            print_usage(io::stdout().lock());
            Ok(())
        }
        ParseOutcome::Options(options) => {
            let summary = run(&options, &mut io::stdout().lock())?;
            write_status(&success_message(&summary));
            Ok(())
        }
    }
}

fn print_usage(mut out: impl Write) {
    let usage = concat!(
        "Usage: membersim-cohort --count <n> [options]\n",
        "\n",
        "Options:\n",
        "  --count <n>            Number of members to generate\n",
        "  --seed <seed>          Master seed (defaults to 42)\n",
        "  --constraints <path>   Cohort constraints JSON file\n",
        "  --output <path>        Write JSON Lines here instead of stdout\n",
        "  -h, --help             Print this help output\n",
    );
    if let Err(err) = out.write_all(usage.as_bytes()) {
        drop(err);
    }
}

fn write_status(message: &str) {
    if let Err(err) = writeln!(io::stderr().lock(), "{message}") {
        drop(err);
    }
}
