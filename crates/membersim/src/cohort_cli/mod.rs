//! CLI support for generating member cohorts.
//!
//! The `membersim-cohort` binary delegates to these functions so parsing and
//! generation can be exercised in tests without spawning a process.

mod error;

use std::fmt;
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use tracing::info;

use crate::atomic_io::AtomicFile;
use crate::cohort::{CohortGenerator, CohortProgress};
use crate::constraints::CohortConstraints;
use crate::error::ConstraintsError;
use crate::member::{MemberFactory, SyntheticMember};
use crate::seed_manager::DEFAULT_MASTER_SEED;

pub use error::CliError;

/// Parsed options for the cohort CLI.
#[derive(Debug, Clone)]
pub struct Options {
    count: usize,
    seed: Option<u64>,
    constraints_path: Option<Utf8PathBuf>,
    output_path: Option<Utf8PathBuf>,
}

impl Options {
    /// Returns the number of members requested.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Returns the master seed, falling back to [`DEFAULT_MASTER_SEED`].
    ///
    /// # Example
    ///
    /// ```
    /// use membersim::cohort_cli::{ParseOutcome, parse_args};
    ///
    /// let args = vec!["--count".to_owned(), "5".to_owned()];
    /// let ParseOutcome::Options(options) = parse_args(args.into_iter()).expect("parse") else {
    ///     panic!("expected options");
    /// };
    ///
    /// assert_eq!(options.seed(), 42);
    /// ```
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed.unwrap_or(DEFAULT_MASTER_SEED)
    }

    /// Returns the output file, or `None` when writing to stdout.
    #[must_use]
    pub fn output_path(&self) -> Option<&Utf8Path> {
        self.output_path.as_deref()
    }
}

/// Outcome of parsing CLI arguments.
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    /// Show help output and exit successfully.
    Help,
    /// Continue with the parsed options.
    Options(Options),
}

/// Result of a cohort run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Members written.
    pub completed: usize,
    /// Members that failed to generate.
    pub failed: usize,
    /// Master seed used for the run.
    pub seed: u64,
    /// Output file, or `None` for stdout.
    pub output: Option<Utf8PathBuf>,
}

/// Parses CLI arguments into run options.
///
/// # Errors
///
/// Returns [`CliError`] when `--count` is missing, a flag lacks its value,
/// or a number cannot be parsed.
///
/// # Example
///
/// ```
/// use membersim::cohort_cli::{ParseOutcome, parse_args};
///
/// let args = vec![
///     "--count".to_owned(),
///     "250".to_owned(),
///     "--seed".to_owned(),
///     "7".to_owned(),
/// ];
///
/// let outcome = parse_args(args.into_iter()).expect("parse args");
/// assert!(matches!(outcome, ParseOutcome::Options(_)));
/// ```
pub fn parse_args<I>(mut args: I) -> Result<ParseOutcome, CliError>
where
    I: Iterator<Item = String>,
{
    let mut count: Option<usize> = None;
    let mut seed: Option<u64> = None;
    let mut constraints_path: Option<Utf8PathBuf> = None;
    let mut output_path: Option<Utf8PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(ParseOutcome::Help),
            "--count" => {
                let value = next_value(&mut args, "--count")?;
                count = Some(parse_number(&value, "--count")?);
            }
            "--seed" => {
                let value = next_value(&mut args, "--seed")?;
                seed = Some(parse_number(&value, "--seed")?);
            }
            "--constraints" => {
                let value = next_value(&mut args, "--constraints")?;
                constraints_path = Some(Utf8PathBuf::from(value));
            }
            "--output" => {
                let value = next_value(&mut args, "--output")?;
                output_path = Some(Utf8PathBuf::from(value));
            }
            _ => return Err(CliError::UnknownArgument { value: arg }),
        }
    }

    Ok(ParseOutcome::Options(Options {
        count: count.ok_or(CliError::MissingCount)?,
        seed,
        constraints_path,
        output_path,
    }))
}

/// Generates the cohort described by `options`.
///
/// Members are serialised as JSON Lines and written as they are generated,
/// through a buffer, so memory use does not grow with the cohort size. With
/// an output path the lines are streamed into a temp file that replaces the
/// target once the run succeeds; otherwise they go to `out`.
///
/// # Errors
///
/// Returns [`CliError`] when the constraints cannot be loaded or are invalid,
/// or when the output cannot be written.
///
/// # Example
///
/// ```
/// use membersim::cohort_cli::{ParseOutcome, parse_args, run};
///
/// let args = vec!["--count".to_owned(), "3".to_owned()];
/// let ParseOutcome::Options(options) = parse_args(args.into_iter()).expect("parse") else {
///     panic!("expected options");
/// };
///
/// let mut out = Vec::new();
/// let summary = run(&options, &mut out).expect("run cohort");
///
/// assert_eq!(summary.completed, 3);
/// assert_eq!(String::from_utf8(out).expect("utf8").lines().count(), 3);
/// ```
pub fn run(options: &Options, out: &mut impl Write) -> Result<RunSummary, CliError> {
    let constraints = match &options.constraints_path {
        Some(path) => load_constraints(path)?,
        None => CohortConstraints::default(),
    };
    let seed = options.seed();

    let mut generator = CohortGenerator::new(MemberFactory::default(), constraints, Some(seed))?
        .with_progress_callback(log_progress);
    let mut cohort = generator.generate(options.count);

    match &options.output_path {
        Some(path) => {
            let output_error = |message: String| CliError::WriteError {
                path: path.to_path_buf(),
                message,
            };
            let (dir, file_name) = open_parent(path).map_err(&output_error)?;
            let mut file = AtomicFile::create(&dir, file_name)?;
            write_members(&mut cohort, &mut file, &output_error)?;
            file.commit()?;
        }
        None => {
            let mut buffered = BufWriter::new(out);
            write_members(&mut cohort, &mut buffered, &|message| CliError::OutputError {
                message,
            })?;
        }
    }
    let progress = cohort.progress();

    info!(
        completed = progress.completed,
        failed = progress.failed,
        seed,
        output = %OutputTarget(options.output_path()),
        "cohort generated"
    );

    Ok(RunSummary {
        completed: progress.completed,
        failed: progress.failed,
        seed,
        output: options.output_path.clone(),
    })
}

/// Formats the success message emitted by the CLI.
///
/// # Example
///
/// ```
/// use membersim::cohort_cli::{RunSummary, success_message};
///
/// let summary = RunSummary {
///     completed: 100,
///     failed: 0,
///     seed: 42,
///     output: Some("cohort.jsonl".into()),
/// };
///
/// assert_eq!(
///     success_message(&summary),
///     "Generated 100 members (failed=0, seed=42) to cohort.jsonl"
/// );
/// ```
#[must_use]
pub fn success_message(summary: &RunSummary) -> String {
    format!(
        "Generated {} members (failed={}, seed={}) to {}",
        summary.completed,
        summary.failed,
        summary.seed,
        OutputTarget(summary.output.as_deref())
    )
}

struct OutputTarget<'a>(Option<&'a Utf8Path>);

impl fmt::Display for OutputTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.map_or("stdout", Utf8Path::as_str))
    }
}

fn log_progress(progress: &CohortProgress) {
    info!(
        completed = progress.completed,
        failed = progress.failed,
        total = progress.total,
        "generation progress"
    );
}

fn load_constraints(path: &Utf8Path) -> Result<CohortConstraints, CliError> {
    let (dir, file_name) = open_parent(path).map_err(|message| ConstraintsError::IoError {
        path: path.to_path_buf(),
        message,
    })?;
    Ok(CohortConstraints::from_file(&dir, file_name)?)
}

fn write_members(
    members: impl Iterator<Item = SyntheticMember>,
    out: &mut impl Write,
    io_error: &impl Fn(String) -> CliError,
) -> Result<(), CliError> {
    for member in members {
        serde_json::to_writer(&mut *out, &member).map_err(|err| {
            if err.is_io() {
                io_error(err.to_string())
            } else {
                CliError::Serialize {
                    message: err.to_string(),
                }
            }
        })?;
        out.write_all(b"\n").map_err(|err| io_error(err.to_string()))?;
    }
    out.flush().map_err(|err| io_error(err.to_string()))
}

fn open_parent(path: &Utf8Path) -> Result<(Dir, &Utf8Path), String> {
    let file_name = path
        .file_name()
        .map(Utf8Path::new)
        .ok_or_else(|| "path must name a file".to_owned())?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| err.to_string())?;
    Ok((dir, file_name))
}

fn next_value<I>(args: &mut I, flag: &'static str) -> Result<String, CliError>
where
    I: Iterator<Item = String>,
{
    args.next().ok_or(CliError::MissingValue { flag })
}

fn parse_number<T>(value: &str, flag: &'static str) -> Result<T, CliError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value.parse::<T>().map_err(|err| CliError::InvalidNumber {
        flag,
        value: value.to_owned(),
        message: err.to_string(),
    })
}
