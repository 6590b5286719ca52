//! Command-line surface: argument parsing, exit codes, and the validated
//! [`RunConfig`] the engine is built from.
//!
//! Built on `clap`'s derive API, carrying the full option table this
//! host recognizes.

use std::path::PathBuf;

use clap::Parser;

use crate::error::EngineError;
use crate::logging::{ColorScheme, Verbosity};
use crate::settings::{AudioSettings, DEFAULT_BLOCKSIZE, DEFAULT_NUM_CHANNELS, DEFAULT_SAMPLE_RATE};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_NOT_RUN: i32 = 1;
pub const EXIT_INVALID_ARGUMENT: i32 = 2;
pub const EXIT_MISSING_REQUIRED_OPTION: i32 = 3;
pub const EXIT_IO_ERROR: i32 = 4;
pub const EXIT_INVALID_PLUGIN_CHAIN: i32 = 5;
pub const EXIT_PLUGIN_ERROR: i32 = 6;

/// Recognized source kinds this build actually implements, for
/// `--list-file-types`.
pub const SUPPORTED_FILE_TYPES: &[&str] = &["silence", "wav"];
pub const RECOGNIZED_BUT_UNIMPLEMENTED_FILE_TYPES: &[&str] = &["aiff", "pcm"];

/// Raw command-line arguments, parsed but not yet cross-validated.
#[derive(Parser, Debug)]
#[command(name = "offline-plugin-host")]
#[command(about = "Offline, block-rate audio plugin host", long_about = None)]
#[command(disable_version_flag = true, disable_help_flag = true)]
pub struct Args {
    #[arg(long)]
    pub help: bool,

    #[arg(long)]
    pub version: bool,

    #[arg(long = "list-file-types")]
    pub list_file_types: bool,

    #[arg(long)]
    pub verbose: bool,

    #[arg(long)]
    pub quiet: bool,

    #[arg(long)]
    pub color: Option<String>,

    #[arg(long)]
    pub blocksize: Option<usize>,

    #[arg(long)]
    pub channels: Option<usize>,

    #[arg(long = "sample-rate")]
    pub sample_rate: Option<f64>,

    #[arg(long)]
    pub input: Option<PathBuf>,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long = "midi-file")]
    pub midi_file: Option<PathBuf>,

    #[arg(long)]
    pub plugin: Option<String>,

    #[arg(long = "display-info")]
    pub display_info: bool,
}

/// What to do once argument parsing has finished: either run the engine,
/// or print a banner and exit with `NOT_RUN` without touching the engine.
pub enum Action {
    PrintHelp,
    PrintVersion,
    PrintFileTypes,
    Run(RunConfig),
}

/// Fully validated configuration the engine is built from. Fail-fast:
/// every field here has already been checked, so `ProcessingEngine::run`
/// never has to re-validate argument shape.
pub struct RunConfig {
    pub settings: AudioSettings,
    pub verbosity: Verbosity,
    pub color: Option<ColorScheme>,
    pub input: Option<PathBuf>,
    pub output: PathBuf,
    pub midi_file: Option<PathBuf>,
    pub plugin_spec: Option<String>,
    pub display_info: bool,
}

/// Parses `std::env::args()` (via `clap`) and validates the result into
/// an [`Action`]. Zero arguments is equivalent to `--help`, per spec.
pub fn parse_and_validate(raw_args: &[String]) -> Result<Action, EngineError> {
    if raw_args.len() <= 1 {
        return Ok(Action::PrintHelp);
    }

    let args = Args::try_parse_from(raw_args)
        .map_err(|e| EngineError::InvalidArgument(e.to_string()))?;

    if args.help {
        return Ok(Action::PrintHelp);
    }
    if args.version {
        return Ok(Action::PrintVersion);
    }
    if args.list_file_types {
        return Ok(Action::PrintFileTypes);
    }

    if args.verbose && args.quiet {
        return Err(EngineError::InvalidArgument(
            "--verbose and --quiet are mutually exclusive".to_string(),
        ));
    }
    let verbosity = if args.verbose {
        Verbosity::Verbose
    } else if args.quiet {
        Verbosity::Quiet
    } else {
        Verbosity::Normal
    };

    let color = match args.color {
        Some(name) => Some(
            ColorScheme::parse(&name)
                .ok_or_else(|| EngineError::InvalidArgument(format!("unknown color scheme '{name}'")))?,
        ),
        None => None,
    };

    let settings = AudioSettings::new(
        args.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
        args.blocksize.unwrap_or(DEFAULT_BLOCKSIZE),
        args.channels.unwrap_or(DEFAULT_NUM_CHANNELS),
    );
    if !settings.is_valid() {
        return Err(EngineError::InvalidArgument(
            "sample-rate, blocksize and channels must all be positive".to_string(),
        ));
    }

    let output = args
        .output
        .ok_or_else(|| EngineError::MissingRequiredOption("--output is required".to_string()))?;

    Ok(Action::Run(RunConfig {
        settings,
        verbosity,
        color,
        input: args.input,
        output,
        midi_file: args.midi_file,
        plugin_spec: args.plugin,
        display_info: args.display_info,
    }))
}

pub fn print_help() {
    println!("offline-plugin-host — offline, block-rate audio plugin host\n");
    println!("USAGE:");
    println!("    offline-plugin-host [OPTIONS] --output <PATH>\n");
    println!("OPTIONS:");
    println!("    --help                   Print this message and exit");
    println!("    --version                Print version and license and exit");
    println!("    --list-file-types        Print supported source types and exit");
    println!("    --verbose                Log level DEBUG");
    println!("    --quiet                  Log level ERROR");
    println!("    --color <scheme>         auto | dark | light | none");
    println!("    --blocksize <n>          Processing blocksize in frames");
    println!("    --channels <n>           Channel count");
    println!("    --sample-rate <hz>       Sample rate in Hz");
    println!("    --input <path>           Input sample source");
    println!("    --output <path>          Output sample source (required)");
    println!("    --midi-file <path>       MIDI source");
    println!("    --plugin <name-list>     Append plugins to the chain");
    println!("    --display-info           Dump plugin metadata before running");
}

pub fn print_version() {
    println!("offline-plugin-host {}", env!("CARGO_PKG_VERSION"));
    println!("license: {}", env!("CARGO_PKG_LICENSE"));
}

pub fn print_file_types() {
    println!("supported:");
    for kind in SUPPORTED_FILE_TYPES {
        println!("  {kind}");
    }
    println!("recognized but not implemented:");
    for kind in RECOGNIZED_BUT_UNIMPLEMENTED_FILE_TYPES {
        println!("  {kind}");
    }
}
