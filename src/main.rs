//! offline-plugin-host — entry point.
//!
//! Parses arguments, builds the engine, runs it to completion, and maps
//! any error onto the process exit code spec.md §6 names.

use std::process::ExitCode;

use offline_plugin_host::cli::{self, Action, EXIT_NOT_RUN, EXIT_SUCCESS};
use offline_plugin_host::engine::{EngineConfig, ProcessingEngine};
use offline_plugin_host::logging;

fn main() -> ExitCode {
    let raw_args: Vec<String> = std::env::args().collect();

    let action = match cli::parse_and_validate(&raw_args) {
        Ok(action) => action,
        Err(err) => {
            logging::init(logging::Verbosity::Normal, None);
            log::error!("{err}");
            return ExitCode::from(err.exit_code() as u8);
        }
    };

    match action {
        Action::PrintHelp => {
            cli::print_help();
            ExitCode::from(EXIT_NOT_RUN as u8)
        }
        Action::PrintVersion => {
            cli::print_version();
            ExitCode::from(EXIT_NOT_RUN as u8)
        }
        Action::PrintFileTypes => {
            cli::print_file_types();
            ExitCode::from(EXIT_NOT_RUN as u8)
        }
        Action::Run(config) => {
            logging::init(config.verbosity, config.color);

            let engine_config = EngineConfig {
                settings: config.settings,
                input_path: config.input,
                output_path: config.output,
                midi_path: config.midi_file,
                plugin_spec: config.plugin_spec,
                display_info: config.display_info,
                tail_frames: 0,
            };

            let mut engine = match ProcessingEngine::build(engine_config) {
                Ok(engine) => engine,
                Err(err) => {
                    log::error!("{err}");
                    return ExitCode::from(err.exit_code() as u8);
                }
            };

            match engine.run() {
                Ok(report) => {
                    log::info!(
                        "processed {} input frame(s), wrote {} output frame(s)",
                        report.input_frames,
                        report.output_frames
                    );
                    for (task_id, millis, pct) in report.timings {
                        log::info!("  task {task_id}: {millis}ms ({pct:.1}%)");
                    }
                    ExitCode::from(EXIT_SUCCESS as u8)
                }
                Err(err) => {
                    log::error!("{err}");
                    ExitCode::from(err.exit_code() as u8)
                }
            }
        }
    }
}
