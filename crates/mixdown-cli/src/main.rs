//! Mixdown CLI - Command-line interface for deterministic timeline rendering
//!
//! This binary provides commands for validating, inspecting and rendering
//! timelines.

use clap::{Parser, Subcommand};
use mixdown_render::RenderOptions;
use std::process::ExitCode;

use mixdown_cli::{commands, logging};

/// Mixdown - Declarative Audio Timeline Renderer
#[derive(Parser)]
#[command(name = "mixdown")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a timeline to a WAV file
    Render {
        /// Path to the timeline JSON file
        timeline: String,

        /// Output WAV path
        #[arg(short, long)]
        output: String,

        /// Force chunked streaming rendering
        #[arg(long)]
        streaming: bool,

        /// Streaming chunk size in seconds
        #[arg(long)]
        chunk_size: Option<f64>,

        /// Maximum number of render workers
        #[arg(long)]
        workers: Option<usize>,

        /// Streaming only: normalize from the running loudness instead of a
        /// measurement pass
        #[arg(long)]
        single_pass: bool,

        /// Drop clips with missing or unreadable sources instead of failing
        #[arg(long)]
        skip_invalid: bool,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Validate a timeline and its sources without rendering
    Validate {
        /// Path to the timeline JSON file
        timeline: String,

        /// Output machine-readable JSON diagnostics (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Print where every clip of a compiled timeline lands
    Inspect {
        /// Path to the timeline JSON file
        timeline: String,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },
}

fn render_options(
    streaming: bool,
    chunk_size: Option<f64>,
    workers: Option<usize>,
    single_pass: bool,
    skip_invalid: bool,
) -> RenderOptions {
    RenderOptions {
        streaming: streaming.then_some(true),
        chunk_size_sec: chunk_size,
        max_workers: workers,
        two_pass_lufs: single_pass.then_some(false),
        skip_invalid,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Render {
            timeline,
            output,
            streaming,
            chunk_size,
            workers,
            single_pass,
            skip_invalid,
            json,
        } => {
            let options = render_options(streaming, chunk_size, workers, single_pass, skip_invalid);
            commands::render::run(&timeline, &output, &options, json)
        }
        Commands::Validate { timeline, json } => commands::validate::run(&timeline, json),
        Commands::Inspect { timeline, json } => commands::inspect::run(&timeline, json),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_render() {
        let cli = Cli::try_parse_from(["mixdown", "render", "story.json", "-o", "story.wav"])
            .unwrap();
        assert!(!cli.verbose);
        match cli.command {
            Commands::Render {
                timeline,
                output,
                streaming,
                single_pass,
                json,
                ..
            } => {
                assert_eq!(timeline, "story.json");
                assert_eq!(output, "story.wav");
                assert!(!streaming);
                assert!(!single_pass);
                assert!(!json);
            }
            _ => panic!("expected render command"),
        }
    }

    #[test]
    fn test_cli_parses_streaming_flags() {
        let cli = Cli::try_parse_from([
            "mixdown",
            "-v",
            "render",
            "story.json",
            "--output",
            "story.wav",
            "--streaming",
            "--chunk-size",
            "2.5",
            "--workers",
            "3",
            "--single-pass",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Render {
                streaming,
                chunk_size,
                workers,
                single_pass,
                skip_invalid,
                ..
            } => {
                let options =
                    render_options(streaming, chunk_size, workers, single_pass, skip_invalid);
                assert_eq!(options.streaming, Some(true));
                assert_eq!(options.chunk_size_sec, Some(2.5));
                assert_eq!(options.max_workers, Some(3));
                assert_eq!(options.two_pass_lufs, Some(false));
                assert!(!options.skip_invalid);
            }
            _ => panic!("expected render command"),
        }
    }

    #[test]
    fn test_unset_flags_defer_to_timeline_settings() {
        let options = render_options(false, None, None, false, true);
        assert_eq!(options.streaming, None);
        assert_eq!(options.two_pass_lufs, None);
        assert!(options.skip_invalid);
    }

    #[test]
    fn test_cli_parses_validate() {
        let cli = Cli::try_parse_from(["mixdown", "validate", "story.json", "--json"]).unwrap();
        match cli.command {
            Commands::Validate { timeline, json } => {
                assert_eq!(timeline, "story.json");
                assert!(json);
            }
            _ => panic!("expected validate command"),
        }
    }

    #[test]
    fn test_cli_parses_inspect() {
        let cli = Cli::try_parse_from(["mixdown", "inspect", "story.json"]).unwrap();
        match cli.command {
            Commands::Inspect { timeline, json } => {
                assert_eq!(timeline, "story.json");
                assert!(!json);
            }
            _ => panic!("expected inspect command"),
        }
    }

    #[test]
    fn test_render_requires_output() {
        assert!(Cli::try_parse_from(["mixdown", "render", "story.json"]).is_err());
    }
}
