use clap::{Parser, Subcommand};
use songform_lib::commands::{self, AnalyzeInput, RearrangeInput};
use std::io::Write;
use std::path::PathBuf;

/// Song structure analysis and prompt-driven rearrangement
#[derive(Parser)]
#[command(name = "songform")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Warnings and errors only
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover the sections of a WAV file and print them as JSON
    Analyze {
        input: PathBuf,

        /// Known tempo; skips beat tracking
        #[arg(long)]
        bpm: Option<f64>,

        /// TOML configuration overrides
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Append JSONL progress entries to this file
        #[arg(long)]
        trace: Option<PathBuf>,
    },
    /// Apply an instruction such as "double the chorus" and render the result
    Rearrange {
        input: PathBuf,

        prompt: String,

        /// Timeline offset (seconds) of the first clip
        #[arg(long, default_value_t = 0.0)]
        start_time: f64,

        /// Directory for rendered clips and placements.json
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[arg(long)]
        bpm: Option<f64>,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        trace: Option<PathBuf>,

        /// Render and report without writing clips
        #[arg(long)]
        dry_run: bool,
    },
    /// List the supported instructions
    Templates,
    /// Show default configuration as TOML
    ShowConfig,
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .target(env_logger::Target::Stderr)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", json)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose && cli.quiet {
        anyhow::bail!("Cannot specify both --verbose and --quiet");
    }
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Analyze {
            input,
            bpm,
            config,
            trace,
        } => {
            let report = commands::analyze(&AnalyzeInput {
                path: input,
                bpm,
                config_path: config,
                trace_path: trace,
            })
            .map_err(|e| anyhow::anyhow!("{}", e.message()))?;
            print_json(&report)?;
        }
        Commands::Rearrange {
            input,
            prompt,
            start_time,
            output_dir,
            bpm,
            config,
            trace,
            dry_run,
        } => {
            let result = commands::rearrange(&RearrangeInput {
                path: input,
                prompt,
                start_time,
                output_dir,
                bpm,
                config_path: config,
                trace_path: trace,
                dry_run,
            })
            .map_err(|e| anyhow::anyhow!("{}", e.message()))?;
            print_json(&result)?;
        }
        Commands::Templates => {
            for template in commands::list_templates() {
                println!("{}", template);
            }
        }
        Commands::ShowConfig => {
            let toml = commands::default_config_toml()
                .map_err(|e| anyhow::anyhow!("{}", e.message()))?;
            print!("{}", toml);
        }
    }

    Ok(())
}
