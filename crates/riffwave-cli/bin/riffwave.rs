use anyhow::Context;
use clap::Parser;
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

use riffwave_cli::{Commands, OutputFormat, commands};

#[derive(Parser)]
#[command(
    name = "riffwave",
    about = "Inspect, extract, convert and generate WAVE/RF64 files",
    version,
    author,
    long_about = "A command-line tool for WAVE and RF64 audio containers: chunk layout and ds64 size tables, raw chunk extraction, sample format conversion that keeps broadcast metadata, and test tone generation."
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "RIFFWAVE_JSON_LOGS")]
    json_logs: bool,

    /// Output format for reports
    #[arg(long = "report-format", value_enum, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Commands::Info(args) => commands::info::handle(args, cli.format, &mut out)?,
        Commands::Extract(args) => commands::extract::handle(args, &mut out)?,
        Commands::Convert(args) => {
            let summary = commands::convert::handle(args)?;
            writeln!(
                out,
                "{}: {} frames, {} metadata chunks",
                args.output.display(),
                summary.frames,
                summary.chunks
            )?;
        }
        Commands::Generate(args) => {
            let frames = commands::generate::handle(args)?;
            writeln!(out, "{}: {} frames", args.output.display(), frames)?;
        }
    }

    out.flush().context("failed to flush stdout")?;
    Ok(())
}
