use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use playscraper::{
    config::{load_from_path, TaskConfig},
    export::write_workbook,
    logging::{init_logging, LogLevel},
    lookup::AdapterTable,
    pipeline::{
        BarProgress, ExecutorOptions, LogProgress, NoProgress, Orchestrator, ProgressSink,
        RowTaskExecutor, TaskBinding,
    },
    table::{read_workbook, Workbook},
};
use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Enrich a playlist workbook with video and audio links and popularity metrics"
)]
struct Cli {
    /// Overrides RUST_LOG.
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the configured tasks and write the enriched workbook.
    Run(RunArgs),
    /// List sheets, columns and the first rows of a workbook.
    Inspect(InspectArgs),
}

#[derive(Args)]
struct RunArgs {
    #[arg(short, long)]
    config: PathBuf,
    /// Overrides `input` in the config file.
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Overrides `output` in the config file.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Write a JSON run summary here.
    #[arg(long)]
    summary: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "log")]
    progress: ProgressMode,
}

#[derive(Args)]
struct InspectArgs {
    input: PathBuf,
    #[arg(long, default_value_t = 10)]
    rows: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressMode {
    Log,
    Bar,
    None,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.log_level) {
        eprintln!("{:#}", e);
        return ExitCode::from(2);
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    let result = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Inspect(args) => inspect(&args).map(|_| ExitCode::SUCCESS),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let start = Instant::now();
    info!("startup");

    // ─── 1) load config ──────────────────────────────────────────────
    let config = load_from_path(&args.config)?;
    let input = args
        .input
        .or_else(|| config.input.clone())
        .context("no input workbook: pass --input or set `input` in the config")?;
    let output = args
        .output
        .or_else(|| config.output.clone())
        .unwrap_or_else(|| default_output(&input));

    // ─── 2) load workbook ────────────────────────────────────────────
    let mut workbook = read_workbook(&input)?;

    // ─── 3) bind tasks to adapters ───────────────────────────────────
    let adapters = AdapterTable::from_config(&config.backends)?;
    let specs = config.tasks.iter().map(TaskConfig::to_spec).collect();
    let bindings = TaskBinding::bind_all(specs, &adapters);
    info!("{} task(s) selected", bindings.len());

    // ─── 4) stop on ctrl-c, between rows ─────────────────────────────
    let stop = CancellationToken::new();
    let on_signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping after the current row");
            on_signal.cancel();
        }
    });

    // ─── 5) run tasks in order ───────────────────────────────────────
    let mut sink: Box<dyn ProgressSink> = match args.progress {
        ProgressMode::Log => Box::new(LogProgress),
        ProgressMode::Bar => Box::new(BarProgress::new()),
        ProgressMode::None => Box::new(NoProgress),
    };
    let orchestrator = Orchestrator::new(RowTaskExecutor::new(
        ExecutorOptions::from(&config.pipeline),
        stop,
    ));
    let summary = orchestrator
        .run(&mut workbook, bindings, sink.as_mut())
        .await;

    // ─── 6) export, even after config errors or a stop ───────────────
    write_workbook(&output, &workbook)?;
    info!(path = %output.display(), "enriched workbook written");

    if let Some(path) = &args.summary {
        let json = serde_json::to_string_pretty(&summary).context("serializing run summary")?;
        fs::write(path, json).with_context(|| format!("writing run summary {:?}", path))?;
        info!(path = %path.display(), "run summary written");
    }

    info!(elapsed = ?start.elapsed(), "done");
    Ok(if summary.has_config_errors() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

fn inspect(args: &InspectArgs) -> Result<()> {
    let workbook = read_workbook(&args.input)?;
    print!("{}", preview(&workbook, args.rows));
    Ok(())
}

/// `<stem>_enriched.xlsx` next to the input.
fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "playlist".into());
    input.with_file_name(format!("{}_enriched.xlsx", stem))
}

fn preview(workbook: &Workbook, rows: usize) -> String {
    let mut out = format!("Found {} sheet(s)\n", workbook.len());
    for (name, table) in workbook.sheets() {
        out.push_str(&format!("\n=== {} ({} rows) ===\n", name, table.len()));
        out.push_str(&format!("Columns: {}\n", table.columns().join(", ")));
        for row in table.rows().iter().take(rows) {
            let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
            out.push_str(&cells.join(" | "));
            out.push('\n');
        }
    }
    out
}
