use std::{
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use gestured::{
    config::{Config, ConfigError, PointerBackendKind},
    dispatch::{
        ActionExecutor, CommandRunner, DryRunRunner, NullBackend, PointerBackend, ShellRunner,
        XdotoolBackend,
    },
    replay::{self, ReplayReport},
    runtime::{Daemon, StopHandle},
    source::TraceSource,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gestured")]
#[command(about = "Touchpad gesture recognizer and command dispatcher")]
struct Cli {
    /// More log output; repeat for debug and trace.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Config file instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Recognize gestures from a live frame stream and dispatch them.
    Run(RunArgs),
    /// Replay a recorded trace offline and print the lifecycle events.
    Replay(ReplayArgs),
    /// Validate the config and print the binding table.
    Check,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Frame stream to read, `-` for stdin.
    #[arg(long, default_value = "-")]
    input: String,
    /// Deliver frames at their recorded spacing.
    #[arg(long)]
    realtime: bool,
    /// Log commands instead of running them.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct ReplayArgs {
    trace: PathBuf,
    /// File with the expected phase sequence.
    #[arg(long)]
    expect: Option<PathBuf>,
    /// One JSON object per event.
    #[arg(long)]
    json: bool,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return Config::read_from_file(path).context("failed to load config");
    }
    match Config::read_default_config() {
        Ok(config) => Ok(config),
        Err(err @ ConfigError::Io { .. }) => {
            error!(%err, "no usable config, continuing without bindings");
            Ok(Config::default())
        }
        Err(err) => Err(err).context("failed to load default config"),
    }
}

fn run_daemon(config: &Config, args: RunArgs) -> Result<()> {
    let runner: Box<dyn CommandRunner> = if args.dry_run {
        Box::new(DryRunRunner::new())
    } else {
        Box::new(ShellRunner::new())
    };
    let (pointer, inject_pointer): (Box<dyn PointerBackend>, bool) =
        match (config.pointer.backend, args.dry_run) {
            (PointerBackendKind::Xdotool, false) => (Box::new(XdotoolBackend::new()), true),
            _ => (Box::new(NullBackend), false),
        };
    let executor = ActionExecutor::new(runner, pointer);

    let daemon = Daemon::new(&config.runtime);
    install_stop_handler(daemon.stop_handle())?;

    let summary = if args.input == "-" {
        let source = TraceSource::new(BufReader::new(io::stdin())).paced(args.realtime);
        daemon.run(config, source, executor, inject_pointer)?
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("failed to open frame stream {}", args.input))?;
        let source = TraceSource::new(BufReader::new(file)).paced(args.realtime);
        daemon.run(config, source, executor, inject_pointer)?
    };
    info!(
        frames = summary.frames,
        gestures = summary.gestures,
        coalesced = summary.coalesced,
        failures = summary.dispatch.failures,
        "gestured: done"
    );
    Ok(())
}

/// SIGINT, SIGTERM and SIGHUP stop the daemon through the frame queue so a
/// held pointer button is released before exit.
fn install_stop_handler(stop: StopHandle) -> Result<()> {
    ctrlc::set_handler(move || {
        info!("gestured: signal received, stopping");
        stop.stop();
    })
    .context("failed to install signal handler")
}

fn run_replay(config: &Config, args: ReplayArgs) -> Result<()> {
    let file = File::open(&args.trace)
        .with_context(|| format!("failed to open trace {}", args.trace.display()))?;
    let report = replay::replay(config, BufReader::new(file))
        .with_context(|| format!("failed to replay {}", args.trace.display()))?;
    print_report(&report, args.json)?;

    if let Some(path) = args.expect {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let expected = replay::parse_expectations(&text)
            .with_context(|| format!("invalid expectations in {}", path.display()))?;
        replay::check_expectations(&report, &expected).context("replay mismatch")?;
        println!("ok: {} events match", expected.len());
    }
    Ok(())
}

fn print_report(report: &ReplayReport, json: bool) -> Result<()> {
    for event in &report.events {
        if json {
            println!("{}", serde_json::to_string(event)?);
        } else {
            println!("{}", event.to_line());
        }
    }
    if !json {
        println!(
            "{} frames, {} events, {} disconnects",
            report.frames,
            report.events.len(),
            report.disconnects
        );
    }
    Ok(())
}

fn run_check(config: &Config) -> Result<()> {
    if config.bindings.is_empty() {
        bail!("no gestures configured");
    }
    for (index, binding) in config.bindings.iter().enumerate() {
        println!(
            "#{index} {} {} {}f",
            binding.kind, binding.direction, binding.fingers
        );
        for (label, template) in [
            ("start", &binding.on_start),
            ("update", &binding.on_update),
            ("end", &binding.on_end),
        ] {
            if let Some(template) = template {
                println!("    {label:<6} {template}");
            }
        }
        if let Some(delay) = binding.mouse_up_delay_ms {
            println!("    mouse-up-delay {delay} ms");
        }
        if let Some(acceleration) = binding.acceleration {
            println!("    acceleration {acceleration}");
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => run_daemon(&config, args),
        Commands::Replay(args) => run_replay(&config, args),
        Commands::Check => run_check(&config),
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}
