use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use eyre::{bail, Context, Result};

use correlator::Platform;
use scenario_parsers::Scenario;
use tracemeter::config::Config;
use tracemeter::report::Report;
use tracemeter::runner::{run_gc_wakeups, run_parser, ParserKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PlatformArg {
    Windows,
    Linux,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Windows => Platform::Windows,
            PlatformArg::Linux => Platform::Linux,
        }
    }
}

fn default_platform() -> PlatformArg {
    if cfg!(windows) {
        PlatformArg::Windows
    } else {
        PlatformArg::Linux
    }
}

#[derive(Parser)]
#[command(name = "tracemeter")]
#[command(about = "extract metric counters from a recorded trace capture")]
#[command(version)]
struct Args {
    #[arg(help = "capture file path (json lines, or rkyv frames for .bin)")]
    capture: PathBuf,

    #[arg(short, long, help = "configuration file path (toml format)")]
    config: Option<String>,

    #[arg(short, long, value_enum, help = "metric parser to run")]
    parser: Option<ParserKind>,

    #[arg(long, help = "name of the process under measurement")]
    process_name: Option<String>,

    #[arg(
        long,
        value_delimiter = ',',
        help = "pids of the measured process repetitions"
    )]
    pids: Vec<i32>,

    #[arg(long, help = "command line used to disambiguate same-named processes")]
    command_line: Option<String>,

    #[arg(
        long,
        value_enum,
        default_value_t = default_platform(),
        help = "platform the capture was recorded on"
    )]
    platform: PlatformArg,

    #[arg(
        short,
        long,
        default_value = "report.json",
        help = "output file for the json report"
    )]
    output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let platform = Platform::from(args.platform);

    let (kind, scenario, gc) = match &args.config {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("failed to load config path={path}"))?;
            (config.parser, config.scenario.to_scenario(), config.gc)
        }
        None => {
            let Some(kind) = args.parser else {
                bail!("either --config or --parser is required");
            };
            let Some(process_name) = args.process_name.clone() else {
                bail!("--process-name is required without --config");
            };
            let mut scenario = Scenario::new(process_name, args.pids.clone());
            if let Some(command_line) = args.command_line.clone() {
                scenario = scenario.with_command_line(command_line);
            }
            (kind, scenario, None)
        }
    };

    let counters = run_parser(kind, &args.capture, platform, &scenario)?;
    for counter in &counters {
        tracing::info!(
            counter = %counter.name,
            repetitions = counter.results.len(),
            "counter extracted"
        );
    }

    let mut report = Report::new(kind, counters);
    if let Some(gc) = gc {
        let wakeups = run_gc_wakeups(&args.capture, platform, gc.pid, &gc.threads)?;
        tracing::info!(joins = wakeups.len(), "gc wake-up analysis complete");
        report = report.with_gc_wakeups(wakeups);
    }

    report
        .write_to(&args.output)
        .with_context(|| format!("failed to write report path={}", args.output.display()))?;
    tracing::info!(path = %args.output.display(), "report written");

    Ok(())
}
