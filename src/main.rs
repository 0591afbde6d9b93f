use citysim::config::Config;
use citysim::context::Context;
use citysim::error::CityError;
use citysim::game::ContextGameExt;
use citysim::logging::{init_logging, set_log_level};
use citysim::report::ContextReportExt;
use citysim::world::ContextWorldExt;
use clap::Parser;
use log::{error, info, LevelFilter};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[clap(name = "citysim", author, version, about = "Headless tile-based city simulation")]
struct Cli {
    #[clap(long, short, default_value = "config.yml", help = "Config file, created if missing")]
    config: PathBuf,

    #[clap(long, help = "Map to load instead of the configured one")]
    map: Option<PathBuf>,

    #[clap(long, help = "Simulated seconds to run for")]
    duration: Option<f64>,

    #[clap(long, help = "Random seed")]
    seed: Option<u64>,

    #[clap(long, help = "Write building, vehicle and death events to this CSV file")]
    report: Option<PathBuf>,

    #[clap(long, help = "Write end-of-run statistics to this JSON file")]
    summary: Option<PathBuf>,

    #[clap(long, help = "Print the outside world as text when the run ends")]
    ascii: bool,
}

/// Starts logging so config problems are reported, then loads the config, applies the
/// command line overrides and switches to the configured log level.
fn load_config(cli: &Cli) -> Result<Config, CityError> {
    init_logging(LevelFilter::Info)?;
    let mut config = Config::load(&cli.config)?;
    if let Some(map) = &cli.map {
        config.simulation.map.clone_from(map);
    }
    if let Some(duration) = cli.duration {
        config.simulation.duration = duration;
    }
    if let Some(seed) = cli.seed {
        config.simulation.seed = seed;
    }
    config.validate()?;
    set_log_level(config.log_level()?)?;
    Ok(config)
}

fn run(cli: Cli) -> Result<(), CityError> {
    let config = load_config(&cli)?;

    let mut context = Context::new();
    if let Some(path) = &cli.report {
        context.init_report(path)?;
    }
    let world = context.setup_game(&config)?;
    info!(
        "running {} for {} s at {} ticks/s",
        config.simulation.map.display(),
        config.simulation.duration,
        config.simulation.tick_rate
    );
    context.execute();
    context.flush_report()?;

    let summary = context.summary();
    info!(
        "finished after {} frames: {} humans ({} inside, {} dead), {} vehicles",
        summary.frames, summary.humans, summary.humans_inside, summary.dead, summary.vehicles
    );
    if let Some(path) = &cli.summary {
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
    }
    if cli.ascii {
        println!("{}", context.render_ascii(world));
    }
    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("citysim: {e}");
            ExitCode::FAILURE
        }
    }
}
