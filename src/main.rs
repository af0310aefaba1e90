//! sewer-mbc entry point: CLI wiring, telemetry loading, and the cycle loop.

mod cli;

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::process;

use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sewer_mbc::config::NetworkConfig;
use sewer_mbc::control::{Clock, CycleReport, Engine, HydraulicRun, RunSummary};
use sewer_mbc::hydraulics::ReplayProvider;
use sewer_mbc::io::export::{export_goals, export_recommendations};
use sewer_mbc::telemetry::{LineProtocolSink, MemoryTelemetry, RecordSink};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("error: {msg}");
    process::exit(1);
}

fn load_config(cli: &cli::CliOptions) -> NetworkConfig {
    let loaded = match (&cli.config, &cli.preset) {
        (Some(path), _) => NetworkConfig::from_toml_file(path),
        (None, Some(name)) => NetworkConfig::from_preset(name),
        (None, None) => Ok(NetworkConfig::demo()),
    };
    loaded.unwrap_or_else(|e| fail(e))
}

fn load_telemetry(cli: &cli::CliOptions) -> MemoryTelemetry {
    if let Some(path) = &cli.telemetry {
        let file = File::open(path).unwrap_or_else(|e| fail(format!("{}: {e}", path.display())));
        return MemoryTelemetry::from_csv_reader(file)
            .unwrap_or_else(|e| fail(format!("{}: {e}", path.display())));
    }
    let csv = cli
        .preset
        .as_deref()
        .and_then(NetworkConfig::preset_telemetry)
        .unwrap_or_else(|| fail("no telemetry snapshot; pass --telemetry <path>"));
    MemoryTelemetry::from_csv_str(csv).unwrap_or_else(|e| fail(e))
}

fn run_replay(cfg: &NetworkConfig, path: &Path) {
    let Some(hydraulics) = &cfg.hydraulics else {
        fail("--replay needs a [hydraulics] section in the configuration");
    };
    let mut run = HydraulicRun::from_config(hydraulics).unwrap_or_else(|errors| {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    });
    let text = fs::read_to_string(path).unwrap_or_else(|e| fail(format!("{}: {e}", path.display())));
    let mut provider =
        ReplayProvider::from_toml_str(&text).unwrap_or_else(|e| fail(format!("{}: {e}", path.display())));
    let floods = run.run(&mut provider);
    let name = path.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    println!("--- Hydraulic Run ---");
    println!("Routing steps:         {}", run.steps());
    println!("Control steps:         {}", run.control_steps());
    println!("Flood overrides:       {floods}");
    println!("{}", run.metadata_line(&name, false));
}

fn main() {
    init_tracing();
    let cli = cli::parse_args().unwrap_or_else(|e| {
        eprintln!("error: {e}");
        cli::print_usage();
        process::exit(1);
    });

    let mut config = load_config(&cli);
    if let Some(seed) = cli.seed {
        config.control.seed = seed;
    }
    if let Some(noise) = cli.noise {
        config.control.noise_std = noise;
    }

    let mut engine = Engine::from_config(config).unwrap_or_else(|errors| {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    });

    let control = engine.config().control.clone();
    let levels = engine.config().level_fields();
    let stations: Vec<String> = engine
        .config()
        .pump_stations
        .iter()
        .map(|s| s.name.clone())
        .collect();

    let mut memory = MemoryTelemetry::new();
    let mut file_sink = cli.records_out.as_ref().map(|path| {
        let file = File::create(path).unwrap_or_else(|e| fail(format!("{}: {e}", path.display())));
        LineProtocolSink::new(BufWriter::new(file))
    });

    let mut results = Vec::with_capacity(cli.cycles);
    // A network without groups only drives continuous control.
    if !engine.groups().is_empty() {
        let telemetry = load_telemetry(&cli);
        let sink: &mut dyn RecordSink = match file_sink.as_mut() {
            Some(s) => s,
            None => &mut memory,
        };
        let mut clock = Clock::new(cli.cycles, Utc::now(), control.interval_s);
        clock.run(|cycle, now| {
            let noisy = (control.noise_std > 0.0).then(|| {
                telemetry.with_noise(control.seed.wrapping_add(cycle as u64), control.noise_std, &levels)
            });
            let source = noisy.as_ref().unwrap_or(&telemetry);
            let result = engine.run_cycle(source, &mut *sink, now);
            println!("{}\n", CycleReport(&result));
            results.push(result);
        });
        println!("{}", RunSummary::from_results(&results));
    }

    if let Some(sink) = file_sink {
        if let Err(e) = sink.into_inner() {
            fail(format!("failed to flush records: {e}"));
        }
    }
    if let Some(path) = &cli.export {
        if let Err(e) = export_recommendations(&results, path) {
            fail(format!("failed to write CSV: {e}"));
        }
        eprintln!("Recommendations written to {}", path.display());
    }
    if let Some(path) = &cli.goals_out {
        if let Err(e) = export_goals(&results, path) {
            fail(format!("failed to write CSV: {e}"));
        }
        eprintln!("Goals written to {}", path.display());
    }
    if let Some(path) = &cli.replay {
        run_replay(engine.config(), path);
    }

    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let state = Arc::new(sewer_mbc::api::AppState::new(stations, results));
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
        let rt = tokio::runtime::Runtime::new()
            .unwrap_or_else(|e| fail(format!("failed to create tokio runtime: {e}")));
        if let Err(e) = rt.block_on(sewer_mbc::api::serve(state, addr)) {
            fail(format!("server error: {e}"));
        }
    }
    #[cfg(not(feature = "api"))]
    let _ = stations;
}
