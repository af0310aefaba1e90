use std::env;
use std::path::PathBuf;

/// Parsed command-line options.
#[derive(Debug)]
pub struct CliOptions {
    pub config: Option<PathBuf>,
    pub preset: Option<String>,
    pub telemetry: Option<PathBuf>,
    pub cycles: usize,
    pub seed: Option<u64>,
    pub noise: Option<f64>,
    pub records_out: Option<PathBuf>,
    pub export: Option<PathBuf>,
    pub goals_out: Option<PathBuf>,
    pub replay: Option<PathBuf>,
    pub serve: bool,
    pub port: u16,
}

pub fn parse_args() -> Result<CliOptions, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

fn parse_args_from(args: Vec<String>) -> Result<CliOptions, String> {
    if args.len() == 1 && (args[0] == "--help" || args[0] == "-h") {
        print_usage();
        std::process::exit(0);
    }
    parse_options(&args)
}

fn parse_options(args: &[String]) -> Result<CliOptions, String> {
    let mut i = 0usize;
    let mut opts = CliOptions {
        config: None,
        preset: None,
        telemetry: None,
        cycles: 1,
        seed: None,
        noise: None,
        records_out: None,
        export: None,
        goals_out: None,
        replay: None,
        serve: false,
        port: 3000,
    };

    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --config (expected a TOML file path)")?;
                set_once(&mut opts.config, PathBuf::from(path), "--config")?;
            }
            "--preset" => {
                i += 1;
                let name = args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                set_once(&mut opts.preset, name.to_string(), "--preset")?;
            }
            "--telemetry" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --telemetry (expected a CSV file path)")?;
                set_once(&mut opts.telemetry, PathBuf::from(path), "--telemetry")?;
            }
            "--cycles" => {
                i += 1;
                let v = args.next_or_err(i, "missing value for --cycles (expected a count)")?;
                opts.cycles = v
                    .parse()
                    .map_err(|_| format!("--cycles value \"{v}\" is not a valid count"))?;
            }
            "--seed" => {
                i += 1;
                let v = args.next_or_err(i, "missing value for --seed (expected a u64)")?;
                let seed = v
                    .parse()
                    .map_err(|_| format!("--seed value \"{v}\" is not a valid u64"))?;
                set_once(&mut opts.seed, seed, "--seed")?;
            }
            "--noise" => {
                i += 1;
                let v = args.next_or_err(i, "missing value for --noise (expected a standard deviation)")?;
                let noise: f64 = v
                    .parse()
                    .map_err(|_| format!("--noise value \"{v}\" is not a number"))?;
                set_once(&mut opts.noise, noise, "--noise")?;
            }
            "--records-out" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --records-out (expected a file path)")?;
                set_once(&mut opts.records_out, PathBuf::from(path), "--records-out")?;
            }
            "--export" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --export (expected a file path)")?;
                set_once(&mut opts.export, PathBuf::from(path), "--export")?;
            }
            "--goals-out" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --goals-out (expected a file path)")?;
                set_once(&mut opts.goals_out, PathBuf::from(path), "--goals-out")?;
            }
            "--replay" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --replay (expected a TOML file path)")?;
                set_once(&mut opts.replay, PathBuf::from(path), "--replay")?;
            }
            "--serve" => opts.serve = true,
            "--port" => {
                i += 1;
                let v = args.next_or_err(i, "missing value for --port (expected a u16)")?;
                opts.port = v
                    .parse()
                    .map_err(|_| format!("--port value \"{v}\" is not a valid u16"))?;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if opts.config.is_some() && opts.preset.is_some() {
        return Err(
            "arguments `--config` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }
    if opts.config.is_none() && opts.preset.is_none() {
        opts.preset = Some("demo".to_string());
    }
    if opts.cycles == 0 {
        return Err("--cycles must be >= 1".to_string());
    }
    if opts.noise.is_some_and(|n| n < 0.0) {
        return Err("--noise must be >= 0".to_string());
    }
    if opts.serve && !cfg!(feature = "api") {
        return Err("--serve needs a build with the `api` feature".to_string());
    }

    Ok(opts)
}

fn set_once<T>(slot: &mut Option<T>, value: T, flag: &str) -> Result<(), String> {
    if slot.replace(value).is_some() {
        return Err(format!("{flag} provided more than once"));
    }
    Ok(())
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("sewer-mbc - market-based control for combined sewer networks");
    eprintln!();
    eprintln!("Usage: sewer-mbc [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>        Load the network from a TOML file");
    eprintln!("  --preset <name>        Use a built-in network (demo)");
    eprintln!("  --telemetry <path>     Telemetry snapshot CSV (asset,measure,field,timestamp,value)");
    eprintln!("  --cycles <n>           Control cycles to run (default: 1)");
    eprintln!("  --seed <u64>           Override the noise seed");
    eprintln!("  --noise <f64>          Std deviation of level noise added per cycle");
    eprintln!("  --records-out <path>   Write recommendation records as line protocol");
    eprintln!("  --export <path>        Export pump recommendations to CSV");
    eprintln!("  --goals-out <path>     Export group goals to CSV");
    eprintln!("  --replay <path>        Run continuous control over a hydraulic replay file");
    eprintln!("  --serve                Serve results over REST after the run (api feature)");
    eprintln!("  --port <u16>           API server port (default: 3000)");
    eprintln!("  --help                 Show this help message");
    eprintln!();
    eprintln!("If no --config or --preset is given, the demo preset is used.");
}

#[cfg(test)]
mod tests {
    use super::parse_args_from;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_to_demo_preset() {
        let opts = parse_args_from(Vec::new()).expect("parse should succeed");
        assert_eq!(opts.preset.as_deref(), Some("demo"));
        assert_eq!(opts.cycles, 1);
        assert!(!opts.serve);
    }

    #[test]
    fn supports_config_cli() {
        let opts = parse_args_from(args(&["--config", "network.toml", "--cycles", "3"]))
            .expect("parse should succeed");
        assert_eq!(
            opts.config.as_deref().and_then(|p| p.to_str()),
            Some("network.toml")
        );
        assert!(opts.preset.is_none());
        assert_eq!(opts.cycles, 3);
    }

    #[test]
    fn config_and_preset_exclusive() {
        let err = parse_args_from(args(&["--config", "a.toml", "--preset", "demo"])).unwrap_err();
        assert!(err.contains("mutually exclusive"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse_args_from(args(&["--seed", "abc"])).is_err());
        assert!(parse_args_from(args(&["--cycles", "0"])).is_err());
        assert!(parse_args_from(args(&["--noise", "-1"])).is_err());
        assert!(parse_args_from(args(&["--seed", "1", "--seed", "2"])).is_err());
        assert!(parse_args_from(args(&["--frobnicate"])).is_err());
    }
}
