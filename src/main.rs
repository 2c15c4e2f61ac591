use anyhow::Context;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::process;

use portprobe::config::{parse_port_spec, ScanConfig};
use portprobe::output::{OutputConfig, OutputFormat, OutputManager, ProgressDisplay};
use portprobe::scanner::ScanEngine;

fn build_cli() -> Command {
    Command::new("portprobe")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Event-driven TCP connect scanner with banner-based service detection")
        .arg(
            Arg::new("target")
                .value_name("TARGET")
                .help("Target to scan (hostname or IP literal)")
                .index(1),
        )
        .arg(
            Arg::new("ports")
                .short('p')
                .long("ports")
                .value_name("PORTS")
                .help("Ports to scan (e.g. 80, 80,443, 1-1024)")
                .default_value("1-1000"),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("MS")
                .help("Per-connect deadline in milliseconds")
                .value_parser(clap::value_parser!(u64))
                .default_value("3000"),
        )
        .arg(
            Arg::new("concurrency")
                .short('c')
                .long("concurrency")
                .value_name("COUNT")
                .help("Maximum simultaneous connection attempts")
                .value_parser(clap::value_parser!(usize))
                .default_value("100"),
        )
        .arg(
            Arg::new("ip-version")
                .long("ip-version")
                .value_name("VERSION")
                .help("Socket family selection")
                .value_parser(["ipv4", "ipv6", "auto"])
                .default_value("auto"),
        )
        .arg(
            Arg::new("no-service-detection")
                .long("no-service-detection")
                .help("Skip service identification on open ports")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-banner-grab")
                .long("no-banner-grab")
                .help("Skip banner grabbing on open ports")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .help("Result format")
                .value_parser(["txt", "json", "xml"])
                .default_value("txt"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Write results to a file instead of stdout"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Load scan options from a JSON or XML config file"),
        )
        .arg(
            Arg::new("show-closed")
                .long("show-closed")
                .help("Include closed and filtered ports in text output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-progress")
                .long("no-progress")
                .help("Disable the progress bar")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable colored output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Verbose logging")
                .action(ArgAction::SetTrue),
        )
}

fn from_cli(set: &ArgMatches, id: &str) -> bool {
    set.value_source(id) == Some(ValueSource::CommandLine)
}

/// Command-line values override whatever the config file provided. When no
/// file was loaded, clap's defaults fill in the remaining options.
fn apply_cli_overrides(
    config: &mut ScanConfig,
    matches: &ArgMatches,
    file_loaded: bool,
) -> anyhow::Result<()> {
    if let Some(target) = matches.get_one::<String>("target") {
        config.target = target.clone();
    }
    if from_cli(matches, "ports") || !file_loaded {
        let spec = matches.get_one::<String>("ports").unwrap();
        config.ports = parse_port_spec(spec).with_context(|| format!("bad port spec {spec:?}"))?;
    }
    if from_cli(matches, "timeout") || !file_loaded {
        config.timeout = *matches.get_one::<u64>("timeout").unwrap();
    }
    if from_cli(matches, "concurrency") || !file_loaded {
        config.concurrency = *matches.get_one::<usize>("concurrency").unwrap();
    }
    if from_cli(matches, "ip-version") || !file_loaded {
        config.ip_version = matches.get_one::<String>("ip-version").unwrap().parse()?;
    }
    if matches.get_flag("no-service-detection") {
        config.service_detection = false;
    }
    if matches.get_flag("no-banner-grab") {
        config.banner_grabbing = false;
    }
    if from_cli(matches, "format") || !file_loaded {
        config.output_format = matches.get_one::<String>("format").unwrap().clone();
    }
    if let Some(output) = matches.get_one::<String>("output") {
        config.output_file = Some(output.clone());
    }
    if matches.get_flag("verbose") {
        config.verbose = true;
    }
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let matches = build_cli().get_matches();

    let file_loaded = matches.get_one::<String>("config").is_some();
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => {
            ScanConfig::from_file(path).with_context(|| format!("loading config {path}"))?
        }
        None => ScanConfig::default(),
    };
    apply_cli_overrides(&mut config, &matches, file_loaded)?;

    env_logger::Builder::from_default_env()
        .filter_level(if config.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .init();

    if matches.get_one::<String>("target").is_none() && !file_loaded {
        anyhow::bail!("no target given (pass a TARGET argument or --config)");
    }

    let format: OutputFormat = config
        .output_format
        .parse()
        .with_context(|| format!("bad output format {:?}", config.output_format))?;

    let target = config.target.clone();
    let output = OutputConfig {
        format,
        file: config.output_file.clone(),
        colored: !matches.get_flag("no-color") && config.output_file.is_none(),
        show_closed: matches.get_flag("show-closed"),
    };

    let mut engine = ScanEngine::new(config).context("scan setup failed")?;
    let total = engine.config().ports.len();

    let show_progress =
        !matches.get_flag("no-progress") && format == OutputFormat::Text && output.file.is_none();

    let report = if show_progress {
        let mut display = ProgressDisplay::new(total);
        let report = engine.scan_with_progress(|completed, _| display.update(completed))?;
        display.finish();
        report
    } else {
        engine.scan()?
    };

    OutputManager::new(output).write_report(&report, &target)?;
    Ok(())
}
