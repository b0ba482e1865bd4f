use clap::{value_parser, Arg, ArgMatches, Command};
use lidar_stream::{ClientConfig, ErrorKind, LidarClient, Revolution, ScanMode};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn cli() -> Command {
    Command::new("lidar-scan")
        .about("Reads revolutions from a lidar-server.")
        .disable_version_flag(true)
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .help("TOML file with a [lidar] table"),
        )
        .arg(Arg::new("host").long("host").help("Server address"))
        .arg(
            Arg::new("port")
                .long("port")
                .value_parser(value_parser!(u16))
                .help("Server port"),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .value_parser(|s: &str| s.parse::<ScanMode>())
                .help("Scan mode to request: standard or express"),
        )
        .arg(
            Arg::new("revs")
                .long("revs")
                .value_parser(value_parser!(u64))
                .help("Stop after this many revolutions [default: until Ctrl-C]"),
        )
        .subcommand(Command::new("stats").about("Prints diagnostics for every revolution"))
        .subcommand(
            Command::new("jsonl")
                .about("Writes one JSON object per revolution")
                .arg(
                    Arg::new("out")
                        .long("out")
                        .short('o')
                        .help("Output file [default: stdout]"),
                ),
        )
}

fn load_config(matches: &ArgMatches) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };
    if let Some(host) = matches.get_one::<String>("host") {
        config.host = host.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }
    if let Some(mode) = matches.get_one::<ScanMode>("mode") {
        config.scan_mode = *mode;
    }
    Ok(config)
}

#[derive(Serialize)]
struct RevolutionRecord<'a> {
    rev_index: u64,
    timestamp_iso: String,
    scan_mode: ScanMode,
    points: &'a Revolution,
}

enum Output {
    Stats,
    Jsonl(Box<dyn Write>),
}

impl Output {
    fn from_matches(matches: &ArgMatches) -> io::Result<Output> {
        match matches.subcommand() {
            Some(("jsonl", sub)) => {
                let writer: Box<dyn Write> = match sub.get_one::<String>("out") {
                    Some(path) => Box::new(BufWriter::new(File::create(path)?)),
                    None => Box::new(io::stdout()),
                };
                Ok(Output::Jsonl(writer))
            }
            _ => Ok(Output::Stats),
        }
    }

    fn emit(&mut self, index: u64, mode: ScanMode, revolution: &Revolution) -> io::Result<()> {
        match self {
            Output::Stats => {
                print_stats(index, revolution);
                Ok(())
            }
            Output::Jsonl(writer) => {
                let record = RevolutionRecord {
                    rev_index: index,
                    timestamp_iso: chrono::Utc::now().to_rfc3339(),
                    scan_mode: mode,
                    points: revolution,
                };
                serde_json::to_writer(&mut *writer, &record)?;
                writeln!(writer)?;
                writer.flush()
            }
        }
    }
}

fn or_na(value: Option<f32>, precision: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.precision$}"))
}

fn print_stats(index: u64, revolution: &Revolution) {
    let stats = revolution.stats();
    println!(
        "Rev #{index}: {}/{} valid ({:.0}%), mean quality {}, coverage {:.1} deg, \
         distance {}..{} mm, {:.2} pts/deg",
        stats.valid,
        stats.total,
        stats.valid_ratio() * 100.,
        or_na(stats.mean_quality, 1),
        stats.angular_coverage(),
        or_na(stats.min_distance, 0),
        or_na(stats.max_distance, 0),
        stats.density(),
    );
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let matches = cli().get_matches();
    let config = load_config(&matches)?;
    let max_revs = matches.get_one::<u64>("revs").copied();
    let mut output = Output::from_matches(&matches)?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))?;

    let mode = config.scan_mode;
    let mut client = LidarClient::new(config);
    let mut session = client.session()?;

    let mut received = 0u64;
    while running.load(Ordering::SeqCst) && max_revs.map_or(true, |max| received < max) {
        match session.get_revolution() {
            Ok(revolution) => {
                output.emit(received, mode, &revolution)?;
                received += 1;
            }
            Err(e) if e.kind() == ErrorKind::Timeout && session.is_connected() => {
                log::warn!("No revolution yet: {e}");
            }
            Err(e) if session.is_connected() => log::warn!("Skipping frame: {e}"),
            Err(e) => {
                log::warn!("{e}, reconnecting");
                session.connect_with_retry()?;
            }
        }
    }
    log::info!("Received {received} revolutions");
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}
