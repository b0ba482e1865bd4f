use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use lidar_stream::{RplidarSensor, Sensor, Server, ServerConfig, SimulatedSensor};

fn cli() -> Command {
    Command::new("lidar-server")
        .about("Streams RPLIDAR revolutions to one TCP client at a time.")
        .disable_version_flag(true)
        .arg(
            Arg::new("serial-port")
                .long("serial-port")
                .help("Serial device of the sensor [env: LIDAR_SERIAL_PORT, default: /dev/ttyUSB0]"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .help("Address to listen on [env: LIDAR_TCP_HOST, default: 0.0.0.0]"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_parser(value_parser!(u16))
                .help("TCP port to listen on [env: LIDAR_TCP_PORT, default: 5000]"),
        )
        .arg(
            Arg::new("simulate")
                .long("simulate")
                .action(ArgAction::SetTrue)
                .help("Serve synthetic revolutions instead of opening the serial port"),
        )
}

fn apply_overrides(config: &mut ServerConfig, matches: &ArgMatches) {
    if let Some(serial_port) = matches.get_one::<String>("serial-port") {
        config.serial_port = serial_port.clone();
    }
    if let Some(host) = matches.get_one::<String>("host") {
        config.bind_host = host.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.bind_port = *port;
    }
}

fn serve<S: Sensor>(config: ServerConfig, sensor: S) -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::bind(config, sensor)?;
    let shutdown = server.shutdown_handle();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        shutdown.request();
    })?;
    server.serve()?;
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let matches = cli().get_matches();
    let mut config = ServerConfig::from_env()?;
    apply_overrides(&mut config, &matches);

    if matches.get_flag("simulate") {
        log::info!("Using the simulated sensor");
        serve(config, SimulatedSensor::default())
    } else {
        log::info!("Opening sensor on {}", config.serial_port);
        let sensor = RplidarSensor::open(&config.serial_port)?;
        serve(config, sensor)
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
    log::info!("Server closed");
}
