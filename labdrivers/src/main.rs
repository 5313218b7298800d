use std::process::exit;
use std::time::Duration;

use clap::{crate_authors, crate_version, App as ClapApp, Arg};
use env_logger::Env;

use labdrivers::monitor::{self, LineEnding, MonitorOptions};
use labdrivers::transport::serial::list_devices;

fn main() {
    let matches = ClapApp::new("Serial monitor")
        .author(crate_authors!())
        .version(crate_version!())
        .about("Interactive console for serial instruments")
        .arg(
            Arg::with_name("port")
                .long("port")
                .short('p')
                .takes_value(true)
                .required_unless_present("list")
                .help("Serial port, e.g. COM3 or /dev/ttyUSB0."),
        )
        .arg(
            Arg::with_name("baudrate")
                .long("baudrate")
                .short('b')
                .default_value("9600")
                .help("Baud rate."),
        )
        .arg(
            Arg::with_name("eol")
                .long("eol")
                .possible_values(["none", "LF", "CR", "CRLF"])
                .default_value("LF")
                .help("Line ending appended to every line sent."),
        )
        .arg(
            Arg::with_name("timeout")
                .long("timeout")
                .takes_value(true)
                .help("Read timeout in seconds."),
        )
        .arg(Arg::with_name("list").long("list").short('l').help("List serial ports and exit"))
        .arg(Arg::with_name("verbose").long("verbose").short('v').help("Log verbose output"))
        .get_matches();

    if matches.is_present("verbose") {
        env_logger::Builder::from_env(Env::default().default_filter_or("labdrivers=debug")).init();
    } else {
        env_logger::init();
    }

    if matches.is_present("list") {
        match list_devices() {
            Ok(ports) => {
                for port in ports {
                    println!("{}", port);
                }
                return;
            }
            Err(e) => {
                println!("Error: {}", e);
                exit(1);
            }
        }
    }

    let port = matches.value_of("port").unwrap_or_default();
    let baudrate = matches.value_of("baudrate").unwrap_or("9600");
    let baudrate = match baudrate.parse::<u32>() {
        Ok(baudrate) => baudrate,
        Err(_) => {
            println!("Cannot parse `{}` as a baud rate.", baudrate);
            exit(1);
        }
    };
    let line_ending = match matches.value_of("eol").unwrap_or("LF").parse::<LineEnding>() {
        Ok(x) => x,
        Err(e) => {
            println!("Error: {}", e);
            exit(1);
        }
    };
    let timeout = matches.value_of("timeout").map(|timeout| match timeout.parse::<f64>() {
        Ok(x) if x.is_finite() && x > 0.0 => Duration::from_secs_f64(x),
        _ => {
            println!("Cannot parse `{}` as a timeout.", timeout);
            exit(1);
        }
    });

    let mut options = MonitorOptions::new(port, baudrate);
    options.line_ending = line_ending;
    options.timeout = timeout;

    if let Err(e) = monitor::run(&options) {
        println!("Error: {}", e);
        exit(1);
    }
    log::debug!("Monitor quitting.");
}
