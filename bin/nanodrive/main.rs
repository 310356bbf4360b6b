use chrono::Utc;
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{LevelFilter, error, info};
use serde_json::json;
use std::path::PathBuf;

use nanodrive::{
    AppConfig, Axis, CancelToken, MadlibInterface, NanoDrive, Settle, StageError,
    load_config_or_default,
};

/// Nano-Drive stage control
#[derive(Parser, Debug)]
#[command(name = "nanodrive")]
#[command(about = "Closed-loop positioning for Mad City Labs Nano-Drive stages", long_about = None)]
struct Args {
    /// Path to configuration file (defaults to nanodrive.toml or config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Print the result as JSON on stdout
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show product information and calibration
    Info,
    /// Read the position of one axis
    Get {
        axis: Axis,
        /// Number of readings to average
        #[arg(short, long, default_value_t = 1)]
        samples: u32,
    },
    /// Command a position without waiting for the stage to settle
    Set {
        axis: Axis,
        /// Position in µm, before the configured offset
        value: f64,
        /// Poll reads until the axis settles
        #[arg(short, long)]
        wait: bool,
        /// Readings averaged per poll when waiting
        #[arg(short, long, default_value_t = 1)]
        samples: u32,
    },
    /// Command a position and retry until it is within tolerance
    Verify {
        axis: Axis,
        /// Position in µm, before the configured offset
        value: f64,
        /// Readings blended into the first measurement
        #[arg(short, long)]
        samples: Option<u32>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config_or_default(args.config.as_deref());

    let log_level = args
        .log_level
        .clone()
        .unwrap_or(config.logging.log_level.clone());
    initialize_logging(&log_level)?;

    let cancel = setup_shutdown_handler()?;

    #[cfg(feature = "madlib")]
    let lib = nanodrive::Madlib::new();
    #[cfg(not(feature = "madlib"))]
    let lib = {
        log::warn!("Built without the `madlib` feature, driving the simulated stage");
        nanodrive::SimulatedMadlib::new(config.simulator.clone())
    };

    let mut stage = NanoDrive::new(lib, &config)?;
    stage.set_cancel_token(cancel);

    let result = run_command(&mut stage, &args, &config);
    stage.disconnect();

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("{e}");
            if args.json {
                print_json(&json!({
                    "timestamp": Utc::now().to_rfc3339(),
                    "error": e.to_string(),
                    "code": e.code().map(|code| code.name()),
                }))?;
            }
            Err(e.into())
        }
    }
}

fn run_command<L: MadlibInterface>(
    stage: &mut NanoDrive<L>,
    args: &Args,
    config: &AppConfig,
) -> Result<(), StageError> {
    match args.command {
        Command::Info => {
            stage.print_device_info()?;
            if args.json {
                print_json(&json!({
                    "timestamp": Utc::now().to_rfc3339(),
                    "handle": stage.handle()?.0,
                    "product_info": stage.product_info(),
                    "calibration": Axis::ALL.map(|axis| stage.calibration_entry(axis)),
                    "positions": Axis::ALL.map(|axis| stage.cached_position(axis)),
                }))?;
            } else {
                for axis in Axis::ALL {
                    let entry = stage.calibration_entry(axis);
                    println!(
                        "{axis}: range {} µm, offset {} µm, tolerance {} µm, at {:?} µm",
                        entry.max_travel_um,
                        entry.offset_um,
                        entry.tolerance_um,
                        stage.cached_position(axis)
                    );
                }
            }
        }
        Command::Get { axis, samples } => {
            let position = stage.get_position(axis, samples)?;
            if args.json {
                print_json(&json!({
                    "timestamp": Utc::now().to_rfc3339(),
                    "axis": axis,
                    "samples": samples,
                    "position_um": position,
                }))?;
            } else {
                println!("{axis}: {position:.4} µm");
            }
        }
        Command::Set {
            axis,
            value,
            wait: false,
            ..
        } => {
            stage.set_position(axis, value)?;
            info!("Axis {axis} commanded to {value} µm");
            if args.json {
                print_json(&json!({
                    "timestamp": Utc::now().to_rfc3339(),
                    "axis": axis,
                    "requested_um": value,
                }))?;
            }
        }
        Command::Set {
            axis,
            value,
            wait: true,
            samples,
        } => {
            let settle = stage.set_position_and_wait(axis, value, samples)?;
            report_settle(&settle, value, args.json)?;
        }
        Command::Verify {
            axis,
            value,
            samples,
        } => {
            let samples = samples.unwrap_or(config.motion.verify_samples);
            let settle = stage.set_verify_position(axis, value, samples)?;
            report_settle(&settle, value, args.json)?;
        }
    }
    Ok(())
}

fn report_settle(settle: &Settle, requested_um: f64, as_json: bool) -> Result<(), StageError> {
    if as_json {
        print_json(&json!({
            "timestamp": Utc::now().to_rfc3339(),
            "requested_um": requested_um,
            "settle": settle,
            "deviation_um": settle.deviation_um(),
        }))?;
    } else if settle.settled {
        println!(
            "{}: {:.4} µm after {} retries",
            settle.axis, settle.position_um, settle.attempts
        );
    } else {
        println!(
            "{}: not settled, last reading {:.4} µm ({:.4} µm from target)",
            settle.axis,
            settle.position_um,
            settle.deviation_um()
        );
    }
    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<(), StageError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| StageError::Io(std::io::Error::other(e)))?;
    println!("{text}");
    Ok(())
}

/// Cancel running settle loops on Ctrl+C
fn setup_shutdown_handler() -> Result<CancelToken, Box<dyn std::error::Error>> {
    let token = CancelToken::new();
    let handler_token = token.clone();

    ctrlc::set_handler(move || {
        info!("Ctrl+C received - cancelling current move...");
        handler_token.cancel();
    })?;

    Ok(token)
}

fn initialize_logging(log_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => {
            eprintln!("Warning: Invalid log level '{}', using 'info'", log_level);
            LevelFilter::Info
        }
    };

    env_logger::Builder::from_env(Env::default())
        .filter_level(level)
        .format_timestamp_millis()
        .init();

    Ok(())
}
