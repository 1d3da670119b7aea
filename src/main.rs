//
// GenCam - GenICam camera configuration and frame acquisition
// Copyright (c) 2020-2024 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Entry point of the `gencam` executable: opens a camera, configures it and captures a number of frames.
//!

mod args;

use gencam::{CameraError, ConfigurationRequest, GenCam};
use gencam::camera::drivers;
use gencam::config::{self, ConfigError};

pub const VERSION_STRING: &'static str = include_str!(concat!(env!("OUT_DIR"), "/version"));

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("no camera drivers available")]
    NoDrivers
}

fn main() {
    let args = args::parse_command_line(std::env::args());

    set_up_logging(args.logging);

    log::info!("GenCam ver. {} started", VERSION_STRING);

    if let Err(e) = run(&args) {
        log::error!("{}", e);
        eprintln!("Error: {}.", e);
        std::process::exit(1);
    }
}

fn load_request(args: &args::Args) -> Result<ConfigurationRequest, ConfigError> {
    let mut request = match &args.config_file {
        Some(path) => config::load_request(path)?,
        None => {
            let path = config::config_file_path();
            if path.exists() {
                config::load_request(&path)?
            } else {
                log::info!("no configuration file at {}, using defaults", path.to_string_lossy());
                ConfigurationRequest::default()
            }
        }
    };

    if args.serial_number.is_some() { request.serial_number = args.serial_number.clone(); }
    if args.use_defaults { request.use_default_properties = true; }

    Ok(request)
}

/// Opens the first camera found; drivers are tried in initialization order.
fn open_camera(args: &args::Args, request: &ConfigurationRequest) -> Result<GenCam, AppError> {
    let disabled_drivers: &[&str] = if args.simulator { &["camera_spinnaker"] } else { &[] };
    let mut drivers = drivers::init_drivers(disabled_drivers);
    if drivers.is_empty() {
        return Err(AppError::NoDrivers);
    }

    let mut last_error = CameraError::NoDevice;
    for driver in drivers.iter_mut() {
        match GenCam::open(driver.as_mut(), request) {
            Ok(camera) => return Ok(camera),
            Err(e @ CameraError::NoDevice) | Err(e @ CameraError::DeviceNotFound(_)) => {
                log::info!("{} driver: {}", driver.name(), e);
                last_error = e;
            },
            Err(e) => return Err(e.into())
        }
    }

    Err(last_error.into())
}

fn run(args: &args::Args) -> Result<(), AppError> {
    let request = load_request(args)?;
    let mut camera = open_camera(args, &request)?;

    let output_format = camera.output_format();
    println!("Capturing {} frame(s) as {}, format {}.", args.num_frames, output_format.media_type, output_format.format);

    for i in 1..=args.num_frames {
        match camera.request_frame() {
            Ok(frame) => println!("frame {}: {} bytes, timestamp {} ns", i, frame.size(), frame.timestamp_ns),
            Err(e) => {
                log::warn!("frame {}: {}", i, e);
                println!("frame {}: {}", i, e);
            }
        }
    }

    camera.close();

    Ok(())
}

/// Logs to a timestamped file if `to_file`, otherwise to the terminal.
fn set_up_logging(to_file: bool) {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        log::error!("{}\n\n{}", info, backtrace);
    }));

    let tz_offset = chrono::Local::now().offset().clone();
    let config = simplelog::ConfigBuilder::new()
        .set_target_level(simplelog::LevelFilter::Error)
        .set_time_offset(
            time::UtcOffset::from_whole_seconds(tz_offset.local_minus_utc()).unwrap_or(time::UtcOffset::UTC)
        )
        .set_time_format_custom(simplelog::format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]"
        ))
        .build();

    let result = if to_file {
        let logfile = dirs::data_dir().unwrap_or_default()
            .join(format!("gencam_{}.log", chrono::Local::now().format("%Y-%m-%d_%H%M%S")));
        println!("Logging to: {}", logfile.to_string_lossy());
        match std::fs::File::create(&logfile) {
            Ok(file) => simplelog::WriteLogger::init(simplelog::LevelFilter::Info, config, file),
            Err(e) => {
                eprintln!("Cannot create log file {}: {}.", logfile.to_string_lossy(), e);
                return;
            }
        }
    } else {
        simplelog::TermLogger::init(
            simplelog::LevelFilter::Info,
            config,
            simplelog::TerminalMode::Stderr,
            simplelog::ColorChoice::Auto
        )
    };

    if let Err(e) = result {
        eprintln!("Failed to set up logging: {}.", e);
    }
}
