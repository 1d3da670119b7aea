//
// GenCam - GenICam camera configuration and frame acquisition
// Copyright (c) 2023-2024 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Command-line argument parsing.
//!

use std::path::PathBuf;

mod cmdline {
    pub const ENABLE_LOGGING: &str = "log";
    pub const CONFIG_FILE: &str = "config";
    pub const NUM_FRAMES: &str = "frames";
    pub const SERIAL_NUMBER: &str = "serial";
    pub const SIMULATOR: &str = "simulator";
    pub const USE_DEFAULTS: &str = "use-defaults";
}

const DEFAULT_NUM_FRAMES: usize = 10;

#[derive(Debug, PartialEq)]
pub struct Args {
    pub logging: bool,
    pub config_file: Option<PathBuf>,
    pub num_frames: usize,
    pub serial_number: Option<String>,
    /// Use only the camera simulator.
    pub simulator: bool,
    /// Apply default values of properties not given in the configuration file.
    pub use_defaults: bool
}

impl Default for Args {
    fn default() -> Args {
        Args{
            logging: false,
            config_file: None,
            num_frames: DEFAULT_NUM_FRAMES,
            serial_number: None,
            simulator: false,
            use_defaults: false
        }
    }
}

/// Returns the last value given for `option`.
fn single_value<'a>(
    option_values: &'a std::collections::HashMap<String, Vec<String>>,
    option: &str
) -> Option<&'a String> {
    option_values.get(option).and_then(|values| values.last())
}

pub fn parse_command_line<I: Iterator<Item=String>>(stream: I) -> Args {
    let allowed_options = vec![
        cmdline::ENABLE_LOGGING,
        cmdline::CONFIG_FILE,
        cmdline::NUM_FRAMES,
        cmdline::SERIAL_NUMBER,
        cmdline::SIMULATOR,
        cmdline::USE_DEFAULTS
    ];

    // key: option name
    let mut option_values = std::collections::HashMap::<String, Vec<String>>::new();

    let mut current: Option<&mut Vec<String>> = None;

    for arg in stream.skip(1) /*skip the binary name*/ {
        if arg.starts_with("--") {
            match &arg[2..] {
                x if !allowed_options.contains(&x) => {
                    eprintln!("Unknown command-line option: {}.", x);
                    return Args::default();
                },

                opt => current = Some(option_values.entry(opt.to_string()).or_insert(vec![])),
            }
        } else {
            match current.as_mut() {
                Some(values) => values.push(arg),
                None => {
                    eprintln!("Unexpected value: {}.", arg);
                    return Args::default();
                }
            }
        }
    }

    let num_frames = match single_value(&option_values, cmdline::NUM_FRAMES) {
        Some(value) => match value.parse::<usize>() {
            Ok(n) => n,
            Err(_) => {
                eprintln!("Invalid number of frames: {}.", value);
                return Args::default();
            }
        },
        None => DEFAULT_NUM_FRAMES
    };

    Args{
        logging: option_values.contains_key(cmdline::ENABLE_LOGGING),
        config_file: single_value(&option_values, cmdline::CONFIG_FILE).map(PathBuf::from),
        num_frames,
        serial_number: single_value(&option_values, cmdline::SERIAL_NUMBER).cloned(),
        simulator: option_values.contains_key(cmdline::SIMULATOR),
        use_defaults: option_values.contains_key(cmdline::USE_DEFAULTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        parse_command_line(std::iter::once("gencam").chain(args.iter().copied()).map(|s| s.to_string()))
    }

    #[test]
    fn given_no_arguments_defaults_are_used() {
        assert_eq!(Args::default(), parse(&[]));
    }

    #[test]
    fn given_all_options_they_are_parsed() {
        let args = parse(&[
            "--log", "--config", "/tmp/cam.toml", "--frames", "25", "--serial", "19120731", "--simulator",
            "--use-defaults"
        ]);

        assert!(args.logging);
        assert_eq!(Some(PathBuf::from("/tmp/cam.toml")), args.config_file);
        assert_eq!(25, args.num_frames);
        assert_eq!(Some("19120731".to_string()), args.serial_number);
        assert!(args.simulator);
        assert!(args.use_defaults);
    }

    #[test]
    fn given_unknown_option_defaults_are_used() {
        assert_eq!(Args::default(), parse(&["--simulator", "--verbose"]));
    }

    #[test]
    fn given_value_without_option_defaults_are_used() {
        assert_eq!(Args::default(), parse(&["25"]));
    }

    #[test]
    fn given_invalid_frame_count_defaults_are_used() {
        assert_eq!(Args::default(), parse(&["--frames", "many"]));
    }
}
