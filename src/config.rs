//
// GenCam - GenICam camera configuration and frame acquisition
// Copyright (c) 2020-2024 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Configuration file.
//!
//! A TOML file with one table per group of camera properties. Every key present overrides the library default and
//! is applied explicitly; keys set to the "unset" value (empty string, or the numeric sentinels below) disable the
//! property. Example:
//!
//! ```toml
//! [device]
//! serial_number = "19120731"
//! use_default_properties = false
//!
//! [image]
//! width = 1920
//! height = 1080
//! pixel_format = "bayerrggb"
//!
//! [exposure]
//! auto = "Off"
//! time = 8000.0
//!
//! [trigger]
//! source = "Line1"
//! hw_timeout = 5
//!
//! [acquisition]
//! mode = "SingleFrame"
//! ```
//!

use crate::camera::params::{ConfigurationRequest, Setting};
use crate::camera::pixel_format::PixelFormat;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "gencam.toml";

mod unset {
    /// Gain, black level, balance ratio.
    pub const LEVEL: f64 = 9999.0;
    /// Exposure time, trigger delay.
    pub const TIME: f64 = -1.0;
    pub const PACKET_DELAY: i64 = -1;
    /// Binning, decimation, trigger multiplier/divider, packet size.
    pub const FACTOR: i64 = 0;
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value of \"{key}\": {value}")]
    InvalidValue { key: String, value: String }
}

fn invalid_value<T: std::fmt::Display>(group: &str, key: &str, value: T) -> ConfigError {
    ConfigError::InvalidValue{ key: format!("{}.{}", group, key), value: value.to_string() }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    device: DeviceGroup,
    image: ImageGroup,
    binning: BinningGroup,
    exposure: ExposureGroup,
    gain: GainGroup,
    black_level: BlackLevelGroup,
    gamma: GammaGroup,
    white_balance: WhiteBalanceGroup,
    trigger: TriggerGroup,
    acquisition: AcquisitionGroup,
    transport: TransportGroup
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DeviceGroup {
    serial_number: Option<String>,
    use_default_properties: Option<bool>,
    reset: Option<bool>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ImageGroup {
    width: Option<i64>,
    height: Option<i64>,
    offset_x: Option<i64>,
    offset_y: Option<i64>,
    pixel_format: Option<String>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BinningGroup {
    selector: Option<String>,
    horizontal_mode: Option<String>,
    horizontal: Option<i64>,
    vertical_mode: Option<String>,
    vertical: Option<i64>,
    decimation_horizontal: Option<i64>,
    decimation_vertical: Option<i64>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ExposureGroup {
    mode: Option<String>,
    auto: Option<String>,
    time_selector: Option<String>,
    time: Option<f64>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct GainGroup {
    selector: Option<String>,
    auto: Option<String>,
    auto_balance: Option<String>,
    value: Option<f64>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BlackLevelGroup {
    selector: Option<String>,
    auto: Option<String>,
    value: Option<f64>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct GammaGroup {
    selector: Option<String>,
    value: Option<f64>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct WhiteBalanceGroup {
    auto: Option<String>,
    ratio_selector: Option<String>,
    ratio: Option<f64>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TriggerGroup {
    selector: Option<String>,
    activation: Option<String>,
    source: Option<String>,
    multiplier: Option<i64>,
    divider: Option<i64>,
    delay: Option<f64>,
    overlap: Option<String>,
    /// Number of grab attempts in triggered acquisition.
    hw_timeout: Option<i64>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AcquisitionGroup {
    mode: Option<String>,
    /// 0 keeps the camera's current frame rate.
    frame_rate: Option<f64>,
    device_clock_selector: Option<String>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TransportGroup {
    throughput_limit: Option<i64>,
    packet_size: Option<i64>,
    packet_delay: Option<i64>
}

fn set_string(setting: &mut Setting<String>, value: Option<String>) {
    if let Some(value) = value {
        *setting = if value.is_empty() { Setting::Unset } else { Setting::Explicit(value) };
    }
}

fn set_value<T: PartialEq>(setting: &mut Setting<T>, value: Option<T>, unset: T) {
    if let Some(value) = value {
        *setting = if value == unset { Setting::Unset } else { Setting::Explicit(value) };
    }
}

fn set_explicit<T>(setting: &mut Setting<T>, value: Option<T>) {
    if let Some(value) = value {
        *setting = Setting::Explicit(value);
    }
}

fn validate(file: &ConfigFile) -> Result<(), ConfigError> {
    for (key, value) in [("width", file.image.width), ("height", file.image.height)].iter() {
        if let Some(value) = value {
            if *value <= 0 { return Err(invalid_value("image", key, value)); }
        }
    }

    if let Some(name) = &file.image.pixel_format {
        if !name.is_empty() && name.parse::<PixelFormat>().is_err() {
            return Err(invalid_value("image", "pixel_format", name));
        }
    }

    for (key, mode) in [
        ("horizontal_mode", &file.binning.horizontal_mode),
        ("vertical_mode", &file.binning.vertical_mode)
    ].iter() {
        if let Some(mode) = mode {
            if !(mode.is_empty() || mode.eq_ignore_ascii_case("sum") || mode.eq_ignore_ascii_case("average")) {
                return Err(invalid_value("binning", key, mode));
            }
        }
    }

    if let Some(rate) = file.acquisition.frame_rate {
        if !(rate >= 0.0) { return Err(invalid_value("acquisition", "frame_rate", rate)); }
    }

    Ok(())
}

/// Parses configuration file contents on top of the library defaults.
pub fn parse_request(contents: &str) -> Result<ConfigurationRequest, ConfigError> {
    let file: ConfigFile = toml::from_str(contents)?;
    validate(&file)?;

    let mut request = ConfigurationRequest::default();
    let r = &mut request;

    r.serial_number = file.device.serial_number.filter(|s| !s.is_empty());
    if let Some(use_defaults) = file.device.use_default_properties { r.use_default_properties = use_defaults; }
    if let Some(reset) = file.device.reset { r.device_reset = reset; }

    set_explicit(&mut r.width, file.image.width);
    set_explicit(&mut r.height, file.image.height);
    set_explicit(&mut r.offset_x, file.image.offset_x);
    set_explicit(&mut r.offset_y, file.image.offset_y);
    set_string(&mut r.pixel_format, file.image.pixel_format);

    set_string(&mut r.binning_selector, file.binning.selector);
    set_string(&mut r.binning_horizontal_mode, file.binning.horizontal_mode);
    set_value(&mut r.binning_horizontal, file.binning.horizontal, unset::FACTOR);
    set_string(&mut r.binning_vertical_mode, file.binning.vertical_mode);
    set_value(&mut r.binning_vertical, file.binning.vertical, unset::FACTOR);
    set_value(&mut r.decimation_horizontal, file.binning.decimation_horizontal, unset::FACTOR);
    set_value(&mut r.decimation_vertical, file.binning.decimation_vertical, unset::FACTOR);

    set_string(&mut r.exposure_mode, file.exposure.mode);
    set_string(&mut r.exposure_auto, file.exposure.auto);
    set_string(&mut r.exposure_time_selector, file.exposure.time_selector);
    set_value(&mut r.exposure_time, file.exposure.time, unset::TIME);

    set_string(&mut r.gain_selector, file.gain.selector);
    set_string(&mut r.gain_auto, file.gain.auto);
    set_string(&mut r.gain_auto_balance, file.gain.auto_balance);
    set_value(&mut r.gain, file.gain.value, unset::LEVEL);

    set_string(&mut r.black_level_selector, file.black_level.selector);
    set_string(&mut r.black_level_auto, file.black_level.auto);
    set_value(&mut r.black_level, file.black_level.value, unset::LEVEL);

    set_string(&mut r.gamma_selector, file.gamma.selector);
    set_explicit(&mut r.gamma, file.gamma.value);

    set_string(&mut r.balance_white_auto, file.white_balance.auto);
    set_string(&mut r.balance_ratio_selector, file.white_balance.ratio_selector);
    set_value(&mut r.balance_ratio, file.white_balance.ratio, unset::LEVEL);

    set_string(&mut r.trigger_selector, file.trigger.selector);
    set_string(&mut r.trigger_activation, file.trigger.activation);
    set_string(&mut r.trigger_source, file.trigger.source);
    set_value(&mut r.trigger_multiplier, file.trigger.multiplier, unset::FACTOR);
    set_value(&mut r.trigger_divider, file.trigger.divider, unset::FACTOR);
    set_value(&mut r.trigger_delay, file.trigger.delay, unset::TIME);
    set_string(&mut r.trigger_overlap, file.trigger.overlap);
    if let Some(timeout) = file.trigger.hw_timeout { r.hw_trigger_timeout = timeout; }

    set_string(&mut r.acquisition_mode, file.acquisition.mode);
    set_explicit(&mut r.acquisition_frame_rate, file.acquisition.frame_rate);
    set_string(&mut r.device_clock_selector, file.acquisition.device_clock_selector);

    set_explicit(&mut r.device_link_throughput_limit, file.transport.throughput_limit);
    set_value(&mut r.packet_size, file.transport.packet_size, unset::FACTOR);
    set_value(&mut r.packet_delay, file.transport.packet_delay, unset::PACKET_DELAY);

    Ok(request)
}

pub fn load_request(path: &Path) -> Result<ConfigurationRequest, ConfigError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Io{ path: path.to_path_buf(), source })?;
    log::info!("loading configuration from {}", path.to_string_lossy());
    parse_request(&contents)
}

pub fn config_file_path() -> PathBuf {
    dirs::config_dir().unwrap_or_default().join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_empty_file_library_defaults_are_kept() {
        let request = parse_request("").unwrap();

        assert_eq!(Setting::Default(7680), request.width);
        assert_eq!(Setting::Default("Once".to_string()), request.exposure_auto);
        assert_eq!(10, request.hw_trigger_timeout);
        assert!(!request.use_default_properties);
    }

    #[test]
    fn given_keys_present_they_become_explicit() {
        let request = parse_request(r#"
            [device]
            serial_number = "19120731"
            use_default_properties = true

            [image]
            width = 1920
            pixel_format = "bayerrggb"

            [gain]
            value = 6.5

            [trigger]
            source = "Line1"
            hw_timeout = 4
        "#).unwrap();

        assert_eq!(Some("19120731".to_string()), request.serial_number);
        assert!(request.use_default_properties);
        assert_eq!(Setting::Explicit(1920), request.width);
        assert_eq!(Setting::Default(4320), request.height);
        assert_eq!("bayerrggb", request.pixel_format_name());
        assert_eq!(Setting::Explicit(6.5), request.gain);
        assert_eq!(Setting::Explicit("Line1".to_string()), request.trigger_source);
        assert_eq!(4, request.hw_trigger_timeout);
    }

    #[test]
    fn given_sentinel_values_properties_are_unset() {
        let request = parse_request(r#"
            [exposure]
            auto = ""
            time = -1.0

            [black_level]
            value = 9999.0

            [binning]
            horizontal = 0

            [transport]
            packet_delay = -1
        "#).unwrap();

        assert_eq!(Setting::Unset, request.exposure_auto);
        assert_eq!(Setting::Unset, request.exposure_time);
        assert_eq!(Setting::Unset, request.black_level);
        assert_eq!(Setting::Unset, request.binning_horizontal);
        assert_eq!(Setting::Unset, request.packet_delay);
    }

    #[test]
    fn given_unknown_key_parsing_fails() {
        assert!(matches!(parse_request("[image]\ndepth = 16\n"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn given_unknown_pixel_format_parsing_fails() {
        assert!(matches!(
            parse_request("[image]\npixel_format = \"mono12\"\n"),
            Err(ConfigError::InvalidValue{ ref key, .. }) if key == "image.pixel_format"
        ));
    }

    #[test]
    fn given_invalid_binning_mode_parsing_fails() {
        assert!(parse_request("[binning]\nvertical_mode = \"median\"\n").is_err());
    }

    #[test]
    fn given_missing_file_io_error_is_reported() {
        let result = load_request(Path::new("/nonexistent/gencam.toml"));

        assert!(matches!(result, Err(ConfigError::Io{ .. })));
    }
}
