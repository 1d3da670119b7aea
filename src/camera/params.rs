//
// GenCam - GenICam camera configuration and frame acquisition
// Copyright (c) 2020-2024 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Configuration request: user-facing camera parameters with their provenance.
//!

/// A configuration parameter together with where its value came from.
#[derive(Clone, Debug, PartialEq)]
pub enum Setting<T> {
    /// Not to be written to the device.
    Unset,
    /// Library default; written only if default properties are to be applied.
    Default(T),
    /// Provided by the user; always written.
    Explicit(T)
}

impl<T> Setting<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Setting::Unset => None,
            Setting::Default(value) | Setting::Explicit(value) => Some(value)
        }
    }

    pub fn is_explicit(&self) -> bool {
        matches!(self, Setting::Explicit(_))
    }

    /// Returns the value to write, if any, under the given defaults policy.
    pub fn to_apply(&self, use_defaults: bool) -> Option<&T> {
        match self {
            Setting::Explicit(value) => Some(value),
            Setting::Default(value) if use_defaults => Some(value),
            _ => None
        }
    }
}

impl<T> Default for Setting<T> {
    fn default() -> Setting<T> { Setting::Unset }
}

fn default_str(s: &str) -> Setting<String> { Setting::Default(s.to_string()) }

/// Full set of user-configurable camera parameters.
#[derive(Clone, Debug)]
pub struct ConfigurationRequest {
    /// Camera to open; the first one found if `None`.
    pub serial_number: Option<String>,
    /// Whether parameters with `Setting::Default` are written to the device.
    pub use_default_properties: bool,
    /// Resets the device to factory defaults instead of configuring it.
    pub device_reset: bool,

    pub width: Setting<i64>,
    pub height: Setting<i64>,
    pub offset_x: Setting<i64>,
    pub offset_y: Setting<i64>,
    /// Logical pixel format name (see `PixelFormat`).
    pub pixel_format: Setting<String>,

    pub binning_selector: Setting<String>,
    /// "sum" or "average".
    pub binning_horizontal_mode: Setting<String>,
    pub binning_horizontal: Setting<i64>,
    /// "sum" or "average".
    pub binning_vertical_mode: Setting<String>,
    pub binning_vertical: Setting<i64>,
    pub decimation_horizontal: Setting<i64>,
    pub decimation_vertical: Setting<i64>,

    pub exposure_mode: Setting<String>,
    pub exposure_auto: Setting<String>,
    pub exposure_time_selector: Setting<String>,
    /// Microseconds.
    pub exposure_time: Setting<f64>,

    pub black_level_selector: Setting<String>,
    pub black_level_auto: Setting<String>,
    pub black_level: Setting<f64>,

    pub gamma_selector: Setting<String>,
    pub gamma: Setting<f64>,

    pub gain_selector: Setting<String>,
    pub gain_auto: Setting<String>,
    pub gain_auto_balance: Setting<String>,
    pub gain: Setting<f64>,

    pub balance_white_auto: Setting<String>,
    pub balance_ratio_selector: Setting<String>,
    pub balance_ratio: Setting<f64>,

    pub trigger_selector: Setting<String>,
    pub trigger_activation: Setting<String>,
    /// "Software" or a hardware source name (e.g. "Line1").
    pub trigger_source: Setting<String>,
    pub trigger_multiplier: Setting<i64>,
    pub trigger_divider: Setting<i64>,
    /// Microseconds.
    pub trigger_delay: Setting<f64>,
    pub trigger_overlap: Setting<String>,
    /// Number of grab attempts to wait for a hardware trigger in non-continuous acquisition.
    pub hw_trigger_timeout: i64,

    pub acquisition_mode: Setting<String>,
    /// Frames per second; 0 means "keep the current rate".
    pub acquisition_frame_rate: Setting<f64>,
    pub device_clock_selector: Setting<String>,
    /// Bytes per second.
    pub device_link_throughput_limit: Setting<i64>,
    pub packet_size: Setting<i64>,
    pub packet_delay: Setting<i64>
}

impl Default for ConfigurationRequest {
    fn default() -> ConfigurationRequest {
        ConfigurationRequest{
            serial_number: None,
            use_default_properties: false,
            device_reset: false,

            width: Setting::Default(7680),
            height: Setting::Default(4320),
            offset_x: Setting::Default(0),
            offset_y: Setting::Default(0),
            pixel_format: default_str("mono8"),

            binning_selector: Setting::Unset,
            binning_horizontal_mode: Setting::Unset,
            binning_horizontal: Setting::Unset,
            binning_vertical_mode: Setting::Unset,
            binning_vertical: Setting::Unset,
            decimation_horizontal: Setting::Unset,
            decimation_vertical: Setting::Unset,

            exposure_mode: default_str("Timed"),
            exposure_auto: default_str("Once"),
            exposure_time_selector: Setting::Unset,
            exposure_time: Setting::Unset,

            black_level_selector: default_str("All"),
            black_level_auto: default_str("Off"),
            black_level: Setting::Unset,

            gamma_selector: Setting::Unset,
            gamma: Setting::Default(1.0),

            gain_selector: default_str("All"),
            gain_auto: default_str("off"),
            gain_auto_balance: default_str("off"),
            gain: Setting::Unset,

            balance_white_auto: default_str("Off"),
            balance_ratio_selector: Setting::Unset,
            balance_ratio: Setting::Unset,

            trigger_selector: Setting::Unset,
            trigger_activation: Setting::Unset,
            trigger_source: default_str("Software"),
            trigger_multiplier: Setting::Unset,
            trigger_divider: Setting::Unset,
            trigger_delay: Setting::Unset,
            trigger_overlap: Setting::Unset,
            hw_trigger_timeout: 10,

            acquisition_mode: default_str("continuous"),
            acquisition_frame_rate: Setting::Default(0.0),
            device_clock_selector: Setting::Unset,
            device_link_throughput_limit: Setting::Default(10_000_000),
            packet_size: Setting::Unset,
            packet_delay: Setting::Unset
        }
    }
}

impl ConfigurationRequest {
    /// Logical pixel format to be applied; the format is always applied, whatever its provenance.
    pub fn pixel_format_name(&self) -> &str {
        self.pixel_format.value().map(|s| s.as_str()).unwrap_or("mono8")
    }
}
