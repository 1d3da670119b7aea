//
// GenCam - GenICam camera configuration and frame acquisition
// Copyright (c) 2020-2024 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Configuration pass: applies a `ConfigurationRequest` to an open device in dependency order.
//!
//! Resolution and pixel format are required; every other property is applied on a best-effort basis. A parameter
//! is written if it was given explicitly, or if it has a default value and default properties are to be applied.
//!

use crate::camera::{CameraError, Device};
use crate::camera::access::Features;
use crate::camera::features::{deviations, genicam, FeatureDirectory, FeatureType};
use crate::camera::params::{ConfigurationRequest, Setting};
use crate::camera::pixel_format::PixelFormat;
use crate::camera::session::SessionState;
use crate::camera::trigger::{self, TriggerMode, TriggerSource};

#[derive(Copy, Clone, Debug)]
enum Axis {
    Horizontal,
    Vertical
}

impl Axis {
    fn binning_mode_features(&self) -> [&'static str; 2] {
        match self {
            Axis::Horizontal => [genicam::BINNING_HORIZONTAL_MODE, deviations::BINNING_MODE_HORIZONTAL],
            Axis::Vertical => [genicam::BINNING_VERTICAL_MODE, deviations::BINNING_MODE_VERTICAL]
        }
    }
}

/// Device spellings of a logical binning mode.
fn binning_mode_spellings(mode: &str) -> Option<&'static [&'static str]> {
    if mode.eq_ignore_ascii_case("sum") {
        Some(&["Sum", "Summing"][..])
    } else if mode.eq_ignore_ascii_case("average") {
        Some(&["Average", "Averaging"][..])
    } else {
        None
    }
}

fn is_off(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |v| v.eq_ignore_ascii_case("Off"))
}

/// Runs the full configuration pass and starts streaming.
///
/// On error the device may be left partially configured; the caller is responsible for closing it.
pub fn configure<D: Device + ?Sized>(
    device: &mut D,
    directory: &mut FeatureDirectory,
    request: &ConfigurationRequest,
    session: &mut SessionState
) -> Result<(), CameraError> {
    Orchestrator{
        features: Features::new(device, directory),
        request,
        session
    }.run()
}

struct Orchestrator<'a, D: Device + ?Sized> {
    features: Features<'a, D>,
    request: &'a ConfigurationRequest,
    session: &'a mut SessionState
}

impl<'a, D: Device + ?Sized> Orchestrator<'a, D> {
    fn use_defaults(&self) -> bool { self.request.use_default_properties }

    fn run(&mut self) -> Result<(), CameraError> {
        if self.request.device_reset {
            return self.reset_device();
        }

        let req = self.request;

        self.apply_enum(genicam::BINNING_SELECTOR, &req.binning_selector)?;
        self.set_binning_mode(Axis::Horizontal, &req.binning_horizontal_mode)?;
        self.apply_int(genicam::BINNING_HORIZONTAL, &req.binning_horizontal)?;
        self.set_binning_mode(Axis::Vertical, &req.binning_vertical_mode)?;
        self.apply_int(genicam::BINNING_VERTICAL, &req.binning_vertical)?;
        self.apply_int(genicam::DECIMATION_HORIZONTAL, &req.decimation_horizontal)?;
        self.apply_int(genicam::DECIMATION_VERTICAL, &req.decimation_vertical)?;

        self.set_width_height()?;
        self.set_pixel_format()?;
        self.set_offsets()?;

        self.apply_enum(genicam::DEVICE_CLOCK_SELECTOR, &req.device_clock_selector)?;
        self.log_device_clock_frequency()?;
        self.set_throughput_limit()?;
        self.set_frame_rate()?;

        self.set_acquisition_mode()?;
        self.apply_enum(genicam::TRIGGER_SELECTOR, &req.trigger_selector)?;
        self.apply_enum(genicam::TRIGGER_ACTIVATION, &req.trigger_activation)?;
        self.set_trigger_source()?;
        self.apply_int(genicam::TRIGGER_MULTIPLIER, &req.trigger_multiplier)?;
        self.apply_int(genicam::TRIGGER_DIVIDER, &req.trigger_divider)?;
        self.set_trigger_delay()?;
        self.apply_enum(genicam::TRIGGER_OVERLAP, &req.trigger_overlap)?;

        self.set_exposure_mode()?;
        self.apply_enum(genicam::EXPOSURE_AUTO, &req.exposure_auto)?;
        self.set_exposure_time_selector()?;
        self.set_exposure_time()?;

        self.apply_enum(genicam::BLACK_LEVEL_SELECTOR, &req.black_level_selector)?;
        self.apply_enum(genicam::BLACK_LEVEL_AUTO, &req.black_level_auto)?;
        self.session.black_level_auto = self.features.get_enum(genicam::BLACK_LEVEL_AUTO)?;
        self.set_black_level()?;

        self.set_gamma()?;

        self.apply_enum(genicam::GAIN_SELECTOR, &req.gain_selector)?;
        self.apply_enum(genicam::GAIN_AUTO, &req.gain_auto)?;
        self.session.gain_auto = self.features.get_enum(genicam::GAIN_AUTO)?;
        self.set_gain()?;
        self.apply_enum(genicam::GAIN_AUTO_BALANCE, &req.gain_auto_balance)?;

        self.apply_enum(genicam::BALANCE_WHITE_AUTO, &req.balance_white_auto)?;
        self.set_balance_ratio()?;

        self.apply_int(genicam::GEV_SCPS_PACKET_SIZE, &req.packet_size)?;
        self.apply_int(genicam::GEV_SCPD, &req.packet_delay)?;

        self.start_stream()
    }

    fn apply_enum(&mut self, name: &str, setting: &Setting<String>) -> Result<bool, CameraError> {
        match setting.to_apply(self.use_defaults()) {
            Some(value) => self.features.set_enum(name, value),
            None => Ok(false)
        }
    }

    fn apply_int(&mut self, name: &str, setting: &Setting<i64>) -> Result<bool, CameraError> {
        match setting.to_apply(self.use_defaults()) {
            Some(value) => self.features.set_int(name, *value),
            None => Ok(false)
        }
    }

    fn reset_device(&mut self) -> Result<(), CameraError> {
        self.features.execute(genicam::DEVICE_RESET)?;
        log::info!("device reset triggered; the camera will take a few seconds to restore factory defaults");
        Err(CameraError::DeviceReset)
    }

    fn set_binning_mode(&mut self, axis: Axis, setting: &Setting<String>) -> Result<(), CameraError> {
        let mode = match setting.to_apply(self.use_defaults()) {
            Some(mode) => mode,
            None => return Ok(())
        };

        let spellings = match binning_mode_spellings(mode) {
            Some(spellings) => spellings,
            None => {
                log::warn!("invalid {:?} binning mode \"{}\"; expected \"sum\" or \"average\"", axis, mode);
                return Ok(());
            }
        };

        let feature = match self.features.first_existing(&axis.binning_mode_features())? {
            Some((feature, _)) => feature,
            None => {
                log::warn!("{}: feature not supported", axis.binning_mode_features()[0]);
                return Ok(());
            }
        };

        let entries = self.features.get_enum_entries(feature)?;
        match entries.iter().find(|e| spellings.contains(&e.as_str())) {
            Some(entry) => { self.features.set_enum(feature, entry)?; },
            None => log::warn!("{}: mode \"{}\" not supported by the camera", feature, mode)
        }

        Ok(())
    }

    /// Returns the requested extent, capped at the maximum rounded down to a multiple of 4.
    fn capped_extent(&mut self, name: &str, requested: Option<i64>) -> Result<Option<i64>, CameraError> {
        let requested = match requested {
            Some(value) => value,
            None => return self.features.get_int(name)
        };

        match self.features.get_int_range(name)? {
            Some(range) if requested > range.max => {
                let capped = range.max & !3;
                log::warn!("{}: capping to maximum {}", name, capped);
                Ok(Some(capped))
            },
            _ => Ok(Some(requested))
        }
    }

    fn set_width_height(&mut self) -> Result<(), CameraError> {
        // Zero offsets first, so that any resolution up to the maximum is accepted.
        let offset_x_zeroed = self.features.set_int(genicam::OFFSET_X, 0)?;
        let offset_y_zeroed = self.features.set_int(genicam::OFFSET_Y, 0)?;
        self.session.offsets_writable = offset_x_zeroed && offset_y_zeroed;
        if !self.session.offsets_writable {
            log::warn!("{} and {} not writable", genicam::OFFSET_X, genicam::OFFSET_Y);
        }

        self.session.width_max = self.features.get_int(genicam::WIDTH_MAX)?;
        self.session.height_max = self.features.get_int(genicam::HEIGHT_MAX)?;
        log::info!(
            "maximum resolution supported by the camera: {:?} x {:?}",
            self.session.width_max, self.session.height_max
        );

        let req = self.request;
        let width = self.capped_extent(genicam::WIDTH, req.width.value().copied())?;
        let height = self.capped_extent(genicam::HEIGHT, req.height.value().copied())?;

        let width_set = match width {
            Some(width) => self.features.set_int(genicam::WIDTH, width)?,
            None => false
        };
        let height_set = match height {
            Some(height) => self.features.set_int(genicam::HEIGHT, height)?,
            None => false
        };

        if !(width_set && height_set) {
            log::error!("{} and {} set error", genicam::WIDTH, genicam::HEIGHT);
            return Err(CameraError::ResolutionNotApplied);
        }

        log::info!(
            "current resolution: {} x {}",
            self.features.get_int(genicam::WIDTH)?.unwrap_or_default(),
            self.features.get_int(genicam::HEIGHT)?.unwrap_or_default()
        );

        Ok(())
    }

    fn set_pixel_format(&mut self) -> Result<(), CameraError> {
        let name = self.request.pixel_format_name();
        let format = PixelFormat::from_name(name);
        let entries = self.features.get_enum_entries(genicam::PIXEL_FORMAT)?;

        let applied = match format.select_entry(&entries) {
            Some(entry) => self.features.set_enum(genicam::PIXEL_FORMAT, entry)?,
            None => false
        };

        if !applied {
            log::error!("{}: \"{}\" not supported by the camera", genicam::PIXEL_FORMAT, name);
            log::info!("pixel formats supported: {}", entries.join(", "));
            return Err(CameraError::PixelFormatNotApplied(name.to_string()));
        }

        self.session.pixel_format = format;
        if self.features.exists(genicam::PIXEL_SIZE)? {
            if let Some(size) = self.features.get_enum(genicam::PIXEL_SIZE)? {
                log::info!("{}: {}", genicam::PIXEL_SIZE, size);
            }
        }

        Ok(())
    }

    fn set_offsets(&mut self) -> Result<(), CameraError> {
        let req = self.request;
        if !(req.offset_x.is_explicit() || req.offset_y.is_explicit() || self.use_defaults()) {
            return Ok(());
        }

        if !self.session.offsets_writable {
            log::warn!("offsets not set, {} and {} are not writable", genicam::OFFSET_X, genicam::OFFSET_Y);
            return Ok(());
        }

        self.features.set_int(genicam::OFFSET_X, req.offset_x.value().copied().unwrap_or(0))?;
        self.features.set_int(genicam::OFFSET_Y, req.offset_y.value().copied().unwrap_or(0))?;

        Ok(())
    }

    fn log_device_clock_frequency(&mut self) -> Result<(), CameraError> {
        if let Some(frequency) = self.features.get_float(genicam::DEVICE_CLOCK_FREQUENCY)? {
            let selector = self.features.get_enum(genicam::DEVICE_CLOCK_SELECTOR)?.unwrap_or_default();
            log::info!("{}[{}]: {}", genicam::DEVICE_CLOCK_FREQUENCY, selector, frequency);
        }

        Ok(())
    }

    fn set_throughput_limit(&mut self) -> Result<(), CameraError> {
        let limit = match self.request.device_link_throughput_limit.to_apply(self.use_defaults()) {
            Some(limit) => *limit,
            None => return Ok(())
        };

        if !self.features.exists(genicam::DEVICE_LINK_THROUGHPUT_LIMIT)? {
            log::warn!("{}: feature not supported", genicam::DEVICE_LINK_THROUGHPUT_LIMIT);
            return Ok(());
        }

        if !self.features.get_enum_entries(genicam::DEVICE_LINK_THROUGHPUT_LIMIT_MODE)?.is_empty() {
            log::info!("setting {} to \"On\"", genicam::DEVICE_LINK_THROUGHPUT_LIMIT_MODE);
            self.features.set_enum(genicam::DEVICE_LINK_THROUGHPUT_LIMIT_MODE, "On")?;
        }

        self.features.set_int(genicam::DEVICE_LINK_THROUGHPUT_LIMIT, limit)?;

        Ok(())
    }

    fn set_frame_rate(&mut self) -> Result<(), CameraError> {
        let requested = match self.request.acquisition_frame_rate.to_apply(self.use_defaults()) {
            Some(rate) => *rate,
            None => return Ok(())
        };

        let feature = match self.features.first_existing(
            &[genicam::ACQUISITION_FRAME_RATE, deviations::ACQUISITION_FRAME_RATE_ABS]
        )? {
            Some((feature, _)) => feature,
            None => {
                log::warn!("{}: feature not supported", genicam::ACQUISITION_FRAME_RATE);
                return Ok(());
            }
        };

        let current = self.features.get_float(feature)?;

        let enabled = self.features.set_bool_if_present(deviations::ACQUISITION_FRAME_RATE_ENABLE, true)?
            || self.features.set_bool_if_present(deviations::ACQUISITION_FRAME_RATE_ENABLED, true)?;
        if !enabled {
            log::warn!("{} not configurable, current frame rate: {:?}", feature, current);
            return Ok(());
        }

        // 0 keeps the current rate, re-applied with the rate control now enabled.
        let rate = if requested == 0.0 {
            match current {
                Some(current) => current,
                None => return Ok(())
            }
        } else {
            requested
        };

        self.features.set_float(feature, rate)?;

        Ok(())
    }

    fn set_acquisition_mode(&mut self) -> Result<(), CameraError> {
        if let Some(mode) = self.request.acquisition_mode.to_apply(self.use_defaults()) {
            self.features.set_enum(genicam::ACQUISITION_MODE, mode)?;
        }

        trigger::apply_trigger_mode(&mut self.features, &mut *self.session)
    }

    fn set_trigger_source(&mut self) -> Result<(), CameraError> {
        if let Some(source) = self.request.trigger_source.to_apply(self.use_defaults()) {
            if self.features.get_enum_entries(genicam::TRIGGER_SOURCE)?.is_empty() {
                log::warn!("{}: feature not supported", genicam::TRIGGER_SOURCE);
            } else if self.session.trigger_mode != TriggerMode::On {
                log::warn!("{}: not configured as {} is not \"On\"", genicam::TRIGGER_SOURCE, genicam::TRIGGER_MODE);
            } else {
                self.features.set_enum(genicam::TRIGGER_SOURCE, source)?;
            }
        }

        if let Some(current) = self.features.get_enum(genicam::TRIGGER_SOURCE)? {
            self.session.trigger_source = TriggerSource::from_name(&current);
        }

        Ok(())
    }

    fn set_trigger_delay(&mut self) -> Result<(), CameraError> {
        let delay = match self.request.trigger_delay.to_apply(self.use_defaults()) {
            Some(delay) => *delay,
            None => return Ok(())
        };

        match self.features.first_existing(&[genicam::TRIGGER_DELAY, deviations::TRIGGER_DELAY_ABS])? {
            Some((feature, _)) => { self.features.set_float(feature, delay)?; },
            None => log::warn!("{}: feature not supported", genicam::TRIGGER_DELAY)
        }

        Ok(())
    }

    fn set_exposure_mode(&mut self) -> Result<(), CameraError> {
        let mode = match self.request.exposure_mode.to_apply(self.use_defaults()) {
            Some(mode) => mode,
            None => return Ok(())
        };

        // Let automatic exposure use the whole exposure time range.
        let range = match self.features.first_existing(&[genicam::EXPOSURE_TIME, deviations::EXPOSURE_TIME_ABS])? {
            Some((feature, _)) => self.features.get_float_range(feature)?,
            None => None
        };
        if let Some(range) = range {
            for (name, value) in [
                (deviations::AUTO_EXPOSURE_TIME_ABS_LOWER_LIMIT, range.min),
                (deviations::AUTO_EXPOSURE_TIME_LOWER_LIMIT, range.min),
                (deviations::AUTO_EXPOSURE_TIME_ABS_UPPER_LIMIT, range.max),
                (deviations::AUTO_EXPOSURE_TIME_UPPER_LIMIT, range.max),
            ].iter() {
                if self.features.exists(name)? {
                    self.features.set_float(name, *value)?;
                }
            }
        }

        self.features.set_enum(genicam::EXPOSURE_MODE, mode)?;

        Ok(())
    }

    fn set_exposure_time_selector(&mut self) -> Result<(), CameraError> {
        let selector = match self.request.exposure_time_selector.to_apply(self.use_defaults()) {
            Some(selector) => selector,
            None => return Ok(())
        };

        if !self.features.exists(genicam::EXPOSURE_TIME_SELECTOR)? {
            log::warn!("{}: feature not supported", genicam::EXPOSURE_TIME_SELECTOR);
            return Ok(());
        }

        // Individual selectors take effect only in the "Individual" exposure time mode.
        let mode = if selector.eq_ignore_ascii_case("Common") { "Common" } else { "Individual" };
        if self.features.exists(genicam::EXPOSURE_TIME_MODE)? {
            log::info!("setting {} to \"{}\"", genicam::EXPOSURE_TIME_MODE, mode);
            self.features.set_enum(genicam::EXPOSURE_TIME_MODE, mode)?;
        }

        self.features.set_enum(genicam::EXPOSURE_TIME_SELECTOR, selector)?;

        Ok(())
    }

    fn set_exposure_time(&mut self) -> Result<(), CameraError> {
        let time = match self.request.exposure_time.to_apply(self.use_defaults()) {
            Some(time) => *time,
            None => return Ok(())
        };

        let feature = match self.features.first_existing(&[genicam::EXPOSURE_TIME, deviations::EXPOSURE_TIME_ABS])? {
            Some((feature, _)) => feature,
            None => {
                log::warn!("{}: feature not supported", genicam::EXPOSURE_TIME);
                return Ok(());
            }
        };

        let mode = self.features.get_enum(genicam::EXPOSURE_MODE)?;
        let auto = self.features.get_enum(genicam::EXPOSURE_AUTO)?;
        if mode.as_deref() != Some("Timed") || !is_off(&auto) {
            log::warn!(
                "{} not set, {} must be \"Timed\" and {} must be \"Off\"",
                feature, genicam::EXPOSURE_MODE, genicam::EXPOSURE_AUTO
            );
            return Ok(());
        }

        self.features.set_float(feature, time)?;

        Ok(())
    }

    fn set_black_level(&mut self) -> Result<(), CameraError> {
        let level = match self.request.black_level.to_apply(self.use_defaults()) {
            Some(level) => *level,
            None => return Ok(())
        };

        if self.features.exists(genicam::BLACK_LEVEL_AUTO)? && !is_off(&self.session.black_level_auto) {
            log::warn!("{} not set, {} must be \"Off\"", genicam::BLACK_LEVEL, genicam::BLACK_LEVEL_AUTO);
            return Ok(());
        }

        self.features.set_bool_if_present(deviations::BLACK_LEVEL_ENABLED, true)?;

        match self.features.first_existing(&[genicam::BLACK_LEVEL, deviations::BLACK_LEVEL_RAW])? {
            Some((feature, FeatureType::Integer)) => { self.features.set_int(feature, level as i64)?; },
            Some((feature, FeatureType::Float)) => { self.features.set_float(feature, level)?; },
            Some((feature, other)) => log::warn!("{}: unsupported feature type {}", feature, other),
            None => log::warn!("{}: feature not supported", genicam::BLACK_LEVEL)
        }

        Ok(())
    }

    fn set_gamma(&mut self) -> Result<(), CameraError> {
        let gamma = match self.request.gamma.to_apply(self.use_defaults()) {
            Some(gamma) => *gamma,
            None => return Ok(())
        };

        if !self.features.exists(genicam::GAMMA)? {
            log::warn!("{}: feature not supported", genicam::GAMMA);
            return Ok(());
        }

        let selector_present = self.features.exists(genicam::GAMMA_SELECTOR)?;
        if let Some(selector) = self.request.gamma_selector.to_apply(self.use_defaults()) {
            if selector_present {
                self.features.set_enum(genicam::GAMMA_SELECTOR, selector)?;
            } else {
                log::warn!("{}: feature not supported", genicam::GAMMA_SELECTOR);
            }
        }

        self.features.set_bool_if_present(deviations::GAMMA_ENABLE, true)?;
        self.features.set_bool_if_present(deviations::GAMMA_ENABLED, true)?;

        if selector_present && self.features.get_enum(genicam::GAMMA_SELECTOR)?.as_deref() != Some("User") {
            log::warn!("{} not set, {} must be \"User\"", genicam::GAMMA, genicam::GAMMA_SELECTOR);
            return Ok(());
        }

        self.features.set_float(genicam::GAMMA, gamma)?;

        Ok(())
    }

    fn set_gain(&mut self) -> Result<(), CameraError> {
        let gain = match self.request.gain.to_apply(self.use_defaults()) {
            Some(gain) => *gain,
            None => return Ok(())
        };

        if self.features.exists(genicam::GAIN_AUTO)? && !is_off(&self.session.gain_auto) {
            log::warn!("{} not set, {} must be \"Off\"", genicam::GAIN, genicam::GAIN_AUTO);
            return Ok(());
        }

        if self.features.probe(genicam::GAIN)? == FeatureType::Float {
            self.features.set_float(genicam::GAIN, gain)?;
        } else if self.features.probe(deviations::GAIN_RAW)? == FeatureType::Integer {
            self.features.set_int(deviations::GAIN_RAW, gain as i64)?;
        } else {
            log::warn!("{}: feature not supported", genicam::GAIN);
        }

        Ok(())
    }

    fn set_balance_ratio(&mut self) -> Result<(), CameraError> {
        if let Some(selector) = self.request.balance_ratio_selector.to_apply(self.use_defaults()) {
            if self.features.exists(genicam::BALANCE_RATIO_SELECTOR)? {
                self.features.set_enum(genicam::BALANCE_RATIO_SELECTOR, selector)?;
            } else {
                log::warn!("{}: feature not supported", genicam::BALANCE_RATIO_SELECTOR);
            }
        }

        let ratio = match self.request.balance_ratio.to_apply(self.use_defaults()) {
            Some(ratio) => *ratio,
            None => return Ok(())
        };

        let feature = match self.features.first_existing(&[genicam::BALANCE_RATIO, deviations::BALANCE_RATIO_ABS])? {
            Some((feature, _)) => feature,
            None => {
                log::warn!("{}: feature not supported", genicam::BALANCE_RATIO);
                return Ok(());
            }
        };

        if !is_off(&self.features.get_enum(genicam::BALANCE_WHITE_AUTO)?) {
            log::warn!("{} not set, {} must be \"Off\"", feature, genicam::BALANCE_WHITE_AUTO);
            return Ok(());
        }

        if self.features.set_float(feature, ratio)? {
            let selector = self.features.get_enum(genicam::BALANCE_RATIO_SELECTOR)?.unwrap_or_default();
            log::info!("{}[{}]: {} set successful", feature, selector, ratio);
        }

        Ok(())
    }

    fn start_stream(&mut self) -> Result<(), CameraError> {
        self.session.acquisition_status_present = self.features.exists(genicam::ACQUISITION_STATUS)?;

        let device = self.features.node_map();
        device.open_stream()?;
        device.start_streaming()?;

        trigger::start_triggering(&mut self.features, &mut *self.session, self.request.hw_trigger_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::drivers::simulator::{SimHandle, SimNode};
    use crate::camera::trigger::AcquisitionMode;

    fn run(device: &mut SimHandle, request: &ConfigurationRequest) -> (Result<(), CameraError>, SessionState) {
        let mut directory = FeatureDirectory::new();
        let mut session = SessionState::default();
        let result = configure(device, &mut directory, request, &mut session);
        (result, session)
    }

    fn explicit(s: &str) -> Setting<String> { Setting::Explicit(s.to_string()) }

    #[test]
    fn given_default_request_only_required_features_are_written() {
        let mut device = SimHandle::new("O0001");
        let (result, session) = run(&mut device, &ConfigurationRequest::default());

        result.unwrap();
        assert_eq!(2048, device.int_of(genicam::WIDTH));
        assert_eq!(1536, device.int_of(genicam::HEIGHT));
        assert_eq!("Mono8", device.enum_of(genicam::PIXEL_FORMAT));
        assert_eq!(0, device.write_count(genicam::EXPOSURE_AUTO));
        assert_eq!(0, device.write_count(genicam::GAIN_SELECTOR));
        assert_eq!(0, device.write_count(genicam::ACQUISITION_FRAME_RATE));
        assert_eq!(0, device.write_count(genicam::DEVICE_LINK_THROUGHPUT_LIMIT));
        assert!(device.is_streaming());
        assert_eq!(Some(2048), session.width_max);
        assert!(session.acquisition_status_present);
    }

    #[test]
    fn given_defaults_policy_default_values_are_written() {
        let mut device = SimHandle::new("O0002");
        let request = ConfigurationRequest{ use_default_properties: true, ..Default::default() };
        run(&mut device, &request).0.unwrap();

        assert_eq!(vec!["Once"], device.writes_to(genicam::EXPOSURE_AUTO));
        assert_eq!(vec!["All"], device.writes_to(genicam::GAIN_SELECTOR));
        assert_eq!("On", device.enum_of(genicam::DEVICE_LINK_THROUGHPUT_LIMIT_MODE));
        assert_eq!(10_000_000, device.int_of(genicam::DEVICE_LINK_THROUGHPUT_LIMIT));
        // frame rate 0 re-applies the current rate with rate control enabled
        assert!(device.bool_of(deviations::ACQUISITION_FRAME_RATE_ENABLE));
        assert_eq!(vec!["30"], device.writes_to(genicam::ACQUISITION_FRAME_RATE));
    }

    #[test]
    fn given_explicit_value_it_is_written_exactly_once() {
        let mut device = SimHandle::new("O0003");
        let request = ConfigurationRequest{ gain_selector: explicit("AnalogAll"), ..Default::default() };
        run(&mut device, &request).0.unwrap();

        assert_eq!(vec!["AnalogAll"], device.writes_to(genicam::GAIN_SELECTOR));
    }

    #[test]
    fn given_width_above_max_it_is_capped_to_multiple_of_four() {
        let mut device = SimHandle::new("O0004");
        device.insert(genicam::WIDTH_MAX, SimNode::int(9999, 9999, 9999, 1).read_only());
        device.insert(genicam::WIDTH, SimNode::int(640, 16, 9999, 1));
        let request = ConfigurationRequest{ width: Setting::Explicit(10000), ..Default::default() };
        run(&mut device, &request).0.unwrap();

        assert_eq!(9996, device.int_of(genicam::WIDTH));
    }

    #[test]
    fn given_mono8_on_mono_only_device_device_spelling_is_written() {
        let mut device = SimHandle::new("O0005");
        device.insert(genicam::PIXEL_FORMAT, SimNode::enumeration("Mono8", &["Mono8"]));
        let request = ConfigurationRequest{ pixel_format: explicit("mono8"), ..Default::default() };
        run(&mut device, &request).0.unwrap();

        assert_eq!(vec!["Mono8"], device.writes_to(genicam::PIXEL_FORMAT));
    }

    #[test]
    fn given_unsupported_pixel_format_configuration_fails_before_streaming() {
        let mut device = SimHandle::new("O0006");
        let request = ConfigurationRequest{ pixel_format: explicit("bgr8"), ..Default::default() };
        let (result, _) = run(&mut device, &request);

        assert!(matches!(result, Err(CameraError::PixelFormatNotApplied(ref name)) if name == "bgr8"));
        assert!(!device.is_streaming());
    }

    #[test]
    fn given_unwritable_height_configuration_fails() {
        let mut device = SimHandle::new("O0007");
        device.make_read_only(genicam::HEIGHT);
        let (result, _) = run(&mut device, &ConfigurationRequest::default());

        assert!(matches!(result, Err(CameraError::ResolutionNotApplied)));
        assert_eq!(0, device.write_count(genicam::PIXEL_FORMAT));
    }

    #[test]
    fn given_exposure_auto_not_off_exposure_time_is_not_written() {
        let mut device = SimHandle::new("O0008");
        let request = ConfigurationRequest{ exposure_time: Setting::Explicit(5000.0), ..Default::default() };
        run(&mut device, &request).0.unwrap();

        assert_eq!(0, device.write_count(genicam::EXPOSURE_TIME));
    }

    #[test]
    fn given_exposure_mode_not_timed_exposure_time_is_not_written() {
        let mut device = SimHandle::new("O0023");
        let request = ConfigurationRequest{
            exposure_mode: explicit("TriggerWidth"),
            exposure_auto: explicit("Off"),
            exposure_time: Setting::Explicit(5000.0),
            ..Default::default()
        };
        run(&mut device, &request).0.unwrap();

        assert_eq!("TriggerWidth", device.enum_of(genicam::EXPOSURE_MODE));
        assert_eq!(0, device.write_count(genicam::EXPOSURE_TIME));
    }

    #[test]
    fn given_exposure_auto_off_exposure_time_is_written() {
        let mut device = SimHandle::new("O0009");
        let request = ConfigurationRequest{
            exposure_auto: explicit("Off"),
            exposure_time: Setting::Explicit(5000.0),
            ..Default::default()
        };
        run(&mut device, &request).0.unwrap();

        assert_eq!(5000.0, device.float_of(genicam::EXPOSURE_TIME));
    }

    #[test]
    fn given_deviating_binning_mode_feature_device_spelling_is_used() {
        let mut device = SimHandle::new("O0010");
        device.remove(genicam::BINNING_HORIZONTAL_MODE);
        device.insert(deviations::BINNING_MODE_HORIZONTAL, SimNode::enumeration("Summing", &["Summing", "Averaging"]));
        let request = ConfigurationRequest{ binning_horizontal_mode: explicit("average"), ..Default::default() };
        run(&mut device, &request).0.unwrap();

        assert_eq!("Averaging", device.enum_of(deviations::BINNING_MODE_HORIZONTAL));
    }

    #[test]
    fn given_only_raw_gain_gain_is_written_as_integer() {
        let mut device = SimHandle::new("O0011");
        device.remove(genicam::GAIN);
        device.insert(deviations::GAIN_RAW, SimNode::int(0, 0, 1023, 1));
        let request = ConfigurationRequest{ gain: Setting::Explicit(300.7), ..Default::default() };
        run(&mut device, &request).0.unwrap();

        assert_eq!(300, device.int_of(deviations::GAIN_RAW));
    }

    #[test]
    fn given_black_level_auto_on_black_level_is_not_written() {
        let mut device = SimHandle::new("O0012");
        let request = ConfigurationRequest{
            black_level_auto: explicit("Continuous"),
            black_level: Setting::Explicit(10.0),
            ..Default::default()
        };
        run(&mut device, &request).0.unwrap();

        assert_eq!(0, device.write_count(genicam::BLACK_LEVEL));
    }

    #[test]
    fn given_integer_black_level_raw_it_is_written_as_integer() {
        let mut device = SimHandle::new("O0013");
        device.remove(genicam::BLACK_LEVEL);
        device.insert(deviations::BLACK_LEVEL_RAW, SimNode::int(0, 0, 255, 1));
        device.insert(deviations::BLACK_LEVEL_ENABLED, SimNode::boolean(false));
        let request = ConfigurationRequest{ black_level: Setting::Explicit(12.0), ..Default::default() };
        run(&mut device, &request).0.unwrap();

        assert_eq!(12, device.int_of(deviations::BLACK_LEVEL_RAW));
        assert!(device.bool_of(deviations::BLACK_LEVEL_ENABLED));
    }

    #[test]
    fn given_transport_failure_configuration_is_aborted() {
        let mut device = SimHandle::new("O0014");
        device.fail_transport(genicam::GAIN_SELECTOR);
        let request = ConfigurationRequest{ gain_selector: explicit("All"), ..Default::default() };
        let (result, _) = run(&mut device, &request);

        assert!(matches!(result, Err(CameraError::Feature(ref e)) if e.is_transport()));
        assert!(!device.is_streaming());
    }

    #[test]
    fn given_device_reset_nothing_else_is_configured() {
        let mut device = SimHandle::new("O0015");
        let request = ConfigurationRequest{ device_reset: true, ..Default::default() };
        let (result, _) = run(&mut device, &request);

        assert!(matches!(result, Err(CameraError::DeviceReset)));
        assert_eq!(1, device.command_count(genicam::DEVICE_RESET));
        assert_eq!(0, device.write_count(genicam::WIDTH));
    }

    #[test]
    fn given_single_frame_with_line_source_session_is_hardware_triggered() {
        let mut device = SimHandle::new("O0016");
        let request = ConfigurationRequest{
            acquisition_mode: explicit("SingleFrame"),
            trigger_source: explicit("Line1"),
            hw_trigger_timeout: 3,
            ..Default::default()
        };
        let (result, session) = run(&mut device, &request);

        result.unwrap();
        assert_eq!(AcquisitionMode::NonContinuous, session.acquisition_mode);
        assert_eq!(TriggerMode::On, session.trigger_mode);
        assert_eq!(TriggerSource::Hardware("Line1".to_string()), session.trigger_source);
        assert_eq!(3, session.hw_trigger_timeout);
        assert!(session.hardware_triggered());
        assert!(!session.software_triggered());
        assert_eq!(0, device.command_count(genicam::TRIGGER_SOFTWARE));
    }

    #[test]
    fn given_single_frame_with_software_source_one_trigger_is_issued_at_start() {
        let mut device = SimHandle::new("O0017");
        let request = ConfigurationRequest{ acquisition_mode: explicit("SingleFrame"), ..Default::default() };
        let (result, session) = run(&mut device, &request);

        result.unwrap();
        assert!(session.software_triggered());
        assert_eq!(1, device.command_count(genicam::TRIGGER_SOFTWARE));
    }

    #[test]
    fn given_full_request_features_are_written_in_dependency_order() {
        let mut device = SimHandle::new("O0018");
        let request = ConfigurationRequest{
            binning_horizontal: Setting::Explicit(2),
            acquisition_mode: explicit("SingleFrame"),
            exposure_auto: explicit("Off"),
            exposure_time: Setting::Explicit(1000.0),
            balance_white_auto: explicit("Off"),
            balance_ratio: Setting::Explicit(1.5),
            packet_size: Setting::Explicit(9000),
            ..Default::default()
        };
        run(&mut device, &request).0.unwrap();

        let order = device.write_order();
        let position = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert!(position(genicam::BINNING_HORIZONTAL) < position(genicam::WIDTH));
        assert!(position(genicam::WIDTH) < position(genicam::HEIGHT));
        assert!(position(genicam::HEIGHT) < position(genicam::PIXEL_FORMAT));
        assert!(position(genicam::PIXEL_FORMAT) < position(genicam::ACQUISITION_MODE));
        assert!(position(genicam::ACQUISITION_MODE) < position(genicam::TRIGGER_MODE));
        assert!(position(genicam::TRIGGER_MODE) < position(genicam::EXPOSURE_TIME));
        assert!(position(genicam::EXPOSURE_TIME) < position(genicam::BALANCE_RATIO));
        assert!(position(genicam::BALANCE_RATIO) < position(genicam::GEV_SCPS_PACKET_SIZE));
    }

    #[test]
    fn given_read_only_offsets_explicit_offsets_are_skipped() {
        let mut device = SimHandle::new("O0019");
        device.make_read_only(genicam::OFFSET_X);
        let request = ConfigurationRequest{
            width: Setting::Explicit(1024),
            offset_y: Setting::Explicit(8),
            ..Default::default()
        };
        let (result, session) = run(&mut device, &request);

        result.unwrap();
        assert!(!session.offsets_writable);
        assert_eq!(0, device.int_of(genicam::OFFSET_Y));
    }

    #[test]
    fn given_gamma_selector_user_gamma_is_written() {
        let mut device = SimHandle::new("O0020");
        let request = ConfigurationRequest{
            gamma_selector: explicit("User"),
            gamma: Setting::Explicit(2.2),
            ..Default::default()
        };
        run(&mut device, &request).0.unwrap();

        assert_eq!(2.2, device.float_of(genicam::GAMMA));
        assert!(device.bool_of(deviations::GAMMA_ENABLE));
    }
}
