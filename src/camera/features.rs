//
// GenCam - GenICam camera configuration and frame acquisition
// Copyright (c) 2020-2024 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Feature directory: existence and type probing of device features.
//!

use crate::camera::{FeatureError, NodeMap};
use std::collections::HashMap;

/// Common GenICam camera feature names (Standard Features Naming Convention 2.x).
pub mod genicam {
    pub const ACQUISITION_FRAME_RATE:                         &'static str = "AcquisitionFrameRate";
    pub const ACQUISITION_MODE:                               &'static str = "AcquisitionMode";
    pub const ACQUISITION_STATUS:                             &'static str = "AcquisitionStatus";
    pub const ACQUISITION_STATUS_SELECTOR:                    &'static str = "AcquisitionStatusSelector";
    pub const BALANCE_RATIO:                                  &'static str = "BalanceRatio";
    pub const BALANCE_RATIO_SELECTOR:                         &'static str = "BalanceRatioSelector";
    pub const BALANCE_WHITE_AUTO:                             &'static str = "BalanceWhiteAuto";
    pub const BINNING_HORIZONTAL:                             &'static str = "BinningHorizontal";
    pub const BINNING_HORIZONTAL_MODE:                        &'static str = "BinningHorizontalMode";
    pub const BINNING_SELECTOR:                               &'static str = "BinningSelector";
    pub const BINNING_VERTICAL:                               &'static str = "BinningVertical";
    pub const BINNING_VERTICAL_MODE:                          &'static str = "BinningVerticalMode";
    pub const BLACK_LEVEL:                                    &'static str = "BlackLevel";
    pub const BLACK_LEVEL_AUTO:                               &'static str = "BlackLevelAuto";
    pub const BLACK_LEVEL_SELECTOR:                           &'static str = "BlackLevelSelector";
    pub const DECIMATION_HORIZONTAL:                          &'static str = "DecimationHorizontal";
    pub const DECIMATION_VERTICAL:                            &'static str = "DecimationVertical";
    pub const DEVICE_CLOCK_FREQUENCY:                         &'static str = "DeviceClockFrequency";
    pub const DEVICE_CLOCK_SELECTOR:                          &'static str = "DeviceClockSelector";
    pub const DEVICE_LINK_THROUGHPUT_LIMIT:                   &'static str = "DeviceLinkThroughputLimit";
    pub const DEVICE_LINK_THROUGHPUT_LIMIT_MODE:              &'static str = "DeviceLinkThroughputLimitMode";
    pub const DEVICE_MODEL_NAME:                              &'static str = "DeviceModelName";
    pub const DEVICE_RESET:                                   &'static str = "DeviceReset";
    pub const DEVICE_SERIAL_NUMBER:                           &'static str = "DeviceSerialNumber";
    pub const DEVICE_VENDOR_NAME:                             &'static str = "DeviceVendorName";
    pub const EXPOSURE_AUTO:                                  &'static str = "ExposureAuto";
    pub const EXPOSURE_MODE:                                  &'static str = "ExposureMode";
    pub const EXPOSURE_TIME:                                  &'static str = "ExposureTime";
    pub const EXPOSURE_TIME_MODE:                             &'static str = "ExposureTimeMode";
    pub const EXPOSURE_TIME_SELECTOR:                         &'static str = "ExposureTimeSelector";
    pub const GAIN:                                           &'static str = "Gain";
    pub const GAIN_AUTO:                                      &'static str = "GainAuto";
    pub const GAIN_AUTO_BALANCE:                              &'static str = "GainAutoBalance";
    pub const GAIN_SELECTOR:                                  &'static str = "GainSelector";
    pub const GAMMA:                                          &'static str = "Gamma";
    pub const GAMMA_SELECTOR:                                 &'static str = "GammaSelector";
    pub const HEIGHT:                                         &'static str = "Height";
    pub const HEIGHT_MAX:                                     &'static str = "HeightMax";
    pub const OFFSET_X:                                       &'static str = "OffsetX";
    pub const OFFSET_Y:                                       &'static str = "OffsetY";
    pub const PIXEL_FORMAT:                                   &'static str = "PixelFormat";
    pub const PIXEL_SIZE:                                     &'static str = "PixelSize";
    pub const TRIGGER_ACTIVATION:                             &'static str = "TriggerActivation";
    pub const TRIGGER_DELAY:                                  &'static str = "TriggerDelay";
    pub const TRIGGER_DIVIDER:                                &'static str = "TriggerDivider";
    pub const TRIGGER_MODE:                                   &'static str = "TriggerMode";
    pub const TRIGGER_MULTIPLIER:                             &'static str = "TriggerMultiplier";
    pub const TRIGGER_OVERLAP:                                &'static str = "TriggerOverlap";
    pub const TRIGGER_SELECTOR:                               &'static str = "TriggerSelector";
    pub const TRIGGER_SOFTWARE:                               &'static str = "TriggerSoftware";
    pub const TRIGGER_SOURCE:                                 &'static str = "TriggerSource";
    pub const WIDTH:                                          &'static str = "Width";
    pub const WIDTH_MAX:                                      &'static str = "WidthMax";

    /// GigE Vision stream channel packet size.
    pub const GEV_SCPS_PACKET_SIZE:                           &'static str = "GevSCPSPacketSize";
    /// GigE Vision stream channel packet delay.
    pub const GEV_SCPD:                                       &'static str = "GevSCPD";
}

/// Names used by devices which deviate from SFNC (older firmware, vendor-specific node maps).
pub mod deviations {
    pub const ACQUISITION_FRAME_RATE_ABS:                     &'static str = "AcquisitionFrameRateAbs";
    pub const ACQUISITION_FRAME_RATE_ENABLE:                  &'static str = "AcquisitionFrameRateEnable";
    pub const ACQUISITION_FRAME_RATE_ENABLED:                 &'static str = "AcquisitionFrameRateEnabled";
    pub const AUTO_EXPOSURE_TIME_ABS_LOWER_LIMIT:             &'static str = "AutoExposureTimeAbsLowerLimit";
    pub const AUTO_EXPOSURE_TIME_ABS_UPPER_LIMIT:             &'static str = "AutoExposureTimeAbsUpperLimit";
    pub const AUTO_EXPOSURE_TIME_LOWER_LIMIT:                 &'static str = "AutoExposureTimeLowerLimit";
    pub const AUTO_EXPOSURE_TIME_UPPER_LIMIT:                 &'static str = "AutoExposureTimeUpperLimit";
    pub const BALANCE_RATIO_ABS:                              &'static str = "BalanceRatioAbs";
    pub const BINNING_MODE_HORIZONTAL:                        &'static str = "BinningModeHorizontal";
    pub const BINNING_MODE_VERTICAL:                          &'static str = "BinningModeVertical";
    pub const BLACK_LEVEL_ENABLED:                            &'static str = "BlackLevelEnabled";
    pub const BLACK_LEVEL_RAW:                                &'static str = "BlackLevelRaw";
    pub const EXPOSURE_TIME_ABS:                              &'static str = "ExposureTimeAbs";
    pub const GAIN_RAW:                                       &'static str = "GainRaw";
    pub const GAMMA_ENABLE:                                   &'static str = "GammaEnable";
    pub const GAMMA_ENABLED:                                  &'static str = "GammaEnabled";
    pub const TRIGGER_DELAY_ABS:                              &'static str = "TriggerDelayAbs";
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum FeatureType {
    Enumeration,
    Integer,
    Float,
    Boolean,
    String,
    /// Exists, but none of the typed reads accept it.
    Command,
    NotFound
}

impl FeatureType {
    pub fn exists(&self) -> bool { *self != FeatureType::NotFound }
}

/// Outcome of a single typed read during probing.
enum ReadOutcome {
    Matched,
    Absent,
    OtherType
}

fn classify<T>(result: Result<T, FeatureError>) -> Result<ReadOutcome, FeatureError> {
    match result {
        Ok(_) => Ok(ReadOutcome::Matched),
        Err(FeatureError::NotFound(_)) => Ok(ReadOutcome::Absent),
        Err(FeatureError::WrongType(_)) => Ok(ReadOutcome::OtherType),
        Err(e @ FeatureError::Transport(..)) => Err(e),
        // Right type, but the value cannot be read at the moment.
        Err(_) => Ok(ReadOutcome::Matched)
    }
}

/// Per-session cache of feature types.
///
/// Must not outlive the device session it was filled for.
#[derive(Default)]
pub struct FeatureDirectory {
    cache: HashMap<String, FeatureType>
}

impl FeatureDirectory {
    pub fn new() -> FeatureDirectory {
        FeatureDirectory{ cache: HashMap::new() }
    }

    /// Determines whether `name` exists and what type it has.
    ///
    /// Typed reads are attempted in the order: enumeration, integer, float, boolean, string. Only transport failures
    /// are returned as errors.
    pub fn probe<N: NodeMap + ?Sized>(&mut self, node_map: &N, name: &str) -> Result<FeatureType, FeatureError> {
        if let Some(feature_type) = self.cache.get(name) {
            return Ok(*feature_type);
        }

        let feature_type = probe_uncached(node_map, name)?;
        log::trace!("feature {}: {}", name, feature_type);
        self.cache.insert(name.to_string(), feature_type);

        Ok(feature_type)
    }

    pub fn exists<N: NodeMap + ?Sized>(&mut self, node_map: &N, name: &str) -> Result<bool, FeatureError> {
        Ok(self.probe(node_map, name)?.exists())
    }

    /// Returns the first of `names` which exists on the device.
    pub fn first_existing<'n, N: NodeMap + ?Sized>(
        &mut self,
        node_map: &N,
        names: &[&'n str]
    ) -> Result<Option<(&'n str, FeatureType)>, FeatureError> {
        for name in names {
            let feature_type = self.probe(node_map, name)?;
            if feature_type.exists() {
                return Ok(Some((name, feature_type)));
            }
        }

        Ok(None)
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

fn probe_uncached<N: NodeMap + ?Sized>(node_map: &N, name: &str) -> Result<FeatureType, FeatureError> {
    let attempts: [(FeatureType, &dyn Fn() -> Result<ReadOutcome, FeatureError>); 5] = [
        (FeatureType::Enumeration, &|| classify(node_map.enum_value(name))),
        (FeatureType::Integer, &|| classify(node_map.int_value(name))),
        (FeatureType::Float, &|| classify(node_map.float_value(name))),
        (FeatureType::Boolean, &|| classify(node_map.bool_value(name))),
        (FeatureType::String, &|| classify(node_map.string_value(name))),
    ];

    for (feature_type, attempt) in attempts.iter() {
        match attempt()? {
            ReadOutcome::Matched => return Ok(*feature_type),
            ReadOutcome::Absent => return Ok(FeatureType::NotFound),
            ReadOutcome::OtherType => ()
        }
    }

    Ok(FeatureType::Command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::drivers::simulator::{SimHandle, SimNode};

    #[test]
    fn given_standard_features_probe_reports_their_types() {
        let device = SimHandle::new("P0001");
        let mut directory = FeatureDirectory::new();

        assert_eq!(FeatureType::Enumeration, directory.probe(&device, genicam::PIXEL_FORMAT).unwrap());
        assert_eq!(FeatureType::Integer, directory.probe(&device, genicam::WIDTH).unwrap());
        assert_eq!(FeatureType::Float, directory.probe(&device, genicam::EXPOSURE_TIME).unwrap());
        assert_eq!(FeatureType::Boolean, directory.probe(&device, genicam::ACQUISITION_STATUS).unwrap());
        assert_eq!(FeatureType::String, directory.probe(&device, genicam::DEVICE_MODEL_NAME).unwrap());
        assert_eq!(FeatureType::Command, directory.probe(&device, genicam::TRIGGER_SOFTWARE).unwrap());
    }

    #[test]
    fn given_missing_feature_probe_stops_at_first_read() {
        let device = SimHandle::new("P0002");
        let mut directory = FeatureDirectory::new();

        assert_eq!(FeatureType::NotFound, directory.probe(&device, "NoSuchFeature").unwrap());
        assert_eq!(1, device.read_count("NoSuchFeature"));
    }

    #[test]
    fn given_probed_feature_second_probe_uses_cache() {
        let device = SimHandle::new("P0003");
        let mut directory = FeatureDirectory::new();

        directory.probe(&device, genicam::TRIGGER_SOFTWARE).unwrap();
        let reads = device.read_count(genicam::TRIGGER_SOFTWARE);
        assert_eq!(5, reads);
        directory.probe(&device, genicam::TRIGGER_SOFTWARE).unwrap();
        assert_eq!(reads, device.read_count(genicam::TRIGGER_SOFTWARE));
    }

    #[test]
    fn given_transport_failure_probe_returns_error() {
        let device = SimHandle::new("P0004");
        device.fail_transport(genicam::GAIN);
        let mut directory = FeatureDirectory::new();

        assert!(directory.probe(&device, genicam::GAIN).unwrap_err().is_transport());
    }

    #[test]
    fn given_unreadable_integer_probe_still_reports_integer() {
        let device = SimHandle::new("P0005");
        device.insert("WriteOnlyInt", SimNode::int(0, 0, 10, 1).write_only());
        let mut directory = FeatureDirectory::new();

        assert_eq!(FeatureType::Integer, directory.probe(&device, "WriteOnlyInt").unwrap());
    }

    #[test]
    fn given_unreadable_float_probe_still_reports_float() {
        let device = SimHandle::new("P0007");
        device.insert("WriteOnlyFloat", SimNode::float(1.0, 0.0, 10.0).write_only());
        let mut directory = FeatureDirectory::new();

        assert_eq!(FeatureType::Float, directory.probe(&device, "WriteOnlyFloat").unwrap());
    }

    #[test]
    fn given_vendor_deviation_first_existing_picks_available_name() {
        let device = SimHandle::new("P0006");
        device.remove(genicam::EXPOSURE_TIME);
        device.insert(deviations::EXPOSURE_TIME_ABS, SimNode::float(1000.0, 10.0, 1.0e6));
        let mut directory = FeatureDirectory::new();

        let found = directory.first_existing(
            &device, &[genicam::EXPOSURE_TIME, deviations::EXPOSURE_TIME_ABS]
        ).unwrap();
        assert_eq!(Some((deviations::EXPOSURE_TIME_ABS, FeatureType::Float)), found);
    }
}
