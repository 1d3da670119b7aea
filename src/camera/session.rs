//
// GenCam - GenICam camera configuration and frame acquisition
// Copyright (c) 2020-2024 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Facts learned about the device during configuration, used by acquisition.
//!

use crate::camera::pixel_format::PixelFormat;
use crate::camera::trigger::{AcquisitionMode, TriggerMode, TriggerSource};

/// State of one open/close cycle of a device.
#[derive(Clone, Debug)]
pub struct SessionState {
    pub trigger_mode: TriggerMode,
    pub trigger_source: TriggerSource,
    pub acquisition_mode: AcquisitionMode,
    pub offsets_writable: bool,
    pub width_max: Option<i64>,
    pub height_max: Option<i64>,
    pub pixel_format: PixelFormat,
    pub acquisition_status_present: bool,
    /// Grab attempt budget; 0 means a single attempt.
    pub hw_trigger_timeout: u32,
    /// `BlackLevelAuto` as read back after configuring it.
    pub black_level_auto: Option<String>,
    /// `GainAuto` as read back after configuring it.
    pub gain_auto: Option<String>,
    /// The software trigger for the next frame has not been issued yet.
    pub rearm_pending: bool
}

impl Default for SessionState {
    fn default() -> SessionState {
        SessionState{
            trigger_mode: TriggerMode::Off,
            trigger_source: TriggerSource::Software,
            acquisition_mode: AcquisitionMode::Continuous,
            offsets_writable: true,
            width_max: None,
            height_max: None,
            pixel_format: PixelFormat::Mono8,
            acquisition_status_present: false,
            hw_trigger_timeout: 0,
            black_level_auto: None,
            gain_auto: None,
            rearm_pending: false
        }
    }
}

impl SessionState {
    /// Frames are produced only after a software trigger command.
    pub fn software_triggered(&self) -> bool {
        self.acquisition_mode == AcquisitionMode::NonContinuous
            && self.trigger_mode == TriggerMode::On
            && self.trigger_source == TriggerSource::Software
    }

    /// Frames are produced only after an external trigger signal.
    pub fn hardware_triggered(&self) -> bool {
        self.acquisition_mode == AcquisitionMode::NonContinuous
            && self.trigger_mode == TriggerMode::On
            && matches!(self.trigger_source, TriggerSource::Hardware(_))
    }

    /// Number of grab attempts made before giving up on a frame.
    pub fn grab_attempts(&self) -> u32 {
        self.hw_trigger_timeout.max(1)
    }
}
