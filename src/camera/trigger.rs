//
// GenCam - GenICam camera configuration and frame acquisition
// Copyright (c) 2020-2024 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Trigger and acquisition mode state machine.
//!
//! Continuous acquisition runs free-running (trigger off). Any other acquisition mode (single frame, multi frame)
//! runs triggered: by a software command issued once per frame, or by an external signal.
//!

use crate::camera::{CameraError, NodeMap};
use crate::camera::access::Features;
use crate::camera::features::genicam;
use crate::camera::session::SessionState;
use std::convert::TryFrom;
use std::time::{Duration, Instant};

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum TriggerMode {
    Off,
    On
}

impl TriggerMode {
    pub fn from_device_value(value: &str) -> TriggerMode {
        if value.eq_ignore_ascii_case("On") { TriggerMode::On } else { TriggerMode::Off }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TriggerSource {
    Software,
    /// Device-specific source name, e.g. "Line1".
    Hardware(String)
}

impl TriggerSource {
    pub fn from_name(name: &str) -> TriggerSource {
        if name.eq_ignore_ascii_case("Software") {
            TriggerSource::Software
        } else {
            TriggerSource::Hardware(name.to_string())
        }
    }
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TriggerSource::Software => write!(f, "Software"),
            TriggerSource::Hardware(name) => write!(f, "{}", name)
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AcquisitionMode {
    Continuous,
    /// Single frame, multi frame and any device-specific mode.
    NonContinuous
}

impl AcquisitionMode {
    pub fn from_device_value(value: &str) -> AcquisitionMode {
        if value.eq_ignore_ascii_case("Continuous") {
            AcquisitionMode::Continuous
        } else {
            AcquisitionMode::NonContinuous
        }
    }
}

/// Derives the trigger mode from the device's current acquisition mode and writes it.
///
/// The session's trigger mode changes only if the device accepts the write.
pub fn apply_trigger_mode<N: NodeMap + ?Sized>(
    features: &mut Features<N>,
    session: &mut SessionState
) -> Result<(), CameraError> {
    if let Some(mode) = features.get_enum(genicam::ACQUISITION_MODE)? {
        session.acquisition_mode = AcquisitionMode::from_device_value(&mode);
    }
    if let Some(mode) = features.get_enum(genicam::TRIGGER_MODE)? {
        session.trigger_mode = TriggerMode::from_device_value(&mode);
    }

    match session.acquisition_mode {
        AcquisitionMode::Continuous => {
            if features.set_enum(genicam::TRIGGER_MODE, "Off")? {
                session.trigger_mode = TriggerMode::Off;
            }
        },

        AcquisitionMode::NonContinuous => {
            if features.set_enum(genicam::TRIGGER_MODE, "On")? {
                session.trigger_mode = TriggerMode::On;
            }
            log::info!("setting {} to \"FrameTriggerWait\"", genicam::ACQUISITION_STATUS_SELECTOR);
            features.set_enum(genicam::ACQUISITION_STATUS_SELECTOR, "FrameTriggerWait")?;
        }
    }

    Ok(())
}

/// Finalizes triggering once streaming has started.
///
/// Sets the grab attempt budget and, for software triggering, requests the first frame.
pub fn start_triggering<N: NodeMap + ?Sized>(
    features: &mut Features<N>,
    session: &mut SessionState,
    requested_timeout: i64
) -> Result<(), CameraError> {
    match session.acquisition_mode {
        AcquisitionMode::Continuous => {
            if requested_timeout > 0 {
                log::info!("hardware trigger timeout not used in continuous acquisition");
            }
            session.hw_trigger_timeout = 0;
        },

        AcquisitionMode::NonContinuous => {
            session.hw_trigger_timeout = if requested_timeout <= 0 {
                1
            } else {
                u32::try_from(requested_timeout).unwrap_or(u32::MAX)
            };

            if session.software_triggered() {
                if !software_trigger(features, session)? {
                    session.rearm_pending = true;
                }
            } else if session.hardware_triggered() {
                log::info!(
                    "waiting for trigger on {}, up to {} grab attempt(s) per frame",
                    session.trigger_source, session.hw_trigger_timeout
                );
            }
        }
    }

    log::debug!(
        "acquisition: {:?}, trigger: {}, source: {}, timeout: {}",
        session.acquisition_mode, session.trigger_mode, session.trigger_source, session.hw_trigger_timeout
    );

    Ok(())
}

/// Executes `TriggerSoftware`; refused unless the trigger source is software.
pub fn software_trigger<N: NodeMap + ?Sized>(
    features: &mut Features<N>,
    session: &SessionState
) -> Result<bool, CameraError> {
    if session.trigger_source != TriggerSource::Software {
        log::warn!(
            "{}: command not triggered, {} is \"{}\"",
            genicam::TRIGGER_SOFTWARE, genicam::TRIGGER_SOURCE, session.trigger_source
        );
        return Ok(false);
    }

    features.execute(genicam::TRIGGER_SOFTWARE)
}

/// Bounds the wait for the device to become ready for the next software trigger.
#[derive(Clone, Copy, Debug)]
pub struct RearmPolicy {
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub poll_interval: Duration
}

/// Requests the next frame in software-triggered acquisition.
///
/// Waits until `AcquisitionStatus` (if present) reports readiness, then issues the trigger. If the device is not
/// ready in time, the trigger is left pending and `Ok(false)` is returned.
pub fn rearm<N: NodeMap + ?Sized>(
    features: &mut Features<N>,
    session: &mut SessionState,
    policy: RearmPolicy
) -> Result<bool, CameraError> {
    if !session.software_triggered() {
        session.rearm_pending = false;
        return Ok(true);
    }

    if session.acquisition_status_present {
        let t_start = Instant::now();
        while features.get_bool(genicam::ACQUISITION_STATUS)? != Some(true) {
            if let Some(timeout) = policy.timeout {
                if t_start.elapsed() >= timeout {
                    log::warn!("device not ready for software trigger after {:.3} s", timeout.as_secs_f64());
                    session.rearm_pending = true;
                    return Ok(false);
                }
            }
            std::thread::sleep(policy.poll_interval);
        }
    }

    let triggered = software_trigger(features, session)?;
    session.rearm_pending = !triggered;

    Ok(triggered)
}
