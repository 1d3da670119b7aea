//
// GenCam - GenICam camera configuration and frame acquisition
// Copyright (c) 2020-2024 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Frame acquisition loop.
//!

use crate::camera::{CameraError, Device, Frame};
use crate::camera::access::Features;
use crate::camera::features::FeatureDirectory;
use crate::camera::session::SessionState;
use crate::camera::trigger::{self, AcquisitionMode, RearmPolicy};
use std::time::Duration;

const DEFAULT_GRAB_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_REARM_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_REARM_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Clone, Copy, Debug)]
pub struct AcquisitionSettings {
    /// Timeout of a single grab attempt.
    pub grab_delay: Duration,
    pub rearm: RearmPolicy
}

impl Default for AcquisitionSettings {
    fn default() -> AcquisitionSettings {
        AcquisitionSettings{
            grab_delay: DEFAULT_GRAB_DELAY,
            rearm: RearmPolicy{ timeout: Some(DEFAULT_REARM_TIMEOUT), poll_interval: DEFAULT_REARM_POLL_INTERVAL }
        }
    }
}

/// Waits for the next frame and copies it out of the stream buffer.
///
/// Makes up to `session.grab_attempts()` attempts. In non-continuous acquisition the stream is restarted after
/// each frame and, for software triggering, the next frame is requested.
pub fn request_frame<D: Device + ?Sized>(
    device: &mut D,
    directory: &mut FeatureDirectory,
    session: &mut SessionState,
    settings: &AcquisitionSettings
) -> Result<Frame, CameraError> {
    if session.rearm_pending {
        log::debug!("retrying software trigger for the next frame");
        if !trigger::rearm(&mut Features::new(device, directory), session, settings.rearm)? {
            log::warn!("software trigger still pending, waiting for a frame anyway");
        }
    }

    let attempts = session.grab_attempts();
    let mut frame = None;
    for attempt in 1..=attempts {
        if let Some(buffer) = device.grab(settings.grab_delay)? {
            frame = Some(Frame{ data: buffer.data().to_vec(), timestamp_ns: buffer.timestamp_ns() });
            break;
        }
        log::debug!("no frame after attempt {}/{}", attempt, attempts);
    }

    let frame = match frame {
        Some(frame) => frame,
        None => {
            log::error!("no frame received after {} attempt(s)", attempts);
            return Err(CameraError::NoFrame(attempts));
        }
    };

    log::trace!("frame received: {} bytes, timestamp {} ns", frame.size(), frame.timestamp_ns);

    if session.acquisition_mode == AcquisitionMode::NonContinuous {
        device.stop_streaming()?;
        device.start_streaming()?;

        if let Err(e) = trigger::rearm(&mut Features::new(device, directory), session, settings.rearm) {
            log::error!("failed to request the next frame: {}", e);
            session.rearm_pending = true;
        }
    }

    Ok(frame)
}
