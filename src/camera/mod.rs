//
// GenCam - GenICam camera configuration and frame acquisition
// Copyright (c) 2020-2024 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Common camera code: device access traits, errors and data types shared by the engine and the drivers.
//!

pub mod access;
pub mod acquisition;
pub mod drivers;
pub mod engine;
pub mod features;
pub mod orchestrator;
pub mod params;
pub mod pixel_format;
pub mod session;
pub mod trigger;

use std::time::Duration;

/// Typed failure of a single node map operation.
///
/// Feature probing relies on the distinction between `NotFound` (terminal) and `WrongType` (try the next type).
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum FeatureError {
    #[error("feature \"{0}\" not found")]
    NotFound(String),

    #[error("feature \"{0}\" accessed with a wrong type")]
    WrongType(String),

    #[error("feature \"{0}\" is not readable")]
    NotReadable(String),

    #[error("feature \"{0}\" is not writable")]
    NotWritable(String),

    #[error("value rejected by feature \"{0}\": {1}")]
    InvalidValue(String, String),

    /// Communication with the device failed; aborts a configuration pass.
    #[error("transport failure when accessing \"{0}\": {1}")]
    Transport(String, String)
}

impl FeatureError {
    pub fn is_transport(&self) -> bool {
        matches!(self, FeatureError::Transport(..))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("no cameras found")]
    NoDevice,

    #[error("camera with serial number \"{0}\" not found")]
    DeviceNotFound(String),

    #[error("camera is not open")]
    NotOpen,

    #[error("no frame received from the camera after {0} attempt(s)")]
    NoFrame(u32),

    #[error("width and height could not be set")]
    ResolutionNotApplied,

    #[error("pixel format \"{0}\" could not be set")]
    PixelFormatNotApplied(String),

    #[error("device reset triggered; the camera must be opened again")]
    DeviceReset,

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error("simulator error: {0:?}")]
    SimulatorError(drivers::simulator::SimulatorError),

    #[cfg(feature = "camera_spinnaker")]
    #[error("Spinnaker error: {0:?}")]
    SpinnakerError(drivers::spinnaker::SpinnakerError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceId(pub u64);

#[derive(Clone, Debug)]
pub struct DeviceInfo {
    id: DeviceId,
    vendor: String,
    model: String,
    serial_number: String
}

impl DeviceInfo {
    pub fn new(id: DeviceId, vendor: &str, model: &str, serial_number: &str) -> DeviceInfo {
        DeviceInfo{
            id,
            vendor: vendor.to_string(),
            model: model.to_string(),
            serial_number: serial_number.to_string()
        }
    }

    pub fn id(&self) -> DeviceId { self.id }
    pub fn vendor(&self) -> &str { &self.vendor }
    pub fn model(&self) -> &str { &self.model }
    pub fn serial_number(&self) -> &str { &self.serial_number }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntRange {
    pub min: i64,
    pub max: i64,
    /// Increment; 0 is treated as 1.
    pub step: i64
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloatRange {
    pub min: f64,
    pub max: f64
}

/// Captured frame, owned by the caller.
#[derive(Clone, Debug)]
pub struct Frame {
    pub data: Vec<u8>,
    /// Device timestamp in nanoseconds.
    pub timestamp_ns: u64
}

impl Frame {
    pub fn size(&self) -> usize { self.data.len() }
}

/// Filled stream buffer; returned to the device when dropped.
pub trait RawBuffer {
    fn data(&self) -> &[u8];

    fn timestamp_ns(&self) -> u64;
}

/// Typed access to the feature node map of an open device.
pub trait NodeMap {
    /// Returns symbolic names of the currently available entries.
    fn enum_entries(&self, name: &str) -> Result<Vec<String>, FeatureError>;

    fn enum_value(&self, name: &str) -> Result<String, FeatureError>;

    fn set_enum_value(&mut self, name: &str, value: &str) -> Result<(), FeatureError>;

    fn int_value(&self, name: &str) -> Result<i64, FeatureError>;

    fn int_range(&self, name: &str) -> Result<IntRange, FeatureError>;

    fn set_int_value(&mut self, name: &str, value: i64) -> Result<(), FeatureError>;

    fn float_value(&self, name: &str) -> Result<f64, FeatureError>;

    fn float_range(&self, name: &str) -> Result<FloatRange, FeatureError>;

    fn set_float_value(&mut self, name: &str, value: f64) -> Result<(), FeatureError>;

    fn bool_value(&self, name: &str) -> Result<bool, FeatureError>;

    fn set_bool_value(&mut self, name: &str, value: bool) -> Result<(), FeatureError>;

    fn string_value(&self, name: &str) -> Result<String, FeatureError>;

    fn execute(&mut self, name: &str) -> Result<(), FeatureError>;
}

/// Open device: its node map and its (first) data stream.
pub trait Device: NodeMap {
    fn info(&self) -> &DeviceInfo;

    fn open_stream(&mut self) -> Result<(), CameraError>;

    fn start_streaming(&mut self) -> Result<(), CameraError>;

    fn stop_streaming(&mut self) -> Result<(), CameraError>;

    fn close_stream(&mut self) -> Result<(), CameraError>;

    /// Waits up to `timeout` for the next filled buffer; `None` if nothing arrived.
    fn grab(&mut self, timeout: Duration) -> Result<Option<Box<dyn RawBuffer + '_>>, CameraError>;

    fn close(&mut self) -> Result<(), CameraError>;
}

pub trait Driver {
    fn name(&self) -> &'static str;

    fn enumerate_devices(&mut self) -> Result<Vec<DeviceInfo>, CameraError>;

    /// Opens the device; its stream is not opened yet.
    ///
    /// # Parameters
    ///
    /// * `id` - One of IDs returned by the most recent call to `enumerate_devices`.
    fn open_device(&mut self, id: DeviceId) -> Result<Box<dyn Device>, CameraError>;
}
