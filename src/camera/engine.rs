//
// GenCam - GenICam camera configuration and frame acquisition
// Copyright (c) 2020-2024 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Camera engine: owns an open device for the duration of one open/close cycle.
//!

use crate::camera::{CameraError, Device, DeviceInfo, Driver, Frame};
use crate::camera::access::Features;
use crate::camera::acquisition::{self, AcquisitionSettings};
use crate::camera::features::{genicam, FeatureDirectory};
use crate::camera::orchestrator;
use crate::camera::params::ConfigurationRequest;
use crate::camera::pixel_format::{OutputFormat, PixelFormat};
use crate::camera::session::SessionState;

pub struct GenCam {
    device: Option<Box<dyn Device>>,
    directory: FeatureDirectory,
    session: SessionState,
    settings: AcquisitionSettings
}

/// Removes devices reported more than once (e.g. over several interfaces); the first report wins.
fn unique_by_serial(devices: Vec<DeviceInfo>) -> Vec<DeviceInfo> {
    let mut unique: Vec<DeviceInfo> = vec![];
    for device in devices {
        if !unique.iter().any(|d| d.serial_number() == device.serial_number()) {
            unique.push(device);
        }
    }
    unique
}

impl GenCam {
    /// Opens and configures a camera, then starts streaming.
    ///
    /// Selects the camera with `request.serial_number`, or the first one found. On failure the camera is closed.
    pub fn open(driver: &mut dyn Driver, request: &ConfigurationRequest) -> Result<GenCam, CameraError> {
        GenCam::open_with_settings(driver, request, AcquisitionSettings::default())
    }

    pub fn open_with_settings(
        driver: &mut dyn Driver,
        request: &ConfigurationRequest,
        settings: AcquisitionSettings
    ) -> Result<GenCam, CameraError> {
        let devices = unique_by_serial(driver.enumerate_devices()?);
        for device in &devices {
            log::info!(
                "found {} camera: {} {}, S/N {}",
                driver.name(), device.vendor(), device.model(), device.serial_number()
            );
        }

        let info = match &request.serial_number {
            Some(serial_number) => devices.iter()
                .find(|d| d.serial_number() == serial_number)
                .ok_or_else(|| CameraError::DeviceNotFound(serial_number.clone()))?,

            None => devices.first().ok_or(CameraError::NoDevice)?
        };

        log::info!("opening camera S/N {}", info.serial_number());
        let device = driver.open_device(info.id())?;

        let mut camera = GenCam{
            device: Some(device),
            directory: FeatureDirectory::new(),
            session: SessionState::default(),
            settings
        };

        // On error `camera` is dropped, which closes the device.
        camera.log_camera_info()?;
        if let Err(e) = camera.configure(request) {
            log::error!("camera configuration failed: {}", e);
            return Err(e);
        }

        Ok(camera)
    }

    fn log_camera_info(&mut self) -> Result<(), CameraError> {
        let device = self.device.as_mut().ok_or(CameraError::NotOpen)?;
        let mut features = Features::new(device.as_mut(), &mut self.directory);
        let vendor = features.get_string(genicam::DEVICE_VENDOR_NAME)?.unwrap_or_default();
        let model = features.get_string(genicam::DEVICE_MODEL_NAME)?.unwrap_or_default();
        log::info!("camera vendor: {}, model: {}", vendor, model);

        Ok(())
    }

    fn configure(&mut self, request: &ConfigurationRequest) -> Result<(), CameraError> {
        let device = self.device.as_mut().ok_or(CameraError::NotOpen)?;
        orchestrator::configure(device.as_mut(), &mut self.directory, request, &mut self.session)
    }

    /// Returns the next frame; errors leave the camera open.
    pub fn request_frame(&mut self) -> Result<Frame, CameraError> {
        let device = self.device.as_mut().ok_or(CameraError::NotOpen)?;
        acquisition::request_frame(device.as_mut(), &mut self.directory, &mut self.session, &self.settings)
    }

    /// Stops streaming and closes the camera. Does nothing if already closed.
    pub fn close(&mut self) {
        if let Some(mut device) = self.device.take() {
            if let Err(e) = device.stop_streaming() { log::warn!("failed to stop streaming: {}", e); }
            if let Err(e) = device.close_stream() { log::warn!("failed to close stream: {}", e); }
            if let Err(e) = device.close() { log::warn!("failed to close camera: {}", e); }
            log::info!("camera S/N {} closed", device.info().serial_number());
        }

        self.directory.clear();
        self.session = SessionState::default();
    }

    pub fn is_open(&self) -> bool { self.device.is_some() }

    pub fn device_info(&self) -> Option<&DeviceInfo> { self.device.as_ref().map(|d| d.info()) }

    pub fn session(&self) -> &SessionState { &self.session }

    pub fn pixel_format(&self) -> PixelFormat { self.session.pixel_format }

    /// Media type and format of the frames returned by `request_frame`.
    pub fn output_format(&self) -> OutputFormat { self.session.pixel_format.output_format() }
}

impl Drop for GenCam {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::drivers::simulator::{SimDriver, SimHandle};
    use crate::camera::params::Setting;
    use crate::camera::trigger::RearmPolicy;
    use std::time::Duration;

    fn fast_settings() -> AcquisitionSettings {
        AcquisitionSettings{
            grab_delay: Duration::from_millis(1),
            rearm: RearmPolicy{ timeout: Some(Duration::from_millis(20)), poll_interval: Duration::from_millis(1) }
        }
    }

    fn open(driver: &mut SimDriver, request: &ConfigurationRequest) -> Result<GenCam, CameraError> {
        GenCam::open_with_settings(driver, request, fast_settings())
    }

    #[test]
    fn given_default_request_camera_streams_mono8_frames() {
        let device = SimHandle::new("E0001");
        let mut driver = SimDriver::with_devices(vec![device.clone()]);

        let mut camera = open(&mut driver, &ConfigurationRequest::default()).unwrap();
        let frame = camera.request_frame().unwrap();

        assert_eq!(2048 * 1536, frame.size());
        assert_eq!(PixelFormat::Mono8, camera.pixel_format());
        assert_eq!("GRAY8", camera.output_format().format);
        assert_eq!(Some("E0001"), camera.device_info().map(|i| i.serial_number()));
        assert!(device.is_streaming());
    }

    #[test]
    fn given_serial_number_matching_camera_is_opened() {
        let first = SimHandle::new("E0002");
        let second = SimHandle::new("E0003");
        let mut driver = SimDriver::with_devices(vec![first.clone(), second.clone()]);
        let request = ConfigurationRequest{ serial_number: Some("E0003".to_string()), ..Default::default() };

        let _camera = open(&mut driver, &request).unwrap();

        assert!(second.is_streaming());
        assert!(!first.is_streaming());
    }

    #[test]
    fn given_duplicate_serial_numbers_first_camera_is_opened() {
        let first = SimHandle::new("E0004");
        let duplicate = SimHandle::new("E0004");
        let mut driver = SimDriver::with_devices(vec![first.clone(), duplicate.clone()]);

        let _camera = open(&mut driver, &ConfigurationRequest::default()).unwrap();

        assert!(first.is_streaming());
        assert!(!duplicate.is_streaming());
    }

    #[test]
    fn given_unknown_serial_number_open_fails() {
        let mut driver = SimDriver::with_devices(vec![SimHandle::new("E0005")]);
        let request = ConfigurationRequest{ serial_number: Some("XYZ".to_string()), ..Default::default() };

        assert!(matches!(open(&mut driver, &request), Err(CameraError::DeviceNotFound(ref s)) if s == "XYZ"));
    }

    #[test]
    fn given_no_cameras_open_fails() {
        let mut driver = SimDriver::with_devices(vec![]);

        assert!(matches!(open(&mut driver, &ConfigurationRequest::default()), Err(CameraError::NoDevice)));
    }

    #[test]
    fn given_configuration_failure_camera_is_closed() {
        let device = SimHandle::new("E0006");
        let mut driver = SimDriver::with_devices(vec![device.clone()]);
        let request = ConfigurationRequest{
            pixel_format: Setting::Explicit("bgr8".to_string()),
            ..Default::default()
        };

        assert!(open(&mut driver, &request).is_err());
        assert!(device.is_closed());
    }

    #[test]
    fn given_transport_failure_during_configuration_camera_is_closed() {
        let device = SimHandle::new("E0007");
        device.fail_transport(genicam::EXPOSURE_AUTO);
        let mut driver = SimDriver::with_devices(vec![device.clone()]);
        let request = ConfigurationRequest{ use_default_properties: true, ..Default::default() };

        assert!(matches!(open(&mut driver, &request), Err(CameraError::Feature(_))));
        assert!(device.is_closed());
        assert!(!device.is_streaming());
    }

    #[test]
    fn given_device_reset_camera_is_reset_and_closed() {
        let device = SimHandle::new("E0008");
        let mut driver = SimDriver::with_devices(vec![device.clone()]);
        let request = ConfigurationRequest{ device_reset: true, ..Default::default() };

        assert!(matches!(open(&mut driver, &request), Err(CameraError::DeviceReset)));
        assert!(device.reset_requested());
        assert!(device.is_closed());
    }

    #[test]
    fn given_closed_camera_frame_request_fails() {
        let device = SimHandle::new("E0009");
        let mut driver = SimDriver::with_devices(vec![device.clone()]);
        let mut camera = open(&mut driver, &ConfigurationRequest::default()).unwrap();

        camera.close();

        assert!(!camera.is_open());
        assert!(device.is_closed());
        assert!(matches!(camera.request_frame(), Err(CameraError::NotOpen)));
    }

    #[test]
    fn given_dropped_camera_device_is_closed() {
        let device = SimHandle::new("E0010");
        let mut driver = SimDriver::with_devices(vec![device.clone()]);
        {
            let _camera = open(&mut driver, &ConfigurationRequest::default()).unwrap();
            assert!(!device.is_closed());
        }

        assert!(device.is_closed());
    }

    #[test]
    fn given_software_triggered_camera_each_frame_costs_one_trigger() {
        let device = SimHandle::new("E0011");
        let mut driver = SimDriver::with_devices(vec![device.clone()]);
        let request = ConfigurationRequest{
            acquisition_mode: Setting::Explicit("MultiFrame".to_string()),
            ..Default::default()
        };
        let mut camera = open(&mut driver, &request).unwrap();

        for frame_count in 1..=5 {
            camera.request_frame().unwrap();
            assert_eq!(frame_count + 1, device.command_count(genicam::TRIGGER_SOFTWARE));
        }
    }

    #[test]
    fn given_failed_frame_camera_stays_open_for_retry() {
        let device = SimHandle::new("E0012");
        let mut driver = SimDriver::with_devices(vec![device.clone()]);
        let request = ConfigurationRequest{
            acquisition_mode: Setting::Explicit("SingleFrame".to_string()),
            trigger_source: Setting::Explicit("Line2".to_string()),
            hw_trigger_timeout: 2,
            ..Default::default()
        };
        let mut camera = open(&mut driver, &request).unwrap();

        assert!(matches!(camera.request_frame(), Err(CameraError::NoFrame(2))));
        assert!(camera.is_open());

        device.fire_line_trigger();
        assert!(camera.request_frame().is_ok());
    }
}
