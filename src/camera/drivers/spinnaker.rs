//
// GenCam - GenICam camera configuration and frame acquisition
// Copyright (c) 2021-2024 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Spinnaker camera driver.
//!
//! Exposes the camera's GenICam node map as-is; all feature logic lives in the engine.
//!

#![allow(
    non_camel_case_types,
    non_upper_case_globals,
    non_snake_case
)]

use crate::camera::*;
use crate::camera::features::genicam;
use libspinnaker_sys::*;
use std::time::Duration;

#[derive(Debug)]
pub enum SpinnakerError {
    Internal(_spinError),
    Error(String)
}

impl From<SpinnakerError> for CameraError {
    fn from(spinnaker_error: SpinnakerError) -> CameraError {
        CameraError::SpinnakerError(spinnaker_error)
    }
}

macro_rules! checked_call {
    ($func_call:expr) => {
        #[allow(non_upper_case_globals)]
        match unsafe { $func_call } {
            _spinError_SPINNAKER_ERR_SUCCESS => (),
            error => return Err(SpinnakerError::Internal(error).into())
        }
    }
}

#[derive(Copy, Clone)]
enum Direction {
    Read,
    Write
}

/// Classifies a Spinnaker failure of a feature operation.
fn feature_error(name: &str, error: SpinnakerError, direction: Direction) -> FeatureError {
    match error {
        SpinnakerError::Internal(code) => match code {
            _spinError_SPINNAKER_ERR_IO
            | _spinError_SPINNAKER_ERR_TIMEOUT
            | _spinError_SPINNAKER_ERR_GENICAM_TIMEOUT
            | _spinError_SPINNAKER_ERR_INVALID_HANDLE
            | _spinError_SPINNAKER_ERR_NOT_INITIALIZED
            => FeatureError::Transport(name.to_string(), format!("Spinnaker error {}", code)),

            _spinError_SPINNAKER_ERR_ACCESS_DENIED | _spinError_SPINNAKER_ERR_GENICAM_ACCESS => match direction {
                Direction::Read => FeatureError::NotReadable(name.to_string()),
                Direction::Write => FeatureError::NotWritable(name.to_string())
            },

            _ => FeatureError::InvalidValue(name.to_string(), format!("Spinnaker error {}", code))
        },

        SpinnakerError::Error(message) => FeatureError::InvalidValue(name.to_string(), message)
    }
}

/// Wrappers of Spinnaker objects.
mod spin {
    use libspinnaker_sys::*;
    use super::SpinnakerError;

    fn c_string(s: &str) -> Result<std::ffi::CString, SpinnakerError> {
        std::ffi::CString::new(s).map_err(|_| SpinnakerError::Error(format!("invalid name: \"{}\"", s)))
    }

    /// Calls the string `getter` on `object`.
    pub fn read_string<Object>(
        object: Object,
        getter: unsafe extern "C" fn(Object, *mut ::std::os::raw::c_char, *mut size_t) -> spinError
    ) -> Result<String, SpinnakerError> {
        const MAX_BUF_LEN: usize = 256;
        let mut buf: [std::os::raw::c_char; MAX_BUF_LEN] = [0; MAX_BUF_LEN];
        let mut returned_buf_len: size_t = MAX_BUF_LEN as size_t;
        checked_call!(getter(object, (&mut buf).as_mut_ptr(), &mut returned_buf_len));

        let len = (returned_buf_len as usize).min(MAX_BUF_LEN);
        if len == 0 {
            return Ok("".to_string());
        }

        let bytes: Vec<u8> = buf[..len - 1].iter().map(|signed| *signed as u8).collect();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Calls the value `getter` on `object`.
    fn read_value<Value>(
        object: *mut std::os::raw::c_void,
        getter: unsafe extern "C" fn(*mut std::os::raw::c_void, *mut Value) -> spinError
    ) -> Result<Value, SpinnakerError> {
        let mut value = std::mem::MaybeUninit::uninit();
        checked_call!(getter(object, value.as_mut_ptr()));
        let value = unsafe { value.assume_init() };
        Ok(value)
    }

    pub struct System {
        handle: *mut std::os::raw::c_void
    }

    impl System {
        pub fn new() -> Result<System, SpinnakerError> {
            let mut handle = std::ptr::null_mut();
            checked_call!(spinSystemGetInstance(&mut handle));
            Ok(System{ handle })
        }

        pub fn get(&mut self) -> *mut std::os::raw::c_void {
            self.handle
        }
    }

    impl Drop for System {
        fn drop(&mut self) {
            unsafe { spinSystemReleaseInstance(self.handle); }
        }
    }

    pub struct CameraList {
        handle: *mut std::os::raw::c_void
    }

    impl CameraList {
        pub fn new() -> Result<CameraList, SpinnakerError> {
            let mut handle = std::ptr::null_mut();
            checked_call!(spinCameraListCreateEmpty(&mut handle));
            Ok(CameraList{ handle })
        }

        pub fn get(&mut self) -> *mut std::os::raw::c_void {
            self.handle
        }

        pub fn num_cameras(&self) -> Result<usize, SpinnakerError> {
            let result = read_value::<size_t>(self.handle, spinCameraListGetSize)?;
            Ok(result as usize)
        }

        pub fn camera(&self, index: usize) -> Result<Camera, SpinnakerError> {
            let mut handle = std::ptr::null_mut();
            checked_call!(spinCameraListGet(self.handle, index as size_t, &mut handle));
            Ok(Camera{ handle })
        }
    }

    impl Drop for CameraList {
        fn drop(&mut self) {
            unsafe { spinCameraListDestroy(self.handle); }
        }
    }

    pub struct Image {
        handle: *mut std::os::raw::c_void
    }

    impl Image {
        pub fn is_incomplete(&self) -> Result<bool, SpinnakerError> {
            let result = read_value(self.handle, spinImageIsIncomplete)?;
            Ok(result == True)
        }

        pub fn data_ptr(&self) -> Result<*const ::std::os::raw::c_void, SpinnakerError> {
            let value = read_value(self.handle, spinImageGetData)?;
            Ok(value)
        }

        pub fn data_size(&self) -> Result<size_t, SpinnakerError> {
            read_value(self.handle, spinImageGetBufferSize)
        }

        pub fn timestamp(&self) -> Result<u64, SpinnakerError> {
            read_value(self.handle, spinImageGetTimeStamp)
        }
    }

    impl Drop for Image {
        fn drop(&mut self) {
            unsafe { spinImageRelease(self.handle); }
        }
    }

    pub struct Camera {
        handle: *mut std::os::raw::c_void
    }

    impl Camera {
        /// Returns `None` on timeout.
        pub fn next_image(&self, timeout_ms: u64) -> Result<Option<Image>, SpinnakerError> {
            let mut handle = std::ptr::null_mut();
            match unsafe { spinCameraGetNextImageEx(self.handle, timeout_ms, &mut handle) } {
                _spinError_SPINNAKER_ERR_SUCCESS => Ok(Some(Image{ handle })),
                _spinError_SPINNAKER_ERR_TIMEOUT => Ok(None),
                error => Err(SpinnakerError::Internal(error))
            }
        }

        pub fn init(&mut self) -> Result<(), SpinnakerError> {
            checked_call!(spinCameraInit(self.handle));
            Ok(())
        }

        pub fn deinit(&mut self) -> Result<(), SpinnakerError> {
            checked_call!(spinCameraDeInit(self.handle));
            Ok(())
        }

        pub fn device_node_map(&self) -> Result<NodeMap, SpinnakerError> {
            let mut handle = std::ptr::null_mut();
            checked_call!(spinCameraGetTLDeviceNodeMap(self.handle, &mut handle));
            Ok(NodeMap{ handle })
        }

        /// Requires initialization via `init`.
        pub fn genicam_node_map(&self) -> Result<NodeMap, SpinnakerError> {
            let mut handle = std::ptr::null_mut();
            checked_call!(spinCameraGetNodeMap(self.handle, &mut handle));
            Ok(NodeMap{ handle })
        }

        pub fn begin_acquisition(&self) -> Result<(), SpinnakerError> {
            checked_call!(spinCameraBeginAcquisition(self.handle));
            Ok(())
        }

        pub fn end_acquisition(&self) -> Result<(), SpinnakerError> {
            checked_call!(spinCameraEndAcquisition(self.handle));
            Ok(())
        }
    }

    impl Drop for Camera {
        fn drop(&mut self) {
            let _ = self.end_acquisition();
            let _ = self.deinit();
            unsafe { spinCameraRelease(self.handle); }
        }
    }

    pub struct NodeMap {
        handle: *mut std::os::raw::c_void
    }

    impl NodeMap {
        /// Returns `None` if the node does not exist or is not available.
        pub fn node(&self, name: &str) -> Result<Option<Node>, SpinnakerError> {
            let c_name = c_string(name)?;
            let mut handle = std::ptr::null_mut();
            if unsafe { spinNodeMapGetNode(self.handle, c_name.as_c_str().as_ptr(), &mut handle) }
                != _spinError_SPINNAKER_ERR_SUCCESS || handle.is_null() {
                return Ok(None);
            }

            let mut available: bool8_t = False;
            checked_call!(spinNodeIsAvailable(handle, &mut available));
            if available != True {
                return Ok(None);
            }

            Ok(Some(Node{ handle }))
        }
    }

    pub struct Node {
        handle: *mut std::os::raw::c_void
    }

    impl Node {
        pub fn node_type(&self) -> Result<_spinNodeType, SpinnakerError> {
            read_value(self.handle, spinNodeGetType)
        }

        pub fn readable(&self) -> Result<bool, SpinnakerError> {
            let result = read_value(self.handle, spinNodeIsReadable)?;
            Ok(result == True)
        }

        pub fn writable(&self) -> Result<bool, SpinnakerError> {
            let result = read_value(self.handle, spinNodeIsWritable)?;
            Ok(result == True)
        }

        pub fn string_value(&self) -> Result<String, SpinnakerError> {
            read_string(self.handle, spinStringGetValue)
        }

        pub fn int_value(&self) -> Result<i64, SpinnakerError> {
            read_value(self.handle, spinIntegerGetValue)
        }

        pub fn set_int_value(&self, value: i64) -> Result<(), SpinnakerError> {
            checked_call!(spinIntegerSetValue(self.handle, value));
            Ok(())
        }

        pub fn min_int(&self) -> Result<i64, SpinnakerError> {
            read_value(self.handle, spinIntegerGetMin)
        }

        pub fn max_int(&self) -> Result<i64, SpinnakerError> {
            read_value(self.handle, spinIntegerGetMax)
        }

        pub fn int_increment(&self) -> Result<i64, SpinnakerError> {
            read_value(self.handle, spinIntegerGetInc)
        }

        pub fn float_value(&self) -> Result<f64, SpinnakerError> {
            read_value(self.handle, spinFloatGetValue)
        }

        pub fn set_float_value(&self, value: f64) -> Result<(), SpinnakerError> {
            checked_call!(spinFloatSetValue(self.handle, value));
            Ok(())
        }

        pub fn min_float(&self) -> Result<f64, SpinnakerError> {
            read_value(self.handle, spinFloatGetMin)
        }

        pub fn max_float(&self) -> Result<f64, SpinnakerError> {
            read_value(self.handle, spinFloatGetMax)
        }

        pub fn bool_value(&self) -> Result<bool, SpinnakerError> {
            let result = read_value(self.handle, spinBooleanGetValue)?;
            Ok(result == True)
        }

        pub fn set_bool_value(&self, value: bool) -> Result<(), SpinnakerError> {
            checked_call!(spinBooleanSetValue(self.handle, if value { True } else { False }));
            Ok(())
        }

        pub fn execute(&self) -> Result<(), SpinnakerError> {
            checked_call!(spinCommandExecute(self.handle));
            Ok(())
        }

        /// Returns symbolic names of available entries.
        pub fn enum_entries(&self) -> Result<Vec<String>, SpinnakerError> {
            let mut entries = vec![];

            let num_entries = read_value(self.handle, spinEnumerationGetNumEntries)?;
            for i in 0..num_entries {
                let mut entry_node = std::mem::MaybeUninit::uninit();
                checked_call!(spinEnumerationGetEntryByIndex(self.handle, i, entry_node.as_mut_ptr()));
                let entry_node = unsafe { entry_node.assume_init() };

                let entry_is_available = read_value(entry_node, spinNodeIsAvailable)?;
                if entry_is_available == True {
                    entries.push(read_string(entry_node, spinEnumerationEntryGetSymbolic)?);
                }

                checked_call!(spinEnumerationReleaseNode(self.handle, entry_node));
            }

            Ok(entries)
        }

        pub fn current_enum_symbolic(&self) -> Result<String, SpinnakerError> {
            let current_entry = read_value(self.handle, spinEnumerationGetCurrentEntry)?;
            let result = read_string(current_entry, spinEnumerationEntryGetSymbolic)?;
            checked_call!(spinEnumerationReleaseNode(self.handle, current_entry));
            Ok(result)
        }

        pub fn set_enum_symbolic(&self, symbolic: &str) -> Result<(), SpinnakerError> {
            let c_symbolic = c_string(symbolic)?;
            let mut entry = std::ptr::null_mut();
            checked_call!(spinEnumerationGetEntryByName(self.handle, c_symbolic.as_c_str().as_ptr(), &mut entry));
            let value = read_value(entry, spinEnumerationEntryGetIntValue)?;
            checked_call!(spinEnumerationReleaseNode(self.handle, entry));
            checked_call!(spinEnumerationSetIntValue(self.handle, value));
            Ok(())
        }
    }
}

pub struct SpinnakerDriver {
    system: spin::System,
    cameras: Option<spin::CameraList>
}

impl SpinnakerDriver {
    pub fn new() -> Result<SpinnakerDriver, CameraError> {
        let mut system = spin::System::new()?;

        let mut lib_ver = std::mem::MaybeUninit::uninit();
        checked_call!(spinSystemGetLibraryVersion(system.get(), lib_ver.as_mut_ptr()));
        let lib_ver = unsafe { lib_ver.assume_init() };
        log::info!("Spinnaker version: {}.{}.{}.{}", lib_ver.major, lib_ver.minor, lib_ver.type_, lib_ver.build);

        Ok(SpinnakerDriver{ system, cameras: None })
    }
}

fn read_device_string(node_map: &spin::NodeMap, name: &str) -> Result<String, SpinnakerError> {
    match node_map.node(name)? {
        Some(node) => node.string_value(),
        None => Ok("".to_string())
    }
}

impl Driver for SpinnakerDriver {
    fn name(&self) -> &'static str { "Spinnaker" }

    fn enumerate_devices(&mut self) -> Result<Vec<DeviceInfo>, CameraError> {
        let mut camera_list = spin::CameraList::new()?;
        checked_call!(spinSystemGetCameras(self.system.get(), camera_list.get()));

        let mut result = vec![];
        for i in 0..camera_list.num_cameras()? {
            let camera = camera_list.camera(i)?;
            let node_map = camera.device_node_map()?;
            result.push(DeviceInfo::new(
                DeviceId(i as u64),
                &read_device_string(&node_map, genicam::DEVICE_VENDOR_NAME)?,
                &read_device_string(&node_map, genicam::DEVICE_MODEL_NAME)?,
                &read_device_string(&node_map, genicam::DEVICE_SERIAL_NUMBER)?
            ));
        }

        self.cameras = Some(camera_list);

        Ok(result)
    }

    fn open_device(&mut self, id: DeviceId) -> Result<Box<dyn Device>, CameraError> {
        let index = id.0 as usize;
        let cameras = match &self.cameras {
            Some(cameras) if index < cameras.num_cameras()? => cameras,
            _ => return Err(SpinnakerError::Error(format!("invalid camera id: {}", index)).into())
        };

        let mut camera = cameras.camera(index)?;
        let info = {
            let node_map = camera.device_node_map()?;
            DeviceInfo::new(
                id,
                &read_device_string(&node_map, genicam::DEVICE_VENDOR_NAME)?,
                &read_device_string(&node_map, genicam::DEVICE_MODEL_NAME)?,
                &read_device_string(&node_map, genicam::DEVICE_SERIAL_NUMBER)?
            )
        };
        camera.init()?;
        let node_map = camera.genicam_node_map()?;

        Ok(Box::new(SpinnakerDevice{ info, camera, node_map, streaming: false }))
    }
}

struct SpinnakerDevice {
    info: DeviceInfo,
    camera: spin::Camera,
    node_map: spin::NodeMap,
    streaming: bool
}

impl SpinnakerDevice {
    fn node(&self, name: &str, expected: _spinNodeType, direction: Direction) -> Result<spin::Node, FeatureError> {
        let to_feature_error = |e| feature_error(name, e, direction);

        let node = self.node_map.node(name).map_err(to_feature_error)?
            .ok_or_else(|| FeatureError::NotFound(name.to_string()))?;

        if node.node_type().map_err(to_feature_error)? != expected {
            return Err(FeatureError::WrongType(name.to_string()));
        }

        let accessible = match direction {
            Direction::Read => node.readable(),
            Direction::Write => node.writable()
        }.map_err(to_feature_error)?;

        match (accessible, direction) {
            (true, _) => Ok(node),
            (false, Direction::Read) => Err(FeatureError::NotReadable(name.to_string())),
            (false, Direction::Write) => Err(FeatureError::NotWritable(name.to_string()))
        }
    }

    fn read<T, F>(&self, name: &str, expected: _spinNodeType, getter: F) -> Result<T, FeatureError>
    where F: FnOnce(&spin::Node) -> Result<T, SpinnakerError> {
        let node = self.node(name, expected, Direction::Read)?;
        getter(&node).map_err(|e| feature_error(name, e, Direction::Read))
    }

    fn write<F>(&self, name: &str, expected: _spinNodeType, setter: F) -> Result<(), FeatureError>
    where F: FnOnce(&spin::Node) -> Result<(), SpinnakerError> {
        let node = self.node(name, expected, Direction::Write)?;
        setter(&node).map_err(|e| feature_error(name, e, Direction::Write))
    }
}

impl NodeMap for SpinnakerDevice {
    fn enum_entries(&self, name: &str) -> Result<Vec<String>, FeatureError> {
        self.read(name, _spinNodeType_EnumerationNode, |node| node.enum_entries())
    }

    fn enum_value(&self, name: &str) -> Result<String, FeatureError> {
        self.read(name, _spinNodeType_EnumerationNode, |node| node.current_enum_symbolic())
    }

    fn set_enum_value(&mut self, name: &str, value: &str) -> Result<(), FeatureError> {
        self.write(name, _spinNodeType_EnumerationNode, |node| node.set_enum_symbolic(value))
    }

    fn int_value(&self, name: &str) -> Result<i64, FeatureError> {
        self.read(name, _spinNodeType_IntegerNode, |node| node.int_value())
    }

    fn int_range(&self, name: &str) -> Result<IntRange, FeatureError> {
        self.read(name, _spinNodeType_IntegerNode, |node| Ok(IntRange{
            min: node.min_int()?,
            max: node.max_int()?,
            step: node.int_increment()?
        }))
    }

    fn set_int_value(&mut self, name: &str, value: i64) -> Result<(), FeatureError> {
        self.write(name, _spinNodeType_IntegerNode, |node| node.set_int_value(value))
    }

    fn float_value(&self, name: &str) -> Result<f64, FeatureError> {
        self.read(name, _spinNodeType_FloatNode, |node| node.float_value())
    }

    fn float_range(&self, name: &str) -> Result<FloatRange, FeatureError> {
        self.read(name, _spinNodeType_FloatNode, |node| Ok(FloatRange{ min: node.min_float()?, max: node.max_float()? }))
    }

    fn set_float_value(&mut self, name: &str, value: f64) -> Result<(), FeatureError> {
        self.write(name, _spinNodeType_FloatNode, |node| node.set_float_value(value))
    }

    fn bool_value(&self, name: &str) -> Result<bool, FeatureError> {
        self.read(name, _spinNodeType_BooleanNode, |node| node.bool_value())
    }

    fn set_bool_value(&mut self, name: &str, value: bool) -> Result<(), FeatureError> {
        self.write(name, _spinNodeType_BooleanNode, |node| node.set_bool_value(value))
    }

    fn string_value(&self, name: &str) -> Result<String, FeatureError> {
        self.read(name, _spinNodeType_StringNode, |node| node.string_value())
    }

    fn execute(&mut self, name: &str) -> Result<(), FeatureError> {
        self.write(name, _spinNodeType_CommandNode, |node| node.execute())
    }
}

struct SpinnakerBuffer {
    _image: spin::Image,
    data: *const u8,
    len: usize,
    timestamp_ns: u64
}

impl RawBuffer for SpinnakerBuffer {
    fn data(&self) -> &[u8] {
        // `_image` keeps the buffer alive until `self` is dropped.
        unsafe { std::slice::from_raw_parts(self.data, self.len) }
    }

    fn timestamp_ns(&self) -> u64 { self.timestamp_ns }
}

impl Device for SpinnakerDevice {
    fn info(&self) -> &DeviceInfo { &self.info }

    fn open_stream(&mut self) -> Result<(), CameraError> {
        Ok(())
    }

    fn start_streaming(&mut self) -> Result<(), CameraError> {
        self.camera.begin_acquisition()?;
        self.streaming = true;
        Ok(())
    }

    fn stop_streaming(&mut self) -> Result<(), CameraError> {
        if self.streaming {
            self.streaming = false;
            self.camera.end_acquisition()?;
        }
        Ok(())
    }

    fn close_stream(&mut self) -> Result<(), CameraError> {
        self.stop_streaming()
    }

    fn grab(&mut self, timeout: Duration) -> Result<Option<Box<dyn RawBuffer + '_>>, CameraError> {
        let image = match self.camera.next_image(timeout.as_millis() as u64)? {
            Some(image) => image,
            None => return Ok(None)
        };

        if image.is_incomplete()? {
            log::warn!("captured incomplete image, ignoring");
            return Ok(None);
        }

        let data = image.data_ptr()? as *const u8;
        let len = image.data_size()? as usize;
        let timestamp_ns = image.timestamp()?;

        Ok(Some(Box::new(SpinnakerBuffer{ _image: image, data, len, timestamp_ns })))
    }

    fn close(&mut self) -> Result<(), CameraError> {
        self.stop_streaming()?;
        self.camera.deinit()?;
        Ok(())
    }
}
