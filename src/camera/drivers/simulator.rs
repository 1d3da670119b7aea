//
// GenCam - GenICam camera configuration and frame acquisition
// Copyright (c) 2020-2024 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Camera simulator.
//!
//! Emulates a GenICam device with an SFNC feature set. Features can be added, removed or made to fail, and the
//! device records what was done to it, which makes it the test double for the configuration and acquisition code.
//!

use crate::camera::*;
use crate::camera::features::{deviations, genicam};
use crate::camera::pixel_format::PixelFormat;
use enum_dispatch::enum_dispatch;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

#[derive(Debug)]
pub enum SimulatorError {
    Internal,
    InvalidDeviceId(u64),
    StreamNotOpen,
    /// The device is restarting after `DeviceReset` and must be reopened.
    ResetInProgress
}

impl From<SimulatorError> for CameraError {
    fn from(sim_error: SimulatorError) -> CameraError {
        CameraError::SimulatorError(sim_error)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    ReadOnly,
    WriteOnly
}

#[derive(Clone, Debug)]
pub struct NodeProperties {
    access: Access,
    /// Writes are accepted, but the value does not change.
    ignore_writes: bool
}

impl Default for NodeProperties {
    fn default() -> NodeProperties {
        NodeProperties{ access: Access::ReadWrite, ignore_writes: false }
    }
}

#[derive(Clone, Debug)]
pub struct EnumNode { props: NodeProperties, value: String, entries: Vec<String> }

#[derive(Clone, Debug)]
pub struct IntNode { props: NodeProperties, value: i64, min: i64, max: i64, step: i64 }

#[derive(Clone, Debug)]
pub struct FloatNode { props: NodeProperties, value: f64, min: f64, max: f64 }

#[derive(Clone, Debug)]
pub struct BoolNode { props: NodeProperties, value: bool }

#[derive(Clone, Debug)]
pub struct StringNode { props: NodeProperties, value: String }

#[derive(Clone, Debug)]
pub struct CommandNode { props: NodeProperties }

#[enum_dispatch]
#[derive(Clone, Debug)]
pub enum SimNode {
    Enumeration(EnumNode),
    Integer(IntNode),
    Float(FloatNode),
    Boolean(BoolNode),
    Text(StringNode),
    Command(CommandNode)
}

#[enum_dispatch(SimNode)]
pub trait SimNodeProperties {
    fn props(&self) -> &NodeProperties;

    fn props_mut(&mut self) -> &mut NodeProperties;
}

macro_rules! impl_props {
    ($($node:ty),*) => {
        $(
            impl SimNodeProperties for $node {
                fn props(&self) -> &NodeProperties { &self.props }
                fn props_mut(&mut self) -> &mut NodeProperties { &mut self.props }
            }
        )*
    }
}

impl_props!(EnumNode, IntNode, FloatNode, BoolNode, StringNode, CommandNode);

impl SimNode {
    pub fn enumeration(value: &str, entries: &[&str]) -> SimNode {
        SimNode::Enumeration(EnumNode{
            props: Default::default(),
            value: value.to_string(),
            entries: entries.iter().map(|s| s.to_string()).collect()
        })
    }

    pub fn int(value: i64, min: i64, max: i64, step: i64) -> SimNode {
        SimNode::Integer(IntNode{ props: Default::default(), value, min, max, step })
    }

    pub fn float(value: f64, min: f64, max: f64) -> SimNode {
        SimNode::Float(FloatNode{ props: Default::default(), value, min, max })
    }

    pub fn boolean(value: bool) -> SimNode {
        SimNode::Boolean(BoolNode{ props: Default::default(), value })
    }

    pub fn string(value: &str) -> SimNode {
        SimNode::Text(StringNode{ props: Default::default(), value: value.to_string() })
    }

    pub fn command() -> SimNode {
        SimNode::Command(CommandNode{ props: NodeProperties{ access: Access::WriteOnly, ignore_writes: false } })
    }

    pub fn read_only(mut self) -> SimNode {
        self.props_mut().access = Access::ReadOnly;
        self
    }

    pub fn write_only(mut self) -> SimNode {
        self.props_mut().access = Access::WriteOnly;
        self
    }

    pub fn ignoring_writes(mut self) -> SimNode {
        self.props_mut().ignore_writes = true;
        self
    }
}

fn standard_features(serial_number: &str) -> HashMap<String, SimNode> {
    const MAX_WIDTH: i64 = 2048;
    const MAX_HEIGHT: i64 = 1536;

    let features = vec![
        (genicam::DEVICE_VENDOR_NAME, SimNode::string("GenCam").read_only()),
        (genicam::DEVICE_MODEL_NAME, SimNode::string("Simulator").read_only()),
        (genicam::DEVICE_SERIAL_NUMBER, SimNode::string(serial_number).read_only()),
        (genicam::DEVICE_RESET, SimNode::command()),
        (genicam::WIDTH_MAX, SimNode::int(MAX_WIDTH, MAX_WIDTH, MAX_WIDTH, 1).read_only()),
        (genicam::HEIGHT_MAX, SimNode::int(MAX_HEIGHT, MAX_HEIGHT, MAX_HEIGHT, 1).read_only()),
        (genicam::WIDTH, SimNode::int(MAX_WIDTH, 16, MAX_WIDTH, 4)),
        (genicam::HEIGHT, SimNode::int(MAX_HEIGHT, 16, MAX_HEIGHT, 2)),
        (genicam::OFFSET_X, SimNode::int(0, 0, MAX_WIDTH - 16, 4)),
        (genicam::OFFSET_Y, SimNode::int(0, 0, MAX_HEIGHT - 16, 2)),
        (genicam::PIXEL_FORMAT, SimNode::enumeration("Mono8", &["Mono8", "BayerRG8", "RGB8Packed", "YCbCr422_8"])),
        (genicam::PIXEL_SIZE, SimNode::enumeration("Bpp8", &["Bpp8", "Bpp16", "Bpp24"]).read_only()),
        (genicam::BINNING_SELECTOR, SimNode::enumeration("Sensor", &["Sensor", "Region0"])),
        (genicam::BINNING_HORIZONTAL_MODE, SimNode::enumeration("Sum", &["Sum", "Average"])),
        (genicam::BINNING_VERTICAL_MODE, SimNode::enumeration("Sum", &["Sum", "Average"])),
        (genicam::BINNING_HORIZONTAL, SimNode::int(1, 1, 4, 1)),
        (genicam::BINNING_VERTICAL, SimNode::int(1, 1, 4, 1)),
        (genicam::DECIMATION_HORIZONTAL, SimNode::int(1, 1, 2, 1)),
        (genicam::DECIMATION_VERTICAL, SimNode::int(1, 1, 2, 1)),
        (genicam::ACQUISITION_MODE, SimNode::enumeration("Continuous", &["Continuous", "SingleFrame", "MultiFrame"])),
        (genicam::ACQUISITION_FRAME_RATE, SimNode::float(30.0, 1.0, 120.0)),
        (deviations::ACQUISITION_FRAME_RATE_ENABLE, SimNode::boolean(false)),
        (genicam::ACQUISITION_STATUS_SELECTOR, SimNode::enumeration(
            "AcquisitionActive", &["AcquisitionActive", "FrameTriggerWait"]
        )),
        (genicam::ACQUISITION_STATUS, SimNode::boolean(false).read_only()),
        (genicam::TRIGGER_SELECTOR, SimNode::enumeration("FrameStart", &["FrameStart", "AcquisitionStart"])),
        (genicam::TRIGGER_MODE, SimNode::enumeration("Off", &["Off", "On"])),
        (genicam::TRIGGER_SOURCE, SimNode::enumeration("Software", &["Software", "Line1", "Line2"])),
        (genicam::TRIGGER_ACTIVATION, SimNode::enumeration("RisingEdge", &["RisingEdge", "FallingEdge", "AnyEdge"])),
        (genicam::TRIGGER_OVERLAP, SimNode::enumeration("Off", &["Off", "ReadOut", "PreviousFrame"])),
        (genicam::TRIGGER_DELAY, SimNode::float(0.0, 0.0, 1.0e6)),
        (genicam::TRIGGER_MULTIPLIER, SimNode::int(1, 1, 16, 1)),
        (genicam::TRIGGER_DIVIDER, SimNode::int(1, 1, 16, 1)),
        (genicam::TRIGGER_SOFTWARE, SimNode::command()),
        (genicam::EXPOSURE_MODE, SimNode::enumeration("Timed", &["Off", "Timed", "TriggerWidth"])),
        (genicam::EXPOSURE_AUTO, SimNode::enumeration("Continuous", &["Off", "Once", "Continuous"])),
        (genicam::EXPOSURE_TIME_SELECTOR, SimNode::enumeration("Common", &["Common", "Stage1"])),
        (genicam::EXPOSURE_TIME_MODE, SimNode::enumeration("Common", &["Common", "Individual"])),
        (genicam::EXPOSURE_TIME, SimNode::float(10_000.0, 20.0, 1.0e6)),
        (deviations::AUTO_EXPOSURE_TIME_LOWER_LIMIT, SimNode::float(100.0, 20.0, 1.0e6)),
        (deviations::AUTO_EXPOSURE_TIME_UPPER_LIMIT, SimNode::float(100_000.0, 20.0, 1.0e6)),
        (genicam::BLACK_LEVEL_SELECTOR, SimNode::enumeration("All", &["All", "Red", "Green", "Blue"])),
        (genicam::BLACK_LEVEL_AUTO, SimNode::enumeration("Off", &["Off", "Continuous"])),
        (genicam::BLACK_LEVEL, SimNode::float(0.0, 0.0, 100.0)),
        (genicam::GAMMA_SELECTOR, SimNode::enumeration("sRGB", &["sRGB", "User"])),
        (deviations::GAMMA_ENABLE, SimNode::boolean(false)),
        (genicam::GAMMA, SimNode::float(1.0, 0.25, 4.0)),
        (genicam::GAIN_SELECTOR, SimNode::enumeration("All", &["All", "AnalogAll", "DigitalAll"])),
        (genicam::GAIN_AUTO, SimNode::enumeration("Off", &["Off", "Once", "Continuous"])),
        (genicam::GAIN_AUTO_BALANCE, SimNode::enumeration("Off", &["Off", "Once", "Continuous"])),
        (genicam::GAIN, SimNode::float(0.0, 0.0, 24.0)),
        (genicam::BALANCE_WHITE_AUTO, SimNode::enumeration("Continuous", &["Off", "Once", "Continuous"])),
        (genicam::BALANCE_RATIO_SELECTOR, SimNode::enumeration("Red", &["Red", "Green", "Blue"])),
        (genicam::BALANCE_RATIO, SimNode::float(1.0, 0.5, 4.0)),
        (genicam::DEVICE_CLOCK_SELECTOR, SimNode::enumeration("Sensor", &["Sensor", "CameraLink"])),
        (genicam::DEVICE_CLOCK_FREQUENCY, SimNode::float(74.25e6, 74.25e6, 74.25e6).read_only()),
        (genicam::DEVICE_LINK_THROUGHPUT_LIMIT_MODE, SimNode::enumeration("Off", &["Off", "On"])),
        (genicam::DEVICE_LINK_THROUGHPUT_LIMIT, SimNode::int(380_000_000, 1_000_000, 400_000_000, 8)),
        (genicam::GEV_SCPS_PACKET_SIZE, SimNode::int(1500, 576, 9000, 4)),
        (genicam::GEV_SCPD, SimNode::int(0, 0, 10_000, 1)),
    ];

    features.into_iter().map(|(name, node)| (name.to_string(), node)).collect()
}

struct SimState {
    nodes: HashMap<String, SimNode>,
    reads: HashMap<String, usize>,
    writes: Vec<(String, String)>,
    commands: HashMap<String, usize>,
    transport_failures: HashSet<String>,
    grab_failure: bool,
    stream_open: bool,
    streaming: bool,
    closed: bool,
    stream_starts: usize,
    stream_stops: usize,
    /// Trigger signals received but not turned into frames yet.
    pending_triggers: usize,
    grab_attempts: usize,
    frame_counter: u64,
    /// Number of `AcquisitionStatus` reads which report "busy" before reporting readiness.
    status_busy_polls: usize,
    reset_requested: bool
}

impl SimState {
    fn enum_of(&self, name: &str) -> Option<&str> {
        match self.nodes.get(name) {
            Some(SimNode::Enumeration(node)) => Some(&node.value),
            _ => None
        }
    }

    fn int_of(&self, name: &str) -> Option<i64> {
        match self.nodes.get(name) {
            Some(SimNode::Integer(node)) => Some(node.value),
            _ => None
        }
    }

    fn trigger_on(&self) -> bool {
        self.enum_of(genicam::TRIGGER_MODE) == Some("On")
    }

    fn software_source(&self) -> bool {
        self.enum_of(genicam::TRIGGER_SOURCE).map_or(true, |s| s == "Software")
    }

    /// Common checks of every node access; returns the node.
    fn node(&mut self, name: &str, is_read: bool) -> Result<&mut SimNode, FeatureError> {
        if is_read {
            *self.reads.entry(name.to_string()).or_insert(0) += 1;
        }
        if self.transport_failures.contains(name) {
            return Err(FeatureError::Transport(name.to_string(), "simulated link failure".to_string()));
        }
        self.nodes.get_mut(name).ok_or_else(|| FeatureError::NotFound(name.to_string()))
    }

    /// Returns the node for a typed read; the type is checked before readability.
    fn readable_node(&mut self, name: &str, is_type: fn(&SimNode) -> bool) -> Result<&mut SimNode, FeatureError> {
        let node = self.node(name, true)?;
        if !is_type(node) {
            return Err(wrong_type(name));
        }
        if node.props().access == Access::WriteOnly {
            return Err(FeatureError::NotReadable(name.to_string()));
        }
        Ok(node)
    }

    /// Returns the node if writable and records the write, unless the node ignores writes (then `None`).
    fn writable_node(&mut self, name: &str, value: String) -> Result<Option<&mut SimNode>, FeatureError> {
        let node = self.node(name, false)?;
        if node.props().access == Access::ReadOnly {
            return Err(FeatureError::NotWritable(name.to_string()));
        }
        let ignore = node.props().ignore_writes;
        self.writes.push((name.to_string(), value));

        if ignore {
            Ok(None)
        } else {
            Ok(self.nodes.get_mut(name))
        }
    }

    fn frame(&mut self) -> SimBuffer {
        let width = self.int_of(genicam::WIDTH).unwrap_or(0).max(0) as usize;
        let height = self.int_of(genicam::HEIGHT).unwrap_or(0).max(0) as usize;
        let pixel_format = self.enum_of(genicam::PIXEL_FORMAT)
            .and_then(PixelFormat::from_device_name)
            .unwrap_or(PixelFormat::Mono8);

        self.frame_counter += 1;

        SimBuffer{
            data: vec![(self.frame_counter % 256) as u8; pixel_format.frame_size(width, height)],
            timestamp_ns: self.frame_counter * 33_333_333
        }
    }
}

struct SimBuffer {
    data: Vec<u8>,
    timestamp_ns: u64
}

impl RawBuffer for SimBuffer {
    fn data(&self) -> &[u8] { &self.data }

    fn timestamp_ns(&self) -> u64 { self.timestamp_ns }
}

/// Simulated device. Clones share the same device state.
#[derive(Clone)]
pub struct SimHandle {
    info: DeviceInfo,
    state: Rc<RefCell<SimState>>
}

fn wrong_type(name: &str) -> FeatureError { FeatureError::WrongType(name.to_string()) }

impl SimHandle {
    pub fn new(serial_number: &str) -> SimHandle {
        SimHandle{
            info: DeviceInfo::new(DeviceId(0), "GenCam", "Simulator", serial_number),
            state: Rc::new(RefCell::new(SimState{
                nodes: standard_features(serial_number),
                reads: HashMap::new(),
                writes: vec![],
                commands: HashMap::new(),
                transport_failures: HashSet::new(),
                grab_failure: false,
                stream_open: false,
                streaming: false,
                closed: true,
                stream_starts: 0,
                stream_stops: 0,
                pending_triggers: 0,
                grab_attempts: 0,
                frame_counter: 0,
                status_busy_polls: 0,
                reset_requested: false
            }))
        }
    }
}

/// Fault injection and inspection of the simulated device state; only for tests.
#[cfg(test)]
impl SimHandle {
    pub fn insert(&self, name: &str, node: SimNode) {
        self.state.borrow_mut().nodes.insert(name.to_string(), node);
    }

    pub fn remove(&self, name: &str) {
        self.state.borrow_mut().nodes.remove(name);
    }

    pub fn make_read_only(&self, name: &str) {
        if let Some(node) = self.state.borrow_mut().nodes.get_mut(name) {
            node.props_mut().access = Access::ReadOnly;
        }
    }

    /// Every access to `name` fails as if the link to the device was lost.
    pub fn fail_transport(&self, name: &str) {
        self.state.borrow_mut().transport_failures.insert(name.to_string());
    }

    pub fn fail_grabs(&self) {
        self.state.borrow_mut().grab_failure = true;
    }

    pub fn set_status_busy_polls(&self, count: usize) {
        self.state.borrow_mut().status_busy_polls = count;
    }

    /// Simulates an external trigger pulse.
    pub fn fire_line_trigger(&self) {
        let mut state = self.state.borrow_mut();
        if state.streaming && state.trigger_on() && !state.software_source() {
            state.pending_triggers += 1;
        }
    }

    pub fn set_enum_of(&self, name: &str, value: &str) {
        if let Some(SimNode::Enumeration(node)) = self.state.borrow_mut().nodes.get_mut(name) {
            node.value = value.to_string();
        }
    }

    pub fn enum_of(&self, name: &str) -> String {
        self.state.borrow().enum_of(name).unwrap_or_default().to_string()
    }

    pub fn int_of(&self, name: &str) -> i64 {
        self.state.borrow().int_of(name).unwrap_or_default()
    }

    pub fn float_of(&self, name: &str) -> f64 {
        match self.state.borrow().nodes.get(name) {
            Some(SimNode::Float(node)) => node.value,
            _ => 0.0
        }
    }

    pub fn bool_of(&self, name: &str) -> bool {
        match self.state.borrow().nodes.get(name) {
            Some(SimNode::Boolean(node)) => node.value,
            _ => false
        }
    }

    pub fn read_count(&self, name: &str) -> usize {
        self.state.borrow().reads.get(name).copied().unwrap_or(0)
    }

    pub fn write_count(&self, name: &str) -> usize {
        self.state.borrow().writes.iter().filter(|(n, _)| n == name).count()
    }

    /// Values written to `name`, in order.
    pub fn writes_to(&self, name: &str) -> Vec<String> {
        self.state.borrow().writes.iter().filter(|(n, _)| n == name).map(|(_, v)| v.clone()).collect()
    }

    /// Names of all written features, in order of writing.
    pub fn write_order(&self) -> Vec<String> {
        self.state.borrow().writes.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn command_count(&self, name: &str) -> usize {
        self.state.borrow().commands.get(name).copied().unwrap_or(0)
    }

    pub fn grab_attempts(&self) -> usize { self.state.borrow().grab_attempts }

    pub fn stream_starts(&self) -> usize { self.state.borrow().stream_starts }

    pub fn stream_stops(&self) -> usize { self.state.borrow().stream_stops }

    pub fn is_streaming(&self) -> bool { self.state.borrow().streaming }

    pub fn is_stream_open(&self) -> bool { self.state.borrow().stream_open }

    pub fn is_closed(&self) -> bool { self.state.borrow().closed }

    pub fn reset_requested(&self) -> bool { self.state.borrow().reset_requested }
}

impl NodeMap for SimHandle {
    fn enum_entries(&self, name: &str) -> Result<Vec<String>, FeatureError> {
        match self.state.borrow_mut().readable_node(name, |n| matches!(n, SimNode::Enumeration(_)))? {
            SimNode::Enumeration(node) => Ok(node.entries.clone()),
            _ => Err(wrong_type(name))
        }
    }

    fn enum_value(&self, name: &str) -> Result<String, FeatureError> {
        match self.state.borrow_mut().readable_node(name, |n| matches!(n, SimNode::Enumeration(_)))? {
            SimNode::Enumeration(node) => Ok(node.value.clone()),
            _ => Err(wrong_type(name))
        }
    }

    fn set_enum_value(&mut self, name: &str, value: &str) -> Result<(), FeatureError> {
        let mut state = self.state.borrow_mut();
        match state.node(name, false)? {
            SimNode::Enumeration(node) => if !node.entries.iter().any(|e| e == value) {
                return Err(FeatureError::InvalidValue(name.to_string(), value.to_string()));
            },
            _ => return Err(wrong_type(name))
        }
        if let Some(SimNode::Enumeration(node)) = state.writable_node(name, value.to_string())? {
            node.value = value.to_string();
        }
        Ok(())
    }

    fn int_value(&self, name: &str) -> Result<i64, FeatureError> {
        match self.state.borrow_mut().readable_node(name, |n| matches!(n, SimNode::Integer(_)))? {
            SimNode::Integer(node) => Ok(node.value),
            _ => Err(wrong_type(name))
        }
    }

    fn int_range(&self, name: &str) -> Result<IntRange, FeatureError> {
        match self.state.borrow_mut().node(name, true)? {
            SimNode::Integer(node) => Ok(IntRange{ min: node.min, max: node.max, step: node.step }),
            _ => Err(wrong_type(name))
        }
    }

    fn set_int_value(&mut self, name: &str, value: i64) -> Result<(), FeatureError> {
        let mut state = self.state.borrow_mut();
        match state.node(name, false)? {
            SimNode::Integer(node) => {
                let step = node.step.max(1);
                if value < node.min || value > node.max || (value - node.min) % step != 0 {
                    return Err(FeatureError::InvalidValue(name.to_string(), value.to_string()));
                }
            },
            _ => return Err(wrong_type(name))
        }
        if let Some(SimNode::Integer(node)) = state.writable_node(name, value.to_string())? {
            node.value = value;
        }
        Ok(())
    }

    fn float_value(&self, name: &str) -> Result<f64, FeatureError> {
        match self.state.borrow_mut().readable_node(name, |n| matches!(n, SimNode::Float(_)))? {
            SimNode::Float(node) => Ok(node.value),
            _ => Err(wrong_type(name))
        }
    }

    fn float_range(&self, name: &str) -> Result<FloatRange, FeatureError> {
        match self.state.borrow_mut().node(name, true)? {
            SimNode::Float(node) => Ok(FloatRange{ min: node.min, max: node.max }),
            _ => Err(wrong_type(name))
        }
    }

    fn set_float_value(&mut self, name: &str, value: f64) -> Result<(), FeatureError> {
        let mut state = self.state.borrow_mut();
        match state.node(name, false)? {
            SimNode::Float(node) => if !(value >= node.min && value <= node.max) {
                return Err(FeatureError::InvalidValue(name.to_string(), value.to_string()));
            },
            _ => return Err(wrong_type(name))
        }
        if let Some(SimNode::Float(node)) = state.writable_node(name, value.to_string())? {
            node.value = value;
        }
        Ok(())
    }

    fn bool_value(&self, name: &str) -> Result<bool, FeatureError> {
        let mut state = self.state.borrow_mut();
        let value = match state.readable_node(name, |n| matches!(n, SimNode::Boolean(_)))? {
            SimNode::Boolean(node) => node.value,
            _ => return Err(wrong_type(name))
        };

        if name == genicam::ACQUISITION_STATUS {
            if state.status_busy_polls > 0 {
                state.status_busy_polls -= 1;
                return Ok(false);
            }
            return Ok(state.streaming);
        }

        Ok(value)
    }

    fn set_bool_value(&mut self, name: &str, value: bool) -> Result<(), FeatureError> {
        let mut state = self.state.borrow_mut();
        if !matches!(state.node(name, false)?, SimNode::Boolean(_)) {
            return Err(wrong_type(name));
        }
        if let Some(SimNode::Boolean(node)) = state.writable_node(name, value.to_string())? {
            node.value = value;
        }
        Ok(())
    }

    fn string_value(&self, name: &str) -> Result<String, FeatureError> {
        match self.state.borrow_mut().readable_node(name, |n| matches!(n, SimNode::Text(_)))? {
            SimNode::Text(node) => Ok(node.value.clone()),
            _ => Err(wrong_type(name))
        }
    }

    fn execute(&mut self, name: &str) -> Result<(), FeatureError> {
        let mut state = self.state.borrow_mut();
        if !matches!(state.node(name, false)?, SimNode::Command(_)) {
            return Err(wrong_type(name));
        }
        *state.commands.entry(name.to_string()).or_insert(0) += 1;

        if name == genicam::TRIGGER_SOFTWARE {
            if state.streaming && state.trigger_on() && state.software_source() {
                state.pending_triggers += 1;
            }
        } else if name == genicam::DEVICE_RESET {
            state.reset_requested = true;
            state.streaming = false;
        }

        Ok(())
    }
}

impl Device for SimHandle {
    fn info(&self) -> &DeviceInfo { &self.info }

    fn open_stream(&mut self) -> Result<(), CameraError> {
        let mut state = self.state.borrow_mut();
        if state.reset_requested {
            return Err(SimulatorError::ResetInProgress.into());
        }
        state.stream_open = true;
        Ok(())
    }

    fn start_streaming(&mut self) -> Result<(), CameraError> {
        let mut state = self.state.borrow_mut();
        if !state.stream_open {
            return Err(SimulatorError::StreamNotOpen.into());
        }
        state.streaming = true;
        state.stream_starts += 1;
        Ok(())
    }

    fn stop_streaming(&mut self) -> Result<(), CameraError> {
        let mut state = self.state.borrow_mut();
        if state.streaming {
            state.stream_stops += 1;
        }
        state.streaming = false;
        state.pending_triggers = 0;
        Ok(())
    }

    fn close_stream(&mut self) -> Result<(), CameraError> {
        let mut state = self.state.borrow_mut();
        state.streaming = false;
        state.stream_open = false;
        Ok(())
    }

    fn grab(&mut self, _timeout: std::time::Duration) -> Result<Option<Box<dyn RawBuffer + '_>>, CameraError> {
        let mut state = self.state.borrow_mut();
        state.grab_attempts += 1;

        if state.grab_failure {
            return Err(SimulatorError::Internal.into());
        }
        if !state.streaming {
            return Ok(None);
        }

        if state.trigger_on() {
            if state.pending_triggers == 0 {
                return Ok(None);
            }
            state.pending_triggers -= 1;
        }

        Ok(Some(Box::new(state.frame())))
    }

    fn close(&mut self) -> Result<(), CameraError> {
        let mut state = self.state.borrow_mut();
        if state.closed {
            return Ok(());
        }
        state.streaming = false;
        state.stream_open = false;
        state.closed = true;
        Ok(())
    }
}

pub struct SimDriver {
    devices: Vec<SimHandle>
}

impl SimDriver {
    pub fn new() -> Option<SimDriver> {
        Some(SimDriver{ devices: vec![SimHandle::new("SIM0001")] })
    }

    pub fn with_devices(devices: Vec<SimHandle>) -> SimDriver {
        SimDriver{ devices }
    }
}

impl Driver for SimDriver {
    fn name(&self) -> &'static str { "Sim" }

    fn enumerate_devices(&mut self) -> Result<Vec<DeviceInfo>, CameraError> {
        Ok(self.devices.iter().enumerate().map(|(i, device)| DeviceInfo::new(
            DeviceId(i as u64), device.info.vendor(), device.info.model(), device.info.serial_number()
        )).collect())
    }

    fn open_device(&mut self, id: DeviceId) -> Result<Box<dyn Device>, CameraError> {
        let device = self.devices.get(id.0 as usize).ok_or(SimulatorError::InvalidDeviceId(id.0))?;
        let mut device = device.clone();
        device.info = DeviceInfo::new(id, device.info.vendor(), device.info.model(), device.info.serial_number());
        {
            let mut state = device.state.borrow_mut();
            state.closed = false;
            state.reset_requested = false;
        }

        Ok(Box::new(device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn given_continuous_streaming_every_grab_returns_frame() {
        let mut device = SimHandle::new("S0001");
        device.open_stream().unwrap();
        device.start_streaming().unwrap();

        let frame = device.grab(Duration::from_secs(1)).unwrap().unwrap();
        assert_eq!(2048 * 1536, frame.data().len());
    }

    #[test]
    fn given_software_trigger_mode_frame_requires_trigger() {
        let mut device = SimHandle::new("S0002");
        device.set_enum_of(genicam::TRIGGER_MODE, "On");
        device.open_stream().unwrap();
        device.start_streaming().unwrap();

        assert!(device.grab(Duration::from_secs(1)).unwrap().is_none());
        device.execute(genicam::TRIGGER_SOFTWARE).unwrap();
        assert!(device.grab(Duration::from_secs(1)).unwrap().is_some());
        assert!(device.grab(Duration::from_secs(1)).unwrap().is_none());
    }

    #[test]
    fn given_line_source_only_pulse_produces_frame() {
        let mut device = SimHandle::new("S0003");
        device.set_enum_of(genicam::TRIGGER_MODE, "On");
        device.set_enum_of(genicam::TRIGGER_SOURCE, "Line1");
        device.open_stream().unwrap();
        device.start_streaming().unwrap();

        device.execute(genicam::TRIGGER_SOFTWARE).unwrap();
        assert!(device.grab(Duration::from_secs(1)).unwrap().is_none());
        device.fire_line_trigger();
        assert!(device.grab(Duration::from_secs(1)).unwrap().is_some());
    }

    #[test]
    fn given_unopened_stream_start_fails() {
        let mut device = SimHandle::new("S0004");
        assert!(device.start_streaming().is_err());
    }

    #[test]
    fn given_invalid_int_value_write_is_rejected() {
        let mut device = SimHandle::new("S0005");
        assert_eq!(
            Err(FeatureError::InvalidValue(genicam::WIDTH.to_string(), "1001".to_string())),
            device.set_int_value(genicam::WIDTH, 1001)
        );
    }

    #[test]
    fn given_reset_device_stream_cannot_be_opened() {
        let mut device = SimHandle::new("S0009");
        device.execute(genicam::DEVICE_RESET).unwrap();

        assert!(device.reset_requested());
        assert!(matches!(
            device.open_stream(),
            Err(CameraError::SimulatorError(SimulatorError::ResetInProgress))
        ));
    }

    #[test]
    fn given_write_only_node_read_of_other_type_reports_wrong_type() {
        let device = SimHandle::new("S0008");
        device.insert("WriteOnlyFloat", SimNode::float(1.0, 0.0, 10.0).write_only());

        assert_eq!(Err(FeatureError::WrongType("WriteOnlyFloat".to_string())), device.enum_value("WriteOnlyFloat"));
        assert_eq!(Err(FeatureError::WrongType("WriteOnlyFloat".to_string())), device.int_value("WriteOnlyFloat"));
        assert_eq!(Err(FeatureError::NotReadable("WriteOnlyFloat".to_string())), device.float_value("WriteOnlyFloat"));
    }

    #[test]
    fn given_two_devices_driver_opens_requested_one() {
        let mut driver = SimDriver::with_devices(vec![SimHandle::new("S0006"), SimHandle::new("S0007")]);
        let infos = driver.enumerate_devices().unwrap();
        assert_eq!(2, infos.len());

        let device = driver.open_device(infos[1].id()).unwrap();
        assert_eq!("S0007", device.info().serial_number());
        assert!(driver.open_device(DeviceId(5)).is_err());
    }
}
