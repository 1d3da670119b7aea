//
// GenCam - GenICam camera configuration and frame acquisition
// Copyright (c) 2020-2024 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Typed feature accessors.
//!
//! Setters are best effort: a feature which is missing, of unexpected type, out of range or rejected by the device
//! is logged and reported as `Ok(false)`. Only transport failures are returned as `Err`.
//!

use crate::camera::{CameraError, FeatureError, FloatRange, IntRange, NodeMap};
use crate::camera::features::{FeatureDirectory, FeatureType};

/// Which bound (if any) a requested value had to be clamped to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Clamp {
    None,
    Min,
    Max
}

/// Aligns `value` down to the nearest `min + k * step` and clamps it into range.
///
/// The maximum is itself aligned, i.e. values above range land on `max - (max - min) % step`.
pub fn align_and_clamp_int(value: i64, range: IntRange) -> (i64, Clamp) {
    let min = range.min as i128;
    let max = range.max as i128;
    let step = if range.step <= 0 { 1 } else { range.step as i128 };
    let mut v = value as i128;

    if v > min {
        v -= (v - min) % step;
    }

    if v < min {
        (min as i64, Clamp::Min)
    } else if v > max {
        ((max - (max - min) % step) as i64, Clamp::Max)
    } else {
        (v as i64, Clamp::None)
    }
}

pub fn clamp_float<T: num_traits::Float>(value: T, min: T, max: T) -> (T, Clamp) {
    if value.is_nan() || value < min {
        (min, Clamp::Min)
    } else if value > max {
        (max, Clamp::Max)
    } else {
        (value, Clamp::None)
    }
}

/// Node map of the current session together with its feature directory.
pub struct Features<'a, N: NodeMap + ?Sized> {
    node_map: &'a mut N,
    directory: &'a mut FeatureDirectory
}

/// Converts a feature failure into "no value", logging it; transport failures are passed on.
fn tolerate<T>(name: &str, result: Result<T, FeatureError>) -> Result<Option<T>, CameraError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_transport() => {
            log::error!("{}", e);
            Err(e.into())
        },
        Err(e) => {
            log::warn!("{}: {}", name, e);
            Ok(None)
        }
    }
}

impl<'a, N: NodeMap + ?Sized> Features<'a, N> {
    pub fn new(node_map: &'a mut N, directory: &'a mut FeatureDirectory) -> Features<'a, N> {
        Features{ node_map, directory }
    }

    pub fn node_map(&mut self) -> &mut N {
        self.node_map
    }

    pub fn probe(&mut self, name: &str) -> Result<FeatureType, CameraError> {
        Ok(self.directory.probe(&*self.node_map, name)?)
    }

    pub fn exists(&mut self, name: &str) -> Result<bool, CameraError> {
        Ok(self.directory.exists(&*self.node_map, name)?)
    }

    /// Returns the first of `names` present on the device.
    pub fn first_existing<'n>(&mut self, names: &[&'n str]) -> Result<Option<(&'n str, FeatureType)>, CameraError> {
        Ok(self.directory.first_existing(&*self.node_map, names)?)
    }

    /// Checks that `name` exists and has the expected type, logging otherwise.
    fn expect_type(&mut self, name: &str, expected: FeatureType) -> Result<bool, CameraError> {
        match self.probe(name)? {
            FeatureType::NotFound => {
                log::warn!("{}: feature not supported", name);
                Ok(false)
            },
            actual if actual != expected => {
                log::warn!("{}: feature is {}, not {}", name, actual, expected);
                Ok(false)
            },
            _ => Ok(true)
        }
    }

    pub fn get_enum(&mut self, name: &str) -> Result<Option<String>, CameraError> {
        if self.probe(name)? != FeatureType::Enumeration { return Ok(None); }
        tolerate(name, self.node_map.enum_value(name))
    }

    pub fn get_enum_entries(&mut self, name: &str) -> Result<Vec<String>, CameraError> {
        if self.probe(name)? != FeatureType::Enumeration { return Ok(vec![]); }
        Ok(tolerate(name, self.node_map.enum_entries(name))?.unwrap_or_default())
    }

    pub fn get_int(&mut self, name: &str) -> Result<Option<i64>, CameraError> {
        if self.probe(name)? != FeatureType::Integer { return Ok(None); }
        tolerate(name, self.node_map.int_value(name))
    }

    pub fn get_int_range(&mut self, name: &str) -> Result<Option<IntRange>, CameraError> {
        if self.probe(name)? != FeatureType::Integer { return Ok(None); }
        tolerate(name, self.node_map.int_range(name))
    }

    pub fn get_float(&mut self, name: &str) -> Result<Option<f64>, CameraError> {
        if self.probe(name)? != FeatureType::Float { return Ok(None); }
        tolerate(name, self.node_map.float_value(name))
    }

    pub fn get_float_range(&mut self, name: &str) -> Result<Option<FloatRange>, CameraError> {
        if self.probe(name)? != FeatureType::Float { return Ok(None); }
        tolerate(name, self.node_map.float_range(name))
    }

    pub fn get_bool(&mut self, name: &str) -> Result<Option<bool>, CameraError> {
        if self.probe(name)? != FeatureType::Boolean { return Ok(None); }
        tolerate(name, self.node_map.bool_value(name))
    }

    pub fn get_string(&mut self, name: &str) -> Result<Option<String>, CameraError> {
        if self.probe(name)? != FeatureType::String { return Ok(None); }
        tolerate(name, self.node_map.string_value(name))
    }

    /// Sets an enumeration feature; `value` is matched case-insensitively against the available entries.
    ///
    /// Succeeds only if the device reports the new value afterwards.
    pub fn set_enum(&mut self, name: &str, value: &str) -> Result<bool, CameraError> {
        if !self.expect_type(name, FeatureType::Enumeration)? { return Ok(false); }

        let entries = match tolerate(name, self.node_map.enum_entries(name))? {
            Some(entries) => entries,
            None => return Ok(false)
        };

        if entries.is_empty() {
            log::warn!("{}: writing not supported", name);
            return Ok(false);
        }

        let entry = match entries.iter().find(|e| e.eq_ignore_ascii_case(value)) {
            Some(entry) => entry.clone(),
            None => {
                let current = self.node_map.enum_value(name).unwrap_or_default();
                log::warn!(
                    "{}: \"{}\" not supported (current: \"{}\"); supported values: {}",
                    name, value, current, entries.join(", ")
                );
                return Ok(false);
            }
        };

        if tolerate(name, self.node_map.set_enum_value(name, &entry))?.is_none() {
            return Ok(false);
        }

        match tolerate(name, self.node_map.enum_value(name))? {
            Some(readback) if readback == entry => {
                log::info!("{}: \"{}\" set successful", name, entry);
                Ok(true)
            },
            readback => {
                log::warn!("{}: \"{}\" set failed, device reports \"{}\"", name, entry, readback.unwrap_or_default());
                Ok(false)
            }
        }
    }

    /// Sets an integer feature after aligning it to the increment and clamping it into range.
    ///
    /// Succeeds only if the device reports the written value afterwards.
    pub fn set_int(&mut self, name: &str, value: i64) -> Result<bool, CameraError> {
        if !self.expect_type(name, FeatureType::Integer)? { return Ok(false); }

        let range = match tolerate(name, self.node_map.int_range(name))? {
            Some(range) => range,
            None => return Ok(false)
        };

        let (target, clamp) = align_and_clamp_int(value, range);
        match clamp {
            Clamp::Min => log::warn!("{}: {} capped to minimum {}", name, value, target),
            Clamp::Max => log::warn!("{}: {} capped to maximum {}", name, value, target),
            Clamp::None => if target != value {
                log::warn!("{}: {} aligned to increment {} as {}", name, value, range.step, target);
            }
        }

        if tolerate(name, self.node_map.set_int_value(name, target))?.is_none() {
            return Ok(false);
        }

        match tolerate(name, self.node_map.int_value(name))? {
            Some(readback) if readback == target => {
                log::info!("{}: {} set successful", name, target);
                Ok(true)
            },
            readback => {
                log::warn!("{}: {} set failed, device reports {:?}", name, target, readback);
                Ok(false)
            }
        }
    }

    /// Sets a float feature after clamping it into range.
    ///
    /// The value read back is only logged; devices commonly round floats to their internal resolution.
    pub fn set_float(&mut self, name: &str, value: f64) -> Result<bool, CameraError> {
        if !self.expect_type(name, FeatureType::Float)? { return Ok(false); }

        let range = match tolerate(name, self.node_map.float_range(name))? {
            Some(range) => range,
            None => return Ok(false)
        };

        let (target, clamp) = clamp_float(value, range.min, range.max);
        match clamp {
            Clamp::Min => log::warn!("{}: {} capped to minimum {}", name, value, target),
            Clamp::Max => log::warn!("{}: {} capped to maximum {}", name, value, target),
            Clamp::None => ()
        }

        if tolerate(name, self.node_map.set_float_value(name, target))?.is_none() {
            return Ok(false);
        }

        if let Some(readback) = tolerate(name, self.node_map.float_value(name))? {
            log::info!("{}: {} set successful (device reports {})", name, target, readback);
        }

        Ok(true)
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> Result<bool, CameraError> {
        if !self.expect_type(name, FeatureType::Boolean)? { return Ok(false); }

        if tolerate(name, self.node_map.set_bool_value(name, value))?.is_none() {
            return Ok(false);
        }

        log::info!("{}: {} set successful", name, value);
        Ok(true)
    }

    /// Like `set_bool`, but silent when the feature is absent.
    pub fn set_bool_if_present(&mut self, name: &str, value: bool) -> Result<bool, CameraError> {
        if !self.exists(name)? { return Ok(false); }
        self.set_bool(name, value)
    }

    pub fn execute(&mut self, name: &str) -> Result<bool, CameraError> {
        if !self.expect_type(name, FeatureType::Command)? { return Ok(false); }

        if tolerate(name, self.node_map.execute(name))?.is_none() {
            return Ok(false);
        }

        log::info!("executed command \"{}\"", name);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::drivers::simulator::{SimHandle, SimNode};
    use proptest::prelude::*;

    fn range(min: i64, max: i64, step: i64) -> IntRange {
        IntRange{ min, max, step }
    }

    #[test]
    fn given_value_between_increments_align_rounds_down() {
        assert_eq!((16, Clamp::None), align_and_clamp_int(17, range(0, 100, 4)));
        assert_eq!((18, Clamp::None), align_and_clamp_int(20, range(2, 100, 4)));
    }

    #[test]
    fn given_value_above_max_align_lands_on_last_increment() {
        assert_eq!((9996, Clamp::Max), align_and_clamp_int(10000, range(0, 9999, 4)));
        assert_eq!((98, Clamp::Max), align_and_clamp_int(1000, range(2, 100, 4)));
    }

    #[test]
    fn given_value_below_min_align_returns_min() {
        assert_eq!((8, Clamp::Min), align_and_clamp_int(-3, range(8, 64, 8)));
    }

    #[test]
    fn given_zero_increment_align_treats_it_as_one() {
        assert_eq!((37, Clamp::None), align_and_clamp_int(37, range(0, 100, 0)));
    }

    #[test]
    fn given_float_out_of_range_clamp_returns_bound() {
        assert_eq!((0.5, Clamp::Min), clamp_float(0.1, 0.5, 2.0));
        assert_eq!((2.0, Clamp::Max), clamp_float(3.0, 0.5, 2.0));
        assert_eq!((1.5, Clamp::None), clamp_float(1.5, 0.5, 2.0));
    }

    proptest! {
        #[test]
        fn aligned_int_is_in_range_and_on_increment(
            min in -100_000i64..100_000,
            span in 0i64..1_000_000,
            step in 0i64..512,
            value in proptest::num::i64::ANY
        ) {
            let r = range(min, min + span, step);
            let (v, _) = align_and_clamp_int(value, r);
            let step = if step == 0 { 1 } else { step };
            prop_assert!(v >= r.min && v <= r.max);
            prop_assert_eq!(0, (v - r.min) % step);
        }

        #[test]
        fn clamped_float_is_in_range(min in -1.0e6f64..1.0e6, span in 0.0f64..1.0e6, value in -1.0e7f64..1.0e7) {
            let (v, _) = clamp_float(value, min, min + span);
            prop_assert!(v >= min && v <= min + span);
        }
    }

    #[test]
    fn given_case_mismatch_set_enum_writes_device_spelling() {
        let mut device = SimHandle::new("A0001");
        let mut directory = FeatureDirectory::new();
        let mut features = Features::new(&mut device, &mut directory);

        assert!(features.set_enum("ExposureAuto", "off").unwrap());
        assert_eq!("Off", device.enum_of("ExposureAuto"));
    }

    #[test]
    fn given_unsupported_value_set_enum_does_not_write() {
        let mut device = SimHandle::new("A0002");
        let mut directory = FeatureDirectory::new();
        let mut features = Features::new(&mut device, &mut directory);

        assert!(!features.set_enum("ExposureAuto", "Sometimes").unwrap());
        assert_eq!(0, device.write_count("ExposureAuto"));
    }

    #[test]
    fn given_empty_entry_list_set_enum_fails() {
        let mut device = SimHandle::new("A0003");
        device.insert("Empty", SimNode::enumeration("", &[]));
        let mut directory = FeatureDirectory::new();
        let mut features = Features::new(&mut device, &mut directory);

        assert!(!features.set_enum("Empty", "x").unwrap());
    }

    #[test]
    fn given_device_ignoring_write_set_enum_fails() {
        let mut device = SimHandle::new("A0004");
        device.insert("Sticky", SimNode::enumeration("A", &["A", "B"]).ignoring_writes());
        let mut directory = FeatureDirectory::new();
        let mut features = Features::new(&mut device, &mut directory);

        assert!(!features.set_enum("Sticky", "B").unwrap());
        assert_eq!(1, device.write_count("Sticky"));
    }

    #[test]
    fn given_value_off_increment_set_int_writes_aligned_value() {
        let mut device = SimHandle::new("A0005");
        device.insert("Step", SimNode::int(0, 2, 100, 4));
        let mut directory = FeatureDirectory::new();
        let mut features = Features::new(&mut device, &mut directory);

        assert!(features.set_int("Step", 1000).unwrap());
        assert_eq!(98, device.int_of("Step"));
    }

    #[test]
    fn given_float_feature_set_int_does_not_write() {
        let mut device = SimHandle::new("A0006");
        let mut directory = FeatureDirectory::new();
        let mut features = Features::new(&mut device, &mut directory);

        assert!(!features.set_int("ExposureTime", 100).unwrap());
        assert_eq!(0, device.write_count("ExposureTime"));
    }

    #[test]
    fn given_out_of_range_float_set_float_writes_bound() {
        let mut device = SimHandle::new("A0007");
        let range = device.float_range("Gamma").unwrap();
        let mut directory = FeatureDirectory::new();
        let mut features = Features::new(&mut device, &mut directory);

        assert!(features.set_float("Gamma", 1000.0).unwrap());
        assert_eq!(range.max, device.float_of("Gamma"));
    }

    #[test]
    fn given_missing_feature_setters_report_failure_without_error() {
        let mut device = SimHandle::new("A0008");
        let mut directory = FeatureDirectory::new();
        let mut features = Features::new(&mut device, &mut directory);

        assert!(!features.set_float("Nope", 1.0).unwrap());
        assert!(!features.set_int("Nope", 1).unwrap());
        assert!(!features.set_enum("Nope", "x").unwrap());
        assert!(!features.execute("Nope").unwrap());
    }

    #[test]
    fn given_transport_failure_setter_returns_error() {
        let mut device = SimHandle::new("A0009");
        device.fail_transport("Width");
        let mut directory = FeatureDirectory::new();
        let mut features = Features::new(&mut device, &mut directory);

        assert!(features.set_int("Width", 640).is_err());
    }

    #[test]
    fn given_read_only_feature_set_int_fails() {
        let mut device = SimHandle::new("A0010");
        device.insert("Fixed", SimNode::int(5, 0, 10, 1).read_only());
        let mut directory = FeatureDirectory::new();
        let mut features = Features::new(&mut device, &mut directory);

        assert!(!features.set_int("Fixed", 7).unwrap());
        assert_eq!(5, device.int_of("Fixed"));
    }
}
