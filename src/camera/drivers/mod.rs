//
// GenCam - GenICam camera configuration and frame acquisition
// Copyright (c) 2020-2024 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Camera drivers.
//!

pub mod simulator;
#[cfg(feature = "camera_spinnaker")]
pub mod spinnaker;

use crate::camera::Driver;

/// Initializes all compiled-in drivers except those in `disabled_drivers`.
pub fn init_drivers(disabled_drivers: &[&str]) -> Vec<Box<dyn Driver>> {
    let mut drivers: Vec<Box<dyn Driver>> = vec![];

    #[cfg(feature = "camera_spinnaker")]
    if !disabled_drivers.contains(&"camera_spinnaker") {
        log::info!("initializing Spinnaker camera driver");
        match spinnaker::SpinnakerDriver::new() {
            Ok(driver) => drivers.push(Box::new(driver)),
            Err(e) => log::error!("failed to initialize Spinnaker camera driver: {}", e)
        }
    }

    // add more drivers here

    if !disabled_drivers.contains(&"simulator") {
        log::info!("initializing camera simulator driver");
        if let Some(driver) = simulator::SimDriver::new() {
            drivers.push(Box::new(driver));
        }
    }

    drivers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_simulator_disabled_it_is_not_initialized() {
        assert!(init_drivers(&["simulator"]).iter().all(|d| d.name() != "Sim"));
    }

    #[test]
    fn given_no_disabled_drivers_simulator_is_initialized() {
        assert!(init_drivers(&[]).iter().any(|d| d.name() == "Sim"));
    }
}
