//
// GenCam - GenICam camera configuration and frame acquisition
// Copyright (c) 2020-2024 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! GenICam camera configuration and frame acquisition.
//!
//! `camera::engine::GenCam` opens a camera through a `camera::Driver`, applies a `ConfigurationRequest` and then
//! delivers frames on request.
//!

pub mod camera;
pub mod config;

pub use camera::{CameraError, Frame};
pub use camera::engine::GenCam;
pub use camera::params::{ConfigurationRequest, Setting};
