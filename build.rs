//
// GenCam - GenICam camera configuration and frame acquisition
// Copyright (c) 2020-2024 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Build script.
//!

fn main() {
    let output_dir = std::env::var("OUT_DIR").expect("OUT_DIR is always set by Cargo");
    let version_path = std::path::Path::new(&output_dir).join("version");

    std::fs::write(version_path, get_commit_hash()).expect("cannot write version file");

    println!("cargo:rerun-if-changed=.git/HEAD");
}

/// Returns the abbreviated hash of the current commit, or "unspecified" outside of a git checkout.
fn get_commit_hash() -> String {
    let output = std::process::Command::new("git")
        .arg("log").arg("-1")
        .arg("--pretty=format:%h")
        .arg("--abbrev=8")
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .output();

    match output {
        Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout).to_string(),
        _ => "unspecified".to_string()
    }
}
