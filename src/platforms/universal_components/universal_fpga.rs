// This file is part of fpgaxfer, an application to drive DMA round-trips against FPGA accelerator overlays.
//
// Copyright 2025 Canonical Ltd.
//
// SPDX-License-Identifier: GPL-3.0-only
//
// fpgaxfer is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License version 3, as published by the Free Software Foundation.
//
// fpgaxfer is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranties of MERCHANTABILITY, SATISFACTORY QUALITY, or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with this program.  If not, see http://www.gnu.org/licenses/.

//! FPGA manager access through sysfs.
//!
//! ```text
//! /sys/class/fpga_manager/fpga0
//! ├── firmware
//! ├── flags
//! ├── name
//! ├── state
//! └── ...
//! ```
//! Only these are used:
//! - `state` - current FPGA state (`operating`, `unknown`, `write error`, ...)
//! - `flags` - programming flags, hex (`0x...`), `0` for full reconfiguration
//! - `firmware` - writing a file name relative to the firmware directory loads it
//!
//! # Examples
//!
//! ```rust,no_run
//! # use fpgaxfer::platforms::universal_components::universal_fpga::UniversalFPGA;
//! # fn example() -> Result<(), fpgaxfer::error::FpgaxferError> {
//! let fpga = UniversalFPGA::new("fpga0", "/sys/class/fpga_manager/".as_ref());
//! println!("FPGA state: {}", fpga.state()?);
//! println!("Flags: 0x{:X}", fpga.flags()?);
//! # Ok(())
//! # }
//! ```

use crate::error::FpgaxferError;
use crate::system_io::{fs_read, fs_write};
use log::{error, info, trace, warn};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct UniversalFPGA {
    device_handle: String,
    device_dir: PathBuf,
}

impl UniversalFPGA {
    pub fn new(device_handle: &str, fpga_managers_dir: &Path) -> UniversalFPGA {
        UniversalFPGA {
            device_handle: device_handle.to_owned(),
            device_dir: fpga_managers_dir.join(device_handle),
        }
    }

    pub fn device_handle(&self) -> &str {
        &self.device_handle
    }

    /// Check the state is `operating`, as it must be after a successful load.
    pub(crate) fn assert_state(&self) -> Result<(), FpgaxferError> {
        match self.state() {
            Ok(state) => match state.as_str() {
                "operating" => {
                    info!("{}'s state is 'operating'", self.device_handle);
                    Ok(())
                }
                _ => Err(FpgaxferError::FPGAState(format!(
                    "After loading bitstream, {}'s state should be 'operating' but it is '{}'",
                    self.device_handle, state
                ))),
            },
            Err(e) => Err(e),
        }
    }

    /// Contents of `<device>/state`, without the trailing newline.
    pub fn state(&self) -> Result<String, FpgaxferError> {
        let state_path = self.device_dir.join("state");
        trace!("reading {state_path:?}");
        fs_read(&state_path).map(|s| s.trim_end_matches('\n').to_string())
    }

    pub fn flags(&self) -> Result<u32, FpgaxferError> {
        let flag_path = self.device_dir.join("flags");
        let contents = fs_read(&flag_path)?;
        let trimmed = contents.trim().trim_start_matches("0x");
        u32::from_str_radix(trimmed, 16).map_err(|_| {
            FpgaxferError::Flag(format!("Parsing flags {contents:?} from {flag_path:?} failed"))
        })
    }

    /// Write the programming flags and read them back to check they stuck.
    pub fn set_flags(&self, flags: u32) -> Result<(), FpgaxferError> {
        let flag_path = self.device_dir.join("flags");
        trace!("Writing 0x'{flags:X}' to '{flag_path:?}");
        if let Err(e) = fs_write(&flag_path, false, format!("0x{flags:X}")) {
            error!("Failed to write {}'s flags.", self.device_handle);
            return Err(e);
        }

        match self.state()?.as_str() {
            "operating" => info!(
                "{}'s state is 'operating' after writing flags.",
                self.device_handle
            ),
            state => warn!(
                "{}'s state is '{state}' after writing flags.",
                self.device_handle
            ),
        }

        match self.flags() {
            Ok(returned_flags) if returned_flags == flags => Ok(()),
            Ok(returned_flags) => Err(FpgaxferError::Flag(format!(
                "Setting {}'s flags to '{}' failed. Resulting flag was '{}'",
                self.device_handle, flags, returned_flags
            ))),
            Err(e) => Err(FpgaxferError::Flag(format!(
                "Failed to read {}'s flags after setting to '{}': {}",
                self.device_handle, flags, e
            ))),
        }
    }

    /// Load `bitstream_path_rel`, relative to the firmware directory, and check the device
    /// ends up `operating`.
    pub fn load_firmware(&self, bitstream_path_rel: &Path) -> Result<(), FpgaxferError> {
        let control_path = self.device_dir.join("firmware");
        fs_write(&control_path, false, bitstream_path_rel.to_string_lossy())?;
        self.assert_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn fake_manager(state: &str, flags: &str) -> (TempDir, UniversalFPGA) {
        let dir = tempdir().unwrap();
        let device = dir.path().join("fpga0");
        fs::create_dir_all(&device).unwrap();
        fs::write(device.join("state"), state).unwrap();
        fs::write(device.join("flags"), flags).unwrap();
        fs::write(device.join("firmware"), "").unwrap();
        let fpga = UniversalFPGA::new("fpga0", dir.path());
        (dir, fpga)
    }

    #[test]
    fn test_state_and_flags_are_read_from_sysfs() {
        let (_dir, fpga) = fake_manager("operating\n", "0x20\n");
        assert_eq!(fpga.state().unwrap(), "operating");
        assert_eq!(fpga.flags().unwrap(), 0x20);
        assert!(fpga.assert_state().is_ok());
    }

    #[test]
    fn test_load_firmware_writes_name_and_checks_state() {
        let (dir, fpga) = fake_manager("operating\n", "0x0\n");
        fpga.set_flags(0).unwrap();
        fpga.load_firmware(Path::new("design.bit.bin")).unwrap();
        let written = fs::read_to_string(dir.path().join("fpga0/firmware")).unwrap();
        assert_eq!(written, "design.bit.bin");
    }

    #[test]
    fn test_load_firmware_fails_when_not_operating() {
        let (_dir, fpga) = fake_manager("write error\n", "0x0\n");
        let err = fpga
            .load_firmware(Path::new("design.bit.bin"))
            .unwrap_err();
        assert!(matches!(err, FpgaxferError::FPGAState(_)));
    }
}
