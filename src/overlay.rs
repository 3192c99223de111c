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

//! Overlay files.
//!
//! An overlay is a bitstream plus the hardware handoff Vivado exported with it, both sharing a
//! file stem (`design.bit` and `design.hwh`). A device-tree overlay with the same stem
//! (`design.dtbo`) is optional; boards whose UIO nodes come from the base device tree do not
//! need one.

pub mod bitfile;
pub mod hwh;

use crate::error::FpgaxferError;
use log::trace;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayFiles {
    pub bitstream: PathBuf,
    pub handoff: PathBuf,
    pub dtbo: Option<PathBuf>,
}

impl OverlayFiles {
    /// Find the files that make up the overlay for `bitstream`.
    ///
    /// # Returns: `Result<OverlayFiles, FpgaxferError>`
    /// * `Ok(OverlayFiles)` - Bitstream and handoff exist; `dtbo` is set if one exists
    /// * `Err(FpgaxferError::Argument)` - The bitstream is missing or a directory, or the
    ///   handoff file is missing
    pub fn locate(bitstream: &Path) -> Result<OverlayFiles, FpgaxferError> {
        if !bitstream.is_file() {
            return Err(FpgaxferError::Argument(format!(
                "{bitstream:?} is not a valid path to a bitstream file."
            )));
        }
        let handoff = bitstream.with_extension("hwh");
        if !handoff.is_file() {
            return Err(FpgaxferError::Argument(format!(
                "{bitstream:?} has no matching hardware handoff file. Expected {handoff:?} \
                next to it."
            )));
        }
        let dtbo = Some(bitstream.with_extension("dtbo")).filter(|p| p.is_file());
        trace!("Overlay files: {bitstream:?}, {handoff:?}, {dtbo:?}");
        Ok(OverlayFiles {
            bitstream: bitstream.to_path_buf(),
            handoff,
            dtbo,
        })
    }

    /// File name of the converted bitstream handed to the FPGA manager, e.g. `design.bit.bin`.
    pub fn bin_file_name(&self) -> Result<String, FpgaxferError> {
        self.bitstream
            .file_name()
            .map(|name| format!("{}.bin", name.to_string_lossy()))
            .ok_or_else(|| {
                FpgaxferError::Argument(format!("{:?} has no file name", self.bitstream))
            })
    }

    /// Overlay handle used in configfs, the bitstream's file stem.
    pub fn overlay_handle(&self) -> String {
        self.bitstream
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "fpgaxfer".to_string())
    }
}
