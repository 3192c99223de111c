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

//! Device-tree overlays through configfs.
//!
//! An overlay is applied by creating a directory under
//! `/sys/kernel/config/device-tree/overlays/` and writing the `.dtbo` file name, relative to the
//! firmware directory, into its `path` file. The kernel then reports the outcome in `status`:
//!
//! ```text
//! /sys/kernel/config/device-tree/overlays/design
//! ├── dtbo
//! ├── path      design.dtbo
//! └── status    applied
//! ```
//!
//! Removing the directory removes the overlay.

use crate::error::FpgaxferError;
use crate::system_io::{fs_create_dir, fs_read, fs_remove_dir, fs_write};
use log::{info, trace, warn};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct UniversalOverlayHandler {
    overlay_fs_path: PathBuf,
}

impl UniversalOverlayHandler {
    pub fn new(overlay_control_dir: &Path, overlay_handle: &str) -> UniversalOverlayHandler {
        UniversalOverlayHandler {
            overlay_fs_path: overlay_control_dir.join(overlay_handle),
        }
    }

    pub fn overlay_fs_path(&self) -> &Path {
        &self.overlay_fs_path
    }

    fn get_vfs_status(&self) -> Result<String, FpgaxferError> {
        let status_path = self.overlay_fs_path.join("status");
        trace!("Reading from {status_path:?}");
        fs_read(&status_path).map(|s| s.trim_end_matches('\n').to_string())
    }

    fn get_vfs_path(&self) -> Result<PathBuf, FpgaxferError> {
        let path_path = self.overlay_fs_path.join("path");
        trace!("Reading from {path_path:?}");
        let path_string = fs_read(&path_path).map(|s| s.trim_end_matches('\n').to_string())?;
        Ok(PathBuf::from(path_string))
    }

    /// A failed apply can still report `applied` with an empty path, so check both.
    fn vfs_check_applied(&self, source_path_rel: &Path) -> Result<(), FpgaxferError> {
        let path_file_contents = &self.get_vfs_path()?;
        if path_file_contents.ends_with(source_path_rel) {
            info!("overlay path contents is valid: '{path_file_contents:?}'");
        } else {
            return Err(FpgaxferError::OverlayStatus(format!(
                "When trying to apply overlay '{source_path_rel:?}', the resulting vfs path contained '{path_file_contents:?}'"
            )));
        }

        let status = self.get_vfs_status()?;
        if !status.contains("applied") {
            return Err(FpgaxferError::OverlayStatus(format!(
                "After writing to configfs, overlay status does not show 'applied'. Instead it is '{status}'"
            )));
        }
        info!("overlay status is 'applied'");
        Ok(())
    }

    /// Apply the overlay at `source_path_rel`, relative to the firmware directory. An overlay
    /// already applied under the same handle belongs to an earlier load and is removed first.
    pub fn apply_overlay(&self, source_path_rel: &Path) -> Result<(), FpgaxferError> {
        let parent = self.overlay_fs_path.parent().unwrap_or(Path::new("/"));
        if !parent.exists() {
            return Err(FpgaxferError::Argument(format!(
                "The overlay control path {parent:?} doesn't seem to exist. Is configfs mounted?"
            )));
        }
        if self.overlay_fs_path.exists() {
            warn!(
                "Removing stale overlay at {:?} before applying a new one",
                self.overlay_fs_path
            );
            self.remove_overlay()?;
        }

        fs_create_dir(&self.overlay_fs_path)?;
        trace!("Created dir {:?}", self.overlay_fs_path);

        let overlay_path_file = self.overlay_fs_path.join("path");
        if !overlay_path_file.exists() {
            return Err(FpgaxferError::Internal(format!(
                "Overlay at {:?} did not initialise a new overlay: \
                the `path` virtual file did not get created by the kernel. \
                Is the parent dir mounted as a configfs directory?",
                self.overlay_fs_path
            )));
        }

        fs_write(&overlay_path_file, false, source_path_rel.to_string_lossy())?;
        trace!("'{source_path_rel:?}' successfully written to {overlay_path_file:?}");
        self.vfs_check_applied(source_path_rel)
    }

    pub fn remove_overlay(&self) -> Result<(), FpgaxferError> {
        fs_remove_dir(&self.overlay_fs_path)
    }

    /// `"not present"`, or the applied path followed by the kernel's status.
    pub fn status(&self) -> Result<String, FpgaxferError> {
        if !self.overlay_fs_path.exists() {
            return Ok("not present".into());
        };
        let path = self.get_vfs_path()?;
        let status = self.get_vfs_status()?;
        Ok(format!("{path:?} {status}"))
    }
}
