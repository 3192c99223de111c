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

//! Error wrapping file system helpers.
//!
//! Thin wrappers around `std::fs` used for sysfs, configfs and device files. Every helper logs
//! at `trace` level and converts failures into an [`FpgaxferError`] carrying the path involved.
//!
//! ```rust,no_run
//! # use fpgaxfer::system_io::{fs_read, fs_read_number};
//! # use std::path::Path;
//! # fn example() -> Result<(), fpgaxfer::error::FpgaxferError> {
//! let state = fs_read(Path::new("/sys/class/fpga_manager/fpga0/state"))?;
//! let phys = fs_read_number(Path::new("/sys/class/u-dma-buf/udmabuf0/phys_addr"))?;
//! println!("{} at {phys:#x}", state.trim());
//! # Ok(())
//! # }
//! ```

use crate::error::FpgaxferError;
use log::trace;
use std::fs::OpenOptions;
use std::fs::{create_dir_all, remove_dir};
use std::io::{Read, Write};
use std::path::Path;

/// Read the contents of a file to a String.
///
/// # Returns: `Result<String, FpgaxferError>`
/// * `Ok(String)` - The complete contents of the file
/// * `Err(FpgaxferError::IORead)` - If the file cannot be read
pub fn fs_read(file_path: &Path) -> Result<String, FpgaxferError> {
    trace!("Attempting to read from {file_path:?}");
    let mut buf = String::new();
    OpenOptions::new()
        .read(true)
        .open(file_path)
        .and_then(|mut f| f.read_to_string(&mut buf))
        .map_err(|e| FpgaxferError::IORead {
            file: file_path.into(),
            e,
        })?;
    trace!("Reading done");
    Ok(buf)
}

/// Read the raw contents of a file, used for bitstreams and raw input frames.
pub fn fs_read_bytes(file_path: &Path) -> Result<Vec<u8>, FpgaxferError> {
    trace!("Attempting to read bytes from {file_path:?}");
    std::fs::read(file_path).map_err(|e| FpgaxferError::IORead {
        file: file_path.into(),
        e,
    })
}

/// Read an unsigned number from a sysfs attribute.
///
/// Kernel drivers are inconsistent here: u-dma-buf reports `phys_addr` as `0x...` hex while
/// `size` is decimal, and UIO reports both `addr` and `size` as hex. Values prefixed with `0x`
/// are parsed as hex, anything else as decimal. Trailing newlines and nulls are ignored.
///
/// # Returns: `Result<u64, FpgaxferError>`
/// * `Ok(u64)` - The parsed value
/// * `Err(FpgaxferError::IORead)` - The attribute cannot be read
/// * `Err(FpgaxferError::Parse)` - The attribute is not a number
pub fn fs_read_number(file_path: &Path) -> Result<u64, FpgaxferError> {
    let contents = fs_read(file_path)?;
    parse_number(&contents).ok_or_else(|| FpgaxferError::Parse {
        file: file_path.into(),
        value: contents.clone(),
    })
}

pub(crate) fn parse_number(value: &str) -> Option<u64> {
    let trimmed = value.trim().trim_end_matches('\0');
    match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => trimmed.parse().ok(),
    }
}

/// Write a string value to a file.
///
/// # Arguments
///
/// * `file_path` - Path to the file to write
/// * `create` - If `true`, create the file if it doesn't exist; sysfs attributes must already exist
/// * `value` - The string value to write
pub fn fs_write(
    file_path: &Path,
    create: bool,
    value: impl AsRef<str>,
) -> Result<(), FpgaxferError> {
    trace!(
        "Attempting to write {:?} to {:?}",
        value.as_ref(),
        file_path
    );
    OpenOptions::new()
        .create(create)
        .write(true)
        .open(file_path)
        .and_then(|mut f| write!(f, "{}", value.as_ref()))
        .map_err(|e| FpgaxferError::IOWrite {
            file: file_path.into(),
            e,
        })?;
    trace!("Write done.");
    Ok(())
}

/// Write binary data to a file, truncating any previous content.
pub fn fs_write_bytes(file_path: &Path, create: bool, data: &[u8]) -> Result<(), FpgaxferError> {
    trace!("Attempting to write {} bytes to {:?}", data.len(), file_path);
    OpenOptions::new()
        .create(create)
        .write(true)
        .truncate(true)
        .open(file_path)
        .and_then(|mut f| f.write_all(data))
        .map_err(|e| FpgaxferError::IOWrite {
            file: file_path.into(),
            e,
        })?;
    trace!("Write done.");
    Ok(())
}

/// Recursively create directories up to the specified path.
pub fn fs_create_dir(path: &Path) -> Result<(), FpgaxferError> {
    trace!("Attempting to create '{path:?}'");
    create_dir_all(path).map_err(|e| FpgaxferError::IOCreate {
        file: path.into(),
        e,
    })?;
    trace!("Directory created at {path:?}.");
    Ok(())
}

/// Remove an empty directory. configfs overlay directories are removed this way.
pub fn fs_remove_dir(path: &Path) -> Result<(), FpgaxferError> {
    trace!("Attempting to delete '{path:?}'");
    remove_dir(path).map_err(|e| FpgaxferError::IODelete {
        file: path.into(),
        e,
    })?;
    trace!("Deleted {path:?}");
    Ok(())
}

/// Read the entry names (not full paths) of a directory. Unreadable entries are skipped.
pub fn fs_read_dir(dir: &Path) -> Result<Vec<String>, FpgaxferError> {
    trace!("Attempting to read directory '{dir:?}'");
    std::fs::read_dir(dir).map_or_else(
        |e| {
            Err(FpgaxferError::IOReadDir {
                dir: dir.to_owned(),
                e,
            })
        },
        |iter| {
            let mut ret: Vec<String> = iter
                .filter_map(Result::ok)
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect();
            ret.sort();
            trace!("Dir reading done.");
            Ok(ret)
        },
    )
}
