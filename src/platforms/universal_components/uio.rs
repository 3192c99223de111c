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

//! Userspace I/O register windows.
//!
//! Each AXI DMA in the design gets a `generic-uio` node from the device tree, which shows up as
//! `/sys/class/uio/uioN`. The kernel numbers them in probe order, so the device belonging to a
//! DMA instance is found by its register base address:
//!
//! ```text
//! /sys/class/uio/uio4
//! ├── name
//! └── maps
//!     └── map0
//!         ├── addr    0x40400000
//!         └── size    0x10000
//! ```
//!
//! A `[dma_devices]` entry in the config file pins an instance to a device instead.

use crate::config::{DEV_DIR, SystemConfig};
use crate::dma::axi_dma::RegisterAccess;
use crate::error::FpgaxferError;
use crate::platforms::universal_components::mapping::MappedFile;
use crate::system_io::{fs_read_dir, fs_read_number};
use log::{debug, info, trace};
use std::path::Path;

#[derive(Debug)]
pub struct UioDevice {
    name: String,
    map: MappedFile,
}

impl UioDevice {
    /// Map the first register window of `/dev/<name>`.
    pub fn open(uio_class_dir: &Path, name: &str) -> Result<UioDevice, FpgaxferError> {
        let size_path = uio_class_dir.join(name).join("maps/map0/size");
        let size = usize::try_from(fs_read_number(&size_path)?).map_err(|_| {
            FpgaxferError::Parse {
                file: size_path.clone(),
                value: "size does not fit the address space".into(),
            }
        })?;
        let map = MappedFile::map(&Path::new(DEV_DIR).join(name), 0, size, false)?;
        info!("Opened {name} ({size:#x} bytes of registers)");
        Ok(UioDevice {
            name: name.to_owned(),
            map,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl RegisterAccess for UioDevice {
    fn read_u32(&self, offset: usize) -> Result<u32, FpgaxferError> {
        self.map.read_u32(offset)
    }

    fn write_u32(&mut self, offset: usize, value: u32) -> Result<(), FpgaxferError> {
        self.map.write_u32(offset, value)
    }
}

/// Name of the UIO device whose first map starts at `base`.
///
/// # Returns: `Result<String, FpgaxferError>`
/// * `Ok(String)` - e.g. `"uio4"`
/// * `Err(FpgaxferError::IOReadDir)` - The UIO class directory cannot be listed
/// * `Err(FpgaxferError::Argument)` - No device maps that address
pub fn find_uio_device(uio_class_dir: &Path, base: u64) -> Result<String, FpgaxferError> {
    for name in fs_read_dir(uio_class_dir)? {
        match fs_read_number(&uio_class_dir.join(&name).join("maps/map0/addr")) {
            Ok(addr) if addr == base => {
                debug!("{name} maps {base:#x}");
                return Ok(name);
            }
            Ok(_) => {}
            Err(e) => trace!("Skipping {name}: {e}"),
        }
    }
    Err(FpgaxferError::Argument(format!(
        "No UIO device in {uio_class_dir:?} maps {base:#x}. Is the overlay's device tree loaded?"
    )))
}

/// UIO device for a DMA instance: the configured one if there is one, otherwise found by
/// base address.
pub fn resolve_uio_device(
    config: &SystemConfig,
    instance: &str,
    base: u64,
) -> Result<String, FpgaxferError> {
    match config.dma_devices.get(instance) {
        Some(name) => {
            debug!("Using configured device {name} for {instance}");
            Ok(name.clone())
        }
        None => find_uio_device(&config.uio_class_dir, base),
    }
}
