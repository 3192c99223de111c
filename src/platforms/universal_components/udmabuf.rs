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

//! Contiguous memory from the u-dma-buf driver.
//!
//! The driver reserves a physically contiguous block at module load and exposes it as
//! `/dev/udmabufN`, with its bus address and size under `/sys/class/u-dma-buf/udmabufN/`.
//! The device is opened with `O_SYNC` so the mapping is uncached and DMA transfers need no
//! cache maintenance.

use crate::config::DEV_DIR;
use crate::error::FpgaxferError;
use crate::memory::MemoryRegion;
use crate::platforms::universal_components::mapping::MappedFile;
use crate::system_io::fs_read_number;
use log::info;
use std::path::Path;

#[derive(Debug)]
pub struct UdmabufRegion {
    phys_base: u64,
    map: MappedFile,
}

impl UdmabufRegion {
    /// Map the whole of `/dev/<device>`.
    ///
    /// # Returns: `Result<UdmabufRegion, FpgaxferError>`
    /// * `Ok(UdmabufRegion)` - The region, ready to back a buffer pool
    /// * `Err(FpgaxferError::IORead)` - The driver is not loaded or the device does not exist
    /// * `Err(FpgaxferError::Parse)` - `phys_addr` or `size` is not a number
    /// * `Err(FpgaxferError::Mmap)` - Mapping the device failed
    pub fn open(udmabuf_class_dir: &Path, device: &str) -> Result<UdmabufRegion, FpgaxferError> {
        let sysfs = udmabuf_class_dir.join(device);
        let phys_base = fs_read_number(&sysfs.join("phys_addr"))?;
        let size_path = sysfs.join("size");
        let size = usize::try_from(fs_read_number(&size_path)?).map_err(|_| {
            FpgaxferError::Parse {
                file: size_path.clone(),
                value: "size does not fit the address space".into(),
            }
        })?;
        let map = MappedFile::map(&Path::new(DEV_DIR).join(device), 0, size, true)?;
        info!("Using {device}: {size:#x} bytes of contiguous memory at {phys_base:#x}");
        Ok(UdmabufRegion { phys_base, map })
    }
}

impl MemoryRegion for UdmabufRegion {
    fn phys_base(&self) -> u64 {
        self.phys_base
    }

    fn size(&self) -> usize {
        self.map.size()
    }

    fn read(&self, offset: usize, dst: &mut [u8]) -> Result<(), FpgaxferError> {
        self.map.read_bytes(offset, dst)
    }

    fn write(&mut self, offset: usize, src: &[u8]) -> Result<(), FpgaxferError> {
        self.map.write_bytes(offset, src)
    }
}
