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

//! Universal platform for Linux boards.
//!
//! Uses only upstream kernel interfaces and the u-dma-buf module:
//! - [`UniversalFPGA`] - programs the bitstream through the FPGA manager
//! - [`UniversalOverlayHandler`] - applies a `.dtbo` found next to the bitstream, which is how
//!   the DMA engines' UIO nodes usually appear
//! - [`UioDevice`] - maps a DMA's registers, driven by [`AxiDmaChannel`]
//! - [`UdmabufRegion`] - the contiguous memory buffers are allocated from
//!
//! Paths and device names come from the [`SystemConfig`].
//!
//! # Examples
//!
//! ```rust,no_run
//! # use fpgaxfer::platforms::universal::UniversalPlatform;
//! # use fpgaxfer::platforms::platform::Platform;
//! # fn example() -> Result<(), fpgaxfer::error::FpgaxferError> {
//! let platform = UniversalPlatform::new();
//! let overlay = platform.load_overlay("/home/xilinx/design.bit".as_ref())?;
//! let mut dma = overlay.dma("axi_dma_0")?;
//! # Ok(())
//! # }
//! ```

use crate::config::{SystemConfig, system_config};
use crate::dma::axi_dma::{AxiDmaChannel, SharedRegisters};
use crate::dma::{DmaChannel, DmaEngine, Direction};
use crate::error::FpgaxferError;
use crate::memory::{BufferPool, ElementType, PoolStats, ScopedBuffer, Shape};
use crate::overlay::OverlayFiles;
use crate::overlay::bitfile::{Bitstream, BitstreamHeader};
use crate::overlay::hwh::HardwareHandoff;
use crate::platforms::platform::{Overlay, Platform};
use crate::platforms::universal_components::udmabuf::UdmabufRegion;
use crate::platforms::universal_components::uio::{UioDevice, resolve_uio_device};
use crate::platforms::universal_components::universal_fpga::UniversalFPGA;
use crate::platforms::universal_components::universal_overlay_handler::UniversalOverlayHandler;
use crate::system_io::{fs_read_bytes, fs_write_bytes};
use fpgaxfer_macros::platform;
use log::{debug, info, trace};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

/// Flags for a full, unencrypted reconfiguration.
const FULL_RECONFIGURATION: u32 = 0;

/// Return the pool in `cell`, opening it with `open` if nobody has yet. A failed open leaves
/// the cell empty so the next call tries again.
fn pool_or_init(
    cell: &OnceLock<BufferPool>,
    open: impl FnOnce() -> Result<BufferPool, FpgaxferError>,
) -> Result<&BufferPool, FpgaxferError> {
    if let Some(pool) = cell.get() {
        return Ok(pool);
    }
    if cell.set(open()?).is_err() {
        debug!("Buffer pool was opened concurrently, dropping the duplicate");
    }
    cell.get()
        .ok_or_else(|| FpgaxferError::Internal("buffer pool was not initialised".to_string()))
}

#[platform(compat_string = "universal,linux")]
#[derive(Debug)]
pub struct UniversalPlatform {
    config: SystemConfig,
    pool: OnceLock<BufferPool>,
}

impl Default for UniversalPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl UniversalPlatform {
    pub fn new() -> Self {
        Self::with_config(system_config().clone())
    }

    pub fn with_config(config: SystemConfig) -> Self {
        trace!("creating new universal platform");
        UniversalPlatform {
            config,
            pool: OnceLock::new(),
        }
    }

    /// The pool over the u-dma-buf device, opened on first use.
    fn pool(&self) -> Result<&BufferPool, FpgaxferError> {
        pool_or_init(&self.pool, || {
            let region =
                UdmabufRegion::open(&self.config.udmabuf_class_dir, &self.config.udmabuf_device)?;
            Ok(BufferPool::new(Box::new(region)))
        })
    }

    fn program(&self, files: &OverlayFiles, bitstream: &Bitstream) -> Result<(), FpgaxferError> {
        let bin_name = files.bin_file_name()?;
        let bin_path = self.config.firmware_source_dir.join(&bin_name);
        fs_write_bytes(&bin_path, true, &bitstream.to_bin()?)?;
        debug!("Wrote {bin_path:?}");

        let fpga = UniversalFPGA::new(&self.config.fpga_device, &self.config.fpga_managers_dir);
        fpga.set_flags(FULL_RECONFIGURATION)?;
        fpga.load_firmware(Path::new(&bin_name))?;
        info!(
            "Programmed {} with '{}'",
            fpga.device_handle(),
            bitstream.header.design
        );
        Ok(())
    }

    fn apply_dtbo(&self, files: &OverlayFiles, dtbo: &Path) -> Result<(), FpgaxferError> {
        let dtbo_name = dtbo.file_name().ok_or_else(|| {
            FpgaxferError::Argument(format!("{dtbo:?} has no file name"))
        })?;
        fs_write_bytes(
            &self.config.firmware_source_dir.join(dtbo_name),
            true,
            &fs_read_bytes(dtbo)?,
        )?;
        let handler =
            UniversalOverlayHandler::new(&self.config.overlay_control_dir, &files.overlay_handle());
        handler.apply_overlay(Path::new(dtbo_name))?;
        info!("Overlay status: {}", handler.status()?);
        Ok(())
    }
}

impl Platform for UniversalPlatform {
    fn load_overlay(&self, bitstream: &Path) -> Result<Box<dyn Overlay>, FpgaxferError> {
        let files = OverlayFiles::locate(bitstream)?;
        let bit = Bitstream::from_file(&files.bitstream)?;
        let handoff = HardwareHandoff::from_file(&files.handoff)?;

        self.program(&files, &bit)?;
        if let Some(dtbo) = &files.dtbo {
            self.apply_dtbo(&files, dtbo)?;
        }

        Ok(Box::new(UniversalOverlay {
            files,
            header: bit.header,
            handoff,
            config: self.config.clone(),
        }))
    }

    fn allocate(&self, shape: Shape, dtype: ElementType) -> Result<ScopedBuffer, FpgaxferError> {
        self.pool()?.allocate(shape, dtype)
    }

    fn pool_stats(&self) -> Result<PoolStats, FpgaxferError> {
        self.pool()?.stats()
    }
}

#[derive(Debug)]
pub struct UniversalOverlay {
    files: OverlayFiles,
    header: BitstreamHeader,
    handoff: HardwareHandoff,
    config: SystemConfig,
}

impl Overlay for UniversalOverlay {
    fn files(&self) -> &OverlayFiles {
        &self.files
    }

    fn header(&self) -> &BitstreamHeader {
        &self.header
    }

    fn handoff(&self) -> &HardwareHandoff {
        &self.handoff
    }

    fn dma(&self, instance: &str) -> Result<DmaEngine, FpgaxferError> {
        let description = self.handoff.dma(instance)?;
        let device_name = resolve_uio_device(&self.config, instance, description.registers.base)?;
        let device = UioDevice::open(&self.config.uio_class_dir, &device_name)?;
        debug!(
            "{instance} registers at {:#x} through {}",
            description.registers.base,
            device.name()
        );
        let registers: SharedRegisters = Arc::new(Mutex::new(device));
        let max_transfer_len = description
            .max_transfer_len
            .min(self.config.max_transfer_len);

        let channel = |direction: Direction| -> Result<Box<dyn DmaChannel>, FpgaxferError> {
            let mut channel =
                AxiDmaChannel::new(instance, registers.clone(), direction, max_transfer_len);
            channel.start()?;
            Ok(Box::new(channel))
        };
        let send = match description.has_send {
            true => Some(channel(Direction::Send)?),
            false => None,
        };
        let recv = match description.has_recv {
            true => Some(channel(Direction::Recv)?),
            false => None,
        };
        Ok(DmaEngine::new(instance, send, recv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::HeapRegion;
    use tempfile::tempdir;

    fn heap_pool(phys_base: u64) -> BufferPool {
        BufferPool::new(Box::new(HeapRegion::new(phys_base, 0x1000)))
    }

    #[test]
    fn test_pool_is_opened_once() {
        let cell = OnceLock::new();
        let first = pool_or_init(&cell, || Ok(heap_pool(0x1000_0000))).unwrap();
        assert_eq!(first.phys_base().unwrap(), 0x1000_0000);
        let again = pool_or_init(&cell, || panic!("pool opened twice")).unwrap();
        assert_eq!(again.phys_base().unwrap(), 0x1000_0000);
    }

    #[test]
    fn test_pool_opened_concurrently_keeps_the_first() {
        let cell = OnceLock::new();
        let pool = pool_or_init(&cell, || {
            // another caller finishes first while this one is still opening the device
            assert!(cell.set(heap_pool(0x1000_0000)).is_ok());
            Ok(heap_pool(0x2000_0000))
        })
        .unwrap();
        assert_eq!(pool.phys_base().unwrap(), 0x1000_0000);
    }

    #[test]
    fn test_missing_udmabuf_leaves_pool_unopened() {
        let dir = tempdir().unwrap();
        let platform = UniversalPlatform::with_config(SystemConfig {
            udmabuf_class_dir: dir.path().to_path_buf(),
            ..SystemConfig::default()
        });
        let err = platform.pool_stats().unwrap_err();
        assert!(matches!(err, FpgaxferError::IORead { .. }));
        assert!(platform.pool.get().is_none());

        let cell = OnceLock::new();
        assert!(pool_or_init(&cell, || Err(FpgaxferError::Internal("no device".into()))).is_err());
        assert!(pool_or_init(&cell, || Ok(heap_pool(0x3000_0000))).is_ok());
    }
}
