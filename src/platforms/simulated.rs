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

//! Simulated platform.
//!
//! Runs an overlay without an FPGA. The bitstream and handoff files are parsed and validated
//! exactly as on hardware, but "programming" only resets an in-process board: a heap region
//! stands in for contiguous memory, the DMA engines named in the handoff file move bytes
//! through it by physical address, and an [`Accelerator`] model sits behind the control and
//! data engines (see [`SimWiring`]).
//!
//! Every transfer is recorded as a [`SimEvent`], which is what the tests assert on.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use fpgaxfer::platforms::simulated::SimulatedPlatform;
//! # use fpgaxfer::platforms::platform::Platform;
//! # fn example() -> Result<(), fpgaxfer::error::FpgaxferError> {
//! let platform = SimulatedPlatform::new();
//! let overlay = platform.load_overlay("tests/test_data/design.bit".as_ref())?;
//! println!("{:?}", overlay.ip_names());
//! println!("{:?}", platform.events()?);
//! # Ok(())
//! # }
//! ```
//!
//! [`Accelerator`]: crate::platforms::simulated_components::accelerator::Accelerator

use crate::dma::{DmaChannel, DmaEngine, Direction};
use crate::error::FpgaxferError;
use crate::memory::{BufferPool, ElementType, HeapRegion, PoolStats, ScopedBuffer, Shape};
use crate::overlay::OverlayFiles;
use crate::overlay::bitfile::{Bitstream, BitstreamHeader};
use crate::overlay::hwh::HardwareHandoff;
use crate::platforms::platform::{Overlay, Platform};
use crate::platforms::simulated_components::board::{SharedBoard, SimBoard, lock_board};
pub use crate::platforms::simulated_components::board::{SimEvent, SimWiring};
use crate::platforms::simulated_components::sim_dma::SimDmaChannel;
use fpgaxfer_macros::platform;
use log::{debug, info, trace};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Bus address the simulated contiguous region pretends to start at.
pub const SIM_PHYS_BASE: u64 = 0x1800_0000;
pub const SIM_REGION_SIZE: usize = 1 << 20;

#[platform(compat_string = "simulated")]
#[derive(Debug)]
pub struct SimulatedPlatform {
    pool: BufferPool,
    board: SharedBoard,
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        Self::with_wiring(SimWiring::default())
    }

    pub fn with_wiring(wiring: SimWiring) -> Self {
        trace!("creating new simulated platform wired as {wiring:?}");
        let pool = BufferPool::new(Box::new(HeapRegion::new(SIM_PHYS_BASE, SIM_REGION_SIZE)));
        let board = Arc::new(Mutex::new(SimBoard::new(pool.clone(), wiring)));
        SimulatedPlatform { pool, board }
    }

    /// Everything that happened on the board so far.
    pub fn events(&self) -> Result<Vec<SimEvent>, FpgaxferError> {
        Ok(lock_board(&self.board)?.events().to_vec())
    }
}

impl Platform for SimulatedPlatform {
    fn load_overlay(&self, bitstream: &Path) -> Result<Box<dyn Overlay>, FpgaxferError> {
        let files = OverlayFiles::locate(bitstream)?;
        let bit = Bitstream::from_file(&files.bitstream)?;
        // same check the FPGA manager path makes before programming
        let bin = bit.to_bin()?;
        let handoff = HardwareHandoff::from_file(&files.handoff)?;
        debug!(
            "Simulating load of {} bytes of configuration data for {}",
            bin.len(),
            bit.header.part
        );

        lock_board(&self.board)?.reset(&bit.header.design);
        info!(
            "Loaded overlay '{}' on the simulated board from {:?}",
            bit.header.design, files.bitstream
        );
        Ok(Box::new(SimulatedOverlay {
            files,
            header: bit.header,
            handoff,
            board: self.board.clone(),
        }))
    }

    fn allocate(&self, shape: Shape, dtype: ElementType) -> Result<ScopedBuffer, FpgaxferError> {
        self.pool.allocate(shape, dtype)
    }

    fn pool_stats(&self) -> Result<PoolStats, FpgaxferError> {
        self.pool.stats()
    }
}

#[derive(Debug)]
pub struct SimulatedOverlay {
    files: OverlayFiles,
    header: BitstreamHeader,
    handoff: HardwareHandoff,
    board: SharedBoard,
}

impl Overlay for SimulatedOverlay {
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
        let channel = |direction: Direction| -> Box<dyn DmaChannel> {
            Box::new(SimDmaChannel::new(
                self.board.clone(),
                instance,
                direction,
                description.max_transfer_len,
            ))
        };
        let send = description.has_send.then(|| channel(Direction::Send));
        let recv = description.has_recv.then(|| channel(Direction::Recv));
        debug!(
            "Simulated DMA {instance} at {:#x} (send: {}, recv: {})",
            description.registers.base,
            send.is_some(),
            recv.is_some()
        );
        Ok(DmaEngine::new(instance, send, recv))
    }
}
