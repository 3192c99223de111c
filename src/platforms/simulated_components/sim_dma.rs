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

use crate::dma::{DmaChannel, Direction};
use crate::error::FpgaxferError;
use crate::memory::ScopedBuffer;
use crate::platforms::simulated_components::board::{SharedBoard, lock_board};

/// One direction of a DMA instance on the simulated board.
#[derive(Debug)]
pub struct SimDmaChannel {
    board: SharedBoard,
    dma: String,
    direction: Direction,
    max_transfer_len: usize,
}

impl SimDmaChannel {
    pub fn new(
        board: SharedBoard,
        dma: &str,
        direction: Direction,
        max_transfer_len: usize,
    ) -> SimDmaChannel {
        SimDmaChannel {
            board,
            dma: dma.to_owned(),
            direction,
            max_transfer_len,
        }
    }
}

impl DmaChannel for SimDmaChannel {
    fn direction(&self) -> Direction {
        self.direction
    }

    fn transfer(&mut self, buffer: &ScopedBuffer) -> Result<(), FpgaxferError> {
        let len = buffer.byte_len();
        if len > self.max_transfer_len {
            return Err(FpgaxferError::Dma(format!(
                "{} {}: transfer of {len} bytes exceeds the {} byte limit",
                self.dma, self.direction, self.max_transfer_len
            )));
        }
        lock_board(&self.board)?.start(
            &self.dma,
            self.direction,
            buffer.physical_address(),
            len,
        )
    }

    fn wait(&mut self) -> Result<(), FpgaxferError> {
        lock_board(&self.board)?.wait(&self.dma, self.direction)
    }

    fn idle(&self) -> Result<bool, FpgaxferError> {
        Ok(lock_board(&self.board)?.idle(&self.dma, self.direction))
    }
}
