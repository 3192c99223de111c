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

//! DMA engines and their channels.
//!
//! An AXI DMA instance has up to two independent channels: the send channel (MM2S) reads a
//! buffer and streams it to the fabric, the receive channel (S2MM) writes whatever the fabric
//! streams back into a buffer. Each channel runs one transfer at a time; [`DmaChannel::wait`]
//! blocks until it is idle again.
//!
//! [`DmaEngine`] is what an overlay hands out for a DMA instance. The channels behind it are
//! either the register driver in [`axi_dma`] or the simulated board's model.

pub mod axi_dma;

use crate::error::FpgaxferError;
use crate::memory::ScopedBuffer;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Memory to stream (MM2S)
    Send,
    /// Stream to memory (S2MM)
    Recv,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Send => f.write_str("send"),
            Direction::Recv => f.write_str("recv"),
        }
    }
}

pub trait DmaChannel: fmt::Debug {
    fn direction(&self) -> Direction;

    /// Start moving `buffer`. Returns as soon as the transfer is started.
    ///
    /// # Returns: `Result<(), FpgaxferError>`
    /// * `Ok(())` - The transfer is in flight
    /// * `Err(FpgaxferError::Dma)` - The channel is halted, still busy with an earlier
    ///   transfer, or the buffer is longer than the channel can move in one go
    fn transfer(&mut self, buffer: &ScopedBuffer) -> Result<(), FpgaxferError>;

    /// Block until the transfer started last has completed.
    ///
    /// # Returns: `Result<(), FpgaxferError>`
    /// * `Ok(())` - The channel is idle and the data has landed
    /// * `Err(FpgaxferError::Dma)` - No transfer was started, or the engine reported an error
    fn wait(&mut self) -> Result<(), FpgaxferError>;

    fn idle(&self) -> Result<bool, FpgaxferError>;
}

/// A DMA instance from the overlay, by name, with whichever channels it was built with.
#[derive(Debug)]
pub struct DmaEngine {
    name: String,
    send: Option<Box<dyn DmaChannel>>,
    recv: Option<Box<dyn DmaChannel>>,
}

impl DmaEngine {
    pub fn new(
        name: &str,
        send: Option<Box<dyn DmaChannel>>,
        recv: Option<Box<dyn DmaChannel>>,
    ) -> DmaEngine {
        DmaEngine {
            name: name.to_owned(),
            send,
            recv,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sendchannel(&mut self) -> Result<&mut dyn DmaChannel, FpgaxferError> {
        match self.send.as_deref_mut() {
            Some(channel) => Ok(channel),
            None => Err(FpgaxferError::Argument(format!(
                "DMA '{}' was built without a send channel",
                self.name
            ))),
        }
    }

    pub fn recvchannel(&mut self) -> Result<&mut dyn DmaChannel, FpgaxferError> {
        match self.recv.as_deref_mut() {
            Some(channel) => Ok(channel),
            None => Err(FpgaxferError::Argument(format!(
                "DMA '{}' was built without a receive channel",
                self.name
            ))),
        }
    }

    pub fn send(&mut self, buffer: &ScopedBuffer) -> Result<(), FpgaxferError> {
        self.sendchannel()?.transfer(buffer)
    }

    pub fn receive_into(&mut self, buffer: &ScopedBuffer) -> Result<(), FpgaxferError> {
        self.recvchannel()?.transfer(buffer)
    }

    pub fn wait_send(&mut self) -> Result<(), FpgaxferError> {
        self.sendchannel()?.wait()
    }

    pub fn wait_recv(&mut self) -> Result<(), FpgaxferError> {
        self.recvchannel()?.wait()
    }
}
