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

//! Register-level driver for a Xilinx AXI DMA in simple (direct register) mode.
//!
//! Both channels of an instance live in one register block; MM2S at `0x00`, S2MM at `0x30`,
//! each with the same layout:
//!
//! ```text
//! +0x00  DMACR     control, bit 0 run/stop
//! +0x04  DMASR     status, bit 0 halted, bit 1 idle, bits 4..6 internal/slave/decode error
//! +0x18  ADDR      source (MM2S) or destination (S2MM) address, low word
//! +0x1C  ADDR_MSB  high word, ignored by 32-bit engines
//! +0x28  LENGTH    bytes to move, writing it starts the transfer
//! ```
//!
//! Register access goes through [`RegisterAccess`] so the driver can run against a UIO mapping
//! or against a fake register file in tests.

use crate::dma::{DmaChannel, Direction};
use crate::error::FpgaxferError;
use crate::memory::ScopedBuffer;
use log::{debug, trace};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub const MM2S_OFFSET: usize = 0x00;
pub const S2MM_OFFSET: usize = 0x30;

const DMACR: usize = 0x00;
const DMASR: usize = 0x04;
const ADDR: usize = 0x18;
const ADDR_MSB: usize = 0x1C;
const LENGTH: usize = 0x28;

const DMACR_RS: u32 = 1 << 0;
const DMASR_HALTED: u32 = 1 << 0;
const DMASR_IDLE: u32 = 1 << 1;
const DMASR_INT_ERR: u32 = 1 << 4;
const DMASR_SLV_ERR: u32 = 1 << 5;
const DMASR_DEC_ERR: u32 = 1 << 6;

/// 32-bit register access into a device's register block, by byte offset.
pub trait RegisterAccess: fmt::Debug + Send {
    fn read_u32(&self, offset: usize) -> Result<u32, FpgaxferError>;

    fn write_u32(&mut self, offset: usize, value: u32) -> Result<(), FpgaxferError>;
}

/// One register block shared by the send and receive channel of an instance.
pub type SharedRegisters = Arc<Mutex<dyn RegisterAccess>>;

fn check_status(label: &str, status: u32) -> Result<(), FpgaxferError> {
    let kind = if status & DMASR_INT_ERR != 0 {
        "internal"
    } else if status & DMASR_SLV_ERR != 0 {
        "slave"
    } else if status & DMASR_DEC_ERR != 0 {
        "decode"
    } else {
        return Ok(());
    };
    Err(FpgaxferError::Dma(format!(
        "{label}: DMA {kind} error (DMASR {status:#010x})"
    )))
}

#[derive(Debug)]
pub struct AxiDmaChannel {
    label: String,
    registers: SharedRegisters,
    base: usize,
    direction: Direction,
    max_transfer_len: usize,
    timeout: Option<Duration>,
    started: bool,
}

impl AxiDmaChannel {
    pub fn new(
        name: &str,
        registers: SharedRegisters,
        direction: Direction,
        max_transfer_len: usize,
    ) -> AxiDmaChannel {
        let base = match direction {
            Direction::Send => MM2S_OFFSET,
            Direction::Recv => S2MM_OFFSET,
        };
        AxiDmaChannel {
            label: format!("{name} {direction}"),
            registers,
            base,
            direction,
            max_transfer_len,
            timeout: None,
            started: false,
        }
    }

    /// Give up polling in [`start`](Self::start) and [`wait`](DmaChannel::wait) after
    /// `timeout`. Without one they poll until the hardware answers.
    pub fn with_timeout(mut self, timeout: Duration) -> AxiDmaChannel {
        self.timeout = Some(timeout);
        self
    }

    fn expired(&self, started_at: Instant) -> bool {
        self.timeout.is_some_and(|t| started_at.elapsed() > t)
    }

    fn lock(&self) -> Result<MutexGuard<'_, dyn RegisterAccess + 'static>, FpgaxferError> {
        self.registers.lock().map_err(|e| {
            FpgaxferError::Internal(format!("Failed to lock registers of {}: {e}", self.label))
        })
    }

    fn read(&self, register: usize) -> Result<u32, FpgaxferError> {
        self.lock()?.read_u32(self.base + register)
    }

    fn write(&self, register: usize, value: u32) -> Result<(), FpgaxferError> {
        trace!("{}: write {value:#010x} to {:#04x}", self.label, self.base + register);
        self.lock()?.write_u32(self.base + register, value)
    }

    pub fn running(&self) -> Result<bool, FpgaxferError> {
        Ok(self.read(DMASR)? & DMASR_HALTED == 0)
    }

    /// Set run/stop and wait for the channel to leave the halted state.
    pub fn start(&mut self) -> Result<(), FpgaxferError> {
        self.write(DMACR, DMACR_RS)?;
        let started_at = Instant::now();
        while !self.running()? {
            if self.expired(started_at) {
                return Err(FpgaxferError::Dma(format!(
                    "{} did not leave the halted state within {:?}",
                    self.label,
                    started_at.elapsed()
                )));
            }
            std::hint::spin_loop();
        }
        self.started = false;
        debug!("{} running", self.label);
        Ok(())
    }
}

impl DmaChannel for AxiDmaChannel {
    fn direction(&self) -> Direction {
        self.direction
    }

    fn transfer(&mut self, buffer: &ScopedBuffer) -> Result<(), FpgaxferError> {
        if !self.running()? {
            return Err(FpgaxferError::Dma(format!(
                "{} is halted, start the channel first",
                self.label
            )));
        }
        // the idle bit only becomes meaningful once a transfer has completed
        if self.started && !self.idle()? {
            return Err(FpgaxferError::Dma(format!(
                "{} is still busy with the previous transfer",
                self.label
            )));
        }
        let len = buffer.byte_len();
        if len > self.max_transfer_len {
            return Err(FpgaxferError::Dma(format!(
                "{}: transfer of {len} bytes exceeds the {} byte limit",
                self.label, self.max_transfer_len
            )));
        }
        let len_word = u32::try_from(len).map_err(|_| {
            FpgaxferError::Dma(format!("{}: {len} bytes does not fit LENGTH", self.label))
        })?;
        let phys = buffer.physical_address();
        self.write(ADDR, phys as u32)?;
        self.write(ADDR_MSB, (phys >> 32) as u32)?;
        self.write(LENGTH, len_word)?;
        self.started = true;
        debug!("{}: started {len} byte transfer at {phys:#x}", self.label);
        Ok(())
    }

    fn wait(&mut self) -> Result<(), FpgaxferError> {
        if !self.started {
            return Err(FpgaxferError::Dma(format!(
                "no transfer has been started on {}",
                self.label
            )));
        }
        if !self.running()? {
            return Err(FpgaxferError::Dma(format!("{} is halted", self.label)));
        }
        let started_at = Instant::now();
        loop {
            let status = self.read(DMASR)?;
            check_status(&self.label, status)?;
            if status & DMASR_IDLE != 0 {
                break;
            }
            if self.expired(started_at) {
                return Err(FpgaxferError::Dma(format!(
                    "{}: transfer did not complete after {:?} (DMASR {status:#010x})",
                    self.label,
                    started_at.elapsed()
                )));
            }
            std::hint::spin_loop();
        }
        trace!("{}: transfer complete", self.label);
        Ok(())
    }

    fn idle(&self) -> Result<bool, FpgaxferError> {
        Ok(self.read(DMASR)? & DMASR_IDLE != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{BufferPool, ElementType, HeapRegion, Shape};
    use std::collections::HashMap;

    /// Register file that halts until run/stop is set and completes every transfer at once,
    /// unless `complete` is false.
    #[derive(Debug)]
    struct FakeRegisters {
        regs: HashMap<usize, u32>,
        writes: Vec<(usize, u32)>,
        complete: bool,
        error_bits: u32,
    }

    impl FakeRegisters {
        fn new() -> FakeRegisters {
            let mut regs = HashMap::new();
            regs.insert(MM2S_OFFSET + DMASR, DMASR_HALTED);
            regs.insert(S2MM_OFFSET + DMASR, DMASR_HALTED);
            FakeRegisters {
                regs,
                writes: Vec::new(),
                complete: true,
                error_bits: 0,
            }
        }
    }

    impl RegisterAccess for FakeRegisters {
        fn read_u32(&self, offset: usize) -> Result<u32, FpgaxferError> {
            Ok(self.regs.get(&offset).copied().unwrap_or(0))
        }

        fn write_u32(&mut self, offset: usize, value: u32) -> Result<(), FpgaxferError> {
            self.writes.push((offset, value));
            self.regs.insert(offset, value);
            let base = offset / S2MM_OFFSET * S2MM_OFFSET;
            let status = self.regs.entry(base + DMASR).or_insert(0);
            if offset == base + DMACR && value & DMACR_RS != 0 {
                *status &= !DMASR_HALTED;
            }
            if offset == base + LENGTH {
                *status &= !DMASR_IDLE;
                if self.complete {
                    *status |= DMASR_IDLE;
                }
                *status |= self.error_bits;
            }
            Ok(())
        }
    }

    fn setup(fake: FakeRegisters) -> (Arc<Mutex<FakeRegisters>>, SharedRegisters, BufferPool) {
        let fake = Arc::new(Mutex::new(fake));
        let shared: SharedRegisters = fake.clone();
        let pool = BufferPool::new(Box::new(HeapRegion::new(0x1_2000_0000, 4096)));
        (fake, shared, pool)
    }

    #[test]
    fn test_transfer_programs_channel_registers() {
        let (fake, shared, pool) = setup(FakeRegisters::new());
        let mut send = AxiDmaChannel::new("axi_dma_0", shared.clone(), Direction::Send, 1 << 20);
        let mut recv = AxiDmaChannel::new("axi_dma_0", shared, Direction::Recv, 1 << 20);
        send.start().unwrap();
        recv.start().unwrap();

        let input = pool.allocate(Shape::from([28, 28]), ElementType::U8).unwrap();
        let output = pool.allocate(Shape::from([26, 26]), ElementType::U8).unwrap();
        recv.transfer(&output).unwrap();
        send.transfer(&input).unwrap();
        send.wait().unwrap();
        recv.wait().unwrap();

        let writes = fake.lock().unwrap().writes.clone();
        assert_eq!(
            writes,
            vec![
                (0x00, DMACR_RS),
                (0x30, DMACR_RS),
                (0x48, 0x2000_0340),
                (0x4C, 0x1),
                (0x58, 676),
                (0x18, 0x2000_0000),
                (0x1C, 0x1),
                (0x28, 784),
            ]
        );
        assert!(send.idle().unwrap());
    }

    #[test]
    fn test_wait_without_transfer_fails() {
        let (_fake, shared, _pool) = setup(FakeRegisters::new());
        let mut send = AxiDmaChannel::new("axi_dma_1", shared, Direction::Send, 1 << 20);
        send.start().unwrap();
        let err = send.wait().unwrap_err();
        assert!(err.to_string().contains("no transfer has been started on axi_dma_1 send"));
    }

    #[test]
    fn test_transfer_on_halted_channel_fails() {
        let (_fake, shared, pool) = setup(FakeRegisters::new());
        let mut send = AxiDmaChannel::new("axi_dma_1", shared, Direction::Send, 1 << 20);
        let buf = pool.allocate(Shape::from([16]), ElementType::U8).unwrap();
        assert!(send.transfer(&buf).unwrap_err().to_string().contains("halted"));
    }

    #[test]
    fn test_transfer_longer_than_limit_fails() {
        let (fake, shared, pool) = setup(FakeRegisters::new());
        let mut send = AxiDmaChannel::new("axi_dma_0", shared, Direction::Send, 512);
        send.start().unwrap();
        let buf = pool.allocate(Shape::from([28, 28]), ElementType::U8).unwrap();
        let err = send.transfer(&buf).unwrap_err();
        assert!(err.to_string().contains("exceeds the 512 byte limit"));
        assert!(!fake.lock().unwrap().writes.iter().any(|(reg, _)| *reg == LENGTH));
    }

    #[test]
    fn test_error_bits_are_reported_by_wait() {
        let mut fake = FakeRegisters::new();
        fake.error_bits = DMASR_SLV_ERR;
        let (_fake, shared, pool) = setup(fake);
        let mut recv = AxiDmaChannel::new("axi_dma_0", shared, Direction::Recv, 1 << 20);
        recv.start().unwrap();
        let buf = pool.allocate(Shape::from([26, 26]), ElementType::U8).unwrap();
        recv.transfer(&buf).unwrap();
        let err = recv.wait().unwrap_err();
        assert!(err.to_string().contains("DMA slave error"));
    }

    #[test]
    fn test_busy_channel_rejects_transfer_and_wait_times_out() {
        let mut fake = FakeRegisters::new();
        fake.complete = false;
        let (_fake, shared, pool) = setup(fake);
        let mut send = AxiDmaChannel::new("axi_dma_0", shared, Direction::Send, 1 << 20)
            .with_timeout(Duration::from_millis(10));
        send.start().unwrap();
        let buf = pool.allocate(Shape::from([16]), ElementType::U8).unwrap();
        send.transfer(&buf).unwrap();
        assert!(send.transfer(&buf).unwrap_err().to_string().contains("still busy"));
        assert!(send.wait().unwrap_err().to_string().contains("did not complete"));
    }
}
