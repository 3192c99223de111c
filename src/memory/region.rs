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

use crate::error::FpgaxferError;
use std::fmt::Debug;

/// A physically contiguous memory window.
///
/// `phys_base` is the bus address the DMA engines see for offset 0. Accessors are bounds
/// checked against `size`.
pub trait MemoryRegion: Debug + Send {
    fn phys_base(&self) -> u64;

    fn size(&self) -> usize;

    fn read(&self, offset: usize, dst: &mut [u8]) -> Result<(), FpgaxferError>;

    fn write(&mut self, offset: usize, src: &[u8]) -> Result<(), FpgaxferError>;
}

pub(crate) fn check_bounds(
    offset: usize,
    len: usize,
    size: usize,
    access: &str,
) -> Result<(), FpgaxferError> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(FpgaxferError::Alloc(format!(
            "Out of bounds {access}: offset={offset:#x}, len={len:#x}, limit={size:#x}"
        ))),
    }
}

/// Ordinary process memory posing as a contiguous region, for the simulated board.
#[derive(Debug)]
pub struct HeapRegion {
    phys_base: u64,
    bytes: Vec<u8>,
}

impl HeapRegion {
    pub fn new(phys_base: u64, size: usize) -> HeapRegion {
        HeapRegion {
            phys_base,
            bytes: vec![0; size],
        }
    }
}

impl MemoryRegion for HeapRegion {
    fn phys_base(&self) -> u64 {
        self.phys_base
    }

    fn size(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self, offset: usize, dst: &mut [u8]) -> Result<(), FpgaxferError> {
        check_bounds(offset, dst.len(), self.bytes.len(), "read")?;
        dst.copy_from_slice(&self.bytes[offset..offset + dst.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, src: &[u8]) -> Result<(), FpgaxferError> {
        check_bounds(offset, src.len(), self.bytes.len(), "write")?;
        self.bytes[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }
}
