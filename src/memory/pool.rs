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

//! First-fit allocator over a contiguous [`MemoryRegion`].
//!
//! Blocks are 64-byte aligned (cache line and AXI burst friendly). Free blocks are kept sorted
//! by offset and merged with their neighbours on release, so a pool used for a fixed sequence
//! of allocate/release rounds never fragments.
//!
//! The pool is shared (`Arc<Mutex<..>>`) between the buffers it hands out and, on the simulated
//! board, the DMA engines that move data by physical address.

use crate::error::FpgaxferError;
use crate::memory::buffer::{ElementType, ScopedBuffer, Shape};
use crate::memory::region::MemoryRegion;
use log::{debug, trace};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub const BLOCK_ALIGN: usize = 64;

/// Counters for allocation/release parity checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub allocations: usize,
    pub releases: usize,
    pub live_buffers: usize,
    pub bytes_in_use: usize,
    pub peak_bytes: usize,
}

#[derive(Debug)]
struct PoolInner {
    region: Box<dyn MemoryRegion>,
    /// offset -> length of each free block
    free: BTreeMap<usize, usize>,
    /// offset -> length of each allocated block
    live: BTreeMap<usize, usize>,
    stats: PoolStats,
}

impl PoolInner {
    fn take_first_fit(&mut self, len: usize) -> Option<usize> {
        let (&offset, &block_len) = self.free.iter().find(|(_, block)| **block >= len)?;
        self.free.remove(&offset);
        if block_len > len {
            self.free.insert(offset + len, block_len - len);
        }
        Some(offset)
    }

    fn give_back(&mut self, mut offset: usize, mut len: usize) {
        if let Some((&prev_offset, &prev_len)) = self.free.range(..offset).next_back() {
            if prev_offset + prev_len == offset {
                self.free.remove(&prev_offset);
                offset = prev_offset;
                len += prev_len;
            }
        }
        if let Some(&next_len) = self.free.get(&(offset + len)) {
            self.free.remove(&(offset + len));
            len += next_len;
        }
        self.free.insert(offset, len);
    }

    /// Region offset of `[phys, phys + len)` if it lies inside one allocated block.
    fn live_offset(&self, phys: u64, len: usize) -> Result<usize, FpgaxferError> {
        let base = self.region.phys_base();
        let offset = phys
            .checked_sub(base)
            .and_then(|o| usize::try_from(o).ok())
            .ok_or_else(|| {
                FpgaxferError::Dma(format!("address {phys:#x} is below the region at {base:#x}"))
            })?;
        match self.live.range(..=offset).next_back() {
            Some((&block, &block_len)) if offset + len <= block + block_len => Ok(offset),
            _ => Err(FpgaxferError::Dma(format!(
                "{len} bytes at {phys:#x} are not inside an allocated buffer"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BufferPool {
    inner: Arc<Mutex<PoolInner>>,
}

fn round_up(len: usize) -> Option<usize> {
    len.checked_add(BLOCK_ALIGN - 1)
        .map(|l| l / BLOCK_ALIGN * BLOCK_ALIGN)
}

impl BufferPool {
    pub fn new(region: Box<dyn MemoryRegion>) -> BufferPool {
        let size = region.size() / BLOCK_ALIGN * BLOCK_ALIGN;
        debug!(
            "New buffer pool of {size} bytes at {:#x}",
            region.phys_base()
        );
        let mut free = BTreeMap::new();
        if size > 0 {
            free.insert(0, size);
        }
        BufferPool {
            inner: Arc::new(Mutex::new(PoolInner {
                region,
                free,
                live: BTreeMap::new(),
                stats: PoolStats::default(),
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, PoolInner>, FpgaxferError> {
        self.inner
            .lock()
            .map_err(|e| FpgaxferError::Internal(format!("Failed to lock buffer pool: {e}")))
    }

    /// Allocate a buffer of `shape` elements of `dtype`.
    ///
    /// # Returns: `Result<ScopedBuffer, FpgaxferError>`
    /// * `Ok(ScopedBuffer)` - Zeroed buffer, released when dropped
    /// * `Err(FpgaxferError::Alloc)` - Empty shape or not enough contiguous space left
    pub fn allocate(
        &self,
        shape: Shape,
        dtype: ElementType,
    ) -> Result<ScopedBuffer, FpgaxferError> {
        let byte_len = shape
            .len()
            .checked_mul(dtype.size())
            .filter(|len| *len > 0)
            .ok_or_else(|| {
                FpgaxferError::Alloc(format!("cannot allocate a {dtype} buffer of shape {shape}"))
            })?;
        let block_len = round_up(byte_len)
            .ok_or_else(|| FpgaxferError::Alloc(format!("{byte_len} bytes is too large")))?;

        let mut inner = self.lock()?;
        let offset = inner.take_first_fit(block_len).ok_or_else(|| {
            FpgaxferError::Alloc(format!(
                "no contiguous block of {block_len} bytes left ({} of {} bytes in use)",
                inner.stats.bytes_in_use,
                inner.region.size()
            ))
        })?;
        inner.region.write(offset, &vec![0; block_len])?;
        inner.live.insert(offset, block_len);
        inner.stats.allocations += 1;
        inner.stats.live_buffers += 1;
        inner.stats.bytes_in_use += block_len;
        inner.stats.peak_bytes = inner.stats.peak_bytes.max(inner.stats.bytes_in_use);
        let phys = inner.region.phys_base() + offset as u64;
        drop(inner);

        debug!("Allocated {dtype} buffer of shape {shape} at {phys:#x}");
        Ok(ScopedBuffer::new(self.clone(), offset, phys, shape, dtype))
    }

    pub(crate) fn release(&self, offset: usize) -> Result<(), FpgaxferError> {
        let mut inner = self.lock()?;
        let len = inner.live.remove(&offset).ok_or_else(|| {
            FpgaxferError::Internal(format!("double release of buffer at offset {offset:#x}"))
        })?;
        inner.give_back(offset, len);
        inner.stats.releases += 1;
        inner.stats.live_buffers -= 1;
        inner.stats.bytes_in_use -= len;
        trace!("Released {len} bytes at offset {offset:#x}");
        Ok(())
    }

    pub(crate) fn read(&self, offset: usize, dst: &mut [u8]) -> Result<(), FpgaxferError> {
        self.lock()?.region.read(offset, dst)
    }

    pub(crate) fn write(&self, offset: usize, src: &[u8]) -> Result<(), FpgaxferError> {
        self.lock()?.region.write(offset, src)
    }

    /// Read by bus address, the way a DMA engine sees the memory.
    pub fn read_phys(&self, phys: u64, dst: &mut [u8]) -> Result<(), FpgaxferError> {
        let inner = self.lock()?;
        let offset = inner.live_offset(phys, dst.len())?;
        inner.region.read(offset, dst)
    }

    /// Write by bus address, the way a DMA engine sees the memory.
    pub fn write_phys(&self, phys: u64, src: &[u8]) -> Result<(), FpgaxferError> {
        let mut inner = self.lock()?;
        let offset = inner.live_offset(phys, src.len())?;
        inner.region.write(offset, src)
    }

    pub fn stats(&self) -> Result<PoolStats, FpgaxferError> {
        Ok(self.lock()?.stats)
    }

    pub fn phys_base(&self) -> Result<u64, FpgaxferError> {
        Ok(self.lock()?.region.phys_base())
    }
}
