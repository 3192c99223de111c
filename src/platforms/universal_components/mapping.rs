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

//! Shared memory mappings of device files.
//!
//! Both UIO register windows and u-dma-buf regions are reached by `mmap`ing a character device.
//! [`MappedFile`] owns the mapping and the file, unmaps on drop, and does every access through
//! volatile reads and writes so the compiler can neither elide nor merge them.

use crate::error::FpgaxferError;
use crate::memory::region::check_bounds;
use log::{debug, error, trace};
use rustix::fs::OFlags;
use rustix::mm::{MapFlags, ProtFlags, mmap, munmap};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

#[derive(Debug)]
pub struct MappedFile {
    ptr: NonNull<u8>,
    size: usize,
    path: PathBuf,
    _file: File,
}

// SAFETY: the mapping is owned by this struct and only reached through `&self`/`&mut self`
// methods, so moving it to another thread moves the only handle to it.
unsafe impl Send for MappedFile {}

impl MappedFile {
    /// Map `size` bytes of `path` starting at `offset`, read/write and shared.
    ///
    /// With `sync` the device is opened `O_SYNC`, which u-dma-buf takes as the request for an
    /// uncached mapping.
    pub fn map(
        path: &Path,
        offset: u64,
        size: usize,
        sync: bool,
    ) -> Result<MappedFile, FpgaxferError> {
        if size == 0 {
            return Err(FpgaxferError::Mmap {
                file: path.into(),
                reason: "mapping size is 0".into(),
            });
        }
        let mut options = OpenOptions::new();
        options.read(true).write(true);
        if sync {
            options.custom_flags(OFlags::SYNC.bits() as i32);
        }
        let file = options.open(path).map_err(|e| FpgaxferError::IORead {
            file: path.into(),
            e,
        })?;

        // SAFETY: a fresh shared mapping of a device file we hold open; nothing else in the
        // process aliases it.
        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                offset,
            )
        }
        .map_err(|e| FpgaxferError::Mmap {
            file: path.into(),
            reason: e.to_string(),
        })?;
        let ptr = NonNull::new(addr.cast::<u8>()).ok_or_else(|| FpgaxferError::Mmap {
            file: path.into(),
            reason: "mmap returned a null pointer".into(),
        })?;

        debug!("Mapped {size:#x} bytes of {path:?} at {ptr:p}");
        Ok(MappedFile {
            ptr,
            size,
            path: path.into(),
            _file: file,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn read_u32(&self, offset: usize) -> Result<u32, FpgaxferError> {
        check_bounds(offset, 4, self.size, "register read")?;
        // SAFETY: bounds checked above; register offsets are word aligned.
        #[allow(clippy::cast_ptr_alignment)]
        let value = unsafe { self.ptr.as_ptr().add(offset).cast::<u32>().read_volatile() };
        trace!("{:?}: read {value:#010x} @ {offset:#x}", self.path);
        Ok(value)
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) -> Result<(), FpgaxferError> {
        check_bounds(offset, 4, self.size, "register write")?;
        trace!("{:?}: write {value:#010x} @ {offset:#x}", self.path);
        // SAFETY: bounds checked above; register offsets are word aligned.
        unsafe {
            self.ptr
                .as_ptr()
                .add(offset)
                .cast::<u32>()
                .write_volatile(value);
        }
        Ok(())
    }

    pub fn read_bytes(&self, offset: usize, dst: &mut [u8]) -> Result<(), FpgaxferError> {
        check_bounds(offset, dst.len(), self.size, "read")?;
        for (i, byte) in dst.iter_mut().enumerate() {
            // SAFETY: offset + i < size, checked above.
            *byte = unsafe { self.ptr.as_ptr().add(offset + i).read_volatile() };
        }
        Ok(())
    }

    pub fn write_bytes(&mut self, offset: usize, src: &[u8]) -> Result<(), FpgaxferError> {
        check_bounds(offset, src.len(), self.size, "write")?;
        for (i, byte) in src.iter().enumerate() {
            // SAFETY: offset + i < size, checked above.
            unsafe { self.ptr.as_ptr().add(offset + i).write_volatile(*byte) };
        }
        Ok(())
    }
}

impl Drop for MappedFile {
    fn drop(&mut self) {
        // SAFETY: ptr and size are exactly what mmap returned and was asked for.
        if let Err(e) = unsafe { munmap(self.ptr.as_ptr().cast(), self.size) } {
            error!("Failed to unmap {:?}: {e}", self.path);
        }
    }
}
