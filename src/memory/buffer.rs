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
use crate::memory::pool::BufferPool;
use log::{error, trace};
use std::fmt;

/// Element types a buffer can be allocated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
}

impl ElementType {
    pub fn size(self) -> usize {
        match self {
            ElementType::U8 | ElementType::I8 => 1,
            ElementType::U16 | ElementType::I16 => 2,
            ElementType::U32 | ElementType::I32 | ElementType::F32 => 4,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::U8 => "uint8",
            ElementType::I8 => "int8",
            ElementType::U16 => "uint16",
            ElementType::I16 => "int16",
            ElementType::U32 => "uint32",
            ElementType::I32 => "int32",
            ElementType::F32 => "float32",
        };
        f.write_str(name)
    }
}

/// A Rust scalar that can be copied in and out of a buffer, little endian.
pub trait Element: Copy + Default {
    const DTYPE: ElementType;

    fn write_le(self, out: &mut [u8]);

    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: ElementType = ElementType::$dtype;

                fn write_le(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_element!(u8 => U8, i8 => I8, u16 => U16, i16 => I16, u32 => U32, i32 => I32, f32 => F32);

/// Dimensions of a buffer, row major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.0.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape(dims.to_vec())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [single] => write!(f, "({single},)"),
            dims => {
                let joined: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
                write!(f, "({})", joined.join(", "))
            }
        }
    }
}

/// A block of DMA-able memory with a shape and an element type.
///
/// The block goes back to its pool when the buffer is dropped or [`released`](Self::release),
/// whichever comes first, so a failure between allocation and the end of a transfer sequence
/// does not leak contiguous memory.
#[derive(Debug)]
pub struct ScopedBuffer {
    pool: BufferPool,
    offset: usize,
    phys: u64,
    shape: Shape,
    dtype: ElementType,
    released: bool,
}

impl ScopedBuffer {
    pub(crate) fn new(
        pool: BufferPool,
        offset: usize,
        phys: u64,
        shape: Shape,
        dtype: ElementType,
    ) -> ScopedBuffer {
        ScopedBuffer {
            pool,
            offset,
            phys,
            shape,
            dtype,
            released: false,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.shape.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }

    /// Number of bytes a DMA transfer of this buffer moves.
    pub fn byte_len(&self) -> usize {
        self.shape.len() * self.dtype.size()
    }

    /// Bus address of the first element.
    pub fn physical_address(&self) -> u64 {
        self.phys
    }

    fn check_access<T: Element>(&self, len: usize) -> Result<(), FpgaxferError> {
        if T::DTYPE != self.dtype {
            return Err(FpgaxferError::Shape(format!(
                "buffer holds {} but {} was given",
                self.dtype,
                T::DTYPE
            )));
        }
        if len != self.len() {
            return Err(FpgaxferError::Shape(format!(
                "buffer of shape {} holds {} elements, got {len}",
                self.shape,
                self.len()
            )));
        }
        Ok(())
    }

    /// Copy `src` into the buffer. `src` must match the element type and element count.
    pub fn copy_from_slice<T: Element>(&mut self, src: &[T]) -> Result<(), FpgaxferError> {
        self.check_access::<T>(src.len())?;
        let size = self.dtype.size();
        let mut bytes = vec![0u8; self.byte_len()];
        for (value, out) in src.iter().zip(bytes.chunks_exact_mut(size)) {
            value.write_le(out);
        }
        trace!("Copying {} bytes into buffer at {:#x}", bytes.len(), self.phys);
        self.pool.write(self.offset, &bytes)
    }

    /// Copy the buffer's contents out into `dst`.
    pub fn copy_to_slice<T: Element>(&self, dst: &mut [T]) -> Result<(), FpgaxferError> {
        self.check_access::<T>(dst.len())?;
        let size = self.dtype.size();
        let mut bytes = vec![0u8; self.byte_len()];
        self.pool.read(self.offset, &mut bytes)?;
        for (value, raw) in dst.iter_mut().zip(bytes.chunks_exact(size)) {
            *value = T::read_le(raw);
        }
        Ok(())
    }

    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, FpgaxferError> {
        let mut out = vec![T::default(); self.len()];
        self.copy_to_slice(&mut out)?;
        Ok(out)
    }

    /// Return the block to the pool now instead of at drop.
    pub fn release(mut self) -> Result<(), FpgaxferError> {
        self.released = true;
        self.pool.release(self.offset)
    }
}

impl Drop for ScopedBuffer {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.pool.release(self.offset) {
            error!("Failed to release buffer at {:#x}: {e}", self.phys);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::region::HeapRegion;

    fn pool() -> BufferPool {
        BufferPool::new(Box::new(HeapRegion::new(0x2000_0000, 8192)))
    }

    #[test]
    fn test_shape_display_and_len() {
        assert_eq!(Shape::from([16]).to_string(), "(16,)");
        assert_eq!(Shape::from([28, 28]).to_string(), "(28, 28)");
        assert_eq!(Shape::from([26, 26]).len(), 676);
        assert!(Shape::from([3, 0]).is_empty());
    }

    #[test]
    fn test_typed_copy_in_and_out() {
        let pool = pool();
        let mut buf = pool.allocate(Shape::from([2, 2]), ElementType::I16).unwrap();
        assert_eq!(buf.byte_len(), 8);
        buf.copy_from_slice(&[-1i16, 2, -3, 4]).unwrap();
        assert_eq!(buf.to_vec::<i16>().unwrap(), vec![-1, 2, -3, 4]);
    }

    #[test]
    fn test_new_buffers_are_zeroed() {
        let pool = pool();
        let mut first = pool.allocate(Shape::from([16]), ElementType::U8).unwrap();
        first.copy_from_slice(&[0xFFu8; 16]).unwrap();
        drop(first);
        let second = pool.allocate(Shape::from([16]), ElementType::U8).unwrap();
        assert_eq!(second.to_vec::<u8>().unwrap(), vec![0; 16]);
    }

    #[test]
    fn test_copy_rejects_mismatches() {
        let pool = pool();
        let mut buf = pool.allocate(Shape::from([16]), ElementType::U8).unwrap();
        let wrong_len = buf.copy_from_slice(&[0u8; 15]).unwrap_err();
        assert!(wrong_len.to_string().contains("holds 16 elements"));
        let wrong_type = buf.copy_from_slice(&[0u32; 16]).unwrap_err();
        assert!(wrong_type.to_string().contains("uint8"));
    }

    #[test]
    fn test_release_is_counted_once() {
        let pool = pool();
        let buf = pool.allocate(Shape::from([16]), ElementType::U8).unwrap();
        buf.release().unwrap();
        let stats = pool.stats().unwrap();
        assert_eq!(stats.allocations, 1);
        assert_eq!(stats.releases, 1);
        assert_eq!(stats.live_buffers, 0);
    }
}
