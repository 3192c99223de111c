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

//! Memory shared between the process and the accelerator.
//!
//! - [`region`] - a physically contiguous window the DMA engines can address
//! - [`pool`] - a first-fit allocator handing out blocks of a region
//! - [`buffer`] - [`ScopedBuffer`], a typed, shaped block that is released when dropped

pub mod buffer;
pub mod pool;
pub mod region;

pub use buffer::{Element, ElementType, ScopedBuffer, Shape};
pub use pool::{BufferPool, PoolStats};
pub use region::{HeapRegion, MemoryRegion};
