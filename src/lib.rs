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

//! Drive a DMA round-trip against an FPGA accelerator overlay.
//!
//! The crate loads an overlay (bitstream plus hardware handoff), configures the accelerator
//! over a control DMA and pushes one frame through a data DMA, on real Linux hardware or on a
//! simulated board:
//!
//! - [`sequencer`] - the ordered transfer sequence and its inputs and outputs
//! - [`platforms`] - where overlays run: [`Platform`](platforms::platform::Platform) and
//!   [`Overlay`](platforms::platform::Overlay) plus the implementations
//! - [`dma`] - DMA engines and channels, and the AXI DMA register driver
//! - [`memory`] - contiguous memory, the pool allocator and scoped buffers
//! - [`overlay`] - `.bit` and `.hwh` readers
//! - [`config`] - system paths and defaults, from TOML config files
//!
//! ```rust,no_run
//! # use fpgaxfer::platforms::platform::platform_for_known_platform;
//! # use fpgaxfer::sequencer::{InputImage, TransferConfig, run_transfer};
//! # fn example() -> Result<(), fpgaxfer::error::FpgaxferError> {
//! fpgaxfer::register_platforms();
//! let platform = platform_for_known_platform("simulated")?;
//! let result = run_transfer(platform.as_ref(), &TransferConfig::default(), &InputImage::random())?;
//! println!("{:?}", result.get(0, 0));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dma;
pub mod error;
pub mod memory;
pub mod overlay;
pub mod platforms;
pub mod sequencer;
pub mod system_io;

#[cfg(feature = "simulated")]
use platforms::simulated::SimulatedPlatform;
#[cfg(feature = "universal")]
use platforms::universal::UniversalPlatform;

/// Register every platform compiled in with the platform registry.
pub fn register_platforms() {
    #[cfg(feature = "universal")]
    UniversalPlatform::register_platform();

    #[cfg(feature = "simulated")]
    SimulatedPlatform::register_platform();
}
