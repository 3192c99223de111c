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

//! Platforms an overlay can run on.
//!
//! - [`platform`] - the [`Platform`](platform::Platform) and [`Overlay`](platform::Overlay)
//!   traits and the platform registry
//! - [`universal`] - Linux FPGA manager, configfs overlays, UIO and u-dma-buf
//! - [`simulated`] - an in-process board with an accelerator model, for tests and dry runs

pub mod platform;

#[cfg(feature = "simulated")]
pub mod simulated;
#[cfg(feature = "simulated")]
pub mod simulated_components;
#[cfg(feature = "universal")]
pub mod universal;
#[cfg(feature = "universal")]
pub mod universal_components;
