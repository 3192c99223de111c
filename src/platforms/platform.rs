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

//! Platform abstraction.
//!
//! A platform knows how to program a bitstream, where DMA-able memory comes from and how to
//! reach the DMA engines an overlay contains. Two traits make up the seam:
//! - [`Platform`] - loads overlays and allocates buffers
//! - [`Overlay`] - a loaded design, hands out [`DmaEngine`]s by instance name
//!
//! # Platform Registration
//!
//! Platforms register themselves with [`register_platform`] under a comma separated
//! compatibility string, normally through the `#[platform]` macro, and are looked up with
//! [`platform_for_known_platform`]. A lookup string matches a platform when every one of its
//! comma separated components appears in the platform's compatibility string. Which platforms
//! are compiled in is decided by cargo features.
//!
//! ```rust,no_run
//! # use fpgaxfer::platforms::platform::platform_for_known_platform;
//! # fn example() -> Result<(), fpgaxfer::error::FpgaxferError> {
//! fpgaxfer::register_platforms();
//! let platform = platform_for_known_platform("simulated")?;
//! let overlay = platform.load_overlay("design.bit".as_ref())?;
//! let dma = overlay.dma("axi_dma_0")?;
//! # Ok(())
//! # }
//! ```

use crate::dma::DmaEngine;
use crate::error::FpgaxferError;
use crate::memory::{ElementType, PoolStats, ScopedBuffer, Shape};
use crate::overlay::OverlayFiles;
use crate::overlay::bitfile::BitstreamHeader;
use crate::overlay::hwh::HardwareHandoff;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

type PlatformConstructor = fn() -> Box<dyn Platform>;

pub static PLATFORM_REGISTRY: OnceLock<Mutex<HashMap<&'static str, PlatformConstructor>>> =
    OnceLock::new();

pub trait Platform: Any {
    /// Program `bitstream` and make its IP reachable.
    ///
    /// # Returns: `Result<Box<dyn Overlay>, FpgaxferError>`
    /// * `Ok(Box<dyn Overlay>)` - The design is loaded
    /// * `Err(FpgaxferError::Argument)` - The bitstream or its handoff file is missing
    /// * `Err(FpgaxferError)` - Parsing, programming or overlay application failed
    fn load_overlay(&self, bitstream: &Path) -> Result<Box<dyn Overlay>, FpgaxferError>;

    /// Allocate a physically contiguous, zeroed buffer.
    fn allocate(&self, shape: Shape, dtype: ElementType) -> Result<ScopedBuffer, FpgaxferError>;

    /// Allocation counters of the platform's buffer pool.
    fn pool_stats(&self) -> Result<PoolStats, FpgaxferError>;
}

pub trait Overlay: Debug {
    fn files(&self) -> &OverlayFiles;

    fn header(&self) -> &BitstreamHeader;

    fn handoff(&self) -> &HardwareHandoff;

    /// Instance names of the IP with a register window, sorted.
    fn ip_names(&self) -> Vec<String> {
        self.handoff().ip_names()
    }

    /// The DMA engine called `instance`, with its channels started.
    ///
    /// # Returns: `Result<DmaEngine, FpgaxferError>`
    /// * `Ok(DmaEngine)` - Ready for transfers
    /// * `Err(FpgaxferError::Argument)` - No AXI DMA of that name in the design
    /// * `Err(FpgaxferError)` - The engine's registers could not be reached
    fn dma(&self, instance: &str) -> Result<DmaEngine, FpgaxferError>;
}

fn match_platform_string(platform_string: &str) -> Result<Box<dyn Platform>, FpgaxferError> {
    let registry = PLATFORM_REGISTRY
        .get()
        .ok_or(FpgaxferError::Internal(String::from(
            "couldn't get PLATFORM_REGISTRY",
        )))?
        .lock()
        .map_err(|_| FpgaxferError::Internal(String::from("couldn't lock PLATFORM_REGISTRY")))?;

    for (compat_string, platform_constructor) in registry.iter() {
        let compat_set: HashSet<&str> = compat_string.split(',').collect();
        let compat_found = platform_string.split(',').all(|x| compat_set.contains(x));
        if compat_found {
            return Ok(platform_constructor());
        }
    }

    Err(FpgaxferError::Argument(format!(
        "fpgaxfer could not match {platform_string:?} to a known platform."
    )))
}

pub fn platform_for_known_platform(
    platform_string: &str,
) -> Result<Box<dyn Platform>, FpgaxferError> {
    match_platform_string(platform_string)
}

pub fn init_platform_registry() -> Mutex<HashMap<&'static str, PlatformConstructor>> {
    Mutex::new(HashMap::new())
}

pub fn register_platform(compatible: &'static str, constructor: PlatformConstructor) {
    let registry = PLATFORM_REGISTRY.get_or_init(init_platform_registry).lock();
    match registry {
        Ok(mut registry) => {
            registry.insert(compatible, constructor);
        }
        Err(e) => log::error!("couldn't register {compatible}: {e}"),
    }
}

/// Compatibility strings of every registered platform, sorted.
pub fn registered_platforms() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = match PLATFORM_REGISTRY.get().map(|r| r.lock()) {
        Some(Ok(registry)) => registry.keys().copied().collect(),
        _ => Vec::new(),
    };
    names.sort();
    names
}
