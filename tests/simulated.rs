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

#![cfg(feature = "simulated")]

pub mod simulated {
    pub mod faults;
    pub mod inputs;
    pub mod overlay_loading;
    pub mod sequence;

    use fpgaxfer::platforms::simulated::{SimEvent, SimulatedPlatform};
    use std::path::PathBuf;

    pub static PLATFORM_STRING: &str = "simulated";

    pub fn test_data(file: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/test_data")
            .join(file)
    }

    /// Transfer events only, without addresses, in the order they happened.
    pub fn transfer_trace(platform: &SimulatedPlatform) -> Vec<String> {
        platform
            .events()
            .expect("failed to read simulated board events")
            .into_iter()
            .filter_map(|event| match event {
                SimEvent::TransferStarted {
                    dma,
                    direction,
                    len,
                    ..
                } => Some(format!("start {dma} {direction} {len}")),
                SimEvent::TransferCompleted { dma, direction } => {
                    Some(format!("done {dma} {direction}"))
                }
                SimEvent::OutputDropped { dma, len } => Some(format!("dropped {dma} {len}")),
                _ => None,
            })
            .collect()
    }
}
