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

use crate::simulated::{PLATFORM_STRING, test_data};
use fpgaxfer::platforms::platform::{Platform, platform_for_known_platform, registered_platforms};
use fpgaxfer::platforms::simulated::{SimEvent, SimulatedPlatform};
use googletest::prelude::*;
use rstest::*;

#[gtest]
fn header_fields_are_read() {
    let platform = SimulatedPlatform::new();
    let overlay = platform
        .load_overlay(&test_data("design.bit"))
        .expect("failed to load overlay");
    let header = overlay.header();
    expect_that!(header.design.as_str(), eq("conv_overlay"));
    expect_eq!(header.user_id.as_deref(), Some("0XFFFFFFFF"));
    expect_eq!(header.version.as_deref(), Some("2022.2"));
    expect_that!(header.part.as_str(), eq("7z020clg400"));
    expect_that!(header.date.as_str(), eq("2025/03/14"));
    expect_that!(header.time.as_str(), eq("09:26:53"));
    expect_true!(overlay.files().dtbo.is_none());
}

#[gtest]
fn ip_with_registers_is_listed() {
    let platform = SimulatedPlatform::new();
    let overlay = platform
        .load_overlay(&test_data("design.bit"))
        .expect("failed to load overlay");
    assert_eq!(overlay.ip_names(), ["axi_dma_0", "axi_dma_1", "conv3x3_0"]);
}

#[gtest]
#[rstest]
#[case::accelerator("conv3x3_0", "is a conv3x3, not an axi_dma")]
#[case::processing_system("processing_system7_0", "not an axi_dma")]
#[case::unknown("axi_dma_9", "is not in the overlay")]
fn only_axi_dma_instances_are_engines(#[case] instance: &str, #[case] message: &str) {
    let platform = SimulatedPlatform::new();
    let overlay = platform
        .load_overlay(&test_data("design.bit"))
        .expect("failed to load overlay");
    let res = overlay.dma(instance).map(|dma| dma.name().to_string());
    expect_that!(&res, err(displays_as(contains_substring(message))));
}

#[gtest]
fn loading_is_recorded_on_the_board() {
    let platform = SimulatedPlatform::new();
    platform
        .load_overlay(&test_data("design.bit"))
        .expect("failed to load overlay");
    let events = platform.events().expect("failed to read events");
    assert_eq!(
        events,
        vec![SimEvent::OverlayLoaded {
            design: "conv_overlay".to_string()
        }]
    );
}

#[gtest]
fn every_load_is_recorded() {
    let platform = SimulatedPlatform::new();
    for _ in 0..2 {
        platform
            .load_overlay(&test_data("design.bit"))
            .expect("failed to load overlay");
    }
    let loads = platform
        .events()
        .expect("failed to read events")
        .iter()
        .filter(|e| matches!(e, SimEvent::OverlayLoaded { .. }))
        .count();
    expect_eq!(loads, 2);
}

#[gtest]
fn simulated_platform_is_registered() {
    fpgaxfer::register_platforms();
    expect_true!(registered_platforms().contains(&PLATFORM_STRING));
    let platform = platform_for_known_platform(PLATFORM_STRING);
    expect_true!(platform.is_ok());
    let stats = platform
        .expect("no simulated platform")
        .pool_stats()
        .expect("failed to read pool stats");
    expect_eq!(stats.allocations, 0);
}
