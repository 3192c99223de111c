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

use crate::simulated::{test_data, transfer_trace};
use fpgaxfer::memory::PoolStats;
use fpgaxfer::platforms::platform::Platform;
use fpgaxfer::platforms::simulated::{SimEvent, SimulatedPlatform};
use fpgaxfer::sequencer::{
    CONTROL_WORD, InputImage, OUTPUT_COLS, OUTPUT_ROWS, TransferConfig, run_transfer,
};
use googletest::prelude::*;
use rstest::*;

#[fixture]
fn config() -> TransferConfig {
    TransferConfig {
        bitstream: test_data("design.bit"),
        ..TransferConfig::default()
    }
}

const EXPECTED_TRACE: [&str; 6] = [
    "start axi_dma_1 send 16",
    "done axi_dma_1 send",
    "start axi_dma_0 recv 676",
    "start axi_dma_0 send 784",
    "done axi_dma_0 send",
    "done axi_dma_0 recv",
];

#[gtest]
#[rstest]
fn control_word_reaches_the_accelerator(config: TransferConfig) {
    let platform = SimulatedPlatform::new();
    run_transfer(&platform, &config, &InputImage::random()).expect("transfer failed");

    let controls: Vec<Vec<u8>> = platform
        .events()
        .expect("failed to read events")
        .into_iter()
        .filter_map(|event| match event {
            SimEvent::AcceleratorConfigured { control } => Some(control),
            _ => None,
        })
        .collect();
    assert_eq!(controls, vec![CONTROL_WORD.to_vec()]);
}

#[gtest]
#[rstest]
fn transfers_happen_in_order(config: TransferConfig) {
    let platform = SimulatedPlatform::new();
    run_transfer(&platform, &config, &InputImage::random()).expect("transfer failed");
    assert_eq!(transfer_trace(&platform), EXPECTED_TRACE);
}

#[gtest]
#[rstest]
fn zero_input_follows_the_same_order(config: TransferConfig) {
    let platform = SimulatedPlatform::new();
    let result = run_transfer(&platform, &config, &InputImage::zeros()).expect("transfer failed");
    assert_eq!(transfer_trace(&platform), EXPECTED_TRACE);
    expect_true!(result.pixels().iter().all(|p| *p == 0));
}

#[gtest]
#[rstest]
#[case::zeros(0)]
#[case::mid_grey(100)]
#[case::white(255)]
fn flat_input_gives_flat_output(config: TransferConfig, #[case] value: u8) {
    let platform = SimulatedPlatform::new();
    let input = InputImage::from_pixels(vec![value; 28 * 28]).expect("bad input");
    let result = run_transfer(&platform, &config, &input).expect("transfer failed");
    expect_eq!(result.rows(), OUTPUT_ROWS);
    expect_eq!(result.cols(), OUTPUT_COLS);
    expect_eq!(result.pixels().len(), 26 * 26);
    expect_true!(result.pixels().iter().all(|p| *p == value));
}

#[gtest]
#[rstest]
fn output_is_the_smoothed_input(config: TransferConfig) {
    let platform = SimulatedPlatform::new();
    let input = InputImage::from_file(&test_data("input.raw")).expect("bad input file");
    let result = run_transfer(&platform, &config, &input).expect("transfer failed");

    // the first rows of input.raw are a linear ramp, which the symmetric kernel leaves
    // at the centre value
    expect_eq!(result.get(0, 0), Some(29));
    expect_eq!(result.get(0, 1), Some(30));
    expect_eq!(result.get(1, 1), Some(58));
    expect_eq!(result.get(26, 0), None);
}

#[gtest]
#[rstest]
fn buffers_are_released_after_every_run(config: TransferConfig) {
    let platform = SimulatedPlatform::new();
    for _ in 0..2 {
        run_transfer(&platform, &config, &InputImage::random()).expect("transfer failed");
    }
    let stats = platform.pool_stats().expect("failed to read pool stats");
    expect_eq!(
        stats,
        PoolStats {
            allocations: 6,
            releases: 6,
            live_buffers: 0,
            bytes_in_use: 0,
            peak_bytes: stats.peak_bytes,
        }
    );
    // 64 + 832 + 704 bytes of aligned blocks
    expect_eq!(stats.peak_bytes, 1600);
}

#[gtest]
#[rstest]
fn buffers_sit_back_to_back_in_the_region(config: TransferConfig) {
    let platform = SimulatedPlatform::new();
    run_transfer(&platform, &config, &InputImage::random()).expect("transfer failed");

    let started: Vec<(String, u64)> = platform
        .events()
        .expect("failed to read events")
        .into_iter()
        .filter_map(|event| match event {
            SimEvent::TransferStarted {
                dma,
                direction,
                phys,
                ..
            } => Some((format!("{dma} {direction}"), phys)),
            _ => None,
        })
        .collect();
    assert_eq!(
        started,
        vec![
            ("axi_dma_1 send".to_string(), 0x1800_0000),
            ("axi_dma_0 recv".to_string(), 0x1800_0380),
            ("axi_dma_0 send".to_string(), 0x1800_0040),
        ]
    );
}
