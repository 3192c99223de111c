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
use fpgaxfer::dma::DmaEngine;
use fpgaxfer::error::FpgaxferError;
use fpgaxfer::memory::{ElementType, Shape};
use fpgaxfer::platforms::platform::Platform;
use fpgaxfer::platforms::simulated::{SimWiring, SimulatedPlatform};
use fpgaxfer::sequencer::{
    InputImage, OutputResult, SequenceState, TransferConfig, run_transfer,
};
use googletest::prelude::*;
use rstest::*;

fn failed_state(result: &Result<OutputResult, FpgaxferError>) -> Option<SequenceState> {
    match result {
        Err(FpgaxferError::Sequence { state, .. }) => Some(*state),
        _ => None,
    }
}

#[gtest]
#[rstest]
#[case::missing_bitstream(
    "does_not_exist.bit",
    err(displays_as(contains_substring("FpgaxferError::Argument:")))
)]
#[case::missing_handoff(
    "no_handoff/design.bit",
    err(displays_as(contains_substring("no matching hardware handoff file")))
)]
fn overlay_files_must_exist<M: for<'a> Matcher<&'a Result<OutputResult, FpgaxferError>>>(
    #[case] bitstream: &str,
    #[case] condition: M,
) {
    let platform = SimulatedPlatform::new();
    let config = TransferConfig {
        bitstream: test_data(bitstream),
        ..TransferConfig::default()
    };
    let res = run_transfer(&platform, &config, &InputImage::zeros());
    expect_that!(&res, condition);
    expect_eq!(failed_state(&res), Some(SequenceState::Idle));
    expect_eq!(
        platform.pool_stats().expect("failed to read pool stats").allocations,
        0
    );
}

#[gtest]
fn unknown_control_dma_fails_before_allocating() {
    let platform = SimulatedPlatform::new();
    let config = TransferConfig {
        bitstream: test_data("design.bit"),
        control_dma: "axi_dma_7".to_string(),
        ..TransferConfig::default()
    };
    let res = run_transfer(&platform, &config, &InputImage::zeros());
    expect_that!(
        &res,
        err(displays_as(contains_substring("axi_dma_7 is not in the overlay")))
    );
    match &res {
        Err(FpgaxferError::Sequence { state, source }) => {
            expect_eq!(*state, SequenceState::Idle);
            expect_true!(matches!(**source, FpgaxferError::Argument(_)));
        }
        other => panic!("expected a sequence error, got {other:?}"),
    }
    expect_eq!(
        platform.pool_stats().expect("failed to read pool stats").allocations,
        0
    );
}

#[gtest]
fn accelerator_ip_is_not_a_dma() {
    let platform = SimulatedPlatform::new();
    let config = TransferConfig {
        bitstream: test_data("design.bit"),
        data_dma: "conv3x3_0".to_string(),
        ..TransferConfig::default()
    };
    let res = run_transfer(&platform, &config, &InputImage::zeros());
    expect_that!(
        &res,
        err(displays_as(contains_substring("conv3x3_0 is a conv3x3, not an axi_dma")))
    );
}

#[gtest]
fn receive_over_the_length_limit_is_refused() {
    let platform = SimulatedPlatform::new();
    let config = TransferConfig {
        bitstream: test_data("narrow/design.bit"),
        ..TransferConfig::default()
    };
    let res = run_transfer(&platform, &config, &InputImage::zeros());
    expect_that!(
        &res,
        err(displays_as(contains_substring("exceeds the 255 byte limit")))
    );
    expect_eq!(failed_state(&res), Some(SequenceState::ControlSent));

    let stats = platform.pool_stats().expect("failed to read pool stats");
    expect_eq!(stats.allocations, 3);
    expect_eq!(stats.releases, 3);
    expect_eq!(stats.live_buffers, 0);
    expect_eq!(stats.bytes_in_use, 0);
}

#[gtest]
fn miswired_data_dma_stalls_the_receive() {
    let platform = SimulatedPlatform::with_wiring(SimWiring {
        data_dma: "axi_dma_2".to_string(),
        ..SimWiring::default()
    });
    let config = TransferConfig {
        bitstream: test_data("design.bit"),
        ..TransferConfig::default()
    };
    let res = run_transfer(&platform, &config, &InputImage::random());
    expect_that!(
        &res,
        err(displays_as(contains_substring(
            "stalled, no data arrived for the posted receive"
        )))
    );
    expect_eq!(failed_state(&res), Some(SequenceState::InputSent));
    assert_eq!(
        transfer_trace(&platform),
        vec![
            "start axi_dma_1 send 16",
            "done axi_dma_1 send",
            "start axi_dma_0 recv 676",
            "start axi_dma_0 send 784",
            "done axi_dma_0 send",
        ]
    );

    let stats = platform.pool_stats().expect("failed to read pool stats");
    expect_eq!(stats.live_buffers, 0);
    expect_eq!(stats.releases, stats.allocations);
}

#[gtest]
fn output_is_lost_when_sent_before_the_receive_is_posted() {
    let platform = SimulatedPlatform::new();
    let overlay = platform
        .load_overlay(&test_data("design.bit"))
        .expect("failed to load overlay");
    let mut control_dma: DmaEngine = overlay.dma("axi_dma_1").expect("no control DMA");
    let mut data_dma: DmaEngine = overlay.dma("axi_dma_0").expect("no data DMA");

    let mut control = platform
        .allocate(Shape::from([16]), ElementType::U8)
        .expect("failed to allocate control buffer");
    control
        .copy_from_slice(&fpgaxfer::sequencer::CONTROL_WORD)
        .expect("failed to fill control buffer");
    let input = platform
        .allocate(Shape::from([28, 28]), ElementType::U8)
        .expect("failed to allocate input buffer");
    let output = platform
        .allocate(Shape::from([26, 26]), ElementType::U8)
        .expect("failed to allocate output buffer");

    control_dma.send(&control).expect("control send failed");
    control_dma.wait_send().expect("control wait failed");
    data_dma.send(&input).expect("input send failed");
    data_dma.wait_send().expect("input wait failed");
    data_dma
        .receive_into(&output)
        .expect("failed to post receive");

    let res = data_dma.wait_recv();
    expect_that!(&res, err(displays_as(contains_substring("stalled"))));
    assert_eq!(
        transfer_trace(&platform),
        vec![
            "start axi_dma_1 send 16",
            "done axi_dma_1 send",
            "start axi_dma_0 send 784",
            "dropped axi_dma_0 676",
            "done axi_dma_0 send",
            "start axi_dma_0 recv 676",
        ]
    );
}

#[gtest]
fn control_dma_has_no_receive_channel() {
    let platform = SimulatedPlatform::new();
    let overlay = platform
        .load_overlay(&test_data("design.bit"))
        .expect("failed to load overlay");
    let mut control_dma = overlay.dma("axi_dma_1").expect("no control DMA");
    let output = platform
        .allocate(Shape::from([26, 26]), ElementType::U8)
        .expect("failed to allocate output buffer");
    let res = control_dma.receive_into(&output);
    expect_that!(
        &res,
        err(displays_as(contains_substring("FpgaxferError::Argument:")))
    );
}
