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

use crate::simulated::test_data;
use fpgaxfer::error::FpgaxferError;
use fpgaxfer::memory::Shape;
use fpgaxfer::sequencer::{INPUT_COLS, INPUT_ROWS, InputImage};
use googletest::prelude::*;
use rstest::*;

#[gtest]
fn raw_file_is_read_row_major() {
    let input = InputImage::from_file(&test_data("input.raw")).expect("failed to read input");
    expect_eq!(input.frame().rows(), INPUT_ROWS);
    expect_eq!(input.frame().cols(), INPUT_COLS);
    expect_eq!(input.frame().get(0, 5), Some(5));
    expect_eq!(input.frame().get(1, 0), Some(28));
    // (8 * 28 + 27) % 251
    expect_eq!(input.frame().get(8, 27), Some(0));
}

#[gtest]
#[rstest]
#[case::too_short(
    "short.raw",
    err(displays_as(contains_substring("holds 100 bytes")))
)]
#[case::missing(
    "missing.raw",
    err(displays_as(contains_substring("FpgaxferError::IORead:")))
)]
#[case::directory(
    "narrow",
    err(displays_as(contains_substring("FpgaxferError::IORead:")))
)]
fn bad_input_files_are_rejected<M: for<'a> Matcher<&'a Result<InputImage, FpgaxferError>>>(
    #[case] file: &str,
    #[case] condition: M,
) {
    let res = InputImage::from_file(&test_data(file));
    expect_that!(&res, condition);
}

#[gtest]
fn random_input_fills_a_whole_frame() {
    let input = InputImage::random();
    expect_eq!(input.pixels().len(), 28 * 28);
    assert_eq!(input.frame().shape(), Shape::from([28, 28]));
}

#[gtest]
fn pixels_must_fill_the_frame() {
    let res = InputImage::from_pixels(vec![0; 27 * 28]);
    expect_that!(
        &res,
        err(displays_as(contains_substring("FpgaxferError::Shape:")))
    );
}
