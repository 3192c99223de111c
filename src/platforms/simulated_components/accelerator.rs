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

//! Behavioural model of the convolution accelerator.
//!
//! The accelerator takes its 3×3 kernel from the first nine bytes of the control word and
//! applies it to each frame streamed in on the data DMA, valid mode, so a 28×28 frame comes
//! back as 26×26. Each output pixel is the weighted sum divided by the sum of the kernel
//! weights, which keeps it in `u8` range.

use crate::error::FpgaxferError;
use log::{debug, warn};

pub const KERNEL_SIZE: usize = 3;
pub const KERNEL_LEN: usize = KERNEL_SIZE * KERNEL_SIZE;

#[derive(Debug, Clone)]
pub struct Accelerator {
    frame_cols: usize,
    kernel: Option<[u8; KERNEL_LEN]>,
}

impl Accelerator {
    pub fn new(frame_cols: usize) -> Accelerator {
        Accelerator {
            frame_cols,
            kernel: None,
        }
    }

    pub fn kernel(&self) -> Option<[u8; KERNEL_LEN]> {
        self.kernel
    }

    /// Latch the kernel from a control word. Bytes past the ninth are reserved.
    pub fn configure(&mut self, control: &[u8]) -> Result<(), FpgaxferError> {
        let kernel: [u8; KERNEL_LEN] = control
            .get(..KERNEL_LEN)
            .and_then(|k| k.try_into().ok())
            .ok_or_else(|| {
                FpgaxferError::Dma(format!(
                    "control word of {} bytes is shorter than the {KERNEL_LEN} byte kernel",
                    control.len()
                ))
            })?;
        debug!("Accelerator kernel set to {kernel:?}");
        self.kernel = Some(kernel);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.kernel = None;
    }

    /// Convolve one frame.
    ///
    /// # Returns: `Result<Vec<u8>, FpgaxferError>`
    /// * `Ok(Vec<u8>)` - `(rows - 2) * (cols - 2)` output pixels, row major
    /// * `Err(FpgaxferError::Dma)` - The frame is not a whole number of rows, or has fewer
    ///   than three rows or columns
    pub fn process(&self, frame: &[u8]) -> Result<Vec<u8>, FpgaxferError> {
        let cols = self.frame_cols;
        if cols < KERNEL_SIZE || frame.len() % cols != 0 || frame.len() / cols < KERNEL_SIZE {
            return Err(FpgaxferError::Dma(format!(
                "accelerator expects at least {KERNEL_SIZE} rows of {cols} pixels, got {} bytes",
                frame.len()
            )));
        }
        let kernel = self.kernel.unwrap_or_else(|| {
            warn!("Accelerator received a frame before any control word, output will be zero");
            [0; KERNEL_LEN]
        });
        let norm = kernel.iter().map(|w| *w as u32).sum::<u32>().max(1);

        let rows = frame.len() / cols;
        let out_rows = rows - (KERNEL_SIZE - 1);
        let out_cols = cols - (KERNEL_SIZE - 1);
        let mut out = Vec::with_capacity(out_rows * out_cols);
        for r in 0..out_rows {
            for c in 0..out_cols {
                let mut acc = 0u32;
                for (k, weight) in kernel.iter().enumerate() {
                    let (i, j) = (k / KERNEL_SIZE, k % KERNEL_SIZE);
                    acc += frame[(r + i) * cols + c + j] as u32 * *weight as u32;
                }
                out.push((acc / norm).min(u8::MAX as u32) as u8);
            }
        }
        Ok(out)
    }
}
