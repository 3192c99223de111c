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

//! The transfer sequence.
//!
//! One run programs the overlay, configures the accelerator with the [`CONTROL_WORD`], pushes
//! one 28×28 frame through the data DMA and copies the 26×26 result out:
//!
//! ```text
//! Idle -> OverlayLoaded -> BuffersAllocated -> ControlSent -> OutputPosted -> InputSent
//!      -> TransfersComplete -> ResultCopied -> BuffersReleased
//! ```
//!
//! The output buffer is posted on the receive channel before the input is sent, otherwise the
//! accelerator's output stream has nowhere to go. Both the send and the receive are waited on
//! before the result is read.
//!
//! A [`TransferSession`] owns everything the run acquires, so whichever step fails, the
//! buffers go back to the pool when the session is dropped. The error names the last state
//! that was reached.

use crate::config::SystemConfig;
use crate::dma::DmaEngine;
use crate::error::FpgaxferError;
use crate::memory::{ElementType, ScopedBuffer, Shape};
use crate::platforms::platform::{Overlay, Platform};
use crate::system_io::fs_read_bytes;
use log::{debug, info};
use rand::Rng;
use std::fmt;
use std::path::{Path, PathBuf};

/// Accelerator configuration: a 3×3 kernel followed by reserved bytes.
pub const CONTROL_WORD: [u8; 16] = [1, 2, 1, 2, 4, 2, 1, 2, 1, 0, 0, 0, 0, 0, 0, 0];

pub const INPUT_ROWS: usize = 28;
pub const INPUT_COLS: usize = 28;
pub const OUTPUT_ROWS: usize = 26;
pub const OUTPUT_COLS: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    Idle,
    OverlayLoaded,
    BuffersAllocated,
    ControlSent,
    OutputPosted,
    InputSent,
    TransfersComplete,
    ResultCopied,
    BuffersReleased,
}

impl fmt::Display for SequenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SequenceState::Idle => "Idle",
            SequenceState::OverlayLoaded => "OverlayLoaded",
            SequenceState::BuffersAllocated => "BuffersAllocated",
            SequenceState::ControlSent => "ControlSent",
            SequenceState::OutputPosted => "OutputPosted",
            SequenceState::InputSent => "InputSent",
            SequenceState::TransfersComplete => "TransfersComplete",
            SequenceState::ResultCopied => "ResultCopied",
            SequenceState::BuffersReleased => "BuffersReleased",
        };
        f.write_str(name)
    }
}

/// A row-major `u8` image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    rows: usize,
    cols: usize,
    pixels: Vec<u8>,
}

impl Frame {
    pub fn new(rows: usize, cols: usize, pixels: Vec<u8>) -> Result<Frame, FpgaxferError> {
        if pixels.len() != rows * cols {
            return Err(FpgaxferError::Shape(format!(
                "a {rows}x{cols} frame needs {} pixels, got {}",
                rows * cols,
                pixels.len()
            )));
        }
        Ok(Frame { rows, cols, pixels })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> Shape {
        Shape::from([self.rows, self.cols])
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        (row < self.rows && col < self.cols).then(|| self.pixels[row * self.cols + col])
    }
}

/// The 28×28 frame sent to the accelerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputImage(Frame);

impl InputImage {
    /// Uniformly random pixels.
    pub fn random() -> InputImage {
        InputImage::random_with(&mut rand::thread_rng())
    }

    pub fn random_with<R: Rng + ?Sized>(rng: &mut R) -> InputImage {
        let mut pixels = vec![0u8; INPUT_ROWS * INPUT_COLS];
        rng.fill(pixels.as_mut_slice());
        InputImage(Frame {
            rows: INPUT_ROWS,
            cols: INPUT_COLS,
            pixels,
        })
    }

    pub fn zeros() -> InputImage {
        InputImage(Frame {
            rows: INPUT_ROWS,
            cols: INPUT_COLS,
            pixels: vec![0; INPUT_ROWS * INPUT_COLS],
        })
    }

    pub fn from_pixels(pixels: Vec<u8>) -> Result<InputImage, FpgaxferError> {
        Frame::new(INPUT_ROWS, INPUT_COLS, pixels).map(InputImage)
    }

    /// Raw 28×28 bytes, row major, no header.
    pub fn from_file(path: &Path) -> Result<InputImage, FpgaxferError> {
        let pixels = fs_read_bytes(path)?;
        if pixels.len() != INPUT_ROWS * INPUT_COLS {
            return Err(FpgaxferError::Argument(format!(
                "{path:?} holds {} bytes, an input frame is exactly {}",
                pixels.len(),
                INPUT_ROWS * INPUT_COLS
            )));
        }
        InputImage::from_pixels(pixels)
    }

    pub fn frame(&self) -> &Frame {
        &self.0
    }

    pub fn pixels(&self) -> &[u8] {
        self.0.pixels()
    }
}

/// The 26×26 frame copied back from the accelerator.
pub type OutputResult = Frame;

/// Which overlay to load and which DMA instances carry control and data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    pub bitstream: PathBuf,
    pub data_dma: String,
    pub control_dma: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        (&SystemConfig::default()).into()
    }
}

impl From<&SystemConfig> for TransferConfig {
    fn from(config: &SystemConfig) -> Self {
        TransferConfig {
            bitstream: config.bitstream.clone(),
            data_dma: config.data_dma.clone(),
            control_dma: config.control_dma.clone(),
        }
    }
}

struct TransferBuffers {
    control: ScopedBuffer,
    input: ScopedBuffer,
    output: ScopedBuffer,
}

/// Everything one run holds. Fields drop in declaration order, so buffers are released
/// before the engines and the overlay they were used with.
pub struct TransferSession<'p> {
    platform: &'p dyn Platform,
    state: SequenceState,
    buffers: Option<TransferBuffers>,
    control_dma: Option<DmaEngine>,
    data_dma: Option<DmaEngine>,
    overlay: Option<Box<dyn Overlay>>,
}

fn missing(what: &str, state: SequenceState) -> FpgaxferError {
    FpgaxferError::Internal(format!("{what} is not available in state {state}"))
}

impl<'p> TransferSession<'p> {
    pub fn new(platform: &'p dyn Platform) -> TransferSession<'p> {
        TransferSession {
            platform,
            state: SequenceState::Idle,
            buffers: None,
            control_dma: None,
            data_dma: None,
            overlay: None,
        }
    }

    pub fn state(&self) -> SequenceState {
        self.state
    }

    pub fn overlay(&self) -> Option<&dyn Overlay> {
        self.overlay.as_deref()
    }

    fn advance(&mut self, next: SequenceState) {
        debug!("{} -> {next}", self.state);
        self.state = next;
    }

    /// Run the whole sequence once. A session runs at most once.
    ///
    /// # Returns: `Result<OutputResult, FpgaxferError>`
    /// * `Ok(OutputResult)` - The 26×26 result, state is `BuffersReleased`
    /// * `Err(FpgaxferError)` - The first failure; [`state`](Self::state) is the last state
    ///   reached
    pub fn run(
        &mut self,
        config: &TransferConfig,
        input: &InputImage,
    ) -> Result<OutputResult, FpgaxferError> {
        if self.state != SequenceState::Idle {
            return Err(FpgaxferError::Internal(format!(
                "a transfer session runs once, this one is in state {}",
                self.state
            )));
        }
        self.load_overlay(config)?;
        self.allocate_buffers()?;
        self.send_control()?;
        self.fill_input(input)?;
        self.post_output()?;
        self.send_input()?;
        self.wait_transfers()?;
        let result = self.copy_result()?;
        self.release_buffers()?;
        Ok(result)
    }

    fn load_overlay(&mut self, config: &TransferConfig) -> Result<(), FpgaxferError> {
        let overlay = self.platform.load_overlay(&config.bitstream)?;
        let control_dma = overlay.dma(&config.control_dma)?;
        let data_dma = overlay.dma(&config.data_dma)?;
        info!(
            "Overlay '{}' loaded, control on {}, data on {}",
            overlay.header().design,
            control_dma.name(),
            data_dma.name()
        );
        self.overlay = Some(overlay);
        self.control_dma = Some(control_dma);
        self.data_dma = Some(data_dma);
        self.advance(SequenceState::OverlayLoaded);
        Ok(())
    }

    fn allocate_buffers(&mut self) -> Result<(), FpgaxferError> {
        let control = self
            .platform
            .allocate(Shape::from([CONTROL_WORD.len()]), ElementType::U8)?;
        let input = self
            .platform
            .allocate(Shape::from([INPUT_ROWS, INPUT_COLS]), ElementType::U8)?;
        let output = self
            .platform
            .allocate(Shape::from([OUTPUT_ROWS, OUTPUT_COLS]), ElementType::U8)?;
        debug!(
            "Buffers: control {:#x}, input {:#x}, output {:#x}",
            control.physical_address(),
            input.physical_address(),
            output.physical_address()
        );
        self.buffers = Some(TransferBuffers {
            control,
            input,
            output,
        });
        self.advance(SequenceState::BuffersAllocated);
        Ok(())
    }

    fn send_control(&mut self) -> Result<(), FpgaxferError> {
        let state = self.state;
        let buffers = self
            .buffers
            .as_mut()
            .ok_or_else(|| missing("buffers", state))?;
        let dma = self
            .control_dma
            .as_mut()
            .ok_or_else(|| missing("control DMA", state))?;
        buffers.control.copy_from_slice(&CONTROL_WORD)?;
        dma.send(&buffers.control)?;
        dma.wait_send()?;
        info!("Control word sent on {}", dma.name());
        self.advance(SequenceState::ControlSent);
        Ok(())
    }

    /// Only touches the input buffer once the control transfer has completed.
    fn fill_input(&mut self, input: &InputImage) -> Result<(), FpgaxferError> {
        let state = self.state;
        let buffers = self
            .buffers
            .as_mut()
            .ok_or_else(|| missing("buffers", state))?;
        buffers.input.copy_from_slice(input.pixels())
    }

    fn post_output(&mut self) -> Result<(), FpgaxferError> {
        let state = self.state;
        let buffers = self.buffers.as_ref().ok_or_else(|| missing("buffers", state))?;
        let dma = self
            .data_dma
            .as_mut()
            .ok_or_else(|| missing("data DMA", state))?;
        dma.receive_into(&buffers.output)?;
        debug!("Output buffer posted on {}", dma.name());
        self.advance(SequenceState::OutputPosted);
        Ok(())
    }

    fn send_input(&mut self) -> Result<(), FpgaxferError> {
        let state = self.state;
        let buffers = self.buffers.as_ref().ok_or_else(|| missing("buffers", state))?;
        let dma = self
            .data_dma
            .as_mut()
            .ok_or_else(|| missing("data DMA", state))?;
        dma.send(&buffers.input)?;
        debug!("Input frame sent on {}", dma.name());
        self.advance(SequenceState::InputSent);
        Ok(())
    }

    fn wait_transfers(&mut self) -> Result<(), FpgaxferError> {
        let state = self.state;
        let dma = self
            .data_dma
            .as_mut()
            .ok_or_else(|| missing("data DMA", state))?;
        dma.wait_send()?;
        dma.wait_recv()?;
        info!("Transfers on {} complete", dma.name());
        self.advance(SequenceState::TransfersComplete);
        Ok(())
    }

    fn copy_result(&mut self) -> Result<OutputResult, FpgaxferError> {
        let state = self.state;
        let buffers = self.buffers.as_ref().ok_or_else(|| missing("buffers", state))?;
        let result = Frame::new(OUTPUT_ROWS, OUTPUT_COLS, buffers.output.to_vec::<u8>()?)?;
        self.advance(SequenceState::ResultCopied);
        Ok(result)
    }

    fn release_buffers(&mut self) -> Result<(), FpgaxferError> {
        let state = self.state;
        let buffers = self.buffers.take().ok_or_else(|| missing("buffers", state))?;
        buffers.control.release()?;
        buffers.input.release()?;
        buffers.output.release()?;
        self.advance(SequenceState::BuffersReleased);
        Ok(())
    }
}

/// Run the sequence once on `platform`.
///
/// # Returns: `Result<OutputResult, FpgaxferError>`
/// * `Ok(OutputResult)` - The 26×26 result
/// * `Err(FpgaxferError::Sequence)` - Wraps the first failure with the last state reached;
///   every buffer the run allocated has been released
pub fn run_transfer(
    platform: &dyn Platform,
    config: &TransferConfig,
    input: &InputImage,
) -> Result<OutputResult, FpgaxferError> {
    let mut session = TransferSession::new(platform);
    session
        .run(config, input)
        .map_err(|e| FpgaxferError::Sequence {
            state: session.state(),
            source: Box::new(e),
        })
}
