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

use crate::sequencer::SequenceState;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum FpgaxferError {
    #[error("FpgaxferError::Argument: {0}")]
    Argument(String),
    #[error("FpgaxferError::IORead: An IO error occurred when reading from {file:?}: {e}")]
    IORead { file: PathBuf, e: std::io::Error },
    #[error("FpgaxferError::IOWrite: An IO error occurred when writing to {file:?}: {e}")]
    IOWrite { file: PathBuf, e: std::io::Error },
    #[error("FpgaxferError::IOCreate: An IO error occurred when creating {file:?}: {e}")]
    IOCreate { file: PathBuf, e: std::io::Error },
    #[error("FpgaxferError::IODelete: An IO error occurred when deleting {file:?}: {e}")]
    IODelete { file: PathBuf, e: std::io::Error },
    #[error("FpgaxferError::IOReadDir: An IO error occurred when reading directory {dir:?}: {e}")]
    IOReadDir { dir: PathBuf, e: std::io::Error },
    #[error("FpgaxferError::Parse: Could not parse {value:?} read from {file:?}")]
    Parse { file: PathBuf, value: String },
    #[error("FpgaxferError::Bitstream: Invalid bitstream: {0}")]
    Bitstream(String),
    #[error("FpgaxferError::Handoff: Invalid hardware handoff file: {0}")]
    Handoff(String),
    #[error("FpgaxferError::FPGAState: FPGA state is not as expected: {0}")]
    FPGAState(String),
    #[error("FpgaxferError::Flag: Failed to read flags: {0}")]
    Flag(String),
    #[error("FpgaxferError::OverlayStatus: Overlay was not applied: {0}")]
    OverlayStatus(String),
    #[error("FpgaxferError::Mmap: Mapping {file:?} failed: {reason}")]
    Mmap { file: PathBuf, reason: String },
    #[error("FpgaxferError::Alloc: {0}")]
    Alloc(String),
    #[error("FpgaxferError::Shape: {0}")]
    Shape(String),
    #[error("FpgaxferError::Dma: {0}")]
    Dma(String),
    #[error("FpgaxferError::Sequence: Transfer sequence failed after reaching {state}: {source}")]
    Sequence {
        state: SequenceState,
        source: Box<FpgaxferError>,
    },
    #[error("FpgaxferError::TomlDe: Failed to parse config {toml_string:?}: {e}")]
    TomlDe {
        toml_string: String,
        e: toml::de::Error,
    },
    #[error("FpgaxferError::Internal: An Internal error occurred: {0}")]
    Internal(String),
}
