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

//! State of the simulated board: DMA channel bookkeeping, the accelerator, and an event log.
//!
//! Transfers move real bytes through the [`BufferPool`] by physical address. A send completes
//! as soon as it is started and its bytes are handed to whatever is wired to that DMA; a
//! receive completes only once the accelerator produced output for it. Output produced while
//! no receive is posted is dropped, as the AXI stream would stall and the frame be lost.

use crate::config::{DEFAULT_CONTROL_DMA, DEFAULT_DATA_DMA};
use crate::dma::Direction;
use crate::error::FpgaxferError;
use crate::memory::BufferPool;
use crate::platforms::simulated_components::accelerator::Accelerator;
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub const DEFAULT_FRAME_COLS: usize = 28;

/// Something that happened on the simulated board, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    OverlayLoaded {
        design: String,
    },
    TransferStarted {
        dma: String,
        direction: Direction,
        phys: u64,
        len: usize,
    },
    TransferCompleted {
        dma: String,
        direction: Direction,
    },
    AcceleratorConfigured {
        control: Vec<u8>,
    },
    OutputDropped {
        dma: String,
        len: usize,
    },
}

/// Which DMA instance feeds which accelerator port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimWiring {
    pub control_dma: String,
    pub data_dma: String,
    pub frame_cols: usize,
}

impl Default for SimWiring {
    fn default() -> Self {
        SimWiring {
            control_dma: DEFAULT_CONTROL_DMA.to_string(),
            data_dma: DEFAULT_DATA_DMA.to_string(),
            frame_cols: DEFAULT_FRAME_COLS,
        }
    }
}

#[derive(Debug, Default)]
struct ChannelState {
    posted: Option<(u64, usize)>,
    complete: bool,
}

impl ChannelState {
    fn busy(&self) -> bool {
        self.posted.is_some() && !self.complete
    }
}

#[derive(Debug)]
pub struct SimBoard {
    pool: BufferPool,
    wiring: SimWiring,
    accelerator: Accelerator,
    channels: HashMap<(String, Direction), ChannelState>,
    events: Vec<SimEvent>,
}

pub type SharedBoard = Arc<Mutex<SimBoard>>;

pub(crate) fn lock_board(board: &SharedBoard) -> Result<MutexGuard<'_, SimBoard>, FpgaxferError> {
    board
        .lock()
        .map_err(|e| FpgaxferError::Internal(format!("Failed to lock simulated board: {e}")))
}

impl SimBoard {
    pub fn new(pool: BufferPool, wiring: SimWiring) -> SimBoard {
        let accelerator = Accelerator::new(wiring.frame_cols);
        SimBoard {
            pool,
            wiring,
            accelerator,
            channels: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn accelerator(&self) -> &Accelerator {
        &self.accelerator
    }

    /// Fabric reprogrammed: channels and accelerator start from scratch.
    pub fn reset(&mut self, design: &str) {
        self.channels.clear();
        self.accelerator.reset();
        self.events.push(SimEvent::OverlayLoaded {
            design: design.to_string(),
        });
    }

    pub fn start(
        &mut self,
        dma: &str,
        direction: Direction,
        phys: u64,
        len: usize,
    ) -> Result<(), FpgaxferError> {
        let state = self
            .channels
            .entry((dma.to_string(), direction))
            .or_default();
        if state.busy() {
            return Err(FpgaxferError::Dma(format!(
                "{dma} {direction} is still busy with the previous transfer"
            )));
        }
        state.posted = Some((phys, len));
        state.complete = false;
        self.events.push(SimEvent::TransferStarted {
            dma: dma.to_string(),
            direction,
            phys,
            len,
        });
        trace!("{dma} {direction}: {len} bytes at {phys:#x}");

        if direction == Direction::Send {
            let mut data = vec![0u8; len];
            self.pool.read_phys(phys, &mut data)?;
            self.consume(dma, &data)?;
            if let Some(state) = self.channels.get_mut(&(dma.to_string(), direction)) {
                state.complete = true;
            }
        }
        Ok(())
    }

    fn consume(&mut self, dma: &str, data: &[u8]) -> Result<(), FpgaxferError> {
        if dma == self.wiring.control_dma {
            self.accelerator.configure(data)?;
            self.events.push(SimEvent::AcceleratorConfigured {
                control: data.to_vec(),
            });
        } else if dma == self.wiring.data_dma {
            let output = self.accelerator.process(data)?;
            self.deliver(dma, &output)?;
        } else {
            debug!("Nothing is wired to {dma}, {} bytes go nowhere", data.len());
        }
        Ok(())
    }

    fn deliver(&mut self, dma: &str, output: &[u8]) -> Result<(), FpgaxferError> {
        match self.channels.get_mut(&(dma.to_string(), Direction::Recv)) {
            Some(state) if state.busy() => {
                let (phys, len) = state.posted.unwrap_or_default();
                if output.len() > len {
                    return Err(FpgaxferError::Dma(format!(
                        "receive buffer of {len} bytes on {dma} is too small for {} bytes of output",
                        output.len()
                    )));
                }
                self.pool.write_phys(phys, output)?;
                state.complete = true;
            }
            _ => {
                warn!(
                    "{} bytes of output on {dma} dropped, no receive buffer was posted",
                    output.len()
                );
                self.events.push(SimEvent::OutputDropped {
                    dma: dma.to_string(),
                    len: output.len(),
                });
            }
        }
        Ok(())
    }

    pub fn wait(&mut self, dma: &str, direction: Direction) -> Result<(), FpgaxferError> {
        match self.channels.get(&(dma.to_string(), direction)) {
            Some(state) if state.complete => {
                self.events.push(SimEvent::TransferCompleted {
                    dma: dma.to_string(),
                    direction,
                });
                Ok(())
            }
            Some(state) if state.busy() => Err(FpgaxferError::Dma(format!(
                "{dma} {direction} stalled, no data arrived for the posted receive"
            ))),
            _ => Err(FpgaxferError::Dma(format!(
                "no transfer has been started on {dma} {direction}"
            ))),
        }
    }

    pub fn idle(&self, dma: &str, direction: Direction) -> bool {
        self.channels
            .get(&(dma.to_string(), direction))
            .is_none_or(|state| !state.busy())
    }
}
