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

mod inspect;
mod run;

use clap::{Args, Parser, Subcommand};
use log::debug;
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fpgaxfer")]
#[command(bin_name = "fpgaxfer")]
#[command(version, about = "Load an accelerator overlay and run a DMA round-trip against it")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the overlay, send the control word and one input frame, print the result.
    /// This is what runs when no subcommand is given.
    Run(RunArgs),
    /// Print the bitstream header and the DMA engines of an overlay without loading it
    Inspect {
        #[arg(help = "bitstream to inspect, its .hwh must sit next to it")]
        bitstream: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long, help = "bitstream to load [default: from config, or design.bit]")]
    bitstream: Option<PathBuf>,
    #[arg(
        long,
        help = r#"platform to run on, e.g. "universal" for Linux hardware
or "simulated" for the in-process board [default: from config, or universal]"#
    )]
    platform: Option<String>,
    #[arg(long, help = "DMA instance carrying input and output [default: axi_dma_0]")]
    data_dma: Option<String>,
    #[arg(long, help = "DMA instance carrying the control word [default: axi_dma_1]")]
    control_dma: Option<String>,
    #[arg(
        long,
        conflicts_with = "zeros",
        help = "raw 28x28 u8 file to send instead of random pixels"
    )]
    input: Option<PathBuf>,
    #[arg(long, help = "send an all-zero frame instead of random pixels")]
    zeros: bool,
    #[arg(long, default_value_t = 1, help = "number of runs")]
    repeat: usize,
}

impl Default for RunArgs {
    fn default() -> Self {
        RunArgs {
            bitstream: None,
            platform: None,
            data_dma: None,
            control_dma: None,
            input: None,
            zeros: false,
            repeat: 1,
        }
    }
}

/// Entry point.
///
/// # Environment Variables
///
/// - `RUST_LOG` - Controls logging level (`trace`, `debug`, `info`, `warn`, `error`
///   or `off`). Defaults to `info`
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    fpgaxfer::register_platforms();

    let cli = Cli::parse();
    debug!("parsed cli command with {cli:?}");
    match cli.command.unwrap_or_else(|| Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run::run_handler(&args)?,
        Commands::Inspect { bitstream } => inspect::inspect_handler(bitstream.as_deref())?,
    }
    Ok(())
}
