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

use crate::RunArgs;
use fpgaxfer::config::system_config;
use fpgaxfer::error::FpgaxferError;
use fpgaxfer::platforms::platform::platform_for_known_platform;
use fpgaxfer::sequencer::{InputImage, OutputResult, TransferConfig, run_transfer};
use log::info;

/// Config file values, overridden by whatever was given on the command line.
fn transfer_config(args: &RunArgs) -> TransferConfig {
    let mut config = TransferConfig::from(system_config());
    if let Some(bitstream) = &args.bitstream {
        config.bitstream = bitstream.clone();
    }
    if let Some(data_dma) = &args.data_dma {
        config.data_dma = data_dma.clone();
    }
    if let Some(control_dma) = &args.control_dma {
        config.control_dma = control_dma.clone();
    }
    config
}

fn input_image(args: &RunArgs) -> Result<InputImage, FpgaxferError> {
    match (&args.input, args.zeros) {
        (Some(path), _) => InputImage::from_file(path),
        (None, true) => Ok(InputImage::zeros()),
        (None, false) => Ok(InputImage::random()),
    }
}

fn print_result(result: &OutputResult) {
    for row in result.pixels().chunks(result.cols()) {
        let line: Vec<String> = row.iter().map(|p| format!("{p:3}")).collect();
        println!("{}", line.join(" "));
    }
}

pub fn run_handler(args: &RunArgs) -> Result<(), FpgaxferError> {
    let platform_name = args
        .platform
        .clone()
        .unwrap_or_else(|| system_config().platform.clone());
    let platform = platform_for_known_platform(&platform_name)?;
    let config = transfer_config(args);
    info!("Running on the {platform_name} platform with {config:?}");

    for run in 1..=args.repeat {
        let input = input_image(args)?;
        let result = run_transfer(platform.as_ref(), &config, &input)?;
        info!("Run {run}/{} complete", args.repeat);
        print_result(&result);
    }

    let stats = platform.pool_stats()?;
    info!(
        "{} allocations, {} releases, {} bytes still in use, peak {} bytes",
        stats.allocations, stats.releases, stats.bytes_in_use, stats.peak_bytes
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_data(file: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/test_data")
            .join(file)
    }

    #[test]
    fn test_config_values_are_kept_without_options() {
        let config = transfer_config(&RunArgs::default());
        assert_eq!(config, TransferConfig::from(system_config()));
    }

    #[test]
    fn test_command_line_overrides_config() {
        let args = RunArgs {
            bitstream: Some(PathBuf::from("/lib/firmware/other.bit")),
            data_dma: Some("axi_dma_2".to_string()),
            ..RunArgs::default()
        };
        let config = transfer_config(&args);
        assert_eq!(config.bitstream, PathBuf::from("/lib/firmware/other.bit"));
        assert_eq!(config.data_dma, "axi_dma_2");
        assert_eq!(config.control_dma, system_config().control_dma);

        let args = RunArgs {
            control_dma: Some("axi_dma_3".to_string()),
            ..RunArgs::default()
        };
        let config = transfer_config(&args);
        assert_eq!(config.control_dma, "axi_dma_3");
        assert_eq!(config.data_dma, system_config().data_dma);
        assert_eq!(config.bitstream, system_config().bitstream);
    }

    #[test]
    fn test_input_file_is_read() {
        let args = RunArgs {
            input: Some(test_data("input.raw")),
            ..RunArgs::default()
        };
        let input = input_image(&args).unwrap();
        assert_eq!(
            input,
            InputImage::from_file(&test_data("input.raw")).unwrap()
        );
    }

    #[test]
    fn test_zeros_flag() {
        let args = RunArgs {
            zeros: true,
            ..RunArgs::default()
        };
        assert_eq!(input_image(&args).unwrap(), InputImage::zeros());
    }

    #[test]
    fn test_random_input_by_default() {
        let input = input_image(&RunArgs::default()).unwrap();
        assert_eq!(input.pixels().len(), 28 * 28);
    }

    #[test]
    fn test_missing_input_file() {
        let args = RunArgs {
            input: Some(test_data("does_not_exist.raw")),
            ..RunArgs::default()
        };
        let err = input_image(&args).unwrap_err();
        assert!(matches!(err, FpgaxferError::IORead { .. }));
    }
}
