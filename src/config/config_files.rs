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

//! TOML config file format.
//!
//! Every section and every key is optional:
//!
//! ```toml
//! [system_paths]
//! fpga_managers_dir = "/sys/class/fpga_manager/"
//! overlay_control_dir = "/config/device-tree/overlays/"
//! firmware_source_dir = "/lib/firmware/"
//! uio_class_dir = "/sys/class/uio/"
//! udmabuf_class_dir = "/sys/class/u-dma-buf/"
//!
//! [hardware]
//! fpga_device = "fpga0"
//! udmabuf_device = "udmabuf0"
//! max_transfer_len = 67108863
//!
//! [transfer]
//! platform = "universal"
//! bitstream = "/home/xilinx/design.bit"
//! data_dma = "axi_dma_0"
//! control_dma = "axi_dma_1"
//!
//! [dma_devices]
//! axi_dma_0 = "uio4"
//! axi_dma_1 = "uio5"
//! ```

use crate::error::FpgaxferError;
use crate::system_io::fs_read;
use log::trace;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// This is the top level struct which holds all sections
#[derive(Debug, Default, Deserialize)]
pub struct TomlConfig {
    pub system_paths: Option<SystemPaths>,
    pub hardware: Option<Hardware>,
    pub transfer: Option<Transfer>,
    /// DMA instance name to UIO device name, for boards where the UIO `addr` lookup fails.
    pub dma_devices: Option<HashMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SystemPaths {
    pub fpga_managers_dir: Option<String>,
    pub overlay_control_dir: Option<String>,
    pub firmware_source_dir: Option<String>,
    pub uio_class_dir: Option<String>,
    pub udmabuf_class_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Hardware {
    pub fpga_device: Option<String>,
    pub udmabuf_device: Option<String>,
    pub max_transfer_len: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Transfer {
    pub platform: Option<String>,
    pub bitstream: Option<String>,
    pub data_dma: Option<String>,
    pub control_dma: Option<String>,
}

impl SystemPaths {
    fn merge(self, fallback: SystemPaths) -> SystemPaths {
        SystemPaths {
            fpga_managers_dir: self.fpga_managers_dir.or(fallback.fpga_managers_dir),
            overlay_control_dir: self.overlay_control_dir.or(fallback.overlay_control_dir),
            firmware_source_dir: self.firmware_source_dir.or(fallback.firmware_source_dir),
            uio_class_dir: self.uio_class_dir.or(fallback.uio_class_dir),
            udmabuf_class_dir: self.udmabuf_class_dir.or(fallback.udmabuf_class_dir),
        }
    }
}

impl Hardware {
    fn merge(self, fallback: Hardware) -> Hardware {
        Hardware {
            fpga_device: self.fpga_device.or(fallback.fpga_device),
            udmabuf_device: self.udmabuf_device.or(fallback.udmabuf_device),
            max_transfer_len: self.max_transfer_len.or(fallback.max_transfer_len),
        }
    }
}

impl Transfer {
    fn merge(self, fallback: Transfer) -> Transfer {
        Transfer {
            platform: self.platform.or(fallback.platform),
            bitstream: self.bitstream.or(fallback.bitstream),
            data_dma: self.data_dma.or(fallback.data_dma),
            control_dma: self.control_dma.or(fallback.control_dma),
        }
    }
}

/// Merge two optional sections, preferring keys from `primary`.
fn merge_section<T: Default>(
    primary: Option<T>,
    fallback: Option<T>,
    merge: fn(T, T) -> T,
) -> Option<T> {
    match (primary, fallback) {
        (None, None) => None,
        (p, f) => Some(merge(p.unwrap_or_default(), f.unwrap_or_default())),
    }
}

impl TomlConfig {
    /// Combine two configs key by key. Keys present in `self` win.
    pub fn merge(self, fallback: TomlConfig) -> TomlConfig {
        let dma_devices = match (self.dma_devices, fallback.dma_devices) {
            (None, None) => None,
            (primary, fallback) => {
                let mut merged = fallback.unwrap_or_default();
                merged.extend(primary.unwrap_or_default());
                Some(merged)
            }
        };
        TomlConfig {
            system_paths: merge_section(
                self.system_paths,
                fallback.system_paths,
                SystemPaths::merge,
            ),
            hardware: merge_section(self.hardware, fallback.hardware, Hardware::merge),
            transfer: merge_section(self.transfer, fallback.transfer, Transfer::merge),
            dma_devices,
        }
    }
}

pub fn toml_str_to_config(toml_string: &str) -> Result<TomlConfig, FpgaxferError> {
    toml::from_str(toml_string).map_err(|e| FpgaxferError::TomlDe {
        toml_string: toml_string.into(),
        e,
    })
}

pub fn config_from_file(file_path: &Path) -> Result<TomlConfig, FpgaxferError> {
    if !file_path.is_file() {
        return Err(FpgaxferError::Internal(format!(
            "Config file not found in {file_path:?}"
        )));
    }
    let config = toml_str_to_config(&fs_read(file_path)?)?;
    trace!("Read {config:?} from {file_path:?}");
    Ok(config)
}
