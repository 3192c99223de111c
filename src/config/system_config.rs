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

use crate::config;
use crate::config::config_files::{TomlConfig, config_from_file};
use log::{trace, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Fully resolved configuration: every value is either from a config file or a hardcoded default.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    pub fpga_managers_dir: PathBuf,
    pub overlay_control_dir: PathBuf,
    pub firmware_source_dir: PathBuf,
    pub uio_class_dir: PathBuf,
    pub udmabuf_class_dir: PathBuf,
    pub fpga_device: String,
    pub udmabuf_device: String,
    pub max_transfer_len: usize,
    pub platform: String,
    pub bitstream: PathBuf,
    pub data_dma: String,
    pub control_dma: String,
    pub dma_devices: HashMap<String, String>,
}

static CONFIG: OnceLock<SystemConfig> = OnceLock::new();

impl Default for SystemConfig {
    fn default() -> Self {
        TomlConfig::default().into()
    }
}

impl From<TomlConfig> for SystemConfig {
    fn from(value: TomlConfig) -> Self {
        trace!("Creating SystemConfig from {value:?}");
        let paths = value.system_paths.unwrap_or_default();
        let hardware = value.hardware.unwrap_or_default();
        let transfer = value.transfer.unwrap_or_default();
        let path_or = |v: Option<String>, default: &str| {
            PathBuf::from(v.unwrap_or_else(|| default.to_string()))
        };
        SystemConfig {
            fpga_managers_dir: path_or(paths.fpga_managers_dir, config::FPGA_MANAGERS_DIR),
            overlay_control_dir: path_or(paths.overlay_control_dir, config::OVERLAY_CONTROL_DIR),
            firmware_source_dir: path_or(paths.firmware_source_dir, config::FIRMWARE_SOURCE_DIR),
            uio_class_dir: path_or(paths.uio_class_dir, config::UIO_CLASS_DIR),
            udmabuf_class_dir: path_or(paths.udmabuf_class_dir, config::UDMABUF_CLASS_DIR),
            fpga_device: hardware
                .fpga_device
                .unwrap_or_else(|| config::DEFAULT_FPGA_DEVICE.to_string()),
            udmabuf_device: hardware
                .udmabuf_device
                .unwrap_or_else(|| config::DEFAULT_UDMABUF_DEVICE.to_string()),
            max_transfer_len: hardware
                .max_transfer_len
                .unwrap_or(config::DEFAULT_MAX_TRANSFER_LEN),
            platform: transfer
                .platform
                .unwrap_or_else(|| config::DEFAULT_PLATFORM.to_string()),
            bitstream: path_or(transfer.bitstream, config::DEFAULT_BITSTREAM),
            data_dma: transfer
                .data_dma
                .unwrap_or_else(|| config::DEFAULT_DATA_DMA.to_string()),
            control_dma: transfer
                .control_dma
                .unwrap_or_else(|| config::DEFAULT_CONTROL_DMA.to_string()),
            dma_devices: value.dma_devices.unwrap_or_default(),
        }
    }
}

/// User config overrides vendor config and vendor config overrides hardcoded defaults
pub fn load_system_config(user_path: &Path, vendor_path: &Path) -> SystemConfig {
    let vendor_config = config_from_file(vendor_path).unwrap_or_else(|e| {
        warn!("Using hardcoded values for vendor config because loading config failed: {e}");
        TomlConfig::default()
    });
    let user_config = config_from_file(user_path).unwrap_or_else(|e| {
        warn!("Using hardcoded values for user config because loading config failed: {e}");
        TomlConfig::default()
    });
    trace!("Merging user_config: {user_config:?} with vendor_config {vendor_config:?}");
    let merged: SystemConfig = user_config.merge(vendor_config).into();
    trace!("Resulting config: {merged:?}");
    merged
}

pub fn system_config() -> &'static SystemConfig {
    CONFIG.get_or_init(|| {
        load_system_config(
            Path::new(config::USER_CONFIG_PATH),
            Path::new(config::VENDOR_CONFIG_PATH),
        )
    })
}
