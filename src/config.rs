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

//! Hardcoded defaults and config file loading.
//!
//! The values here are used when neither `/etc/fpgaxfer/config.toml` nor
//! `/usr/lib/fpgaxfer/config.toml` provides one. See [`config_files`] for the file format and
//! [`system_config`] for how the layers are merged.

pub mod config_files;
pub mod system_config;

pub use system_config::{SystemConfig, system_config};

/// The driver-decided location of fpga_manager objects. Typically `/sys/class/fpga_manager/`.
pub static FPGA_MANAGERS_DIR: &str = "/sys/class/fpga_manager/";

/// The device-tree overlay directory within configfs. Often remounted to
/// `/config/device-tree/overlays/`.
pub static OVERLAY_CONTROL_DIR: &str = "/sys/kernel/config/device-tree/overlays/";

/// Where converted `.bin` bitstreams are written so the kernel firmware loader can find them.
pub static FIRMWARE_SOURCE_DIR: &str = "/lib/firmware/";

/// Userspace I/O devices. Each AXI DMA instance in the overlay is expected to have one.
pub static UIO_CLASS_DIR: &str = "/sys/class/uio/";

/// Attributes (`phys_addr`, `size`) of u-dma-buf contiguous memory devices.
pub static UDMABUF_CLASS_DIR: &str = "/sys/class/u-dma-buf/";

/// Device nodes for UIO and u-dma-buf.
pub static DEV_DIR: &str = "/dev/";

pub static VENDOR_CONFIG_PATH: &str = "/usr/lib/fpgaxfer/config.toml";
pub static USER_CONFIG_PATH: &str = "/etc/fpgaxfer/config.toml";

pub static DEFAULT_FPGA_DEVICE: &str = "fpga0";
pub static DEFAULT_UDMABUF_DEVICE: &str = "udmabuf0";

/// AXI DMA defaults to a 26 bit buffer length register.
pub const DEFAULT_MAX_TRANSFER_LEN: usize = (1 << 26) - 1;

pub static DEFAULT_PLATFORM: &str = "universal";
pub static DEFAULT_BITSTREAM: &str = "design.bit";
pub static DEFAULT_DATA_DMA: &str = "axi_dma_0";
pub static DEFAULT_CONTROL_DMA: &str = "axi_dma_1";
