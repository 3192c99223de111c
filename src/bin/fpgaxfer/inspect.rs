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

use fpgaxfer::config::system_config;
use fpgaxfer::error::FpgaxferError;
use fpgaxfer::overlay::OverlayFiles;
use fpgaxfer::overlay::bitfile::Bitstream;
use fpgaxfer::overlay::hwh::HardwareHandoff;
use std::path::Path;

pub fn inspect_handler(bitstream: Option<&Path>) -> Result<(), FpgaxferError> {
    let bitstream = bitstream.unwrap_or(system_config().bitstream.as_path());
    let files = OverlayFiles::locate(bitstream)?;
    let bit = Bitstream::from_file(&files.bitstream)?;
    let handoff = HardwareHandoff::from_file(&files.handoff)?;

    let header = &bit.header;
    println!("bitstream:   {:?}", files.bitstream);
    println!("design:      {}", header.design);
    if let Some(user_id) = &header.user_id {
        println!("user id:     {user_id}");
    }
    if let Some(version) = &header.version {
        println!("version:     {version}");
    }
    println!("part:        {}", header.part);
    println!("built:       {} {}", header.date, header.time);
    println!("config data: {} bytes", bit.data.len());
    match &files.dtbo {
        Some(dtbo) => println!("dtbo:        {dtbo:?}"),
        None => println!("dtbo:        none"),
    }

    println!("ip:");
    for name in handoff.ip_names() {
        match handoff.dma(&name) {
            Ok(dma) => println!(
                "  {name}: axi_dma at {:#x}..={:#x}, send: {}, recv: {}, max transfer {} bytes",
                dma.registers.base,
                dma.registers.high,
                dma.has_send,
                dma.has_recv,
                dma.max_transfer_len
            ),
            Err(_) => {
                let modtype = handoff
                    .module(&name)
                    .map(|m| m.modtype.as_str())
                    .unwrap_or("unknown");
                let base = handoff.address_range(&name).map_or(0, |r| r.base);
                println!("  {name}: {modtype} at {base:#x}");
            }
        }
    }
    Ok(())
}
