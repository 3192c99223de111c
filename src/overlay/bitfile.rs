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

//! Xilinx `.bit` container codec.
//!
//! A `.bit` file is a short header followed by the raw configuration data:
//!
//! ```text
//! u16 len | 9 byte magic | u16 0x0001
//! 'a' u16 len | design name, e.g. "design;UserID=0XFFFFFFFF;Version=2023.2\0"
//! 'b' u16 len | part, e.g. "7z020clg400\0"
//! 'c' u16 len | date, "2025/01/31\0"
//! 'd' u16 len | time, "12:00:00\0"
//! 'e' u32 len | configuration data
//! ```
//!
//! All lengths are big endian. The Linux FPGA manager wants the configuration data alone with
//! every 32-bit word byte swapped, which is what [`Bitstream::to_bin`] produces.

use crate::error::FpgaxferError;
use crate::system_io::fs_read_bytes;
use log::debug;
use std::path::Path;

pub const BIT_MAGIC: [u8; 9] = [0x0f, 0xf0, 0x0f, 0xf0, 0x0f, 0xf0, 0x0f, 0xf0, 0x00];

/// Metadata fields of a `.bit` header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BitstreamHeader {
    pub design: String,
    pub user_id: Option<String>,
    pub version: Option<String>,
    pub part: String,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone)]
pub struct Bitstream {
    pub header: BitstreamHeader,
    pub data: Vec<u8>,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], FpgaxferError> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(FpgaxferError::Bitstream(format!(
                "truncated while reading {what}: need {len} bytes at offset {}, file has {}",
                self.pos,
                self.bytes.len()
            ))),
        }
    }

    fn u8(&mut self, what: &str) -> Result<u8, FpgaxferError> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &str) -> Result<u16, FpgaxferError> {
        let b = self.take(2, what)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, what: &str) -> Result<u32, FpgaxferError> {
        let b = self.take(4, what)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn string(&mut self, what: &str) -> Result<String, FpgaxferError> {
        let len = self.u16(what)? as usize;
        let raw = self.take(len, what)?;
        Ok(String::from_utf8_lossy(raw)
            .trim_end_matches('\0')
            .to_string())
    }
}

fn split_design_field(field: &str, header: &mut BitstreamHeader) {
    let mut parts = field.split(';');
    header.design = parts.next().unwrap_or_default().to_string();
    for part in parts {
        if let Some(user_id) = part.strip_prefix("UserID=") {
            header.user_id = Some(user_id.to_string());
        } else if let Some(version) = part.strip_prefix("Version=") {
            header.version = Some(version.to_string());
        }
    }
}

impl Bitstream {
    /// Parse a `.bit` file held in memory.
    ///
    /// # Returns: `Result<Bitstream, FpgaxferError>`
    /// * `Ok(Bitstream)` - Header fields and configuration data
    /// * `Err(FpgaxferError::Bitstream)` - Truncated file, bad magic, unknown field tag or
    ///   missing configuration data
    pub fn parse(bytes: &[u8]) -> Result<Bitstream, FpgaxferError> {
        let mut cursor = Cursor { bytes, pos: 0 };
        let magic_len = cursor.u16("magic length")? as usize;
        let magic = cursor.take(magic_len, "magic")?;
        if magic != BIT_MAGIC {
            return Err(FpgaxferError::Bitstream(format!(
                "bad magic {magic:02x?}"
            )));
        }
        let one = cursor.u16("header marker")?;
        if one != 1 {
            return Err(FpgaxferError::Bitstream(format!(
                "expected header marker 0x0001, found {one:#06x}"
            )));
        }

        let mut header = BitstreamHeader::default();
        loop {
            let key = cursor.u8("field tag")?;
            match key {
                b'a' => split_design_field(&cursor.string("design name")?, &mut header),
                b'b' => header.part = cursor.string("part name")?,
                b'c' => header.date = cursor.string("date")?,
                b'd' => header.time = cursor.string("time")?,
                b'e' => {
                    let len = cursor.u32("data length")? as usize;
                    let data = cursor.take(len, "configuration data")?.to_vec();
                    debug!(
                        "Parsed bitstream '{}' for {} ({} bytes)",
                        header.design,
                        header.part,
                        data.len()
                    );
                    return Ok(Bitstream { header, data });
                }
                other => {
                    return Err(FpgaxferError::Bitstream(format!(
                        "unknown field tag {other:#04x} at offset {}",
                        cursor.pos - 1
                    )));
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Bitstream, FpgaxferError> {
        Bitstream::parse(&fs_read_bytes(path)?)
    }

    /// Configuration data in the byte order the FPGA manager expects.
    pub fn to_bin(&self) -> Result<Vec<u8>, FpgaxferError> {
        if self.data.len() % 4 != 0 {
            return Err(FpgaxferError::Bitstream(format!(
                "configuration data is {} bytes, not a whole number of 32-bit words",
                self.data.len()
            )));
        }
        Ok(self
            .data
            .chunks_exact(4)
            .flat_map(|word| [word[3], word[2], word[1], word[0]])
            .collect())
    }
}
