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

//! Hardware handoff (`.hwh`) reader.
//!
//! Vivado writes a `.hwh` next to every exported bitstream. It is XML, but only two elements
//! matter for driving the overlay:
//!
//! ```text
//! <MODULE INSTANCE="axi_dma_0" MODTYPE="axi_dma" VLNV="xilinx.com:ip:axi_dma:7.1" ...>
//!   <PARAMETERS>
//!     <PARAMETER NAME="C_INCLUDE_S2MM" VALUE="1"/>
//!     <PARAMETER NAME="C_SG_LENGTH_WIDTH" VALUE="26"/>
//!   </PARAMETERS>
//! </MODULE>
//! <MEMRANGE INSTANCE="axi_dma_0" BASEVALUE="0x40400000" HIGHVALUE="0x4040FFFF" .../>
//! ```
//!
//! so this reader walks those elements and ignores everything else.

use crate::error::FpgaxferError;
use crate::system_io::{fs_read, parse_number};
use log::debug;
use roxmltree::{Document, Node};
use std::collections::HashMap;
use std::path::Path;

pub static AXI_DMA_MODTYPE: &str = "axi_dma";

/// An IP block instantiated in the block design.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpModule {
    pub instance: String,
    pub modtype: String,
    pub vlnv: String,
    pub parameters: HashMap<String, String>,
}

/// An address window through which the processor reaches an IP's registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemRange {
    pub base: u64,
    pub high: u64,
}

impl MemRange {
    pub fn size(&self) -> u64 {
        self.high.saturating_sub(self.base) + 1
    }
}

/// What the overlay needs to know to drive one AXI DMA instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmaDescription {
    pub instance: String,
    pub registers: MemRange,
    pub has_send: bool,
    pub has_recv: bool,
    /// Largest transfer the length register can hold.
    pub max_transfer_len: usize,
}

#[derive(Debug, Clone, Default)]
pub struct HardwareHandoff {
    modules: Vec<IpModule>,
    ranges: HashMap<String, MemRange>,
}

fn module_from(node: Node<'_, '_>) -> Result<IpModule, FpgaxferError> {
    let instance = node.attribute("INSTANCE").unwrap_or_default();
    if instance.is_empty() {
        return Err(FpgaxferError::Handoff("MODULE without an INSTANCE attribute".into()));
    }
    // only the module's own PARAMETERS block, bus interfaces carry parameters of their own
    let parameters = node
        .children()
        .filter(|n| n.has_tag_name("PARAMETERS"))
        .flat_map(|n| n.children().filter(|p| p.has_tag_name("PARAMETER")))
        .filter_map(|p| {
            let name = p.attribute("NAME")?;
            let value = p.attribute("VALUE")?;
            Some((name.to_uppercase(), value.to_string()))
        })
        .collect();
    Ok(IpModule {
        instance: instance.to_string(),
        modtype: node.attribute("MODTYPE").unwrap_or_default().to_string(),
        vlnv: node.attribute("VLNV").unwrap_or_default().to_string(),
        parameters,
    })
}

fn parse_address(instance: &str, value: Option<&str>) -> Result<u64, FpgaxferError> {
    value.and_then(|v| parse_number(v)).ok_or_else(|| {
        FpgaxferError::Handoff(format!("MEMRANGE for {instance} has a bad address {value:?}"))
    })
}

impl HardwareHandoff {
    pub fn parse(text: &str) -> Result<HardwareHandoff, FpgaxferError> {
        let document = Document::parse(text)
            .map_err(|e| FpgaxferError::Handoff(format!("malformed handoff XML: {e}")))?;
        let mut handoff = HardwareHandoff::default();

        for node in document.descendants().filter(Node::is_element) {
            match node.tag_name().name() {
                "MODULE" => handoff.modules.push(module_from(node)?),
                "MEMRANGE" => {
                    let Some(instance) = node.attribute("INSTANCE") else {
                        continue;
                    };
                    // the same slave is often listed once per master, first one wins
                    if handoff.ranges.contains_key(instance) {
                        continue;
                    }
                    let base = parse_address(instance, node.attribute("BASEVALUE"))?;
                    let high = parse_address(instance, node.attribute("HIGHVALUE"))?;
                    handoff
                        .ranges
                        .insert(instance.to_string(), MemRange { base, high });
                }
                _ => {}
            }
        }

        debug!(
            "Handoff lists {} modules and {} address ranges",
            handoff.modules.len(),
            handoff.ranges.len()
        );
        Ok(handoff)
    }

    pub fn from_file(path: &Path) -> Result<HardwareHandoff, FpgaxferError> {
        HardwareHandoff::parse(&fs_read(path)?)
    }

    pub fn modules(&self) -> &[IpModule] {
        &self.modules
    }

    pub fn module(&self, instance: &str) -> Option<&IpModule> {
        self.modules.iter().find(|m| m.instance == instance)
    }

    /// Instance names of every IP that has a register window, i.e. everything software can drive.
    pub fn ip_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .modules
            .iter()
            .filter(|m| self.ranges.contains_key(&m.instance))
            .map(|m| m.instance.clone())
            .collect();
        names.sort();
        names
    }

    pub fn address_range(&self, instance: &str) -> Option<MemRange> {
        self.ranges.get(instance).copied()
    }

    /// Describe an AXI DMA instance.
    ///
    /// # Returns: `Result<DmaDescription, FpgaxferError>`
    /// * `Err(FpgaxferError::Argument)` - No such instance, it is not an AXI DMA, or it has
    ///   no register window
    pub fn dma(&self, instance: &str) -> Result<DmaDescription, FpgaxferError> {
        let module = self.module(instance).ok_or_else(|| {
            FpgaxferError::Argument(format!(
                "{instance} is not in the overlay. Available IP: {:?}",
                self.ip_names()
            ))
        })?;
        if module.modtype != AXI_DMA_MODTYPE {
            return Err(FpgaxferError::Argument(format!(
                "{instance} is a {}, not an {AXI_DMA_MODTYPE}",
                module.modtype
            )));
        }
        let registers = self.address_range(instance).ok_or_else(|| {
            FpgaxferError::Argument(format!("{instance} has no register address range"))
        })?;
        let flag = |name: &str| module.parameters.get(name).is_none_or(|v| v != "0");
        let width = module
            .parameters
            .get("C_SG_LENGTH_WIDTH")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(26)
            .min(usize::BITS - 1);
        Ok(DmaDescription {
            instance: instance.to_string(),
            registers,
            has_send: flag("C_INCLUDE_MM2S"),
            has_recv: flag("C_INCLUDE_S2MM"),
            max_transfer_len: (1usize << width) - 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HWH: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="no" ?>
<EDKSYSTEM>
  <!-- generated -->
  <MODULES>
    <MODULE FULLNAME="/axi_dma_0" INSTANCE="axi_dma_0" MODTYPE="axi_dma" VLNV="xilinx.com:ip:axi_dma:7.1">
      <PARAMETERS>
        <PARAMETER NAME="C_INCLUDE_MM2S" VALUE="1"/>
        <PARAMETER NAME="C_INCLUDE_S2MM" VALUE="1"/>
        <PARAMETER NAME="c_sg_length_width" VALUE="14"/>
      </PARAMETERS>
    </MODULE>
    <MODULE INSTANCE="axi_dma_1" MODTYPE="axi_dma" VLNV="xilinx.com:ip:axi_dma:7.1">
      <PARAMETERS>
        <PARAMETER NAME="C_INCLUDE_S2MM" VALUE="0"/>
      </PARAMETERS>
    </MODULE>
    <MODULE INSTANCE="conv_0" MODTYPE="conv3x3" VLNV="user.org:hls:conv3x3:1.0"/>
    <MODULE INSTANCE="processing_system7_0" MODTYPE="processing_system7" VLNV="xilinx.com:ip:processing_system7:5.5">
      <MEMORYMAP>
        <MEMRANGE BASEVALUE="0x40400000" HIGHVALUE="0x4040FFFF" INSTANCE="axi_dma_0" MEMTYPE="REGISTER"/>
        <MEMRANGE BASEVALUE='0x40410000' HIGHVALUE='0x4041FFFF' INSTANCE='axi_dma_1' MEMTYPE='REGISTER'/>
        <MEMRANGE BASEVALUE="0x50000000" HIGHVALUE="0x5000FFFF" INSTANCE="axi_dma_0" MEMTYPE="REGISTER"/>
      </MEMORYMAP>
    </MODULE>
  </MODULES>
</EDKSYSTEM>
"#;

    #[test]
    fn test_modules_and_ranges() {
        let hwh = HardwareHandoff::parse(HWH).unwrap();
        assert_eq!(hwh.modules().len(), 4);
        assert_eq!(hwh.module("conv_0").unwrap().modtype, "conv3x3");
        assert_eq!(
            hwh.address_range("axi_dma_0"),
            Some(MemRange {
                base: 0x4040_0000,
                high: 0x4040_FFFF
            })
        );
        assert_eq!(hwh.address_range("axi_dma_1").unwrap().size(), 0x1_0000);
        assert_eq!(hwh.ip_names(), vec!["axi_dma_0", "axi_dma_1"]);
    }

    #[test]
    fn test_dma_description() {
        let hwh = HardwareHandoff::parse(HWH).unwrap();
        let data = hwh.dma("axi_dma_0").unwrap();
        assert!(data.has_send && data.has_recv);
        assert_eq!(data.max_transfer_len, (1 << 14) - 1);

        let control = hwh.dma("axi_dma_1").unwrap();
        assert!(control.has_send);
        assert!(!control.has_recv);
        assert_eq!(control.max_transfer_len, (1 << 26) - 1);
    }

    #[test]
    fn test_dma_lookup_errors() {
        let hwh = HardwareHandoff::parse(HWH).unwrap();
        let missing = hwh.dma("axi_dma_7").unwrap_err();
        assert!(missing.to_string().contains("not in the overlay"));
        let wrong_type = hwh.dma("conv_0").unwrap_err();
        assert!(wrong_type.to_string().contains("not an axi_dma"));
    }

    #[test]
    fn test_unclosed_module() {
        let err = HardwareHandoff::parse(r#"<MODULE INSTANCE="x" MODTYPE="y">"#).unwrap_err();
        assert!(matches!(err, FpgaxferError::Handoff(_)));
    }

    #[test]
    fn test_bad_address() {
        let err =
            HardwareHandoff::parse(r#"<MEMRANGE INSTANCE="x" BASEVALUE="nope" HIGHVALUE="0x1"/>"#)
                .unwrap_err();
        assert!(err.to_string().contains("bad address"));
    }

    #[test]
    fn test_angle_bracket_in_attribute_value() {
        let hwh = HardwareHandoff::parse(
            r#"<MODULES>
  <MODULE INSTANCE="axi_dma_0" MODTYPE="axi_dma">
    <PARAMETERS>
      <PARAMETER NAME="C_DESCRIPTION" VALUE="width > 32 bits"/>
      <PARAMETER NAME="C_SG_LENGTH_WIDTH" VALUE="16"/>
    </PARAMETERS>
  </MODULE>
  <MEMRANGE BASEVALUE="0x40400000" HIGHVALUE="0x4040FFFF" INSTANCE="axi_dma_0"/>
</MODULES>"#,
        )
        .unwrap();
        let module = hwh.module("axi_dma_0").unwrap();
        assert_eq!(module.parameters["C_DESCRIPTION"], "width > 32 bits");
        assert_eq!(hwh.dma("axi_dma_0").unwrap().max_transfer_len, (1 << 16) - 1);
    }

    #[test]
    fn test_entities_are_decoded() {
        let hwh = HardwareHandoff::parse(
            r#"<MODULES>
  <MODULE INSTANCE="dma&amp;0" MODTYPE="axi_dma" VLNV="a&lt;b&gt;&quot;c&apos;"/>
  <MEMRANGE BASEVALUE="0x40400000" HIGHVALUE="0x4040FFFF" INSTANCE="dma&amp;0"/>
</MODULES>"#,
        )
        .unwrap();
        assert_eq!(hwh.ip_names(), vec!["dma&0"]);
        assert_eq!(hwh.module("dma&0").unwrap().vlnv, "a<b>\"c'");
        assert!(hwh.dma("dma&0").is_ok());
    }

    #[test]
    fn test_bus_interface_parameters_are_ignored() {
        let hwh = HardwareHandoff::parse(
            r#"<MODULE INSTANCE="axi_dma_0" MODTYPE="axi_dma">
  <PARAMETERS>
    <PARAMETER NAME="C_INCLUDE_S2MM" VALUE="1"/>
  </PARAMETERS>
  <BUSINTERFACES>
    <BUSINTERFACE NAME="S_AXIS_S2MM">
      <PARAMETER NAME="C_INCLUDE_S2MM" VALUE="0"/>
    </BUSINTERFACE>
  </BUSINTERFACES>
</MODULE>"#,
        )
        .unwrap();
        assert_eq!(hwh.module("axi_dma_0").unwrap().parameters["C_INCLUDE_S2MM"], "1");
    }
}
