// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Read planning
//!
//! Groups the registers of a map into as few Modbus read requests as the
//! protocol limits allow. Registers of the same area whose addresses touch or
//! overlap are merged into one block.

use super::register_map::{RegisterArea, RegisterMap};

/// Largest register count of a single read request (FC03/FC04).
pub const MAX_READ_REGISTERS: u16 = 125;

/// Largest bit count of a single read request (FC01/FC02).
pub const MAX_READ_BITS: u16 = 2000;

/// One read request and the registers it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBlock {
    pub area: RegisterArea,
    pub start: u16,
    pub count: u16,
    /// Names of the registers found inside this block.
    pub members: Vec<String>,
}

impl ReadBlock {
    fn end(&self) -> u32 {
        self.start as u32 + self.count as u32
    }
}

fn limit(area: RegisterArea) -> u32 {
    if area.is_bit() {
        MAX_READ_BITS as u32
    } else {
        MAX_READ_REGISTERS as u32
    }
}

/// Plan the reads needed to refresh every register of `map`.
pub fn plan_reads(map: &RegisterMap) -> Vec<ReadBlock> {
    let mut specs: Vec<_> = map.iter().collect();
    specs.sort_by_key(|spec| (spec.area, spec.address, spec.width));

    let mut blocks: Vec<ReadBlock> = Vec::new();
    for spec in specs {
        let spec_end = spec.address as u32 + spec.width as u32;
        if let Some(block) = blocks.last_mut() {
            let mergeable = block.area == spec.area
                && spec.address as u32 <= block.end()
                && spec_end.max(block.end()) - block.start as u32 <= limit(spec.area);
            if mergeable {
                block.count = (spec_end.max(block.end()) - block.start as u32) as u16;
                block.members.push(spec.name.clone());
                continue;
            }
        }
        blocks.push(ReadBlock {
            area: spec.area,
            start: spec.address,
            count: spec.width,
            members: vec![spec.name.clone()],
        });
    }
    blocks
}
