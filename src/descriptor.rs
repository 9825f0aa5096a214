use std::collections::BTreeMap;
use thiserror::Error;

// Item types
const ITEM_TYPE_MAIN: u8 = 0;
const ITEM_TYPE_GLOBAL: u8 = 1;

// Main item tags
const MAIN_OUTPUT: u8 = 0x9;

// Global item tags
const GLOBAL_REPORT_SIZE: u8 = 0x7;
const GLOBAL_REPORT_ID: u8 = 0x8;
const GLOBAL_REPORT_COUNT: u8 = 0x9;
const GLOBAL_PUSH: u8 = 0xA;
const GLOBAL_POP: u8 = 0xB;

const LONG_ITEM_PREFIX: u8 = 0xFE;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("report descriptor truncated at offset {0}")]
    Truncated(usize),
    #[error("report descriptor pops an empty global stack at offset {0}")]
    UnbalancedPop(usize),
    #[error("report descriptor declares no output report")]
    NoOutputReport,
}

#[derive(Debug, Default, Clone, Copy)]
struct GlobalState {
    report_size: u32,
    report_count: u32,
    report_id: u8,
}

/// Computes the output report length the way Windows reports
/// `OutputReportByteLength`: the longest output report in bytes plus one
/// leading report ID byte, which is present even when the device declares
/// no report IDs.
pub fn output_report_length(descriptor: &[u8]) -> Result<usize, DescriptorError> {
    let mut globals = GlobalState::default();
    let mut stack: Vec<GlobalState> = Vec::new();
    let mut output_bits: BTreeMap<u8, u64> = BTreeMap::new();

    let mut offset = 0;
    while offset < descriptor.len() {
        let prefix = descriptor[offset];

        if prefix == LONG_ITEM_PREFIX {
            let data_size = *descriptor
                .get(offset + 1)
                .ok_or(DescriptorError::Truncated(offset))? as usize;
            if offset + 3 + data_size > descriptor.len() {
                return Err(DescriptorError::Truncated(offset));
            }
            offset += 3 + data_size;
            continue;
        }

        let data_size = match prefix & 0x03 {
            3 => 4,
            size => size as usize,
        };
        let item_type = (prefix >> 2) & 0x03;
        let tag = prefix >> 4;

        let data = descriptor
            .get(offset + 1..offset + 1 + data_size)
            .ok_or(DescriptorError::Truncated(offset))?;
        let value = data
            .iter()
            .rev()
            .fold(0u32, |value, &byte| (value << 8) | byte as u32);

        match (item_type, tag) {
            (ITEM_TYPE_MAIN, MAIN_OUTPUT) => {
                *output_bits.entry(globals.report_id).or_default() +=
                    globals.report_size as u64 * globals.report_count as u64;
            }
            (ITEM_TYPE_GLOBAL, GLOBAL_REPORT_SIZE) => globals.report_size = value,
            (ITEM_TYPE_GLOBAL, GLOBAL_REPORT_COUNT) => globals.report_count = value,
            (ITEM_TYPE_GLOBAL, GLOBAL_REPORT_ID) => globals.report_id = value as u8,
            (ITEM_TYPE_GLOBAL, GLOBAL_PUSH) => stack.push(globals),
            (ITEM_TYPE_GLOBAL, GLOBAL_POP) => {
                globals = stack.pop().ok_or(DescriptorError::UnbalancedPop(offset))?;
            }
            _ => {}
        }

        offset += 1 + data_size;
    }

    let longest_bits = output_bits
        .values()
        .copied()
        .max()
        .filter(|&bits| bits > 0)
        .ok_or(DescriptorError::NoOutputReport)?;

    Ok(longest_bits.div_ceil(8) as usize + 1)
}
