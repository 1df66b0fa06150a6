mod cache_tests;
mod tests;

use crate::trace::{InstructionType, TraceRecord};

/// Generates a repeatable instruction stream with a mix of loads and stores over a working set
/// larger than the default caches
pub(crate) fn synthetic_trace(length: u32) -> Vec<TraceRecord> {
    let mut state: u32 = 0x2545_f491;
    (0..length)
        .map(|i| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let instruction_type = match state >> 30 {
                0 => InstructionType::Load,
                1 => InstructionType::Store,
                _ => InstructionType::Other,
            };
            TraceRecord {
                // Mostly sequential code with the occasional jump
                instruction_address: 0x0040_0000 + (i % 4096) * 4 + (state & 0x7) * 0x1_0000,
                instruction_type,
                load_store_address: 0x1000_0000 + (state >> 8) % (2 * 1024 * 1024),
            }
        })
        .collect()
}
