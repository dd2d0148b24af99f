//! Implements [`get_perm_range_check_limits`], a pure post-processing pass over a finished trace.

use num_traits::ToPrimitive;

use crate::instr::Instruction;
use crate::memory::Memory;
use crate::trace::Trace;

/// Computes the minimum and maximum of every `(off0, off1, off2)` triple decoded from the
/// instructions a trace executed.
///
/// This supports downstream builtin sizing (the range-check builtin needs to know the spread of
/// offsets actually used); it depends only on `trace` and `memory`, never on live VM state, so it
/// can be run after a run has finished, or against a trace loaded from disk.
pub fn get_perm_range_check_limits(trace: &Trace, memory: &Memory) -> Option<(i16, i16)> {
    let mut min = None;
    let mut max = None;

    for entry in trace.iter() {
        let Some(word) = memory
            .get(entry.pc)
            .and_then(|v| v.scalar().copied())
            .and_then(|f| f.to_u64())
        else {
            continue;
        };

        let instr = Instruction(word);
        for offset in [instr.dst_offset(), instr.op0_offset(), instr.op1_offset()] {
            min = Some(min.map_or(offset, |m: i16| m.min(offset)));
            max = Some(max.map_or(offset, |m: i16| m.max(offset)));
        }
    }

    min.zip(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Pointer, Value};
    use crate::trace::TraceEntry;
    use starknet_types_core::felt::Felt;

    fn instruction_word(dst: i16, op0: i16, op1: i16) -> u64 {
        (dst as u16 as u64) | ((op0 as u16 as u64) << 16) | ((op1 as u16 as u64) << 32)
    }

    #[test]
    fn range_check_limits_scenario() {
        let mut memory = Memory::new();
        memory.add_segment();
        memory.set(Pointer::new(0, 0), Value::Scalar(Felt::from(instruction_word(1, 2, 3)))).unwrap();
        memory.set(Pointer::new(0, 1), Value::Scalar(Felt::from(instruction_word(0, 5, 2)))).unwrap();
        memory.set(Pointer::new(0, 2), Value::Scalar(Felt::from(instruction_word(4, 4, 4)))).unwrap();

        let mut trace = Trace::new();
        trace.push(TraceEntry {
            pc: Pointer::new(0, 0),
            ap: Pointer::new(1, 0),
            fp: Pointer::new(1, 0),
        });
        trace.push(TraceEntry {
            pc: Pointer::new(0, 1),
            ap: Pointer::new(1, 0),
            fp: Pointer::new(1, 0),
        });
        trace.push(TraceEntry {
            pc: Pointer::new(0, 2),
            ap: Pointer::new(1, 0),
            fp: Pointer::new(1, 0),
        });

        assert_eq!(get_perm_range_check_limits(&trace, &memory), Some((0, 5)));
    }

    #[test]
    fn empty_trace_has_no_limits() {
        let memory = Memory::new();
        let trace = Trace::new();
        assert_eq!(get_perm_range_check_limits(&trace, &memory), None);
    }
}
