//! Reconstructs a call traceback from memory, following the `fp-2`/`fp-1` calling convention.

use num_traits::ToPrimitive;

use crate::instr::Instruction;
use crate::memory::{Memory, Pointer};

/// The maximum number of frames a traceback walk will ever collect, even if the frame chain
/// cycles back on itself.
pub const MAX_TRACEBACK_ENTRIES: usize = 20;

fn fetch_word(memory: &Memory, addr: Pointer) -> Option<u64> {
    memory.get(addr)?.scalar()?.to_u64()
}

/// Walks the call stack starting at `fp`, returning the pc of each `call` instruction that led
/// to the current frame, most recent call last.
///
/// This is purely a best-effort reconstruction from whatever memory happens to hold: it is used
/// for diagnostics after an error, when memory may be only partially initialized, so every step
/// is defensive and simply stops instead of raising.
pub fn get_traceback_entries(memory: &Memory, fp: Pointer) -> Vec<Pointer> {
    let mut entries = Vec::new();
    let mut fp = fp;

    for _ in 0..MAX_TRACEBACK_ENTRIES {
        let Some(fp_minus_2) = fp.checked_sub(2) else {
            break;
        };
        let Some(fp_minus_1) = fp.checked_sub(1) else {
            break;
        };

        // The outermost frame has its own saved fp pointing back at itself.
        if memory.get(fp_minus_2).map(|v| v.pointer().copied()) == Some(Some(fp)) {
            break;
        }

        let Some(prev_fp) = memory.get(fp_minus_2).and_then(|v| v.pointer().copied()) else {
            break;
        };
        let Some(ret_pc) = memory.get(fp_minus_1).and_then(|v| v.pointer().copied()) else {
            break;
        };

        let Some(call_pc) = find_call_pc(memory, ret_pc) else {
            break;
        };

        entries.push(call_pc);
        fp = prev_fp;
    }

    entries.reverse();
    entries
}

/// Determines the pc of the `call` instruction that produced `ret_pc`, preferring the single-word
/// interpretation over the two-word (with immediate) one when both would decode, matching the
/// reference implementation's documented preference.
fn find_call_pc(memory: &Memory, ret_pc: Pointer) -> Option<Pointer> {
    let ret_pc_minus_1 = ret_pc.checked_sub(1)?;

    if let Some(word) = fetch_word(memory, ret_pc_minus_1) {
        if Instruction(word).is_call_instruction() {
            return Some(ret_pc_minus_1);
        }
    }

    let ret_pc_minus_2 = ret_pc.checked_sub(2)?;
    let word = fetch_word(memory, ret_pc_minus_2)?;
    if Instruction(word).is_call_instruction_with_immediate() && memory.contains(ret_pc_minus_1) {
        return Some(ret_pc_minus_2);
    }

    None
}
