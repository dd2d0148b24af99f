//! Defines the [`Error`] type of the crate, and the [`VmException`] wrapper used to attach
//! diagnostic context (current pc, source location, traceback) to an error raised mid-step.

use crate::memory::{Pointer, Value};
use crate::program::InstructionLocation;

/// An error that occurred while decoding the raw bits of an instruction word.
///
/// Decoding *semantics* beyond what the interpreter consumes are out of scope for this crate (see
/// the crate-level documentation); this type only captures the handful of malformed-encoding
/// cases the interpreter must still detect and report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// A memory cell that was expected to hold an instruction did not fit in a 64-bit word.
    #[error("instruction word does not fit in 64 bits")]
    UndefinedInstruction,
    /// The bits selecting the source of the second operand did not match any known encoding.
    #[error("undefined op1 source bits")]
    UndefinedOp1Source,
    /// The bits selecting the result logic did not match any known encoding.
    #[error("undefined result logic bits")]
    UndefinedResultLogic,
    /// The bits selecting the program counter update rule did not match any known encoding.
    #[error("undefined pc update bits")]
    UndefinedPcUpdate,
    /// The bits selecting the allocation pointer update rule did not match any known encoding.
    #[error("undefined ap update bits")]
    UndefinedApUpdate,
    /// The bits selecting the op-code did not match any known encoding.
    #[error("undefined op code bits")]
    UndefinedOpCode,
    /// A `call` instruction requested a non-default ap update, which is not allowed.
    #[error("a `call` instruction cannot use a non-default ap update")]
    UndefinedApUpdateInCall,
    /// The highest bit of the instruction word was set, which no valid instruction ever does.
    #[error("the instruction's high bit is set")]
    NonZeroHighBit,
}

/// An error that might occur while executing a program in the virtual machine.
///
/// Every case listed in the crate's error handling design is represented here by name, so that
/// callers can match on the specific failure instead of parsing a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The VM ran out of (simulated) memory while growing a segment.
    #[error("out of memory while growing a segment")]
    OutOfMemory,
    /// The program counter does not reference a known instruction.
    #[error("the program counter does not reference a known instruction")]
    ProgramCounterLost,
    /// A write targeted a segment that has not been allocated yet.
    #[error("cannot write to {addr:?}: its segment has not been allocated")]
    SegmentNotAllocated { addr: Pointer },
    /// The value of the first operand of an instruction could not be deduced from a builtin, a
    /// hint, or a previous assertion.
    #[error("could not deduce the value of the first operand")]
    CantDeduceOp0,
    /// The value of the second operand of an instruction could not be deduced from a builtin, a
    /// hint, or a previous assertion.
    #[error("could not deduce the value of the second operand")]
    CantDeduceOp1,
    /// Attempted to construct a pointer from a value that cannot be represented in memory.
    #[error("pointer value is too large to be represented")]
    PointerTooLarge,
    /// Attempted to subtract a pointer from a scalar.
    #[error("attempted to subtract a pointer from a scalar")]
    SubtractPointer,
    /// Attempted to divide by a pointer.
    #[error("attempted to divide by a pointer")]
    DivideByPointer,
    /// Attempted to divide a pointer.
    #[error("attempted to divide a pointer")]
    DividePointer,
    /// Attempted to divide by zero.
    #[error("attempted to divide by zero")]
    DivideByZero,
    /// Attempted to add two pointers together.
    #[error("attempted to add two pointers together")]
    AddPointer,
    /// Attempted to multiply a pointer by anything.
    #[error("attempted to multiply a pointer")]
    MultiplyPointer,
    /// A pointer operation was attempted between addresses of different segments.
    #[error("pointer operation between addresses of different segments")]
    IncoherentProvenance,

    /// A write to an already-written memory cell supplied a different value than the one
    /// already stored there.
    #[error("memory cell {addr:?} was written with {new:?}, but it already holds {existing:?}")]
    InconsistentMemory {
        addr: Pointer,
        existing: Value,
        new: Value,
    },

    /// An auto-deduction rule produced a value that disagrees with what is already stored in
    /// memory, found by the end-of-run verifier.
    #[error(
        "auto-deduction for {addr:?} produced {expected:?}, but memory holds {current:?}"
    )]
    InconsistentAutoDeduction {
        addr: Pointer,
        current: Value,
        expected: Value,
    },

    /// A validation rule rejected the value written to a memory cell.
    #[error("validation rule rejected the value written at {addr:?}: {reason}")]
    ValidationFailed { addr: Pointer, reason: String },

    /// An instruction required the value of a memory cell that is absent, and no auto-deduction
    /// rule produced one.
    #[error("memory cell {0:?} is absent and no auto-deduction rule produced a value for it")]
    UnknownMemoryCell(Pointer),

    /// A hint handler failed while executing.
    #[error("hint {hint_id} failed: {message}")]
    HintError { hint_id: usize, message: String },

    /// `exit_scope()` was called with only the main scope present, or `end_run()` found more
    /// than one open scope.
    #[error("every enter_scope() requires a corresponding exit_scope()")]
    UnbalancedScope,

    /// The loaded program's prime does not match the VM's prime.
    #[error("program prime does not match the VM's prime")]
    PrimeMismatch,

    /// `VmConfig::program_base` named a segment other than the one the constructor allocated
    /// for the program.
    #[error("program_base refers to segment {actual}, but the program segment is {expected}")]
    ProgramBaseMismatch { expected: usize, actual: usize },

    /// `VmConfig::initial_ap` named a segment other than the one the constructor allocated for
    /// the execution area.
    #[error("initial_ap refers to segment {actual}, but the execution segment is {expected}")]
    InitialApMismatch { expected: usize, actual: usize },

    /// Decoding the raw bits of an instruction failed.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Wraps an [`Error`] with the diagnostic context the propagation policy requires: the pc at
/// which it fired, the source location for that pc (if debug info is available), a reconstructed
/// traceback, free-form notes, and (for hint errors) the index of the hint within its pc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmException {
    /// The program counter that was executing when the error occurred.
    pub pc: Pointer,
    /// The source location associated with `pc`, if debug info was loaded for the program.
    pub location: Option<InstructionLocation>,
    /// The underlying cause.
    pub inner: Error,
    /// The reconstructed call traceback, most recent call last, if one could be computed.
    pub traceback: Option<Vec<Pointer>>,
    /// Free-form diagnostic notes attached while propagating the error.
    pub notes: Vec<String>,
    /// The index of the hint (within the hints registered at `pc`) that raised this error, if
    /// the error originated from a hint.
    pub hint_index: Option<usize>,
}

impl std::fmt::Display for VmException {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "error at pc={:?}: {}", self.pc, self.inner)?;
        if let Some(index) = self.hint_index {
            write!(f, " (hint index {index})")?;
        }
        for note in &self.notes {
            write!(f, "\nnote: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for VmException {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.inner)
    }
}
