//! Defines [`VmConfig`], the in-process construction parameters for a [`CairoVM`](crate::CairoVM).
//!
//! This is not a file or CLI configuration loader (that is explicitly out of scope, see the
//! crate-level documentation) — it is the struct a host hands to [`CairoVM::new`](crate::CairoVM::new)
//! after it has already loaded and parsed a [`Program`].

use crate::builtin::BuiltinRunner;
use crate::memory::{Pointer, Value};
use crate::program::Program;
use crate::scope::Scope;

/// The construction parameters for a [`CairoVM`](crate::CairoVM).
pub struct VmConfig {
    /// The program to load.
    pub program: Program,
    /// The offset, relative to `program_base`, of the first instruction to execute.
    pub entrypoint: usize,
    /// Where the program's first instruction is placed. Defaults to `(0, 0)` (segment 0, the
    /// first segment allocated) if not set by the caller.
    pub program_base: Pointer,
    /// The initial value of the allocation pointer.
    pub initial_ap: Pointer,
    /// The initial value of the frame pointer. Usually equal to `initial_ap`.
    pub initial_fp: Pointer,
    /// Seed bindings for the main scope, visible to every hint until overwritten or shadowed by
    /// an inner scope.
    pub hint_locals: Scope,
    /// Builtin runners to attach, paired with the segment index each one governs.
    pub builtin_runners: Vec<(usize, Box<dyn BuiltinRunner>)>,
    /// A pluggable equality predicate used by `verify_auto_deductions` in place of plain
    /// structural equality (see the crate's design notes on `check_eq`).
    pub check_eq: Box<dyn Fn(Value, Value) -> bool>,
}

impl VmConfig {
    /// Creates a configuration for `program`, with no builtins and default register values.
    ///
    /// `entrypoint` is the offset, in the program segment, of the first instruction to execute.
    pub fn new(program: Program, entrypoint: usize) -> Self {
        let program_base = Pointer::new(0, 0);
        Self {
            program,
            entrypoint,
            program_base,
            initial_ap: Pointer::new(1, 0),
            initial_fp: Pointer::new(1, 0),
            hint_locals: Scope::new(),
            builtin_runners: Vec::new(),
            check_eq: Box::new(|a, b| a == b),
        }
    }

    /// Attaches a builtin runner to `segment_index`.
    pub fn with_builtin(mut self, segment_index: usize, runner: Box<dyn BuiltinRunner>) -> Self {
        self.builtin_runners.push((segment_index, runner));
        self
    }
}
