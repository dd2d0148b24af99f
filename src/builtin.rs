//! Defines [`BuiltinRunner`], the seam through which an external collaborator augments a segment
//! with validation and/or auto-deduction rules.
//!
//! Builtin runners themselves (range-check, pedersen, bitwise, ...) are out of scope for this
//! crate: it only defines how one attaches to a segment, never what it computes.

use std::fmt;

use crate::memory::deduction::AutoDeductionRule;
use crate::memory::validated::ValidationRule;

/// An opaque collaborator that augments a specific memory segment with stronger invariants than
/// plain write-once memory, without the VM core needing to know what those invariants are.
///
/// A builtin that only restricts (e.g. range-check) implements `validation_rule` and leaves
/// `auto_deduction_rule` at its default; one that also fills in absent cells (e.g. pedersen's
/// output cell) implements both.
pub trait BuiltinRunner: fmt::Debug {
    /// A short, stable name for this builtin, used in diagnostics.
    fn name(&self) -> &str;

    /// Returns the validation rule this builtin wants run on every write to its segment, if any.
    fn validation_rule(&self) -> Option<Box<dyn ValidationRule>> {
        None
    }

    /// Returns the auto-deduction rule this builtin wants run on every absent read from its
    /// segment, if any.
    fn auto_deduction_rule(&self) -> Option<Box<dyn AutoDeductionRule>> {
        None
    }
}
