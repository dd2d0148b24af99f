//! Defines [`AutoDeductionRegistry`], the per-segment registry of rules that fill in absent
//! memory cells on demand.

use std::fmt;

use crate::error::Error;

use super::validated::ValidatedMemory;
use super::{Pointer, Value};

/// A rule able to compute the value of a memory cell it has not seen written yet.
///
/// Builtins register these for their own segment: the range-check builtin has no rule (it only
/// validates), while the pedersen or bitwise builtins deduce their "output" cells from the inputs
/// that came before them.
pub trait AutoDeductionRule: fmt::Debug {
    /// Attempts to deduce the value that should be stored at `addr`.
    ///
    /// Returns `Ok(None)` when this particular rule has nothing to say about `addr` (the caller
    /// tries the next rule registered for the segment); `Ok(Some(value))` when it does.
    fn deduce(&self, memory: &ValidatedMemory, addr: Pointer) -> Result<Option<Value>, Error>;
}

/// Holds the ordered list of [`AutoDeductionRule`]s registered for each segment.
///
/// Rules are tried in registration order and the first one to produce a value wins; this mirrors
/// how a cell can only ever be explained by a single builtin, even if several are attached to the
/// same segment over the lifetime of a run.
#[derive(Default, Debug)]
pub struct AutoDeductionRegistry {
    rules: Vec<Vec<Box<dyn AutoDeductionRule>>>,
}

impl AutoDeductionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `rule` for `segment_index`, after any rule already registered for that segment.
    pub fn add_rule(&mut self, segment_index: usize, rule: Box<dyn AutoDeductionRule>) {
        if segment_index >= self.rules.len() {
            self.rules.resize_with(segment_index + 1, Vec::new);
        }
        self.rules[segment_index].push(rule);
    }

    fn rules_for(&self, segment_index: usize) -> &[Box<dyn AutoDeductionRule>] {
        self.rules
            .get(segment_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Tries every rule registered for `addr`'s segment, in order, and writes the first value
    /// produced back through `memory`.
    ///
    /// Returns `Ok(None)` if no rule fired, leaving `addr` absent; the caller then reports
    /// [`Error::UnknownMemoryCell`] or [`Error::CantDeduceOp0`]/[`Error::CantDeduceOp1`] as
    /// appropriate for the context it was reading in.
    pub fn deduce_memory_cell(
        &self,
        memory: &mut ValidatedMemory,
        addr: Pointer,
    ) -> Result<Option<Value>, Error> {
        for rule in self.rules_for(addr.segment) {
            if let Some(value) = rule.deduce(memory, addr)? {
                tracing::trace!(?addr, ?value, "auto-deduction rule fired");
                memory.set(addr, value)?;
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// End-of-run consistency sweep.
    ///
    /// For every address currently holding a value, re-runs every rule registered for its
    /// segment. If a rule produces a value that disagrees with what is stored, according to
    /// `check_eq`, the run is rejected with [`Error::InconsistentAutoDeduction`].
    ///
    /// `check_eq` is a pluggable equality predicate rather than plain `==` so that a future
    /// builtin (or a subclassing caller, in the original design) can treat e.g. two different
    /// representations of "no value" as equivalent without this registry needing to know about
    /// it.
    pub fn verify_auto_deductions(
        &self,
        memory: &ValidatedMemory,
        check_eq: &dyn Fn(Value, Value) -> bool,
    ) -> Result<(), Error> {
        for (addr, value_ref) in memory.iter_addresses() {
            let current = value_ref.copied();
            for rule in self.rules_for(addr.segment) {
                if let Some(expected) = rule.deduce(memory, addr)? {
                    if current != expected && !check_eq(current, expected) {
                        return Err(Error::InconsistentAutoDeduction {
                            addr,
                            current,
                            expected,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Memory;
    use starknet_types_core::felt::Felt;

    #[derive(Debug)]
    struct AlwaysFortyTwo;

    impl AutoDeductionRule for AlwaysFortyTwo {
        fn deduce(&self, _memory: &ValidatedMemory, _addr: Pointer) -> Result<Option<Value>, Error> {
            Ok(Some(Value::Scalar(Felt::from(42))))
        }
    }

    #[test]
    fn deduce_memory_cell_writes_through() {
        let mut memory = ValidatedMemory::new(Memory::new());
        memory.add_segment();
        let mut registry = AutoDeductionRegistry::new();
        registry.add_rule(0, Box::new(AlwaysFortyTwo));

        let addr = Pointer::new(0, 3);
        let value = registry.deduce_memory_cell(&mut memory, addr).unwrap();
        assert_eq!(value, Some(Value::Scalar(Felt::from(42))));
        assert_eq!(memory.get(addr).map(|v| v.copied()), Some(Value::Scalar(Felt::from(42))));
    }

    #[test]
    fn first_matching_rule_wins() {
        #[derive(Debug)]
        struct NeverFires;
        impl AutoDeductionRule for NeverFires {
            fn deduce(&self, _: &ValidatedMemory, _: Pointer) -> Result<Option<Value>, Error> {
                Ok(None)
            }
        }

        let mut memory = ValidatedMemory::new(Memory::new());
        memory.add_segment();
        let mut registry = AutoDeductionRegistry::new();
        registry.add_rule(0, Box::new(NeverFires));
        registry.add_rule(0, Box::new(AlwaysFortyTwo));

        let value = registry
            .deduce_memory_cell(&mut memory, Pointer::new(0, 0))
            .unwrap();
        assert_eq!(value, Some(Value::Scalar(Felt::from(42))));
    }

    #[test_log::test]
    fn verify_auto_deductions_rejects_mismatch() {
        let mut memory = ValidatedMemory::new(Memory::new());
        memory.add_segment();
        memory
            .set(Pointer::new(0, 0), Value::Scalar(Felt::from(7)))
            .unwrap();

        let mut registry = AutoDeductionRegistry::new();
        registry.add_rule(0, Box::new(AlwaysFortyTwo));

        let err = registry
            .verify_auto_deductions(&memory, &|a, b| a == b)
            .unwrap_err();
        assert_matches::assert_matches!(err, Error::InconsistentAutoDeduction { .. });
    }

    #[test]
    fn verify_auto_deductions_accepts_via_check_eq_escape_hatch() {
        let mut memory = ValidatedMemory::new(Memory::new());
        memory.add_segment();
        memory
            .set(Pointer::new(0, 0), Value::Scalar(Felt::from(7)))
            .unwrap();

        let mut registry = AutoDeductionRegistry::new();
        registry.add_rule(0, Box::new(AlwaysFortyTwo));

        // A permissive predicate that treats every pair as equal papers over the mismatch.
        registry
            .verify_auto_deductions(&memory, &|_, _| true)
            .unwrap();
    }
}
