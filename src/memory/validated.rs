//! Defines [`ValidatedMemory`], a [`Memory`] wrapper that runs per-segment
//! [`ValidationRule`]s whenever a new value is written.

use std::collections::HashSet;
use std::fmt;

use crate::error::Error;

use super::{Memory, Pointer, Value, ValueRef};

/// A rule that inspects a freshly-written memory cell and may raise if it violates some
/// segment-specific invariant (for example, that a range-check cell fits in a fixed number of
/// bits).
///
/// Builtins register these to impose stronger invariants than plain write-once memory without
/// the VM core needing to know anything about what the invariant actually is.
pub trait ValidationRule: fmt::Debug {
    /// Validates the cell at `addr`, which has just been written to `memory`.
    ///
    /// On success, returns the set of addresses this rule now considers vetted; those addresses
    /// are recorded as "already validated" and will not be passed to this rule again on a later
    /// write, even if they are rewritten (consistently) afterwards.
    fn validate(&self, memory: &Memory, addr: Pointer) -> Result<Vec<Pointer>, Error>;
}

/// Wraps a [`Memory`] with a per-segment registry of [`ValidationRule`]s, invoked on every write.
///
/// This is the write path the rest of the VM uses exclusively: plain [`Memory`] is only ever
/// touched directly by tests and by the validation rules themselves (which only read it).
#[derive(Default, Debug)]
pub struct ValidatedMemory {
    memory: Memory,
    rules: Vec<Vec<Box<dyn ValidationRule>>>,
    validated: HashSet<Pointer>,
}

impl ValidatedMemory {
    /// Wraps an existing [`Memory`] with no validation rules registered yet.
    pub fn new(memory: Memory) -> Self {
        Self {
            memory,
            rules: Vec::new(),
            validated: HashSet::new(),
        }
    }

    /// Registers a validation rule for the given segment.
    pub fn add_validation_rule(&mut self, segment_index: usize, rule: Box<dyn ValidationRule>) {
        if segment_index >= self.rules.len() {
            self.rules.resize_with(segment_index + 1, Vec::new);
        }
        self.rules[segment_index].push(rule);
    }

    /// Returns a reference to the underlying, unvalidated [`Memory`].
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Allocates a fresh segment, delegating to the underlying [`Memory`].
    pub fn add_segment(&mut self) -> usize {
        self.memory.add_segment()
    }

    /// Reads `addr`, delegating to the underlying [`Memory`].
    pub fn get(&self, addr: Pointer) -> Option<ValueRef> {
        self.memory.get(addr)
    }

    /// Returns whether `addr` currently holds a known value.
    pub fn contains(&self, addr: Pointer) -> bool {
        self.memory.contains(addr)
    }

    /// Iterates over every address currently holding a known value.
    pub fn iter_addresses(&self) -> impl Iterator<Item = (Pointer, ValueRef)> + '_ {
        self.memory.iter_addresses()
    }

    /// Writes `value` to `addr`, then runs any validation rules registered for its segment.
    pub fn set(&mut self, addr: Pointer, value: Value) -> Result<(), Error> {
        self.memory.set(addr, value)?;
        self.run_validation(addr)
    }

    /// Sweeps every address currently in memory and runs validation on it, as if it had just
    /// been written.
    ///
    /// Used to validate values that were placed directly (e.g. program data loaded before any
    /// validation rule existed). For rules that are commutative (every rule shipped with this
    /// crate is), this produces the same end state as validating incrementally on each `set`.
    pub fn validate_existing_memory(&mut self) -> Result<(), Error> {
        let addresses: Vec<Pointer> = self.memory.iter_addresses().map(|(addr, _)| addr).collect();
        for addr in addresses {
            self.run_validation(addr)?;
        }
        Ok(())
    }

    fn run_validation(&mut self, addr: Pointer) -> Result<(), Error> {
        if self.validated.contains(&addr) {
            return Ok(());
        }

        let segment_rules = match self.rules.get(addr.segment) {
            Some(rules) if !rules.is_empty() => rules,
            _ => return Ok(()),
        };

        let mut newly_validated = Vec::new();
        for rule in segment_rules {
            let vetted = rule.validate(&self.memory, addr).map_err(|err| {
                tracing::debug!(?addr, %err, "validation rule rejected a write");
                err
            })?;
            newly_validated.extend(vetted);
        }

        self.validated.extend(newly_validated);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starknet_types_core::felt::Felt;

    #[derive(Debug)]
    struct RejectOdd;

    impl ValidationRule for RejectOdd {
        fn validate(&self, memory: &Memory, addr: Pointer) -> Result<Vec<Pointer>, Error> {
            if let Some(ValueRef::Scalar(f)) = memory.get(addr) {
                if f.to_bytes_be().last().copied().unwrap_or(0) % 2 == 1 {
                    return Err(Error::ValidationFailed {
                        addr,
                        reason: "odd values are not allowed in this segment".into(),
                    });
                }
            }
            Ok(vec![addr])
        }
    }

    #[test]
    fn validation_rule_runs_on_set() {
        let mut memory = ValidatedMemory::new(Memory::new());
        memory.add_segment();
        memory.add_validation_rule(0, Box::new(RejectOdd));

        memory.set(Pointer::new(0, 0), Value::Scalar(Felt::from(4))).unwrap();
        let err = memory
            .set(Pointer::new(0, 1), Value::Scalar(Felt::from(5)))
            .unwrap_err();
        assert!(matches!(err, Error::ValidationFailed { .. }));
    }

    #[test]
    fn already_validated_addresses_are_not_rechecked() {
        let mut memory = ValidatedMemory::new(Memory::new());
        memory.add_segment();
        memory.add_validation_rule(0, Box::new(RejectOdd));

        memory.set(Pointer::new(0, 0), Value::Scalar(Felt::from(4))).unwrap();
        // A consistent rewrite to the same value must not re-run (and re-reject) validation.
        memory.set(Pointer::new(0, 0), Value::Scalar(Felt::from(4))).unwrap();
    }

    #[test]
    fn validate_existing_memory_matches_incremental_validation() {
        let mut incremental = ValidatedMemory::new(Memory::new());
        incremental.add_segment();
        incremental.add_validation_rule(0, Box::new(RejectOdd));
        incremental.set(Pointer::new(0, 0), Value::Scalar(Felt::from(2))).unwrap();
        incremental.set(Pointer::new(0, 1), Value::Scalar(Felt::from(4))).unwrap();

        let mut swept = ValidatedMemory::new(Memory::new());
        swept.add_segment();
        swept.memory.set(Pointer::new(0, 0), Value::Scalar(Felt::from(2))).unwrap();
        swept.memory.set(Pointer::new(0, 1), Value::Scalar(Felt::from(4))).unwrap();
        swept.add_validation_rule(0, Box::new(RejectOdd));
        swept.validate_existing_memory().unwrap();

        assert_eq!(incremental.get(Pointer::new(0, 0)), swept.get(Pointer::new(0, 0)));
        assert_eq!(incremental.get(Pointer::new(0, 1)), swept.get(Pointer::new(0, 1)));
    }
}
