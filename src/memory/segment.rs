//! Defines the [`Segment`] type.

use std::fmt;

use super::{Value, ValueRef};

/// A relocatable segment of memory accessible by the Cairo virtual machine.
///
/// # Representation
///
/// A program running in the Cairo virtual machine is technically allowed to access any value
/// within the address space of the machine. This address space has the size of the Starknet field,
/// which is not realistically representable in a regular computer's memory. Therefore, the Cairo
/// language requires programs to split their memory into *segments*. Each segment is a contiguous
/// block of memory that is located *somewhere* in the virtual machine's address space. The final
/// location of segments is not decided until the program has finished running, meaning that a
/// program can never rely on the final location of a segment.
///
/// This means that a program can never realistically access an arbitrary absolute memory location
/// (since it doesn't know where it is located in the first place). It is still possible for
/// "gaps" to appear within a segment (an offset written after a later one), but they should remain
/// relatively small in most cases, so a flat growable array is used as the backing store.
#[derive(Default, Clone)]
pub struct Segment {
    /// The cells of this segment, in offset order.
    ///
    /// `None` marks a cell that has not been asserted to any value yet; `Some` cells are
    /// write-once, see [`Segment::assert_eq`].
    cells: Vec<Option<Value>>,
}

impl Segment {
    /// Creates a new empty [`Segment`].
    pub const fn new() -> Self {
        Self { cells: Vec::new() }
    }

    /// Returns the offset of the highest known cell in the segment (i.e. its current length).
    #[inline(always)]
    pub fn highest_known_cell(&self) -> usize {
        self.cells.len()
    }

    /// Returns the memory cell at offset `index` in the segment, if it has been asserted to a
    /// specific value.
    pub fn get(&self, index: usize) -> Option<ValueRef> {
        match self.cells.get(index) {
            Some(Some(Value::Scalar(f))) => Some(ValueRef::Scalar(f)),
            Some(Some(Value::Pointer(p))) => Some(ValueRef::Pointer(p)),
            _ => None,
        }
    }

    /// Returns an iterator over the offsets of this segment that currently hold a known value,
    /// together with that value.
    ///
    /// Iteration order follows increasing offset, which keeps sweeps such as
    /// `validate_existing_memory` and `verify_auto_deductions` deterministic within a single run.
    pub fn iter(&self) -> impl Iterator<Item = (usize, ValueRef)> + '_ {
        self.cells.iter().enumerate().filter_map(|(index, cell)| {
            cell.as_ref().map(|value| {
                (
                    index,
                    match value {
                        Value::Scalar(f) => ValueRef::Scalar(f),
                        Value::Pointer(p) => ValueRef::Pointer(p),
                    },
                )
            })
        })
    }

    /// Attempts to assert that a memory cell in the segment has a given value.
    ///
    /// # Returns
    ///
    /// - If the cell is unknown, it is asserted to the given value and the function succeeds.
    ///
    /// - If the cell already holds the same value, the function succeeds without changing
    ///   anything (a "consistent rewrite").
    ///
    /// - If the cell already holds a different value, the function fails, returning the
    ///   `(existing, new)` pair so the caller (which knows the segment index) can build a
    ///   fully-addressed [`Error::InconsistentMemory`](crate::error::Error::InconsistentMemory).
    pub fn assert_eq(&mut self, index: usize, value: ValueRef) -> Result<(), (Value, Value)> {
        if index >= self.cells.len() {
            self.cells.resize(index + 1, None);
        }

        match &self.cells[index] {
            None => {
                self.cells[index] = Some(value.copied());
                Ok(())
            }
            Some(existing) if *existing == value.copied() => Ok(()),
            Some(existing) => Err((*existing, value.copied())),
        }
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("len", &self.cells.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starknet_types_core::felt::Felt;

    #[test]
    fn assert_eq_writes_unknown_cell() {
        let mut segment = Segment::new();
        segment
            .assert_eq(3, ValueRef::Scalar(&Felt::from(7)))
            .unwrap();
        assert_eq!(segment.get(3), Some(ValueRef::Scalar(&Felt::from(7))));
        assert_eq!(segment.get(0), None);
    }

    #[test]
    fn assert_eq_allows_consistent_rewrite() {
        let mut segment = Segment::new();
        segment
            .assert_eq(0, ValueRef::Scalar(&Felt::from(7)))
            .unwrap();
        segment
            .assert_eq(0, ValueRef::Scalar(&Felt::from(7)))
            .unwrap();
        assert_eq!(segment.get(0), Some(ValueRef::Scalar(&Felt::from(7))));
    }

    #[test]
    fn assert_eq_rejects_inconsistent_rewrite() {
        let mut segment = Segment::new();
        segment
            .assert_eq(0, ValueRef::Scalar(&Felt::from(7)))
            .unwrap();
        let (existing, new) = segment
            .assert_eq(0, ValueRef::Scalar(&Felt::from(8)))
            .unwrap_err();
        assert_eq!(existing, Value::Scalar(Felt::from(7)));
        assert_eq!(new, Value::Scalar(Felt::from(8)));
    }

    #[test]
    fn iter_skips_holes() {
        let mut segment = Segment::new();
        segment
            .assert_eq(2, ValueRef::Scalar(&Felt::from(1)))
            .unwrap();
        let collected: Vec<_> = segment.iter().map(|(idx, _)| idx).collect();
        assert_eq!(collected, vec![2]);
    }
}
