//! Defines the [`Memory`] type, responsible for representing the memory of a Cairo virtual
//! machine.
//!
//! # Immutable Memory
//!
//! Note that the memory of a Cairo virtual machine does not work in the same way regular computer
//! memory do. Instead, it is mathematically immutable, and every operation that would normally
//! mutate memory instead *asserts* a memory cell to a specific value. The value was previously
//! unknown, and now it is defined to a specific value. Any access to that memory cell must now
//! confirm its value is the same as the one it was asserted to ("write-once" memory).
//!
//! # Segments
//!
//! Each cell of the memory holds an element of a field (in this case, the Starknet field is
//! used). And the total size of the memory is the size of that field. Because it's not possible
//! to represent a field of that size in a regular computer's memory, the Cairo language requires
//! programs to split their memory into *segments*. Each segment is a contiguous block of memory
//! that is located *somewhere* in the virtual machine's address space. The final location of
//! segments is not decided until the program has finished running, meaning that a program can
//! never rely on the final location of a segment.
//!
//! # Layering
//!
//! [`Memory`] itself only knows about segments and write-once cells. [`validated::ValidatedMemory`]
//! wraps it with per-segment [`validated::ValidationRule`]s, and [`deduction::AutoDeductionRegistry`]
//! sits alongside it to fill in absent cells on demand. [`CairoVM`](crate::CairoVM) only ever talks
//! to memory through the validated layer.

mod pointer;
mod segment;
mod value;

pub mod deduction;
pub mod validated;

pub use self::pointer::*;
pub use self::segment::*;
pub use self::value::*;

use crate::error::Error;

/// Represents the memory of the Cairo virtual machine: a growable collection of [`Segment`]s,
/// addressed by [`Pointer`].
///
/// More information on memory can be found in the [module-level documentation](self).
#[derive(Default, Debug, Clone)]
pub struct Memory {
    /// The segments that have been allocated in the memory.
    segments: Vec<Segment>,
}

impl Memory {
    /// Creates a new, empty [`Memory`] with no segments.
    pub const fn new() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Allocates a fresh, empty segment and returns its index.
    ///
    /// Segments are allocated on demand by the VM (for the program, the execution area, and
    /// builtins); their final sizes are never fixed up front.
    pub fn add_segment(&mut self) -> usize {
        self.segments.push(Segment::new());
        self.segments.len() - 1
    }

    /// Returns the number of segments currently allocated.
    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// Returns a [`Segment`] of the memory.
    ///
    /// # Safety
    ///
    /// The provided `segment` must have been allocated previously by this [`Memory`].
    #[inline(always)]
    pub unsafe fn segment_unchecked(&self, segment: usize) -> &Segment {
        unsafe { self.segments.get_unchecked(segment) }
    }

    /// Returns a mutable [`Segment`] of the memory.
    ///
    /// # Safety
    ///
    /// The provided `segment` must have been allocated previously by this [`Memory`].
    #[inline(always)]
    pub unsafe fn segment_unchecked_mut(&mut self, segment: usize) -> &mut Segment {
        unsafe { self.segments.get_unchecked_mut(segment) }
    }

    /// Returns the value stored at `addr`, or `None` if the cell is absent.
    ///
    /// Reading a segment that has not been allocated yet is treated the same as reading an
    /// absent cell rather than panicking: a program can reference a not-yet-allocated segment
    /// before anything has been written to it.
    pub fn get(&self, addr: Pointer) -> Option<ValueRef> {
        self.segments.get(addr.segment)?.get(addr.offset)
    }

    /// Returns whether `addr` currently holds a known value.
    pub fn contains(&self, addr: Pointer) -> bool {
        self.get(addr).is_some()
    }

    /// Writes `value` to `addr`.
    ///
    /// If `addr` already holds a value, it must be equal to `value` (a "consistent rewrite");
    /// otherwise this fails with [`Error::InconsistentMemory`]. Writing to a segment that has not
    /// been allocated is an error, since the VM always allocates a segment before addressing it.
    pub fn set(&mut self, addr: Pointer, value: Value) -> Result<(), Error> {
        let segment = self
            .segments
            .get_mut(addr.segment)
            .ok_or(Error::SegmentNotAllocated { addr })?;

        let value_ref = match &value {
            Value::Scalar(f) => ValueRef::Scalar(f),
            Value::Pointer(p) => ValueRef::Pointer(p),
        };

        segment
            .assert_eq(addr.offset, value_ref)
            .map_err(|(existing, new)| {
                tracing::debug!(?addr, ?existing, ?new, "inconsistent memory write");
                Error::InconsistentMemory { addr, existing, new }
            })
    }

    /// Returns an iterator over every address currently holding a known value, in
    /// `(segment, offset)` order.
    ///
    /// The order is deterministic within a single run (segments in allocation order, offsets
    /// increasing within each segment), which is what the end-of-run sweeps in
    /// [`deduction`]/[`validated`] rely on for reproducibility.
    pub fn iter_addresses(&self) -> impl Iterator<Item = (Pointer, ValueRef)> + '_ {
        self.segments.iter().enumerate().flat_map(|(seg, segment)| {
            segment
                .iter()
                .map(move |(offset, value)| (Pointer::new(seg, offset), value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starknet_types_core::felt::Felt;

    #[test]
    fn consistent_rewrite_succeeds_then_inconsistent_fails() {
        let mut memory = Memory::new();
        memory.add_segment();
        let addr = Pointer::new(0, 0);

        memory.set(addr, Value::Scalar(Felt::from(7))).unwrap();
        memory.set(addr, Value::Scalar(Felt::from(7))).unwrap();

        let err = memory.set(addr, Value::Scalar(Felt::from(8))).unwrap_err();
        assert!(matches!(err, Error::InconsistentMemory { .. }));
    }

    #[test]
    fn writing_unallocated_segment_is_reported_distinctly() {
        let mut memory = Memory::new();
        let addr = Pointer::new(0, 0);
        let err = memory.set(addr, Value::Scalar(Felt::from(1))).unwrap_err();
        assert!(matches!(err, Error::SegmentNotAllocated { addr: a } if a == addr));
    }

    #[test]
    fn reading_absent_cell_returns_none() {
        let mut memory = Memory::new();
        memory.add_segment();
        assert_eq!(memory.get(Pointer::new(0, 0)), None);
    }

    #[test]
    fn iter_addresses_is_ordered_by_segment_then_offset() {
        let mut memory = Memory::new();
        memory.add_segment();
        memory.add_segment();
        memory.set(Pointer::new(1, 2), Value::Scalar(Felt::from(1))).unwrap();
        memory.set(Pointer::new(0, 5), Value::Scalar(Felt::from(2))).unwrap();
        memory.set(Pointer::new(0, 0), Value::Scalar(Felt::from(3))).unwrap();

        let addrs: Vec<_> = memory.iter_addresses().map(|(addr, _)| addr).collect();
        assert_eq!(
            addrs,
            vec![Pointer::new(0, 0), Pointer::new(0, 5), Pointer::new(1, 2)]
        );
    }
}
