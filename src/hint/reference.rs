//! Defines [`HintReference`], which resolves a symbolic `ids.name` access declared by the
//! compiler into a concrete address relative to the current `ap`/`fp`.

use crate::error::Error;
use crate::memory::Pointer;

/// The register a [`HintReference`] is expressed relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    /// Relative to the allocation pointer.
    Ap,
    /// Relative to the frame pointer.
    Fp,
}

/// A compiled reference to a named value, as declared in a program's `reference_manager`.
///
/// This mirrors the compiler-emitted reference table used to resolve `ids.foo` inside a hint to
/// an actual memory address: `foo` lives at `offset` cells from `ap` or `fp`, and may itself be a
/// pointer to the value (`dereference`) rather than holding it directly.
#[derive(Debug, Clone, Copy)]
pub struct HintReference {
    /// The register this reference is relative to.
    pub register: Register,
    /// The offset (in cells) from that register.
    pub offset: isize,
    /// Whether the addressed cell holds a pointer to the actual value rather than the value
    /// itself.
    pub dereference: bool,
}

impl HintReference {
    /// Creates a new reference relative to `register`, offset by `offset` cells.
    pub const fn new(register: Register, offset: isize) -> Self {
        Self {
            register,
            offset,
            dereference: false,
        }
    }

    /// Returns the same reference, but marked as needing an extra dereference.
    pub const fn dereferenced(mut self) -> Self {
        self.dereference = true;
        self
    }

    /// Resolves this reference to a concrete address, given the current `ap` and `fp`.
    ///
    /// Note that resolving a `dereference`d reference to its final address requires reading
    /// memory (the cell at the direct address holds the real address); this method only computes
    /// the direct address, leaving the extra indirection to the caller (see
    /// [`Ids::address_of`](super::Ids::address_of)).
    pub fn direct_address(&self, ap: Pointer, fp: Pointer) -> Result<Pointer, Error> {
        let base = match self.register {
            Register::Ap => ap,
            Register::Fp => fp,
        };
        base.offset_by(self.offset)
    }
}
