//! Defines [`Ids`], the per-step view over symbolic `ids.name` accesses exposed to hints.

use indexmap::IndexMap;

use crate::error::Error;
use crate::memory::validated::ValidatedMemory;
use crate::memory::{Pointer, Value};

use super::HintReference;

/// A snapshot of the symbolic accessor a hint sees as `ids` while it runs.
///
/// Bound to the `ap`/`fp` in effect when the hint fires; resolving `ids.name` walks the
/// program's reference table and, for dereferenced references, follows one extra level of
/// indirection through memory.
#[derive(Debug, Clone, Copy)]
pub struct Ids<'a> {
    references: &'a IndexMap<String, HintReference>,
    ap: Pointer,
    fp: Pointer,
}

impl<'a> Ids<'a> {
    /// Creates a new [`Ids`] view bound to the given references and registers.
    pub fn new(references: &'a IndexMap<String, HintReference>, ap: Pointer, fp: Pointer) -> Self {
        Self { references, ap, fp }
    }

    fn reference(&self, name: &str) -> Result<&HintReference, Error> {
        self.references.get(name).ok_or_else(|| Error::HintError {
            hint_id: 0,
            message: format!("no such identifier: {name}"),
        })
    }

    /// Returns the address that `name` resolves to, following one level of indirection if the
    /// reference is marked `dereference`.
    pub fn address_of(&self, name: &str, memory: &ValidatedMemory) -> Result<Pointer, Error> {
        let reference = self.reference(name)?;
        let direct = reference.direct_address(self.ap, self.fp)?;

        if reference.dereference {
            memory
                .get(direct)
                .and_then(|v| v.pointer().copied())
                .ok_or(Error::UnknownMemoryCell(direct))
        } else {
            Ok(direct)
        }
    }

    /// Reads the value currently bound to `name`.
    pub fn get(&self, name: &str, memory: &ValidatedMemory) -> Result<Value, Error> {
        let addr = self.address_of(name, memory)?;
        memory
            .get(addr)
            .map(|v| v.copied())
            .ok_or(Error::UnknownMemoryCell(addr))
    }

    /// Writes `value` to the cell `name` resolves to.
    pub fn set(&self, name: &str, value: Value, memory: &mut ValidatedMemory) -> Result<(), Error> {
        let addr = self.address_of(name, memory)?;
        memory.set(addr, value)
    }
}
