//! The tagged-variant hint registry.
//!
//! The reference implementation this core is modeled after lets a hint be an arbitrary snippet of
//! host-language source, executed against a dynamic binding dictionary. This crate does not embed
//! a scripting engine: each hint is identified at load time by a `tag` (see
//! [`HintSpec`](crate::program::HintSpec)) and dispatched to one of the handlers below. Adding a
//! new hint means adding a new [`Hint`] implementation and a new arm in [`build_hint`].

use std::fmt;

use crate::error::Error;
use crate::program::HintSpec;

use super::HintContext;

/// A single host-side operation attached to a program counter, run before the instruction at
/// that pc is decoded.
pub trait Hint: fmt::Debug {
    /// Runs this hint against the current step's context.
    fn run(&self, ctx: &mut HintContext<'_>) -> Result<(), Error>;
}

/// Builds the concrete [`Hint`] a declared [`HintSpec`] refers to.
///
/// Returns [`Error::HintError`] if `spec.tag` names no known handler; this is the "failed to
/// compile" case from the error handling design, raised at load time rather than at
/// `end_run`-adjacent points.
pub fn build_hint(spec: &HintSpec) -> Result<Box<dyn Hint>, Error> {
    match spec.tag.as_str() {
        "skip_instruction" => Ok(Box::new(SkipInstruction)),
        "enter_scope" => Ok(Box::new(EnterScope)),
        "exit_scope" => Ok(Box::new(ExitScope)),
        "nop" => Ok(Box::new(Nop)),
        other => Err(Error::HintError {
            hint_id: 0,
            message: format!("no handler registered for hint tag {other:?}"),
        }),
    }
}

/// Does nothing. Useful as a placeholder and in tests.
#[derive(Debug, Default)]
pub struct Nop;

impl Hint for Nop {
    fn run(&self, _ctx: &mut HintContext<'_>) -> Result<(), Error> {
        Ok(())
    }
}

/// Sets the shared `skip_instruction_execution` flag, causing the interpreter to abort the
/// current step without decoding or executing the instruction at the current pc.
#[derive(Debug, Default)]
pub struct SkipInstruction;

impl Hint for SkipInstruction {
    fn run(&self, ctx: &mut HintContext<'_>) -> Result<(), Error> {
        *ctx.skip_instruction_execution = true;
        Ok(())
    }
}

/// Pushes a fresh, empty scope onto the scope stack (`vm_enter_scope()`).
#[derive(Debug, Default)]
pub struct EnterScope;

impl Hint for EnterScope {
    fn run(&self, ctx: &mut HintContext<'_>) -> Result<(), Error> {
        ctx.scopes.enter_scope(Default::default());
        Ok(())
    }
}

/// Pops the topmost scope off the scope stack (`vm_exit_scope()`).
#[derive(Debug, Default)]
pub struct ExitScope;

impl Hint for ExitScope {
    fn run(&self, ctx: &mut HintContext<'_>) -> Result<(), Error> {
        ctx.scopes.exit_scope()
    }
}
