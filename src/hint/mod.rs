//! The hint machinery: host-side callbacks attached to a program counter, executed before the
//! instruction at that pc is decoded. See the module-level documentation of [`crate`] for how
//! this fits into a single [`CairoVM::step`](crate::CairoVM::step).

pub mod code;
pub mod ids;
pub mod reference;

pub use code::Hint;
pub use ids::Ids;
pub use reference::{HintReference, Register};

use indexmap::IndexMap;

use crate::error::Error;
use crate::memory::validated::ValidatedMemory;
use crate::memory::Pointer;
use crate::program::Program;
use crate::scope::ScopeStack;

/// Mutable context handed to a [`Hint`] for the duration of its execution.
///
/// This is the systems-language shape of the reference implementation's dynamic binding
/// dictionary (`memory`, `ap`, `fp`, `pc`, `current_step`, `ids`, plus the scope-mutating
/// capabilities `vm_enter_scope`/`vm_exit_scope`, here methods on [`ScopeStack`], and
/// `vm_load_program`, here [`HintContext::vm_load_program`]). The always-visible static locals
/// (`PRIME`, `fadd`, ...) are free functions in [`crate::static_locals`] rather than context
/// fields, since they never change per-step.
pub struct HintContext<'a> {
    /// The VM's memory, through the validation/auto-deduction layer.
    pub memory: &'a mut ValidatedMemory,
    /// The allocation pointer at the start of this step.
    pub ap: Pointer,
    /// The frame pointer at the start of this step.
    pub fp: Pointer,
    /// The program counter this hint is attached to.
    pub pc: Pointer,
    /// The 0-based index of the next trace entry.
    pub current_step: usize,
    /// The symbolic `ids` accessor, bound to `ap`/`fp`.
    pub ids: Ids<'a>,
    /// The scope stack; hints call `enter_scope`/`exit_scope` on this directly.
    pub scopes: &'a mut ScopeStack,
    /// Set by a hint to abort the current step before the instruction at `pc` executes.
    pub skip_instruction_execution: &'a mut bool,
    /// Programs queued by [`HintContext::vm_load_program`] during this step, merged into the
    /// hint registry once it finishes running every hint at the current pc.
    pending_programs: &'a mut Vec<(Program, Pointer)>,
}

impl<'a> HintContext<'a> {
    /// Loads `program`'s data into memory starting at `base`, and its hints at their
    /// corresponding offsets from `base`.
    ///
    /// Mirrors the reference implementation's `vm_load_program`, used by hints that assemble a
    /// subroutine at runtime (e.g. a builtin generating helper code) rather than having it
    /// compiled in from the start. Data becomes visible to this same step's remaining reads
    /// immediately; the new hints take effect starting the next step, since pc cannot reach them
    /// any sooner than that.
    pub fn vm_load_program(&mut self, program: Program, base: Pointer) -> Result<(), Error> {
        for (offset, value) in program.data.iter().enumerate() {
            let addr = base.offset_by(offset as isize)?;
            self.memory.set(addr, *value)?;
        }
        self.pending_programs.push((program, base));
        Ok(())
    }
}

/// One compiled hint, along with the global `hint_id` assigned to it at load time.
struct CompiledHint {
    hint_id: usize,
    hint: Box<dyn Hint>,
}

/// Maps `pc -> ordered list of compiled hints`, plus the `hint_id -> (pc, index)` side table the
/// error-handling design uses to report which hint raised.
#[derive(Default)]
pub struct HintRegistry {
    by_pc: IndexMap<Pointer, Vec<CompiledHint>>,
    locations: Vec<(Pointer, usize)>,
}

impl HintRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles every hint declared by `program`, relative to `program_base`.
    ///
    /// Hint ids are assigned in the order the program declares them, then in declaration order
    /// within a single pc, matching the order `step` will later run them in.
    pub fn load(program: &Program, program_base: Pointer) -> Result<Self, Error> {
        let mut registry = Self::new();
        registry.merge_loaded(program, program_base)?;
        Ok(registry)
    }

    /// Compiles and appends every hint declared by `program`, relative to `base`, continuing the
    /// `hint_id` numbering from wherever this registry had already reached.
    ///
    /// Used both by [`HintRegistry::load`] (the initial load, into an empty registry) and by
    /// [`CairoVM::step`](crate::CairoVM::step) to fold in a program a hint requested via
    /// [`HintContext::vm_load_program`] at runtime.
    pub fn merge_loaded(&mut self, program: &Program, base: Pointer) -> Result<(), Error> {
        for (&offset, specs) in &program.hints {
            let pc = base.offset_by(offset as isize)?;
            let mut compiled = Vec::with_capacity(specs.len());
            for (index, spec) in specs.iter().enumerate() {
                let hint_id = self.locations.len();
                self.locations.push((pc, index));
                compiled.push(CompiledHint {
                    hint_id,
                    hint: code::build_hint(spec)?,
                });
            }
            self.by_pc.entry(pc).or_insert_with(Vec::new).append(&mut compiled);
        }
        Ok(())
    }

    /// Returns the number of hints currently registered across every pc.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Returns whether this registry has no hints at all.
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Returns the `(pc, index_within_pc)` a given `hint_id` was assigned, if it exists.
    ///
    /// Named after the reference implementation's `hint_pc_and_index`, which this supports the
    /// same diagnostic role as: turning a bare `hint_id` (all `VmException` carries) back into
    /// something a user can locate in the program.
    pub fn hint_pc_and_index(&self, hint_id: usize) -> Option<(Pointer, usize)> {
        self.locations.get(hint_id).copied()
    }

    fn hints_at(&self, pc: Pointer) -> &[CompiledHint] {
        self.by_pc.get(&pc).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the number of hints declared at `pc`.
    pub fn hint_count_at(&self, pc: Pointer) -> usize {
        self.hints_at(pc).len()
    }

    /// Runs every hint declared at `pc`, in order, against the step context built from the
    /// provided pieces.
    ///
    /// Returns `Ok(true)` if any hint requested the current instruction be skipped. Any program
    /// a hint loaded via [`HintContext::vm_load_program`] is appended to `pending_programs`; the
    /// caller is responsible for merging those into this registry once it regains mutable access
    /// (this method only holds `&self`, so it cannot merge them itself).
    #[allow(clippy::too_many_arguments)]
    pub fn run_at(
        &self,
        pc: Pointer,
        references: &IndexMap<String, HintReference>,
        memory: &mut ValidatedMemory,
        scopes: &mut ScopeStack,
        ap: Pointer,
        fp: Pointer,
        current_step: usize,
        pending_programs: &mut Vec<(Program, Pointer)>,
    ) -> Result<bool, (usize, Error)> {
        let mut skip = false;

        for compiled in self.hints_at(pc) {
            let ids = Ids::new(references, ap, fp);
            let mut ctx = HintContext {
                memory,
                ap,
                fp,
                pc,
                current_step,
                ids,
                scopes,
                skip_instruction_execution: &mut skip,
                pending_programs,
            };
            compiled
                .hint
                .run(&mut ctx)
                .map_err(|err| (compiled.hint_id, err))?;
        }

        Ok(skip)
    }
}

impl std::fmt::Debug for HintRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HintRegistry")
            .field("hints", &self.locations.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use starknet_types_core::felt::Felt;

    use crate::error::Error;
    use crate::memory::{Memory, Value};
    use crate::program::{HintSpec, Program};
    use crate::scope::ScopeStack;

    use super::*;

    /// A test-only hint that loads a small subprogram at a fixed base, exercising
    /// [`HintContext::vm_load_program`] without going through the tagged-variant dispatch in
    /// [`code`].
    #[derive(Debug)]
    struct LoadSubProgram {
        base: Pointer,
    }

    impl Hint for LoadSubProgram {
        fn run(&self, ctx: &mut HintContext<'_>) -> Result<(), Error> {
            let sub = Program {
                prime: crate::static_locals::PRIME,
                data: vec![Value::Scalar(Felt::from(42))],
                hints: {
                    let mut hints = IndexMap::new();
                    hints.insert(0, vec![HintSpec::new("nop")]);
                    hints
                },
                identifiers: IndexMap::new(),
                reference_manager: IndexMap::new(),
                debug_info: None,
            };
            ctx.vm_load_program(sub, self.base)
        }
    }

    fn empty_program() -> Program {
        Program {
            prime: crate::static_locals::PRIME,
            data: Vec::new(),
            hints: IndexMap::new(),
            identifiers: IndexMap::new(),
            reference_manager: IndexMap::new(),
            debug_info: None,
        }
    }

    #[test]
    fn vm_load_program_writes_memory_immediately_and_merges_hints_after_run_at() {
        let mut memory = Memory::new();
        memory.add_segment(); // segment 0: the "main" program
        memory.add_segment(); // segment 1: where the subprogram will be loaded
        let mut memory = ValidatedMemory::new(memory);

        let mut registry = HintRegistry::new();
        let caller_pc = Pointer::new(0, 0);
        registry.by_pc.insert(
            caller_pc,
            vec![CompiledHint {
                hint_id: 0,
                hint: Box::new(LoadSubProgram {
                    base: Pointer::new(1, 0),
                }),
            }],
        );
        registry.locations.push((caller_pc, 0));

        let references = IndexMap::new();
        let mut scopes = ScopeStack::new(Default::default());
        let mut pending = Vec::new();

        registry
            .run_at(
                caller_pc,
                &references,
                &mut memory,
                &mut scopes,
                Pointer::new(1, 0),
                Pointer::new(1, 0),
                0,
                &mut pending,
            )
            .unwrap();

        // The subprogram's data is visible immediately, within the same step.
        assert_eq!(
            memory.memory().get(Pointer::new(1, 0)),
            Some(crate::memory::ValueRef::Scalar(&Felt::from(42)))
        );

        // But its hint has not been merged into the registry yet: run_at only queues it.
        assert_eq!(registry.hint_count_at(Pointer::new(1, 0)), 0);

        for (program, base) in pending {
            registry.merge_loaded(&program, base).unwrap();
        }

        // Once merged, the subprogram's hint is runnable like any other.
        assert_eq!(registry.hint_count_at(Pointer::new(1, 0)), 1);
    }

    #[test]
    fn load_then_merge_loaded_assigns_disjoint_hint_ids() {
        let mut program = empty_program();
        program.hints.insert(0, vec![HintSpec::new("nop")]);

        let mut registry = HintRegistry::load(&program, Pointer::new(0, 0)).unwrap();
        assert_eq!(registry.len(), 1);

        let mut extra = empty_program();
        extra.hints.insert(0, vec![HintSpec::new("nop"), HintSpec::new("nop")]);
        registry.merge_loaded(&extra, Pointer::new(1, 0)).unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.hint_pc_and_index(0), Some((Pointer::new(0, 0), 0)));
        assert_eq!(registry.hint_pc_and_index(1), Some((Pointer::new(1, 0), 0)));
        assert_eq!(registry.hint_pc_and_index(2), Some((Pointer::new(1, 0), 1)));
    }
}
