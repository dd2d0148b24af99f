//! # cairo-core-vm
//!
//! The core of a register-based, finite-field virtual machine: segmented memory with validation
//! and auto-deduction rules, run-context/traceback reconstruction, and a hint machinery that
//! interleaves host-side callbacks with instruction execution.
//!
//! This crate does not compile programs, produce proofs, or implement any concrete builtin
//! runner; it implements the interpreter loop and the memory/hint subsystems those things plug
//! into. See each module's documentation for the corresponding piece.

#![warn(missing_docs, missing_debug_implementations)]

use std::fmt;

use num_traits::ToPrimitive;
use starknet_types_core::felt::Felt;

use config::VmConfig;
use cpu::Cpu;
use error::{DecodeError, Error, VmException};
use hint::HintRegistry;
use instr::{Instruction, OpCode, PcUpdate, ResultLogic};
use memory::deduction::AutoDeductionRegistry;
use memory::validated::ValidatedMemory;
use memory::{Memory, Pointer, Value};
use program::Program;
use scope::ScopeStack;
use trace::{Trace, TraceEntry};

pub mod builtin;
pub mod config;
pub mod cpu;
pub mod error;
pub mod hint;
pub mod instr;
pub mod memory;
pub mod program;
pub mod range_check;
pub mod scope;
pub mod static_locals;
pub mod trace;
pub mod traceback;

/// Contains the full state of the virtual machine: registers, memory, trace, hint machinery and
/// scope stack.
///
/// # Field
///
/// The Cairo instruction set is defined over an arbitrary prime field, but this crate only ever
/// operates over the Starknet field element [`Felt`]; a loaded [`Program`] whose declared prime
/// does not match [`static_locals::PRIME`] is rejected with [`Error::PrimeMismatch`].
///
/// # Running a program
///
/// Construct a [`CairoVM`] from a [`VmConfig`] with [`CairoVM::new`], then call [`CairoVM::step`]
/// repeatedly — once per instruction, including the hints that run ahead of it — until the
/// program counter leaves the range the caller expects it to halt in. Call [`CairoVM::end_run`]
/// once execution is done to run the end-of-run consistency checks.
pub struct CairoVM {
    cpu: Cpu,
    memory: ValidatedMemory,
    deductions: AutoDeductionRegistry,
    trace: Trace,
    scopes: ScopeStack,
    hints: HintRegistry,
    program: Program,
    check_eq: Box<dyn Fn(Value, Value) -> bool>,
    last_hint_index: Option<usize>,
}

impl CairoVM {
    /// Constructs a new [`CairoVM`] from `config`, loading its program into a fresh segment 0
    /// and allocating an execution segment for `ap`/`fp`.
    pub fn new(config: VmConfig) -> Result<Self, Error> {
        if config.program.prime != static_locals::PRIME {
            return Err(Error::PrimeMismatch);
        }

        let mut memory = ValidatedMemory::new(Memory::new());
        let mut deductions = AutoDeductionRegistry::new();

        let program_segment = memory.add_segment();
        if program_segment != config.program_base.segment {
            return Err(Error::ProgramBaseMismatch {
                expected: program_segment,
                actual: config.program_base.segment,
            });
        }
        let execution_segment = memory.add_segment();
        if execution_segment != config.initial_ap.segment {
            return Err(Error::InitialApMismatch {
                expected: execution_segment,
                actual: config.initial_ap.segment,
            });
        }

        for (segment_index, runner) in &config.builtin_runners {
            while memory.memory().num_segments() <= *segment_index {
                memory.add_segment();
            }
            if let Some(rule) = runner.validation_rule() {
                memory.add_validation_rule(*segment_index, rule);
            }
            if let Some(rule) = runner.auto_deduction_rule() {
                deductions.add_rule(*segment_index, rule);
            }
            tracing::debug!(segment = segment_index, builtin = runner.name(), "attached builtin runner");
        }

        for (offset, value) in config.program.data.iter().enumerate() {
            let addr = config.program_base.offset_by(offset as isize)?;
            memory.set(addr, *value)?;
        }
        memory.validate_existing_memory()?;

        let hints = HintRegistry::load(&config.program, config.program_base)?;
        let scopes = ScopeStack::new(config.hint_locals);
        let pc = config.program_base.offset_by(config.entrypoint as isize)?;

        Ok(Self {
            cpu: Cpu {
                pc,
                ap: config.initial_ap,
                fp: config.initial_fp,
            },
            memory,
            deductions,
            trace: Trace::new(),
            scopes,
            hints,
            program: config.program,
            check_eq: config.check_eq,
            last_hint_index: None,
        })
    }

    /// Returns the current register state.
    #[inline(always)]
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Returns the current memory.
    #[inline(always)]
    pub fn memory(&self) -> &Memory {
        self.memory.memory()
    }

    /// Returns the trace gathered so far.
    #[inline(always)]
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Returns the scope stack.
    #[inline(always)]
    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    /// Advances the virtual machine by a single step: runs every hint declared at the current
    /// pc, then, unless one of them requested a skip, decodes and executes the instruction there.
    ///
    /// On error, use [`CairoVM::as_vm_exception`] to attach diagnostic context (source location,
    /// traceback, hint index) before reporting it further up.
    pub fn step(&mut self) -> Result<(), Error> {
        self.last_hint_index = None;

        let pc = self.cpu.pc;
        let ap = self.cpu.ap;
        let fp = self.cpu.fp;
        let current_step = self.trace.current_step();

        let mut pending_programs = Vec::new();
        let skip = self
            .hints
            .run_at(
                pc,
                &self.program.reference_manager,
                &mut self.memory,
                &mut self.scopes,
                ap,
                fp,
                current_step,
                &mut pending_programs,
            )
            .map_err(|(hint_id, err)| {
                self.last_hint_index = Some(hint_id);
                err
            })?;

        for (program, base) in pending_programs {
            self.hints.merge_loaded(&program, base)?;
        }

        if skip {
            tracing::trace!(?pc, "hint requested instruction skip");
            return Ok(());
        }

        let instr = self.fetch_instruction(pc)?;
        tracing::trace!(?pc, ?instr, "executing instruction");

        let (dst_addr, op0_addr, op1_addr, instr_size) = self.compute_addresses(&instr)?;

        let mut dst = self.read_operand(dst_addr)?;
        let mut op0 = self.read_operand(op0_addr)?;
        let mut op1 = self.read_operand(op1_addr)?;

        let op_code = instr.op_code()?;

        match op_code {
            OpCode::AssertEq => {
                self.solve_assert_eq(&instr, dst, &mut op0, &mut op1, op0_addr, op1_addr)?;
            }
            OpCode::Call => {
                let expected_op0 = Value::Pointer(pc.offset_by(instr_size as isize)?);
                self.write_operand(op0_addr, expected_op0)?;
                op0 = Some(expected_op0);

                let expected_dst = Value::Pointer(fp);
                self.write_operand(dst_addr, expected_dst)?;
                dst = Some(expected_dst);
            }
            OpCode::None | OpCode::Ret => {}
        }

        let res = match (op0, op1) {
            (Some(op0), Some(op1)) => Some(compute_res(instr.result_logic()?, &op0, &op1)?),
            _ => None,
        };

        if op_code == OpCode::AssertEq {
            let res = res.ok_or(Error::UnknownMemoryCell(dst_addr))?;
            self.write_operand(dst_addr, res)?;
            dst = Some(res);
        }

        self.trace.push(TraceEntry { pc, ap, fp });

        let next_pc = self.compute_next_pc(&instr, pc, instr_size, res, dst, op1)?;
        let next_ap = self.compute_next_ap(&instr, op_code, res)?;
        let next_fp = self.compute_next_fp(op_code, dst)?;

        self.cpu = Cpu {
            pc: next_pc,
            ap: next_ap,
            fp: next_fp,
        };

        Ok(())
    }

    /// Runs the end-of-run consistency checks: every auto-deduction rule must agree with what is
    /// stored in memory, and the scope stack must be back down to just the main scope.
    pub fn end_run(&mut self) -> Result<(), Error> {
        self.deductions
            .verify_auto_deductions(&self.memory, self.check_eq.as_ref())?;

        if self.scopes.len() != 1 {
            return Err(Error::UnbalancedScope);
        }

        Ok(())
    }

    /// Reconstructs the call traceback from the current frame pointer. See
    /// [`traceback::get_traceback_entries`] for the algorithm.
    pub fn traceback_entries(&self) -> Vec<Pointer> {
        traceback::get_traceback_entries(self.memory.memory(), self.cpu.fp)
    }

    /// Renders the current call traceback as a human-readable string, most recent call last, in
    /// the style of the reference implementation's `get_traceback`. Returns `None` when there is
    /// no traceback to show (the outermost frame has made no calls).
    pub fn get_traceback(&self) -> Option<String> {
        let entries = self.traceback_entries();
        if entries.is_empty() {
            return None;
        }

        let mut out = String::from("Cairo traceback (most recent call last):\n");
        for pc in entries {
            match self.program.location_for(pc.offset) {
                Some(location) => out.push_str(&format!("{location}\n")),
                None => out.push_str(&format!("unknown location ({pc:?})\n")),
            }
        }
        Some(out)
    }

    /// Computes the permutation range-check limits over the trace gathered so far. See
    /// [`range_check::get_perm_range_check_limits`].
    pub fn get_perm_range_check_limits(&self) -> Option<(i16, i16)> {
        range_check::get_perm_range_check_limits(&self.trace, self.memory.memory())
    }

    /// Wraps `err` with the diagnostic context the error handling design requires: the pc it
    /// fired at, the source location for that pc (if debug info was loaded), a reconstructed
    /// traceback, and the hint index, if the error originated from a hint.
    pub fn as_vm_exception(&self, err: Error) -> VmException {
        let pc = self.cpu.pc;
        // Debug info keys are program-segment offsets; a pc outside that segment (e.g. one
        // produced by an absolute jump into another segment) simply has no associated location.
        let location = self.program.location_for(pc.offset).cloned();

        let mut notes = Vec::new();
        if let Some(hint_id) = self.last_hint_index {
            if let Some((hint_pc, index)) = self.hints.hint_pc_and_index(hint_id) {
                notes.push(format!("hint {index} at pc {hint_pc:?} failed"));
            }
        }

        VmException {
            pc,
            location,
            inner: err,
            traceback: Some(self.traceback_entries()),
            notes,
            hint_index: self.last_hint_index,
        }
    }

    fn fetch_instruction(&mut self, pc: Pointer) -> Result<Instruction, Error> {
        let value = self.read_operand(pc)?.ok_or(Error::ProgramCounterLost)?;
        let word = value
            .as_scalar()
            .and_then(|f| f.to_u64())
            .ok_or(Error::ProgramCounterLost)?;

        let instr = Instruction(word);
        if instr.is_last_bit_set() {
            return Err(DecodeError::NonZeroHighBit.into());
        }
        Ok(instr)
    }

    fn compute_addresses(&self, instr: &Instruction) -> Result<(Pointer, Pointer, Pointer, usize), Error> {
        let dst_base = match instr.dst_register() {
            instr::DstRegister::AP => self.cpu.ap,
            instr::DstRegister::FP => self.cpu.fp,
        };
        let dst_addr = dst_base.offset_by(instr.dst_offset() as isize)?;

        let op0_base = match instr.op0_register() {
            instr::Op0Register::AP => self.cpu.ap,
            instr::Op0Register::FP => self.cpu.fp,
        };
        let op0_addr = op0_base.offset_by(instr.op0_offset() as isize)?;

        let (op1_base, instr_size) = match instr.op1_source()? {
            instr::Op1Source::Op0 => (op0_addr, 1),
            instr::Op1Source::PC => (self.cpu.pc, 2),
            instr::Op1Source::FP => (self.cpu.fp, 1),
            instr::Op1Source::AP => (self.cpu.ap, 1),
        };
        let op1_addr = op1_base.offset_by(instr.op1_offset() as isize)?;

        Ok((dst_addr, op0_addr, op1_addr, instr_size))
    }

    /// Reads `addr`, falling back to the auto-deduction registry if the cell is absent.
    fn read_operand(&mut self, addr: Pointer) -> Result<Option<Value>, Error> {
        if let Some(value) = self.memory.get(addr) {
            return Ok(Some(value.copied()));
        }
        self.deductions.deduce_memory_cell(&mut self.memory, addr)
    }

    fn write_operand(&mut self, addr: Pointer, value: Value) -> Result<(), Error> {
        self.memory.set(addr, value)
    }

    /// Solves for a missing `op0` or `op1` of an `AssertEq` instruction from `dst` and the result
    /// logic, writing whichever one it recovers back through memory.
    fn solve_assert_eq(
        &mut self,
        instr: &Instruction,
        dst: Option<Value>,
        op0: &mut Option<Value>,
        op1: &mut Option<Value>,
        op0_addr: Pointer,
        op1_addr: Pointer,
    ) -> Result<(), Error> {
        let Some(dst) = dst else { return Ok(()) };
        let res_logic = instr.result_logic()?;

        if op1.is_none() {
            if let Some(value) = deduce_op1_from_op0(res_logic, op0.as_ref(), &dst)? {
                self.write_operand(op1_addr, value)?;
                *op1 = Some(value);
            }
        }

        if op0.is_none() {
            if let Some(op1_value) = op1 {
                if let Some(value) = deduce_op0_from_op1(res_logic, op1_value, &dst)? {
                    self.write_operand(op0_addr, value)?;
                    *op0 = Some(value);
                }
            }
        }

        Ok(())
    }

    fn compute_next_pc(
        &self,
        instr: &Instruction,
        pc: Pointer,
        instr_size: usize,
        res: Option<Value>,
        dst: Option<Value>,
        op1: Option<Value>,
    ) -> Result<Pointer, Error> {
        match instr.pc_update()? {
            PcUpdate::Regular => pc.offset_by(instr_size as isize),
            PcUpdate::AbsoluteJump => {
                let res = res.ok_or(Error::CantDeduceOp1)?;
                res.as_pointer().copied().ok_or(Error::PointerTooLarge)
            }
            PcUpdate::RelativeJump => {
                let res = res.ok_or(Error::CantDeduceOp1)?;
                pc.offset_by(scalar_offset(&res)?)
            }
            PcUpdate::ConditionalJump => {
                let dst = dst.ok_or(Error::CantDeduceOp0)?;
                if dst != Value::Scalar(Felt::ZERO) {
                    let op1 = op1.ok_or(Error::CantDeduceOp1)?;
                    pc.offset_by(scalar_offset(&op1)?)
                } else {
                    pc.offset_by(instr_size as isize)
                }
            }
        }
    }

    fn compute_next_ap(&self, instr: &Instruction, op_code: OpCode, res: Option<Value>) -> Result<Pointer, Error> {
        if op_code == OpCode::Call {
            return self.cpu.ap.offset_by(2);
        }

        match instr.ap_update()? {
            instr::ApUpdate::None => Ok(self.cpu.ap),
            instr::ApUpdate::Increment => self.cpu.ap.offset_by(1),
            instr::ApUpdate::AddResult => {
                let res = res.ok_or(Error::CantDeduceOp1)?;
                self.cpu.ap.offset_by(scalar_offset(&res)?)
            }
        }
    }

    fn compute_next_fp(&self, op_code: OpCode, dst: Option<Value>) -> Result<Pointer, Error> {
        match op_code {
            OpCode::Call => self.cpu.ap.offset_by(2),
            OpCode::Ret => {
                let dst = dst.ok_or(Error::CantDeduceOp0)?;
                dst.as_pointer().copied().ok_or(Error::PointerTooLarge)
            }
            OpCode::None | OpCode::AssertEq => Ok(self.cpu.fp),
        }
    }
}

impl fmt::Debug for CairoVM {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CairoVM")
            .field("cpu", &self.cpu)
            .field("memory", &self.memory.memory())
            .field("trace_len", &self.trace.len())
            .field("scope_depth", &self.scopes.len())
            .finish_non_exhaustive()
    }
}

fn scalar_offset(value: &Value) -> Result<isize, Error> {
    value
        .as_scalar()
        .and_then(|f| f.to_i64())
        .map(|v| v as isize)
        .ok_or(Error::PointerTooLarge)
}

fn compute_res(logic: ResultLogic, op0: &Value, op1: &Value) -> Result<Value, Error> {
    match logic {
        ResultLogic::Op1 => Ok(*op1),
        ResultLogic::Add => op0.add(op1),
        ResultLogic::Mul => op0.multiply(op1),
    }
}

/// Attempts to deduce the value of `op1` given a result logic and the values of `op0` and `dst`.
fn deduce_op1_from_op0(res_logic: ResultLogic, op0: Option<&Value>, dst: &Value) -> Result<Option<Value>, Error> {
    match res_logic {
        ResultLogic::Op1 => Ok(Some(*dst)),
        ResultLogic::Add => match op0 {
            Some(op0) => Ok(Some(dst.subtract(op0)?)),
            None => Ok(None),
        },
        ResultLogic::Mul => match op0 {
            Some(op0) => Ok(Some(dst.divide(op0)?)),
            None => Ok(None),
        },
    }
}

/// Attempts to deduce the value of `op0` given a result logic and the values of `op1` and `dst`.
fn deduce_op0_from_op1(res_logic: ResultLogic, op1: &Value, dst: &Value) -> Result<Option<Value>, Error> {
    match res_logic {
        ResultLogic::Op1 => Ok(None),
        ResultLogic::Add => Ok(Some(dst.subtract(op1)?)),
        ResultLogic::Mul => Ok(Some(dst.divide(op1)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn instruction_word(
        dst_offset: i16,
        op0_offset: i16,
        op1_offset: i16,
        op1_source_bits: u64,
        res_logic_bits: u64,
        pc_update_bits: u64,
        ap_update_bits: u64,
        op_code_bits: u64,
    ) -> u64 {
        (dst_offset as u16 as u64)
            | ((op0_offset as u16 as u64) << 16)
            | ((op1_offset as u16 as u64) << 32)
            | op1_source_bits
            | res_logic_bits
            | pc_update_bits
            | ap_update_bits
            | op_code_bits
    }

    fn empty_program() -> Program {
        Program {
            prime: static_locals::PRIME,
            data: Vec::new(),
            hints: IndexMap::new(),
            identifiers: IndexMap::new(),
            reference_manager: IndexMap::new(),
            debug_info: None,
        }
    }

    #[test]
    fn assert_eq_instruction_writes_dst() {
        // [ap] = [ap - 1] + [ap - 2]   (dst=ap, op0=ap-2, op1=ap-1 sourced from ap, Add, AssertEq)
        let word = instruction_word(0, -2, -1, 0x0010_0000_0000_0000, 0x0020_0000_0000_0000, 0, 0, 0x4000_0000_0000_0000);

        let mut program = empty_program();
        program.data.push(Value::Scalar(Felt::from(word)));

        let mut config = VmConfig::new(program, 0);
        config.initial_ap = Pointer::new(1, 2);
        config.initial_fp = Pointer::new(1, 2);
        let mut vm = CairoVM::new(config).unwrap();

        vm.memory.set(Pointer::new(1, 0), Value::Scalar(Felt::from(3))).unwrap();
        vm.memory.set(Pointer::new(1, 1), Value::Scalar(Felt::from(4))).unwrap();

        vm.step().unwrap();

        assert_eq!(vm.memory().get(Pointer::new(1, 2)).map(|v| v.copied()), Some(Value::Scalar(Felt::from(7))));
        assert_eq!(vm.trace().len(), 1);
        assert_eq!(vm.cpu().pc, Pointer::new(0, 1));
    }

    #[test]
    fn hint_skip_leaves_registers_and_trace_untouched() {
        let mut program = empty_program();
        program.data.push(Value::Scalar(Felt::from(0u64)));
        program
            .hints
            .insert(0, vec![program::HintSpec::new("skip_instruction")]);

        let config = VmConfig::new(program, 0);
        let mut vm = CairoVM::new(config).unwrap();

        let pc_before = vm.cpu().pc;
        vm.step().unwrap();

        assert_eq!(vm.trace().len(), 0);
        assert_eq!(vm.cpu().pc, pc_before);
    }

    #[test]
    fn mismatched_program_base_is_reported_not_panicked() {
        let program = empty_program();
        let mut config = VmConfig::new(program, 0);
        config.program_base = Pointer::new(3, 0);
        assert!(matches!(
            CairoVM::new(config),
            Err(Error::ProgramBaseMismatch { expected: 0, actual: 3 })
        ));
    }

    #[test]
    fn mismatched_initial_ap_is_reported_not_panicked() {
        let program = empty_program();
        let mut config = VmConfig::new(program, 0);
        config.initial_ap = Pointer::new(3, 0);
        assert!(matches!(
            CairoVM::new(config),
            Err(Error::InitialApMismatch { expected: 1, actual: 3 })
        ));
    }

    #[test]
    fn end_run_rejects_unbalanced_scope() {
        let program = empty_program();
        let config = VmConfig::new(program, 0);
        let mut vm = CairoVM::new(config).unwrap();
        vm.scopes.enter_scope(Default::default());
        assert!(matches!(vm.end_run(), Err(Error::UnbalancedScope)));
    }

    #[test]
    fn end_run_accepts_balanced_scope() {
        let program = empty_program();
        let config = VmConfig::new(program, 0);
        let mut vm = CairoVM::new(config).unwrap();
        vm.end_run().unwrap();
    }
}
