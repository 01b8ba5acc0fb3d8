//! The lowering pipeline: AST → [`crate::instr::InstrBuffer`] bytes, one
//! function at a time, in a single pass (§4 Lowering overview).
//!
//! There is no intermediate IR. Each lowering function appends instructions
//! directly and returns with the produced value already in its home location
//! — RAX for integers/bools/pointers, XMM0 for floats. Sub-expression
//! temporaries that don't fit in a single accumulator round-trip through the
//! stack (`push`/`pop` for GPRs, a bit-reinterpreting move through RAX for
//! XMM — see [`expr::Lowerer::spill_xmm0`]), since only *named* locals earn a
//! durable register or stack slot from [`crate::regalloc`] / [`crate::frame`].

mod builtins;
mod call;
mod closure;
mod expr;
mod stmt;

use rustc_hash::FxHashMap;

use crate::ast::{Block, Function, Type};
use crate::error::EmitResult;
use crate::frame::Frame;
use crate::instr::{Gpr, InstrBuffer};
use crate::record::RecordTable;
use crate::regalloc::RegisterTable;
use crate::typetab::TypeTable;

/// A closure literal discovered mid-lowering, queued so its body can be
/// compiled as an ordinary function once the enclosing function is done
/// (§4.6). `params`/`captures` are bare names — every closure slot is
/// treated as an opaque 8-byte word, the same uniform memory model
/// `crate::record` uses for heap fields.
pub struct PendingClosure {
    pub label: String,
    pub params: Vec<String>,
    pub captures: Vec<String>,
    pub body: Block,
}

/// Per-function lowering state. One `Lowerer` is built, driven to
/// completion, and discarded per function — there is no cross-function
/// mutable state beyond what [`crate::regalloc::allocate_global`] already
/// baked into the incoming `globals` register table.
pub struct Lowerer<'a> {
    pub buf: InstrBuffer,
    pub frame: Frame,
    pub regs: RegisterTable,
    pub globals: &'a RegisterTable,
    pub types: &'a TypeTable,
    pub records: &'a RecordTable,
    pub functions: &'a FxHashMap<String, Function>,
    pub return_ty: Type,
    pub pending_closures: Vec<PendingClosure>,
    loop_stack: Vec<LoopLabels>,
    label_seq: u32,
    name_prefix: String,
    end_label: String,
}

struct LoopLabels {
    label: Option<String>,
    continue_label: String,
    break_label: String,
}

impl<'a> Lowerer<'a> {
    pub fn new(
        f: &Function,
        globals: &'a RegisterTable,
        types: &'a TypeTable,
        records: &'a RecordTable,
        functions: &'a FxHashMap<String, Function>,
    ) -> Self {
        let saved = crate::regalloc::allocate_function_local(
            &f.body,
            &f.params.iter().map(|p| p.name.clone()).collect::<Vec<_>>(),
        )
        .registers_in_use();
        let frame = Frame::plan(&f.body, saved, f.is_generic());
        let excluded: Vec<String> = f.params.iter().map(|p| p.name.clone()).collect();
        let regs = crate::regalloc::allocate_function_local(&f.body, &excluded);
        Self {
            buf: InstrBuffer::new(),
            frame,
            regs,
            globals,
            types,
            records,
            functions,
            return_ty: f.return_ty.clone(),
            pending_closures: Vec::new(),
            loop_stack: Vec::new(),
            label_seq: 0,
            name_prefix: f.name.clone(),
            end_label: format!("{}$end", f.name),
        }
    }

    /// A fresh, function-unique label for internal control flow (if/else
    /// joins, loop tests, short-circuit joins).
    pub fn fresh_label(&mut self, tag: &str) -> String {
        self.label_seq += 1;
        format!("{}${}${}", self.name_prefix, tag, self.label_seq)
    }

    pub(super) fn push_loop(&mut self, label: Option<String>, continue_label: String, break_label: String) {
        self.loop_stack.push(LoopLabels { label, continue_label, break_label });
    }

    pub(super) fn pop_loop(&mut self) {
        self.loop_stack.pop();
    }

    pub(super) fn end_label(&self) -> String {
        self.end_label.clone()
    }

    /// Resolves a `break`/`continue` target. `None` means the innermost
    /// loop; `Some(name)` walks outward to the labeled loop — including one
    /// reached through an enclosing `match` arm, since `continue` inside a
    /// `match` binds to the nearest *loop*, not the match itself (resolves
    /// the continue-in-match open question).
    pub(super) fn loop_target(&self, label: &Option<String>, want_continue: bool) -> EmitResult<String> {
        let found = match label {
            None => self.loop_stack.last(),
            Some(name) => self.loop_stack.iter().rev().find(|l| l.label.as_deref() == Some(name.as_str())),
        };
        let l = found.ok_or_else(|| {
            crate::error::EmitError::internal("break/continue outside any enclosing loop")
        })?;
        Ok(if want_continue { l.continue_label.clone() } else { l.break_label.clone() })
    }

    /// Emits the full function prologue/epilogue/body, following the Win64
    /// ABI (§4.3): push callee-saved regs, set up RBP, reserve the frame,
    /// lower the body, tear down, `ret`. Leaves the result in `self.buf`;
    /// call [`Self::into_parts`] afterward to also collect any closure
    /// literals the body queued.
    pub fn lower_function(&mut self, f: &Function) -> EmitResult<()> {
        self.buf.bind_label(self.name_prefix.clone());
        self.buf.push_reg(Gpr::Rbp);
        self.buf.mov_reg_reg(Gpr::Rbp, crate::instr::Gpr::Rsp);
        for r in self.frame.saved_regs.clone() {
            self.buf.push_reg(r);
        }
        if self.frame.stack_allocated || self.frame.function_stack_size > 0 {
            self.buf.sub_reg_imm32(Gpr::Rsp, self.frame.function_stack_size);
        }

        self.store_incoming_params(f)?;
        stmt::lower_block(self, &f.body)?;

        self.finish_function()
    }

    /// Lowers a closure body: same prologue/epilogue as [`Self::lower_function`],
    /// but the first statement copies each capture out of
    /// `[$closure+16+8·i]` into its own local slot before the body runs
    /// (§4.6). `f`'s own params already carry the hidden `$closure` leading
    /// parameter — see how `crate::program::compile_program` builds it.
    pub fn lower_closure_function(&mut self, f: &Function, captures: &[String]) -> EmitResult<()> {
        self.buf.bind_label(self.name_prefix.clone());
        self.buf.push_reg(Gpr::Rbp);
        self.buf.mov_reg_reg(Gpr::Rbp, crate::instr::Gpr::Rsp);
        for r in self.frame.saved_regs.clone() {
            self.buf.push_reg(r);
        }
        if self.frame.stack_allocated || self.frame.function_stack_size > 0 {
            self.buf.sub_reg_imm32(Gpr::Rsp, self.frame.function_stack_size);
        }

        self.store_incoming_params(f)?;
        for (i, name) in captures.iter().enumerate() {
            self.lower_ident_load("$closure", &Type::I64)?;
            self.buf.mov_reg_mem_disp(Gpr::Rax, Gpr::Rax, 16 + 8 * i as i32);
            self.store_to_name(name, &Type::I64);
        }
        stmt::lower_block(self, &f.body)?;

        self.finish_function()
    }

    fn finish_function(&mut self) -> EmitResult<()> {
        self.buf.bind_label(self.end_label.clone());
        if self.frame.stack_allocated || self.frame.function_stack_size > 0 {
            self.buf.add_reg_imm32(Gpr::Rsp, self.frame.function_stack_size);
        }
        for r in self.frame.saved_regs.clone().into_iter().rev() {
            self.buf.pop_reg(r);
        }
        self.buf.pop_reg(Gpr::Rbp);
        self.buf.ret();
        Ok(())
    }

    /// Splits a driven-to-completion lowerer into its finished code and any
    /// closure literals it queued along the way.
    pub fn into_parts(self) -> (InstrBuffer, Vec<PendingClosure>) {
        (self.buf, self.pending_closures)
    }

    /// Moves the four Win64 integer/float argument registers into each
    /// parameter's register-allocated or stack home (§4.3 prologue).
    fn store_incoming_params(&mut self, f: &Function) -> EmitResult<()> {
        for (i, param) in f.params.iter().enumerate().take(4) {
            if param.ty.is_float() {
                let disp = self.frame.slot_for(&param.name);
                self.buf.movsd_mem_rbp_xmm(disp, crate::instr::Xmm::ARG_REGS[i]);
            } else if let Some(reg) = self.regs.reg_of(&param.name) {
                self.buf.mov_reg_reg(reg, Gpr::ARG_REGS[i]);
            } else {
                let disp = self.frame.slot_for(&param.name);
                self.buf.mov_mem_rbp_reg(disp, Gpr::ARG_REGS[i]);
            }
        }
        // Parameters 5+ already live on the caller's stack (above the
        // return address and our saved RBP); the frame planner gives them
        // slots but callers of this module address those through
        // `Frame::slot_for`, which is out of scope for this prologue.
        Ok(())
    }
}
