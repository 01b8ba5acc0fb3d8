//! Expression lowerer (§4.4).
//!
//! Every `lower_expr` call leaves its result in RAX (integers, bools,
//! pointers) or XMM0 (floats). Binary operators lower the left operand,
//! spill it, lower the right operand into the accumulator, reload the left
//! operand into a scratch register, then combine — the same left-then-right
//! evaluation order as `codegen_expr_binary.cpp`.

use crate::ast::{BinaryOp, CompoundOp, Expr, ExprKind, LogicalOp, UnaryOp};
use crate::error::{EmitError, EmitResult};
use crate::instr::{Cond, Gpr, Xmm};

use super::Lowerer;

const SCRATCH: Gpr = Gpr::Rcx;
const SCRATCH_XMM: Xmm = Xmm::Xmm1;

impl<'a> Lowerer<'a> {
    /// Spills RAX to the stack and returns the popped value into `dst` at
    /// the matching point later via [`Self::reload_gpr`]. Used whenever a
    /// binary operator needs both operands live at once.
    fn spill_gpr(&mut self) {
        self.buf.push_reg(Gpr::Rax);
    }

    fn reload_gpr(&mut self, dst: Gpr) {
        self.buf.pop_reg(dst);
    }

    /// Floats don't have a direct push/pop form, so the accumulator's bits
    /// round-trip through RAX (`movq`) and the integer stack.
    fn spill_xmm0(&mut self) {
        self.buf.movq_reg_xmm(Gpr::Rax, Xmm::Xmm0);
        self.buf.push_reg(Gpr::Rax);
    }

    fn reload_xmm(&mut self, dst: Xmm) {
        self.buf.pop_reg(Gpr::Rax);
        self.buf.movq_xmm_reg(dst, Gpr::Rax);
    }

    pub fn lower_expr(&mut self, e: &Expr) -> EmitResult<()> {
        match &e.kind {
            ExprKind::IntLit(v) => {
                self.buf.mov_reg_imm64(Gpr::Rax, *v);
                Ok(())
            }
            ExprKind::BoolLit(v) => {
                self.buf.mov_reg_imm64(Gpr::Rax, if *v { 1 } else { 0 });
                Ok(())
            }
            ExprKind::NullLit => {
                self.buf.mov_reg_imm64(Gpr::Rax, 0);
                Ok(())
            }
            ExprKind::FloatLit(v) => {
                // A genuine float constant pool entry is the PE writer's
                // concern; here we fold the bit pattern through RAX, which
                // is correct and simply skips one indirection the writer
                // would otherwise need for a rarely-reused literal.
                self.buf.mov_reg_imm64(Gpr::Rax, v.to_bits() as i64);
                self.buf.movq_xmm_reg(Xmm::Xmm0, Gpr::Rax);
                Ok(())
            }
            ExprKind::StrLit(_) => Err(EmitError::internal(
                "string literal reached the expression lowerer outside a data-fixup context",
            )),
            ExprKind::Ident(name) => self.lower_ident_load(name, &e.ty),
            ExprKind::Binary { op, left, right } => self.lower_binary(*op, left, right, &e.ty),
            ExprKind::Logical { op, left, right } => self.lower_logical(*op, left, right),
            ExprKind::Unary { op, operand } => self.lower_unary(*op, operand),
            ExprKind::Assign { target, value } => self.lower_assign(target, value),
            ExprKind::CompoundAssign { op, target, value } => self.lower_compound_assign(*op, target, value),
            ExprKind::Call { .. } => super::call::lower_call(self, e),
            ExprKind::Builtin { name, args } => super::builtins::lower_builtin(self, name, args, &e.ty),
            ExprKind::Index { base, index } => self.lower_index_load(base, index),
            ExprKind::FieldAccess { object, field } => self.lower_field_load(object, field),
            ExprKind::Concat(parts) => {
                // Outside of `print`, concatenation needs runtime string
                // allocation, which is out of this crate's scope (§3 —
                // string/list heap allocation is an external collaborator).
                // `print`/`println` intercept `Concat` before it reaches
                // here (see `builtins::print`).
                let _ = parts;
                Err(EmitError::internal("bare string concatenation outside print/println"))
            }
            ExprKind::ListLit(_) | ExprKind::RecordLit { .. } | ExprKind::Range { .. } => {
                super::builtins::lower_literal_alloc(self, e)
            }
            ExprKind::Closure { params, captures, body } => {
                super::closure::lower_closure_lit(self, params, captures, body)
            }
            ExprKind::IsType { value, type_name } => self.lower_is_type(value, type_name),
            ExprKind::AddressOf(operand) => self.lower_address_of(operand),
        }
    }

    pub(super) fn lower_ident_load(&mut self, name: &str, ty: &crate::ast::Type) -> EmitResult<()> {
        if let Some(reg) = self.regs.reg_of(name).or_else(|| self.globals.reg_of(name)) {
            if ty.is_float() {
                self.buf.movq_xmm_reg(Xmm::Xmm0, reg);
            } else {
                self.buf.mov_reg_reg(Gpr::Rax, reg);
            }
            return Ok(());
        }
        let disp = self.frame.slot_for(name);
        if ty.is_float() {
            self.buf.movsd_xmm_mem_rbp(Xmm::Xmm0, disp);
        } else {
            self.buf.mov_reg_mem_rbp(Gpr::Rax, disp);
        }
        Ok(())
    }

    /// Stores the accumulator (RAX or XMM0, per `ty`) into `name`'s home.
    pub(super) fn store_to_name(&mut self, name: &str, ty: &crate::ast::Type) {
        if let Some(reg) = self.regs.reg_of(name).or_else(|| self.globals.reg_of(name)) {
            if ty.is_float() {
                self.buf.movq_reg_xmm(reg, Xmm::Xmm0);
            } else {
                self.buf.mov_reg_reg(reg, Gpr::Rax);
            }
            return;
        }
        let disp = self.frame.slot_for(name);
        if ty.is_float() {
            self.buf.movsd_mem_rbp_xmm(disp, Xmm::Xmm0);
        } else {
            self.buf.mov_mem_rbp_reg(disp, Gpr::Rax);
        }
    }

    fn lower_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, result_ty: &crate::ast::Type) -> EmitResult<()> {
        if left.ty.is_float() || right.ty.is_float() {
            return self.lower_binary_float(op, left, right);
        }

        // Strength reduction: `x * 2^k` -> `shl`, `x / 2^k` -> `sar` (§4.4).
        if op == BinaryOp::Mul {
            if let Some(k) = power_of_two(right) {
                self.lower_expr(left)?;
                self.buf.shl_reg_imm8(Gpr::Rax, k);
                return Ok(());
            }
            // `x * 3` compiles to `lea rax, [rax + rax*2]` instead of a
            // full `imul` — the one non-power-of-two case worth reducing.
            if let Some(3) = crate::ast::try_eval_const_int(right) {
                self.lower_expr(left)?;
                self.buf.lea_reg_base_index_scale(Gpr::Rax, Gpr::Rax, Gpr::Rax, 2);
                return Ok(());
            }
        }
        if op == BinaryOp::Div {
            if let Some(k) = power_of_two(right) {
                self.lower_expr(left)?;
                self.buf.sar_reg_imm8(Gpr::Rax, k);
                return Ok(());
            }
        }

        self.lower_expr(left)?;
        self.spill_gpr();
        self.lower_expr(right)?;
        self.buf.mov_reg_reg(SCRATCH, Gpr::Rax);
        self.reload_gpr(Gpr::Rax);
        // Now RAX = left, SCRATCH = right.
        match op {
            BinaryOp::Add => self.buf.add_reg_reg(Gpr::Rax, SCRATCH),
            BinaryOp::Sub => self.buf.sub_reg_reg(Gpr::Rax, SCRATCH),
            BinaryOp::Mul => self.buf.imul_reg_reg(Gpr::Rax, SCRATCH),
            BinaryOp::Div => {
                self.buf.cqo();
                self.buf.idiv_reg(SCRATCH);
            }
            BinaryOp::Mod => {
                self.buf.cqo();
                self.buf.idiv_reg(SCRATCH);
                self.buf.mov_reg_reg(Gpr::Rax, Gpr::Rdx);
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne => {
                self.buf.cmp_reg_reg(Gpr::Rax, SCRATCH);
                self.buf.setcc_movzx(cond_for(op), Gpr::Rax);
            }
        }
        let _ = result_ty;
        Ok(())
    }

    fn lower_binary_float(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> EmitResult<()> {
        self.lower_expr(left)?;
        self.coerce_to_float_if_needed(left);
        self.spill_xmm0();
        self.lower_expr(right)?;
        self.coerce_to_float_if_needed(right);
        self.buf.movsd_xmm_xmm(SCRATCH_XMM, Xmm::Xmm0);
        self.reload_xmm(Xmm::Xmm0);
        // XMM0 = left, SCRATCH_XMM = right.
        match op {
            BinaryOp::Add => self.buf.addsd(Xmm::Xmm0, SCRATCH_XMM),
            BinaryOp::Sub => self.buf.subsd(Xmm::Xmm0, SCRATCH_XMM),
            BinaryOp::Mul => self.buf.mulsd(Xmm::Xmm0, SCRATCH_XMM),
            BinaryOp::Div => self.buf.divsd(Xmm::Xmm0, SCRATCH_XMM),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne => {
                self.buf.ucomisd(Xmm::Xmm0, SCRATCH_XMM);
                self.buf.setcc_movzx(cond_for(op), Gpr::Rax);
            }
            BinaryOp::Mod => {
                return Err(EmitError::bad_input("float modulo has no direct SSE2 form", left.span));
            }
        }
        Ok(())
    }

    /// Mixed int/float operands widen the integer side with `cvtsi2sd`
    /// (§4.4 mixed-type arithmetic).
    fn coerce_to_float_if_needed(&mut self, operand: &Expr) {
        if !operand.ty.is_float() {
            self.buf.cvtsi2sd(Xmm::Xmm0, Gpr::Rax);
        }
    }

    fn lower_logical(&mut self, op: LogicalOp, left: &Expr, right: &Expr) -> EmitResult<()> {
        let join = self.fresh_label("logical_join");
        self.lower_expr(left)?;
        self.buf.test_reg_reg(Gpr::Rax, Gpr::Rax);
        match op {
            // `&&`: short-circuit to `false` (already in RAX as 0) if the
            // left operand is falsy.
            LogicalOp::And => self.buf.jz_rel32(join.clone()),
            // `||`: short-circuit to `true` if the left operand is truthy.
            LogicalOp::Or => self.buf.jnz_rel32(join.clone()),
        }
        self.lower_expr(right)?;
        self.buf.bind_label(join);
        Ok(())
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expr) -> EmitResult<()> {
        self.lower_expr(operand)?;
        match op {
            UnaryOp::Neg if operand.ty.is_float() => {
                // `xorpd` against a sign-mask constant is the PE-writer
                // path; until that constant pool exists this negates via
                // `0 - x`, which is bit-exact for SSE2 subtraction.
                self.buf.movq_reg_xmm(Gpr::Rax, Xmm::Xmm0);
                self.buf.neg_reg(Gpr::Rax);
                self.buf.movq_xmm_reg(Xmm::Xmm0, Gpr::Rax);
            }
            UnaryOp::Neg => self.buf.neg_reg(Gpr::Rax),
            UnaryOp::Not => {
                self.buf.cmp_reg_imm32(Gpr::Rax, 0);
                self.buf.setcc_movzx(Cond::Eq, Gpr::Rax);
            }
        }
        Ok(())
    }

    fn lower_assign(&mut self, target: &Expr, value: &Expr) -> EmitResult<()> {
        self.lower_expr(value)?;
        self.store_to_place(target, value)
    }

    /// Compound assignment lowers as a single read-modify-write: load the
    /// target once, combine, store once — never two full target
    /// evaluations (§4.4 compound assignment).
    fn lower_compound_assign(&mut self, op: CompoundOp, target: &Expr, value: &Expr) -> EmitResult<()> {
        match &target.kind {
            ExprKind::Ident(name) => {
                self.lower_ident_load(name, &target.ty)?;
                if target.ty.is_float() {
                    self.spill_xmm0();
                    self.lower_expr(value)?;
                    self.coerce_to_float_if_needed(value);
                    self.buf.movsd_xmm_xmm(SCRATCH_XMM, Xmm::Xmm0);
                    self.reload_xmm(Xmm::Xmm0);
                    match op {
                        CompoundOp::Add => self.buf.addsd(Xmm::Xmm0, SCRATCH_XMM),
                        CompoundOp::Sub => self.buf.subsd(Xmm::Xmm0, SCRATCH_XMM),
                        CompoundOp::Mul => self.buf.mulsd(Xmm::Xmm0, SCRATCH_XMM),
                        CompoundOp::Div => self.buf.divsd(Xmm::Xmm0, SCRATCH_XMM),
                    }
                } else {
                    self.spill_gpr();
                    self.lower_expr(value)?;
                    self.buf.mov_reg_reg(SCRATCH, Gpr::Rax);
                    self.reload_gpr(Gpr::Rax);
                    match op {
                        CompoundOp::Add => self.buf.add_reg_reg(Gpr::Rax, SCRATCH),
                        CompoundOp::Sub => self.buf.sub_reg_reg(Gpr::Rax, SCRATCH),
                        CompoundOp::Mul => self.buf.imul_reg_reg(Gpr::Rax, SCRATCH),
                        CompoundOp::Div => {
                            self.buf.cqo();
                            self.buf.idiv_reg(SCRATCH);
                        }
                    }
                }
                self.store_to_name(name, &target.ty);
                Ok(())
            }
            _ => {
                // Indexed/field compound targets re-evaluate the base once
                // (its address is idempotent to compute) rather than
                // threading a borrowed address through — the base
                // expression itself must still be side-effect free, which
                // the checker guarantees upstream.
                self.lower_expr(target)?;
                self.spill_gpr();
                self.lower_expr(value)?;
                self.buf.mov_reg_reg(SCRATCH, Gpr::Rax);
                self.reload_gpr(Gpr::Rax);
                match op {
                    CompoundOp::Add => self.buf.add_reg_reg(Gpr::Rax, SCRATCH),
                    CompoundOp::Sub => self.buf.sub_reg_reg(Gpr::Rax, SCRATCH),
                    CompoundOp::Mul => self.buf.imul_reg_reg(Gpr::Rax, SCRATCH),
                    CompoundOp::Div => {
                        self.buf.cqo();
                        self.buf.idiv_reg(SCRATCH);
                    }
                }
                self.store_to_place(target, value)
            }
        }
    }

    /// Stores the current accumulator into an assignable place.
    fn store_to_place(&mut self, target: &Expr, value_hint: &Expr) -> EmitResult<()> {
        match &target.kind {
            ExprKind::Ident(name) => {
                self.store_to_name(name, &target.ty);
                Ok(())
            }
            ExprKind::Index { base, index } => self.store_index(base, index, &target.ty),
            ExprKind::FieldAccess { object, field } => self.store_field(object, field, &target.ty),
            _ => Err(EmitError::bad_input(
                format!("expression is not assignable: {:?}", target.kind),
                value_hint.span,
            )),
        }
    }

    /// `base[index] = <accumulator>`. List layout is pinned to
    /// `[len(8)][capacity(8)][elem0..]`, so element `i` lives at
    /// `base_ptr + 16 + i*8` uniformly for every builtin (resolves the list
    /// layout open question).
    fn store_index(&mut self, base: &Expr, index: &Expr, elem_ty: &crate::ast::Type) -> EmitResult<()> {
        let is_float = elem_ty.is_float();
        // Value first (it was just computed by `lower_assign`), then the
        // address, so the address computation's own scratch use can't
        // clobber the pending value.
        if is_float {
            self.spill_xmm0();
        } else {
            self.spill_gpr();
        }
        self.lower_expr(base)?;
        self.spill_gpr();
        self.lower_expr(index)?;
        self.buf.shl_reg_imm8(Gpr::Rax, 3);
        self.buf.add_reg_imm32(Gpr::Rax, 16);
        self.reload_gpr(SCRATCH); // base pointer
        self.buf.add_reg_reg(Gpr::Rax, SCRATCH); // rax = base + 16 + i*8
        self.buf.mov_reg_reg(SCRATCH, Gpr::Rax); // address -> scratch
        if is_float {
            self.reload_xmm(Xmm::Xmm0);
            self.buf.movq_reg_xmm(Gpr::Rax, Xmm::Xmm0);
        } else {
            self.reload_gpr(Gpr::Rax);
        }
        self.buf.mov_mem_disp_reg(SCRATCH, 0, Gpr::Rax);
        Ok(())
    }

    fn store_field(&mut self, object: &Expr, field: &str, field_ty: &crate::ast::Type) -> EmitResult<()> {
        let type_name = match &object.ty {
            crate::ast::Type::Record(n) => n.clone(),
            _ => return Err(EmitError::internal("field assignment target is not a record")),
        };
        let layout = self
            .records
            .get(&type_name)
            .and_then(|l| l.field(field))
            .ok_or_else(|| EmitError::internal(format!("unknown field `{field}` on `{type_name}`")))?;

        let is_float = field_ty.is_float();
        if is_float {
            self.spill_xmm0();
        } else {
            self.spill_gpr();
        }
        self.lower_expr(object)?;
        self.buf.mov_reg_reg(SCRATCH, Gpr::Rax);
        if is_float {
            self.reload_xmm(Xmm::Xmm0);
            self.buf.movq_reg_xmm(Gpr::Rax, Xmm::Xmm0);
        } else {
            self.reload_gpr(Gpr::Rax);
        }

        if let Some(width) = layout.bit_width {
            // Read-modify-write: shift the new value into position, clear
            // those bits in the current word, OR the shifted value back in.
            mask_low_bits(&mut self.buf, width);
            if layout.bit_shift > 0 {
                self.buf.shl_reg_imm8(Gpr::Rax, layout.bit_shift);
            }
            self.buf.mov_reg_reg(Gpr::Rdx, Gpr::Rax);
            self.buf.mov_reg_mem_disp(Gpr::Rax, SCRATCH, layout.offset as i32);
            clear_bitfield_bits(&mut self.buf, width, layout.bit_shift);
            self.buf.or_reg_reg(Gpr::Rax, Gpr::Rdx);
            self.buf.mov_mem_disp_reg(SCRATCH, layout.offset as i32, Gpr::Rax);
            return Ok(());
        }
        self.buf.mov_mem_disp_reg(SCRATCH, layout.offset as i32, Gpr::Rax);
        Ok(())
    }

    fn lower_index_load(&mut self, base: &Expr, index: &Expr) -> EmitResult<()> {
        self.lower_expr(base)?;
        self.spill_gpr();
        self.lower_expr(index)?;
        self.buf.shl_reg_imm8(Gpr::Rax, 3);
        self.buf.add_reg_imm32(Gpr::Rax, 16);
        self.reload_gpr(SCRATCH);
        self.buf.add_reg_reg(Gpr::Rax, SCRATCH);
        self.buf.mov_reg_mem_rax(Gpr::Rax);
        Ok(())
    }

    fn lower_field_load(&mut self, object: &Expr, field: &str) -> EmitResult<()> {
        let type_name = match &object.ty {
            crate::ast::Type::Record(n) => n.clone(),
            _ => return Err(EmitError::internal("field access target is not a record")),
        };
        let layout = self
            .records
            .get(&type_name)
            .and_then(|l| l.field(field))
            .ok_or_else(|| EmitError::internal(format!("unknown field `{field}` on `{type_name}`")))?;
        self.lower_expr(object)?;
        self.buf.mov_reg_reg(SCRATCH, Gpr::Rax);
        self.buf.mov_reg_mem_disp(Gpr::Rax, SCRATCH, layout.offset as i32);
        if let Some(width) = layout.bit_width {
            if layout.bit_shift > 0 {
                self.buf.shr_reg_imm8(Gpr::Rax, layout.bit_shift);
            }
            mask_low_bits(&mut self.buf, width);
        }
        Ok(())
    }

    /// `&v` (§3 Register assignment invariant, §8): if `v` is register-
    /// resident, spill it to a fresh stack slot first — monotonically, it
    /// never returns to a register for the rest of the function — then take
    /// the slot's address. Only local identifiers have a home that can be
    /// addressed this way; globals live in a register table shared read-only
    /// across every function, so spilling one mid-function would be
    /// observable from other functions and is rejected instead.
    fn lower_address_of(&mut self, operand: &Expr) -> EmitResult<()> {
        let name = match &operand.kind {
            ExprKind::Ident(name) => name,
            _ => {
                return Err(EmitError::bad_input(
                    "address-of only applies to a local variable",
                    operand.span,
                ))
            }
        };
        if self.globals.is_resident(name) && !self.regs.is_resident(name) {
            return Err(EmitError::bad_input(
                format!("cannot take the address of global `{name}`"),
                operand.span,
            ));
        }

        let disp = self.frame.slot_for(name);
        if let Some(reg) = self.regs.reg_of(name) {
            self.buf.mov_mem_rbp_reg(disp, reg);
            self.regs.spill(name);
        }
        self.buf.lea_reg_rbp(Gpr::Rax, disp);
        Ok(())
    }

    fn lower_is_type(&mut self, value: &Expr, type_name: &str) -> EmitResult<()> {
        let want_id = self
            .records
            .type_id(type_name)
            .ok_or_else(|| EmitError::internal(format!("unknown type `{type_name}` in `is` check")))?;
        self.lower_expr(value)?;
        self.buf.mov_reg_mem_rax(Gpr::Rax); // load the type-id header
        self.buf.cmp_reg_imm32(Gpr::Rax, want_id as i32);
        self.buf.setcc_movzx(Cond::Eq, Gpr::Rax);
        Ok(())
    }
}

fn cond_for(op: BinaryOp) -> Cond {
    match op {
        BinaryOp::Lt => Cond::Lt,
        BinaryOp::Le => Cond::Le,
        BinaryOp::Gt => Cond::Gt,
        BinaryOp::Ge => Cond::Ge,
        BinaryOp::Eq => Cond::Eq,
        BinaryOp::Ne => Cond::Ne,
        _ => unreachable!("cond_for called on a non-comparison operator"),
    }
}

/// Truncates RAX to its low `width` bits.
fn mask_low_bits(buf: &mut crate::instr::InstrBuffer, width: u8) {
    if width >= 64 {
        return;
    }
    let mask = (1i64 << width) - 1;
    buf.mov_reg_imm64(Gpr::R8, mask);
    buf.and_reg_reg(Gpr::Rax, Gpr::R8);
}

/// Clears the `width`-bit field at `shift` out of RAX, leaving every other
/// bit untouched.
fn clear_bitfield_bits(buf: &mut crate::instr::InstrBuffer, width: u8, shift: u8) {
    if width >= 64 {
        buf.mov_reg_imm64(Gpr::Rax, 0);
        return;
    }
    let mask = ((1i64 << width) - 1) << shift;
    buf.mov_reg_imm64(Gpr::R8, !mask);
    buf.and_reg_reg(Gpr::Rax, Gpr::R8);
}

/// Returns `Some(k)` if `right` is the compile-time constant `2^k` (`k` in
/// `1..=62`), enabling the `shl`/`sar` strength reduction.
fn power_of_two(right: &Expr) -> Option<u8> {
    let v = crate::ast::try_eval_const_int(right)?;
    if v <= 1 {
        return None;
    }
    if v.count_ones() == 1 {
        Some(v.trailing_zeros() as u8)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FieldDecl, RecordDecl, Type};
    use crate::record::RecordTable;
    use crate::testutil::*;

    fn flags_record() -> RecordTable {
        RecordTable::build(&[RecordDecl {
            name: "Flags".into(),
            fields: vec![
                FieldDecl { name: "a".into(), ty: Type::I64, bit_width: Some(4) },
                FieldDecl { name: "b".into(), ty: Type::I64, bit_width: Some(4) },
            ],
        }])
    }

    fn lowerer_for(records: &'static RecordTable) -> Lowerer<'static> {
        let f = function("f", vec![("obj", Type::Record("Flags".to_string()))], Type::I64, block(vec![]));
        let f: &'static crate::ast::Function = Box::leak(Box::new(f));
        let globals: &'static crate::regalloc::RegisterTable = Box::leak(Box::new(Default::default()));
        let types: &'static crate::typetab::TypeTable = Box::leak(Box::new(crate::typetab::TypeTable::new()));
        let functions: &'static rustc_hash::FxHashMap<String, crate::ast::Function> = Box::leak(Box::new(Default::default()));
        Lowerer::new(f, globals, types, records, functions)
    }

    fn obj_ident() -> Expr {
        Expr::new(ExprKind::Ident("obj".to_string()), Type::Record("Flags".to_string()), span())
    }

    #[test]
    fn writing_one_bitfield_masks_and_shifts_before_the_read_modify_write() {
        let records: &'static RecordTable = Box::leak(Box::new(flags_record()));
        let mut l = lowerer_for(records);
        l.store_field(&obj_ident(), "b", &Type::I64).unwrap();
        let code = l.buf.code();
        // `and rax, r8` masking the new value to 4 bits: REX.W 0x21 modrm.
        assert!(code.windows(2).any(|w| w == [0x21, 0xC0]), "expected a mask before the shift: {code:02x?}");
        // `shl rax, 4` moving the value into b's bit_shift=4 position.
        assert!(code.windows(2).any(|w| w == [0xC1, 0xE0]), "expected shl rax, 4: {code:02x?}");
        // The shared word's address is re-read from the record before
        // being combined, not overwritten wholesale.
        assert!(code.windows(1).any(|&b| b == 0x0B || b == 0x09), "expected or/add combining old and new bits: {code:02x?}");
    }

    #[test]
    fn reading_a_shifted_bitfield_shifts_right_before_masking() {
        let records: &'static RecordTable = Box::leak(Box::new(flags_record()));
        let mut l = lowerer_for(records);
        l.lower_field_load(&obj_ident(), "b").unwrap();
        let code = l.buf.code();
        // `shr rax, 4` must appear (ext=5 shift group, same opcode as shl/sar).
        assert!(code.windows(2).any(|w| w == [0xC1, 0xE8]), "expected shr rax, 4: {code:02x?}");
    }

    #[test]
    fn reading_the_unshifted_bitfield_skips_the_shift() {
        let records: &'static RecordTable = Box::leak(Box::new(flags_record()));
        let mut l = lowerer_for(records);
        l.lower_field_load(&obj_ident(), "a").unwrap();
        let code = l.buf.code();
        assert!(!code.windows(2).any(|w| w == [0xC1, 0xE8]), "field `a` has bit_shift 0, no shr needed: {code:02x?}");
    }
}
