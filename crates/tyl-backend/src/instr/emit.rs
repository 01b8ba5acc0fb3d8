//! Primitive instruction emitters — one per encoded x86-64 instruction form
//! (§4.1). Each appends raw bytes to an [`InstrBuffer`] and, for symbolic
//! operands, records a fix-up.

use super::buffer::{DataFixUpKind, InstrBuffer};
use super::reg::{modrm_disp32, modrm_reg, modrm_rip, rex, Gpr, Xmm};

/// Condition codes for `Jcc`/`SETcc`, encoded as the low nibble of the
/// two-byte `0F 8x` / `0F 9x` opcode forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Eq = 0x4,
    Ne = 0x5,
    Lt = 0xC,
    Le = 0xE,
    Gt = 0xF,
    Ge = 0xD,
}

impl InstrBuffer {
    // -- data movement ----------------------------------------------------

    pub fn mov_reg_reg(&mut self, dst: Gpr, src: Gpr) {
        self.push_u8(rex(true, src.needs_rex_bit(), false, dst.needs_rex_bit()));
        self.push_u8(0x89);
        self.push_u8(modrm_reg(src.low3(), dst.low3()));
    }

    pub fn mov_reg_imm64(&mut self, dst: Gpr, value: i64) {
        self.push_u8(rex(true, false, false, dst.needs_rex_bit()));
        self.push_u8(0xB8 | dst.low3());
        self.push_i64(value);
    }

    pub fn mov_reg_imm32(&mut self, dst: Gpr, value: i32) {
        self.push_u8(rex(true, false, false, dst.needs_rex_bit()));
        self.push_u8(0xC7);
        self.push_u8(modrm_reg(0, dst.low3()));
        self.push_i32(value);
    }

    /// `mov dst, [rbp + disp32]` — loads a local/spill slot.
    pub fn mov_reg_mem_rbp(&mut self, dst: Gpr, disp: i32) {
        self.push_u8(rex(true, dst.needs_rex_bit(), false, false));
        self.push_u8(0x8B);
        self.push_u8(modrm_disp32(dst.low3()));
        self.push_i32(disp);
    }

    /// `mov [rbp + disp32], src` — stores to a local/spill slot.
    pub fn mov_mem_rbp_reg(&mut self, disp: i32, src: Gpr) {
        self.push_u8(rex(true, src.needs_rex_bit(), false, false));
        self.push_u8(0x89);
        self.push_u8(modrm_disp32(src.low3()));
        self.push_i32(disp);
    }

    /// `mov [rax], src` — pointer-indirect store used by list/record field
    /// writes, where the base address is already computed into RAX.
    pub fn mov_mem_rax_reg(&mut self, src: Gpr) {
        self.push_u8(rex(true, src.needs_rex_bit(), false, false));
        self.push_u8(0x89);
        self.push_u8(modrm_reg(src.low3(), 0) & 0x3F); // mod=00, rm=000 ([rax])
    }

    /// `mov dst, [rax]`.
    pub fn mov_reg_mem_rax(&mut self, dst: Gpr) {
        self.push_u8(rex(true, dst.needs_rex_bit(), false, false));
        self.push_u8(0x8B);
        self.push_u8(modrm_reg(dst.low3(), 0) & 0x3F);
    }

    /// `mov dst, [base + disp32]` — a record field load or any other
    /// pointer-plus-constant-offset read, for a base register other than
    /// the implicit RBP-relative locals form.
    pub fn mov_reg_mem_disp(&mut self, dst: Gpr, base: Gpr, disp: i32) {
        self.push_u8(rex(true, dst.needs_rex_bit(), false, base.needs_rex_bit()));
        self.push_u8(0x8B);
        self.push_u8(0x80 | ((dst.low3()) << 3) | base.low3());
        self.push_i32(disp);
    }

    /// `mov [base + disp32], src` — the write-side counterpart of
    /// [`Self::mov_reg_mem_disp`], used for record field stores and indexed
    /// list element writes.
    pub fn mov_mem_disp_reg(&mut self, base: Gpr, disp: i32, src: Gpr) {
        self.push_u8(rex(true, src.needs_rex_bit(), false, base.needs_rex_bit()));
        self.push_u8(0x89);
        self.push_u8(0x80 | ((src.low3()) << 3) | base.low3());
        self.push_i32(disp);
    }

    /// `lea dst, [rip + fixup]` — address of PE-writer-owned data (a
    /// string, float constant, or vtable).
    pub fn lea_reg_rip(&mut self, dst: Gpr, rva: u32, kind: DataFixUpKind) {
        self.push_u8(rex(true, dst.needs_rex_bit(), false, false));
        self.push_u8(0x8D);
        self.push_u8(modrm_rip(dst.low3()));
        self.emit_data_fixup(rva, kind);
    }

    /// `lea dst, [rip + label]` — address of another function's entry
    /// label, materialized as a runtime value rather than called directly.
    /// Used to write a closure's code pointer into its heap object (§4.4).
    pub fn lea_reg_rip_label(&mut self, dst: Gpr, label: impl Into<String>) {
        self.push_u8(rex(true, dst.needs_rex_bit(), false, false));
        self.push_u8(0x8D);
        self.push_u8(modrm_rip(dst.low3()));
        self.emit_rel32_fixup(label);
    }

    /// `lea dst, [rbp + disp32]` — address of a spilled local's stack slot
    /// (§3 Register assignment invariant, address-of operator).
    pub fn lea_reg_rbp(&mut self, dst: Gpr, disp: i32) {
        self.push_u8(rex(true, dst.needs_rex_bit(), false, false));
        self.push_u8(0x8D);
        self.push_u8(modrm_disp32(dst.low3()));
        self.push_i32(disp);
    }

    // -- arithmetic ---------------------------------------------------------

    pub fn add_reg_reg(&mut self, dst: Gpr, src: Gpr) {
        self.alu_reg_reg(0x01, dst, src);
    }
    pub fn sub_reg_reg(&mut self, dst: Gpr, src: Gpr) {
        self.alu_reg_reg(0x29, dst, src);
    }
    pub fn and_reg_reg(&mut self, dst: Gpr, src: Gpr) {
        self.alu_reg_reg(0x21, dst, src);
    }
    pub fn or_reg_reg(&mut self, dst: Gpr, src: Gpr) {
        self.alu_reg_reg(0x09, dst, src);
    }
    pub fn xor_reg_reg(&mut self, dst: Gpr, src: Gpr) {
        self.alu_reg_reg(0x31, dst, src);
    }
    pub fn cmp_reg_reg(&mut self, dst: Gpr, src: Gpr) {
        self.alu_reg_reg(0x39, dst, src);
    }

    fn alu_reg_reg(&mut self, opcode: u8, dst: Gpr, src: Gpr) {
        self.push_u8(rex(true, src.needs_rex_bit(), false, dst.needs_rex_bit()));
        self.push_u8(opcode);
        self.push_u8(modrm_reg(src.low3(), dst.low3()));
    }

    pub fn add_reg_imm32(&mut self, dst: Gpr, value: i32) {
        self.alu_reg_imm32(0, dst, value);
    }
    pub fn or_reg_imm32(&mut self, dst: Gpr, value: i32) {
        self.alu_reg_imm32(1, dst, value);
    }
    pub fn and_reg_imm32(&mut self, dst: Gpr, value: i32) {
        self.alu_reg_imm32(4, dst, value);
    }
    pub fn sub_reg_imm32(&mut self, dst: Gpr, value: i32) {
        self.alu_reg_imm32(5, dst, value);
    }
    pub fn cmp_reg_imm32(&mut self, dst: Gpr, value: i32) {
        self.alu_reg_imm32(7, dst, value);
    }

    fn alu_reg_imm32(&mut self, ext: u8, dst: Gpr, value: i32) {
        self.push_u8(rex(true, false, false, dst.needs_rex_bit()));
        self.push_u8(0x81);
        self.push_u8(modrm_reg(ext, dst.low3()));
        self.push_i32(value);
    }

    /// `imul dst, src` — two-operand signed multiply (used whenever
    /// strength reduction does not apply, §4.4).
    pub fn imul_reg_reg(&mut self, dst: Gpr, src: Gpr) {
        self.push_u8(rex(true, dst.needs_rex_bit(), false, src.needs_rex_bit()));
        self.push_u8(0x0F);
        self.push_u8(0xAF);
        self.push_u8(modrm_reg(dst.low3(), src.low3()));
    }

    /// `idiv rcx` — RDX:RAX / RCX, quotient in RAX, remainder in RDX.
    /// Callers are responsible for `cqo` before this and routing the
    /// quotient/remainder afterward.
    pub fn cqo(&mut self) {
        self.push_u8(0x48);
        self.push_u8(0x99);
    }

    pub fn idiv_reg(&mut self, divisor: Gpr) {
        self.push_u8(rex(true, false, false, divisor.needs_rex_bit()));
        self.push_u8(0xF7);
        self.push_u8(modrm_reg(7, divisor.low3()));
    }

    pub fn neg_reg(&mut self, reg: Gpr) {
        self.push_u8(rex(true, false, false, reg.needs_rex_bit()));
        self.push_u8(0xF7);
        self.push_u8(modrm_reg(3, reg.low3()));
    }

    /// `shl dst, imm8` — strength-reduced multiply by a power of two.
    pub fn shl_reg_imm8(&mut self, dst: Gpr, shift: u8) {
        self.shift_reg_imm8(4, dst, shift);
    }

    /// `sar dst, imm8` — strength-reduced signed divide by a power of two.
    pub fn sar_reg_imm8(&mut self, dst: Gpr, shift: u8) {
        self.shift_reg_imm8(7, dst, shift);
    }

    /// `shr dst, imm8` — logical right shift, used to pull a bit-field out
    /// of its packing word before masking (§6 bit-field read).
    pub fn shr_reg_imm8(&mut self, dst: Gpr, shift: u8) {
        self.shift_reg_imm8(5, dst, shift);
    }

    fn shift_reg_imm8(&mut self, ext: u8, dst: Gpr, shift: u8) {
        self.push_u8(rex(true, false, false, dst.needs_rex_bit()));
        self.push_u8(0xC1);
        self.push_u8(modrm_reg(ext, dst.low3()));
        self.push_u8(shift);
    }

    /// `lea dst, [base + index*scale]` — used for the `x*3` strength
    /// reduction (`lea rax, [rcx + rcx*2]`) and similar scaled-index forms.
    pub fn lea_reg_base_index_scale(&mut self, dst: Gpr, base: Gpr, index: Gpr, scale: u8) {
        let scale_bits = match scale {
            1 => 0,
            2 => 1,
            4 => 2,
            8 => 3,
            _ => unreachable!("scale must be 1/2/4/8"),
        };
        self.push_u8(rex(
            true,
            dst.needs_rex_bit(),
            index.needs_rex_bit(),
            base.needs_rex_bit(),
        ));
        self.push_u8(0x8D);
        self.push_u8(0x04 | ((dst.low3()) << 3)); // mod=00, rm=100 (SIB follows)
        self.push_u8((scale_bits << 6) | (index.low3() << 3) | base.low3());
    }

    // -- comparisons --------------------------------------------------------

    /// `setcc al; movzx dst, al` — materializes a boolean into a GPR.
    pub fn setcc_movzx(&mut self, cond: Cond, dst: Gpr) {
        self.push_u8(0x0F);
        self.push_u8(0x90 | cond as u8);
        self.push_u8(modrm_reg(0, Gpr::Rax.low3()));
        self.push_u8(rex(true, dst.needs_rex_bit(), false, false));
        self.push_u8(0x0F);
        self.push_u8(0xB6);
        self.push_u8(modrm_reg(dst.low3(), Gpr::Rax.low3()));
    }

    // -- control flow ---------------------------------------------------------

    pub fn jmp_rel32(&mut self, label: impl Into<String>) {
        self.push_u8(0xE9);
        self.emit_rel32_fixup(label);
    }

    pub fn jcc_rel32(&mut self, cond: Cond, label: impl Into<String>) {
        self.push_u8(0x0F);
        self.push_u8(0x80 | cond as u8);
        self.emit_rel32_fixup(label);
    }

    pub fn jz_rel32(&mut self, label: impl Into<String>) {
        self.push_u8(0x0F);
        self.push_u8(0x84);
        self.emit_rel32_fixup(label);
    }

    pub fn jnz_rel32(&mut self, label: impl Into<String>) {
        self.push_u8(0x0F);
        self.push_u8(0x85);
        self.emit_rel32_fixup(label);
    }

    pub fn call_rel32(&mut self, label: impl Into<String>) {
        self.push_u8(0xE8);
        self.emit_rel32_fixup(label);
    }

    /// `call [rip + import_rva]` — extern call through the PE import
    /// table (§4.6).
    pub fn call_rip_import(&mut self, rva: u32) {
        self.push_u8(0xFF);
        self.push_u8(0x15); // ModRM: mod=00 reg=010(call) rm=101(rip)
        self.emit_data_fixup(rva, DataFixUpKind::RawData);
    }

    pub fn call_reg(&mut self, target: Gpr) {
        self.push_u8(rex(false, false, false, target.needs_rex_bit()));
        self.push_u8(0xFF);
        self.push_u8(modrm_reg(2, target.low3()));
    }

    pub fn push_reg(&mut self, reg: Gpr) {
        if reg.needs_rex_bit() {
            self.push_u8(rex(false, false, false, true));
        }
        self.push_u8(0x50 | reg.low3());
    }

    pub fn pop_reg(&mut self, reg: Gpr) {
        if reg.needs_rex_bit() {
            self.push_u8(rex(false, false, false, true));
        }
        self.push_u8(0x58 | reg.low3());
    }

    pub fn ret(&mut self) {
        self.push_u8(0xC3);
    }

    pub fn nop(&mut self) {
        self.push_u8(0x90);
    }

    pub fn test_reg_reg(&mut self, a: Gpr, b: Gpr) {
        self.push_u8(rex(true, b.needs_rex_bit(), false, a.needs_rex_bit()));
        self.push_u8(0x85);
        self.push_u8(modrm_reg(b.low3(), a.low3()));
    }

    // -- float (SSE2) ---------------------------------------------------------

    fn xmm_rm_prefix(&mut self, rex_b: bool) {
        self.push_u8(0xF2);
        if rex_b {
            self.push_u8(rex(false, false, false, true));
        }
    }

    pub fn movsd_xmm_mem_rbp(&mut self, dst: Xmm, disp: i32) {
        self.push_u8(0xF2);
        self.push_u8(0x0F);
        self.push_u8(0x10);
        self.push_u8(modrm_disp32(dst.num()));
        self.push_i32(disp);
    }

    pub fn movsd_mem_rbp_xmm(&mut self, disp: i32, src: Xmm) {
        self.push_u8(0xF2);
        self.push_u8(0x0F);
        self.push_u8(0x11);
        self.push_u8(modrm_disp32(src.num()));
        self.push_i32(disp);
    }

    pub fn movsd_xmm_xmm(&mut self, dst: Xmm, src: Xmm) {
        self.push_u8(0xF2);
        self.push_u8(0x0F);
        self.push_u8(0x10);
        self.push_u8(modrm_reg(dst.num(), src.num()));
    }

    fn sse_binop(&mut self, opcode: u8, dst: Xmm, src: Xmm) {
        self.push_u8(0xF2);
        self.push_u8(0x0F);
        self.push_u8(opcode);
        self.push_u8(modrm_reg(dst.num(), src.num()));
    }

    pub fn addsd(&mut self, dst: Xmm, src: Xmm) {
        self.sse_binop(0x58, dst, src);
    }
    pub fn subsd(&mut self, dst: Xmm, src: Xmm) {
        self.sse_binop(0x5C, dst, src);
    }
    pub fn mulsd(&mut self, dst: Xmm, src: Xmm) {
        self.sse_binop(0x59, dst, src);
    }
    pub fn divsd(&mut self, dst: Xmm, src: Xmm) {
        self.sse_binop(0x5E, dst, src);
    }

    pub fn ucomisd(&mut self, a: Xmm, b: Xmm) {
        self.push_u8(0x66);
        self.push_u8(0x0F);
        self.push_u8(0x2E);
        self.push_u8(modrm_reg(a.num(), b.num()));
    }

    /// `cvttsd2si dst, xmm` — truncating float-to-int conversion.
    pub fn cvttsd2si(&mut self, dst: Gpr, src: Xmm) {
        self.push_u8(0xF2);
        self.push_u8(rex(true, dst.needs_rex_bit(), false, false));
        self.push_u8(0x0F);
        self.push_u8(0x2C);
        self.push_u8(modrm_reg(dst.low3(), src.num()));
    }

    /// `cvtsi2sd dst, gpr` — int-to-float conversion, used to materialize
    /// the integer side of a mixed-type binary operation (§4.4).
    pub fn cvtsi2sd(&mut self, dst: Xmm, src: Gpr) {
        self.push_u8(0xF2);
        self.push_u8(rex(true, false, false, src.needs_rex_bit()));
        self.push_u8(0x0F);
        self.push_u8(0x2A);
        self.push_u8(modrm_reg(dst.num(), src.low3()));
    }

    /// `movq xmm, gpr` — bit-reinterpreting move, used to shadow a float
    /// argument's bit pattern into the paired integer register for
    /// variadic Win64 calls (resolves the §9 FFI float open question).
    pub fn movq_xmm_reg(&mut self, dst: Xmm, src: Gpr) {
        self.push_u8(0x66);
        self.push_u8(rex(true, false, false, src.needs_rex_bit()));
        self.push_u8(0x0F);
        self.push_u8(0x6E);
        self.push_u8(modrm_reg(dst.num(), src.low3()));
    }

    pub fn movq_reg_xmm(&mut self, dst: Gpr, src: Xmm) {
        self.push_u8(0x66);
        self.push_u8(rex(true, false, false, dst.needs_rex_bit()));
        self.push_u8(0x0F);
        self.push_u8(0x7E);
        self.push_u8(modrm_reg(src.num(), dst.low3()));
    }

    // -- atomics (§5) -----------------------------------------------------

    pub fn mfence(&mut self) {
        self.push_u8(0x0F);
        self.push_u8(0xAE);
        self.push_u8(0xF0);
    }

    /// `xchg [rax], src` — implicit LOCK, used for atomic `swap`.
    pub fn xchg_mem_rax_reg(&mut self, src: Gpr) {
        self.push_u8(rex(true, src.needs_rex_bit(), false, false));
        self.push_u8(0x87);
        self.push_u8(modrm_reg(src.low3(), 0) & 0x3F);
    }

    /// `lock cmpxchg [base], src` — compares the memory operand against the
    /// *implicit* RAX (the caller must load the expected value there first
    /// and `base` must not itself be RAX, since RAX is simultaneously the
    /// comparand), storing `src` on match or loading the actual value into
    /// RAX on mismatch. Used for atomic `cas`.
    pub fn lock_cmpxchg_mem_reg_reg(&mut self, base: Gpr, src: Gpr) {
        self.push_u8(0xF0); // LOCK prefix
        self.push_u8(rex(true, src.needs_rex_bit(), false, base.needs_rex_bit()));
        self.push_u8(0x0F);
        self.push_u8(0xB1);
        self.push_u8(modrm_reg(src.low3(), base.low3()) & 0x3F);
    }

    /// `lock xadd [rax], src` — used for atomic `add`/`sub`.
    pub fn lock_xadd_mem_rax_reg(&mut self, src: Gpr) {
        self.push_u8(0xF0);
        self.push_u8(rex(true, src.needs_rex_bit(), false, false));
        self.push_u8(0x0F);
        self.push_u8(0xC1);
        self.push_u8(modrm_reg(src.low3(), 0) & 0x3F);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shl_by_3_matches_the_documented_encoding() {
        // scenario 2 (strength-reduction) from §8: `48 C1 E0 03`.
        let mut buf = InstrBuffer::new();
        buf.shl_reg_imm8(Gpr::Rax, 3);
        assert_eq!(buf.code(), &[0x48, 0xC1, 0xE0, 0x03]);
    }

    #[test]
    fn mov_reg_imm64_is_ten_bytes() {
        let mut buf = InstrBuffer::new();
        buf.mov_reg_imm64(Gpr::Rax, 42);
        assert_eq!(buf.len(), 10);
        assert_eq!(buf.code()[0], rex(true, false, false, false));
        assert_eq!(buf.code()[1], 0xB8);
    }

    #[test]
    fn call_rel32_records_a_fixup() {
        let mut buf = InstrBuffer::new();
        buf.call_rel32("callee");
        assert_eq!(buf.fixups().len(), 1);
        assert_eq!(buf.fixups()[0].target, "callee");
    }
}
