//! x86-64 register encodings (Microsoft x64 ABI, §6).

/// General-purpose 64-bit registers, encoded exactly as the 4-bit field x86
/// uses in ModRM/SIB/REX (low 3 bits in the byte, high bit in REX.B/R/X).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Gpr {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Gpr {
    pub const fn num(self) -> u8 {
        self as u8
    }

    /// Low 3 bits, used directly in ModRM/opcode+reg encodings.
    pub const fn low3(self) -> u8 {
        self.num() & 0x7
    }

    /// Whether this register needs REX.B/R/X set (registers R8-R15).
    pub const fn needs_rex_bit(self) -> bool {
        self.num() >= 8
    }

    /// The callee-saved registers available to the allocator: RBX, R12-R15
    /// (§3 Register assignment — RBP/RSP are reserved for the frame).
    pub const CALLEE_SAVED: [Gpr; 5] = [Gpr::Rbx, Gpr::R12, Gpr::R13, Gpr::R14, Gpr::R15];

    /// Win64 integer argument registers, in order.
    pub const ARG_REGS: [Gpr; 4] = [Gpr::Rcx, Gpr::Rdx, Gpr::R8, Gpr::R9];
}

/// XMM registers used for float operands (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Xmm {
    Xmm0 = 0,
    Xmm1 = 1,
    Xmm2 = 2,
    Xmm3 = 3,
}

impl Xmm {
    pub const fn num(self) -> u8 {
        self as u8
    }

    pub const ARG_REGS: [Xmm; 4] = [Xmm::Xmm0, Xmm::Xmm1, Xmm::Xmm2, Xmm::Xmm3];
}

/// REX prefix byte: `0100WRXB`. `w` selects the 64-bit operand size that
/// every GPR instruction in this emitter uses.
pub const fn rex(w: bool, r: bool, x: bool, b: bool) -> u8 {
    0x40 | ((w as u8) << 3) | ((r as u8) << 2) | ((x as u8) << 1) | (b as u8)
}

/// ModRM byte for a register-direct operand pair.
pub const fn modrm_reg(reg: u8, rm: u8) -> u8 {
    0xC0 | ((reg & 0x7) << 3) | (rm & 0x7)
}

/// ModRM byte for `[rbp + disp32]`-style memory operands (mod=10, rm=101).
pub const fn modrm_disp32(reg: u8) -> u8 {
    0x80 | ((reg & 0x7) << 3) | 0x5
}

/// ModRM + SIB for RIP-relative addressing (`mod=00, rm=101`).
pub const fn modrm_rip(reg: u8) -> u8 {
    ((reg & 0x7) << 3) | 0x5
}
