use std::fmt;

/// why a byte sequence failed to decode into a valid instruction
#[derive(Clone, Debug, PartialEq)]
pub enum Invalid {
    /// unhandled opcode
    Op,
    /// unhandled FPU escape opcode (operand bytes were consumed)
    FPUOp,
    /// unhandled reg field of a group opcode
    Reg(u8),
}

/// one variant per root instruction
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Uninitialized,
    Invalid(Vec<u8>, Invalid),

    Aaa, Aad, Aam, Aas,
    Adc8, Adc16,
    Add8, Add16,
    And8, And16,
    Bound,
    CallNear, CallFar,
    Cbw, Clc, Cld, Cli, Cmc,
    Cmp8, Cmp16,
    Cmpsb, Cmpsw,
    Cwd,
    Daa, Das,
    Dec8, Dec16,
    Div8, Div16,
    Enter,
    Hlt,
    Idiv8, Idiv16,
    Imul8, Imul16,
    In8, In16,
    Inc8, Inc16,
    Int, Int3, Into,
    Iret,
    Ja, Jc, Jcxz, Jg, Jl, Jna, Jnc, Jng, Jnl, Jno, Jns, Jnz, Jo, Jpe, Jpo, Js, Jz,
    JmpShort, JmpNear, JmpFar,
    Lahf,
    Lds, Lea, Les,
    Leave,
    Lodsb, Lodsw,
    Loop, Loope, Loopne,
    Mov8, Mov16,
    Movsb, Movsw,
    Movsx16, Movzx16,
    Mul8, Mul16,
    Neg8, Neg16,
    Nop,
    Not8, Not16,
    Or8, Or16,
    Out8, Out16,
    Pop16, Popa, Popf,
    Push16, Pusha, Pushf,
    Rcl8, Rcl16, Rcr8, Rcr16,
    Retf, RetfImm16, Retn, RetnImm16,
    Rol8, Rol16, Ror8, Ror16,
    Sahf,
    Salc,
    Sar8, Sar16,
    Sbb8, Sbb16,
    Scasb, Scasw,
    Shl8, Shl16, Shr8, Shr16,
    Stc, Std, Sti,
    Stosb, Stosw,
    Sub8, Sub16,
    Test8, Test16,
    Wait,
    Xchg8, Xchg16,
    Xlat,
    Xor8, Xor16,
}

impl Op {
    fn mnemonic(&self) -> &str {
        match *self {
            Op::Uninitialized => "(uninitialized)",
            Op::Invalid(_, _) => "(invalid)",
            Op::Aaa => "aaa",
            Op::Aad => "aad",
            Op::Aam => "aam",
            Op::Aas => "aas",
            Op::Adc8 | Op::Adc16 => "adc",
            Op::Add8 | Op::Add16 => "add",
            Op::And8 | Op::And16 => "and",
            Op::Bound => "bound",
            Op::CallNear | Op::CallFar => "call",
            Op::Cbw => "cbw",
            Op::Clc => "clc",
            Op::Cld => "cld",
            Op::Cli => "cli",
            Op::Cmc => "cmc",
            Op::Cmp8 | Op::Cmp16 => "cmp",
            Op::Cmpsb => "cmpsb",
            Op::Cmpsw => "cmpsw",
            Op::Cwd => "cwd",
            Op::Daa => "daa",
            Op::Das => "das",
            Op::Dec8 | Op::Dec16 => "dec",
            Op::Div8 | Op::Div16 => "div",
            Op::Enter => "enter",
            Op::Hlt => "hlt",
            Op::Idiv8 | Op::Idiv16 => "idiv",
            Op::Imul8 | Op::Imul16 => "imul",
            Op::In8 | Op::In16 => "in",
            Op::Inc8 | Op::Inc16 => "inc",
            Op::Int => "int",
            Op::Int3 => "int3",
            Op::Into => "into",
            Op::Iret => "iret",
            Op::Ja => "ja",
            Op::Jc => "jc",
            Op::Jcxz => "jcxz",
            Op::Jg => "jg",
            Op::Jl => "jl",
            Op::Jna => "jna",
            Op::Jnc => "jnc",
            Op::Jng => "jng",
            Op::Jnl => "jnl",
            Op::Jno => "jno",
            Op::Jns => "jns",
            Op::Jnz => "jnz",
            Op::Jo => "jo",
            Op::Jpe => "jpe",
            Op::Jpo => "jpo",
            Op::Js => "js",
            Op::Jz => "jz",
            Op::JmpShort | Op::JmpNear | Op::JmpFar => "jmp",
            Op::Lahf => "lahf",
            Op::Lds => "lds",
            Op::Lea => "lea",
            Op::Les => "les",
            Op::Leave => "leave",
            Op::Lodsb => "lodsb",
            Op::Lodsw => "lodsw",
            Op::Loop => "loop",
            Op::Loope => "loope",
            Op::Loopne => "loopne",
            Op::Mov8 | Op::Mov16 => "mov",
            Op::Movsb => "movsb",
            Op::Movsw => "movsw",
            Op::Movsx16 => "movsx",
            Op::Movzx16 => "movzx",
            Op::Mul8 | Op::Mul16 => "mul",
            Op::Neg8 | Op::Neg16 => "neg",
            Op::Nop => "nop",
            Op::Not8 | Op::Not16 => "not",
            Op::Or8 | Op::Or16 => "or",
            Op::Out8 | Op::Out16 => "out",
            Op::Pop16 => "pop",
            Op::Popa => "popa",
            Op::Popf => "popf",
            Op::Push16 => "push",
            Op::Pusha => "pusha",
            Op::Pushf => "pushf",
            Op::Rcl8 | Op::Rcl16 => "rcl",
            Op::Rcr8 | Op::Rcr16 => "rcr",
            Op::Retf | Op::RetfImm16 => "retf",
            Op::Retn | Op::RetnImm16 => "retn",
            Op::Rol8 | Op::Rol16 => "rol",
            Op::Ror8 | Op::Ror16 => "ror",
            Op::Sahf => "sahf",
            Op::Salc => "salc",
            Op::Sar8 | Op::Sar16 => "sar",
            Op::Sbb8 | Op::Sbb16 => "sbb",
            Op::Scasb => "scasb",
            Op::Scasw => "scasw",
            Op::Shl8 | Op::Shl16 => "shl",
            Op::Shr8 | Op::Shr16 => "shr",
            Op::Stc => "stc",
            Op::Std => "std",
            Op::Sti => "sti",
            Op::Stosb => "stosb",
            Op::Stosw => "stosw",
            Op::Sub8 | Op::Sub16 => "sub",
            Op::Test8 | Op::Test16 => "test",
            Op::Wait => "wait",
            Op::Xchg8 | Op::Xchg16 => "xchg",
            Op::Xlat => "xlat",
            Op::Xor8 | Op::Xor16 => "xor",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}
