use std::fmt;

use crate::cpu::register::{AMode, R};
use crate::cpu::segment::Segment;

/// A set of Parameters for an Instruction
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSet {
    pub dst: Parameter,
    pub src: Parameter,
    pub src2: Parameter,
}

impl ParameterSet {
    /// returns the number of parameters
    pub fn count(&self) -> usize {
        match self.dst {
            Parameter::None => 0,
            _ => match self.src {
                Parameter::None => 1,
                _ => match self.src2 {
                    Parameter::None => 2,
                    _ => 3,
                },
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Parameter {
    /// 8-bit general purpose register
    Reg8(R),
    /// 16-bit general purpose register
    Reg16(R),
    /// 16-bit segment register
    SReg16(R),

    Imm8(u8),                          // byte 0x80
    ImmS8(i8),                         // byte +0x3f, sign-extended when read as a word
    Imm16(u16),                        // word 0x8000
    Ptr16Imm(u16, u16),                // call/jmp far u16:u16

    Ptr8(Segment, u16),                // byte [0x4040]
    Ptr8Amode(Segment, AMode),         // byte [bx]
    Ptr8AmodeS8(Segment, AMode, i8),   // byte [bp-0x20]
    Ptr8AmodeS16(Segment, AMode, i16), // byte [bp-0x2020]

    Ptr16(Segment, u16),               // word [0x4040]
    Ptr16Amode(Segment, AMode),        // word [bx]
    Ptr16AmodeS8(Segment, AMode, i8),  // word [bp-0x20]
    Ptr16AmodeS16(Segment, AMode, i16),// word [bp-0x2020]

    None,
}

fn fmt_disp8(f: &mut fmt::Formatter, seg: Segment, amode: AMode, imm: i8, width: &str) -> fmt::Result {
    write!(
        f,
        "{} [{}:{}{}0x{:02X}]",
        width,
        seg,
        amode,
        if imm < 0 { "-" } else { "+" },
        if imm < 0 { (0i8).wrapping_sub(imm) } else { imm }
    )
}

fn fmt_disp16(f: &mut fmt::Formatter, seg: Segment, amode: AMode, imm: i16, width: &str) -> fmt::Result {
    write!(
        f,
        "{} [{}:{}{}0x{:04X}]",
        width,
        seg,
        amode,
        if imm < 0 { "-" } else { "+" },
        if imm < 0 { (0i16).wrapping_sub(imm) } else { imm }
    )
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Parameter::Reg8(r) | Parameter::Reg16(r) | Parameter::SReg16(r) => write!(f, "{}", r),

            Parameter::Imm8(imm) => write!(f, "0x{:02X}", imm),
            Parameter::Imm16(imm) => write!(f, "0x{:04X}", imm),
            Parameter::ImmS8(imm) => write!(
                f,
                "byte {}0x{:02X}",
                if imm < 0 { "-" } else { "+" },
                if imm < 0 { (0i8).wrapping_sub(imm) } else { imm }
            ),
            Parameter::Ptr16Imm(seg, offs) => write!(f, "{:04X}:{:04X}", seg, offs),

            Parameter::Ptr8(seg, v) => write!(f, "byte [{}:0x{:04X}]", seg, v),
            Parameter::Ptr8Amode(seg, amode) => write!(f, "byte [{}:{}]", seg, amode),
            Parameter::Ptr8AmodeS8(seg, amode, imm) => fmt_disp8(f, seg, amode, imm, "byte"),
            Parameter::Ptr8AmodeS16(seg, amode, imm) => fmt_disp16(f, seg, amode, imm, "byte"),

            Parameter::Ptr16(seg, v) => write!(f, "word [{}:0x{:04X}]", seg, v),
            Parameter::Ptr16Amode(seg, amode) => write!(f, "word [{}:{}]", seg, amode),
            Parameter::Ptr16AmodeS8(seg, amode, imm) => fmt_disp8(f, seg, amode, imm, "word"),
            Parameter::Ptr16AmodeS16(seg, amode, imm) => fmt_disp16(f, seg, amode, imm, "word"),

            Parameter::None => write!(f, ""),
        }
    }
}

/// Instruction encoding layout for Mod/Reg/RM byte
#[derive(Debug)]
pub struct ModRegRm {
    /// "mod" is correct name, but is reserved keyword
    /// High 2 bits
    pub md: u8,

    /// mid 3 bits
    pub reg: u8,

    /// low 3 bits
    pub rm: u8,
}

impl ModRegRm {
    pub fn u8(&self) -> u8 {
        (self.md << 6) | (self.reg << 3) | self.rm
    }
}
