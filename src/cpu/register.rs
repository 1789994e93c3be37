use std::fmt;

use crate::cpu::flag::Flags;

#[cfg(test)]
#[path = "./register_test.rs"]
mod register_test;

#[derive(Copy, Clone, Default)]
pub struct Register16 {
    pub val: u16,
}

impl Register16 {
    pub fn set_hi(&mut self, val: u8) {
        self.val = (self.val & 0xFF) + (u16::from(val) << 8);
    }
    pub fn set_lo(&mut self, val: u8) {
        self.val = (self.val & 0xFF00) + u16::from(val);
    }
    pub fn lo_u8(&self) -> u8 {
        (self.val & 0xFF) as u8
    }
    pub fn hi_u8(&self) -> u8 {
        (self.val >> 8) as u8
    }
}

/// cpu registers
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum R {
    AL, CL, DL, BL, AH, CH, DH, BH,         // 8-bit halves
    AX, CX, DX, BX, SP, BP, SI, DI,         // 16-bit general purpose
    ES, CS, SS, DS, FS, GS,                 // segment registers
}

impl fmt::Display for R {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl R {
    pub fn as_str(self) -> &'static str {
        match self {
            R::AL => "al", R::CL => "cl", R::DL => "dl", R::BL => "bl",
            R::AH => "ah", R::CH => "ch", R::DH => "dh", R::BH => "bh",
            R::AX => "ax", R::CX => "cx", R::DX => "dx", R::BX => "bx",
            R::SP => "sp", R::BP => "bp", R::SI => "si", R::DI => "di",
            R::ES => "es", R::CS => "cs", R::SS => "ss", R::DS => "ds",
            R::FS => "fs", R::GS => "gs",
        }
    }

    /// index into the gpr file (8-bit registers share slots with their parent)
    pub fn index(self) -> usize {
        match self {
            R::AL | R::AX => 0,
            R::CL | R::CX => 1,
            R::DL | R::DX => 2,
            R::BL | R::BX => 3,
            R::AH | R::SP => 4,
            R::CH | R::BP => 5,
            R::DH | R::SI => 6,
            R::BH | R::DI => 7,
            R::ES => 0,
            R::CS => 1,
            R::SS => 2,
            R::DS => 3,
            R::FS => 4,
            R::GS => 5,
        }
    }

    pub fn is_8bit(self) -> bool {
        match self {
            R::AL | R::CL | R::DL | R::BL | R::AH | R::CH | R::DH | R::BH => true,
            _ => false,
        }
    }

    pub fn is_segment(self) -> bool {
        match self {
            R::ES | R::CS | R::SS | R::DS | R::FS | R::GS => true,
            _ => false,
        }
    }
}

/// decodes 3-bit r8 field
pub fn r8(v: u8) -> R {
    match v & 7 {
        0 => R::AL,
        1 => R::CL,
        2 => R::DL,
        3 => R::BL,
        4 => R::AH,
        5 => R::CH,
        6 => R::DH,
        _ => R::BH,
    }
}

/// decodes 3-bit r16 field
pub fn r16(v: u8) -> R {
    match v & 7 {
        0 => R::AX,
        1 => R::CX,
        2 => R::DX,
        3 => R::BX,
        4 => R::SP,
        5 => R::BP,
        6 => R::SI,
        _ => R::DI,
    }
}

/// decodes 3-bit sreg field
pub fn sr(v: u8) -> R {
    match v & 7 {
        0 => R::ES,
        1 => R::CS,
        2 => R::SS,
        3 => R::DS,
        4 => R::FS,
        _ => R::GS,
    }
}

/// 16-bit addressing forms selected by the ModR/M r/m field
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum AMode {
    BXSI, BXDI, BPSI, BPDI, SI, DI, BP, BX,
}

impl AMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AMode::BXSI => "bx+si",
            AMode::BXDI => "bx+di",
            AMode::BPSI => "bp+si",
            AMode::BPDI => "bp+di",
            AMode::SI => "si",
            AMode::DI => "di",
            AMode::BP => "bp",
            AMode::BX => "bx",
        }
    }

    /// base registers of this form default to SS when they involve BP
    pub fn default_segment_is_ss(self) -> bool {
        match self {
            AMode::BPSI | AMode::BPDI | AMode::BP => true,
            _ => false,
        }
    }
}

impl fmt::Display for AMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// decodes 3-bit r/m field into an addressing form
pub fn amode(v: u8) -> AMode {
    match v & 7 {
        0 => AMode::BXSI,
        1 => AMode::BXDI,
        2 => AMode::BPSI,
        3 => AMode::BPDI,
        4 => AMode::SI,
        5 => AMode::DI,
        6 => AMode::BP,
        _ => AMode::BX,
    }
}

/// the full register file: general purpose, segment, ip and flags
#[derive(Clone)]
pub struct RegisterState {
    pub gpr: [Register16; 8],
    pub sreg: [Register16; 6],
    pub ip: u16,
    pub flags: Flags,
}

impl RegisterState {
    pub fn default() -> Self {
        RegisterState {
            gpr: [Register16::default(); 8],
            sreg: [Register16::default(); 6],
            ip: 0,
            flags: Flags::new(),
        }
    }

    pub fn get_r8(&self, r: R) -> u8 {
        match r {
            R::AL | R::CL | R::DL | R::BL => self.gpr[r.index()].lo_u8(),
            R::AH | R::CH | R::DH | R::BH => self.gpr[r.index() - 4].hi_u8(),
            _ => panic!("get_r8 with 16-bit register {}", r),
        }
    }

    pub fn set_r8(&mut self, r: R, val: u8) {
        match r {
            R::AL | R::CL | R::DL | R::BL => self.gpr[r.index()].set_lo(val),
            R::AH | R::CH | R::DH | R::BH => self.gpr[r.index() - 4].set_hi(val),
            _ => panic!("set_r8 with 16-bit register {}", r),
        }
    }

    pub fn get_r16(&self, r: R) -> u16 {
        if r.is_segment() {
            self.sreg[r.index()].val
        } else {
            self.gpr[r.index()].val
        }
    }

    pub fn set_r16(&mut self, r: R, val: u16) {
        if r.is_segment() {
            self.sreg[r.index()].val = val;
        } else {
            self.gpr[r.index()].val = val;
        }
    }
}
