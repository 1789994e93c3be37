// these modules are re-exported as a single module

pub use self::decoder::*;
mod decoder;

pub use self::instruction::*;
mod instruction;

pub use self::segment::*;
mod segment;

pub use self::register::*;
mod register;

pub use self::flag::*;
mod flag;

pub use self::parameter::*;
mod parameter;

pub use self::op::*;
mod op;

use std::num::Wrapping;

use crate::memory::MMU;

/// why the interpreter stopped fetching
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum HaltReason {
    None,
    /// the HLT opcode
    Hlt,
    /// a DOS terminate service (INT 20h, INT 21h AH=4Ch, INT 27h)
    ProgramExit,
    /// a blocking keyboard read found the key buffer empty
    KeyWait,
}

pub struct CPU {
    pub instruction_count: usize,
    pub cycle_count: usize,

    /// general purpose registers, segment registers, ip, flags
    pub regs: RegisterState,

    /// true when the interpreter has stopped fetching, see `halt_reason`
    pub halted: bool,
    pub halt_reason: HaltReason,

    /// signals an unrecoverable host-side error, tears the session down
    pub fatal_error: bool,

    /// toggles non-deterministic behaviour (used by tests)
    pub deterministic: bool,

    pub decoder: Decoder,
}

impl CPU {
    pub fn default() -> Self {
        CPU {
            instruction_count: 0,
            cycle_count: 0,
            regs: RegisterState::default(),
            halted: false,
            halt_reason: HaltReason::None,
            fatal_error: false,
            deterministic: false,
            decoder: Decoder::default(),
        }
    }

    pub fn deterministic() -> Self {
        let mut res = Self::default();
        res.deterministic = true;
        res
    }

    pub fn get_r8(&self, r: R) -> u8 {
        self.regs.get_r8(r)
    }

    pub fn set_r8(&mut self, r: R, val: u8) {
        self.regs.set_r8(r, val);
    }

    pub fn get_r16(&self, r: R) -> u16 {
        self.regs.get_r16(r)
    }

    pub fn set_r16(&mut self, r: R, val: u16) {
        self.regs.set_r16(r, val);
    }

    /// stops fetching with the given reason
    pub fn halt(&mut self, reason: HaltReason) {
        self.halted = true;
        self.halt_reason = reason;
    }

    /// resumes fetching
    pub fn resume(&mut self) {
        self.halted = false;
        self.halt_reason = HaltReason::None;
    }

    pub fn push16(&mut self, mmu: &mut MMU, data: u16) {
        let sp = (Wrapping(self.get_r16(R::SP)) - Wrapping(2)).0;
        self.set_r16(R::SP, sp);
        let ss = self.get_r16(R::SS);
        mmu.write_u16(ss, sp, data);
    }

    pub fn pop16(&mut self, mmu: &mut MMU) -> u16 {
        let sp = self.get_r16(R::SP);
        let data = mmu.read_u16(self.get_r16(R::SS), sp);
        self.set_r16(R::SP, (Wrapping(sp) + Wrapping(2)).0);
        data
    }

    /// resolves a segment operand to the value of the segment register,
    /// `Default` resolves to DS
    pub fn segment(&self, seg: Segment) -> u16 {
        match seg {
            Segment::Default | Segment::DS => self.get_r16(R::DS),
            Segment::ES => self.get_r16(R::ES),
            Segment::CS => self.get_r16(R::CS),
            Segment::SS => self.get_r16(R::SS),
            Segment::FS => self.get_r16(R::FS),
            Segment::GS => self.get_r16(R::GS),
        }
    }

    /// resolves the segment of an addressing-form operand:
    /// BP-based forms default to SS, everything else to DS
    fn amode_segment(&self, seg: Segment, amode: AMode) -> u16 {
        if seg == Segment::Default && amode.default_segment_is_ss() {
            self.get_r16(R::SS)
        } else {
            self.segment(seg)
        }
    }

    /// offset part of an addressing form
    pub fn amode_offset(&self, amode: AMode) -> u16 {
        match amode {
            AMode::BXSI => (Wrapping(self.get_r16(R::BX)) + Wrapping(self.get_r16(R::SI))).0,
            AMode::BXDI => (Wrapping(self.get_r16(R::BX)) + Wrapping(self.get_r16(R::DI))).0,
            AMode::BPSI => (Wrapping(self.get_r16(R::BP)) + Wrapping(self.get_r16(R::SI))).0,
            AMode::BPDI => (Wrapping(self.get_r16(R::BP)) + Wrapping(self.get_r16(R::DI))).0,
            AMode::SI => self.get_r16(R::SI),
            AMode::DI => self.get_r16(R::DI),
            AMode::BP => self.get_r16(R::BP),
            AMode::BX => self.get_r16(R::BX),
        }
    }

    /// resolves a memory operand to (segment value, offset).
    /// the decoder resolved the displacement once, so re-resolving here
    /// never consumes instruction bytes twice.
    pub fn parameter_address(&self, param: &Parameter) -> (u16, u16) {
        match *param {
            Parameter::Ptr8(seg, offs) | Parameter::Ptr16(seg, offs) => (self.segment(seg), offs),
            Parameter::Ptr8Amode(seg, amode) | Parameter::Ptr16Amode(seg, amode) => {
                (self.amode_segment(seg, amode), self.amode_offset(amode))
            }
            Parameter::Ptr8AmodeS8(seg, amode, disp) | Parameter::Ptr16AmodeS8(seg, amode, disp) => (
                self.amode_segment(seg, amode),
                (Wrapping(self.amode_offset(amode)) + Wrapping(disp as u16)).0,
            ),
            Parameter::Ptr8AmodeS16(seg, amode, disp) | Parameter::Ptr16AmodeS16(seg, amode, disp) => (
                self.amode_segment(seg, amode),
                (Wrapping(self.amode_offset(amode)) + Wrapping(disp as u16)).0,
            ),
            _ => panic!("parameter_address on non-memory parameter {:?}", param),
        }
    }

    /// reads the value of a parameter, widened to usize
    pub fn read_parameter_value(&self, mmu: &MMU, param: &Parameter) -> usize {
        match *param {
            Parameter::Reg8(r) => usize::from(self.get_r8(r)),
            Parameter::Reg16(r) | Parameter::SReg16(r) => usize::from(self.get_r16(r)),
            Parameter::Imm8(imm) => usize::from(imm),
            Parameter::ImmS8(imm) => usize::from(imm as u16), // sign-extended
            Parameter::Imm16(imm) => usize::from(imm),
            Parameter::Ptr8(_, _) |
            Parameter::Ptr8Amode(_, _) |
            Parameter::Ptr8AmodeS8(_, _, _) |
            Parameter::Ptr8AmodeS16(_, _, _) => {
                let (seg, offs) = self.parameter_address(param);
                usize::from(mmu.read_u8(seg, offs))
            }
            Parameter::Ptr16(_, _) |
            Parameter::Ptr16Amode(_, _) |
            Parameter::Ptr16AmodeS8(_, _, _) |
            Parameter::Ptr16AmodeS16(_, _, _) => {
                let (seg, offs) = self.parameter_address(param);
                usize::from(mmu.read_u16(seg, offs))
            }
            _ => panic!("read_parameter_value on {:?}", param),
        }
    }

    pub fn write_parameter_u8(&mut self, mmu: &mut MMU, param: &Parameter, data: u8) {
        match *param {
            Parameter::Reg8(r) => self.set_r8(r, data),
            _ => {
                let (seg, offs) = self.parameter_address(param);
                mmu.write_u8(seg, offs, data);
            }
        }
    }

    pub fn write_parameter_u16(&mut self, mmu: &mut MMU, param: &Parameter, data: u16) {
        match *param {
            Parameter::Reg16(r) | Parameter::SReg16(r) => self.set_r16(r, data),
            _ => {
                let (seg, offs) = self.parameter_address(param);
                mmu.write_u16(seg, offs, data);
            }
        }
    }

    /// compares two 8-bit values by subtraction, updating flags only
    pub fn cmp8(&mut self, dst: usize, src: usize) {
        let res = (Wrapping(dst) - Wrapping(src)).0;
        self.regs.flags.set_carry_u8(res & 0x1FF);
        self.regs.flags.set_overflow_sub_u8(res, src, dst);
        self.regs.flags.set_adjust(res, src, dst);
        self.regs.flags.set_szp_u8(res);
    }

    /// compares two 16-bit values by subtraction, updating flags only
    pub fn cmp16(&mut self, dst: usize, src: usize) {
        let res = (Wrapping(dst) - Wrapping(src)).0;
        self.regs.flags.set_carry_u16(res & 0x1FFFF);
        self.regs.flags.set_overflow_sub_u16(res, src, dst);
        self.regs.flags.set_adjust(res, src, dst);
        self.regs.flags.set_szp_u16(res);
    }
}
