use crate::cpu::instruction::{Instruction, InstructionInfo, RepeatMode};
use crate::cpu::op::{Invalid, Op};
use crate::cpu::parameter::{ModRegRm, Parameter, ParameterSet};
use crate::cpu::register::{amode, r16, r8, sr, R};
use crate::cpu::segment::Segment;
use crate::memory::MMU;

#[cfg(test)]
#[path = "./decoder_test.rs"]
mod decoder_test;

#[derive(Clone, Default)]
pub struct Decoder {
    current_seg: u16,
    current_offset: u16,
}

impl Decoder {
    /// decodes the instruction at seg:offset
    pub fn get_instruction(&mut self, mmu: &MMU, seg: u16, offset: u16) -> Instruction {
        self.current_seg = seg;
        self.current_offset = offset;
        let mut op = Instruction::new(Op::Uninitialized);
        self.decode(mmu, &mut op);
        op.length = self.current_offset.wrapping_sub(offset) as u8;
        op
    }

    /// decodes the instruction at seg:offset together with its raw bytes
    pub fn get_instruction_info(&mut self, mmu: &MMU, seg: u16, offset: u16) -> InstructionInfo {
        let instr = self.get_instruction(mmu, seg, offset);
        InstructionInfo {
            segment: seg,
            offset,
            bytes: mmu.read(seg, offset, instr.length as usize),
            instruction: instr,
        }
    }

    /// decodes `n` instructions from seg:offset for disassembly listings
    pub fn decode_to_block(&mut self, mmu: &MMU, seg: u16, offset: u16, n: usize) -> Vec<InstructionInfo> {
        let mut ops = Vec::with_capacity(n);
        let mut inst_offset = offset;
        for _ in 0..n {
            let op = self.get_instruction_info(mmu, seg, inst_offset);
            inst_offset = inst_offset.wrapping_add(op.bytes.len() as u16);
            ops.push(op);
        }
        ops
    }

    fn decode(&mut self, mmu: &MMU, op: &mut Instruction) {
        let b = self.read_u8(mmu);

        match b {
            0x00 => {
                // add r/m8, r8
                op.command = Op::Add8;
                op.params = self.rm8_r8(mmu, op);
            }
            0x01 => {
                // add r/m16, r16
                op.command = Op::Add16;
                op.params = self.rm16_r16(mmu, op);
            }
            0x02 => {
                // add r8, r/m8
                op.command = Op::Add8;
                op.params = self.r8_rm8(mmu, op);
            }
            0x03 => {
                // add r16, r/m16
                op.command = Op::Add16;
                op.params = self.r16_rm16(mmu, op);
            }
            0x04 => {
                // add AL, imm8
                op.command = Op::Add8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0x05 => {
                // add AX, imm16
                op.command = Op::Add16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0x06 => {
                // push es
                op.command = Op::Push16;
                op.params.dst = Parameter::SReg16(R::ES);
            }
            0x07 => {
                // pop es
                op.command = Op::Pop16;
                op.params.dst = Parameter::SReg16(R::ES);
            }
            0x08 => {
                // or r/m8, r8
                op.command = Op::Or8;
                op.params = self.rm8_r8(mmu, op);
            }
            0x09 => {
                // or r/m16, r16
                op.command = Op::Or16;
                op.params = self.rm16_r16(mmu, op);
            }
            0x0A => {
                // or r8, r/m8
                op.command = Op::Or8;
                op.params = self.r8_rm8(mmu, op);
            }
            0x0B => {
                // or r16, r/m16
                op.command = Op::Or16;
                op.params = self.r16_rm16(mmu, op);
            }
            0x0C => {
                // or AL, imm8
                op.command = Op::Or8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0x0D => {
                // or AX, imm16
                op.command = Op::Or16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0x0E => {
                // push cs
                op.command = Op::Push16;
                op.params.dst = Parameter::SReg16(R::CS);
            }
            0x0F => self.decode_0f(mmu, op, b),
            0x10 => {
                // adc r/m8, r8
                op.command = Op::Adc8;
                op.params = self.rm8_r8(mmu, op);
            }
            0x11 => {
                // adc r/m16, r16
                op.command = Op::Adc16;
                op.params = self.rm16_r16(mmu, op);
            }
            0x12 => {
                // adc r8, r/m8
                op.command = Op::Adc8;
                op.params = self.r8_rm8(mmu, op);
            }
            0x13 => {
                // adc r16, r/m16
                op.command = Op::Adc16;
                op.params = self.r16_rm16(mmu, op);
            }
            0x14 => {
                // adc AL, imm8
                op.command = Op::Adc8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0x15 => {
                // adc AX, imm16
                op.command = Op::Adc16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0x16 => {
                // push ss
                op.command = Op::Push16;
                op.params.dst = Parameter::SReg16(R::SS);
            }
            0x17 => {
                // pop ss
                op.command = Op::Pop16;
                op.params.dst = Parameter::SReg16(R::SS);
            }
            0x18 => {
                // sbb r/m8, r8
                op.command = Op::Sbb8;
                op.params = self.rm8_r8(mmu, op);
            }
            0x19 => {
                // sbb r/m16, r16
                op.command = Op::Sbb16;
                op.params = self.rm16_r16(mmu, op);
            }
            0x1A => {
                // sbb r8, r/m8
                op.command = Op::Sbb8;
                op.params = self.r8_rm8(mmu, op);
            }
            0x1B => {
                // sbb r16, r/m16
                op.command = Op::Sbb16;
                op.params = self.r16_rm16(mmu, op);
            }
            0x1C => {
                // sbb AL, imm8
                op.command = Op::Sbb8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0x1D => {
                // sbb AX, imm16
                op.command = Op::Sbb16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0x1E => {
                // push ds
                op.command = Op::Push16;
                op.params.dst = Parameter::SReg16(R::DS);
            }
            0x1F => {
                // pop ds
                op.command = Op::Pop16;
                op.params.dst = Parameter::SReg16(R::DS);
            }
            0x20 => {
                // and r/m8, r8
                op.command = Op::And8;
                op.params = self.rm8_r8(mmu, op);
            }
            0x21 => {
                // and r/m16, r16
                op.command = Op::And16;
                op.params = self.rm16_r16(mmu, op);
            }
            0x22 => {
                // and r8, r/m8
                op.command = Op::And8;
                op.params = self.r8_rm8(mmu, op);
            }
            0x23 => {
                // and r16, r/m16
                op.command = Op::And16;
                op.params = self.r16_rm16(mmu, op);
            }
            0x24 => {
                // and AL, imm8
                op.command = Op::And8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0x25 => {
                // and AX, imm16
                op.command = Op::And16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0x26 => {
                // es segment prefix
                op.segment_prefix = Segment::ES;
                self.decode(mmu, op);
            }
            0x27 => op.command = Op::Daa,
            0x28 => {
                // sub r/m8, r8
                op.command = Op::Sub8;
                op.params = self.rm8_r8(mmu, op);
            }
            0x29 => {
                // sub r/m16, r16
                op.command = Op::Sub16;
                op.params = self.rm16_r16(mmu, op);
            }
            0x2A => {
                // sub r8, r/m8
                op.command = Op::Sub8;
                op.params = self.r8_rm8(mmu, op);
            }
            0x2B => {
                // sub r16, r/m16
                op.command = Op::Sub16;
                op.params = self.r16_rm16(mmu, op);
            }
            0x2C => {
                // sub AL, imm8
                op.command = Op::Sub8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0x2D => {
                // sub AX, imm16
                op.command = Op::Sub16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0x2E => {
                // cs segment prefix
                op.segment_prefix = Segment::CS;
                self.decode(mmu, op);
            }
            0x2F => op.command = Op::Das,
            0x30 => {
                // xor r/m8, r8
                op.command = Op::Xor8;
                op.params = self.rm8_r8(mmu, op);
            }
            0x31 => {
                // xor r/m16, r16
                op.command = Op::Xor16;
                op.params = self.rm16_r16(mmu, op);
            }
            0x32 => {
                // xor r8, r/m8
                op.command = Op::Xor8;
                op.params = self.r8_rm8(mmu, op);
            }
            0x33 => {
                // xor r16, r/m16
                op.command = Op::Xor16;
                op.params = self.r16_rm16(mmu, op);
            }
            0x34 => {
                // xor AL, imm8
                op.command = Op::Xor8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0x35 => {
                // xor AX, imm16
                op.command = Op::Xor16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0x36 => {
                // ss segment prefix
                op.segment_prefix = Segment::SS;
                self.decode(mmu, op);
            }
            0x37 => op.command = Op::Aaa,
            0x38 => {
                // cmp r/m8, r8
                op.command = Op::Cmp8;
                op.params = self.rm8_r8(mmu, op);
            }
            0x39 => {
                // cmp r/m16, r16
                op.command = Op::Cmp16;
                op.params = self.rm16_r16(mmu, op);
            }
            0x3A => {
                // cmp r8, r/m8
                op.command = Op::Cmp8;
                op.params = self.r8_rm8(mmu, op);
            }
            0x3B => {
                // cmp r16, r/m16
                op.command = Op::Cmp16;
                op.params = self.r16_rm16(mmu, op);
            }
            0x3C => {
                // cmp AL, imm8
                op.command = Op::Cmp8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0x3D => {
                // cmp AX, imm16
                op.command = Op::Cmp16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0x3E => {
                // ds segment prefix
                op.segment_prefix = Segment::DS;
                self.decode(mmu, op);
            }
            0x3F => op.command = Op::Aas,
            0x40..=0x47 => {
                // inc r16
                op.command = Op::Inc16;
                op.params.dst = Parameter::Reg16(r16(b & 7));
            }
            0x48..=0x4F => {
                // dec r16
                op.command = Op::Dec16;
                op.params.dst = Parameter::Reg16(r16(b & 7));
            }
            0x50..=0x57 => {
                // push r16
                op.command = Op::Push16;
                op.params.dst = Parameter::Reg16(r16(b & 7));
            }
            0x58..=0x5F => {
                // pop r16
                op.command = Op::Pop16;
                op.params.dst = Parameter::Reg16(r16(b & 7));
            }
            0x60 => op.command = Op::Pusha,
            0x61 => op.command = Op::Popa,
            0x62 => {
                // bound r16, m16&16
                op.command = Op::Bound;
                op.params = self.r16_rm16(mmu, op);
            }
            0x64 => {
                // fs segment prefix
                op.segment_prefix = Segment::FS;
                self.decode(mmu, op);
            }
            0x65 => {
                // gs segment prefix
                op.segment_prefix = Segment::GS;
                self.decode(mmu, op);
            }
            0x68 => {
                // push imm16
                op.command = Op::Push16;
                op.params.dst = Parameter::Imm16(self.read_u16(mmu));
            }
            0x69 => {
                // imul r16, r/m16, imm16
                op.command = Op::Imul16;
                op.params = self.r16_rm16(mmu, op);
                op.params.src2 = Parameter::Imm16(self.read_u16(mmu));
            }
            0x6A => {
                // push imm8 (sign-extended)
                op.command = Op::Push16;
                op.params.dst = Parameter::ImmS8(self.read_s8(mmu));
            }
            0x6B => {
                // imul r16, r/m16, imm8
                op.command = Op::Imul16;
                op.params = self.r16_rm16(mmu, op);
                op.params.src2 = Parameter::ImmS8(self.read_s8(mmu));
            }
            0x70 => {
                // jo rel8
                op.command = Op::Jo;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x71 => {
                // jno rel8
                op.command = Op::Jno;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x72 => {
                // jc rel8
                op.command = Op::Jc;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x73 => {
                // jnc rel8
                op.command = Op::Jnc;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x74 => {
                // jz rel8
                op.command = Op::Jz;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x75 => {
                // jnz rel8
                op.command = Op::Jnz;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x76 => {
                // jna rel8
                op.command = Op::Jna;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x77 => {
                // ja rel8
                op.command = Op::Ja;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x78 => {
                // js rel8
                op.command = Op::Js;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x79 => {
                // jns rel8
                op.command = Op::Jns;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x7A => {
                // jpe rel8
                op.command = Op::Jpe;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x7B => {
                // jpo rel8
                op.command = Op::Jpo;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x7C => {
                // jl rel8
                op.command = Op::Jl;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x7D => {
                // jnl rel8
                op.command = Op::Jnl;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x7E => {
                // jng rel8
                op.command = Op::Jng;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x7F => {
                // jg rel8
                op.command = Op::Jg;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x80 | 0x82 => {
                // <group> r/m8, imm8
                let x = self.read_mod_reg_rm(mmu);
                op.command = match x.reg {
                    0 => Op::Add8,
                    1 => Op::Or8,
                    2 => Op::Adc8,
                    3 => Op::Sbb8,
                    4 => Op::And8,
                    5 => Op::Sub8,
                    6 => Op::Xor8,
                    _ => Op::Cmp8,
                };
                op.params.dst = self.rm8(mmu, op, x.rm, x.md);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0x81 => {
                // <group> r/m16, imm16
                let x = self.read_mod_reg_rm(mmu);
                op.command = match x.reg {
                    0 => Op::Add16,
                    1 => Op::Or16,
                    2 => Op::Adc16,
                    3 => Op::Sbb16,
                    4 => Op::And16,
                    5 => Op::Sub16,
                    6 => Op::Xor16,
                    _ => Op::Cmp16,
                };
                op.params.dst = self.rm16(mmu, op, x.rm, x.md);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0x83 => {
                // <group> r/m16, imm8 (sign-extended)
                let x = self.read_mod_reg_rm(mmu);
                op.command = match x.reg {
                    0 => Op::Add16,
                    1 => Op::Or16,
                    2 => Op::Adc16,
                    3 => Op::Sbb16,
                    4 => Op::And16,
                    5 => Op::Sub16,
                    6 => Op::Xor16,
                    _ => Op::Cmp16,
                };
                op.params.dst = self.rm16(mmu, op, x.rm, x.md);
                op.params.src = Parameter::ImmS8(self.read_s8(mmu));
            }
            0x84 => {
                // test r/m8, r8
                op.command = Op::Test8;
                op.params = self.rm8_r8(mmu, op);
            }
            0x85 => {
                // test r/m16, r16
                op.command = Op::Test16;
                op.params = self.rm16_r16(mmu, op);
            }
            0x86 => {
                // xchg r/m8, r8
                op.command = Op::Xchg8;
                op.params = self.rm8_r8(mmu, op);
            }
            0x87 => {
                // xchg r/m16, r16
                op.command = Op::Xchg16;
                op.params = self.rm16_r16(mmu, op);
            }
            0x88 => {
                // mov r/m8, r8
                op.command = Op::Mov8;
                op.params = self.rm8_r8(mmu, op);
            }
            0x89 => {
                // mov r/m16, r16
                op.command = Op::Mov16;
                op.params = self.rm16_r16(mmu, op);
            }
            0x8A => {
                // mov r8, r/m8
                op.command = Op::Mov8;
                op.params = self.r8_rm8(mmu, op);
            }
            0x8B => {
                // mov r16, r/m16
                op.command = Op::Mov16;
                op.params = self.r16_rm16(mmu, op);
            }
            0x8C => {
                // mov r/m16, sreg
                op.command = Op::Mov16;
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm16(mmu, op, x.rm, x.md);
                op.params.src = Parameter::SReg16(sr(x.reg));
            }
            0x8D => {
                // lea r16, m
                op.command = Op::Lea;
                op.params = self.r16_rm16(mmu, op);
            }
            0x8E => {
                // mov sreg, r/m16
                op.command = Op::Mov16;
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = Parameter::SReg16(sr(x.reg));
                op.params.src = self.rm16(mmu, op, x.rm, x.md);
            }
            0x8F => {
                // pop r/m16
                let x = self.read_mod_reg_rm(mmu);
                op.command = match x.reg {
                    0 => Op::Pop16,
                    _ => Op::Invalid(vec![b, x.u8()], Invalid::Reg(x.reg)),
                };
                op.params.dst = self.rm16(mmu, op, x.rm, x.md);
            }
            0x90 => op.command = Op::Nop,
            0x91..=0x97 => {
                // xchg AX, r16
                op.command = Op::Xchg16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Reg16(r16(b & 7));
            }
            0x98 => op.command = Op::Cbw,
            0x99 => op.command = Op::Cwd,
            0x9A => {
                // call far seg:offs
                op.command = Op::CallFar;
                let offs = self.read_u16(mmu);
                let seg = self.read_u16(mmu);
                op.params.dst = Parameter::Ptr16Imm(seg, offs);
            }
            0x9B => op.command = Op::Wait,
            0x9C => op.command = Op::Pushf,
            0x9D => op.command = Op::Popf,
            0x9E => op.command = Op::Sahf,
            0x9F => op.command = Op::Lahf,
            0xA0 => {
                // mov AL, [moffs8]
                op.command = Op::Mov8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Ptr8(op.segment_prefix, self.read_u16(mmu));
            }
            0xA1 => {
                // mov AX, [moffs16]
                op.command = Op::Mov16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Ptr16(op.segment_prefix, self.read_u16(mmu));
            }
            0xA2 => {
                // mov [moffs8], AL
                op.command = Op::Mov8;
                op.params.dst = Parameter::Ptr8(op.segment_prefix, self.read_u16(mmu));
                op.params.src = Parameter::Reg8(R::AL);
            }
            0xA3 => {
                // mov [moffs16], AX
                op.command = Op::Mov16;
                op.params.dst = Parameter::Ptr16(op.segment_prefix, self.read_u16(mmu));
                op.params.src = Parameter::Reg16(R::AX);
            }
            0xA4 => op.command = Op::Movsb,
            0xA5 => op.command = Op::Movsw,
            0xA6 => op.command = Op::Cmpsb,
            0xA7 => op.command = Op::Cmpsw,
            0xA8 => {
                // test AL, imm8
                op.command = Op::Test8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0xA9 => {
                // test AX, imm16
                op.command = Op::Test16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0xAA => op.command = Op::Stosb,
            0xAB => op.command = Op::Stosw,
            0xAC => op.command = Op::Lodsb,
            0xAD => op.command = Op::Lodsw,
            0xAE => op.command = Op::Scasb,
            0xAF => op.command = Op::Scasw,
            0xB0..=0xB7 => {
                // mov r8, imm8
                op.command = Op::Mov8;
                op.params.dst = Parameter::Reg8(r8(b & 7));
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0xB8..=0xBF => {
                // mov r16, imm16
                op.command = Op::Mov16;
                op.params.dst = Parameter::Reg16(r16(b & 7));
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0xC0 => {
                // <shift group> r/m8, imm8
                let x = self.read_mod_reg_rm(mmu);
                op.command = shift_op8(x.reg);
                op.params.dst = self.rm8(mmu, op, x.rm, x.md);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0xC1 => {
                // <shift group> r/m16, imm8
                let x = self.read_mod_reg_rm(mmu);
                op.command = shift_op16(x.reg);
                op.params.dst = self.rm16(mmu, op, x.rm, x.md);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0xC2 => {
                // retn imm16
                op.command = Op::RetnImm16;
                op.params.dst = Parameter::Imm16(self.read_u16(mmu));
            }
            0xC3 => op.command = Op::Retn,
            0xC4 => {
                // les r16, m16:16
                op.command = Op::Les;
                op.params = self.r16_rm16(mmu, op);
            }
            0xC5 => {
                // lds r16, m16:16
                op.command = Op::Lds;
                op.params = self.r16_rm16(mmu, op);
            }
            0xC6 => {
                // mov r/m8, imm8
                let x = self.read_mod_reg_rm(mmu);
                op.command = Op::Mov8;
                op.params.dst = self.rm8(mmu, op, x.rm, x.md);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0xC7 => {
                // mov r/m16, imm16
                let x = self.read_mod_reg_rm(mmu);
                op.command = Op::Mov16;
                op.params.dst = self.rm16(mmu, op, x.rm, x.md);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0xC8 => {
                // enter imm16, imm8
                op.command = Op::Enter;
                op.params.dst = Parameter::Imm16(self.read_u16(mmu));
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0xC9 => op.command = Op::Leave,
            0xCA => {
                // retf imm16
                op.command = Op::RetfImm16;
                op.params.dst = Parameter::Imm16(self.read_u16(mmu));
            }
            0xCB => op.command = Op::Retf,
            0xCC => op.command = Op::Int3,
            0xCD => {
                // int imm8
                op.command = Op::Int;
                op.params.dst = Parameter::Imm8(self.read_u8(mmu));
            }
            0xCE => op.command = Op::Into,
            0xCF => op.command = Op::Iret,
            0xD0 => {
                // <shift group> r/m8, 1
                let x = self.read_mod_reg_rm(mmu);
                op.command = shift_op8(x.reg);
                op.params.dst = self.rm8(mmu, op, x.rm, x.md);
                op.params.src = Parameter::Imm8(1);
            }
            0xD1 => {
                // <shift group> r/m16, 1
                let x = self.read_mod_reg_rm(mmu);
                op.command = shift_op16(x.reg);
                op.params.dst = self.rm16(mmu, op, x.rm, x.md);
                op.params.src = Parameter::Imm8(1);
            }
            0xD2 => {
                // <shift group> r/m8, CL
                let x = self.read_mod_reg_rm(mmu);
                op.command = shift_op8(x.reg);
                op.params.dst = self.rm8(mmu, op, x.rm, x.md);
                op.params.src = Parameter::Reg8(R::CL);
            }
            0xD3 => {
                // <shift group> r/m16, CL
                let x = self.read_mod_reg_rm(mmu);
                op.command = shift_op16(x.reg);
                op.params.dst = self.rm16(mmu, op, x.rm, x.md);
                op.params.src = Parameter::Reg8(R::CL);
            }
            0xD4 => {
                // aam imm8
                op.command = Op::Aam;
                op.params.dst = Parameter::Imm8(self.read_u8(mmu));
            }
            0xD5 => {
                // aad imm8
                op.command = Op::Aad;
                op.params.dst = Parameter::Imm8(self.read_u8(mmu));
            }
            0xD6 => op.command = Op::Salc,
            0xD7 => op.command = Op::Xlat,
            0xD8..=0xDF => {
                // fpu escape: consume the operand to stay synchronized, then ignore
                let x = self.read_mod_reg_rm(mmu);
                let _ = self.rm8(mmu, op, x.rm, x.md);
                op.command = Op::Invalid(vec![b, x.u8()], Invalid::FPUOp);
            }
            0xE0 => {
                // loopne rel8
                op.command = Op::Loopne;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0xE1 => {
                // loope rel8
                op.command = Op::Loope;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0xE2 => {
                // loop rel8
                op.command = Op::Loop;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0xE3 => {
                // jcxz rel8
                op.command = Op::Jcxz;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0xE4 => {
                // in AL, imm8
                op.command = Op::In8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0xE5 => {
                // in AX, imm8
                op.command = Op::In16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0xE6 => {
                // out imm8, AL
                op.command = Op::Out8;
                op.params.dst = Parameter::Imm8(self.read_u8(mmu));
                op.params.src = Parameter::Reg8(R::AL);
            }
            0xE7 => {
                // out imm8, AX
                op.command = Op::Out16;
                op.params.dst = Parameter::Imm8(self.read_u8(mmu));
                op.params.src = Parameter::Reg16(R::AX);
            }
            0xE8 => {
                // call rel16
                op.command = Op::CallNear;
                op.params.dst = Parameter::Imm16(self.read_rel16(mmu));
            }
            0xE9 => {
                // jmp rel16
                op.command = Op::JmpNear;
                op.params.dst = Parameter::Imm16(self.read_rel16(mmu));
            }
            0xEA => {
                // jmp far seg:offs
                op.command = Op::JmpFar;
                let offs = self.read_u16(mmu);
                let seg = self.read_u16(mmu);
                op.params.dst = Parameter::Ptr16Imm(seg, offs);
            }
            0xEB => {
                // jmp short rel8
                op.command = Op::JmpShort;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0xEC => {
                // in AL, DX
                op.command = Op::In8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Reg16(R::DX);
            }
            0xED => {
                // in AX, DX
                op.command = Op::In16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Reg16(R::DX);
            }
            0xEE => {
                // out DX, AL
                op.command = Op::Out8;
                op.params.dst = Parameter::Reg16(R::DX);
                op.params.src = Parameter::Reg8(R::AL);
            }
            0xEF => {
                // out DX, AX
                op.command = Op::Out16;
                op.params.dst = Parameter::Reg16(R::DX);
                op.params.src = Parameter::Reg16(R::AX);
            }
            0xF0 => {
                // lock prefix
                op.lock = true;
                self.decode(mmu, op);
            }
            0xF2 => {
                // repne prefix
                op.repeat = RepeatMode::Repne;
                self.decode(mmu, op);
            }
            0xF3 => {
                // rep / repe prefix
                op.repeat = RepeatMode::Rep;
                self.decode(mmu, op);
            }
            0xF4 => op.command = Op::Hlt,
            0xF5 => op.command = Op::Cmc,
            0xF6 => {
                // <group3> r/m8
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm8(mmu, op, x.rm, x.md);
                match x.reg {
                    0 | 1 => {
                        // test r/m8, imm8
                        op.command = Op::Test8;
                        op.params.src = Parameter::Imm8(self.read_u8(mmu));
                    }
                    2 => op.command = Op::Not8,
                    3 => op.command = Op::Neg8,
                    4 => op.command = Op::Mul8,
                    5 => op.command = Op::Imul8,
                    6 => op.command = Op::Div8,
                    _ => op.command = Op::Idiv8,
                }
            }
            0xF7 => {
                // <group3> r/m16
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm16(mmu, op, x.rm, x.md);
                match x.reg {
                    0 | 1 => {
                        // test r/m16, imm16
                        op.command = Op::Test16;
                        op.params.src = Parameter::Imm16(self.read_u16(mmu));
                    }
                    2 => op.command = Op::Not16,
                    3 => op.command = Op::Neg16,
                    4 => op.command = Op::Mul16,
                    5 => op.command = Op::Imul16,
                    6 => op.command = Op::Div16,
                    _ => op.command = Op::Idiv16,
                }
            }
            0xF8 => op.command = Op::Clc,
            0xF9 => op.command = Op::Stc,
            0xFA => op.command = Op::Cli,
            0xFB => op.command = Op::Sti,
            0xFC => op.command = Op::Cld,
            0xFD => op.command = Op::Std,
            0xFE => {
                // <group4> r/m8
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm8(mmu, op, x.rm, x.md);
                op.command = match x.reg {
                    0 => Op::Inc8,
                    1 => Op::Dec8,
                    _ => Op::Invalid(vec![b, x.u8()], Invalid::Reg(x.reg)),
                };
            }
            0xFF => {
                // <group5> r/m16
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm16(mmu, op, x.rm, x.md);
                op.command = match x.reg {
                    0 => Op::Inc16,
                    1 => Op::Dec16,
                    2 => Op::CallNear,
                    3 => Op::CallFar,
                    4 => Op::JmpNear,
                    5 => Op::JmpFar,
                    6 => Op::Push16,
                    _ => Op::Invalid(vec![b, x.u8()], Invalid::Reg(x.reg)),
                };
            }
            _ => {
                // unhandled opcode, swallowed by the executor
                op.command = Op::Invalid(vec![b], Invalid::Op);
            }
        }
    }

    /// decodes the two-byte 0F xx opcode space
    fn decode_0f(&mut self, mmu: &MMU, op: &mut Instruction, b: u8) {
        let b2 = self.read_u8(mmu);
        match b2 {
            0x80..=0x8F => {
                // jcc rel16
                op.command = match b2 & 0xF {
                    0x0 => Op::Jo,
                    0x1 => Op::Jno,
                    0x2 => Op::Jc,
                    0x3 => Op::Jnc,
                    0x4 => Op::Jz,
                    0x5 => Op::Jnz,
                    0x6 => Op::Jna,
                    0x7 => Op::Ja,
                    0x8 => Op::Js,
                    0x9 => Op::Jns,
                    0xA => Op::Jpe,
                    0xB => Op::Jpo,
                    0xC => Op::Jl,
                    0xD => Op::Jnl,
                    0xE => Op::Jng,
                    _ => Op::Jg,
                };
                op.params.dst = Parameter::Imm16(self.read_rel16(mmu));
            }
            0xA0 => {
                // push fs
                op.command = Op::Push16;
                op.params.dst = Parameter::SReg16(R::FS);
            }
            0xA1 => {
                // pop fs
                op.command = Op::Pop16;
                op.params.dst = Parameter::SReg16(R::FS);
            }
            0xA8 => {
                // push gs
                op.command = Op::Push16;
                op.params.dst = Parameter::SReg16(R::GS);
            }
            0xA9 => {
                // pop gs
                op.command = Op::Pop16;
                op.params.dst = Parameter::SReg16(R::GS);
            }
            0xAF => {
                // imul r16, r/m16
                op.command = Op::Imul16;
                op.params = self.r16_rm16(mmu, op);
            }
            0xB6 => {
                // movzx r16, r/m8
                op.command = Op::Movzx16;
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = Parameter::Reg16(r16(x.reg));
                op.params.src = self.rm8(mmu, op, x.rm, x.md);
            }
            0xB7 => {
                // movzx r16, r/m16 (no-op extension at this width)
                op.command = Op::Mov16;
                op.params = self.r16_rm16(mmu, op);
            }
            0xBE => {
                // movsx r16, r/m8
                op.command = Op::Movsx16;
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = Parameter::Reg16(r16(x.reg));
                op.params.src = self.rm8(mmu, op, x.rm, x.md);
            }
            0xBF => {
                // movsx r16, r/m16 (no-op extension at this width)
                op.command = Op::Mov16;
                op.params = self.r16_rm16(mmu, op);
            }
            _ => op.command = Op::Invalid(vec![b, b2], Invalid::Op),
        }
    }

    /// decodes an r/m8 operand from a ModR/M byte
    fn rm8(&mut self, mmu: &MMU, op: &Instruction, rm: u8, md: u8) -> Parameter {
        let seg = op.segment_prefix;
        match md {
            0 => {
                if rm == 6 {
                    // [disp16]
                    Parameter::Ptr8(seg, self.read_u16(mmu))
                } else {
                    Parameter::Ptr8Amode(seg, amode(rm))
                }
            }
            1 => Parameter::Ptr8AmodeS8(seg, amode(rm), self.read_s8(mmu)),
            2 => Parameter::Ptr8AmodeS16(seg, amode(rm), self.read_s16(mmu)),
            _ => Parameter::Reg8(r8(rm)),
        }
    }

    /// decodes an r/m16 operand from a ModR/M byte
    fn rm16(&mut self, mmu: &MMU, op: &Instruction, rm: u8, md: u8) -> Parameter {
        let seg = op.segment_prefix;
        match md {
            0 => {
                if rm == 6 {
                    // [disp16]
                    Parameter::Ptr16(seg, self.read_u16(mmu))
                } else {
                    Parameter::Ptr16Amode(seg, amode(rm))
                }
            }
            1 => Parameter::Ptr16AmodeS8(seg, amode(rm), self.read_s8(mmu)),
            2 => Parameter::Ptr16AmodeS16(seg, amode(rm), self.read_s16(mmu)),
            _ => Parameter::Reg16(r16(rm)),
        }
    }

    /// (r/m8, r8)
    fn rm8_r8(&mut self, mmu: &MMU, op: &Instruction) -> ParameterSet {
        let x = self.read_mod_reg_rm(mmu);
        ParameterSet {
            dst: self.rm8(mmu, op, x.rm, x.md),
            src: Parameter::Reg8(r8(x.reg)),
            src2: Parameter::None,
        }
    }

    /// (r8, r/m8)
    fn r8_rm8(&mut self, mmu: &MMU, op: &Instruction) -> ParameterSet {
        let x = self.read_mod_reg_rm(mmu);
        ParameterSet {
            dst: Parameter::Reg8(r8(x.reg)),
            src: self.rm8(mmu, op, x.rm, x.md),
            src2: Parameter::None,
        }
    }

    /// (r/m16, r16)
    fn rm16_r16(&mut self, mmu: &MMU, op: &Instruction) -> ParameterSet {
        let x = self.read_mod_reg_rm(mmu);
        ParameterSet {
            dst: self.rm16(mmu, op, x.rm, x.md),
            src: Parameter::Reg16(r16(x.reg)),
            src2: Parameter::None,
        }
    }

    /// (r16, r/m16)
    fn r16_rm16(&mut self, mmu: &MMU, op: &Instruction) -> ParameterSet {
        let x = self.read_mod_reg_rm(mmu);
        ParameterSet {
            dst: Parameter::Reg16(r16(x.reg)),
            src: self.rm16(mmu, op, x.rm, x.md),
            src2: Parameter::None,
        }
    }

    fn read_mod_reg_rm(&mut self, mmu: &MMU) -> ModRegRm {
        let b = self.read_u8(mmu);
        ModRegRm {
            md: b >> 6,
            reg: (b >> 3) & 7,
            rm: b & 7,
        }
    }

    /// reads an 8-bit displacement and returns the absolute jump target
    fn read_rel8(&mut self, mmu: &MMU) -> u16 {
        let val = self.read_s8(mmu);
        self.current_offset.wrapping_add(val as u16)
    }

    /// reads a 16-bit displacement and returns the absolute jump target
    fn read_rel16(&mut self, mmu: &MMU) -> u16 {
        let val = self.read_s16(mmu);
        self.current_offset.wrapping_add(val as u16)
    }

    fn read_u8(&mut self, mmu: &MMU) -> u8 {
        let b = mmu.read_u8(self.current_seg, self.current_offset);
        self.current_offset = self.current_offset.wrapping_add(1);
        b
    }

    fn read_s8(&mut self, mmu: &MMU) -> i8 {
        self.read_u8(mmu) as i8
    }

    fn read_u16(&mut self, mmu: &MMU) -> u16 {
        let lo = self.read_u8(mmu);
        let hi = self.read_u8(mmu);
        u16::from(lo) | (u16::from(hi) << 8)
    }

    fn read_s16(&mut self, mmu: &MMU) -> i16 {
        self.read_u16(mmu) as i16
    }
}

/// the shift/rotate sub-opcode table, 8-bit forms
fn shift_op8(reg: u8) -> Op {
    match reg & 7 {
        0 => Op::Rol8,
        1 => Op::Ror8,
        2 => Op::Rcl8,
        3 => Op::Rcr8,
        4 | 6 => Op::Shl8, // 6 is the undocumented sal alias
        5 => Op::Shr8,
        _ => Op::Sar8,
    }
}

/// the shift/rotate sub-opcode table, 16-bit forms
fn shift_op16(reg: u8) -> Op {
    match reg & 7 {
        0 => Op::Rol16,
        1 => Op::Ror16,
        2 => Op::Rcl16,
        3 => Op::Rcr16,
        4 | 6 => Op::Shl16,
        5 => Op::Shr16,
        _ => Op::Sar16,
    }
}
