use pretty_assertions::assert_eq;

use crate::cpu::decoder::Decoder;
use crate::cpu::instruction::RepeatMode;
use crate::cpu::op::{Invalid, Op};
use crate::cpu::parameter::Parameter;
use crate::cpu::register::{AMode, R};
use crate::cpu::segment::Segment;
use crate::memory::MMU;

fn decode(bytes: &[u8]) -> (crate::cpu::instruction::Instruction, MMU) {
    let mut mmu = MMU::default();
    mmu.write(0x0100, 0x0000, bytes);
    let mut decoder = Decoder::default();
    let op = decoder.get_instruction(&mmu, 0x0100, 0x0000);
    (op, mmu)
}

#[test]
fn decodes_mov_r16_imm16() {
    let (op, _) = decode(&[0xB8, 0x34, 0x12]);
    assert_eq!(Op::Mov16, op.command);
    assert_eq!(Parameter::Reg16(R::AX), op.params.dst);
    assert_eq!(Parameter::Imm16(0x1234), op.params.src);
    assert_eq!(3, op.length);
}

#[test]
fn decodes_modrm_register_form() {
    // add bl, ah (md=3)
    let (op, _) = decode(&[0x00, 0xE3]);
    assert_eq!(Op::Add8, op.command);
    assert_eq!(Parameter::Reg8(R::BL), op.params.dst);
    assert_eq!(Parameter::Reg8(R::AH), op.params.src);
    assert_eq!(2, op.length);
}

#[test]
fn decodes_modrm_memory_forms() {
    // mov [bx+si], al
    let (op, _) = decode(&[0x88, 0x00]);
    assert_eq!(Parameter::Ptr8Amode(Segment::Default, AMode::BXSI), op.params.dst);

    // mov ax, [bp+0x10] (mod=1 signed disp8)
    let (op, _) = decode(&[0x8B, 0x46, 0x10]);
    assert_eq!(Parameter::Ptr16AmodeS8(Segment::Default, AMode::BP, 0x10), op.params.src);
    assert_eq!(3, op.length);

    // mov ax, [0x1234] (mod=0 rm=6 direct)
    let (op, _) = decode(&[0x8B, 0x06, 0x34, 0x12]);
    assert_eq!(Parameter::Ptr16(Segment::Default, 0x1234), op.params.src);
    assert_eq!(4, op.length);

    // mov cl, [di-0x1000] (mod=2 disp16)
    let (op, _) = decode(&[0x8A, 0x8D, 0x00, 0xF0]);
    assert_eq!(
        Parameter::Ptr8AmodeS16(Segment::Default, AMode::DI, -0x1000),
        op.params.src
    );
}

#[test]
fn segment_prefix_attaches_to_memory_operand() {
    // es: mov al,[di]
    let (op, _) = decode(&[0x26, 0x8A, 0x05]);
    assert_eq!(Op::Mov8, op.command);
    assert_eq!(Segment::ES, op.segment_prefix);
    assert_eq!(Parameter::Ptr8Amode(Segment::ES, AMode::DI), op.params.src);
    assert_eq!(3, op.length);
}

#[test]
fn repeat_prefix_sets_mode() {
    let (op, _) = decode(&[0xF3, 0xAA]);
    assert_eq!(Op::Stosb, op.command);
    assert_eq!(RepeatMode::Rep, op.repeat);
    assert_eq!(2, op.length);

    let (op, _) = decode(&[0xF2, 0xAE]);
    assert_eq!(Op::Scasb, op.command);
    assert_eq!(RepeatMode::Repne, op.repeat);
}

#[test]
fn immediate_group_selects_by_reg_field() {
    // cmp byte [bx], 0x5 (reg=7)
    let (op, _) = decode(&[0x80, 0x3F, 0x05]);
    assert_eq!(Op::Cmp8, op.command);
    assert_eq!(Parameter::Ptr8Amode(Segment::Default, AMode::BX), op.params.dst);
    assert_eq!(Parameter::Imm8(0x05), op.params.src);

    // sub ax, byte -1 (0x83 sign-extended)
    let (op, _) = decode(&[0x83, 0xE8, 0xFF]);
    assert_eq!(Op::Sub16, op.command);
    assert_eq!(Parameter::ImmS8(-1), op.params.src);
}

#[test]
fn shift_group_selects_by_reg_field() {
    let (op, _) = decode(&[0xD0, 0xE0]); // shl al,1
    assert_eq!(Op::Shl8, op.command);
    assert_eq!(Parameter::Imm8(1), op.params.src);

    let (op, _) = decode(&[0xD3, 0xF8]); // sar ax,cl
    assert_eq!(Op::Sar16, op.command);
    assert_eq!(Parameter::Reg8(R::CL), op.params.src);

    let (op, _) = decode(&[0xC1, 0xC0, 0x04]); // rol ax,4
    assert_eq!(Op::Rol16, op.command);
    assert_eq!(Parameter::Imm8(4), op.params.src);
}

#[test]
fn group3_selects_by_reg_field() {
    let (op, _) = decode(&[0xF7, 0xE3]); // mul bx
    assert_eq!(Op::Mul16, op.command);
    let (op, _) = decode(&[0xF6, 0xF3]); // div bl
    assert_eq!(Op::Div8, op.command);
    let (op, _) = decode(&[0xF7, 0xD8]); // neg ax
    assert_eq!(Op::Neg16, op.command);
    let (op, _) = decode(&[0xF6, 0xC0, 0x80]); // test al,0x80
    assert_eq!(Op::Test8, op.command);
    assert_eq!(Parameter::Imm8(0x80), op.params.src);
}

#[test]
fn relative_jumps_store_absolute_targets() {
    // jz +6 decoded at 0x0000: target = 2 + 6
    let (op, _) = decode(&[0x74, 0x06]);
    assert_eq!(Op::Jz, op.command);
    assert_eq!(Parameter::Imm16(0x0008), op.params.dst);

    // jmp short -2: an endless loop onto itself
    let (op, _) = decode(&[0xEB, 0xFE]);
    assert_eq!(Op::JmpShort, op.command);
    assert_eq!(Parameter::Imm16(0x0000), op.params.dst);

    // call rel16
    let (op, _) = decode(&[0xE8, 0x10, 0x00]);
    assert_eq!(Op::CallNear, op.command);
    assert_eq!(Parameter::Imm16(0x0013), op.params.dst);
}

#[test]
fn decodes_far_jump_immediate() {
    let (op, _) = decode(&[0xEA, 0x00, 0x7C, 0x00, 0x00]);
    assert_eq!(Op::JmpFar, op.command);
    assert_eq!(Parameter::Ptr16Imm(0x0000, 0x7C00), op.params.dst);
    assert_eq!(5, op.length);
}

#[test]
fn decodes_two_byte_opcodes() {
    // jnz rel16
    let (op, _) = decode(&[0x0F, 0x85, 0x00, 0x01]);
    assert_eq!(Op::Jnz, op.command);
    assert_eq!(Parameter::Imm16(0x0104), op.params.dst);

    // movzx ax, bl
    let (op, _) = decode(&[0x0F, 0xB6, 0xC3]);
    assert_eq!(Op::Movzx16, op.command);
    assert_eq!(Parameter::Reg16(R::AX), op.params.dst);
    assert_eq!(Parameter::Reg8(R::BL), op.params.src);
}

#[test]
fn fpu_escape_consumes_modrm_and_displacement() {
    // fadd dword [0x1234]: opcode + modrm + disp16
    let (op, _) = decode(&[0xD8, 0x06, 0x34, 0x12]);
    match op.command {
        Op::Invalid(_, Invalid::FPUOp) => {}
        other => panic!("expected fpu invalid, got {:?}", other),
    }
    assert_eq!(4, op.length);
}

#[test]
fn unknown_opcode_consumes_one_byte() {
    let (op, _) = decode(&[0xF1]);
    assert_eq!(Op::Invalid(vec![0xF1], Invalid::Op), op.command);
    assert_eq!(1, op.length);
}

#[test]
fn int_imm8_is_two_bytes() {
    let (op, _) = decode(&[0xCD, 0x21]);
    assert_eq!(Op::Int, op.command);
    assert_eq!(Parameter::Imm8(0x21), op.params.dst);
    assert_eq!(2, op.length);
}

#[test]
fn decodes_group5_indirect_call() {
    // call word [bx]
    let (op, _) = decode(&[0xFF, 0x17]);
    assert_eq!(Op::CallNear, op.command);
    assert_eq!(Parameter::Ptr16Amode(Segment::Default, AMode::BX), op.params.dst);

    // call far [bx]
    let (op, _) = decode(&[0xFF, 0x1F]);
    assert_eq!(Op::CallFar, op.command);

    let (op, _) = decode(&[0xFF, 0xD0]); // call ax
    assert_eq!(Op::CallNear, op.command);
    assert_eq!(Parameter::Reg16(R::AX), op.params.dst);
}

#[test]
fn decode_to_block_advances_by_instruction_length() {
    let mut mmu = MMU::default();
    mmu.write(0x0100, 0x0000, &[0xB8, 0x01, 0x00, 0x40, 0xC3]);
    let mut decoder = Decoder::default();
    let ops = decoder.decode_to_block(&mmu, 0x0100, 0x0000, 3);
    assert_eq!(3, ops.len());
    assert_eq!(Op::Mov16, ops[0].instruction.command);
    assert_eq!(0x0003, ops[1].offset);
    assert_eq!(Op::Inc16, ops[1].instruction.command);
    assert_eq!(Op::Retn, ops[2].instruction.command);
}
