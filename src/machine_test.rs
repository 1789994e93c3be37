use pretty_assertions::assert_eq;

use crate::cpu::{HaltReason, R};
use crate::gpu::TEXT_SEG;
use crate::machine::Machine;

fn loaded(code: &[u8]) -> Machine {
    let mut machine = Machine::deterministic();
    machine.load_executable(code, "TEST.COM", "");
    machine
}

#[test]
fn can_execute_push_pop() {
    let code: Vec<u8> = vec![
        0xB8, 0x88, 0x88, // mov ax,0x8888
        0x8E, 0xD8,       // mov ds,ax
        0x1E,             // push ds
        0x07,             // pop es
    ];
    let mut machine = loaded(&code);

    let stack_offset = machine.cpu.get_r16(R::SP);
    machine.execute_instructions(2);
    assert_eq!(stack_offset, machine.cpu.get_r16(R::SP));
    machine.execute_instruction(); // push
    assert_eq!(stack_offset - 2, machine.cpu.get_r16(R::SP));
    machine.execute_instruction(); // pop
    assert_eq!(stack_offset, machine.cpu.get_r16(R::SP));

    assert_eq!(0x8888, machine.cpu.get_r16(R::AX));
    assert_eq!(0x8888, machine.cpu.get_r16(R::DS));
    assert_eq!(0x8888, machine.cpu.get_r16(R::ES));
}

#[test]
fn can_execute_add8() {
    let code: Vec<u8> = vec![
        0xB4, 0xFF,       // mov ah,0xff
        0x80, 0xC4, 0x01, // add ah,0x1
        0xB4, 0x01,       // mov ah,0x1
        0x80, 0xC4, 0xFF, // add ah,0xff
        0xB4, 0xFF,       // mov ah,0xff
        0x80, 0xC4, 0xFF, // add ah,0xff
    ];
    let mut machine = loaded(&code);

    machine.execute_instructions(2);
    assert_eq!(0x00, machine.cpu.get_r8(R::AH));
    assert_eq!(true, machine.cpu.regs.flags.carry);
    assert_eq!(true, machine.cpu.regs.flags.parity);
    assert_eq!(true, machine.cpu.regs.flags.adjust);
    assert_eq!(true, machine.cpu.regs.flags.zero);
    assert_eq!(false, machine.cpu.regs.flags.sign);
    assert_eq!(false, machine.cpu.regs.flags.overflow);

    machine.execute_instructions(2);
    assert_eq!(0x00, machine.cpu.get_r8(R::AH));
    assert_eq!(true, machine.cpu.regs.flags.carry);
    assert_eq!(true, machine.cpu.regs.flags.zero);

    machine.execute_instructions(2);
    assert_eq!(0xFE, machine.cpu.get_r8(R::AH));
    assert_eq!(true, machine.cpu.regs.flags.carry);
    assert_eq!(false, machine.cpu.regs.flags.parity);
    assert_eq!(true, machine.cpu.regs.flags.adjust);
    assert_eq!(false, machine.cpu.regs.flags.zero);
    assert_eq!(true, machine.cpu.regs.flags.sign);
    assert_eq!(false, machine.cpu.regs.flags.overflow);
}

#[test]
fn inc_and_dec_preserve_carry() {
    let code: Vec<u8> = vec![
        0xF9, // stc
        0x40, // inc ax
        0x48, // dec ax
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(3);
    assert_eq!(true, machine.cpu.regs.flags.carry);
    assert_eq!(0x0000, machine.cpu.get_r16(R::AX));
    assert_eq!(true, machine.cpu.regs.flags.zero);
}

#[test]
fn can_execute_sub_and_cmp_flags() {
    let code: Vec<u8> = vec![
        0xB8, 0x00, 0x00, // mov ax,0x0
        0x2D, 0x01, 0x00, // sub ax,0x1
        0x3D, 0xFF, 0xFF, // cmp ax,0xffff
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(2);
    assert_eq!(0xFFFF, machine.cpu.get_r16(R::AX));
    assert_eq!(true, machine.cpu.regs.flags.carry);
    assert_eq!(true, machine.cpu.regs.flags.sign);
    machine.execute_instruction();
    assert_eq!(true, machine.cpu.regs.flags.zero);
    assert_eq!(false, machine.cpu.regs.flags.carry);
    // cmp does not modify the destination
    assert_eq!(0xFFFF, machine.cpu.get_r16(R::AX));
}

#[test]
fn can_execute_mul16_wide_result() {
    // scenario: 0x8000 * 2 = 0x10000, spills into DX
    let code: Vec<u8> = vec![
        0xB8, 0x00, 0x80, // mov ax,0x8000
        0xBB, 0x02, 0x00, // mov bx,0x2
        0xF7, 0xE3,       // mul bx
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(3);
    assert_eq!(0x0001, machine.cpu.get_r16(R::DX));
    assert_eq!(0x0000, machine.cpu.get_r16(R::AX));
    assert_eq!(true, machine.cpu.regs.flags.carry);
    assert_eq!(true, machine.cpu.regs.flags.overflow);
}

#[test]
fn mul8_narrow_result_clears_carry() {
    let code: Vec<u8> = vec![
        0xB0, 0x10, // mov al,0x10
        0xB3, 0x02, // mov bl,0x2
        0xF6, 0xE3, // mul bl
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(3);
    assert_eq!(0x0020, machine.cpu.get_r16(R::AX));
    assert_eq!(false, machine.cpu.regs.flags.carry);
    assert_eq!(false, machine.cpu.regs.flags.overflow);
}

#[test]
fn divide_by_zero_enters_the_vector_handler() {
    // scenario: DIV raises interrupt 0, execution continues in the
    // handler the vector table names
    let code: Vec<u8> = vec![
        0xB8, 0x05, 0x00, // mov ax,0x5
        0xB3, 0x00,       // mov bl,0x0
        0xF6, 0xF3,       // div bl
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(3);
    assert_eq!(false, machine.cpu.halted);
    assert_eq!(0xF000, machine.cpu.get_r16(R::CS));
    assert_eq!(0x0000, machine.cpu.regs.ip);
}

#[test]
fn idiv16_truncates_toward_zero() {
    let code: Vec<u8> = vec![
        0xB8, 0xF9, 0xFF, // mov ax,-7
        0x99,             // cwd
        0xBB, 0x02, 0x00, // mov bx,2
        0xF7, 0xFB,       // idiv bx
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(4);
    assert_eq!(-3i16 as u16, machine.cpu.get_r16(R::AX));
    assert_eq!(-1i16 as u16, machine.cpu.get_r16(R::DX));
}

#[test]
fn shl_count_one_sets_overflow_from_carry_xor_top() {
    let code: Vec<u8> = vec![
        0xB0, 0x40, // mov al,0x40
        0xD0, 0xE0, // shl al,1
        0xB0, 0xC0, // mov al,0xc0
        0xD0, 0xE0, // shl al,1
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(2);
    // 0x40 << 1 = 0x80: CF=0, top=1 -> OF=1
    assert_eq!(0x80, machine.cpu.get_r8(R::AL));
    assert_eq!(false, machine.cpu.regs.flags.carry);
    assert_eq!(true, machine.cpu.regs.flags.overflow);
    machine.execute_instructions(2);
    // 0xC0 << 1 = 0x80 carry out: CF=1, top=1 -> OF=0
    assert_eq!(0x80, machine.cpu.get_r8(R::AL));
    assert_eq!(true, machine.cpu.regs.flags.carry);
    assert_eq!(false, machine.cpu.regs.flags.overflow);
}

#[test]
fn shr_count_one_overflow_is_original_top_bit() {
    let code: Vec<u8> = vec![
        0xB0, 0x81, // mov al,0x81
        0xD0, 0xE8, // shr al,1
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(2);
    assert_eq!(0x40, machine.cpu.get_r8(R::AL));
    assert_eq!(true, machine.cpu.regs.flags.carry);
    assert_eq!(true, machine.cpu.regs.flags.overflow);
}

#[test]
fn sar_shifts_in_sign_bits() {
    let code: Vec<u8> = vec![
        0xB0, 0x82,       // mov al,0x82
        0xC0, 0xF8, 0x02, // sar al,2
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(2);
    assert_eq!(0xE0, machine.cpu.get_r8(R::AL));
    assert_eq!(true, machine.cpu.regs.flags.carry);
    assert_eq!(true, machine.cpu.regs.flags.sign);
}

#[test]
fn rotate_through_carry() {
    let code: Vec<u8> = vec![
        0xF9,       // stc
        0xB0, 0x01, // mov al,0x01
        0xD0, 0xD0, // rcl al,1
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(3);
    // carry rotates into bit 0: 0x01 -> 0x03, CF out = 0
    assert_eq!(0x03, machine.cpu.get_r8(R::AL));
    assert_eq!(false, machine.cpu.regs.flags.carry);
}

#[test]
fn shift_count_is_masked_to_five_bits() {
    let code: Vec<u8> = vec![
        0xB0, 0x01,       // mov al,0x01
        0xB1, 0x20,       // mov cl,0x20
        0xD2, 0xE0,       // shl al,cl
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(3);
    // a masked count of zero leaves the operand alone
    assert_eq!(0x01, machine.cpu.get_r8(R::AL));
}

#[test]
fn can_execute_rep_stosb_fill() {
    // scenario: DI=0x0200, CX=4, AL=0xFF, DF=0, rep stosb
    let code: Vec<u8> = vec![
        0xBF, 0x00, 0x02, // mov di,0x200
        0xB9, 0x04, 0x00, // mov cx,0x4
        0xB0, 0xFF,       // mov al,0xff
        0xFC,             // cld
        0xF3, 0xAA,       // rep stosb
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(5);
    let es = machine.cpu.get_r16(R::ES);
    for offset in 0x200..0x204 {
        assert_eq!(0xFF, machine.mmu.read_u8(es, offset));
    }
    assert_eq!(0x00, machine.mmu.read_u8(es, 0x204));
    assert_eq!(0, machine.cpu.get_r16(R::CX));
    assert_eq!(0x204, machine.cpu.get_r16(R::DI));
}

#[test]
fn rep_movsb_with_zero_count_is_a_noop() {
    let code: Vec<u8> = vec![
        0xBE, 0x00, 0x03, // mov si,0x300
        0xBF, 0x00, 0x04, // mov di,0x400
        0xB9, 0x00, 0x00, // mov cx,0x0
        0xF3, 0xA4,       // rep movsb
    ];
    let mut machine = loaded(&code);
    let ds = machine.cpu.get_r16(R::DS);
    machine.mmu.write_u8(ds, 0x300, 0x55);
    machine.execute_instructions(4);
    assert_eq!(0x300, machine.cpu.get_r16(R::SI));
    assert_eq!(0x400, machine.cpu.get_r16(R::DI));
    assert_eq!(0x00, machine.mmu.read_u8(ds, 0x400));
}

#[test]
fn rep_movsw_moves_by_initial_cx_times_stride() {
    let code: Vec<u8> = vec![
        0xBE, 0x00, 0x03, // mov si,0x300
        0xBF, 0x00, 0x04, // mov di,0x400
        0xB9, 0x03, 0x00, // mov cx,0x3
        0xFC,             // cld
        0xF3, 0xA5,       // rep movsw
    ];
    let mut machine = loaded(&code);
    let ds = machine.cpu.get_r16(R::DS);
    for i in 0..6 {
        machine.mmu.write_u8(ds, 0x300 + i, 0x10 + i as u8);
    }
    machine.execute_instructions(5);
    assert_eq!(0, machine.cpu.get_r16(R::CX));
    assert_eq!(0x306, machine.cpu.get_r16(R::SI));
    assert_eq!(0x406, machine.cpu.get_r16(R::DI));
    for i in 0..6 {
        assert_eq!(0x10 + i as u8, machine.mmu.read_u8(ds, 0x400 + i));
    }
}

#[test]
fn repne_scasb_stops_on_match() {
    let code: Vec<u8> = vec![
        0xBF, 0x00, 0x03, // mov di,0x300
        0xB9, 0x10, 0x00, // mov cx,0x10
        0xB0, 0x58,       // mov al,'X'
        0xFC,             // cld
        0xF2, 0xAE,       // repne scasb
    ];
    let mut machine = loaded(&code);
    let es = machine.cpu.get_r16(R::ES);
    machine.mmu.write(es, 0x300, b"ABCXDEF");
    machine.execute_instructions(5);
    // stopped after the 'X' at offset 3
    assert_eq!(0x304, machine.cpu.get_r16(R::DI));
    assert_eq!(0x10 - 4, machine.cpu.get_r16(R::CX));
    assert_eq!(true, machine.cpu.regs.flags.zero);
}

#[test]
fn std_reverses_string_direction() {
    let code: Vec<u8> = vec![
        0xBF, 0x10, 0x02, // mov di,0x210
        0xB9, 0x02, 0x00, // mov cx,0x2
        0xB0, 0xEE,       // mov al,0xee
        0xFD,             // std
        0xF3, 0xAA,       // rep stosb
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(5);
    let es = machine.cpu.get_r16(R::ES);
    assert_eq!(0xEE, machine.mmu.read_u8(es, 0x210));
    assert_eq!(0xEE, machine.mmu.read_u8(es, 0x20F));
    assert_eq!(0x20E, machine.cpu.get_r16(R::DI));
}

#[test]
fn segment_override_reads_through_es() {
    let code: Vec<u8> = vec![
        0xB8, 0x00, 0x40, // mov ax,0x4000
        0x8E, 0xC0,       // mov es,ax
        0xBF, 0x00, 0x05, // mov di,0x500
        0x26, 0x8A, 0x05, // mov al,[es:di]
    ];
    let mut machine = loaded(&code);
    machine.mmu.write_u8(0x4000, 0x500, 0x7A);
    machine.execute_instructions(4);
    assert_eq!(0x7A, machine.cpu.get_r8(R::AL));
}

#[test]
fn bp_addressing_defaults_to_stack_segment() {
    let code: Vec<u8> = vec![
        0xB8, 0x00, 0x50,       // mov ax,0x5000
        0x8E, 0xD0,             // mov ss,ax
        0xBD, 0x00, 0x06,       // mov bp,0x600
        0xC6, 0x46, 0x02, 0x99, // mov byte [bp+0x2],0x99
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(4);
    assert_eq!(0x99, machine.mmu.read_u8(0x5000, 0x602));
    let ds = machine.cpu.get_r16(R::DS);
    assert_eq!(0x00, machine.mmu.read_u8(ds, 0x602));
}

#[test]
fn can_execute_pusha_popa() {
    let code: Vec<u8> = vec![
        0xB8, 0x11, 0x11, // mov ax,0x1111
        0xBB, 0x22, 0x22, // mov bx,0x2222
        0x60,             // pusha
        0xB8, 0x00, 0x00, // mov ax,0x0
        0xBB, 0x00, 0x00, // mov bx,0x0
        0x61,             // popa
    ];
    let mut machine = loaded(&code);
    let sp0 = machine.cpu.get_r16(R::SP);
    machine.execute_instructions(6);
    assert_eq!(0x1111, machine.cpu.get_r16(R::AX));
    assert_eq!(0x2222, machine.cpu.get_r16(R::BX));
    assert_eq!(sp0, machine.cpu.get_r16(R::SP));
}

#[test]
fn can_execute_enter_leave() {
    let code: Vec<u8> = vec![
        0xC8, 0x10, 0x00, 0x00, // enter 0x10,0
        0xC9,                   // leave
    ];
    let mut machine = loaded(&code);
    let sp0 = machine.cpu.get_r16(R::SP);
    let bp0 = machine.cpu.get_r16(R::BP);
    machine.execute_instruction();
    assert_eq!(sp0 - 2 - 0x10, machine.cpu.get_r16(R::SP));
    assert_eq!(sp0 - 2, machine.cpu.get_r16(R::BP));
    machine.execute_instruction();
    assert_eq!(sp0, machine.cpu.get_r16(R::SP));
    assert_eq!(bp0, machine.cpu.get_r16(R::BP));
}

#[test]
fn can_execute_movzx_movsx() {
    let code: Vec<u8> = vec![
        0xB3, 0x80,       // mov bl,0x80
        0x0F, 0xB6, 0xC3, // movzx ax,bl
        0x0F, 0xBE, 0xCB, // movsx cx,bl
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(3);
    assert_eq!(0x0080, machine.cpu.get_r16(R::AX));
    assert_eq!(0xFF80, machine.cpu.get_r16(R::CX));
}

#[test]
fn can_execute_xlat() {
    let code: Vec<u8> = vec![
        0xBB, 0x00, 0x07, // mov bx,0x700
        0xB0, 0x03,       // mov al,0x3
        0xD7,             // xlat
    ];
    let mut machine = loaded(&code);
    let ds = machine.cpu.get_r16(R::DS);
    machine.mmu.write(ds, 0x700, &[0, 1, 2, 0xAB]);
    machine.execute_instructions(3);
    assert_eq!(0xAB, machine.cpu.get_r8(R::AL));
}

#[test]
fn can_execute_les_lds() {
    let code: Vec<u8> = vec![
        0xBF, 0x00, 0x07, // mov di,0x700
        0xC4, 0x1D,       // les bx,[di]
    ];
    let mut machine = loaded(&code);
    let ds = machine.cpu.get_r16(R::DS);
    machine.mmu.write_u16(ds, 0x700, 0x1234);
    machine.mmu.write_u16(ds, 0x702, 0x5678);
    machine.execute_instructions(2);
    assert_eq!(0x1234, machine.cpu.get_r16(R::BX));
    assert_eq!(0x5678, machine.cpu.get_r16(R::ES));
}

#[test]
fn loop_counts_down_cx() {
    let code: Vec<u8> = vec![
        0xB9, 0x03, 0x00, // mov cx,0x3
        0x40,             // inc ax
        0xE2, 0xFD,       // loop -3
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(7);
    assert_eq!(0x0003, machine.cpu.get_r16(R::AX));
    assert_eq!(0x0000, machine.cpu.get_r16(R::CX));
}

#[test]
fn call_and_ret_roundtrip() {
    let code: Vec<u8> = vec![
        0xE8, 0x04, 0x00, // call +4 (0x107)
        0xB3, 0x01,       // mov bl,0x1
        0x90,             // nop (not reached before ret)
        0x90,             // nop
        0xB0, 0x42,       // 0x107: mov al,0x42
        0xC3,             // ret
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(4);
    assert_eq!(0x42, machine.cpu.get_r8(R::AL));
    assert_eq!(0x01, machine.cpu.get_r8(R::BL));
}

#[test]
fn iret_restores_pushed_state() {
    // pushf / push cs / push imm-ip / iret returns to the pushed location
    // with the pushed flags, reserved bits normalised
    let code: Vec<u8> = vec![
        0xF9,             // stc
        0x9C,             // pushf
        0x0E,             // push cs
        0x68, 0x0A, 0x01, // push 0x10A
        0xF8,             // clc
        0xCF,             // iret
        0x90, 0x90,       // padding
        0xB0, 0x77,       // 0x10A: mov al,0x77
    ];
    let mut machine = loaded(&code);
    let cs0 = machine.cpu.get_r16(R::CS);
    machine.execute_instructions(6);
    assert_eq!(0x010A, machine.cpu.regs.ip);
    assert_eq!(cs0, machine.cpu.get_r16(R::CS));
    // the pushed carry came back despite the clc
    assert_eq!(true, machine.cpu.regs.flags.carry);
    machine.execute_instruction();
    assert_eq!(0x77, machine.cpu.get_r8(R::AL));
}

#[test]
fn unknown_opcode_is_skipped() {
    let code: Vec<u8> = vec![
        0xF1,       // unassigned opcode
        0xB0, 0x05, // mov al,0x5
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(2);
    assert_eq!(false, machine.cpu.fatal_error);
    assert_eq!(0x05, machine.cpu.get_r8(R::AL));
}

#[test]
fn fpu_escape_consumes_operand_bytes() {
    let code: Vec<u8> = vec![
        0xD8, 0x06, 0x34, 0x12, // fadd [0x1234] - decoded, ignored
        0xB0, 0x09,             // mov al,0x9
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(2);
    assert_eq!(0x09, machine.cpu.get_r8(R::AL));
    assert_eq!(false, machine.cpu.fatal_error);
}

// --- end to end scenarios -------------------------------------------------

#[test]
fn teletype_hello_scenario() {
    // lodsb loop printing a NUL-terminated string through int 10h AH=0E,
    // then int 21h AH=4C to exit
    let code: Vec<u8> = vec![
        0xBE, 0x12, 0x01, // mov si,0x112
        0xAC,             // lodsb
        0x08, 0xC0,       // or al,al
        0x74, 0x06,       // jz +6 (exit)
        0xB4, 0x0E,       // mov ah,0x0e
        0xCD, 0x10,       // int 0x10
        0xEB, 0xF5,       // jmp short back to lodsb
        0xB4, 0x4C,       // mov ah,0x4c
        0xCD, 0x21,       // int 0x21
        0x48, 0x65, 0x6C, 0x6C, 0x6F, 0x21, 0x00, // "Hello!",0
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(1000);

    assert_eq!(true, machine.cpu.halted);
    assert_eq!(HaltReason::ProgramExit, machine.cpu.halt_reason);
    for (i, ch) in b"Hello!".iter().enumerate() {
        assert_eq!(*ch, machine.mmu.read_u8(TEXT_SEG, (i * 2) as u16));
        assert_eq!(0x07, machine.mmu.read_u8(TEXT_SEG, (i * 2 + 1) as u16));
    }
    assert!(machine.render_text()[0].starts_with("Hello!"));
}

#[test]
fn int20_terminates_and_rebalances_the_stack() {
    let code: Vec<u8> = vec![0xCD, 0x20]; // int 0x20
    let mut machine = loaded(&code);
    let sp0 = machine.cpu.get_r16(R::SP);
    machine.execute_instruction();
    assert_eq!(true, machine.cpu.halted);
    assert_eq!(HaltReason::ProgramExit, machine.cpu.halt_reason);
    assert_eq!(sp0, machine.cpu.get_r16(R::SP));
}

#[test]
fn blocking_key_read_suspends_and_resumes() {
    let code: Vec<u8> = vec![
        0xB4, 0x00, // mov ah,0x0
        0xCD, 0x16, // int 0x16
    ];
    let mut machine = loaded(&code);
    let sp0 = machine.cpu.get_r16(R::SP);
    machine.execute_instructions(2);

    assert_eq!(true, machine.cpu.halted);
    assert_eq!(HaltReason::KeyWait, machine.cpu.halt_reason);
    // IP was rewound onto the int 16h so the read retries on resume
    assert_eq!(0x0102, machine.cpu.regs.ip);
    let cs = machine.cpu.get_r16(R::CS);
    assert_eq!(0xCD, machine.mmu.read_u8(cs, 0x0102));
    assert_eq!(0x16, machine.mmu.read_u8(cs, 0x0103));
    assert_eq!(sp0, machine.cpu.get_r16(R::SP));

    machine.push_ascii(b'a');
    assert_eq!(false, machine.cpu.halted);
    machine.execute_instruction();
    assert_eq!(0x1E61, machine.cpu.get_r16(R::AX));
}

#[test]
fn nonblocking_peek_reports_via_zero_flag() {
    let code: Vec<u8> = vec![
        0xB4, 0x01, // mov ah,0x1
        0xCD, 0x16, // int 0x16
        0xB4, 0x01, // mov ah,0x1
        0xCD, 0x16, // int 0x16
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(2);
    assert_eq!(true, machine.cpu.regs.flags.zero);

    machine.push_ascii(b'z');
    machine.execute_instructions(2);
    assert_eq!(false, machine.cpu.regs.flags.zero);
    assert_eq!(0x2C7A, machine.cpu.get_r16(R::AX));
}

#[test]
fn dos_print_string_writes_to_the_framebuffer() {
    let code: Vec<u8> = vec![
        0xBA, 0x0C, 0x01, // mov dx,0x10c
        0xB4, 0x09,       // mov ah,0x9
        0xCD, 0x21,       // int 0x21
        0xB4, 0x4C,       // mov ah,0x4c
        0xCD, 0x21,       // int 0x21
        0x90,             // nop
        0x4F, 0x4B, 0x24, // "OK$"
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(10);
    assert_eq!(true, machine.cpu.halted);
    assert!(machine.render_text()[0].starts_with("OK"));
}

#[test]
fn dos_file_roundtrip_through_int21() {
    // create A.TXT, write "Hi", close, exit
    let code: Vec<u8> = vec![
        0xB4, 0x3C,       // mov ah,0x3c
        0x31, 0xC9,       // xor cx,cx
        0xBA, 0x1D, 0x01, // mov dx,0x11d
        0xCD, 0x21,       // int 0x21
        0x89, 0xC3,       // mov bx,ax
        0xB4, 0x40,       // mov ah,0x40
        0xB9, 0x02, 0x00, // mov cx,0x2
        0xBA, 0x23, 0x01, // mov dx,0x123
        0xCD, 0x21,       // int 0x21
        0xB4, 0x3E,       // mov ah,0x3e
        0xCD, 0x21,       // int 0x21
        0xB4, 0x4C,       // mov ah,0x4c
        0xCD, 0x21,       // int 0x21
        0x41, 0x2E, 0x54, 0x58, 0x54, 0x00, // 0x11d: "A.TXT",0
        0x48, 0x69,       // 0x123: "Hi"
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(50);
    assert_eq!(true, machine.cpu.halted);
    assert_eq!(HaltReason::ProgramExit, machine.cpu.halt_reason);
    assert_eq!(b"Hi".to_vec(), machine.disk.read_file(&[], "A.TXT").unwrap());
}

#[test]
fn dos_open_missing_file_reports_carry_and_code() {
    let code: Vec<u8> = vec![
        0xB4, 0x3D,       // mov ah,0x3d
        0xB0, 0x00,       // mov al,0x0
        0xBA, 0x0B, 0x01, // mov dx,0x10b
        0xCD, 0x21,       // int 0x21
        0x90, 0x90,       // nops
        0x4E, 0x4F, 0x2E, 0x42, 0x49, 0x4E, 0x00, // 0x10b: "NO.BIN",0
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(4);
    assert_eq!(true, machine.cpu.regs.flags.carry);
    assert_eq!(0x0002, machine.cpu.get_r16(R::AX));
}

#[test]
fn bios_disk_read_deposits_boot_sector() {
    // int 13h AH=02: read CHS 0/0/1 to ES:BX
    let code: Vec<u8> = vec![
        0xB8, 0x01, 0x02, // mov ax,0x0201
        0xB9, 0x01, 0x00, // mov cx,0x0001 (cyl 0, sector 1)
        0xBA, 0x00, 0x00, // mov dx,0x0000 (head 0, drive 0)
        0xBB, 0x00, 0x20, // mov bx,0x2000
        0xCD, 0x13,       // int 0x13
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(5);
    assert_eq!(false, machine.cpu.regs.flags.carry);
    let es = machine.cpu.get_r16(R::ES);
    // boot jump and signature came through
    assert_eq!(0xEB, machine.mmu.read_u8(es, 0x2000));
    assert_eq!(0x55, machine.mmu.read_u8(es, 0x2000 + 510));
    assert_eq!(0xAA, machine.mmu.read_u8(es, 0x2000 + 511));
}

#[test]
fn exe_image_is_relocated_and_entered() {
    // 32-byte MZ header, one relocation patching the mov immediate
    let mut image = vec![0u8; 48];
    image[0] = b'M';
    image[1] = b'Z';
    image[2..4].copy_from_slice(&48u16.to_le_bytes()); // bytes in last block
    image[4..6].copy_from_slice(&1u16.to_le_bytes()); // blocks in file
    image[6..8].copy_from_slice(&1u16.to_le_bytes()); // one reloc
    image[8..10].copy_from_slice(&2u16.to_le_bytes()); // header paragraphs
    image[14..16].copy_from_slice(&0u16.to_le_bytes()); // ss
    image[16..18].copy_from_slice(&0x0100u16.to_le_bytes()); // sp
    image[20..22].copy_from_slice(&0u16.to_le_bytes()); // ip
    image[22..24].copy_from_slice(&0u16.to_le_bytes()); // cs
    image[24..26].copy_from_slice(&28u16.to_le_bytes()); // reloc table offset
    image[28..30].copy_from_slice(&1u16.to_le_bytes()); // reloc: offset 1
    image[30..32].copy_from_slice(&0u16.to_le_bytes()); // reloc: segment 0
    image[32] = 0xB8; // mov ax,imm16 (imm patched by the relocation)
    image[33] = 0x00;
    image[34] = 0x00;
    image[35] = 0xCD; // int 0x20
    image[36] = 0x20;

    let mut machine = Machine::deterministic();
    machine.load_executable(&image, "TEST.EXE", "");
    let psp = machine.dos.psp_segment;
    let load_seg = psp + 0x10;
    assert_eq!(load_seg, machine.cpu.get_r16(R::CS));
    assert_eq!(0x0000, machine.cpu.regs.ip);
    assert_eq!(0x0100, machine.cpu.get_r16(R::SP));
    assert_eq!(psp, machine.cpu.get_r16(R::DS));

    machine.execute_instruction();
    // the relocated immediate is the load segment itself
    assert_eq!(load_seg, machine.cpu.get_r16(R::AX));
    machine.execute_instruction();
    assert_eq!(HaltReason::ProgramExit, machine.cpu.halt_reason);
}

#[test]
fn com_image_register_state() {
    let code: Vec<u8> = vec![0x90]; // nop
    let machine = loaded(&code);
    let psp = machine.dos.psp_segment;
    assert_eq!(psp, machine.cpu.get_r16(R::CS));
    assert_eq!(psp, machine.cpu.get_r16(R::DS));
    assert_eq!(psp, machine.cpu.get_r16(R::ES));
    assert_eq!(psp, machine.cpu.get_r16(R::SS));
    assert_eq!(0xFFFE, machine.cpu.get_r16(R::SP));
    assert_eq!(0x0100, machine.cpu.regs.ip);
    // the pushed zero word sends a bare ret to PSP:0000
    assert_eq!(0x0000, machine.mmu.read_u16(psp, 0xFFFE));
    // int 20h sits at the base of the PSP
    assert_eq!(0x20CD, machine.mmu.read_u16(psp, 0x0000));
    assert_eq!((psp, 0x0100), machine.program_base);
    assert_eq!(1, machine.program_length);
}

#[test]
fn mouse_motion_is_reported_and_reset() {
    let code: Vec<u8> = vec![
        0xB8, 0x0B, 0x00, // mov ax,0xb
        0xCD, 0x33,       // int 0x33
        0xB8, 0x0B, 0x00, // mov ax,0xb
        0xCD, 0x33,       // int 0x33
    ];
    let mut machine = loaded(&code);
    let (x0, y0) = (machine.mouse.x, machine.mouse.y);
    machine.mouse.moved(x0 + 8, y0.wrapping_sub(4));
    machine.execute_instructions(2);
    assert_eq!(8, machine.cpu.get_r16(R::CX));
    assert_eq!(-4i16 as u16, machine.cpu.get_r16(R::DX));
    // counters reset after the read
    machine.execute_instructions(2);
    assert_eq!(0, machine.cpu.get_r16(R::CX));
    assert_eq!(0, machine.cpu.get_r16(R::DX));
}

#[test]
fn bare_ret_terminates_via_the_psp() {
    let code: Vec<u8> = vec![0xC3]; // ret
    let mut machine = loaded(&code);
    machine.execute_instructions(2); // ret, then int 20h at PSP:0000
    assert_eq!(true, machine.cpu.halted);
    assert_eq!(HaltReason::ProgramExit, machine.cpu.halt_reason);
}

#[test]
fn tick_runs_until_program_exit() {
    let code: Vec<u8> = vec![
        0xB9, 0x10, 0x00, // mov cx,0x10
        0x90,             // nop
        0xE2, 0xFD,       // loop -3
        0xCD, 0x20,       // int 0x20
    ];
    let mut machine = loaded(&code);
    machine.tick();
    assert_eq!(false, machine.is_running());
    assert_eq!(HaltReason::ProgramExit, machine.cpu.halt_reason);
}

#[test]
fn hlt_opcode_halts_with_reason() {
    let code: Vec<u8> = vec![0xF4]; // hlt
    let mut machine = loaded(&code);
    machine.execute_instruction();
    assert_eq!(true, machine.cpu.halted);
    assert_eq!(HaltReason::Hlt, machine.cpu.halt_reason);
}

#[test]
fn dos_memory_allocation_reports_largest_block_on_failure() {
    let code: Vec<u8> = vec![
        0xB4, 0x48,       // mov ah,0x48
        0xBB, 0xFF, 0xFF, // mov bx,0xffff
        0xCD, 0x21,       // int 0x21
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(3);
    assert_eq!(true, machine.cpu.regs.flags.carry);
    assert_eq!(0x0008, machine.cpu.get_r16(R::AX));
    // the loader handed all memory to the program, nothing is left
    assert_eq!(0x0000, machine.cpu.get_r16(R::BX));
}

#[test]
fn unhandled_port_reads_as_ff() {
    let code: Vec<u8> = vec![
        0xBA, 0x34, 0x02, // mov dx,0x234
        0xEC,             // in al,dx
    ];
    let mut machine = loaded(&code);
    machine.execute_instructions(2);
    assert_eq!(0xFF, machine.cpu.get_r8(R::AL));
}
