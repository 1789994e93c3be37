use pretty_assertions::assert_eq;

use crate::cpu::register::{amode, r16, r8, sr, AMode, RegisterState, R};

#[test]
fn high_and_low_halves_alias_the_word() {
    let mut regs = RegisterState::default();
    regs.set_r16(R::AX, 0x1234);
    assert_eq!(0x12, regs.get_r8(R::AH));
    assert_eq!(0x34, regs.get_r8(R::AL));

    regs.set_r8(R::AH, 0xFF);
    assert_eq!(0xFF34, regs.get_r16(R::AX));
    regs.set_r8(R::AL, 0x01);
    assert_eq!(0xFF01, regs.get_r16(R::AX));
}

#[test]
fn segment_registers_have_their_own_file() {
    let mut regs = RegisterState::default();
    regs.set_r16(R::AX, 0x1111);
    regs.set_r16(R::ES, 0x2222);
    // ES shares index 0 with AX but not storage
    assert_eq!(0x1111, regs.get_r16(R::AX));
    assert_eq!(0x2222, regs.get_r16(R::ES));
}

#[test]
fn field_decoders_follow_the_encoding_tables() {
    assert_eq!(R::AL, r8(0));
    assert_eq!(R::BH, r8(7));
    assert_eq!(R::AX, r16(0));
    assert_eq!(R::DI, r16(7));
    assert_eq!(R::ES, sr(0));
    assert_eq!(R::GS, sr(5));
    assert_eq!(AMode::BXSI, amode(0));
    assert_eq!(AMode::BX, amode(7));
}

#[test]
fn bp_based_amodes_default_to_ss() {
    assert!(AMode::BP.default_segment_is_ss());
    assert!(AMode::BPSI.default_segment_is_ss());
    assert!(AMode::BPDI.default_segment_is_ss());
    assert!(!AMode::BX.default_segment_is_ss());
    assert!(!AMode::SI.default_segment_is_ss());
}
