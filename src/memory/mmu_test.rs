use pretty_assertions::assert_eq;

use crate::memory::{physical_address, MMU};

#[test]
fn physical_addresses_wrap_to_20_bits() {
    // FFFF:FFFF = 0x10FFEF, wraps to 0x00FFEF
    assert_eq!(0x00FFEF, physical_address(0xFFFF, 0xFFFF));
    assert_eq!(0x0007C0, physical_address(0x007C, 0x0000));
}

#[test]
fn word_access_is_little_endian_and_unaligned() {
    let mut mmu = MMU::default();
    mmu.write_u16(0x0100, 0x0001, 0xBEEF);
    assert_eq!(0xEF, mmu.read_u8(0x0100, 0x0001));
    assert_eq!(0xBE, mmu.read_u8(0x0100, 0x0002));
    assert_eq!(0xBEEF, mmu.read_u16(0x0100, 0x0001));
}

#[test]
fn wrapping_read_at_top_of_memory() {
    let mut mmu = MMU::default();
    mmu.write_u8(0xFFFF, 0xFFFF, 0x12);
    assert_eq!(0x12, mmu.memory.read_u8(0x00FFEF));
}

#[test]
fn interrupt_vector_roundtrip() {
    let mut mmu = MMU::default();
    mmu.write_vec(0x21, 0xF000, 0x0021);
    assert_eq!((0xF000, 0x0021), mmu.read_vec(0x21));
}
