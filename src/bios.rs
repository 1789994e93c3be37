// https://wiki.osdev.org/BIOS

use crate::memory::MMU;

#[derive(Clone)]
pub struct BIOS {}

impl BIOS {
    pub const DATA_SEG: u16 = 0x0040; // bios data area, 256 bytes at 000400
    pub const ROM_SEG: u16 = 0xF000; // bios rom segment

    // bios data area offsets
    pub const DATA_EQUIPMENT_WORD: u16 = 0x0010;
    pub const DATA_MEMORY_KB: u16 = 0x0013;
    pub const DATA_KEYBOARD_FLAGS: u16 = 0x0017;
    pub const DATA_CURRENT_MODE: u16 = 0x0049;
    pub const DATA_NB_COLS: u16 = 0x004A;
    pub const DATA_CURSOR_POS: u16 = 0x0050; // 8 pages, 2 bytes each
    pub const DATA_CURRENT_PAGE: u16 = 0x0062;
    pub const DATA_TICK_COUNT: u16 = 0x006C; // dword, 18.2 Hz
    pub const DATA_NB_ROWS: u16 = 0x0084;

    /// one floppy drive, 80x25 color video
    pub const EQUIPMENT: u16 = 0x0021;

    /// conventional memory in KiB
    pub const MEMORY_KB: u16 = 640;

    /// the 18.2 Hz timer expressed in cpu cycles at 4.77 MHz
    pub const CYCLES_PER_TICK: usize = 262_087;

    pub fn default() -> Self {
        BIOS {}
    }

    pub fn init(&mut self, mmu: &mut MMU) {
        self.init_ivt(mmu);
        self.init_data_area(mmu);
    }

    /// every vector points at an IRET stub in the rom segment; the
    /// machine intercepts registered vectors before this is reached
    fn init_ivt(&mut self, mmu: &mut MMU) {
        const IRET: u8 = 0xCF;
        for vec in 0..=0xFFu16 {
            mmu.write_vec(vec as u8, BIOS::ROM_SEG, vec);
            mmu.write_u8(BIOS::ROM_SEG, vec, IRET);
        }
    }

    fn init_data_area(&self, mmu: &mut MMU) {
        mmu.write_u16(BIOS::DATA_SEG, BIOS::DATA_EQUIPMENT_WORD, BIOS::EQUIPMENT);
        mmu.write_u16(BIOS::DATA_SEG, BIOS::DATA_MEMORY_KB, BIOS::MEMORY_KB);
        mmu.write_u8(BIOS::DATA_SEG, BIOS::DATA_KEYBOARD_FLAGS, 0);
        mmu.write_u32(BIOS::DATA_SEG, BIOS::DATA_TICK_COUNT, 0);
    }
}
