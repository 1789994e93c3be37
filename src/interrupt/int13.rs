use log::debug;

use crate::cpu::R;
use crate::machine::Machine;
use crate::storage::{HEADS, SECTORS_PER_TRACK, TOTAL_SECTORS};

/// converts cylinder/head/sector (sector is 1-based) to a linear block address
pub fn chs_to_lba(cylinder: u16, head: u16, sector: u16) -> u32 {
    (u32::from(cylinder) * u32::from(HEADS) + u32::from(head)) * u32::from(SECTORS_PER_TRACK)
        + u32::from(sector) - 1
}

// disk services for the floppy in drive A:
pub fn handle(machine: &mut Machine) {
    match machine.cpu.get_r8(R::AH) {
        0x00 => {
            // DISK - RESET DISK SYSTEM
            // Return: AH = status, CF clear if successful
            machine.cpu.set_r8(R::AH, 0);
            machine.cpu.regs.flags.carry = false;
        }
        0x02 => {
            // DISK - READ SECTORS INTO MEMORY
            // AL = number of sectors, CH = cylinder, CL = sector (1-based,
            // high cylinder bits in 6-7), DH = head, DL = drive
            // ES:BX -> data buffer
            // Return: CF set on error with status in AH, else AL = sectors read
            let count = u16::from(machine.cpu.get_r8(R::AL));
            let cylinder = u16::from(machine.cpu.get_r8(R::CH))
                | (u16::from(machine.cpu.get_r8(R::CL) & 0xC0) << 2);
            let sector = u16::from(machine.cpu.get_r8(R::CL) & 0x3F);
            let head = u16::from(machine.cpu.get_r8(R::DH));
            let es = machine.cpu.get_r16(R::ES);
            let bx = machine.cpu.get_r16(R::BX);

            if sector == 0 || head >= HEADS || count == 0 {
                machine.cpu.set_r8(R::AH, 0x04); // sector not found
                machine.cpu.set_r8(R::AL, 0);
                machine.cpu.regs.flags.carry = true;
                return;
            }
            let lba = chs_to_lba(cylinder, head, sector);
            if lba + u32::from(count) > u32::from(TOTAL_SECTORS) {
                machine.cpu.set_r8(R::AH, 0x04);
                machine.cpu.set_r8(R::AL, 0);
                machine.cpu.regs.flags.carry = true;
                return;
            }

            for i in 0..count {
                let data = machine.disk.read_sector((lba + u32::from(i)) as u16);
                machine.mmu.write(es, bx.wrapping_add(i.wrapping_mul(512)), &data);
            }
            machine.cpu.set_r8(R::AH, 0);
            machine.cpu.set_r8(R::AL, count as u8);
            machine.cpu.regs.flags.carry = false;
        }
        0x08 => {
            // DISK - GET DRIVE PARAMETERS
            // Return: CH = max cylinder, CL = max sector, DH = max head,
            // DL = number of drives, BL = drive type (04h = 1.44M)
            machine.cpu.set_r8(R::AH, 0);
            machine.cpu.set_r8(R::BL, 0x04);
            machine.cpu.set_r8(R::CH, 79);
            machine.cpu.set_r8(R::CL, SECTORS_PER_TRACK as u8);
            machine.cpu.set_r8(R::DH, (HEADS - 1) as u8);
            machine.cpu.set_r8(R::DL, 1);
            machine.cpu.set_r16(R::ES, 0);
            machine.cpu.set_r16(R::DI, 0);
            machine.cpu.regs.flags.carry = false;
        }
        0x15 => {
            // DISK - GET DISK TYPE
            // Return: AH = 01h, floppy without change-line support
            machine.cpu.set_r8(R::AH, 0x01);
            machine.cpu.regs.flags.carry = false;
        }
        _ => {
            debug!(
                "int13 (disk) error: unknown ah={:02X}, ax={:04X}",
                machine.cpu.get_r8(R::AH),
                machine.cpu.get_r16(R::AX)
            );
            machine.cpu.set_r8(R::AH, 0x01); // invalid function
            machine.cpu.regs.flags.carry = true;
        }
    }
}
