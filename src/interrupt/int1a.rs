use chrono::prelude::*;
use log::debug;

use crate::bios::BIOS;
use crate::cpu::R;
use crate::machine::Machine;

fn bcd(v: u8) -> u8 {
    ((v / 10) << 4) | (v % 10)
}

// time services
pub fn handle(machine: &mut Machine) {
    match machine.cpu.get_r8(R::AH) {
        0x00 => {
            // TIME - GET SYSTEM TIME
            // Return: CX:DX = clock ticks since midnight, AL = midnight flag
            let ticks = (machine.cpu.cycle_count / BIOS::CYCLES_PER_TICK) as u32;
            machine.cpu.set_r16(R::CX, (ticks >> 16) as u16);
            machine.cpu.set_r16(R::DX, (ticks & 0xFFFF) as u16);
            machine.cpu.set_r8(R::AL, 0);
        }
        0x02 => {
            // TIME - GET REAL-TIME CLOCK TIME
            // Return: CH = hours (BCD), CL = minutes, DH = seconds, DL = DST flag
            if machine.cpu.deterministic {
                machine.cpu.set_r16(R::CX, 0);
                machine.cpu.set_r16(R::DX, 0);
            } else {
                let now = Local::now();
                machine.cpu.set_r8(R::CH, bcd(now.hour() as u8));
                machine.cpu.set_r8(R::CL, bcd(now.minute() as u8));
                machine.cpu.set_r8(R::DH, bcd(now.second() as u8));
                machine.cpu.set_r8(R::DL, 0);
            }
            machine.cpu.regs.flags.carry = false;
        }
        0x04 => {
            // TIME - GET REAL-TIME CLOCK DATE
            // Return: CH = century (BCD), CL = year, DH = month, DL = day
            if machine.cpu.deterministic {
                machine.cpu.set_r16(R::CX, 0x1980);
                machine.cpu.set_r16(R::DX, 0x0101);
            } else {
                let now = Local::now();
                machine.cpu.set_r8(R::CH, bcd((now.year() / 100) as u8));
                machine.cpu.set_r8(R::CL, bcd((now.year() % 100) as u8));
                machine.cpu.set_r8(R::DH, bcd(now.month() as u8));
                machine.cpu.set_r8(R::DL, bcd(now.day() as u8));
            }
            machine.cpu.regs.flags.carry = false;
        }
        _ => {
            debug!(
                "int1a (time) error: unknown ah={:02X}, ax={:04X}",
                machine.cpu.get_r8(R::AH),
                machine.cpu.get_r16(R::AX)
            );
            machine.cpu.regs.flags.carry = true;
        }
    }
}
