use log::debug;

use crate::cpu::R;
use crate::machine::Machine;

// system services
pub fn handle(machine: &mut Machine) {
    match machine.cpu.get_r8(R::AH) {
        0x24 => {
            // SYSTEM - A20 GATE
            match machine.cpu.get_r8(R::AL) {
                0x00 | 0x01 => {
                    // disable/enable, accepted
                    machine.cpu.set_r8(R::AH, 0);
                    machine.cpu.regs.flags.carry = false;
                }
                0x02 => {
                    // get status: A20 is always enabled here
                    machine.cpu.set_r8(R::AL, 1);
                    machine.cpu.set_r8(R::AH, 0);
                    machine.cpu.regs.flags.carry = false;
                }
                0x03 => {
                    // query support
                    machine.cpu.set_r16(R::BX, 3);
                    machine.cpu.set_r8(R::AH, 0);
                    machine.cpu.regs.flags.carry = false;
                }
                al => {
                    debug!("int15: unknown a20 function al={:02X}", al);
                    machine.cpu.regs.flags.carry = true;
                }
            }
        }
        0x86 => {
            // SYSTEM - WAIT
            // CX:DX = interval in microseconds; modelled as a coarse
            // cycle-count charge at 4.77 cycles per microsecond
            let micros = (u32::from(machine.cpu.get_r16(R::CX)) << 16)
                | u32::from(machine.cpu.get_r16(R::DX));
            machine.cpu.cycle_count += (micros as usize * 477) / 100;
            machine.cpu.set_r8(R::AH, 0);
            machine.cpu.regs.flags.carry = false;
        }
        0x88 => {
            // SYSTEM - GET EXTENDED MEMORY SIZE
            // Return: AX = KiB above 1 MiB, none here
            machine.cpu.set_r16(R::AX, 0);
            machine.cpu.regs.flags.carry = false;
        }
        _ => {
            debug!(
                "int15 (system) error: unknown ah={:02X}, ax={:04X}",
                machine.cpu.get_r8(R::AH),
                machine.cpu.get_r16(R::AX)
            );
            machine.cpu.set_r8(R::AH, 0x86); // unsupported function
            machine.cpu.regs.flags.carry = true;
        }
    }
}
