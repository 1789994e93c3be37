use log::debug;

use crate::cpu::{HaltReason, R};
use crate::machine::Machine;

/// length in bytes of the `INT n` opcode, the rewind distance for
/// retrying a blocking read
pub const INT_OPCODE_LEN: u16 = 2;

// keyboard services
pub fn handle(machine: &mut Machine) {
    match machine.cpu.get_r8(R::AH) {
        0x00 | 0x10 => {
            // KEYBOARD - GET KEYSTROKE
            // Return: AH = scan code, AL = ASCII character
            // an empty buffer suspends the interpreter; IP is rewound so
            // the INT re-executes when the host delivers a key
            match machine.keyboard.pop() {
                Some(key) => machine.cpu.set_r16(R::AX, key),
                None => {
                    machine.cpu.regs.ip = machine.cpu.regs.ip.wrapping_sub(INT_OPCODE_LEN);
                    machine.cpu.halt(HaltReason::KeyWait);
                }
            }
        }
        0x01 | 0x11 => {
            // KEYBOARD - CHECK FOR KEYSTROKE
            // Return: ZF set if no keystroke, else ZF clear and AX = key
            // (the key stays in the buffer)
            match machine.keyboard.peek() {
                Some(key) => {
                    machine.cpu.set_r16(R::AX, key);
                    machine.cpu.regs.flags.zero = false;
                }
                None => machine.cpu.regs.flags.zero = true,
            }
        }
        0x02 => {
            // KEYBOARD - GET SHIFT FLAGS
            machine.cpu.set_r8(R::AL, machine.keyboard.shift_flags);
        }
        _ => {
            debug!(
                "int16 (keyboard) error: unknown ah={:02X}, ax={:04X}",
                machine.cpu.get_r8(R::AH),
                machine.cpu.get_r16(R::AX)
            );
        }
    }
}
