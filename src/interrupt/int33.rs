use log::debug;

use crate::cpu::R;
use crate::machine::Machine;

// mouse driver services; functions are selected by the whole of AX
pub fn handle(machine: &mut Machine) {
    match machine.cpu.get_r16(R::AX) {
        0x0000 => {
            // MOUSE - RESET DRIVER AND READ STATUS
            // Return: AX = FFFFh if installed, BX = number of buttons
            machine.mouse.reset();
            machine.cpu.set_r16(R::AX, 0xFFFF);
            machine.cpu.set_r16(R::BX, 2);
        }
        0x0001 => {
            // MOUSE - SHOW CURSOR
            machine.mouse.visible = true;
        }
        0x0002 => {
            // MOUSE - HIDE CURSOR
            machine.mouse.visible = false;
        }
        0x0003 => {
            // MOUSE - GET POSITION AND BUTTON STATUS
            // Return: BX = buttons, CX = column, DX = row
            machine.cpu.set_r16(R::BX, machine.mouse.buttons);
            machine.cpu.set_r16(R::CX, machine.mouse.x);
            machine.cpu.set_r16(R::DX, machine.mouse.y);
        }
        0x0004 => {
            // MOUSE - POSITION CURSOR
            let x = machine.cpu.get_r16(R::CX);
            let y = machine.cpu.get_r16(R::DX);
            machine.mouse.x = x;
            machine.mouse.y = y;
        }
        0x000B => {
            // MOUSE - READ MOTION COUNTERS
            // Return: CX = horizontal mickeys, DX = vertical, counters reset
            let (dx, dy) = machine.mouse.take_motion();
            machine.cpu.set_r16(R::CX, dx as u16);
            machine.cpu.set_r16(R::DX, dy as u16);
        }
        ax => {
            debug!("int33 (mouse) error: unknown ax={:04X}", ax);
        }
    }
}
