use log::debug;

use crate::cpu::R;
use crate::machine::Machine;

// video services
pub fn handle(machine: &mut Machine) {
    match machine.cpu.get_r8(R::AH) {
        0x00 => {
            // VIDEO - SET VIDEO MODE
            // AL = desired video mode
            let al = machine.cpu.get_r8(R::AL);
            machine.gpu.set_mode(&mut machine.mmu, al & 0x7F);
        }
        0x01 => {
            // VIDEO - SET TEXT-MODE CURSOR SHAPE
            // CH = cursor start and options
            // CL = bottom scan line containing cursor (bits 0-4)
            let ch = machine.cpu.get_r8(R::CH);
            let cl = machine.cpu.get_r8(R::CL);
            machine.gpu.cursor_shape = (ch, cl & 0x1F);
        }
        0x02 => {
            // VIDEO - SET CURSOR POSITION
            // BH = page, DH = row, DL = column
            let page = machine.cpu.get_r8(R::BH);
            let row = machine.cpu.get_r8(R::DH);
            let column = machine.cpu.get_r8(R::DL);
            machine.gpu.set_cursor_pos(&mut machine.mmu, row, column, page);
        }
        0x03 => {
            // VIDEO - GET CURSOR POSITION AND SIZE
            // Return:
            // CH/CL = cursor shape, DH = row, DL = column
            let page = machine.cpu.get_r8(R::BH);
            let (row, col) = machine.gpu.cursor_pos(page);
            let (start, end) = machine.gpu.cursor_shape;
            machine.cpu.set_r16(R::AX, 0);
            machine.cpu.set_r8(R::CH, start);
            machine.cpu.set_r8(R::CL, end);
            machine.cpu.set_r8(R::DH, row);
            machine.cpu.set_r8(R::DL, col);
        }
        0x05 => {
            // VIDEO - SELECT ACTIVE DISPLAY PAGE
            let al = machine.cpu.get_r8(R::AL);
            machine.gpu.set_active_page(&mut machine.mmu, al);
        }
        0x06 => {
            // VIDEO - SCROLL UP WINDOW
            // AL = lines (0 = clear), BH = attribute for blanked rows
            // CH,CL = upper left, DH,DL = lower right
            let al = machine.cpu.get_r8(R::AL);
            let bh = machine.cpu.get_r8(R::BH);
            let (top, left) = (machine.cpu.get_r8(R::CH), machine.cpu.get_r8(R::CL));
            let (bottom, right) = (machine.cpu.get_r8(R::DH), machine.cpu.get_r8(R::DL));
            machine.gpu.scroll_up(&mut machine.mmu, al, bh, top, left, bottom, right);
        }
        0x07 => {
            // VIDEO - SCROLL DOWN WINDOW
            let al = machine.cpu.get_r8(R::AL);
            let bh = machine.cpu.get_r8(R::BH);
            let (top, left) = (machine.cpu.get_r8(R::CH), machine.cpu.get_r8(R::CL));
            let (bottom, right) = (machine.cpu.get_r8(R::DH), machine.cpu.get_r8(R::DL));
            machine.gpu.scroll_down(&mut machine.mmu, al, bh, top, left, bottom, right);
        }
        0x08 => {
            // VIDEO - READ CHARACTER AND ATTRIBUTE AT CURSOR
            // Return: AH = attribute, AL = character
            let page = machine.cpu.get_r8(R::BH);
            let (row, col) = machine.gpu.cursor_pos(page);
            let (ch, attr) = machine.gpu.read_char_attr(&machine.mmu, row, col);
            machine.cpu.set_r8(R::AL, ch);
            machine.cpu.set_r8(R::AH, attr);
        }
        0x09 => {
            // VIDEO - WRITE CHARACTER AND ATTRIBUTE AT CURSOR
            // AL = character, BL = attribute, CX = repeat count
            // cursor does not advance
            let al = machine.cpu.get_r8(R::AL);
            let bl = machine.cpu.get_r8(R::BL);
            let page = machine.cpu.get_r8(R::BH);
            let count = machine.cpu.get_r16(R::CX);
            machine.gpu.write_char_at_cursor(&mut machine.mmu, page, al, Some(bl), count);
        }
        0x0A => {
            // VIDEO - WRITE CHARACTER ONLY AT CURSOR
            let al = machine.cpu.get_r8(R::AL);
            let page = machine.cpu.get_r8(R::BH);
            let count = machine.cpu.get_r16(R::CX);
            machine.gpu.write_char_at_cursor(&mut machine.mmu, page, al, None, count);
        }
        0x0E => {
            // VIDEO - TELETYPE OUTPUT
            // AL = character, BH = page
            let al = machine.cpu.get_r8(R::AL);
            let page = machine.cpu.get_r8(R::BH);
            machine.gpu.teletype(&mut machine.mmu, page, al);
        }
        0x0F => {
            // VIDEO - GET CURRENT VIDEO MODE
            // Return: AH = columns, AL = mode, BH = active page
            machine.cpu.set_r8(R::AH, machine.gpu.cols);
            machine.cpu.set_r8(R::AL, machine.gpu.mode);
            machine.cpu.set_r8(R::BH, machine.gpu.active_page);
        }
        0x11 => {
            // VIDEO - CHARACTER GENERATOR
            match machine.cpu.get_r8(R::AL) {
                0x30 => {
                    // GET FONT INFORMATION
                    // Return: ES:BP = font pointer, CX = bytes/char, DL = rows - 1
                    machine.cpu.set_r16(R::ES, 0);
                    machine.cpu.set_r16(R::BP, 0);
                    machine.cpu.set_r16(R::CX, 16);
                    machine.cpu.set_r8(R::DL, machine.gpu.rows - 1);
                }
                al => debug!("int10: unhandled character generator al={:02X}", al),
            }
        }
        0x12 => {
            // VIDEO - ALTERNATE FUNCTION SELECT
            match machine.cpu.get_r8(R::BL) {
                0x10 => {
                    // GET EGA INFO
                    // Return: BH = color mode, BL = memory (3 = 256k), CH = features, CL = switches
                    machine.cpu.set_r8(R::BH, 0);
                    machine.cpu.set_r8(R::BL, 3);
                    machine.cpu.set_r8(R::CH, 0);
                    machine.cpu.set_r8(R::CL, 0x09);
                }
                bl => debug!("int10: unhandled alternate function bl={:02X}", bl),
            }
        }
        0x1A => {
            // VIDEO - GET DISPLAY COMBINATION CODE
            // Return: AL = 1Ah if supported, BL = active display, BH = alternate
            machine.cpu.set_r8(R::AL, 0x1A);
            machine.cpu.set_r8(R::BL, 0x08); // VGA with color monitor
            machine.cpu.set_r8(R::BH, 0);
        }
        _ => {
            debug!(
                "int10 (video) error: unknown ah={:02X}, ax={:04X}",
                machine.cpu.get_r8(R::AH),
                machine.cpu.get_r16(R::AX)
            );
        }
    }
}
