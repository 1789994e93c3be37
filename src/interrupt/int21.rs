use chrono::prelude::*;
use log::{debug, info};

use crate::cpu::{HaltReason, R};
use crate::dos::{
    self, fs_error_code, matches_wildcard, OpenFile, FindState, ERROR_ACCESS_DENIED,
    ERROR_FILE_NOT_FOUND, ERROR_INVALID_FUNCTION, ERROR_INVALID_HANDLE,
    ERROR_INSUFFICIENT_MEMORY, ERROR_NO_MORE_FILES, ERROR_PATH_NOT_FOUND, FIRST_FILE_HANDLE,
};
use crate::interrupt::int16::INT_OPCODE_LEN;
use crate::machine::Machine;
use crate::storage::DirEntry;

// DOS services
pub fn handle(machine: &mut Machine) {
    let ah = machine.cpu.get_r8(R::AH);
    match ah {
        0x00 => {
            // DOS 1+ - TERMINATE PROGRAM
            info!("int21 - TERMINATE PROGRAM");
            machine.dos.return_code = 0;
            machine.cpu.halt(HaltReason::ProgramExit);
        }
        0x01 => {
            // DOS 1+ - READ CHARACTER FROM STANDARD INPUT, WITH ECHO
            // Return: AL = character read
            if let Some(ch) = read_char_blocking(machine) {
                console_out(machine, ch);
                machine.cpu.set_r8(R::AL, ch);
            }
        }
        0x02 => {
            // DOS 1+ - WRITE CHARACTER TO STANDARD OUTPUT
            // DL = character; AL = last character output
            let dl = machine.cpu.get_r8(R::DL);
            console_out(machine, dl);
            machine.cpu.set_r8(R::AL, dl);
        }
        0x06 => {
            // DOS 1+ - DIRECT CONSOLE I/O
            // DL = character to output, or FFh to poll input
            let dl = machine.cpu.get_r8(R::DL);
            if dl == 0xFF {
                match machine.keyboard.pop() {
                    Some(key) => {
                        machine.cpu.set_r8(R::AL, (key & 0xFF) as u8);
                        machine.cpu.regs.flags.zero = false;
                    }
                    None => {
                        machine.cpu.set_r8(R::AL, 0);
                        machine.cpu.regs.flags.zero = true;
                    }
                }
            } else {
                console_out(machine, dl);
                machine.cpu.set_r8(R::AL, dl);
            }
        }
        0x07 | 0x08 => {
            // DOS 1+ - DIRECT CHARACTER INPUT, WITHOUT ECHO
            if let Some(ch) = read_char_blocking(machine) {
                machine.cpu.set_r8(R::AL, ch);
            }
        }
        0x09 => {
            // DOS 1+ - WRITE STRING TO STANDARD OUTPUT
            // DS:DX -> '$'-terminated string
            let ds = machine.cpu.get_r16(R::DS);
            let mut dx = machine.cpu.get_r16(R::DX);
            loop {
                let b = machine.mmu.read_u8(ds, dx);
                if b == b'$' {
                    break;
                }
                console_out(machine, b);
                dx = dx.wrapping_add(1);
            }
            machine.cpu.set_r8(R::AL, b'$');
        }
        0x0A => {
            // DOS 1+ - BUFFERED INPUT
            // DS:DX -> buffer, first byte = maximum length
            // suspends until a full line (terminated by CR) is buffered
            if !machine.keyboard.contains_ascii(0x0D) {
                key_wait(machine);
                return;
            }
            let ds = machine.cpu.get_r16(R::DS);
            let dx = machine.cpu.get_r16(R::DX);
            let max = machine.mmu.read_u8(ds, dx) as usize;
            let mut line = Vec::new();
            while let Some(key) = machine.keyboard.pop() {
                let ch = (key & 0xFF) as u8;
                if ch == 0x0D {
                    break;
                }
                if line.len() + 1 < max {
                    console_out(machine, ch);
                    line.push(ch);
                }
            }
            machine.mmu.write_u8(ds, dx.wrapping_add(1), line.len() as u8);
            machine.mmu.write(ds, dx.wrapping_add(2), &line);
            machine
                .mmu
                .write_u8(ds, dx.wrapping_add(2 + line.len() as u16), 0x0D);
            console_out(machine, 0x0D);
        }
        0x0B => {
            // DOS 1+ - GET STDIN STATUS
            // Return: AL = FFh if a character is available, else 0
            let al = if machine.keyboard.has_input() { 0xFF } else { 0x00 };
            machine.cpu.set_r8(R::AL, al);
        }
        0x19 => {
            // DOS 1+ - GET CURRENT DEFAULT DRIVE
            // Return: AL = drive (0 = A:)
            machine.cpu.set_r8(R::AL, 0);
        }
        0x1A => {
            // DOS 1+ - SET DISK TRANSFER AREA ADDRESS
            let seg = machine.cpu.get_r16(R::DS);
            let offs = machine.cpu.get_r16(R::DX);
            machine.dos.dta = (seg, offs);
        }
        0x25 => {
            // DOS 1+ - SET INTERRUPT VECTOR
            // AL = vector, DS:DX -> handler
            let vec = machine.cpu.get_r8(R::AL);
            let seg = machine.cpu.get_r16(R::DS);
            let offs = machine.cpu.get_r16(R::DX);
            machine.mmu.write_vec(vec, seg, offs);
        }
        0x2A => {
            // DOS 1+ - GET SYSTEM DATE
            // Return: CX = year, DH = month, DL = day, AL = weekday
            if machine.cpu.deterministic {
                machine.cpu.set_r16(R::CX, 1980);
                machine.cpu.set_r8(R::DH, 1);
                machine.cpu.set_r8(R::DL, 1);
                machine.cpu.set_r8(R::AL, 2); // 1980-01-01 was a Tuesday
            } else {
                let now = Local::now();
                machine.cpu.set_r16(R::CX, now.year() as u16);
                machine.cpu.set_r8(R::DH, now.month() as u8);
                machine.cpu.set_r8(R::DL, now.day() as u8);
                machine.cpu.set_r8(R::AL, now.weekday().num_days_from_sunday() as u8);
            }
        }
        0x2C => {
            // DOS 1+ - GET SYSTEM TIME
            // Return: CH = hour, CL = minute, DH = second, DL = 1/100 seconds
            if machine.cpu.deterministic {
                machine.cpu.set_r16(R::CX, 0);
                machine.cpu.set_r16(R::DX, 0);
            } else {
                let now = Local::now();
                machine.cpu.set_r8(R::CH, now.hour() as u8);
                machine.cpu.set_r8(R::CL, now.minute() as u8);
                machine.cpu.set_r8(R::DH, now.second() as u8);
                machine.cpu.set_r8(R::DL, (now.nanosecond() / 10_000_000) as u8);
            }
        }
        0x2F => {
            // DOS 2+ - GET DISK TRANSFER AREA ADDRESS
            // Return: ES:BX -> current DTA
            let (seg, offs) = machine.dos.dta;
            machine.cpu.set_r16(R::ES, seg);
            machine.cpu.set_r16(R::BX, offs);
        }
        0x30 => {
            // DOS 2+ - GET DOS VERSION
            machine.cpu.set_r8(R::AL, 5); // major
            machine.cpu.set_r8(R::AH, 0); // minor
            machine.cpu.set_r8(R::BH, 0xFF); // MS-DOS
            machine.cpu.set_r8(R::BL, 0);
            machine.cpu.set_r16(R::CX, 0);
        }
        0x35 => {
            // DOS 2+ - GET INTERRUPT VECTOR
            // Return: ES:BX -> handler
            let vec = machine.cpu.get_r8(R::AL);
            let (seg, offs) = machine.mmu.read_vec(vec);
            machine.cpu.set_r16(R::ES, seg);
            machine.cpu.set_r16(R::BX, offs);
        }
        0x39 => {
            // DOS 2+ - MKDIR
            // DS:DX -> ASCIZ directory name
            let spec = read_name(machine);
            let (dir, name) = machine.dos.resolve_path(&spec);
            match machine.disk.mkdir(&dir, &name) {
                Ok(()) => success(machine),
                Err(e) => fail(machine, fs_error_code(&e)),
            }
        }
        0x3A => {
            // DOS 2+ - RMDIR
            // DS:DX -> ASCIZ directory name; the directory must be empty
            let spec = read_name(machine);
            let (dir, name) = machine.dos.resolve_path(&spec);
            let mut target = dir.clone();
            target.push(name.clone());
            match machine.disk.list_dir(&target) {
                Ok(entries) => {
                    if entries.iter().any(|e| e.name != "." && e.name != "..") {
                        fail(machine, ERROR_ACCESS_DENIED);
                        return;
                    }
                    match machine.disk.delete_entry(&dir, &name) {
                        Ok(true) => success(machine),
                        Ok(false) => fail(machine, ERROR_PATH_NOT_FOUND),
                        Err(e) => fail(machine, fs_error_code(&e)),
                    }
                }
                Err(_) => fail(machine, ERROR_PATH_NOT_FOUND),
            }
        }
        0x3B => {
            // DOS 2+ - CHDIR
            // DS:DX -> ASCIZ directory name
            let spec = read_name(machine);
            let components = machine.dos.resolve_dir_path(&spec);
            match machine.disk.list_dir(&components) {
                Ok(_) => {
                    machine.dos.cwd = components;
                    success(machine);
                }
                Err(_) => fail(machine, ERROR_PATH_NOT_FOUND),
            }
        }
        0x3C => {
            // DOS 2+ - CREATE OR TRUNCATE FILE
            // CX = attributes, DS:DX -> ASCIZ filename
            // Return: AX = file handle
            let spec = read_name(machine);
            let attr = machine.cpu.get_r8(R::CL);
            let (dir, name) = machine.dos.resolve_path(&spec);
            match machine.disk.write_file(&dir, &name, &[]) {
                Ok(()) => {
                    if attr != 0 {
                        let _ = machine.disk.set_attributes(&dir, &name, attr | 0x20);
                    }
                    let handle = open_handle(machine, dir, name, Vec::new(), 2);
                    machine.cpu.set_r16(R::AX, handle);
                    success(machine);
                }
                Err(e) => fail(machine, fs_error_code(&e)),
            }
        }
        0x3D => {
            // DOS 2+ - OPEN EXISTING FILE
            // AL = access mode, DS:DX -> ASCIZ filename
            // Return: AX = file handle
            let spec = read_name(machine);
            let mode = machine.cpu.get_r8(R::AL) & 7;
            let (dir, name) = machine.dos.resolve_path(&spec);
            match machine.disk.read_file(&dir, &name) {
                Ok(data) => {
                    let handle = open_handle(machine, dir, name, data, mode);
                    machine.cpu.set_r16(R::AX, handle);
                    success(machine);
                }
                Err(e) => fail(machine, fs_error_code(&e)),
            }
        }
        0x3E => {
            // DOS 2+ - CLOSE FILE
            // BX = handle; a modified file is flushed to the disk
            let handle = machine.cpu.get_r16(R::BX);
            if handle < FIRST_FILE_HANDLE {
                success(machine);
                return;
            }
            match machine.dos.files.remove(&handle) {
                Some(file) => {
                    if file.modified {
                        match machine.disk.write_file(&file.dir, &file.name, &file.data) {
                            Ok(()) => success(machine),
                            Err(e) => fail(machine, fs_error_code(&e)),
                        }
                    } else {
                        success(machine);
                    }
                }
                None => fail(machine, ERROR_INVALID_HANDLE),
            }
        }
        0x3F => {
            // DOS 2+ - READ FROM FILE OR DEVICE
            // BX = handle, CX = count, DS:DX -> buffer
            // Return: AX = bytes read
            let handle = machine.cpu.get_r16(R::BX);
            let count = usize::from(machine.cpu.get_r16(R::CX));
            let ds = machine.cpu.get_r16(R::DS);
            let dx = machine.cpu.get_r16(R::DX);
            if handle == 0 {
                read_console_line(machine, ds, dx, count);
                return;
            }
            match machine.dos.files.get_mut(&handle) {
                Some(file) => {
                    let end = (file.pos + count).min(file.data.len());
                    let slice = file.data[file.pos.min(end)..end].to_vec();
                    file.pos += slice.len();
                    machine.mmu.write(ds, dx, &slice);
                    machine.cpu.set_r16(R::AX, slice.len() as u16);
                    success(machine);
                }
                None => fail(machine, ERROR_INVALID_HANDLE),
            }
        }
        0x40 => {
            // DOS 2+ - WRITE TO FILE OR DEVICE
            // BX = handle, CX = count, DS:DX -> data
            // CX = 0 truncates or extends the file to the current position
            // Return: AX = bytes written
            let handle = machine.cpu.get_r16(R::BX);
            let count = usize::from(machine.cpu.get_r16(R::CX));
            let ds = machine.cpu.get_r16(R::DS);
            let dx = machine.cpu.get_r16(R::DX);
            if handle < FIRST_FILE_HANDLE {
                // standard streams print through the video teletype
                let data = machine.mmu.read(ds, dx, count);
                for b in &data {
                    console_out(machine, *b);
                }
                machine.cpu.set_r16(R::AX, count as u16);
                success(machine);
                return;
            }
            match machine.dos.files.get_mut(&handle) {
                Some(file) => {
                    if file.mode & 3 == 0 {
                        // opened read-only
                        fail(machine, ERROR_ACCESS_DENIED);
                        return;
                    }
                    if count == 0 {
                        file.data.resize(file.pos, 0);
                        file.modified = true;
                        machine.cpu.set_r16(R::AX, 0);
                    } else {
                        let data = machine.mmu.read(ds, dx, count);
                        if file.data.len() < file.pos {
                            file.data.resize(file.pos, 0);
                        }
                        let end = (file.pos + count).min(file.data.len());
                        file.data.splice(file.pos..end, data.iter().cloned());
                        file.pos += count;
                        file.modified = true;
                        machine.cpu.set_r16(R::AX, count as u16);
                    }
                    success(machine);
                }
                None => fail(machine, ERROR_INVALID_HANDLE),
            }
        }
        0x41 => {
            // DOS 2+ - DELETE FILE
            // DS:DX -> ASCIZ filename
            let spec = read_name(machine);
            let (dir, name) = machine.dos.resolve_path(&spec);
            match machine.disk.delete_entry(&dir, &name) {
                Ok(true) => success(machine),
                Ok(false) => fail(machine, ERROR_FILE_NOT_FOUND),
                Err(e) => fail(machine, fs_error_code(&e)),
            }
        }
        0x42 => {
            // DOS 2+ - SET CURRENT FILE POSITION
            // AL = origin (0 start, 1 current, 2 end), CX:DX = offset
            // Return: DX:AX = new position
            let handle = machine.cpu.get_r16(R::BX);
            let offset =
                ((u32::from(machine.cpu.get_r16(R::CX)) << 16) | u32::from(machine.cpu.get_r16(R::DX))) as i32;
            let origin = machine.cpu.get_r8(R::AL);
            if origin > 2 {
                fail(machine, ERROR_INVALID_FUNCTION);
                return;
            }
            match machine.dos.files.get_mut(&handle) {
                Some(file) => {
                    let base = match origin {
                        0 => 0i64,
                        1 => file.pos as i64,
                        _ => file.data.len() as i64,
                    };
                    let pos = (base + i64::from(offset)).max(0) as u32;
                    file.pos = pos as usize;
                    machine.cpu.set_r16(R::AX, (pos & 0xFFFF) as u16);
                    machine.cpu.set_r16(R::DX, (pos >> 16) as u16);
                    success(machine);
                }
                None => fail(machine, ERROR_INVALID_HANDLE),
            }
        }
        0x43 => {
            // DOS 2+ - GET/SET FILE ATTRIBUTES
            // AL = 0 get (CX out), AL = 1 set (CX in), DS:DX -> filename
            let spec = read_name(machine);
            let (dir, name) = machine.dos.resolve_path(&spec);
            match machine.cpu.get_r8(R::AL) {
                0x00 => match machine.disk.attributes(&dir, &name) {
                    Ok(attr) => {
                        machine.cpu.set_r16(R::CX, u16::from(attr));
                        success(machine);
                    }
                    Err(e) => fail(machine, fs_error_code(&e)),
                },
                0x01 => {
                    let attr = machine.cpu.get_r8(R::CL);
                    match machine.disk.set_attributes(&dir, &name, attr) {
                        Ok(()) => success(machine),
                        Err(e) => fail(machine, fs_error_code(&e)),
                    }
                }
                _ => fail(machine, ERROR_INVALID_FUNCTION),
            }
        }
        0x44 => {
            // DOS 2+ - IOCTL
            match machine.cpu.get_r8(R::AL) {
                0x00 => {
                    // GET DEVICE INFORMATION
                    // Return: DX = device information word
                    let handle = machine.cpu.get_r16(R::BX);
                    if handle < FIRST_FILE_HANDLE {
                        // character device, console in/out
                        machine.cpu.set_r16(R::DX, 0x80D3);
                        success(machine);
                    } else if machine.dos.files.contains_key(&handle) {
                        machine.cpu.set_r16(R::DX, 0x0000); // block device, drive A:
                        success(machine);
                    } else {
                        fail(machine, ERROR_INVALID_HANDLE);
                    }
                }
                al => {
                    debug!("int21 ioctl: unhandled al={:02X}", al);
                    fail(machine, ERROR_INVALID_FUNCTION);
                }
            }
        }
        0x47 => {
            // DOS 2+ - GET CURRENT DIRECTORY
            // DL = drive, DS:SI -> 64-byte buffer for ASCIZ path
            // the path does not begin with a backslash
            let ds = machine.cpu.get_r16(R::DS);
            let si = machine.cpu.get_r16(R::SI);
            let cwd = machine.dos.cwd_string();
            machine.mmu.write(ds, si, cwd.as_bytes());
            machine.mmu.write_u8(ds, si.wrapping_add(cwd.len() as u16), 0);
            machine.cpu.set_r16(R::AX, 0x0100);
            success(machine);
        }
        0x48 => {
            // DOS 2+ - ALLOCATE MEMORY
            // BX = paragraphs
            // Return: AX = segment; on failure BX = largest block
            let paragraphs = machine.cpu.get_r16(R::BX);
            let owner = machine.dos.psp_segment;
            match machine.dos.alloc(paragraphs, owner) {
                Some(seg) => {
                    machine.cpu.set_r16(R::AX, seg);
                    success(machine);
                }
                None => {
                    let largest = machine.dos.largest_free();
                    machine.cpu.set_r16(R::BX, largest);
                    fail(machine, ERROR_INSUFFICIENT_MEMORY);
                }
            }
        }
        0x49 => {
            // DOS 2+ - FREE MEMORY
            // ES = segment of block
            let seg = machine.cpu.get_r16(R::ES);
            if machine.dos.free(seg) {
                success(machine);
            } else {
                fail(machine, 0x09); // invalid memory block address
            }
        }
        0x4A => {
            // DOS 2+ - RESIZE MEMORY BLOCK
            // ES = segment, BX = new size in paragraphs
            let seg = machine.cpu.get_r16(R::ES);
            let paragraphs = machine.cpu.get_r16(R::BX);
            match machine.dos.resize(seg, paragraphs) {
                Ok(()) => success(machine),
                Err(largest) => {
                    machine.cpu.set_r16(R::BX, largest);
                    fail(machine, ERROR_INSUFFICIENT_MEMORY);
                }
            }
        }
        0x4B => {
            // DOS 2+ - EXEC - child processes are not supported
            let name = read_name(machine);
            debug!("int21 exec stub: {}", name);
            fail(machine, ERROR_FILE_NOT_FOUND);
        }
        0x4C => {
            // DOS 2+ - TERMINATE WITH RETURN CODE
            let al = machine.cpu.get_r8(R::AL);
            info!("int21 - TERMINATE WITH RETURN CODE {:02X}", al);
            machine.dos.return_code = al;
            machine.cpu.halt(HaltReason::ProgramExit);
        }
        0x4D => {
            // DOS 2+ - GET RETURN CODE
            // Return: AH = termination type (0 = normal), AL = code
            machine.cpu.set_r8(R::AH, 0);
            let code = machine.dos.return_code;
            machine.cpu.set_r8(R::AL, code);
        }
        0x4E => {
            // DOS 2+ - FIND FIRST MATCHING FILE
            // CX = attribute mask, DS:DX -> ASCIZ filespec with wildcards
            let spec = read_name(machine);
            let mask = machine.cpu.get_r8(R::CL);
            let (dir, pattern) = machine.dos.resolve_path(&spec);
            match machine.disk.list_dir(&dir) {
                Ok(entries) => {
                    let matches: Vec<DirEntry> = entries
                        .into_iter()
                        .filter(|e| e.name != "." && e.name != "..")
                        .filter(|e| mask & 0x10 != 0 || !e.is_directory())
                        .filter(|e| matches_wildcard(&pattern, &e.name))
                        .collect();
                    machine.dos.find = Some(FindState { matches, index: 0 });
                    next_find_match(machine, ERROR_FILE_NOT_FOUND);
                }
                Err(e) => fail(machine, fs_error_code(&e)),
            }
        }
        0x4F => {
            // DOS 2+ - FIND NEXT MATCHING FILE
            next_find_match(machine, ERROR_NO_MORE_FILES);
        }
        0x56 => {
            // DOS 2+ - RENAME FILE
            // DS:DX -> old name, ES:DI -> new name
            let old_spec = read_name(machine);
            let es = machine.cpu.get_r16(R::ES);
            let di = machine.cpu.get_r16(R::DI);
            let new_spec = machine.mmu.read_asciiz(es, di);
            let (old_dir, old_name) = machine.dos.resolve_path(&old_spec);
            let (new_dir, new_name) = machine.dos.resolve_path(&new_spec);
            let result = if old_dir == new_dir {
                machine.disk.rename_entry(&old_dir, &old_name, &new_name)
            } else {
                // a cross-directory rename moves the content
                machine
                    .disk
                    .read_file(&old_dir, &old_name)
                    .and_then(|data| machine.disk.write_file(&new_dir, &new_name, &data))
                    .and_then(|()| {
                        machine.disk.delete_entry(&old_dir, &old_name)?;
                        Ok(())
                    })
            };
            match result {
                Ok(()) => success(machine),
                Err(e) => fail(machine, fs_error_code(&e)),
            }
        }
        0x57 => {
            // DOS 2+ - GET/SET FILE DATE AND TIME
            // BX = handle; AL = 0 get (CX/DX out), AL = 1 set (CX/DX in)
            let handle = machine.cpu.get_r16(R::BX);
            match machine.cpu.get_r8(R::AL) {
                0x00 => match machine.dos.files.get(&handle) {
                    Some(file) => {
                        machine.cpu.set_r16(R::CX, file.time);
                        machine.cpu.set_r16(R::DX, file.date);
                        success(machine);
                    }
                    None => fail(machine, ERROR_INVALID_HANDLE),
                },
                0x01 => match machine.dos.files.get_mut(&handle) {
                    Some(file) => {
                        let time = machine.cpu.get_r16(R::CX);
                        let date = machine.cpu.get_r16(R::DX);
                        file.time = time;
                        file.date = date;
                        success(machine);
                    }
                    None => fail(machine, ERROR_INVALID_HANDLE),
                },
                _ => fail(machine, ERROR_INVALID_FUNCTION),
            }
        }
        _ => {
            debug!(
                "int21 (dos) error: unknown ah={:02X} ({}), ax={:04X}",
                ah,
                dos::describe_int21(ah),
                machine.cpu.get_r16(R::AX)
            );
        }
    }
}

fn success(machine: &mut Machine) {
    machine.cpu.regs.flags.carry = false;
}

fn fail(machine: &mut Machine, code: u16) {
    machine.cpu.regs.flags.carry = true;
    machine.cpu.set_r16(R::AX, code);
}

/// reads the ASCIZ filename argument at DS:DX
fn read_name(machine: &Machine) -> String {
    let ds = machine.cpu.get_r16(R::DS);
    let dx = machine.cpu.get_r16(R::DX);
    machine.mmu.read_asciiz(ds, dx)
}

fn console_out(machine: &mut Machine, ch: u8) {
    let page = machine.gpu.active_page;
    machine.gpu.teletype(&mut machine.mmu, page, ch);
}

/// rewinds IP over the INT opcode and suspends until a key arrives
fn key_wait(machine: &mut Machine) {
    machine.cpu.regs.ip = machine.cpu.regs.ip.wrapping_sub(INT_OPCODE_LEN);
    machine.cpu.halt(HaltReason::KeyWait);
}

/// consumes one key, or suspends and returns None
fn read_char_blocking(machine: &mut Machine) -> Option<u8> {
    match machine.keyboard.pop() {
        Some(key) => Some((key & 0xFF) as u8),
        None => {
            key_wait(machine);
            None
        }
    }
}

fn open_handle(machine: &mut Machine, dir: Vec<String>, name: String, data: Vec<u8>, mode: u8) -> u16 {
    let (time, date) = machine
        .disk
        .list_dir(&dir)
        .ok()
        .and_then(|entries| {
            let wanted = name.to_ascii_uppercase();
            entries.into_iter().find(|e| e.name == wanted).map(|e| (e.time, e.date))
        })
        .unwrap_or((0, 0));
    let handle = machine.dos.next_free_handle();
    machine.dos.files.insert(
        handle,
        OpenFile {
            name,
            dir,
            data,
            pos: 0,
            mode,
            modified: false,
            time,
            date,
        },
    );
    handle
}

/// reading handle 0 gathers a console line; the line ends CR LF
fn read_console_line(machine: &mut Machine, seg: u16, offs: u16, count: usize) {
    if !machine.keyboard.contains_ascii(0x0D) {
        key_wait(machine);
        return;
    }
    let mut line = Vec::new();
    while let Some(key) = machine.keyboard.pop() {
        let ch = (key & 0xFF) as u8;
        console_out(machine, ch);
        if ch == 0x0D {
            console_out(machine, 0x0A);
            line.push(0x0D);
            line.push(0x0A);
            break;
        }
        line.push(ch);
    }
    line.truncate(count);
    machine.mmu.write(seg, offs, &line);
    machine.cpu.set_r16(R::AX, line.len() as u16);
    success(machine);
}

/// deposits the next find-first/find-next match into the DTA
fn next_find_match(machine: &mut Machine, empty_code: u16) {
    let entry = match machine.dos.find.as_mut() {
        Some(state) if state.index < state.matches.len() => {
            let e = state.matches[state.index].clone();
            state.index += 1;
            e
        }
        _ => {
            fail(machine, empty_code);
            return;
        }
    };
    let (seg, offs) = machine.dos.dta;
    machine.mmu.write_u8(seg, offs.wrapping_add(0x15), entry.attr);
    machine.mmu.write_u16(seg, offs.wrapping_add(0x16), entry.time);
    machine.mmu.write_u16(seg, offs.wrapping_add(0x18), entry.date);
    machine.mmu.write_u32(seg, offs.wrapping_add(0x1A), entry.size);
    let name = entry.name.as_bytes();
    machine.mmu.write(seg, offs.wrapping_add(0x1E), name);
    machine.mmu.write_u8(seg, offs.wrapping_add(0x1E + name.len() as u16), 0);
    machine.cpu.set_r16(R::AX, 0);
    success(machine);
}
