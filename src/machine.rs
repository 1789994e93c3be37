use std::num::Wrapping;
use std::time::{Duration, Instant};

use bincode::deserialize;
use log::{debug, info, warn};

use crate::bios::BIOS;
use crate::cpu::{
    Flags, HaltReason, Instruction, Invalid, Op, Parameter, RepeatMode, CPU, FLAG_IF, FLAG_TF, R,
};
use crate::dos::{self, Dos};
use crate::gpu::{GPU, MODE_TEXT_80_25};
use crate::hex::hex_bytes;
use crate::interrupt;
use crate::keyboard::Keyboard;
use crate::memory::MMU;
use crate::mouse::Mouse;
use crate::storage::{Fat12, KvStore, MemKvStore};

#[cfg(test)]
#[path = "./machine_test.rs"]
mod machine_test;

/// upper bound of interpreter steps per scheduler tick
pub const TICK_INSTRUCTION_BUDGET: usize = 100_000;

/// wall-clock budget per scheduler tick
pub const TICK_TIME_BUDGET: Duration = Duration::from_millis(14);

#[derive(Deserialize, Debug)]
struct ExeHeader {
    signature: u16,           // 0x5A4D == "MZ"
    bytes_in_last_block: u16, // padding info for exact data size
    blocks_in_file: u16,      // data size in 512-byte blocks
    num_relocs: u16,          // number of relocation items
    header_paragraphs: u16,   // header size in 16-byte paragraphs
    min_extra_paragraphs: u16,
    max_extra_paragraphs: u16,
    ss: u16,
    sp: u16,
    checksum: u16,
    ip: u16,
    cs: u16,
    reloc_table_offset: u16,
    overlay_number: u16,
}

/// The session record: owns the interpreter, the memory, the display,
/// the key buffer, the DOS personality and the floppy. One execution
/// context at a time; the scheduler drives it through `tick`.
pub struct Machine {
    pub mmu: MMU,
    pub cpu: CPU,
    pub bios: BIOS,
    pub gpu: GPU,
    pub keyboard: Keyboard,
    pub mouse: Mouse,
    pub disk: Fat12,
    pub dos: Dos,

    /// where the program image was loaded
    pub program_base: (u16, u16),
    pub program_length: usize,
}

impl Machine {
    pub fn default() -> Self {
        Machine::with_store(Box::new(MemKvStore::default()))
    }

    /// a machine whose clock reads are pinned (used by tests)
    pub fn deterministic() -> Self {
        let mut m = Machine::default();
        m.cpu = CPU::deterministic();
        m.disk.deterministic = true;
        m
    }

    pub fn with_store(store: Box<dyn KvStore>) -> Self {
        let mut mmu = MMU::default();
        let mut bios = BIOS::default();
        bios.init(&mut mmu);

        let mut gpu = GPU::default();
        gpu.set_mode(&mut mmu, MODE_TEXT_80_25);

        let mut disk = Fat12::new(store);
        if !disk.is_formatted() {
            // a blank backing store reads as a freshly formatted floppy
            disk.format("RETROBOX");
        }

        Machine {
            mmu,
            cpu: CPU::default(),
            bios,
            gpu,
            keyboard: Keyboard::default(),
            mouse: Mouse::default(),
            disk,
            dos: Dos::default(),
            program_base: (0, 0),
            program_length: 0,
        }
    }

    // --- program loading --------------------------------------------------

    /// recognises the image format by its first two bytes and loads it
    pub fn load_executable(&mut self, data: &[u8], name: &str, command_tail: &str) {
        let env_seg = self
            .dos
            .alloc(dos::paragraphs(256), 0)
            .expect("environment block");
        let psp_seg = self.dos.alloc_all(0).expect("program memory");
        self.dos.psp_segment = psp_seg;
        self.dos.env_segment = env_seg;
        self.dos.program_name = format!("A:\\{}", name.to_ascii_uppercase());
        self.dos.dta = (psp_seg, 0x80);

        dos::build_environment(&mut self.mmu, env_seg, &self.dos.program_name);
        dos::build_psp(&mut self.mmu, psp_seg, env_seg, command_tail);

        if data.len() > 2 && data[0] == b'M' && data[1] == b'Z' {
            self.load_exe(data, psp_seg);
        } else {
            self.load_com(data, psp_seg);
        }
        self.cpu.resume();
    }

    /// loads a headerless image at offset 0x100 of the program segment
    fn load_com(&mut self, data: &[u8], psp_seg: u16) {
        self.cpu.set_r16(R::CS, psp_seg);
        self.cpu.set_r16(R::DS, psp_seg);
        self.cpu.set_r16(R::ES, psp_seg);
        self.cpu.set_r16(R::SS, psp_seg);

        // offset of the last word available in the 64k segment; the zero
        // pushed under it sends a bare `ret` to the int 20h at PSP:0000
        self.cpu.set_r16(R::SP, 0xFFFE);
        self.mmu.write_u16(psp_seg, 0xFFFE, 0x0000);

        self.cpu.set_r16(R::AX, 0);
        self.cpu.set_r16(R::BX, 0);
        self.cpu.set_r16(R::CX, 0x00FF);
        self.cpu.set_r16(R::DX, psp_seg);
        self.cpu.set_r16(R::SI, 0x0100);
        self.cpu.set_r16(R::DI, 0xFFFE);
        self.cpu.set_r16(R::BP, 0x091C);

        self.cpu.regs.flags = Flags::new();
        self.cpu.regs.flags.interrupt = true;
        self.cpu.regs.ip = 0x0100;

        self.mmu.write(psp_seg, 0x0100, data);
        self.program_base = (psp_seg, 0x0100);
        self.program_length = data.len();
    }

    /// parses the MZ header and loads the image above the PSP
    fn load_exe(&mut self, data: &[u8], psp_seg: u16) {
        let hdr: ExeHeader = match deserialize(data) {
            Ok(hdr) => hdr,
            Err(e) => {
                warn!("load_exe: undecodable header: {}", e);
                self.cpu.fatal_error = true;
                return;
            }
        };
        debug!("load_exe header: {:?}", hdr);

        let code_offset = usize::from(hdr.header_paragraphs) * 16;
        let mut code_end = usize::from(hdr.blocks_in_file) * 512;
        if hdr.bytes_in_last_block > 0 {
            code_end -= 512 - usize::from(hdr.bytes_in_last_block);
        }
        let code_end = code_end.min(data.len());
        if code_offset >= code_end {
            warn!("load_exe: empty image [{:04X}, {:04X})", code_offset, code_end);
            self.cpu.fatal_error = true;
            return;
        }

        let load_seg = psp_seg + 0x10;
        self.mmu.write(load_seg, 0, &data[code_offset..code_end]);
        self.program_base = (load_seg, 0);
        self.program_length = code_end - code_offset;

        // each relocation entry names a word that gets the load segment added
        for i in 0..usize::from(hdr.num_relocs) {
            let entry = usize::from(hdr.reloc_table_offset) + i * 4;
            if entry + 4 > data.len() {
                break;
            }
            let offset = u16::from_le_bytes([data[entry], data[entry + 1]]);
            let segment = u16::from_le_bytes([data[entry + 2], data[entry + 3]]);
            let target_seg = (Wrapping(load_seg) + Wrapping(segment)).0;
            let val = self.mmu.read_u16(target_seg, offset);
            self.mmu.write_u16(target_seg, offset, (Wrapping(val) + Wrapping(load_seg)).0);
        }

        self.cpu.set_r16(R::CS, (Wrapping(hdr.cs) + Wrapping(load_seg)).0);
        self.cpu.regs.ip = hdr.ip;
        self.cpu.set_r16(R::SS, (Wrapping(hdr.ss) + Wrapping(load_seg)).0);
        self.cpu.set_r16(R::SP, hdr.sp);
        self.cpu.set_r16(R::DS, psp_seg);
        self.cpu.set_r16(R::ES, psp_seg);
        self.cpu.regs.flags = Flags::new();
        self.cpu.regs.flags.interrupt = true;
    }

    // --- scheduling -------------------------------------------------------

    /// one scheduler tick: runs the interpreter until it halts or the
    /// instruction/wall-clock budget is spent, then refreshes the
    /// timer tick count in the BIOS data area
    pub fn tick(&mut self) {
        if !self.cpu.halted && !self.cpu.fatal_error {
            let start = Instant::now();
            for i in 0..TICK_INSTRUCTION_BUDGET {
                self.execute_instruction();
                if self.cpu.halted || self.cpu.fatal_error {
                    break;
                }
                if !self.cpu.deterministic && i & 0xFF == 0 && start.elapsed() >= TICK_TIME_BUDGET {
                    break;
                }
            }
        }
        let ticks = (self.cpu.cycle_count / BIOS::CYCLES_PER_TICK) as u32;
        self.mmu.write_u32(BIOS::DATA_SEG, BIOS::DATA_TICK_COUNT, ticks);
    }

    /// true while the session should keep getting ticks
    pub fn is_running(&self) -> bool {
        !self.cpu.fatal_error
            && !(self.cpu.halted
                && (self.cpu.halt_reason == HaltReason::ProgramExit
                    || self.cpu.halt_reason == HaltReason::Hlt))
    }

    /// host key pump: queues a key and wakes a key-waiting interpreter
    pub fn push_key(&mut self, key: u16) {
        self.keyboard.push(key);
        if self.cpu.halted && self.cpu.halt_reason == HaltReason::KeyWait {
            self.cpu.resume();
        }
    }

    pub fn push_ascii(&mut self, ch: u8) {
        self.keyboard.push_ascii(ch);
        if self.cpu.halted && self.cpu.halt_reason == HaltReason::KeyWait {
            self.cpu.resume();
        }
    }

    /// renders the text framebuffer, one string per row
    pub fn render_text(&self) -> Vec<String> {
        self.gpu.render_text(&self.mmu)
    }

    /// executes n instructions of the cpu (used by tests)
    pub fn execute_instructions(&mut self, count: usize) {
        for _ in 0..count {
            self.execute_instruction();
            if self.cpu.halted || self.cpu.fatal_error {
                break;
            }
        }
    }

    pub fn execute_instruction(&mut self) {
        let cs = self.cpu.get_r16(R::CS);
        let ip = self.cpu.regs.ip;
        let op = self.cpu.decoder.get_instruction(&self.mmu, cs, ip);

        match op.command {
            Op::Uninitialized => {
                self.cpu.fatal_error = true;
                warn!(
                    "[{:04X}:{:04X}] ERROR: uninitialized op. {} instructions executed",
                    cs, ip, self.cpu.instruction_count
                );
            }
            _ => self.execute(&op),
        }
    }

    // --- interrupt trampoline ---------------------------------------------

    /// INT n / INT3 / INTO entry: pushes flags, clears IF and TF, pushes
    /// CS:IP, then consults the synthesised handler table. A registered
    /// handler runs to completion on the host and the frame is balanced
    /// afterwards, preserving any CS/IP the handler wrote. Without a
    /// handler, control transfers through the vector table in memory.
    pub fn interrupt(&mut self, int: u8) {
        let flags = self.cpu.regs.flags.u16();
        self.cpu.push16(&mut self.mmu, flags);
        self.cpu.regs.flags.interrupt = false;
        self.cpu.regs.flags.trap = false;
        let cs = self.cpu.get_r16(R::CS);
        let ip = self.cpu.regs.ip;
        self.cpu.push16(&mut self.mmu, cs);
        self.cpu.push16(&mut self.mmu, ip);

        if self.handle_interrupt(int) {
            let _ip = self.cpu.pop16(&mut self.mmu);
            let _cs = self.cpu.pop16(&mut self.mmu);
            let saved = self.cpu.pop16(&mut self.mmu);
            // interrupt and trap state come back from the saved word, the
            // arithmetic flags stay as the handler left them
            self.cpu.regs.flags.interrupt = saved & FLAG_IF != 0;
            self.cpu.regs.flags.trap = saved & FLAG_TF != 0;
        } else {
            let (seg, offs) = self.mmu.read_vec(int);
            self.cpu.set_r16(R::CS, seg);
            self.cpu.regs.ip = offs;
        }
    }

    /// the handler table: true when the vector is synthesised on the host
    fn handle_interrupt(&mut self, int: u8) -> bool {
        match int {
            0x10 => interrupt::int10::handle(self),
            0x11 => {
                // BIOS - GET EQUIPMENT LIST
                let eq = self.mmu.read_u16(BIOS::DATA_SEG, BIOS::DATA_EQUIPMENT_WORD);
                self.cpu.set_r16(R::AX, eq);
            }
            0x12 => {
                // BIOS - GET MEMORY SIZE
                // Return: AX = kilobytes of contiguous memory starting at absolute address 00000h
                self.cpu.set_r16(R::AX, BIOS::MEMORY_KB);
            }
            0x13 => interrupt::int13::handle(self),
            0x14 => {
                // SERIAL - stub, every function reports a timeout
                debug!("int14 (serial) stub, ah={:02X}", self.cpu.get_r8(R::AH));
                self.cpu.set_r8(R::AH, 0x80);
            }
            0x15 => interrupt::int15::handle(self),
            0x16 => interrupt::int16::handle(self),
            0x17 => {
                // PRINTER - stub, reports selected and ready
                debug!("int17 (printer) stub, ah={:02X}", self.cpu.get_r8(R::AH));
                self.cpu.set_r8(R::AH, 0x90);
            }
            0x19 => {
                // SYSTEM - BOOTSTRAP LOADER: read boot sector, jump 0000:7C00
                info!("int19 - bootstrap loader");
                let sector = self.disk.read_sector(0);
                self.mmu.write(0x0000, 0x7C00, &sector);
                self.cpu.set_r8(R::DL, 0); // boot drive A:
                self.cpu.set_r16(R::CS, 0x0000);
                self.cpu.regs.ip = 0x7C00;
            }
            0x1A => interrupt::int1a::handle(self),
            0x20 => {
                // DOS 1+ - TERMINATE PROGRAM
                info!("int20 - terminate program");
                self.cpu.halt(HaltReason::ProgramExit);
            }
            0x21 => interrupt::int21::handle(self),
            0x22 | 0x23 | 0x24 | 0x28 | 0x2F => {
                // termination address / ctrl-c / critical error / dos idle / multiplex
                debug!("int{:02X} stub, ax={:04X}", int, self.cpu.get_r16(R::AX));
            }
            0x27 => {
                // DOS 1+ - TERMINATE AND STAY RESIDENT
                info!("int27 - terminate and stay resident");
                self.cpu.halt(HaltReason::ProgramExit);
            }
            0x33 => interrupt::int33::handle(self),
            _ => return false,
        }
        true
    }

    // --- i/o ports --------------------------------------------------------

    /// read byte from I/O port; unhandled ports read as 0xFF
    pub fn in_u8(&mut self, port: u16) -> u8 {
        match port {
            0x0060 => {
                // keyboard controller data: scan code of the pending key
                match self.keyboard.peek() {
                    Some(key) => (key >> 8) as u8,
                    None => 0,
                }
            }
            0x0061 => 0x00, // system control port B
            0x03DA => {
                // CGA status: alternate the retrace bits so polling
                // loops make progress
                if self.cpu.cycle_count & 0x10 != 0 {
                    0x09
                } else {
                    0x00
                }
            }
            _ => {
                debug!("in_u8: unhandled port {:04X}", port);
                0xFF
            }
        }
    }

    pub fn in_u16(&mut self, port: u16) -> u16 {
        u16::from(self.in_u8(port)) | (u16::from(self.in_u8(port + 1)) << 8)
    }

    /// write byte to I/O port
    pub fn out_u8(&mut self, port: u16, data: u8) {
        match port {
            0x03D4 | 0x03D5 => {
                // CRTC index/data, accepted and ignored
            }
            _ => debug!("out_u8: unhandled port {:04X} = {:02X}", port, data),
        }
    }

    pub fn out_u16(&mut self, port: u16, data: u16) {
        self.out_u8(port, (data & 0xFF) as u8);
        self.out_u8(port + 1, (data >> 8) as u8);
    }

    // --- execution --------------------------------------------------------

    fn execute(&mut self, op: &Instruction) {
        self.cpu.regs.ip = (Wrapping(self.cpu.regs.ip) + Wrapping(u16::from(op.length))).0;
        self.cpu.instruction_count += 1;
        self.cpu.cycle_count += 8; // coarse: every instruction costs 8 cycles
        match op.command {
            Op::Invalid(ref bytes, ref reason) => {
                // stay decoder-synchronised, log and continue
                match reason {
                    Invalid::FPUOp => debug!("ignoring fpu op {}", hex_bytes(bytes)),
                    _ => debug!("ignoring unhandled op {}", hex_bytes(bytes)),
                }
            }
            Op::Aaa => {
                // ascii adjust after addition
                let al = self.cpu.get_r8(R::AL);
                if al & 0xF > 9 || self.cpu.regs.flags.adjust {
                    self.cpu.set_r8(R::AL, al.wrapping_add(6) & 0xF);
                    let ah = self.cpu.get_r8(R::AH);
                    self.cpu.set_r8(R::AH, ah.wrapping_add(1));
                    self.cpu.regs.flags.adjust = true;
                    self.cpu.regs.flags.carry = true;
                } else {
                    self.cpu.regs.flags.adjust = false;
                    self.cpu.regs.flags.carry = false;
                    self.cpu.set_r8(R::AL, al & 0xF);
                }
            }
            Op::Aad => {
                // AL = AL + AH * imm8, AH = 0
                let imm = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                let ax = u16::from(self.cpu.get_r8(R::AH)) * imm + u16::from(self.cpu.get_r8(R::AL));
                let al = ax as u8;
                self.cpu.set_r8(R::AL, al);
                self.cpu.set_r8(R::AH, 0);
                self.cpu.regs.flags.carry = false;
                self.cpu.regs.flags.overflow = false;
                self.cpu.regs.flags.adjust = false;
                self.cpu.regs.flags.set_szp_u8(usize::from(al));
            }
            Op::Aam => {
                // AH = AL / imm8, AL = AL % imm8
                let imm = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8;
                if imm == 0 {
                    return self.interrupt(0);
                }
                let al = self.cpu.get_r8(R::AL);
                self.cpu.set_r8(R::AH, al / imm);
                self.cpu.set_r8(R::AL, al % imm);
                self.cpu.regs.flags.carry = false;
                self.cpu.regs.flags.overflow = false;
                self.cpu.regs.flags.adjust = false;
                self.cpu.regs.flags.set_szp_u8(usize::from(al % imm));
            }
            Op::Aas => {
                // ascii adjust after subtraction
                let al = self.cpu.get_r8(R::AL);
                if al & 0xF > 9 || self.cpu.regs.flags.adjust {
                    self.cpu.set_r8(R::AL, al.wrapping_sub(6) & 0xF);
                    let ah = self.cpu.get_r8(R::AH);
                    self.cpu.set_r8(R::AH, ah.wrapping_sub(1));
                    self.cpu.regs.flags.adjust = true;
                    self.cpu.regs.flags.carry = true;
                } else {
                    self.cpu.regs.flags.adjust = false;
                    self.cpu.regs.flags.carry = false;
                    self.cpu.set_r8(R::AL, al & 0xF);
                }
            }
            Op::Adc8 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let carry = self.cpu.regs.flags.carry_val();
                let res = dst + src + carry;
                self.cpu.regs.flags.set_overflow_add_u8(res, src + carry, dst);
                self.cpu.regs.flags.set_adjust(res, src + carry, dst);
                self.cpu.regs.flags.set_carry_u8(res);
                self.cpu.regs.flags.set_szp_u8(res);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
            }
            Op::Adc16 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let carry = self.cpu.regs.flags.carry_val();
                let res = dst + src + carry;
                self.cpu.regs.flags.set_overflow_add_u16(res, src + carry, dst);
                self.cpu.regs.flags.set_adjust(res, src + carry, dst);
                self.cpu.regs.flags.set_carry_u16(res);
                self.cpu.regs.flags.set_szp_u16(res);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
            }
            Op::Add8 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = src + dst;
                self.cpu.regs.flags.set_overflow_add_u8(res, src, dst);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_carry_u8(res);
                self.cpu.regs.flags.set_szp_u8(res);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
            }
            Op::Add16 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = src + dst;
                self.cpu.regs.flags.set_overflow_add_u16(res, src, dst);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_carry_u16(res);
                self.cpu.regs.flags.set_szp_u16(res);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
            }
            Op::And8 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = dst & src;
                self.cpu.regs.flags.overflow = false;
                self.cpu.regs.flags.carry = false;
                self.cpu.regs.flags.set_szp_u8(res);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
            }
            Op::And16 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = dst & src;
                self.cpu.regs.flags.overflow = false;
                self.cpu.regs.flags.carry = false;
                self.cpu.regs.flags.set_szp_u16(res);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
            }
            Op::Bound => {
                // raise interrupt 5 when the signed index is outside [lower, upper]
                let idx = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16 as i16;
                let (seg, offs) = self.cpu.parameter_address(&op.params.src);
                let lower = self.mmu.read_u16(seg, offs) as i16;
                let upper = self.mmu.read_u16(seg, offs.wrapping_add(2)) as i16;
                if idx < lower || idx > upper {
                    self.interrupt(5);
                }
            }
            Op::CallNear => {
                let temp_ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let old_ip = self.cpu.regs.ip;
                self.cpu.push16(&mut self.mmu, old_ip);
                self.cpu.regs.ip = temp_ip as u16;
            }
            Op::CallFar => {
                let old_cs = self.cpu.get_r16(R::CS);
                let old_ip = self.cpu.regs.ip;
                self.cpu.push16(&mut self.mmu, old_cs);
                self.cpu.push16(&mut self.mmu, old_ip);
                let (seg, offs) = self.far_pointer(&op.params.dst);
                self.cpu.set_r16(R::CS, seg);
                self.cpu.regs.ip = offs;
            }
            Op::Cbw => {
                let ah = if self.cpu.get_r8(R::AL) & 0x80 != 0 { 0xFF } else { 0x00 };
                self.cpu.set_r8(R::AH, ah);
            }
            Op::Clc => self.cpu.regs.flags.carry = false,
            Op::Cld => self.cpu.regs.flags.direction = false,
            Op::Cli => self.cpu.regs.flags.interrupt = false,
            Op::Cmc => self.cpu.regs.flags.carry = !self.cpu.regs.flags.carry,
            Op::Cmp8 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                self.cpu.cmp8(dst, src);
            }
            Op::Cmp16 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                self.cpu.cmp16(dst, src);
            }
            Op::Cmpsb | Op::Cmpsw | Op::Lodsb | Op::Lodsw | Op::Movsb | Op::Movsw | Op::Scasb
            | Op::Scasw | Op::Stosb | Op::Stosw => self.execute_string(op),
            Op::Cwd => {
                let dx = if self.cpu.get_r16(R::AX) & 0x8000 != 0 { 0xFFFF } else { 0 };
                self.cpu.set_r16(R::DX, dx);
            }
            Op::Daa => {
                // decimal adjust AL after addition
                let old_al = self.cpu.get_r8(R::AL);
                let old_cf = self.cpu.regs.flags.carry;
                let mut al = old_al;
                if old_al & 0xF > 9 || self.cpu.regs.flags.adjust {
                    al = al.wrapping_add(6);
                    self.cpu.regs.flags.carry = old_cf || old_al > 0xF9;
                    self.cpu.regs.flags.adjust = true;
                } else {
                    self.cpu.regs.flags.adjust = false;
                }
                if old_al > 0x99 || old_cf {
                    al = al.wrapping_add(0x60);
                    self.cpu.regs.flags.carry = true;
                } else {
                    self.cpu.regs.flags.carry = false;
                }
                self.cpu.set_r8(R::AL, al);
                self.cpu.regs.flags.set_szp_u8(usize::from(al));
            }
            Op::Das => {
                // decimal adjust AL after subtraction
                let old_al = self.cpu.get_r8(R::AL);
                let old_cf = self.cpu.regs.flags.carry;
                let mut al = old_al;
                if old_al & 0xF > 9 || self.cpu.regs.flags.adjust {
                    al = al.wrapping_sub(6);
                    self.cpu.regs.flags.carry = old_cf || old_al < 6;
                    self.cpu.regs.flags.adjust = true;
                } else {
                    self.cpu.regs.flags.adjust = false;
                }
                if old_al > 0x99 || old_cf {
                    al = al.wrapping_sub(0x60);
                    self.cpu.regs.flags.carry = true;
                }
                self.cpu.set_r8(R::AL, al);
                self.cpu.regs.flags.set_szp_u8(usize::from(al));
            }
            Op::Dec8 => {
                // CF is preserved
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let src = 1;
                let res = (Wrapping(dst) - Wrapping(src)).0;
                self.cpu.regs.flags.set_overflow_sub_u8(res, src, dst);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_szp_u8(res);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
            }
            Op::Dec16 => {
                // CF is preserved
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let src = 1;
                let res = (Wrapping(dst) - Wrapping(src)).0;
                self.cpu.regs.flags.set_overflow_sub_u16(res, src, dst);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_szp_u16(res);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
            }
            Op::Div8 => {
                // AL = AX / op, AH = AX % op
                let ax = usize::from(self.cpu.get_r16(R::AX));
                let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                if op1 == 0 {
                    return self.interrupt(0);
                }
                let quotient = ax / op1;
                let remainder = ax % op1;
                if quotient > 0xFF {
                    return self.interrupt(0);
                }
                self.cpu.set_r8(R::AL, quotient as u8);
                self.cpu.set_r8(R::AH, remainder as u8);
                // the CF, OF, SF, ZF, AF and PF flags are undefined
            }
            Op::Div16 => {
                // AX = DX:AX / op, DX = DX:AX % op
                let num = (u32::from(self.cpu.get_r16(R::DX)) << 16) | u32::from(self.cpu.get_r16(R::AX));
                let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u32;
                if op1 == 0 {
                    return self.interrupt(0);
                }
                let quotient = num / op1;
                let remainder = num % op1;
                if quotient > 0xFFFF {
                    return self.interrupt(0);
                }
                self.cpu.set_r16(R::AX, quotient as u16);
                self.cpu.set_r16(R::DX, remainder as u16);
                // the CF, OF, SF, ZF, AF and PF flags are undefined
            }
            Op::Enter => {
                // make stack frame for procedure parameters
                let alloc_size = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                let nesting_level = self.cpu.read_parameter_value(&self.mmu, &op.params.src) & 0x1F;
                let bp = self.cpu.get_r16(R::BP);
                self.cpu.push16(&mut self.mmu, bp);
                let frame_temp = self.cpu.get_r16(R::SP);
                if nesting_level != 0 {
                    for _ in 1..nesting_level {
                        let bp = self.cpu.get_r16(R::BP).wrapping_sub(2);
                        self.cpu.set_r16(R::BP, bp);
                        let val = self.mmu.read_u16(self.cpu.get_r16(R::SS), bp);
                        self.cpu.push16(&mut self.mmu, val);
                    }
                    self.cpu.push16(&mut self.mmu, frame_temp);
                }
                self.cpu.set_r16(R::BP, frame_temp);
                let sp = self.cpu.get_r16(R::SP).wrapping_sub(alloc_size);
                self.cpu.set_r16(R::SP, sp);
            }
            Op::Hlt => {
                self.cpu.halt(HaltReason::Hlt);
            }
            Op::Idiv8 => {
                let ax = self.cpu.get_r16(R::AX) as i16;
                let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8 as i8;
                if op1 == 0 {
                    return self.interrupt(0);
                }
                // quotients truncate toward zero
                let quo = ax / i16::from(op1);
                let rem = ax % i16::from(op1);
                if quo != i16::from(quo as i8) {
                    return self.interrupt(0);
                }
                self.cpu.set_r8(R::AL, quo as u8);
                self.cpu.set_r8(R::AH, rem as u8);
                // the CF, OF, SF, ZF, AF and PF flags are undefined
            }
            Op::Idiv16 => {
                let num = ((u32::from(self.cpu.get_r16(R::DX)) << 16)
                    | u32::from(self.cpu.get_r16(R::AX))) as i32;
                let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16 as i16;
                if op1 == 0 {
                    return self.interrupt(0);
                }
                let quo = num / i32::from(op1);
                let rem = num % i32::from(op1);
                if quo != i32::from(quo as i16) {
                    return self.interrupt(0);
                }
                self.cpu.set_r16(R::AX, quo as u16);
                self.cpu.set_r16(R::DX, rem as u16);
                // the CF, OF, SF, ZF, AF and PF flags are undefined
            }
            Op::Imul8 => {
                // AX = AL * r/m8
                let f1 = self.cpu.get_r8(R::AL) as i8;
                let f2 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8 as i8;
                let ax = (i16::from(f1) * i16::from(f2)) as u16;
                self.cpu.set_r16(R::AX, ax);
                // CF and OF are set when the result does not fit in AL
                let fits = (ax & 0xFF80) == 0xFF80 || (ax & 0xFF80) == 0x0000;
                self.cpu.regs.flags.carry = !fits;
                self.cpu.regs.flags.overflow = !fits;
            }
            Op::Imul16 => {
                match op.params.count() {
                    1 => {
                        // DX:AX = AX * r/m16
                        let a = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16 as i16;
                        let product = i32::from(self.cpu.get_r16(R::AX) as i16) * i32::from(a);
                        self.cpu.set_r16(R::AX, product as u16);
                        self.cpu.set_r16(R::DX, (product >> 16) as u16);
                        let fits = product == i32::from(product as i16);
                        self.cpu.regs.flags.carry = !fits;
                        self.cpu.regs.flags.overflow = !fits;
                    }
                    _ => {
                        // r16 = r/m16 * imm  (or r16 = r16 * r/m16)
                        let a = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u16 as i16;
                        let b = if op.params.count() == 3 {
                            self.cpu.read_parameter_value(&self.mmu, &op.params.src2) as u16 as i16
                        } else {
                            self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16 as i16
                        };
                        let product = i32::from(a) * i32::from(b);
                        self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, product as u16);
                        let fits = product == i32::from(product as i16);
                        self.cpu.regs.flags.carry = !fits;
                        self.cpu.regs.flags.overflow = !fits;
                    }
                }
            }
            Op::In8 => {
                let port = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u16;
                let data = self.in_u8(port);
                self.cpu.set_r8(R::AL, data);
            }
            Op::In16 => {
                let port = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u16;
                let data = self.in_u16(port);
                self.cpu.set_r16(R::AX, data);
            }
            Op::Inc8 => {
                // CF is preserved
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let src = 1;
                let res = dst + src;
                self.cpu.regs.flags.set_overflow_add_u8(res, src, dst);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_szp_u8(res);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
            }
            Op::Inc16 => {
                // CF is preserved
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let src = 1;
                let res = dst + src;
                self.cpu.regs.flags.set_overflow_add_u16(res, src, dst);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_szp_u16(res);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
            }
            Op::Int => {
                let int = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8;
                self.interrupt(int);
            }
            Op::Int3 => self.interrupt(3),
            Op::Into => {
                if self.cpu.regs.flags.overflow {
                    self.interrupt(4);
                }
            }
            Op::Iret => {
                // pop IP, CS, flags; reserved flag bits read back normalised
                self.cpu.regs.ip = self.cpu.pop16(&mut self.mmu);
                let cs = self.cpu.pop16(&mut self.mmu);
                self.cpu.set_r16(R::CS, cs);
                let flags = self.cpu.pop16(&mut self.mmu);
                self.cpu.regs.flags.set_u16(flags);
            }
            Op::Ja => self.branch(op, !self.cpu.regs.flags.carry && !self.cpu.regs.flags.zero),
            Op::Jc => self.branch(op, self.cpu.regs.flags.carry),
            Op::Jcxz => self.branch(op, self.cpu.get_r16(R::CX) == 0),
            Op::Jg => self.branch(
                op,
                !self.cpu.regs.flags.zero && self.cpu.regs.flags.sign == self.cpu.regs.flags.overflow,
            ),
            Op::Jl => self.branch(op, self.cpu.regs.flags.sign != self.cpu.regs.flags.overflow),
            Op::Jna => self.branch(op, self.cpu.regs.flags.carry || self.cpu.regs.flags.zero),
            Op::Jnc => self.branch(op, !self.cpu.regs.flags.carry),
            Op::Jng => self.branch(
                op,
                self.cpu.regs.flags.zero || self.cpu.regs.flags.sign != self.cpu.regs.flags.overflow,
            ),
            Op::Jnl => self.branch(op, self.cpu.regs.flags.sign == self.cpu.regs.flags.overflow),
            Op::Jno => self.branch(op, !self.cpu.regs.flags.overflow),
            Op::Jns => self.branch(op, !self.cpu.regs.flags.sign),
            Op::Jnz => self.branch(op, !self.cpu.regs.flags.zero),
            Op::Jo => self.branch(op, self.cpu.regs.flags.overflow),
            Op::Jpe => self.branch(op, self.cpu.regs.flags.parity),
            Op::Jpo => self.branch(op, !self.cpu.regs.flags.parity),
            Op::Js => self.branch(op, self.cpu.regs.flags.sign),
            Op::Jz => self.branch(op, self.cpu.regs.flags.zero),
            Op::JmpShort | Op::JmpNear => {
                let temp_ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                self.cpu.regs.ip = temp_ip as u16;
            }
            Op::JmpFar => {
                let (seg, offs) = self.far_pointer(&op.params.dst);
                self.cpu.set_r16(R::CS, seg);
                self.cpu.regs.ip = offs;
            }
            Op::Lahf => {
                let flags = self.cpu.regs.flags.u16();
                self.cpu.set_r8(R::AH, (flags & 0xFF) as u8);
            }
            Op::Lds => {
                let (seg, offs) = self.cpu.parameter_address(&op.params.src);
                let val = self.mmu.read_u16(seg, offs);
                let new_seg = self.mmu.read_u16(seg, offs.wrapping_add(2));
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, val);
                self.cpu.set_r16(R::DS, new_seg);
            }
            Op::Lea => {
                let (_, offs) = self.cpu.parameter_address(&op.params.src);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, offs);
            }
            Op::Les => {
                let (seg, offs) = self.cpu.parameter_address(&op.params.src);
                let val = self.mmu.read_u16(seg, offs);
                let new_seg = self.mmu.read_u16(seg, offs.wrapping_add(2));
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, val);
                self.cpu.set_r16(R::ES, new_seg);
            }
            Op::Leave => {
                let bp = self.cpu.get_r16(R::BP);
                self.cpu.set_r16(R::SP, bp);
                let bp = self.cpu.pop16(&mut self.mmu);
                self.cpu.set_r16(R::BP, bp);
            }
            Op::Loop => {
                let cx = self.cpu.get_r16(R::CX).wrapping_sub(1);
                self.cpu.set_r16(R::CX, cx);
                if cx != 0 {
                    let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                    self.cpu.regs.ip = dst as u16;
                }
            }
            Op::Loope => {
                let cx = self.cpu.get_r16(R::CX).wrapping_sub(1);
                self.cpu.set_r16(R::CX, cx);
                if cx != 0 && self.cpu.regs.flags.zero {
                    let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                    self.cpu.regs.ip = dst as u16;
                }
            }
            Op::Loopne => {
                let cx = self.cpu.get_r16(R::CX).wrapping_sub(1);
                self.cpu.set_r16(R::CX, cx);
                if cx != 0 && !self.cpu.regs.flags.zero {
                    let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                    self.cpu.regs.ip = dst as u16;
                }
            }
            Op::Mov8 => {
                let data = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u8;
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, data);
            }
            Op::Mov16 => {
                let data = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u16;
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, data);
            }
            Op::Movsx16 => {
                let data = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u8 as i8;
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, data as i16 as u16);
            }
            Op::Movzx16 => {
                let data = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u8;
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, u16::from(data));
            }
            Op::Mul8 => {
                // AX = AL * r/m8
                let al = usize::from(self.cpu.get_r8(R::AL));
                let arg = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = al * arg;
                self.cpu.set_r16(R::AX, res as u16);
                let wide = res & 0xFF00 != 0;
                self.cpu.regs.flags.carry = wide;
                self.cpu.regs.flags.overflow = wide;
            }
            Op::Mul16 => {
                // DX:AX = AX * r/m16
                let ax = usize::from(self.cpu.get_r16(R::AX));
                let arg = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = ax * arg;
                self.cpu.set_r16(R::AX, (res & 0xFFFF) as u16);
                self.cpu.set_r16(R::DX, (res >> 16) as u16);
                let wide = res & 0xFFFF_0000 != 0;
                self.cpu.regs.flags.carry = wide;
                self.cpu.regs.flags.overflow = wide;
            }
            Op::Neg8 => {
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = (Wrapping(0usize) - Wrapping(dst)).0;
                self.cpu.regs.flags.carry = dst != 0;
                self.cpu.regs.flags.overflow = dst == 0x80;
                self.cpu.regs.flags.set_adjust(res, dst, 0);
                self.cpu.regs.flags.set_szp_u8(res);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
            }
            Op::Neg16 => {
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = (Wrapping(0usize) - Wrapping(dst)).0;
                self.cpu.regs.flags.carry = dst != 0;
                self.cpu.regs.flags.overflow = dst == 0x8000;
                self.cpu.regs.flags.set_adjust(res, dst, 0);
                self.cpu.regs.flags.set_szp_u16(res);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
            }
            Op::Nop | Op::Wait => {}
            Op::Not8 => {
                // flags are unaffected
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, !(dst as u8));
            }
            Op::Not16 => {
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, !(dst as u16));
            }
            Op::Or8 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = dst | src;
                self.cpu.regs.flags.overflow = false;
                self.cpu.regs.flags.carry = false;
                self.cpu.regs.flags.set_szp_u8(res);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
            }
            Op::Or16 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = dst | src;
                self.cpu.regs.flags.overflow = false;
                self.cpu.regs.flags.carry = false;
                self.cpu.regs.flags.set_szp_u16(res);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
            }
            Op::Out8 => {
                let port = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                let data = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u8;
                self.out_u8(port, data);
            }
            Op::Out16 => {
                let port = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                let data = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u16;
                self.out_u16(port, data);
            }
            Op::Pop16 => {
                let data = self.cpu.pop16(&mut self.mmu);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, data);
            }
            Op::Popa => {
                let di = self.cpu.pop16(&mut self.mmu);
                let si = self.cpu.pop16(&mut self.mmu);
                let bp = self.cpu.pop16(&mut self.mmu);
                let _sp = self.cpu.pop16(&mut self.mmu); // discarded
                let bx = self.cpu.pop16(&mut self.mmu);
                let dx = self.cpu.pop16(&mut self.mmu);
                let cx = self.cpu.pop16(&mut self.mmu);
                let ax = self.cpu.pop16(&mut self.mmu);
                self.cpu.set_r16(R::DI, di);
                self.cpu.set_r16(R::SI, si);
                self.cpu.set_r16(R::BP, bp);
                self.cpu.set_r16(R::BX, bx);
                self.cpu.set_r16(R::DX, dx);
                self.cpu.set_r16(R::CX, cx);
                self.cpu.set_r16(R::AX, ax);
            }
            Op::Popf => {
                let data = self.cpu.pop16(&mut self.mmu);
                self.cpu.regs.flags.set_u16(data);
            }
            Op::Push16 => {
                let data = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                self.cpu.push16(&mut self.mmu, data);
            }
            Op::Pusha => {
                let ax = self.cpu.get_r16(R::AX);
                let cx = self.cpu.get_r16(R::CX);
                let dx = self.cpu.get_r16(R::DX);
                let bx = self.cpu.get_r16(R::BX);
                let sp = self.cpu.get_r16(R::SP);
                let bp = self.cpu.get_r16(R::BP);
                let si = self.cpu.get_r16(R::SI);
                let di = self.cpu.get_r16(R::DI);
                self.cpu.push16(&mut self.mmu, ax);
                self.cpu.push16(&mut self.mmu, cx);
                self.cpu.push16(&mut self.mmu, dx);
                self.cpu.push16(&mut self.mmu, bx);
                self.cpu.push16(&mut self.mmu, sp);
                self.cpu.push16(&mut self.mmu, bp);
                self.cpu.push16(&mut self.mmu, si);
                self.cpu.push16(&mut self.mmu, di);
            }
            Op::Pushf => {
                let flags = self.cpu.regs.flags.u16();
                self.cpu.push16(&mut self.mmu, flags);
            }
            Op::Rcl8 | Op::Rcl16 | Op::Rcr8 | Op::Rcr16 | Op::Rol8 | Op::Rol16 | Op::Ror8
            | Op::Ror16 | Op::Sar8 | Op::Sar16 | Op::Shl8 | Op::Shl16 | Op::Shr8 | Op::Shr16 => {
                self.execute_shift(op)
            }
            Op::Retf => {
                self.cpu.regs.ip = self.cpu.pop16(&mut self.mmu);
                let cs = self.cpu.pop16(&mut self.mmu);
                self.cpu.set_r16(R::CS, cs);
            }
            Op::RetfImm16 => {
                self.cpu.regs.ip = self.cpu.pop16(&mut self.mmu);
                let cs = self.cpu.pop16(&mut self.mmu);
                self.cpu.set_r16(R::CS, cs);
                let imm = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                let sp = self.cpu.get_r16(R::SP).wrapping_add(imm);
                self.cpu.set_r16(R::SP, sp);
            }
            Op::Retn => {
                self.cpu.regs.ip = self.cpu.pop16(&mut self.mmu);
            }
            Op::RetnImm16 => {
                self.cpu.regs.ip = self.cpu.pop16(&mut self.mmu);
                let imm = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                let sp = self.cpu.get_r16(R::SP).wrapping_add(imm);
                self.cpu.set_r16(R::SP, sp);
            }
            Op::Sahf => {
                // SF, ZF, AF, PF and CF are loaded from AH
                let ah = u16::from(self.cpu.get_r8(R::AH));
                let keep = self.cpu.regs.flags.u16() & 0xFF00;
                self.cpu.regs.flags.set_u16(keep | ah);
            }
            Op::Salc => {
                let al = if self.cpu.regs.flags.carry { 0xFF } else { 0x00 };
                self.cpu.set_r8(R::AL, al);
            }
            Op::Sbb8 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src)
                    + self.cpu.regs.flags.carry_val();
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = (Wrapping(dst) - Wrapping(src)).0;
                self.cpu.regs.flags.set_overflow_sub_u8(res, src, dst);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_carry_u8(res & 0x1FF);
                self.cpu.regs.flags.set_szp_u8(res);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
            }
            Op::Sbb16 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src)
                    + self.cpu.regs.flags.carry_val();
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = (Wrapping(dst) - Wrapping(src)).0;
                self.cpu.regs.flags.set_overflow_sub_u16(res, src, dst);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_carry_u16(res & 0x1FFFF);
                self.cpu.regs.flags.set_szp_u16(res);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
            }
            Op::Stc => self.cpu.regs.flags.carry = true,
            Op::Std => self.cpu.regs.flags.direction = true,
            Op::Sti => self.cpu.regs.flags.interrupt = true,
            Op::Sub8 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = (Wrapping(dst) - Wrapping(src)).0;
                self.cpu.regs.flags.set_overflow_sub_u8(res, src, dst);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_carry_u8(res & 0x1FF);
                self.cpu.regs.flags.set_szp_u8(res);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
            }
            Op::Sub16 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = (Wrapping(dst) - Wrapping(src)).0;
                self.cpu.regs.flags.set_overflow_sub_u16(res, src, dst);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_carry_u16(res & 0x1FFFF);
                self.cpu.regs.flags.set_szp_u16(res);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
            }
            Op::Test8 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = dst & src;
                self.cpu.regs.flags.overflow = false;
                self.cpu.regs.flags.carry = false;
                self.cpu.regs.flags.set_szp_u8(res);
            }
            Op::Test16 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = dst & src;
                self.cpu.regs.flags.overflow = false;
                self.cpu.regs.flags.carry = false;
                self.cpu.regs.flags.set_szp_u16(res);
            }
            Op::Xchg8 => {
                let a = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8;
                let b = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u8;
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, b);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.src, a);
            }
            Op::Xchg16 => {
                let a = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                let b = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u16;
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, b);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.src, a);
            }
            Op::Xlat => {
                let offs = self
                    .cpu
                    .get_r16(R::BX)
                    .wrapping_add(u16::from(self.cpu.get_r8(R::AL)));
                let seg = self.cpu.segment(op.segment_prefix);
                let al = self.mmu.read_u8(seg, offs);
                self.cpu.set_r8(R::AL, al);
            }
            Op::Xor8 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = dst ^ src;
                self.cpu.regs.flags.overflow = false;
                self.cpu.regs.flags.carry = false;
                self.cpu.regs.flags.set_szp_u8(res);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
            }
            Op::Xor16 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = dst ^ src;
                self.cpu.regs.flags.overflow = false;
                self.cpu.regs.flags.carry = false;
                self.cpu.regs.flags.set_szp_u16(res);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
            }
            _ => {
                self.cpu.fatal_error = true;
                warn!("execute: unhandled op {:?}", op.command);
            }
        }
    }

    fn branch(&mut self, op: &Instruction, taken: bool) {
        if taken {
            let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
            self.cpu.regs.ip = dst as u16;
        }
    }

    /// resolves a far-pointer operand to (segment, offset)
    fn far_pointer(&self, param: &Parameter) -> (u16, u16) {
        match *param {
            Parameter::Ptr16Imm(seg, offs) => (seg, offs),
            _ => {
                let (seg, offs) = self.cpu.parameter_address(param);
                let target_offs = self.mmu.read_u16(seg, offs);
                let target_seg = self.mmu.read_u16(seg, offs.wrapping_add(2));
                (target_seg, target_offs)
            }
        }
    }

    // --- string primitives ------------------------------------------------

    /// runs a string primitive once, or CX-counted under a repeat prefix.
    /// rep/repe stops a CMPS/SCAS when ZF clears, repne when ZF sets.
    fn execute_string(&mut self, op: &Instruction) {
        match op.repeat {
            RepeatMode::None => self.string_once(op),
            RepeatMode::Rep | RepeatMode::Repe => loop {
                let cx = self.cpu.get_r16(R::CX);
                if cx == 0 {
                    break;
                }
                self.string_once(op);
                self.cpu.set_r16(R::CX, cx - 1);
                if uses_zf_predicate(&op.command) && !self.cpu.regs.flags.zero {
                    break;
                }
            },
            RepeatMode::Repne => loop {
                let cx = self.cpu.get_r16(R::CX);
                if cx == 0 {
                    break;
                }
                self.string_once(op);
                self.cpu.set_r16(R::CX, cx - 1);
                if uses_zf_predicate(&op.command) && self.cpu.regs.flags.zero {
                    break;
                }
            },
        }
    }

    fn string_once(&mut self, op: &Instruction) {
        let src_seg = self.cpu.segment(op.segment_prefix);
        let es = self.cpu.get_r16(R::ES);
        let si = self.cpu.get_r16(R::SI);
        let di = self.cpu.get_r16(R::DI);
        match op.command {
            Op::Movsb => {
                let b = self.mmu.read_u8(src_seg, si);
                self.mmu.write_u8(es, di, b);
                self.advance_si(1);
                self.advance_di(1);
            }
            Op::Movsw => {
                let w = self.mmu.read_u16(src_seg, si);
                self.mmu.write_u16(es, di, w);
                self.advance_si(2);
                self.advance_di(2);
            }
            Op::Cmpsb => {
                let dst = usize::from(self.mmu.read_u8(src_seg, si));
                let src = usize::from(self.mmu.read_u8(es, di));
                self.cpu.cmp8(dst, src);
                self.advance_si(1);
                self.advance_di(1);
            }
            Op::Cmpsw => {
                let dst = usize::from(self.mmu.read_u16(src_seg, si));
                let src = usize::from(self.mmu.read_u16(es, di));
                self.cpu.cmp16(dst, src);
                self.advance_si(2);
                self.advance_di(2);
            }
            Op::Lodsb => {
                let b = self.mmu.read_u8(src_seg, si);
                self.cpu.set_r8(R::AL, b);
                self.advance_si(1);
            }
            Op::Lodsw => {
                let w = self.mmu.read_u16(src_seg, si);
                self.cpu.set_r16(R::AX, w);
                self.advance_si(2);
            }
            Op::Stosb => {
                let al = self.cpu.get_r8(R::AL);
                self.mmu.write_u8(es, di, al);
                self.advance_di(1);
            }
            Op::Stosw => {
                let ax = self.cpu.get_r16(R::AX);
                self.mmu.write_u16(es, di, ax);
                self.advance_di(2);
            }
            Op::Scasb => {
                let al = usize::from(self.cpu.get_r8(R::AL));
                let src = usize::from(self.mmu.read_u8(es, di));
                self.cpu.cmp8(al, src);
                self.advance_di(1);
            }
            Op::Scasw => {
                let ax = usize::from(self.cpu.get_r16(R::AX));
                let src = usize::from(self.mmu.read_u16(es, di));
                self.cpu.cmp16(ax, src);
                self.advance_di(2);
            }
            _ => unreachable!(),
        }
    }

    fn advance_si(&mut self, stride: u16) {
        let si = self.cpu.get_r16(R::SI);
        let si = if self.cpu.regs.flags.direction {
            si.wrapping_sub(stride)
        } else {
            si.wrapping_add(stride)
        };
        self.cpu.set_r16(R::SI, si);
    }

    fn advance_di(&mut self, stride: u16) {
        let di = self.cpu.get_r16(R::DI);
        let di = if self.cpu.regs.flags.direction {
            di.wrapping_sub(stride)
        } else {
            di.wrapping_add(stride)
        };
        self.cpu.set_r16(R::DI, di);
    }

    // --- shifts and rotates -----------------------------------------------

    /// the shift/rotate dispatcher. the count is masked to 5 bits; OF has
    /// a defined value only for a count of 1.
    fn execute_shift(&mut self, op: &Instruction) {
        let count = (self.cpu.read_parameter_value(&self.mmu, &op.params.src) & 0x1F) as u32;
        if count == 0 {
            return;
        }
        let val = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u32;
        let wide = match op.command {
            Op::Rcl16 | Op::Rcr16 | Op::Rol16 | Op::Ror16 | Op::Sar16 | Op::Shl16 | Op::Shr16 => true,
            _ => false,
        };
        let bits: u32 = if wide { 16 } else { 8 };
        let msb = bits - 1;
        let mask: u32 = if wide { 0xFFFF } else { 0xFF };
        let flags = &mut self.cpu.regs.flags;

        let res: u32 = match op.command {
            Op::Rol8 | Op::Rol16 => {
                let c = count % bits;
                let res = ((val << c) | (val >> ((bits - c) % bits))) & mask;
                flags.carry = res & 1 != 0;
                if count == 1 {
                    flags.overflow = ((res >> msb) & 1 != 0) ^ flags.carry;
                }
                res
            }
            Op::Ror8 | Op::Ror16 => {
                let c = count % bits;
                let res = ((val >> c) | (val << ((bits - c) % bits))) & mask;
                flags.carry = res >> msb & 1 != 0;
                if count == 1 {
                    flags.overflow = ((res >> msb) ^ (res >> (msb - 1))) & 1 != 0;
                }
                res
            }
            Op::Rcl8 | Op::Rcl16 => {
                // rotate through carry, width+1 bit rotation
                let c = count % (bits + 1);
                let mut res = val;
                let mut cf = if flags.carry { 1u32 } else { 0 };
                for _ in 0..c {
                    let new_cf = (res >> msb) & 1;
                    res = ((res << 1) | cf) & mask;
                    cf = new_cf;
                }
                flags.carry = cf != 0;
                if count == 1 {
                    flags.overflow = ((res >> msb) & 1 != 0) ^ flags.carry;
                }
                res
            }
            Op::Rcr8 | Op::Rcr16 => {
                if count == 1 {
                    flags.overflow = ((val >> msb) & 1 != 0) ^ flags.carry;
                }
                let c = count % (bits + 1);
                let mut res = val;
                let mut cf = if flags.carry { 1u32 } else { 0 };
                for _ in 0..c {
                    let new_cf = res & 1;
                    res = (res >> 1) | (cf << msb);
                    cf = new_cf;
                }
                flags.carry = cf != 0;
                res
            }
            Op::Shl8 | Op::Shl16 => {
                let res = if count <= msb {
                    flags.carry = (val >> (bits - count)) & 1 != 0;
                    (val << count) & mask
                } else if count == bits {
                    flags.carry = val & 1 != 0;
                    0
                } else {
                    flags.carry = false;
                    0
                };
                if count == 1 {
                    flags.overflow = ((res >> msb) & 1 != 0) ^ flags.carry;
                }
                flags.set_szp_u16(res as usize);
                if !wide {
                    flags.set_sign_u8(res as usize);
                    flags.set_zero_u8(res as usize);
                }
                res
            }
            Op::Shr8 | Op::Shr16 => {
                let res = if count <= bits {
                    flags.carry = (val >> (count - 1)) & 1 != 0;
                    if count == bits { 0 } else { val >> count }
                } else {
                    flags.carry = false;
                    0
                };
                if count == 1 {
                    // OF is the most significant bit of the original operand
                    flags.overflow = (val >> msb) & 1 != 0;
                }
                flags.set_szp_u16(res as usize);
                if !wide {
                    flags.set_sign_u8(res as usize);
                    flags.set_zero_u8(res as usize);
                }
                res
            }
            Op::Sar8 | Op::Sar16 => {
                let sign = (val >> msb) & 1 != 0;
                let res = if count >= bits {
                    flags.carry = sign;
                    if sign { mask } else { 0 }
                } else {
                    flags.carry = (val >> (count - 1)) & 1 != 0;
                    let shifted = val >> count;
                    if sign {
                        (shifted | (mask << (bits - count))) & mask
                    } else {
                        shifted
                    }
                };
                if count == 1 {
                    flags.overflow = false;
                }
                flags.set_szp_u16(res as usize);
                if !wide {
                    flags.set_sign_u8(res as usize);
                    flags.set_zero_u8(res as usize);
                }
                res
            }
            _ => unreachable!(),
        };

        if wide {
            self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
        } else {
            self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
        }
    }
}

fn uses_zf_predicate(op: &Op) -> bool {
    match op {
        Op::Cmpsb | Op::Cmpsw | Op::Scasb | Op::Scasw => true,
        _ => false,
    }
}
