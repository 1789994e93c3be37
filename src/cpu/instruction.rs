use std::fmt;

use crate::cpu::op::Op;
use crate::cpu::parameter::{Parameter, ParameterSet};
use crate::cpu::segment::Segment;
use crate::hex::hex_bytes;

#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub command: Op,
    pub params: ParameterSet,
    pub length: u8,
    // op prefixes
    pub segment_prefix: Segment, // segment override opcode
    pub repeat: RepeatMode,      // REPcc prefix
    pub lock: bool,              // LOCK prefix
}

impl Instruction {
    pub fn new(op: Op) -> Self {
        Instruction {
            command: op,
            params: ParameterSet {
                dst: Parameter::None,
                src: Parameter::None,
                src2: Parameter::None,
            },
            segment_prefix: Segment::Default,
            repeat: RepeatMode::None,
            lock: false,
            length: 0,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = String::new();
        match self.repeat {
            RepeatMode::None => {}
            _ => {
                s.push_str(self.repeat.as_str());
                s.push(' ');
            }
        }
        s.push_str(&format!("{}", self.command));
        match self.params.count() {
            0 => {}
            1 => s.push_str(&format!(" {}", self.params.dst)),
            2 => s.push_str(&format!(" {}, {}", self.params.dst, self.params.src)),
            _ => s.push_str(&format!(
                " {}, {}, {}",
                self.params.dst, self.params.src, self.params.src2
            )),
        }
        write!(f, "{}", s)
    }
}

/// an Instruction together with its location and raw bytes
#[derive(Debug, PartialEq)]
pub struct InstructionInfo {
    pub segment: u16,
    pub offset: u16,
    pub bytes: Vec<u8>,
    pub instruction: Instruction,
}

impl fmt::Display for InstructionInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{:04X}:{:04X}] {:16} {}",
            self.segment,
            self.offset,
            hex_bytes(&self.bytes),
            self.instruction,
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RepeatMode {
    None,
    Rep,
    Repe,  // alias repz
    Repne, // alias repnz
}

impl RepeatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RepeatMode::None => "",
            RepeatMode::Rep => "rep",
            RepeatMode::Repe => "repe",
            RepeatMode::Repne => "repne",
        }
    }
}
