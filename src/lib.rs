#![allow(dead_code)]
#![allow(clippy::single_match)]
#![allow(clippy::verbose_bit_mask)]
#![allow(clippy::cognitive_complexity)]

#[macro_use]
extern crate serde_derive;

#[cfg(test)]
extern crate pretty_assertions;

pub mod bios;
pub mod codepage;
pub mod cpu;
pub mod dos;
pub mod gpu;
pub mod hex;
pub mod interrupt;
pub mod keyboard;
pub mod machine;
pub mod memory;
pub mod mouse;
pub mod storage;
