// per-vector service handlers, dispatched by the machine's trampoline

pub mod int10;
pub mod int13;
pub mod int15;
pub mod int16;
pub mod int1a;
pub mod int21;
pub mod int33;
