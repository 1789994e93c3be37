// these modules are re-exported as a single module

pub use self::kv::*;
mod kv;

pub use self::cache::*;
mod cache;

pub use self::fat12::*;
mod fat12;
