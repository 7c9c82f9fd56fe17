#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate static_assertions;

mod align;
mod addr;

pub mod bits;
pub mod cpu;
pub mod segments;
pub mod tss;
pub mod wait;

pub use self::align::*;
pub use self::addr::*;
