pub mod input;
pub mod ram;
pub mod reward;

#[cfg(feature = "nes")]
pub mod env;
