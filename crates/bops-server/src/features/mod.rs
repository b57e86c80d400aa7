//! Feature modules

pub mod sync;
