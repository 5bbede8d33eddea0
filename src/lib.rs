//! Shelf application library
//!
//! Book-tracking module and its wiring to the hosted platform.

pub mod modules;

pub use modules::*;
