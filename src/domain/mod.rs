//! Domain types and the store ports the application layer depends on.

pub mod account;
pub mod ports;
