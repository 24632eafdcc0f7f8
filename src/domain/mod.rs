//! Domain types and the ports the application layer depends on.

pub mod account;
pub mod checksum;
pub mod money;
pub mod order;
pub mod ports;
