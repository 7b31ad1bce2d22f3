//! Remote system ports

pub mod ports;
