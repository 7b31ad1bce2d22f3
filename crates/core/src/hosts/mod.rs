//! Local host storage ports

pub mod ports;
