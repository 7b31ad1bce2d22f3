//! Pure helpers

pub mod ip;
