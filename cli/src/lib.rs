//! Appstash CLI - store application versions and relocate their images.

pub mod commands;
pub mod output;
