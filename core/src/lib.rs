//! Shellbridge core: PTY engine, screen emulator, session registry, chat formatter,
//! output sinks, admission/auth, daemon supervisor, bot bridge. No HTTP, no desktop UI.

pub mod auth;
pub mod bot;
pub mod chrome_filter;
pub mod config;
pub mod daemon;
pub mod format;
pub mod log;
pub mod platform;
pub mod pty;
pub mod registry;
pub mod screen;
pub mod sink;
pub mod streamer;
