//! Live voice call session client for the outreach dashboard.
//!
//! Negotiates a streaming audio channel with a remote conversational agent,
//! captures and encodes local audio in real time, schedules inbound audio
//! for gap-free playback, aggregates the live transcript, and tears
//! everything down reliably on every exit path.

pub mod audio;
pub mod call_log;
pub mod config;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod signaling;
pub mod transcript;
pub mod transport;
