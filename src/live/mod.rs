//! Client for the live conversational endpoint
//!
//! - `messages`: JSON wire shapes for setup, realtime input, and server
//!   content events
//! - `client`: websocket transport delivering ordered session events

pub mod client;
pub mod messages;

pub use client::{LiveClient, SessionEvent};
pub use messages::{Setup, ServerContent, ServerMessage};
