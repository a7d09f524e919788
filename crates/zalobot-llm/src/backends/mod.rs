//! Provider backends.
//!
//! Real Gemini/Groq transports live outside this workspace. The scripted
//! backend replays canned attempts and is what tests and the CLI drive.

pub mod scripted;

pub use scripted::{OpenRecord, ScriptStep, ScriptedAttempt, ScriptedProvider};
