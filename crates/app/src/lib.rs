#![deny(unsafe_code)]

//! Interactive intake assistant: a terminal chat that streams assistant
//! replies, spots a prepared ticket payload in the transcript, and files it
//! with the configured issue tracker exactly once per conversation.

pub mod app;
pub mod render;
pub mod settings;

pub use app::{App, AppError, AppResult, TurnSink};
pub use render::{EchoOutput, TranscriptEcho};
pub use settings::{Settings, SettingsError, SettingsResult};
