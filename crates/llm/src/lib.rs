#![deny(unsafe_code)]

//! Streaming transport adapter over the conversational backend.
//!
//! Exposes the backend as an ordered, cancellable sequence of
//! append-only content updates; see [`provider::ProviderEventStream`].

pub mod provider;
pub mod rig_adapter;

pub use provider::{
    DEFAULT_OPENAI_MODEL, LlmProvider, ProviderConfig, ProviderError, ProviderEventStream,
    ProviderMessage, ProviderResult, ProviderStreamHandle, ProviderWorker, StreamRequest,
    make_event_stream,
};
pub use rig_adapter::{RIG_OPENAI_PROVIDER_ID, RigProviderAdapter};
