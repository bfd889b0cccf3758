//! Listener registry and the bounded handler worker pool

pub mod dispatcher;
pub mod job;
pub mod listener;

pub use dispatcher::{DispatcherConfig, EventDispatcher};
pub use job::{DispatchJob, JobHandle, JobId};
pub use listener::{Listener, ListenerId};
