//! Bounded-concurrency job pipeline.
//!
//! Triggers flow through the deduplicator, are validated and acknowledged,
//! pass the admission gate, and then run detached under the backoff
//! executor until they are delivered or fail.

pub mod admission;
pub mod backoff;
pub mod dedup;
pub mod dispatcher;

pub use admission::{AdmissionGate, SlotGuard};
pub use backoff::{
    AttemptOutcome, BackoffExecutor, RetryAttempt, RetryClassify, RetryError, RetryPolicy,
};
pub use dedup::EventDeduplicator;
pub use dispatcher::{
    ACK_TIMEOUT, DispatchError, JobDispatcher, JobTicket, MAX_PROMPT_CHARS, validate,
};
