//! PrintEz core: print job lifecycle tracking and queue synchronization for
//! a shared bank of printers.

pub mod backend;
pub mod config;
pub mod engine;
pub mod events;
pub mod job;
pub mod notify;
pub mod persist;
pub mod registry;
pub mod scheduler;
pub mod sync;
pub mod upload;
pub mod web;

pub use engine::Engine;
pub use job::{JobState, PrintJob};
pub use registry::JobRegistry;
