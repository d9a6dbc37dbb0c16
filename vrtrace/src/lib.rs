//! Userspace side of the vRouter tracer: the Sandesh codec used to talk to
//! the kernel module, the raw decoder for structs captured by the kernel hooks,
//! and the consumer that turns capture events into records.

pub mod catalog;
pub mod config;
pub mod message;
pub mod protocol;
pub mod raw;
pub mod request;
pub mod tracer;
