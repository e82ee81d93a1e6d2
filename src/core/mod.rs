//! Runtime pieces: host access, readers, snapshot assembly and the one-shot
//! executor.

pub mod collectors;
pub mod executor;
pub mod host;
pub mod snapshot;
