use thiserror::Error;

/// Errors raised by the sensor readers.
///
/// A reader returns one of these only when a baseline metric cannot be
/// produced at all. Optional sensors (temperature, voltage) report
/// `Reading::Unavailable` instead, so an error here always aborts the run.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Failed to read a file from disk.
    #[error("Failed to read file {path}")]
    FileRead {
        /// Path that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A value was found but could not be turned into a number.
    #[error("Failed to parse {metric} from {location}: {reason}")]
    ParseError {
        /// Name of the value being parsed (e.g. `load average`).
        metric: String,
        /// File or command the value came from.
        location: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Data did not have the expected shape.
    #[error("Invalid format in {location}: {reason}")]
    InvalidFormat {
        /// File or command whose output was malformed.
        location: String,
        /// Expected shape versus what was found.
        reason: String,
    },

    /// A low-level system call (statvfs) failed.
    #[error("System call failed: {syscall} - {reason}")]
    SystemCall {
        /// Name of the call, e.g. `statvfs`.
        syscall: String,
        /// OS error description.
        reason: String,
    },

    /// The command could not be spawned at all.
    #[error("Command '{command}' failed: {source}")]
    CommandExecution {
        /// Program name.
        command: String,
        /// Spawn error (usually `NotFound`).
        #[source]
        source: std::io::Error,
    },

    /// The command ran but exited unsuccessfully.
    #[error("Command '{command}' exited unsuccessfully")]
    CommandFailed {
        /// Program name.
        command: String,
    },
}
