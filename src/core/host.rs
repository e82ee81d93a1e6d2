//! Access to the machine being probed.
//!
//! Readers never touch the filesystem or spawn processes directly; they go
//! through [`HostSource`]. [`SystemHost`] is the real Linux implementation,
//! and tests substitute canned data.

use std::{ffi::CString, io, path::Path};

use tokio::process::Command;
use tracing::trace;

/// Captured result of an external command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    /// Exit status was zero.
    pub success: bool,
    pub stdout: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        CommandOutput {
            success: true,
            stdout: stdout.into(),
        }
    }

    pub fn failed() -> Self {
        CommandOutput::default()
    }
}

/// Capacity figures for one mounted filesystem, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FsStats {
    pub total_bytes: u64,
    /// Space available to unprivileged users (`f_bavail`).
    pub available_bytes: u64,
}

#[async_trait::async_trait]
pub trait HostSource: Send + Sync + 'static {
    async fn read_to_string(&self, path: &str) -> io::Result<String>;

    /// File names of the entries in `path`, in no particular order.
    async fn list_dir(&self, path: &str) -> io::Result<Vec<String>>;

    /// Runs `program` with `args` and captures its stdout.
    ///
    /// An `Err` means the program could not be started; a non-zero exit is
    /// reported through [`CommandOutput::success`].
    async fn run_command(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput>;

    async fn fs_stats(&self, path: &str) -> io::Result<FsStats>;

    fn logical_cpus(&self) -> usize;
}

/// The local Linux host.
#[derive(Debug, Clone, Default)]
pub struct SystemHost;

impl SystemHost {
    pub fn new() -> Self {
        SystemHost
    }
}

#[async_trait::async_trait]
impl HostSource for SystemHost {
    async fn read_to_string(&self, path: &str) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn list_dir(&self, path: &str) -> io::Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        Ok(names)
    }

    async fn run_command(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput> {
        // Keep number formatting stable regardless of the caller's locale.
        let output = Command::new(program)
            .args(args)
            .env("LC_ALL", "C")
            .kill_on_drop(true)
            .output()
            .await?;

        trace!(program, status = ?output.status, "Command finished");

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }

    async fn fs_stats(&self, path: &str) -> io::Result<FsStats> {
        let c_path = CString::new(path)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let result = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }

        let block_size = stat.f_frsize as u64;
        Ok(FsStats {
            total_bytes: (stat.f_blocks as u64).wrapping_mul(block_size),
            available_bytes: (stat.f_bavail as u64).wrapping_mul(block_size),
        })
    }

    fn logical_cpus(&self) -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Name under which this machine publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    hostname: String,
}

impl HostIdentity {
    /// Uses `configured` unless it is `"auto"`, in which case the kernel
    /// hostname is looked up.
    pub fn resolve(configured: &str) -> io::Result<Self> {
        if !configured.eq_ignore_ascii_case("auto") {
            return Ok(Self::from_name(configured));
        }

        let name = hostname::get()?.into_string().map_err(|raw| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("hostname is not valid UTF-8: {:?}", raw),
            )
        })?;

        if name.trim().is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "system hostname is empty",
            ));
        }

        Ok(Self::from_name(&name))
    }

    pub fn from_name(name: &str) -> Self {
        HostIdentity {
            hostname: name.trim().to_string(),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }
}

/// Last path component, used when logging sysfs paths.
pub(crate) fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}
