//! Remote command execution.
//!
//! [`RemoteExecutor`] is the only way the harness touches a host. A command
//! either succeeds or it does not; a broken ssh connection, a missing binary
//! and a non-zero exit all look the same to callers.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use schedbench_core::hosts::same_host_name;

/// Boxed future alias for executor results.
pub type ExecFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Runs commands on named hosts.
pub trait RemoteExecutor: Send + Sync {
    /// Name of the machine the harness itself runs on.
    fn local_host(&self) -> &str;

    /// Whether `host` is the local machine (no transport needed).
    fn is_local(&self, host: &str) -> bool {
        host == self.local_host()
    }

    /// Run `argv` on `host`. Returns `true` on a zero exit status.
    fn execute<'a>(&'a self, host: &'a str, argv: &'a [String]) -> ExecFuture<'a, bool>;

    /// Run `argv` on `host` and return its stdout, or `None` on failure.
    fn capture<'a>(&'a self, host: &'a str, argv: &'a [String]) -> ExecFuture<'a, Option<String>>;
}

/// Executes locally for the local host and through `ssh` otherwise.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    local_host: String,
    aliases: Vec<String>,
    ssh_options: Vec<String>,
    timeout: Option<Duration>,
}

impl SshExecutor {
    pub fn new(local_host: impl Into<String>) -> Self {
        Self {
            local_host: local_host.into(),
            aliases: Vec::new(),
            ssh_options: Vec::new(),
            timeout: None,
        }
    }

    /// Use this machine's host name as the local host.
    pub fn from_environment() -> Self {
        Self::new(gethostname::gethostname().to_string_lossy().into_owned())
    }

    /// Other host list names that also refer to this machine.
    pub fn with_local_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Extra arguments placed before the host on every ssh invocation.
    pub fn with_ssh_options(mut self, options: Vec<String>) -> Self {
        self.ssh_options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The full argv actually spawned for `argv` on `host`.
    pub fn wrap(&self, host: &str, argv: &[String]) -> Vec<String> {
        if self.is_local(host) {
            return argv.to_vec();
        }
        let mut wrapped = Vec::with_capacity(argv.len() + self.ssh_options.len() + 2);
        wrapped.push("ssh".to_string());
        wrapped.extend(self.ssh_options.iter().cloned());
        wrapped.push(host.to_string());
        wrapped.extend(argv.iter().cloned());
        wrapped
    }

    fn command(&self, host: &str, argv: &[String]) -> Option<Command> {
        let wrapped = self.wrap(host, argv);
        let (program, args) = wrapped.split_first()?;
        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
        Some(cmd)
    }

    async fn run_status(&self, host: &str, argv: &[String]) -> bool {
        let Some(mut cmd) = self.command(host, argv) else {
            return false;
        };
        cmd.stdout(Stdio::null()).stderr(Stdio::null());

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.status()).await {
                Ok(status) => status,
                Err(_) => {
                    debug!(%host, command = %argv.join(" "), "command timed out");
                    return false;
                }
            },
            None => cmd.status().await,
        };

        match status {
            Ok(status) if status.success() => true,
            Ok(status) => {
                debug!(%host, command = %argv.join(" "), %status, "command failed");
                false
            }
            Err(e) => {
                debug!(%host, command = %argv.join(" "), error = %e, "command could not be spawned");
                false
            }
        }
    }

    async fn run_capture(&self, host: &str, argv: &[String]) -> Option<String> {
        let mut cmd = self.command(host, argv)?;
        cmd.stdout(Stdio::piped()).stderr(Stdio::null());

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output()).await.ok()?,
            None => cmd.output().await,
        };

        match output {
            Ok(out) if out.status.success() => {
                Some(String::from_utf8_lossy(&out.stdout).into_owned())
            }
            Ok(out) => {
                debug!(%host, command = %argv.join(" "), status = %out.status, "command failed");
                None
            }
            Err(e) => {
                debug!(%host, command = %argv.join(" "), error = %e, "command could not be spawned");
                None
            }
        }
    }
}

impl RemoteExecutor for SshExecutor {
    fn local_host(&self) -> &str {
        &self.local_host
    }

    fn is_local(&self, host: &str) -> bool {
        host == "localhost"
            || same_host_name(host, &self.local_host)
            || self.aliases.iter().any(|a| a == host)
    }

    fn execute<'a>(&'a self, host: &'a str, argv: &'a [String]) -> ExecFuture<'a, bool> {
        Box::pin(self.run_status(host, argv))
    }

    fn capture<'a>(&'a self, host: &'a str, argv: &'a [String]) -> ExecFuture<'a, Option<String>> {
        Box::pin(self.run_capture(host, argv))
    }
}

/// Recording executor for tests.
#[cfg(test)]
pub(crate) mod mock {
    use std::sync::Mutex;

    use super::*;

    /// Records every call. A command fails if any of its arguments
    /// contains one of the `fail_on` needles.
    #[derive(Default)]
    pub(crate) struct MockExecutor {
        pub calls: Mutex<Vec<(String, Vec<String>)>>,
        pub fail_on: Vec<String>,
        pub capture_output: Option<String>,
    }

    impl MockExecutor {
        pub fn failing_on(needles: &[&str]) -> Self {
            Self {
                fail_on: needles.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<(String, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }

        /// Calls whose argv starts with `prefix`.
        pub fn calls_starting_with(&self, prefix: &[&str]) -> Vec<(String, Vec<String>)> {
            self.calls()
                .into_iter()
                .filter(|(_, argv)| {
                    argv.len() >= prefix.len() && argv.iter().zip(prefix).all(|(a, p)| a == p)
                })
                .collect()
        }

        fn record(&self, host: &str, argv: &[String]) -> bool {
            self.calls
                .lock()
                .unwrap()
                .push((host.to_string(), argv.to_vec()));
            !argv
                .iter()
                .any(|a| self.fail_on.iter().any(|needle| a.contains(needle.as_str())))
        }
    }

    impl RemoteExecutor for MockExecutor {
        fn local_host(&self) -> &str {
            "local"
        }

        fn execute<'a>(&'a self, host: &'a str, argv: &'a [String]) -> ExecFuture<'a, bool> {
            let ok = self.record(host, argv);
            Box::pin(async move { ok })
        }

        fn capture<'a>(
            &'a self,
            host: &'a str,
            argv: &'a [String],
        ) -> ExecFuture<'a, Option<String>> {
            let ok = self.record(host, argv);
            let out = if ok { self.capture_output.clone() } else { None };
            Box::pin(async move { out })
        }
    }
}
