//! Process-based port discovery.
//!
//! Runs an external command (through `sh -c`) and scans its standard output
//! for Docker-style port mapping lines:
//!
//! ```text
//! 80/tcp -> 0.0.0.0:49153
//! ```
//!
//! Every matching line contributes its host port to the discovered set;
//! lines that don't match are ignored. Text on standard error is surfaced
//! as a diagnostic but is not by itself a failure; a non-zero exit status is.

use super::error::{DiscoveryError, DiscoveryResult};
use super::PortDiscovery;
use crate::ports::PortSet;
use regex::Regex;
use std::process::Stdio;
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::{debug, warn};

/// Matcher for `<containerPort>/<proto> -> <ip>:<hostPort>` lines.
fn port_line() -> &'static Regex {
    static PORT_LINE: OnceLock<Regex> = OnceLock::new();
    PORT_LINE.get_or_init(|| {
        Regex::new(r"^\d+/\w+ -> \d+\.\d+\.\d+\.\d+:(\d+)$").expect("port line regex is valid")
    })
}

/// Discovery provider that shells out and scans command output.
#[derive(Debug, Clone)]
pub struct CommandDiscovery {
    /// Shell command line to run.
    command: String,
    /// Ports unioned into every result regardless of what was scanned.
    always_forward: PortSet,
}

impl CommandDiscovery {
    /// Create a provider running the given shell command line.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            always_forward: PortSet::new(),
        }
    }

    /// Union the given ports into every discovery result.
    pub fn with_always_forward(mut self, ports: PortSet) -> Self {
        self.always_forward = ports;
        self
    }

    /// The configured command line.
    pub fn command(&self) -> &str {
        &self.command
    }
}

impl PortDiscovery for CommandDiscovery {
    async fn discover(&self) -> DiscoveryResult<PortSet> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(DiscoveryError::Spawn)?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            // Diagnostic only; the command may still have succeeded.
            warn!("Discovery command stderr: {}", stderr);
        }

        if !output.status.success() {
            return Err(DiscoveryError::CommandFailed {
                code: output.status.code(),
                stderr: stderr.to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut ports = parse_port_lines(&stdout);
        debug!("Discovery command reported {} port(s)", ports.len());
        ports.extend(self.always_forward.iter());
        Ok(ports)
    }
}

/// Scan text for port mapping lines and collect the host ports.
///
/// Lines that don't match the pattern are skipped, not an error.
pub fn parse_port_lines(text: &str) -> PortSet {
    let mut ports = PortSet::new();
    for line in text.lines() {
        let line = line.trim();
        if let Some(caps) = port_line().captures(line) {
            match caps[1].parse::<u16>() {
                Ok(port) if port != 0 => {
                    ports.insert(port);
                }
                _ => debug!("Skipping out-of-range host port in line: {}", line),
            }
        }
    }
    ports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collects_host_ports_and_skips_garbage() {
        let text = "80/tcp -> 0.0.0.0:49153\ngarbage line\n";
        let ports = parse_port_lines(text);
        let expected: PortSet = [49153].into_iter().collect();
        assert_eq!(ports, expected);
    }

    #[test]
    fn test_parse_multiple_protocols_and_duplicates() {
        let text = "\
            80/tcp -> 0.0.0.0:49153\n\
            53/udp -> 127.0.0.1:5353\n\
            80/tcp -> 0.0.0.0:49153\n";
        let ports = parse_port_lines(text);
        let expected: PortSet = [49153, 5353].into_iter().collect();
        assert_eq!(ports, expected);
    }

    #[test]
    fn test_parse_ignores_surrounding_whitespace() {
        let ports = parse_port_lines("   8080/tcp -> 0.0.0.0:32768   \n");
        assert!(ports.contains(32768));
    }

    #[test]
    fn test_parse_rejects_out_of_range_ports() {
        let ports = parse_port_lines("80/tcp -> 0.0.0.0:0\n80/tcp -> 0.0.0.0:99999\n");
        assert!(ports.is_empty());
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse_port_lines("").is_empty());
    }

    #[tokio::test]
    async fn test_discover_from_echo() {
        let discovery =
            CommandDiscovery::new("printf '80/tcp -> 0.0.0.0:49153\\ngarbage line\\n'");
        let ports = discovery.discover().await.unwrap();
        let expected: PortSet = [49153].into_iter().collect();
        assert_eq!(ports, expected);
    }

    #[tokio::test]
    async fn test_discover_nonzero_exit_is_failure() {
        let discovery = CommandDiscovery::new("exit 3");
        let err = discovery.discover().await.unwrap_err();
        match err {
            DiscoveryError::CommandFailed { code, .. } => assert_eq!(code, Some(3)),
            other => panic!("Expected CommandFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_discover_stderr_alone_is_not_failure() {
        let discovery = CommandDiscovery::new(
            "printf '80/tcp -> 0.0.0.0:49153\\n'; echo 'warning: slow daemon' >&2",
        );
        let ports = discovery.discover().await.unwrap();
        assert!(ports.contains(49153));
    }

    #[tokio::test]
    async fn test_always_forward_unioned_into_result() {
        let always: PortSet = [2375, 2376].into_iter().collect();
        let discovery = CommandDiscovery::new("printf '80/tcp -> 0.0.0.0:49153\\n'")
            .with_always_forward(always);
        let ports = discovery.discover().await.unwrap();
        let expected: PortSet = [49153, 2375, 2376].into_iter().collect();
        assert_eq!(ports, expected);
    }
}
