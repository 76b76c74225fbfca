/**
 * ============================================================================
 * PLATFORM COMMAND SETS
 * ============================================================================
 *
 * PURPOSE: Translate service operations into service manager invocations
 *          and interpret their output
 *
 * IMPLEMENTATIONS:
 * - SystemdControl: systemctl / journalctl (Linux)
 * - LaunchdControl: launchctl / log (macOS)
 * - UnsupportedControl: no commands; every query degrades to Unknown
 *
 * Chosen once at startup by detect_platform().
 *
 * ============================================================================
 */

use crate::catalogue::allowlist::{KnownService, UnitScope};
use crate::coordinator::types::ControlAction;
use crate::executor::runner::CommandSpec;
use crate::executor::{ExecResult, ServiceOp};
use crate::status::types::ServiceState;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use sysinfo::{Pid, System};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Platform {
    Systemd,
    Launchd,
    Unsupported,
}

/**
 * Why a command exited non-zero, as far as the output tells
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    AuthenticationRejected,
    NotPermitted,
    Other,
}

// sudo wording for a wrong or missing password
static AUTH_REJECTED: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)incorrect password",
        r"(?i)sorry, try again",
        r"(?i)authentication failure",
        r"(?i)a password is required",
        r"(?i)no password was provided",
        r"(?i)a terminal is required",
    ])
    .expect("auth patterns are valid")
});

static NOT_PERMITTED: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)is not in the sudoers file",
        r"(?i)not allowed to execute",
        r"(?i)access denied",
        r"(?i)operation not permitted",
        r"(?i)interactive authentication required",
    ])
    .expect("permission patterns are valid")
});

static STARTED_AT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\w{3} (\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})(?: (\S+))?$")
        .expect("timestamp pattern is valid")
});

/**
 * Classify a failed command from its stderr
 */
pub fn classify_failure(stderr: &str) -> FailureKind {
    if AUTH_REJECTED.is_match(stderr) {
        FailureKind::AuthenticationRejected
    } else if NOT_PERMITTED.is_match(stderr) {
        FailureKind::NotPermitted
    } else {
        FailureKind::Other
    }
}

pub trait ServiceControl: Send + Sync {
    fn platform(&self) -> Platform;

    /**
     * Command for an operation, None when the platform cannot express it
     */
    fn command(&self, op: &ServiceOp, service: &KnownService) -> Option<CommandSpec>;

    /// Whether control operations on this unit go through sudo.
    fn requires_elevation(&self, service: &KnownService) -> bool;

    fn parse_state(&self, service: &KnownService, result: &ExecResult) -> ServiceState;

    fn parse_enabled(&self, service: &KnownService, result: &ExecResult) -> bool;

    fn parse_started(&self, result: &ExecResult) -> Option<DateTime<Utc>>;

    fn parse_installed(&self, service: &KnownService, result: &ExecResult) -> bool;

    /// Main process of a loaded unit; None when nothing is running.
    fn parse_main_pid(&self, _result: &ExecResult) -> Option<u32> {
        None
    }

    /**
     * Last max_lines non-empty lines of a log query
     */
    fn parse_logs(&self, result: &ExecResult, max_lines: usize) -> Vec<String> {
        let lines: Vec<&str> = result
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect();
        let skip = lines.len().saturating_sub(max_lines);
        lines[skip..].iter().map(|line| line.to_string()).collect()
    }

    fn classify_failure(&self, result: &ExecResult) -> FailureKind {
        classify_failure(&result.stderr)
    }
}

// ============================================================================
// SYSTEMD
// ============================================================================

#[derive(Debug, Default)]
pub struct SystemdControl;

impl SystemdControl {
    fn systemctl(service: &KnownService, args: &[&str]) -> CommandSpec {
        let mut argv: Vec<String> = Vec::with_capacity(args.len() + 2);
        if service.scope == UnitScope::User {
            argv.push("--user".to_string());
        }
        argv.extend(args.iter().map(|a| a.to_string()));
        argv.push(service.unit.to_string());
        CommandSpec::new("systemctl", argv)
    }
}

impl ServiceControl for SystemdControl {
    fn platform(&self) -> Platform {
        Platform::Systemd
    }

    fn command(&self, op: &ServiceOp, service: &KnownService) -> Option<CommandSpec> {
        let spec = match op {
            ServiceOp::Control(action) => {
                let verb = match action {
                    ControlAction::Start => "start",
                    ControlAction::Stop => "stop",
                    ControlAction::Restart => "restart",
                    ControlAction::Enable => "enable",
                    ControlAction::Disable => "disable",
                };
                Self::systemctl(service, &[verb])
            }
            ServiceOp::QueryState => Self::systemctl(service, &["is-active"]),
            ServiceOp::QueryEnabled => Self::systemctl(service, &["is-enabled"]),
            ServiceOp::QueryStarted => {
                Self::systemctl(service, &["show", "-p", "ActiveEnterTimestamp", "--value"])
            }
            ServiceOp::QueryInstalled => {
                Self::systemctl(service, &["list-unit-files", "--no-legend", "--no-pager"])
            }
            ServiceOp::QueryMainPid => Self::systemctl(service, &["show", "-p", "MainPID", "--value"]),
            ServiceOp::ReadLogs(lines) => {
                let mut args = Vec::new();
                if service.scope == UnitScope::User {
                    args.push("--user".to_string());
                }
                args.extend([
                    "-u".to_string(),
                    service.unit.to_string(),
                    "--no-pager".to_string(),
                    "-n".to_string(),
                    lines.to_string(),
                ]);
                CommandSpec::new("journalctl", args)
            }
        };
        Some(spec)
    }

    fn requires_elevation(&self, service: &KnownService) -> bool {
        service.scope == UnitScope::System
    }

    fn parse_state(&self, _service: &KnownService, result: &ExecResult) -> ServiceState {
        // is-active exits non-zero for anything but active, stdout is what counts
        match result.stdout.trim() {
            "active" | "reloading" => ServiceState::Running,
            "inactive" | "deactivating" => ServiceState::Stopped,
            "failed" => ServiceState::Failed,
            _ => ServiceState::Unknown,
        }
    }

    fn parse_enabled(&self, _service: &KnownService, result: &ExecResult) -> bool {
        matches!(
            result.stdout.trim(),
            "enabled" | "enabled-runtime" | "alias" | "static" | "indirect" | "generated"
        )
    }

    fn parse_started(&self, result: &ExecResult) -> Option<DateTime<Utc>> {
        parse_systemd_timestamp(result.stdout.trim())
    }

    fn parse_installed(&self, service: &KnownService, result: &ExecResult) -> bool {
        result
            .stdout
            .lines()
            .any(|line| line.split_whitespace().next() == Some(service.unit))
    }

    fn parse_main_pid(&self, result: &ExecResult) -> Option<u32> {
        // MainPID is 0 for inactive units
        result.stdout.trim().parse::<u32>().ok().filter(|pid| *pid > 0)
    }
}

/**
 * Parse ActiveEnterTimestamp output
 * Accepts "@<unix seconds>" and "Mon 2024-01-15 10:30:00 UTC"; empty or "n/a" is None
 */
pub fn parse_systemd_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() || raw == "n/a" {
        return None;
    }

    if let Some(secs) = raw.strip_prefix('@') {
        let secs: i64 = secs.split('.').next()?.parse().ok()?;
        return DateTime::from_timestamp(secs, 0);
    }

    let caps = STARTED_AT.captures(raw)?;
    let naive = NaiveDateTime::parse_from_str(caps.get(1)?.as_str(), "%Y-%m-%d %H:%M:%S").ok()?;
    match caps.get(2).map(|m| m.as_str()) {
        Some("UTC") | Some("GMT") => Some(Utc.from_utc_datetime(&naive)),
        _ => Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc)),
    }
}

// ============================================================================
// LAUNCHD
// ============================================================================

/**
 * launchctl in the system domain, or the operator's gui/<uid> domain for
 * user-scope units
 */
#[derive(Debug)]
pub struct LaunchdControl {
    user_domain: String,
}

impl LaunchdControl {
    pub fn new() -> Self {
        Self {
            user_domain: format!("gui/{}", current_uid()),
        }
    }

    fn domain(&self, service: &KnownService) -> &str {
        match service.scope {
            UnitScope::System => "system",
            UnitScope::User => &self.user_domain,
        }
    }

    fn target(&self, service: &KnownService) -> String {
        format!("{}/{}", self.domain(service), service.launchd_label)
    }
}

impl Default for LaunchdControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn current_uid() -> u32 {
    use std::os::unix::fs::MetadataExt;
    // Home directory owner stands in for getuid() without pulling in libc
    dirs::home_dir()
        .and_then(|home| std::fs::metadata(home).ok())
        .map(|meta| meta.uid())
        .unwrap_or(501)
}

#[cfg(not(unix))]
fn current_uid() -> u32 {
    501
}

impl ServiceControl for LaunchdControl {
    fn platform(&self) -> Platform {
        Platform::Launchd
    }

    fn command(&self, op: &ServiceOp, service: &KnownService) -> Option<CommandSpec> {
        let target = self.target(service);
        let spec = match op {
            ServiceOp::Control(ControlAction::Start) => {
                CommandSpec::new("launchctl", ["kickstart".to_string(), target])
            }
            ServiceOp::Control(ControlAction::Stop) => {
                CommandSpec::new("launchctl", ["kill".to_string(), "SIGTERM".to_string(), target])
            }
            ServiceOp::Control(ControlAction::Restart) => {
                CommandSpec::new("launchctl", ["kickstart".to_string(), "-k".to_string(), target])
            }
            ServiceOp::Control(ControlAction::Enable) => {
                CommandSpec::new("launchctl", ["enable".to_string(), target])
            }
            ServiceOp::Control(ControlAction::Disable) => {
                CommandSpec::new("launchctl", ["disable".to_string(), target])
            }
            ServiceOp::QueryState | ServiceOp::QueryInstalled | ServiceOp::QueryMainPid => {
                CommandSpec::new("launchctl", ["print".to_string(), target])
            }
            ServiceOp::QueryEnabled => CommandSpec::new(
                "launchctl",
                ["print-disabled".to_string(), self.domain(service).to_string()],
            ),
            ServiceOp::QueryStarted => return None,
            ServiceOp::ReadLogs(_) => CommandSpec::new(
                "log",
                [
                    "show".to_string(),
                    "--style".to_string(),
                    "compact".to_string(),
                    "--last".to_string(),
                    "1h".to_string(),
                    "--predicate".to_string(),
                    format!("subsystem == \"{0}\" OR process == \"{1}\"", service.launchd_label, service.name),
                ],
            ),
        };
        Some(spec)
    }

    fn requires_elevation(&self, service: &KnownService) -> bool {
        service.scope == UnitScope::System
    }

    fn parse_state(&self, _service: &KnownService, result: &ExecResult) -> ServiceState {
        if !result.success() {
            // "Could not find service" means it is not loaded at all
            return if result.stderr.contains("Could not find service") {
                ServiceState::Stopped
            } else {
                ServiceState::Unknown
            };
        }

        let state_line = result
            .stdout
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with("state = "));

        match state_line {
            Some("state = running") => ServiceState::Running,
            Some(_) => {
                let exited_badly = result.stdout.lines().map(str::trim).any(|line| {
                    line.starts_with("last exit code = ") && line != "last exit code = 0"
                        && line != "last exit code = (never exited)"
                });
                if exited_badly {
                    ServiceState::Failed
                } else {
                    ServiceState::Stopped
                }
            }
            None => ServiceState::Unknown,
        }
    }

    fn parse_enabled(&self, service: &KnownService, result: &ExecResult) -> bool {
        let quoted = format!("\"{}\"", service.launchd_label);
        match result.stdout.lines().find(|line| line.contains(&quoted)) {
            // Older releases print "=> true" for disabled
            Some(line) => !(line.contains("disabled") || line.contains("=> true")),
            None => true,
        }
    }

    fn parse_started(&self, _result: &ExecResult) -> Option<DateTime<Utc>> {
        None
    }

    fn parse_installed(&self, _service: &KnownService, result: &ExecResult) -> bool {
        result.success()
    }

    fn parse_main_pid(&self, result: &ExecResult) -> Option<u32> {
        result
            .stdout
            .lines()
            .map(str::trim)
            .find_map(|line| line.strip_prefix("pid = "))
            .and_then(|pid| pid.trim().parse::<u32>().ok())
            .filter(|pid| *pid > 0)
    }
}

// ============================================================================
// UNSUPPORTED
// ============================================================================

#[derive(Debug, Default)]
pub struct UnsupportedControl;

impl ServiceControl for UnsupportedControl {
    fn platform(&self) -> Platform {
        Platform::Unsupported
    }

    fn command(&self, _op: &ServiceOp, _service: &KnownService) -> Option<CommandSpec> {
        None
    }

    fn requires_elevation(&self, _service: &KnownService) -> bool {
        false
    }

    fn parse_state(&self, _service: &KnownService, _result: &ExecResult) -> ServiceState {
        ServiceState::Unknown
    }

    fn parse_enabled(&self, _service: &KnownService, _result: &ExecResult) -> bool {
        false
    }

    fn parse_started(&self, _result: &ExecResult) -> Option<DateTime<Utc>> {
        None
    }

    fn parse_installed(&self, _service: &KnownService, _result: &ExecResult) -> bool {
        false
    }
}

// ============================================================================
// DETECTION
// ============================================================================

/**
 * Detect which service manager runs this host
 */
pub fn detect_platform() -> Platform {
    if cfg!(target_os = "macos") {
        return Platform::Launchd;
    }

    if cfg!(target_os = "linux") && systemd_is_init() {
        return Platform::Systemd;
    }

    Platform::Unsupported
}

fn systemd_is_init() -> bool {
    if Path::new("/run/systemd/system").exists() {
        return true;
    }

    let mut system = System::new();
    system.refresh_processes();
    system
        .process(Pid::from_u32(1))
        .map(|init| init.name().contains("systemd"))
        .unwrap_or(false)
}

pub fn control_for(platform: Platform) -> Arc<dyn ServiceControl> {
    log::info!("Using {:?} service control", platform);
    match platform {
        Platform::Systemd => Arc::new(SystemdControl),
        Platform::Launchd => Arc::new(LaunchdControl::new()),
        Platform::Unsupported => Arc::new(UnsupportedControl),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::allowlist;
    use std::time::Duration;

    fn result(exit_code: i32, stdout: &str, stderr: &str) -> ExecResult {
        ExecResult {
            exit_code: Some(exit_code),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            duration: Duration::from_millis(5),
            failure: None,
        }
    }

    fn known(name: &str) -> &'static KnownService {
        allowlist::resolve(name).unwrap()
    }

    #[test]
    fn test_systemd_commands() {
        let control = SystemdControl;
        let spec = control
            .command(&ServiceOp::Control(ControlAction::Restart), known("rabbitmq"))
            .unwrap();
        assert_eq!(spec.argv(), vec!["systemctl", "restart", "rabbitmq-server.service"]);

        let spec = control.command(&ServiceOp::QueryState, known("syncthing")).unwrap();
        assert_eq!(spec.argv(), vec!["systemctl", "--user", "is-active", "syncthing.service"]);

        let spec = control.command(&ServiceOp::ReadLogs(20), known("redis")).unwrap();
        assert_eq!(
            spec.argv(),
            vec!["journalctl", "-u", "redis.service", "--no-pager", "-n", "20"]
        );
    }

    #[test]
    fn test_systemd_elevation_by_scope() {
        let control = SystemdControl;
        assert!(control.requires_elevation(known("redis")));
        assert!(!control.requires_elevation(known("podman")));
    }

    #[test]
    fn test_systemd_state_mapping() {
        let control = SystemdControl;
        let redis = known("redis");
        let cases = [
            ("active\n", ServiceState::Running),
            ("reloading\n", ServiceState::Running),
            ("inactive\n", ServiceState::Stopped),
            ("deactivating\n", ServiceState::Stopped),
            ("failed\n", ServiceState::Failed),
            ("activating\n", ServiceState::Unknown),
            ("", ServiceState::Unknown),
            ("garbage output", ServiceState::Unknown),
        ];
        for (stdout, expected) in cases {
            assert_eq!(control.parse_state(redis, &result(3, stdout, "")), expected, "{stdout:?}");
        }
    }

    #[test]
    fn test_systemd_enabled_mapping() {
        let control = SystemdControl;
        let redis = known("redis");
        assert!(control.parse_enabled(redis, &result(0, "enabled\n", "")));
        assert!(control.parse_enabled(redis, &result(0, "static\n", "")));
        assert!(!control.parse_enabled(redis, &result(1, "disabled\n", "")));
        assert!(!control.parse_enabled(redis, &result(1, "masked\n", "")));
    }

    #[test]
    fn test_systemd_installed() {
        let control = SystemdControl;
        let redis = known("redis");
        assert!(control.parse_installed(redis, &result(0, "redis.service enabled enabled\n", "")));
        assert!(!control.parse_installed(redis, &result(1, "", "")));
    }

    #[test]
    fn test_systemd_main_pid() {
        let control = SystemdControl;
        let spec = control.command(&ServiceOp::QueryMainPid, known("redis")).unwrap();
        assert_eq!(
            spec.argv(),
            vec!["systemctl", "show", "-p", "MainPID", "--value", "redis.service"]
        );
        assert_eq!(control.parse_main_pid(&result(0, "1234\n", "")), Some(1234));
        assert_eq!(control.parse_main_pid(&result(0, "0\n", "")), None);
        assert_eq!(control.parse_main_pid(&result(0, "", "")), None);
    }

    #[test]
    fn test_parse_systemd_timestamp() {
        let utc = parse_systemd_timestamp("Mon 2024-01-15 10:30:00 UTC").unwrap();
        assert_eq!(utc.to_rfc3339(), "2024-01-15T10:30:00+00:00");

        let unix = parse_systemd_timestamp("@1705314600").unwrap();
        assert_eq!(unix, utc);

        assert!(parse_systemd_timestamp("").is_none());
        assert!(parse_systemd_timestamp("n/a").is_none());
        assert!(parse_systemd_timestamp("yesterday-ish").is_none());
    }

    #[test]
    fn test_classify_failure() {
        assert_eq!(
            classify_failure("Sorry, try again.\nsudo: 1 incorrect password attempt"),
            FailureKind::AuthenticationRejected
        );
        assert_eq!(
            classify_failure("alice is not in the sudoers file.  This incident will be reported."),
            FailureKind::NotPermitted
        );
        assert_eq!(
            classify_failure("Job for redis.service failed because the control process exited with error code."),
            FailureKind::Other
        );
    }

    #[test]
    fn test_launchd_commands_and_parsing() {
        let control = LaunchdControl {
            user_domain: "gui/501".to_string(),
        };
        let redis = known("redis");

        let spec = control.command(&ServiceOp::Control(ControlAction::Stop), redis).unwrap();
        assert_eq!(spec.argv(), vec!["launchctl", "kill", "SIGTERM", "system/homebrew.mxcl.redis"]);

        let spec = control.command(&ServiceOp::QueryState, known("syncthing")).unwrap();
        assert_eq!(spec.argv(), vec!["launchctl", "print", "gui/501/homebrew.mxcl.syncthing"]);
        assert!(control.command(&ServiceOp::QueryStarted, redis).is_none());

        let running = "system/homebrew.mxcl.redis = {\n\tstate = running\n\tpid = 42\n}";
        assert_eq!(control.parse_state(redis, &result(0, running, "")), ServiceState::Running);
        assert_eq!(control.parse_main_pid(&result(0, running, "")), Some(42));

        let crashed = "{\n\tstate = not running\n\tlast exit code = 1\n}";
        assert_eq!(control.parse_state(redis, &result(0, crashed, "")), ServiceState::Failed);

        let missing = result(113, "", "Could not find service \"homebrew.mxcl.redis\" in domain for system");
        assert_eq!(control.parse_state(redis, &missing), ServiceState::Stopped);

        let disabled = "disabled services = {\n\t\"homebrew.mxcl.redis\" => disabled\n}";
        assert!(!control.parse_enabled(redis, &result(0, disabled, "")));
        assert!(control.parse_enabled(redis, &result(0, "disabled services = {\n}", "")));
    }

    #[test]
    fn test_parse_logs_keeps_last_lines() {
        let control = SystemdControl;
        let out = result(0, "one\n\ntwo\nthree\nfour\n", "");
        assert_eq!(control.parse_logs(&out, 2), vec!["three", "four"]);
        assert_eq!(control.parse_logs(&out, 10).len(), 4);
    }

    #[test]
    fn test_unsupported_has_no_commands() {
        let control = UnsupportedControl;
        assert!(control.command(&ServiceOp::QueryState, known("redis")).is_none());
        assert!(control.command(&ServiceOp::QueryMainPid, known("redis")).is_none());
    }
}
