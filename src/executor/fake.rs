//! In-memory systemd host for tests.

use crate::catalogue::allowlist::KNOWN_SERVICES;
use crate::executor::runner::{CommandOutput, CommandRunner, CommandSpec};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

const STARTED_AT: &str = "Mon 2024-01-15 10:30:00 UTC";

#[derive(Debug, Clone)]
struct FakeUnit {
    active: &'static str,
    enabled: bool,
    main_pid: u32,
}

#[derive(Debug)]
struct FakeHost {
    password: String,
    units: HashMap<String, FakeUnit>,
    failing: HashSet<String>,
    sticky: HashSet<String>,
    hanging: HashSet<String>,
    history: Vec<Vec<String>>,
    in_flight: HashMap<String, usize>,
    delay: Duration,
}

/**
 * Answers systemctl, journalctl and `sudo -S` like a systemd host would
 * Every allow-listed unit exists and starts inactive and disabled
 */
pub struct FakeRunner {
    host: Mutex<FakeHost>,
    calls: AtomicUsize,
    overlap: AtomicBool,
    controls_running: AtomicUsize,
    controls_peak: AtomicUsize,
}

impl FakeRunner {
    pub fn new() -> Self {
        let units = KNOWN_SERVICES
            .iter()
            .map(|k| {
                (
                    k.unit.to_string(),
                    FakeUnit {
                        active: "inactive",
                        enabled: false,
                        main_pid: 0,
                    },
                )
            })
            .collect();

        Self {
            host: Mutex::new(FakeHost {
                password: "secret".to_string(),
                units,
                failing: HashSet::new(),
                sticky: HashSet::new(),
                hanging: HashSet::new(),
                history: Vec::new(),
                in_flight: HashMap::new(),
                delay: Duration::ZERO,
            }),
            calls: AtomicUsize::new(0),
            overlap: AtomicBool::new(false),
            controls_running: AtomicUsize::new(0),
            controls_peak: AtomicUsize::new(0),
        }
    }

    fn host(&self) -> std::sync::MutexGuard<'_, FakeHost> {
        self.host.lock().unwrap()
    }

    pub fn set_running(&self, unit: &str) {
        if let Some(u) = self.host().units.get_mut(unit) {
            u.active = "active";
        }
    }

    pub fn set_active_state(&self, unit: &str, active: &'static str) {
        if let Some(u) = self.host().units.get_mut(unit) {
            u.active = active;
        }
    }

    /// MainPID reported while the unit is active.
    pub fn set_main_pid(&self, unit: &str, pid: u32) {
        if let Some(u) = self.host().units.get_mut(unit) {
            u.main_pid = pid;
        }
    }

    pub fn uninstall(&self, unit: &str) {
        self.host().units.remove(unit);
    }

    /// Control commands on this unit exit 1 like a failing ExecStart.
    pub fn fail_unit(&self, unit: &str) {
        self.host().failing.insert(unit.to_string());
    }

    /// Control commands succeed but the unit never changes state.
    pub fn sticky_unit(&self, unit: &str) {
        self.host().sticky.insert(unit.to_string());
    }

    /// Every command touching this unit blocks for an hour.
    pub fn hang_unit(&self, unit: &str) {
        self.host().hanging.insert(unit.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        self.host().delay = delay;
    }

    pub fn set_password(&self, password: &str) {
        self.host().password = password.to_string();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of start/stop/restart/enable/disable commands seen.
    pub fn control_calls(&self) -> usize {
        self.history()
            .iter()
            .filter(|argv| control_verb(strip_sudo(argv)).is_some())
            .count()
    }

    pub fn history(&self) -> Vec<Vec<String>> {
        self.host().history.clone()
    }

    pub fn saw_overlap(&self) -> bool {
        self.overlap.load(Ordering::SeqCst)
    }

    /// Most control commands ever in flight at once, across all units.
    pub fn peak_control_concurrency(&self) -> usize {
        self.controls_peak.load(Ordering::SeqCst)
    }

    pub fn state_of(&self, unit: &str) -> &'static str {
        self.host()
            .units
            .get(unit)
            .map(|u| u.active)
            .unwrap_or("missing")
    }

    fn begin(&self, unit: &str) {
        let mut host = self.host();
        let count = host.in_flight.entry(unit.to_string()).or_insert(0);
        *count += 1;
        if *count > 1 {
            self.overlap.store(true, Ordering::SeqCst);
        }
        let running = self.controls_running.fetch_add(1, Ordering::SeqCst) + 1;
        self.controls_peak.fetch_max(running, Ordering::SeqCst);
    }

    fn end(&self, unit: &str) {
        if let Some(count) = self.host().in_flight.get_mut(unit) {
            *count = count.saturating_sub(1);
        }
        self.controls_running.fetch_sub(1, Ordering::SeqCst);
    }

    fn systemctl(&self, args: &[String]) -> CommandOutput {
        let args: Vec<&str> = args
            .iter()
            .map(String::as_str)
            .filter(|a| *a != "--user")
            .collect();
        let (verb, unit) = match (args.first(), args.last()) {
            (Some(verb), Some(unit)) => (*verb, *unit),
            _ => return fail(1, "Too few arguments."),
        };

        let mut host = self.host();
        if control_verb_str(verb) && host.failing.contains(unit) {
            return fail(
                1,
                &format!(
                    "Job for {unit} failed because the control process exited with error code.\n\
                     See \"systemctl status {unit}\" and \"journalctl -xeu {unit}\" for details."
                ),
            );
        }
        let sticky = host.sticky.contains(unit);
        let Some(state) = host.units.get_mut(unit) else {
            return match verb {
                "is-active" => output(3, "inactive\n"),
                "list-unit-files" => output(1, "0 unit files listed.\n"),
                _ => fail(5, &format!("Failed to {verb} {unit}: Unit {unit} not found.")),
            };
        };

        match verb {
            "is-active" => output(if state.active == "active" { 0 } else { 3 }, &format!("{}\n", state.active)),
            "is-enabled" => {
                let text = if state.enabled { "enabled" } else { "disabled" };
                output(if state.enabled { 0 } else { 1 }, &format!("{text}\n"))
            }
            "show" if args.contains(&"MainPID") => {
                let pid = if state.active == "active" { state.main_pid } else { 0 };
                output(0, &format!("{pid}\n"))
            }
            "show" => {
                let value = if state.active == "active" { STARTED_AT } else { "" };
                output(0, &format!("{value}\n"))
            }
            "list-unit-files" => output(0, &format!("{unit} disabled enabled\n")),
            "start" | "restart" => {
                if !sticky {
                    state.active = "active";
                }
                output(0, "")
            }
            "stop" => {
                if !sticky {
                    state.active = "inactive";
                }
                output(0, "")
            }
            "enable" | "disable" => {
                if !sticky {
                    state.enabled = verb == "enable";
                }
                output(0, "")
            }
            _ => fail(1, &format!("Unknown command verb {verb}.")),
        }
    }
}

fn output(code: i32, stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(code),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

fn fail(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

fn strip_sudo(argv: &[String]) -> &[String] {
    if argv.first().map(String::as_str) == Some("sudo") {
        match argv.iter().position(|a| a == "--") {
            Some(i) => &argv[i + 1..],
            None => &argv[1..],
        }
    } else {
        argv
    }
}

fn control_verb_str(verb: &str) -> bool {
    matches!(verb, "start" | "stop" | "restart" | "enable" | "disable")
}

fn control_verb(argv: &[String]) -> Option<&str> {
    if argv.first().map(String::as_str) != Some("systemctl") {
        return None;
    }
    argv.iter()
        .skip(1)
        .map(String::as_str)
        .find(|a| *a != "--user")
        .filter(|verb| control_verb_str(verb))
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let argv = spec.argv();

        let (delay, hanging) = {
            let mut host = self.host();
            host.history.push(argv.clone());
            let hanging = argv.iter().any(|a| host.hanging.contains(a));
            (host.delay, hanging)
        };

        if argv[0] == "sudo" {
            let password = self.host().password.clone();
            let supplied = spec.stdin.as_ref().map(|s| s.expose_secret().to_string());
            if supplied.as_deref() != Some(password.as_str()) {
                return Ok(fail(1, "Sorry, try again.\nsudo: 1 incorrect password attempt"));
            }
        }

        let inner = strip_sudo(&argv).to_vec();
        let unit = inner.last().cloned().unwrap_or_default();
        let is_control = control_verb(&inner).is_some();

        if is_control {
            self.begin(&unit);
        }
        if hanging {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = match inner.first().map(String::as_str) {
            Some("systemctl") => self.systemctl(&inner[1..]),
            Some("journalctl") => {
                let lines: usize = inner
                    .iter()
                    .position(|a| a == "-n")
                    .and_then(|i| inner.get(i + 1))
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(10);
                let unit = inner
                    .iter()
                    .position(|a| a == "-u")
                    .and_then(|i| inner.get(i + 1))
                    .cloned()
                    .unwrap_or_default();
                let text: String = (1..=lines)
                    .map(|i| format!("Jan 15 10:30:{:02} host {}[42]: line {}\n", i % 60, unit, i))
                    .collect();
                output(0, &text)
            }
            _ => fail(127, "command not found"),
        };

        if is_control {
            self.end(&unit);
        }
        Ok(result)
    }
}
