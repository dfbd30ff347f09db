//! Sleep-Inhibit Controller: takes a systemd-logind delay lock
//! (`login1.Manager.Inhibit("sleep", ...)`) and decides when to release it
//! per `general:inhibit_sleep`'s policy.
//!
//! Grounded on `examples/original_source/src/core/Hypridle.cpp::setupDBUS`'s
//! fd-returning `Inhibit` call; the dup+close-on-exec step it performs after
//! the fact is instead done at acquisition with
//! `rustix::io::fcntl_dupfd_cloexec`, per the redesign note in SPEC_FULL.md.

use std::os::fd::OwnedFd;

use eyre::Result;
use zbus::zvariant::OwnedFd as ZOwnedFd;
use zbus::{Connection, Proxy};

use crate::config::{GeneralConfig, SleepInhibitMode};
use crate::scopes::Scope;
use crate::{sdebug, swarn};

const LOGIN1_DEST: &str = "org.freedesktop.login1";
const LOGIN1_MANAGER_PATH: &str = "/org/freedesktop/login1";
const LOGIN1_MANAGER_IFACE: &str = "org.freedesktop.login1.Manager";

pub struct SleepInhibitController {
    mode: SleepInhibitMode,
    fd: Option<OwnedFd>,
}

impl SleepInhibitController {
    /// Resolve the configured mode against whether a lock-notifier is
    /// available, per the policy table in SPEC_FULL.md/DESIGN.md.
    ///
    /// Mode 2 ("auto") additionally requires `before_sleep_cmd`/`lock_cmd` to
    /// look like they invoke a session locker — `before_sleep_cmd` containing
    /// `hyprlock`, or `lock_cmd` containing `hyprlock` and `before_sleep_cmd`
    /// containing `lock-session` — before it resolves to `LockNotify`;
    /// otherwise it falls back to `Normal` with no warning, since "auto" not
    /// detecting a locker is an expected, not an error, case.
    pub fn new(mode: SleepInhibitMode, lock_notify_available: bool, general: &GeneralConfig) -> Self {
        let effective = match mode {
            SleepInhibitMode::LockNotify => {
                let before_sleep = general.before_sleep_cmd.as_deref().unwrap_or("");
                let lock_cmd = general.lock_cmd.as_deref().unwrap_or("");
                let looks_like_locker = before_sleep.contains("hyprlock")
                    || (lock_cmd.contains("hyprlock") && before_sleep.contains("lock-session"));
                if lock_notify_available && looks_like_locker {
                    SleepInhibitMode::LockNotify
                } else {
                    sdebug!(
                        Scope::Sleep.to_string(),
                        "inhibit_sleep=2 (auto) did not detect a lock-notifier-backed locker; using mode 1 (Normal)"
                    );
                    SleepInhibitMode::Normal
                }
            }
            SleepInhibitMode::LockNotifyStrict if !lock_notify_available => {
                swarn!(
                    Scope::Sleep.to_string(),
                    "inhibit_sleep=3 requested but no lock-notifier is available; sleep-inhibit disabled"
                );
                SleepInhibitMode::None
            }
            other => other,
        };
        Self { mode: effective, fd: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.mode != SleepInhibitMode::None
    }

    /// Acquire (or reacquire, after a sleep cycle released it) the delay
    /// lock. A no-op if disabled or already held.
    pub async fn acquire(&mut self, connection: &Connection) -> Result<()> {
        if !self.is_enabled() || self.fd.is_some() {
            return Ok(());
        }

        let proxy = Proxy::new(connection, LOGIN1_DEST, LOGIN1_MANAGER_PATH, LOGIN1_MANAGER_IFACE).await?;
        let raw: ZOwnedFd = proxy
            .call(
                "Inhibit",
                &("sleep", "idlewarden", "waiting for lock to complete", "delay"),
            )
            .await?;
        let fd: OwnedFd = raw.into();
        let cloexec = rustix::io::fcntl_dupfd_cloexec(&fd, 0)
            .map_err(|e| eyre::eyre!("dup/cloexec of sleep-inhibit fd failed: {e}"))?;
        self.fd = Some(cloexec);
        sdebug!(Scope::Sleep.to_string(), "acquired sleep-inhibit delay lock");
        Ok(())
    }

    /// Release the lock immediately (mode `Normal`: right after
    /// `before_sleep_cmd` is spawned; mode `LockNotify`/`LockNotifyStrict`:
    /// once the lock-notifier reports `Locked`).
    pub fn release(&mut self) {
        if self.fd.take().is_some() {
            sdebug!(Scope::Sleep.to_string(), "released sleep-inhibit delay lock");
        }
    }

    /// Whether the controller should wait for a `Locked` event before
    /// releasing, rather than releasing immediately on `before_sleep_cmd`.
    pub fn waits_for_lock_notify(&self) -> bool {
        matches!(self.mode, SleepInhibitMode::LockNotify | SleepInhibitMode::LockNotifyStrict)
    }

    pub fn is_held(&self) -> bool {
        self.fd.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn general_with(before_sleep_cmd: Option<&str>, lock_cmd: Option<&str>) -> GeneralConfig {
        GeneralConfig {
            before_sleep_cmd: before_sleep_cmd.map(String::from),
            lock_cmd: lock_cmd.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn auto_falls_back_to_normal_without_notifier() {
        let general = general_with(Some("hyprlock"), None);
        let c = SleepInhibitController::new(SleepInhibitMode::LockNotify, false, &general);
        assert_eq!(c.mode, SleepInhibitMode::Normal);
        assert!(!c.waits_for_lock_notify());
    }

    #[test]
    fn auto_falls_back_to_normal_without_locker_substring() {
        let general = general_with(None, None);
        let c = SleepInhibitController::new(SleepInhibitMode::LockNotify, true, &general);
        assert_eq!(c.mode, SleepInhibitMode::Normal);
    }

    #[test]
    fn auto_resolves_to_lock_notify_with_hyprlock_before_sleep_cmd() {
        let general = general_with(Some("pkill -USR1 hyprlock"), None);
        let c = SleepInhibitController::new(SleepInhibitMode::LockNotify, true, &general);
        assert!(c.waits_for_lock_notify());
    }

    #[test]
    fn auto_resolves_to_lock_notify_with_hyprlock_lock_cmd_and_lock_session_before_sleep() {
        let general = general_with(Some("loginctl lock-session"), Some("hyprlock"));
        let c = SleepInhibitController::new(SleepInhibitMode::LockNotify, true, &general);
        assert!(c.waits_for_lock_notify());
    }

    #[test]
    fn lock_notify_strict_disables_without_notifier() {
        let c = SleepInhibitController::new(SleepInhibitMode::LockNotifyStrict, false, &GeneralConfig::default());
        assert!(!c.is_enabled());
    }
}
