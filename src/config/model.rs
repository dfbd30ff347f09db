/// A single `listener { ... }` rule: run `on_timeout` after `timeout_sec` of
/// idleness, `on_resume` on the next resume event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutRule {
    pub timeout_sec: u32,
    pub on_timeout: Option<String>,
    pub on_resume: Option<String>,
    /// Selects the `get_input_idle_notification` variant (ignores compositor
    /// idle inhibitors) instead of `get_idle_notification` for this listener.
    pub ignore_inhibit: bool,
}

/// The four sleep-inhibit policy modes of `general:inhibit_sleep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SleepInhibitMode {
    /// 0: never take a systemd-logind sleep inhibitor lock.
    #[default]
    None,
    /// 1: hold the lock unconditionally for the daemon's lifetime.
    Normal,
    /// 2: hold the lock only until the lock-notifier reports the screen is
    /// locked, then release it. Falls back to `Normal` (with a warning) if
    /// the compositor has no lock-notifier.
    LockNotify,
    /// 3: like `LockNotify`, but requires a working lock-notifier — with
    /// none available, sleep-inhibit is disabled entirely (with a warning)
    /// rather than silently falling back to `Normal`.
    LockNotifyStrict,
}

impl SleepInhibitMode {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::None),
            1 => Some(Self::Normal),
            2 => Some(Self::LockNotify),
            3 => Some(Self::LockNotifyStrict),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneralConfig {
    pub lock_cmd: Option<String>,
    pub unlock_cmd: Option<String>,
    pub on_lock_cmd: Option<String>,
    pub on_unlock_cmd: Option<String>,
    pub before_sleep_cmd: Option<String>,
    pub after_sleep_cmd: Option<String>,
    pub ignore_dbus_inhibit: bool,
    pub ignore_systemd_inhibit: bool,
    pub ignore_wayland_inhibit: bool,
    pub inhibit_sleep: SleepInhibitMode,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            lock_cmd: None,
            unlock_cmd: None,
            on_lock_cmd: None,
            on_unlock_cmd: None,
            before_sleep_cmd: None,
            after_sleep_cmd: None,
            ignore_dbus_inhibit: false,
            ignore_systemd_inhibit: false,
            ignore_wayland_inhibit: false,
            inhibit_sleep: SleepInhibitMode::None,
        }
    }
}

impl GeneralConfig {
    pub(crate) fn set_inhibit_sleep(&mut self, raw: u8) -> Result<(), String> {
        self.inhibit_sleep = SleepInhibitMode::from_u8(raw)
            .ok_or_else(|| format!("general:inhibit_sleep must be 0-3, got {raw}"))?;
        Ok(())
    }
}

/// The fully parsed and validated configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub general: GeneralConfig,
    pub rules: Vec<TimeoutRule>,
}
