use std::fmt;

/// Logging scopes used to tag `sinfo!`/`swarn!`/`serror!`/`sdebug!` call sites.
#[derive(Debug, Clone, Copy)]
pub enum Scope {
    Config,
    Core,
    Dbus,
    Inhibit,
    Sleep,
    Spawn,
    Wayland,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::Config => "Config",
            Scope::Core => "Core",
            Scope::Dbus => "DBus",
            Scope::Inhibit => "Inhibit",
            Scope::Sleep => "Sleep",
            Scope::Spawn => "Spawn",
            Scope::Wayland => "Wayland",
        };
        write!(f, "{}", s)
    }
}
