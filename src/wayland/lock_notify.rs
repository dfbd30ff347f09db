//! Client bindings for `idlewarden_lock_notify_unstable_v1`, generated from
//! `protocols/idlewarden-lock-notify-unstable-v1.xml`.
//!
//! No published crate exposes a compositor's lock-broadcast global (the
//! standard `ext-session-lock-v1` protocol only notifies the client holding
//! the lock), so the bindings are generated locally with `wayland-scanner`,
//! the same approach `wayland-protocols-wlr` uses for protocols that have not
//! been folded into upstream `wayland-protocols`.
#![allow(dead_code, non_camel_case_types, unused_unsafe, unused_variables)]
#![allow(non_upper_case_globals, non_snake_case, unused_imports)]
#![allow(missing_docs, clippy::all)]

use self::__interfaces::*;
use wayland_client;
use wayland_client::protocol::*;

pub mod __interfaces {
    use wayland_client::protocol::__interfaces::*;

    wayland_scanner::generate_interfaces!("protocols/idlewarden-lock-notify-unstable-v1.xml");
}

wayland_scanner::generate_client_code!("protocols/idlewarden-lock-notify-unstable-v1.xml");
