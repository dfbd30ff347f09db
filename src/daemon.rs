//! Event Loop: the single coordinating task. Replaces the original's
//! poller-thread + condvar-signaled main-thread pair with one
//! `tokio::select!`, biased so the three sources are always considered in a
//! fixed priority order — system bus, then Wayland, then session bus —
//! matching the original's drain order within a wake cycle.

use tokio::sync::mpsc;
use zbus::Connection;

use crate::config::Config;
use crate::dbus::screensaver::InhibitRequest;
use crate::dbus::{self, SystemBusEvent};
use crate::inhibit::InhibitManager;
use crate::scopes::Scope;
use crate::sleep::SleepInhibitController;
use crate::wayland::{self, WaylandClient, WaylandEvent};
use crate::{sdebug, sinfo};

pub async fn run(cfg: Config) -> eyre::Result<()> {
    let system_bus_conn = Connection::system().await?;
    let mut system_bus = dbus::connect(&cfg).await?;

    let mut wayland_client: WaylandClient = wayland::connect(&cfg)?;

    let (dbus_requests_tx, mut dbus_requests_rx) = mpsc::unbounded_channel::<InhibitRequest>();
    let (owner_disconnect_tx, mut owner_disconnect_rx) = mpsc::unbounded_channel::<String>();

    if !cfg.general.ignore_dbus_inhibit {
        match dbus::screensaver::serve(dbus_requests_tx).await {
            Ok(session_conn) => {
                if let Err(e) = dbus::screensaver::watch_owner_changes(&session_conn, owner_disconnect_tx).await {
                    crate::swarn!(Scope::Dbus.to_string(), "failed to watch session-bus owner changes: {e}");
                }
                sinfo!(Scope::Dbus.to_string(), "org.freedesktop.ScreenSaver registered on the session bus");
            }
            Err(e) => {
                crate::swarn!(
                    Scope::Dbus.to_string(),
                    "cannot register org.freedesktop.ScreenSaver (disables inhibit API): {e}"
                );
            }
        }
    }

    let mut inhibit = InhibitManager::new();
    let mut sleep = SleepInhibitController::new(
        cfg.general.inhibit_sleep,
        wayland_client.lock_notify_available,
        &cfg.general,
    );
    sleep.acquire(&system_bus_conn).await?;

    let mut is_idled = vec![false; cfg.rules.len()];
    let mut pending_release_on_lock = false;

    sinfo!(Scope::Core.to_string(), "idlewarden running with {} rule(s)", cfg.rules.len());

    loop {
        tokio::select! {
            biased;

            Some(ev) = system_bus.events().recv() => {
                handle_system_bus_event(
                    ev, &cfg, &system_bus_conn, &mut inhibit, &mut sleep,
                    &mut is_idled, &mut pending_release_on_lock, &wayland_client,
                ).await;
            }

            Some(ev) = wayland_client.events().recv() => {
                handle_wayland_event(
                    ev, &cfg, &inhibit, &mut sleep, &mut is_idled, &mut pending_release_on_lock,
                );
            }

            Some(req) = dbus_requests_rx.recv() => {
                handle_inhibit_request(req, &mut inhibit, &mut is_idled, &wayland_client);
            }

            Some(owner) = owner_disconnect_rx.recv() => {
                let was_inhibited = inhibit.is_inhibited();
                let removed = inhibit.remove_owner(&owner);
                if removed > 0 {
                    rebuild_if_uninhibited(was_inhibited, &inhibit, &mut is_idled, &wayland_client);
                }
            }

            else => {
                sdebug!(Scope::Core.to_string(), "all event sources closed, shutting down");
                break;
            }
        }
    }

    wayland_client.shutdown();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn handle_system_bus_event(
    ev: SystemBusEvent,
    cfg: &Config,
    system_bus_conn: &Connection,
    inhibit: &mut InhibitManager,
    sleep: &mut SleepInhibitController,
    is_idled: &mut [bool],
    pending_release_on_lock: &mut bool,
    wayland: &WaylandClient,
) {
    match ev {
        SystemBusEvent::SessionLock => {
            if let Some(cmd) = &cfg.general.lock_cmd {
                crate::spawn::spawn(cmd);
            }
        }
        SystemBusEvent::SessionUnlock => {
            if let Some(cmd) = &cfg.general.unlock_cmd {
                crate::spawn::spawn(cmd);
            }
        }
        SystemBusEvent::PrepareForSleep(true) => {
            if let Some(cmd) = &cfg.general.before_sleep_cmd {
                crate::spawn::spawn(cmd);
            }
            if sleep.waits_for_lock_notify() {
                *pending_release_on_lock = true;
            } else {
                sleep.release();
            }
        }
        SystemBusEvent::PrepareForSleep(false) => {
            if let Some(cmd) = &cfg.general.after_sleep_cmd {
                crate::spawn::spawn(cmd);
            }
            *pending_release_on_lock = false;
            if let Err(e) = sleep.acquire(system_bus_conn).await {
                crate::swarn!(Scope::Sleep.to_string(), "failed to reacquire sleep-inhibit lock: {e}");
            }
        }
        SystemBusEvent::BlockInhibited(blocked) => {
            let was_inhibited = inhibit.is_inhibited();
            inhibit.set_systemd_blocked(blocked);
            rebuild_if_uninhibited(was_inhibited, inhibit, is_idled, wayland);
        }
    }
}

fn handle_wayland_event(
    ev: WaylandEvent,
    cfg: &Config,
    inhibit: &InhibitManager,
    sleep: &mut SleepInhibitController,
    is_idled: &mut [bool],
    pending_release_on_lock: &mut bool,
) {
    match ev {
        WaylandEvent::Idled { rule } => {
            if let Some(slot) = is_idled.get_mut(rule) {
                *slot = true;
            }
            if !inhibit.is_inhibited() {
                if let Some(r) = cfg.rules.get(rule) {
                    if let Some(cmd) = &r.on_timeout {
                        crate::spawn::spawn(cmd);
                    }
                }
            }
        }
        WaylandEvent::Resumed { rule } => {
            if let Some(slot) = is_idled.get_mut(rule) {
                *slot = false;
            }
            if !inhibit.is_inhibited() {
                if let Some(r) = cfg.rules.get(rule) {
                    if let Some(cmd) = &r.on_resume {
                        crate::spawn::spawn(cmd);
                    }
                }
            }
        }
        WaylandEvent::Locked => {
            if let Some(cmd) = &cfg.general.on_lock_cmd {
                crate::spawn::spawn(cmd);
            }
            if *pending_release_on_lock {
                sleep.release();
                *pending_release_on_lock = false;
            }
        }
        WaylandEvent::Unlocked => {
            if let Some(cmd) = &cfg.general.on_unlock_cmd {
                crate::spawn::spawn(cmd);
            }
        }
    }
}

fn handle_inhibit_request(
    req: InhibitRequest,
    inhibit: &mut InhibitManager,
    is_idled: &mut [bool],
    wayland: &WaylandClient,
) {
    match req {
        InhibitRequest::Inhibit { app, reason, owner, reply } => {
            let cookie = inhibit.register(app, reason, owner);
            let _ = reply.send(cookie);
        }
        InhibitRequest::UnInhibit { cookie, reply } => {
            let was_inhibited = inhibit.is_inhibited();
            inhibit.unregister(cookie);
            let _ = reply.send(());
            rebuild_if_uninhibited(was_inhibited, inhibit, is_idled, wayland);
        }
    }
}

/// When an inhibitor drops the global count to zero, any rule whose idle
/// notification already fired while suppressed gets its
/// `ext_idle_notification_v1` destroyed and recreated, restarting its idle
/// timer. `on_timeout` only runs again once the compositor reports a fresh
/// `idled` event against the rebuilt object — never synchronously here.
fn rebuild_if_uninhibited(
    was_inhibited: bool,
    inhibit: &InhibitManager,
    is_idled: &mut [bool],
    wayland: &WaylandClient,
) {
    if !was_inhibited || inhibit.is_inhibited() {
        return;
    }
    for (idx, idled) in is_idled.iter_mut().enumerate() {
        if *idled {
            wayland.rebuild_notification(idx);
            *idled = false;
        }
    }
}
