pub mod lock_notify;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use eyre::Result;
use tokio::sync::mpsc;
use wayland_client::{
    protocol::{wl_registry, wl_seat::WlSeat},
    Connection, Dispatch, QueueHandle,
};
use wayland_protocols::ext::idle_notify::v1::client::{
    ext_idle_notification_v1::{Event as IdleEvent, ExtIdleNotificationV1},
    ext_idle_notifier_v1::ExtIdleNotifierV1,
};

use lock_notify::{
    zidlewarden_lock_notifier_v1::{Event as LockEvent, ZidlewardenLockNotifierV1},
    zidlewarden_lock_notify_manager_v1::ZidlewardenLockNotifyManagerV1,
};

use crate::config::Config;
use crate::scopes::Scope;
use crate::{sdebug, swarn};

/// Events forwarded from the Wayland dispatch thread to the main loop. Each
/// idle/resume event carries the index of the `TimeoutRule` (and thus of the
/// `IdleListener` that produced it) it belongs to — an arena index rather
/// than a back-pointer into shared state.
#[derive(Debug, Clone)]
pub enum WaylandEvent {
    Idled { rule: usize },
    Resumed { rule: usize },
    Locked,
    Unlocked,
}

/// One slot per configured `TimeoutRule`, holding the live notification
/// object plus the parameters needed to recreate it. Shared between the
/// dispatch thread (`AppData`) and `WaylandClient::rebuild_notification`, so
/// a rebuild can destroy-and-recreate an object from the main event loop
/// without reaching into the dispatch thread.
struct NotificationSlot {
    notification: Option<ExtIdleNotificationV1>,
    ignore_inhibit: bool,
    timeout_ms: u32,
}

struct AppData {
    idle_notifier: Option<ExtIdleNotifierV1>,
    seat: Option<WlSeat>,
    lock_notify_manager: Option<ZidlewardenLockNotifyManagerV1>,
    events: mpsc::UnboundedSender<WaylandEvent>,
    // Kept alive for the daemon's lifetime; dropping the lock notifier
    // destroys it, so this must outlive the event queue.
    _lock_notifier: Option<ZidlewardenLockNotifierV1>,
}

impl Dispatch<wl_registry::WlRegistry, ()> for AppData {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_registry::Event::Global { name, interface, .. } = event {
            match interface.as_str() {
                "ext_idle_notifier_v1" => {
                    state.idle_notifier = Some(registry.bind::<ExtIdleNotifierV1, _, _>(name, 1, qh, ()));
                }
                "wl_seat" => {
                    state.seat = Some(registry.bind::<WlSeat, _, _>(name, 1, qh, ()));
                }
                "zidlewarden_lock_notify_manager_v1" => {
                    state.lock_notify_manager =
                        Some(registry.bind::<ZidlewardenLockNotifyManagerV1, _, _>(name, 1, qh, ()));
                }
                _ => {}
            }
        }
    }
}

impl Dispatch<ExtIdleNotifierV1, ()> for AppData {
    fn event(_: &mut Self, _: &ExtIdleNotifierV1, _: <ExtIdleNotifierV1 as wayland_client::Proxy>::Event, _: &(), _: &Connection, _: &QueueHandle<Self>) {}
}

impl Dispatch<WlSeat, ()> for AppData {
    fn event(_: &mut Self, _: &WlSeat, _: wayland_client::protocol::wl_seat::Event, _: &(), _: &Connection, _: &QueueHandle<Self>) {}
}

/// `usize` UserData is the rule index this notification belongs to.
impl Dispatch<ExtIdleNotificationV1, usize> for AppData {
    fn event(
        state: &mut Self,
        _proxy: &ExtIdleNotificationV1,
        event: IdleEvent,
        rule: &usize,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let ev = match event {
            IdleEvent::Idled => WaylandEvent::Idled { rule: *rule },
            IdleEvent::Resumed => WaylandEvent::Resumed { rule: *rule },
            _ => return,
        };
        let _ = state.events.send(ev);
    }
}

impl Dispatch<ZidlewardenLockNotifyManagerV1, ()> for AppData {
    fn event(
        _: &mut Self,
        _: &ZidlewardenLockNotifyManagerV1,
        _: <ZidlewardenLockNotifyManagerV1 as wayland_client::Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZidlewardenLockNotifierV1, ()> for AppData {
    fn event(
        state: &mut Self,
        _proxy: &ZidlewardenLockNotifierV1,
        event: LockEvent,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let ev = match event {
            LockEvent::Locked => WaylandEvent::Locked,
            LockEvent::Unlocked => WaylandEvent::Unlocked,
        };
        let _ = state.events.send(ev);
    }
}

/// A live Wayland connection: one `ExtIdleNotificationV1` per configured
/// `TimeoutRule` plus, if available, a lock-notifier subscription. Events are
/// delivered over `events()`; the dispatch loop runs on a dedicated blocking
/// task so the main `tokio::select!` loop never calls into `wayland-client`
/// directly.
pub struct WaylandClient {
    rx: mpsc::UnboundedReceiver<WaylandEvent>,
    should_stop: Arc<AtomicBool>,
    pub lock_notify_available: bool,
    notifications: Arc<Mutex<Vec<NotificationSlot>>>,
    idle_notifier: Option<ExtIdleNotifierV1>,
    seat: Option<WlSeat>,
    qh: QueueHandle<AppData>,
}

impl WaylandClient {
    pub fn events(&mut self) -> &mut mpsc::UnboundedReceiver<WaylandEvent> {
        &mut self.rx
    }

    pub fn shutdown(&self) {
        self.should_stop.store(true, Ordering::Relaxed);
    }

    /// Destroy and recreate `rule`'s idle notification object. Per
    /// `ext_idle_notification_v1`'s own protocol doc, the new object starts
    /// not-idle with its timeout counted from creation, so this is what
    /// actually restarts the idle timer — the compositor will only send a
    /// fresh `idled` event after another full timeout of real inactivity,
    /// rather than one firing immediately off a stale flag.
    pub fn rebuild_notification(&self, rule: usize) {
        let (Some(notifier), Some(seat)) = (&self.idle_notifier, &self.seat) else {
            return;
        };
        let mut slots = self.notifications.lock().unwrap();
        let Some(slot) = slots.get_mut(rule) else {
            return;
        };
        if let Some(old) = slot.notification.take() {
            old.destroy();
        }
        let notification = if slot.ignore_inhibit {
            notifier.get_input_idle_notification(slot.timeout_ms, seat, &self.qh, rule)
        } else {
            notifier.get_idle_notification(slot.timeout_ms, seat, &self.qh, rule)
        };
        slot.notification = Some(notification);
        sdebug!(Scope::Wayland.to_string(), "rebuilt idle notification for rule {rule}");
    }
}

/// Connect, bind globals, and create one idle notification per rule.
///
/// Variant selection per rule: `get_input_idle_notification` (ignores
/// compositor-level idle inhibitors) when `general.ignore_wayland_inhibit`
/// is set or the rule itself has `ignore_inhibit`; `get_idle_notification`
/// (respects them) otherwise.
pub fn connect(cfg: &Config) -> Result<WaylandClient> {
    let conn = Connection::connect_to_env()
        .map_err(|e| eyre::eyre!("failed to connect to Wayland: {e}"))?;
    let mut event_queue = conn.new_event_queue();
    let qh = event_queue.handle();
    let display = conn.display();

    let (tx, rx) = mpsc::unbounded_channel();
    let notifications = Arc::new(Mutex::new(Vec::new()));

    let mut app_data = AppData {
        idle_notifier: None,
        seat: None,
        lock_notify_manager: None,
        events: tx.clone(),
        _lock_notifier: None,
    };

    let _registry = display.get_registry(&qh, ());
    event_queue
        .roundtrip(&mut app_data)
        .map_err(|e| eyre::eyre!("Wayland roundtrip failed: {e}"))?;

    match (&app_data.idle_notifier, &app_data.seat) {
        (Some(notifier), Some(seat)) => {
            let mut slots = notifications.lock().unwrap();
            for (idx, rule) in cfg.rules.iter().enumerate() {
                let ignore_inhibit = rule.ignore_inhibit || cfg.general.ignore_wayland_inhibit;
                let timeout_ms = rule.timeout_sec.saturating_mul(1000);
                let notification = if ignore_inhibit {
                    notifier.get_input_idle_notification(timeout_ms, seat, &qh, idx)
                } else {
                    notifier.get_idle_notification(timeout_ms, seat, &qh, idx)
                };
                slots.push(NotificationSlot { notification: Some(notification), ignore_inhibit, timeout_ms });
            }
            drop(slots);
            sdebug!(Scope::Wayland.to_string(), "registered {} idle notification(s)", cfg.rules.len());
        }
        _ => {
            swarn!(Scope::Wayland.to_string(), "compositor does not expose ext_idle_notifier_v1/wl_seat; idle detection disabled");
        }
    }

    let lock_notify_available = app_data.lock_notify_manager.is_some();
    if let Some(mgr) = &app_data.lock_notify_manager {
        let notifier = mgr.get_lock_notification(&qh, ());
        app_data._lock_notifier = Some(notifier);
        sdebug!(Scope::Wayland.to_string(), "bound idlewarden_lock_notify_unstable_v1");
    } else {
        swarn!(Scope::Wayland.to_string(), "compositor does not expose idlewarden_lock_notify_unstable_v1");
    }

    let idle_notifier = app_data.idle_notifier.clone();
    let seat = app_data.seat.clone();

    let should_stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&should_stop);

    tokio::task::spawn_blocking(move || {
        loop {
            if stop_flag.load(Ordering::Relaxed) {
                break;
            }
            if let Err(e) = event_queue.blocking_dispatch(&mut app_data) {
                swarn!(Scope::Wayland.to_string(), "dispatch error: {e}");
                break;
            }
        }
    });

    Ok(WaylandClient { rx, should_stop, lock_notify_available, notifications, idle_notifier, seat, qh })
}
