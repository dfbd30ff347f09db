pub mod screensaver;

use eyre::Result;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use zbus::{Connection, Proxy};

use crate::config::Config;
use crate::scopes::Scope;
use crate::{sdebug, serror, sinfo, swarn};

const LOGIN1_DEST: &str = "org.freedesktop.login1";
const LOGIN1_MANAGER_PATH: &str = "/org/freedesktop/login1";
const LOGIN1_MANAGER_IFACE: &str = "org.freedesktop.login1.Manager";
const LOGIN1_SESSION_IFACE: &str = "org.freedesktop.login1.Session";

/// Events observed on the system bus, in the order they're relevant to the
/// event loop's drain pass.
#[derive(Debug, Clone)]
pub enum SystemBusEvent {
    PrepareForSleep(bool),
    SessionLock,
    SessionUnlock,
    /// `login1.Manager`'s `BlockInhibited` property changed; carries whether
    /// `"idle"` now appears in the colon-separated list.
    BlockInhibited(bool),
}

pub struct SystemBus {
    rx: mpsc::UnboundedReceiver<SystemBusEvent>,
}

impl SystemBus {
    pub fn events(&mut self) -> &mut mpsc::UnboundedReceiver<SystemBusEvent> {
        &mut self.rx
    }
}

/// Resolve the current graphical session path via `login1.Manager.GetSession("auto")`.
pub async fn current_session_path(
    connection: &Connection,
) -> Result<zvariant::OwnedObjectPath> {
    let proxy = Proxy::new(connection, LOGIN1_DEST, LOGIN1_MANAGER_PATH, LOGIN1_MANAGER_IFACE).await?;
    let path: zvariant::OwnedObjectPath = proxy.call("GetSession", &("auto",)).await?;
    Ok(path)
}

fn block_inhibited_has_idle(value: &str) -> bool {
    value.split(':').any(|s| s == "idle")
}

/// Subscribe to `PrepareForSleep`, the current session's `Lock`/`Unlock`,
/// and (unless `ignore_systemd_inhibit`) `BlockInhibited` property changes.
pub async fn connect(cfg: &Config) -> Result<SystemBus> {
    let connection = Connection::system().await?;
    let (tx, rx) = mpsc::unbounded_channel();

    let manager_proxy = Proxy::new(&connection, LOGIN1_DEST, LOGIN1_MANAGER_PATH, LOGIN1_MANAGER_IFACE).await?;
    let mut sleep_stream = manager_proxy.receive_signal("PrepareForSleep").await?;
    let sleep_tx = tx.clone();
    tokio::spawn(async move {
        while let Some(signal) = sleep_stream.next().await {
            match signal.body().deserialize::<bool>() {
                Ok(going_to_sleep) => {
                    let _ = sleep_tx.send(SystemBusEvent::PrepareForSleep(going_to_sleep));
                }
                Err(e) => swarn!(Scope::Dbus.to_string(), "malformed PrepareForSleep signal: {e}"),
            }
        }
    });

    let session_path = current_session_path(&connection).await?;
    sinfo!(Scope::Dbus.to_string(), "monitoring session {}", session_path.as_str());

    let session_proxy =
        Proxy::new(&connection, LOGIN1_DEST, session_path.clone(), LOGIN1_SESSION_IFACE).await?;
    let mut lock_stream = session_proxy.receive_signal("Lock").await?;
    let mut unlock_stream = session_proxy.receive_signal("Unlock").await?;

    let lock_tx = tx.clone();
    tokio::spawn(async move {
        while lock_stream.next().await.is_some() {
            let _ = lock_tx.send(SystemBusEvent::SessionLock);
        }
    });
    let unlock_tx = tx.clone();
    tokio::spawn(async move {
        while unlock_stream.next().await.is_some() {
            let _ = unlock_tx.send(SystemBusEvent::SessionUnlock);
        }
    });

    if !cfg.general.ignore_systemd_inhibit {
        let initial: String = manager_proxy
            .get_property("BlockInhibited")
            .await
            .unwrap_or_default();
        sdebug!(Scope::Dbus.to_string(), "initial BlockInhibited = {initial:?}");
        let _ = tx.send(SystemBusEvent::BlockInhibited(block_inhibited_has_idle(&initial)));

        let rule = zbus::MatchRule::builder()
            .msg_type(zbus::message::Type::Signal)
            .interface("org.freedesktop.DBus.Properties")?
            .member("PropertiesChanged")?
            .path(LOGIN1_MANAGER_PATH)?
            .build();
        let mut stream = zbus::MessageStream::for_match_rule(rule, &connection, None).await?;
        let block_tx = tx.clone();
        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let msg = match msg {
                    Ok(m) => m,
                    Err(e) => {
                        serror!(Scope::Dbus.to_string(), "error receiving PropertiesChanged: {e}");
                        continue;
                    }
                };
                type Changed = (String, std::collections::HashMap<String, zvariant::OwnedValue>, Vec<String>);
                let body = msg.body();
                let (iface, changed, _): Changed = match body.deserialize() {
                    Ok(v) => v,
                    Err(e) => {
                        swarn!(Scope::Dbus.to_string(), "malformed PropertiesChanged: {e}");
                        continue;
                    }
                };
                if iface != LOGIN1_MANAGER_IFACE {
                    continue;
                }
                if let Some(val) = changed.get("BlockInhibited") {
                    if let Ok(s) = <&str>::try_from(val) {
                        let _ = block_tx.send(SystemBusEvent::BlockInhibited(block_inhibited_has_idle(s)));
                    }
                }
            }
        });
    }

    Ok(SystemBus { rx })
}
