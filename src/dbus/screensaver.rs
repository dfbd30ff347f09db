//! Session-bus `org.freedesktop.ScreenSaver` inhibition service, exposed on
//! both `/org/freedesktop/ScreenSaver` and `/ScreenSaver` (some clients only
//! know the legacy short path). Grounded on the
//! `#[interface(name = "org.freedesktop.ScreenSaver")]` pattern from
//! `vjoki-wscreensaver-bridge`, adapted to forward requests to the
//! coordinating task instead of holding inhibitor state itself.

use eyre::Result;
use tokio::sync::{mpsc, oneshot};
use zbus::message::Header;
use zbus::{fdo, interface, Connection};

use crate::scopes::Scope;
use crate::{sdebug, swarn};

/// A request forwarded from a D-Bus method call to the Inhibit Manager,
/// which owns the cookie table.
#[derive(Debug)]
pub enum InhibitRequest {
    Inhibit {
        app: String,
        reason: String,
        owner: String,
        reply: oneshot::Sender<u32>,
    },
    UnInhibit {
        cookie: u32,
        reply: oneshot::Sender<()>,
    },
}

#[derive(Clone)]
struct ScreenSaverIface {
    requests: mpsc::UnboundedSender<InhibitRequest>,
}

#[interface(name = "org.freedesktop.ScreenSaver")]
impl ScreenSaverIface {
    async fn inhibit(
        &self,
        application_name: String,
        reason_for_inhibit: String,
        #[zbus(header)] hdr: Header<'_>,
    ) -> fdo::Result<u32> {
        let owner = hdr
            .sender()
            .map(|s| s.to_string())
            .unwrap_or_default();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(InhibitRequest::Inhibit {
                app: application_name,
                reason: reason_for_inhibit,
                owner,
                reply: reply_tx,
            })
            .map_err(|_| fdo::Error::Failed("inhibit manager is gone".into()))?;
        reply_rx
            .await
            .map_err(|_| fdo::Error::Failed("inhibit manager dropped the request".into()))
    }

    #[zbus(name = "UnInhibit")]
    async fn un_inhibit(&self, cookie: u32) -> fdo::Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(InhibitRequest::UnInhibit { cookie, reply: reply_tx })
            .map_err(|_| fdo::Error::Failed("inhibit manager is gone".into()))?;
        reply_rx
            .await
            .map_err(|_| fdo::Error::Failed("inhibit manager dropped the request".into()))?;
        Ok(())
    }
}

/// Start the session-bus service. Registers the object on both
/// `/org/freedesktop/ScreenSaver` and `/ScreenSaver`; either registration
/// failing is logged but not fatal (matches the original's try-each-path
/// independently behavior).
pub async fn serve(requests: mpsc::UnboundedSender<InhibitRequest>) -> Result<Connection> {
    let iface = ScreenSaverIface { requests };

    let connection = zbus::connection::Builder::session()?
        .name("org.freedesktop.ScreenSaver")?
        .serve_at("/org/freedesktop/ScreenSaver", iface.clone())?
        .build()
        .await?;

    if let Err(e) = connection
        .object_server()
        .at("/ScreenSaver", iface)
        .await
    {
        swarn!(Scope::Dbus.to_string(), "failed to also register /ScreenSaver: {e}");
    } else {
        sdebug!(Scope::Dbus.to_string(), "org.freedesktop.ScreenSaver registered on /ScreenSaver");
    }

    Ok(connection)
}

/// Watch `NameOwnerChanged` on the session bus and forward the old owner's
/// unique name whenever it disconnects, so the Inhibit Manager can drop that
/// owner's cookies.
pub async fn watch_owner_changes(
    connection: &Connection,
    on_disconnect: mpsc::UnboundedSender<String>,
) -> Result<()> {
    use futures_util::StreamExt;

    let dbus_proxy = fdo::DBusProxy::new(connection).await?;
    let mut stream = dbus_proxy.receive_name_owner_changed().await?;

    tokio::spawn(async move {
        while let Some(signal) = stream.next().await {
            let args = match signal.args() {
                Ok(a) => a,
                Err(e) => {
                    swarn!(Scope::Dbus.to_string(), "malformed NameOwnerChanged: {e}");
                    continue;
                }
            };
            if args.new_owner().is_none() && args.old_owner().is_some() {
                let old = args.old_owner().as_ref().unwrap().to_string();
                let _ = on_disconnect.send(old);
            }
        }
    });

    Ok(())
}
