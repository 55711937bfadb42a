//! BlueZ system-bus adapter.
//!
//! Subscribes to `PropertiesChanged` signals from the `org.bluez` service
//! and forwards them as `BusSignal`s. The blocking message iterator is
//! drained by a dedicated reader thread feeding a bounded channel, so the
//! watch loop can poll with a timeout and stay cancelable.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel as xch;
use zbus::blocking::{Connection, MessageIterator};
use zbus::zvariant::Value;

use weigher_traits::{Bus, BusSignal, HwResult, PropValue};

use crate::error::HwError;

const BLUEZ_SERVICE: &str = "org.bluez";
const PROPERTIES_IFACE: &str = "org.freedesktop.DBus.Properties";
const PROPERTIES_CHANGED: &str = "PropertiesChanged";
const DEVICE_IFACE: &str = "org.bluez.Device1";

/// Expected body shape of a properties-changed payload.
const CHANGED_SIGNATURE: &str = "sa{sv}as";

pub struct BluezBus {
    conn: Connection,
    rx: xch::Receiver<BusSignal>,
    shutdown: Arc<AtomicBool>,
}

impl BluezBus {
    /// Connect to the system bus and subscribe to device property changes.
    pub fn system() -> Result<Self, HwError> {
        let conn = Connection::system().map_err(|e| HwError::Bus(e.to_string()))?;
        let rule = zbus::MatchRule::builder()
            .msg_type(zbus::message::Type::Signal)
            .sender(BLUEZ_SERVICE)
            .map_err(|e| HwError::Bus(e.to_string()))?
            .interface(PROPERTIES_IFACE)
            .map_err(|e| HwError::Bus(e.to_string()))?
            .member(PROPERTIES_CHANGED)
            .map_err(|e| HwError::Bus(e.to_string()))?
            .build();
        let iter = MessageIterator::for_match_rule(rule, &conn, Some(64))
            .map_err(|e| HwError::Bus(e.to_string()))?;

        let (tx, rx) = xch::bounded(64);
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        // Detached reader: the iterator blocks between signals, so joining
        // it on drop could stall shutdown indefinitely. It exits when the
        // consumer side of the channel is gone or the flag is raised.
        std::thread::spawn(move || {
            for msg in iter {
                if flag.load(Ordering::Relaxed) {
                    break;
                }
                let Ok(msg) = msg else {
                    continue;
                };
                if let Some(sig) = decode(&msg)
                    && tx.send(sig).is_err()
                {
                    break;
                }
            }
            tracing::debug!("bus reader thread exiting");
        });

        Ok(Self { conn, rx, shutdown })
    }
}

/// Map a raw message into the transport-neutral signal type. The body is
/// only decoded when the signature matches; otherwise the signal is passed
/// through with empty fields so the core can log and reject the shape.
fn decode(msg: &zbus::Message) -> Option<BusSignal> {
    let header = msg.header();
    let path = header.path()?.to_string();
    let body = msg.body();
    let body_signature = body.signature().to_string();

    let (interface, changed, invalidated) = if body_signature == CHANGED_SIGNATURE {
        match body.deserialize::<(String, HashMap<String, Value>, Vec<String>)>() {
            Ok((iface, map, inv)) => {
                let changed = map
                    .into_iter()
                    .map(|(k, v)| (k, prop_value(&v)))
                    .collect();
                (iface, changed, inv)
            }
            Err(e) => {
                tracing::warn!(error = %e, %path, "failed to decode properties-changed body");
                (String::new(), Vec::new(), Vec::new())
            }
        }
    } else {
        (String::new(), Vec::new(), Vec::new())
    };

    Some(BusSignal {
        path,
        body_signature,
        interface,
        changed,
        invalidated,
    })
}

fn prop_value(v: &Value<'_>) -> PropValue {
    match v {
        Value::Bool(b) => PropValue::Bool(*b),
        Value::Str(s) => PropValue::Str(s.to_string()),
        other => PropValue::Other(format!("{other:?}")),
    }
}

impl Bus for BluezBus {
    fn recv(&mut self, timeout: Duration) -> HwResult<Option<BusSignal>> {
        match self.rx.recv_timeout(timeout) {
            Ok(sig) => Ok(Some(sig)),
            Err(xch::RecvTimeoutError::Timeout) => Ok(None),
            Err(xch::RecvTimeoutError::Disconnected) => {
                Err(Box::new(HwError::Bus("signal reader thread exited".to_owned())))
            }
        }
    }

    fn disconnect(&mut self, object_path: &str) -> HwResult<()> {
        // The reply carries no payload; only transport errors matter here.
        self.conn
            .call_method(
                Some(BLUEZ_SERVICE),
                object_path,
                Some(DEVICE_IFACE),
                "Disconnect",
                &(),
            )
            .map_err(|e| Box::new(HwError::Bus(e.to_string())) as _)?;
        Ok(())
    }
}

impl Drop for BluezBus {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // Dropping rx afterwards unblocks the reader on its next send; the
        // match subscription goes away with the iterator and connection.
    }
}
