//! Connection-signal filtering for a single device identity.

use weigher_traits::{BusSignal, PropValue};

use crate::error::BuildError;

/// Body signature of a well-formed properties-changed payload: interface
/// name, changed-property mapping, invalidated-property list.
pub const PROPERTIES_CHANGED_SIGNATURE: &str = "sa{sv}as";

/// Property key that carries the connection state.
const CONNECTED_KEY: &str = "Connected";

/// Hardware address of the watched device, matched against bus object paths.
///
/// The bus encodes the address into object paths with `_` instead of `:`
/// (`…/dev_AA_BB_CC_DD_EE_FF`), so matching is a suffix check on the encoded
/// form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    address: String,
    path_suffix: String,
}

impl DeviceIdentity {
    pub fn new(address: &str) -> Result<Self, BuildError> {
        if address.trim().is_empty() {
            return Err(BuildError::EmptyIdentity);
        }
        Ok(Self {
            address: address.to_owned(),
            path_suffix: address.replace(':', "_"),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn matches_path(&self, path: &str) -> bool {
        path.ends_with(&self.path_suffix)
    }
}

/// A connect/disconnect transition of the watched device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub path: String,
    pub connected: bool,
}

/// Reduces raw bus notifications to connection transitions of one device.
#[derive(Debug, Clone)]
pub struct SignalFilter {
    identity: DeviceIdentity,
}

impl SignalFilter {
    pub fn new(identity: DeviceIdentity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Extract at most one meaningful transition from a notification.
    ///
    /// Malformed payloads and foreign devices yield `None`, never an error;
    /// the watch must survive arbitrary bus traffic.
    pub fn filter(&self, sig: &BusSignal) -> Option<ConnectionEvent> {
        if sig.body_signature != PROPERTIES_CHANGED_SIGNATURE {
            tracing::warn!(
                signature = %sig.body_signature,
                path = %sig.path,
                "dropping notification with unexpected body shape"
            );
            return None;
        }
        if !self.identity.matches_path(&sig.path) {
            tracing::trace!(path = %sig.path, "notification for a different device");
            return None;
        }
        for (key, value) in &sig.changed {
            if key != CONNECTED_KEY {
                continue;
            }
            // Only the Connected key is interpreted; one event per signal.
            return match value {
                PropValue::Bool(connected) => Some(ConnectionEvent {
                    path: sig.path.clone(),
                    connected: *connected,
                }),
                other => {
                    tracing::warn!(
                        path = %sig.path,
                        value = ?other,
                        "Connected property carried a non-boolean value"
                    );
                    None
                }
            };
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_for(address: &str) -> SignalFilter {
        SignalFilter::new(DeviceIdentity::new(address).unwrap())
    }

    fn signal(path: &str, changed: Vec<(String, PropValue)>) -> BusSignal {
        BusSignal {
            path: path.to_owned(),
            body_signature: PROPERTIES_CHANGED_SIGNATURE.to_owned(),
            interface: "org.bluez.Device1".to_owned(),
            changed,
            invalidated: Vec::new(),
        }
    }

    const PATH: &str = "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF";
    const ADDR: &str = "AA:BB:CC:DD:EE:FF";

    #[test]
    fn empty_identity_is_rejected() {
        assert!(DeviceIdentity::new("").is_err());
        assert!(DeviceIdentity::new("   ").is_err());
    }

    #[test]
    fn identity_matches_encoded_path_suffix() {
        let id = DeviceIdentity::new(ADDR).unwrap();
        assert!(id.matches_path(PATH));
        assert!(!id.matches_path("/org/bluez/hci0/dev_11_22_33_44_55_66"));
    }

    #[test]
    fn connected_true_yields_event() {
        let f = filter_for(ADDR);
        let sig = signal(
            PATH,
            vec![("Connected".to_owned(), PropValue::Bool(true))],
        );
        let ev = f.filter(&sig).unwrap();
        assert!(ev.connected);
        assert_eq!(ev.path, PATH);
    }

    #[test]
    fn wrong_body_shape_yields_nothing() {
        let f = filter_for(ADDR);
        let mut sig = signal(
            PATH,
            vec![("Connected".to_owned(), PropValue::Bool(true))],
        );
        sig.body_signature = "s".to_owned();
        assert!(f.filter(&sig).is_none());
    }

    #[test]
    fn foreign_path_yields_nothing_regardless_of_content() {
        let f = filter_for(ADDR);
        let sig = signal(
            "/org/bluez/hci0/dev_11_22_33_44_55_66",
            vec![("Connected".to_owned(), PropValue::Bool(true))],
        );
        assert!(f.filter(&sig).is_none());
    }

    #[test]
    fn non_boolean_connected_is_dropped() {
        let f = filter_for(ADDR);
        let sig = signal(
            PATH,
            vec![("Connected".to_owned(), PropValue::Str("yes".to_owned()))],
        );
        assert!(f.filter(&sig).is_none());
    }

    #[test]
    fn unrelated_properties_are_ignored() {
        let f = filter_for(ADDR);
        let sig = signal(
            PATH,
            vec![
                ("RSSI".to_owned(), PropValue::Other("n".to_owned())),
                ("Connected".to_owned(), PropValue::Bool(false)),
                ("Paired".to_owned(), PropValue::Bool(true)),
            ],
        );
        // Only Connected is interpreted, and at most one event is emitted.
        let ev = f.filter(&sig).unwrap();
        assert!(!ev.connected);
    }

    #[test]
    fn signal_without_connected_key_yields_nothing() {
        let f = filter_for(ADDR);
        let sig = signal(
            PATH,
            vec![("RSSI".to_owned(), PropValue::Other("n".to_owned()))],
        );
        assert!(f.filter(&sig).is_none());
    }
}
