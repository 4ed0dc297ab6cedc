//! The seam between the accessor and the display server.
//!
//! The accessor only ever talks to the server through these traits, so the
//! protocol layer can be swapped for a counting mock in tests. The real
//! implementation lives in [`crate::x11`].

use thiserror::Error;

use crate::value::PropertyValue;

// Re-exported so callers don't need x11rb in scope for the basic handles.
pub use x11rb::protocol::xinput::DeviceId;
pub use x11rb::protocol::xproto::Atom;

/// A transport or protocol failure reported by a backend. The accessor layer
/// attaches the device and property context and maps it into [`crate::Error`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

/// A way to reach the display server. Opening yields a connection that lives
/// for exactly one accessor call.
pub trait Backend {
    type Conn: BackendConn;

    /// Open a fresh connection. Every open connection is closed when it is
    /// dropped, on every exit path.
    fn open(&self) -> std::result::Result<Self::Conn, BackendError>;
}

/// One open connection to the display server.
pub trait BackendConn {
    /// Resolve `name` to an atom. With `create` set, the name is interned if
    /// absent; without it, an unregistered name yields `Ok(None)`.
    fn resolve_atom(&self, name: &str, create: bool)
        -> std::result::Result<Option<Atom>, BackendError>;

    /// Fetch a device property's current value, reading at most `max_items`
    /// elements from offset 0 without deleting it.
    fn fetch(
        &self,
        device: DeviceId,
        property: Atom,
        max_items: u32,
    ) -> std::result::Result<Fetched, BackendError>;

    /// Replace a device property's stored value.
    fn replace(
        &self,
        device: DeviceId,
        property: Atom,
        type_: Atom,
        value: &PropertyValue,
    ) -> std::result::Result<(), BackendError>;
}

/// A property as returned by the server: the actual type atom it is stored
/// under, plus its elements in wire form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fetched {
    /// The type atom the property is stored under.
    pub type_: Atom,
    /// The elements, grouped by format width.
    pub items: FetchedItems,
}

/// Fetched elements, keyed by the format width the server reported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchedItems {
    /// Format width 8.
    Bytes(Vec<u8>),
    /// Format width 32.
    Words(Vec<u32>),
}

impl Fetched {
    /// Number of elements the server returned.
    pub fn len(&self) -> u32 {
        let n = match &self.items {
            FetchedItems::Bytes(v) => v.len(),
            FetchedItems::Words(v) => v.len(),
        };
        n as u32
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
