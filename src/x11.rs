//! The real backend, speaking to the X server through `x11rb` and the
//! XInput extension.

use x11rb::protocol::xinput::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{self, ConnectionExt as _};
use x11rb::rust_connection::RustConnection;

use crate::backend::{Atom, Backend, BackendConn, BackendError, DeviceId, Fetched, FetchedItems};
use crate::value::PropertyValue;

/// Connection settings for a running X server.
#[derive(Clone, Debug, Default)]
pub struct XServer {
    display: Option<String>,
}

impl XServer {
    /// Connect to the display named by the `DISPLAY` environment variable.
    pub fn new() -> XServer {
        XServer { display: None }
    }

    /// Connect to an explicitly named display, e.g. `:0`.
    pub fn with_display<S: Into<String>>(display: S) -> XServer {
        XServer {
            display: Some(display.into()),
        }
    }
}

impl Backend for XServer {
    type Conn = XConn;

    fn open(&self) -> std::result::Result<XConn, BackendError> {
        let (conn, screen) = RustConnection::connect(self.display.as_deref())
            .map_err(|err| BackendError(err.to_string()))?;
        log::trace!("Connected to the X server on screen {}.", screen);
        Ok(XConn { conn })
    }
}

/// One open X connection. Dropping it closes the connection.
pub struct XConn {
    conn: RustConnection,
}

impl BackendConn for XConn {
    fn resolve_atom(
        &self,
        name: &str,
        create: bool,
    ) -> std::result::Result<Option<Atom>, BackendError> {
        log::trace!("Interning {}.", name);
        let reply = self
            .conn
            .intern_atom(!create, name.as_bytes())
            .map_err(|err| BackendError(err.to_string()))?
            .reply()
            .map_err(|err| BackendError(err.to_string()))?;
        if reply.atom == x11rb::NONE {
            Ok(None)
        } else {
            Ok(Some(reply.atom))
        }
    }

    fn fetch(
        &self,
        device: DeviceId,
        property: Atom,
        max_items: u32,
    ) -> std::result::Result<Fetched, BackendError> {
        let reply = self
            .conn
            .xinput_xi_get_property(
                device,
                // Don't delete the property.
                false,
                property,
                u32::from(xproto::AtomEnum::ANY),
                // Offset of 0.
                0,
                max_items,
            )
            .map_err(|err| BackendError(err.to_string()))?
            .reply()
            .map_err(|err| BackendError(err.to_string()))?;
        log::trace!("Got reply: {:?}", reply);
        let items = match reply.items {
            xinput::XIGetPropertyItems::Data8(bytes) => FetchedItems::Bytes(bytes),
            xinput::XIGetPropertyItems::Data32(words) => FetchedItems::Words(words),
            // Nothing this crate writes uses 16-bit elements.
            _ => return Err(BackendError("unsupported property format".to_string())),
        };
        Ok(Fetched {
            type_: reply.type_,
            items,
        })
    }

    fn replace(
        &self,
        device: DeviceId,
        property: Atom,
        type_: Atom,
        value: &PropertyValue,
    ) -> std::result::Result<(), BackendError> {
        let (num_items, items) = match value {
            PropertyValue::Bytes(v) => (
                v.len() as u32,
                xinput::XIChangePropertyAux::Data8(v.clone()),
            ),
            PropertyValue::Int32(v) => (
                v.len() as u32,
                xinput::XIChangePropertyAux::Data32(v.iter().map(|i| *i as u32).collect()),
            ),
            PropertyValue::Float(v) => (
                v.len() as u32,
                xinput::XIChangePropertyAux::Data32(v.iter().map(|f| f.to_bits()).collect()),
            ),
        };
        self.conn
            .xinput_xi_change_property(
                device,
                xproto::PropMode::REPLACE,
                property,
                type_,
                num_items,
                &items,
            )
            .map_err(|err| BackendError(err.to_string()))?
            .check()
            .map_err(|err| BackendError(err.to_string()))?;
        Ok(())
    }
}
