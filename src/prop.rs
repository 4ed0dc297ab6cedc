//! The property accessor. Every call is a linear open → resolve → fetch or
//! replace → close sequence; a failed step short-circuits, and the
//! connection is released on every path by dropping it.

use x11rb::protocol::xproto;

use crate::backend::{Atom, Backend, BackendConn, DeviceId, FetchedItems};
use crate::config::{Config, DEFAULT_MAX_FETCH_ITEMS};
use crate::value::PropertyValue;
use crate::x11::XServer;
use crate::{Error, Result};

/// The type atom name the server files float properties under.
const FLOAT_TYPE_NAME: &str = "FLOAT";

/// Accessor for the properties of XInput devices. Holds no connection;
/// each read or write opens and closes its own.
pub struct DeviceProps<B> {
    backend: B,
    max_fetch_items: u32,
}

impl DeviceProps<XServer> {
    /// Access devices on the default display with the default fetch cap.
    pub fn new() -> DeviceProps<XServer> {
        DeviceProps::with_config(&Config::default())
    }

    /// Access devices as described by a [`Config`].
    pub fn with_config(config: &Config) -> DeviceProps<XServer> {
        let backend = match &config.display {
            Some(display) => XServer::with_display(display.as_str()),
            None => XServer::new(),
        };
        DeviceProps {
            backend,
            max_fetch_items: config.max_fetch_items,
        }
    }
}

impl Default for DeviceProps<XServer> {
    fn default() -> DeviceProps<XServer> {
        DeviceProps::new()
    }
}

impl<B> DeviceProps<B>
where
    B: Backend,
{
    /// Use a custom backend, e.g. a mock server in tests.
    pub fn with_backend(backend: B) -> DeviceProps<B> {
        DeviceProps {
            backend,
            max_fetch_items: DEFAULT_MAX_FETCH_ITEMS,
        }
    }

    /// Bound the number of items a read will request. A property longer
    /// than the cap comes back truncated and then fails the exact-count
    /// check.
    pub fn max_fetch_items(mut self, cap: u32) -> DeviceProps<B> {
        self.max_fetch_items = cap;
        self
    }

    /// Read a device property, expecting exactly `expected_items` elements.
    ///
    /// The value is decoded according to the type the server actually
    /// stored: 8-bit data as [`PropertyValue::Bytes`], 32-bit data as
    /// [`PropertyValue::Float`] when filed under the server's FLOAT type
    /// and as [`PropertyValue::Int32`] otherwise. If the device returns any
    /// other number of items, the data is discarded and the call fails with
    /// [`Error::ItemCountMismatch`].
    pub fn read(&self, device: DeviceId, name: &str, expected_items: u32) -> Result<PropertyValue> {
        self.check_name(device, name)?;
        if expected_items < 1 {
            log::error!("Invalid item count for device {}.", device);
            return Err(Error::InvalidArgument {
                device,
                reason: "item count must be at least 1".to_string(),
            });
        }
        let conn = self.open(device)?;
        let property = self.resolve_property(&conn, device, name)?;
        let fetched = conn
            .fetch(device, property, self.max_fetch_items)
            .map_err(|err| {
                log::error!("Get `{}' data failed for device {}: {}.", name, device, err);
                Error::FetchFailed {
                    device,
                    property: name.to_string(),
                    reason: err.0,
                }
            })?;
        let actual = fetched.len();
        if actual != expected_items {
            log::error!(
                "Item number not match `{} - {}' for `{}' on device {}.",
                expected_items,
                actual,
                name,
                device
            );
            return Err(Error::ItemCountMismatch {
                device,
                property: name.to_string(),
                expected: expected_items,
                actual,
            });
        }
        // If FLOAT was never interned, nothing can be stored under it.
        let float_type = conn.resolve_atom(FLOAT_TYPE_NAME, false).unwrap_or(None);
        let type_ = fetched.type_;
        let value = match fetched.items {
            FetchedItems::Bytes(bytes) => PropertyValue::Bytes(bytes),
            FetchedItems::Words(words) if float_type == Some(type_) => {
                PropertyValue::float_from_words(words)
            }
            FetchedItems::Words(words) => PropertyValue::int32_from_words(words),
        };
        Ok(value)
    }

    /// Replace a device property's stored value.
    ///
    /// `Bytes` and `Int32` payloads are filed under the predefined INTEGER
    /// type. A `Float` payload first resolves the FLOAT type atom over a
    /// separate short-lived connection before the write opens its own, so
    /// a float write costs two connections.
    pub fn write(&self, device: DeviceId, name: &str, value: &PropertyValue) -> Result<()> {
        self.check_name(device, name)?;
        if value.is_empty() {
            log::error!("Invalid data or item number for device {}.", device);
            return Err(Error::InvalidArgument {
                device,
                reason: "payload must not be empty".to_string(),
            });
        }
        let type_ = match value {
            PropertyValue::Bytes(_) | PropertyValue::Int32(_) => {
                Atom::from(xproto::AtomEnum::INTEGER)
            }
            PropertyValue::Float(_) => self.resolve_float_type(device, name)?,
        };
        self.write_as(device, name, type_, value)
    }

    /// Write boolean values, stored as 0/1 bytes with format width 8.
    pub fn write_bools(&self, device: DeviceId, name: &str, values: &[bool]) -> Result<()> {
        self.write(device, name, &PropertyValue::from_bools(values))
    }

    /// Write 32-bit integer values.
    pub fn write_int32s(&self, device: DeviceId, name: &str, values: &[i32]) -> Result<()> {
        self.write(device, name, &PropertyValue::Int32(values.to_vec()))
    }

    /// Write 32-bit float values. Format must be 32.
    pub fn write_floats(&self, device: DeviceId, name: &str, values: &[f32]) -> Result<()> {
        self.write(device, name, &PropertyValue::Float(values.to_vec()))
    }

    fn check_name(&self, device: DeviceId, name: &str) -> Result<()> {
        if name.is_empty() {
            log::error!("Empty property for device {}.", device);
            return Err(Error::InvalidArgument {
                device,
                reason: "property name must not be empty".to_string(),
            });
        }
        Ok(())
    }

    fn open(&self, device: DeviceId) -> Result<B::Conn> {
        self.backend.open().map_err(|err| {
            log::error!("Open display failed for device {}: {}.", device, err);
            Error::ConnectionFailed(err.0)
        })
    }

    fn resolve_property(&self, conn: &B::Conn, device: DeviceId, name: &str) -> Result<Atom> {
        match conn.resolve_atom(name, false) {
            Ok(Some(atom)) => Ok(atom),
            Ok(None) => {
                log::error!("Intern atom {} failed for device {}.", name, device);
                Err(Error::UnknownProperty {
                    device,
                    property: name.to_string(),
                })
            }
            Err(err) => Err(Error::ConnectionFailed(err.0)),
        }
    }

    /// Resolve the FLOAT type atom over its own connection, which is closed
    /// again before the caller opens the one used for the actual write.
    fn resolve_float_type(&self, device: DeviceId, name: &str) -> Result<Atom> {
        let conn = self.open(device)?;
        match conn.resolve_atom(FLOAT_TYPE_NAME, true) {
            Ok(Some(atom)) => Ok(atom),
            _ => {
                log::error!("Intern `FLOAT' atom failed for `{}' on device {}.", name, device);
                Err(Error::UnknownType)
            }
        }
    }

    fn write_as(
        &self,
        device: DeviceId,
        name: &str,
        type_: Atom,
        value: &PropertyValue,
    ) -> Result<()> {
        let conn = self.open(device)?;
        let property = self.resolve_property(&conn, device, name)?;
        conn.replace(device, property, type_, value).map_err(|err| {
            log::error!("Set `{}' data failed for device {}: {}.", name, device, err);
            Error::ReplaceFailed {
                device,
                property: name.to_string(),
                reason: err.0,
            }
        })
    }
}

#[cfg(test)]
use crate::backend::{BackendError, Fetched};
#[cfg(test)]
use std::cell::{Cell, RefCell};
#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::rc::Rc;

/// An in-memory stand-in for the X server that counts connection traffic.
#[cfg(test)]
struct MockServer {
    state: Rc<MockState>,
}

#[cfg(test)]
struct MockState {
    /// Connection attempts, counted whether or not they succeed.
    attempts: Cell<u32>,
    /// Successfully opened connections.
    opens: Cell<u32>,
    /// Connections released by drop.
    closes: Cell<u32>,
    /// Issued replace requests.
    replaces: Cell<u32>,
    fail_connect: Cell<bool>,
    fail_fetch: Cell<bool>,
    fail_replace: Cell<bool>,
    refuse_float: Cell<bool>,
    atoms: RefCell<HashMap<String, Atom>>,
    next_atom: Cell<Atom>,
    props: RefCell<HashMap<(DeviceId, Atom), (Atom, FetchedItems)>>,
}

#[cfg(test)]
impl MockServer {
    fn new() -> MockServer {
        MockServer {
            state: Rc::new(MockState {
                attempts: Cell::new(0),
                opens: Cell::new(0),
                closes: Cell::new(0),
                replaces: Cell::new(0),
                fail_connect: Cell::new(false),
                fail_fetch: Cell::new(false),
                fail_replace: Cell::new(false),
                refuse_float: Cell::new(false),
                atoms: RefCell::new(HashMap::new()),
                // Leave room below for the predefined atoms.
                next_atom: Cell::new(100),
                props: RefCell::new(HashMap::new()),
            }),
        }
    }

    fn state(&self) -> Rc<MockState> {
        Rc::clone(&self.state)
    }
}

#[cfg(test)]
impl MockState {
    /// Register a property name, as the server's atom table would.
    fn register(&self, name: &str) -> Atom {
        let atom = self.next_atom.get();
        self.next_atom.set(atom + 1);
        self.atoms.borrow_mut().insert(name.to_string(), atom);
        atom
    }

    /// A connection is considered leaked if it outlives its accessor call.
    fn assert_no_leaks(&self) {
        assert_eq!(self.opens.get(), self.closes.get());
    }
}

#[cfg(test)]
impl Backend for MockServer {
    type Conn = MockConn;

    fn open(&self) -> std::result::Result<MockConn, BackendError> {
        self.state.attempts.set(self.state.attempts.get() + 1);
        if self.state.fail_connect.get() {
            return Err(BackendError("display unavailable".to_string()));
        }
        self.state.opens.set(self.state.opens.get() + 1);
        Ok(MockConn {
            state: Rc::clone(&self.state),
        })
    }
}

#[cfg(test)]
struct MockConn {
    state: Rc<MockState>,
}

#[cfg(test)]
impl Drop for MockConn {
    fn drop(&mut self) {
        self.state.closes.set(self.state.closes.get() + 1);
    }
}

#[cfg(test)]
impl BackendConn for MockConn {
    fn resolve_atom(
        &self,
        name: &str,
        create: bool,
    ) -> std::result::Result<Option<Atom>, BackendError> {
        let known = self.state.atoms.borrow().get(name).copied();
        if let Some(atom) = known {
            return Ok(Some(atom));
        }
        if create && !(name == FLOAT_TYPE_NAME && self.state.refuse_float.get()) {
            Ok(Some(self.state.register(name)))
        } else {
            Ok(None)
        }
    }

    fn fetch(
        &self,
        device: DeviceId,
        property: Atom,
        max_items: u32,
    ) -> std::result::Result<Fetched, BackendError> {
        if self.state.fail_fetch.get() {
            return Err(BackendError("request rejected".to_string()));
        }
        match self.state.props.borrow().get(&(device, property)) {
            // A real server answers a request for an unset property with
            // type None and zero items rather than an error.
            None => Ok(Fetched {
                type_: x11rb::NONE,
                items: FetchedItems::Bytes(Vec::new()),
            }),
            Some((type_, items)) => {
                let items = match items {
                    FetchedItems::Bytes(v) => {
                        FetchedItems::Bytes(v.iter().take(max_items as usize).copied().collect())
                    }
                    FetchedItems::Words(v) => {
                        FetchedItems::Words(v.iter().take(max_items as usize).copied().collect())
                    }
                };
                Ok(Fetched {
                    type_: *type_,
                    items,
                })
            }
        }
    }

    fn replace(
        &self,
        device: DeviceId,
        property: Atom,
        type_: Atom,
        value: &PropertyValue,
    ) -> std::result::Result<(), BackendError> {
        if self.state.fail_replace.get() {
            return Err(BackendError("request rejected".to_string()));
        }
        self.state.replaces.set(self.state.replaces.get() + 1);
        let items = match value {
            PropertyValue::Bytes(v) => FetchedItems::Bytes(v.clone()),
            PropertyValue::Int32(v) => {
                FetchedItems::Words(v.iter().map(|i| *i as u32).collect())
            }
            PropertyValue::Float(v) => {
                FetchedItems::Words(v.iter().map(|f| f.to_bits()).collect())
            }
        };
        self.state
            .props
            .borrow_mut()
            .insert((device, property), (type_, items));
        Ok(())
    }
}

/// Malformed arguments fail before any connection is attempted.
#[test]
fn invalid_arguments_never_connect() {
    let server = MockServer::new();
    let state = server.state();
    let props = DeviceProps::with_backend(server);
    match props.read(7, "", 1) {
        Err(Error::InvalidArgument { device: 7, .. }) => (),
        other => panic!("unexpected result: {:?}", other),
    }
    match props.read(7, "libinput Accel Speed", 0) {
        Err(Error::InvalidArgument { device: 7, .. }) => (),
        other => panic!("unexpected result: {:?}", other),
    }
    match props.write_int32s(7, "", &[1]) {
        Err(Error::InvalidArgument { device: 7, .. }) => (),
        other => panic!("unexpected result: {:?}", other),
    }
    match props.write_int32s(7, "libinput Accel Speed", &[]) {
        Err(Error::InvalidArgument { device: 7, .. }) => (),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(state.attempts.get(), 0);
}

/// An unregistered name fails with `UnknownProperty`, and the one connection
/// opened for the lookup is closed again.
#[test]
fn unknown_property_closes_connection() {
    let server = MockServer::new();
    let state = server.state();
    let props = DeviceProps::with_backend(server);
    let result = props.read(7, "No Such Property", 1);
    assert_eq!(
        result,
        Err(Error::UnknownProperty {
            device: 7,
            property: "No Such Property".to_string(),
        })
    );
    assert_eq!(state.opens.get(), 1);
    assert_eq!(state.closes.get(), 1);
}

/// A device answering with a different item count than declared fails with
/// `ItemCountMismatch` and returns no data.
#[test]
fn item_count_mismatch_discards_data() {
    let server = MockServer::new();
    let state = server.state();
    state.register("Device Enabled");
    let props = DeviceProps::with_backend(server);
    props
        .write_int32s(3, "Device Enabled", &[1, 2, 3])
        .unwrap();
    let result = props.read(3, "Device Enabled", 2);
    assert_eq!(
        result,
        Err(Error::ItemCountMismatch {
            device: 3,
            property: "Device Enabled".to_string(),
            expected: 2,
            actual: 3,
        })
    );
    state.assert_no_leaks();
}

/// A registered name whose property was never set reads back as zero items.
#[test]
fn unset_property_reads_as_zero_items() {
    let server = MockServer::new();
    let state = server.state();
    state.register("Device Enabled");
    let props = DeviceProps::with_backend(server);
    let result = props.read(3, "Device Enabled", 1);
    assert_eq!(
        result,
        Err(Error::ItemCountMismatch {
            device: 3,
            property: "Device Enabled".to_string(),
            expected: 1,
            actual: 0,
        })
    );
}

/// Integers written to a device read back unchanged.
#[test]
fn int32_round_trip() {
    let server = MockServer::new();
    server.state().register("Coordinate Transformation Matrix");
    let props = DeviceProps::with_backend(server);
    props
        .write_int32s(12, "Coordinate Transformation Matrix", &[3, -4, 5])
        .unwrap();
    let value = props
        .read(12, "Coordinate Transformation Matrix", 3)
        .unwrap();
    assert_eq!(value, PropertyValue::Int32(vec![3, -4, 5]));
}

/// Booleans are stored as 0/1 bytes and read back as a byte payload.
#[test]
fn bool_round_trip() {
    let server = MockServer::new();
    server.state().register("libinput Tapping Enabled");
    let props = DeviceProps::with_backend(server);
    props
        .write_bools(4, "libinput Tapping Enabled", &[true, false])
        .unwrap();
    let value = props.read(4, "libinput Tapping Enabled", 2).unwrap();
    assert_eq!(value, PropertyValue::Bytes(vec![1, 0]));
}

/// A float write opens two connections (type resolution, then the write)
/// and the value reads back under the FLOAT type.
#[test]
fn float_round_trip_uses_two_connections() {
    let server = MockServer::new();
    let state = server.state();
    let props = DeviceProps::with_backend(server);
    state.register("libinput Accel Speed");
    props
        .write_floats(5, "libinput Accel Speed", &[0.5, -1.25])
        .unwrap();
    assert_eq!(state.opens.get(), 2);
    let value = props.read(5, "libinput Accel Speed", 2).unwrap();
    assert_eq!(value, PropertyValue::Float(vec![0.5, -1.25]));
    state.assert_no_leaks();
}

/// If the FLOAT type atom cannot be resolved, the write connection is never
/// opened and no replace request is issued.
#[test]
fn float_type_failure_skips_write() {
    let server = MockServer::new();
    let state = server.state();
    state.refuse_float.set(true);
    state.register("libinput Accel Speed");
    let props = DeviceProps::with_backend(server);
    let result = props.write_floats(5, "libinput Accel Speed", &[0.5]);
    assert_eq!(result, Err(Error::UnknownType));
    assert_eq!(state.opens.get(), 1);
    assert_eq!(state.replaces.get(), 0);
    state.assert_no_leaks();
}

/// An unreachable display surfaces as `ConnectionFailed`.
#[test]
fn connect_failure_is_reported() {
    let server = MockServer::new();
    let state = server.state();
    state.fail_connect.set(true);
    state.register("Device Enabled");
    let props = DeviceProps::with_backend(server);
    match props.read(3, "Device Enabled", 1) {
        Err(Error::ConnectionFailed(_)) => (),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(state.attempts.get(), 1);
    state.assert_no_leaks();
}

/// A rejected fetch surfaces as `FetchFailed` and still releases the
/// connection.
#[test]
fn fetch_failure_is_reported() {
    let server = MockServer::new();
    let state = server.state();
    state.register("Device Enabled");
    state.fail_fetch.set(true);
    let props = DeviceProps::with_backend(server);
    match props.read(3, "Device Enabled", 1) {
        Err(Error::FetchFailed { device: 3, .. }) => (),
        other => panic!("unexpected result: {:?}", other),
    }
    state.assert_no_leaks();
}

/// A rejected replace surfaces as `ReplaceFailed` rather than being
/// silently ignored.
#[test]
fn replace_failure_is_reported() {
    let server = MockServer::new();
    let state = server.state();
    state.register("Device Enabled");
    state.fail_replace.set(true);
    let props = DeviceProps::with_backend(server);
    match props.write_bools(3, "Device Enabled", &[true]) {
        Err(Error::ReplaceFailed { device: 3, .. }) => (),
        other => panic!("unexpected result: {:?}", other),
    }
    state.assert_no_leaks();
}

/// A property longer than the fetch cap comes back truncated and fails the
/// exact-count check instead of returning partial data.
#[test]
fn fetch_cap_truncates() {
    let server = MockServer::new();
    let state = server.state();
    state.register("Axis Labels");
    let props = DeviceProps::with_backend(server).max_fetch_items(3);
    props
        .write_int32s(9, "Axis Labels", &[1, 2, 3, 4, 5])
        .unwrap();
    let result = props.read(9, "Axis Labels", 5);
    assert_eq!(
        result,
        Err(Error::ItemCountMismatch {
            device: 9,
            property: "Axis Labels".to_string(),
            expected: 5,
            actual: 3,
        })
    );
    state.assert_no_leaks();
}

/// Across a mix of successful and failing calls, every opened connection is
/// closed exactly once.
#[test]
fn no_connection_leaks_on_any_path() {
    let server = MockServer::new();
    let state = server.state();
    state.register("Device Enabled");
    state.register("libinput Accel Speed");
    let props = DeviceProps::with_backend(server);
    let _ = props.read(1, "", 1);
    let _ = props.read(1, "Missing", 1);
    let _ = props.write_int32s(2, "Device Enabled", &[1]);
    let _ = props.read(2, "Device Enabled", 1);
    let _ = props.read(2, "Device Enabled", 4);
    state.fail_fetch.set(true);
    let _ = props.read(2, "Device Enabled", 1);
    state.fail_fetch.set(false);
    let _ = props.write_floats(2, "libinput Accel Speed", &[1.0]);
    state.assert_no_leaks();
}
