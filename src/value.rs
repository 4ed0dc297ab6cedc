//! Typed property payloads.

/// A decoded property payload. The variant fixes how the elements travel on
/// the wire: `Bytes` as 8-bit values, `Int32` and `Float` as 32-bit words
/// (floats as their IEEE-754 bit patterns).
///
/// Keeping the element type in the value, rather than handing the caller a
/// raw byte buffer to reinterpret, means a property read back from the
/// server can be consumed without guessing its encoding.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    /// Boolean or byte data, format width 8.
    Bytes(Vec<u8>),
    /// 32-bit integer data, format width 32.
    Int32(Vec<i32>),
    /// 32-bit float data, format width 32, typed with the server's FLOAT atom.
    Float(Vec<f32>),
}

impl PropertyValue {
    /// Number of elements in the payload.
    pub fn len(&self) -> u32 {
        let n = match self {
            PropertyValue::Bytes(v) => v.len(),
            PropertyValue::Int32(v) => v.len(),
            PropertyValue::Float(v) => v.len(),
        };
        n as u32
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The format width (8 or 32) used when encoding each element.
    pub fn format(&self) -> u8 {
        match self {
            PropertyValue::Bytes(_) => 8,
            PropertyValue::Int32(_) => 32,
            PropertyValue::Float(_) => 32,
        }
    }

    /// The byte elements, if this is a `Bytes` value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PropertyValue::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// The integer elements, if this is an `Int32` value.
    pub fn as_int32(&self) -> Option<&[i32]> {
        match self {
            PropertyValue::Int32(v) => Some(v),
            _ => None,
        }
    }

    /// The float elements, if this is a `Float` value.
    pub fn as_float(&self) -> Option<&[f32]> {
        match self {
            PropertyValue::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Encode a boolean sequence as the 0/1 bytes the server stores.
    pub fn from_bools(values: &[bool]) -> PropertyValue {
        PropertyValue::Bytes(values.iter().map(|b| *b as u8).collect())
    }

    /// The payload as 32-bit protocol words. `None` for byte payloads.
    pub fn to_words(&self) -> Option<Vec<u32>> {
        match self {
            PropertyValue::Bytes(_) => None,
            PropertyValue::Int32(v) => Some(v.iter().map(|i| *i as u32).collect()),
            PropertyValue::Float(v) => Some(v.iter().map(|f| f.to_bits()).collect()),
        }
    }

    /// Decode 32-bit protocol words as integers.
    pub fn int32_from_words(words: Vec<u32>) -> PropertyValue {
        PropertyValue::Int32(words.into_iter().map(|w| w as i32).collect())
    }

    /// Decode 32-bit protocol words as floats.
    pub fn float_from_words(words: Vec<u32>) -> PropertyValue {
        PropertyValue::Float(words.into_iter().map(f32::from_bits).collect())
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(v: Vec<u8>) -> PropertyValue {
        PropertyValue::Bytes(v)
    }
}

impl From<Vec<i32>> for PropertyValue {
    fn from(v: Vec<i32>) -> PropertyValue {
        PropertyValue::Int32(v)
    }
}

impl From<Vec<f32>> for PropertyValue {
    fn from(v: Vec<f32>) -> PropertyValue {
        PropertyValue::Float(v)
    }
}

/// Confirm the format widths match what XIChangeProperty expects for each
/// variant.
#[test]
fn check_formats() {
    assert_eq!(PropertyValue::Bytes(vec![1]).format(), 8);
    assert_eq!(PropertyValue::Int32(vec![1]).format(), 32);
    assert_eq!(PropertyValue::Float(vec![1.0]).format(), 32);
}

/// Confirm booleans encode as the 0/1 bytes the server stores.
#[test]
fn check_bool_encoding() {
    let value = PropertyValue::from_bools(&[true, false, true]);
    assert_eq!(value, PropertyValue::Bytes(vec![1, 0, 1]));
    assert_eq!(value.len(), 3);
}

/// Confirm floats survive the trip through their wire representation.
#[test]
fn check_float_words() {
    let value = PropertyValue::Float(vec![1.5, -0.25, 0.0]);
    let words = value.to_words().unwrap();
    assert_eq!(PropertyValue::float_from_words(words), value);
}

/// Confirm negative integers survive the trip through unsigned words.
#[test]
fn check_int32_words() {
    let value = PropertyValue::Int32(vec![-1, 0, i32::max_value()]);
    let words = value.to_words().unwrap();
    assert_eq!(PropertyValue::int32_from_words(words), value);
}

/// Byte payloads have no 32-bit word form.
#[test]
fn check_bytes_have_no_words() {
    assert!(PropertyValue::Bytes(vec![1, 2]).to_words().is_none());
}

/// The variant accessors answer for their own variant only.
#[test]
fn check_accessors() {
    let value = PropertyValue::Int32(vec![7]);
    assert_eq!(value.as_int32(), Some(&[7][..]));
    assert_eq!(value.as_bytes(), None);
    assert_eq!(value.as_float(), None);
}
