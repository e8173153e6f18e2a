//! Recognition of frame injection requests in raw HTTP bytes.
//!
//! This is deliberately not an HTTP or form parser. A request is a control request
//! when its text contains [`CONTROL_MARKER`], and the payload is taken from the
//! first CRLF separated line starting with [`HEX_FIELD`]. Only `+` and `%20` are
//! decoded; other percent escapes are passed through untouched.

use arrayvec::ArrayVec;

/// Size of the single read performed per connection.
pub const REQUEST_CAPACITY: usize = 1024;

/// Marks a form submission to the send endpoint.
pub const CONTROL_MARKER: &str = "POST /send";

/// Prefix of the body line carrying the frame.
pub const HEX_FIELD: &str = "hex_data=";

/// Bytes received from one connection within its read window. May be truncated.
#[derive(Debug, Clone, Default)]
pub struct PendingRequest(ArrayVec<u8, REQUEST_CAPACITY>);

impl PendingRequest {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The hex payload, if this is a control request. See [`extract_hex_payload()`].
    pub fn hex_payload(&self) -> Option<String> {
        extract_hex_payload(&self.0)
    }
}

impl From<&[u8]> for PendingRequest {
    fn from(bytes: &[u8]) -> Self {
        let len = bytes.len().min(REQUEST_CAPACITY);
        let mut buf = ArrayVec::new();
        let _ = buf.try_extend_from_slice(&bytes[..len]);
        Self(buf)
    }
}

/// Pull the `hex_data` value out of a raw control request.
///
/// Returns `None` if `raw` isn't valid UTF-8, isn't a control request, or has no
/// line starting with `hex_data=`. Only the first such line is used, and only the
/// first `=` on it separates name from value.
pub fn extract_hex_payload(raw: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(raw).ok()?;
    if !text.contains(CONTROL_MARKER) {
        return None;
    }
    let line = text.split("\r\n").find(|line| line.starts_with(HEX_FIELD))?;
    let (_name, value) = line.split_once('=')?;
    Some(value.replace('+', " ").replace("%20", " "))
}
