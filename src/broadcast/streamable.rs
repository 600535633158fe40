//! Naming channels after the things they stream.

use crate::error::{Result, StreamError};

/// Something a channel can be named after.
///
/// Strings name themselves; collections join their members' names with
/// `,`. Application types (records, rooms, users) implement this with a
/// stable identity such as `"Room:42"`.
pub trait Streamable {
    fn stream_name(&self) -> String;
}

impl Streamable for str {
    fn stream_name(&self) -> String {
        self.to_string()
    }
}

impl Streamable for String {
    fn stream_name(&self) -> String {
        self.clone()
    }
}

impl<T: Streamable + ?Sized> Streamable for &T {
    fn stream_name(&self) -> String {
        (**self).stream_name()
    }
}

impl<T: Streamable> Streamable for [T] {
    fn stream_name(&self) -> String {
        self.iter()
            .map(Streamable::stream_name)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl<T: Streamable> Streamable for Vec<T> {
    fn stream_name(&self) -> String {
        self.as_slice().stream_name()
    }
}

impl<T: Streamable, const N: usize> Streamable for [T; N] {
    fn stream_name(&self) -> String {
        self.as_slice().stream_name()
    }
}

/// Channel name for `stream`, rejecting names that cannot be subscribed to.
pub fn channel_name<S: Streamable + ?Sized>(stream: &S) -> Result<String> {
    let name = stream.stream_name();
    if name.is_empty() || name.split(',').any(str::is_empty) {
        return Err(StreamError::InvalidStreamable(format!(
            "empty stream name in {name:?}"
        )));
    }
    Ok(name)
}
