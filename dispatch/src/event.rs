//! Copy-on-write parsed messages handed to hooks.

use std::borrow::Cow;
use std::ops::{Deref, DerefMut};

use schema::Object;

use crate::hook::Flags;

/// A decoded message as seen by one parsed hook.
///
/// The event borrows the decoded value shared by every hook of the same
/// definition version and clones it on the first mutable access, so edits
/// stay private to the hook unless it returns [`Verdict::Accept`].
///
/// [`Verdict::Accept`]: crate::Verdict::Accept
#[derive(Debug)]
pub struct Event<'a> {
    name: &'a str,
    version: u32,
    flags: Flags,
    data: Cow<'a, Object>,
}

impl<'a> Event<'a> {
    pub(crate) fn new(name: &'a str, version: u32, data: &'a Object, flags: Flags) -> Self {
        Self {
            name,
            version,
            flags,
            data: Cow::Borrowed(data),
        }
    }

    pub const fn name(&self) -> &str {
        self.name
    }

    pub const fn version(&self) -> u32 {
        self.version
    }

    pub const fn flags(&self) -> Flags {
        self.flags
    }

    pub fn data(&self) -> &Object {
        &self.data
    }

    /// Returns the private copy, cloning the shared value first if needed.
    pub fn data_mut(&mut self) -> &mut Object {
        self.data.to_mut()
    }

    /// Returns `true` once this hook holds its own copy.
    pub const fn is_edited(&self) -> bool {
        matches!(self.data, Cow::Owned(_))
    }

    pub fn into_data(self) -> Object {
        self.data.into_owned()
    }
}

impl Deref for Event<'_> {
    type Target = Object;

    fn deref(&self) -> &Object {
        &self.data
    }
}

impl DerefMut for Event<'_> {
    fn deref_mut(&mut self) -> &mut Object {
        self.data.to_mut()
    }
}

#[cfg(test)]
mod tests {
    use schema::Value;

    use super::*;

    #[test]
    fn reads_do_not_clone() {
        let shared = Object::new().with("id", 7u32);
        let event = Event::new("S_TEST", 1, &shared, Flags::default());
        assert_eq!(event.get("id"), Some(&Value::UInt32(7)));
        assert!(!event.is_edited());
    }

    #[test]
    fn writes_stay_private() {
        let shared = Object::new().with("id", 7u32);
        let mut event = Event::new("S_TEST", 1, &shared, Flags::default());
        event.insert("id", 9u32);
        assert!(event.is_edited());
        assert_eq!(event.into_data().get("id"), Some(&Value::UInt32(9)));
        assert_eq!(shared.get("id"), Some(&Value::UInt32(7)));
    }
}
