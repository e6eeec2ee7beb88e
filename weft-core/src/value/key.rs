//! Property and dependency keys.

use std::fmt;
use std::rc::Rc;

use super::{TargetKind, Value};

/// Reserved keys answered by a wrapped view from its own state.
///
/// Reading one of these never tracks and never reaches the raw target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactiveFlag {
    IsReactive,
    IsReadonly,
    IsShallow,
    /// The raw target behind the view.
    Raw,
    /// Whether the target has been marked raw.
    Skip,
}

/// A key into an observed container, and the unit of dependency tracking.
///
/// Records use [`Key::Prop`], arrays use [`Key::Index`] and [`Key::Length`],
/// map and set entries use [`Key::Entry`]. [`Key::Iterate`] and
/// [`Key::MapKeyIterate`] are sentinels standing for "the enumeration of this
/// container", and only ever appear in the dependency registry.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Prop(Rc<str>),
    Index(usize),
    Length,
    Iterate,
    MapKeyIterate,
    Entry(Value),
    /// The prototype pointer of a record.
    Proto,
    Flag(ReactiveFlag),
}

impl Key {
    /// Rewrite a key into the canonical form used for a container kind:
    /// numeric property names become indices on arrays, `"length"` becomes
    /// [`Key::Length`], and indices become property names on records.
    pub fn normalize(self, kind: TargetKind) -> Key {
        match (kind, self) {
            (TargetKind::Array, Key::Prop(name)) => {
                if &*name == "length" {
                    Key::Length
                } else if let Some(index) = parse_index(&name) {
                    Key::Index(index)
                } else {
                    Key::Prop(name)
                }
            }
            (TargetKind::Record, Key::Index(index)) => Key::Prop(Rc::from(index.to_string())),
            (TargetKind::Record, Key::Length) => Key::Prop(Rc::from("length")),
            (_, key) => key,
        }
    }

    /// Whether this key is a reserved key that is never tracked.
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            Key::Iterate | Key::MapKeyIterate | Key::Proto | Key::Flag(_)
        )
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(index) => Some(*index),
            _ => None,
        }
    }
}

/// Largest length an array may have. Valid indices are strictly below it.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

fn parse_index(name: &str) -> Option<usize> {
    // Only canonical decimal indices: "01" is a property, not an index.
    if name.is_empty() || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    name.parse::<usize>()
        .ok()
        .filter(|index| *index < MAX_ARRAY_LENGTH)
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Prop(name) => write!(f, "{name}"),
            Key::Index(index) => write!(f, "{index}"),
            Key::Length => f.write_str("length"),
            Key::Iterate => f.write_str("<iterate>"),
            Key::MapKeyIterate => f.write_str("<map-key-iterate>"),
            Key::Entry(value) => write!(f, "{value:?}"),
            Key::Proto => f.write_str("<prototype>"),
            Key::Flag(flag) => write!(f, "<{flag:?}>"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Prop(Rc::from(name))
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Prop(Rc::from(name))
    }
}

impl From<Rc<str>> for Key {
    fn from(name: Rc<str>) -> Self {
        Key::Prop(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<ReactiveFlag> for Key {
    fn from(flag: ReactiveFlag) -> Self {
        Key::Flag(flag)
    }
}
