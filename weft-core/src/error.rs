//! Diagnostics raised by the engine.
//!
//! Nothing here is ever returned as a hard failure from a read or write.
//! Misuse of a wrapped value (writing through a readonly view, aliasing a raw
//! and a wrapped key in the same map) is reported as a [`ReactiveError`]
//! through [`crate::config::report`] and the operation degrades to a neutral
//! result, so code holding a view never crashes on it.

use thiserror::Error;

use crate::value::TargetKind;

/// A policy violation detected while operating on a wrapped value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A mutation was attempted through a readonly view.
    #[error("{op} operation {}failed: target is readonly", on_key(.key))]
    Readonly {
        /// The attempted operation (`Set`, `Delete`, `Add`, `Clear`).
        op: &'static str,
        /// Debug rendering of the key involved, if any.
        key: Option<String>,
    },

    /// A write was forwarded into a cell that cannot be assigned.
    #[error("write to readonly cell {key} was rejected")]
    ReadonlyCell {
        /// The property that holds the cell.
        key: String,
    },

    /// A map holds both the raw and the wrapped form of the same object as
    /// distinct keys.
    #[error(
        "reactive map contains both the raw and reactive versions of the same object {key}, \
         which can lead to inconsistencies; avoid differentiating between the raw and \
         reactive versions of an object and only use the reactive version if possible"
    )]
    AliasedKey {
        /// Debug rendering of the aliased key.
        key: String,
    },

    /// Only object-like values can be wrapped.
    #[error("value cannot be made reactive: {value}")]
    NotObject {
        /// Debug rendering of the rejected value.
        value: String,
    },

    /// A collection operation was used on a target of the wrong kind.
    #[error("{op} is not supported on a {kind} target")]
    Unsupported {
        /// The attempted operation.
        op: &'static str,
        /// The kind of the target it was attempted on.
        kind: TargetKind,
    },
}

fn on_key(key: &Option<String>) -> String {
    match key {
        Some(key) => format!("on key \"{key}\" "),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readonly_message_names_key() {
        let err = ReactiveError::Readonly {
            op: "Set",
            key: Some("count".into()),
        };
        assert_eq!(
            err.to_string(),
            "Set operation on key \"count\" failed: target is readonly"
        );
    }

    #[test]
    fn readonly_message_without_key() {
        let err = ReactiveError::Readonly {
            op: "Clear",
            key: None,
        };
        assert_eq!(err.to_string(), "Clear operation failed: target is readonly");
    }

    #[test]
    fn unsupported_message_names_kind() {
        let err = ReactiveError::Unsupported {
            op: "add",
            kind: TargetKind::Map,
        };
        assert_eq!(err.to_string(), "add is not supported on a map target");
    }
}
