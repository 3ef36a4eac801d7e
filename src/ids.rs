//! Strongly-typed identifiers for the tables in this crate.
//!
//! Mirrors the `NodeId`/`IndividualId`/... newtype convention used by the
//! `tskit` Rust bindings: a bare `i32` loses the distinction between "a row
//! in the node table" and "a row in the site table", which is exactly the
//! kind of mixup the C source's untyped `tsk_id_t` everywhere made easy.

use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub i64);

        impl $name {
            /// Sentinel value for "no such row" / "no parent" / etc.
            pub const NULL: $name = $name(-1);

            /// `true` if this id is [`Self::NULL`].
            pub fn is_null(self) -> bool {
                self == Self::NULL
            }

            pub fn as_usize(self) -> usize {
                debug_assert!(self.0 >= 0);
                self.0 as usize
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                $name(value)
            }
        }

        impl From<usize> for $name {
            fn from(value: usize) -> Self {
                $name(value as i64)
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

id_type!(
    /// A row id in the node table of a [`crate::tree_sequence_builder::TreeSequenceBuilder`].
    NodeId
);
id_type!(
    /// A site id, shared between the [`crate::ancestor_store::AncestorStore`] and the builder.
    SiteId
);
id_type!(
    /// A row id in the [`crate::ancestor_store::AncestorStore`]'s ancestor list.
    AncestorId
);
id_type!(
    /// A row id in a site's mutation list.
    MutationId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_negative_one() {
        assert_eq!(NodeId::NULL, NodeId(-1));
        assert!(NodeId::NULL.is_null());
        assert!(!NodeId(0).is_null());
    }

    #[test]
    fn round_trips_through_i64() {
        let n = NodeId::from(42i64);
        assert_eq!(i64::from(n), 42);
        assert_eq!(n.as_usize(), 42usize);
    }

    #[test]
    fn display_matches_inner_value() {
        assert_eq!(format!("{}", SiteId(7)), "7");
    }
}
