//! Opaque ID newtypes.
//!
//! [`define_id!`](crate::define_id) generates thin `u32` wrappers used as
//! dense arena indices for resource nodes, operations and values. They are
//! `Copy`, `Ord`, `Hash` and `Serialize`/`Deserialize`.

/// Defines an opaque `u32` index newtype.
///
/// The generated type offers `from_raw`, `as_raw` and `index` (as `usize`)
/// and displays as its raw number.
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug,
            serde::Serialize, serde::Deserialize,
        )]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Creates an ID from a `usize` arena position.
            pub fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }

            /// Returns the index as a `usize` for arena access.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    define_id!(
        /// Test ID.
        TestId
    );

    #[test]
    fn roundtrip() {
        let id = TestId::from_raw(42);
        assert_eq!(id.as_raw(), 42);
        assert_eq!(id.index(), 42);
        assert_eq!(TestId::from_index(7), TestId::from_raw(7));
    }

    #[test]
    fn ordering_and_hash() {
        assert!(TestId::from_raw(1) < TestId::from_raw(2));
        let mut set = HashSet::new();
        set.insert(TestId::from_raw(1));
        set.insert(TestId::from_raw(1));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn display_and_serde() {
        let id = TestId::from_raw(55);
        assert_eq!(format!("{id}"), "55");
        let json = serde_json::to_string(&id).unwrap();
        let back: TestId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
