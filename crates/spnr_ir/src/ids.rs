//! Program graph IDs.

use spnr_common::define_id;

define_id!(
    /// Index of an [`Operation`](crate::Operation) in its [`Design`](crate::Design).
    OpId
);

define_id!(
    /// Index of a [`Value`](crate::Value) in its [`Design`](crate::Design).
    ValueId
);
