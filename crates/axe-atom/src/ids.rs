//! Entity identifiers
//!
//! ULID-based newtypes: sortable by creation time, `Copy`, and stable to
//! serialize. One type per entity so ids cannot be mixed up across tables.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub Ulid);

        impl $name {
            /// Generate a fresh id
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Unique atom identifier
    AtomId
);
id_type!(
    /// Unique task identifier
    TaskId
);
id_type!(
    /// Unique milestone identifier
    MilestoneId
);
id_type!(
    /// Unique phase identifier
    PhaseId
);
id_type!(
    /// Unique plan identifier
    PlanId
);
id_type!(
    /// Unique run identifier (one engine run of one plan)
    RunId
);
id_type!(
    /// Unique review-queue entry identifier
    EntryId
);
