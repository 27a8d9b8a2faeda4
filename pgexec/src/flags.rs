//! Execution flags passed to the [`Executor`][crate::executor::Executor].
use std::{fmt, ops};

/// Set of execution flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct QueryFlags(u16);

macro_rules! flags {
    ($($(#[$meta:meta])* $name:ident = $bit:literal;)*) => {
        impl QueryFlags {
            $(
                $(#[$meta])*
                pub const $name: QueryFlags = QueryFlags(1 << $bit);
            )*

            const NAMES: &[(QueryFlags, &str)] = &[$((QueryFlags::$name, stringify!($name)),)*];
        }
    };
}

flags! {
    /// Execute with the unnamed statement, nothing is kept server side.
    ONESHOT = 0;
    /// Row description is not needed.
    NO_METADATA = 1;
    /// Rows are discarded, only the command status matters.
    NO_RESULTS = 2;
    /// Page rows through a portal, `fetch_size` rows at a time.
    FORWARD_CURSOR = 3;
    /// Do not open an implicit transaction.
    SUPPRESS_BEGIN = 4;
    /// Parse and describe only, do not execute.
    DESCRIBE_ONLY = 5;
    /// Report both rows and the command status of a DML with `RETURNING`.
    BOTH_ROWS_AND_STATUS = 6;
    /// Request every column in text format.
    NO_BINARY_TRANSFER = 7;
    /// Describe the portal even if the statement was described before.
    FORCE_DESCRIBE_PORTAL = 8;
}

impl QueryFlags {
    pub const fn empty() -> QueryFlags {
        QueryFlags(0)
    }

    pub const fn bits(&self) -> u16 {
        self.0
    }

    /// Returns `true` if all flags in `other` are set.
    pub const fn contains(&self, other: QueryFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if any flag in `other` is set.
    pub const fn intersects(&self, other: QueryFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: QueryFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: QueryFlags) {
        self.0 &= !other.0;
    }
}

impl ops::BitOr for QueryFlags {
    type Output = QueryFlags;

    fn bitor(self, rhs: QueryFlags) -> QueryFlags {
        QueryFlags(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for QueryFlags {
    fn bitor_assign(&mut self, rhs: QueryFlags) {
        self.insert(rhs);
    }
}

impl fmt::Debug for QueryFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for (flag, name) in Self::NAMES {
            if self.contains(*flag) {
                set.entry(&format_args!("{name}"));
            }
        }
        set.finish()
    }
}
