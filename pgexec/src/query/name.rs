//! Server side statement and portal names.
use std::sync::atomic::{AtomicU32, Ordering};

const LEN: usize = 11;

/// Fixed width name, a kind prefix followed by a zero padded counter.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Id([u8; LEN]);

impl Id {
    fn unnamed() -> Self {
        Self([b'?'; LEN])
    }

    fn next(prefix: u8, atomic: &AtomicU32) -> Self {
        let id = atomic.fetch_add(1, Ordering::Relaxed);
        let mut buf = [b'0'; LEN];
        buf[0] = prefix;

        let mut b = itoa::Buffer::new();
        let id = b.format(id);
        let i = id.as_bytes();
        buf[LEN - i.len()..].copy_from_slice(i);

        Self(buf)
    }

    pub fn as_str(&self) -> &str {
        if self.is_unnamed() {
            return "";
        }
        // only ascii is ever written
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    pub fn is_unnamed(&self) -> bool {
        self.0[0] == b'?'
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_tuple("Id").field(&self.as_str()).finish()
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

macro_rules! delegate {
    ($name:ident, $prefix:literal, $counter:ident) => {
        #[derive(Clone, PartialEq, Eq, Hash)]
        pub struct $name(Id);

        impl $name {
            /// The unnamed statement or portal.
            pub fn unnamed() -> Self {
                Self(Id::unnamed())
            }
        }

        impl NameGenerator {
            #[doc = concat!("Returns a new, session unique, [`", stringify!($name), "`].")]
            pub fn $counter(&self) -> $name {
                $name(Id::next($prefix, &self.$counter))
            }
        }

        impl std::ops::Deref for $name {
            type Target = Id;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.as_str()).finish()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Per session name counters.
#[derive(Debug, Default)]
pub struct NameGenerator {
    statement: AtomicU32,
    portal: AtomicU32,
}

delegate!(StatementName, b's', statement);
delegate!(PortalName, b'p', portal);
