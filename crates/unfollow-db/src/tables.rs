use std::fmt;

/// Declares a redb table keyed by raw follower id with JSON-encoded values.
///
/// redb stores `u64` keys as 8 little-endian bytes and orders them
/// numerically.
#[macro_export]
macro_rules! def_table {
    ($(#[$outer:meta])*
        $name:ident : $k:ty => $v:ty) => {
        #[allow(unused)]
        $(#[$outer])*
        pub mod $name {
            use super::*;
            pub type Key = $k;
            pub type Value = $v;
            pub type Definition<'a> = redb::TableDefinition<'a, Key, Value>;
            pub type Table<'a> = redb::Table<'a, Key, Value>;
            pub const TABLE: Definition = redb::TableDefinition::new(stringify!($name));
        }
    };
}

def_table! {
    /// Accounts following us as of the last completed run
    active: u64 => &'static [u8]
}

def_table! {
    /// Accounts that used to follow us
    graveyard: u64 => &'static [u8]
}

/// Named partition of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Active,
    Graveyard,
}

impl Bucket {
    pub const ALL: [Bucket; 2] = [Bucket::Active, Bucket::Graveyard];

    pub fn name(self) -> &'static str {
        match self {
            Bucket::Active => "active",
            Bucket::Graveyard => "graveyard",
        }
    }

    pub(crate) fn table(self) -> active::Definition<'static> {
        match self {
            Bucket::Active => active::TABLE,
            Bucket::Graveyard => graveyard::TABLE,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
