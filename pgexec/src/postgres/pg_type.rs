/// Postgres object identifier.
///
/// The oid type is implemented as an unsigned four-byte integer.
///
/// <https://www.postgresql.org/docs/current/datatype-oid.html>
pub type Oid = u32;

/// A type that have corresponding postgres oid.
pub trait PgType {
    const OID: Oid;
}

macro_rules! oid {
    ($ty:ty, $oid:literal $(, $doc:literal)? ) => {
        impl PgType for $ty {
            $(#[doc = $doc])?
            const OID: Oid = $oid;
        }
    };
}

oid!(bool, 16);
oid!(i64, 20, "`int8` ~18 digit integer, 8-byte storage");
oid!(i16, 21, "`int2` -32 thousand to 32 thousand, 2-byte storage");
oid!(i32, 23, "`int4` -2 billion to 2 billion integer, 4-byte storage");
oid!(str, 25, "`text` variable-length string, no limit specified");
oid!(String, 25, "`text` variable-length string, no limit specified");
oid!(f32, 700, "`float4` single-precision floating point number, 4-byte storage");
oid!(f64, 701, "`float8` double-precision floating point number, 8-byte storage");
oid!([u8], 17, "`bytea` variable-length string, binary values escaped");
oid!(Vec<u8>, 17, "`bytea` variable-length string, binary values escaped");

macro_rules! types {
    ($($name:ident = $oid:literal, $pg:literal, $sql:ident;)*) => {
        /// Closed set of wire types the value codec understands.
        ///
        /// Any other oid is carried as [`Type::Other`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Type {
            $($name,)*
            Other(Oid),
        }

        impl Type {
            /// Lookup type from its oid.
            pub const fn from_oid(oid: Oid) -> Type {
                match oid {
                    $($oid => Type::$name,)*
                    _ => Type::Other(oid),
                }
            }

            /// Returns the type oid.
            pub const fn oid(&self) -> Oid {
                match self {
                    $(Type::$name => $oid,)*
                    Type::Other(oid) => *oid,
                }
            }

            /// Returns postgres type name.
            pub const fn name(&self) -> &'static str {
                match self {
                    $(Type::$name => $pg,)*
                    Type::Other(_) => "unknown",
                }
            }

            /// Returns the generic sql type category.
            pub const fn sql_type(&self) -> SqlType {
                match self {
                    $(Type::$name => SqlType::$sql,)*
                    Type::Other(_) => SqlType::Other,
                }
            }
        }
    };
}

types! {
    Bool = 16, "bool", Bit;
    Bytea = 17, "bytea", Binary;
    Char = 18, "char", Char;
    Name = 19, "name", Varchar;
    Int8 = 20, "int8", BigInt;
    Int2 = 21, "int2", SmallInt;
    Int4 = 23, "int4", Integer;
    Text = 25, "text", Varchar;
    Oid = 26, "oid", BigInt;
    Json = 114, "json", Other;
    Float4 = 700, "float4", Real;
    Float8 = 701, "float8", Double;
    Unknown = 705, "unknown", Varchar;
    Money = 790, "money", Double;
    Bpchar = 1042, "bpchar", Char;
    Varchar = 1043, "varchar", Varchar;
    Date = 1082, "date", Date;
    Time = 1083, "time", Time;
    Timestamp = 1114, "timestamp", Timestamp;
    Timestamptz = 1184, "timestamptz", Timestamp;
    Timetz = 1266, "timetz", Time;
    Numeric = 1700, "numeric", Numeric;
    Void = 2278, "void", Other;
    Uuid = 2950, "uuid", Other;
    Jsonb = 3802, "jsonb", Other;
}

impl Type {
    /// Oid used for parameters whose type is left for the server to infer.
    pub const UNSPECIFIED: Oid = 0;

    /// Returns `true` for types whose text form is a date/time value.
    pub const fn is_temporal(&self) -> bool {
        matches!(
            self,
            Type::Date | Type::Time | Type::Timetz | Type::Timestamp | Type::Timestamptz
        )
    }
}

/// Generic sql type category, used for registered out parameters and
/// for getter compatibility checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Bit,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Numeric,
    Char,
    Varchar,
    Binary,
    Date,
    Time,
    Timestamp,
    Other,
}

impl SqlType {
    /// Normalize registered out type the way callable checks expect.
    ///
    /// `Char` compares as `Varchar`.
    pub const fn normalized(self) -> SqlType {
        match self {
            SqlType::Char => SqlType::Varchar,
            other => other,
        }
    }
}
