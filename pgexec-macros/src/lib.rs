//! Derive macros for `pgexec`.
use proc_macro::TokenStream;
use syn::DeriveInput;

mod from_row;
mod decode;

macro_rules! error {
    ($($tt:tt)*) => {
        return Err(syn::Error::new(proc_macro::Span::call_site().into(), format!($($tt)*)))
    };
}

pub(crate) use error;

/// Derive `FromRow` for a struct.
///
/// Named fields are matched by column label, ignoring ascii case. Tuple
/// fields are taken by position. A field can be renamed with
/// `#[sql(rename = "label")]`.
#[proc_macro_derive(FromRow, attributes(sql))]
pub fn from_row(input: TokenStream) -> TokenStream {
    match from_row::from_row(syn::parse_macro_input!(input as DeriveInput)) {
        Ok(ok) => ok,
        Err(err) => err.into_compile_error().into(),
    }
}

/// Derive `Decode` for a single field struct, delegating to the field.
#[proc_macro_derive(Decode)]
pub fn decode(input: TokenStream) -> TokenStream {
    match decode::decode(syn::parse_macro_input!(input as DeriveInput)) {
        Ok(ok) => ok,
        Err(err) => err.into_compile_error().into(),
    }
}
