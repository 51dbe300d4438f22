mod enums;

use proc_macro::TokenStream;

/// Implement `std::fmt::Display` for a fieldless enum, printing the variant name as written.
///
/// Also adds a `to_str(&self) -> &'static str` method.
///
/// # Panics
///
/// This macro will panic if applied to a struct, a union, or an enum with any variants that have
/// fields.
#[proc_macro_derive(EnumDisplay)]
pub fn enum_display(input: TokenStream) -> TokenStream {
    enums::enum_display(input)
}

/// Implement `std::str::FromStr` for a fieldless enum. Matching against variant names is
/// case-insensitive and the error type is `String`.
///
/// # Panics
///
/// This macro will panic if applied to a struct, a union, or an enum with any variants that have
/// fields.
#[proc_macro_derive(EnumFromStr)]
pub fn enum_from_str(input: TokenStream) -> TokenStream {
    enums::enum_from_str(input)
}
