//! Augment the development of primitives with procedural macros.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemFn, LitStr};

/// Run a test function with a [tracing_subscriber] fmt subscriber installed at the provided
/// level (defaults to `DEBUG`).
///
/// The subscriber writes through the test harness so output is only shown for failing tests.
/// Crates using this macro must depend on `tracing` and `tracing-subscriber`.
///
/// # Example
/// ```rust,ignore
/// use mweb_macros::test_traced;
///
/// #[test_traced("INFO")]
/// fn test_something() {
///     tracing::info!("visible when the test fails");
/// }
/// ```
#[proc_macro_attribute]
pub fn test_traced(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    // Parse the level (defaulting to DEBUG)
    let level = if attr.is_empty() {
        "DEBUG".to_string()
    } else {
        parse_macro_input!(attr as LitStr).value()
    };
    let level = match level.to_ascii_uppercase().as_str() {
        "TRACE" => quote! { ::tracing::Level::TRACE },
        "DEBUG" => quote! { ::tracing::Level::DEBUG },
        "INFO" => quote! { ::tracing::Level::INFO },
        "WARN" => quote! { ::tracing::Level::WARN },
        "ERROR" => quote! { ::tracing::Level::ERROR },
        other => {
            let message = format!(
                "invalid level `{}`: expected one of TRACE, DEBUG, INFO, WARN, ERROR",
                other
            );
            return syn::Error::new(proc_macro2::Span::call_site(), message)
                .to_compile_error()
                .into();
        }
    };

    let name = &input.sig.ident;
    let output = &input.sig.output;
    let attrs = &input.attrs;
    let vis = &input.vis;
    let block = &input.block;

    let expanded = quote! {
        #[test]
        #(#attrs)*
        #vis fn #name() #output {
            let subscriber = ::tracing_subscriber::fmt()
                .with_test_writer()
                .with_max_level(#level)
                .with_line_number(true)
                .finish();
            let dispatcher = ::tracing::Dispatch::new(subscriber);
            ::tracing::dispatcher::with_default(&dispatcher, || #block)
        }
    };
    TokenStream::from(expanded)
}
