//! Procedural macros for testkit-poll
//!
//! This crate provides the `#[testkit_poll::test]` attribute macro, which
//! wraps a sync or async test, optionally injects a virtual clock, and can
//! check that the test left no tracked activity running.
//!
//! # Example
//!
//! ```rust,ignore
//! use testkit_poll::clock::MockClock;
//!
//! #[testkit_poll::test(leak_check = true)]
//! fn my_test(clock: MockClock) {
//!     clock.advance(std::time::Duration::from_secs(10));
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input, FnArg, Ident, ItemFn, Lit, Pat, ReturnType, Token, Type,
};

/// Default budget for the leak check, in milliseconds.
const DEFAULT_LEAK_TIMEOUT_MS: u64 = 1000;

/// Configuration options for the test macro.
#[derive(Default)]
struct TestConfig {
    /// Check for leaked activities after the body
    leak_check: bool,
    /// How long leaked activities get to finish
    leak_timeout_ms: Option<u64>,
    /// Initial time for the mock clock, in seconds
    start_time_secs: Option<u64>,
    /// Flavor for the tokio runtime ("current_thread" or "multi_thread")
    flavor: Option<String>,
}

impl Parse for TestConfig {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut config = TestConfig::default();

        while !input.is_empty() {
            let ident: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            let lit: Lit = input.parse()?;

            match (ident.to_string().as_str(), lit) {
                ("leak_check", Lit::Bool(b)) => config.leak_check = b.value(),
                ("leak_timeout_ms", Lit::Int(i)) => {
                    config.leak_timeout_ms = Some(i.base10_parse()?);
                }
                ("start_time", Lit::Int(i)) => config.start_time_secs = Some(i.base10_parse()?),
                ("flavor", Lit::Str(s)) => match s.value().as_str() {
                    "current_thread" | "multi_thread" => config.flavor = Some(s.value()),
                    other => {
                        return Err(syn::Error::new(
                            s.span(),
                            format!("unsupported flavor: {other}"),
                        ))
                    }
                },
                ("leak_check" | "leak_timeout_ms" | "start_time" | "flavor", lit) => {
                    return Err(syn::Error::new(
                        lit.span(),
                        format!("invalid value for {ident}"),
                    ));
                }
                _ => {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("unknown attribute: {ident}"),
                    ));
                }
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(config)
    }
}

/// Determines if a function parameter is requesting a MockClock.
fn is_clock_param(arg: &FnArg) -> bool {
    if let FnArg::Typed(pat_type) = arg {
        if let Type::Path(type_path) = &*pat_type.ty {
            if let Some(segment) = type_path.path.segments.last() {
                return segment.ident == "MockClock";
            }
        }
    }
    false
}

/// Extracts the parameter name from a function argument.
fn get_param_name(arg: &FnArg) -> Option<&Pat> {
    if let FnArg::Typed(pat_type) = arg {
        Some(&pat_type.pat)
    } else {
        None
    }
}

/// Test attribute macro for polling tests.
///
/// Works on both sync and async functions. Sync tests become ordinary
/// `#[test]` functions; async tests run on tokio.
///
/// # With MockClock Injection
///
/// Add a `clock: MockClock` parameter to receive a fresh virtual clock:
///
/// ```rust,ignore
/// use testkit_poll::clock::MockClock;
/// use testkit_poll::{eventually, matcher::equal};
///
/// #[testkit_poll::test]
/// fn test_with_clock(clock: MockClock) {
///     eventually(1).with_clock(clock.clone()).should(equal(1));
/// }
/// ```
///
/// # Configuration Options
///
/// - `leak_check = true` - snapshot tracked activities before the body and
///   assert afterwards that none were leaked
/// - `leak_timeout_ms = 500` - how long leaked activities get to finish
///   (default: 1000)
/// - `start_time = 100` - clock start time in seconds (default: 0)
/// - `flavor = "multi_thread"` - tokio runtime flavor for async tests
///
/// ```rust,ignore
/// #[testkit_poll::test(leak_check = true, leak_timeout_ms = 200)]
/// async fn test_no_leaks() {
///     let handle = testkit_poll::leak::spawn("worker", || {}).unwrap();
///     handle.join().unwrap();
/// }
/// ```
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let config = parse_macro_input!(attr as TestConfig);
    let input = parse_macro_input!(item as ItemFn);

    expand_test(&config, &input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_test(config: &TestConfig, input: &ItemFn) -> syn::Result<TokenStream2> {
    let name = &input.sig.ident;
    let body = &input.block;
    let attrs = &input.attrs;
    let vis = &input.vis;
    let output = &input.sig.output;
    let is_async = input.sig.asyncness.is_some();

    let mut clock_name = None;
    for arg in &input.sig.inputs {
        match get_param_name(arg) {
            Some(pat) if is_clock_param(arg) && clock_name.is_none() => clock_name = Some(pat),
            _ => {
                return Err(syn::Error::new_spanned(
                    arg,
                    "test functions may only take a single `MockClock` parameter",
                ))
            }
        }
    }

    if !is_async && config.flavor.is_some() {
        return Err(syn::Error::new_spanned(
            &input.sig,
            "`flavor` only applies to async tests",
        ));
    }

    // Generate clock initialization
    let clock_init = match clock_name {
        Some(clock_name) => {
            let start_time = config.start_time_secs.unwrap_or(0);
            quote! {
                let #clock_name = ::testkit_poll::clock::MockClock::with_start_time(
                    ::std::time::Duration::from_secs(#start_time)
                );
            }
        }
        None => quote! {},
    };

    let ret_ty = match output {
        ReturnType::Default => quote! { () },
        ReturnType::Type(_, ty) => quote! { #ty },
    };

    let leak_before = if config.leak_check {
        quote! { let __testkit_poll_before = ::testkit_poll::leak::activities(); }
    } else {
        quote! {}
    };

    let leak_timeout = config.leak_timeout_ms.unwrap_or(DEFAULT_LEAK_TIMEOUT_MS);
    let leak_check = |wait: TokenStream2| {
        if config.leak_check {
            quote! {
                ::testkit_poll::eventually_fn(::testkit_poll::leak::activities)
                    .within(::std::time::Duration::from_millis(#leak_timeout))
                    .annotate("tracked activities leaked")
                    #wait;
            }
        } else {
            quote! {}
        }
    };

    let expanded = if is_async {
        let leak_after = leak_check(quote! {
            .should_not_async(::testkit_poll::leak::have_leaked(__testkit_poll_before))
            .await
        });
        let flavor_attr = match config.flavor.as_deref() {
            Some("multi_thread") => quote! { #[::tokio::test(flavor = "multi_thread")] },
            _ => quote! { #[::tokio::test] },
        };
        quote! {
            #flavor_attr
            #(#attrs)*
            #vis async fn #name() #output {
                #clock_init
                #leak_before
                let __testkit_poll_result: #ret_ty = async move #body.await;
                #leak_after
                __testkit_poll_result
            }
        }
    } else {
        let leak_after = leak_check(quote! {
            .should_not(::testkit_poll::leak::have_leaked(__testkit_poll_before))
        });
        quote! {
            #[::core::prelude::v1::test]
            #(#attrs)*
            #vis fn #name() #output {
                #clock_init
                #leak_before
                let __testkit_poll_result: #ret_ty = (move || -> #ret_ty #body)();
                #leak_after
                __testkit_poll_result
            }
        }
    };

    Ok(expanded)
}
