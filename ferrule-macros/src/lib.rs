//! Attribute macros for the Ferrule runtime.
//!
//! - `#[ferrule::main]` turns `async fn main` into a blocking entry point.
//! - `#[ferrule::test]` does the same for `async` test functions.
//!
//! Both accept an optional `worker_threads = N` argument.

mod utils;

use proc_macro::{TokenStream, TokenTree};

/// Runs an `async fn main` on a fresh runtime.
///
/// ```rust,ignore
/// #[ferrule::main(worker_threads = 4)]
/// async fn main() {
///     let value = ferrule::task::submit(async { Ok(21 * 2) }).await.unwrap();
///     println!("{value}");
/// }
/// ```
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand(attr, item, false)
}

/// Runs an `async` test on a fresh runtime.
///
/// The function is also marked `#[test]`.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand(attr, item, true)
}

fn expand(attr: TokenStream, item: TokenStream, is_test: bool) -> TokenStream {
    let worker_threads = match utils::worker_threads(&attr) {
        Ok(n) => n,
        Err(message) => return utils::compile_error(&message),
    };

    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    if !utils::strip_async(&mut tokens) {
        return utils::compile_error("the async keyword is missing from the function declaration");
    }

    let Some(pos) = utils::body_position(&tokens) else {
        return utils::compile_error("expected a function body");
    };

    utils::wrap_body(&mut tokens, pos, worker_threads);

    let mut output: Vec<TokenTree> = Vec::new();
    if is_test {
        output.extend("#[::core::prelude::v1::test]".parse::<TokenStream>().unwrap_or_default());
    }
    output.extend(tokens);

    output.into_iter().collect()
}
