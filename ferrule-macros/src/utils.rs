use proc_macro::{Delimiter, TokenStream, TokenTree};

/// Reads `worker_threads = N` from an attribute argument list.
///
/// Unknown keys are ignored. Returns `Err` with a message suitable for
/// `compile_error!` when the value is not a positive integer.
pub(crate) fn worker_threads(attr: &TokenStream) -> Result<Option<usize>, String> {
    let attr = attr.to_string();

    for part in attr.split(',') {
        let Some(value) = part.trim().strip_prefix("worker_threads") else {
            continue;
        };

        let value = value.trim().trim_start_matches('=').trim();
        return match value.parse::<usize>() {
            Ok(0) => Err("worker_threads must be > 0".to_string()),
            Ok(n) => Ok(Some(n)),
            Err(_) => Err(format!("invalid worker_threads value `{value}`")),
        };
    }

    Ok(None)
}

/// Removes the `async` keyword from a function signature.
pub(crate) fn strip_async(tokens: &mut Vec<TokenTree>) -> bool {
    let position = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "async"));

    match position {
        Some(pos) => {
            tokens.remove(pos);
            true
        }
        None => false,
    }
}

/// Position of the function body, i.e. the last brace-delimited group.
pub(crate) fn body_position(tokens: &[TokenTree]) -> Option<usize> {
    tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))
}

/// Replaces the function body with one that builds a runtime and blocks on
/// the original body.
pub(crate) fn wrap_body(tokens: &mut [TokenTree], pos: usize, worker_threads: Option<usize>) {
    let TokenTree::Group(group) = &tokens[pos] else {
        return;
    };

    let block = group.stream().to_string();

    let mut builder = String::from("::ferrule::RuntimeBuilder::new()");
    if let Some(n) = worker_threads {
        builder.push_str(&format!(".worker_threads({n})"));
    }
    builder.push_str(".build()");

    let body = format!(
        "{{
            let runtime = {builder};
            runtime.block_on(async move {{ {block} }})
        }}"
    );

    let stream = body
        .parse::<TokenStream>()
        .unwrap_or_else(|err| compile_error(&format!("failed to expand body: {err}")));

    tokens[pos] = TokenTree::Group(proc_macro::Group::new(Delimiter::Brace, stream));
}

pub(crate) fn compile_error(message: &str) -> TokenStream {
    format!("compile_error!({message:?});")
        .parse()
        .unwrap_or_default()
}
