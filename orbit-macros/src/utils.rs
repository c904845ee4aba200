use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Splits a `TokenStream` into comma-separated arguments.
///
/// Each argument is returned as a `Vec<TokenTree>`. Only top-level commas
/// separate arguments, so commas inside a turbofish (`f::<A, B>()`) split
/// too: such calls must be wrapped in parentheses.
pub(crate) fn split_args(input: TokenStream) -> Vec<Vec<TokenTree>> {
    let mut args = Vec::new();
    let mut current = Vec::new();

    for token in input {
        match &token {
            TokenTree::Punct(p) if p.as_char() == ',' => {
                if !current.is_empty() {
                    args.push(current);
                    current = Vec::new();
                }
            }
            _ => current.push(token),
        }
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}

/// Converts a slice of tokens into a Rust source string.
///
/// Consecutive identifiers are separated by a space so that `move x` does
/// not turn into `movex`.
pub(crate) fn tokens_to_string(tokens: &[TokenTree]) -> String {
    let mut out = String::new();
    let mut prev_was_ident = false;

    for t in tokens {
        let needs_space = prev_was_ident && matches!(t, TokenTree::Ident(_));

        if needs_space {
            out.push(' ');
        }

        out.push_str(&t.to_string());
        prev_was_ident = matches!(t, TokenTree::Ident(_));
    }

    out
}

/// Reads `key = value` pairs from an attribute argument list.
pub(crate) fn parse_attr_usize(attr: &TokenStream, key: &str) -> Option<usize> {
    let attr = attr.to_string();

    attr.split(',').find_map(|part| {
        let value = part.trim().strip_prefix(key)?;
        value.trim_start().strip_prefix('=')?.trim().parse().ok()
    })
}

/// Pieces of an `async fn` item rewritten by the attribute macros.
pub(crate) struct AsyncFn {
    pub(crate) tokens: Vec<TokenTree>,
    pub(crate) body_pos: usize,
    pub(crate) body: String,
}

/// Strips the `async` keyword from `item` and locates its body.
///
/// Returns `None` if the item has no braced body.
pub(crate) fn parse_async_fn(item: TokenStream) -> Option<AsyncFn> {
    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    if let Some(pos) = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "async"))
    {
        tokens.remove(pos);
    }

    let body_pos = tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))?;

    let body = match &tokens[body_pos] {
        TokenTree::Group(g) => g.stream().to_string(),
        _ => return None,
    };

    Some(AsyncFn {
        tokens,
        body_pos,
        body,
    })
}

/// Replaces the body of `function` with `block`.
pub(crate) fn with_body(mut function: AsyncFn, block: String) -> TokenStream {
    let stream = match block.parse::<TokenStream>() {
        Ok(stream) => stream,
        Err(err) => return compile_error(&format!("failed to expand body: {err}")),
    };

    function.tokens[function.body_pos] = TokenTree::Group(Group::new(Delimiter::Brace, stream));
    function.tokens.into_iter().collect()
}

pub(crate) fn compile_error(message: &str) -> TokenStream {
    format!("compile_error!({message:?});")
        .parse()
        .unwrap_or_default()
}
