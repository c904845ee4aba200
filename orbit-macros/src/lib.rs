mod utils;

use proc_macro::TokenStream;

/// Highest tuple arity accepted by `orbit::all` and `orbit::any`.
const MAX_BRANCHES: usize = 8;

fn combinator(name: &str, input: TokenStream) -> TokenStream {
    let args = utils::split_args(input);

    if args.is_empty() {
        return utils::compile_error(&format!("{name}! expects at least one invocation"));
    }

    if args.len() > MAX_BRANCHES {
        return utils::compile_error(&format!(
            "{name}! accepts at most {MAX_BRANCHES} invocations, got {}",
            args.len()
        ));
    }

    let tuple = args
        .iter()
        .map(|arg| format!("{},", utils::tokens_to_string(arg)))
        .collect::<String>();

    format!("::orbit::{name}(({tuple}))")
        .parse()
        .unwrap_or_else(|err| utils::compile_error(&format!("{name}! macro error: {err}")))
}

/// Awaitable that resolves once every invocation completed.
///
/// `all!(a, b)` is shorthand for `orbit::all((a, b))`.
#[proc_macro]
pub fn all(input: TokenStream) -> TokenStream {
    combinator("all", input)
}

/// Awaitable that resolves with the first invocation to succeed.
///
/// `any!(a, b)` is shorthand for `orbit::any((a, b))`.
#[proc_macro]
pub fn any(input: TokenStream) -> TokenStream {
    combinator("any", input)
}

/// Wraps an `async` body into a top-level invocation typed
/// `Async<(), orbit::Error>`, so `?` works on any error convertible into
/// `orbit::Error`.
fn invocation(body: &str) -> String {
    format!(
        "::orbit::Async::<(), ::orbit::Error>::new(async move {{
            {{ {body} }};
            ::core::result::Result::Ok(())
        }})"
    )
}

fn outcome(label: &str) -> String {
    format!(
        "match result {{
            ::core::option::Option::Some(::core::result::Result::Ok(())) => {{}}
            ::core::option::Option::Some(::core::result::Result::Err(error)) => {{
                ::core::panic!(\"{label} failed: {{}}\", error)
            }}
            ::core::option::Option::None => ::core::panic!(\"{label} was canceled\"),
        }}"
    )
}

/// Runs an `async fn main` to completion.
///
/// Without arguments the body runs on the calling thread. With
/// `#[orbit::main(cores = N)]` it runs on a [`MultiCoreExecutor`] of `N`
/// thread cores while the calling thread waits.
///
/// [`MultiCoreExecutor`]: https://docs.rs/orbit/latest/orbit/executor/struct.MultiCoreExecutor.html
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cores = utils::parse_attr_usize(&attr, "cores");

    let Some(function) = utils::parse_async_fn(item) else {
        return utils::compile_error("#[orbit::main] expects an async fn with a body");
    };

    let task = invocation(&function.body);
    let outcome = outcome("main");

    let block = match cores {
        None | Some(1) => format!(
            "{{
                let result = {task}.sync();
                {outcome}
            }}"
        ),
        Some(0) => return utils::compile_error("#[orbit::main] needs at least one core"),
        Some(n) => format!(
            "{{
                let executor = ::orbit::Executor::new();
                let cores = ::orbit::MultiCoreExecutor::<{n}>::with_threads(executor.clone());
                let mut task = {task};

                executor.enqueue(&task);
                cores.start().expect(\"failed to start the executor cores\");
                while executor.workload_count() > 0 {{
                    ::std::thread::yield_now();
                }}
                cores.stop().expect(\"failed to stop the executor cores\");

                let result = if task.is_completed() {{ task.move_result_out() }} else {{ ::core::option::Option::None }};
                {outcome}
            }}"
        ),
    };

    utils::with_body(function, block)
}

/// Runs an `async` test body to completion on a fresh executor.
///
/// The body may use `?` on errors convertible into `orbit::Error`; an error
/// or a cancellation fails the test.
#[proc_macro_attribute]
pub fn test(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let Some(function) = utils::parse_async_fn(item) else {
        return utils::compile_error("#[orbit::test] expects an async fn with a body");
    };

    let block = format!(
        "{{
            let result = {}.sync();
            {}
        }}",
        invocation(&function.body),
        outcome("test"),
    );

    let test_attr: TokenStream = "#[test]".parse().unwrap_or_default();

    [test_attr, utils::with_body(function, block)]
        .into_iter()
        .collect()
}
