//! Proc macros for the `specrun` test runner.

mod codegen;
mod dsl;

/// Test runner macro: generates a `fn main()` that declares the tree and
/// runs it with colored tree output.
///
/// # Setup
///
/// In `Cargo.toml`:
/// ```toml
/// [[test]]
/// name = "my_specs"
/// harness = false
/// ```
///
/// In your test file:
/// ```text
/// specrun::suite! {
///     describe "Calculator" {
///         before_each { reset(); }
///
///         it "adds" { assert_eq!(2 + 3, 5); }
///
///         it "parses" try {
///             assert_eq!("5".parse::<i32>()?, 5);
///             Ok(())
///         }
///
///         it "waits" async timeout(100) {
///             tokio::time::sleep(std::time::Duration::from_millis(5)).await;
///         }
///
///         test "signals" |done| {
///             std::thread::spawn(move || done.ok());
///         }
///     }
/// }
/// ```
///
/// # Supported DSL keywords
///
/// ## Containers
/// - `describe "name" { ... }` / `context "name" { ... }`
/// - `describe "name" timeout(ms) { ... }`: timeout inherited by everything inside
///
/// ## Cases
/// - `it "name" { ... }` / `test "name" { ... }`
///
/// ## Lifecycle hooks (at most one of each per block)
/// - `before_all { ... }`: once, before the block's cases
/// - `after_all { ... }`: once, after the block's cases and nested blocks
/// - `before_each { ... }`: before every case directly in this block
/// - `after_each { ... }`: after every case directly in this block, even when
///   the case body failed
///
/// ## Modifiers (cases and hooks, any order)
/// - `async`: the body is an `async` block
/// - `|done|`: the body receives a `specrun::Done` handle and must signal it
/// - `try`: the body evaluates to `Result<(), specrun::BoxError>` and may use `?`
///   (plain or `async`, not `|done|`)
/// - `timeout(ms)`: overrides the inherited timeout
///
/// # Execution order
///
/// ```text
/// before_all -> (before_each -> body -> after_each) per case -> nested blocks -> after_all
/// ```
#[proc_macro]
pub fn suite(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let suite = syn::parse_macro_input!(input as dsl::Suite);
    codegen::generate_main(suite).into()
}

/// Generate just the declaration closure (no `fn main()`), for building a tree
/// with a custom root or runner:
///
/// ```text
/// fn main() {
///     let root = specrun::Context::root("api", std::time::Duration::from_secs(5))
///         .declare(specrun::declare! {
///             describe "API" { it "responds" { assert!(true); } }
///         })
///         .finish()
///         .expect("valid declarations");
///     let outcome = specrun::Runner::new(&specrun::RunConfig::default())
///         .execute(root)
///         .expect("runtime");
///     std::process::exit(outcome.exit_code());
/// }
/// ```
#[proc_macro]
pub fn declare(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let suite = syn::parse_macro_input!(input as dsl::Suite);
    codegen::generate_declarations(suite).into()
}
