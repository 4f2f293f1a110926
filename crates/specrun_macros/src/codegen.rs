//! Code generation: turns the DSL AST into `specrun::Context` calls.

use proc_macro2::{Ident, Span, TokenStream};
use quote::quote;

use crate::dsl::*;

/// Name of the `&mut specrun::Context` binding threaded through the
/// generated closures. Leading underscores keep empty blocks warning-free.
fn ctx_ident() -> Ident {
    Ident::new("__specrun_ctx", Span::call_site())
}

// ============================================================================
// Public entry points
// ============================================================================

/// Generate a `fn main()` that declares the tree and hands it to `specrun::run`.
pub fn generate_main(suite: Suite) -> TokenStream {
    let body = generate_declarations(suite);
    quote! {
        fn main() {
            ::specrun::run(#body);
        }
    }
}

/// Generate a declaration closure `|ctx: &mut specrun::Context| { ... }`.
pub fn generate_declarations(suite: Suite) -> TokenStream {
    let ctx = ctx_ident();
    let items = generate_items(&suite.items);
    quote! {
        |#ctx: &mut ::specrun::Context| {
            #(#items)*
        }
    }
}

// ============================================================================
// Item generation
// ============================================================================

fn generate_items(items: &[DslItem]) -> Vec<TokenStream> {
    items
        .iter()
        .map(|item| match item {
            DslItem::Describe(block) => generate_describe(block),
            DslItem::It(block) => generate_it(block),
            DslItem::Hook(block) => generate_hook(block),
        })
        .collect()
}

fn generate_describe(block: &DescribeBlock) -> TokenStream {
    let ctx = ctx_ident();
    let name = &block.name;
    let inner = generate_items(&block.items);

    match block.timeout_ms {
        Some(ms) => quote! {
            #ctx.describe_with_timeout(#name, #ms, |#ctx: &mut ::specrun::Context| {
                #(#inner)*
            });
        },
        None => quote! {
            #ctx.describe(#name, |#ctx: &mut ::specrun::Context| {
                #(#inner)*
            });
        },
    }
}

fn generate_it(block: &ItBlock) -> TokenStream {
    let ctx = ctx_ident();
    let name = &block.name;
    let step = generate_step(&block.modifiers, &block.body);
    let timeout = generate_timeout(block.modifiers.timeout_ms);
    quote! {
        #ctx.case(#name, #step)#timeout;
    }
}

fn generate_hook(block: &HookBlock) -> TokenStream {
    let ctx = ctx_ident();
    let method = Ident::new(block.kind.keyword(), Span::call_site());
    let step = generate_step(&block.modifiers, &block.body);
    let timeout = generate_timeout(block.modifiers.timeout_ms);
    quote! {
        #ctx.#method(#step)#timeout;
    }
}

/// Wrap a body in the `specrun::Step` constructor for its style.
///
/// `try` bodies get an explicit `BoxError` error type so `?` works on any
/// error without annotations.
fn generate_step(modifiers: &Modifiers, body: &TokenStream) -> TokenStream {
    match (&modifiers.style, modifiers.fallible) {
        (Style::Sync, false) => quote! {
            ::specrun::Step::sync(|| { #body })
        },
        (Style::Sync, true) => quote! {
            ::specrun::Step::try_sync(
                || -> ::std::result::Result<(), ::specrun::BoxError> { #body }
            )
        },
        (Style::Async, false) => quote! {
            ::specrun::Step::future(|| async { #body })
        },
        (Style::Async, true) => quote! {
            ::specrun::Step::try_future::<_, _, ::specrun::BoxError>(|| async { #body })
        },
        // The parser rejects `try` on callback bodies.
        (Style::Callback(done), _) => quote! {
            ::specrun::Step::callback(|#done: ::specrun::Done| { #body })
        },
    }
}

fn generate_timeout(timeout_ms: Option<u64>) -> TokenStream {
    match timeout_ms {
        Some(ms) => quote! { .timeout(#ms) },
        None => quote! {},
    }
}
