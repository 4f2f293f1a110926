//! DSL AST types and `syn::parse::Parse` implementations.
//!
//! Parses the describe/it syntax into a structured AST.

use proc_macro2::{Span, TokenStream};
use syn::parse::{Parse, ParseStream};
use syn::{braced, parenthesized, Ident, LitInt, LitStr, Result, Token};

// ============================================================================
// AST types
// ============================================================================

/// Top-level suite: a list of DSL items.
#[derive(Debug)]
pub struct Suite {
    pub items: Vec<DslItem>,
}

/// A single DSL node.
#[derive(Debug)]
pub enum DslItem {
    Describe(DescribeBlock),
    It(ItBlock),
    Hook(HookBlock),
}

/// `describe "name" [timeout(N)] { ... }` / `context "name" { ... }`
#[derive(Debug)]
pub struct DescribeBlock {
    pub name: LitStr,
    pub timeout_ms: Option<u64>,
    pub items: Vec<DslItem>,
}

/// How a body signals completion.
#[derive(Debug, Clone)]
pub enum Style {
    /// Plain block; done when it returns.
    Sync,
    /// `async`: the block becomes an `async` block.
    Async,
    /// `|done|`: the block receives a `specrun::Done` bound to the ident.
    Callback(Ident),
}

/// Modifiers shared by cases and hooks.
#[derive(Debug)]
pub struct Modifiers {
    pub style: Style,
    /// `try`: the body evaluates to `Result<(), BoxError>` and may use `?`.
    pub fallible: bool,
    pub timeout_ms: Option<u64>,
}

/// `it "name" [async | |done|] [try] [timeout(N)] { ... }` / `test "name" ...`
#[derive(Debug)]
pub struct ItBlock {
    pub name: LitStr,
    pub modifiers: Modifiers,
    pub body: TokenStream,
}

/// The four lifecycle hook keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    BeforeAll,
    AfterAll,
    BeforeEach,
    AfterEach,
}

impl HookKind {
    pub fn keyword(self) -> &'static str {
        match self {
            HookKind::BeforeAll => "before_all",
            HookKind::AfterAll => "after_all",
            HookKind::BeforeEach => "before_each",
            HookKind::AfterEach => "after_each",
        }
    }
}

/// `before_each [async | |done|] [try] [timeout(N)] { ... }` and friends.
#[derive(Debug)]
pub struct HookBlock {
    pub kind: HookKind,
    pub span: Span,
    pub modifiers: Modifiers,
    pub body: TokenStream,
}

// ============================================================================
// Parsing
// ============================================================================

impl Parse for Suite {
    fn parse(input: ParseStream) -> Result<Self> {
        let items = parse_items(input)?;
        Ok(Suite { items })
    }
}

/// Parse a sequence of DSL items until the stream is exhausted.
///
/// A block may hold at most one hook of each kind.
fn parse_items(input: ParseStream) -> Result<Vec<DslItem>> {
    let mut items = Vec::new();
    let mut seen: Vec<HookKind> = Vec::new();
    while !input.is_empty() {
        let item = input.parse::<DslItem>()?;
        if let DslItem::Hook(hook) = &item {
            if seen.contains(&hook.kind) {
                return Err(syn::Error::new(
                    hook.span,
                    format!(
                        "each suite can only have a single `{}`",
                        hook.kind.keyword()
                    ),
                ));
            }
            seen.push(hook.kind);
        }
        items.push(item);
    }
    Ok(items)
}

impl Parse for DslItem {
    fn parse(input: ParseStream) -> Result<Self> {
        let ident: Ident = input.parse()?;
        let name = ident.to_string();

        let hook = |kind| parse_hook_block(input, kind, ident.span()).map(DslItem::Hook);

        match name.as_str() {
            // Container blocks
            "describe" | "context" => Ok(DslItem::Describe(parse_describe_block(input)?)),

            // Cases
            "it" | "test" => Ok(DslItem::It(parse_it_block(input)?)),

            // Hooks
            "before_all" => hook(HookKind::BeforeAll),
            "after_all" => hook(HookKind::AfterAll),
            "before_each" => hook(HookKind::BeforeEach),
            "after_each" => hook(HookKind::AfterEach),

            _ => Err(syn::Error::new(
                ident.span(),
                format!(
                    "unknown DSL keyword `{name}`. Expected one of: \
                     describe, context, it, test, before_all, after_all, \
                     before_each, after_each"
                ),
            )),
        }
    }
}

// ============================================================================
// Block parsers
// ============================================================================

/// Parse: `"name" [timeout(N)] { items... }`
fn parse_describe_block(input: ParseStream) -> Result<DescribeBlock> {
    let name: LitStr = input.parse()?;

    let mut timeout_ms = None;
    while !input.peek(syn::token::Brace) {
        let decorator: Ident = input.parse()?;
        if decorator != "timeout" || timeout_ms.is_some() {
            return Err(syn::Error::new(
                decorator.span(),
                format!("unexpected `{decorator}` on describe. Expected a single `timeout(ms)`"),
            ));
        }
        timeout_ms = Some(parse_timeout(input)?);
    }

    let content;
    braced!(content in input);
    let items = parse_items(&content)?;
    Ok(DescribeBlock {
        name,
        timeout_ms,
        items,
    })
}

/// Parse: `"name" [modifiers] { body }`
fn parse_it_block(input: ParseStream) -> Result<ItBlock> {
    let name: LitStr = input.parse()?;
    let modifiers = parse_modifiers(input)?;

    let body_content;
    braced!(body_content in input);
    let body: TokenStream = body_content.parse()?;

    Ok(ItBlock {
        name,
        modifiers,
        body,
    })
}

/// Parse: `[modifiers] { body }`
fn parse_hook_block(input: ParseStream, kind: HookKind, span: Span) -> Result<HookBlock> {
    let modifiers = parse_modifiers(input)?;

    let content;
    braced!(content in input);
    let body: TokenStream = content.parse()?;
    Ok(HookBlock {
        kind,
        span,
        modifiers,
        body,
    })
}

/// Style, `try` and timeout modifiers, in any order, each at most once.
fn parse_modifiers(input: ParseStream) -> Result<Modifiers> {
    let mut style: Option<Style> = None;
    let mut fallible: Option<Span> = None;
    let mut timeout_ms = None;

    while !input.peek(syn::token::Brace) {
        if input.peek(Token![try]) {
            let kw: Token![try] = input.parse()?;
            if fallible.is_some() {
                return Err(syn::Error::new(kw.span, "`try` given twice"));
            }
            fallible = Some(kw.span);
        } else if input.peek(Token![async]) {
            let kw: Token![async] = input.parse()?;
            if style.is_some() {
                return Err(syn::Error::new(kw.span, "completion style given twice"));
            }
            style = Some(Style::Async);
        } else if input.peek(Token![|]) {
            let open: Token![|] = input.parse()?;
            let done: Ident = input.parse()?;
            input.parse::<Token![|]>()?;
            if style.is_some() {
                return Err(syn::Error::new(open.spans[0], "completion style given twice"));
            }
            style = Some(Style::Callback(done));
        } else {
            let decorator: Ident = input.parse()?;
            match decorator.to_string().as_str() {
                "timeout" if timeout_ms.is_none() => timeout_ms = Some(parse_timeout(input)?),
                "timeout" => {
                    return Err(syn::Error::new(decorator.span(), "`timeout` given twice"));
                }
                other => {
                    return Err(syn::Error::new(
                        decorator.span(),
                        format!(
                            "unknown modifier `{other}`. Expected `async`, `|done|`, \
                             `try`, or `timeout(ms)`"
                        ),
                    ));
                }
            }
        }
    }

    let style = style.unwrap_or(Style::Sync);
    if let (Style::Callback(_), Some(span)) = (&style, fallible) {
        return Err(syn::Error::new(
            span,
            "`try` cannot be combined with `|done|`; report errors with `done.fail(..)`",
        ));
    }

    Ok(Modifiers {
        style,
        fallible: fallible.is_some(),
        timeout_ms,
    })
}

/// Parse: `(N)`
fn parse_timeout(input: ParseStream) -> Result<u64> {
    let content;
    parenthesized!(content in input);
    let n: LitInt = content.parse()?;
    n.base10_parse::<u64>()
}
