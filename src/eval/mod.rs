//! Rendering.
//!
//! A [`Renderer`] walks a [`Pipe`] in document order. Literal text is
//! emitted as is, static tags emit the value computed when the pipe was
//! built, and dynamic tags first render their own body, then hand the
//! flattened result to their [`RenderFn`] as `children`. Static handlers
//! that could not run at build time are called directly and render their
//! body only if they ask for it. Every per-node result is spliced into one
//! flat output sequence.
//!
//! Children are always passed explicitly as the second argument of a
//! [`RenderFn`]. The record is never cloned or extended with the rendered
//! children. Static handlers, which do not receive children, use
//! [`children`] instead.

use crate::ast::node::Node;
use crate::ast::value::{Value, join};
use crate::error::EvalError;
use crate::parser::DEFAULT_MAX_DEPTH;
use crate::pipe::{Pipe, PipeElement, Resolved, TagContext, pipe_with_options};
use crate::registry::{RenderFn, TagTable};

mod record;

pub use record::Record;

/// Build a [`Renderer`] for a prebuilt pipe.
///
/// `rec` is the record used by [`Renderer::render_default`]. When `parent`
/// is given, the rendered output is passed to it as `children` and its
/// return value becomes the result.
///
/// ```rust
/// use kurly::{evaluate, parse, pipe, render_fn, Record, TagTable, Value};
///
/// let ast = parse("X{y}").unwrap();
/// let mut tags = TagTable::new();
/// tags.register_value("y", "Y");
/// let pipe = pipe(&ast, &tags, None).unwrap();
///
/// let parent = render_fn(|_rec, children| {
///     let mut out = vec![Value::from("prefix")];
///     out.extend(children);
///     Ok(Value::Array(out))
/// });
/// let renderer = evaluate(pipe, None, Some(parent));
/// assert_eq!(
///     renderer.render(&Record::new()).unwrap(),
///     vec![Value::from("prefix"), Value::from("X"), Value::from("Y")]
/// );
/// ```
pub fn evaluate(pipe: Pipe, rec: Option<&Record>, parent: Option<RenderFn>) -> Renderer {
    Renderer {
        pipe,
        rec: rec.cloned(),
        parent,
    }
}

/// Resolve `ast` against `tags` and return a [`Renderer`] in one step.
///
/// `rec` is the static record: when given, static handlers without dynamic
/// descendants run once now, and [`Renderer::render_default`] uses it.
///
/// This is the only compile path. It always builds a [`Pipe`] with
/// [`pipe_with_options`] and wraps it with [`evaluate`]; there is no variant
/// that takes a parent callback and skips the intermediate pipe. Use
/// [`evaluate`] directly to attach a parent.
///
/// ```rust
/// use kurly::{compile, join, parse, render_fn, ClosureDynamic, Record, TagTable, Value};
///
/// let mut tags = TagTable::new();
/// tags.register_dynamic(ClosureDynamic::new("*", |ctx| {
///     let name = ctx.name.clone();
///     Ok(render_fn(move |rec, _children| {
///         let greet = rec.get_str("greet").unwrap_or("Hello");
///         Ok(Value::String(format!("{greet} {name}")))
///     }))
/// }));
///
/// let ast = parse("{a}, {b}.").unwrap();
/// let renderer = compile(&ast, &tags, None).unwrap();
/// let out = renderer.render(&Record::new().with("greet", "Hi")).unwrap();
/// assert_eq!(join(&out), "Hi a, Hi b.");
/// ```
pub fn compile(ast: &[Node], tags: &TagTable, rec: Option<&Record>) -> Result<Renderer, EvalError> {
    compile_with_options(ast, tags, rec, &EvalOptions::default())
}

/// [`compile`] with a custom nesting limit.
pub fn compile_with_options(
    ast: &[Node],
    tags: &TagTable,
    rec: Option<&Record>,
    options: &EvalOptions,
) -> Result<Renderer, EvalError> {
    let pipe = pipe_with_options(ast, tags, rec, options)?;
    Ok(evaluate(pipe, rec, None))
}

/// Render the body of the tag described by `ctx` against `rec`.
///
/// Intended for static handlers, which are not handed their children:
///
/// ```rust
/// use kurly::{children, compile, join, parse, ClosureStatic, Record, TagTable, Value};
///
/// let mut tags = TagTable::new();
/// tags.register_static(ClosureStatic::new("upper", |ctx, rec| {
///     Ok(Value::String(join(&children(ctx, rec)?).to_uppercase()))
/// }));
/// tags.register_value("name", "world");
///
/// let ast = parse("{upper hello {name}}").unwrap();
/// let renderer = compile(&ast, &tags, Some(&Record::new())).unwrap();
/// assert!(renderer.is_static());
/// assert_eq!(renderer.render_to_string(&Record::new()).unwrap(), "HELLO WORLD");
/// ```
pub fn children(ctx: &TagContext, rec: &Record) -> Result<Vec<Value>, EvalError> {
    render_pipe(&ctx.ast, rec)
}

// ── Evaluation options ──────────────────────────────────────────────────

/// Configuration for pipe construction.
///
/// ```rust
/// use kurly::EvalOptions;
///
/// let opts = EvalOptions::new().max_depth(16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalOptions {
    /// Maximum tag nesting depth before a
    /// [`RecursionLimit`](crate::EvalErrorKind::RecursionLimit) error.
    /// A tag at the top level has depth 1.
    pub max_depth: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EvalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_depth(mut self, limit: usize) -> Self {
        self.max_depth = limit;
        self
    }
}

// ── Renderer ────────────────────────────────────────────────────────────

/// A compiled template, callable any number of times and from any number
/// of threads.
pub struct Renderer {
    pipe: Pipe,
    rec: Option<Record>,
    parent: Option<RenderFn>,
}

impl Renderer {
    /// Render against `rec`, producing a flat output sequence.
    ///
    /// With a parent, its return value is the result: an array becomes the
    /// sequence, anything else a single element.
    pub fn render(&self, rec: &Record) -> Result<Vec<Value>, EvalError> {
        let children = render_pipe(&self.pipe, rec)?;
        match &self.parent {
            Some(parent) => {
                let mut out = Vec::new();
                parent(rec, children)?.splice_into(&mut out);
                Ok(out)
            }
            None => Ok(children),
        }
    }

    /// Render against the record bound at compile time, or an empty record
    /// when there is none.
    pub fn render_default(&self) -> Result<Vec<Value>, EvalError> {
        match &self.rec {
            Some(rec) => self.render(rec),
            None => self.render(&Record::new()),
        }
    }

    /// Render and concatenate the output.
    pub fn render_to_string(&self, rec: &Record) -> Result<String, EvalError> {
        self.render(rec).map(|out| join(&out))
    }

    pub fn pipe(&self) -> &Pipe {
        &self.pipe
    }

    /// `true` when no part of the output depends on the render record.
    pub fn is_static(&self) -> bool {
        self.parent.is_none() && self.pipe.is_static()
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("pipe", &self.pipe)
            .field("rec", &self.rec)
            .field("parent", &self.parent.is_some())
            .finish()
    }
}

fn render_pipe(pipe: &Pipe, rec: &Record) -> Result<Vec<Value>, EvalError> {
    let mut out = Vec::with_capacity(pipe.len());
    for element in pipe.elements() {
        match element {
            PipeElement::Text(text) => out.push(Value::String(text.clone())),
            PipeElement::Tag(node) => match &node.tag {
                Resolved::Static(value) => value.clone().splice_into(&mut out),
                Resolved::Dynamic(render) => {
                    let children = render_pipe(&node.ctx.ast, rec)?;
                    render(rec, children)?.splice_into(&mut out);
                }
                Resolved::Deferred(handler) => handler.render(&node.ctx, rec)?.splice_into(&mut out),
            },
        }
    }
    Ok(out)
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalErrorKind;
    use crate::parser::parse;
    use crate::registry::{ClosureDynamic, ClosureStatic, render_fn};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn strings(items: &[&str]) -> Vec<Value> {
        items.iter().map(|s| Value::from(*s)).collect()
    }

    fn render_with(source: &str, tags: &TagTable, rec: &Record) -> Vec<Value> {
        let ast = parse(source).expect("parse failed");
        compile(&ast, tags, None)
            .expect("compile failed")
            .render(rec)
            .expect("render failed")
    }

    fn wrap_tags() -> TagTable {
        let mut tags = TagTable::new();
        tags.register_dynamic(ClosureDynamic::new("test", |_ctx| {
            Ok(render_fn(|_rec, _children| Ok(Value::from("TEST"))))
        }));
        tags.register_dynamic(ClosureDynamic::new("hello", |_ctx| {
            Ok(render_fn(|_rec, children| {
                let mut out = strings(&["Hello"]);
                out.extend(children);
                Ok(Value::Array(out))
            }))
        }));
        tags.register_dynamic(ClosureDynamic::new("world", |_ctx| {
            Ok(render_fn(|rec, _children| {
                Ok(rec.get("planet").cloned().unwrap_or_else(|| "World".into()))
            }))
        }));
        tags
    }

    #[test]
    fn test_literal() {
        let out = render_with("Hello, world!", &TagTable::new(), &Record::new());
        assert_eq!(out, strings(&["Hello, world!"]));
    }

    #[test]
    fn test_empty_template() {
        assert!(render_with("", &TagTable::new(), &Record::new()).is_empty());
    }

    #[test]
    fn test_children_are_spliced_in_order() {
        let rec = Record::new().with("planet", "Earth");
        let out = render_with("this is a {test}: {hello, {world}!}", &wrap_tags(), &rec);
        assert_eq!(
            out,
            strings(&["this is a ", "TEST", ": ", "Hello", ", ", "Earth", "!"])
        );
    }

    #[test]
    fn test_record_defaults_inside_handler() {
        let out = render_with("{world}", &wrap_tags(), &Record::new());
        assert_eq!(out, strings(&["World"]));
    }

    #[test]
    fn test_wildcard_dispatch() {
        let mut tags = TagTable::new();
        tags.register_dynamic(ClosureDynamic::new("*", |ctx| {
            let name = ctx.name.clone();
            Ok(render_fn(move |rec, _children| {
                let greet = rec.get_str("greet").unwrap_or_default();
                Ok(Value::String(format!("{greet} {name}")))
            }))
        }));
        let out = render_with("{a}, {b}.", &tags, &Record::new().with("greet", "Hi"));
        assert_eq!(out, strings(&["Hi a", ", ", "Hi b", "."]));
    }

    #[test]
    fn test_unhandled_tag_renders_source() {
        let out = render_with("a {b \\} c} d", &TagTable::new(), &Record::new());
        assert_eq!(out, strings(&["a ", "{b } c}", " d"]));
    }

    #[test]
    fn test_static_output_is_reused() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut tags = TagTable::new();
        tags.register_static(ClosureStatic::new("site", move |_ctx, rec| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(rec.get("site").cloned().unwrap_or(Value::None))
        }));
        let ast = parse("@{site}").unwrap();
        let static_rec = Record::new().with("site", "example.org");
        let renderer = compile(&ast, &tags, Some(&static_rec)).unwrap();

        let other = Record::new().with("site", "ignored");
        assert_eq!(renderer.render(&other).unwrap(), strings(&["@", "example.org"]));
        assert_eq!(renderer.render_default().unwrap(), strings(&["@", "example.org"]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_static_handler_without_record_runs_per_render() {
        let mut tags = TagTable::new();
        tags.register_static(ClosureStatic::new("site", |_ctx, rec| {
            Ok(rec.get("site").cloned().unwrap_or(Value::None))
        }));
        let ast = parse("{site}").unwrap();
        let renderer = compile(&ast, &tags, None).unwrap();
        assert!(!renderer.is_static());
        let a = renderer.render(&Record::new().with("site", "a")).unwrap();
        let b = renderer.render(&Record::new().with("site", "b")).unwrap();
        assert_eq!((a, b), (strings(&["a"]), strings(&["b"])));
    }

    #[test]
    fn test_static_parent_of_dynamic_child_sees_render_record() {
        let mut tags = TagTable::new();
        tags.register_static(ClosureStatic::new("upper", |ctx, rec| {
            Ok(Value::String(join(&children(ctx, rec)?).to_uppercase()))
        }));
        tags.register_dynamic(ClosureDynamic::new("name", |_ctx| {
            Ok(render_fn(|rec, _children| Ok(rec.get("name").cloned().unwrap_or(Value::None))))
        }));
        let ast = parse("{upper hi {name}}").unwrap();
        let renderer = compile(&ast, &tags, Some(&Record::new())).unwrap();
        assert!(!renderer.is_static());
        let out = renderer.render(&Record::new().with("name", "ada")).unwrap();
        assert_eq!(out, strings(&["HI ADA"]));
    }

    #[test]
    fn test_nested_static_handlers_render_body_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut tags = TagTable::new();
        tags.register_static(ClosureStatic::new("upper", |ctx, rec| {
            Ok(Value::String(join(&children(ctx, rec)?).to_uppercase()))
        }));
        tags.register_dynamic(ClosureDynamic::new("leaf", move |_ctx| {
            let counter = Arc::clone(&counter);
            Ok(render_fn(move |_rec, _children| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from("x"))
            }))
        }));

        let depth = 24;
        let source = format!("{}{{leaf}}{}", "{upper ".repeat(depth), "}".repeat(depth));
        let ast = parse(&source).unwrap();
        let renderer = compile(&ast, &tags, Some(&Record::new())).unwrap();

        for round in 1..=3 {
            assert_eq!(renderer.render_to_string(&Record::new()).unwrap(), "X");
            assert_eq!(calls.load(Ordering::SeqCst), round);
        }
    }

    #[test]
    fn test_render_default_without_record() {
        let mut tags = TagTable::new();
        tags.register_value("x", 1i64);
        let ast = parse("{x}").unwrap();
        let renderer = compile(&ast, &tags, None).unwrap();
        assert_eq!(renderer.render_default().unwrap(), vec![Value::Number(1.0)]);
    }

    #[test]
    fn test_scalar_parent_result_is_single_element() {
        let ast = parse("a{b}c").unwrap();
        let pipe = crate::pipe::pipe(&ast, &TagTable::new(), None).unwrap();
        let parent = render_fn(|_rec, children| Ok(Value::Number(children.len() as f64)));
        let renderer = evaluate(pipe, None, Some(parent));
        assert!(!renderer.is_static());
        assert_eq!(renderer.render(&Record::new()).unwrap(), vec![Value::Number(3.0)]);
    }

    #[test]
    fn test_handler_error_propagates_unmodified() {
        let mut tags = TagTable::new();
        tags.register_dynamic(ClosureDynamic::new("fail", |_ctx| {
            Ok(render_fn(|_rec, _children| {
                Err(EvalError::handler("boom").with_source(std::fmt::Error))
            }))
        }));
        let ast = parse("ok {fail}").unwrap();
        let renderer = compile(&ast, &tags, None).unwrap();
        let err = renderer.render(&Record::new()).unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::Handler);
        assert_eq!(err.message, "boom");
        assert!(err.source.is_some());
    }

    #[test]
    fn test_renderer_is_reentrant_across_threads() {
        let mut tags = TagTable::new();
        tags.register_dynamic(ClosureDynamic::new("n", |_ctx| {
            Ok(render_fn(|rec, _children| Ok(rec.get("n").cloned().unwrap_or(Value::None))))
        }));
        let ast = parse("n={n}").unwrap();
        let renderer = compile(&ast, &tags, None).unwrap();

        std::thread::scope(|s| {
            for i in 0..4i64 {
                let renderer = &renderer;
                s.spawn(move || {
                    let rec = Record::new().with("n", i);
                    assert_eq!(renderer.render_to_string(&rec).unwrap(), format!("n={i}"));
                });
            }
        });
    }

    #[test]
    fn test_compile_depth_limit() {
        let mut tags = TagTable::new();
        tags.register_value("*", Value::None);
        let ast = parse("{a {b}}").unwrap();
        let err = compile_with_options(&ast, &tags, None, &EvalOptions::new().max_depth(1))
            .unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::RecursionLimit);
    }
}
