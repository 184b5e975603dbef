//! Tag handler registration.
//!
//! A [`TagTable`] maps tag names to [`Handler`]s. The host populates it
//! before building a pipe; from then on it is only read. A handler is one of
//! three kinds, chosen at registration time:
//!
//! - **Static** ([`StaticTag`]): output depends only on the tag and a
//!   record. When a static record is supplied and every child is static,
//!   the handler runs once while the pipe is built and its result is reused
//!   by every render. Otherwise it runs on every render.
//! - **Dynamic** ([`DynamicTag`]): bound once per tag occurrence to produce
//!   a [`RenderFn`], which is called on every render with the record and the
//!   tag's rendered children.
//! - **Value**: a constant, always static.
//!
//! There are two ways to provide a handler: closure wrappers
//! ([`ClosureStatic`], [`ClosureDynamic`]) for the common case, or
//! implementing the traits directly. The `#[static_tag]` and
//! `#[dynamic_tag]` macros in the `kurly_macros` crate generate trait
//! implementations from a plain function.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::ast::value::Value;
use crate::error::EvalError;
use crate::eval::Record;
use crate::pipe::TagContext;

/// Key of the handler used for any tag name without an exact match.
pub const WILDCARD: &str = "*";

/// A per-render function produced by a handler.
///
/// Receives the record passed to the render call and the flattened output
/// of the tag's body. Whatever it returns replaces the tag in the output;
/// an [`Array`](Value::Array) is spliced in element by element.
pub type RenderFn = Arc<dyn Fn(&Record, Vec<Value>) -> Result<Value, EvalError> + Send + Sync>;

/// Wrap a closure as a [`RenderFn`].
///
/// ```rust
/// use kurly::{render_fn, Record, Value};
///
/// let f = render_fn(|_rec, children| {
///     let mut out = vec![Value::from("prefix")];
///     out.extend(children);
///     Ok(Value::Array(out))
/// });
/// let out = f(&Record::new(), vec!["X".into()]).unwrap();
/// assert_eq!(out, Value::from(vec!["prefix", "X"]));
/// ```
pub fn render_fn<F>(f: F) -> RenderFn
where
    F: Fn(&Record, Vec<Value>) -> Result<Value, EvalError> + Send + Sync + 'static,
{
    Arc::new(f)
}

// ── Trait definitions ───────────────────────────────────────────────────

/// A handler whose output is a function of the tag and a record only.
///
/// It never receives its children directly. Use
/// [`children`](crate::children) to render them when needed.
pub trait StaticTag: Send + Sync {
    fn render(&self, ctx: &TagContext, rec: &Record) -> Result<Value, EvalError>;

    /// Declare the tag name this handler is registered under.
    fn signature(&self) -> TagSignature;
}

/// A handler recomputed on every render.
///
/// `bind` is called once per tag occurrence while the pipe is built. The
/// returned [`RenderFn`] may keep the context alive by cloning the `Arc`.
pub trait DynamicTag: Send + Sync {
    fn bind(&self, ctx: &Arc<TagContext>) -> Result<RenderFn, EvalError>;

    /// Declare the tag name this handler is registered under.
    fn signature(&self) -> TagSignature;
}

/// Describes which tag name a handler claims. Use [`WILDCARD`] to claim
/// every name without a more specific handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSignature {
    pub name: String,
}

impl TagSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A registered handler.
#[derive(Clone)]
pub enum Handler {
    Static(Arc<dyn StaticTag>),
    Dynamic(Arc<dyn DynamicTag>),
    /// A constant. Renders as itself and ignores the tag's body.
    Value(Value),
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Static(h) => write!(f, "Static({})", h.signature().name),
            Handler::Dynamic(h) => write!(f, "Dynamic({})", h.signature().name),
            Handler::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

// ── Tag table ───────────────────────────────────────────────────────────

/// Handlers keyed by tag name.
///
/// ```rust
/// use kurly::{render_fn, ClosureDynamic, ClosureStatic, TagTable, Value};
///
/// let mut tags = TagTable::new();
/// tags.register_static(ClosureStatic::new("site", |_ctx, rec| {
///     Ok(rec.get("site").cloned().unwrap_or(Value::None))
/// }));
/// tags.register_dynamic(ClosureDynamic::new("*", |ctx| {
///     let name = ctx.name.clone();
///     Ok(render_fn(move |_rec, _children| Ok(Value::String(name.to_uppercase()))))
/// }));
/// tags.register_value("year", 2024i64);
/// assert_eq!(tags.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TagTable {
    handlers: HashMap<String, Handler>,
}

impl TagTable {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a static handler. If a handler with the same name already
    /// exists, it is replaced.
    pub fn register_static(&mut self, tag: impl StaticTag + 'static) {
        let sig = tag.signature();
        self.handlers.insert(sig.name, Handler::Static(Arc::new(tag)));
    }

    /// Register a dynamic handler. If a handler with the same name already
    /// exists, it is replaced.
    pub fn register_dynamic(&mut self, tag: impl DynamicTag + 'static) {
        let sig = tag.signature();
        self.handlers.insert(sig.name, Handler::Dynamic(Arc::new(tag)));
    }

    /// Register a constant rendered in place of every `name` tag.
    pub fn register_value(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.handlers.insert(name.into(), Handler::Value(value.into()));
    }

    /// Register an already-built handler under `name`.
    pub fn insert(&mut self, name: impl Into<String>, handler: Handler) {
        self.handlers.insert(name.into(), handler);
    }

    /// The handler registered under exactly `name`.
    pub fn get(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    /// The handler for `name`, falling back to the [`WILDCARD`] handler.
    pub fn resolve(&self, name: &str) -> Option<&Handler> {
        self.handlers
            .get(name)
            .or_else(|| self.handlers.get(WILDCARD))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

// ── Closure-based convenience wrappers ──────────────────────────────────

/// A [`StaticTag`] implementation backed by a closure.
///
/// ```rust
/// use kurly::{ClosureStatic, Value};
///
/// let upper = ClosureStatic::new("upper", |ctx, _rec| {
///     Ok(Value::String(ctx.text.to_uppercase()))
/// });
/// ```
pub struct ClosureStatic<F>
where
    F: Fn(&TagContext, &Record) -> Result<Value, EvalError> + Send + Sync,
{
    sig: TagSignature,
    func: F,
}

impl<F> ClosureStatic<F>
where
    F: Fn(&TagContext, &Record) -> Result<Value, EvalError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            sig: TagSignature::new(name),
            func,
        }
    }
}

impl<F> StaticTag for ClosureStatic<F>
where
    F: Fn(&TagContext, &Record) -> Result<Value, EvalError> + Send + Sync,
{
    fn render(&self, ctx: &TagContext, rec: &Record) -> Result<Value, EvalError> {
        (self.func)(ctx, rec)
    }

    fn signature(&self) -> TagSignature {
        self.sig.clone()
    }
}

/// A [`DynamicTag`] implementation backed by a closure that builds the
/// per-render function.
///
/// ```rust
/// use kurly::{render_fn, ClosureDynamic, Value};
///
/// let greet = ClosureDynamic::new("*", |ctx| {
///     let name = ctx.name.clone();
///     Ok(render_fn(move |rec, _children| {
///         let greeting = rec.get_str("greet").unwrap_or("Hello");
///         Ok(Value::String(format!("{greeting} {name}")))
///     }))
/// });
/// ```
pub struct ClosureDynamic<F>
where
    F: Fn(&Arc<TagContext>) -> Result<RenderFn, EvalError> + Send + Sync,
{
    sig: TagSignature,
    func: F,
}

impl<F> ClosureDynamic<F>
where
    F: Fn(&Arc<TagContext>) -> Result<RenderFn, EvalError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            sig: TagSignature::new(name),
            func,
        }
    }
}

impl<F> DynamicTag for ClosureDynamic<F>
where
    F: Fn(&Arc<TagContext>) -> Result<RenderFn, EvalError> + Send + Sync,
{
    fn bind(&self, ctx: &Arc<TagContext>) -> Result<RenderFn, EvalError> {
        (self.func)(ctx)
    }

    fn signature(&self) -> TagSignature {
        self.sig.clone()
    }
}
