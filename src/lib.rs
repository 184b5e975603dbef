//! # kurly
//!
//! A small, pluggable templating engine core. Templates are strings with
//! tags in curly braces. kurly provides the parsing and rendering. You
//! provide the tags.
//!
//! The pipeline runs one way:
//!
//! - [`parse`] turns a string into an [`Ast`] of literal fragments and
//!   [`TagNode`]s, each holding the parsed AST of its own body.
//! - [`pipe`] resolves every tag against a [`TagTable`]. Static handlers
//!   with an all-static body run once here when a static record is given.
//! - [`evaluate`] (or [`compile`], which does both steps) yields a
//!   [`Renderer`] that turns a [`Record`] into a flat `Vec<Value>`.
//!
//! ## Quick start
//!
//! ```rust
//! use kurly::{render, render_fn, ClosureDynamic, Record, TagTable, Value};
//!
//! let mut tags = TagTable::new();
//! tags.register_dynamic(ClosureDynamic::new("cool", |_ctx| {
//!     Ok(render_fn(|_rec, children| {
//!         let mut out = vec![Value::from("great ")];
//!         out.extend(children);
//!         Ok(Value::Array(out))
//!     }))
//! }));
//! tags.register_dynamic(ClosureDynamic::new("sub", |_ctx| {
//!     Ok(render_fn(|rec, _children| {
//!         let kind = rec.get_str("type").unwrap_or("plain");
//!         Ok(Value::String(format!("nested {kind}")))
//!     }))
//! }));
//!
//! let rec = Record::new().with("type", "kurly");
//! let output = render("This is a {cool example of {sub} tags}", &tags, &rec).unwrap();
//! assert_eq!(output, "This is a great example of nested kurly tags");
//! ```
//!
//! ## Compiled templates
//!
//! For repeated rendering, compile once with [`Template::compile`] and
//! call [`Template::render`] with different records:
//!
//! ```rust
//! use kurly::{render_fn, ClosureDynamic, Record, TagTable, Template, Value};
//!
//! let mut tags = TagTable::new();
//! tags.register_dynamic(ClosureDynamic::new("hp", |_ctx| {
//!     Ok(render_fn(|rec, _children| Ok(rec.get("hp").cloned().unwrap_or(Value::None))))
//! }));
//!
//! let template = Template::compile("HP: {hp}", &tags).unwrap();
//! assert_eq!(template.render_to_string(&Record::new().with("hp", 100i64)).unwrap(), "HP: 100");
//! assert_eq!(template.render_to_string(&Record::new().with("hp", 75i64)).unwrap(), "HP: 75");
//! ```

pub mod ast;
pub mod error;
pub mod eval;
mod parser;
pub mod pipe;
pub mod registry;

pub use ast::node::{Ast, Node, TagNode};
pub use ast::value::{Value, join};
pub use error::{EvalError, EvalErrorKind, ParseError, ParseErrorKind};
pub use eval::{
    EvalOptions, Record, Renderer, children, compile, compile_with_options, evaluate,
};
pub use parser::{DEFAULT_MAX_DEPTH, ParseOptions, parse, parse_with_options};
pub use pipe::{Pipe, PipeElement, PipeNode, Resolved, TagContext, pipe, pipe_with_options};
pub use registry::{
    ClosureDynamic, ClosureStatic, DynamicTag, Handler, RenderFn, StaticTag, TagSignature,
    TagTable, WILDCARD, render_fn,
};

/// Parse, compile and render in a single step, concatenating the output.
///
/// For repeated rendering of the same source, prefer [`Template`] to avoid
/// re-parsing.
pub fn render(source: &str, tags: &TagTable, rec: &Record) -> Result<String, RenderError> {
    let template = Template::compile(source, tags)?;
    Ok(template.render_to_string(rec)?)
}

/// [`render`] with custom delimiters, naked tags or depth limit.
///
/// ```rust
/// use kurly::{render_with_options, ParseOptions, Record, TagTable};
///
/// let mut tags = TagTable::new();
/// tags.register_value("name", "kurly");
/// let opts = ParseOptions::new().delimiters('<', '>');
/// let out = render_with_options("hello <name> {name}", &tags, &Record::new(), &opts).unwrap();
/// assert_eq!(out, "hello kurly {name}");
/// ```
pub fn render_with_options(
    source: &str,
    tags: &TagTable,
    rec: &Record,
    options: &ParseOptions,
) -> Result<String, RenderError> {
    let template = Template::compile_with_options(source, tags, options, None)?;
    Ok(template.render_to_string(rec)?)
}

/// Combined error type returned by [`render`] and [`Template`].
#[derive(Debug)]
pub enum RenderError {
    Parse(ParseError),
    Eval(EvalError),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Parse(e) => write!(f, "parse error: {e}"),
            RenderError::Eval(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Parse(e) => Some(e),
            RenderError::Eval(e) => Some(e),
        }
    }
}

impl From<ParseError> for RenderError {
    fn from(e: ParseError) -> Self {
        RenderError::Parse(e)
    }
}

impl From<EvalError> for RenderError {
    fn from(e: EvalError) -> Self {
        RenderError::Eval(e)
    }
}

/// A template parsed and resolved once, renderable many times.
///
/// ```rust
/// use kurly::{ClosureStatic, ParseOptions, Record, TagTable, Template, Value};
///
/// let mut tags = TagTable::new();
/// tags.register_static(ClosureStatic::new("env", |ctx, rec| {
///     Ok(rec.get(ctx.text.trim_start_matches(':')).cloned().unwrap_or(Value::None))
/// }));
///
/// let opts = ParseOptions::new().optional(true);
/// let site = Record::new().with("HOME", "/home/ada");
/// let template = Template::compile_with_options("env:HOME", &tags, &opts, Some(&site)).unwrap();
/// assert!(template.is_static());
/// assert_eq!(template.render_default().unwrap(), vec![Value::from("/home/ada")]);
/// ```
#[derive(Debug)]
pub struct Template {
    ast: Ast,
    renderer: Renderer,
}

impl Template {
    /// Parse `source` with default options and resolve it against `tags`.
    pub fn compile(source: &str, tags: &TagTable) -> Result<Self, RenderError> {
        Self::compile_with_options(source, tags, &ParseOptions::default(), None)
    }

    /// Parse with custom options and resolve, optionally against a static
    /// record. The parser's depth limit also bounds pipe construction.
    pub fn compile_with_options(
        source: &str,
        tags: &TagTable,
        options: &ParseOptions,
        rec: Option<&Record>,
    ) -> Result<Self, RenderError> {
        let ast = parse_with_options(source, options)?;
        let eval_options = EvalOptions::new().max_depth(options.max_depth);
        let renderer = compile_with_options(&ast, tags, rec, &eval_options)?;
        Ok(Self { ast, renderer })
    }

    pub fn render(&self, rec: &Record) -> Result<Vec<Value>, EvalError> {
        self.renderer.render(rec)
    }

    pub fn render_default(&self) -> Result<Vec<Value>, EvalError> {
        self.renderer.render_default()
    }

    pub fn render_to_string(&self, rec: &Record) -> Result<String, EvalError> {
        self.renderer.render_to_string(rec)
    }

    pub fn is_static(&self) -> bool {
        self.renderer.is_static()
    }

    /// Access the parsed AST for inspection.
    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }
}
