//! Pipe construction: resolving every tag in an [`Ast`](crate::Ast) against a
//! [`TagTable`].
//!
//! A [`Pipe`] mirrors the AST it was built from, except that every tag with
//! a handler carries a [`Resolved`] render step and every tag without one
//! has collapsed back into its literal source text. Children are resolved
//! before their parent, so a static-capable parent can check whether its
//! whole subtree is static before deciding to run once.

use std::fmt;
use std::sync::Arc;

use crate::ast::node::{Node, TagNode};
use crate::ast::value::Value;
use crate::error::EvalError;
use crate::eval::{EvalOptions, Record};
use crate::registry::{Handler, RenderFn, StaticTag, TagTable};

/// Resolve every tag in `ast` against `tags`.
///
/// When `rec` is supplied, static handlers whose children are all static run
/// immediately with `rec` and their output is kept in the pipe. Without it,
/// every handler runs at render time.
///
/// ```rust
/// use kurly::{parse, pipe, ClosureStatic, Record, TagTable, Value};
///
/// let mut tags = TagTable::new();
/// tags.register_static(ClosureStatic::new("site", |_ctx, rec| {
///     Ok(rec.get("site").cloned().unwrap_or(Value::None))
/// }));
///
/// let ast = parse("Welcome to {site}").unwrap();
/// let rec = Record::new().with("site", "example.org");
/// assert!(pipe(&ast, &tags, Some(&rec)).unwrap().is_static());
/// assert!(!pipe(&ast, &tags, None).unwrap().is_static());
/// ```
pub fn pipe(ast: &[Node], tags: &TagTable, rec: Option<&Record>) -> Result<Pipe, EvalError> {
    pipe_with_options(ast, tags, rec, &EvalOptions::default())
}

/// Resolve every tag in `ast`, failing once tags nest deeper than
/// `options.max_depth`.
pub fn pipe_with_options(
    ast: &[Node],
    tags: &TagTable,
    rec: Option<&Record>,
    options: &EvalOptions,
) -> Result<Pipe, EvalError> {
    let builder = PipeBuilder { tags, rec, options };
    let pipe = builder.build(ast, 1)?;
    tracing::debug!(
        elements = pipe.len(),
        is_static = pipe.is_static(),
        with_record = rec.is_some(),
        "built pipe"
    );
    Ok(pipe)
}

// ── Pipe types ──────────────────────────────────────────────────────────

/// An AST with every tag resolved, ready for repeated rendering.
#[derive(Debug, Clone, Default)]
pub struct Pipe {
    elements: Vec<PipeElement>,
}

impl Pipe {
    pub fn elements(&self) -> &[PipeElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// `true` when rendering this pipe cannot depend on the record: every
    /// element is literal text or a tag resolved to a static value.
    pub fn is_static(&self) -> bool {
        self.elements.iter().all(|el| match el {
            PipeElement::Text(_) => true,
            PipeElement::Tag(node) => node.tag.is_static(),
        })
    }
}

#[derive(Debug, Clone)]
pub enum PipeElement {
    Text(String),
    Tag(PipeNode),
}

/// A tag together with its resolved render step.
#[derive(Debug, Clone)]
pub struct PipeNode {
    pub ctx: Arc<TagContext>,
    pub tag: Resolved,
}

/// What a handler receives: the tag as parsed, with its body already
/// resolved into a child [`Pipe`].
#[derive(Debug)]
pub struct TagContext {
    pub open: String,
    pub name: String,
    pub sep: String,
    pub text: String,
    pub close: String,
    /// The resolved body.
    pub ast: Pipe,
}

impl TagContext {
    fn from_node(node: &TagNode, ast: Pipe) -> Self {
        Self {
            open: node.open.clone(),
            name: node.name.clone(),
            sep: node.sep.clone(),
            text: node.text.clone(),
            close: node.close.clone(),
            ast,
        }
    }
}

/// A tag's render step.
#[derive(Clone)]
pub enum Resolved {
    /// Computed once while the pipe was built.
    Static(Value),
    /// Called on every render with the record and the rendered children.
    Dynamic(RenderFn),
    /// A static handler run on every render. Its body is not rendered up
    /// front; the handler renders it through [`children`](crate::children)
    /// when it needs to.
    Deferred(Arc<dyn StaticTag>),
}

impl Resolved {
    pub fn is_static(&self) -> bool {
        matches!(self, Resolved::Static(_))
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Static(v) => f.debug_tuple("Static").field(v).finish(),
            Resolved::Dynamic(_) => f.write_str("Dynamic(..)"),
            Resolved::Deferred(h) => write!(f, "Deferred({})", h.signature().name),
        }
    }
}

// ── Builder ─────────────────────────────────────────────────────────────

struct PipeBuilder<'a> {
    tags: &'a TagTable,
    rec: Option<&'a Record>,
    options: &'a EvalOptions,
}

impl PipeBuilder<'_> {
    fn build(&self, ast: &[Node], level: usize) -> Result<Pipe, EvalError> {
        let mut elements = Vec::with_capacity(ast.len());
        for node in ast {
            let element = match node {
                Node::Text(text) => PipeElement::Text(text.clone()),
                Node::Tag(tag) => self.build_tag(tag, level)?,
            };
            elements.push(element);
        }
        Ok(Pipe { elements })
    }

    fn build_tag(&self, node: &TagNode, level: usize) -> Result<PipeElement, EvalError> {
        let Some(handler) = self.tags.resolve(&node.name) else {
            tracing::trace!(name = %node.name, "no handler, keeping source text");
            return Ok(PipeElement::Text(node.source()));
        };

        if level > self.options.max_depth {
            return Err(EvalError::recursion_limit(self.options.max_depth));
        }

        let children = self.build(&node.ast, level + 1)?;
        let ctx = Arc::new(TagContext::from_node(node, children));

        let tag = match handler {
            Handler::Value(value) => Resolved::Static(value.clone()),
            Handler::Dynamic(handler) => Resolved::Dynamic(handler.bind(&ctx)?),
            Handler::Static(handler) => match self.rec {
                Some(rec) if ctx.ast.is_static() => Resolved::Static(handler.render(&ctx, rec)?),
                _ => Resolved::Deferred(Arc::clone(handler)),
            },
        };

        Ok(PipeElement::Tag(PipeNode { ctx, tag }))
    }
}
