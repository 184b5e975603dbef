/// A parsed template: literal fragments and tags in document order.
///
/// Empty when the input is empty. Never contains empty literal fragments.
pub type Ast = Vec<Node>;

/// One element of an [`Ast`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Raw text between tags.
    /// For example, `"Hello, "` in `Hello, {name}`.
    Text(String),

    /// A recognized tag occurrence.
    Tag(TagNode),
}

impl Node {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(s) => Some(s),
            Node::Tag(_) => None,
        }
    }

    pub fn as_tag(&self) -> Option<&TagNode> {
        match self {
            Node::Text(_) => None,
            Node::Tag(tag) => Some(tag),
        }
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Text(s.to_string())
    }
}

impl From<TagNode> for Node {
    fn from(tag: TagNode) -> Self {
        Node::Tag(tag)
    }
}

/// A single tag such as `{greet  world}`.
///
/// For that input `open` is `"{"`, `name` is `"greet"`, `sep` is the two
/// spaces, `text` is `"world"` and `close` is `"}"`. Naked tags (optional
/// delimiter mode) have empty `open`, `sep` and `close`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagNode {
    /// The opening delimiter actually matched, or empty.
    pub open: String,
    /// Identifier matching `[A-Za-z_][A-Za-z0-9_]*`.
    pub name: String,
    /// Whitespace between the name and the body, kept verbatim.
    pub sep: String,
    /// The body with escape sequences resolved.
    pub text: String,
    /// The closing delimiter actually matched, or empty.
    pub close: String,
    /// The parsed body. For naked tags this is `text` as a single fragment.
    pub ast: Ast,
}

impl TagNode {
    /// Reconstruct the tag's source text.
    ///
    /// Used when no handler claims the tag, so that it renders as itself.
    /// Escapes in the body have already been resolved, so `{a \}}` comes
    /// back as `{a }}`.
    pub fn source(&self) -> String {
        let mut s = String::with_capacity(
            self.open.len() + self.name.len() + self.sep.len() + self.text.len() + self.close.len(),
        );
        s.push_str(&self.open);
        s.push_str(&self.name);
        s.push_str(&self.sep);
        s.push_str(&self.text);
        s.push_str(&self.close);
        s
    }

    pub fn is_naked(&self) -> bool {
        self.open.is_empty()
    }
}
