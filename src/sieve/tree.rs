/// Lossless parse tree.
///
/// An append-only arena: node ids grow with insertion order, so a pre-order
/// walk visits tokens in source order. Whitespace and comments are nodes too,
/// which is what makes [`ParseTree::text`] reproduce the input exactly.
use crate::sieve::lexer::Passthrough;
use crate::sieve::token::{Token, TokenType};

pub type NodeId = usize;

pub const ROOT: NodeId = 0;

#[derive(Debug, Clone, PartialEq)]
struct Node {
    token: Option<Token>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseTree {
    label: String,
    nodes: Vec<Node>,
}

impl ParseTree {
    /// An empty tree whose synthetic root carries `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            nodes: vec![Node {
                token: None,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Id of the most recently added node.
    pub fn last_id(&self) -> NodeId {
        self.nodes.len() - 1
    }

    /// Number of token nodes (the root is not counted).
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `token` under the most recently added node.
    pub fn add_child(&mut self, token: Token) -> NodeId {
        let parent = self.last_id();
        self.push(parent, token)
    }

    /// Appends `token` under `parent`; `None` if `parent` does not exist.
    pub fn add_child_to(&mut self, parent: NodeId, token: Token) -> Option<NodeId> {
        (parent < self.nodes.len()).then(|| self.push(parent, token))
    }

    /// Appends under a parent id known to belong to this tree.
    pub(crate) fn push(&mut self, parent: NodeId, token: Token) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            token: Some(token),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    /// The token stored at `id`; `None` for the root or an unknown id.
    pub fn node(&self, id: NodeId) -> Option<&Token> {
        self.nodes.get(id).and_then(|n| n.token.as_ref())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> Option<&[NodeId]> {
        self.nodes.get(id).map(|n| n.children.as_slice())
    }

    /// Concatenated text of every node in pre-order.
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<NodeId> = self.nodes[ROOT].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if let Some(token) = &node.token {
                out.push_str(&token.text);
            }
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Indented diagnostic rendering, one node per line.
    pub fn dump(&self) -> String {
        let mut out = format!("{}\n", self.label);
        let mut stack = Vec::new();
        self.push_children(ROOT, " ", &mut stack);
        while let Some((id, prefix, last)) = stack.pop() {
            let (infix, indent) = if last {
                ("└── ", "    ")
            } else {
                ("├── ", "│   ")
            };
            if let Some(token) = &self.nodes[id].token {
                out.push_str(&format!("{prefix}{infix}{} (id:{id})\n", token.dump()));
            }
            self.push_children(id, &format!("{prefix}{indent}"), &mut stack);
        }
        out
    }

    // Reversed, so popping yields the children in order.
    fn push_children(&self, id: NodeId, prefix: &str, stack: &mut Vec<(NodeId, String, bool)>) {
        let children = &self.nodes[id].children;
        for (i, &child) in children.iter().enumerate().rev() {
            stack.push((child, prefix.to_string(), i + 1 == children.len()));
        }
    }

    /// Nearest ancestor of the last node able to own a comment.
    fn comment_owner(&self) -> Option<NodeId> {
        let mut id = self.last_id();
        loop {
            id = self.parent(id).unwrap_or(ROOT);
            let token = self.node(id)?;
            if !token.is(TokenType::PASSTHROUGH | TokenType::BLOCK_END | TokenType::SEMICOLON) {
                return Some(id);
            }
        }
    }
}

impl Default for ParseTree {
    fn default() -> Self {
        Self::new("tree")
    }
}

/// Whitespace hangs off the last node; comments climb to the closest
/// enclosing command, test or argument.
impl Passthrough for ParseTree {
    fn passthrough(&mut self, token: Token) {
        if token.is(TokenType::COMMENT) {
            if let Some(owner) = self.comment_owner() {
                self.push(owner, token);
                return;
            }
        }
        self.add_child(token);
    }
}
