//! Subject pattern tree.
//!
//! Patterns are split on `.` into tokens and stored in an arena of nodes.
//! Every node keeps its literal children in a map plus at most one `*`
//! child and one `>` child, referenced by index.
//!
//! Lookup prefers, at every depth, a literal token over `*`, and `*` over
//! `>`. A `>` edge is only taken when neither a literal nor a `*`
//! continuation resolves the rest of the subject.

use nsr_protocol::subject::{self, FULL_WILDCARD, SINGLE_WILDCARD};
use std::collections::HashMap;
use thiserror::Error;

/// Index of a node in the arena.
type NodeId = usize;

const ROOT: NodeId = 0;

/// Errors raised when registering a pattern.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The pattern is empty.
    #[error("Pattern cannot be empty")]
    Empty,

    /// The pattern exceeds the maximum subject length.
    #[error("Pattern too long: {0} bytes")]
    TooLong(usize),

    /// Two delimiters in a row, or a leading/trailing delimiter.
    #[error("Empty token at position {position} in pattern '{pattern}'")]
    EmptyToken { pattern: String, position: usize },

    /// `>` somewhere other than the last token.
    #[error("'>' must be the last token, found at position {position} in '{pattern}'")]
    MisplacedWildcard { pattern: String, position: usize },

    /// A token with whitespace, control characters or an embedded wildcard.
    #[error("Invalid token '{token}' in pattern '{pattern}'")]
    InvalidToken { pattern: String, token: String },

    /// The pattern is already bound to a value.
    #[error("Pattern already registered: {0}")]
    Duplicate(String),
}

/// Kind of edge leading to a child node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge<'a> {
    Literal(&'a str),
    Single,
    Full,
}

fn parse_pattern(pattern: &str) -> Result<Vec<Edge<'_>>, RegistrationError> {
    if pattern.is_empty() {
        return Err(RegistrationError::Empty);
    }
    if pattern.len() > subject::MAX_SUBJECT_LENGTH {
        return Err(RegistrationError::TooLong(pattern.len()));
    }

    let tokens: Vec<&str> = subject::tokens(pattern).collect();
    let last = tokens.len() - 1;

    tokens
        .iter()
        .enumerate()
        .map(|(position, &token)| match token {
            "" => Err(RegistrationError::EmptyToken {
                pattern: pattern.to_string(),
                position,
            }),
            SINGLE_WILDCARD => Ok(Edge::Single),
            FULL_WILDCARD if position == last => Ok(Edge::Full),
            FULL_WILDCARD => Err(RegistrationError::MisplacedWildcard {
                pattern: pattern.to_string(),
                position,
            }),
            _ if !subject::is_valid_token(token) || token.contains(|c| c == '*' || c == '>') => {
                Err(RegistrationError::InvalidToken {
                    pattern: pattern.to_string(),
                    token: token.to_string(),
                })
            }
            _ => Ok(Edge::Literal(token)),
        })
        .collect()
}

#[derive(Debug)]
struct Binding<T> {
    pattern: String,
    value: T,
}

#[derive(Debug)]
struct Node<T> {
    literals: HashMap<Box<str>, NodeId>,
    single: Option<NodeId>,
    full: Option<NodeId>,
    binding: Option<Binding<T>>,
}

impl<T> Node<T> {
    fn new() -> Self {
        Self {
            literals: HashMap::new(),
            single: None,
            full: None,
            binding: None,
        }
    }
}

/// A resolved route: the registered pattern and its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route<'a, T> {
    /// The pattern that matched.
    pub pattern: &'a str,
    /// The value bound to the pattern.
    pub value: &'a T,
}

/// Tree mapping subject patterns to values.
#[derive(Debug)]
pub struct SubjectTree<T> {
    nodes: Vec<Node<T>>,
    len: usize,
}

impl<T> SubjectTree<T> {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new()],
            len: 0,
        }
    }

    /// Number of registered patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no pattern is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bind `value` to `pattern`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is malformed or already bound. The
    /// tree is left unchanged on error.
    pub fn add_path(&mut self, pattern: &str, value: T) -> Result<(), RegistrationError> {
        let edges = parse_pattern(pattern)?;

        let mut current = ROOT;
        for edge in edges {
            current = self.child_or_insert(current, edge);
        }

        let node = &mut self.nodes[current];
        if node.binding.is_some() {
            return Err(RegistrationError::Duplicate(pattern.to_string()));
        }
        node.binding = Some(Binding {
            pattern: pattern.to_string(),
            value,
        });
        self.len += 1;
        Ok(())
    }

    /// Resolve a concrete subject to the value of the best matching pattern.
    #[must_use]
    pub fn get_value(&self, subject: &str) -> Option<&T> {
        self.get(subject).map(|route| route.value)
    }

    /// Resolve a concrete subject to the best matching route.
    ///
    /// Subjects with empty tokens or wildcard tokens never match.
    #[must_use]
    pub fn get(&self, subject: &str) -> Option<Route<'_, T>> {
        subject::validate_subject(subject).ok()?;

        let tokens: Vec<&str> = subject::tokens(subject).collect();
        let binding = self
            .resolve(ROOT, &tokens)
            .and_then(|id| self.nodes[id].binding.as_ref())?;

        Some(Route {
            pattern: &binding.pattern,
            value: &binding.value,
        })
    }

    /// Registered patterns in lexical order.
    #[must_use]
    pub fn patterns(&self) -> Vec<&str> {
        let mut patterns: Vec<&str> = self
            .nodes
            .iter()
            .filter_map(|node| node.binding.as_ref().map(|b| b.pattern.as_str()))
            .collect();
        patterns.sort_unstable();
        patterns
    }

    /// Build a tree with the same shape whose values are `f(pattern, value)`.
    #[must_use]
    pub fn map_values<U>(&self, mut f: impl FnMut(&str, &T) -> U) -> SubjectTree<U> {
        let nodes = self
            .nodes
            .iter()
            .map(|node| Node {
                literals: node.literals.clone(),
                single: node.single,
                full: node.full,
                binding: node.binding.as_ref().map(|binding| Binding {
                    pattern: binding.pattern.clone(),
                    value: f(&binding.pattern, &binding.value),
                }),
            })
            .collect();

        SubjectTree {
            nodes,
            len: self.len,
        }
    }

    fn child_or_insert(&mut self, parent: NodeId, edge: Edge<'_>) -> NodeId {
        let existing = match edge {
            Edge::Literal(token) => self.nodes[parent].literals.get(token).copied(),
            Edge::Single => self.nodes[parent].single,
            Edge::Full => self.nodes[parent].full,
        };
        if let Some(id) = existing {
            return id;
        }

        let id = self.nodes.len();
        self.nodes.push(Node::new());

        let node = &mut self.nodes[parent];
        match edge {
            Edge::Literal(token) => {
                node.literals.insert(token.into(), id);
            }
            Edge::Single => node.single = Some(id),
            Edge::Full => node.full = Some(id),
        }
        id
    }

    fn resolve(&self, id: NodeId, tokens: &[&str]) -> Option<NodeId> {
        let node = &self.nodes[id];

        let Some((token, rest)) = tokens.split_first() else {
            return node.binding.is_some().then_some(id);
        };

        if let Some(found) = node
            .literals
            .get(*token)
            .and_then(|&child| self.resolve(child, rest))
        {
            return Some(found);
        }

        if let Some(found) = node.single.and_then(|child| self.resolve(child, rest)) {
            return Some(found);
        }

        node.full
            .filter(|&child| self.nodes[child].binding.is_some())
    }
}

impl<T> Default for SubjectTree<T> {
    fn default() -> Self {
        Self::new()
    }
}
