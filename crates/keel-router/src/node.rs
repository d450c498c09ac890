//! Radix tree node implementation.
//!
//! This module provides the core radix tree (compressed trie) data structure
//! used for efficient path matching.

use crate::method_router::MethodRouter;
use crate::params::Params;
use crate::InsertError;

/// Type of path segment in the radix tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    /// Static path segment (e.g., "users", "api")
    Static,
    /// Named parameter (e.g., "{id}" or ":id")
    Param(String),
    /// Catch-all wildcard (e.g., "*path")
    Wildcard(String),
}

/// A node in the radix tree.
///
/// Each node represents a path segment and may have children for
/// sub-paths. Nodes at route boundaries contain a [`MethodRouter`].
#[derive(Debug, Clone)]
pub struct Node<T> {
    /// The path segment this node represents
    pub segment: String,

    /// The kind of segment (static, param, or wildcard)
    pub kind: SegmentKind,

    /// Method router for this node (if it's a route endpoint)
    pub methods: Option<MethodRouter<T>>,

    /// Static children, sorted by segment for binary search
    pub static_children: Vec<Node<T>>,

    /// Parameter child (at most one per node)
    pub param_child: Option<Box<Node<T>>>,

    /// Wildcard child (at most one per node, must be leaf)
    pub wildcard_child: Option<Box<Node<T>>>,
}

impl<T> Node<T> {
    fn with_kind(segment: String, kind: SegmentKind) -> Self {
        Self {
            segment,
            kind,
            methods: None,
            static_children: Vec::new(),
            param_child: None,
            wildcard_child: None,
        }
    }

    /// Creates a new static node.
    #[must_use]
    pub fn new_static(segment: impl Into<String>) -> Self {
        Self::with_kind(segment.into(), SegmentKind::Static)
    }

    /// Creates a new parameter node.
    #[must_use]
    pub fn new_param(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::with_kind(format!("{{{name}}}"), SegmentKind::Param(name))
    }

    /// Creates a new wildcard node.
    #[must_use]
    pub fn new_wildcard(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::with_kind(format!("*{name}"), SegmentKind::Wildcard(name))
    }

    /// Creates a root node for the tree.
    #[must_use]
    pub fn root() -> Self {
        Self::new_static("")
    }

    /// Inserts a route into the tree.
    ///
    /// Methods already registered at the same pattern are kept and reported
    /// through [`InsertError::Conflict`].
    pub fn insert(&mut self, path: &str, methods: MethodRouter<T>) -> Result<(), InsertError> {
        let segments = parse_path(path);
        if let Some(pos) = segments
            .iter()
            .position(|(_, kind)| matches!(kind, SegmentKind::Wildcard(_)))
        {
            if pos + 1 != segments.len() {
                return Err(InsertError::WildcardNotLast(path.to_string()));
            }
        }
        self.insert_segments(&segments, methods)
    }

    fn insert_segments(
        &mut self,
        segments: &[(String, SegmentKind)],
        methods: MethodRouter<T>,
    ) -> Result<(), InsertError> {
        let Some(((segment, kind), remaining)) = segments.split_first() else {
            return Self::merge_into(&mut self.methods, methods);
        };

        match kind {
            SegmentKind::Static => {
                match self
                    .static_children
                    .binary_search_by(|c| c.segment.as_str().cmp(segment))
                {
                    Ok(idx) => self.static_children[idx].insert_segments(remaining, methods),
                    Err(idx) => {
                        let mut child = Node::new_static(segment.clone());
                        let result = child.insert_segments(remaining, methods);
                        self.static_children.insert(idx, child);
                        result
                    }
                }
            }
            SegmentKind::Param(name) => {
                let child = self
                    .param_child
                    .get_or_insert_with(|| Box::new(Node::new_param(name.clone())));
                if child.kind != *kind {
                    return Err(InsertError::ParamMismatch {
                        existing: child.segment.clone(),
                        inserted: segment.clone(),
                    });
                }
                child.insert_segments(remaining, methods)
            }
            SegmentKind::Wildcard(name) => {
                let child = self
                    .wildcard_child
                    .get_or_insert_with(|| Box::new(Node::new_wildcard(name.clone())));
                Self::merge_into(&mut child.methods, methods)
            }
        }
    }

    fn merge_into(
        slot: &mut Option<MethodRouter<T>>,
        methods: MethodRouter<T>,
    ) -> Result<(), InsertError> {
        match slot {
            Some(existing) => {
                let conflicts = existing.merge(methods);
                if conflicts.is_empty() {
                    Ok(())
                } else {
                    Err(InsertError::Conflict(conflicts))
                }
            }
            None => {
                *slot = Some(methods);
                Ok(())
            }
        }
    }

    /// Matches a path against the tree.
    ///
    /// Returns the method router and extracted parameters if found.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(&MethodRouter<T>, Params)> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = Params::new();
        let methods = self.match_segments(&segments, &mut params)?;
        Some((methods, params))
    }

    fn match_segments<'a>(
        &'a self,
        segments: &[&str],
        params: &mut Params,
    ) -> Option<&'a MethodRouter<T>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.methods.as_ref();
        };

        // Static first, then parameter, then catch-all.
        if let Some(child) = self.find_static_child(segment) {
            if let Some(result) = child.match_segments(remaining, params) {
                return Some(result);
            }
        }

        if let Some(child) = &self.param_child {
            if let SegmentKind::Param(name) = &child.kind {
                let mark = params.len();
                params.push(name.clone(), (*segment).to_string());
                if let Some(result) = child.match_segments(remaining, params) {
                    return Some(result);
                }
                params.truncate(mark);
            }
        }

        if let Some(child) = &self.wildcard_child {
            if let SegmentKind::Wildcard(name) = &child.kind {
                params.push(name.clone(), segments.join("/"));
                return child.methods.as_ref();
            }
        }

        None
    }

    fn find_static_child(&self, segment: &str) -> Option<&Node<T>> {
        self.static_children
            .binary_search_by(|c| c.segment.as_str().cmp(segment))
            .ok()
            .map(|i| &self.static_children[i])
    }
}

/// Parses a path pattern into segments.
///
/// Parameters are written `{name}` or `:name`; a catch-all is `*name`.
pub(crate) fn parse_path(path: &str) -> Vec<(String, SegmentKind)> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if let Some(name) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                (s.to_string(), SegmentKind::Param(name.to_string()))
            } else if let Some(name) = s.strip_prefix(':') {
                (s.to_string(), SegmentKind::Param(name.to_string()))
            } else if let Some(name) = s.strip_prefix('*') {
                (s.to_string(), SegmentKind::Wildcard(name.to_string()))
            } else {
                (s.to_string(), SegmentKind::Static)
            }
        })
        .collect()
}
