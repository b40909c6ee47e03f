use std::collections::HashMap;

use crate::value::Value;

/// Invocation-time view of one intercepted method call: the advised
/// object's properties and the call's arguments, addressable by dotted
/// property paths.
pub trait JoinPoint {
    /// Resolves a `this.…` path on the advised object.
    fn proxy_property(&self, path: &str) -> Option<Value>;

    /// Resolves a method argument, optionally descending into a property
    /// path on the argument's value.
    fn method_argument(&self, name: &str, path: Option<&str>) -> Option<Value>;
}

/// Resolves `current.…` paths against named global objects (security
/// context, request, …) provided by the host.
pub trait GlobalObjectResolver {
    fn global_property(&self, object_name: &str, path: Option<&str>) -> Option<Value>;
}

/// A path-addressable bag of values. Interior nodes are created on demand
/// when a dotted path is inserted.
#[derive(Debug, Clone, Default)]
pub struct PropertySet {
    nodes: HashMap<String, PropertyNode>,
}

#[derive(Debug, Clone)]
enum PropertyNode {
    Leaf(Value),
    Nested(HashMap<String, PropertyNode>),
}

impl PropertySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value at a dotted path, creating interior nodes as
    /// needed. A leaf on the way is replaced by an interior node.
    pub fn insert(&mut self, path: &str, value: Value) {
        let mut segments = path.split('.');
        let first = match segments.next() {
            Some(first) => first,
            None => return,
        };
        insert_node(&mut self.nodes, first, segments, value);
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, path: &str, value: Value) -> Self {
        self.insert(path, value);
        self
    }

    /// Looks up the leaf value at a dotted path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.nodes.get(segments.next()?)?;
        for segment in segments {
            match current {
                PropertyNode::Nested(children) => current = children.get(segment)?,
                PropertyNode::Leaf(_) => return None,
            }
        }
        match current {
            PropertyNode::Leaf(value) => Some(value),
            PropertyNode::Nested(_) => None,
        }
    }
}

fn insert_node<'a>(
    nodes: &mut HashMap<String, PropertyNode>,
    key: &str,
    mut rest: impl Iterator<Item = &'a str>,
    value: Value,
) {
    match rest.next() {
        None => {
            nodes.insert(key.to_owned(), PropertyNode::Leaf(value));
        }
        Some(next) => {
            let entry = nodes
                .entry(key.to_owned())
                .and_modify(|node| {
                    if let PropertyNode::Leaf(_) = node {
                        *node = PropertyNode::Nested(HashMap::new());
                    }
                })
                .or_insert_with(|| PropertyNode::Nested(HashMap::new()));
            if let PropertyNode::Nested(children) = entry {
                insert_node(children, next, rest, value);
            }
        }
    }
}

/// An in-memory [`JoinPoint`] for tests and embedding hosts that already
/// hold plain values.
#[derive(Debug, Clone, Default)]
pub struct StaticJoinPoint {
    proxy: PropertySet,
    arguments: PropertySet,
}

impl StaticJoinPoint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_proxy_property(mut self, path: &str, value: Value) -> Self {
        self.proxy.insert(path, value);
        self
    }

    /// Sets an argument value; `path` may be a bare argument name or a
    /// dotted path into the argument's object graph.
    #[must_use]
    pub fn with_argument_property(mut self, path: &str, value: Value) -> Self {
        self.arguments.insert(path, value);
        self
    }
}

impl JoinPoint for StaticJoinPoint {
    fn proxy_property(&self, path: &str) -> Option<Value> {
        self.proxy.get(path).cloned()
    }

    fn method_argument(&self, name: &str, path: Option<&str>) -> Option<Value> {
        match path {
            None => self.arguments.get(name).cloned(),
            Some(path) => self.arguments.get(&format!("{name}.{path}")).cloned(),
        }
    }
}

/// An in-memory [`GlobalObjectResolver`].
#[derive(Debug, Clone, Default)]
pub struct StaticGlobals {
    objects: PropertySet,
}

impl StaticGlobals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property; the first path segment names the global object.
    #[must_use]
    pub fn with_property(mut self, path: &str, value: Value) -> Self {
        self.objects.insert(path, value);
        self
    }
}

impl GlobalObjectResolver for StaticGlobals {
    fn global_property(&self, object_name: &str, path: Option<&str>) -> Option<Value> {
        match path {
            None => self.objects.get(object_name).cloned(),
            Some(path) => self.objects.get(&format!("{object_name}.{path}")).cloned(),
        }
    }
}
