//! the construct tree
//!
//! All constructs live in a single arena ([Tree]). A node refers to its parent and children by [NodeId];
//! children are kept in insertion order, which is also the order used for validation and synthesis.
//!
//! [Tree::attach] hands out a typed [Handle] so the construct can be borrowed back without guessing its
//! type.
use crate::construct::{Construct, Group};
use crate::error::{ConstructError, Result};
use crate::expr::Expr;
use crate::resolve::ResolveError;
use indexmap::IndexMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A [NodeId] that is known to hold a `T`
pub struct Handle<T> {
    id: NodeId,
    t: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(id: NodeId) -> Self {
        Self {
            id,
            t: PhantomData,
        }
    }

    pub fn id(self) -> NodeId {
        self.id
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id.eq(&other.id)
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.id)
    }
}

impl<T> From<Handle<T>> for NodeId {
    fn from(value: Handle<T>) -> Self {
        value.id
    }
}

#[derive(Debug)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    children: IndexMap<String, NodeId>,
    construct: Box<dyn Construct>,
}

#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Create a tree with an unnamed root [Group]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                name: String::new(),
                parent: None,
                children: Default::default(),
                construct: Box::new(Group),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Add `construct` as a new child of `parent`
    ///
    /// Names must be unique among siblings, non-empty and must not contain `/`.
    pub fn attach<T: Construct>(
        &mut self,
        parent: impl Into<NodeId>,
        name: impl Into<String>,
        construct: T,
    ) -> Result<Handle<T>> {
        let parent = parent.into();
        let name = name.into();

        if name.is_empty() {
            return Err(ConstructError::InvalidName {
                name,
                reason: "must not be empty",
            });
        }
        if name.contains('/') {
            return Err(ConstructError::InvalidName {
                name,
                reason: "must not contain '/'",
            });
        }
        if self.node(parent).children.contains_key(&name) {
            return Err(ConstructError::DuplicateName {
                parent: self.path_string(parent),
                name,
            });
        }

        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Node {
            name: name.clone(),
            parent: Some(parent),
            children: Default::default(),
            construct: Box::new(construct),
        });
        self.nodes[parent.index()].children.insert(name, id);

        tracing::debug!(path = %self.path_string(id), %id, "construct attached");
        Ok(Handle::new(id))
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn construct(&self, id: NodeId) -> &dyn Construct {
        &*self.node(id).construct
    }

    pub fn get<T: Construct>(&self, handle: Handle<T>) -> &T {
        self.construct(handle.id)
            .as_any()
            .downcast_ref()
            .expect("handle type matches its construct")
    }

    pub fn get_mut<T: Construct>(&mut self, handle: Handle<T>) -> &mut T {
        self.nodes[handle.id.index()]
            .construct
            .as_mut()
            .as_any_mut()
            .downcast_mut()
            .expect("handle type matches its construct")
    }

    /// Typed handle for `id` if it holds a `T`
    pub fn downcast<T: Construct>(&self, id: NodeId) -> Option<Handle<T>> {
        self.construct(id)
            .as_any()
            .is::<T>()
            .then(|| Handle::new(id))
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.node(id).name
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node(id).children.values().copied()
    }

    pub fn child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.node(id).children.get(name).copied()
    }

    /// Names from the root (exclusive) down to `id` (inclusive)
    pub fn path(&self, id: NodeId) -> Vec<&str> {
        let mut path = vec![];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            path.push(self.name(current));
            current = parent;
        }
        path.reverse();
        path
    }

    pub fn path_string(&self, id: NodeId) -> String {
        self.path(id).join("/")
    }

    /// Look up a node by path, the empty path is the root
    pub fn find(&self, path: &[&str]) -> Option<NodeId> {
        path.iter()
            .try_fold(self.root(), |current, name| self.child(current, name))
    }

    /// Depth-first, pre-order, children in insertion order
    pub fn walk(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.node(id).children.values().rev().copied());
        }
        order
    }

    pub fn scope(&self, id: NodeId) -> Scope<'_> {
        Scope { tree: self, id }
    }

    /// Value of attribute `name` of the construct at `id`
    pub(crate) fn attribute(&self, id: NodeId, name: &str) -> Result<Expr, ResolveError> {
        let scope = self.scope(id);
        let construct = self.construct(id);
        if let Some(expr) = construct.attribute(name, scope) {
            return Ok(expr);
        }

        if construct.resource_type().is_none() {
            return Err(ResolveError::UnknownAttribute {
                path: self.path_string(id),
                name: name.to_string(),
            });
        }

        let logical_id = scope.logical_id();
        Ok(match name {
            "Ref" => Expr::object([("Ref", Expr::from(logical_id))]),
            _ => Expr::object([(
                "Fn::GetAtt",
                Expr::from(vec![logical_id, name.to_string()]),
            )]),
        })
    }
}

/// Read access to the tree from the point of view of one node
#[derive(Clone, Copy)]
pub struct Scope<'t> {
    tree: &'t Tree,
    id: NodeId,
}

impl<'t> Scope<'t> {
    pub fn tree(&self) -> &'t Tree {
        self.tree
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn path_string(&self) -> String {
        self.tree.path_string(self.id)
    }

    pub fn logical_id(&self) -> String {
        crate::synth::logical_id(&self.tree.path(self.id))
    }

    /// Direct children holding a `T`, in insertion order
    pub fn children_of<T: Construct>(&self) -> impl Iterator<Item = (Handle<T>, &'t T)> + 't {
        let tree = self.tree;
        tree.children(self.id).filter_map(move |child| {
            let handle = tree.downcast::<T>(child)?;
            Some((handle, tree.get(handle)))
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct Marker(u32);
    impl Construct for Marker {}

    #[test]
    fn duplicate_sibling_names_are_rejected() {
        let mut tree = Tree::new();
        let root = tree.root();
        tree.attach(root, "web", Group).unwrap();

        let err = tree.attach(root, "web", Group).unwrap_err();
        assert_eq!(
            err,
            ConstructError::DuplicateName {
                parent: "".to_string(),
                name: "web".to_string()
            }
        );
    }

    #[test]
    fn same_name_under_different_parents() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = tree.attach(root, "a", Group).unwrap();
        let b = tree.attach(root, "b", Group).unwrap();

        let first = tree.attach(a, "Resource", Group).unwrap();
        let second = tree.attach(b, "Resource", Group).unwrap();

        assert_eq!(tree.path(first.id()), vec!["a", "Resource"]);
        assert_eq!(tree.path_string(second.id()), "b/Resource");
    }

    #[test]
    fn invalid_names() {
        let mut tree = Tree::new();
        let root = tree.root();
        assert!(matches!(
            tree.attach(root, "", Group),
            Err(ConstructError::InvalidName { .. })
        ));
        assert!(matches!(
            tree.attach(root, "a/b", Group),
            Err(ConstructError::InvalidName { .. })
        ));
    }

    #[test]
    fn walk_is_depth_first_in_insertion_order() {
        let mut tree = Tree::new();
        let root = tree.root();
        let b = tree.attach(root, "b", Group).unwrap();
        tree.attach(b, "b2", Group).unwrap();
        tree.attach(b, "b1", Group).unwrap();
        tree.attach(root, "a", Group).unwrap();

        let order: Vec<_> = tree
            .walk()
            .into_iter()
            .map(|id| tree.path_string(id))
            .collect();
        assert_eq!(order, vec!["", "b", "b/b2", "b/b1", "a"]);
    }

    #[test]
    fn find_and_downcast() {
        let mut tree = Tree::new();
        let root = tree.root();
        let group = tree.attach(root, "group", Group).unwrap();
        let marker = tree.attach(group, "marker", Marker(7)).unwrap();

        assert_eq!(tree.find(&["group", "marker"]), Some(marker.id()));
        assert_eq!(tree.find(&[]), Some(root));
        assert_eq!(tree.find(&["group", "missing"]), None);

        assert!(tree.downcast::<Group>(marker.id()).is_none());
        let found = tree.downcast::<Marker>(marker.id()).unwrap();
        tree.get_mut(found).0 += 1;
        assert_eq!(tree.get(marker).0, 8);

        let children: Vec<_> = tree
            .scope(group.id())
            .children_of::<Marker>()
            .map(|(_, m)| m.0)
            .collect();
        assert_eq!(children, vec![8]);
    }

    #[test]
    fn grouping_constructs_have_no_attributes() {
        let mut tree = Tree::new();
        let root = tree.root();
        let group = tree.attach(root, "group", Group).unwrap();

        assert_eq!(
            tree.attribute(group.id(), "Ref"),
            Err(ResolveError::UnknownAttribute {
                path: "group".to_string(),
                name: "Ref".to_string()
            })
        );
    }
}
