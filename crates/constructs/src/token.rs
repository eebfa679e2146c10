//! deferred values
//!
//! A [Token] is an opaque placeholder for a value that is only known at synthesis time.
//! There are three kinds:
//! - an already known [Expr] (useful to pass a value through the same opaque channel)
//! - an attribute of a construct in the tree (`GroupId` of a security group, `Ref` of a listener, ...)
//! - a lazy resolver that reads the tree when it is finally needed
//!
//! Tokens are cheap to clone and compare by identity. A token is never equal to the plain value it will
//! resolve to.
use crate::expr::Expr;
use crate::resolve::{ResolveContext, ResolveError};
use crate::tree::NodeId;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

type LazyResolver = dyn Fn(&ResolveContext<'_>) -> Result<Expr, ResolveError>;

#[derive(Clone)]
pub struct Token {
    id: u64,
    kind: Rc<TokenKind>,
}

pub(crate) enum TokenKind {
    Resolved(Expr),
    Attribute { node: NodeId, name: String },
    Lazy(Box<LazyResolver>),
}

/// Identity used for cycle detection and caching
///
/// Attribute tokens are identified by what they point at, so two tokens created independently for the
/// same attribute are treated as one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TokenKey {
    Id(u64),
    Attribute(NodeId, String),
}

impl Token {
    fn new(kind: TokenKind) -> Self {
        Self {
            id: NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed),
            kind: Rc::new(kind),
        }
    }

    pub fn resolved(expr: impl Into<Expr>) -> Self {
        Self::new(TokenKind::Resolved(expr.into()))
    }

    pub fn attribute(node: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self::new(TokenKind::Attribute {
            node: node.into(),
            name: name.into(),
        })
    }

    /// Defer to `resolver`, invoked at most once per resolution pass
    ///
    /// The closure must only capture immutable data (handles, strings). Anything that may still change
    /// until synthesis is read from the tree through the [ResolveContext].
    pub fn lazy<F>(resolver: F) -> Self
    where
        F: Fn(&ResolveContext<'_>) -> Result<Expr, ResolveError> + 'static,
    {
        Self::new(TokenKind::Lazy(Box::new(resolver)))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn kind(&self) -> &TokenKind {
        &self.kind
    }

    pub(crate) fn key(&self) -> TokenKey {
        match self.kind.as_ref() {
            TokenKind::Attribute { node, name } => TokenKey::Attribute(*node, name.clone()),
            TokenKind::Resolved(_) | TokenKind::Lazy(_) => TokenKey::Id(self.id),
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.as_ref() {
            TokenKind::Resolved(expr) => f
                .debug_struct("Token")
                .field("id", &self.id)
                .field("resolved", expr)
                .finish(),
            TokenKind::Attribute { node, name } => f
                .debug_struct("Token")
                .field("id", &self.id)
                .field("node", node)
                .field("attribute", name)
                .finish(),
            TokenKind::Lazy(_) => f
                .debug_struct("Token")
                .field("id", &self.id)
                .field("lazy", &true)
                .finish(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.as_ref() {
            TokenKind::Attribute { node, name } => write!(f, "${{Token[{node}.{name}]}}"),
            TokenKind::Resolved(_) | TokenKind::Lazy(_) => write!(f, "${{Token[{}]}}", self.id),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn attribute_tokens_share_a_key() {
        let node = NodeId::from_index(3);
        let a = Token::attribute(node, "GroupId");
        let b = Token::attribute(node, "GroupId");

        assert_ne!(a, b);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), Token::attribute(node, "VpcId").key());
    }

    #[test]
    fn ids_are_unique() {
        let a = Token::resolved("x");
        let b = Token::resolved("x");
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
    }
}
