//! token resolution
//!
//! [Resolver] walks an [Expr] and replaces every [Token] with the value it stands for. The output of a
//! token is resolved again, so tokens may produce further tokens. A token that (directly or through a
//! chain) produces itself is reported as [ResolveError::CyclicResolution].
//!
//! One [Resolver] is used per synthesis pass. It caches every resolved token so a token always resolves
//! to the same value within the pass, no matter how often it is referenced.
use crate::expr::Expr;
use crate::token::{Token, TokenKey, TokenKind};
use crate::tree::Tree;
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::HashMap;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("cyclic token resolution: {}", chain.join(" -> "))]
    CyclicResolution { chain: Vec<String> },
    #[error("{path} has no attribute {name:?}")]
    UnknownAttribute { path: String, name: String },
    #[error("token {0} needs a construct tree to be resolved")]
    TreeRequired(String),
}

/// What a lazy token gets to see while it is resolved
#[derive(Clone, Copy)]
pub struct ResolveContext<'t> {
    tree: Option<&'t Tree>,
}

impl<'t> ResolveContext<'t> {
    pub fn tree(&self) -> Result<&'t Tree, ResolveError> {
        self.tree
            .ok_or_else(|| ResolveError::TreeRequired("lazy".to_string()))
    }
}

/// Resolve an expression that does not need a construct tree
pub fn resolve(expr: &Expr) -> Result<Value, ResolveError> {
    Resolver::new().resolve(expr)
}

pub struct Resolver<'t> {
    context: ResolveContext<'t>,
    /// tokens currently being resolved, in resolution order, with a human readable description
    visiting: IndexMap<TokenKey, String>,
    cache: HashMap<TokenKey, Value>,
}

impl Resolver<'static> {
    pub fn new() -> Self {
        Self {
            context: ResolveContext { tree: None },
            visiting: Default::default(),
            cache: Default::default(),
        }
    }
}

impl Default for Resolver<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'t> Resolver<'t> {
    pub fn with_tree(tree: &'t Tree) -> Self {
        Self {
            context: ResolveContext { tree: Some(tree) },
            visiting: Default::default(),
            cache: Default::default(),
        }
    }

    pub fn resolve(&mut self, expr: &Expr) -> Result<Value, ResolveError> {
        match expr {
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),
            Expr::Integer(i) => Ok(Value::Integer(*i)),
            Expr::Decimal(d) => Ok(Value::Decimal(*d)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Array(items) => items
                .iter()
                .map(|item| self.resolve(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Object(object) => {
                let mut resolved = IndexMap::with_capacity(object.len());
                for (key, value) in object {
                    resolved.insert(key.clone(), self.resolve(value)?);
                }
                Ok(Value::Object(resolved))
            }
            Expr::Token(token) => self.resolve_token(token),
            Expr::Join(parts) => self.resolve_join(parts),
        }
    }

    #[tracing::instrument(level = "trace", skip_all, fields(token = %token))]
    fn resolve_token(&mut self, token: &Token) -> Result<Value, ResolveError> {
        let key = token.key();
        if let Some(value) = self.cache.get(&key) {
            return Ok(value.clone());
        }

        let description = self.describe(token);
        if let Some(start) = self.visiting.get_index_of(&key) {
            let chain = self
                .visiting
                .values()
                .skip(start)
                .cloned()
                .chain(std::iter::once(description))
                .collect();
            return Err(ResolveError::CyclicResolution { chain });
        }

        self.visiting.insert(key.clone(), description);
        let result = self
            .produce(token)
            .and_then(|produced| self.resolve(&produced));
        self.visiting.pop();

        let value = result?;
        tracing::trace!(?value, "token resolved");
        self.cache.insert(key, value.clone());
        Ok(value)
    }

    /// Run the token's resolver, yielding a possibly unresolved expression
    fn produce(&self, token: &Token) -> Result<Expr, ResolveError> {
        match token.kind() {
            TokenKind::Resolved(expr) => Ok(expr.clone()),
            TokenKind::Attribute { node, name } => {
                let Some(tree) = self.context.tree else {
                    return Err(ResolveError::TreeRequired(token.to_string()));
                };
                tree.attribute(*node, name)
            }
            TokenKind::Lazy(resolver) => resolver(&self.context),
        }
    }

    fn describe(&self, token: &Token) -> String {
        match (token.kind(), self.context.tree) {
            (TokenKind::Attribute { node, name }, Some(tree)) => {
                format!("{}.{}", tree.path_string(*node), name)
            }
            _ => token.to_string(),
        }
    }

    /// Concatenate parts into a string
    ///
    /// Parts that do not resolve to a scalar (for example `{"Ref": ...}`) turn the result into an
    /// `Fn::Join` intrinsic. Neighbouring literal parts are merged, a single remaining part is returned as is.
    fn resolve_join(&mut self, parts: &[Expr]) -> Result<Value, ResolveError> {
        let mut resolved: Vec<Value> = Vec::with_capacity(parts.len());
        for part in parts {
            let value = self.resolve(part)?;
            let Some(text) = value.scalar_to_string() else {
                resolved.push(value);
                continue;
            };

            if let Some(Value::String(previous)) = resolved.last_mut() {
                previous.push_str(&text);
            } else {
                resolved.push(Value::String(text));
            }
        }

        if resolved.is_empty() {
            return Ok(Value::String(String::new()));
        }
        if resolved.len() == 1 {
            return Ok(resolved.remove(0));
        }

        let mut join = IndexMap::new();
        join.insert(
            "Fn::Join".to_string(),
            Value::Array(vec![Value::String(String::new()), Value::Array(resolved)]),
        );
        Ok(Value::Object(join))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn ref_to(logical_id: &str) -> Value {
        let mut object = IndexMap::new();
        object.insert("Ref".to_string(), Value::from(logical_id));
        Value::Object(object)
    }

    #[test]
    fn plain_values_resolve_to_themselves() {
        let expr = Expr::object([
            ("name", Expr::from("web")),
            ("port", Expr::from(443u16)),
            ("enabled", Expr::from(true)),
            ("tags", Expr::from(vec!["a", "b"])),
            ("nested", Expr::object([("ratio", Expr::Decimal(0.5))])),
        ]);

        let value = resolve(&expr).unwrap();
        assert_eq!(Expr::from(value), expr);
    }

    #[test]
    fn token_resolves_to_resolver_output() {
        let token = Token::lazy(|_| Ok(Expr::from("arn:aws:acm:cert/1")));
        let value = resolve(&token.into()).unwrap();
        assert_eq!(value, Value::from("arn:aws:acm:cert/1"));

        // resolving a resolved value again changes nothing
        assert_eq!(resolve(&Expr::from(value.clone())).unwrap(), value);
    }

    #[test]
    fn resolver_chains_are_followed() {
        let last = Token::resolved(Expr::object([("id", Expr::from("sg-1"))]));
        let middle = Token::lazy(move |_| Ok(last.clone().into()));
        let first = Token::lazy(move |_| Ok(Expr::from(vec![Expr::from(middle.clone())])));

        let value = resolve(&first.into()).unwrap();
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"[{"id":"sg-1"}]"#
        );
    }

    #[test]
    fn self_referencing_token_is_a_cycle() {
        let slot: Rc<RefCell<Option<Token>>> = Default::default();
        let inner = slot.clone();
        let token = Token::lazy(move |_| {
            let me = inner.borrow().clone().expect("slot filled before resolving");
            Ok(Expr::from(vec![Expr::from(me)]))
        });
        *slot.borrow_mut() = Some(token.clone());

        let err = resolve(&token.into()).unwrap_err();
        let ResolveError::CyclicResolution { chain } = err else {
            panic!("expected a cycle, got {err:?}");
        };
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0], chain[1]);
    }

    #[test]
    fn indirect_cycle_is_detected() {
        let slot: Rc<RefCell<Option<Token>>> = Default::default();
        let inner = slot.clone();
        let a = Token::lazy(move |_| Ok(inner.borrow().clone().expect("slot filled").into()));
        let a_again = a.clone();
        let b = Token::lazy(move |_| Ok(Expr::join([Expr::from("prefix-"), a_again.clone().into()])));
        *slot.borrow_mut() = Some(b);

        assert!(matches!(
            resolve(&a.into()),
            Err(ResolveError::CyclicResolution { chain }) if chain.len() == 3
        ));
    }

    #[test]
    fn resolver_runs_once_per_pass() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let token = Token::lazy(move |_| {
            counter.set(counter.get() + 1);
            Ok(Expr::from("value"))
        });

        let expr = Expr::from(vec![Expr::from(token.clone()), Expr::from(token)]);
        let value = Resolver::new().resolve(&expr).unwrap();

        assert_eq!(value, Value::from(vec!["value", "value"]));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn attribute_tokens_need_a_tree() {
        let token = Token::attribute(crate::tree::NodeId::from_index(0), "Ref");
        assert!(matches!(
            resolve(&token.into()),
            Err(ResolveError::TreeRequired(_))
        ));
    }

    #[test]
    fn join_of_literals_is_a_string() {
        let expr = Expr::join([
            Expr::from("arn:aws:s3:::"),
            Token::resolved("bucket").into(),
            Expr::from("/"),
            Expr::from(42i64),
        ]);
        assert_eq!(resolve(&expr).unwrap(), Value::from("arn:aws:s3:::bucket/42"));
    }

    #[test]
    fn join_with_intrinsic_becomes_fn_join() {
        let reference = Token::resolved(Expr::from(ref_to("Bucket1234")));
        let expr = Expr::join([
            Expr::from("arn:"),
            Expr::from("aws:"),
            reference.into(),
            Expr::from("/*"),
        ]);

        let value = resolve(&expr).unwrap();
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"Fn::Join":["",["arn:aws:",{"Ref":"Bucket1234"},"/*"]]}"#
        );
    }

    #[test]
    fn join_of_a_single_intrinsic_is_the_intrinsic() {
        let reference = Token::resolved(Expr::from(ref_to("Bucket1234")));
        let expr = Expr::join([Expr::from(reference), Expr::from("")]);

        assert_eq!(resolve(&expr).unwrap(), ref_to("Bucket1234"));
    }
}
