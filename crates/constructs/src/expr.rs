//! unresolved value representation
//!
//! [Expr] mirrors [Value] but may contain [Token]s anywhere in the structure.
//! Constructs describe their template fragments as [Expr]s; the resolver turns them into [Value]s.
use crate::token::Token;
use crate::value::Value;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Expr>),
    Object(IndexMap<String, Expr>),
    Token(Token),
    /// String concatenation of parts which may be tokens
    Join(Vec<Expr>),
}

impl Expr {
    pub fn empty_object() -> Self {
        Expr::Object(IndexMap::new())
    }

    /// Build an object, keeping the order of `entries`
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Expr)>,
    {
        Expr::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn join<I>(parts: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Expr>,
    {
        Expr::Join(parts.into_iter().map(Into::into).collect())
    }

    /// `true` if a token appears anywhere inside this expression
    pub fn contains_tokens(&self) -> bool {
        match self {
            Expr::Token(_) => true,
            Expr::Array(items) | Expr::Join(items) => items.iter().any(Expr::contains_tokens),
            Expr::Object(object) => object.values().any(Expr::contains_tokens),
            Expr::Boolean(_) | Expr::Integer(_) | Expr::Decimal(_) | Expr::String(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Expr::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Token> for Expr {
    fn from(value: Token) -> Self {
        Expr::Token(value)
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::String(value)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::String(value.to_string())
    }
}

impl From<&String> for Expr {
    fn from(value: &String) -> Self {
        Expr::String(value.clone())
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::Boolean(value)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Integer(value)
    }
}

impl From<u16> for Expr {
    fn from(value: u16) -> Self {
        Expr::Integer(value.into())
    }
}

impl From<u32> for Expr {
    fn from(value: u32) -> Self {
        Expr::Integer(value.into())
    }
}

impl<T: Into<Expr>> From<Vec<T>> for Expr {
    fn from(value: Vec<T>) -> Self {
        Expr::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<K: ToString, V: Into<Expr>> From<IndexMap<K, V>> for Expr {
    fn from(value: IndexMap<K, V>) -> Self {
        Expr::Object(
            value
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        )
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        match value {
            Value::Boolean(b) => Expr::Boolean(b),
            Value::Integer(i) => Expr::Integer(i),
            Value::Decimal(d) => Expr::Decimal(d),
            Value::String(s) => Expr::String(s),
            Value::Array(a) => Expr::Array(a.into_iter().map(Into::into).collect()),
            Value::Object(o) => Expr::Object(o.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn token_never_equals_plain_value() {
        let token = Token::resolved("sg-123");
        assert_ne!(Expr::from(token.clone()), Expr::from("sg-123"));
        assert_eq!(Expr::from(token.clone()), Expr::from(token));
    }

    #[test]
    fn detects_nested_tokens() {
        let plain = Expr::object([("a", Expr::from(vec!["x", "y"]))]);
        assert!(!plain.contains_tokens());

        let nested = Expr::object([(
            "a",
            Expr::join([Expr::from("arn:"), Token::resolved("x").into()]),
        )]);
        assert!(nested.contains_tokens());
    }
}
