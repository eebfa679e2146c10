//! the leaf resource contract
use crate::expr::Expr;
use crate::tree::Scope;
use std::any::Any;
use std::fmt;

/// Downcasting support for boxed constructs
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Anything that can live in a [crate::tree::Tree]
///
/// Every method has a default, so a plain grouping construct is just `impl Construct for Group {}`.
///
/// A construct with a [Construct::resource_type] is a *resource*: during synthesis it emits one template
/// fragment built from [Construct::properties]. Everything the properties reference that is not known yet
/// should be expressed as a [crate::token::Token].
pub trait Construct: AsAny + fmt::Debug {
    /// Template resource type, `None` for constructs that do not emit anything
    fn resource_type(&self) -> Option<&'static str> {
        None
    }

    /// Resource properties, may contain tokens
    fn properties(&self, _scope: Scope<'_>) -> Expr {
        Expr::empty_object()
    }

    /// Provide the value of an attribute
    ///
    /// Returning `None` falls back to `{"Ref": ...}` / `{"Fn::GetAtt": [...]}` for resources.
    fn attribute(&self, _name: &str, _scope: Scope<'_>) -> Option<Expr> {
        None
    }

    /// Domain rule violations of this construct alone
    fn validate(&self, _scope: Scope<'_>) -> Vec<String> {
        Vec::new()
    }
}

/// A construct that only groups its children
#[derive(Debug, Default, Clone, Copy)]
pub struct Group;

impl Construct for Group {}
