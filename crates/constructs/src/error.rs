//! errors raised while declaring constructs
//!
//! These are programming errors in the declaration and are returned immediately from the call that caused
//! them. Business rule violations are not errors here; they are collected by
//! [crate::synth::validate_tree].

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConstructError {
    #[error("there is already a construct named {name:?} in {parent:?}")]
    DuplicateName { parent: String, name: String },
    #[error("invalid construct name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("invalid rule: {0}")]
    InvalidRule(String),
    #[error("invalid properties: {0}")]
    InvalidProps(String),
    #[error("cannot determine a port range for {description:?}: no port given and neither side declares a default port")]
    AmbiguousPort { description: String },
    #[error("already have targets of type {existing}, adding {new}; all targets of a target group must have the same type")]
    TargetTypeMismatch {
        existing: crate::elb::TargetType,
        new: crate::elb::TargetType,
    },
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

pub type Result<T, E = ConstructError> = std::result::Result<T, E>;
