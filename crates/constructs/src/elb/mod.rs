//! rule-based request routing: load balancers, listeners, rules and target groups
//!
//! A [Listener] forwards to target groups either by default or through [ListenerRule]s, each matching on
//! host header and/or path pattern and ordered by a unique priority.
mod listener;
mod listener_rule;
mod load_balancer;
mod target_group;
mod targets;

pub use listener::{
    AddTargetGroupsProps, AddTargetsProps, ApplicationProtocol, ImportedListener, Listener,
    ListenerOrigin, ListenerProps, RuleConditions,
};
pub use listener_rule::{ListenerRule, PRIORITY_RANGE};
pub use load_balancer::{ImportedLoadBalancer, LoadBalancer, LoadBalancerOrigin, LoadBalancerProps};
pub use target_group::{
    TargetDescription, TargetGroup, TargetGroupOrigin, TargetGroupProps, TargetType,
};
pub use targets::{ConnectableTarget, InstanceTarget, IpTarget, Registerable};

