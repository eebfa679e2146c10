use super::listener::Listener;
use super::target_group::TargetGroup;
use crate::construct::Construct;
use crate::expr::Expr;
use crate::tree::{Handle, Scope};
use std::ops::RangeInclusive;

pub const PRIORITY_RANGE: RangeInclusive<u32> = 1..=50000;

/// `forward` action for one or more target groups
pub(crate) fn forward_action(target_groups: &[Handle<TargetGroup>]) -> Expr {
    match target_groups {
        [single] => Expr::object([
            ("Type", Expr::from("forward")),
            ("TargetGroupArn", TargetGroup::arn(*single)),
        ]),
        groups => {
            let groups = groups
                .iter()
                .map(|group| Expr::object([("TargetGroupArn", TargetGroup::arn(*group))]))
                .collect();
            Expr::object([
                ("Type", Expr::from("forward")),
                (
                    "ForwardConfig",
                    Expr::object([("TargetGroups", Expr::Array(groups))]),
                ),
            ])
        }
    }
}

/// A conditional routing entry of a [Listener]
#[derive(Debug)]
pub struct ListenerRule {
    listener: Handle<Listener>,
    priority: u32,
    host_header: Option<String>,
    path_pattern: Option<String>,
    target_groups: Vec<Handle<TargetGroup>>,
}

impl ListenerRule {
    pub(crate) fn new(
        listener: Handle<Listener>,
        priority: u32,
        host_header: Option<String>,
        path_pattern: Option<String>,
        target_groups: Vec<Handle<TargetGroup>>,
    ) -> Self {
        Self {
            listener,
            priority,
            host_header,
            path_pattern,
            target_groups,
        }
    }

    pub fn listener(&self) -> Handle<Listener> {
        self.listener
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn host_header(&self) -> Option<&str> {
        self.host_header.as_deref()
    }

    pub fn path_pattern(&self) -> Option<&str> {
        self.path_pattern.as_deref()
    }

    pub fn target_groups(&self) -> &[Handle<TargetGroup>] {
        &self.target_groups
    }

    fn conditions(&self) -> Vec<Expr> {
        let mut conditions = vec![];
        if let Some(host) = &self.host_header {
            conditions.push(Expr::object([
                ("Field", Expr::from("host-header")),
                ("Values", Expr::from(vec![host.clone()])),
            ]));
        }
        if let Some(pattern) = &self.path_pattern {
            conditions.push(Expr::object([
                ("Field", Expr::from("path-pattern")),
                ("Values", Expr::from(vec![pattern.clone()])),
            ]));
        }
        conditions
    }
}

impl Construct for ListenerRule {
    fn resource_type(&self) -> Option<&'static str> {
        Some("AWS::ElasticLoadBalancingV2::ListenerRule")
    }

    fn properties(&self, _scope: Scope<'_>) -> Expr {
        Expr::object([
            ("ListenerArn", Listener::arn(self.listener)),
            ("Priority", Expr::from(self.priority)),
            ("Conditions", Expr::Array(self.conditions())),
            (
                "Actions",
                Expr::Array(vec![forward_action(&self.target_groups)]),
            ),
        ])
    }

    fn validate(&self, _scope: Scope<'_>) -> Vec<String> {
        let mut messages = vec![];
        if !PRIORITY_RANGE.contains(&self.priority) {
            messages.push(format!(
                "Priority must be between {} and {}, got {}",
                PRIORITY_RANGE.start(),
                PRIORITY_RANGE.end(),
                self.priority
            ));
        }
        if self.host_header.is_none() && self.path_pattern.is_none() {
            messages.push("ListenerRule needs at least one condition".to_string());
        }
        if self.target_groups.is_empty() {
            messages.push("ListenerRule needs at least one target group".to_string());
        }
        messages
    }
}
