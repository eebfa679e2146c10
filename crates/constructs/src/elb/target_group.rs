use super::listener::{ApplicationProtocol, Listener};
use super::load_balancer::LoadBalancer;
use super::targets::{common_target_type, Registerable};
use crate::construct::Construct;
use crate::ec2::{Connectable, Connections, Port};
use crate::error::{ConstructError, Result};
use crate::expr::Expr;
use crate::token::Token;
use crate::tree::{Handle, NodeId, Scope, Tree};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    Instance,
    Ip,
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetType::Instance => f.write_str("instance"),
            TargetType::Ip => f.write_str("ip"),
        }
    }
}

/// One entry of the `Targets` property
#[derive(Debug, Clone, PartialEq)]
pub struct TargetDescription {
    pub id: Expr,
    pub port: Option<u16>,
    pub availability_zone: Option<String>,
}

impl TargetDescription {
    fn to_expr(&self) -> Expr {
        let mut entries = vec![("Id", self.id.clone())];
        if let Some(port) = self.port {
            entries.push(("Port", Expr::from(port)));
        }
        if let Some(zone) = &self.availability_zone {
            entries.push(("AvailabilityZone", Expr::from(zone)));
        }
        Expr::object(entries)
    }
}

#[derive(Debug, Clone)]
pub struct TargetGroupProps {
    pub vpc_id: Expr,
    pub port: Option<u16>,
    pub protocol: Option<ApplicationProtocol>,
    pub health_check_path: Option<String>,
}

impl TargetGroupProps {
    pub fn new(vpc_id: impl Into<Expr>) -> Self {
        Self {
            vpc_id: vpc_id.into(),
            port: None,
            protocol: None,
            health_check_path: None,
        }
    }
}

#[derive(Debug)]
pub enum TargetGroupOrigin {
    Constructed {
        vpc_id: Expr,
        port: u16,
        protocol: ApplicationProtocol,
        health_check_path: Option<String>,
    },
    Imported { arn: String },
}

/// A set of targets traffic is forwarded to
///
/// Listeners register themselves through [Listener::add_target_groups]; members that are [crate::ec2::Connectable]
/// register through [TargetGroup::register_connectable]. Whenever one side arrives, the load balancer gets
/// permission to reach every member on the member port, regardless of which side came first. The listener's
/// security groups are looked up when that happens, not when the listener registers.
#[derive(Debug)]
pub struct TargetGroup {
    origin: TargetGroupOrigin,
    target_type: Option<TargetType>,
    targets: Vec<TargetDescription>,
    listeners: Vec<Handle<Listener>>,
    members: Vec<(Connections, Port)>,
}

impl TargetGroup {
    pub fn create(
        tree: &mut Tree,
        parent: impl Into<NodeId>,
        name: &str,
        props: TargetGroupProps,
    ) -> Result<Handle<Self>> {
        let (protocol, port) = ApplicationProtocol::complete(props.protocol, props.port, "TargetGroup")?;
        let origin = TargetGroupOrigin::Constructed {
            vpc_id: props.vpc_id,
            port,
            protocol,
            health_check_path: props.health_check_path,
        };
        tree.attach(parent, name, Self::with_origin(origin))
    }

    pub fn import(
        tree: &mut Tree,
        parent: impl Into<NodeId>,
        name: &str,
        arn: impl Into<String>,
    ) -> Result<Handle<Self>> {
        let origin = TargetGroupOrigin::Imported { arn: arn.into() };
        tree.attach(parent, name, Self::with_origin(origin))
    }

    fn with_origin(origin: TargetGroupOrigin) -> Self {
        Self {
            origin,
            target_type: None,
            targets: vec![],
            listeners: vec![],
            members: vec![],
        }
    }

    pub fn arn(target_group: Handle<Self>) -> Expr {
        Token::attribute(target_group, "Ref").into()
    }

    /// ARNs of the load balancers of all registered listeners
    ///
    /// Evaluated at synthesis, so listeners registered after this call are included.
    pub fn load_balancer_arns(target_group: Handle<Self>) -> Expr {
        Token::lazy(move |ctx| {
            let tree = ctx.tree()?;
            let mut load_balancers: Vec<Handle<LoadBalancer>> = vec![];
            for listener in &tree.get(target_group).listeners {
                if let Some(load_balancer) = tree.get(*listener).load_balancer() {
                    if !load_balancers.contains(&load_balancer) {
                        load_balancers.push(load_balancer);
                    }
                }
            }
            Ok(Expr::Array(
                load_balancers.into_iter().map(LoadBalancer::arn).collect(),
            ))
        })
        .into()
    }

    pub fn origin(&self) -> &TargetGroupOrigin {
        &self.origin
    }

    pub fn target_type(&self) -> Option<TargetType> {
        self.target_type
    }

    pub fn targets(&self) -> &[TargetDescription] {
        &self.targets
    }

    pub fn listeners(&self) -> &[Handle<Listener>] {
        &self.listeners
    }

    /// Self-registering members and the port the load balancer reaches them on
    pub fn members(&self) -> &[(Connections, Port)] {
        &self.members
    }

    /// Add all `targets`, or none of them when their type conflicts with the group
    pub fn add_targets(
        tree: &mut Tree,
        target_group: Handle<Self>,
        targets: &[Box<dyn Registerable>],
    ) -> Result<()> {
        let Some(target_type) = common_target_type(targets)? else {
            return Ok(());
        };
        Self::accepts_targets(tree, target_group)?;
        Self::set_target_type(tree, target_group, target_type)?;
        for target in targets {
            target.attach_to_target_group(tree, target_group)?;
        }
        Ok(())
    }

    /// Fix the target type, all targets must agree on it
    pub fn set_target_type(
        tree: &mut Tree,
        target_group: Handle<Self>,
        target_type: TargetType,
    ) -> Result<()> {
        let this = tree.get_mut(target_group);
        match this.target_type {
            Some(existing) if existing != target_type => Err(ConstructError::TargetTypeMismatch {
                existing,
                new: target_type,
            }),
            _ => {
                this.target_type = Some(target_type);
                Ok(())
            }
        }
    }

    /// Imported target groups are managed elsewhere and take no targets
    pub fn accepts_targets(tree: &Tree, target_group: Handle<Self>) -> Result<()> {
        match tree.get(target_group).origin {
            TargetGroupOrigin::Constructed { .. } => Ok(()),
            TargetGroupOrigin::Imported { .. } => Err(ConstructError::UnsupportedOperation(
                "cannot add targets to an imported target group".to_string(),
            )),
        }
    }

    pub fn add_target(
        tree: &mut Tree,
        target_group: Handle<Self>,
        target_type: TargetType,
        description: TargetDescription,
    ) -> Result<()> {
        Self::accepts_targets(tree, target_group)?;
        Self::set_target_type(tree, target_group, target_type)?;
        tree.get_mut(target_group).targets.push(description);
        Ok(())
    }

    /// Record that `listener` forwards to this group; registering the same listener again is a no-op
    pub(crate) fn register_listener(
        tree: &mut Tree,
        target_group: Handle<Self>,
        listener: Handle<Listener>,
    ) -> Result<()> {
        let this = tree.get_mut(target_group);
        if this.listeners.contains(&listener) {
            return Ok(());
        }
        this.listeners.push(listener);

        let members = this.members.clone();
        let load_balancer = tree.get(listener).connections().clone();
        for (member, port) in members {
            load_balancer.allow_to(tree, &member, Some(port), "Load balancer to target")?;
        }
        Ok(())
    }

    /// Register a member that needs to be reachable from the load balancers of this group
    ///
    /// `port` defaults to the group port.
    pub fn register_connectable(
        tree: &mut Tree,
        target_group: Handle<Self>,
        member: Connections,
        port: Option<Port>,
    ) -> Result<()> {
        Self::accepts_targets(tree, target_group)?;
        let this = tree.get_mut(target_group);
        let port = match (port, &this.origin) {
            (Some(port), _) => port,
            (None, TargetGroupOrigin::Constructed { port, .. }) => Port::tcp(*port),
            (None, TargetGroupOrigin::Imported { .. }) => {
                return Err(ConstructError::AmbiguousPort {
                    description: "Load balancer to target".to_string(),
                })
            }
        };
        this.members.push((member.clone(), port));

        let load_balancers: Vec<Connections> = this
            .listeners
            .clone()
            .into_iter()
            .map(|listener| tree.get(listener).connections().clone())
            .collect();
        for load_balancer in load_balancers {
            load_balancer.allow_to(tree, &member, Some(port), "Load balancer to target")?;
        }
        Ok(())
    }
}

impl Construct for TargetGroup {
    fn resource_type(&self) -> Option<&'static str> {
        match self.origin {
            TargetGroupOrigin::Constructed { .. } => Some("AWS::ElasticLoadBalancingV2::TargetGroup"),
            TargetGroupOrigin::Imported { .. } => None,
        }
    }

    fn properties(&self, _scope: Scope<'_>) -> Expr {
        let TargetGroupOrigin::Constructed {
            vpc_id,
            port,
            protocol,
            health_check_path,
        } = &self.origin
        else {
            return Expr::empty_object();
        };

        let mut properties = vec![
            ("Port", Expr::from(*port)),
            ("Protocol", Expr::from(protocol.to_string())),
            ("VpcId", vpc_id.clone()),
        ];
        if let Some(target_type) = self.target_type {
            properties.push(("TargetType", Expr::from(target_type.to_string())));
        }
        if !self.targets.is_empty() {
            let targets = self.targets.iter().map(TargetDescription::to_expr).collect();
            properties.push(("Targets", Expr::Array(targets)));
        }
        if let Some(path) = health_check_path {
            properties.push(("HealthCheckPath", Expr::from(path)));
        }
        Expr::object(properties)
    }

    fn attribute(&self, name: &str, _scope: Scope<'_>) -> Option<Expr> {
        match (&self.origin, name) {
            (TargetGroupOrigin::Imported { arn }, "Ref" | "TargetGroupArn") => Some(Expr::from(arn)),
            _ => None,
        }
    }
}
