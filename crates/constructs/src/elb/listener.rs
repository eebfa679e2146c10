use super::listener_rule::{forward_action, ListenerRule};
use super::load_balancer::{LoadBalancer, LoadBalancerOrigin};
use super::target_group::{TargetGroup, TargetGroupProps};
use super::targets::{common_target_type, Registerable};
use crate::construct::Construct;
use crate::ec2::{Connectable, Connections, Port, SecurityGroup};
use crate::error::{ConstructError, Result};
use crate::expr::Expr;
use crate::token::Token;
use crate::tree::{Handle, NodeId, Scope, Tree};
use indexmap::IndexMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApplicationProtocol {
    Http,
    Https,
}

impl ApplicationProtocol {
    pub fn default_port(self) -> u16 {
        match self {
            ApplicationProtocol::Http => 80,
            ApplicationProtocol::Https => 443,
        }
    }

    pub(crate) fn from_port(port: u16) -> Self {
        match port {
            443 => ApplicationProtocol::Https,
            _ => ApplicationProtocol::Http,
        }
    }

    /// Fill in whichever of protocol and port is missing
    pub(crate) fn complete(
        protocol: Option<Self>,
        port: Option<u16>,
        what: &str,
    ) -> Result<(Self, u16)> {
        match (protocol, port) {
            (Some(protocol), Some(port)) => Ok((protocol, port)),
            (Some(protocol), None) => Ok((protocol, protocol.default_port())),
            (None, Some(port)) => Ok((Self::from_port(port), port)),
            (None, None) => Err(ConstructError::InvalidProps(format!(
                "{what} needs at least one of 'port' or 'protocol'"
            ))),
        }
    }
}

impl fmt::Display for ApplicationProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationProtocol::Http => f.write_str("HTTP"),
            ApplicationProtocol::Https => f.write_str("HTTPS"),
        }
    }
}

/// When a routing entry applies
///
/// Either all empty (a default entry) or a priority together with at least one condition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleConditions {
    pub priority: Option<u32>,
    pub host_header: Option<String>,
    pub path_pattern: Option<String>,
}

impl RuleConditions {
    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn host_header(mut self, host: impl Into<String>) -> Self {
        self.host_header = Some(host.into());
        self
    }

    pub fn path_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.path_pattern = Some(pattern.into());
        self
    }

    pub fn has_condition(&self) -> bool {
        self.host_header.is_some() || self.path_pattern.is_some()
    }

    pub(crate) fn check(&self) -> Result<()> {
        match (self.has_condition(), self.priority.is_some()) {
            (true, false) => Err(ConstructError::InvalidRule(
                "setting 'host_header' or 'path_pattern' also requires 'priority'".to_string(),
            )),
            (false, true) => Err(ConstructError::InvalidRule(
                "setting 'priority' also requires 'host_header' or 'path_pattern'".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AddTargetGroupsProps {
    pub target_groups: Vec<Handle<TargetGroup>>,
    pub conditions: RuleConditions,
}

#[derive(Debug, Default)]
pub struct AddTargetsProps {
    /// Defaults to the default port of the protocol
    pub port: Option<u16>,
    /// Defaults to the listener protocol
    pub protocol: Option<ApplicationProtocol>,
    pub targets: Vec<Box<dyn Registerable>>,
    pub conditions: RuleConditions,
    pub health_check_path: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListenerProps {
    pub port: Option<u16>,
    pub protocol: Option<ApplicationProtocol>,
    pub certificate_arns: Vec<Expr>,
    pub default_target_groups: Vec<Handle<TargetGroup>>,
    /// Allow connections to the listener port from anywhere
    pub open: bool,
    pub ssl_policy: Option<String>,
}

/// Attributes of a listener that was synthesized elsewhere
#[derive(Debug, Clone)]
pub struct ImportedListener {
    pub arn: String,
    pub security_group_id: String,
    pub default_port: Option<u16>,
}

#[derive(Debug)]
pub enum ListenerOrigin {
    Declared {
        load_balancer: Handle<LoadBalancer>,
        protocol: ApplicationProtocol,
        port: u16,
        ssl_policy: Option<String>,
    },
    /// Only conditional rules can be added, the default actions are closed for modification
    Imported { arn: String },
}

#[derive(Debug)]
pub struct Listener {
    origin: ListenerOrigin,
    certificates: Vec<Expr>,
    default_target_groups: Vec<Handle<TargetGroup>>,
    connections: Connections,
    open: bool,
}

impl Listener {
    pub(crate) fn create(
        tree: &mut Tree,
        load_balancer: Handle<LoadBalancer>,
        name: &str,
        props: ListenerProps,
    ) -> Result<Handle<Self>> {
        let (protocol, port) = ApplicationProtocol::complete(props.protocol, props.port, "Listener")?;

        let connections = Connections::new(
            tree.get(load_balancer).connections().security_groups().to_vec(),
            Some(Port::tcp(port)),
        );
        let listener = tree.attach(
            load_balancer,
            name,
            Self {
                origin: ListenerOrigin::Declared {
                    load_balancer,
                    protocol,
                    port,
                    ssl_policy: props.ssl_policy,
                },
                certificates: props.certificate_arns,
                default_target_groups: vec![],
                connections,
                open: props.open,
            },
        )?;

        if props.open {
            let connections = tree.get(listener).connections.clone();
            let description = format!("Allow from anyone on port {port}");
            connections.allow_from_any_ipv4(tree, None, &description)?;
        }

        if !props.default_target_groups.is_empty() {
            let defaults = AddTargetGroupsProps {
                target_groups: props.default_target_groups,
                conditions: RuleConditions::default(),
            };
            Self::add_target_groups(tree, listener, "Default", defaults)?;
        }

        Ok(listener)
    }

    /// Reference a listener by its attributes
    pub fn import(
        tree: &mut Tree,
        parent: impl Into<NodeId>,
        name: &str,
        attributes: ImportedListener,
    ) -> Result<Handle<Self>> {
        let listener = tree.attach(
            parent,
            name,
            Self {
                origin: ListenerOrigin::Imported {
                    arn: attributes.arn,
                },
                certificates: vec![],
                default_target_groups: vec![],
                connections: Connections::new(vec![], attributes.default_port.map(Port::tcp)),
                open: false,
            },
        )?;

        let group = SecurityGroup::import(tree, listener, "SecurityGroup", attributes.security_group_id)?;
        tree.get_mut(listener).connections.add_security_group(group);
        Ok(listener)
    }

    /// Use a security group that was added to the load balancer after this listener was created
    pub(crate) fn share_security_group(
        tree: &mut Tree,
        listener: Handle<Self>,
        group: Handle<SecurityGroup>,
    ) -> Result<()> {
        let this = tree.get_mut(listener);
        this.connections.add_security_group(group);
        let open_port = match (this.open, &this.origin) {
            (true, ListenerOrigin::Declared { port, .. }) => Some(*port),
            _ => None,
        };
        if let Some(port) = open_port {
            let description = format!("Allow from anyone on port {port}");
            Connections::new(vec![group], Some(Port::tcp(port))).allow_from_any_ipv4(tree, None, &description)?;
        }
        Ok(())
    }

    pub fn arn(listener: Handle<Self>) -> Expr {
        Token::attribute(listener, "Ref").into()
    }

    pub fn origin(&self) -> &ListenerOrigin {
        &self.origin
    }

    pub fn load_balancer(&self) -> Option<Handle<LoadBalancer>> {
        match &self.origin {
            ListenerOrigin::Declared { load_balancer, .. } => Some(*load_balancer),
            ListenerOrigin::Imported { .. } => None,
        }
    }

    pub fn certificates(&self) -> &[Expr] {
        &self.certificates
    }

    pub fn default_target_groups(&self) -> &[Handle<TargetGroup>] {
        &self.default_target_groups
    }

    /// Add certificates, duplicates are kept
    pub fn add_certificate_arns<I>(&mut self, arns: I)
    where
        I: IntoIterator,
        I::Item: Into<Expr>,
    {
        self.certificates.extend(arns.into_iter().map(Into::into));
    }

    /// Route to `target_groups`, either by default or as a conditional rule named `id`
    ///
    /// Every target group learns about this listener.
    pub fn add_target_groups(
        tree: &mut Tree,
        listener: Handle<Self>,
        id: &str,
        props: AddTargetGroupsProps,
    ) -> Result<Option<Handle<ListenerRule>>> {
        props.conditions.check()?;

        let rule = match props.conditions.priority {
            Some(priority) => {
                let rule = ListenerRule::new(
                    listener,
                    priority,
                    props.conditions.host_header.clone(),
                    props.conditions.path_pattern.clone(),
                    props.target_groups.clone(),
                );
                Some(tree.attach(listener, id, rule)?)
            }
            None => {
                let this = tree.get_mut(listener);
                if let ListenerOrigin::Imported { .. } = this.origin {
                    return Err(ConstructError::UnsupportedOperation(
                        "cannot add default target groups to an imported listener, use a priority and a condition".to_string(),
                    ));
                }
                this.default_target_groups
                    .extend(props.target_groups.iter().copied());
                None
            }
        };

        tracing::debug!(
            listener = %tree.path_string(listener.id()),
            target_groups = props.target_groups.len(),
            priority = ?props.conditions.priority,
            "target groups added"
        );

        for target_group in props.target_groups {
            TargetGroup::register_listener(tree, target_group, listener)?;
        }

        Ok(rule)
    }

    /// Create a target group `<id>Group` for `props.targets` and route to it
    pub fn add_targets(
        tree: &mut Tree,
        listener: Handle<Self>,
        id: &str,
        props: AddTargetsProps,
    ) -> Result<Handle<TargetGroup>> {
        let (load_balancer, listener_protocol) = match &tree.get(listener).origin {
            ListenerOrigin::Declared {
                load_balancer,
                protocol,
                ..
            } => (*load_balancer, *protocol),
            ListenerOrigin::Imported { .. } => {
                return Err(ConstructError::UnsupportedOperation(
                    "cannot add targets to an imported listener, create a TargetGroup and use add_target_groups".to_string(),
                ))
            }
        };

        let vpc_id = match tree.get(load_balancer).origin() {
            LoadBalancerOrigin::Constructed { vpc_id, .. } => vpc_id.clone(),
            LoadBalancerOrigin::Imported { .. } => {
                return Err(ConstructError::UnsupportedOperation(
                    "can only call add_targets() when using a constructed load balancer, create a TargetGroup and use add_target_groups".to_string(),
                ))
            }
        };

        props.conditions.check()?;
        common_target_type(&props.targets)?;

        let group_props = TargetGroupProps {
            vpc_id,
            port: props.port,
            protocol: Some(props.protocol.unwrap_or(listener_protocol)),
            health_check_path: props.health_check_path,
        };
        let target_group = TargetGroup::create(tree, listener, &format!("{id}Group"), group_props)?;
        TargetGroup::add_targets(tree, target_group, &props.targets)?;

        let add = AddTargetGroupsProps {
            target_groups: vec![target_group],
            conditions: props.conditions,
        };
        Self::add_target_groups(tree, listener, id, add)?;
        Ok(target_group)
    }
}

impl Connectable for Listener {
    fn connections(&self) -> &Connections {
        &self.connections
    }
}

impl Construct for Listener {
    fn resource_type(&self) -> Option<&'static str> {
        match self.origin {
            ListenerOrigin::Declared { .. } => Some("AWS::ElasticLoadBalancingV2::Listener"),
            ListenerOrigin::Imported { .. } => None,
        }
    }

    fn properties(&self, _scope: Scope<'_>) -> Expr {
        let ListenerOrigin::Declared {
            load_balancer,
            protocol,
            port,
            ssl_policy,
        } = &self.origin
        else {
            return Expr::empty_object();
        };

        let mut properties = vec![
            ("LoadBalancerArn", LoadBalancer::arn(*load_balancer)),
            ("Port", Expr::from(*port)),
            ("Protocol", Expr::from(protocol.to_string())),
        ];
        if !self.certificates.is_empty() {
            let certificates = self
                .certificates
                .iter()
                .map(|arn| Expr::object([("CertificateArn", arn.clone())]))
                .collect();
            properties.push(("Certificates", Expr::Array(certificates)));
        }
        if let Some(ssl_policy) = ssl_policy {
            properties.push(("SslPolicy", Expr::from(ssl_policy)));
        }
        properties.push((
            "DefaultActions",
            Expr::Array(vec![forward_action(&self.default_target_groups)]),
        ));

        Expr::object(properties)
    }

    fn attribute(&self, name: &str, _scope: Scope<'_>) -> Option<Expr> {
        match (&self.origin, name) {
            (ListenerOrigin::Imported { arn }, "Ref" | "ListenerArn") => Some(Expr::from(arn)),
            _ => None,
        }
    }

    fn validate(&self, scope: Scope<'_>) -> Vec<String> {
        let mut messages = vec![];

        if let ListenerOrigin::Declared { protocol, .. } = &self.origin {
            if *protocol == ApplicationProtocol::Https && self.certificates.is_empty() {
                messages.push(
                    "HTTPS Listener needs at least one certificate (call add_certificate_arns)"
                        .to_string(),
                );
            }
            if self.default_target_groups.is_empty() {
                messages.push(
                    "Listener needs at least one default target group (call add_target_groups)"
                        .to_string(),
                );
            }
        }

        let mut priorities: IndexMap<u32, Vec<&str>> = IndexMap::new();
        for (rule, props) in scope.children_of::<ListenerRule>() {
            priorities
                .entry(props.priority())
                .or_default()
                .push(scope.tree().name(rule.id()));
        }
        for (priority, rules) in priorities {
            if rules.len() > 1 {
                messages.push(format!(
                    "Priority {priority} is used by multiple rules: {}",
                    rules.join(", ")
                ));
            }
        }

        messages
    }
}
