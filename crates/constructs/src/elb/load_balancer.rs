use super::listener::{Listener, ListenerProps};
use super::target_group::TargetGroup;
use crate::construct::Construct;
use crate::ec2::{Connectable, Connections, SecurityGroup, SecurityGroupProps};
use crate::error::Result;
use crate::expr::Expr;
use crate::token::Token;
use crate::tree::{Handle, NodeId, Scope, Tree};

#[derive(Debug, Clone)]
pub struct LoadBalancerProps {
    pub vpc_id: Expr,
    pub subnets: Vec<Expr>,
    pub internet_facing: bool,
    /// Created as child `SecurityGroup` when not given
    pub security_group: Option<Handle<SecurityGroup>>,
}

impl LoadBalancerProps {
    pub fn new(vpc_id: impl Into<Expr>) -> Self {
        Self {
            vpc_id: vpc_id.into(),
            subnets: vec![],
            internet_facing: false,
            security_group: None,
        }
    }
}

/// Attributes of a load balancer that was synthesized elsewhere
#[derive(Debug, Clone)]
pub struct ImportedLoadBalancer {
    pub arn: String,
    pub security_group_id: String,
}

#[derive(Debug)]
pub enum LoadBalancerOrigin {
    Constructed {
        vpc_id: Expr,
        subnets: Vec<Expr>,
        internet_facing: bool,
    },
    Imported { arn: String },
}

/// An application load balancer
#[derive(Debug)]
pub struct LoadBalancer {
    origin: LoadBalancerOrigin,
    connections: Connections,
}

impl LoadBalancer {
    pub fn create(
        tree: &mut Tree,
        parent: impl Into<NodeId>,
        name: &str,
        props: LoadBalancerProps,
    ) -> Result<Handle<Self>> {
        let origin = LoadBalancerOrigin::Constructed {
            vpc_id: props.vpc_id.clone(),
            subnets: props.subnets,
            internet_facing: props.internet_facing,
        };
        let load_balancer = tree.attach(parent, name, Self::with_origin(origin))?;

        let group = match props.security_group {
            Some(group) => group,
            None => {
                let description = format!(
                    "Automatically created Security Group for ELB {}",
                    tree.path_string(load_balancer.id())
                );
                let group_props = SecurityGroupProps {
                    vpc_id: props.vpc_id,
                    description: Some(description),
                    allow_all_outbound: false,
                };
                SecurityGroup::create(tree, load_balancer, "SecurityGroup", group_props)?
            }
        };
        tree.get_mut(load_balancer)
            .connections
            .add_security_group(group);

        Ok(load_balancer)
    }

    pub fn import(
        tree: &mut Tree,
        parent: impl Into<NodeId>,
        name: &str,
        attributes: ImportedLoadBalancer,
    ) -> Result<Handle<Self>> {
        let origin = LoadBalancerOrigin::Imported {
            arn: attributes.arn,
        };
        let load_balancer = tree.attach(parent, name, Self::with_origin(origin))?;
        let group = SecurityGroup::import(tree, load_balancer, "SecurityGroup", attributes.security_group_id)?;
        tree.get_mut(load_balancer)
            .connections
            .add_security_group(group);
        Ok(load_balancer)
    }

    fn with_origin(origin: LoadBalancerOrigin) -> Self {
        Self {
            origin,
            connections: Connections::default(),
        }
    }

    pub fn arn(load_balancer: Handle<Self>) -> Expr {
        Token::attribute(load_balancer, "Ref").into()
    }

    pub fn dns_name(load_balancer: Handle<Self>) -> Expr {
        Token::attribute(load_balancer, "DNSName").into()
    }

    pub fn origin(&self) -> &LoadBalancerOrigin {
        &self.origin
    }

    /// Add another security group to the load balancer and all of its listeners
    ///
    /// Members of target groups behind those listeners become reachable from the new group too.
    pub fn add_security_group(
        tree: &mut Tree,
        load_balancer: Handle<Self>,
        group: Handle<SecurityGroup>,
    ) -> Result<()> {
        tree.get_mut(load_balancer)
            .connections
            .add_security_group(group);

        let listeners: Vec<Handle<Listener>> = tree
            .scope(load_balancer.id())
            .children_of::<Listener>()
            .map(|(listener, _)| listener)
            .collect();
        for listener in &listeners {
            Listener::share_security_group(tree, *listener, group)?;
        }

        let view: &Tree = tree;
        let members: Vec<_> = view
            .walk()
            .into_iter()
            .filter_map(|id| view.downcast::<TargetGroup>(id))
            .map(|target_group| view.get(target_group))
            .filter(|target_group| target_group.listeners().iter().any(|l| listeners.contains(l)))
            .flat_map(|target_group| target_group.members().iter().cloned())
            .collect();
        let connections = Connections::new(vec![group], None);
        for (member, port) in members {
            connections.allow_to(tree, &member, Some(port), "Load balancer to target")?;
        }

        tracing::debug!(
            load_balancer = %tree.path_string(load_balancer.id()),
            listeners = listeners.len(),
            "security group added"
        );
        Ok(())
    }

    pub fn add_listener(
        tree: &mut Tree,
        load_balancer: Handle<Self>,
        name: &str,
        props: ListenerProps,
    ) -> Result<Handle<Listener>> {
        Listener::create(tree, load_balancer, name, props)
    }
}

impl Connectable for LoadBalancer {
    fn connections(&self) -> &Connections {
        &self.connections
    }
}

impl Construct for LoadBalancer {
    fn resource_type(&self) -> Option<&'static str> {
        match self.origin {
            LoadBalancerOrigin::Constructed { .. } => Some("AWS::ElasticLoadBalancingV2::LoadBalancer"),
            LoadBalancerOrigin::Imported { .. } => None,
        }
    }

    fn properties(&self, _scope: Scope<'_>) -> Expr {
        let LoadBalancerOrigin::Constructed {
            subnets,
            internet_facing,
            ..
        } = &self.origin
        else {
            return Expr::empty_object();
        };

        let scheme = match internet_facing {
            true => "internet-facing",
            false => "internal",
        };
        let security_groups = self
            .connections
            .security_groups()
            .iter()
            .map(|group| SecurityGroup::group_id(*group))
            .collect();

        Expr::object([
            ("Type", Expr::from("application")),
            ("Scheme", Expr::from(scheme)),
            ("Subnets", Expr::Array(subnets.clone())),
            ("SecurityGroups", Expr::Array(security_groups)),
        ])
    }

    fn attribute(&self, name: &str, _scope: Scope<'_>) -> Option<Expr> {
        match (&self.origin, name) {
            (LoadBalancerOrigin::Imported { arn }, "Ref" | "LoadBalancerArn") => Some(Expr::from(arn)),
            _ => None,
        }
    }

    fn validate(&self, _scope: Scope<'_>) -> Vec<String> {
        match &self.origin {
            LoadBalancerOrigin::Constructed { subnets, .. } if subnets.is_empty() => {
                vec!["LoadBalancer needs at least one subnet".to_string()]
            }
            _ => vec![],
        }
    }
}
