use super::Port;
use crate::construct::Construct;
use crate::error::Result;
use crate::expr::Expr;
use crate::token::Token;
use crate::tree::{Handle, NodeId, Scope, Tree};
use std::fmt;

/// The other side of a security group rule
#[derive(Debug, Clone, PartialEq)]
pub enum Peer {
    SecurityGroup(Handle<SecurityGroup>),
    Ipv4(String),
}

impl Peer {
    pub fn any_ipv4() -> Self {
        Peer::Ipv4("0.0.0.0/0".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ingress,
    Egress,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ingress => f.write_str("Ingress"),
            Direction::Egress => f.write_str("Egress"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct Rule {
    pub peer: Peer,
    pub port: Port,
    pub description: String,
}

impl Rule {
    fn properties(&self, direction: Direction) -> Vec<(&'static str, Expr)> {
        let mut properties = match (&self.peer, direction) {
            (Peer::SecurityGroup(group), Direction::Ingress) => {
                vec![("SourceSecurityGroupId", SecurityGroup::group_id(*group))]
            }
            (Peer::SecurityGroup(group), Direction::Egress) => {
                vec![("DestinationSecurityGroupId", SecurityGroup::group_id(*group))]
            }
            (Peer::Ipv4(cidr), _) => vec![("CidrIp", Expr::from(cidr))],
        };
        properties.extend(self.port.rule_properties());
        properties.push(("Description", Expr::from(&self.description)));
        properties
    }
}

#[derive(Debug, Clone)]
pub struct SecurityGroupProps {
    pub vpc_id: Expr,
    /// Defaults to the construct path
    pub description: Option<String>,
    /// Allow all outbound traffic; egress rules are not recorded while this is set
    pub allow_all_outbound: bool,
}

impl SecurityGroupProps {
    pub fn new(vpc_id: impl Into<Expr>) -> Self {
        Self {
            vpc_id: vpc_id.into(),
            description: None,
            allow_all_outbound: true,
        }
    }
}

#[derive(Debug)]
pub enum SecurityGroupOrigin {
    Constructed(SecurityGroupProps),
    /// Referenced by id, its rules are emitted as separate resources
    Imported { group_id: String },
}

#[derive(Debug)]
pub struct SecurityGroup {
    origin: SecurityGroupOrigin,
    ingress: Vec<Rule>,
    egress: Vec<Rule>,
}

impl SecurityGroup {
    pub fn create(
        tree: &mut Tree,
        parent: impl Into<NodeId>,
        name: &str,
        props: SecurityGroupProps,
    ) -> Result<Handle<Self>> {
        tree.attach(parent, name, Self::with_origin(SecurityGroupOrigin::Constructed(props)))
    }

    pub fn import(
        tree: &mut Tree,
        parent: impl Into<NodeId>,
        name: &str,
        group_id: impl Into<String>,
    ) -> Result<Handle<Self>> {
        let origin = SecurityGroupOrigin::Imported {
            group_id: group_id.into(),
        };
        tree.attach(parent, name, Self::with_origin(origin))
    }

    fn with_origin(origin: SecurityGroupOrigin) -> Self {
        Self {
            origin,
            ingress: vec![],
            egress: vec![],
        }
    }

    /// Deferred id of the group
    pub fn group_id(group: Handle<Self>) -> Expr {
        Token::attribute(group, "GroupId").into()
    }

    pub fn origin(&self) -> &SecurityGroupOrigin {
        &self.origin
    }

    pub fn ingress_rules(&self) -> &[Rule] {
        &self.ingress
    }

    pub fn egress_rules(&self) -> &[Rule] {
        &self.egress
    }

    pub fn add_ingress_rule(tree: &mut Tree, group: Handle<Self>, rule: Rule) -> Result<()> {
        Self::add_rule(tree, group, Direction::Ingress, rule)
    }

    pub fn add_egress_rule(tree: &mut Tree, group: Handle<Self>, rule: Rule) -> Result<()> {
        Self::add_rule(tree, group, Direction::Egress, rule)
    }

    /// Record a rule once
    fn add_rule(
        tree: &mut Tree,
        group: Handle<Self>,
        direction: Direction,
        rule: Rule,
    ) -> Result<()> {
        let allow_all_outbound = match &tree.get(group).origin {
            SecurityGroupOrigin::Constructed(props) => Some(props.allow_all_outbound),
            SecurityGroupOrigin::Imported { .. } => None,
        };

        match allow_all_outbound {
            Some(true) if direction == Direction::Egress => {
                tracing::trace!(port = %rule.port, "egress already allowed, rule not recorded");
            }
            Some(_) => {
                let this = tree.get_mut(group);
                let rules = match direction {
                    Direction::Ingress => &mut this.ingress,
                    Direction::Egress => &mut this.egress,
                };
                if !rules.contains(&rule) {
                    rules.push(rule);
                }
            }
            None => {
                let (recorded, index) = {
                    let scope = tree.scope(group.id());
                    let same_direction = scope
                        .children_of::<SecurityGroupRule>()
                        .filter(|(_, child)| child.direction == direction)
                        .map(|(_, child)| &child.rule)
                        .collect::<Vec<_>>();
                    (same_direction.contains(&&rule), same_direction.len())
                };
                if recorded {
                    return Ok(());
                }

                let standalone = SecurityGroupRule {
                    direction,
                    group,
                    rule,
                };
                tree.attach(group, format!("{direction}{index}"), standalone)?;
            }
        }
        Ok(())
    }
}

impl Construct for SecurityGroup {
    fn resource_type(&self) -> Option<&'static str> {
        match self.origin {
            SecurityGroupOrigin::Constructed(_) => Some("AWS::EC2::SecurityGroup"),
            SecurityGroupOrigin::Imported { .. } => None,
        }
    }

    fn properties(&self, scope: Scope<'_>) -> Expr {
        let SecurityGroupOrigin::Constructed(props) = &self.origin else {
            return Expr::empty_object();
        };

        let description = props
            .description
            .clone()
            .unwrap_or_else(|| scope.path_string());
        let mut properties = vec![
            ("GroupDescription", Expr::from(description)),
            ("VpcId", props.vpc_id.clone()),
        ];

        if !self.ingress.is_empty() {
            let ingress = self
                .ingress
                .iter()
                .map(|rule| Expr::object(rule.properties(Direction::Ingress)))
                .collect();
            properties.push(("SecurityGroupIngress", Expr::Array(ingress)));
        }

        let egress = if props.allow_all_outbound {
            vec![Expr::object([
                ("CidrIp", Expr::from("0.0.0.0/0")),
                ("Description", Expr::from("Allow all outbound traffic by default")),
                ("IpProtocol", Expr::from("-1")),
            ])]
        } else if self.egress.is_empty() {
            // a group without egress rules would otherwise get the provider's allow-all default
            vec![Expr::object([
                ("CidrIp", Expr::from("255.255.255.255/32")),
                ("Description", Expr::from("Disallow all traffic")),
                ("IpProtocol", Expr::from("icmp")),
                ("FromPort", Expr::from(252u16)),
                ("ToPort", Expr::from(86u16)),
            ])]
        } else {
            self.egress
                .iter()
                .map(|rule| Expr::object(rule.properties(Direction::Egress)))
                .collect()
        };
        properties.push(("SecurityGroupEgress", Expr::Array(egress)));

        Expr::object(properties)
    }

    fn attribute(&self, name: &str, _scope: Scope<'_>) -> Option<Expr> {
        match (&self.origin, name) {
            (SecurityGroupOrigin::Imported { group_id }, "GroupId" | "Ref") => {
                Some(Expr::from(group_id))
            }
            _ => None,
        }
    }
}

/// A rule of an imported security group, emitted as its own resource
#[derive(Debug)]
pub struct SecurityGroupRule {
    direction: Direction,
    group: Handle<SecurityGroup>,
    rule: Rule,
}

impl SecurityGroupRule {
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl Construct for SecurityGroupRule {
    fn resource_type(&self) -> Option<&'static str> {
        match self.direction {
            Direction::Ingress => Some("AWS::EC2::SecurityGroupIngress"),
            Direction::Egress => Some("AWS::EC2::SecurityGroupEgress"),
        }
    }

    fn properties(&self, _scope: Scope<'_>) -> Expr {
        let mut properties = vec![("GroupId", SecurityGroup::group_id(self.group))];
        properties.extend(self.rule.properties(self.direction));
        Expr::object(properties)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::synth::synthesize;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn https_from(group: Handle<SecurityGroup>) -> Rule {
        Rule::new(Peer::SecurityGroup(group), Port::tcp(443), "https".into())
    }

    #[test]
    fn rules_are_recorded_once() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = SecurityGroup::create(&mut tree, root, "A", SecurityGroupProps::new("vpc-1")).unwrap();
        let b = SecurityGroup::create(&mut tree, root, "B", SecurityGroupProps::new("vpc-1")).unwrap();

        SecurityGroup::add_ingress_rule(&mut tree, a, https_from(b)).unwrap();
        SecurityGroup::add_ingress_rule(&mut tree, a, https_from(b)).unwrap();
        SecurityGroup::add_egress_rule(&mut tree, b, https_from(a)).unwrap();

        assert_eq!(tree.get(a).ingress_rules().len(), 1);
        // b allows all outbound traffic
        assert!(tree.get(b).egress_rules().is_empty());
    }

    #[test]
    fn constructed_group_template() {
        let mut tree = Tree::new();
        let root = tree.root();
        let mut props = SecurityGroupProps::new("vpc-1");
        props.allow_all_outbound = false;
        let a = SecurityGroup::create(&mut tree, root, "A", props).unwrap();
        let b = SecurityGroup::import(&mut tree, root, "B", "sg-b").unwrap();
        SecurityGroup::add_ingress_rule(&mut tree, a, https_from(b)).unwrap();

        let artifact = synthesize(&tree).unwrap();
        let (_, resource) = artifact.find_by_path("A").unwrap();
        assert_eq!(
            serde_json::to_value(&resource.properties).unwrap(),
            json!({
                "GroupDescription": "A",
                "VpcId": "vpc-1",
                "SecurityGroupIngress": [{
                    "SourceSecurityGroupId": "sg-b",
                    "IpProtocol": "tcp",
                    "FromPort": 443,
                    "ToPort": 443,
                    "Description": "https"
                }],
                "SecurityGroupEgress": [{
                    "CidrIp": "255.255.255.255/32",
                    "Description": "Disallow all traffic",
                    "IpProtocol": "icmp",
                    "FromPort": 252,
                    "ToPort": 86
                }]
            })
        );
    }

    #[test]
    fn imported_group_rules_become_resources() {
        let mut tree = Tree::new();
        let root = tree.root();
        let imported = SecurityGroup::import(&mut tree, root, "Shared", "sg-shared").unwrap();
        let local = SecurityGroup::create(&mut tree, root, "Local", SecurityGroupProps::new("vpc-1")).unwrap();

        SecurityGroup::add_ingress_rule(&mut tree, imported, https_from(local)).unwrap();
        SecurityGroup::add_ingress_rule(&mut tree, imported, https_from(local)).unwrap();
        SecurityGroup::add_egress_rule(&mut tree, imported, https_from(local)).unwrap();

        let children: Vec<_> = tree
            .children(imported.id())
            .map(|child| tree.name(child).to_string())
            .collect();
        assert_eq!(children, vec!["Ingress0", "Egress0"]);

        let artifact = synthesize(&tree).unwrap();
        let local_id = tree.scope(local.id()).logical_id();
        let (_, ingress) = artifact.find_by_path("Shared/Ingress0").unwrap();
        assert_eq!(ingress.resource_type, "AWS::EC2::SecurityGroupIngress");
        assert_eq!(
            serde_json::to_value(&ingress.properties).unwrap(),
            json!({
                "GroupId": "sg-shared",
                "SourceSecurityGroupId": {"Fn::GetAtt": [local_id, "GroupId"]},
                "IpProtocol": "tcp",
                "FromPort": 443,
                "ToPort": 443,
                "Description": "https"
            })
        );
        assert!(artifact.find_by_path("Shared").is_none());
    }

    #[test]
    fn imported_group_rules_are_numbered_per_direction() {
        let mut tree = Tree::new();
        let root = tree.root();
        let imported = SecurityGroup::import(&mut tree, root, "Shared", "sg-shared").unwrap();
        let local = SecurityGroup::create(&mut tree, root, "Local", SecurityGroupProps::new("vpc-1")).unwrap();

        let ssh = Rule::new(Peer::SecurityGroup(local), Port::tcp(22), "ssh".into());
        SecurityGroup::add_egress_rule(&mut tree, imported, https_from(local)).unwrap();
        SecurityGroup::add_ingress_rule(&mut tree, imported, https_from(local)).unwrap();
        SecurityGroup::add_ingress_rule(&mut tree, imported, ssh.clone()).unwrap();
        SecurityGroup::add_ingress_rule(&mut tree, imported, ssh).unwrap();

        let children: Vec<_> = tree
            .children(imported.id())
            .map(|child| tree.name(child).to_string())
            .collect();
        assert_eq!(children, vec!["Egress0", "Ingress0", "Ingress1"]);
    }
}
