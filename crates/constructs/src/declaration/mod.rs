//! construct trees from HCL declarations
//!
//! ```hcl
//! security_group "db" { vpc_id = "vpc-1" }
//!
//! load_balancer "web" {
//!   vpc_id          = "vpc-1"
//!   subnets         = ["subnet-1"]
//!   internet_facing = true
//! }
//!
//! target_group "api" {
//!   vpc_id    = "vpc-1"
//!   port      = 8080
//!   instances = ["i-1"]
//! }
//!
//! listener "web" "http" {
//!   port = 80
//!   default_target_groups = ["api"]
//!   rules = [{ priority = 10, path_pattern = "/api/*", target_groups = ["api"] }]
//! }
//!
//! allow "web" "db" { port = 5432 }
//! ```
//!
//! Every declared construct is attached to the root of the tree under its label, listeners under their load
//! balancer. A listener with a single label refers to an existing listener (`arn`), in the same way that
//! `group_id` and `arn` refer to existing security groups, load balancers and target groups.
//!
//! Blocks are processed kind by kind in the order above, so references only need to point at an earlier
//! kind. All problems are collected and reported together as [DeclarationErrors].
mod blocks;
mod documents;

pub use documents::{HclDocuments, LoadError, Source, SourceAttribute, SourceBlock};

use crate::ec2::{Connectable, Connections, Port, SecurityGroup, SecurityGroupProps};
use crate::elb::{
    AddTargetGroupsProps, ImportedListener, ImportedLoadBalancer, InstanceTarget, IpTarget,
    Listener, ListenerProps, LoadBalancer, LoadBalancerProps, Registerable, RuleConditions,
    TargetGroup, TargetGroupProps,
};
use crate::error::ConstructError;
use crate::expr::Expr;
use crate::tree::{Handle, Tree};
use blocks::{
    AllowBlock, ListenerBlock, LoadBalancerBlock, RuleBlock, SecurityGroupBlock, TargetGroupBlock,
};
use hcl_edit::structure::Block;
use indexmap::IndexMap;
use std::fmt;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    SecurityGroup,
    LoadBalancer,
    TargetGroup,
    Listener,
    Allow,
}

impl Kind {
    /// Processing order
    pub const ALL: [Kind; 5] = [
        Kind::SecurityGroup,
        Kind::LoadBalancer,
        Kind::TargetGroup,
        Kind::Listener,
        Kind::Allow,
    ];

    pub fn ident(self) -> &'static str {
        match self {
            Kind::SecurityGroup => "security_group",
            Kind::LoadBalancer => "load_balancer",
            Kind::TargetGroup => "target_group",
            Kind::Listener => "listener",
            Kind::Allow => "allow",
        }
    }

    fn labels(self) -> RangeInclusive<usize> {
        match self {
            Kind::Listener => 1..=2,
            Kind::Allow => 2..=2,
            _ => 1..=1,
        }
    }

    fn from_ident(ident: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.ident() == ident)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ident())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Issue {
    RootAttribute(usize),
    UnknownBlockType(usize),
    LabelCount { block: usize, kind: Kind },
    InvalidBody { block: usize, message: String },
    UnknownReference { block: usize, kind: &'static str, name: String },
    Construct { block: usize, error: ConstructError },
}

impl Issue {
    /// Index of the offending block, `None` for root attributes
    pub fn block(&self) -> Option<usize> {
        match self {
            Issue::RootAttribute(_) => None,
            Issue::UnknownBlockType(block)
            | Issue::LabelCount { block, .. }
            | Issue::InvalidBody { block, .. }
            | Issue::UnknownReference { block, .. }
            | Issue::Construct { block, .. } => Some(*block),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::RootAttribute(index) => {
                write!(f, "root attribute #{index}: attributes are only allowed inside blocks")
            }
            Issue::UnknownBlockType(_) => {
                let known: Vec<_> = Kind::ALL.iter().map(|kind| kind.ident()).collect();
                write!(f, "unknown block type, expected one of {}", known.join(", "))
            }
            Issue::LabelCount { kind, .. } => {
                let labels = kind.labels();
                if labels.start() == labels.end() {
                    write!(f, "{kind} needs exactly {} label(s)", labels.start())
                } else {
                    write!(f, "{kind} needs {} to {} labels", labels.start(), labels.end())
                }
            }
            Issue::InvalidBody { message, .. } => f.write_str(message),
            Issue::UnknownReference { kind, name, .. } => write!(f, "unknown {kind} {name:?}"),
            Issue::Construct { error, .. } => write!(f, "{error}"),
        }
    }
}

#[derive(derive_new::new, Debug, Clone, PartialEq)]
pub struct DeclarationErrors {
    #[new(default)]
    issues: Vec<Issue>,
}

impl DeclarationErrors {
    pub fn log(&mut self, issue: Issue) {
        tracing::trace!(?issue, "issue found");
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

impl std::error::Error for DeclarationErrors {}

impl fmt::Display for DeclarationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} issue(s) in declarations", self.issues.len())?;
        for issue in &self.issues {
            match issue.block() {
                Some(block) => write!(f, "\n  block #{block}: {issue}")?,
                None => write!(f, "\n  {issue}")?,
            }
        }
        Ok(())
    }
}

/// Build a construct tree from `documents`
///
/// Structural problems (root attributes, unknown blocks, label counts) stop before anything is built.
#[tracing::instrument(level = "debug", skip_all, fields(blocks = documents.blocks().count()))]
pub fn build_tree(documents: &HclDocuments) -> Result<Tree, DeclarationErrors> {
    let mut builder = Builder::new(documents);

    builder.check_structure();
    if !builder.errors.is_empty() {
        return Err(builder.errors);
    }

    builder.security_groups();
    builder.load_balancers();
    builder.target_groups();
    builder.listeners();
    builder.allows();

    if !builder.errors.is_empty() {
        return Err(builder.errors);
    }
    Ok(builder.tree)
}

struct Builder<'d> {
    documents: &'d HclDocuments,
    tree: Tree,
    security_groups: IndexMap<String, Handle<SecurityGroup>>,
    load_balancers: IndexMap<String, Handle<LoadBalancer>>,
    target_groups: IndexMap<String, Handle<TargetGroup>>,
    errors: DeclarationErrors,
}

fn label(block: &Block, index: usize) -> &str {
    block.labels[index].as_str()
}

fn lookup<T>(
    errors: &mut DeclarationErrors,
    known: &IndexMap<String, Handle<T>>,
    block: usize,
    kind: Kind,
    name: &str,
) -> Option<Handle<T>> {
    let found = known.get(name).copied();
    if found.is_none() {
        errors.log(Issue::UnknownReference {
            block,
            kind: kind.ident(),
            name: name.to_string(),
        });
    }
    found
}

/// All of `names` or `None` if any of them is unknown, every unknown name is logged
fn lookup_all<T>(
    errors: &mut DeclarationErrors,
    known: &IndexMap<String, Handle<T>>,
    block: usize,
    kind: Kind,
    names: &[String],
) -> Option<Vec<Handle<T>>> {
    let found: Vec<_> = names
        .iter()
        .map(|name| lookup(errors, known, block, kind, name))
        .collect();
    found.into_iter().collect()
}

impl<'d> Builder<'d> {
    fn new(documents: &'d HclDocuments) -> Self {
        Self {
            documents,
            tree: Tree::new(),
            security_groups: Default::default(),
            load_balancers: Default::default(),
            target_groups: Default::default(),
            errors: DeclarationErrors::new(),
        }
    }

    fn check_structure(&mut self) {
        for (index, _source, _attribute) in self.documents.attributes() {
            self.errors.log(Issue::RootAttribute(index));
        }

        for (index, _source, block) in self.documents.blocks() {
            match Kind::from_ident(block.ident.value().as_str()) {
                None => self.errors.log(Issue::UnknownBlockType(index)),
                Some(kind) if !kind.labels().contains(&block.labels.len()) => {
                    self.errors.log(Issue::LabelCount { block: index, kind })
                }
                Some(_) => {}
            }
        }
    }

    fn blocks(&self, kind: Kind) -> impl Iterator<Item = (usize, &'d Block)> {
        let documents: &'d HclDocuments = self.documents;
        documents
            .blocks_named(kind.ident())
            .map(|(index, _source, block)| (index, block))
    }

    fn decode<T: serde::de::DeserializeOwned>(&mut self, index: usize, block: &Block) -> Option<T> {
        match hcl::from_str(&block.body.to_string()) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                self.invalid(index, err.to_string());
                None
            }
        }
    }

    fn invalid(&mut self, block: usize, message: impl Into<String>) {
        self.errors.log(Issue::InvalidBody {
            block,
            message: message.into(),
        });
    }

    fn record<T>(&mut self, block: usize, result: Result<T, ConstructError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.errors.log(Issue::Construct { block, error });
                None
            }
        }
    }

    fn security_groups(&mut self) {
        for (index, block) in self.blocks(Kind::SecurityGroup) {
            let name = label(block, 0);
            let Some(body) = self.decode::<SecurityGroupBlock>(index, block) else {
                continue;
            };

            let root = self.tree.root();
            let result = match (body.vpc_id, body.group_id) {
                (Some(vpc_id), None) => {
                    let props = SecurityGroupProps {
                        vpc_id: Expr::from(vpc_id),
                        description: body.description,
                        allow_all_outbound: body.allow_all_outbound,
                    };
                    SecurityGroup::create(&mut self.tree, root, name, props)
                }
                (None, Some(group_id)) => SecurityGroup::import(&mut self.tree, root, name, group_id),
                _ => {
                    self.invalid(index, "exactly one of 'vpc_id' or 'group_id' is required");
                    continue;
                }
            };

            if let Some(group) = self.record(index, result) {
                self.security_groups.insert(name.to_string(), group);
            }
        }
    }

    fn load_balancers(&mut self) {
        for (index, block) in self.blocks(Kind::LoadBalancer) {
            let name = label(block, 0);
            let Some(body) = self.decode::<LoadBalancerBlock>(index, block) else {
                continue;
            };

            let root = self.tree.root();
            let result = match (body.vpc_id, body.arn, body.security_group_id) {
                (Some(vpc_id), None, None) => {
                    let security_group = match &body.security_group {
                        Some(group) => {
                            let found = lookup(
                                &mut self.errors,
                                &self.security_groups,
                                index,
                                Kind::SecurityGroup,
                                group,
                            );
                            let Some(found) = found else { continue };
                            Some(found)
                        }
                        None => None,
                    };
                    let props = LoadBalancerProps {
                        vpc_id: Expr::from(vpc_id),
                        subnets: body.subnets.into_iter().map(Expr::from).collect(),
                        internet_facing: body.internet_facing,
                        security_group,
                    };
                    LoadBalancer::create(&mut self.tree, root, name, props)
                }
                (None, Some(arn), Some(security_group_id)) => {
                    let attributes = ImportedLoadBalancer {
                        arn,
                        security_group_id,
                    };
                    LoadBalancer::import(&mut self.tree, root, name, attributes)
                }
                _ => {
                    self.invalid(
                        index,
                        "either 'vpc_id' or both 'arn' and 'security_group_id' are required",
                    );
                    continue;
                }
            };

            if let Some(load_balancer) = self.record(index, result) {
                self.load_balancers.insert(name.to_string(), load_balancer);
            }
        }
    }

    fn target_groups(&mut self) {
        for (index, block) in self.blocks(Kind::TargetGroup) {
            let name = label(block, 0);
            let Some(body) = self.decode::<TargetGroupBlock>(index, block) else {
                continue;
            };

            let root = self.tree.root();
            let result = match (body.vpc_id, body.arn) {
                (Some(vpc_id), None) => {
                    let props = TargetGroupProps {
                        vpc_id: Expr::from(vpc_id),
                        port: body.port,
                        protocol: body.protocol,
                        health_check_path: body.health_check_path,
                    };
                    TargetGroup::create(&mut self.tree, root, name, props)
                }
                (None, Some(arn)) => TargetGroup::import(&mut self.tree, root, name, arn),
                _ => {
                    self.invalid(index, "exactly one of 'vpc_id' or 'arn' is required");
                    continue;
                }
            };
            let Some(target_group) = self.record(index, result) else {
                continue;
            };
            self.target_groups.insert(name.to_string(), target_group);

            let mut targets: Vec<Box<dyn Registerable>> = vec![];
            targets.extend(
                body.instances
                    .into_iter()
                    .map(|id| Box::new(InstanceTarget::new(id)) as Box<dyn Registerable>),
            );
            targets.extend(
                body.ips
                    .into_iter()
                    .map(|ip| Box::new(IpTarget::new(ip)) as Box<dyn Registerable>),
            );
            let result = TargetGroup::add_targets(&mut self.tree, target_group, &targets);
            self.record(index, result);
        }
    }

    fn listeners(&mut self) {
        for (index, block) in self.blocks(Kind::Listener) {
            let Some(mut body) = self.decode::<ListenerBlock>(index, block) else {
                continue;
            };

            let rules = std::mem::take(&mut body.rules);
            let listener = match block.labels.len() {
                2 => self.declared_listener(index, label(block, 0), label(block, 1), body),
                _ => self.imported_listener(index, label(block, 0), body),
            };
            let Some(listener) = listener else { continue };

            for (position, rule) in rules.iter().enumerate() {
                self.rule(index, listener, position + 1, rule);
            }
        }
    }

    fn declared_listener(
        &mut self,
        index: usize,
        load_balancer: &str,
        name: &str,
        body: ListenerBlock,
    ) -> Option<Handle<Listener>> {
        if body.arn.is_some() || body.security_group_id.is_some() || body.default_port.is_some() {
            self.invalid(
                index,
                "'arn', 'security_group_id' and 'default_port' are only allowed on listeners with a single label",
            );
            return None;
        }

        let load_balancer = lookup(
            &mut self.errors,
            &self.load_balancers,
            index,
            Kind::LoadBalancer,
            load_balancer,
        );
        let default_target_groups = lookup_all(
            &mut self.errors,
            &self.target_groups,
            index,
            Kind::TargetGroup,
            &body.default_target_groups,
        );
        let (load_balancer, default_target_groups) = (load_balancer?, default_target_groups?);

        let props = ListenerProps {
            port: body.port,
            protocol: body.protocol,
            certificate_arns: body.certificates.into_iter().map(Expr::from).collect(),
            default_target_groups,
            open: body.open,
            ssl_policy: body.ssl_policy,
        };
        let result = LoadBalancer::add_listener(&mut self.tree, load_balancer, name, props);
        self.record(index, result)
    }

    fn imported_listener(
        &mut self,
        index: usize,
        name: &str,
        body: ListenerBlock,
    ) -> Option<Handle<Listener>> {
        let (Some(arn), Some(security_group_id)) = (body.arn, body.security_group_id) else {
            self.invalid(
                index,
                "a listener with a single label needs 'arn' and 'security_group_id'",
            );
            return None;
        };
        if body.port.is_some()
            || body.protocol.is_some()
            || !body.certificates.is_empty()
            || !body.default_target_groups.is_empty()
            || body.open
            || body.ssl_policy.is_some()
        {
            self.invalid(
                index,
                "an existing listener only accepts 'arn', 'security_group_id', 'default_port' and 'rules'",
            );
            return None;
        }

        let attributes = ImportedListener {
            arn,
            security_group_id,
            default_port: body.default_port,
        };
        let root = self.tree.root();
        let result = Listener::import(&mut self.tree, root, name, attributes);
        self.record(index, result)
    }

    /// Unnamed rules are named by their position, so equal priorities surface at validation
    fn rule(&mut self, index: usize, listener: Handle<Listener>, position: usize, rule: &RuleBlock) {
        let Some(target_groups) = lookup_all(
            &mut self.errors,
            &self.target_groups,
            index,
            Kind::TargetGroup,
            &rule.target_groups,
        ) else {
            return;
        };

        let name = match &rule.name {
            Some(name) => name.clone(),
            None => format!("Rule{position}"),
        };
        let props = AddTargetGroupsProps {
            target_groups,
            conditions: RuleConditions {
                priority: Some(rule.priority),
                host_header: rule.host_header.clone(),
                path_pattern: rule.path_pattern.clone(),
            },
        };
        let result = Listener::add_target_groups(&mut self.tree, listener, &name, props);
        self.record(index, result);
    }

    /// Connections of a security group or load balancer declared under `name`
    fn connections(&mut self, index: usize, name: &str) -> Option<Connections> {
        if let Some(group) = self.security_groups.get(name) {
            return Some(Connections::new(vec![*group], None));
        }
        if let Some(load_balancer) = self.load_balancers.get(name) {
            return Some(self.tree.get(*load_balancer).connections().clone());
        }
        self.errors.log(Issue::UnknownReference {
            block: index,
            kind: "security_group or load_balancer",
            name: name.to_string(),
        });
        None
    }

    fn allows(&mut self) {
        for (index, block) in self.blocks(Kind::Allow) {
            let (from_name, to_name) = (label(block, 0), label(block, 1));
            let Some(body) = self.decode::<AllowBlock>(index, block) else {
                continue;
            };

            let from = self.connections(index, from_name);
            let to = self.connections(index, to_name);
            let (Some(from), Some(to)) = (from, to) else {
                continue;
            };

            let description = body
                .description
                .unwrap_or_else(|| format!("{from_name} to {to_name}"));
            let result = from.allow_to(&mut self.tree, &to, body.port.map(Port::tcp), &description);
            self.record(index, result);
        }
    }
}
