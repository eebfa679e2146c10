use super::target_group::{TargetDescription, TargetGroup, TargetType};
use crate::ec2::{Connectable, Connections, Port};
use crate::error::{ConstructError, Result};
use crate::expr::Expr;
use crate::tree::{Handle, Tree};
use std::fmt;

/// Something that can be put behind a [TargetGroup]
pub trait Registerable: fmt::Debug {
    fn target_type(&self) -> TargetType;

    /// Called once, when the target is added to `target_group`
    fn attach_to_target_group(&self, tree: &mut Tree, target_group: Handle<TargetGroup>) -> Result<()>;
}

/// The type shared by all `targets`, `None` if there are none
pub(crate) fn common_target_type(targets: &[Box<dyn Registerable>]) -> Result<Option<TargetType>> {
    let mut common = None;
    for target in targets {
        let target_type = target.target_type();
        match common {
            Some(existing) if existing != target_type => {
                return Err(ConstructError::TargetTypeMismatch {
                    existing,
                    new: target_type,
                })
            }
            _ => common = Some(target_type),
        }
    }
    Ok(common)
}

#[derive(Debug, Clone)]
pub struct InstanceTarget {
    instance_id: Expr,
    port: Option<u16>,
}

impl InstanceTarget {
    pub fn new(instance_id: impl Into<Expr>) -> Self {
        Self {
            instance_id: instance_id.into(),
            port: None,
        }
    }

    /// Override the group port for this instance
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

impl Registerable for InstanceTarget {
    fn target_type(&self) -> TargetType {
        TargetType::Instance
    }

    fn attach_to_target_group(&self, tree: &mut Tree, target_group: Handle<TargetGroup>) -> Result<()> {
        let description = TargetDescription {
            id: self.instance_id.clone(),
            port: self.port,
            availability_zone: None,
        };
        TargetGroup::add_target(tree, target_group, TargetType::Instance, description)
    }
}

#[derive(Debug, Clone)]
pub struct IpTarget {
    address: String,
    port: Option<u16>,
    availability_zone: Option<String>,
}

impl IpTarget {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: None,
            availability_zone: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Only needed for addresses outside the VPC, use `"all"` for any zone
    pub fn with_availability_zone(mut self, zone: impl Into<String>) -> Self {
        self.availability_zone = Some(zone.into());
        self
    }
}

impl Registerable for IpTarget {
    fn target_type(&self) -> TargetType {
        TargetType::Ip
    }

    fn attach_to_target_group(&self, tree: &mut Tree, target_group: Handle<TargetGroup>) -> Result<()> {
        let description = TargetDescription {
            id: Expr::from(&self.address),
            port: self.port,
            availability_zone: self.availability_zone.clone(),
        };
        TargetGroup::add_target(tree, target_group, TargetType::Ip, description)
    }
}

/// A member that registers itself with the group (an auto scaling group, for example)
///
/// It is not listed in `Targets`, but the load balancer is allowed to reach its security groups.
#[derive(Debug, Clone)]
pub struct ConnectableTarget {
    connections: Connections,
    port: Option<Port>,
}

impl ConnectableTarget {
    pub fn new(connections: Connections) -> Self {
        Self {
            connections,
            port: None,
        }
    }

    pub fn with_port(mut self, port: Port) -> Self {
        self.port = Some(port);
        self
    }
}

impl Connectable for ConnectableTarget {
    fn connections(&self) -> &Connections {
        &self.connections
    }
}

impl Registerable for ConnectableTarget {
    fn target_type(&self) -> TargetType {
        TargetType::Instance
    }

    fn attach_to_target_group(&self, tree: &mut Tree, target_group: Handle<TargetGroup>) -> Result<()> {
        TargetGroup::accepts_targets(tree, target_group)?;
        TargetGroup::set_target_type(tree, target_group, TargetType::Instance)?;
        TargetGroup::register_connectable(tree, target_group, self.connections.clone(), self.port)
    }
}
