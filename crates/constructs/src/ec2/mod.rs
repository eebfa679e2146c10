//! network reachability: ports, security groups and connections
mod connections;
mod port;
mod security_group;

pub use connections::{Connectable, Connections};
pub use port::{Port, Protocol};
pub use security_group::{
    Direction, Peer, Rule, SecurityGroup, SecurityGroupOrigin, SecurityGroupProps,
    SecurityGroupRule,
};
