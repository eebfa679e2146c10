use super::{Peer, Port, Rule, SecurityGroup};
use crate::error::{ConstructError, Result};
use crate::tree::{Handle, Tree};

/// Anything with network reachability governed by security groups
pub trait Connectable {
    fn connections(&self) -> &Connections;
}

/// The security groups of one resource, plus the port it is usually reached on
///
/// Rules are negotiated between two [Connections]: the side that calls [Connections::allow_to] gets an
/// egress rule, the peer gets the matching ingress rule. Group ids are tokens, so it does not matter
/// whether the peer's groups are fully declared yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Connections {
    security_groups: Vec<Handle<SecurityGroup>>,
    default_port: Option<Port>,
}

impl Connectable for Connections {
    fn connections(&self) -> &Connections {
        self
    }
}

impl Connections {
    pub fn new(security_groups: Vec<Handle<SecurityGroup>>, default_port: Option<Port>) -> Self {
        Self {
            security_groups,
            default_port,
        }
    }

    pub fn security_groups(&self) -> &[Handle<SecurityGroup>] {
        &self.security_groups
    }

    pub fn default_port(&self) -> Option<Port> {
        self.default_port
    }

    pub fn add_security_group(&mut self, group: Handle<SecurityGroup>) {
        if !self.security_groups.contains(&group) {
            self.security_groups.push(group);
        }
    }

    /// Allow traffic from `self` to `peer`
    ///
    /// Port precedence: `port`, the peer's default port, our own default port.
    #[tracing::instrument(level = "debug", skip(self, tree, peer, port))]
    pub fn allow_to(
        &self,
        tree: &mut Tree,
        peer: &dyn Connectable,
        port: Option<Port>,
        description: &str,
    ) -> Result<Port> {
        let peer = peer.connections();
        let port = port
            .or(peer.default_port)
            .or(self.default_port)
            .ok_or_else(|| ConstructError::AmbiguousPort {
                description: description.to_string(),
            })?;
        tracing::debug!(%port, "allowing traffic");

        for own in &self.security_groups {
            for other in &peer.security_groups {
                let egress = Rule::new(Peer::SecurityGroup(*other), port, description.to_string());
                SecurityGroup::add_egress_rule(tree, *own, egress)?;

                let ingress = Rule::new(Peer::SecurityGroup(*own), port, description.to_string());
                SecurityGroup::add_ingress_rule(tree, *other, ingress)?;
            }
        }

        Ok(port)
    }

    /// Allow traffic from `peer` to `self`, the peer authors the rule
    pub fn allow_from(
        &self,
        tree: &mut Tree,
        peer: &dyn Connectable,
        port: Option<Port>,
        description: &str,
    ) -> Result<Port> {
        peer.connections().allow_to(tree, self, port, description)
    }

    /// Allow traffic from anywhere on the internet
    pub fn allow_from_any_ipv4(
        &self,
        tree: &mut Tree,
        port: Option<Port>,
        description: &str,
    ) -> Result<Port> {
        let port = port
            .or(self.default_port)
            .ok_or_else(|| ConstructError::AmbiguousPort {
                description: description.to_string(),
            })?;

        for own in &self.security_groups {
            let ingress = Rule::new(Peer::any_ipv4(), port, description.to_string());
            SecurityGroup::add_ingress_rule(tree, *own, ingress)?;
        }

        Ok(port)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ec2::SecurityGroupProps;
    use pretty_assertions::assert_eq;

    fn group(tree: &mut Tree, name: &str) -> Handle<SecurityGroup> {
        let root = tree.root();
        let mut props = SecurityGroupProps::new("vpc-1");
        props.allow_all_outbound = false;
        SecurityGroup::create(tree, root, name, props).unwrap()
    }

    #[test]
    fn no_port_anywhere_is_ambiguous() {
        let mut tree = Tree::new();
        let app = Connections::new(vec![group(&mut tree, "App")], None);
        let db = Connections::new(vec![group(&mut tree, "Db")], None);

        let err = app.allow_to(&mut tree, &db, None, "app to db").unwrap_err();
        assert_eq!(
            err,
            ConstructError::AmbiguousPort {
                description: "app to db".to_string()
            }
        );
    }

    #[test]
    fn explicit_port_wins() {
        let mut tree = Tree::new();
        let app = Connections::new(vec![group(&mut tree, "App")], Some(Port::tcp(8080)));
        let db = Connections::new(vec![group(&mut tree, "Db")], Some(Port::tcp(5432)));

        let port = app
            .allow_to(&mut tree, &db, Some(Port::tcp(6432)), "pgbouncer")
            .unwrap();
        assert_eq!(port, Port::tcp(6432));

        let port = Connections::new(vec![], None)
            .allow_to(&mut tree, &Connections::default(), Some(Port::udp(53)), "dns")
            .unwrap();
        assert_eq!(port, Port::udp(53));
    }

    #[test]
    fn peer_default_then_own_default() {
        let mut tree = Tree::new();
        let app = Connections::new(vec![group(&mut tree, "App")], Some(Port::tcp(8080)));
        let db = Connections::new(vec![group(&mut tree, "Db")], Some(Port::tcp(5432)));
        let cache = Connections::new(vec![group(&mut tree, "Cache")], None);

        assert_eq!(app.allow_to(&mut tree, &db, None, "db").unwrap(), Port::tcp(5432));
        assert_eq!(app.allow_to(&mut tree, &cache, None, "cache").unwrap(), Port::tcp(8080));
    }

    #[test]
    fn rules_land_on_both_sides() {
        let mut tree = Tree::new();
        let app_group = group(&mut tree, "App");
        let db_group = group(&mut tree, "Db");
        let app = Connections::new(vec![app_group], None);
        let db = Connections::new(vec![db_group], Some(Port::tcp(5432)));

        db.allow_from(&mut tree, &app, None, "app to db").unwrap();

        let egress = tree.get(app_group).egress_rules();
        assert_eq!(
            egress,
            &[Rule::new(Peer::SecurityGroup(db_group), Port::tcp(5432), "app to db".into())]
        );
        let ingress = tree.get(db_group).ingress_rules();
        assert_eq!(
            ingress,
            &[Rule::new(Peer::SecurityGroup(app_group), Port::tcp(5432), "app to db".into())]
        );
        assert!(tree.get(db_group).egress_rules().is_empty());
    }

    #[test]
    fn open_to_the_world() {
        let mut tree = Tree::new();
        let web_group = group(&mut tree, "Web");
        let web = Connections::new(vec![web_group], Some(Port::tcp(443)));

        web.allow_from_any_ipv4(&mut tree, None, "public").unwrap();
        assert_eq!(
            tree.get(web_group).ingress_rules(),
            &[Rule::new(Peer::any_ipv4(), Port::tcp(443), "public".into())]
        );
    }
}
