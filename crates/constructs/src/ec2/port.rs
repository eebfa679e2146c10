use crate::expr::Expr;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
    /// Any protocol, any port
    All,
}

impl Protocol {
    fn ip_protocol(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::All => "-1",
        }
    }
}

/// A port range for a security group rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Port {
    protocol: Protocol,
    from: u16,
    to: u16,
}

impl Port {
    pub fn tcp(port: u16) -> Self {
        Self::tcp_range(port, port)
    }

    pub fn tcp_range(from: u16, to: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            from,
            to,
        }
    }

    pub fn udp(port: u16) -> Self {
        Self {
            protocol: Protocol::Udp,
            from: port,
            to: port,
        }
    }

    pub fn all_tcp() -> Self {
        Self::tcp_range(0, u16::MAX)
    }

    pub fn all_traffic() -> Self {
        Self {
            protocol: Protocol::All,
            from: 0,
            to: u16::MAX,
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// `IpProtocol`, `FromPort` and `ToPort` of a rule
    pub(crate) fn rule_properties(&self) -> Vec<(&'static str, Expr)> {
        let mut properties = vec![("IpProtocol", Expr::from(self.protocol.ip_protocol()))];
        if self.protocol != Protocol::All {
            properties.push(("FromPort", Expr::from(self.from)));
            properties.push(("ToPort", Expr::from(self.to)));
        }
        properties
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.protocol {
            Protocol::All => f.write_str("all traffic"),
            Protocol::Tcp if self.from == 0 && self.to == u16::MAX => f.write_str("all tcp"),
            protocol if self.from == self.to => {
                write!(f, "{} {}", protocol.ip_protocol(), self.from)
            }
            protocol => write!(f, "{} {}-{}", protocol.ip_protocol(), self.from, self.to),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display() {
        assert_eq!(Port::tcp(443).to_string(), "tcp 443");
        assert_eq!(Port::tcp_range(1024, 2048).to_string(), "tcp 1024-2048");
        assert_eq!(Port::udp(53).to_string(), "udp 53");
        assert_eq!(Port::all_tcp().to_string(), "all tcp");
        assert_eq!(Port::all_traffic().to_string(), "all traffic");
    }

    #[test]
    fn all_traffic_has_no_port_bounds() {
        let properties = Port::all_traffic().rule_properties();
        assert_eq!(properties, vec![("IpProtocol", Expr::from("-1"))]);
    }
}
