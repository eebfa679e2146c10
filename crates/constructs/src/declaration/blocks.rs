//! block bodies, decoded with serde
//!
//! Each block kind either declares a new construct or references an existing one (`group_id`, `arn`).
//! Which fields belong together is checked by the builder, not here.
use crate::elb::ApplicationProtocol;
use serde::Deserialize;

fn yes() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct SecurityGroupBlock {
    pub vpc_id: Option<String>,
    pub description: Option<String>,
    #[serde(default = "yes")]
    pub allow_all_outbound: bool,
    pub group_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct LoadBalancerBlock {
    pub vpc_id: Option<String>,
    #[serde(default)]
    pub subnets: Vec<String>,
    #[serde(default)]
    pub internet_facing: bool,
    /// Name of a `security_group` block
    pub security_group: Option<String>,
    pub arn: Option<String>,
    pub security_group_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct TargetGroupBlock {
    pub vpc_id: Option<String>,
    pub port: Option<u16>,
    pub protocol: Option<ApplicationProtocol>,
    pub health_check_path: Option<String>,
    #[serde(default)]
    pub instances: Vec<String>,
    #[serde(default)]
    pub ips: Vec<String>,
    pub arn: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct ListenerBlock {
    pub port: Option<u16>,
    pub protocol: Option<ApplicationProtocol>,
    #[serde(default)]
    pub certificates: Vec<String>,
    #[serde(default)]
    pub default_target_groups: Vec<String>,
    #[serde(default)]
    pub open: bool,
    pub ssl_policy: Option<String>,
    #[serde(default)]
    pub rules: Vec<RuleBlock>,
    pub arn: Option<String>,
    pub security_group_id: Option<String>,
    pub default_port: Option<u16>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RuleBlock {
    /// Defaults to `Rule<n>`, n counting the rules of the listener from 1
    pub name: Option<String>,
    pub priority: u32,
    pub host_header: Option<String>,
    pub path_pattern: Option<String>,
    pub target_groups: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct AllowBlock {
    pub port: Option<u16>,
    pub description: Option<String>,
}
