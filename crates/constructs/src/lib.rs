//! # constructs - composable infrastructure declarations
//!
//! ## Introduction for developers
//!
//! Read this to understand how `constructs` works internally.
//!
//! ### Terms
//!
//! - a **construct** is a node in a tree, it has a name that is unique among its siblings and a path from
//!   the root (`web/http/Api`)
//! - a **resource** is a construct that emits one entry into the synthesized template
//! - a **token** is a placeholder for a value that is not known while the tree is being declared, most
//!   commonly an attribute of another construct (`GroupId` of a security group)
//! - **synthesis** validates the whole tree and turns it into an [artifact::Artifact] without tokens
//!
//! ### Building a tree
//!
//! All constructs live in one [tree::Tree]. Attaching a construct returns a typed [tree::Handle] which is
//! used to refer to the construct from then on:
//!
//! ```
//! use constructs::ec2::{Port, SecurityGroup, SecurityGroupProps};
//! use constructs::tree::Tree;
//!
//! let mut tree = Tree::new();
//! let root = tree.root();
//! let db = SecurityGroup::create(&mut tree, root, "Db", SecurityGroupProps::new("vpc-1")).unwrap();
//! let group_id = SecurityGroup::group_id(db); // a token, resolved at synthesis
//! assert!(group_id.contains_tokens());
//! ```
//!
//! Errors that are clearly mistakes in the declaration (a duplicate name, a rule without priority, ...) are
//! returned right away as [error::ConstructError]. Everything that can only be judged once the tree is
//! complete (a listener without a default action, ...) is reported by [construct::Construct::validate] and
//! collected for the whole tree before synthesis.
//!
//! ### Tokens and resolution
//!
//! Constructs describe their template properties as [expr::Expr], which may contain [token::Token]s at any
//! depth. [resolve::Resolver] replaces each token with its value, resolving recursively, and returns a
//! [value::Value]. Within one resolver every token is resolved at most once; a token that depends on itself
//! is reported as [resolve::ResolveError::CyclicResolution] including the chain that led back to it.
//!
//! Attribute tokens are answered by the construct first ([construct::Construct::attribute]). Resources that
//! do not answer get a reference into the template (`{"Ref": ...}` or `{"Fn::GetAtt": [...]}`) based on
//! their logical id, see [synth::logical_id].
//!
//! ### Connections
//!
//! [ec2::Connections] bundle the security groups of something reachable on the network. `a.allow_to(b)`
//! adds an egress rule to the groups of `a` and a matching ingress rule to the groups of `b`. Imported
//! security groups do not emit a resource, their rules become standalone resources instead.
//!
//! ### Routing
//!
//! [elb] contains application load balancers with listeners, prioritized listener rules and target groups.
//! Listeners and target groups learn about each other when target groups are added, which in turn lets the
//! load balancer reach every member of the group.
//!
//! ### Declarations
//!
//! The `constructs` binary builds trees from HCL documents, see [declaration].
//!
pub mod artifact;
pub mod construct;
pub mod declaration;
pub mod ec2;
pub mod elb;
pub mod error;
pub mod expr;
pub mod resolve;
pub mod synth;
pub mod token;
pub mod tree;
pub mod value;
