//! validation and synthesis of a whole tree
use crate::artifact::{Artifact, Resource};
use crate::resolve::{ResolveError, Resolver};
use crate::tree::Tree;
use sha2::{Digest, Sha256};
use std::fmt;

/// A domain rule violation reported by a construct
#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct ValidationMessage {
    /// Path of the construct that reported the message
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "[/] {}", self.message)
        } else {
            write!(f, "[{}] {}", self.path, self.message)
        }
    }
}

/// Every validation message of a tree
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors {
    messages: Vec<ValidationMessage>,
}

impl ValidationErrors {
    pub fn messages(&self) -> &[ValidationMessage] {
        &self.messages
    }
}

impl std::error::Error for ValidationErrors {}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed with {} error(s):", self.messages.len())?;
        for message in &self.messages {
            write!(f, "\n  {message}")?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SynthError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("unable to resolve properties of {path}")]
    Resolve {
        path: String,
        #[source]
        source: ResolveError,
    },
}

/// Collect the validation messages of every construct
///
/// Traversal is depth-first in insertion order, so the messages come out in a stable order.
pub fn validate_tree(tree: &Tree) -> Vec<ValidationMessage> {
    let mut messages = vec![];
    for id in tree.walk() {
        let scope = tree.scope(id);
        for message in tree.construct(id).validate(scope) {
            tracing::debug!(path = %scope.path_string(), %message, "validation issue");
            messages.push(ValidationMessage::new(scope.path_string(), message));
        }
    }
    messages
}

/// Validate the tree and emit the fully resolved template
#[tracing::instrument(level = "debug", skip_all)]
pub fn synthesize(tree: &Tree) -> Result<Artifact, SynthError> {
    let messages = validate_tree(tree);
    if !messages.is_empty() {
        return Err(ValidationErrors { messages }.into());
    }

    let mut resolver = Resolver::with_tree(tree);
    let mut artifact = Artifact::default();
    for id in tree.walk() {
        let construct = tree.construct(id);
        let Some(resource_type) = construct.resource_type() else {
            continue;
        };

        let scope = tree.scope(id);
        let properties = resolver
            .resolve(&construct.properties(scope))
            .map_err(|source| SynthError::Resolve {
                path: scope.path_string(),
                source,
            })?;

        tracing::trace!(path = %scope.path_string(), resource_type, "resource emitted");
        artifact.insert(
            scope.logical_id(),
            Resource::new(resource_type, properties, scope.path_string()),
        );
    }

    tracing::info!(resources = artifact.len(), "synthesized");
    Ok(artifact)
}

/// Stable template identifier for the construct at `path`
///
/// The alphanumeric characters of all path components, followed by 8 hex digits of the SHA-256 of the
/// full path. The hash keeps ids unique when the readable part collides (`a-b/c` vs `ab/c`).
pub fn logical_id(path: &[&str]) -> String {
    const MAX_HUMAN_LEN: usize = 247;

    let mut human: String = path
        .iter()
        .flat_map(|component| component.chars())
        .filter(char::is_ascii_alphanumeric)
        .collect();
    human.truncate(MAX_HUMAN_LEN);

    let digest = Sha256::digest(path.join("/").as_bytes());
    format!("{human}{}", hex::encode_upper(&digest[..4]))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::construct::{Construct, Group};
    use crate::expr::Expr;
    use crate::token::Token;
    use crate::tree::{NodeId, Scope};
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct Invalid(&'static str);

    impl Construct for Invalid {
        fn validate(&self, _scope: Scope<'_>) -> Vec<String> {
            vec![self.0.to_string()]
        }
    }

    #[derive(Debug)]
    struct Bucket {
        name: Expr,
    }

    impl Construct for Bucket {
        fn resource_type(&self) -> Option<&'static str> {
            Some("Test::Bucket")
        }

        fn properties(&self, _scope: Scope<'_>) -> Expr {
            Expr::object([("BucketName", self.name.clone())])
        }
    }

    /// Resolves its `Name` attribute to itself
    #[derive(Debug)]
    struct Ouroboros;

    impl Construct for Ouroboros {
        fn resource_type(&self) -> Option<&'static str> {
            Some("Test::Ouroboros")
        }

        fn properties(&self, scope: Scope<'_>) -> Expr {
            Expr::object([("Name", Token::attribute(scope.id(), "Name").into())])
        }

        fn attribute(&self, name: &str, scope: Scope<'_>) -> Option<Expr> {
            (name == "Name").then(|| {
                Expr::join([Expr::from("x-"), Token::attribute(scope.id(), "Name").into()])
            })
        }
    }

    fn bucket_tree() -> (Tree, NodeId, NodeId) {
        let mut tree = Tree::new();
        let root = tree.root();
        let stack = tree.attach(root, "Stack", Group).unwrap();
        let logs = tree
            .attach(stack, "Logs", Bucket { name: "logs".into() })
            .unwrap();
        let data = tree
            .attach(
                stack,
                "Data",
                Bucket {
                    name: Expr::join([Expr::from("data-"), Token::attribute(logs, "Ref").into()]),
                },
            )
            .unwrap();
        (tree, logs.id(), data.id())
    }

    #[test]
    fn every_invalid_node_is_reported() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = tree.attach(root, "a", Invalid("first")).unwrap();
        tree.attach(a, "nested", Invalid("second")).unwrap();
        tree.attach(root, "b", Invalid("third")).unwrap();
        tree.attach(root, "fine", Group).unwrap();

        let messages = validate_tree(&tree);
        assert_eq!(
            messages,
            vec![
                ValidationMessage::new("a".into(), "first".into()),
                ValidationMessage::new("a/nested".into(), "second".into()),
                ValidationMessage::new("b".into(), "third".into()),
            ]
        );

        let Err(SynthError::Validation(errors)) = synthesize(&tree) else {
            panic!("synthesis must refuse an invalid tree");
        };
        assert_eq!(errors.messages().len(), 3);
        assert!(errors.to_string().contains("[a/nested] second"));
    }

    #[test]
    fn resources_reference_each_other() {
        let (tree, logs, _) = bucket_tree();
        let artifact = synthesize(&tree).unwrap();

        let logs_id = logical_id(&tree.path(logs));
        let json = serde_json::to_value(&artifact).unwrap();
        let data = artifact.find_by_path("Stack/Data").unwrap().1;

        assert_eq!(artifact.len(), 2);
        assert_eq!(
            json["Resources"][&logs_id]["Properties"]["BucketName"],
            serde_json::json!("logs")
        );
        assert_eq!(
            serde_json::to_value(&data.properties).unwrap(),
            serde_json::json!({
                "BucketName": {"Fn::Join": ["", ["data-", {"Ref": logs_id}]]}
            })
        );
        assert_eq!(
            json["Resources"][&logs_id]["Metadata"]["constructs:path"],
            serde_json::json!("Stack/Logs")
        );
    }

    #[test]
    fn synthesis_is_deterministic() {
        let (tree, _, _) = bucket_tree();
        let first = serde_json::to_string(&synthesize(&tree).unwrap()).unwrap();
        let second = serde_json::to_string(&synthesize(&tree).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cyclic_attribute_fails_synthesis() {
        let mut tree = Tree::new();
        let root = tree.root();
        tree.attach(root, "Snake", Ouroboros).unwrap();

        let Err(SynthError::Resolve { path, source }) = synthesize(&tree) else {
            panic!("expected a resolution failure");
        };
        assert_eq!(path, "Snake");
        assert_eq!(
            source,
            ResolveError::CyclicResolution {
                chain: vec!["Snake.Name".to_string(), "Snake.Name".to_string()]
            }
        );
    }

    #[test]
    fn logical_ids_are_stable_and_readable() {
        let id = logical_id(&["Stack", "web-lb", "SecurityGroup"]);
        assert!(id.starts_with("StackweblbSecurityGroup"));
        assert_eq!(id.len(), "StackweblbSecurityGroup".len() + 8);
        assert_eq!(id, logical_id(&["Stack", "web-lb", "SecurityGroup"]));
        assert_ne!(logical_id(&["a-b", "c"]), logical_id(&["ab", "c"]));
    }
}
