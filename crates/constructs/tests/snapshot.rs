//! Snapshot tests
//!
//! Builds a construct tree from each *.hcl file in /tests/ individually and compares
//! the synthesized template.
use constructs::declaration::{build_tree, HclDocuments};
use constructs::synth::synthesize;

#[test]
fn snapshots() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("CONSTRUCTS_LOG"))
        .with_writer(std::io::stderr)
        .init();

    insta::glob!("*.hcl", |path| {
        let mut documents = HclDocuments::default();
        documents.load_file(path).expect("fixture must load");

        let tree = build_tree(&documents).expect("must be valid declarations");
        let artifact = synthesize(&tree).expect("tree must synthesize");

        insta::assert_json_snapshot!(artifact);
    });
}
