//! collection of declaration documents
//!
//! [HclDocuments] keeps the root attributes and blocks of every loaded document together with the path they
//! came from. Each attribute and block gets a numeric index; indices are stable once assigned and are what
//! [super::Issue]s point at.
use hcl_edit::structure::{Attribute, Block, Body, Structure};
use std::path::{Path, PathBuf};

pub type Source = Option<PathBuf>;
pub type SourceAttribute<'a> = (usize, &'a Source, &'a Attribute);
pub type SourceBlock<'a> = (usize, &'a Source, &'a Block);

#[derive(Default, Debug)]
pub struct HclDocuments {
    sources: Vec<Source>,
    root_attributes: Vec<(usize, Attribute)>,
    root_blocks: Vec<(usize, Block)>,
}

impl HclDocuments {
    pub fn insert(&mut self, document: Body, path: impl Into<Source>) {
        let source_index = self.sources.len();
        self.sources.push(path.into());

        for structure in document {
            match structure {
                Structure::Block(block) => self.root_blocks.push((source_index, block)),
                Structure::Attribute(attribute) => {
                    self.root_attributes.push((source_index, attribute))
                }
            }
        }
    }

    /// Parse `text` and insert it
    pub fn insert_str(&mut self, text: &str, path: impl Into<Source>) -> Result<(), LoadError> {
        let body = hcl_edit::parser::parse_body(text)?;
        self.insert(body, path);
        Ok(())
    }

    pub fn attributes(&self) -> impl Iterator<Item = SourceAttribute> {
        self.root_attributes
            .iter()
            .enumerate()
            .map(|(index, (source_index, attribute))| {
                (index, &self.sources[*source_index], attribute)
            })
    }

    pub fn get_block(&self, index: usize) -> SourceBlock {
        let (source_index, block) = &self.root_blocks[index];
        (index, &self.sources[*source_index], block)
    }

    pub fn blocks(&self) -> impl Iterator<Item = SourceBlock> {
        self.root_blocks
            .iter()
            .enumerate()
            .map(|(index, (source_index, block))| (index, &self.sources[*source_index], block))
    }

    /// Blocks with identifier `ident`, in load order
    pub fn blocks_named<'a>(&'a self, ident: &'a str) -> impl Iterator<Item = SourceBlock<'a>> {
        self.blocks()
            .filter(move |(_, _, block)| block.ident.value().as_str() == ident)
    }

    /// Human readable location of a block, `path: ident label...`
    pub fn describe_block(&self, index: usize) -> String {
        let (_, source, block) = self.get_block(index);
        let mut description = match source {
            Some(path) => format!("{}: {}", path.display(), block.ident.value().as_str()),
            None => block.ident.value().as_str().to_string(),
        };
        for label in &block.labels {
            description.push(' ');
            description.push_str(label.as_str());
        }
        description
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

impl HclDocuments {
    pub fn load_file(&mut self, file_path: &Path) -> Result<(), LoadError> {
        let file_path = file_path.canonicalize()?;
        tracing::info!(path = %file_path.display(), "loading file");

        let file_contents = std::fs::read_to_string(&file_path)?;
        self.insert_str(&file_contents, Some(file_path))
    }

    /// Load every `*.hcl` file of `dir_path`, ordered by file name
    pub fn load_directory(&mut self, dir_path: &Path) -> Result<(), LoadError> {
        let mut file_paths = vec![];
        for dir_entry in std::fs::read_dir(dir_path)? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() {
                continue;
            }
            if dir_entry.file_name().to_string_lossy().ends_with(".hcl") {
                file_paths.push(dir_entry.path());
            }
        }

        if file_paths.is_empty() {
            return Err(LoadError::NoFilesFound(dir_path.to_owned()));
        }

        file_paths.sort();
        for file_path in file_paths {
            self.load_file(&file_path)?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("no *.hcl files found in {}", .0.display())]
    NoFilesFound(PathBuf),
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("unable to parse hcl")]
    HclParseFailed(#[from] hcl_edit::parser::Error),
}

impl From<Body> for HclDocuments {
    fn from(value: Body) -> Self {
        let mut documents = HclDocuments::default();
        documents.insert(value, None::<PathBuf>);
        documents
    }
}

/// Utility macro to create [HclDocuments]
///
/// ```
/// # use constructs::hcl_documents;
/// let documents = hcl_documents!(r#"security_group "db" { vpc_id = "vpc-1" }"#);
/// assert_eq!(documents.blocks().count(), 1);
/// ```
///
/// Multiple documents need a path each
/// ```
/// # use constructs::hcl_documents;
/// let documents = hcl_documents! {
///   "network.hcl" => r#"security_group "db" { vpc_id = "vpc-1" }"#,
///   "web.hcl" => r#"load_balancer "web" { vpc_id = "vpc-1" }"#
/// };
/// assert_eq!(documents.source_count(), 2);
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use constructs::hcl_documents;
/// hcl_documents!("not = valid = hcl");
/// ```
#[macro_export]
macro_rules! hcl_documents {
    { $text:expr } => {{
        let mut documents = $crate::declaration::HclDocuments::default();
        documents.insert_str($text, None::<::std::path::PathBuf>).expect("body must parse");
        documents
    }};
    { $($source:expr => $text:expr),+ } => {{
        let mut documents = $crate::declaration::HclDocuments::default();
        $(
            documents
                .insert_str($text, Some(::std::path::PathBuf::from($source)))
                .expect("body must parse");
        )+
        documents
    }};
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    #[test]
    fn iterators() {
        let documents = hcl_documents! {r#"
        attr_1 = 1
        security_group "a" {}
        listener "b" "c" {}
        attr_2 = 2
        security_group "d" {}
        "#};

        assert_eq!(documents.attributes().count(), 2);
        assert_eq!(documents.blocks().count(), 3);

        let indices: Vec<_> = documents
            .blocks_named("security_group")
            .map(|(index, _, _)| index)
            .collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn block_descriptions_name_the_source() {
        let documents = hcl_documents! {
            "one.hcl" => r#"security_group "db" {}"#,
            "two.hcl" => r#"listener "web" "https" {}"#
        };

        assert_eq!(documents.describe_block(0), "one.hcl: security_group db");
        assert_eq!(documents.describe_block(1), "two.hcl: listener web https");
    }
}
