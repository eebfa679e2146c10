mod cli;

use constructs::declaration::{build_tree, DeclarationErrors, HclDocuments};
use constructs::synth::{synthesize, validate_tree};
use constructs::tree::Tree;
use serde::Serialize;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("CONSTRUCTS_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err);
                    std::process::exit(1);
                }

                tracing::info!(directory = %cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Synth(synth_cli) => synth(synth_cli),
        cli::Command::Validate(validate_cli) => validate(validate_cli),
        cli::Command::Dev(dev_cli) => dev(dev_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn synth(cli: cli::SynthCommand) -> anyhow::Result<()> {
    let documents = load(&cli.input)?;
    let tree = declared_tree(&documents)?;
    let artifact = synthesize(&tree)?;

    output(&cli.output, &artifact)?;
    Ok(())
}

pub fn validate(cli: cli::ValidateCommand) -> anyhow::Result<()> {
    let documents = load(&cli.input)?;
    let tree = declared_tree(&documents)?;

    let messages = validate_tree(&tree);
    for message in &messages {
        println!("{message}");
    }
    anyhow::ensure!(messages.is_empty(), "{} validation error(s)", messages.len());

    Ok(())
}

fn declared_tree(documents: &HclDocuments) -> anyhow::Result<Tree> {
    build_tree(documents).map_err(|errors| {
        report(documents, &errors);
        errors.into()
    })
}

/// Print every issue next to the block it belongs to
fn report(documents: &HclDocuments, errors: &DeclarationErrors) {
    for issue in errors.issues() {
        match issue.block() {
            Some(block) => eprintln!("{}: {issue}", documents.describe_block(block)),
            None => eprintln!("{issue}"),
        }
    }
}

fn load(input: &cli::InputArgs) -> anyhow::Result<HclDocuments> {
    let mut documents = HclDocuments::default();

    if !input.workdir && input.files.is_empty() && input.directories.is_empty() {
        let stdin = std::io::read_to_string(std::io::stdin())?;
        documents.insert_str(&stdin, None::<std::path::PathBuf>)?;
        return Ok(documents);
    }

    if input.workdir {
        documents.load_directory(&std::env::current_dir()?)?;
    }

    for file_path in &input.files {
        documents.load_file(file_path)?;
    }

    for dir_path in &input.directories {
        documents.load_directory(dir_path)?;
    }

    anyhow::ensure!(documents.source_count() > 0, "No files loaded");

    Ok(documents)
}

fn output(output: &cli::OutputArgs, value: &impl Serialize) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), value)?,
    };

    Ok(())
}

/// developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    let documents = load(&cli.input)?;

    match cli.command {
        cli::DevSubCommand::Documents => println!("{documents:#?}"),
        cli::DevSubCommand::Tree => {
            let tree = declared_tree(&documents)?;
            for id in tree.walk() {
                let scope = tree.scope(id);
                let resource_type = tree.construct(id).resource_type().unwrap_or("-");
                println!(
                    "{:<40} {:<20} {resource_type}",
                    format!("/{}", scope.path_string()),
                    scope.logical_id()
                );
            }
        }
    }

    Ok(())
}
