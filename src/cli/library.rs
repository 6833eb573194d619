//! Library subcommands: archive, list and retrieve templates and resources.

use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::library::{BinaryFile, ItemKind, ItemMetadata, Library, LibraryContent, RecordId};

use super::library_error;

#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// Archive a template file (PDF, DOCX, TXT, HTML, image)
    Add {
        /// Template file to archive
        path: PathBuf,
    },

    /// List archived templates, newest first
    List {
        /// Maximum number of templates to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Restore an archived template to disk
    Show {
        /// Template ID
        id: String,

        /// Where to write the file (defaults to its original name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ResourceCommands {
    /// Archive resource text from a file or stdin
    Add {
        /// Label for the archived resources
        #[arg(short, long)]
        name: Option<String>,

        /// Input file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// List archived resources, newest first
    List {
        /// Maximum number of resources to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Print an archived resource
    Show {
        /// Resource ID
        id: String,
    },
}

pub async fn execute_template(library: &Library, command: TemplateCommands) -> Result<()> {
    match command {
        TemplateCommands::Add { path } => {
            let file = BinaryFile::read(&path).await?;
            let meta = library.save_template(&file).await.map_err(library_error)?;

            eprintln!("Template archived.");
            eprintln!("   ID: {}", meta.id);
            eprintln!("   Name: {}", meta.name);
            eprintln!("   Size: {:.2} KB", file.len() as f64 / 1024.0);
            Ok(())
        }
        TemplateCommands::List { limit } => list(library, ItemKind::Template, limit).await,
        TemplateCommands::Show { id, output } => {
            let file = match library
                .fetch_content(&RecordId::from(id.as_str()))
                .await
                .map_err(library_error)?
            {
                LibraryContent::Template(file) => file,
                LibraryContent::Resource(_) => anyhow::bail!("Item {} is a resource, not a template", id),
            };

            let path = output.unwrap_or_else(|| PathBuf::from(&file.name));
            tokio::fs::write(&path, &file.bytes)
                .await
                .with_context(|| format!("Failed to write template: {}", path.display()))?;

            eprintln!("Restored {} ({}) to {}", file.name, file.media_type, path.display());
            Ok(())
        }
    }
}

pub async fn execute_resource(library: &Library, command: ResourceCommands) -> Result<()> {
    match command {
        ResourceCommands::Add { name, input } => {
            let text = if let Some(path) = input {
                std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read input file: {}", path.display()))?
            } else {
                let mut buffer = String::new();
                io::stdin()
                    .read_to_string(&mut buffer)
                    .context("Failed to read from stdin")?;
                buffer
            };

            let meta = library
                .save_resource(name.as_deref().unwrap_or_default(), &text)
                .await
                .map_err(library_error)?;

            eprintln!("Resources archived.");
            eprintln!("   ID: {}", meta.id);
            eprintln!("   Name: {}", meta.name);
            Ok(())
        }
        ResourceCommands::List { limit } => list(library, ItemKind::Resource, limit).await,
        ResourceCommands::Show { id } => {
            match library
                .fetch_content(&RecordId::from(id.as_str()))
                .await
                .map_err(library_error)?
            {
                LibraryContent::Resource(text) => println!("{}", text),
                LibraryContent::Template(_) => anyhow::bail!("Item {} is a template, not a resource", id),
            }
            Ok(())
        }
    }
}

async fn list(library: &Library, kind: ItemKind, limit: usize) -> Result<()> {
    let items = library.list_metadata(kind).await.map_err(library_error)?;

    if items.is_empty() {
        println!("No archived {}s.", kind);
        return Ok(());
    }

    println!("{:<24} {:<18} {:<40}", "ID", "CREATED", "NAME");
    println!("{}", "-".repeat(82));

    for item in items.iter().take(limit) {
        print_row(item);
    }

    println!("\nTotal: {} {}s", items.len(), kind);
    Ok(())
}

fn print_row(item: &ItemMetadata) {
    let name = if item.name.chars().count() > 37 {
        format!("{}...", item.name.chars().take(37).collect::<String>())
    } else {
        item.name.clone()
    };

    println!(
        "{:<24} {:<18} {:<40}",
        item.id.as_str(),
        item.created_at.format("%Y-%m-%d %H:%M").to_string(),
        name
    );
}
