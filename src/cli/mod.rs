//! Command-line interface for plansmith.
//!
//! Provides commands for generating lesson plans from a template, exporting
//! them as Word documents, and managing the local template/resource library.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{GeminiGenerator, LessonGenerator, LessonRequest};
use crate::export::export_document;
use crate::library::{BinaryFile, Library, LibraryContent, LibraryError, RecordId};

pub mod library;

/// plansmith - Lesson plans from your district's template
#[derive(Parser, Debug)]
#[command(name = "plansmith")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a lesson plan and export it as a Word document
    Generate(GenerateArgs),

    /// Manage archived templates
    Template {
        #[command(subcommand)]
        command: library::TemplateCommands,
    },

    /// Manage archived resources
    Resource {
        #[command(subcommand)]
        command: library::ResourceCommands,
    },

    /// Permanently delete a library item
    Delete {
        /// Item ID
        id: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(clap::Args, Debug)]
pub struct GenerateArgs {
    /// Lesson topic
    #[arg(long)]
    pub topic: String,

    /// Grade level (e.g. "Grade 7")
    #[arg(long)]
    pub grade: String,

    /// Subject (e.g. "Science")
    #[arg(long)]
    pub subject: String,

    /// Unit or module
    #[arg(long)]
    pub unit: Option<String>,

    /// Additional instructions for the model
    #[arg(long)]
    pub instructions: Option<String>,

    /// Template file (defaults to the most recently archived template)
    #[arg(long, conflicts_with = "template_id")]
    pub template: Option<PathBuf>,

    /// Archived template ID
    #[arg(long)]
    pub template_id: Option<String>,

    /// Also archive the --template file
    #[arg(long, requires = "template")]
    pub save_template: bool,

    /// Resources file (defaults to the most recently archived resources)
    #[arg(long, conflicts_with = "resource_id")]
    pub resources: Option<PathBuf>,

    /// Archived resource ID
    #[arg(long)]
    pub resource_id: Option<String>,

    /// Directory for the exported document
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Print the HTML fragment to stdout instead of exporting
    #[arg(long)]
    pub html: bool,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Generate(args) => generate(&MaybeLibrary::open(), args).await,
            Commands::Template { command } => {
                library::execute_template(&open_library()?, command).await
            }
            Commands::Resource { command } => {
                library::execute_resource(&open_library()?, command).await
            }
            Commands::Delete { id } => {
                open_library()?
                    .remove(&RecordId::from(id.as_str()))
                    .await
                    .map_err(library_error)?;
                eprintln!("Deleted {}", id);
                Ok(())
            }
            Commands::Config => show_config(),
        }
    }
}

/// Open the configured library, with the user-facing message on failure
fn open_library() -> Result<Library> {
    let library = Library::open_default().map_err(|e| match e.downcast::<LibraryError>() {
        Ok(err) => library_error(err),
        Err(other) => other,
    })?;
    library.subscribe(|| tracing::debug!("Library contents changed")).detach();
    Ok(library)
}

/// The library as seen by `generate`: an open failure only matters once an
/// archived item is actually needed.
struct MaybeLibrary(std::result::Result<Library, String>);

impl MaybeLibrary {
    fn open() -> Self {
        Self::from(open_library())
    }

    fn get(&self) -> Result<&Library> {
        self.0.as_ref().map_err(|msg| anyhow::anyhow!("{}", msg))
    }
}

impl From<Result<Library>> for MaybeLibrary {
    fn from(result: Result<Library>) -> Self {
        Self(result.map_err(|e| {
            let message = format!("{:#}", e);
            tracing::warn!(error = %message, "Library unavailable");
            message
        }))
    }
}

/// Attach the user-facing message to a library error
pub(crate) fn library_error(err: LibraryError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

/// Generate a lesson plan
async fn generate(library: &MaybeLibrary, args: GenerateArgs) -> Result<()> {
    let template = resolve_template(library, &args).await?;
    let resources = resolve_resources(library, &args).await?;

    let mut request = LessonRequest::new(&args.topic, &args.grade, &args.subject)
        .with_resources(resources);
    if let Some(unit) = &args.unit {
        request = request.with_unit(unit);
    }
    if let Some(instructions) = &args.instructions {
        request = request.with_instructions(instructions);
    }
    request.validate()?;

    let cfg = crate::config::config()?;
    let generator = GeminiGenerator::from_settings(&cfg.gemini)?;

    eprintln!("Scribing lesson plan from {} ...", template.name);
    let html = generator
        .generate(&template, &request)
        .await
        .context("Unable to generate the lesson plan")?;

    if args.html {
        println!("{}", html);
        return Ok(());
    }

    let document = export_document(
        &html,
        Some(request.subject.as_str()),
        request.unit.as_deref(),
        Some(request.topic.as_str()),
    );
    let path = document.write_to(&args.output_dir).await?;

    eprintln!("Lesson plan saved to {}", path.display());
    Ok(())
}

async fn resolve_template(library: &MaybeLibrary, args: &GenerateArgs) -> Result<BinaryFile> {
    if let Some(path) = &args.template {
        let file = BinaryFile::read(path).await?;
        if args.save_template {
            let meta = library.get()?.save_template(&file).await.map_err(library_error)?;
            eprintln!("Template archived as {}", meta.id);
        }
        return Ok(file);
    }

    if let Some(id) = &args.template_id {
        return match library
            .get()?
            .fetch_content(&RecordId::from(id.as_str()))
            .await
            .map_err(library_error)?
        {
            LibraryContent::Template(file) => Ok(file),
            LibraryContent::Resource(_) => anyhow::bail!("Item {} is a resource, not a template", id),
        };
    }

    match library.get()?.latest_template().await.map_err(library_error)? {
        Some(file) => {
            eprintln!("Using most recent archived template: {}", file.name);
            Ok(file)
        }
        None => anyhow::bail!("Please upload a lesson plan template first (use --template <file>)."),
    }
}

async fn resolve_resources(library: &MaybeLibrary, args: &GenerateArgs) -> Result<String> {
    if let Some(path) = &args.resources {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read resources file: {}", path.display()));
    }

    if let Some(id) = &args.resource_id {
        return match library
            .get()?
            .fetch_content(&RecordId::from(id.as_str()))
            .await
            .map_err(library_error)?
        {
            LibraryContent::Resource(text) => Ok(text),
            LibraryContent::Template(_) => anyhow::bail!("Item {} is a template, not a resource", id),
        };
    }

    // Archived resources are optional
    let Ok(library) = library.get() else {
        return Ok(String::new());
    };

    Ok(library
        .latest_resource()
        .await
        .map_err(library_error)?
        .unwrap_or_default())
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = crate::config::config()?;

    println!("plansmith configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:     {}", cfg.home.display());
    println!("  Database: {}", cfg.database.display());
    println!();
    println!("Storage:");
    match cfg.storage.max_bytes {
        Some(bytes) => println!("  Quota:    {} bytes", bytes),
        None => println!("  Quota:    (unlimited)"),
    }
    println!();
    println!("Gemini:");
    println!("  Model:    {}", cfg.gemini.model);
    println!("  Endpoint: {}", cfg.gemini.base_url);
    println!("  Timeout:  {}s", cfg.gemini.timeout_seconds);
    println!(
        "  API key:  {}",
        if cfg.gemini.api_key.is_some() { "set" } else { "(not set)" }
    );

    Ok(())
}
