//! stencil CLI - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::EngineArgs;

#[derive(Parser)]
#[command(name = "stencil")]
#[command(version = stencil_util::cli_version())]
#[command(about = "Compile, cache and render stencil view templates", long_about = None)]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which template file a view name resolves to
    Resolve {
        /// Logical view name
        name: String,

        /// Route module
        #[arg(long)]
        module: Option<String>,

        /// Route controller
        #[arg(long)]
        controller: Option<String>,

        /// Route action (used when NAME is empty)
        #[arg(long)]
        action: Option<String>,
    },

    /// Bring a template's cached artifact up to date
    Compile {
        /// Template name or path
        name: String,
    },

    /// Print the generated code for a template file without caching it
    Transpile {
        /// Template file
        file: PathBuf,
    },

    /// Render a view to stdout or a file
    Render {
        /// Logical view name
        name: String,

        /// JSON object with the render data
        #[arg(long)]
        data: Option<PathBuf>,

        /// Layout wrapping the view
        #[arg(long)]
        layout: Option<String>,

        /// Mark the render as a partial-page request
        #[arg(long)]
        pjax: bool,

        /// Write output to FILE instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stencil=info,stencil_template=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve {
            name,
            module,
            controller,
            action,
        } => commands::resolve::execute(
            &cli.engine,
            commands::resolve::ResolveArgs {
                name,
                module,
                controller,
                action,
            },
        ),
        Commands::Compile { name } => commands::compile::execute(&cli.engine, &name),
        Commands::Transpile { file } => commands::transpile::execute(&cli.engine, &file),
        Commands::Render {
            name,
            data,
            layout,
            pjax,
            output,
        } => commands::render::execute(
            &cli.engine,
            commands::render::RenderArgs {
                name,
                data,
                layout,
                pjax,
                output,
            },
        ),
    }
}
