/*
 * main.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! PageKit CLI - Main entry point

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "pagekit")]
#[command(version)]
#[command(about = "Expand PageKit page markup", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand a markup document to HTML
    Expand {
        /// Markup document to expand
        input: PathBuf,

        /// JSON file with the host data formulas read from
        #[arg(short = 'c', long)]
        context: Option<PathBuf>,

        /// TOML engine configuration
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write HTML to FILE instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Evaluate a single formula and print the result as JSON
    Eval {
        /// Formula text, without surrounding braces
        formula: String,

        /// JSON file with the host data formulas read from
        #[arg(short = 'c', long)]
        context: Option<PathBuf>,
    },

    /// Print the token stream of a formula
    Tokens {
        /// Formula text, without surrounding braces
        formula: String,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagekit=info,pagekit_builder=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Expand {
            input,
            context,
            config,
            output,
        } => commands::expand::execute(commands::expand::ExpandArgs {
            input,
            context,
            config,
            output,
        }),
        Commands::Eval { formula, context } => commands::eval::execute(&formula, context.as_deref()),
        Commands::Tokens { formula } => commands::tokens::execute(&formula),
    }
}
