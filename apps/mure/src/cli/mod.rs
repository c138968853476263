//! # Mure CLI Module
//!
//! ## Available Commands
//!
//! - `upload` - Standardize a JSON file and store it as a document
//! - `list` - List stored documents
//! - `show` - Print a document or the value of one item
//! - `select` - Resolve a selector and print the matching items
//! - `link` - Connect two items with an edge
//! - `tag` - Add or remove a class on an item
//! - `import` - Read graph data (D3 JSON) into a document
//! - `export` - Write a document as D3 JSON, GEXF or CSV
//! - `delete` - Delete a document
//! - `init` - Initialize a new database

mod commands;

use crate::config::{Config, Settings};
use clap::{Parser, Subcommand};
use mure_core::{IdRange, MureError};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Mure - JSON documents as selector-queryable graphs
#[derive(Parser, Debug)]
#[command(name = "mure")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner and confirmation output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the redb document database
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Config file (defaults to $MURE_CONFIG, then ./mure.toml)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Standardize aggressively (promote date strings and array elements)
    #[arg(long, global = true)]
    pub aggressive: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Standardize a JSON file and store it
    Upload {
        /// Path to the JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Document id (`mimeType;filename`); derived from the file name if omitted
        #[arg(long)]
        id: Option<String>,

        /// Treat the file as a whole document instead of its `contents`
        #[arg(long)]
        as_document: bool,
    },

    /// List stored documents
    List {
        /// Only ids starting with this prefix
        #[arg(short, long, conflicts_with_all = ["from", "to"])]
        prefix: Option<String>,

        /// First id of an inclusive id range
        #[arg(long)]
        from: Option<String>,

        /// Last id of an inclusive id range
        #[arg(long)]
        to: Option<String>,
    },

    /// Print a document, or one item when a selector is given
    Show {
        /// Document id
        id: String,

        /// Selector relative to the document (e.g. `$.contents.a`)
        #[arg(short, long)]
        selector: Option<String>,
    },

    /// Resolve a selector and print the matching items
    Select {
        /// Absolute selector (e.g. `@{"_id":"application/json;f.json"}$.contents.*`)
        selector: String,

        /// Also print each item's value
        #[arg(long)]
        values: bool,
    },

    /// Connect two items with an edge
    Link {
        /// Unique selector of the first endpoint
        a: String,

        /// Unique selector of the second endpoint
        b: String,

        /// Container for the new edge (defaults to the first endpoint's orphanEdges)
        #[arg(long)]
        container: Option<String>,

        /// Role of the first endpoint (source, target, undirected)
        #[arg(short, long, default_value = "source")]
        direction: String,
    },

    /// Add or remove a class on an item
    Tag {
        /// Unique selector of the item
        item: String,

        /// Class name
        class: String,

        /// Remove the class instead of adding it
        #[arg(long)]
        remove: bool,
    },

    /// Import graph data into a document (created if missing)
    Import {
        /// Document id
        #[arg(long)]
        id: String,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Input format (d3)
        #[arg(short = 't', long, default_value = "d3")]
        format: String,
    },

    /// Export a document's graph
    Export {
        /// Document id
        #[arg(long)]
        id: String,

        /// Output file path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export format (d3, gexf, csv)
        #[arg(short = 't', long, default_value = "d3")]
        format: String,

        /// Classes to export (comma-separated)
        #[arg(long, value_delimiter = ',')]
        classes: Option<Vec<String>>,

        /// Indent the output
        #[arg(long)]
        pretty: bool,
    },

    /// Delete a document
    Delete {
        /// Document id
        id: String,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

impl Cli {
    /// Load the config file and layer this command line over it.
    pub fn settings(&self) -> Result<Settings, MureError> {
        let config = Config::load(self.config.as_deref())?;
        Ok(Settings::resolve(
            config,
            self.database.clone(),
            self.aggressive,
            self.json_mode,
            self.quiet,
        ))
    }
}

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), MureError> {
    let settings = cli.settings()?;

    match cli.command {
        Some(Commands::Upload {
            file,
            id,
            as_document,
        }) => cmd_upload(&settings, &file, id.as_deref(), as_document),
        Some(Commands::List { prefix, from, to }) => {
            cmd_list(&settings, &id_range(prefix.as_deref(), from, to))
        }
        Some(Commands::Show { id, selector }) => cmd_show(&settings, &id, selector.as_deref()),
        Some(Commands::Select { selector, values }) => cmd_select(&settings, &selector, values),
        Some(Commands::Link {
            a,
            b,
            container,
            direction,
        }) => cmd_link(&settings, &a, &b, container.as_deref(), &direction),
        Some(Commands::Tag {
            item,
            class,
            remove,
        }) => cmd_tag(&settings, &item, &class, remove),
        Some(Commands::Import { id, input, format }) => cmd_import(&settings, &id, &input, &format),
        Some(Commands::Export {
            id,
            output,
            format,
            classes,
            pretty,
        }) => cmd_export(&settings, &id, output.as_deref(), &format, classes, pretty),
        Some(Commands::Delete { id }) => cmd_delete(&settings, &id),
        Some(Commands::Init { force }) => cmd_init(&settings, force),
        None => {
            // No subcommand - list documents by default
            cmd_list(&settings, &IdRange::all())
        }
    }
}
