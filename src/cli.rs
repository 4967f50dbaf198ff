//! Command-line interface

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::RunMode;

#[derive(Parser, Debug)]
#[command(name = "flanco-price-tracker")]
#[command(version, about = "Start scraping Flanco in one of a few modes of operation")]
pub struct Cli {
    /// More output; repeat for trace level
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// The maximum amount of records written before the run stops
    #[arg(short, long, global = true)]
    pub max_entries: Option<usize>,

    /// Configuration file layered over `config/default`
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Scrape the built-in product ids (147719, 143800, 144043)
    Test,

    /// Scrape prices for the given product ids
    List {
        #[arg(required = true, num_args = 1..)]
        products: Vec<String>,
    },

    /// Scrape one category, given as a URL relative to the catalog root
    Category { category_url: String },

    /// Scrape every category (up to --max-entries, if given)
    Entire,
}

impl Cli {
    #[must_use]
    pub fn run_mode(&self) -> RunMode {
        match &self.command {
            Command::Test => RunMode::Test,
            Command::List { products } => RunMode::List {
                product_ids: products.clone(),
            },
            Command::Category { category_url } => RunMode::Category {
                url: category_url.clone(),
            },
            Command::Entire => RunMode::Entire,
        }
    }
}
