//! CLI Module
//!
//! Command-line interface for running rituals headlessly and managing the
//! sound print library.

pub mod commands;
pub mod script;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use crate::library::Collection;

/// Ritual - gesture-driven EQ sessions that crystallize into sound prints
#[derive(Parser, Debug)]
#[command(name = "ritual-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Perform a ritual on a WAV file and save the print
    #[command(name = "perform")]
    Perform {
        /// Source WAV file
        input: PathBuf,

        #[command(flatten)]
        options: PerformOptions,
    },

    /// Re-perform a stored print's audio
    #[command(name = "alter")]
    Alter {
        /// Print to alter
        id: Uuid,

        #[command(flatten)]
        options: PerformOptions,
    },

    /// Inspect and manage the library
    #[command(name = "library")]
    Library {
        /// Library directory
        #[arg(short, long, default_value = "ritual-library")]
        library: PathBuf,

        #[command(subcommand)]
        action: LibraryAction,
    },

    /// Write the default configuration as JSON
    #[command(name = "config")]
    Config {
        /// Output path
        #[arg(default_value = "ritual.json")]
        path: PathBuf,
    },
}

/// Options shared by `perform` and `alter`
#[derive(Args, Debug, Clone)]
pub struct PerformOptions {
    /// Library directory
    #[arg(short, long, default_value = "ritual-library")]
    pub library: PathBuf,

    /// Session configuration JSON
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Gesture script JSON; random gestures are played when absent
    #[arg(short, long)]
    pub script: Option<PathBuf>,

    /// Seed for random gestures and sparks
    #[arg(long)]
    pub seed: Option<u64>,

    /// Random gestures per second
    #[arg(long, default_value_t = 4.0)]
    pub gesture_rate: f64,

    /// End the ritual after this many seconds
    #[arg(long)]
    pub end_after: Option<f64>,

    /// Save the print as private
    #[arg(long)]
    pub private: bool,

    #[arg(long, default_value = "")]
    pub name: String,

    #[arg(long, default_value = "")]
    pub tribe: String,

    #[arg(long, default_value = "Untitled")]
    pub title: String,
}

#[derive(Subcommand, Debug)]
pub enum LibraryAction {
    /// List prints, optionally for one collection
    List {
        collection: Option<Collection>,
    },

    /// Move a print between public and private
    Toggle { id: Uuid },

    /// Delete a print from a collection (trash deletes permanently)
    Delete {
        id: Uuid,

        #[arg(long, default_value = "public")]
        from: Collection,
    },

    /// Restore a print from trash as public
    Restore { id: Uuid },

    /// Write a print's image and audio to a directory
    Export {
        id: Uuid,

        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Remove blobs no print references
    Prune,
}
