//! Command-line argument definitions for the WEAVE netCDF cache.
//!
//! The binary converts WEAVE L2 tables into cached netCDF artifacts, opens
//! them as one combined dataset and exports per-fibre variables to Parquet.

pub mod commands;

use crate::discovery::{Resolution, SourceQuery};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the WEAVE netCDF cache
#[derive(Debug, Clone, Parser)]
#[command(
    name = "weave-netcdf",
    version,
    about = "Cache WEAVE survey FITS tables as netCDF and combine them across files",
    long_about = "Reads tables from WEAVE L2 FITS files, stores each as a netCDF-4 artifact \
                  under a cache root that mirrors the survey tree, and opens many artifacts \
                  as a single dataset indexed by filename. Files already in the cache are \
                  never converted again."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Cache root; defaults to $NETCDF_STORE, then ~/netcdf_store
    #[arg(long = "cache-root", value_name = "PATH", global = true)]
    pub cache_root: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long = "no-progress", global = true)]
    pub no_progress: bool,

    /// Maximum files converted or opened at once
    #[arg(long, value_name = "N", global = true)]
    pub concurrency: Option<usize>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl Args {
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Convert source files into cached artifacts
    Convert(ConvertArgs),
    /// Convert, then open the artifacts as one dataset and describe it
    Open(ConvertArgs),
    /// Export per-fibre variables of the combined dataset to Parquet
    Export(ExportArgs),
    /// Print the canonical artifact path of a source file
    Path(PathArgs),
    /// Summarise the contents of the cache root
    Scan,
    /// List the available table readers
    Readers,
}

/// Source selection shared by commands that convert files
#[derive(Debug, Clone, ClapArgs)]
pub struct SourceArgs {
    /// Source files; when empty they are discovered under --survey-root
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Survey root; defaults to $WEAVEIO_ROOTDIR
    #[arg(long = "survey-root", value_name = "PATH")]
    pub survey_root: Option<PathBuf>,

    /// Processing level pattern
    #[arg(long, default_value = "L2")]
    pub level: String,

    /// File type pattern
    #[arg(long, default_value = "stack")]
    pub filetype: String,

    /// Observing night pattern (yyyymmdd)
    #[arg(long, default_value = "*")]
    pub date: String,

    /// Run identifier pattern
    #[arg(long, default_value = "*")]
    pub runid: String,

    /// Select high-resolution files instead of low-resolution
    #[arg(long, conflicts_with = "any_resolution")]
    pub highres: bool,

    /// Skip the resolution check
    #[arg(long = "any-resolution")]
    pub any_resolution: bool,
}

impl SourceArgs {
    pub fn query(&self) -> SourceQuery {
        let resolution = if self.any_resolution {
            Resolution::Any
        } else if self.highres {
            Resolution::High
        } else {
            Resolution::Low
        };
        SourceQuery {
            level: self.level.clone(),
            filetype: self.filetype.clone(),
            date: self.date.clone(),
            runid: self.runid.clone(),
            resolution,
        }
    }
}

#[derive(Debug, Clone, ClapArgs)]
pub struct ConvertArgs {
    /// Reader name, e.g. read_star_table or star_table
    pub reader: String,

    #[command(flatten)]
    pub sources: SourceArgs,

    /// Keep going past files that fail and report them at the end
    #[arg(long = "keep-going")]
    pub keep_going: bool,
}

#[derive(Debug, Clone, ClapArgs)]
pub struct ExportArgs {
    pub reader: String,

    /// Parquet file to write
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Per-fibre variables to export
    #[arg(long, value_delimiter = ',', required = true)]
    pub vars: Vec<String>,

    #[command(flatten)]
    pub sources: SourceArgs,
}

#[derive(Debug, Clone, ClapArgs)]
pub struct PathArgs {
    pub reader: String,

    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}
