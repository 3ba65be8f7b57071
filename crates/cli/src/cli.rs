use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use xconvert_core::FileFormat;

#[derive(Parser, Debug)]
#[command(
    name = "xconvert",
    version,
    about = "Convert files between CSV, JSON, XML and TXT using an xconvert service",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Configuration file (defaults to $XCONVERT_CONFIG, then built-in defaults)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Hide the progress bar
    #[arg(long, global = true)]
    pub no_progress: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert a single file
    Convert {
        file: PathBuf,
        /// Target format (csv, json, xml, txt)
        #[arg(long)]
        to: Option<FileFormat>,
        /// Source format; detected from the extension when omitted
        #[arg(long)]
        from: Option<FileFormat>,
        /// Directory for the converted file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Convert several files as one batch job and download them as a zip
    Batch {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Target format (csv, json, xml, txt)
        #[arg(long)]
        to: Option<FileFormat>,
        /// Directory for the zip archive
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    /// Default log filter for the requested verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_convert() {
        let cli = Cli::try_parse_from(["xconvert", "convert", "data.csv", "--to", "json"]).unwrap();
        assert_eq!(cli.log_level(), "warn");
        match cli.command {
            Command::Convert { file, to, from, output } => {
                assert_eq!(file, PathBuf::from("data.csv"));
                assert_eq!(to, Some(FileFormat::Json));
                assert_eq!(from, None);
                assert_eq!(output, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_convert_with_source_and_output() {
        let cli = Cli::try_parse_from([
            "xconvert", "-vv", "convert", "notes.dat", "--from", "TXT", "--to", "xml", "-o", "out",
        ])
        .unwrap();
        assert_eq!(cli.log_level(), "debug");
        match cli.command {
            Command::Convert { from, output, .. } => {
                assert_eq!(from, Some(FileFormat::Txt));
                assert_eq!(output, Some(PathBuf::from("out")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_batch() {
        let cli = Cli::try_parse_from([
            "xconvert", "batch", "a.csv", "b.xml", "--to", "json", "--config", "x.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        match cli.command {
            Command::Batch { files, to, .. } => {
                assert_eq!(files.len(), 2);
                assert_eq!(to, Some(FileFormat::Json));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_batch_requires_files() {
        assert!(Cli::try_parse_from(["xconvert", "batch", "--to", "json"]).is_err());
    }

    #[test]
    fn test_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["xconvert", "convert", "a.csv", "--to", "yaml"]).is_err());
    }
}
