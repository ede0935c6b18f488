use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "docqa",
    version,
    about = "Question answering over a document/paragraph index"
)]
pub struct Cli {
    /// Base url of the Weaviate instance. Overrides the configured `weaviate_url`.
    #[arg(short = 'c', long = "weaviate-url", env = "WEAVIATE_URL", global = true)]
    pub weaviate_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Initialize the index schema
    Init {
        /// Delete every existing class before creating the schema
        #[arg(long)]
        overwrite: bool,
    },

    /// Import documents from a knowledge-base .jsonl file
    Index {
        #[arg(short, long)]
        source: PathBuf,

        /// Objects plus references submitted per request. Defaults to the configured `batch_size`.
        #[arg(short, long)]
        batch_size: Option<usize>,

        #[arg(short, long)]
        progress: bool,
    },

    /// Answer a single question
    Ask { question: String },

    /// Answer every question of a SQuAD 2.0 style questions file
    Inference {
        /// .jsonl file, each line carrying `id` and `question`
        #[arg(long)]
        questions_file: PathBuf,

        /// Where to write the `{id: answer}` JSON object
        #[arg(long)]
        output_file: PathBuf,

        #[arg(short, long)]
        progress: bool,
    },

    /// Serve the HTTP question endpoint
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },

    /// Filter Wikipedia-extractor output into a knowledge-base file
    PrepareWiki {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Split a SQuAD 2.0 dump into knowledge base, questions and dev set
    PrepareSquad {
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Keep only the first N articles. Useful on slow hardware.
        #[arg(long)]
        max_samples: Option<usize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_index_flags() {
        let cli = Cli::try_parse_from([
            "docqa",
            "-c",
            "http://weaviate:8080",
            "index",
            "-s",
            "kb.jsonl",
            "-b",
            "1",
            "-p",
        ])
        .expect("parse");

        assert_eq!(cli.weaviate_url.as_deref(), Some("http://weaviate:8080"));
        match cli.command {
            Command::Index {
                source,
                batch_size,
                progress,
            } => {
                assert_eq!(source, PathBuf::from("kb.jsonl"));
                assert_eq!(batch_size, Some(1));
                assert!(progress);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_inference_requires_both_files() {
        assert!(Cli::try_parse_from(["docqa", "inference", "--questions-file", "q.jsonl"]).is_err());

        let cli = Cli::try_parse_from([
            "docqa",
            "inference",
            "--questions-file",
            "q.jsonl",
            "--output-file",
            "out.json",
        ])
        .expect("parse");
        assert!(matches!(
            cli.command,
            Command::Inference {
                progress: false,
                ..
            }
        ));
    }

    #[test]
    fn test_prepare_squad_kebab_case() {
        let cli = Cli::try_parse_from([
            "docqa",
            "prepare-squad",
            "-i",
            "dev-v2.0.json",
            "-o",
            "data",
            "--max-samples",
            "10",
        ])
        .expect("parse");
        assert!(matches!(
            cli.command,
            Command::PrepareSquad {
                max_samples: Some(10),
                ..
            }
        ));
    }
}
