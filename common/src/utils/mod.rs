pub mod config;
pub mod jsonl;
