pub mod jsonl_source;
