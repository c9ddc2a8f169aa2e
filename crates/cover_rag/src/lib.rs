pub mod corpus;
pub mod db;
pub mod embeddings;
pub mod entities;
pub mod graph;
pub mod llm;
pub mod ollama;
pub mod orchestrator;
pub mod prompts;
pub mod retrieve;
pub mod vector;
