// Embeddings module
// Token-window chunking and the OpenAI-compatible embedding client

pub mod chunking;
pub mod openai;

pub use chunking::{Chunk, Chunker, ChunkingConfig, Encoding, Tokenizer};
pub use openai::EmbeddingClient;
