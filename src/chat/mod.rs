// Retrieval-augmented chat
// Builds retrieval context from vector collections and assembles model prompts

pub mod context;
pub mod prompt;

pub use context::{CONTEXT_SEPARATOR, RetrievedContext, build_context, join_context, merge_ranked};
pub use prompt::{
    Conversation, Turn, build_document_prompt, document_messages, plain_chat_messages,
    render_history,
};
