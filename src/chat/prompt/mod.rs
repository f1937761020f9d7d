#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;

const DOCUMENT_DIRECTIVE: &str = "You are a document question-answering assistant. Answer the user's question based on the `Document content` and the `Conversation history`. If the question is unrelated to the `Document content`, do not force an answer from it.";

const PLAIN_CHAT_DIRECTIVE: &str = "You are a chatbot. Answer the user's question.";

/// One exchange; `assistant` is `None` while the answer is pending
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub user: String,
    pub assistant: Option<String>,
}

impl Turn {
    #[inline]
    pub fn new(user: impl Into<String>, assistant: Option<String>) -> Self {
        Self {
            user: user.into(),
            assistant,
        }
    }
}

/// Ordered turns; the last one is the in-flight question
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    /// Start a new turn with an unanswered question
    #[inline]
    pub fn push_user(&mut self, question: impl Into<String>) {
        self.turns.push(Turn::new(question, None));
    }

    /// Fill the assistant slot of the last turn
    #[inline]
    pub fn answer_last(&mut self, answer: impl Into<String>) {
        if let Some(turn) = self.turns.last_mut() {
            turn.assistant = Some(answer.into());
        }
    }

    /// Drop the last turn, e.g. after a failed request
    #[inline]
    pub fn discard_last(&mut self) -> Option<Turn> {
        self.turns.pop()
    }

    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[inline]
    pub fn in_flight(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Every turn except the in-flight one
    #[inline]
    pub fn prior_turns(&self) -> &[Turn] {
        match self.turns.split_last() {
            Some((_, prior)) => prior,
            None => &[],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// `user:` / `assistant:` lines for `turns`, skipping empty slots
#[inline]
pub fn render_history(turns: &[Turn]) -> String {
    let mut lines = Vec::with_capacity(turns.len() * 2);
    for turn in turns {
        if !turn.user.is_empty() {
            lines.push(format!("user:{}", turn.user));
        }
        if let Some(answer) = turn.assistant.as_deref().filter(|a| !a.is_empty()) {
            lines.push(format!("assistant:{}", answer));
        }
    }
    lines.join("\n")
}

#[inline]
pub fn build_document_prompt(context: &str, history: &str, question: &str) -> String {
    format!(
        "{DOCUMENT_DIRECTIVE}\n\nDocument content: ```\n{context}```\n\nConversation history: ```\n{history}```\n\nuser: ```{question}```\nassistant: "
    )
}

/// Single user message carrying the document prompt for the in-flight question
#[inline]
pub fn document_messages(context: &str, conversation: &Conversation) -> Vec<ChatMessage> {
    let question = conversation
        .in_flight()
        .map_or("", |turn| turn.user.as_str());
    let history = render_history(conversation.prior_turns());
    vec![ChatMessage::user(build_document_prompt(context, &history, question))]
}

/// Messages for chatting without documents
#[inline]
pub fn plain_chat_messages(conversation: &Conversation) -> Vec<ChatMessage> {
    if conversation.len() <= 1 {
        let question = conversation
            .in_flight()
            .map_or(String::new(), |turn| turn.user.clone());
        return vec![
            ChatMessage::system(PLAIN_CHAT_DIRECTIVE),
            ChatMessage::user(question),
        ];
    }

    let mut messages = Vec::with_capacity(conversation.len() * 2);
    for turn in conversation.turns() {
        messages.push(ChatMessage::user(turn.user.clone()));
        if let Some(answer) = &turn.assistant {
            messages.push(ChatMessage::assistant(answer.clone()));
        }
    }
    messages
}
