//! Conversation history for teller.
//!
//! This crate provides:
//!
//! - **Messages**: the fixed-shape `Message` every raw record is normalized into
//! - **Normalization**: one pass that resolves field fallbacks and sender categories
//! - **Summarizer**: count-preserving, oldest-first, fact-preserving compression
//! - **Transcript records**: the persisted conversation/message shapes consumed as input

pub mod compress;
pub mod error;
pub mod facts;
pub mod message;
pub mod normalize;
pub mod summarizer;
pub mod transcript;

pub use compress::{ContentCompressor, ExtractiveCompressor, LlmCompressor};
pub use error::{SummarizeError, TranscriptError};
pub use facts::FactSet;
pub use message::{Message, SenderType, SummarizedMessages};
pub use normalize::{NormalizedMessage, normalize, normalize_history, parse_timestamp};
pub use summarizer::{CONTENT_LIMIT, Summarizer, accept_candidate, validate_candidate};
pub use transcript::{ConversationRecord, MessageRecord, NewConversation, TranscriptSender};
