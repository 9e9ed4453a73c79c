//! Generation pipeline: blob storage, generator capabilities, prompt
//! rendering, the generation dispatcher with its task queue, and the
//! conversational front end that drives it.

pub mod conversation;
pub mod dispatcher;
pub mod error;
pub mod generator;
pub mod prompts;
pub mod storage;

pub use conversation::ConversationService;
pub use dispatcher::{GenerateOutcome, GenerateRequest, GenerationDispatcher};
pub use error::PipelineError;
