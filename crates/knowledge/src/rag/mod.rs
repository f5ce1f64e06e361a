//! Retrieval-augmented answering.
//!
//! [`Router`] decides which sources are active for a question and assembles
//! their context; [`AskPipeline`] hands that context to an
//! [`AnswerSynthesizer`] and attaches attribution.

pub mod ask;
pub mod context;
pub mod prompt;
pub mod router;
pub mod synth;
pub mod types;

pub use ask::AskPipeline;
pub use context::{AssembledContext, ContextItem};
pub use prompt::PromptBuilder;
pub use router::Router;
pub use synth::{AnswerSynthesizer, LlmSynthesizer};
pub use types::{AskOutcome, AskResponse, RoutingDecision, SourceKind, WebOrigin, NO_RELEVANT_INFORMATION};
