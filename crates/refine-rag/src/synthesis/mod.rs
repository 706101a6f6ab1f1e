//! Answer synthesis: prompt templates, context packing and compact-refine

pub mod packer;
pub mod synthesizer;
pub mod template;

use serde::{Deserialize, Serialize};

pub use packer::ContextPacker;
pub use synthesizer::{ResponseSynthesizer, SynthesisState};
pub use template::{PromptTemplate, Prompts};

/// How retrieved context is turned into an answer
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Pack as much context per call as fits, answer on the first block and
    /// refine on each following one
    #[default]
    Compact,
}
