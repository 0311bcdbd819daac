mod error;
mod manager;
mod prompter;
mod slot;
mod template;

pub use error::PromptError;
pub use manager::PromptManager;
pub use prompter::{FixedAnswer, Prompter};
pub use slot::{PromptAnswer, PromptOutcome, PromptSlot};
pub use template::{Prompt, PromptKind, PromptTemplate};
