pub mod provider;
pub mod openai;
pub mod prompts;
pub mod parser;

pub use provider::{CompletionRequest, LLMProvider};
pub use openai::OpenAIProvider;
pub use prompts::EstimationRequest;
pub use parser::{parse_estimate_response, RawEstimate};
