mod generator;
mod openai;

pub use generator::TextGenerator;
pub use openai::{OpenAiConfig, OpenAiGenerator};

#[cfg(test)]
pub use generator::MockTextGenerator;
