//! Payload translation between `OpenAI` and Gemini formats.
//!
//! Converts chat requests into generation requests and generation results
//! back into chat completions. All translation functions are pure (no I/O).

pub mod gemini_types;
pub mod openai_types;
pub mod request;
pub mod response;
