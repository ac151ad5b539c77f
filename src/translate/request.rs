//! Translate `OpenAI` Chat Completions requests into Gemini `generateContent` requests.
//!
//! Gemini only knows two roles, so every non-`user` role folds to `model`.
//! Each message becomes exactly one content entry holding one text part.

use super::gemini_types::{Content, GenerateContentRequest, GenerationConfig, Part, Role, SafetySetting};
use super::openai_types::{ChatCompletionRequest, ChatMessage};

pub const SAFETY_CATEGORY: &str = "HARM_CATEGORY_DANGEROUS_CONTENT";
pub const SAFETY_THRESHOLD: &str = "BLOCK_NONE";
pub const STOP_SEQUENCE: &str = "Title";

/// Translate an `OpenAI` chat request into a Gemini generation request.
/// Pure function: sampling parameters pass through untouched.
pub fn openai_to_gemini(req: &ChatCompletionRequest) -> GenerateContentRequest {
    let contents = req.messages.iter().map(translate_message).collect();

    GenerateContentRequest {
        contents,
        safety_settings: vec![SafetySetting {
            category: SAFETY_CATEGORY.to_string(),
            threshold: SAFETY_THRESHOLD.to_string(),
        }],
        generation_config: GenerationConfig {
            stop_sequences: vec![STOP_SEQUENCE.to_string()],
            temperature: req.temperature,
            max_output_tokens: req.max_tokens,
            top_p: req.top_p,
        },
    }
}

pub fn map_role(role: &str) -> Role {
    if role.eq_ignore_ascii_case("user") {
        Role::User
    } else {
        Role::Model
    }
}

fn translate_message(msg: &ChatMessage) -> Content {
    Content {
        role: map_role(&msg.role),
        parts: vec![Part {
            text: msg.content.trim().to_string(),
        }],
    }
}
