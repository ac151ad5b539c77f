//! Demonstrate using the translation layer without a server.
//!
//! Usage:
//!   `cargo run --example translate_only`

use gemini_openai_proxy::translate::gemini_types::GenerateContentResponse;
use gemini_openai_proxy::translate::openai_types::{ChatCompletionRequest, ChatMessage};
use gemini_openai_proxy::translate::request::openai_to_gemini;
use gemini_openai_proxy::translate::response::{gemini_to_openai, CompletionContext};

fn main() -> anyhow::Result<()> {
    // An OpenAI chat request (what an OpenAI SDK sends)
    let chat_req = ChatCompletionRequest {
        model: "gemini-pro".to_string(),
        messages: vec![
            ChatMessage::new("system", "You are a geography expert. Be concise."),
            ChatMessage::new("user", "What is the capital of France?"),
            ChatMessage::new("assistant", "Paris."),
            ChatMessage::new("user", "  And Germany?  "),
        ],
        temperature: Some(0.2),
        max_tokens: Some(128),
        top_p: None,
    };

    println!("=== OpenAI Request ===");
    println!("{}", serde_json::to_string_pretty(&chat_req)?);

    let gemini_req = openai_to_gemini(&chat_req);
    println!("\n=== Translated Gemini Request ===");
    println!("{}", serde_json::to_string_pretty(&gemini_req)?);

    // A Gemini response (what generateContent sends back)
    let gemini_resp: GenerateContentResponse = serde_json::from_str(
        r#"{
            "candidates": [{
                "content": {"parts": [{"text": "Berlin."}], "role": "model"},
                "finishReason": "STOP",
                "index": 0,
                "safetyRatings": [{"category": "HARM_CATEGORY_DANGEROUS_CONTENT", "probability": "NEGLIGIBLE"}]
            }],
            "usageMetadata": {"promptTokenCount": 24, "candidatesTokenCount": 2, "totalTokenCount": 26}
        }"#,
    )?;

    let ctx = CompletionContext {
        id: "chatcmpl-demo".to_string(),
        model: chat_req.model.clone(),
        object: "chat.completion".to_string(),
    };
    let completion = gemini_to_openai(&gemini_resp, &ctx)?;

    println!("\n=== Translated OpenAI Response ===");
    println!("{}", serde_json::to_string_pretty(&completion)?);

    Ok(())
}
