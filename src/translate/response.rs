use chrono::Utc;

use super::gemini_types::{Candidate, GenerateContentResponse, UsageMetadata};
use super::openai_types::{ChatCompletionResponse, ChatUsage, Choice, ChoiceMessage};
use crate::error::{ProxyError, Result};

/// Identity fields stamped onto the translated completion. Gemini returns
/// none of them, so they come from the request being served.
#[derive(Debug, Clone)]
pub struct CompletionContext {
    pub id: String,
    pub model: String,
    pub object: String,
}

/// Translate a Gemini generation response into an `OpenAI` chat completion.
/// `created` is taken at translation time.
pub fn gemini_to_openai(
    resp: &GenerateContentResponse,
    ctx: &CompletionContext,
) -> Result<ChatCompletionResponse> {
    let choices = resp
        .candidates
        .iter()
        .map(translate_candidate)
        .collect::<Result<Vec<_>>>()?;

    let usage = resp
        .usage_metadata
        .as_ref()
        .map_or_else(ChatUsage::default, translate_usage);

    Ok(ChatCompletionResponse {
        id: ctx.id.clone(),
        object: ctx.object.clone(),
        created: Utc::now().timestamp(),
        model: ctx.model.clone(),
        choices,
        usage,
    })
}

fn translate_candidate(candidate: &Candidate) -> Result<Choice> {
    // Only the first part is surfaced.
    let text = candidate
        .content
        .as_ref()
        .and_then(|c| c.parts.first())
        .map(|p| p.text.clone())
        .ok_or(ProxyError::EmptyCandidateContent {
            index: candidate.index,
        })?;

    Ok(Choice {
        index: candidate.index,
        finish_reason: candidate.finish_reason.to_lowercase(),
        message: ChoiceMessage {
            role: "assistant".to_string(),
            content: text,
        },
        logprobs: None,
    })
}

fn translate_usage(usage: &UsageMetadata) -> ChatUsage {
    ChatUsage {
        prompt_tokens: usage.prompt_token_count,
        completion_tokens: usage.candidates_token_count,
        total_tokens: usage.total_token_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::gemini_types::{CandidateContent, Part};

    fn ctx() -> CompletionContext {
        CompletionContext {
            id: "chatcmpl-test".to_string(),
            model: "gemini-pro".to_string(),
            object: "chat.completion".to_string(),
        }
    }

    fn candidate(index: u32, parts: &[&str], finish_reason: &str) -> Candidate {
        Candidate {
            content: Some(CandidateContent {
                parts: parts
                    .iter()
                    .map(|t| Part {
                        text: (*t).to_string(),
                    })
                    .collect(),
                role: "model".to_string(),
            }),
            finish_reason: finish_reason.to_string(),
            index,
            safety_ratings: vec![],
        }
    }

    #[test]
    fn test_simple_candidate() {
        let resp: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello"}]},"finishReason":"STOP","index":0}]}"#,
        )
        .unwrap();

        let before = Utc::now().timestamp();
        let result = gemini_to_openai(&resp, &ctx()).unwrap();

        assert_eq!(result.id, "chatcmpl-test");
        assert_eq!(result.model, "gemini-pro");
        assert_eq!(result.object, "chat.completion");
        assert!(result.created >= before);
        assert_eq!(result.choices.len(), 1);
        assert_eq!(result.choices[0].index, 0);
        assert_eq!(result.choices[0].finish_reason, "stop");
        assert_eq!(result.choices[0].message.role, "assistant");
        assert_eq!(result.choices[0].message.content, "Hello");
        assert_eq!(result.usage, ChatUsage::default());
    }

    #[test]
    fn test_choices_follow_candidate_order() {
        let resp = GenerateContentResponse {
            candidates: vec![
                candidate(1, &["second", "ignored"], "MAX_TOKENS"),
                candidate(0, &["first"], "STOP"),
            ],
            usage_metadata: None,
        };

        let result = gemini_to_openai(&resp, &ctx()).unwrap();

        assert_eq!(result.choices.len(), 2);
        assert_eq!(result.choices[0].index, 1);
        assert_eq!(result.choices[0].message.content, "second");
        assert_eq!(result.choices[0].finish_reason, "max_tokens");
        assert_eq!(result.choices[1].index, 0);
        assert_eq!(result.choices[1].message.content, "first");
    }

    #[test]
    fn test_empty_parts_is_an_error() {
        let resp = GenerateContentResponse {
            candidates: vec![candidate(0, &["ok"], "STOP"), candidate(3, &[], "STOP")],
            usage_metadata: None,
        };

        let err = gemini_to_openai(&resp, &ctx()).unwrap_err();
        assert!(matches!(err, ProxyError::EmptyCandidateContent { index: 3 }));
    }

    #[test]
    fn test_missing_content_is_an_error() {
        let resp = GenerateContentResponse {
            candidates: vec![Candidate {
                finish_reason: "SAFETY".to_string(),
                ..Default::default()
            }],
            usage_metadata: None,
        };

        assert!(matches!(
            gemini_to_openai(&resp, &ctx()),
            Err(ProxyError::EmptyCandidateContent { index: 0 })
        ));
    }

    #[test]
    fn test_usage_from_metadata() {
        let resp: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hi"}]},"finishReason":"STOP","index":0}],
                "usageMetadata":{"promptTokenCount":4,"candidatesTokenCount":2,"totalTokenCount":6}}"#,
        )
        .unwrap();

        let result = gemini_to_openai(&resp, &ctx()).unwrap();

        assert_eq!(result.usage.prompt_tokens, 4);
        assert_eq!(result.usage.completion_tokens, 2);
        assert_eq!(result.usage.total_tokens, 6);
    }

    #[test]
    fn test_no_candidates_yields_no_choices() {
        let result = gemini_to_openai(&GenerateContentResponse::default(), &ctx()).unwrap();
        assert!(result.choices.is_empty());
    }
}
