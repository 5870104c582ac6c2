//! Deterministic canned data served in mock mode.

use super::ScrapedArticle;
use serde_json::json;
use sha2::{Digest, Sha256};

/// Dimension of mock embeddings.
pub const MOCK_EMBEDDING_DIM: usize = 64;

const MOCK_BODY: &str = "Regional lawmakers approved a long-debated transit package on Tuesday, \
committing funds to rail upgrades and new bus corridors over the next decade. \
Supporters argue the plan will cut commute times and emissions, while critics warn \
that cost overruns on earlier projects have not been addressed. The package now \
moves to the governor, who has signalled support but asked for stronger oversight \
of contractor spending.";

/// Short hex digest of `input`, used for stable identifiers.
pub fn digest(input: &str, len: usize) -> String {
    let hash = hex::encode(Sha256::digest(input.as_bytes()));
    hash[..len.min(hash.len())].to_string()
}

/// A canned article for any URL.
pub fn article(url: &str) -> ScrapedArticle {
    ScrapedArticle {
        title: "Transit package clears final vote".to_string(),
        content: MOCK_BODY.to_string(),
        description: Some("Lawmakers back a decade-long transit investment plan.".to_string()),
        author: Some("Newsflow Mock Desk".to_string()),
        published_at: Some("2024-05-14T09:30:00Z".to_string()),
        image_url: Some(format!("https://images.example.com/{}.jpg", digest(url, 12))),
        language: Some("en".to_string()),
    }
}

/// A canned chat reply matching the schema the tagged task expects.
pub fn chat_response(tag: Option<&str>, user_prompt: &str) -> String {
    match tag {
        Some("analysis") => json!({
            "title": "Transit package clears final vote",
            "translation_summary": "Lawmakers approved a ten-year transit plan funding rail and bus upgrades; the governor is expected to sign it with added oversight.",
            "key_points": [
                "Ten-year funding for rail upgrades and bus corridors",
                "Supporters cite shorter commutes and lower emissions",
                "Critics point to unresolved cost overruns"
            ],
            "critical_analysis": {
                "why_important": "Transit spending shapes regional growth and household costs for a decade.",
                "future_prediction": "Expect oversight amendments before the first contracts are awarded."
            },
            "narration": "Today's briefing: a decade-long transit plan clears its final vote.",
            "content_summary": "A transit funding package passed and heads to the governor."
        })
        .to_string(),
        Some("thumbnail") => {
            "Flat vector illustration of a modern commuter train crossing a city bridge at dawn, no text, no logos".to_string()
        }
        Some("interpret") => {
            "In context, this vote continues a pattern of infrastructure packages passing with oversight conditions attached.".to_string()
        }
        Some("learning") => {
            let first_line = user_prompt.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
            json!({
                "styled_text": format!("In short: {}", first_line.trim()),
                "confidence": 0.85,
                "style_options": ["concise", "conversational", "formal"]
            })
            .to_string()
        }
        _ => "Mock response".to_string(),
    }
}

/// A deterministic embedding derived from `text` by hashing its words into
/// buckets. Texts sharing words score as similar; the vector has unit length
/// unless `text` has no words.
pub fn embedding(text: &str) -> Vec<f32> {
    let mut values = vec![0.0_f32; MOCK_EMBEDDING_DIM];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let hash = Sha256::digest(token.to_lowercase().as_bytes());
        let bucket = usize::from(u16::from_le_bytes([hash[0], hash[1]])) % MOCK_EMBEDDING_DIM;
        values[bucket] += 1.0;
    }

    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut values {
            *v /= norm;
        }
    }
    values
}

/// A stable audio identifier for narrated text.
pub fn audio_identifier(text: &str, format: &str) -> String {
    format!("mock://audio/{}.{format}", digest(text, 16))
}
