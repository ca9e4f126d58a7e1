//! Prompt texts and response post-processing shared by providers.

use vdesc_models::{ModerationCategory, VideoMetadata};

use crate::error::{ProviderError, ProviderResult};

pub const FRAME_GRID_PROMPT: &str = "\
You are a video frame analysis expert. The image shows frames sampled in order from one part of a video.

Describe, as a continuous progression:
1. The speaker's actions and expressions
2. Text overlays or icons and their significance
3. Notable visual elements
4. The overall theme and message visible in these frames
5. The number of faces visible
6. The apparent gender of visible individuals
7. Personality traits and demeanor of the main individuals
8. Notable interactions
9. Scene changes
10. Identifiable individuals or distinctive features

Describe only what is visible. Do not mention that the frames are arranged in a grid.";

pub const TRANSCRIBE_PROMPT: &str = "Transcribe the following audio file into text. Return only the transcript.";

pub const NO_TRANSCRIPT: &str = "No audio transcription available.";

/// Prompt combining per-grid descriptions and the transcript into one narrative.
pub fn narrative_prompt(grid_descriptions: &[String], transcript: &str) -> String {
    let transcript = if transcript.trim().is_empty() {
        NO_TRANSCRIPT
    } else {
        transcript
    };

    format!(
        "Based on the following video segment descriptions and audio transcription, write a comprehensive analysis of the video.

Video segments:
{segments}

Audio transcription:
{transcript}

The analysis must cover:
1. The speaker's actions and expressions
2. Text overlays or icons and their significance
3. How the visuals relate to the audio
4. The overall theme and message
5. The number of faces visible
6. The number of persons in the video
7. Personality traits, demeanor and engagement of the main individual
8. The gender of the main speaker and of the other individuals
9. Names or identities of individuals, where possible
10. Notable interactions
11. Who is speaking at each point when there are several speakers

Focus only on the video and audio content. Do not mention grids or image layout.
Do not open with introductory phrases. Write a natural, flowing narrative.",
        segments = grid_descriptions.join("\n\n"),
    )
}

/// Prompt extracting structured metadata from the narrative.
pub fn metadata_prompt(narrative: &str, duration_seconds: f64, provisional_safe: bool) -> String {
    let moderation = if provisional_safe {
        "Automated visual moderation found no violations."
    } else {
        "Automated visual moderation flagged potential violations."
    };

    format!(
        r#"You are an expert content analyst. Extract metadata from the video description below.

Use plain text values only: no markdown, no line breaks, no escape characters.
Base every field on the description.

Video description:
{narrative}

Video duration: {duration}
{moderation}

Return a single JSON object with these keys:
{{
  "keywords": [{{"keyword": "string", "weight": 1}}],
  "topics": ["string"],
  "entities": ["string"],
  "actions": ["string"],
  "emotions": ["string"],
  "visual_elements": ["string"],
  "audio_elements": ["string"],
  "genre": "string",
  "target_audience": ["string"],
  "duration_estimate": "string",
  "quality_indicators": ["string"],
  "unique_identifiers": ["string"],
  "is_face_exist": true,
  "person_identity": {{"name": "string", "gender": "string"}},
  "other_person_identity": ["string"],
  "psychological_personality": ["string"],
  "no_of_person_in_video": 0,
  "content_warnings": ["string"],
  "safety_analysis": ["string"],
  "is_safe": true
}}

Give up to 10 keywords weighted 1-10 and at least 5. Give at least 3 topics.
Set no_of_person_in_video to 0 when nobody appears."#,
        duration = format_duration(duration_seconds),
    )
}

/// Prompt asking for per-category moderation scores.
pub fn moderation_prompt() -> String {
    let keys = ModerationCategory::ALL
        .iter()
        .map(|c| format!("  \"{}\": 0.0,", c.key()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Analyze this image strictly for explicit, definitive harmful content: sexual content, violence, \
harassment, hate speech, self-harm and illicit activity. Neutral scenes (walking, sports, casual \
interaction) are not violations.

Return only a JSON object with a confidence between 0.0 and 1.0 for each key, and \"flagged\" set to true \
only when there is clear evidence for at least one category:
{{
{keys}
  \"flagged\": false
}}"
    )
}

/// Format seconds as `M:SS`.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

/// Replace newlines, asterisks and backslashes with spaces.
pub fn clean_narrative(text: &str) -> String {
    text.chars()
        .map(|c| if matches!(c, '\n' | '*' | '\\') { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Decode a metadata JSON response and stamp the measured duration.
pub fn parse_metadata(
    provider: &'static str,
    text: &str,
    duration_seconds: f64,
) -> ProviderResult<VideoMetadata> {
    let mut metadata: VideoMetadata = serde_json::from_str(strip_code_fences(text))
        .map_err(|e| ProviderError::invalid_response(provider, format!("metadata JSON: {e}")))?;
    metadata.duration_estimate = Some(format_duration(duration_seconds));
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[]\n```"), "[]");
        assert_eq!(strip_code_fences("  {}  "), "{}");
    }

    #[test]
    fn test_clean_narrative() {
        assert_eq!(clean_narrative("**Bold**\nline\\x"), "Bold   line x");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(40.0), "0:40");
        assert_eq!(format_duration(240.4), "4:00");
        assert_eq!(format_duration(-1.0), "0:00");
    }

    #[test]
    fn test_narrative_prompt_without_transcript() {
        let prompt = narrative_prompt(&["grid one".to_string()], "  ");
        assert!(prompt.contains(NO_TRANSCRIPT));
        assert!(prompt.contains("grid one"));
    }

    #[test]
    fn test_moderation_prompt_lists_all_categories() {
        let prompt = moderation_prompt();
        for category in ModerationCategory::ALL {
            assert!(prompt.contains(category.key()));
        }
    }

    #[test]
    fn test_parse_metadata_overwrites_duration() {
        let metadata = parse_metadata(
            "test",
            "```json\n{\"duration_estimate\": \"10:00\", \"is_safe\": true}\n```",
            95.0,
        )
        .unwrap();
        assert_eq!(metadata.duration_estimate.as_deref(), Some("1:35"));
        assert_eq!(metadata.is_safe, Some(true));
    }
}
