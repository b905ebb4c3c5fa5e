//! Prompt text for transcript analysis.

/// System instruction sent with every analysis request.
pub const ANALYSIS_SYSTEM_PROMPT: &str = "You extract only explicit facts, never hallucinate.";

/// Marker appended when a transcript is cut to the configured length.
pub const TRUNCATION_MARKER: &str = "\n[Transcript truncated]";

/// Analyst instructions; `{transcript}` is replaced with the (possibly
/// truncated) transcript.
const ANALYSIS_PROMPT: &str = r#"You are a senior financial analyst. Analyze this earnings call transcript.

CRITICAL RULES:
1. Only use information explicitly stated in the transcript. If something is not mentioned, use null or an empty array. Never infer or invent figures.
2. Every management_tone judgement must be backed by direct quotes from the transcript in supporting_quotes.
3. Respond with ONLY a single JSON object matching the schema below. No markdown, no commentary.

JSON schema:
{
  "management_tone": {
    "sentiment": "optimistic" | "cautious" | "neutral" | "pessimistic",
    "confidence": "high" | "medium" | "low",
    "supporting_quotes": ["exact quote", "..."]
  },
  "key_positives": [
    { "topic": "string", "description": "string", "mentioned_by": "CEO" | "CFO" | "Other" | null }
  ],
  "key_concerns": [
    { "topic": "string", "description": "string", "severity": "high" | "medium" | "low" }
  ],
  "forward_guidance": {
    "revenue_outlook": "string or null",
    "margin_outlook": "string or null",
    "capex_outlook": "string or null",
    "confidence": "high" | "medium" | "low"
  },
  "capacity_utilization": "string or null",
  "growth_initiatives": [
    { "initiative": "string", "description": "string", "timeframe": "near-term" | "long-term" | "ongoing" }
  ],
  "summary": "2-3 sentence factual summary"
}

Transcript:
{transcript}"#;

/// Build the analysis prompt around a transcript.
pub fn build_analysis_prompt(transcript: &str) -> String {
    ANALYSIS_PROMPT.replace("{transcript}", transcript)
}

/// Cut a transcript to `max_chars` characters (not bytes), appending the
/// truncation marker when anything was removed.
pub fn truncate_transcript(transcript: &str, max_chars: usize) -> String {
    match transcript.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &transcript[..cut], TRUNCATION_MARKER),
        None => transcript.to_string(),
    }
}
