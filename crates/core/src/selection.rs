use std::{path::Path, sync::LazyLock, time::Duration};

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::{
    config::SelectionConfig,
    error::SelectionError,
    types::{Segment, Selection, SelectionRequest},
};

static SYSTEM_PROMPT: &str =
    "You are an expert video editor specializing in short-form social media content.";

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("valid regex"));

/// Response layout an endpoint is known to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    /// Body is the segment object itself.
    Direct,
    /// Body is a chat-completion envelope; `choices[0].message.content`
    /// holds the segment object as a JSON string.
    ChatCompletion,
}

/// One URL/response-shape variant of the extraction service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub url: String,
    pub shape: ResponseShape,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// One entry of the model's answer. Every field is decoded leniently so a
/// badly typed caption or tag list never costs a segment its timestamps.
#[derive(Debug, Deserialize)]
struct RawSegment {
    #[serde(
        rename = "Start Timestamp",
        alias = "start_timestamp",
        default,
        deserialize_with = "lenient_text"
    )]
    start: Option<String>,
    #[serde(
        rename = "End Timestamp",
        alias = "end_timestamp",
        default,
        deserialize_with = "lenient_text"
    )]
    end: Option<String>,
    #[serde(alias = "Caption", default, deserialize_with = "lenient_text")]
    caption: Option<String>,
    #[serde(alias = "Hashtags", default, deserialize_with = "lenient_tags")]
    hashtags: Vec<String>,
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

/// Accepts a list of tags or a single string of space/comma separated tags.
fn lenient_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let split = |text: &str| -> Vec<String> {
        text.split(|c: char| c.is_whitespace() || c == ',')
            .filter(|tag| !tag.is_empty())
            .map(String::from)
            .collect()
    };

    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => split(&text),
        Value::Array(items) => items
            .into_iter()
            .flat_map(|item| match item {
                Value::String(text) => split(&text),
                _ => Vec::new(),
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// A failed attempt recorded while selecting segments.
#[derive(Debug)]
pub struct EndpointFailure {
    /// `None` when the failure happened before any endpoint was called.
    pub endpoint: Option<String>,
    pub error: SelectionError,
}

#[derive(Debug, Default)]
pub struct SelectionReport {
    pub selection: Selection,
    pub failures: Vec<EndpointFailure>,
}

/// Build the instruction prompt for the extraction service.
pub fn build_prompt(transcript: &str, request: &SelectionRequest) -> String {
    let mut keys = String::new();
    for n in 1..=request.count {
        if n > 1 {
            keys.push_str(",\n");
        }
        keys.push_str(&format!(
            r##"    "Segment {n}": {{
        "Start Timestamp": "HH:MM:SS.mmm",
        "End Timestamp": "HH:MM:SS.mmm",
        "caption": "Caption for Segment {n}",
        "hashtags": ["#hashtag1", "#hashtag2", "#hashtag3", "#hashtag4", "#hashtag5"]
    }}"##
        ));
    }

    format!(
        r#"Analyze the following transcript and extract exactly the top {count} most engaging, hooky segments optimized for {style} TikTok/Instagram Reels. Focus on parts that grab attention and keep viewers watching.

Rules:
- Each segment must be exactly {length} seconds long. Trim or extend slightly to fit the duration while keeping the content coherent and impactful.
- Use timestamps that exist in the transcript, formatted as HH:MM:SS.mmm.
- Output must be raw JSON only, with no markdown, no code blocks, no explanations, and no extra text.
- Do not enclose the output in triple backticks or any other markers.

Output Format (raw JSON only):
{{
{keys}
}}

Transcript:
{transcript}"#,
        count = request.count,
        style = request.style,
        length = request.clip_length_secs,
        keys = keys,
        transcript = transcript.trim(),
    )
}

/// First run of digits in a segment label, e.g. `"Segment 12"` → 12.
pub fn ordinal_from_name(name: &str) -> Option<u32> {
    FIRST_NUMBER
        .find(name)
        .and_then(|m| m.as_str().parse().ok())
}

/// Normalize either response shape into a [`Selection`].
///
/// The shape is detected from the body itself; `expected` is only used for
/// diagnostics.
pub fn normalize_response(
    body: Value,
    expected: ResponseShape,
) -> Result<Selection, SelectionError> {
    let detected = detect_shape(&body);
    if detected != expected {
        debug!(?expected, ?detected, "endpoint answered with a different shape");
    }

    match detected {
        ResponseShape::Direct => parse_direct(body),
        ResponseShape::ChatCompletion => parse_chat_completion(body),
    }
}

fn detect_shape(body: &Value) -> ResponseShape {
    if body.get("choices").is_some_and(Value::is_array) {
        ResponseShape::ChatCompletion
    } else {
        ResponseShape::Direct
    }
}

fn parse_chat_completion(body: Value) -> Result<Selection, SelectionError> {
    let content = &body["choices"][0]["message"]["content"];
    match content {
        Value::String(text) if !text.trim().is_empty() => {
            parse_direct(serde_json::from_str(strip_code_fence(text))?)
        }
        Value::Object(_) => parse_direct(content.clone()),
        _ => Err(SelectionError::UnexpectedShape(
            "chat completion without message content".to_string(),
        )),
    }
}

fn parse_direct(body: Value) -> Result<Selection, SelectionError> {
    let Value::Object(map) = body else {
        return Err(SelectionError::UnexpectedShape(format!(
            "expected a JSON object, got {}",
            value_kind(&body)
        )));
    };

    let mut segments = Vec::with_capacity(map.len());
    for (position, (name, value)) in map.into_iter().enumerate() {
        let raw: RawSegment = match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("ignoring unreadable entry {:?}: {}", name, e);
                continue;
            }
        };

        let ordinal = ordinal_from_name(&name).unwrap_or(position as u32 + 1);
        segments.push(Segment {
            ordinal,
            start: raw.start.filter(|s| !s.trim().is_empty()),
            end: raw.end.filter(|s| !s.trim().is_empty()),
            caption: raw.caption.unwrap_or_default(),
            hashtags: raw.hashtags,
            name,
        });
    }

    if segments.is_empty() {
        return Err(SelectionError::UnexpectedShape(
            "response contained no segments".to_string(),
        ));
    }

    Ok(Selection::new(segments))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Models sometimes wrap JSON in a markdown fence despite being told not to.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Asks the remote extraction service for hooky segments, trying each
/// endpoint variant in order.
pub struct SegmentSelector {
    client: reqwest::Client,
    endpoints: Vec<Endpoint>,
    api_key: Option<String>,
}

impl SegmentSelector {
    pub fn new(endpoints: Vec<Endpoint>, timeout: Duration) -> Result<Self, SelectionError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoints,
            api_key: None,
        })
    }

    pub fn from_config(config: &SelectionConfig) -> Result<Self, SelectionError> {
        let mut selector = Self::new(config.endpoints.clone(), config.timeout())?;
        if let Some(env_var) = &config.api_key_env {
            let key = std::env::var(env_var).map_err(|_| SelectionError::MissingApiKey {
                env_var: env_var.clone(),
            })?;
            selector.api_key = Some(key);
        }
        Ok(selector)
    }

    /// Empty when nothing usable came back from any endpoint.
    pub async fn select(&self, transcript: &str, request: &SelectionRequest) -> Selection {
        self.select_with_diagnostics(transcript, request)
            .await
            .selection
    }

    pub async fn select_with_diagnostics(
        &self,
        transcript: &str,
        request: &SelectionRequest,
    ) -> SelectionReport {
        let mut report = SelectionReport::default();

        if transcript.trim().is_empty() {
            warn!("transcript is empty, nothing to select from");
            report.failures.push(EndpointFailure {
                endpoint: None,
                error: SelectionError::EmptyTranscript,
            });
            return report;
        }

        let payload = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: build_prompt(transcript, request),
                },
            ],
        };

        for endpoint in &self.endpoints {
            match self.try_endpoint(endpoint, &payload).await {
                Ok(selection) => {
                    info!(
                        "{} returned {} segments",
                        endpoint.url,
                        selection.len()
                    );
                    report.selection = selection;
                    return report;
                }
                Err(error) => {
                    warn!("segment selection via {} failed: {}", endpoint.url, error);
                    report.failures.push(EndpointFailure {
                        endpoint: Some(endpoint.url.clone()),
                        error,
                    });
                }
            }
        }

        warn!("all endpoints failed to return valid segments");
        report
    }

    /// Read the transcript file and select from its full text.
    pub async fn select_from_file(
        &self,
        transcript_path: &Path,
        request: &SelectionRequest,
    ) -> SelectionReport {
        match fs::read(transcript_path).await {
            Ok(bytes) => {
                let transcript = String::from_utf8_lossy(&bytes);
                self.select_with_diagnostics(&transcript, request).await
            }
            Err(e) => {
                warn!(
                    "transcript {} not readable: {}",
                    transcript_path.display(),
                    e
                );
                SelectionReport {
                    selection: Selection::empty(),
                    failures: vec![EndpointFailure {
                        endpoint: None,
                        error: SelectionError::TranscriptMissing(transcript_path.to_path_buf()),
                    }],
                }
            }
        }
    }

    async fn try_endpoint(
        &self,
        endpoint: &Endpoint,
        payload: &ChatRequest,
    ) -> Result<Selection, SelectionError> {
        let mut request = self
            .client
            .post(&endpoint.url)
            .header("Content-Type", "application/json")
            .json(payload);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let text = request.send().await?.error_for_status()?.text().await?;
        let body: Value = serde_json::from_str(strip_code_fence(&text))?;
        normalize_response(body, endpoint.shape)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::ClipStyle;

    fn segments_object() -> Value {
        json!({
            "Segment 2": {
                "Start Timestamp": "00:01:00.000",
                "End Timestamp": "00:01:30.000",
                "caption": "second",
                "hashtags": ["#b"]
            },
            "Segment 1": {
                "Start Timestamp": "00:00:10.000",
                "End Timestamp": "00:00:40.000",
                "caption": "first",
                "hashtags": ["#a", "#aa"]
            }
        })
    }

    #[test]
    fn prompt_embeds_parameters_and_transcript() {
        let request = SelectionRequest::new(2, 25, ClipStyle::Funny).unwrap();
        let prompt = build_prompt("  00:00:01.000 --> 00:00:02.000\nhello\n", &request);

        assert!(prompt.contains("top 2 most engaging"));
        assert!(prompt.contains("optimized for funny"));
        assert!(prompt.contains("exactly 25 seconds"));
        assert!(prompt.contains(r#""Segment 1""#));
        assert!(prompt.contains(r#""Segment 2""#));
        assert!(!prompt.contains(r#""Segment 3""#));
        assert_eq!(
            prompt
                .matches(r##""hashtags": ["#hashtag1", "#hashtag2", "#hashtag3", "#hashtag4", "#hashtag5"]"##)
                .count(),
            2
        );
        assert!(prompt.ends_with("00:00:01.000 --> 00:00:02.000\nhello"));
    }

    #[test]
    fn request_body_is_a_message_list() {
        let body = serde_json::to_value(ChatRequest {
            messages: vec![ChatMessage {
                role: "user",
                content: "x".into(),
            }],
        })
        .unwrap();
        assert_eq!(body, json!({"messages": [{"role": "user", "content": "x"}]}));
    }

    #[test]
    fn ordinal_is_first_digit_run() {
        assert_eq!(ordinal_from_name("Segment 12"), Some(12));
        assert_eq!(ordinal_from_name("Clip 3 of 7"), Some(3));
        assert_eq!(ordinal_from_name("Segment"), None);
    }

    #[test]
    fn direct_and_chat_shapes_normalize_identically() {
        let direct = normalize_response(segments_object(), ResponseShape::Direct).unwrap();
        let envelope = json!({
            "choices": [{
                "message": {"role": "assistant", "content": segments_object().to_string()}
            }]
        });
        let chat = normalize_response(envelope, ResponseShape::ChatCompletion).unwrap();

        assert_eq!(direct, chat);
        assert_eq!(direct.len(), 2);
        let first = &direct.segments()[0];
        assert_eq!(first.name, "Segment 1");
        assert_eq!(first.ordinal, 1);
        assert_eq!(first.start.as_deref(), Some("00:00:10.000"));
        assert_eq!(first.hashtags, vec!["#a", "#aa"]);
    }

    #[test]
    fn shape_is_detected_from_body_not_endpoint() {
        let selection = normalize_response(segments_object(), ResponseShape::ChatCompletion);
        assert_eq!(selection.unwrap().len(), 2);
    }

    #[test]
    fn fenced_chat_content_is_accepted() {
        let fenced = format!("```json\n{}\n```", segments_object());
        let envelope = json!({"choices": [{"message": {"content": fenced}}]});
        let selection = normalize_response(envelope, ResponseShape::ChatCompletion).unwrap();
        assert_eq!(selection.len(), 2);
    }

    #[test]
    fn missing_timestamps_are_kept_for_the_renderer_to_skip() {
        let body = json!({
            "Segment 1": {"Start Timestamp": "00:00:01.000", "caption": "c"},
            "Segment 2": {"Start Timestamp": "", "End Timestamp": "00:00:09.000"}
        });
        let selection = normalize_response(body, ResponseShape::Direct).unwrap();
        assert_eq!(selection.segments()[0].end, None);
        assert_eq!(selection.segments()[1].start, None);
        assert!(selection.segments()[1].hashtags.is_empty());
    }

    #[test]
    fn names_without_digits_use_response_position() {
        let body: Value = serde_json::from_str(
            r#"{
                "zeta": {"Start Timestamp": "00:00:01.000", "End Timestamp": "00:00:02.000"},
                "alpha": {"Start Timestamp": "00:00:03.000", "End Timestamp": "00:00:04.000"}
            }"#,
        )
        .unwrap();
        let selection = normalize_response(body, ResponseShape::Direct).unwrap();
        assert_eq!(selection.get("zeta").unwrap().ordinal, 1);
        assert_eq!(selection.get("alpha").unwrap().ordinal, 2);
    }

    #[test]
    fn badly_typed_caption_and_hashtags_keep_the_segment() {
        let body = json!({
            "Segment 1": {
                "Start Timestamp": "00:00:01.000",
                "End Timestamp": "00:00:31.000",
                "caption": "hook",
                "hashtags": "#a #b,#c"
            },
            "Segment 2": {
                "Start Timestamp": "00:01:00.000",
                "End Timestamp": "00:01:30.000",
                "caption": 42,
                "hashtags": {"first": "#x"}
            },
            "Segment 3": {
                "Start Timestamp": "00:02:00.000",
                "End Timestamp": "00:02:30.000",
                "caption": null,
                "hashtags": ["#ok", 7, "#also #split"]
            }
        });
        let selection = normalize_response(body, ResponseShape::Direct).unwrap();

        assert_eq!(selection.len(), 3);
        assert_eq!(selection.segments()[0].hashtags, vec!["#a", "#b", "#c"]);
        assert_eq!(selection.segments()[1].caption, "42");
        assert!(selection.segments()[1].hashtags.is_empty());
        assert_eq!(selection.segments()[2].caption, "");
        assert_eq!(
            selection.segments()[2].hashtags,
            vec!["#ok", "#also", "#split"]
        );
    }

    #[test]
    fn unusable_bodies_are_errors() {
        for body in [
            json!({}),
            json!([1, 2]),
            json!({"Segment 1": "not an object"}),
            json!({"choices": []}),
            json!({"choices": [{"message": {"content": ""}}]}),
        ] {
            assert!(
                normalize_response(body.clone(), ResponseShape::Direct).is_err(),
                "{body}"
            );
        }
        let bad_inner = json!({"choices": [{"message": {"content": "not json"}}]});
        assert!(matches!(
            normalize_response(bad_inner, ResponseShape::ChatCompletion),
            Err(SelectionError::Json(_))
        ));
    }

    #[test]
    fn strips_markdown_fences() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence(" {} "), "{}");
    }
}
