use frame_relay_common::config::PayloadConfig;
use frame_relay_common::frame::SampledFrame;
use serde::Serialize;
use serde_json::Value;

use crate::event::Job;

/// One element of a multi-part model prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text {
        text: String,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub file_uri: String,
    pub mime_type: String,
}

/// Document handed to the downstream webhook.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayPayload {
    pub video_id: Option<Value>,
    pub content_parts: Vec<ContentPart>,
}

/// Where a consumer of the payload finds `frame`.
pub fn media_uri(frame: &SampledFrame, config: &PayloadConfig) -> String {
    match &config.media_base_uri {
        Some(base) => format!("{}/{}", base.trim_end_matches('/'), frame.file_name),
        None => format!("file://{}", frame.path.display()),
    }
}

/// Prompt text first (if any), then a timestamp text part and a file part
/// per frame.
pub fn content_parts(
    frames: &[SampledFrame],
    prompt: Option<&str>,
    config: &PayloadConfig,
) -> Vec<ContentPart> {
    let mut parts = Vec::with_capacity(frames.len() * 2 + 1);
    if let Some(prompt) = prompt {
        parts.push(ContentPart::Text {
            text: prompt.to_string(),
        });
    }
    for frame in frames {
        parts.push(ContentPart::Text {
            text: frame.timestamp.to_string(),
        });
        parts.push(ContentPart::FileData {
            file_data: FileData {
                file_uri: media_uri(frame, config),
                mime_type: config.mime_type.clone(),
            },
        });
    }
    parts
}

/// Assemble the payload for `job`, referencing at most `job.count` frames.
pub fn build_payload(job: &Job, frames: &[SampledFrame], config: &PayloadConfig) -> RelayPayload {
    let frames = match job.count {
        Some(n) => &frames[..n.min(frames.len())],
        None => frames,
    };
    RelayPayload {
        video_id: job.video_id.clone(),
        content_parts: content_parts(frames, job.prompt.as_deref(), config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_relay_common::frame::{frame_file_name, FrameTimestamp};
    use std::path::PathBuf;

    fn frames(n: u64) -> Vec<SampledFrame> {
        (0..n)
            .map(|i| {
                let timestamp = FrameTimestamp::from_millis(i * 200);
                let file_name = frame_file_name("clip_mp4", timestamp);
                SampledFrame {
                    index: i * 6,
                    timestamp,
                    path: PathBuf::from("/tmp/frames").join(&file_name),
                    file_name,
                }
            })
            .collect()
    }

    fn job(count: Option<usize>, prompt: Option<&str>) -> Job {
        Job {
            video_url: "https://cdn.example.com/clip.mp4".into(),
            count,
            video_id: Some("vid-42".into()),
            prompt: prompt.map(str::to_string),
        }
    }

    #[test]
    fn timestamp_then_file_per_frame() {
        let parts = content_parts(&frames(2), None, &PayloadConfig::default());
        assert_eq!(parts.len(), 4);
        assert_eq!(
            parts[0],
            ContentPart::Text {
                text: "00:00:000".into()
            }
        );
        assert_eq!(
            parts[3],
            ContentPart::FileData {
                file_data: FileData {
                    file_uri: "file:///tmp/frames/clip_mp4_frame00:00:200.jpg".into(),
                    mime_type: "image/jpeg".into(),
                }
            }
        );
    }

    #[test]
    fn prompt_leads_the_parts() {
        let parts = content_parts(&frames(1), Some("What is cooked?"), &PayloadConfig::default());
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[0],
            ContentPart::Text {
                text: "What is cooked?".into()
            }
        );
    }

    #[test]
    fn base_uri_replaces_local_paths() {
        let config = PayloadConfig {
            media_base_uri: Some("https://media.example.com/frames/".into()),
            ..PayloadConfig::default()
        };
        let frame = &frames(2)[1];
        assert_eq!(
            media_uri(frame, &config),
            "https://media.example.com/frames/clip_mp4_frame00:00:200.jpg"
        );
    }

    #[test]
    fn count_caps_referenced_frames() {
        let all = frames(5);
        let payload = build_payload(&job(Some(2), None), &all, &PayloadConfig::default());
        assert_eq!(payload.content_parts.len(), 4);

        let payload = build_payload(&job(Some(50), None), &all, &PayloadConfig::default());
        assert_eq!(payload.content_parts.len(), 10);

        let payload = build_payload(&job(None, None), &all, &PayloadConfig::default());
        assert_eq!(payload.content_parts.len(), 10);
    }

    #[test]
    fn payload_serializes_camel_case() {
        let payload = build_payload(&job(Some(1), Some("Summarise")), &frames(3), &PayloadConfig::default());
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "videoId": "vid-42",
                "contentParts": [
                    { "text": "Summarise" },
                    { "text": "00:00:000" },
                    { "fileData": {
                        "fileUri": "file:///tmp/frames/clip_mp4_frame00:00:000.jpg",
                        "mimeType": "image/jpeg"
                    } }
                ]
            })
        );
    }

    #[test]
    fn numeric_video_id_passes_through() {
        let mut numbered = job(None, None);
        numbered.video_id = Some(serde_json::json!(1718));
        let payload = build_payload(&numbered, &frames(1), &PayloadConfig::default());
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["videoId"], serde_json::json!(1718));
    }

    #[test]
    fn empty_sampling_gives_prompt_only() {
        let payload = build_payload(&job(None, Some("Anything?")), &[], &PayloadConfig::default());
        assert_eq!(payload.content_parts.len(), 1);
    }
}
