use serde::Deserialize;
use serde_json::Value;

/// Raw webhook payload as posted by the OneBot bridge.
#[derive(Debug, Deserialize)]
pub(crate) struct InboundEvent {
    #[serde(default)]
    pub(crate) post_type: String,
    #[serde(default)]
    pub(crate) message_type: Option<String>,
    #[serde(default)]
    pub(crate) group_id: Option<i64>,
    #[serde(default)]
    pub(crate) user_id: Option<i64>,
    #[serde(default)]
    pub(crate) message: Vec<Segment>,
}

/// One typed piece of a chat message. Segment types the bot does not
/// understand (faces, replies, records, ...) decode as `Unknown` and are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum Segment {
    Text {
        #[serde(default)]
        data: TextData,
    },
    Image {
        #[serde(default)]
        data: ImageData,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub(crate) struct TextData {
    #[serde(default)]
    pub(crate) text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub(crate) struct ImageData {
    #[serde(default)]
    pub(crate) url: String,
}

#[derive(Debug, PartialEq)]
pub(crate) enum Rejection {
    /// Well-formed, but not a message posted in a group.
    NotGroupMessage,
    /// Body did not decode into the event shape at all.
    Malformed(String),
}

/// A validated group message event.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GroupMessage {
    pub(crate) group_id: i64,
    pub(crate) user_id: i64,
    pub(crate) segments: Vec<Segment>,
}

impl GroupMessage {
    /// Concatenation of every text segment, trimmed. Images and unknown
    /// segments contribute nothing.
    pub(crate) fn text(&self) -> String {
        let joined: String = self
            .segments
            .iter()
            .filter_map(|s| match s {
                Segment::Text { data } => Some(data.text.as_str()),
                _ => None,
            })
            .collect();
        joined.trim().to_string()
    }

    pub(crate) fn image_urls(&self) -> Vec<String> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Image { data } if !data.url.is_empty() => Some(data.url.clone()),
                _ => None,
            })
            .collect()
    }
}

pub(crate) fn image_marker(url: &str) -> String {
    format!("[CQ:image,url={url}]")
}

/// Validate a webhook payload. Anything other than a group message with a
/// group id is rejected; rejection is an expected outcome, not a fault.
pub(crate) fn parse_group_message(payload: &Value) -> Result<GroupMessage, Rejection> {
    let event = InboundEvent::deserialize(payload).map_err(|e| Rejection::Malformed(e.to_string()))?;
    if event.post_type != "message" || event.message_type.as_deref() != Some("group") {
        return Err(Rejection::NotGroupMessage);
    }
    let Some(group_id) = event.group_id else {
        return Err(Rejection::NotGroupMessage);
    };
    Ok(GroupMessage {
        group_id,
        user_id: event.user_id.unwrap_or_default(),
        segments: event.message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn group_payload(message: Value) -> Value {
        json!({
            "post_type": "message",
            "message_type": "group",
            "group_id": 1011696295i64,
            "user_id": 42,
            "message": message,
        })
    }

    #[test]
    fn test_parse_group_message_text_only() {
        let payload = group_payload(json!([
            {"type": "text", "data": {"text": "  #help  "}}
        ]));
        let msg = parse_group_message(&payload).unwrap();
        assert_eq!(msg.group_id, 1011696295);
        assert_eq!(msg.user_id, 42);
        assert_eq!(msg.text(), "#help");
    }

    #[test]
    fn test_parse_rejects_private_message() {
        let payload = json!({
            "post_type": "message",
            "message_type": "private",
            "user_id": 42,
            "message": [{"type": "text", "data": {"text": "#help"}}],
        });
        assert_eq!(parse_group_message(&payload), Err(Rejection::NotGroupMessage));
    }

    #[test]
    fn test_parse_rejects_notice_event() {
        let payload = json!({"post_type": "notice", "notice_type": "group_increase", "group_id": 1});
        assert_eq!(parse_group_message(&payload), Err(Rejection::NotGroupMessage));
    }

    #[test]
    fn test_parse_rejects_missing_group_id() {
        let payload = json!({
            "post_type": "message",
            "message_type": "group",
            "message": [],
        });
        assert_eq!(parse_group_message(&payload), Err(Rejection::NotGroupMessage));
    }

    #[test]
    fn test_parse_rejects_non_object_body() {
        let payload = json!("hello");
        assert!(matches!(
            parse_group_message(&payload),
            Err(Rejection::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_segments_are_ignored() {
        let payload = group_payload(json!([
            {"type": "face", "data": {"id": "14"}},
            {"type": "text", "data": {"text": "#faq rules"}},
            {"type": "reply", "data": {"id": "99"}}
        ]));
        let msg = parse_group_message(&payload).unwrap();
        assert_eq!(msg.segments.len(), 3);
        assert_eq!(msg.segments[0], Segment::Unknown);
        assert_eq!(msg.text(), "#faq rules");
    }

    #[test]
    fn test_text_concatenates_segments_in_order() {
        let payload = group_payload(json!([
            {"type": "text", "data": {"text": "#faq "}},
            {"type": "image", "data": {"url": "https://x.test/a.jpg"}},
            {"type": "text", "data": {"text": "edit rules"}}
        ]));
        let msg = parse_group_message(&payload).unwrap();
        assert_eq!(msg.text(), "#faq edit rules");
    }

    #[test]
    fn test_image_only_message_has_empty_text() {
        let payload = group_payload(json!([
            {"type": "image", "data": {"url": "https://x.test/a.jpg", "file": "a.jpg"}}
        ]));
        let msg = parse_group_message(&payload).unwrap();
        assert_eq!(msg.text(), "");
        assert_eq!(msg.image_urls(), vec!["https://x.test/a.jpg".to_string()]);
    }

    #[test]
    fn test_image_without_url_is_skipped() {
        let payload = group_payload(json!([
            {"type": "image", "data": {"file": "abc.image"}}
        ]));
        let msg = parse_group_message(&payload).unwrap();
        assert!(msg.image_urls().is_empty());
    }
}
