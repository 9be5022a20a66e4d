//! Send-request cascade strategy table
//!
//! Provider deployments differ in which request shape a given kind
//! accepts, so each kind maps to an ordered list of candidates. The
//! dispatcher tries them in order and stops at the first success.

use serde_json::{Value, json};

use crate::db::MessageKind;
use crate::provider::SendCandidate;

/// JSON pointers probed, in order, for a provider message id
const MESSAGE_ID_POINTERS: &[&str] = &[
    "/messageId",
    "/id",
    "/key/id",
    "/message/id",
    "/data/messageId",
];

/// Build the ordered candidate list for one outbound message
///
/// `media_url` must be present for media kinds; the dispatcher enforces
/// that before calling here.
#[must_use]
pub fn build_candidates(
    kind: MessageKind,
    destination: &str,
    text: Option<&str>,
    media_url: Option<&str>,
) -> Vec<SendCandidate> {
    let caption = text.unwrap_or_default();
    let media = media_url.unwrap_or_default();

    match kind {
        MessageKind::Text => vec![
            SendCandidate {
                label: "send-text",
                path: "/api/messages/send-text",
                body: json!({ "phone": destination, "message": caption }),
            },
            SendCandidate {
                label: "send-message",
                path: "/api/messages/send-message",
                body: json!({ "phone": destination, "body": caption }),
            },
        ],
        MessageKind::Image => vec![
            SendCandidate {
                label: "send-image",
                path: "/api/messages/send-image",
                body: json!({ "phone": destination, "image": media, "caption": caption }),
            },
            SendCandidate {
                label: "send-image-url",
                path: "/api/messages/send-image",
                body: json!({ "phone": destination, "url": media, "caption": caption }),
            },
            SendCandidate {
                label: "send-media",
                path: "/api/messages/send-media",
                body: json!({
                    "phone": destination,
                    "media": media,
                    "mediatype": "image",
                    "caption": caption,
                }),
            },
        ],
        MessageKind::Audio => vec![
            SendCandidate {
                label: "send-audio",
                path: "/api/messages/send-audio",
                body: json!({ "phone": destination, "audio": media }),
            },
            SendCandidate {
                label: "send-media",
                path: "/api/messages/send-media",
                body: json!({
                    "phone": destination,
                    "media": media,
                    "mediatype": "audio",
                }),
            },
        ],
        MessageKind::Video => vec![
            SendCandidate {
                label: "send-video",
                path: "/api/messages/send-video",
                body: json!({ "phone": destination, "video": media, "caption": caption }),
            },
            SendCandidate {
                label: "send-video-url",
                path: "/api/messages/send-video",
                body: json!({ "phone": destination, "url": media, "caption": caption }),
            },
            SendCandidate {
                label: "send-media",
                path: "/api/messages/send-media",
                body: json!({
                    "phone": destination,
                    "media": media,
                    "mediatype": "video",
                    "caption": caption,
                }),
            },
        ],
        MessageKind::Document => vec![
            SendCandidate {
                label: "send-document",
                path: "/api/messages/send-document",
                body: json!({
                    "phone": destination,
                    "document": media,
                    "fileName": file_name(media),
                    "caption": caption,
                }),
            },
            SendCandidate {
                label: "send-document-url",
                path: "/api/messages/send-document",
                body: json!({
                    "phone": destination,
                    "url": media,
                    "fileName": file_name(media),
                }),
            },
            SendCandidate {
                label: "send-media",
                path: "/api/messages/send-media",
                body: json!({
                    "phone": destination,
                    "media": media,
                    "mediatype": "document",
                    "caption": caption,
                }),
            },
        ],
    }
}

/// Extract a provider message id from a successful response body
///
/// Probes a fixed set of locations; accepts strings and bare numbers
#[must_use]
pub fn extract_message_id(body: &Value) -> Option<String> {
    MESSAGE_ID_POINTERS.iter().find_map(|ptr| {
        match body.pointer(ptr)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    })
}

/// Last path segment of a media URL, for shapes that want a file name
fn file_name(media_url: &str) -> &str {
    media_url
        .split('?')
        .next()
        .unwrap_or_default()
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("file")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_candidates_in_order() {
        let candidates = build_candidates(MessageKind::Text, "5511999998888", Some("hi"), None);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].label, "send-text");
        assert_eq!(candidates[0].body["message"], "hi");
        assert_eq!(candidates[1].label, "send-message");
        assert_eq!(candidates[1].body["body"], "hi");
        for c in &candidates {
            assert_eq!(c.body["phone"], "5511999998888");
        }
    }

    #[test]
    fn image_cascade_ends_in_generic_media() {
        let candidates = build_candidates(
            MessageKind::Image,
            "5511999998888",
            Some("look"),
            Some("https://m.example.com/media/a/b/images/x.jpg"),
        );

        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[2].label, "send-media");
        assert_eq!(candidates[2].body["mediatype"], "image");
        assert_eq!(
            candidates[0].body["image"],
            "https://m.example.com/media/a/b/images/x.jpg"
        );
    }

    #[test]
    fn document_carries_file_name() {
        let candidates = build_candidates(
            MessageKind::Document,
            "551133334444",
            None,
            Some("https://m.example.com/media/a/b/docs/report.pdf?expires=1&sig=x"),
        );

        assert_eq!(candidates[0].body["fileName"], "report.pdf");
        assert_eq!(candidates[1].body["fileName"], "report.pdf");
    }

    #[test]
    fn audio_has_no_caption() {
        let candidates = build_candidates(
            MessageKind::Audio,
            "5511999998888",
            Some("ignored"),
            Some("https://m.example.com/a.ogg"),
        );

        assert!(candidates[0].body.get("caption").is_none());
    }

    #[test]
    fn message_id_probed_from_known_locations() {
        let cases = [
            (json!({ "messageId": "ABC123" }), Some("ABC123")),
            (json!({ "id": "X1" }), Some("X1")),
            (json!({ "key": { "id": "K9" } }), Some("K9")),
            (json!({ "message": { "id": "M2" } }), Some("M2")),
            (json!({ "data": { "messageId": "D7" } }), Some("D7")),
            (json!({ "ok": true }), None),
            (json!({ "messageId": "" }), None),
        ];

        for (body, expected) in cases {
            assert_eq!(extract_message_id(&body).as_deref(), expected, "{body}");
        }
    }

    #[test]
    fn numeric_message_id_is_stringified() {
        assert_eq!(extract_message_id(&json!({ "id": 42 })).as_deref(), Some("42"));
    }

    #[test]
    fn file_name_falls_back() {
        assert_eq!(file_name("https://x/a/b.pdf"), "b.pdf");
        assert_eq!(file_name("https://x/a/b.pdf?sig=1"), "b.pdf");
        assert_eq!(file_name(""), "file");
    }
}
