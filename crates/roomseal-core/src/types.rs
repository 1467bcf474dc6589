use serde::{Deserialize, Serialize};

/// Kind of payload carried by a message.
///
/// Only affects presentation: every kind gets the same cryptographic treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
    Audio,
    Video,
    File,
}

impl ContentType {
    /// Classify a media payload by MIME type. Never returns `Text`;
    /// anything unrecognized is a generic file.
    pub fn from_mime(mime: &str) -> Self {
        let top = mime
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match top.as_str() {
            "image" => ContentType::Image,
            "audio" => ContentType::Audio,
            "video" => ContentType::Video,
            _ => ContentType::File,
        }
    }

    pub fn is_media(self) -> bool {
        self != ContentType::Text
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Image => "image",
            ContentType::Audio => "audio",
            ContentType::Video => "video",
            ContentType::File => "file",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_mime() {
        assert_eq!(ContentType::from_mime("image/png"), ContentType::Image);
        assert_eq!(ContentType::from_mime("Audio/OGG"), ContentType::Audio);
        assert_eq!(ContentType::from_mime("video/mp4"), ContentType::Video);
        assert_eq!(ContentType::from_mime("application/pdf"), ContentType::File);
        assert_eq!(ContentType::from_mime("text/plain"), ContentType::File);
        assert_eq!(ContentType::from_mime(""), ContentType::File);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&ContentType::Video).unwrap();
        assert_eq!(json, "\"video\"");

        let parsed: ContentType = serde_json::from_str("\"text\"").unwrap();
        assert_eq!(parsed, ContentType::Text);
        assert!(serde_json::from_str::<ContentType>("\"sticker\"").is_err());
    }

    #[test]
    fn test_display_matches_wire_name() {
        for kind in [
            ContentType::Text,
            ContentType::Image,
            ContentType::Audio,
            ContentType::Video,
            ContentType::File,
        ] {
            let wire = serde_json::to_string(&kind).unwrap();
            assert_eq!(wire.trim_matches('"'), kind.to_string());
        }
        assert!(!ContentType::Text.is_media());
        assert!(ContentType::File.is_media());
    }
}
