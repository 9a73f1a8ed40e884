use std::path::Path;

/// How a reply is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Text,
    Image,
    Voice,
    File,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Text => write!(f, "text"),
            MediaKind::Image => write!(f, "image"),
            MediaKind::Voice => write!(f, "voice"),
            MediaKind::File => write!(f, "file"),
        }
    }
}

/// Classify a reply value by its shape.
///
/// Existing local paths and `http`-prefixed strings are media, typed by suffix;
/// everything else is text. A prose reply that starts with `http` is therefore
/// sent as a file link, so handlers must not start text replies with a URL.
pub fn classify(content: &str) -> MediaKind {
    if !(content.starts_with("http") || Path::new(content).is_file()) {
        return MediaKind::Text;
    }

    let lower = content.to_lowercase();
    if [".jpg", ".jpeg", ".png"].iter().any(|ext| lower.ends_with(ext)) {
        MediaKind::Image
    } else if lower.ends_with(".amr") {
        MediaKind::Voice
    } else {
        MediaKind::File
    }
}
