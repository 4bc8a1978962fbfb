//! Image records handed to the downstream renderer.

use serde::{Deserialize, Serialize};

/// A literal image string together with its visibility.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckedImage {
    /// Image string exactly as it appears in the source document
    pub image: String,
    /// Whether pulling the image requires credentials
    pub is_private: bool,
}

impl CheckedImage {
    pub fn new(image: impl Into<String>, is_private: bool) -> Self {
        Self {
            image: image.into(),
            is_private,
        }
    }
}

/// Instruction to rewrite one literal image string to a mirror location.
///
/// `name` is matched against manifest text by exact substring, so two
/// spellings of the same image always get two directives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelocationDirective {
    /// Original literal
    pub name: String,
    /// Destination repository (`endpoint/namespace/image`)
    pub new_name: String,
    /// Destination tag
    pub new_tag: String,
    /// Digest carried through unchanged, if the literal pinned one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl RelocationDirective {
    /// Full destination reference (`new_name:new_tag`, plus `@digest` when pinned).
    pub fn destination(&self) -> String {
        match &self.digest {
            Some(digest) => format!("{}:{}@{}", self.new_name, self.new_tag, digest),
            None => format!("{}:{}", self.new_name, self.new_tag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_image_serializes_camel_case() {
        let image = CheckedImage::new("nginx:1", false);
        let json = serde_json::to_string(&image).unwrap();
        assert_eq!(json, r#"{"image":"nginx:1","isPrivate":false}"#);
    }

    #[test]
    fn test_directive_destination() {
        let directive = RelocationDirective {
            name: "busybox".to_string(),
            new_name: "ttl.sh/testing-ns/busybox".to_string(),
            new_tag: "latest".to_string(),
            digest: None,
        };
        assert_eq!(directive.destination(), "ttl.sh/testing-ns/busybox:latest");
    }

    #[test]
    fn test_directive_destination_with_digest() {
        let directive = RelocationDirective {
            name: "busybox@sha256:abc".to_string(),
            new_name: "ttl.sh/testing-ns/busybox".to_string(),
            new_tag: "latest".to_string(),
            digest: Some("sha256:abc".to_string()),
        };
        assert_eq!(
            directive.destination(),
            "ttl.sh/testing-ns/busybox:latest@sha256:abc"
        );
        let json = serde_json::to_value(&directive).unwrap();
        assert_eq!(json["newName"], "ttl.sh/testing-ns/busybox");
        assert_eq!(json["digest"], "sha256:abc");
    }
}
