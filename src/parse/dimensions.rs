use log::warn;
use serde::{Deserialize, Serialize};

/// `identify -format` string producing `format width height depth quality`.
///
/// [`parse_identify`] depends on this exact token order.
pub const IDENTIFY_FORMAT: &str = "%m %w %h %z %Q";

/// Basic properties reported by `identify`.
///
/// Numeric fields are `None` when identify printed something that is not a
/// number for them; the other fields are still usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub format: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub depth: Option<u32>,
    /// Encoding quality as a fraction, absent when identify reports `0` (unknown).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<f64>,
}

impl ImageMetadata {
    /// Width and height, when both were parsed.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.width?, self.height?))
    }
}

/// Parses one line of `identify -format "%m %w %h %z %Q"` output.
///
/// Tokens are taken strictly by position. Returns `None` when fewer than five
/// tokens are present.
pub fn parse_identify(output: &str) -> Option<ImageMetadata> {
    let tokens: Vec<&str> = output.trim().split(' ').collect();
    if tokens.len() < 5 {
        return None;
    }

    let quality = match tokens[4] {
        // identify prints 0 when the quality is unknown, not when it is zero.
        "0" => None,
        token => numeric_field("quality", token).map(|q| f64::from(q) / 100.0),
    };

    Some(ImageMetadata {
        format: tokens[0].to_string(),
        width: numeric_field("width", tokens[1]),
        height: numeric_field("height", tokens[2]),
        depth: numeric_field("depth", tokens[3]),
        quality,
    })
}

fn numeric_field(name: &str, token: &str) -> Option<u32> {
    match token.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("identify reported non-numeric {}: {:?}", name, token);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_without_quality() {
        let meta = parse_identify("JPEG 800 600 8 0").unwrap();
        assert_eq!(meta.format, "JPEG");
        assert_eq!(meta.width, Some(800));
        assert_eq!(meta.height, Some(600));
        assert_eq!(meta.depth, Some(8));
        assert_eq!(meta.quality, None);
        assert_eq!(meta.dimensions(), Some((800, 600)));
    }

    #[test]
    fn test_parse_with_quality() {
        let meta = parse_identify("PNG 200 100 8 90\n").unwrap();
        assert_eq!(meta.format, "PNG");
        assert_eq!(meta.quality, Some(0.9));
    }

    #[test]
    fn test_non_numeric_field_only_affects_that_field() {
        let meta = parse_identify("TIFF abc 100 16 92").unwrap();
        assert_eq!(meta.width, None);
        assert_eq!(meta.height, Some(100));
        assert_eq!(meta.depth, Some(16));
        assert_eq!(meta.quality, Some(0.92));
        assert_eq!(meta.dimensions(), None);
    }

    #[test]
    fn test_too_few_tokens() {
        assert_eq!(parse_identify("JPEG 800 600"), None);
        assert_eq!(parse_identify(""), None);
    }

    #[test]
    fn test_positional_split_is_strict() {
        // A doubled space shifts every later token.
        let meta = parse_identify("GIF  10 10 8").unwrap();
        assert_eq!(meta.width, None);
        assert_eq!(meta.height, Some(10));
    }

    #[test]
    fn test_quality_omitted_from_json_when_unknown() {
        let meta = parse_identify("JPEG 800 600 8 0").unwrap();
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"format": "JPEG", "width": 800, "height": 600, "depth": 8})
        );
    }
}
