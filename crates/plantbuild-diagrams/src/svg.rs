//! SVG pretty-printing.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

const INDENT_SIZE: usize = 2;

/// Why an SVG document could not be pretty-printed.
#[derive(Debug, thiserror::Error)]
pub enum PrettifyError {
    #[error("SVG is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("malformed SVG: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("failed to write SVG: {0}")]
    Write(#[from] std::io::Error),

    #[error("pretty-printed SVG is not valid UTF-8: {0}")]
    Output(#[from] std::string::FromUtf8Error),
}

/// Re-indent an SVG document, two spaces per nesting level.
///
/// Whitespace-only text between elements is dropped before re-indenting.
/// Text with visible content is written exactly as read, surrounding
/// spaces included.
///
/// # Errors
///
/// Returns [`PrettifyError::Xml`] if the input is not well-formed XML.
pub fn prettify(svg: &str) -> Result<String, PrettifyError> {
    let mut reader = Reader::from_str(svg);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT_SIZE);

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Text(text) if text.iter().all(u8::is_ascii_whitespace) => {}
            event => writer.write_event(event)?,
        }
    }

    Ok(String::from_utf8(writer.into_inner())?)
}

/// Pretty-print rendered SVG bytes, returning them untouched on failure.
#[must_use]
pub fn prettify_or_raw(content: Vec<u8>) -> Vec<u8> {
    let result = std::str::from_utf8(&content)
        .map_err(PrettifyError::from)
        .and_then(prettify);
    match result {
        Ok(pretty) => pretty.into_bytes(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to pretty-print SVG, keeping raw output");
            content
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_prettify_nests_elements() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><g><rect width="10"/><text x="1">Alice</text></g></svg>"#;

        let pretty = prettify(svg).unwrap();

        assert_eq!(
            pretty,
            r#"<svg xmlns="http://www.w3.org/2000/svg">
  <g>
    <rect width="10"/>
    <text x="1">Alice</text>
  </g>
</svg>"#
        );
    }

    #[test]
    fn test_prettify_is_stable() {
        let svg = "<svg><g><rect/></g></svg>";
        let once = prettify(svg).unwrap();
        assert_eq!(prettify(&once).unwrap(), once);
    }

    #[test]
    fn test_prettify_rejects_mismatched_tags() {
        assert!(matches!(
            prettify("<svg><g></svg>"),
            Err(PrettifyError::Xml(_))
        ));
    }

    #[test]
    fn test_prettify_keeps_text_padding() {
        let svg = "<svg>\n<g>\n  <text xml:space=\"preserve\">  a b  </text>\n</g>\n</svg>";

        let pretty = prettify(svg).unwrap();

        assert_eq!(
            pretty,
            "<svg>\n  <g>\n    <text xml:space=\"preserve\">  a b  </text>\n  </g>\n</svg>"
        );
        assert_eq!(prettify(&pretty).unwrap(), pretty);
    }

    #[test]
    fn test_prettify_or_raw_falls_back() {
        let broken = b"<svg><g></svg>".to_vec();
        assert_eq!(prettify_or_raw(broken.clone()), broken);

        let binary = vec![0x89, b'P', b'N', b'G', 0xff];
        assert_eq!(prettify_or_raw(binary.clone()), binary);
    }

    #[test]
    fn test_prettify_or_raw_formats() {
        let pretty = prettify_or_raw(b"<svg><rect/></svg>".to_vec());
        assert_eq!(String::from_utf8(pretty).unwrap(), "<svg>\n  <rect/>\n</svg>");
    }
}
