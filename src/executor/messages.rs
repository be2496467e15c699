use once_cell::sync::Lazy;

/// Message fragments are wrapped in U+001F (Unit Separator) boundaries,
/// a byte forbidden in prompts by convention, so extraction cannot be
/// confused by template content.
pub const BOUNDARY: char = '\u{1F}';

static OPENER_PREFIX: Lazy<String> = Lazy::new(|| format!("{BOUNDARY}MSG["));
static CLOSER: Lazy<String> = Lazy::new(|| format!("{BOUNDARY}/MSG{BOUNDARY}"));

/// A structured message recovered from an executed template's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMessage {
    pub role: String,
    pub content: String,
    pub cache: bool,
}

/// The opener emitted before a message body: `\x1FMSG[role;cache]\x1F`.
pub(crate) fn message_open(role: &str, cache: bool) -> String {
    format!("{BOUNDARY}MSG[{role};{cache}]{BOUNDARY}")
}

/// The closer emitted after a message body: `\x1F/MSG\x1F`.
pub(crate) fn message_close() -> String {
    CLOSER.clone()
}

/// Recover the sequence of message fragments from an executed output.
///
/// Text outside fragments is ignored; fragment content is trimmed. Malformed
/// fragments (opener without closer) are dropped rather than guessed at.
pub fn extract_messages(output: &str) -> Vec<ExtractedMessage> {
    let mut messages = vec![];
    let mut rest = output;

    while let Some(start) = rest.find(OPENER_PREFIX.as_str()) {
        let header_start = start + OPENER_PREFIX.len();
        let Some(header_len) = rest[header_start..].find(BOUNDARY) else {
            break;
        };

        let header = &rest[header_start..header_start + header_len];
        let Some(header) = header.strip_suffix(']') else {
            rest = &rest[header_start..];
            continue;
        };

        let (role, cache) = match header.rsplit_once(';') {
            Some((role, cache)) => (role, cache == "true"),
            None => (header, false),
        };

        let content_start = header_start + header_len + BOUNDARY.len_utf8();
        let Some(content_len) = rest[content_start..].find(CLOSER.as_str()) else {
            break;
        };

        messages.push(ExtractedMessage {
            role: role.to_owned(),
            content: rest[content_start..content_start + content_len]
                .trim()
                .to_owned(),
            cache,
        });

        rest = &rest[content_start + content_len + CLOSER.len()..];
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let output = format!(
            "{}You are helpful.{}{}Hi!{}",
            message_open("system", true),
            message_close(),
            message_open("user", false),
            message_close(),
        );

        assert_eq!(
            vec![
                ExtractedMessage {
                    role: "system".to_owned(),
                    content: "You are helpful.".to_owned(),
                    cache: true,
                },
                ExtractedMessage {
                    role: "user".to_owned(),
                    content: "Hi!".to_owned(),
                    cache: false,
                },
            ],
            extract_messages(&output)
        );
    }

    #[test]
    fn test_content_is_trimmed() {
        let output = format!("{}  spaced out \n{}", message_open("user", false), message_close());

        assert_eq!("spaced out", extract_messages(&output)[0].content);
    }

    #[test]
    fn test_text_outside_fragments_is_ignored() {
        let output = format!(
            "prelude{}body{}epilogue",
            message_open("assistant", false),
            message_close()
        );

        let messages = extract_messages(&output);
        assert_eq!(1, messages.len());
        assert_eq!("body", messages[0].content);
    }

    #[test]
    fn test_unclosed_fragment_is_dropped() {
        let output = format!("{}dangling", message_open("user", false));

        assert!(extract_messages(&output).is_empty());
    }

    #[test]
    fn test_no_fragments() {
        assert!(extract_messages("plain output").is_empty());
    }
}
