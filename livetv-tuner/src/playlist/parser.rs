//! M3U playlist parser.
//!
//! A channel is an `#EXTINF` directive line followed by the first
//! non-comment line, which holds the playback path. Real-world playlists
//! are often sloppy, so the parser is lenient: blank lines, comments, a
//! leading BOM and CRLF line endings are tolerated, and a directive with
//! no path is dropped with a warning.

use std::borrow::Cow;
use std::collections::BTreeMap;

use log::{debug, warn};

use livetv_model::{ChannelDescriptor, ChannelType, TunerError};

use crate::playlist::channel_id;

const EXTINF_PREFIX: &str = "#EXTINF:";
const EXTGRP_PREFIX: &str = "#EXTGRP:";
const DIRECTIVE_PREFIX: &str = "#EXT";

/// Parsed contents of one `#EXTINF` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtInf {
    /// Attributes with lowercased keys. The first occurrence of a key wins.
    pub attributes: BTreeMap<String, String>,
    /// Text after the last comma outside quotes, trimmed.
    pub title: Option<String>,
}

impl ExtInf {
    /// Parse the part of an `#EXTINF` line after the colon.
    pub fn parse(directive: &str) -> Self {
        let (header, title) = split_title(directive);
        let title = title.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string);

        Self {
            attributes: parse_attributes(header),
            title,
        }
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Directive waiting for its path line.
struct PendingEntry {
    line_no: usize,
    extinf: ExtInf,
}

/// Parse raw playlist bytes.
///
/// Bytes that are not valid UTF-8 are decoded as Windows-1252, the usual
/// encoding of legacy playlists.
pub fn parse_bytes(
    bytes: &[u8],
    id_prefix: &str,
    tuner_host_id: &str,
) -> Result<Vec<ChannelDescriptor>, TunerError> {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(e) => {
            warn!(
                "[M3uParser] Playlist is not UTF-8 ({}), decoding as Windows-1252",
                e
            );
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            text
        }
    };
    parse_playlist(&text, id_prefix, tuner_host_id)
}

/// Parse a playlist document into channels, in document order.
///
/// An empty document yields no channels. A document with content but no
/// `#EXT` directive at all is not an M3U playlist and is rejected.
pub fn parse_playlist(
    text: &str,
    id_prefix: &str,
    tuner_host_id: &str,
) -> Result<Vec<ChannelDescriptor>, TunerError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut channels = Vec::new();
    let mut pending: Option<PendingEntry> = None;
    let mut group_hint: Option<String> = None;
    let mut saw_content = false;
    let mut saw_directive = false;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        saw_content = true;

        if let Some(directive) = strip_prefix_ignore_case(line, EXTINF_PREFIX) {
            saw_directive = true;
            let entry = PendingEntry {
                line_no,
                extinf: ExtInf::parse(directive),
            };
            if let Some(dropped) = pending.replace(entry) {
                warn!(
                    "[M3uParser] Line {}: directive has no playback path, dropping",
                    dropped.line_no
                );
            }
            continue;
        }

        if let Some(group) = strip_prefix_ignore_case(line, EXTGRP_PREFIX) {
            saw_directive = true;
            let group = group.trim();
            group_hint = (!group.is_empty()).then(|| group.to_string());
            continue;
        }

        if line.starts_with('#') {
            if strip_prefix_ignore_case(line, DIRECTIVE_PREFIX).is_some() {
                saw_directive = true;
            }
            continue;
        }

        match pending.take() {
            Some(entry) => {
                let channel = build_channel(
                    entry.extinf,
                    group_hint.take(),
                    line,
                    id_prefix,
                    tuner_host_id,
                );
                debug!("[M3uParser] Parsed channel: {} ({})", channel.name, channel.id);
                channels.push(channel);
            }
            None => {
                debug!("[M3uParser] Line {}: path without directive, skipping", line_no);
                group_hint = None;
            }
        }
    }

    if let Some(dropped) = pending {
        warn!(
            "[M3uParser] Line {}: directive at end of playlist has no playback path, dropping",
            dropped.line_no
        );
    }

    if saw_content && !saw_directive {
        return Err(TunerError::CatalogueFormat(
            "document contains no M3U directives".to_string(),
        ));
    }

    Ok(channels)
}

fn build_channel(
    extinf: ExtInf,
    group_hint: Option<String>,
    path: &str,
    id_prefix: &str,
    tuner_host_id: &str,
) -> ChannelDescriptor {
    let (title_number, title_name) = match extinf.title.as_deref() {
        Some(title) => split_number_prefix(title),
        None => (None, None),
    };

    let name = extinf
        .attribute("tvg-name")
        .map(|name| htmlescape::decode_html(name).unwrap_or_else(|_| name.to_string()))
        .or(title_name)
        .unwrap_or_else(|| path.to_string());

    let number = extinf
        .attribute("tvg-chno")
        .filter(|n| is_channel_number(n))
        .or_else(|| extinf.attribute("channel-number").filter(|n| is_channel_number(n)))
        .map(str::to_string)
        .or(title_number)
        .or_else(|| {
            extinf
                .attribute("tvg-id")
                .filter(|n| is_channel_number(n))
                .map(str::to_string)
        })
        .or_else(|| {
            extinf
                .attribute("channel-id")
                .filter(|n| is_channel_number(n))
                .map(str::to_string)
        })
        .or_else(|| number_from_path(path));

    let group = extinf
        .attribute("group-title")
        .map(str::to_string)
        .or(group_hint);

    let image_url = extinf
        .attribute("tvg-logo")
        .or_else(|| extinf.attribute("logo"))
        .map(str::to_string);

    let tuner_channel_id = extinf
        .attribute("tvg-id")
        .or_else(|| extinf.attribute("channel-id"))
        .map(str::to_string);

    let channel_type = match extinf.attribute("radio") {
        Some(radio) if radio.eq_ignore_ascii_case("true") => ChannelType::Radio,
        _ => ChannelType::Tv,
    };

    ChannelDescriptor {
        id: channel_id::channel_id(id_prefix, path),
        tuner_host_id: tuner_host_id.to_string(),
        name,
        number,
        group,
        image_url,
        tuner_channel_id,
        path: path.to_string(),
        channel_type,
        attributes: extinf.attributes,
    }
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .map(|_| &line[prefix.len()..])
}

/// Split into the attribute header (before the first comma outside quotes)
/// and the title (after the last comma outside quotes).
fn split_title(directive: &str) -> (&str, Option<&str>) {
    let mut in_quotes = false;
    let mut first = None;
    let mut last = None;
    for (i, c) in directive.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                first.get_or_insert(i);
                last = Some(i);
            }
            _ => {}
        }
    }

    match (first, last) {
        (Some(first), Some(last)) => (&directive[..first], Some(&directive[last + 1..])),
        _ => (directive, None),
    }
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Scan `key="value"` and `key=value` pairs. Tokens without `=`, such as
/// the leading duration, are skipped.
fn parse_attributes(header: &str) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();
    let mut rest = header.trim_start();

    while !rest.is_empty() {
        let key_len = rest.find(|c: char| !is_key_char(c)).unwrap_or(rest.len());
        let key = &rest[..key_len];
        let after_key = &rest[key_len..];

        let Some(value_part) = after_key.strip_prefix('=').filter(|_| !key.is_empty()) else {
            // Not an attribute; skip to the next whitespace-separated token.
            let skip = rest.find(char::is_whitespace).unwrap_or(rest.len());
            rest = rest[skip..].trim_start();
            continue;
        };

        let (value, remainder) = match value_part.strip_prefix('"') {
            Some(quoted) => match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            },
            None => {
                let end = value_part.find(char::is_whitespace).unwrap_or(value_part.len());
                (&value_part[..end], &value_part[end..])
            }
        };

        attributes
            .entry(key.to_ascii_lowercase())
            .or_insert_with(|| value.to_string());
        rest = remainder.trim_start();
    }

    attributes
}

/// A usable channel number: numeric, and neither `0` nor `-1`.
fn is_channel_number(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || !value.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    if !value.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-') {
        return false;
    }
    matches!(value.parse::<f64>(), Ok(n) if n > 0.0)
}

/// Split a leading channel number from a title such as `84. VOX` or
/// `84.0 - VOX`.
fn split_number_prefix(title: &str) -> (Option<String>, Option<String>) {
    let title = title.trim();
    if let Some(space) = title.find(' ').filter(|&i| i > 0) {
        let number = title[..space].trim_matches(|c| c == ' ' || c == '.');
        if is_channel_number(number) {
            let name = title[space + 1..]
                .trim_start_matches(|c: char| c == '-' || c.is_whitespace())
                .trim();
            let name = (!name.is_empty()).then(|| name.to_string());
            return (Some(number.to_string()), name);
        }
    }
    (None, Some(title.to_string()))
}

/// Numeric file stem of the path, e.g. `http://host/live/1234.ts` -> `1234`.
fn number_from_path(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let file = path.rsplit('/').next()?;
    let stem = file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file);
    is_channel_number(stem).then(|| stem.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "m3u_test_";

    fn parse(text: &str) -> Vec<ChannelDescriptor> {
        parse_playlist(text, PREFIX, "source").unwrap()
    }

    #[test]
    fn test_basic_playlist() {
        let channels = parse(
            "#EXTM3U\n\
             #EXTINF:-1 tvg-id=\"cnn.us\" tvg-chno=\"7\" tvg-logo=\"http://img/cnn.png\" group-title=\"News\",CNN\n\
             http://example.com/cnn.ts\n\
             #EXTINF:-1,BBC One\n\
             http://example.com/bbc1.ts\n",
        );

        assert_eq!(channels.len(), 2);
        let cnn = &channels[0];
        assert_eq!(cnn.name, "CNN");
        assert_eq!(cnn.number.as_deref(), Some("7"));
        assert_eq!(cnn.group.as_deref(), Some("News"));
        assert_eq!(cnn.image_url.as_deref(), Some("http://img/cnn.png"));
        assert_eq!(cnn.tuner_channel_id.as_deref(), Some("cnn.us"));
        assert_eq!(cnn.path, "http://example.com/cnn.ts");
        assert_eq!(cnn.tuner_host_id, "source");
        assert_eq!(cnn.attributes.get("tvg-id").map(String::as_str), Some("cnn.us"));
        assert!(cnn.id.starts_with(PREFIX));

        assert_eq!(channels[1].name, "BBC One");
        assert_eq!(channels[1].number, None);
        assert_eq!(channels[1].group, None);
    }

    #[test]
    fn test_unpaired_directive_is_dropped() {
        let channels = parse(
            "#EXTM3U\n\
             #EXTINF:-1,Orphan\n\
             #EXTINF:-1,Valid\n\
             http://example.com/valid.ts\n\
             #EXTINF:-1,Trailing\n",
        );

        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "Valid");
    }

    #[test]
    fn test_empty_document() {
        assert!(parse("").is_empty());
        assert!(parse("\r\n  \n").is_empty());
        assert!(parse("#EXTM3U\n").is_empty());
    }

    #[test]
    fn test_bom_crlf_and_comments() {
        let channels = parse(
            "\u{feff}#EXTM3U\r\n\
             \r\n\
             # a comment\r\n\
             #EXTINF:-1,One\r\n\
             #EXTVLCOPT:network-caching=1000\r\n\
             \r\n\
             http://example.com/one.ts\r\n",
        );

        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "One");
        assert_eq!(channels[0].path, "http://example.com/one.ts");
    }

    #[test]
    fn test_not_a_playlist() {
        let result = parse_playlist("<html><body>Forbidden</body></html>", PREFIX, "source");
        assert!(matches!(result, Err(TunerError::CatalogueFormat(_))));
    }

    #[test]
    fn test_latin1_playlist() {
        let bytes = b"#EXTM3U\n#EXTINF:-1,News\nhttp://x/news.ts\n#EXTINF:-1,Caf\xe9 TV\nhttp://x/cafe.ts\n";
        let channels = parse_bytes(bytes, PREFIX, "source").unwrap();

        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].name, "News");
        assert_eq!(channels[1].name, "Caf\u{e9} TV");
    }

    #[test]
    fn test_binary_body_is_not_a_playlist() {
        let result = parse_bytes(&[0x89, 0x50, 0x4e, 0x47, 0xff, 0xfe, 0x00], PREFIX, "source");
        assert!(matches!(result, Err(TunerError::CatalogueFormat(_))));
    }

    #[test]
    fn test_ids_are_stable_across_parses() {
        let text = "#EXTINF:-1,A\nhttp://x/a.ts\n#EXTINF:-1,B\nhttp://x/b.ts\n";
        let first: Vec<_> = parse(text).into_iter().map(|c| c.id).collect();
        let second: Vec<_> = parse(text).into_iter().map(|c| c.id).collect();
        assert_eq!(first, second);
        assert_ne!(first[0], first[1]);

        let reordered = "#EXTINF:-1,B\nhttp://x/b.ts\n#EXTINF:-1,A\nhttp://x/a.ts\n";
        let third: Vec<_> = parse(reordered).into_iter().map(|c| c.id).collect();
        assert_eq!(third, vec![first[1].clone(), first[0].clone()]);
    }

    #[test]
    fn test_comma_inside_quoted_attribute() {
        let channels = parse(
            "#EXTINF:-1 tvg-name=\"News, Weather &amp; Sport\" group-title=\"A,B\",Fallback\n\
             http://x/nws.ts\n",
        );

        assert_eq!(channels[0].name, "News, Weather & Sport");
        assert_eq!(channels[0].group.as_deref(), Some("A,B"));
    }

    #[test]
    fn test_number_prefix_in_title() {
        let channels = parse(
            "#EXTINF:0,84. VOX Schweiz\nhttp://x/a\n\
             #EXTINF:0,85.0 - SRF 1\nhttp://x/b\n",
        );

        assert_eq!(channels[0].number.as_deref(), Some("84"));
        assert_eq!(channels[0].name, "VOX Schweiz");
        assert_eq!(channels[1].number.as_deref(), Some("85.0"));
        assert_eq!(channels[1].name, "SRF 1");
    }

    #[test]
    fn test_number_fallbacks() {
        let channels = parse(
            "#EXTINF:-1 tvg-chno=\"0\" tvg-id=\"101\",Sports\nhttp://x/sports\n\
             #EXTINF:-1 tvg-id=\"movies.de\",Movies\nhttp://x/live/2045.ts?token=1\n\
             #EXTINF:-1 tvg-id=\"-1\",Misc\nhttp://x/live/misc.ts\n",
        );

        assert_eq!(channels[0].number.as_deref(), Some("101"));
        assert_eq!(channels[1].number.as_deref(), Some("2045"));
        assert_eq!(channels[2].number, None);
    }

    #[test]
    fn test_group_directive_and_radio() {
        let channels = parse(
            "#EXTINF:-1 radio=\"true\",Jazz FM\n\
             #EXTGRP:Radio\n\
             http://x/jazz.mp3\n\
             #EXTINF:-1,Plain\n\
             http://x/plain.ts\n",
        );

        assert_eq!(channels[0].group.as_deref(), Some("Radio"));
        assert_eq!(channels[0].channel_type, ChannelType::Radio);
        assert_eq!(channels[1].group, None);
        assert_eq!(channels[1].channel_type, ChannelType::Tv);
    }

    #[test]
    fn test_name_falls_back_to_path() {
        let channels = parse("#EXTINF:-1\nhttp://x/unnamed.ts\n");
        assert_eq!(channels[0].name, "http://x/unnamed.ts");
    }

    #[test]
    fn test_attribute_scanner() {
        let extinf = ExtInf::parse("-1 TVG-ID=\"a\" tvg-id=\"b\" bare=value junk logo=\"unterminated");
        assert_eq!(extinf.attributes.get("tvg-id").map(String::as_str), Some("a"));
        assert_eq!(extinf.attributes.get("bare").map(String::as_str), Some("value"));
        assert_eq!(extinf.attributes.get("logo").map(String::as_str), Some("unterminated"));
        assert_eq!(extinf.title, None);
    }

    #[test]
    fn test_tvg_name_entities() {
        let channels = parse(
            "#EXTINF:-1 tvg-name=\"Caf&eacute; TV\",x\nhttp://x/a.ts\n\
             #EXTINF:-1 tvg-name=\"&#228;&#x00FC;\",y\nhttp://x/b.ts\n",
        );

        assert_eq!(channels[0].name, "Caf\u{e9} TV");
        assert_eq!(channels[1].name, "\u{e4}\u{fc}");
    }

    #[test]
    fn test_title_after_last_comma() {
        let channels = parse(
            "#EXTINF:-1 group-title=\"A,B\",News, Weather\nhttp://x/a.ts\n\
             #EXTINF:-1,12. Sport, Live\nhttp://x/b.ts\n",
        );

        assert_eq!(channels[0].name, "Weather");
        assert_eq!(channels[0].group.as_deref(), Some("A,B"));
        assert_eq!(channels[1].name, "Live");
    }
}
