//! CSV codec for inbound key batches and outbound recommendations.

use crate::PipelineError;
use model::Neighbor;

/// Media type accepted by [`parse_batch`] and produced by [`write_recommendations`].
pub const CSV_MEDIA_TYPE: &str = "text/csv";

/// True when a `Content-Type` value names CSV. Parameters such as
/// `charset` are ignored and the comparison is case-insensitive.
pub fn is_csv(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .map(|essence| essence.trim().eq_ignore_ascii_case(CSV_MEDIA_TYPE))
        .unwrap_or(false)
}

/// Parse a header-less CSV body into its first-column keys, in row order.
pub fn parse_batch(body: &[u8]) -> Result<Vec<String>, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(body);

    let mut keys = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| PipelineError::Parse(err.to_string()))?;
        match record.get(0) {
            Some(key) => keys.push(key.to_string()),
            None => return Err(PipelineError::Parse("row without a key column".to_string())),
        }
    }

    if keys.is_empty() {
        return Err(PipelineError::Parse("batch contains no rows".to_string()));
    }
    Ok(keys)
}

/// Strip the zero padding from an item identifier. An all-zero key becomes
/// the empty string, which no table contains.
pub fn normalize_key(raw: &str) -> &str {
    raw.trim_start_matches('0')
}

/// Serialize recommendations as header-less CSV: one key per line, or
/// `key,score` when `include_scores` is set.
pub fn write_recommendations(
    items: &[Neighbor],
    include_scores: bool,
) -> Result<String, PipelineError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(false)
        .from_writer(Vec::new());

    for item in items {
        let written = if include_scores {
            writer.write_record([item.key.as_str(), item.score.to_string().as_str()])
        } else {
            writer.write_record([item.key.as_str()])
        };
        written.map_err(|err| PipelineError::Serialize(err.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| PipelineError::Serialize(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| PipelineError::Serialize(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(key: &str, score: f32) -> Neighbor {
        Neighbor {
            key: key.to_string(),
            score,
        }
    }

    #[test]
    fn csv_media_type_detection() {
        assert!(is_csv(Some("text/csv")));
        assert!(is_csv(Some("text/csv; charset=utf-8")));
        assert!(is_csv(Some("Text/CSV")));
        assert!(!is_csv(Some("application/json")));
        assert!(!is_csv(Some("text/csvx")));
        assert!(!is_csv(Some("")));
        assert!(!is_csv(None));
    }

    #[test]
    fn parse_takes_first_column_in_order() {
        let keys = parse_batch(b"001,a\n002,b\n0003,c\n").unwrap();
        assert_eq!(keys, vec!["001", "002", "0003"]);
    }

    #[test]
    fn parse_has_no_header_row() {
        let keys = parse_batch(b"movie_id\n42\n").unwrap();
        assert_eq!(keys, vec!["movie_id", "42"]);
    }

    #[test]
    fn parse_handles_quotes_and_crlf() {
        let keys = parse_batch(b"\"00,7\"\r\n12\r\n").unwrap();
        assert_eq!(keys, vec!["00,7", "12"]);
    }

    #[test]
    fn parse_skips_blank_lines() {
        let keys = parse_batch(b"1\n\n2\n").unwrap();
        assert_eq!(keys, vec!["1", "2"]);
    }

    #[test]
    fn parse_rejects_empty_body() {
        assert!(matches!(parse_batch(b""), Err(PipelineError::Parse(_))));
        assert!(matches!(parse_batch(b"\n\n"), Err(PipelineError::Parse(_))));
    }

    #[test]
    fn parse_rejects_ragged_rows() {
        assert!(matches!(
            parse_batch(b"1,a\n2\n"),
            Err(PipelineError::Parse(_))
        ));
    }

    #[test]
    fn parse_rejects_invalid_utf8() {
        assert!(matches!(
            parse_batch(b"1\n\xff\xfe\n"),
            Err(PipelineError::Parse(_))
        ));
    }

    #[test]
    fn normalize_strips_leading_zeros_only() {
        assert_eq!(normalize_key("00012"), "12");
        assert_eq!(normalize_key("1200"), "1200");
        assert_eq!(normalize_key("0a0"), "a0");
        assert_eq!(normalize_key("000"), "");
        assert_eq!(normalize_key(""), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["00012", "12", "000", "0x0", "abc", "0"] {
            let once = normalize_key(raw);
            assert_eq!(normalize_key(once), once);
        }
    }

    #[test]
    fn write_keys_only() {
        let out = write_recommendations(&[hit("7", 0.9), hit("8", 0.5)], false).unwrap();
        assert_eq!(out, "7\n8\n");
    }

    #[test]
    fn write_with_scores() {
        let out = write_recommendations(&[hit("7", 0.5)], true).unwrap();
        assert_eq!(out, "7,0.5\n");
    }

    #[test]
    fn write_quotes_awkward_keys() {
        let out = write_recommendations(&[hit("a,b", 1.0)], false).unwrap();
        assert_eq!(out, "\"a,b\"\n");
    }

    #[test]
    fn write_empty_is_empty() {
        assert_eq!(write_recommendations(&[], false).unwrap(), "");
    }
}
