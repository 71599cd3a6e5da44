//! word2vec artifact readers.
//!
//! Both layouts start with an ASCII header `"<count> <dim>"`. The text layout
//! follows with one whitespace-separated `key v1 .. vdim` line per entry; the
//! binary layout follows with `key` bytes terminated by a single space, then
//! `dim` little-endian `f32` values, optionally followed by a newline.

use crate::config::ModelFormat;
use crate::error::ModelError;
use std::io::{BufRead, Read};

/// Upper bound on entries reserved up front from an untrusted header.
const MAX_PREALLOCATED_ENTRIES: usize = 1 << 16;

/// Largest vector width accepted from a header.
const MAX_DIMENSION: usize = 1 << 16;

/// Raw entries read from an artifact, in file order.
#[derive(Debug, Default)]
pub struct RawTable {
    pub dimension: usize,
    pub entries: Vec<(String, Vec<f32>)>,
}

/// Read an artifact in an already resolved format.
pub fn read_table<R: BufRead>(reader: R, format: ModelFormat) -> Result<RawTable, ModelError> {
    match format {
        ModelFormat::Text | ModelFormat::Auto => read_text(reader),
        ModelFormat::Binary => read_binary(reader),
    }
}

fn parse_header(line: &str) -> Result<(usize, usize), ModelError> {
    let mut parts = line.split_whitespace();
    let count = parts
        .next()
        .and_then(|p| p.parse::<usize>().ok())
        .ok_or_else(|| ModelError::malformed(0, format!("bad header {line:?}")))?;
    let dimension = parts
        .next()
        .and_then(|p| p.parse::<usize>().ok())
        .ok_or_else(|| ModelError::malformed(0, format!("bad header {line:?}")))?;
    if parts.next().is_some() {
        return Err(ModelError::malformed(0, format!("bad header {line:?}")));
    }
    if dimension == 0 {
        return Err(ModelError::malformed(0, "dimension must be positive"));
    }
    if dimension > MAX_DIMENSION {
        return Err(ModelError::malformed(
            0,
            format!("dimension {dimension} too large (max {MAX_DIMENSION})"),
        ));
    }
    Ok((count, dimension))
}

/// Read the word2vec text layout.
pub fn read_text<R: BufRead>(reader: R) -> Result<RawTable, ModelError> {
    let mut lines = reader.lines();
    let header = match lines.next() {
        Some(line) => line?,
        None => return Err(ModelError::Empty),
    };
    let (count, dimension) = parse_header(&header)?;

    let mut entries = Vec::with_capacity(count.min(MAX_PREALLOCATED_ENTRIES));
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = entries.len() + 1;
        let mut parts = line.split_whitespace();
        let key = parts
            .next()
            .ok_or_else(|| ModelError::malformed(entry, "missing key"))?
            .to_string();
        let vector = parts
            .map(|p| {
                p.parse::<f32>()
                    .map_err(|_| ModelError::malformed(entry, format!("non-numeric component {p:?}")))
                    .and_then(|v| finite(v, entry))
            })
            .collect::<Result<Vec<f32>, ModelError>>()?;
        if vector.len() != dimension {
            return Err(ModelError::malformed(
                entry,
                format!("expected {dimension} components, got {}", vector.len()),
            ));
        }
        entries.push((key, vector));
    }

    check_count(count, entries.len())?;
    Ok(RawTable { dimension, entries })
}

/// Read the word2vec binary layout.
pub fn read_binary<R: BufRead>(mut reader: R) -> Result<RawTable, ModelError> {
    let mut header = Vec::new();
    if reader.read_until(b'\n', &mut header)? == 0 {
        return Err(ModelError::Empty);
    }
    let header = std::str::from_utf8(&header)
        .map_err(|_| ModelError::malformed(0, "header is not ASCII"))?;
    let (count, dimension) = parse_header(header)?;

    let mut entries = Vec::with_capacity(count.min(MAX_PREALLOCATED_ENTRIES));
    let mut buf = vec![0u8; dimension * std::mem::size_of::<f32>()];
    for entry in 1..=count {
        let key = read_key(&mut reader, entry)?;
        reader.read_exact(&mut buf).map_err(|err| {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                ModelError::malformed(entry, "truncated vector")
            } else {
                ModelError::Io(err)
            }
        })?;
        let vector = buf
            .chunks_exact(4)
            .map(|c| finite(f32::from_le_bytes([c[0], c[1], c[2], c[3]]), entry))
            .collect::<Result<Vec<f32>, ModelError>>()?;
        entries.push((key, vector));
    }

    // Anything past the declared entries besides trailing newlines is a
    // count mismatch.
    loop {
        let rest = reader.fill_buf()?;
        if rest.is_empty() {
            break;
        }
        let newlines = rest.iter().take_while(|b| **b == b'\n').count();
        if newlines < rest.len() {
            return Err(ModelError::malformed(
                count.saturating_add(1),
                format!("header declares {count} entries, found more"),
            ));
        }
        reader.consume(newlines);
    }

    Ok(RawTable { dimension, entries })
}

fn finite(value: f32, entry: usize) -> Result<f32, ModelError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ModelError::malformed(entry, format!("non-finite component {value}")))
    }
}

/// Read a space-terminated key, skipping the newline some writers emit
/// between entries.
fn read_key<R: BufRead>(reader: &mut R, entry: usize) -> Result<String, ModelError> {
    let mut raw = Vec::new();
    reader.read_until(b' ', &mut raw)?;
    if raw.last() != Some(&b' ') {
        return Err(ModelError::malformed(entry, "truncated key"));
    }
    raw.pop();
    let start = raw.iter().position(|b| *b != b'\n').unwrap_or(raw.len());
    let key = String::from_utf8(raw[start..].to_vec())
        .map_err(|_| ModelError::malformed(entry, "key is not valid UTF-8"))?;
    if key.is_empty() {
        return Err(ModelError::malformed(entry, "empty key"));
    }
    Ok(key)
}

fn check_count(declared: usize, found: usize) -> Result<(), ModelError> {
    if declared != found {
        return Err(ModelError::malformed(
            found,
            format!("header declares {declared} entries, found {found}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn binary_fixture(entries: &[(&str, &[f32])], newline: bool) -> Vec<u8> {
        let dim = entries.first().map(|(_, v)| v.len()).unwrap_or(0);
        let mut out = format!("{} {}\n", entries.len(), dim).into_bytes();
        for (key, vector) in entries {
            out.extend_from_slice(key.as_bytes());
            out.push(b' ');
            for value in vector.iter() {
                out.extend_from_slice(&value.to_le_bytes());
            }
            if newline {
                out.push(b'\n');
            }
        }
        out
    }

    #[test]
    fn text_reads_entries_in_order() {
        let data = "3 2\n1 1.0 0.0\n2 0.0 1.0\n3 1.0 1.0\n";
        let table = read_text(Cursor::new(data)).unwrap();
        assert_eq!(table.dimension, 2);
        let keys: Vec<_> = table.entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["1", "2", "3"]);
        assert_eq!(table.entries[2].1, vec![1.0, 1.0]);
    }

    #[test]
    fn text_skips_blank_lines() {
        let data = "2 2\n1 1.0 0.0\n\n2 0.0 1.0\n\n";
        let table = read_text(Cursor::new(data)).unwrap();
        assert_eq!(table.entries.len(), 2);
    }

    #[test]
    fn text_rejects_wrong_component_count() {
        let data = "2 3\n1 1.0 0.0 0.0\n2 0.0 1.0\n";
        let err = read_text(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, ModelError::Malformed { entry: 2, .. }));
    }

    #[test]
    fn text_rejects_non_numeric_component() {
        let data = "1 2\n1 1.0 abc\n";
        let err = read_text(Cursor::new(data)).unwrap_err();
        assert!(err.to_string().contains("non-numeric"));
    }

    #[test]
    fn text_rejects_count_mismatch() {
        let data = "3 2\n1 1.0 0.0\n2 0.0 1.0\n";
        let err = read_text(Cursor::new(data)).unwrap_err();
        assert!(err.to_string().contains("declares 3 entries"));
    }

    #[test]
    fn header_must_have_two_numbers() {
        for header in ["", "abc", "3", "3 two", "3 2 1", "3 0"] {
            let data = format!("{header}\n");
            assert!(
                matches!(
                    read_text(Cursor::new(data)),
                    Err(ModelError::Malformed { entry: 0, .. })
                ),
                "header {header:?} should be rejected"
            );
        }
    }

    #[test]
    fn empty_input_is_empty_error() {
        assert!(matches!(read_text(Cursor::new("")), Err(ModelError::Empty)));
        assert!(matches!(
            read_binary(Cursor::new(Vec::<u8>::new())),
            Err(ModelError::Empty)
        ));
    }

    #[test]
    fn binary_reads_with_and_without_newlines() {
        let entries: [(&str, &[f32]); 2] = [("10", &[0.5, -1.0]), ("20", &[2.0, 0.25])];
        for newline in [true, false] {
            let data = binary_fixture(&entries, newline);
            let table = read_binary(Cursor::new(data)).unwrap();
            assert_eq!(table.dimension, 2);
            assert_eq!(table.entries[0], ("10".to_string(), vec![0.5, -1.0]));
            assert_eq!(table.entries[1], ("20".to_string(), vec![2.0, 0.25]));
        }
    }

    #[test]
    fn binary_truncated_vector_is_malformed() {
        let entries: [(&str, &[f32]); 1] = [("10", &[0.5, -1.0])];
        let mut data = binary_fixture(&entries, false);
        data.truncate(data.len() - 3);
        let err = read_binary(Cursor::new(data)).unwrap_err();
        assert!(err.to_string().contains("truncated vector"));
    }

    #[test]
    fn binary_missing_entries_is_malformed() {
        let mut data = b"2 1\n".to_vec();
        data.extend_from_slice(b"a ");
        data.extend_from_slice(&1.0f32.to_le_bytes());
        let err = read_binary(Cursor::new(data)).unwrap_err();
        assert!(err.to_string().contains("truncated key"));
    }

    #[test]
    fn oversized_header_counts_are_rejected_not_allocated() {
        let err = read_text(Cursor::new("18446744073709551615 2\n1 1.0 0.0\n")).unwrap_err();
        assert!(err.to_string().contains("declares 18446744073709551615 entries"));

        let err = read_binary(Cursor::new(b"1 4611686018427387905\n".to_vec())).unwrap_err();
        assert!(matches!(err, ModelError::Malformed { entry: 0, .. }));
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn text_rejects_non_finite_components() {
        for data in ["1 2\n1 NaN 0.0\n", "1 2\n2 inf 1.0\n", "1 2\n3 0.0 -inf\n"] {
            let err = read_text(Cursor::new(data)).unwrap_err();
            assert!(err.to_string().contains("non-finite"), "{data:?} loaded");
        }
    }

    #[test]
    fn binary_rejects_non_finite_components() {
        for bad in [f32::NAN, f32::INFINITY, f32::from_bits(0x7fc0_0001)] {
            let entries: [(&str, &[f32]); 2] = [("1", &[1.0, 0.0]), ("2", &[bad, 1.0])];
            let err = read_binary(Cursor::new(binary_fixture(&entries, true))).unwrap_err();
            assert!(matches!(err, ModelError::Malformed { entry: 2, .. }));
        }
    }

    #[test]
    fn binary_rejects_entries_beyond_declared_count() {
        let entries: [(&str, &[f32]); 2] = [("a", &[1.0]), ("b", &[2.0])];
        let mut data = binary_fixture(&entries, true);
        data[0] = b'1';
        let err = read_binary(Cursor::new(data)).unwrap_err();
        assert!(err.to_string().contains("declares 1 entries, found more"));
    }

    #[test]
    fn binary_allows_trailing_newlines() {
        let entries: [(&str, &[f32]); 1] = [("a", &[1.0])];
        let mut data = binary_fixture(&entries, true);
        data.extend_from_slice(b"\n\n");
        let table = read_binary(Cursor::new(data)).unwrap();
        assert_eq!(table.entries.len(), 1);
    }
}
