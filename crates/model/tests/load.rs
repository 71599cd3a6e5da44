use model::{AnnConfig, EmbeddingModel, KeyedVectors, ModelConfig, ModelError, ModelFormat};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_text(dir: &Path, name: &str, contents: &str) -> ModelConfig {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    ModelConfig::for_path(path)
}

fn write_binary(dir: &Path, name: &str, entries: &[(&str, [f32; 2])]) -> ModelConfig {
    let mut out = format!("{} 2\n", entries.len()).into_bytes();
    for (key, vector) in entries {
        out.extend_from_slice(key.as_bytes());
        out.push(b' ');
        for value in vector {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.push(b'\n');
    }
    let path = dir.join(name);
    fs::write(&path, out).unwrap();
    ModelConfig::for_path(path)
}

#[test]
fn loads_text_model_by_extension() {
    let dir = TempDir::new().unwrap();
    let cfg = write_text(dir.path(), "items.txt", "3 2\n1 1 0\n2 0 1\n3 1 1\n");

    let table = KeyedVectors::load(&cfg).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.dimension(), 2);
    assert!(table.vector_of("2").is_ok());
}

#[test]
fn loads_binary_model_by_default() {
    let dir = TempDir::new().unwrap();
    let cfg = write_binary(
        dir.path(),
        "word2vec_2.model",
        &[("1", [3.0, 4.0]), ("2", [0.0, 2.0])],
    );

    let table = KeyedVectors::load(&cfg).unwrap();
    assert_eq!(table.len(), 2);
    // Normalized at load: [3,4] / 5.
    let v = table.vector_of("1").unwrap();
    assert!((v[0] - 0.6).abs() < 1e-6);
    assert!((v[1] - 0.8).abs() < 1e-6);
}

#[test]
fn explicit_format_overrides_extension() {
    let dir = TempDir::new().unwrap();
    let cfg = write_text(dir.path(), "items.bin", "1 2\nabc 1 0\n").with_format(ModelFormat::Text);
    let table = KeyedVectors::load(&cfg).unwrap();
    assert!(table.vector_of("abc").is_ok());
}

#[test]
fn raw_vectors_kept_when_normalize_disabled() {
    let dir = TempDir::new().unwrap();
    let cfg = write_text(dir.path(), "items.vec", "1 2\n7 3 4\n").with_normalize(false);
    let table = KeyedVectors::load(&cfg).unwrap();
    assert_eq!(table.vector_of("7").unwrap(), &[3.0, 4.0]);
}

#[test]
fn missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let cfg = ModelConfig::for_path(dir.path().join("absent.model"));
    let err = KeyedVectors::load(&cfg).err().unwrap();
    assert!(matches!(err, ModelError::NotFound(_)));
    assert!(err.is_load_error());
}

#[test]
fn corrupt_files_are_load_errors() {
    let dir = TempDir::new().unwrap();
    let cases = [
        ("garbage.txt", "not a header\n"),
        ("short.txt", "2 2\n1 1 0\n"),
        ("dupe.txt", "2 2\n1 1 0\n1 0 1\n"),
        ("empty.txt", ""),
        ("zero.txt", "0 2\n"),
    ];
    for (name, contents) in cases {
        let cfg = write_text(dir.path(), name, contents);
        let err = KeyedVectors::load(&cfg).err().unwrap();
        assert!(err.is_load_error(), "{name}: {err}");
    }
}

#[test]
fn text_file_read_as_binary_is_rejected() {
    let dir = TempDir::new().unwrap();
    let cfg = write_text(dir.path(), "items.model", "2 2\n1 1 0\n2 0 1\n");
    let err = KeyedVectors::load(&cfg).err().unwrap();
    assert!(err.is_load_error(), "{err}");
}

#[test]
fn nearest_is_deterministic() {
    let mut entries = Vec::new();
    for i in 0..200u32 {
        let x = i as f32;
        entries.push((i.to_string(), vec![x.sin(), x.cos(), (x / 7.0).sin()]));
    }
    let table = KeyedVectors::from_entries(3, entries, true, AnnConfig::default()).unwrap();

    let query = [0.3, -0.2, 0.9];
    let first = table.nearest(&query, 5).unwrap();
    let second = table.nearest(&query, 5).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 6);
}

#[test]
fn hnsw_backed_table_is_deterministic() {
    let mut entries = Vec::new();
    for i in 0..300u32 {
        let x = i as f32;
        entries.push((format!("{i:05}"), vec![x.sin(), x.cos(), (x / 3.0).cos(), 1.0]));
    }
    let ann = AnnConfig::default()
        .with_enabled(true)
        .with_min_vectors_for_ann(100);
    let table = KeyedVectors::from_entries(4, entries, true, ann).unwrap();
    assert!(table.is_approximate());

    let query = table.vector_of("00042").unwrap().to_vec();
    let first = table.nearest(&query, 5).unwrap();
    let second = table.nearest(&query, 5).unwrap();
    assert_eq!(first, second);
    assert_eq!(first[0].key, "00042");
}

/// Deterministic pseudo-random components in [-1, 1).
fn scatter(seed: &mut u64, dimension: usize) -> Vec<f32> {
    (0..dimension)
        .map(|_| {
            *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((*seed >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
        })
        .collect()
}

fn brute_force(table: &KeyedVectors, keys: &[String], query: &[f32], k: usize) -> Vec<String> {
    let mut scored: Vec<(f32, usize)> = keys
        .iter()
        .enumerate()
        .map(|(pos, key)| {
            let v = table.vector_of(key).unwrap();
            let dot: f32 = query.iter().zip(v).map(|(a, b)| a * b).sum();
            let nq = query.iter().map(|x| x * x).sum::<f32>().sqrt();
            let nv = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            (1.0 - (dot / (nq * nv)).clamp(-1.0, 1.0), pos)
        })
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    scored.into_iter().take(k).map(|(_, pos)| keys[pos].clone()).collect()
}

#[test]
fn default_config_search_is_exact_on_large_tables() {
    let mut seed = 7u64;
    let keys: Vec<String> = (0..3000).map(|i| i.to_string()).collect();
    let entries: Vec<(String, Vec<f32>)> = keys
        .iter()
        .map(|k| (k.clone(), scatter(&mut seed, 16)))
        .collect();
    let table = KeyedVectors::from_entries(16, entries, true, AnnConfig::default()).unwrap();
    assert!(!table.is_approximate());

    for q in 0..40 {
        let a = table.vector_of(&keys[q * 7]).unwrap();
        let b = table.vector_of(&keys[q * 11 + 1]).unwrap();
        let query: Vec<f32> = a.iter().zip(b).map(|(x, y)| (x + y) / 2.0).collect();

        let got: Vec<String> = table
            .nearest(&query, 5)
            .unwrap()
            .into_iter()
            .map(|n| n.key)
            .collect();
        assert_eq!(got, brute_force(&table, &keys, &query, 6), "query {q}");
    }
}

#[test]
fn corrupt_headers_fail_to_load() {
    let dir = TempDir::new().unwrap();

    let cfg = write_text(dir.path(), "huge.txt", "18446744073709551615 2\n1 1.0 0.0\n");
    assert!(KeyedVectors::load(&cfg).err().unwrap().is_load_error());

    let path = dir.path().join("wide.bin");
    fs::write(&path, b"1 4611686018427387905\n").unwrap();
    let err = KeyedVectors::load(&ModelConfig::for_path(path)).err().unwrap();
    assert!(matches!(err, ModelError::Malformed { entry: 0, .. }));

    let cfg = write_text(dir.path(), "nan.txt", "2 2\n1 NaN 0.0\n2 inf 1.0\n");
    assert!(matches!(
        KeyedVectors::load(&cfg).err().unwrap(),
        ModelError::Malformed { entry: 1, .. }
    ));
}
