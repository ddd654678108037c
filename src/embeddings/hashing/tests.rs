use super::*;

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[test]
fn fixed_dimension_for_every_input() {
    let embedder = HashingEmbedder::new(64);
    let texts = vec![
        String::new(),
        "   ".to_string(),
        "short".to_string(),
        "a much longer sentence about vector search and chunking".to_string(),
    ];

    let vectors = embedder.encode(&texts).expect("hashing never fails");

    assert_eq!(vectors.len(), texts.len());
    assert!(vectors.iter().all(|v| v.len() == 64));
}

#[test]
fn empty_text_is_zero_vector() {
    let embedder = HashingEmbedder::new(16);
    assert_eq!(embedder.embed(""), vec![0.0; 16]);
    assert_eq!(embedder.embed("?!"), vec![0.0; 16]);
}

#[test]
fn deterministic_and_normalised() {
    let embedder = HashingEmbedder::new(128);
    let first = embedder.embed("The quick brown fox");
    let second = embedder.embed("The quick brown fox");

    assert_eq!(first, second);
    let norm: f32 = first.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5);
}

#[test]
fn case_and_punctuation_insensitive() {
    let embedder = HashingEmbedder::new(128);
    assert_eq!(
        embedder.embed("Vector, INDEX!"),
        embedder.embed("vector index")
    );
}

#[test]
fn shared_vocabulary_is_closer() {
    let embedder = HashingEmbedder::new(384);
    let query = embedder.embed("how does the vector index search work");
    let related = embedder.embed("the vector index search scans every stored vector");
    let unrelated = embedder.embed("bake the bread at two hundred degrees");

    assert!(squared_distance(&query, &related) < squared_distance(&query, &unrelated));
}

#[test]
fn encode_one_matches_embed() {
    let embedder = HashingEmbedder::new(32);
    let vector = embedder.encode_one("persist the pair").expect("hashing never fails");
    assert_eq!(vector, embedder.embed("persist the pair"));
}
