use super::*;

fn index_with(vectors: &[[f32; 2]]) -> FlatIndex {
    let mut index = FlatIndex::new(2);
    let vectors: Vec<Vec<f32>> = vectors.iter().map(|v| v.to_vec()).collect();
    index.add(&vectors).expect("vectors have the index dimension");
    index
}

#[test]
fn add_assigns_sequential_ids() {
    let mut index = FlatIndex::new(3);
    assert_eq!(index.count(), 0);

    let first = index
        .add(&[vec![0.0, 0.0, 1.0], vec![0.0, 1.0, 0.0]])
        .expect("dimension matches");
    let second = index.add(&[vec![1.0, 0.0, 0.0]]).expect("dimension matches");

    assert_eq!(first, 0..2);
    assert_eq!(second, 2..3);
    assert_eq!(index.count(), 3);
    assert_eq!(index.vector(2), Some(&[1.0, 0.0, 0.0][..]));
    assert_eq!(index.vector(3), None);
}

#[test]
fn add_rejects_wrong_dimension_without_partial_append() {
    let mut index = index_with(&[[0.0, 0.0]]);

    let result = index.add(&[vec![1.0, 1.0], vec![1.0, 1.0, 1.0]]);

    assert_eq!(
        result,
        Err(IndexError::DimensionMismatch {
            expected: 2,
            actual: 3
        })
    );
    assert_eq!(index.count(), 1);
}

#[test]
fn search_empty_index_returns_nothing() {
    let index = FlatIndex::new(4);
    let hits = index.search(&[0.0; 4], 5).expect("empty search succeeds");
    assert!(hits.is_empty());
}

#[test]
fn search_orders_by_squared_distance() {
    let index = index_with(&[[3.0, 0.0], [1.0, 0.0], [0.0, 2.0], [10.0, 10.0]]);

    let hits = index.search(&[0.0, 0.0], 3).expect("dimension matches");

    let ids: Vec<usize> = hits.iter().map(|n| n.id).collect();
    let distances: Vec<f32> = hits.iter().map(|n| n.distance).collect();
    assert_eq!(ids, vec![1, 2, 0]);
    assert_eq!(distances, vec![1.0, 4.0, 9.0]);
}

#[test]
fn search_returns_at_most_count() {
    let index = index_with(&[[1.0, 1.0], [2.0, 2.0]]);

    let hits = index.search(&[0.0, 0.0], 10).expect("dimension matches");

    assert_eq!(hits.len(), 2);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[test]
fn ties_prefer_earliest_insert() {
    let index = index_with(&[[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0], [0.0, -1.0], [5.0, 5.0]]);

    let hits = index.search(&[0.0, 0.0], 3).expect("dimension matches");

    let ids: Vec<usize> = hits.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[test]
fn search_rejects_wrong_query_dimension() {
    let index = index_with(&[[1.0, 1.0]]);
    assert!(matches!(
        index.search(&[1.0], 1),
        Err(IndexError::DimensionMismatch {
            expected: 2,
            actual: 1
        })
    ));
}

#[test]
fn zero_k_returns_nothing() {
    let index = index_with(&[[1.0, 1.0]]);
    assert!(index.search(&[1.0, 1.0], 0).expect("k=0 is valid").is_empty());
}

#[test]
fn truncate_restores_previous_count() {
    let mut index = index_with(&[[1.0, 1.0]]);
    let before = index.clone();
    index
        .add(&[vec![2.0, 2.0], vec![3.0, 3.0]])
        .expect("dimension matches");

    index.truncate(1);

    assert_eq!(index, before);
}

#[test]
fn from_packed_validates_length() {
    assert!(FlatIndex::from_packed(2, vec![1.0, 2.0, 3.0]).is_err());
    let index = FlatIndex::from_packed(2, vec![1.0, 2.0, 3.0, 4.0]).expect("even length");
    assert_eq!(index.count(), 2);
}

#[test]
fn squared_distance_is_not_square_rooted() {
    assert_eq!(squared_euclidean(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
}
