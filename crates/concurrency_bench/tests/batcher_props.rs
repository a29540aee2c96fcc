//! Property tests for batch partitioning and the doubling transform.

use concurrency_bench::{Batcher, Dataset, Label, Scale, Transform, VectorShape};
use proptest::prelude::*;

fn indexed_dataset(n: usize) -> Dataset {
    let vectors = (0..n).map(|i| vec![i as f32]).collect();
    let labels = (0..n).map(|i| Label::Class((i % 100) as u16)).collect();
    Dataset::new(vectors, labels, VectorShape::flat(1)).unwrap()
}

proptest! {
    #[test]
    fn plan_covers_prefix_in_order(n in 0usize..5000, batch_size in 1usize..700) {
        let batcher = Batcher::new(batch_size).unwrap();
        let ranges = batcher.plan(n);

        prop_assert_eq!(ranges.len(), n / batch_size);
        let mut next = 0;
        for r in &ranges {
            prop_assert_eq!(r.start, next);
            prop_assert_eq!(r.len(), batch_size);
            next = r.end;
        }
        prop_assert_eq!(next, (n / batch_size) * batch_size);
        prop_assert_eq!(batcher.plan(n), ranges);
    }

    #[test]
    fn split_batches_are_disjoint_and_ordered(n in 0usize..2000, batch_size in 1usize..300) {
        let mut partition = Batcher::new(batch_size).unwrap().split(indexed_dataset(n));
        let batches = partition.take_batches();

        prop_assert_eq!(batches.len(), n / batch_size);
        prop_assert_eq!(partition.remainder().len(), n % batch_size);

        let mut seen = Vec::new();
        for (i, batch) in batches.iter().enumerate() {
            prop_assert_eq!(batch.index(), i);
            prop_assert_eq!(batch.len(), batch_size);
            prop_assert_eq!(batch.labels().len(), batch_size);
            seen.extend(batch.vectors().iter().map(|v| v[0] as usize));
        }
        let expected: Vec<usize> = (0..(n / batch_size) * batch_size).collect();
        prop_assert_eq!(seen, expected);

        let rebuilt = partition.reassemble(batches).unwrap();
        let original = indexed_dataset(n);
        prop_assert_eq!(rebuilt.vectors(), original.vectors());
    }

    #[test]
    fn doubling_is_exact(values in proptest::collection::vec(-1.0e30f32..1.0e30, 0..256)) {
        let mut v = values.clone();
        let t = Scale::doubling();
        t.apply(&mut v).unwrap();
        for (out, inp) in v.iter().zip(&values) {
            prop_assert_eq!(*out, 2.0 * inp);
        }
        t.apply(&mut v).unwrap();
        for (out, inp) in v.iter().zip(&values) {
            prop_assert_eq!(*out, 4.0 * inp);
        }
    }
}
