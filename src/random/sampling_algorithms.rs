//! Uniform sampling helpers used by the testing strategies.

use crate::rand::seq::index::sample as choose_range;
use crate::rand::seq::SliceRandom;
use crate::rand::Rng;

/// Sample up to `requested` elements uniformly without replacement from a container of known
/// length. If `requested` is at least the length of the container, every element is returned.
///
/// The selected elements keep their relative order in `iter`, so the result depends only on
/// the random stream and the input order.
pub fn sample_multiple_from_known_length<I, R, T>(rng: &mut R, iter: I, requested: usize) -> Vec<T>
where
    R: Rng + ?Sized,
    I: IntoIterator<Item = T>,
    I::IntoIter: ExactSizeIterator,
{
    let iter = iter.into_iter();
    let length = iter.len();
    if requested >= length {
        return iter.collect();
    }
    if requested == 0 {
        return Vec::new();
    }

    let mut indexes = choose_range(rng, length, requested).into_vec();
    indexes.sort_unstable();
    let mut index_iterator = indexes.into_iter().peekable();
    let mut selected = Vec::with_capacity(requested);

    for (idx, item) in iter.enumerate() {
        match index_iterator.peek() {
            Some(&next_idx) if next_idx == idx => {
                selected.push(item);
                index_iterator.next();
            }
            Some(_) => {}
            None => break,
        }
    }

    selected
}

/// Returns the items in a uniformly random order.
pub fn shuffled<R, T>(rng: &mut R, items: impl IntoIterator<Item = T>) -> Vec<T>
where
    R: Rng + ?Sized,
{
    let mut items: Vec<T> = items.into_iter().collect();
    items.shuffle(rng);
    items
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;
    use crate::hashing::HashSet;

    #[test]
    fn sample_multiple_basic() {
        let data: Vec<u32> = (0..1000).collect();
        let mut rng = SmallRng::seed_from_u64(42);
        let sample = sample_multiple_from_known_length(&mut rng, data.iter().copied(), 100);

        assert_eq!(sample.len(), 100);
        assert!(sample.iter().all(|v| *v < 1000));
        let unique: HashSet<_> = sample.iter().collect();
        assert_eq!(unique.len(), sample.len());
        // Relative order is preserved.
        assert!(sample.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn sample_more_than_available_returns_everything() {
        let mut rng = SmallRng::seed_from_u64(1);
        let sample = sample_multiple_from_known_length(&mut rng, vec![3, 1, 2], 10);
        assert_eq!(sample, vec![3, 1, 2]);
        let none = sample_multiple_from_known_length(&mut rng, vec![3, 1, 2], 0);
        assert!(none.is_empty());
    }

    #[test]
    fn sample_is_reproducible() {
        let first = sample_multiple_from_known_length(&mut SmallRng::seed_from_u64(9), 0..50, 7);
        let second = sample_multiple_from_known_length(&mut SmallRng::seed_from_u64(9), 0..50, 7);
        assert_eq!(first, second);
    }

    #[test]
    fn sample_is_roughly_uniform() {
        // Each of 10 items is drawn into a sample of 5 with probability 1/2.
        let mut rng = SmallRng::seed_from_u64(42);
        let mut counts = [0usize; 10];
        let runs = 4000;
        for _ in 0..runs {
            for item in sample_multiple_from_known_length(&mut rng, 0..10usize, 5) {
                counts[item] += 1;
            }
        }
        for count in counts {
            assert!((count as i64 - 2000).abs() < 150, "count {count} far from 2000");
        }
    }

    #[test]
    fn shuffled_is_a_permutation() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut items = shuffled(&mut rng, 0..20);
        items.sort_unstable();
        assert_eq!(items, (0..20).collect::<Vec<_>>());
    }
}
