/// Recall layer: splits the content universe into a followed partition and
/// a sampled discovery partition.
///
/// Sampling goes through a caller-supplied `rand::Rng` so a fixed seed
/// reproduces the exact discovery set.
use crate::config::FeedTuning;
use crate::error::FeedError;
use crate::models::{AuthorId, FeedItem, FollowSet};
use crate::store::{ContentStore, SortOrder};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecallStats {
    pub followed_count: usize,
    /// Target size of the discovery partition
    pub discovery_target: usize,
    pub discovery_authors: usize,
    pub discovery_count: usize,
}

/// Both partitions, newest first, not yet interleaved.
#[derive(Debug, Clone)]
pub struct Candidates<T> {
    pub followed: Vec<T>,
    pub discovery: Vec<T>,
    pub stats: RecallStats,
}

impl<T> Candidates<T> {
    /// Followed items followed by discovery items.
    pub fn into_combined(self) -> Vec<T> {
        let mut combined = self.followed;
        combined.extend(self.discovery);
        combined
    }
}

#[derive(Debug, Clone)]
pub struct CandidateSelector {
    discovery_ratio: f64,
    discovery_fallback: usize,
}

impl CandidateSelector {
    pub fn new(discovery_ratio: f64, discovery_fallback: usize) -> Self {
        Self {
            discovery_ratio,
            discovery_fallback,
        }
    }

    pub fn from_tuning(tuning: &FeedTuning) -> Self {
        Self::new(tuning.discovery_ratio, tuning.discovery_fallback)
    }

    /// `ceil(followed * ratio)`, or the fallback when nothing is followed.
    pub fn discovery_count(&self, followed_count: usize) -> usize {
        if followed_count == 0 {
            return self.discovery_fallback;
        }
        (followed_count as f64 * self.discovery_ratio).ceil() as usize
    }

    /// Picks up to `count` authors outside `followed`, uniformly at random
    /// without replacement.
    pub fn sample_discovery_authors<R>(
        &self,
        all_authors: &[AuthorId],
        followed: &FollowSet,
        count: usize,
        rng: &mut R,
    ) -> HashSet<AuthorId>
    where
        R: Rng + ?Sized,
    {
        let pool: Vec<AuthorId> = all_authors
            .iter()
            .filter(|author| !followed.contains(*author))
            .copied()
            .collect();

        pool.choose_multiple(rng, count).copied().collect()
    }

    /// Followed items are read unbounded; the author universe is read
    /// concurrently since neither read depends on the other.
    pub async fn select<T, S, R>(
        &self,
        store: &S,
        followed_authors: &FollowSet,
        rng: &mut R,
    ) -> Result<Candidates<T>, FeedError>
    where
        T: FeedItem,
        S: ContentStore<T> + ?Sized,
        R: Rng + Send + ?Sized,
    {
        let (followed, all_authors) = tokio::try_join!(
            store.items_by_authors(followed_authors, SortOrder::NewestFirst, None),
            store.distinct_author_ids(),
        )?;

        let discovery_target = self.discovery_count(followed.len());
        let sampled =
            self.sample_discovery_authors(&all_authors, followed_authors, discovery_target, rng);

        let discovery = if sampled.is_empty() || discovery_target == 0 {
            Vec::new()
        } else {
            store
                .items_by_authors(&sampled, SortOrder::NewestFirst, Some(discovery_target))
                .await?
        };

        let stats = RecallStats {
            followed_count: followed.len(),
            discovery_target,
            discovery_authors: sampled.len(),
            discovery_count: discovery.len(),
        };

        debug!(
            "Recall completed: followed={}, discovery_target={}, discovery_authors={}, discovery={}",
            stats.followed_count,
            stats.discovery_target,
            stats.discovery_authors,
            stats.discovery_count
        );

        Ok(Candidates {
            followed,
            discovery,
            stats,
        })
    }
}

impl Default for CandidateSelector {
    fn default() -> Self {
        Self::from_tuning(&FeedTuning::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uuid::Uuid;

    fn author(n: u128) -> AuthorId {
        AuthorId(Uuid::from_u128(n))
    }

    #[test]
    fn test_discovery_count() {
        let selector = CandidateSelector::default();
        assert_eq!(selector.discovery_count(0), 40);
        assert_eq!(selector.discovery_count(1), 1);
        assert_eq!(selector.discovery_count(3), 3);
        assert_eq!(selector.discovery_count(5), 4);
        assert_eq!(selector.discovery_count(100), 70);
    }

    #[test]
    fn test_discovery_count_respects_overrides() {
        let selector = CandidateSelector::new(0.5, 12);
        assert_eq!(selector.discovery_count(0), 12);
        assert_eq!(selector.discovery_count(5), 3);
    }

    #[test]
    fn test_sample_excludes_followed_authors() {
        let selector = CandidateSelector::default();
        let all: Vec<AuthorId> = (1..=20).map(author).collect();
        let followed: FollowSet = [author(1), author(2), author(3)].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(42);

        let sampled = selector.sample_discovery_authors(&all, &followed, 5, &mut rng);

        assert_eq!(sampled.len(), 5);
        assert!(sampled.iter().all(|a| !followed.contains(a)));
    }

    #[test]
    fn test_sample_takes_whole_pool_when_smaller_than_count() {
        let selector = CandidateSelector::default();
        let all: Vec<AuthorId> = (1..=4).map(author).collect();
        let followed: FollowSet = [author(1)].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(1);

        let sampled = selector.sample_discovery_authors(&all, &followed, 40, &mut rng);

        let expected: HashSet<AuthorId> = [author(2), author(3), author(4)].into_iter().collect();
        assert_eq!(sampled, expected);
    }

    #[test]
    fn test_sample_is_reproducible_for_a_seed() {
        let selector = CandidateSelector::default();
        let all: Vec<AuthorId> = (1..=50).map(author).collect();
        let followed = FollowSet::new();

        let first = selector.sample_discovery_authors(
            &all,
            &followed,
            10,
            &mut StdRng::seed_from_u64(7),
        );
        let second = selector.sample_discovery_authors(
            &all,
            &followed,
            10,
            &mut StdRng::seed_from_u64(7),
        );

        assert_eq!(first, second);
    }

    #[test]
    fn test_into_combined_keeps_followed_first() {
        let candidates = Candidates {
            followed: vec![1, 2],
            discovery: vec![3],
            stats: RecallStats::default(),
        };
        assert_eq!(candidates.into_combined(), vec![1, 2, 3]);
    }
}
