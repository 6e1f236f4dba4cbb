use crate::models::{AuthorId, FeedItem};
use std::cmp::Reverse;
use std::collections::{HashMap, VecDeque};

/// Author cap layer ("group-cap-then-concat")
///
/// Keeps the `per_author_cap` most recent items of each author and returns
/// the survivors newest first. Older items beyond the cap are dropped, not
/// deferred. Equal timestamps keep their input order.
#[derive(Debug, Clone)]
pub struct AuthorCapLayer {
    per_author_cap: usize,
}

impl AuthorCapLayer {
    pub fn new(per_author_cap: usize) -> Self {
        Self { per_author_cap }
    }

    pub fn apply<T: FeedItem>(&self, mut items: Vec<T>) -> Vec<T> {
        items.sort_by_key(|item| Reverse(item.created_at()));

        let mut kept_per_author: HashMap<AuthorId, usize> = HashMap::new();
        items
            .into_iter()
            .filter(|item| {
                let kept = kept_per_author.entry(item.author_id()).or_insert(0);
                if *kept < self.per_author_cap {
                    *kept += 1;
                    true
                } else {
                    false
                }
            })
            .collect()
    }
}

impl Default for AuthorCapLayer {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Bounded-run interleaver
///
/// Streams a recency-ordered sequence and never emits more than `max_run`
/// consecutive items by one author. Items that would extend a saturated run
/// wait in a single FIFO queue; once a cap has been hit, up to
/// `cooldown_drain` of them are re-injected ahead of the next item by a
/// different author. Whatever is left is drained at the end.
///
/// The run limit holds for every input that admits such an ordering. When
/// one author owns too much of the input, the excess ends up as a tail run.
#[derive(Debug, Clone)]
pub struct RunLengthInterleaver {
    max_run: usize,
    cooldown_drain: usize,
}

impl RunLengthInterleaver {
    pub fn new(max_run: usize, cooldown_drain: usize) -> Self {
        Self {
            max_run: max_run.max(1),
            cooldown_drain,
        }
    }

    pub fn interleave<T: FeedItem>(&self, items: Vec<T>) -> Vec<T> {
        let mut out = RunTracker::with_capacity(self.max_run, items.len());
        let mut deferred = DeferredQueue::default();
        let mut cooldown_armed = false;

        for item in items {
            let author = item.author_id();

            if out.last_author() == Some(author) {
                if out.accepts(author) {
                    out.push(item);
                } else {
                    deferred.push(item);
                    cooldown_armed = true;
                }
                continue;
            }

            if cooldown_armed && !deferred.is_empty() {
                out.drain_from(&mut deferred, self.cooldown_drain);
            }

            // The drained items may have saturated this author's run
            if out.accepts(author) {
                out.push(item);
            } else {
                deferred.push(item);
                cooldown_armed = true;
            }

            if deferred.is_empty() {
                cooldown_armed = false;
            }
        }

        out.drain_from(&mut deferred, usize::MAX);

        if deferred.is_empty() {
            return out.into_items();
        }
        place_stranded(out.into_items(), deferred.into_items(), self.max_run)
    }
}

impl Default for RunLengthInterleaver {
    fn default() -> Self {
        Self::new(2, 3)
    }
}

/// Output buffer that tracks the run at its tail.
struct RunTracker<T> {
    items: Vec<T>,
    max_run: usize,
    last: Option<AuthorId>,
    run: usize,
}

impl<T: FeedItem> RunTracker<T> {
    fn with_capacity(max_run: usize, capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            max_run,
            last: None,
            run: 0,
        }
    }

    fn last_author(&self) -> Option<AuthorId> {
        self.last
    }

    fn accepts(&self, author: AuthorId) -> bool {
        self.last != Some(author) || self.run < self.max_run
    }

    /// Whether the tail run is full, i.e. only other authors fit next.
    fn saturated_by(&self) -> Option<AuthorId> {
        self.last.filter(|_| self.run >= self.max_run)
    }

    fn push(&mut self, item: T) {
        let author = item.author_id();
        if self.last == Some(author) {
            self.run += 1;
        } else {
            self.last = Some(author);
            self.run = 1;
        }
        self.items.push(item);
    }

    /// Emits up to `limit` deferred items, front first, skipping any that
    /// would overrun the tail. Skipped items keep their queue position.
    fn drain_from(&mut self, deferred: &mut DeferredQueue<T>, limit: usize) {
        let mut drained = 0;
        while drained < limit {
            let Some(item) = deferred.take_first_accepted(self) else {
                break;
            };
            self.push(item);
            drained += 1;
        }
    }

    fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// FIFO of items waiting for their author's run to cool down, with
/// per-author counts so a queue holding only the saturated author is
/// rejected without a scan.
struct DeferredQueue<T> {
    items: VecDeque<T>,
    per_author: HashMap<AuthorId, usize>,
}

impl<T> Default for DeferredQueue<T> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
            per_author: HashMap::new(),
        }
    }
}

impl<T: FeedItem> DeferredQueue<T> {
    fn push(&mut self, item: T) {
        *self.per_author.entry(item.author_id()).or_insert(0) += 1;
        self.items.push_back(item);
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn take_first_accepted(&mut self, out: &RunTracker<T>) -> Option<T> {
        if let Some(blocked) = out.saturated_by() {
            if self.per_author.get(&blocked).copied().unwrap_or(0) == self.items.len() {
                return None;
            }
        }

        let idx = self.items.iter().position(|i| out.accepts(i.author_id()))?;
        let item = self.items.remove(idx)?;

        let author = item.author_id();
        if let Some(count) = self.per_author.get_mut(&author) {
            *count -= 1;
            if *count == 0 {
                self.per_author.remove(&author);
            }
        }
        Some(item)
    }

    fn into_items(self) -> VecDeque<T> {
        self.items
    }
}

/// Places items the streaming pass could not emit. They all belong to the
/// author that ends `items` with a full run.
///
/// Each gap between two items of other authors can take
/// `max_run - existing run` more items. Gaps are filled latest first and
/// the stranded items keep their relative order. When the gaps cannot hold
/// them all no valid ordering exists, and they are appended as a tail run.
fn place_stranded<T: FeedItem>(items: Vec<T>, stranded: VecDeque<T>, max_run: usize) -> Vec<T> {
    let Some(author) = stranded.front().map(|i| i.author_id()) else {
        return items;
    };

    // runs[g]: items by `author` in gap g; one more gap than other items
    let mut runs = vec![0usize];
    for item in &items {
        if item.author_id() == author {
            if let Some(run) = runs.last_mut() {
                *run += 1;
            }
        } else {
            runs.push(0);
        }
    }

    let capacity: usize = runs.iter().map(|run| max_run.saturating_sub(*run)).sum();
    let mut out = Vec::with_capacity(items.len() + stranded.len());

    if capacity < stranded.len() {
        out.extend(items);
        out.extend(stranded);
        return out;
    }

    let mut quota = vec![0usize; runs.len()];
    let mut left = stranded.len();
    for (gap, run) in runs.iter().enumerate().rev() {
        if left == 0 {
            break;
        }
        let take = max_run.saturating_sub(*run).min(left);
        quota[gap] = take;
        left -= take;
    }

    let mut stranded = stranded.into_iter();
    let mut gap = 0;
    for item in items {
        if item.author_id() != author {
            out.extend(stranded.by_ref().take(quota[gap]));
            gap += 1;
        }
        out.push(item);
    }
    out.extend(stranded);
    out
}

/// Length of the longest same-author run in `items`.
pub fn longest_author_run<T: FeedItem>(items: &[T]) -> usize {
    let mut longest = 0;
    let mut run = 0;
    let mut last: Option<AuthorId> = None;

    for item in items {
        let author = item.author_id();
        if last == Some(author) {
            run += 1;
        } else {
            last = Some(author);
            run = 1;
        }
        longest = longest.max(run);
    }

    longest
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::time::{Duration, Instant};
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: u128,
        author: u128,
        ts: i64,
    }

    impl FeedItem for Item {
        fn id(&self) -> Uuid {
            Uuid::from_u128(self.id)
        }

        fn author_id(&self) -> AuthorId {
            AuthorId(Uuid::from_u128(self.author))
        }

        fn created_at(&self) -> DateTime<Utc> {
            Utc.timestamp_opt(self.ts, 0).unwrap()
        }
    }

    /// Newest first: the first author in `authors` gets the latest timestamp.
    fn by_recency(authors: &[u128]) -> Vec<Item> {
        let n = authors.len() as i64;
        authors
            .iter()
            .enumerate()
            .map(|(i, &author)| Item {
                id: i as u128 + 1,
                author,
                ts: 1_000 + n - i as i64,
            })
            .collect()
    }

    fn authors_of(items: &[Item]) -> Vec<u128> {
        items.iter().map(|i| i.author).collect()
    }

    fn sorted_ids(items: &[Item]) -> Vec<u128> {
        let mut ids: Vec<u128> = items.iter().map(|i| i.id).collect();
        ids.sort_unstable();
        ids
    }

    fn admits_bounded_runs(authors: &[u128], max_run: usize) -> bool {
        let mut counts: HashMap<u128, usize> = HashMap::new();
        for a in authors {
            *counts.entry(*a).or_default() += 1;
        }
        counts
            .values()
            .all(|&c| c <= max_run * (authors.len() - c + 1))
    }

    #[test]
    fn test_author_cap_keeps_two_most_recent_per_author() {
        let items = vec![
            Item { id: 1, author: 1, ts: 10 },
            Item { id: 2, author: 1, ts: 30 },
            Item { id: 3, author: 2, ts: 20 },
            Item { id: 4, author: 1, ts: 40 },
            Item { id: 5, author: 2, ts: 5 },
            Item { id: 6, author: 2, ts: 25 },
        ];

        let capped = AuthorCapLayer::default().apply(items);

        let ids: Vec<u128> = capped.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![4, 2, 6, 3]);
    }

    #[test]
    fn test_author_cap_ties_keep_input_order() {
        let items = vec![
            Item { id: 1, author: 1, ts: 10 },
            Item { id: 2, author: 2, ts: 10 },
            Item { id: 3, author: 1, ts: 10 },
            Item { id: 4, author: 1, ts: 10 },
        ];

        let capped = AuthorCapLayer::new(2).apply(items);

        let ids: Vec<u128> = capped.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_author_cap_of_six() {
        let items = by_recency(&[1; 10]);
        assert_eq!(AuthorCapLayer::new(6).apply(items).len(), 6);
    }

    #[test]
    fn test_interleave_untouched_when_runs_are_short() {
        let items = by_recency(&[1, 1, 2, 3, 3, 1]);
        let out = RunLengthInterleaver::default().interleave(items.clone());
        assert_eq!(out, items);
    }

    #[test]
    fn test_interleave_caps_runs_of_two_authors() {
        // A A A B B B C
        let out = RunLengthInterleaver::default().interleave(by_recency(&[1, 1, 1, 2, 2, 2, 3]));

        assert_eq!(authors_of(&out), vec![1, 1, 2, 2, 1, 2, 3]);
        assert!(longest_author_run(&out) <= 2);
    }

    #[test]
    fn test_interleave_spreads_dominant_author() {
        let out = RunLengthInterleaver::default().interleave(by_recency(&[1, 1, 1, 1, 1, 1, 2, 3]));

        assert_eq!(authors_of(&out), vec![1, 1, 2, 1, 1, 3, 1, 1]);
    }

    #[test]
    fn test_interleave_inserts_stranded_items_earlier() {
        // Only valid shape is A A B A A C A A; the tail A's must move forward
        let out = RunLengthInterleaver::default().interleave(by_recency(&[2, 1, 1, 1, 1, 1, 1, 3]));

        assert_eq!(authors_of(&out), vec![1, 1, 2, 1, 1, 3, 1, 1]);
        // Moved items keep their relative order
        let ids: Vec<u128> = out.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![6, 7, 1, 2, 3, 8, 4, 5]);
    }

    #[test]
    fn test_interleave_dominant_seller_in_large_catalog() {
        // 2000 recent listings by distinct sellers, then 3000 older ones by
        // seller 1; all but two of those must be spread back into the gaps
        let authors: Vec<u128> = (0..5_000u128)
            .map(|i| if i < 2_000 { 10 + i } else { 1 })
            .collect();
        let items = by_recency(&authors);
        assert!(admits_bounded_runs(&authors, 2));

        let started = Instant::now();
        let out = RunLengthInterleaver::default().interleave(items.clone());
        let elapsed = started.elapsed();

        assert_eq!(sorted_ids(&out), sorted_ids(&items));
        assert!(longest_author_run(&out) <= 2);
        assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);
    }

    #[test]
    fn test_interleave_overwhelming_seller_ends_in_tail_run() {
        let mut authors = vec![1u128; 5_000];
        authors[10] = 2;
        authors[20] = 3;
        let items = by_recency(&authors);

        let started = Instant::now();
        let out = RunLengthInterleaver::default().interleave(items.clone());
        let elapsed = started.elapsed();

        assert_eq!(sorted_ids(&out), sorted_ids(&items));
        assert_eq!(authors_of(&out[..8]), vec![1, 1, 2, 1, 1, 3, 1, 1]);
        assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);
    }

    #[test]
    fn test_interleave_single_author_cannot_be_fixed() {
        let items = by_recency(&[1, 1, 1, 1]);
        let out = RunLengthInterleaver::default().interleave(items.clone());
        assert_eq!(out, items);
    }

    #[test]
    fn test_interleave_drains_at_most_cooldown_items_per_unblock() {
        // A A [A A A A deferred] B ... with drain 1: one A re-enters before B
        let out = RunLengthInterleaver::new(2, 1).interleave(by_recency(&[1, 1, 1, 1, 2, 3, 4, 5]));

        assert_eq!(authors_of(&out), vec![1, 1, 2, 1, 3, 1, 4, 5]);
    }

    #[test]
    fn test_interleave_is_deterministic() {
        let items = by_recency(&[1, 1, 1, 2, 2, 2, 3, 3, 3, 3, 1, 1]);
        let layer = RunLengthInterleaver::default();
        assert_eq!(layer.interleave(items.clone()), layer.interleave(items));
    }

    #[test]
    fn test_interleave_property_random_inputs() {
        let mut rng = StdRng::seed_from_u64(2024);
        let layer = RunLengthInterleaver::default();

        for _ in 0..500 {
            let len = if rng.gen_bool(0.1) {
                rng.gen_range(40..400)
            } else {
                rng.gen_range(0..40)
            };
            let author_count = rng.gen_range(1..6u128);
            let authors: Vec<u128> = (0..len).map(|_| rng.gen_range(1..=author_count)).collect();
            let items = by_recency(&authors);

            let out = layer.interleave(items.clone());

            assert_eq!(sorted_ids(&out), sorted_ids(&items), "not a permutation");
            if admits_bounded_runs(&authors, 2) {
                assert!(
                    longest_author_run(&out) <= 2,
                    "run too long for input {:?}: {:?}",
                    authors,
                    authors_of(&out)
                );
            }
        }
    }

    #[test]
    fn test_longest_author_run() {
        assert_eq!(longest_author_run::<Item>(&[]), 0);
        assert_eq!(longest_author_run(&by_recency(&[1, 2, 2, 2, 1])), 3);
    }
}
