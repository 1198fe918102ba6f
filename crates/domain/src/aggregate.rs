//! Tag-set aggregation and dictionary interning.
//!
//! Stopped timers that carry the same tag set (compared by contents, not by
//! insertion order) collapse into one group. Every tag name and value, both
//! request-level and timer-level, is interned into a single dictionary and
//! referenced by index.

use crate::tags::TagMap;
use crate::timer::Timer;
use rustc_hash::FxHashMap;
use serde::Serialize;

/// Aggregated view of one request, ready to be laid out as a message.
///
/// The `timer_*` arrays are parallel: entry `i` of `timer_hit_count`,
/// `timer_value` and `timer_tag_count` describes group `i`, and the flat
/// `timer_tag_name`/`timer_tag_value` arrays hold `timer_tag_count[i]` index
/// pairs per group, in group order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedSummary {
    /// Unique strings in first-seen order.
    pub dictionary: Vec<String>,
    /// Request tag names as dictionary indices.
    pub tag_name: Vec<u32>,
    /// Request tag values as dictionary indices.
    pub tag_value: Vec<u32>,
    /// Number of timers per group.
    pub timer_hit_count: Vec<u32>,
    /// Summed value per group, in seconds.
    pub timer_value: Vec<f64>,
    /// Number of tags per group.
    pub timer_tag_count: Vec<u32>,
    /// Group tag names as dictionary indices.
    pub timer_tag_name: Vec<u32>,
    /// Group tag values as dictionary indices.
    pub timer_tag_value: Vec<u32>,
}

impl AggregatedSummary {
    /// Number of distinct tag-set groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.timer_hit_count.len()
    }
}

#[derive(Default)]
struct Dictionary<'a> {
    strings: Vec<&'a str>,
    index: FxHashMap<&'a str, u32>,
}

impl<'a> Dictionary<'a> {
    fn intern(&mut self, value: &'a str) -> u32 {
        if let Some(existing) = self.index.get(value) {
            return *existing;
        }
        let next = u32::try_from(self.strings.len()).unwrap_or(u32::MAX);
        self.strings.push(value);
        self.index.insert(value, next);
        next
    }

    fn into_owned(self) -> Vec<String> {
        self.strings.into_iter().map(str::to_owned).collect()
    }
}

struct Group<'a> {
    tags: &'a TagMap,
    hit_count: u32,
    value: f64,
}

/// Collapse stopped timers by tag set and intern every tag string.
///
/// Running timers are skipped. Groups keep the order in which their tag set
/// was first seen, and each group reports the tag order of its first timer.
pub fn aggregate<'a>(
    request_tags: &'a TagMap,
    timers: impl IntoIterator<Item = &'a Timer>,
) -> AggregatedSummary {
    let mut dictionary = Dictionary::default();
    let mut summary = AggregatedSummary::default();

    for (name, value) in request_tags.iter() {
        summary.tag_name.push(dictionary.intern(name));
        summary.tag_value.push(dictionary.intern(value));
    }

    let mut groups: Vec<Group<'a>> = Vec::new();
    let mut positions: FxHashMap<Vec<(&'a str, &'a str)>, usize> = FxHashMap::default();
    for timer in timers {
        let Some(value) = timer.value() else {
            continue;
        };
        let tags = timer.tags();
        let position = *positions.entry(tags.canonical_key()).or_insert_with(|| {
            groups.push(Group {
                tags,
                hit_count: 0,
                value: 0.0,
            });
            groups.len() - 1
        });
        if let Some(group) = groups.get_mut(position) {
            group.hit_count = group.hit_count.saturating_add(1);
            group.value += value;
        }
    }

    for group in &groups {
        summary.timer_hit_count.push(group.hit_count);
        summary.timer_value.push(group.value);
        summary
            .timer_tag_count
            .push(u32::try_from(group.tags.len()).unwrap_or(u32::MAX));
        for (name, value) in group.tags.iter() {
            summary.timer_tag_name.push(dictionary.intern(name));
            summary.timer_tag_value.push(dictionary.intern(value));
        }
    }

    summary.dictionary = dictionary.into_owned();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::TimerData;
    use proptest::prelude::*;
    use std::time::{Duration, Instant};

    fn stopped<const N: usize>(tags: [(&str, &str); N], value: f64) -> Timer {
        Timer::stopped(TagMap::from(tags), value, TimerData::new())
    }

    #[test]
    fn identical_tag_sets_collapse_into_one_group() {
        let timers = [stopped([("a", "1")], 0.1), stopped([("a", "1")], 0.2)];
        let summary = aggregate(&TagMap::new(), &timers);

        assert_eq!(summary.timer_hit_count, vec![2]);
        let total = summary.timer_value.first().copied().unwrap_or_default();
        assert!((total - 0.3).abs() < 1e-12);
        assert_eq!(summary.timer_tag_count, vec![1]);
        assert_eq!(summary.dictionary, vec!["a", "1"]);
    }

    #[test]
    fn tag_order_does_not_split_groups() {
        let timers = [
            stopped([("x", "1"), ("y", "2")], 1.0),
            stopped([("y", "2"), ("x", "1")], 2.0),
        ];
        let summary = aggregate(&TagMap::new(), &timers);

        assert_eq!(summary.group_count(), 1);
        assert_eq!(summary.timer_hit_count, vec![2]);
        // First timer decides the emitted tag order.
        assert_eq!(summary.timer_tag_name, vec![0, 2]);
        assert_eq!(summary.timer_tag_value, vec![1, 3]);
    }

    #[test]
    fn request_and_timer_tags_share_the_dictionary() {
        let request_tags = TagMap::from([("tag1", "value1")]);
        let timers = [stopped([("tag1", "value1")], 0.1)];
        let summary = aggregate(&request_tags, &timers);

        assert_eq!(summary.dictionary, vec!["tag1", "value1"]);
        assert_eq!(summary.tag_name, vec![0]);
        assert_eq!(summary.tag_value, vec![1]);
        assert_eq!(summary.timer_tag_name, vec![0]);
        assert_eq!(summary.timer_tag_value, vec![1]);
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let request_tags = TagMap::from([("tag1", "value1"), ("tag2", "value2"), ("tag3", "value2")]);
        let timers = [
            stopped([("tag1", "value1")], 0.1),
            stopped([("tag2", "value1")], 0.2),
            stopped([("tag3", "value2")], 0.3),
        ];
        let summary = aggregate(&request_tags, &timers);

        assert_eq!(summary.dictionary, vec!["tag1", "value1", "tag2", "value2", "tag3"]);
        assert_eq!(summary.tag_name, vec![0, 2, 4]);
        assert_eq!(summary.tag_value, vec![1, 3, 3]);
        assert_eq!(summary.timer_hit_count, vec![1, 1, 1]);
        assert_eq!(summary.timer_value, vec![0.1, 0.2, 0.3]);
        assert_eq!(summary.timer_tag_count, vec![1, 1, 1]);
        assert_eq!(summary.timer_tag_name, vec![0, 2, 4]);
        assert_eq!(summary.timer_tag_value, vec![1, 1, 3]);
    }

    #[test]
    fn empty_tag_set_is_its_own_group() {
        let timers = [stopped([], 0.5), stopped([("a", "b")], 0.25), stopped([], 0.5)];
        let summary = aggregate(&TagMap::new(), &timers);

        assert_eq!(summary.timer_hit_count, vec![2, 1]);
        assert_eq!(summary.timer_tag_count, vec![0, 1]);
        assert_eq!(summary.timer_value, vec![1.0, 0.25]);
    }

    #[test]
    fn running_timers_are_skipped() {
        let start = Instant::now();
        let running = Timer::running(TagMap::from([("a", "1")]), TimerData::new(), start);
        let mut finished = Timer::running(TagMap::from([("b", "2")]), TimerData::new(), start);
        finished.stop(start + Duration::from_millis(10));

        let summary = aggregate(&TagMap::new(), [&running, &finished]);
        assert_eq!(summary.group_count(), 1);
        assert_eq!(summary.dictionary, vec!["b", "2"]);
    }

    proptest! {
        #[test]
        fn hit_counts_cover_every_timer(timers in timer_sets()) {
            let summary = aggregate(&TagMap::new(), &timers);

            let hits: u32 = summary.timer_hit_count.iter().sum();
            prop_assert_eq!(hits as usize, timers.len());
            let tag_total: u32 = summary.timer_tag_count.iter().sum();
            prop_assert_eq!(tag_total as usize, summary.timer_tag_name.len());
            prop_assert_eq!(summary.timer_tag_name.len(), summary.timer_tag_value.len());
        }

        #[test]
        fn dictionary_is_unique_and_indices_in_range(timers in timer_sets()) {
            let request_tags = TagMap::from([("host", "a"), ("env", "prod")]);
            let summary = aggregate(&request_tags, &timers);

            let mut sorted = summary.dictionary.clone();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), summary.dictionary.len());

            let limit = u32::try_from(summary.dictionary.len()).unwrap_or(u32::MAX);
            let all_indices = summary
                .tag_name
                .iter()
                .chain(&summary.tag_value)
                .chain(&summary.timer_tag_name)
                .chain(&summary.timer_tag_value);
            for index in all_indices {
                prop_assert!(*index < limit);
            }
        }
    }

    fn timer_sets() -> impl Strategy<Value = Vec<Timer>> {
        let tags = prop::collection::vec(("[a-c]", "[x-z]"), 0..3);
        prop::collection::vec((tags, 0.0f64..10.0), 0..12).prop_map(|entries| {
            entries
                .into_iter()
                .map(|(pairs, value)| Timer::stopped(pairs.into_iter().collect(), value, TimerData::new()))
                .collect()
        })
    }
}
