//! Retention rules and the pure deletion planner.
//!
//! Rules apply in a fixed order, each to what the previous one left:
//!
//! 1. TTL: any point older than `ttl` goes, whatever its partition.
//! 2. Partition cap: each partition keeps its `max_per_partition` newest.
//! 3. Global cap: the whole collection keeps its `global_max` newest.
//!
//! A point without a timestamp sorts before every dated point, so it is the
//! first to go under any active rule. Points with equal timestamps are
//! ordered by ascending id. Points without a partition are only subject to
//! TTL and the global cap.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use vectorsync_common::PointId;
use vectorsync_config::RetentionConfig;

use crate::point::RetainedPoint;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub ttl: Option<Duration>,
    pub max_per_partition: Option<usize>,
    pub global_max: Option<usize>,
}

impl From<&RetentionConfig> for RetentionPolicy {
    fn from(config: &RetentionConfig) -> Self {
        Self {
            ttl: config.ttl_secs.map(Duration::from_secs),
            max_per_partition: config.max_per_partition,
            global_max: config.global_max,
        }
    }
}

impl RetentionPolicy {
    /// True when no rule is active and a sweep can never delete anything.
    pub fn is_empty(&self) -> bool {
        self.ttl.is_none() && self.max_per_partition.is_none() && self.global_max.is_none()
    }
}

/// Points selected for deletion, grouped by the rule that selected them.
/// Each point appears in at most one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    pub by_ttl: Vec<PointId>,
    pub by_partition_cap: Vec<PointId>,
    pub by_global_cap: Vec<PointId>,
    pub missing_timestamp: usize,
}

impl DeletionPlan {
    pub fn total(&self) -> usize {
        self.by_ttl.len() + self.by_partition_cap.len() + self.by_global_cap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Compute what `policy` deletes from `points` at time `now`.
pub fn plan(points: &[RetainedPoint], policy: &RetentionPolicy, now: DateTime<Utc>) -> DeletionPlan {
    let mut ordered: Vec<&RetainedPoint> = points.iter().collect();
    ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

    let mut result = DeletionPlan {
        missing_timestamp: points.iter().filter(|p| p.timestamp.is_none()).count(),
        ..DeletionPlan::default()
    };

    if let Some(ttl) = policy.ttl {
        let cutoff = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_sub_signed(ttl));
        let (expired, kept): (Vec<&RetainedPoint>, Vec<&RetainedPoint>) =
            ordered.into_iter().partition(|p| match (p.timestamp, cutoff) {
                (None, _) => true,
                (Some(ts), Some(cutoff)) => ts < cutoff,
                (Some(_), None) => false,
            });
        result.by_ttl = expired.into_iter().map(|p| p.id.clone()).collect();
        ordered = kept;
    }

    if let Some(max) = policy.max_per_partition {
        let mut partitions: BTreeMap<&str, Vec<&RetainedPoint>> = BTreeMap::new();
        for &point in &ordered {
            if let Some(partition) = point.partition.as_deref() {
                partitions.entry(partition).or_default().push(point);
            }
        }

        let mut dropped = HashSet::new();
        for members in partitions.values() {
            let excess = members.len().saturating_sub(max);
            for &point in &members[..excess] {
                dropped.insert(&point.id);
                result.by_partition_cap.push(point.id.clone());
            }
        }
        ordered.retain(|p| !dropped.contains(&p.id));
    }

    if let Some(max) = policy.global_max {
        let excess = ordered.len().saturating_sub(max);
        result.by_global_cap = ordered[..excess].iter().map(|p| p.id.clone()).collect();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::{RetentionPolicy, plan};
    use crate::point::RetainedPoint;
    use chrono::{DateTime, Utc};
    use std::time::Duration;
    use vectorsync_common::PointId;

    const NOW: i64 = 1_700_000_000;
    const DAY: i64 = 86_400;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(NOW, 0).unwrap()
    }

    fn point(id: u64, partition: Option<&str>, age_days: Option<i64>) -> RetainedPoint {
        RetainedPoint {
            id: PointId::Num(id),
            partition: partition.map(str::to_string),
            timestamp: age_days.map(|d| DateTime::from_timestamp(NOW - d * DAY, 0).unwrap()),
        }
    }

    fn ids(list: &[PointId]) -> Vec<u64> {
        list.iter()
            .map(|id| match id {
                PointId::Num(n) => *n,
                PointId::Uuid(_) => panic!("unexpected uuid"),
            })
            .collect()
    }

    #[test]
    fn empty_policy_deletes_nothing() {
        let points = vec![point(1, Some("a"), Some(500)), point(2, None, None)];
        let result = plan(&points, &RetentionPolicy::default(), now());
        assert!(result.is_empty());
        assert_eq!(result.missing_timestamp, 1);
    }

    #[test]
    fn ttl_wins_even_when_caps_are_not_reached() {
        let points = vec![
            point(1, Some("a"), Some(100)),
            point(2, Some("a"), Some(1)),
            point(3, Some("b"), Some(2)),
        ];
        let policy = RetentionPolicy {
            ttl: Some(Duration::from_secs(30 * DAY as u64)),
            max_per_partition: Some(10),
            global_max: Some(10),
        };

        let result = plan(&points, &policy, now());

        assert_eq!(ids(&result.by_ttl), vec![1]);
        assert!(result.by_partition_cap.is_empty());
        assert!(result.by_global_cap.is_empty());
    }

    #[test]
    fn partition_cap_keeps_the_newest() {
        let points: Vec<_> = (0..10).map(|i| point(i, Some("chat"), Some(i as i64))).collect();
        let policy = RetentionPolicy {
            max_per_partition: Some(3),
            ..RetentionPolicy::default()
        };

        let result = plan(&points, &policy, now());

        // Ids 0..=2 are the three youngest.
        assert_eq!(ids(&result.by_partition_cap), vec![9, 8, 7, 6, 5, 4, 3]);
        assert_eq!(result.total(), 7);
    }

    #[test]
    fn rules_do_not_double_count() {
        let points = vec![
            point(1, Some("a"), Some(90)),
            point(2, Some("a"), Some(5)),
            point(3, Some("a"), Some(4)),
            point(4, Some("a"), Some(3)),
            point(5, Some("b"), Some(2)),
            point(6, Some("b"), Some(1)),
        ];
        let policy = RetentionPolicy {
            ttl: Some(Duration::from_secs(30 * DAY as u64)),
            max_per_partition: Some(2),
            global_max: Some(3),
        };

        let result = plan(&points, &policy, now());

        assert_eq!(ids(&result.by_ttl), vec![1]);
        assert_eq!(ids(&result.by_partition_cap), vec![2]);
        assert_eq!(ids(&result.by_global_cap), vec![3]);
        assert_eq!(result.total(), 3);
    }

    #[test]
    fn missing_timestamps_go_first_under_every_rule() {
        let undated = point(50, Some("a"), None);
        let dated = vec![point(1, Some("a"), Some(3)), point(2, Some("a"), Some(1))];

        let mut points = dated.clone();
        points.push(undated.clone());
        let ttl_only = RetentionPolicy {
            ttl: Some(Duration::from_secs(365 * DAY as u64)),
            ..RetentionPolicy::default()
        };
        let result = plan(&points, &ttl_only, now());
        assert_eq!(ids(&result.by_ttl), vec![50]);
        assert_eq!(result.missing_timestamp, 1);

        let cap_only = RetentionPolicy {
            max_per_partition: Some(2),
            ..RetentionPolicy::default()
        };
        assert_eq!(ids(&plan(&points, &cap_only, now()).by_partition_cap), vec![50]);

        let global_only = RetentionPolicy {
            global_max: Some(2),
            ..RetentionPolicy::default()
        };
        assert_eq!(ids(&plan(&points, &global_only, now()).by_global_cap), vec![50]);
    }

    #[test]
    fn equal_timestamps_break_ties_by_id() {
        let points = vec![
            point(30, Some("a"), Some(1)),
            point(10, Some("a"), Some(1)),
            point(20, Some("a"), Some(1)),
        ];
        let policy = RetentionPolicy {
            global_max: Some(1),
            ..RetentionPolicy::default()
        };
        assert_eq!(ids(&plan(&points, &policy, now()).by_global_cap), vec![10, 20]);
    }

    #[test]
    fn unpartitioned_points_skip_the_partition_cap() {
        let points = vec![
            point(1, None, Some(10)),
            point(2, None, Some(9)),
            point(3, None, Some(8)),
        ];
        let policy = RetentionPolicy {
            max_per_partition: Some(1),
            global_max: Some(2),
            ..RetentionPolicy::default()
        };

        let result = plan(&points, &policy, now());

        assert!(result.by_partition_cap.is_empty());
        assert_eq!(ids(&result.by_global_cap), vec![1]);
    }

    #[test]
    fn future_timestamps_are_not_expired() {
        let points = vec![point(1, None, Some(-3))];
        let policy = RetentionPolicy {
            ttl: Some(Duration::from_secs(DAY as u64)),
            ..RetentionPolicy::default()
        };
        assert!(plan(&points, &policy, now()).is_empty());
    }
}
