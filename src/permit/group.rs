use std::collections::HashMap;

use crate::config::{Config, GroupingPolicy};
use super::{CoordinateRow, PermitGroup, PermitNumber, SpatialBucket};

/// Group rows with the configured policy.
pub fn group_rows<I>(rows: I, config: &Config) -> Vec<PermitGroup>
where
    I: IntoIterator<Item = CoordinateRow>,
{
    match config.policy {
        GroupingPolicy::KeyedBucket => group_keyed(rows, config),
        GroupingPolicy::Streaming => StreamingGroups::new(rows.into_iter()).collect(),
    }
}

/// Group rows by (permit number, spatial bucket), in first-appearance order.
///
/// Rows of the same permit need not be contiguous. A permit whose points
/// straddle the Y threshold is split into one group per bucket.
pub fn group_keyed<I>(rows: I, config: &Config) -> Vec<PermitGroup>
where
    I: IntoIterator<Item = CoordinateRow>,
{
    let mut groups: Vec<PermitGroup> = Vec::new();
    let mut index: HashMap<(PermitNumber, SpatialBucket), usize> = HashMap::new();

    for row in rows {
        let bucket = config.bucket_for(row.y);
        let i = *index.entry((row.permit, bucket)).or_insert_with(|| {
            groups.push(PermitGroup::new(row.permit, Some(bucket)));
            groups.len() - 1
        });
        groups[i].points.push(row.coord());
    }

    groups
}

/// Lazily groups contiguous runs of rows sharing a permit number.
///
/// A new group starts every time the permit number changes, so a permit that
/// reappears later yields a second group. The trailing run is emitted when
/// the underlying iterator is exhausted.
pub struct StreamingGroups<I> {
    rows: I,
    current: Option<PermitGroup>,
}

impl<I: Iterator<Item = CoordinateRow>> StreamingGroups<I> {
    pub fn new(rows: I) -> Self {
        Self { rows, current: None }
    }
}

impl<I: Iterator<Item = CoordinateRow>> Iterator for StreamingGroups<I> {
    type Item = PermitGroup;

    fn next(&mut self) -> Option<PermitGroup> {
        loop {
            let Some(row) = self.rows.next() else {
                return self.current.take();
            };

            match self.current.as_mut() {
                Some(group) if group.permit == row.permit => group.points.push(row.coord()),
                _ => {
                    let mut group = PermitGroup::new(row.permit, None);
                    group.points.push(row.coord());
                    if let Some(finished) = self.current.replace(group) {
                        return Some(finished);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(borne: u32, x: f64, y: f64, permit: f64) -> CoordinateRow {
        CoordinateRow { borne: borne.to_string(), x, y, permit: PermitNumber::new(permit).unwrap() }
    }

    fn sample() -> Vec<CoordinateRow> {
        vec![
            row(1, 0.0, 0.0, 100.0),
            row(2, 1.0, 0.0, 100.0),
            row(3, 1.0, 1.0, 100.0),
            row(4, 0.0, 0.0, 200.0),
        ]
    }

    #[test]
    fn keyed_groups_by_permit_and_bucket() {
        let groups = group_keyed(sample(), &Config::default());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].permit.value(), 100.0);
        assert_eq!(groups[0].bucket, Some(SpatialBucket::Sr1));
        assert_eq!(groups[0].len(), 3);
        assert_eq!(groups[1].permit.value(), 200.0);
        assert_eq!(groups[1].len(), 1);
    }

    #[test]
    fn keyed_accepts_interleaved_rows() {
        let rows = vec![
            row(1, 0.0, 0.0, 7.0),
            row(2, 5.0, 5.0, 8.0),
            row(3, 1.0, 0.0, 7.0),
            row(4, 1.0, 1.0, 7.0),
        ];
        let groups = group_keyed(rows, &Config::default());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].points.iter().map(|c| c.x).collect::<Vec<_>>(), vec![0.0, 1.0, 1.0]);
        assert_eq!(groups[1].len(), 1);
    }

    #[test]
    fn crossing_threshold_moves_point_to_other_bucket() {
        let mut rows = sample();
        rows[2].y = 300_000.0;
        let groups = group_keyed(rows, &Config::default());

        let sr1 = groups.iter().find(|g| g.permit.value() == 100.0 && g.bucket == Some(SpatialBucket::Sr1)).unwrap();
        let sr2 = groups.iter().find(|g| g.permit.value() == 100.0 && g.bucket == Some(SpatialBucket::Sr2)).unwrap();
        assert_eq!(sr1.len(), 2);
        assert_eq!(sr2.len(), 1);
        assert!(!sr1.can_build_polygon());
    }

    #[test]
    fn streaming_flushes_on_change_and_at_end() {
        let groups: Vec<_> = StreamingGroups::new(sample().into_iter()).collect();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 3);
        assert_eq!(groups[1].permit.value(), 200.0);
        assert_eq!(groups[1].len(), 1);
        assert!(groups.iter().all(|g| g.bucket.is_none()));
    }

    #[test]
    fn streaming_splits_non_contiguous_permit() {
        let rows = vec![
            row(1, 0.0, 0.0, 7.0),
            row(2, 5.0, 5.0, 8.0),
            row(3, 1.0, 0.0, 7.0),
        ];
        let groups: Vec<_> = StreamingGroups::new(rows.into_iter()).collect();
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.len() == 1));
    }

    #[test]
    fn streaming_empty_input() {
        let groups: Vec<_> = StreamingGroups::new(Vec::new().into_iter()).collect();
        assert!(groups.is_empty());
    }

    #[test]
    fn policy_dispatch() {
        let config = Config { policy: GroupingPolicy::Streaming, ..Config::default() };
        let groups = group_rows(sample(), &config);
        assert_eq!(groups[0].bucket, None);
    }
}
