use crate::schema::Dataset;

use super::runner::TaskOutcome;

/// Merges datasets in order into one key-unique dataset.
///
/// - A key already present is never replaced: the first dataset that
///   introduces a key fixes its label and flag
/// - Records keep their first-seen order
/// - Inputs are not modified
pub fn merge<'a, I>(datasets: I) -> Dataset
where
    I: IntoIterator<Item = &'a Dataset>,
{
    let mut merged = Dataset::new();
    for dataset in datasets {
        for record in dataset {
            if !merged.contains_key(&record.key) {
                merged.insert(record.clone());
            }
        }
    }
    merged
}

/// Merges the datasets of `outcomes`; failed outcomes contribute nothing.
pub fn merge_outcomes(outcomes: &[TaskOutcome]) -> Dataset {
    merge(outcomes.iter().filter_map(TaskOutcome::dataset))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::collector::runner::UnitResult;
    use crate::collector::scroller::StopReason;
    use crate::collector::TaskDescriptor;
    use crate::feeds::source::FeedVariant;
    use crate::schema::Record;

    fn dataset(records: &[(&str, &str, bool)]) -> Dataset {
        records
            .iter()
            .map(|(k, l, f)| Record::new(*k, *l, *f))
            .collect()
    }

    #[test]
    fn first_seen_wins() {
        let d1 = dataset(&[("k", "from d1", false), ("x", "x", false)]);
        let d2 = dataset(&[("k", "from d2", true), ("y", "y", true)]);

        let merged = merge([&d1, &d2]);

        assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["k", "x", "y"]);
        let k = merged.get("k").unwrap();
        assert_eq!(k.label, "from d1");
        assert!(!k.flag);
    }

    #[test]
    fn merging_with_itself_is_idempotent() {
        let d = dataset(&[("a", "A", true), ("b", "B", false)]);
        assert_eq!(merge([&d, &d]), d);
    }

    #[test]
    fn result_keys_are_unique() {
        let inputs = vec![
            dataset(&[("a", "1", false), ("b", "1", false)]),
            dataset(&[("b", "2", false), ("c", "2", false)]),
            dataset(&[("c", "3", false), ("a", "3", false), ("d", "3", true)]),
        ];
        let merged = merge(&inputs);

        let unique: HashSet<&str> = merged.keys().collect();
        assert_eq!(unique.len(), merged.len());
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn inputs_are_left_untouched() {
        let d1 = dataset(&[("a", "A", false)]);
        let d2 = dataset(&[("b", "B", false)]);
        let before = (d1.clone(), d2.clone());

        let _ = merge([&d1, &d2]);

        assert_eq!((d1, d2), before);
    }

    #[test]
    fn failed_outcomes_merge_as_empty() {
        let ok = TaskOutcome {
            descriptor: TaskDescriptor {
                query: "X".into(),
                variant: FeedVariant::Top,
                scroll_limit: 1,
            },
            result: UnitResult::Collected {
                dataset: dataset(&[("a", "A", false)]),
                iterations: 1,
                stop: StopReason::LimitReached,
            },
        };
        let failed = TaskOutcome::failed(
            TaskDescriptor {
                query: "X".into(),
                variant: FeedVariant::Latest,
                scroll_limit: 1,
            },
            "unreachable",
        );

        let merged = merge_outcomes(&[failed, ok]);
        assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["a"]);
        assert!(merge_outcomes(&[]).is_empty());
    }
}
