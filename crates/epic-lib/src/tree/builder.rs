use super::{Hierarchy, NodeData};
use crate::criteria::{MissingPolicy, SplitCriterion, SplitValue};
use crate::custom::SELECTED_FLAG;
use crate::error::{Result, TreeError};
use crate::record::{EpochId, EpochStore};
use log::warn;
use std::collections::HashMap;

/// Partitions an [`EpochStore`] by an ordered list of criteria.
///
/// Children appear in the order their split value is first met while
/// scanning the records left to right; values are compared by equality,
/// never sorted.
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    criteria: Vec<SplitCriterion>,
    policy: MissingPolicy,
    overrides: HashMap<String, MissingPolicy>,
}

impl TreeBuilder {
    pub fn new<I, C>(criteria: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<SplitCriterion>,
    {
        Self {
            criteria: criteria.into_iter().map(Into::into).collect(),
            policy: MissingPolicy::default(),
            overrides: HashMap::new(),
        }
    }

    pub fn missing_policy(mut self, policy: MissingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the missing-value policy for the criterion named `name`.
    pub fn missing_policy_for(mut self, name: impl Into<String>, policy: MissingPolicy) -> Self {
        self.overrides.insert(name.into(), policy);
        self
    }

    pub fn criteria(&self) -> &[SplitCriterion] {
        &self.criteria
    }

    pub fn split_keys(&self) -> Vec<String> {
        self.criteria.iter().map(|c| c.name().to_string()).collect()
    }

    fn policy_for(&self, criterion: &SplitCriterion) -> MissingPolicy {
        self.overrides
            .get(criterion.name())
            .copied()
            .unwrap_or(self.policy)
    }

    pub(crate) fn build(&self, store: &EpochStore) -> Result<Hierarchy> {
        let mut nodes = vec![NodeData::default()];
        self.split(store, &mut nodes, 0, store.ids().collect(), 0)?;
        mark_fully_selected(store, &mut nodes);
        Ok(Hierarchy { nodes })
    }

    fn split(
        &self,
        store: &EpochStore,
        nodes: &mut Vec<NodeData>,
        node: usize,
        members: Vec<EpochId>,
        level: usize,
    ) -> Result<()> {
        let Some(criterion) = self.criteria.get(level) else {
            nodes[node].epochs = members;
            return Ok(());
        };

        let mut groups: Vec<(SplitValue, Vec<EpochId>)> = Vec::new();
        let mut unresolved = 0usize;
        for id in members {
            let record = store.get(id).ok_or(TreeError::UnknownEpoch(id.index()))?;
            let value = match criterion.evaluate(record) {
                Some(value) => SplitValue::Value(value),
                None => match self.policy_for(criterion) {
                    MissingPolicy::Sentinel => {
                        unresolved += 1;
                        SplitValue::Undefined
                    }
                    MissingPolicy::Fail => {
                        return Err(TreeError::UnresolvedCriterion {
                            criterion: criterion.name().to_string(),
                            epoch: id.index(),
                        })
                    }
                },
            };
            match groups.iter_mut().find(|(existing, _)| *existing == value) {
                Some((_, group)) => group.push(id),
                None => groups.push((value, vec![id])),
            }
        }
        if unresolved > 0 {
            warn!(
                "{} epochs have no value for `{}`; grouped as undefined",
                unresolved,
                criterion.name()
            );
        }

        let depth = nodes[node].depth + 1;
        for (value, group) in groups {
            let child = nodes.len();
            nodes.push(NodeData {
                split_key: Some(criterion.name().to_string()),
                split_value: Some(value),
                parent: Some(node),
                depth,
                ..NodeData::default()
            });
            nodes[node].children.push(child);
            self.split(store, nodes, child, group, level + 1)?;
        }
        Ok(())
    }
}

/// Seed every node's selection display flag: set when the node has epochs
/// and all of them are selected.
fn mark_fully_selected(store: &EpochStore, nodes: &mut [NodeData]) {
    let mut totals = vec![(0usize, 0usize); nodes.len()];
    for index in (0..nodes.len()).rev() {
        let (mut total, mut selected) = totals[index];
        for id in &nodes[index].epochs {
            total += 1;
            if store.get(*id).map(|r| r.is_selected).unwrap_or(false) {
                selected += 1;
            }
        }
        totals[index] = (total, selected);
        if let Some(parent) = nodes[index].parent {
            totals[parent].0 += total;
            totals[parent].1 += selected;
        }
        nodes[index]
            .custom
            .put(SELECTED_FLAG, total > 0 && selected == total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EpochRecord;
    use crate::tree::EpochTree;
    use serde_json::{json, Value};

    fn store_of(values: &[Value]) -> EpochStore {
        EpochStore::from_records(
            values
                .iter()
                .map(|v| EpochRecord::new(json!({ "k": v.clone(), "n": 1 })))
                .collect(),
        )
    }

    #[test]
    fn children_follow_first_encounter_order() {
        let store = store_of(&[json!("b"), json!("a"), json!("b"), json!("c"), json!("a")]);
        let tree = EpochTree::build(store, &TreeBuilder::new(["k"])).unwrap();
        let labels: Vec<String> = tree.root().children().map(|c| c.label()).collect();
        assert_eq!(labels, vec!["b", "a", "c"]);
        let counts: Vec<usize> = tree.root().children().map(|c| c.epoch_count()).collect();
        assert_eq!(counts, vec![2, 2, 1]);
    }

    #[test]
    fn groups_by_value_equality() {
        let store = store_of(&[json!({"x": 1}), json!({"x": 1}), json!([1, 2]), json!([1, 2])]);
        let tree = EpochTree::build(store, &TreeBuilder::new(["k"])).unwrap();
        assert_eq!(tree.root().child_count(), 2);
    }

    #[test]
    fn integer_and_float_spellings_share_a_child() {
        let store = store_of(&[json!(1), json!(1.0), json!(2), json!(1)]);
        let tree = EpochTree::build(store, &TreeBuilder::new(["k"])).unwrap();
        assert_eq!(tree.root().child_count(), 2);
        let one = tree.root().child_by_split_value(&1i64.into()).unwrap();
        assert_eq!(one.epoch_count(), 3);
        assert_eq!(
            tree.root()
                .child_by_split_value(&SplitValue::from(2.0))
                .map(|n| n.epoch_count()),
            Some(1)
        );
    }

    #[test]
    fn unresolved_values_use_sentinel_by_default() {
        let mut store = store_of(&[json!("a")]);
        store.push(EpochRecord::new(json!({ "n": 1 })));
        store.push(EpochRecord::new(json!({ "k": null })));
        let tree = EpochTree::build(store, &TreeBuilder::new(["k"])).unwrap();
        let undefined = tree
            .root()
            .child_by_split_value(&SplitValue::Undefined)
            .expect("sentinel child");
        assert_eq!(undefined.epoch_count(), 2);
        assert_eq!(tree.root().epoch_count(), 3);
    }

    #[test]
    fn fail_policy_aborts_build() {
        let mut store = store_of(&[json!("a")]);
        store.push(EpochRecord::new(json!({ "n": 1 })));
        let err = EpochTree::build(store, &TreeBuilder::new(["k"]).missing_policy(MissingPolicy::Fail))
            .unwrap_err();
        assert_eq!(
            err,
            TreeError::UnresolvedCriterion {
                criterion: "k".into(),
                epoch: 1
            }
        );
    }

    #[test]
    fn per_criterion_override_wins() {
        let mut store = store_of(&[json!("a")]);
        store.push(EpochRecord::new(json!({ "n": 1 })));
        let builder = TreeBuilder::new(["n", "k"])
            .missing_policy(MissingPolicy::Fail)
            .missing_policy_for("k", MissingPolicy::Sentinel);
        let tree = EpochTree::build(store, &builder).unwrap();
        let n = tree.root().child_at(0).unwrap();
        assert_eq!(n.child_count(), 2);
        assert!(n.child_at(1).unwrap().split_value().unwrap().is_undefined());
    }

    #[test]
    fn no_criteria_makes_root_a_leaf() {
        let store = store_of(&[json!("a"), json!("b")]);
        let tree = EpochTree::build(store, &TreeBuilder::default()).unwrap();
        assert!(tree.root().is_leaf());
        assert_eq!(tree.root().epochs().len(), 2);
    }

    #[test]
    fn only_leaves_hold_epochs() {
        let store = store_of(&[json!("a"), json!("b"), json!("a")]);
        let tree = EpochTree::build(store, &TreeBuilder::new(["k", "n"])).unwrap();
        for index in 0..tree.node_count() {
            let data = tree.data(index);
            assert_eq!(data.is_leaf(), !data.epochs.is_empty());
        }
    }

    #[test]
    fn seeds_selection_flags_from_epochs() {
        let mut store = store_of(&[json!("a"), json!("b")]);
        store.set_selected(EpochId(1), false).unwrap();
        let tree = EpochTree::build(store, &TreeBuilder::new(["k"])).unwrap();
        assert!(tree.root().child_at(0).unwrap().is_selected());
        assert!(!tree.root().child_at(1).unwrap().is_selected());
        assert!(!tree.root().is_selected());
    }

    #[test]
    fn function_criteria_split_like_key_paths() {
        let store = store_of(&[json!(1), json!(5), json!(7)]);
        let bucket = crate::criteria::SplitCriterion::function("k > 2", |r: &EpochRecord| {
            r.attribute("k").and_then(Value::as_i64).map(|k| Value::Bool(k > 2))
        });
        let tree = EpochTree::build(store, &TreeBuilder::new([bucket])).unwrap();
        assert_eq!(tree.root().child_count(), 2);
        assert_eq!(tree.root().child_at(0).unwrap().split_key(), Some("k > 2"));
        assert_eq!(
            tree.root()
                .child_by_split_value(&SplitValue::from(true))
                .map(|n| n.epoch_count()),
            Some(2)
        );
    }
}
