//! Stage gating rules.
//!
//! Each checking stage names two [`EquipmentItem`]s.  A snapshot clears the
//! stage when both read `pass`; otherwise the items reading `fail` are
//! reported as missing.  The pass check always runs first, so a snapshot that
//! clears a stage can never also be reported as a failure of it.

use clearance_types::{EquipmentItem, StageDefinition, StatusSnapshot};

/// Outcome of checking one stage against one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageVerdict {
    /// Every required item passed.
    Passed,
    /// At least one required item failed; the failing items in definition
    /// order.
    Failed { missing: Vec<EquipmentItem> },
}

/// Check `snapshot` against the requirements in `definition`.
pub fn evaluate(definition: &StageDefinition, snapshot: &StatusSnapshot) -> StageVerdict {
    if definition.items.iter().all(|&item| snapshot.reading(item).is_pass()) {
        return StageVerdict::Passed;
    }
    let missing = definition
        .items
        .iter()
        .copied()
        .filter(|&item| !snapshot.reading(item).is_pass())
        .collect();
    StageVerdict::Failed { missing }
}

/// Join item labels as `"a and b"` for log messages.
pub fn describe_items(items: &[EquipmentItem]) -> String {
    match items {
        [] => String::new(),
        [only] => only.label().to_string(),
        [init @ .., last] => {
            let head: Vec<&str> = init.iter().map(|i| i.label()).collect();
            format!("{} and {}", head.join(", "), last.label())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clearance_types::{EquipmentReading, STAGE_DEFINITIONS};

    fn snapshot() -> StatusSnapshot {
        StatusSnapshot::new(true, Utc::now())
    }

    #[test]
    fn both_items_pass_clears_stage() {
        let snap = snapshot()
            .with(EquipmentItem::Helmet, EquipmentReading::Pass)
            .with(EquipmentItem::Goggles, EquipmentReading::Pass);
        assert_eq!(evaluate(&STAGE_DEFINITIONS[0], &snap), StageVerdict::Passed);
    }

    #[test]
    fn one_failing_item_is_reported_missing() {
        let snap = snapshot()
            .with(EquipmentItem::Gloves, EquipmentReading::Fail)
            .with(EquipmentItem::Boots, EquipmentReading::Pass);
        assert_eq!(
            evaluate(&STAGE_DEFINITIONS[1], &snap),
            StageVerdict::Failed {
                missing: vec![EquipmentItem::Gloves]
            }
        );
    }

    #[test]
    fn both_failing_items_are_reported_in_order() {
        assert_eq!(
            evaluate(&STAGE_DEFINITIONS[2], &snapshot()),
            StageVerdict::Failed {
                missing: vec![EquipmentItem::Suit, EquipmentItem::Mask]
            }
        );
    }

    #[test]
    fn other_stages_items_do_not_matter() {
        let snap = snapshot()
            .with(EquipmentItem::Suit, EquipmentReading::Pass)
            .with(EquipmentItem::Mask, EquipmentReading::Pass);
        assert!(matches!(
            evaluate(&STAGE_DEFINITIONS[0], &snap),
            StageVerdict::Failed { .. }
        ));
    }

    #[test]
    fn describe_items_joins_labels() {
        assert_eq!(describe_items(&[]), "");
        assert_eq!(describe_items(&[EquipmentItem::Gloves]), "gloves");
        assert_eq!(
            describe_items(&[EquipmentItem::Helmet, EquipmentItem::Goggles]),
            "safety helmet and goggles"
        );
    }
}
