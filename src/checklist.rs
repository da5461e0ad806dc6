//! Document Checklist
//! publish 前に必要書類のチェックを要求する

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::draft::DraftListing;

pub const LOAN_NOC_OBTAINED: &str = "Yes-got NOC";
pub const WARRANTY_ACTIVE: &str = "At Present";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentItem {
    Insurance,
    PucCertificate,
    RoadTax,
    BatteryHealthProof,
    LoanNoc,
    WarrantyDocument,
}

impl DocumentItem {
    pub fn label(&self) -> &'static str {
        match self {
            DocumentItem::Insurance => "Insurance",
            DocumentItem::PucCertificate => "PUC certificate",
            DocumentItem::RoadTax => "Road tax status",
            DocumentItem::BatteryHealthProof => "Battery health proof",
            DocumentItem::LoanNoc => "Loan NOC",
            DocumentItem::WarrantyDocument => "Warranty document",
        }
    }
}

/// draft の回答に応じて表示される項目
pub fn visible_items(draft: &DraftListing) -> Vec<DocumentItem> {
    let mut items = vec![
        DocumentItem::Insurance,
        DocumentItem::PucCertificate,
        DocumentItem::RoadTax,
    ];

    let battery = draft
        .ownership
        .as_ref()
        .and_then(|o| o.battery_health.as_deref())
        .is_some_and(|b| !b.trim().is_empty());
    if battery {
        items.push(DocumentItem::BatteryHealthProof);
    }

    if let Some(condition) = draft.condition.as_ref() {
        if condition.loan_status.as_deref() == Some(LOAN_NOC_OBTAINED) {
            items.push(DocumentItem::LoanNoc);
        }
        if condition.warranty_status.as_deref() == Some(WARRANTY_ACTIVE) {
            items.push(DocumentItem::WarrantyDocument);
        }
    }

    items
}

/// 表示項目とチェック済み項目
#[derive(Debug, Clone)]
pub struct ChecklistState {
    visible: Vec<DocumentItem>,
    checked: HashSet<DocumentItem>,
}

impl ChecklistState {
    pub fn for_draft(draft: &DraftListing) -> Self {
        Self {
            visible: visible_items(draft),
            checked: HashSet::new(),
        }
    }

    pub fn with_checked(mut self, items: impl IntoIterator<Item = DocumentItem>) -> Self {
        self.checked.extend(items);
        self
    }

    pub fn check(&mut self, item: DocumentItem) {
        self.checked.insert(item);
    }

    pub fn uncheck(&mut self, item: DocumentItem) {
        self.checked.remove(&item);
    }

    pub fn visible(&self) -> &[DocumentItem] {
        &self.visible
    }

    /// 未チェックの表示項目（非表示項目のチェック有無は無関係）
    pub fn missing(&self) -> Vec<DocumentItem> {
        self.visible
            .iter()
            .copied()
            .filter(|i| !self.checked.contains(i))
            .collect()
    }

    pub fn can_publish(&self) -> bool {
        self.missing().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::{Condition, Ownership};

    fn full_draft() -> DraftListing {
        DraftListing {
            ownership: Some(Ownership {
                battery_health: Some("92%".into()),
                fuel_type: "Electric".into(),
                transmission_type: "Automatic".into(),
                ..Default::default()
            }),
            condition: Some(Condition {
                loan_status: Some(LOAN_NOC_OBTAINED.into()),
                warranty_status: Some(WARRANTY_ACTIVE.into()),
                accident_history: "None".into(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn default_checklist_has_three_items() {
        let mut state = ChecklistState::for_draft(&DraftListing::default());
        assert_eq!(state.visible().len(), 3);
        assert!(!state.can_publish());

        state.check(DocumentItem::Insurance);
        state.check(DocumentItem::PucCertificate);
        // 非表示項目をチェックしても関係ない
        state.check(DocumentItem::LoanNoc);
        assert!(!state.can_publish());

        state.check(DocumentItem::RoadTax);
        assert!(state.can_publish());

        state.uncheck(DocumentItem::RoadTax);
        assert_eq!(state.missing(), vec![DocumentItem::RoadTax]);
    }

    #[test]
    fn conditional_items_appear_from_answers() {
        let state = ChecklistState::for_draft(&full_draft());
        assert_eq!(state.visible().len(), 6);

        let mut state = state.with_checked([
            DocumentItem::Insurance,
            DocumentItem::PucCertificate,
            DocumentItem::RoadTax,
            DocumentItem::BatteryHealthProof,
            DocumentItem::LoanNoc,
        ]);
        assert!(!state.can_publish());
        state.check(DocumentItem::WarrantyDocument);
        assert!(state.can_publish());
    }

    #[test]
    fn loan_without_noc_does_not_require_document() {
        let mut draft = full_draft();
        draft.condition.as_mut().unwrap().loan_status = Some("Yes-no NOC".into());
        assert!(!visible_items(&draft).contains(&DocumentItem::LoanNoc));
    }
}
