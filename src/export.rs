//! Export types for serializing knowledge base state.
//!
//! These types provide human-readable representations of stored rules
//! suitable for JSON export.

use serde::{Deserialize, Serialize};

use crate::space::KnowledgeBase;

/// Exported rule with its atoms rendered in surface syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleExport {
    /// Insertion index (lower indices win first-match).
    pub index: usize,
    /// Pattern atom, e.g. `(priority $data)`.
    pub pattern: String,
    /// Body atom, e.g. `(FundingPriority $data)`.
    pub body: String,
}

/// Export every rule in insertion order.
pub fn export_rules(kb: &KnowledgeBase) -> Vec<RuleExport> {
    kb.rules()
        .iter()
        .enumerate()
        .map(|(index, rule)| RuleExport {
            index,
            pattern: rule.pattern.to_string(),
            body: rule.body.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_atom;

    #[test]
    fn exports_rules_in_order() {
        let mut kb = KnowledgeBase::new();
        kb.add_equality(&parse_atom("(= (priority $data) (FundingPriority $data))").unwrap())
            .unwrap();
        kb.add_equality(&parse_atom("(= (threshold HIGH) 0.50)").unwrap())
            .unwrap();

        let exported = export_rules(&kb);
        assert_eq!(exported.len(), 2);
        assert_eq!(exported[0].pattern, "(priority $data)");
        assert_eq!(exported[1].body, "0.50");

        let json = serde_json::to_string(&exported[1]).unwrap();
        assert_eq!(
            json,
            r#"{"index":1,"pattern":"(threshold HIGH)","body":"0.50"}"#
        );
    }
}
