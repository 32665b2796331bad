// Control mapper - decision policy from classification label to actuation
use crate::domain::control::{ControlSignal, Decision};

/// Labels containing any of `keywords` produce `decision`.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingRule {
    pub keywords: Vec<String>,
    pub decision: Decision,
}

impl MappingRule {
    pub fn new(keywords: &[&str], decision: Decision) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            decision,
        }
    }

    fn matches(&self, label: &str) -> bool {
        self.keywords.iter().any(|k| label.contains(k.as_str()))
    }
}

/// Ordered keyword table; the first matching rule wins, otherwise `fallback`.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlMapper {
    rules: Vec<MappingRule>,
    fallback: Decision,
}

impl ControlMapper {
    pub fn new(rules: Vec<MappingRule>, fallback: Decision) -> Self {
        Self { rules, fallback }
    }

    pub fn map(&self, label: &str) -> Decision {
        self.rules
            .iter()
            .find(|rule| rule.matches(label))
            .map(|rule| rule.decision)
            .unwrap_or(self.fallback)
    }
}

impl Default for ControlMapper {
    fn default() -> Self {
        let rules = vec![
            MappingRule::new(&["ruler"], Decision::Drive(ControlSignal::new(-1.0, 1.0))),
            MappingRule::new(&["bottle"], Decision::Drive(ControlSignal::new(1.0, -1.0))),
            MappingRule::new(&["ball"], Decision::Drive(ControlSignal::new(1.0, 1.0))),
            // coast: keep whatever command was last sent
            MappingRule::new(&["screw", "nail"], Decision::Hold),
        ];
        Self::new(rules, Decision::Drive(ControlSignal::STOP))
    }
}

/// Built-in policy.
#[cfg(test)]
pub fn map_label_to_control(label: &str) -> Decision {
    ControlMapper::default().map(label)
}
