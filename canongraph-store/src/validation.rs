//! Canon validation
//!
//! Checks a candidate node against the project's canon: constraint rules,
//! the style baseline, `conflicts_with` edges and near-duplicates. Every
//! check runs independently and contributes to one [`ValidationReport`].

use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ValidationConfig;
use crate::edge::{Direction, EdgeId, RelationshipType};
use crate::error::{KnowledgeError, Result};
use crate::node::{Node, NodeId};
use crate::repository::{CommitCheck, StoreView};
use crate::vector::cosine_similarity;

/// Machine-checkable predicate carried by a constraint node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintRule {
    /// None of the terms may appear in the node's text (case-insensitive)
    ForbidTerms { terms: Vec<String> },
    /// Every term must appear in the node's text (case-insensitive)
    RequireTerms { terms: Vec<String> },
    /// The property must be present and non-null
    RequireProperty { key: String },
    /// The property must equal `value`
    PropertyEquals { key: String, value: Value },
    /// The string property must match the regex
    PropertyMatches { key: String, pattern: String },
    /// The numeric property must lie within the bounds (inclusive)
    PropertyRange {
        key: String,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    /// The property must be one of `values`
    AllowedValues { key: String, values: Vec<Value> },
    /// Human guidance; never fails, surfaces as a suggestion
    Manual { guidance: String },
}

impl ConstraintRule {
    /// Reject rules that could never be evaluated
    pub fn validate(&self) -> Result<()> {
        match self {
            ConstraintRule::ForbidTerms { terms } | ConstraintRule::RequireTerms { terms } => {
                if terms.is_empty() || terms.iter().any(|t| t.trim().is_empty()) {
                    return Err(KnowledgeError::invalid_node("rule terms must be non-empty"));
                }
            }
            ConstraintRule::PropertyMatches { pattern, .. } => {
                Regex::new(pattern).map_err(|e| {
                    KnowledgeError::invalid_node(format!("invalid rule pattern: {}", e))
                })?;
            }
            ConstraintRule::PropertyRange { min, max, .. } => {
                if min.is_none() && max.is_none() {
                    return Err(KnowledgeError::invalid_node("range rule needs min or max"));
                }
                if let (Some(lo), Some(hi)) = (min, max) {
                    if lo > hi {
                        return Err(KnowledgeError::invalid_node("range rule has min > max"));
                    }
                }
            }
            ConstraintRule::Manual { guidance } if guidance.trim().is_empty() => {
                return Err(KnowledgeError::invalid_node("manual rule needs guidance"));
            }
            _ => {}
        }
        Ok(())
    }

    /// One-line rendering, also used in embedding text
    pub fn describe(&self) -> String {
        match self {
            ConstraintRule::ForbidTerms { terms } => format!("forbid {}", terms.join(", ")),
            ConstraintRule::RequireTerms { terms } => format!("require {}", terms.join(", ")),
            ConstraintRule::RequireProperty { key } => format!("property {} required", key),
            ConstraintRule::PropertyEquals { key, value } => format!("{} == {}", key, value),
            ConstraintRule::PropertyMatches { key, pattern } => format!("{} ~ /{}/", key, pattern),
            ConstraintRule::PropertyRange { key, min, max } => format!(
                "{} in [{}, {}]",
                key,
                min.map_or("-inf".to_string(), |v| v.to_string()),
                max.map_or("inf".to_string(), |v| v.to_string())
            ),
            ConstraintRule::AllowedValues { key, values } => {
                let rendered: Vec<String> = values.iter().map(Value::to_string).collect();
                format!("{} one of {}", key, rendered.join(", "))
            }
            ConstraintRule::Manual { guidance } => guidance.clone(),
        }
    }

    /// Evaluate against `node`; `Some(reason)` when the rule fails
    pub fn evaluate(&self, node: &Node) -> Option<String> {
        match self {
            ConstraintRule::ForbidTerms { terms } => {
                let text = node.searchable_text().to_lowercase();
                let found: Vec<&str> = terms
                    .iter()
                    .filter(|t| text.contains(&t.to_lowercase()))
                    .map(String::as_str)
                    .collect();
                (!found.is_empty()).then(|| format!("contains forbidden term(s): {}", found.join(", ")))
            }
            ConstraintRule::RequireTerms { terms } => {
                let text = node.searchable_text().to_lowercase();
                let missing: Vec<&str> = terms
                    .iter()
                    .filter(|t| !text.contains(&t.to_lowercase()))
                    .map(String::as_str)
                    .collect();
                (!missing.is_empty()).then(|| format!("missing required term(s): {}", missing.join(", ")))
            }
            ConstraintRule::RequireProperty { key } => match node.property_map().get(key) {
                Some(v) if !v.is_null() => None,
                _ => Some(format!("missing property '{}'", key)),
            },
            ConstraintRule::PropertyEquals { key, value } => {
                let actual = node.property_map().get(key).cloned().unwrap_or(Value::Null);
                (actual != *value).then(|| format!("'{}' is {}, expected {}", key, actual, value))
            }
            ConstraintRule::PropertyMatches { key, pattern } => {
                let map = node.property_map();
                let Some(actual) = map.get(key).and_then(Value::as_str) else {
                    return Some(format!("'{}' is not a string", key));
                };
                match Regex::new(pattern) {
                    Ok(re) if re.is_match(actual) => None,
                    Ok(_) => Some(format!("'{}' = {:?} does not match /{}/", key, actual, pattern)),
                    Err(e) => Some(format!("rule pattern /{}/ is invalid: {}", pattern, e)),
                }
            }
            ConstraintRule::PropertyRange { key, min, max } => {
                let map = node.property_map();
                let Some(actual) = map.get(key).and_then(Value::as_f64) else {
                    return Some(format!("'{}' is not a number", key));
                };
                let below = min.is_some_and(|lo| actual < lo);
                let above = max.is_some_and(|hi| actual > hi);
                (below || above).then(|| format!("'{}' = {} is out of range ({})", key, actual, self.describe()))
            }
            ConstraintRule::AllowedValues { key, values } => {
                let actual = node.property_map().get(key).cloned().unwrap_or(Value::Null);
                (!values.contains(&actual)).then(|| format!("'{}' = {} is not an allowed value", key, actual))
            }
            ConstraintRule::Manual { .. } => None,
        }
    }
}

/// Which check produced a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    StyleDrift,
    Constraint,
    Inconsistency,
    Duplicate,
}

/// Whether a violation stops the commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationAction {
    Block,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub action: ViolationAction,
    pub message: String,
    /// Constraint node that failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<NodeId>,
    /// Edge behind an inconsistency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<EdgeId>,
    /// Other node involved (duplicate or conflicting node)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

impl Violation {
    fn new(kind: ViolationKind, action: ViolationAction, message: impl Into<String>) -> Self {
        Self {
            kind,
            action,
            message: message.into(),
            constraint: None,
            edge: None,
            related: None,
            similarity: None,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.action == ViolationAction::Block
    }
}

/// Outcome of validating one node: `pending -> valid | violations_found`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    Pending,
    Valid,
    ViolationsFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub node_id: NodeId,
    pub state: ValidationState,
    /// False only if a blocking violation exists
    pub valid: bool,
    pub violations: Vec<Violation>,
    pub suggestions: Vec<String>,
}

impl ValidationReport {
    fn pending(node_id: NodeId) -> Self {
        Self {
            node_id,
            state: ValidationState::Pending,
            valid: true,
            violations: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    fn suggest(&mut self, suggestion: impl Into<String>) {
        let suggestion = suggestion.into();
        if !self.suggestions.contains(&suggestion) {
            self.suggestions.push(suggestion);
        }
    }

    fn finish(mut self) -> Self {
        self.valid = !self.violations.iter().any(Violation::is_blocking);
        self.state = if self.violations.is_empty() {
            ValidationState::Valid
        } else {
            ValidationState::ViolationsFound
        };
        self
    }

    /// Violations that block the commit
    pub fn blocking(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_blocking())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| !v.is_blocking())
    }

    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }
}

/// Runs the canon checks against a read view of the stores
#[derive(Debug, Clone)]
pub struct CanonValidator {
    config: ValidationConfig,
}

impl CanonValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Full validation of `candidate` against an explicit constraint set
    ///
    /// Non-constraint entries in `constraints` are ignored. The candidate
    /// must carry its embedding for the similarity checks to run.
    pub fn validate(
        &self,
        view: &StoreView<'_>,
        candidate: &Node,
        constraints: &[Node],
    ) -> Result<ValidationReport> {
        let mut report = ValidationReport::pending(candidate.id);

        self.check_constraints(&mut report, candidate, constraints);
        self.check_style_drift(&mut report, view, candidate)?;
        self.check_inconsistency(&mut report, view, candidate)?;
        self.check_duplicates(&mut report, view, candidate)?;

        Ok(report.finish())
    }

    /// Constraints linked to `candidate` by any edge plus every global one
    pub fn constraints_for(&self, view: &StoreView<'_>, candidate: &Node) -> Result<Vec<Node>> {
        let mut seen = BTreeSet::new();
        let mut constraints = Vec::new();

        if view.graph().contains_node(&candidate.id)? {
            for edge in view.graph().edges_of(&candidate.id, Direction::Both)? {
                let other = edge.other_end(&candidate.id);
                if let Some(node) = view.graph().get_node(&other)? {
                    if node.properties.as_constraint().is_some() && seen.insert(node.id) {
                        constraints.push(node);
                    }
                }
            }
        }

        for node in self.global_constraints(view)? {
            if seen.insert(node.id) {
                constraints.push(node);
            }
        }
        Ok(constraints)
    }

    fn global_constraints(&self, view: &StoreView<'_>) -> Result<Vec<Node>> {
        Ok(view
            .graph()
            .nodes()?
            .into_iter()
            .filter(|n| n.properties.as_constraint().is_some_and(|c| c.global))
            .collect())
    }

    /// Constraint rules only, against the global set (used before commits)
    pub fn check_write(&self, view: &StoreView<'_>, candidate: &Node) -> Result<ValidationReport> {
        let mut report = ValidationReport::pending(candidate.id);
        let constraints = self.global_constraints(view)?;
        self.check_constraints(&mut report, candidate, &constraints);
        Ok(report.finish())
    }

    fn check_constraints(&self, report: &mut ValidationReport, candidate: &Node, constraints: &[Node]) {
        for constraint_node in constraints {
            let Some(constraint) = constraint_node.properties.as_constraint() else {
                continue;
            };
            if constraint_node.id == candidate.id || !constraint.applies_to_type(candidate.node_type()) {
                continue;
            }

            if let ConstraintRule::Manual { guidance } = &constraint.rule {
                report.suggest(format!("{}: {}", constraint_node.name, guidance));
                continue;
            }

            if let Some(reason) = constraint.rule.evaluate(candidate) {
                let action = if constraint.enforced {
                    ViolationAction::Block
                } else {
                    ViolationAction::Warn
                };
                let mut violation = Violation::new(
                    ViolationKind::Constraint,
                    action,
                    format!("Constraint '{}' failed: {}", constraint_node.name, reason),
                );
                violation.constraint = Some(constraint_node.id);
                report.push(violation);
                report.suggest(format!(
                    "Revise '{}' to satisfy '{}' ({})",
                    candidate.name,
                    constraint_node.name,
                    constraint.rule.describe()
                ));
            }
        }
    }

    fn check_style_drift(&self, report: &mut ValidationReport, view: &StoreView<'_>, candidate: &Node) -> Result<()> {
        if candidate.embedding.is_empty() {
            return Ok(());
        }

        let mut similarities = Vec::new();
        for node in view.graph().nodes()? {
            if node.id == candidate.id || !node.has_tag(&self.config.style_baseline_tag) {
                continue;
            }
            if let Some(vector) = view.vectors().get(&node.id)? {
                similarities.push(cosine_similarity(&candidate.embedding, &vector));
            }
        }
        if similarities.is_empty() {
            return Ok(());
        }

        let average = similarities.iter().sum::<f32>() / similarities.len() as f32;
        if average < self.config.style_drift_threshold {
            let mut violation = Violation::new(
                ViolationKind::StyleDrift,
                ViolationAction::Warn,
                format!(
                    "Average similarity {:.3} to {} style baseline node(s) is below {:.2}",
                    average,
                    similarities.len(),
                    self.config.style_drift_threshold
                ),
            );
            violation.similarity = Some(average);
            report.push(violation);
            report.suggest(format!(
                "Compare '{}' with the nodes tagged '{}'",
                candidate.name, self.config.style_baseline_tag
            ));
        }
        Ok(())
    }

    fn check_inconsistency(&self, report: &mut ValidationReport, view: &StoreView<'_>, candidate: &Node) -> Result<()> {
        if !view.graph().contains_node(&candidate.id)? {
            return Ok(());
        }

        for edge in view.graph().edges_of(&candidate.id, Direction::Both)? {
            if edge.kind != RelationshipType::ConflictsWith {
                continue;
            }
            let other = edge.other_end(&candidate.id);
            let other_name = view
                .graph()
                .get_node(&other)?
                .map(|n| n.name)
                .unwrap_or_else(|| other.to_string());
            let mut violation = Violation::new(
                ViolationKind::Inconsistency,
                ViolationAction::Block,
                format!("'{}' conflicts with '{}' (edge {})", candidate.name, other_name, edge.id),
            );
            violation.edge = Some(edge.id.clone());
            violation.related = Some(other);
            report.push(violation);
        }
        Ok(())
    }

    fn check_duplicates(&self, report: &mut ValidationReport, view: &StoreView<'_>, candidate: &Node) -> Result<()> {
        if candidate.embedding.is_empty() || view.vectors().is_empty() {
            return Ok(());
        }

        let hits = view.vectors().query(
            &candidate.embedding,
            self.config.max_duplicates + 1,
            self.config.duplicate_threshold,
        )?;
        for hit in hits
            .into_iter()
            .filter(|h| h.node_id != candidate.id)
            .take(self.config.max_duplicates)
        {
            let other_name = view
                .graph()
                .get_node(&hit.node_id)?
                .map(|n| n.name)
                .unwrap_or_else(|| hit.node_id.to_string());
            let mut violation = Violation::new(
                ViolationKind::Duplicate,
                ViolationAction::Warn,
                format!(
                    "'{}' may duplicate '{}' (similarity {:.3})",
                    candidate.name, other_name, hit.similarity
                ),
            );
            violation.related = Some(hit.node_id);
            violation.similarity = Some(hit.similarity);
            report.push(violation);
        }
        Ok(())
    }
}

impl CommitCheck for CanonValidator {
    fn check(&self, view: &StoreView<'_>, candidate: &Node) -> Result<()> {
        let report = self.check_write(view, candidate)?;
        if report.valid {
            Ok(())
        } else {
            Err(KnowledgeError::ValidationBlocked(Box::new(report)))
        }
    }
}
