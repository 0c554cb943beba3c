//! Invocation and capability analysis of a single link.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    link::{Capability, Category, DelegationLink, is_invoke_ability},
    value::ValueMap,
};

/// Whether a token reads as a plain delegation or as a task to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Grants authority.
    #[default]
    Delegation,
    /// Asks for something to be done.
    Invocation,
}

/// What a link asks for.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationAnalysis {
    /// Issuer and audience differ.
    pub is_invocation: bool,
    /// Some ability matches an invoke pattern.
    pub has_invoke_capability: bool,
    /// Delegation unless an invoke ability is present.
    pub task_type: TaskType,
    /// The last invoke ability, else the first ability.
    pub primary_action: String,
    /// Resource of the primary action.
    pub target_resource: String,
    /// Abilities matching an invoke pattern.
    pub invoke_patterns: Vec<String>,
    /// Every ability.
    pub required_permissions: Vec<String>,
    /// All caveats merged, later capabilities winning.
    pub constraints: ValueMap,
}

impl InvocationAnalysis {
    /// Analyze `link`.
    #[must_use]
    pub fn of(link: &DelegationLink) -> Self {
        let mut analysis = Self {
            is_invocation: link.issuer != link.audience,
            ..Self::default()
        };

        for capability in &link.capabilities {
            if is_invoke_ability(capability.ability()) {
                analysis.has_invoke_capability = true;
                analysis.task_type = TaskType::Invocation;
                analysis.invoke_patterns.push(capability.ability().to_string());
                analysis.primary_action = capability.ability().to_string();
                analysis.target_resource = capability.resource().to_string();
            }
            if !capability.ability().is_empty() {
                analysis
                    .required_permissions
                    .push(capability.ability().to_string());
            }
            analysis.constraints.extend(
                capability
                    .caveats()
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone())),
            );
        }

        if analysis.primary_action.is_empty() {
            if let Some(first) = link.primary_capability() {
                analysis.primary_action = first.ability().to_string();
                analysis.target_resource = first.resource().to_string();
            }
        }

        analysis
    }
}

/// The task an invocation describes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Primary action.
    pub action: String,
    /// Resource acted on.
    pub resource: String,
    /// Merged caveats.
    pub constraints: ValueMap,
    /// Who asks.
    pub issuer: String,
    /// Who is asked.
    pub target: String,
    /// Kind of task.
    pub task_type: TaskType,
    /// Every ability.
    pub permissions: Vec<String>,
}

/// Capabilities of a link, grouped and counted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityAnalysis {
    /// Capabilities by category.
    pub categories: BTreeMap<Category, Vec<Capability>>,
    /// Number of capabilities.
    pub total_count: usize,
    /// Capabilities whose ability matches an invoke pattern.
    pub invoke_count: usize,
    /// All other capabilities.
    pub delegate_count: usize,
    /// Every non-empty ability.
    pub permissions: Vec<String>,
    /// Every non-empty resource.
    pub resources: Vec<String>,
}

impl CapabilityAnalysis {
    /// Analyze `capabilities`.
    #[must_use]
    pub fn of(capabilities: &[Capability]) -> Self {
        let mut analysis = Self {
            total_count: capabilities.len(),
            ..Self::default()
        };

        for capability in capabilities {
            analysis
                .categories
                .entry(capability.category())
                .or_default()
                .push(capability.clone());

            if is_invoke_ability(capability.ability()) {
                analysis.invoke_count += 1;
            } else {
                analysis.delegate_count += 1;
            }

            if !capability.ability().is_empty() {
                analysis.permissions.push(capability.ability().to_string());
            }
            if !capability.resource().is_empty() {
                analysis.resources.push(capability.resource().to_string());
            }
        }

        analysis
    }
}

/// A link together with its invocation and capability analyses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationReport {
    /// The analyzed link.
    pub delegation: DelegationLink,
    /// Issuer and audience differ.
    pub is_invocation: bool,
    /// The task, for invocations.
    pub task: Option<Task>,
    /// Invocation analysis.
    pub invocation_analysis: InvocationAnalysis,
    /// Capability analysis.
    pub capability_analysis: CapabilityAnalysis,
}

impl InvocationReport {
    /// Analyze `delegation`.
    #[must_use]
    pub fn new(delegation: DelegationLink) -> Self {
        let invocation_analysis = InvocationAnalysis::of(&delegation);
        let capability_analysis = CapabilityAnalysis::of(&delegation.capabilities);

        let task = invocation_analysis.is_invocation.then(|| Task {
            action: invocation_analysis.primary_action.clone(),
            resource: invocation_analysis.target_resource.clone(),
            constraints: invocation_analysis.constraints.clone(),
            issuer: delegation.issuer.clone(),
            target: delegation.audience.clone(),
            task_type: invocation_analysis.task_type,
            permissions: invocation_analysis.required_permissions.clone(),
        });

        Self {
            is_invocation: invocation_analysis.is_invocation,
            delegation,
            task,
            invocation_analysis,
            capability_analysis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        signature::{Algorithm, SignatureInfo},
        value::Value,
    };
    use pretty_assertions::assert_eq;

    fn link(capabilities: Vec<Capability>) -> DelegationLink {
        DelegationLink {
            issuer: "did:key:alice".into(),
            audience: "did:key:service".into(),
            capabilities,
            proofs: vec![],
            expiration: None,
            not_before: None,
            facts: vec![],
            nonce: None,
            signature: SignatureInfo {
                algorithm: Algorithm::Unknown,
                verified: false,
                valid: false,
                error: None,
            },
            content_id: "bafy".into(),
            level: 0,
        }
    }

    #[test]
    fn it_picks_the_invoke_ability_as_primary_action() {
        let mut caveats = ValueMap::new();
        caveats.insert("size".into(), Value::Int(10));
        let report = InvocationReport::new(link(vec![
            Capability::new("storage:alice", "store/add", ValueMap::new()),
            Capability::new("job:1", "task/execute", caveats),
        ]));

        let analysis = &report.invocation_analysis;
        assert!(report.is_invocation);
        assert_eq!(analysis.task_type, TaskType::Invocation);
        assert_eq!(analysis.primary_action, "task/execute");
        assert_eq!(analysis.target_resource, "job:1");
        assert_eq!(analysis.required_permissions, vec!["store/add", "task/execute"]);
        assert_eq!(analysis.constraints.get("size"), Some(&Value::Int(10)));

        let task = report.task.unwrap();
        assert_eq!(task.target, "did:key:service");
        assert_eq!(task.action, "task/execute");
    }

    #[test]
    fn it_falls_back_to_the_first_capability() {
        let analysis = InvocationAnalysis::of(&link(vec![Capability::new(
            "storage:alice",
            "store/add",
            ValueMap::new(),
        )]));
        assert_eq!(analysis.task_type, TaskType::Delegation);
        assert_eq!(analysis.primary_action, "store/add");
        assert!(analysis.invoke_patterns.is_empty());
    }

    #[test]
    fn it_groups_capabilities_by_category() {
        let analysis = CapabilityAnalysis::of(&[
            Capability::new("storage:alice", "store/add", ValueMap::new()),
            Capability::new("storage:alice", "store/list", ValueMap::new()),
            Capability::new("job:1", "task/run", ValueMap::new()),
        ]);
        assert_eq!(analysis.total_count, 3);
        assert_eq!(analysis.invoke_count, 1);
        assert_eq!(analysis.delegate_count, 2);
        assert_eq!(analysis.categories[&Category::Storage].len(), 2);

        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["categories"]["invocation"][0]["can"], "task/run");
    }
}
