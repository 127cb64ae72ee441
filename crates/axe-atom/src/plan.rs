//! Plan hierarchy and the derived aggregate status
//!
//! A plan is the top-level unit of work: phases contain milestones,
//! milestones contain tasks, and tasks decompose into atoms at run time.
//! The aggregate status is derived from atom outcomes, never stored.

use crate::ids::{MilestoneId, PhaseId, PlanId, TaskId};
use serde::{Deserialize, Serialize};

/// One task's source payload and target, as handed to the decomposer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Task identifier
    pub id: TaskId,
    /// Human-readable description
    pub description: String,
    /// Source payload (code or natural-language spec)
    pub payload: String,
    /// Target file the task's atoms land in
    pub target_file: String,
    /// Language tag
    pub language: String,
}

impl TaskSpec {
    /// Create a new task spec
    #[must_use]
    pub fn new(description: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            description: description.into(),
            payload: payload.into(),
            target_file: String::new(),
            language: String::new(),
        }
    }

    /// With target file
    #[inline]
    #[must_use]
    pub fn with_target_file(mut self, file: impl Into<String>) -> Self {
        self.target_file = file.into();
        self
    }

    /// With language tag
    #[inline]
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

/// A milestone groups sibling tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    /// Milestone identifier
    pub id: MilestoneId,
    /// Milestone name
    pub name: String,
    /// Tasks in this milestone
    pub tasks: Vec<TaskSpec>,
}

impl Milestone {
    /// Create an empty milestone
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: MilestoneId::new(),
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    /// With a task
    #[inline]
    #[must_use]
    pub fn with_task(mut self, task: TaskSpec) -> Self {
        self.tasks.push(task);
        self
    }
}

/// A phase groups milestones
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    /// Phase identifier
    pub id: PhaseId,
    /// Phase name
    pub name: String,
    /// Milestones in this phase
    pub milestones: Vec<Milestone>,
}

impl Phase {
    /// Create an empty phase
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PhaseId::new(),
            name: name.into(),
            milestones: Vec::new(),
        }
    }

    /// With a milestone
    #[inline]
    #[must_use]
    pub fn with_milestone(mut self, milestone: Milestone) -> Self {
        self.milestones.push(milestone);
        self
    }
}

/// The top-level unit of work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Plan identifier
    pub id: PlanId,
    /// Plan name
    pub name: String,
    /// Phases in declared order
    pub phases: Vec<Phase>,
}

impl Plan {
    /// Create an empty plan
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PlanId::new(),
            name: name.into(),
            phases: Vec::new(),
        }
    }

    /// With a phase
    #[inline]
    #[must_use]
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phases.push(phase);
        self
    }

    /// All tasks in declared order
    pub fn tasks(&self) -> impl Iterator<Item = &TaskSpec> {
        self.phases
            .iter()
            .flat_map(|p| p.milestones.iter())
            .flat_map(|m| m.tasks.iter())
    }

    /// All milestones in declared order
    pub fn milestones(&self) -> impl Iterator<Item = &Milestone> {
        self.phases.iter().flat_map(|p| p.milestones.iter())
    }

    /// Total task count
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks().count()
    }
}

/// Aggregate plan status, derived from atom outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Zero failed atoms
    Completed,
    /// Some, but not all, atoms failed
    PartiallyCompleted,
    /// Every atom failed
    Failed,
}

impl PlanStatus {
    /// Derive the aggregate from failed/total atom counts
    ///
    /// `Completed` iff no atom failed (an empty plan is complete);
    /// `Failed` iff every atom failed; `PartiallyCompleted` otherwise.
    #[must_use]
    pub fn aggregate(failed: usize, total: usize) -> Self {
        if failed == 0 {
            PlanStatus::Completed
        } else if failed == total {
            PlanStatus::Failed
        } else {
            PlanStatus::PartiallyCompleted
        }
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PlanStatus::Completed => "completed",
            PlanStatus::PartiallyCompleted => "partially_completed",
            PlanStatus::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> Plan {
        Plan::new("auth service").with_phase(
            Phase::new("core").with_milestone(
                Milestone::new("login")
                    .with_task(TaskSpec::new("login handler", "fn login() {}"))
                    .with_task(TaskSpec::new("logout handler", "fn logout() {}")),
            ),
        )
    }

    #[test]
    fn plan_iterates_tasks_in_order() {
        let plan = sample_plan();
        let descriptions: Vec<_> = plan.tasks().map(|t| t.description.as_str()).collect();
        assert_eq!(descriptions, vec!["login handler", "logout handler"]);
        assert_eq!(plan.task_count(), 2);
    }

    #[test]
    fn aggregate_completed_iff_zero_failed() {
        assert_eq!(PlanStatus::aggregate(0, 10), PlanStatus::Completed);
        assert_eq!(PlanStatus::aggregate(0, 0), PlanStatus::Completed);
    }

    #[test]
    fn aggregate_failed_iff_all_failed() {
        assert_eq!(PlanStatus::aggregate(10, 10), PlanStatus::Failed);
    }

    #[test]
    fn aggregate_partial_otherwise() {
        assert_eq!(PlanStatus::aggregate(3, 10), PlanStatus::PartiallyCompleted);
        assert_eq!(PlanStatus::aggregate(9, 10), PlanStatus::PartiallyCompleted);
    }

    #[test]
    fn status_display() {
        assert_eq!(
            PlanStatus::PartiallyCompleted.to_string(),
            "partially_completed"
        );
    }
}
