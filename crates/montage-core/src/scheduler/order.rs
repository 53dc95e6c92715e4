//! Topological step ordering

use crate::error::{AgentError, AgentErrorKind, Result};
use crate::plan::{Plan, PlanStep};
use std::collections::{HashMap, VecDeque};

/// Order steps so every step follows its dependencies.
///
/// Kahn's algorithm with a FIFO queue seeded in plan order, so independent
/// steps keep their authored order. Fails with a dependency error when some
/// steps can never become ready (a cycle or an unknown dependency).
pub fn execution_order(plan: &Plan) -> Result<Vec<&PlanStep>> {
    let steps = &plan.steps;
    let mut in_degree: Vec<usize> = steps.iter().map(|s| s.depends_on.len()).collect();
    let mut dependents: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, step) in steps.iter().enumerate() {
        for dep in &step.depends_on {
            dependents.entry(dep.as_str()).or_default().push(index);
        }
    }

    let mut queue: VecDeque<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(index, _)| index)
        .collect();
    let mut order = Vec::with_capacity(steps.len());
    let mut processed = vec![false; steps.len()];

    while let Some(index) = queue.pop_front() {
        processed[index] = true;
        order.push(&steps[index]);
        if let Some(waiting) = dependents.get(steps[index].id.as_str()) {
            for &dependent in waiting {
                in_degree[dependent] = in_degree[dependent].saturating_sub(1);
                if in_degree[dependent] == 0 && !processed[dependent] && !queue.contains(&dependent) {
                    queue.push_back(dependent);
                }
            }
        }
    }

    if order.len() < steps.len() {
        let Some(stuck) = steps.iter().zip(&processed).find(|(_, done)| !**done).map(|(s, _)| s)
        else {
            return Ok(order);
        };
        let missing = stuck
            .depends_on
            .iter()
            .filter(|dep| !order.iter().any(|s| &s.id == *dep))
            .cloned()
            .collect();
        return Err(AgentError::new(AgentErrorKind::DependencyUnsatisfied {
            step_id: stuck.id.clone(),
            missing,
        }));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(order: &[&PlanStep]) -> Vec<String> {
        order.iter().map(|s| s.id.clone()).collect()
    }

    #[test]
    fn test_independent_steps_keep_plan_order() {
        let plan = Plan::new("g")
            .with_step(PlanStep::new("A", "t"))
            .with_step(PlanStep::new("B", "t"))
            .with_step(PlanStep::new("C", "t").depends_on("A").depends_on("B"));
        assert_eq!(ids(&execution_order(&plan).unwrap()), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_dependency_declared_later() {
        let plan = Plan::new("g")
            .with_step(PlanStep::new("render", "t").depends_on("cut"))
            .with_step(PlanStep::new("import", "t"))
            .with_step(PlanStep::new("cut", "t").depends_on("import"));
        assert_eq!(
            ids(&execution_order(&plan).unwrap()),
            vec!["import", "cut", "render"]
        );
    }

    #[test]
    fn test_cycle_is_rejected() {
        let plan = Plan::new("g")
            .with_step(PlanStep::new("free", "t"))
            .with_step(PlanStep::new("a", "t").depends_on("b"))
            .with_step(PlanStep::new("b", "t").depends_on("a"));
        let err = execution_order(&plan).unwrap_err();
        assert_eq!(err.code(), "DEPENDENCY_UNSATISFIED");
        match err.kind() {
            AgentErrorKind::DependencyUnsatisfied { step_id, missing } => {
                assert_eq!(step_id, "a");
                assert_eq!(missing, &vec!["b".to_string()]);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_dependency_is_rejected() {
        let plan = Plan::new("g").with_step(PlanStep::new("a", "t").depends_on("ghost"));
        assert!(execution_order(&plan).is_err());
    }
}
