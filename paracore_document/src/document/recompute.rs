// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The recompute pass.

use tracing::{debug, debug_span, warn};

use super::Document;
use crate::error::ExecError;
use crate::graph::DependencyGraph;
use crate::id::ObjectId;
use crate::object::ObjectStatus;
use crate::store::ExecContext;

/// What a [`Document::recompute`] pass did, in execution order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecomputeReport {
    /// Objects that executed successfully.
    pub executed: Vec<ObjectId>,
    /// Objects that failed, directly or because of a dependency or cycle.
    pub failed: Vec<(ObjectId, ExecError)>,
    /// Objects that did not need to execute.
    pub skipped: Vec<ObjectId>,
}

impl RecomputeReport {
    /// Returns `true` if nothing failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Returns the failure recorded for `id`.
    #[must_use]
    pub fn error(&self, id: ObjectId) -> Option<&ExecError> {
        self.failed
            .iter()
            .find(|(failed, _)| *failed == id)
            .map(|(_, error)| error)
    }
}

impl Document {
    fn dependency_graph(&self, ids: &[ObjectId]) -> DependencyGraph {
        let mut graph = DependencyGraph::new(ids.len());
        for (node, &id) in ids.iter().enumerate() {
            for target in self.out_list(id) {
                if let Some(dep) = ids.iter().position(|&other| other == target) {
                    graph.add_dependency(node, dep);
                }
            }
        }
        graph
    }

    fn name_of(&self, id: ObjectId) -> String {
        self.store
            .get(id)
            .map(|object| object.core().name().to_string())
            .unwrap_or_default()
    }

    fn fail(&mut self, id: ObjectId, error: ExecError, report: &mut RecomputeReport) {
        if let Some(object) = self.store.get_mut(id) {
            object.core_mut().set_error(error.to_string());
        }
        warn!(document = %self.name, object = %self.name_of(id), %error, "recompute failed");
        report.failed.push((id, error));
    }

    /// Executes every object that needs it, dependencies first.
    ///
    /// Links between objects define the order; among independent objects the
    /// insertion order wins. An object executes if it reports
    /// [`must_execute`](crate::DocumentObject::must_execute) or if one of its
    /// dependencies executed earlier in this pass. A failure marks the object
    /// with [`ObjectStatus::ERROR`] and its message, and every object
    /// downstream of it fails with [`ExecError::Dependency`] without
    /// executing. Objects on a dependency cycle fail with
    /// [`ExecError::Cycle`]. Success clears the touched bits of the object and
    /// its properties.
    pub fn recompute(&mut self) -> RecomputeReport {
        let _span = debug_span!("recompute", document = %self.name).entered();
        let ids = self.store.ids().to_vec();
        let graph = self.dependency_graph(&ids);
        let ordering = graph.ordering();
        let mut report = RecomputeReport::default();
        let mut failed = vec![false; ids.len()];
        let mut executed = vec![false; ids.len()];

        for &node in &ordering.sorted {
            let id = ids[node];
            if let Some(&dep) = graph.dependencies(node).iter().find(|&&dep| failed[dep]) {
                failed[node] = true;
                let error = ExecError::Dependency(self.name_of(ids[dep]));
                self.fail(id, error, &mut report);
                continue;
            }
            let upstream = graph.dependencies(node).iter().any(|&dep| executed[dep]);
            let Some(mut object) = self.store.take(id) else {
                continue;
            };
            if !upstream && !object.must_execute() {
                self.store.put_back(id, object);
                report.skipped.push(id);
                continue;
            }
            object.core_mut().set_status(ObjectStatus::RECOMPUTING, true);
            let result = object.execute(&ExecContext::new(&self.name, &self.store));
            object.core_mut().set_status(ObjectStatus::RECOMPUTING, false);
            match result {
                Ok(()) => {
                    object.core_mut().purge_touched();
                    debug!(object = %object.core().name(), "executed");
                    self.store.put_back(id, object);
                    executed[node] = true;
                    report.executed.push(id);
                }
                Err(error) => {
                    self.store.put_back(id, object);
                    failed[node] = true;
                    self.fail(id, error, &mut report);
                }
            }
        }

        let mut stalled = vec![false; ids.len()];
        for &node in &ordering.stalled {
            stalled[node] = true;
        }
        for &node in &ordering.stalled {
            let error = if graph.on_cycle(node, &stalled) {
                ExecError::Cycle(self.name_of(ids[node]))
            } else {
                let dep = graph
                    .dependencies(node)
                    .iter()
                    .copied()
                    .find(|&dep| stalled[dep] || failed[dep])
                    .unwrap_or(node);
                ExecError::Dependency(self.name_of(ids[dep]))
            };
            self.fail(ids[node], error, &mut report);
        }

        debug!(
            executed = report.executed.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "recompute finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use paracore_property::PropertyContainerExt;

    use super::*;
    use crate::feature::Feature;
    use crate::object::{DocumentObject, ObjectState};

    fn chain() -> (Document, ObjectId, ObjectId) {
        let mut doc = Document::new("Doc");
        let base = doc.add_object("Base", Box::new(Feature::new()));
        let top = doc.add_object("Top", Box::new(Feature::new()));
        let object = doc.object_mut(base).unwrap();
        object.set_values("Profile", vec![1.0]).unwrap();
        let object = doc.object_mut(top).unwrap();
        object.set_value("BaseFeature", Some("Base".to_string())).unwrap();
        object.set_value("Length", 0.0_f64).unwrap();
        (doc, base, top)
    }

    #[test]
    fn dependencies_execute_first() {
        let (mut doc, base, top) = chain();
        let report = doc.recompute();
        assert_eq!(report.executed, [base, top]);
        let top = doc.get::<Feature>(top).unwrap();
        assert_eq!(top.shape(), &[1.0, 10.0]);
        assert_eq!(top.core().state(), ObjectState::Clean);
        assert!(!top.property("Length").unwrap().base().is_touched());
    }

    #[test]
    fn clean_documents_skip_everything() {
        let (mut doc, base, top) = chain();
        doc.recompute();
        let report = doc.recompute();
        assert!(report.executed.is_empty());
        assert_eq!(report.skipped, [base, top]);
    }

    #[test]
    fn upstream_execution_pulls_dependents() {
        let (mut doc, base, top) = chain();
        doc.recompute();
        doc.object_mut(base)
            .unwrap()
            .set_value("Length", 2.0_f64)
            .unwrap();
        let report = doc.recompute();
        assert_eq!(report.executed, [base, top]);
        assert_eq!(doc.get::<Feature>(top).unwrap().shape(), &[1.0, 2.0]);
    }

    #[test]
    fn failures_skip_dependents() {
        let (mut doc, base, top) = chain();
        let free = doc.add_object("Free", Box::new(Feature::new()));
        doc.object_mut(free)
            .unwrap()
            .set_values("Profile", vec![3.0])
            .unwrap();
        doc.object_mut(base)
            .unwrap()
            .set_values("Profile", Vec::<f64>::new())
            .unwrap();

        let report = doc.recompute();
        assert_eq!(
            report.error(base),
            Some(&ExecError::domain("Base property not set"))
        );
        assert_eq!(
            report.error(top),
            Some(&ExecError::Dependency("Base".to_string()))
        );
        assert_eq!(report.executed, [free]);
        let base = doc.object(base).unwrap();
        assert_eq!(base.core().state(), ObjectState::Error);
        assert_eq!(base.core().error(), Some("Base property not set"));
    }

    #[test]
    fn cycles_fail_and_the_rest_recomputes() {
        let mut doc = Document::new("Doc");
        let a = doc.add_object("A", Box::new(Feature::new()));
        let b = doc.add_object("B", Box::new(Feature::new()));
        let c = doc.add_object("C", Box::new(Feature::new()));
        let free = doc.add_object("Free", Box::new(Feature::new()));
        for (id, base) in [(a, "B"), (b, "A"), (c, "B")] {
            doc.object_mut(id)
                .unwrap()
                .set_value("BaseFeature", Some(base.to_string()))
                .unwrap();
        }
        doc.object_mut(free)
            .unwrap()
            .set_values("Profile", vec![1.0])
            .unwrap();

        let report = doc.recompute();
        assert_eq!(report.executed, [free]);
        assert_eq!(report.error(a), Some(&ExecError::Cycle("A".to_string())));
        assert_eq!(report.error(b), Some(&ExecError::Cycle("B".to_string())));
        assert_eq!(
            report.error(c),
            Some(&ExecError::Dependency("B".to_string()))
        );
    }

    #[test]
    fn missing_and_empty_bases_are_domain_errors() {
        let mut doc = Document::new("Doc");
        let empty = doc.add_object("Empty", Box::new(Feature::new()));
        let dangling = doc.add_object("Dangling", Box::new(Feature::new()));
        doc.object_mut(dangling)
            .unwrap()
            .set_value("BaseFeature", Some("Nowhere".to_string()))
            .unwrap();
        let on_empty = doc.add_object("OnEmpty", Box::new(Feature::new()));
        doc.object_mut(on_empty)
            .unwrap()
            .set_value("BaseFeature", Some("Empty".to_string()))
            .unwrap();

        let report = doc.recompute();
        assert_eq!(
            report.error(empty),
            Some(&ExecError::domain("Base property not set"))
        );
        assert_eq!(
            report.error(dangling),
            Some(&ExecError::domain("No base feature linked"))
        );
        assert_eq!(
            report.error(on_empty),
            Some(&ExecError::Dependency("Empty".to_string()))
        );
    }
}
