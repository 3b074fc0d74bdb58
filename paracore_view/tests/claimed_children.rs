// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for the `paracore_view` crate.
//!
//! These keep a [`GuiDocument`] in sync with a document and check what the
//! tree and 3D views show under geo-feature groups.

use paracore_document::{
    Document, DocumentObject, ExecContext, ExecError, Feature, GeoFeatureGroup, GeoFeatureGroupExtension,
    ObjectCore, ObjectId,
};
use paracore_property::{Placement, PropertyContainer, PropertyContainerExt, PropertyData};
use paracore_view::{
    GuiDocument, ViewProviderDocumentObject, ViewProviderFeature, ViewProviderGeoFeatureGroup,
};

fn claimed_cache(doc: &Document, id: ObjectId) -> Vec<String> {
    GeoFeatureGroupExtension::claimed_children(doc.object(id).unwrap().property_data())
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn link(doc: &mut Document, from: ObjectId, to: &str) {
    doc.object_mut(from)
        .unwrap()
        .set_value(Feature::BASE_FEATURE, Some(to.to_string()))
        .unwrap();
}

/// A body listing `[A, B, C]` where `A` builds on `B`.
fn body() -> (Document, [ObjectId; 4]) {
    let mut doc = Document::new("Doc");
    let body = doc.add_object("Body", Box::new(GeoFeatureGroup::new()));
    let a = doc.add_object("A", Box::new(Feature::new()));
    let b = doc.add_object("B", Box::new(Feature::new()));
    let c = doc.add_object("C", Box::new(Feature::new()));
    link(&mut doc, a, "B");
    for member in [a, b, c] {
        doc.add_to_group(body, member).unwrap();
    }
    (doc, [body, a, b, c])
}

#[test]
fn members_claimed_by_another_member_are_dropped() {
    let (mut doc, [body, a, ..]) = body();
    let mut gui = GuiDocument::new();
    assert_eq!(gui.sync(&mut doc).unwrap(), 1);

    assert_eq!(gui.claim_children(&doc, body), ["A", "C"]);
    assert_eq!(claimed_cache(&doc, body), ["A", "C"]);
    assert_eq!(gui.claim_children(&doc, a), ["B"]);
    assert_eq!(gui.claim_children_3d(&doc, body), ["A", "B", "C"]);
}

#[test]
fn providers_follow_the_object_types() {
    let (mut doc, [body, a, ..]) = body();
    let mut gui = GuiDocument::new();
    gui.sync(&mut doc).unwrap();

    assert_eq!(gui.len(), 4);
    assert!(gui.get::<ViewProviderGeoFeatureGroup>(body).is_some());
    assert!(gui.get::<ViewProviderFeature>(a).is_some());
    let state = gui.view_provider(a).unwrap().core().state();
    assert_eq!(state.object_name(), Some("A"));
    assert_eq!(state.object_id(), Some(a));
    let ctx = gui.context(&doc);
    let shown = gui.view_provider(a).unwrap().object(&ctx).unwrap();
    assert_eq!(shown.type_name(), "Feature");
}

#[test]
fn cache_is_rewritten_only_when_it_changes() {
    let (mut doc, [body, a, b, c]) = body();
    let mut gui = GuiDocument::new();
    gui.sync(&mut doc).unwrap();
    assert_eq!(gui.sync(&mut doc).unwrap(), 0);

    // Moving the group recomputes the list, which comes out the same.
    doc.object_mut(body)
        .unwrap()
        .set_value("Placement", Placement::from_translation(1.0, 0.0, 0.0))
        .unwrap();
    assert_eq!(gui.sync(&mut doc).unwrap(), 0);

    // Claims are refreshed on membership changes, not on member edits.
    link(&mut doc, c, "A");
    assert_eq!(gui.sync(&mut doc).unwrap(), 0);
    assert_eq!(claimed_cache(&doc, body), ["A", "C"]);
    assert_eq!(gui.claim_children(&doc, body), ["C"]);

    let d = doc.add_object("D", Box::new(Feature::new()));
    doc.add_to_group(body, d).unwrap();
    assert_eq!(gui.sync(&mut doc).unwrap(), 1);
    assert_eq!(claimed_cache(&doc, body), ["C", "D"]);

    doc.remove_object(c).unwrap();
    assert_eq!(gui.sync(&mut doc).unwrap(), 1);
    assert_eq!(claimed_cache(&doc, body), ["A", "D"]);
    assert!(gui.view_provider(c).is_none());
    assert_eq!(gui.claim_children(&doc, a), ["B"]);
    assert!(gui.view_provider(b).is_some());
}

#[test]
fn unresolvable_members_are_dropped() {
    let (mut doc, [body, ..]) = body();
    doc.object_mut(body)
        .unwrap()
        .set_values(
            "Group",
            vec![Some("Ghost".to_string()), Some("C".to_string()), None],
        )
        .unwrap();
    let mut gui = GuiDocument::new();
    gui.sync(&mut doc).unwrap();
    assert_eq!(gui.claim_children(&doc, body), ["C"]);
    assert_eq!(gui.claim_children_3d(&doc, body), ["Ghost", "C"]);
}

#[test]
fn nested_groups_are_not_consulted() {
    let (mut doc, [body, ..]) = body();
    let inner = doc.add_object("Inner", Box::new(GeoFeatureGroup::new()));
    let names = |names: &[&str]| -> Vec<Option<String>> {
        names.iter().map(|name| Some(name.to_string())).collect()
    };
    doc.object_mut(body)
        .unwrap()
        .set_values("Group", names(&["Inner", "B", "C"]))
        .unwrap();
    doc.object_mut(inner)
        .unwrap()
        .set_values("Group", names(&["B"]))
        .unwrap();
    let mut gui = GuiDocument::new();
    gui.sync(&mut doc).unwrap();

    // The inner group claims B for itself, but the body does not ask it.
    assert_eq!(gui.claim_children(&doc, inner), ["B"]);
    assert_eq!(gui.claim_children(&doc, body), ["Inner", "B", "C"]);
}

#[test]
fn placement_moves_the_group_node() {
    let (mut doc, [body, ..]) = body();
    let mut gui = GuiDocument::new();
    gui.sync(&mut doc).unwrap();
    let transform = *gui.view_provider(body).unwrap().core().state().transform();
    assert!(transform.is_identity());

    doc.object_mut(body)
        .unwrap()
        .set_value("Placement", Placement::from_translation(0.0, 2.0, 0.0))
        .unwrap();
    gui.sync(&mut doc).unwrap();
    let state = gui.view_provider(body).unwrap().core().state();
    assert_eq!(state.transform().apply([1.0, 1.0, 1.0]), [1.0, 3.0, 1.0]);
}

#[test]
fn group_display_mode_selects_the_group_mask() {
    let (mut doc, [body, a, ..]) = body();
    let mut gui = GuiDocument::new();
    gui.sync(&mut doc).unwrap();

    let provider = gui.view_provider_mut(body).unwrap();
    assert_eq!(provider.core().state().mask_modes(), ["Group".to_string()]);
    assert!(provider.set_display_mode("Group"));
    assert_eq!(provider.core().state().mask_mode(), Some("Group"));

    let feature = gui.view_provider_mut(a).unwrap();
    assert!(feature.set_display_mode("Wireframe"));
    assert!(!feature.set_display_mode("Group"));
    assert_eq!(feature.core().state().display_mode(), Some("Wireframe"));
}

/// An object asking for a provider nobody registered.
#[derive(Debug, Default)]
struct Sketch {
    core: ObjectCore,
}

impl PropertyContainer for Sketch {
    fn property_data(&self) -> &PropertyData {
        self.core.properties()
    }

    fn property_data_mut(&mut self) -> &mut PropertyData {
        self.core.properties_mut()
    }

    fn container_name(&self) -> &str {
        self.core.name()
    }

    fn full_name(&self) -> String {
        self.core.full_name()
    }

    fn on_before_change(&mut self, name: &str) {
        self.core.before_change(name);
    }

    fn on_changed(&mut self, name: &str) {
        self.core.changed(name);
    }
}

impl DocumentObject for Sketch {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "Sketch"
    }

    fn execute(&mut self, _ctx: &ExecContext<'_>) -> Result<(), ExecError> {
        Ok(())
    }

    fn view_provider_name(&self) -> String {
        "ViewProviderSketch".to_string()
    }
}

#[test]
fn unknown_provider_names_fall_back() {
    let mut doc = Document::new("Doc");
    let sketch = doc.add_object("Sketch", Box::new(Sketch::default()));
    let mut gui = GuiDocument::new();
    gui.sync(&mut doc).unwrap();
    assert!(gui.get::<ViewProviderDocumentObject>(sketch).is_some());
    assert!(gui.claim_children(&doc, sketch).is_empty());

    doc.remove_object(sketch).unwrap();
    gui.sync(&mut doc).unwrap();
    assert!(gui.is_empty());
}
