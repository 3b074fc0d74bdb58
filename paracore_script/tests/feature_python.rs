// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for the `paracore_script` crate.
//!
//! These run scripted objects through whole documents: recompute, label and
//! query hooks, change notifications, and save and restore of the proxy.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use paracore_document::{
    Document, DocumentObject, ExecError, Feature, ObjectId, ObjectState, SavedDocument,
};
use paracore_property::{PersistSettings, PropertyContainerExt};
use paracore_script::{
    FeaturePython, Hook, ScriptError, ScriptObject, ScriptValue, interpreter, register_types,
};
use serde_json::json;

type Scripted = FeaturePython<Feature>;

fn scripted(proxy: ScriptObject) -> Box<Scripted> {
    let mut object = Scripted::default();
    object.set_proxy(Some(proxy)).unwrap();
    Box::new(object)
}

fn document() -> Document {
    let mut doc = Document::new("Doc");
    register_types(&mut doc);
    doc
}

fn base(doc: &mut Document, profile: Vec<f64>) -> ObjectId {
    let id = doc.add_object("Base", Box::new(Feature::new()));
    doc.object_mut(id)
        .unwrap()
        .set_values("Profile", profile)
        .unwrap();
    id
}

/// Writes the base feature's shape plus a marker section.
fn stamp() -> ScriptObject {
    stamp_of("Stamp")
}

fn stamp_of(class: &str) -> ScriptObject {
    ScriptObject::new("feature_python_tests", class).with_method("execute", |call| {
        let marker = call.this().value("Marker").unwrap_or(json!(99.0));
        let mut shape = call.target()?.read_linked("Base", "Shape")?;
        if let Some(sections) = shape.as_array_mut() {
            sections.push(marker);
        }
        call.target_mut()?.write("Shape", &shape)?;
        Ok(ScriptValue::Null)
    })
}

fn shape(doc: &Document, id: ObjectId) -> Vec<f64> {
    doc.object(id).unwrap().values::<f64>("Shape").unwrap().to_vec()
}

#[test]
fn execute_hook_replaces_native_execute() {
    let mut doc = document();
    let base = base(&mut doc, vec![2.0]);
    let top = doc.add_object("Top", scripted(stamp()));
    doc.object_mut(top)
        .unwrap()
        .set_value("BaseFeature", Some("Base".to_string()))
        .unwrap();

    let report = doc.recompute();
    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.executed, [base, top]);
    // Native execution would have appended the length instead.
    assert_eq!(shape(&doc, top), [2.0, 10.0, 99.0]);
    assert_eq!(doc.object(top).unwrap().core().state(), ObjectState::Clean);
}

#[test]
fn proxy_without_hooks_behaves_natively() {
    let mut doc = document();
    let native = doc.add_object("Native", Box::new(Feature::new()));
    let wrapped = doc.add_object(
        "Wrapped",
        scripted(ScriptObject::new("feature_python_tests", "Empty")),
    );

    let report = doc.recompute();
    let expected = ExecError::domain("Base property not set");
    assert_eq!(report.error(native), Some(&expected));
    assert_eq!(report.error(wrapped), Some(&expected));

    for id in [native, wrapped] {
        doc.object_mut(id)
            .unwrap()
            .set_values("Profile", vec![5.0])
            .unwrap();
    }
    assert!(doc.recompute().is_success());
    assert_eq!(shape(&doc, native), shape(&doc, wrapped));

    let native = doc.object(native).unwrap();
    let wrapped = doc.object(wrapped).unwrap();
    assert_eq!(wrapped.type_name(), "FeaturePython");
    assert_eq!(wrapped.view_provider_name(), native.view_provider_name());
    assert_eq!(wrapped.sub_objects(), native.sub_objects());
    assert_eq!(wrapped.sub_object(""), Some("Wrapped".to_string()));
    assert_eq!(wrapped.linked_object(true), Some("Wrapped".to_string()));
    assert_eq!(wrapped.can_link_properties(), native.can_link_properties());
    assert_eq!(wrapped.allow_duplicate_label(), native.allow_duplicate_label());
    assert_eq!(wrapped.redirect_sub_name("Face1", "Top"), None);
    assert_eq!(wrapped.can_load_partial(), native.can_load_partial());
    assert_eq!(wrapped.has_child_element(), native.has_child_element());
    assert_eq!(wrapped.is_element_visible("Face1"), -1);
}

#[test]
fn script_errors_fail_only_their_object() {
    let mut doc = document();
    let failing = ScriptObject::new("feature_python_tests", "Failing")
        .with_method("execute", |_| Err(ScriptError::raise("no solid")));
    let bad = doc.add_object("Bad", scripted(failing));
    let after = doc.add_object("After", Box::new(Feature::new()));
    doc.object_mut(after)
        .unwrap()
        .set_value("BaseFeature", Some("Bad".to_string()))
        .unwrap();
    let alone = base(&mut doc, vec![1.0]);

    let report = doc.recompute();
    assert_eq!(
        report.error(bad),
        Some(&ExecError::Script("no solid".to_string()))
    );
    assert_eq!(report.error(after), Some(&ExecError::Dependency("Bad".into())));
    assert!(report.error(alone).is_none());
    assert_eq!(doc.object(bad).unwrap().core().error(), Some("script error: no solid"));
}

#[test]
fn must_execute_hook_can_only_add_work() {
    let mut doc = document();
    let eager = ScriptObject::new("feature_python_tests", "Eager")
        .with_method("mustExecute", |_| Ok(json!(1)))
        .with_method("execute", |call| {
            let runs = call.this().value("runs").and_then(|r| r.as_i64()).unwrap_or(0);
            call.this().set_value("runs", runs + 1);
            Ok(ScriptValue::Null)
        });
    let id = doc.add_object("Eager", scripted(eager.clone()));

    assert!(doc.recompute().is_success());
    assert!(doc.recompute().is_success());
    assert_eq!(eager.value("runs"), Some(json!(2)));

    // A proxy that says "no" does not hide a touched object.
    eager.set_method("mustExecute", |_| Ok(json!(false)));
    let object = doc.get_mut::<Scripted>(id).unwrap();
    object.set_proxy(Some(eager.clone())).unwrap();
    assert!(object.must_execute());
}

fn chaser(allow_recursion: bool) -> ScriptObject {
    ScriptObject::new("feature_python_tests", "Chaser")
        .with_value("__allow_recursive_onChanged", allow_recursion)
        .with_method("onChanged", |call| {
            if call.str_arg(0)? != "Length" {
                return Ok(ScriptValue::Null);
            }
            let calls = call.this().value("calls").and_then(|c| c.as_i64()).unwrap_or(0);
            call.this().set_value("calls", calls + 1);
            let length = call.target()?.read("Length")?.as_f64().unwrap_or(0.0);
            if length < 3.0 {
                call.target_mut()?.write("Length", &json!(length + 1.0))?;
            }
            Ok(ScriptValue::Null)
        })
}

#[test]
fn on_changed_does_not_recurse_by_default() {
    let proxy = chaser(false);
    let mut object = scripted(proxy.clone());
    object.set_value("Length", 0.0_f64).unwrap();

    assert_eq!(proxy.value("calls"), Some(json!(1)));
    assert_eq!(object.value::<f64>("Length").unwrap(), &1.0);
    assert!(!object.bridge().is_calling(Hook::OnChanged));
}

#[test]
fn allowed_recursion_runs_once_per_change() {
    let proxy = chaser(true);
    let mut object = scripted(proxy.clone());
    object.set_value("Length", 0.0_f64).unwrap();

    assert_eq!(proxy.value("calls"), Some(json!(4)));
    assert_eq!(object.value::<f64>("Length").unwrap(), &3.0);
}

#[test]
fn before_change_runs_after_native_bookkeeping() {
    let proxy = ScriptObject::new("feature_python_tests", "Watcher").with_method(
        "onBeforeChange",
        |call| {
            let name = call.str_arg(0)?.to_string();
            let old = call.target()?.read(&name)?;
            call.this().set_value("old", old);
            Ok(ScriptValue::Null)
        },
    );
    let mut object = scripted(proxy.clone());
    object.set_value("Length", 4.0_f64).unwrap();
    assert_eq!(proxy.value("old"), Some(json!(10.0)));
}

#[test]
fn failing_hooks_fall_back_to_native() {
    let proxy = ScriptObject::new("feature_python_tests", "Broken")
        .with_method("getViewProviderName", |_| Err(ScriptError::raise("broken")))
        .with_method("canLoadPartial", |_| Ok(json!("lots")))
        .with_method("isElementVisible", |_| Ok(json!(-2)))
        .with_method("hasChildElement", |_| Ok(json!(1)))
        .with_method("getSubObject", |_| Ok(json!(false)))
        .with_method("redirectSubName", |_| Ok(ScriptValue::Null));
    let object = scripted(proxy);

    assert_eq!(object.view_provider_name(), "ViewProviderFeature");
    assert_eq!(object.can_load_partial(), 0);
    assert_eq!(object.is_element_visible("Edge1"), -1);
    assert!(object.has_child_element());
    assert_eq!(object.sub_object(""), Some(String::new()));
    assert_eq!(object.redirect_sub_name("Edge1", "Top"), None);
    assert!(!object.bridge().is_calling(Hook::GetViewProviderName));
}

#[test]
fn query_hooks_override_native_answers() {
    let proxy = ScriptObject::new("feature_python_tests", "Assembly")
        .with_method("getViewProviderName", |_| Ok(json!("ViewProviderAssembly")))
        .with_method("getSubObjects", |_| Ok(json!(["Part1", "Part2"])))
        .with_method("getSubObject", |call| {
            Ok(match call.str_arg(0)? {
                "Part1." => json!("Part1"),
                _ => ScriptValue::Null,
            })
        })
        .with_method("getLinkedObject", |_| Ok(json!("Target")))
        .with_method("canLinkProperties", |_| Ok(json!(false)))
        .with_method("redirectSubName", |call| {
            Ok(json!(format!("{}Face", call.str_arg(1)?)))
        })
        .with_method("canLoadPartial", |_| Ok(json!(2)))
        .with_method("isElementVisible", |_| Ok(json!(0)))
        .with_method("setElementVisible", |call| {
            let visible = call.arg(1)?.as_bool().unwrap_or(false);
            call.this().set_value("visible", visible);
            Ok(json!(1))
        });
    let mut object = scripted(proxy.clone());

    assert_eq!(object.view_provider_name(), "ViewProviderAssembly");
    assert_eq!(object.sub_objects(), ["Part1", "Part2"]);
    assert_eq!(object.sub_object("Part1."), Some("Part1".to_string()));
    assert_eq!(object.sub_object("Part3."), None);
    assert_eq!(object.linked_object(false), Some("Target".to_string()));
    assert!(!object.can_link_properties());
    assert_eq!(object.redirect_sub_name("Face1", "Top"), Some("TopFace".to_string()));
    assert_eq!(object.can_load_partial(), 2);
    assert_eq!(object.is_element_visible("Part1"), 0);
    assert_eq!(object.set_element_visible("Part1", true), 1);
    assert_eq!(proxy.value("visible"), Some(json!(true)));
}

#[test]
fn label_hooks_run_through_the_document() {
    let shouting = || {
        ScriptObject::new("feature_python_tests", "Shouting")
            .with_method("onBeforeChangeLabel", |call| {
                Ok(json!(call.str_arg(0)?.to_uppercase()))
            })
            .with_method("allowDuplicateLabel", |_| Ok(json!(true)))
    };
    let mut doc = document();
    let a = doc.add_object("A", scripted(shouting()));
    let b = doc.add_object("B", scripted(shouting()));
    assert_eq!(doc.set_label(a, "pad").unwrap(), "PAD");
    assert_eq!(doc.set_label(b, "pad").unwrap(), "PAD");

    let plain = doc.add_object("C", Box::new(Feature::new()));
    assert_eq!(doc.set_label(plain, "PAD").unwrap(), "PAD001");
}

#[test]
fn swapping_the_proxy_rebinds_hooks() {
    let mut doc = document();
    let id = doc.add_object("Swap", scripted(stamp()));
    base(&mut doc, vec![1.0]);
    doc.object_mut(id)
        .unwrap()
        .set_value("BaseFeature", Some("Base".to_string()))
        .unwrap();
    assert!(doc.recompute().is_success());
    assert_eq!(shape(&doc, id), [1.0, 10.0, 99.0]);

    let object = doc.get_mut::<Scripted>(id).unwrap();
    object
        .set_proxy(Some(ScriptObject::new("feature_python_tests", "Idle")))
        .unwrap();
    assert!(!object.bridge().is_bound(Hook::Execute));
    assert!(doc.recompute().is_success());
    assert_eq!(shape(&doc, id), [1.0, 10.0, 10.0]);
}

/// The class restored documents recreate: a stamp that records its restore.
fn saved_stamp() -> ScriptObject {
    stamp_of("SavedStamp").with_method("onDocumentRestored", |call| {
        call.this().set_value("restored", true);
        Ok(ScriptValue::Null)
    })
}

fn stamped_document() -> (Document, ObjectId) {
    interpreter::register_class("feature_python_tests", "SavedStamp", saved_stamp);
    let mut doc = document();
    base(&mut doc, vec![3.0]);
    let id = doc.add_object("Top", scripted(saved_stamp().with_value("Marker", 7.0)));
    doc.object_mut(id)
        .unwrap()
        .set_value("BaseFeature", Some("Base".to_string()))
        .unwrap();
    assert!(doc.recompute().is_success());
    (doc, id)
}

#[test]
fn proxies_survive_save_and_restore() {
    let (doc, _) = stamped_document();
    let saved = doc.save(&PersistSettings::default());
    assert!(saved.files.contains_key("Top.Proxy.json"));
    assert!(saved.xml.contains("<Python module=\"feature_python_tests\" class=\"SavedStamp\""));

    let mut copy = document();
    copy.restore(&saved).unwrap();
    let id = copy.id_of("Top").unwrap();
    let top = copy.get::<Scripted>(id).unwrap();
    let proxy = top.proxy().unwrap();
    assert_eq!(proxy.class(), Some(("feature_python_tests", "SavedStamp")));
    assert_eq!(proxy.value("Marker"), Some(json!(7.0)));
    assert_eq!(proxy.value("restored"), Some(json!(true)));
    assert!(top.bridge().is_bound(Hook::Execute));
    assert_eq!(top.core().state(), ObjectState::Clean);
    assert_eq!(shape(&copy, id), [3.0, 10.0, 7.0]);

    copy.object_mut(id)
        .unwrap()
        .set_value("Length", 1.0_f64)
        .unwrap();
    assert!(copy.recompute().is_success());
    assert_eq!(shape(&copy, id), [3.0, 10.0, 7.0]);
}

#[test]
fn forced_xml_keeps_the_proxy_inline() {
    let (doc, _) = stamped_document();
    let settings = PersistSettings {
        force_xml: true,
        ..PersistSettings::default()
    };
    let saved = doc.save(&settings);
    assert!(saved.files.is_empty());
    assert!(saved.xml.contains("cdata=\"1\""));

    let mut copy = document();
    copy.restore(&saved).unwrap();
    let top = copy.get::<Scripted>(copy.id_of("Top").unwrap()).unwrap();
    assert_eq!(top.proxy().unwrap().value("Marker"), Some(json!(7.0)));
}

#[test]
fn unknown_proxy_classes_leave_the_proxy_empty() {
    let (doc, _) = stamped_document();
    let saved = doc.save(&PersistSettings::default());
    let saved = SavedDocument {
        xml: saved.xml.replace("class=\"SavedStamp\"", "class=\"Removed\""),
        files: saved.files,
    };

    let mut copy = document();
    copy.restore(&saved).unwrap();
    let top = copy.get::<Scripted>(copy.id_of("Top").unwrap()).unwrap();
    assert!(top.proxy().is_none());
    assert!(top.bridge().bound().is_empty());
}

/// Records whether the interpreter lock was held when it was released.
struct Witness(Arc<AtomicUsize>, Arc<AtomicUsize>);

impl Drop for Witness {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
        if interpreter::is_held() {
            self.1.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn dropping_a_scripted_object_releases_the_proxy_under_the_lock() {
    let released = Arc::new(AtomicUsize::new(0));
    let locked = Arc::new(AtomicUsize::new(0));
    let witness = Witness(Arc::clone(&released), Arc::clone(&locked));
    let proxy = ScriptObject::plain().with_method("execute", move |_| {
        let _witness = &witness;
        Ok(ScriptValue::Null)
    });
    let object = scripted(proxy);
    assert_eq!(released.load(Ordering::SeqCst), 0);
    drop(object);
    assert_eq!(released.load(Ordering::SeqCst), 1);
    assert_eq!(locked.load(Ordering::SeqCst), 1);
}
