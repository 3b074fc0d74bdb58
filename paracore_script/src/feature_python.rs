// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Native objects whose behavior a script proxy can override.

use paracore_document::{
    Document, DocumentObject, ExecContext, ExecError, Feature, GeoFeatureGroup, ObjectCore,
};
use paracore_property::{
    PropertyContainer, PropertyContainerExt, PropertyData, PropertyError, PropertyInfo,
    PropertyPath, PropertyStatus,
};
use serde_json::json;
use tracing::debug;

use crate::bridge::{Hook, ProxyBridge};
use crate::error::ScriptError;
use crate::interpreter;
use crate::object::{HookTarget, ScriptObject, ScriptValue, truthy};
use crate::proxy::PropertyProxy;

/// A native object type with a scripted variant.
pub trait ScriptedType: DocumentObject + Default {
    /// The registered type name of `FeaturePython<Self>`.
    const SCRIPTED_TYPE_NAME: &'static str;
}

impl ScriptedType for Feature {
    const SCRIPTED_TYPE_NAME: &'static str = "FeaturePython";
}

impl ScriptedType for GeoFeatureGroup {
    const SCRIPTED_TYPE_NAME: &'static str = "GeoFeatureGroupPython";
}

/// Registers the scripted object types and the proxy property type.
pub fn register_types(document: &mut Document) {
    document.types_mut().register::<FeaturePython<Feature>>();
    document.types_mut().register::<FeaturePython<GeoFeatureGroup>>();
    document.property_types_mut().register::<PropertyProxy>();
}

/// A native object decorated with a script proxy.
///
/// The proxy lives in the `Proxy` property. Assigning it resolves the
/// proxy's hooks; each overridable operation consults its hook first and
/// falls back to the wrapped object when the hook is missing, blocked by the
/// recursion guard, or gives no decision.
///
/// `execute` is the exception to "no decision": a proxy that implements it
/// owns execution, and a script error becomes a recoverable
/// [`ExecError::Script`].
#[derive(Debug)]
pub struct FeaturePython<T> {
    inner: T,
    bridge: ProxyBridge,
    type_name: &'static str,
}

impl<T: ScriptedType> Default for FeaturePython<T> {
    fn default() -> Self {
        Self::new(T::default(), T::SCRIPTED_TYPE_NAME)
    }
}

impl<T: DocumentObject> FeaturePython<T> {
    /// Name of the property holding the proxy.
    pub const PROXY: &'static str = "Proxy";

    /// Wraps `inner`, registered as `type_name`.
    #[must_use]
    pub fn new(mut inner: T, type_name: &'static str) -> Self {
        let added = inner.core_mut().properties_mut().add_static(
            Self::PROXY,
            PropertyProxy::default(),
            PropertyInfo::new("Base").doc("Script object overriding this object's behavior"),
        );
        debug_assert!(added.is_ok(), "wrapped objects do not declare a proxy");
        Self {
            inner,
            bridge: ProxyBridge::new(),
            type_name,
        }
    }

    /// Returns the wrapped object.
    #[must_use]
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Returns the wrapped object mutably.
    ///
    /// Changes made through it bypass the proxy's hooks.
    #[must_use]
    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Returns the hook bridge.
    #[must_use]
    pub fn bridge(&self) -> &ProxyBridge {
        &self.bridge
    }

    /// Returns the proxy.
    #[must_use]
    pub fn proxy(&self) -> Option<&ScriptObject> {
        self.property_data()
            .get_as::<PropertyProxy>(Self::PROXY)
            .ok()
            .and_then(PropertyProxy::value)
    }

    /// Assigns the proxy, with change notifications.
    pub fn set_proxy(&mut self, proxy: Option<ScriptObject>) -> Result<(), PropertyError> {
        self.set_property::<PropertyProxy, _>(Self::PROXY, |p| p.set_value(proxy))
    }

    fn rebind(&mut self) {
        let _gil = interpreter::lock();
        let proxy = self.proxy().cloned();
        debug!(object = self.core().name(), bound = proxy.is_some(), "rebinding proxy");
        self.bridge.init(proxy);
    }

    fn query(&self, hook: Hook, args: &[ScriptValue]) -> Option<ScriptValue> {
        self.bridge.enter(hook)?.decide(self, args)
    }

    fn notify(&mut self, hook: Hook, args: &[ScriptValue]) -> Option<ScriptValue> {
        let call = self.bridge.enter(hook)?;
        call.decide_mut(self, args)
    }

    fn query_int(&self, hook: Hook, args: &[ScriptValue]) -> Option<i32> {
        self.query(hook, args)
            .and_then(|value| value.as_i64())
            .and_then(|value| i32::try_from(value).ok())
    }
}

impl<T: DocumentObject> HookTarget for FeaturePython<T> {
    fn object_name(&self) -> &str {
        self.core().name()
    }

    fn read(&self, path: &str) -> Result<ScriptValue, ScriptError> {
        Ok(self.path_value(&PropertyPath::parse(path)?)?)
    }

    fn write(&mut self, path: &str, value: &ScriptValue) -> Result<(), ScriptError> {
        Ok(self.set_path_value(&PropertyPath::parse(path)?, value)?)
    }
}

/// The target of an `execute` hook: the object plus the rest of the document.
struct Executing<'a, 'c, T> {
    object: &'a mut FeaturePython<T>,
    ctx: &'a ExecContext<'c>,
}

impl<T: DocumentObject> HookTarget for Executing<'_, '_, T> {
    fn object_name(&self) -> &str {
        self.object.object_name()
    }

    fn read(&self, path: &str) -> Result<ScriptValue, ScriptError> {
        self.object.read(path)
    }

    fn write(&mut self, path: &str, value: &ScriptValue) -> Result<(), ScriptError> {
        self.object.write(path, value)
    }

    fn read_linked(&self, object: &str, path: &str) -> Result<ScriptValue, ScriptError> {
        let path = PropertyPath::parse(path)?;
        let linked = self
            .ctx
            .object(object)
            .ok_or_else(|| ScriptError::Unreachable(object.to_string()))?;
        Ok(linked.path_value(&path)?)
    }
}

impl<T: DocumentObject> PropertyContainer for FeaturePython<T> {
    fn property_data(&self) -> &PropertyData {
        self.inner.property_data()
    }

    fn property_data_mut(&mut self) -> &mut PropertyData {
        self.inner.property_data_mut()
    }

    fn container_name(&self) -> &str {
        self.inner.container_name()
    }

    fn full_name(&self) -> String {
        self.inner.full_name()
    }

    fn property_prefix(&self) -> &str {
        self.inner.property_prefix()
    }

    fn on_before_change(&mut self, name: &str) {
        self.inner.on_before_change(name);
        self.notify(Hook::OnBeforeChange, &[json!(name)]);
    }

    fn on_changed(&mut self, name: &str) {
        if name == Self::PROXY {
            self.rebind();
        }
        self.notify(Hook::OnChanged, &[json!(name)]);
        self.inner.on_changed(name);
    }

    fn on_property_status_changed(&mut self, name: &str, old: PropertyStatus) {
        self.inner.on_property_status_changed(name, old);
    }
}

impl<T: DocumentObject> DocumentObject for FeaturePython<T> {
    fn core(&self) -> &ObjectCore {
        self.inner.core()
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        self.inner.core_mut()
    }

    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn must_execute(&self) -> bool {
        self.inner.must_execute()
            || self
                .query(Hook::MustExecute, &[])
                .is_some_and(|value| truthy(&value))
    }

    fn execute(&mut self, ctx: &ExecContext<'_>) -> Result<(), ExecError> {
        let Some(call) = self.bridge.enter(Hook::Execute) else {
            return self.inner.execute(ctx);
        };
        let mut target = Executing { object: self, ctx };
        call.invoke_mut(&mut target, &[])
            .map(drop)
            .map_err(|err| ExecError::Script(err.to_string()))
    }

    fn view_provider_name(&self) -> String {
        match self.query(Hook::GetViewProviderName, &[]) {
            Some(ScriptValue::String(name)) if !name.is_empty() => name,
            _ => self.inner.view_provider_name(),
        }
    }

    fn sub_object(&self, sub_name: &str) -> Option<String> {
        match self.query(Hook::GetSubObject, &[json!(sub_name)]) {
            Some(ScriptValue::String(name)) => Some(name),
            Some(ScriptValue::Null) => None,
            _ => self.inner.sub_object(sub_name),
        }
    }

    fn sub_objects(&self) -> Vec<String> {
        match self.query(Hook::GetSubObjects, &[]) {
            Some(ScriptValue::Array(names)) if !names.is_empty() => names
                .iter()
                .filter_map(|name| name.as_str().map(str::to_string))
                .collect(),
            _ => self.inner.sub_objects(),
        }
    }

    fn linked_object(&self, recursive: bool) -> Option<String> {
        match self.query(Hook::GetLinkedObject, &[json!(recursive)]) {
            Some(ScriptValue::String(name)) => Some(name),
            Some(ScriptValue::Null) => None,
            _ => self.inner.linked_object(recursive),
        }
    }

    fn can_link_properties(&self) -> bool {
        self.query(Hook::CanLinkProperties, &[])
            .map_or_else(|| self.inner.can_link_properties(), |value| truthy(&value))
    }

    fn allow_duplicate_label(&self) -> bool {
        self.query(Hook::AllowDuplicateLabel, &[])
            .map_or_else(|| self.inner.allow_duplicate_label(), |value| truthy(&value))
    }

    fn redirect_sub_name(&self, sub_name: &str, top: &str) -> Option<String> {
        match self.query(Hook::RedirectSubName, &[json!(sub_name), json!(top)]) {
            Some(ScriptValue::String(redirected)) => Some(redirected),
            _ => self.inner.redirect_sub_name(sub_name, top),
        }
    }

    fn can_load_partial(&self) -> i32 {
        match self.query_int(Hook::CanLoadPartial, &[]) {
            Some(partial) if partial >= 0 => partial,
            _ => self.inner.can_load_partial(),
        }
    }

    fn has_child_element(&self) -> bool {
        self.query(Hook::HasChildElement, &[])
            .map_or_else(|| self.inner.has_child_element(), |value| truthy(&value))
    }

    fn is_element_visible(&self, element: &str) -> i32 {
        match self.query_int(Hook::IsElementVisible, &[json!(element)]) {
            Some(visible) if visible != -2 => visible,
            _ => self.inner.is_element_visible(element),
        }
    }

    fn set_element_visible(&mut self, element: &str, visible: bool) -> i32 {
        let result = self
            .notify(Hook::SetElementVisible, &[json!(element), json!(visible)])
            .and_then(|value| value.as_i64())
            .and_then(|value| i32::try_from(value).ok());
        match result {
            Some(result) if result != -2 => result,
            _ => self.inner.set_element_visible(element, visible),
        }
    }

    fn on_before_change_label(&mut self, label: &mut String) {
        let args = [json!(label.as_str())];
        match self.notify(Hook::OnBeforeChangeLabel, &args) {
            Some(ScriptValue::String(new_label)) => *label = new_label,
            Some(_) => {}
            None => self.inner.on_before_change_label(label),
        }
    }

    fn on_document_restored(&mut self) {
        self.notify(Hook::OnDocumentRestored, &[]);
        self.inner.on_document_restored();
    }
}
