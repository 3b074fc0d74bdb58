// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The script object model.
//!
//! A [`ScriptObject`] is a reference-counted bag of attributes shared between
//! the native side and the script runtime. Attributes are either data values
//! or methods. Data values are JSON values; methods are native closures that
//! receive a [`ScriptCall`].
//!
//! Attribute names starting with `__` are markers and are never part of the
//! persisted state.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Map;

use crate::error::ScriptError;
use crate::interpreter;

/// A script data value.
pub type ScriptValue = serde_json::Value;

/// A script method.
pub type ScriptFn =
    Arc<dyn Fn(&mut ScriptCall<'_>) -> Result<ScriptValue, ScriptError> + Send + Sync>;

/// One attribute of a [`ScriptObject`].
#[derive(Clone)]
pub enum ScriptAttr {
    /// A data value.
    Value(ScriptValue),
    /// A callable.
    Method(ScriptFn),
}

impl fmt::Debug for ScriptAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Method(_) => f.write_str("Method"),
        }
    }
}

/// Returns the script truth value of `value`.
///
/// `null`, `false`, zero, and empty strings, lists, and maps are false.
#[must_use]
pub fn truthy(value: &ScriptValue) -> bool {
    match value {
        ScriptValue::Null => false,
        ScriptValue::Bool(b) => *b,
        ScriptValue::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        ScriptValue::String(s) => !s.is_empty(),
        ScriptValue::Array(items) => !items.is_empty(),
        ScriptValue::Object(map) => !map.is_empty(),
    }
}

fn is_marker(name: &str) -> bool {
    name.starts_with("__")
}

struct Inner {
    class: Option<(String, String)>,
    attrs: RwLock<BTreeMap<String, ScriptAttr>>,
}

/// A shared script object.
///
/// Cloning shares the object. All accessors take the interpreter lock.
///
/// # Example
///
/// ```rust
/// use paracore_script::{ScriptObject, ScriptValue};
///
/// let object = ScriptObject::new("shapes", "Box")
///     .with_value("Width", 2.0)
///     .with_method("area", |call| {
///         let width = call.this().value("Width").and_then(|w| w.as_f64());
///         Ok(ScriptValue::from(width.unwrap_or(0.0) * 2.0))
///     });
///
/// assert_eq!(object.call_method("area", &[]).unwrap(), ScriptValue::from(4.0));
/// assert!(object.call_method("volume", &[]).is_err());
/// assert_eq!(object.data().len(), 1);
/// ```
#[derive(Clone)]
pub struct ScriptObject {
    inner: Arc<Inner>,
}

impl fmt::Debug for ScriptObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let _gil = interpreter::lock();
        f.debug_struct("ScriptObject")
            .field("class", &self.inner.class)
            .field("attrs", &*self.inner.attrs.read())
            .finish()
    }
}

impl ScriptObject {
    /// Creates an instance of `module.class` with no attributes.
    #[must_use]
    pub fn new(module: &str, class: &str) -> Self {
        Self::with_class(Some((module.to_string(), class.to_string())))
    }

    /// Creates an object that belongs to no class.
    ///
    /// Plain objects are saved as bare JSON.
    #[must_use]
    pub fn plain() -> Self {
        Self::with_class(None)
    }

    fn with_class(class: Option<(String, String)>) -> Self {
        Self {
            inner: Arc::new(Inner {
                class,
                attrs: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    /// Returns the module and class name, if the object has a class.
    #[must_use]
    pub fn class(&self) -> Option<(&str, &str)> {
        self.inner
            .class
            .as_ref()
            .map(|(module, class)| (module.as_str(), class.as_str()))
    }

    /// Adds a data attribute.
    #[must_use]
    pub fn with_value(self, name: &str, value: impl Into<ScriptValue>) -> Self {
        self.set_value(name, value);
        self
    }

    /// Adds a method.
    #[must_use]
    pub fn with_method<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&mut ScriptCall<'_>) -> Result<ScriptValue, ScriptError> + Send + Sync + 'static,
    {
        self.set_method(name, f);
        self
    }

    /// Sets a data attribute, replacing any attribute of that name.
    pub fn set_value(&self, name: &str, value: impl Into<ScriptValue>) {
        self.set_attr(name, ScriptAttr::Value(value.into()));
    }

    /// Sets a method, replacing any attribute of that name.
    pub fn set_method<F>(&self, name: &str, f: F)
    where
        F: Fn(&mut ScriptCall<'_>) -> Result<ScriptValue, ScriptError> + Send + Sync + 'static,
    {
        self.set_attr(name, ScriptAttr::Method(Arc::new(f)));
    }

    /// Sets an attribute.
    pub fn set_attr(&self, name: &str, attr: ScriptAttr) {
        let _gil = interpreter::lock();
        self.inner.attrs.write().insert(name.to_string(), attr);
    }

    /// Removes an attribute. Returns `true` if it existed.
    pub fn remove_attr(&self, name: &str) -> bool {
        let _gil = interpreter::lock();
        self.inner.attrs.write().remove(name).is_some()
    }

    /// Returns `true` if the object has an attribute of that name.
    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        let _gil = interpreter::lock();
        self.inner.attrs.read().contains_key(name)
    }

    /// Returns `true` if the named attribute is a method.
    #[must_use]
    pub fn has_method(&self, name: &str) -> bool {
        self.method(name).is_some()
    }

    /// Returns a copy of a data attribute.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<ScriptValue> {
        let _gil = interpreter::lock();
        match self.inner.attrs.read().get(name) {
            Some(ScriptAttr::Value(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Returns `true` if the named data attribute exists and is truthy.
    #[must_use]
    pub fn is_true(&self, name: &str) -> bool {
        self.value(name).is_some_and(|value| truthy(&value))
    }

    fn method(&self, name: &str) -> Option<ScriptFn> {
        let _gil = interpreter::lock();
        match self.inner.attrs.read().get(name) {
            Some(ScriptAttr::Method(f)) => Some(Arc::clone(f)),
            _ => None,
        }
    }

    /// Returns the data attributes that make up the object's state.
    #[must_use]
    pub fn data(&self) -> Map<String, ScriptValue> {
        let _gil = interpreter::lock();
        self.inner
            .attrs
            .read()
            .iter()
            .filter(|(name, _)| !is_marker(name))
            .filter_map(|(name, attr)| match attr {
                ScriptAttr::Value(value) => Some((name.clone(), value.clone())),
                ScriptAttr::Method(_) => None,
            })
            .collect()
    }

    /// Replaces the state data attributes with `data`.
    ///
    /// Methods and marker attributes are kept.
    pub fn set_data(&self, data: Map<String, ScriptValue>) {
        let _gil = interpreter::lock();
        let mut attrs = self.inner.attrs.write();
        attrs.retain(|name, attr| is_marker(name) || matches!(attr, ScriptAttr::Method(_)));
        for (name, value) in data {
            attrs.insert(name, ScriptAttr::Value(value));
        }
    }

    /// Calls a method with no native target.
    pub fn call_method(&self, name: &str, args: &[ScriptValue]) -> Result<ScriptValue, ScriptError> {
        self.invoke(name, CallTarget::Detached, args)
    }

    pub(crate) fn invoke<'a>(
        &self,
        name: &str,
        target: CallTarget<'a>,
        args: &'a [ScriptValue],
    ) -> Result<ScriptValue, ScriptError> {
        let _gil = interpreter::lock();
        // The attribute map is not borrowed during the call, so the method
        // may change its own object.
        let f = self
            .method(name)
            .ok_or_else(|| ScriptError::NoMethod(name.to_string()))?;
        let mut call = ScriptCall {
            this: self.clone(),
            target,
            args,
        };
        f(&mut call)
    }

    /// Returns `true` if both handles share one object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// The native object a hook operates on.
///
/// Scripts see their object through property names and path expressions such
/// as `Shape[0]`.
pub trait HookTarget {
    /// Returns the object's internal name.
    fn object_name(&self) -> &str;

    /// Reads a property value by path.
    fn read(&self, path: &str) -> Result<ScriptValue, ScriptError>;

    /// Writes a property value by path, with change notifications.
    fn write(&mut self, path: &str, value: &ScriptValue) -> Result<(), ScriptError>;

    /// Reads a property of another object.
    ///
    /// Only possible while the target is executing.
    fn read_linked(&self, object: &str, _path: &str) -> Result<ScriptValue, ScriptError> {
        Err(ScriptError::Unreachable(object.to_string()))
    }
}

pub(crate) enum CallTarget<'a> {
    Detached,
    Shared(&'a dyn HookTarget),
    Exclusive(&'a mut dyn HookTarget),
}

/// The arguments of one script method call.
pub struct ScriptCall<'a> {
    this: ScriptObject,
    target: CallTarget<'a>,
    args: &'a [ScriptValue],
}

impl fmt::Debug for ScriptCall<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match &self.target {
            CallTarget::Detached => None,
            CallTarget::Shared(target) => Some(target.object_name()),
            CallTarget::Exclusive(target) => Some(target.object_name()),
        };
        f.debug_struct("ScriptCall")
            .field("this", &self.this)
            .field("target", &target)
            .field("args", &self.args)
            .finish()
    }
}

impl<'a> ScriptCall<'a> {
    /// Returns the object the method was called on.
    #[must_use]
    pub fn this(&self) -> &ScriptObject {
        &self.this
    }

    /// Returns the call arguments.
    #[must_use]
    pub fn args(&self) -> &'a [ScriptValue] {
        self.args
    }

    /// Returns argument `index`.
    pub fn arg(&self, index: usize) -> Result<&'a ScriptValue, ScriptError> {
        self.args.get(index).ok_or(ScriptError::BadArgument(index))
    }

    /// Returns argument `index` as a string.
    pub fn str_arg(&self, index: usize) -> Result<&'a str, ScriptError> {
        self.arg(index)?
            .as_str()
            .ok_or(ScriptError::BadArgument(index))
    }

    /// Returns the native object, for reading.
    pub fn target(&self) -> Result<&dyn HookTarget, ScriptError> {
        match &self.target {
            CallTarget::Detached => Err(ScriptError::NoTarget),
            CallTarget::Shared(target) => Ok(*target),
            CallTarget::Exclusive(target) => Ok(&**target),
        }
    }

    /// Returns the native object, for writing.
    ///
    /// Query hooks only get read access.
    pub fn target_mut(&mut self) -> Result<&mut dyn HookTarget, ScriptError> {
        match &mut self.target {
            CallTarget::Detached => Err(ScriptError::NoTarget),
            CallTarget::Shared(_) => Err(ScriptError::ReadOnlyTarget),
            CallTarget::Exclusive(target) => Ok(&mut **target),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct Cell {
        value: ScriptValue,
    }

    impl HookTarget for Cell {
        fn object_name(&self) -> &str {
            "Cell"
        }

        fn read(&self, _path: &str) -> Result<ScriptValue, ScriptError> {
            Ok(self.value.clone())
        }

        fn write(&mut self, _path: &str, value: &ScriptValue) -> Result<(), ScriptError> {
            self.value = value.clone();
            Ok(())
        }
    }

    fn doubler() -> ScriptObject {
        ScriptObject::plain().with_method("double", |call| {
            let value = call.target()?.read("Value")?;
            let doubled = json!(value.as_i64().unwrap_or(0) * 2);
            call.target_mut()?.write("Value", &doubled)?;
            Ok(doubled)
        })
    }

    #[test]
    fn truthiness_follows_script_rules() {
        for value in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(!truthy(&value), "{value} should be false");
        }
        for value in [json!(true), json!(-1), json!("x"), json!([0]), json!({"a": 0})] {
            assert!(truthy(&value), "{value} should be true");
        }
    }

    #[test]
    fn state_excludes_methods_and_markers() {
        let object = doubler()
            .with_value("Width", 3)
            .with_value("__object__", true);
        assert_eq!(object.data(), json!({"Width": 3}).as_object().cloned().unwrap());

        object.set_data(json!({"Depth": 1}).as_object().cloned().unwrap());
        assert_eq!(object.value("Width"), None);
        assert_eq!(object.value("Depth"), Some(json!(1)));
        assert!(object.has_method("double"));
        assert!(object.is_true("__object__"));
    }

    #[test]
    fn methods_reach_the_target() {
        let object = doubler();
        let mut cell = Cell { value: json!(21) };
        let result = object.invoke("double", CallTarget::Exclusive(&mut cell), &[]);
        assert_eq!(result, Ok(json!(42)));
        assert_eq!(cell.value, json!(42));
    }

    #[test]
    fn shared_targets_are_read_only() {
        let object = doubler();
        let cell = Cell { value: json!(1) };
        let result = object.invoke("double", CallTarget::Shared(&cell), &[]);
        assert_eq!(result, Err(ScriptError::ReadOnlyTarget));
        assert_eq!(
            object.call_method("double", &[]),
            Err(ScriptError::NoTarget)
        );
    }

    #[test]
    fn methods_may_change_their_own_object() {
        let object = ScriptObject::plain().with_method("bump", |call| {
            let count = call.this().value("count").and_then(|c| c.as_i64()).unwrap_or(0);
            call.this().set_value("count", count + 1);
            Ok(ScriptValue::Null)
        });
        object.call_method("bump", &[]).unwrap();
        object.call_method("bump", &[]).unwrap();
        assert_eq!(object.value("count"), Some(json!(2)));
    }

    #[test]
    fn clones_share_the_object() {
        let a = ScriptObject::new("m", "C");
        let b = a.clone();
        b.set_value("x", 1);
        assert_eq!(a.value("x"), Some(json!(1)));
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&ScriptObject::new("m", "C")));
    }
}
