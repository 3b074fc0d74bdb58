// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resolution and guarded invocation of proxy hooks.
//!
//! A [`ProxyBridge`] resolves the fixed set of [`Hook`] methods on a proxy
//! when the proxy is assigned. Calling a hook goes through
//! [`ProxyBridge::enter`], which refuses hooks the proxy does not implement
//! and hooks that are already running on this object, unless the proxy sets
//! `__allow_recursive_<hook>` to a truthy value.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use tracing::{debug, error};

use crate::error::ScriptError;
use crate::interpreter;
use crate::object::{CallTarget, HookTarget, ScriptObject, ScriptValue};

/// A proxy method that overrides native object behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Recomputes the object.
    Execute,
    /// Reports whether the object must recompute.
    MustExecute,
    /// Runs before a property changes.
    OnBeforeChange,
    /// Runs before the label changes; may replace the new label.
    OnBeforeChangeLabel,
    /// Runs after a property changed.
    OnChanged,
    /// Runs after the document was restored.
    OnDocumentRestored,
    /// Names the view provider type.
    GetViewProviderName,
    /// Resolves a sub-name.
    GetSubObject,
    /// Lists sub-objects.
    GetSubObjects,
    /// Resolves a link.
    GetLinkedObject,
    /// Reports whether links may expose the object's properties.
    CanLinkProperties,
    /// Reports whether the label may be shared.
    AllowDuplicateLabel,
    /// Rewrites a sub-name.
    RedirectSubName,
    /// Reports whether the object loads without its dependencies.
    CanLoadPartial,
    /// Reports whether the object has child elements.
    HasChildElement,
    /// Reports the visibility of a child element.
    IsElementVisible,
    /// Changes the visibility of a child element.
    SetElementVisible,
}

bitflags! {
    /// A set of [`Hook`]s.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct HookSet: u32 {
        /// [`Hook::Execute`].
        const EXECUTE = 1 << 0;
        /// [`Hook::MustExecute`].
        const MUST_EXECUTE = 1 << 1;
        /// [`Hook::OnBeforeChange`].
        const ON_BEFORE_CHANGE = 1 << 2;
        /// [`Hook::OnBeforeChangeLabel`].
        const ON_BEFORE_CHANGE_LABEL = 1 << 3;
        /// [`Hook::OnChanged`].
        const ON_CHANGED = 1 << 4;
        /// [`Hook::OnDocumentRestored`].
        const ON_DOCUMENT_RESTORED = 1 << 5;
        /// [`Hook::GetViewProviderName`].
        const GET_VIEW_PROVIDER_NAME = 1 << 6;
        /// [`Hook::GetSubObject`].
        const GET_SUB_OBJECT = 1 << 7;
        /// [`Hook::GetSubObjects`].
        const GET_SUB_OBJECTS = 1 << 8;
        /// [`Hook::GetLinkedObject`].
        const GET_LINKED_OBJECT = 1 << 9;
        /// [`Hook::CanLinkProperties`].
        const CAN_LINK_PROPERTIES = 1 << 10;
        /// [`Hook::AllowDuplicateLabel`].
        const ALLOW_DUPLICATE_LABEL = 1 << 11;
        /// [`Hook::RedirectSubName`].
        const REDIRECT_SUB_NAME = 1 << 12;
        /// [`Hook::CanLoadPartial`].
        const CAN_LOAD_PARTIAL = 1 << 13;
        /// [`Hook::HasChildElement`].
        const HAS_CHILD_ELEMENT = 1 << 14;
        /// [`Hook::IsElementVisible`].
        const IS_ELEMENT_VISIBLE = 1 << 15;
        /// [`Hook::SetElementVisible`].
        const SET_ELEMENT_VISIBLE = 1 << 16;
    }
}

impl Hook {
    /// Every hook, in declaration order.
    pub const ALL: [Self; 17] = [
        Self::Execute,
        Self::MustExecute,
        Self::OnBeforeChange,
        Self::OnBeforeChangeLabel,
        Self::OnChanged,
        Self::OnDocumentRestored,
        Self::GetViewProviderName,
        Self::GetSubObject,
        Self::GetSubObjects,
        Self::GetLinkedObject,
        Self::CanLinkProperties,
        Self::AllowDuplicateLabel,
        Self::RedirectSubName,
        Self::CanLoadPartial,
        Self::HasChildElement,
        Self::IsElementVisible,
        Self::SetElementVisible,
    ];

    /// Returns the proxy attribute name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Execute => "execute",
            Self::MustExecute => "mustExecute",
            Self::OnBeforeChange => "onBeforeChange",
            Self::OnBeforeChangeLabel => "onBeforeChangeLabel",
            Self::OnChanged => "onChanged",
            Self::OnDocumentRestored => "onDocumentRestored",
            Self::GetViewProviderName => "getViewProviderName",
            Self::GetSubObject => "getSubObject",
            Self::GetSubObjects => "getSubObjects",
            Self::GetLinkedObject => "getLinkedObject",
            Self::CanLinkProperties => "canLinkProperties",
            Self::AllowDuplicateLabel => "allowDuplicateLabel",
            Self::RedirectSubName => "redirectSubName",
            Self::CanLoadPartial => "canLoadPartial",
            Self::HasChildElement => "hasChildElement",
            Self::IsElementVisible => "isElementVisible",
            Self::SetElementVisible => "setElementVisible",
        }
    }

    /// Returns the attribute that lifts the recursion guard for this hook.
    #[must_use]
    pub fn recursion_attr(self) -> String {
        format!("__allow_recursive_{}", self.name())
    }

    /// Returns the hook's bit.
    #[must_use]
    pub const fn flag(self) -> HookSet {
        HookSet::from_bits_retain(1 << self as u32)
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The hooks a proxy implements, and which of them are running.
///
/// # Example
///
/// ```rust
/// use paracore_script::{Hook, ProxyBridge, ScriptObject, ScriptValue};
///
/// let proxy = ScriptObject::new("demo", "Part")
///     .with_method("execute", |_| Ok(ScriptValue::Null))
///     .with_value("__allow_recursive_execute", true);
///
/// let mut bridge = ProxyBridge::new();
/// bridge.init(Some(proxy));
/// assert!(bridge.is_bound(Hook::Execute));
/// assert!(!bridge.is_bound(Hook::OnChanged));
/// assert!(bridge.allows_recursion(Hook::Execute));
///
/// // Unbound hooks are never entered.
/// assert!(bridge.enter(Hook::OnChanged).is_none());
///
/// let call = bridge.enter(Hook::Execute).unwrap();
/// assert!(bridge.is_calling(Hook::Execute));
/// drop(call);
/// assert!(!bridge.is_calling(Hook::Execute));
/// ```
#[derive(Debug, Default)]
pub struct ProxyBridge {
    proxy: Option<ScriptObject>,
    bound: HookSet,
    recursive: HookSet,
    calling: Rc<Cell<HookSet>>,
}

impl ProxyBridge {
    /// Creates a bridge with no proxy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `proxy` and resolves its hooks.
    ///
    /// Hooks that are running keep their guard across a rebind.
    pub fn init(&mut self, proxy: Option<ScriptObject>) {
        let _gil = interpreter::lock();
        self.bound = HookSet::empty();
        self.recursive = HookSet::empty();
        if let Some(proxy) = &proxy {
            for hook in Hook::ALL {
                if proxy.has_method(hook.name()) {
                    self.bound |= hook.flag();
                }
                if proxy.is_true(&hook.recursion_attr()) {
                    self.recursive |= hook.flag();
                }
            }
            debug!(
                class = ?proxy.class(),
                hooks = self.bound.bits().count_ones(),
                "resolved proxy hooks"
            );
        }
        self.proxy = proxy;
    }

    /// Returns the bound proxy.
    #[must_use]
    pub fn proxy(&self) -> Option<&ScriptObject> {
        self.proxy.as_ref()
    }

    /// Returns the hooks the proxy implements.
    #[must_use]
    pub fn bound(&self) -> HookSet {
        self.bound
    }

    /// Returns `true` if the proxy implements `hook`.
    #[must_use]
    pub fn is_bound(&self, hook: Hook) -> bool {
        self.bound.contains(hook.flag())
    }

    /// Returns `true` if `hook` may be entered while it is running.
    #[must_use]
    pub fn allows_recursion(&self, hook: Hook) -> bool {
        self.recursive.contains(hook.flag())
    }

    /// Returns `true` if `hook` is running on this object.
    #[must_use]
    pub fn is_calling(&self, hook: Hook) -> bool {
        self.calling.get().contains(hook.flag())
    }

    /// Prepares a call of `hook`.
    ///
    /// Returns `None` if the proxy does not implement the hook, or if the
    /// hook is already running and recursion is not allowed. The hook counts
    /// as running until the returned [`HookCall`] is dropped or invoked.
    #[must_use]
    pub fn enter(&self, hook: Hook) -> Option<HookCall> {
        if !self.is_bound(hook) {
            return None;
        }
        if self.is_calling(hook) && !self.allows_recursion(hook) {
            debug!(%hook, "skipping recursive hook call");
            return None;
        }
        let proxy = self.proxy.clone()?;
        Some(HookCall {
            hook,
            proxy: Some(proxy),
            _guard: HookGuard::acquire(Rc::clone(&self.calling), hook.flag()),
        })
    }
}

impl Drop for ProxyBridge {
    fn drop(&mut self) {
        let _gil = interpreter::lock();
        self.proxy.take();
    }
}

/// Marks a hook as running; restores the previous mark on drop.
#[derive(Debug)]
pub struct HookGuard {
    calling: Rc<Cell<HookSet>>,
    flag: HookSet,
    was_set: bool,
}

impl HookGuard {
    fn acquire(calling: Rc<Cell<HookSet>>, flag: HookSet) -> Self {
        let current = calling.get();
        calling.set(current | flag);
        Self {
            calling,
            flag,
            was_set: current.contains(flag),
        }
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        let mut current = self.calling.get();
        current.set(self.flag, self.was_set);
        self.calling.set(current);
    }
}

/// A hook call that passed the guard.
#[derive(Debug)]
pub struct HookCall {
    hook: Hook,
    // Taken under the interpreter lock on drop.
    proxy: Option<ScriptObject>,
    _guard: HookGuard,
}

impl Drop for HookCall {
    fn drop(&mut self) {
        let _gil = interpreter::lock();
        self.proxy.take();
    }
}

impl HookCall {
    /// Returns the hook being called.
    #[must_use]
    pub fn hook(&self) -> Hook {
        self.hook
    }

    /// Calls the hook with read access to `target`.
    pub fn invoke<'a>(
        self,
        target: &'a dyn HookTarget,
        args: &'a [ScriptValue],
    ) -> Result<ScriptValue, ScriptError> {
        self.call(CallTarget::Shared(target), args)
    }

    /// Calls the hook with write access to `target`.
    pub fn invoke_mut<'a>(
        self,
        target: &'a mut dyn HookTarget,
        args: &'a [ScriptValue],
    ) -> Result<ScriptValue, ScriptError> {
        self.call(CallTarget::Exclusive(target), args)
    }

    fn call<'a>(
        self,
        target: CallTarget<'a>,
        args: &'a [ScriptValue],
    ) -> Result<ScriptValue, ScriptError> {
        let name = self.hook.name();
        match &self.proxy {
            Some(proxy) => proxy.invoke(name, target, args),
            None => Err(ScriptError::NoMethod(name.to_string())),
        }
    }

    /// Like [`invoke`](Self::invoke), but logs a failure and returns `None`.
    pub fn decide<'a>(
        self,
        target: &'a dyn HookTarget,
        args: &'a [ScriptValue],
    ) -> Option<ScriptValue> {
        let hook = self.hook;
        let object = target.object_name().to_string();
        logged(hook, &object, self.invoke(target, args))
    }

    /// Like [`invoke_mut`](Self::invoke_mut), but logs a failure and returns
    /// `None`.
    pub fn decide_mut<'a>(
        self,
        target: &'a mut dyn HookTarget,
        args: &'a [ScriptValue],
    ) -> Option<ScriptValue> {
        let hook = self.hook;
        let object = target.object_name().to_string();
        logged(hook, &object, self.invoke_mut(target, args))
    }
}

fn logged(
    hook: Hook,
    object: &str,
    result: Result<ScriptValue, ScriptError>,
) -> Option<ScriptValue> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            error!(%hook, object, %err, "proxy hook failed");
            None
        }
    }
}
