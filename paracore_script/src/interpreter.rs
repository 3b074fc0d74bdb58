// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The process-wide script runtime: its lock and its class registry.
//!
//! Script values are shared with the runtime, which is not thread-safe. Every
//! access to a script value, including releasing the last reference, happens
//! while holding [`lock`]. The lock is reentrant so a hook may call back into
//! script objects on the same thread.
//!
//! Restoring a proxy by `module` and `class` needs a way to create an
//! instance. Classes are registered with [`register_class`] and created with
//! [`instantiate`].

use std::collections::BTreeMap;

use parking_lot::{
    ReentrantMutex, ReentrantMutexGuard, RwLock, const_reentrant_mutex, const_rwlock,
};
use tracing::debug;

use crate::error::ScriptError;
use crate::object::ScriptObject;

/// Creates a fresh, state-less instance of a script class.
pub type ClassFactory = fn() -> ScriptObject;

/// Proof that the interpreter lock is held. Released on drop.
pub type InterpreterGuard = ReentrantMutexGuard<'static, ()>;

static INTERPRETER: ReentrantMutex<()> = const_reentrant_mutex(());

static CLASSES: RwLock<BTreeMap<(String, String), ClassFactory>> = const_rwlock(BTreeMap::new());

/// Acquires the interpreter lock for the current thread.
///
/// Nested acquisitions on the same thread do not block.
#[must_use = "the lock is released when the guard is dropped"]
pub fn lock() -> InterpreterGuard {
    INTERPRETER.lock()
}

/// Returns `true` if the current thread holds the interpreter lock.
#[must_use]
pub fn is_held() -> bool {
    INTERPRETER.is_owned_by_current_thread()
}

/// Registers `factory` as `module.class`, replacing any previous factory.
pub fn register_class(module: &str, class: &str, factory: ClassFactory) {
    debug!(module, class, "registering script class");
    CLASSES
        .write()
        .insert((module.to_string(), class.to_string()), factory);
}

/// Returns `true` if `module.class` is registered.
#[must_use]
pub fn has_class(module: &str, class: &str) -> bool {
    CLASSES
        .read()
        .contains_key(&(module.to_string(), class.to_string()))
}

/// Creates an instance of `module.class`.
pub fn instantiate(module: &str, class: &str) -> Result<ScriptObject, ScriptError> {
    let factory = CLASSES
        .read()
        .get(&(module.to_string(), class.to_string()))
        .copied()
        .ok_or_else(|| ScriptError::UnknownClass {
            module: module.to_string(),
            class: class.to_string(),
        })?;
    let _gil = lock();
    Ok(factory())
}
