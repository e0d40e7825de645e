// ABOUTME: Assembly: a mutable, ordered collection of applications sharing launch options.
// ABOUTME: Membership changes only through add/remove; readers always see an atomic snapshot.

use crate::application::{AsApplication, LaunchOptions};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

/// Why a member was not added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("assembly is closed")]
    Closed,

    #[error("member is already present")]
    AlreadyPresent,
}

/// Members are identified by handle identity, not by name.
pub struct Assembly<A> {
    members: RwLock<Vec<Arc<A>>>,
    closed: AtomicBool,
    exclusive: Mutex<()>,
    options: LaunchOptions,
}

impl<A> std::fmt::Debug for Assembly<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assembly")
            .field("members", &self.members.read().len())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .field("options", &self.options)
            .finish()
    }
}

impl<A> Default for Assembly<A> {
    fn default() -> Self {
        Self::new(LaunchOptions::default())
    }
}

impl<A> Assembly<A> {
    pub fn new(options: LaunchOptions) -> Self {
        Self {
            members: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
            exclusive: Mutex::new(()),
            options,
        }
    }

    /// Launch options shared by every member, including replacements.
    pub fn options(&self) -> &LaunchOptions {
        &self.options
    }

    /// Add a member; false if that exact handle is already present or the
    /// assembly is closed.
    pub fn add(&self, member: Arc<A>) -> bool {
        self.try_add(member).is_ok()
    }

    /// Add a member, saying why it was refused.
    ///
    /// The closed flag is checked under the same write lock `close` takes, so
    /// a member is never admitted after `close` has taken its snapshot.
    pub fn try_add(&self, member: Arc<A>) -> Result<(), Rejected> {
        let mut members = self.members.write();
        if self.closed.load(Ordering::SeqCst) {
            return Err(Rejected::Closed);
        }
        if members.iter().any(|m| Arc::ptr_eq(m, &member)) {
            return Err(Rejected::AlreadyPresent);
        }
        members.push(member);
        Ok(())
    }

    /// Remove a member; false if that exact handle was not present.
    pub fn remove(&self, member: &Arc<A>) -> bool {
        let mut members = self.members.write();
        match members.iter().position(|m| Arc::ptr_eq(m, member)) {
            Some(index) => {
                members.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, member: &Arc<A>) -> bool {
        self.members.read().iter().any(|m| Arc::ptr_eq(m, member))
    }

    /// The members at this instant, in insertion order.
    pub fn snapshot(&self) -> Vec<Arc<A>> {
        self.members.read().clone()
    }

    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Serializes structural changes such as a member replacement.
    pub async fn lock_exclusive(&self) -> MutexGuard<'_, ()> {
        self.exclusive.lock().await
    }
}

impl<A: AsApplication> Assembly<A> {
    /// The first member with exactly this name.
    pub fn get(&self, name: &str) -> Option<Arc<A>> {
        self.members
            .read()
            .iter()
            .find(|m| m.application().name() == name)
            .cloned()
    }

    /// Members whose names start with `prefix`, in insertion order.
    pub fn get_all(&self, prefix: &str) -> Vec<Arc<A>> {
        self.members
            .read()
            .iter()
            .filter(|m| m.application().name().starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Close every member and mark the assembly closed.
    pub async fn close(&self) {
        let members = {
            let members = self.members.write();
            if self.closed.swap(true, Ordering::SeqCst) {
                return;
            }
            members.clone()
        };
        tracing::info!(members = members.len(), "Closing assembly");
        for member in members {
            member.application().close().await;
        }
    }
}
