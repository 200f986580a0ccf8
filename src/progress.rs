// src/progress.rs

//! Hierarchical progress tracking
//!
//! A [`Completion`] is one node in a tree of progress reporters. A node
//! declares how many discrete steps it will take with
//! [`Completion::set_total_steps`] and calls [`Completion::step_done`] as
//! each one finishes. Work done inside a step can report through a child
//! node obtained from [`Completion::get_child`]; the child's percentage is
//! scaled into the parent's current step so that the root always shows
//! overall progress.
//!
//! # Example
//!
//! ```
//! use zif::progress::Completion;
//!
//! # fn main() -> zif::Result<()> {
//! let completion = Completion::new();
//! completion.set_total_steps(2)?;
//!
//! // first step has its own sub-steps
//! let child = completion.get_child()?;
//! child.set_total_steps(4)?;
//! child.step_done()?;
//! assert_eq!(completion.percentage(), 12);
//! for _ in 0..3 {
//!     child.step_done()?;
//! }
//! completion.step_done()?;
//! assert_eq!(completion.percentage(), 50);
//!
//! completion.step_done()?;
//! assert_eq!(completion.percentage(), 100);
//! # Ok(())
//! # }
//! ```
//!
//! # Notifications
//!
//! Observers registered with [`Completion::subscribe`] are told about
//! percentage changes only when the value actually changes. Nodes with more
//! than one step also forward their active child's percentage as a
//! "subpercentage", which is what a UI shows as the secondary bar.

use crate::error::{Result, UsageError};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

/// Events emitted by a [`Completion`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Overall percentage of this node changed
    Percentage(u32),
    /// Percentage of the active sub-operation changed
    Subpercentage(u32),
}

/// Receiver of progress notifications
///
/// Implementations must be thread-safe, the tree may be shared with a
/// worker thread that owns the leaf operation.
pub trait ProgressObserver: Send + Sync {
    /// Called when the node percentage changes
    fn percentage_changed(&self, percentage: u32);

    /// Called when the active sub-operation percentage changes
    fn subpercentage_changed(&self, _percentage: u32) {}
}

/// Handle returned by [`Completion::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Node {
    steps: u32,
    current: u32,
    last_percentage: u32,
    child: Option<Completion>,
    parent: Weak<Mutex<Node>>,
    observers: Vec<(SubscriptionId, Arc<dyn ProgressObserver>)>,
    next_subscription: u64,
}

impl Node {
    fn new(parent: Weak<Mutex<Node>>) -> Self {
        Self {
            steps: 0,
            current: 0,
            last_percentage: 0,
            child: None,
            parent,
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    fn observers(&self) -> Vec<Arc<dyn ProgressObserver>> {
        self.observers.iter().map(|(_, o)| Arc::clone(o)).collect()
    }

    /// Take the child out of the tree so late updates from it are dropped
    fn detach_child(&mut self) {
        if let Some(child) = self.child.take() {
            child.lock().parent = Weak::new();
        }
    }
}

/// A node in the progress tree
///
/// Cloning a `Completion` yields another handle to the same node.
#[derive(Clone)]
pub struct Completion {
    node: Arc<Mutex<Node>>,
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.lock();
        f.debug_struct("Completion")
            .field("steps", &node.steps)
            .field("current", &node.current)
            .field("percentage", &node.last_percentage)
            .field("has_child", &node.child.is_some())
            .finish()
    }
}

impl Completion {
    /// Create a new root node
    pub fn new() -> Self {
        Self {
            node: Arc::new(Mutex::new(Node::new(Weak::new()))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Node> {
        self.node.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last percentage reported by this node
    pub fn percentage(&self) -> u32 {
        self.lock().last_percentage
    }

    /// Declared number of steps, if set
    pub fn total_steps(&self) -> Option<u32> {
        let steps = self.lock().steps;
        (steps != 0).then_some(steps)
    }

    /// Number of steps marked done
    pub fn completed_steps(&self) -> u32 {
        self.lock().current
    }

    /// Whether every declared step is done
    pub fn is_complete(&self) -> bool {
        let node = self.lock();
        node.steps != 0 && node.current == node.steps
    }

    /// Whether a child is live for the current step
    pub fn has_child(&self) -> bool {
        self.lock().child.is_some()
    }

    /// Register an observer
    pub fn subscribe(&self, observer: Arc<dyn ProgressObserver>) -> SubscriptionId {
        let mut node = self.lock();
        let id = SubscriptionId(node.next_subscription);
        node.next_subscription += 1;
        node.observers.push((id, observer));
        id
    }

    /// Register a closure receiving [`ProgressEvent`]s
    pub fn on_event<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(ProgressEvent) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(CallbackObserver::new(callback)))
    }

    /// Remove an observer, returns false if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut node = self.lock();
        let before = node.observers.len();
        node.observers.retain(|(sid, _)| *sid != id);
        node.observers.len() != before
    }

    /// Declare how many times [`step_done`](Self::step_done) will be called
    ///
    /// May only be called once per node lifetime (or once after each
    /// [`reset`](Self::reset)).
    pub fn set_total_steps(&self, steps: u32) -> Result<()> {
        if steps == 0 {
            return Err(UsageError::ZeroSteps.into());
        }
        let mut node = self.lock();
        if node.steps != 0 {
            return Err(UsageError::StepsAlreadySet(node.steps).into());
        }
        node.detach_child();
        node.current = 0;
        node.last_percentage = 0;
        node.steps = steps;
        Ok(())
    }

    /// Create the child node for the current step
    ///
    /// Only one child may exist per step; it is discarded when the step is
    /// marked done.
    pub fn get_child(&self) -> Result<Completion> {
        let mut node = self.lock();
        if node.steps == 0 {
            return Err(UsageError::StepsNotSet.into());
        }
        if node.current >= node.steps {
            return Err(UsageError::AlreadyComplete { steps: node.steps }.into());
        }
        if node.child.is_some() {
            return Err(UsageError::ChildActive.into());
        }
        let child = Completion {
            node: Arc::new(Mutex::new(Node::new(Arc::downgrade(&self.node)))),
        };
        node.child = Some(child.clone());
        Ok(child)
    }

    /// Mark the current step as done
    pub fn step_done(&self) -> Result<()> {
        let percentage = {
            let mut node = self.lock();
            if node.steps == 0 {
                return Err(UsageError::StepsNotSet.into());
            }
            if node.current == node.steps {
                return Err(UsageError::AlreadyComplete { steps: node.steps }.into());
            }
            if let Some(child) = &node.child {
                let child = child.lock();
                if child.steps != 0 && child.current < child.steps {
                    return Err(UsageError::ChildUnfinished {
                        completed: child.current,
                        steps: child.steps,
                    }
                    .into());
                }
            }
            node.detach_child();
            node.current += 1;
            discrete_to_percent(node.current, node.steps)
        };
        self.propagate(percentage);
        Ok(())
    }

    /// Force this node to 100%
    ///
    /// Any remaining steps are considered done and the child is discarded.
    pub fn finish(&self) {
        {
            let mut node = self.lock();
            node.detach_child();
            node.current = node.steps;
        }
        self.propagate(100);
    }

    /// Set the percentage directly
    ///
    /// Used where progress is continuous (e.g. bytes downloaded) rather than
    /// discrete. Percentages must not go down.
    pub fn set_percentage(&self, percentage: u32) -> Result<()> {
        if percentage > 100 {
            return Err(UsageError::PercentageOutOfRange(percentage).into());
        }
        self.update_percentage(percentage)
    }

    /// Return the node to its freshly created state
    ///
    /// Observers stay registered.
    pub fn reset(&self) {
        let mut node = self.lock();
        node.detach_child();
        node.steps = 0;
        node.current = 0;
        node.last_percentage = 0;
    }

    fn update_percentage(&self, percentage: u32) -> Result<()> {
        let (observers, parent) = {
            let mut node = self.lock();
            if percentage == node.last_percentage {
                return Ok(());
            }
            if percentage < node.last_percentage {
                return Err(UsageError::PercentageDecrease {
                    from: node.last_percentage,
                    to: percentage,
                }
                .into());
            }
            node.last_percentage = percentage;
            (node.observers(), node.parent.upgrade())
        };

        for observer in observers {
            observer.percentage_changed(percentage);
        }
        if let Some(parent) = parent {
            Completion { node: parent }.child_percentage_changed(percentage);
        }
        Ok(())
    }

    /// Internal updates never fail, a rejected value is only logged
    fn propagate(&self, percentage: u32) {
        if let Err(e) = self.update_percentage(percentage) {
            debug!("ignoring progress update: {}", e);
        }
    }

    fn emit_subpercentage(&self, percentage: u32) {
        let (observers, parent) = {
            let node = self.lock();
            (node.observers(), node.parent.upgrade())
        };
        for observer in observers {
            observer.subpercentage_changed(percentage);
        }
        if let Some(parent) = parent {
            Completion { node: parent }.child_subpercentage_changed(percentage);
        }
    }

    fn child_percentage_changed(&self, percentage: u32) {
        let (steps, current) = {
            let node = self.lock();
            (node.steps, node.current)
        };

        // a single-step node behaves as if the child were itself
        if steps == 1 {
            self.propagate(percentage);
            return;
        }
        if steps == 0 {
            warn!("child progress on a node that did not have steps set");
            return;
        }

        self.emit_subpercentage(percentage);

        if current >= steps {
            warn!("child progress after all {} steps were done", steps);
            return;
        }

        let scaled = (current * 100 + percentage) / steps;
        self.propagate(scaled);
    }

    fn child_subpercentage_changed(&self, percentage: u32) {
        if self.lock().steps == 1 {
            self.emit_subpercentage(percentage);
        }
    }
}

fn discrete_to_percent(discrete: u32, steps: u32) -> u32 {
    if steps == 0 {
        return 0;
    }
    if discrete >= steps {
        return 100;
    }
    discrete * 100 / steps
}

/// Observer that logs percentage changes through tracing
#[derive(Debug)]
pub struct LogObserver {
    name: String,
}

impl LogObserver {
    /// Create a logging observer labelled with the operation name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ProgressObserver for LogObserver {
    fn percentage_changed(&self, percentage: u32) {
        info!("{}: {}%", self.name, percentage);
    }

    fn subpercentage_changed(&self, percentage: u32) {
        debug!("{}: sub-operation {}%", self.name, percentage);
    }
}

/// Observer calling a closure for each event
pub struct CallbackObserver<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackObserver<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    /// Wrap a closure
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressObserver for CallbackObserver<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn percentage_changed(&self, percentage: u32) {
        (self.callback)(ProgressEvent::Percentage(percentage));
    }

    fn subpercentage_changed(&self, percentage: u32) {
        (self.callback)(ProgressEvent::Subpercentage(percentage));
    }
}
