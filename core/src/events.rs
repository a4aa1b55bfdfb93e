//! Lifecycle notifications emitted after successful writes.

use core::fmt;
use std::cell::{Cell, OnceCell, RefCell};
use std::rc::Rc;

use crate::entity::{Entity, EntityRef};
use crate::value::Field;

/// Emitted once per successful insert, update or delete.
#[derive(Debug)]
pub enum LifecycleEvent {
    Created(EntityRef),
    Updated(UpdatedEvent),
    Deleted(EntityRef),
}

impl LifecycleEvent {
    pub fn entity(&self) -> &EntityRef {
        match self {
            LifecycleEvent::Created(entity) | LifecycleEvent::Deleted(entity) => entity,
            LifecycleEvent::Updated(event) => &event.entity,
        }
    }

    pub fn table(&self) -> &'static str {
        self.entity().borrow().table()
    }
}

/// Payload of [`LifecycleEvent::Updated`].
pub struct UpdatedEvent {
    entity: EntityRef,
    changed: Vec<&'static str>,
    previous: Vec<Field>,
    old_version: OnceCell<Entity>,
}

impl UpdatedEvent {
    pub(crate) fn new(entity: EntityRef, changed: Vec<&'static str>, previous: Vec<Field>) -> Self {
        Self {
            entity,
            changed,
            previous,
            old_version: OnceCell::new(),
        }
    }

    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    /// Columns written by the update, in declaration order.
    pub fn changed(&self) -> &[&'static str] {
        &self.changed
    }

    /// Value `column` had before the update, if it was written.
    pub fn previous(&self, column: &str) -> Option<&Field> {
        self.changed
            .iter()
            .position(|name| *name == column)
            .map(|i| &self.previous[i])
    }

    /// A copy of the entity with the pre-update values restored.
    ///
    /// Built on first access.
    pub fn old_version(&self) -> &Entity {
        self.old_version.get_or_init(|| {
            let mut old = self.entity.borrow().clone();
            for (column, field) in self.changed.iter().zip(&self.previous) {
                if let Some(index) = old.def().column_index(column) {
                    old.set_field_at(index, field.clone());
                }
            }
            old
        })
    }
}

impl fmt::Debug for UpdatedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdatedEvent")
            .field("table", &self.entity.borrow().table())
            .field("changed", &self.changed)
            .field("previous", &self.previous)
            .finish()
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Rc<dyn Fn(&LifecycleEvent)>;

/// Synchronous publish/subscribe for lifecycle events.
///
/// Listeners run in subscription order. A listener may subscribe or
/// unsubscribe while an event is being delivered; the change applies from
/// the next event on.
#[derive(Default)]
pub struct EventBus {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(SubscriptionId, Listener)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&LifecycleEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Returns whether the subscription was still active.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(candidate, _)| *candidate != id);
        listeners.len() != before
    }

    pub fn publish(&self, event: &LifecycleEvent) {
        let listeners = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect::<Vec<_>>();
        for listener in listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.len())
            .finish()
    }
}
