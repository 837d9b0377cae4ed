//! In-memory invoice table and per-user lock.
//!
//! Both maps live behind one mutex, so every operation here is atomic with
//! respect to every other. Nothing awaits while the mutex is held.

use crate::error::StoreError;
use crate::models::{Invoice, InvoiceId, InvoiceStatus, MessageRef};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
enum LockSlot {
    /// Held while the gateway call for a new invoice is in flight
    Reserved,
    Active(InvoiceId),
}

#[derive(Debug, Default)]
struct Inner {
    invoices: HashMap<InvoiceId, Invoice>,
    locks: HashMap<i64, LockSlot>,
}

/// Result of [`InvoiceStore::transition`].
#[derive(Debug, Clone)]
pub struct Transition {
    pub invoice: Invoice,
    pub from: InvoiceStatus,
    /// True only for the caller that actually moved the invoice.
    pub changed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceStore {
    inner: Arc<Mutex<Inner>>,
}

impl InvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every critical section leaves both maps consistent before it can panic.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserves the user's lock slot. Fails if the user has a non-terminal
    /// invoice or another creation in flight.
    pub fn try_acquire_lock(&self, user_id: i64) -> Result<LockReservation, StoreError> {
        let mut inner = self.lock();
        if let Some(slot) = inner.locks.get(&user_id) {
            let active = match slot {
                LockSlot::Reserved => None,
                LockSlot::Active(id) => Some(id.clone()),
            };
            return Err(StoreError::DuplicateActive { user_id, active });
        }
        inner.locks.insert(user_id, LockSlot::Reserved);
        debug!("Reserved invoice slot for user {}", user_id);

        Ok(LockReservation {
            store: self.clone(),
            user_id,
            committed: false,
        })
    }

    pub fn get(&self, id: &InvoiceId) -> Option<Invoice> {
        self.lock().invoices.get(id).cloned()
    }

    pub fn active_for_user(&self, user_id: i64) -> Option<Invoice> {
        let inner = self.lock();
        match inner.locks.get(&user_id) {
            Some(LockSlot::Active(id)) => inner.invoices.get(id).cloned(),
            _ => None,
        }
    }

    /// Compare-and-swap on the invoice status.
    ///
    /// A move out of a terminal state, or into the state the invoice is
    /// already in, returns the invoice unchanged with `changed == false`.
    pub fn transition(&self, id: &InvoiceId, to: InvoiceStatus) -> Result<Transition, StoreError> {
        let mut guard = self.lock();
        let Inner { invoices, locks } = &mut *guard;

        let invoice = invoices
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let from = invoice.status;

        if from.is_terminal() || from == to {
            return Ok(Transition {
                invoice: invoice.clone(),
                from,
                changed: false,
            });
        }

        if !from.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                id: id.clone(),
                from,
                to,
            });
        }

        invoice.status = to;
        invoice.updated_at = Utc::now();
        if to == InvoiceStatus::Settled {
            invoice.settled_once = true;
        }

        if to.is_terminal() {
            let user_id = invoice.user_id;
            if locks.get(&user_id) == Some(&LockSlot::Active(id.clone())) {
                locks.remove(&user_id);
            }
        }

        Ok(Transition {
            invoice: invoice.clone(),
            from,
            changed: true,
        })
    }

    /// Non-terminal invoices whose `expires_at <= now`.
    pub fn list_expired(&self, now: DateTime<Utc>) -> Vec<Invoice> {
        self.lock()
            .invoices
            .values()
            .filter(|inv| inv.is_expired_at(now))
            .cloned()
            .collect()
    }

    pub fn list_open(&self) -> Vec<Invoice> {
        self.lock()
            .invoices
            .values()
            .filter(|inv| !inv.status.is_terminal())
            .cloned()
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.lock()
            .locks
            .values()
            .filter(|slot| matches!(slot, LockSlot::Active(_)))
            .count()
    }

    /// Remembers where the admin alert went. Ignored once the invoice is terminal.
    pub fn attach_alert_ref(&self, id: &InvoiceId, alert: MessageRef) -> bool {
        self.attach(id, |inv| inv.alert_ref = Some(alert))
    }

    /// Remembers the user's payment prompt. Ignored once the invoice is
    /// terminal, in which case the caller still owns closing that message.
    pub fn attach_client_ref(&self, id: &InvoiceId, prompt: MessageRef) -> bool {
        self.attach(id, |inv| inv.client_ref = Some(prompt))
    }

    fn attach(&self, id: &InvoiceId, set: impl FnOnce(&mut Invoice)) -> bool {
        let mut inner = self.lock();
        match inner.invoices.get_mut(id) {
            Some(inv) if !inv.status.is_terminal() => {
                set(inv);
                true
            }
            _ => false,
        }
    }

    /// Puts back an open invoice loaded from the journal, lock included.
    pub fn restore(&self, invoice: Invoice) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.invoices.contains_key(&invoice.id) {
            return Err(StoreError::AlreadyExists(invoice.id));
        }
        if !invoice.status.is_terminal() {
            if let Some(slot) = inner.locks.get(&invoice.user_id) {
                let active = match slot {
                    LockSlot::Reserved => None,
                    LockSlot::Active(id) => Some(id.clone()),
                };
                return Err(StoreError::DuplicateActive {
                    user_id: invoice.user_id,
                    active,
                });
            }
            inner
                .locks
                .insert(invoice.user_id, LockSlot::Active(invoice.id.clone()));
        }
        inner.invoices.insert(invoice.id.clone(), invoice);
        Ok(())
    }
}

/// A reserved per-user lock slot.
///
/// Either [`insert`](LockReservation::insert) turns it into an active lock, or
/// dropping it hands the slot back.
#[derive(Debug)]
pub struct LockReservation {
    store: InvoiceStore,
    user_id: i64,
    committed: bool,
}

impl LockReservation {
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn insert(mut self, invoice: Invoice) -> Result<Invoice, StoreError> {
        if invoice.user_id != self.user_id {
            return Err(StoreError::DuplicateActive {
                user_id: invoice.user_id,
                active: None,
            });
        }

        let mut inner = self.store.lock();
        if inner.locks.get(&self.user_id) != Some(&LockSlot::Reserved) {
            let active = match inner.locks.get(&self.user_id) {
                Some(LockSlot::Active(id)) => Some(id.clone()),
                _ => None,
            };
            return Err(StoreError::DuplicateActive {
                user_id: self.user_id,
                active,
            });
        }
        if inner.invoices.contains_key(&invoice.id) {
            return Err(StoreError::AlreadyExists(invoice.id));
        }

        inner
            .locks
            .insert(self.user_id, LockSlot::Active(invoice.id.clone()));
        inner.invoices.insert(invoice.id.clone(), invoice.clone());
        self.committed = true;
        Ok(invoice)
    }
}

impl Drop for LockReservation {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut inner = self.store.lock();
        if inner.locks.get(&self.user_id) == Some(&LockSlot::Reserved) {
            inner.locks.remove(&self.user_id);
            debug!("Released unused invoice slot for user {}", self.user_id);
        }
    }
}
