use std::future::poll_fn;
use std::task::{Context, Poll};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, WeakShared};

type Load<V, E> = BoxFuture<'static, Result<V, E>>;

/// Collapses concurrent loads of the same key into one execution.
///
/// The first caller for a key starts the load; callers arriving while it is in flight
/// await the same shared future and receive a clone of its result. The map only holds
/// weak handles, so once every waiter is gone the load is dropped with whatever it holds.
pub(crate) struct SingleFlight<V, E> {
    flights: DashMap<String, WeakShared<Load<V, E>>>,
}

impl<V, E> SingleFlight<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            flights: DashMap::new(),
        }
    }

    pub(crate) async fn run<F>(&self, key: &str, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Load<V, E>,
    {
        let mut waiter = Waiter {
            flights: &self.flights,
            key,
            flight: Some(self.join_or_start(key, load)),
        };
        poll_fn(|cx| waiter.poll_flight(cx)).await
    }

    fn join_or_start<F>(&self, key: &str, load: F) -> Shared<Load<V, E>>
    where
        F: FnOnce() -> Load<V, E>,
    {
        match self.flights.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if let Some(flight) = entry.get().upgrade() {
                    return flight;
                }
                let flight = load().shared();
                if let Some(weak) = flight.downgrade() {
                    entry.insert(weak);
                }
                flight
            }
            Entry::Vacant(entry) => {
                let flight = load().shared();
                if let Some(weak) = flight.downgrade() {
                    entry.insert(weak);
                }
                flight
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.flights.len()
    }
}

/// One caller's strong handle on a flight. Dropping it, finished or cancelled,
/// clears the key if nobody else is still waiting.
struct Waiter<'a, V, E> {
    flights: &'a DashMap<String, WeakShared<Load<V, E>>>,
    key: &'a str,
    flight: Option<Shared<Load<V, E>>>,
}

impl<V, E> Waiter<'_, V, E>
where
    V: Clone,
    E: Clone,
{
    fn poll_flight(&mut self, cx: &mut Context<'_>) -> Poll<Result<V, E>> {
        match self.flight.as_mut() {
            Some(flight) => flight.poll_unpin(cx),
            None => Poll::Pending,
        }
    }
}

impl<V, E> Drop for Waiter<'_, V, E> {
    fn drop(&mut self) {
        drop(self.flight.take());
        self.flights
            .remove_if(self.key, |_, weak| weak.upgrade().is_none());
    }
}
