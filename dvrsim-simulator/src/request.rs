//! Disk I/O requests as they travel from a buffer controller through the
//! scheduler and the cache to the disk and back.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use dvrsim_core::{Signal, SimTime};

/// One read or write of `size_kb` at `address`.
///
/// Completing a request raises its origin controller's completion signal.
#[derive(Clone)]
pub struct IoRequest {
    pub id: u64,
    pub size_kb: f64,
    pub address: u64,
    pub write: bool,
    pub deadline: SimTime,
    pub created_at: SimTime,
    pub origin: Rc<str>,
    completion: Signal,
}

impl IoRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        size_kb: f64,
        address: u64,
        write: bool,
        deadline: SimTime,
        created_at: SimTime,
        origin: Rc<str>,
        completion: Signal,
    ) -> Self {
        Self {
            id,
            size_kb,
            address,
            write,
            deadline,
            created_at,
            origin,
            completion,
        }
    }

    /// Notifies the originating controller.
    pub fn complete(&self) {
        self.completion.signal();
    }

    pub fn kind(&self) -> &'static str {
        if self.write {
            "write"
        } else {
            "read"
        }
    }
}

impl fmt::Debug for IoRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoRequest")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("size_kb", &self.size_kb)
            .field("address", &self.address)
            .field("deadline", &self.deadline)
            .field("origin", &self.origin)
            .finish()
    }
}

/// Hands out request ids, unique within one run.
#[derive(Clone, Debug, Default)]
pub struct RequestIds {
    next: Rc<Cell<u64>>,
}

impl RequestIds {
    pub fn next_id(&self) -> u64 {
        let id = self.next.get();
        self.next.set(id + 1);
        id
    }

    /// Number of ids issued so far.
    pub fn issued(&self) -> u64 {
        self.next.get()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use dvrsim_core::Sim;

    #[test]
    fn ids_are_sequential_and_shared() {
        let ids = RequestIds::default();
        let other = ids.clone();
        assert_eq!(ids.next_id(), 0);
        assert_eq!(other.next_id(), 1);
        assert_eq!(ids.issued(), 2);
    }

    #[test]
    fn complete_raises_origin_signal() {
        let sim = Sim::new(0);
        let done = Signal::new(&sim, "done");
        let request = IoRequest::new(3, 256.0, 17, true, 50.0, 0.0, Rc::from("w"), done.clone());
        request.complete();
        assert_eq!(done.times_raised(), 1);
        assert_eq!(request.kind(), "write");
    }
}
