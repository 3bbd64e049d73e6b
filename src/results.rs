//! Return-value store.
//!
//! One record per issued thread id, created together with the thread and
//! kept for the runtime's lifetime: a result stays retrievable through any
//! number of joins, long after the thread's stack is gone.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::any::Any;

use crate::thread::ThreadId;

struct ResultRecord {
    id: ThreadId,
    value: Option<Rc<dyn Any>>,
}

pub(crate) struct ResultStore {
    records: Vec<ResultRecord>,
}

impl ResultStore {
    pub(crate) fn new() -> Self {
        ResultStore {
            records: Vec::new(),
        }
    }

    /// Reserve the slot for a freshly issued id. The value stays undefined
    /// until the thread finishes.
    pub(crate) fn register(&mut self, id: ThreadId) {
        self.records.push(ResultRecord { id, value: None });
    }

    pub(crate) fn publish(&mut self, id: ThreadId, value: Rc<dyn Any>) {
        if let Some(record) = self.records.iter_mut().find(|r| r.id == id) {
            record.value = Some(value);
        }
    }

    pub(crate) fn lookup(&self, id: ThreadId) -> Option<Rc<dyn Any>> {
        self.records
            .iter()
            .find(|r| r.id == id)
            .and_then(|r| r.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_undefined_until_published() {
        let mut store = ResultStore::new();
        store.register(0);
        assert!(store.lookup(0).is_none());

        store.publish(0, Rc::new(17u32));
        let value = store.lookup(0).unwrap();
        assert_eq!(*value.downcast_ref::<u32>().unwrap(), 17);
    }

    #[test]
    fn lookup_of_unregistered_id_is_none() {
        let mut store = ResultStore::new();
        store.register(0);
        store.publish(3, Rc::new(1u8));
        assert!(store.lookup(3).is_none());
    }

    #[test]
    fn results_survive_repeated_lookup() {
        let mut store = ResultStore::new();
        for id in 0..4 {
            store.register(id);
        }
        store.publish(2, Rc::new("done"));
        for _ in 0..3 {
            let value = store.lookup(2).unwrap();
            assert_eq!(*value.downcast_ref::<&str>().unwrap(), "done");
        }
    }
}
