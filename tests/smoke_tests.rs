//! Thread lifecycle: spawn, yield rotation, join, exit.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use coop_threads::{Runtime, RuntimeError};

#[test]
fn thread_ids_are_consecutive_from_one() {
    let rt = Runtime::new();
    let a = rt.spawn(|_| ());
    let b = rt.spawn(|_| ());
    let c = rt.spawn(|_| ());
    assert_eq!((a, b, c), (1, 2, 3));
    assert_eq!(rt.threads_issued(), 4);
}

#[test]
fn spawned_thread_runs_immediately_and_uninterrupted() {
    let rt = Runtime::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let o = order.clone();
    rt.spawn(move |_| {
        // No yield anywhere in here: nothing may interleave.
        for step in 1..=3 {
            o.borrow_mut().push(step);
        }
    });
    order.borrow_mut().push(100);

    assert_eq!(*order.borrow(), [1, 2, 3, 100]);
}

#[test]
fn current_thread_is_visible_from_inside() {
    let rt = Runtime::new();
    assert_eq!(rt.current_thread(), 0);

    let observed = Rc::new(Cell::new(usize::MAX));
    let o = observed.clone();
    let id = rt.spawn(move |s| o.set(s.current_thread()));
    assert_eq!(observed.get(), id);
    assert_eq!(rt.current_thread(), 0);
}

#[test]
fn join_returns_the_entry_points_value() {
    let rt = Runtime::new();
    let id = rt.spawn(|_| 40 + 2);
    let value = rt.join(id).unwrap();
    assert_eq!(*value.downcast_ref::<i32>().unwrap(), 42);
}

#[test]
fn join_returns_the_exit_value() {
    let rt = Runtime::new();
    let id = rt.spawn(|s| -> i32 { s.exit("stopped early") });
    let value = rt.join(id).unwrap();
    assert_eq!(*value.downcast_ref::<&str>().unwrap(), "stopped early");
}

#[test]
fn join_on_finished_thread_is_immediate_and_repeatable() {
    let rt = Runtime::new();
    let id = rt.spawn(|_| 7u64);
    // The thread already ran to completion during spawn.
    for _ in 0..3 {
        let value = rt.join(id).unwrap();
        assert_eq!(*value.downcast_ref::<u64>().unwrap(), 7);
    }
}

#[test]
fn join_on_unissued_id_reports_unknown_thread() {
    let rt = Runtime::new();
    rt.spawn(|_| ());
    assert_eq!(rt.join(2).unwrap_err(), RuntimeError::UnknownThread);
    assert_eq!(rt.join(usize::MAX).unwrap_err(), RuntimeError::UnknownThread);
}

#[test]
fn join_spins_until_a_yielding_thread_finishes() {
    let rt = Runtime::new();
    let id = rt.spawn(|s| {
        for _ in 0..5 {
            s.yield_now();
        }
        "done"
    });
    let value = rt.join(id).unwrap();
    assert_eq!(*value.downcast_ref::<&str>().unwrap(), "done");
}

#[test]
fn yield_rotation_is_strict_fifo() {
    let rt = Runtime::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let o = order.clone();
    let a = rt.spawn(move |s| {
        o.borrow_mut().push(1);
        s.yield_now();
        o.borrow_mut().push(3);
    });
    let o = order.clone();
    let b = rt.spawn(move |s| {
        o.borrow_mut().push(2);
        s.yield_now();
        o.borrow_mut().push(4);
    });

    rt.join(a).unwrap();
    rt.join(b).unwrap();
    assert_eq!(*order.borrow(), [1, 2, 3, 4]);
}

#[test]
fn yield_with_no_other_runnable_thread_is_a_noop() {
    let rt = Runtime::new();
    rt.yield_now();
    rt.yield_now();
    assert_eq!(rt.current_thread(), 0);
}

#[test]
fn results_are_kept_regardless_of_join_order() {
    let rt = Runtime::new();
    let ids: Vec<_> = (1..=3u32).map(|k| rt.spawn(move |_| k * 10)).collect();
    for (i, id) in ids.iter().enumerate().rev() {
        let value = rt.join(*id).unwrap();
        assert_eq!(*value.downcast_ref::<u32>().unwrap(), (i as u32 + 1) * 10);
    }
}

#[test]
fn builder_configures_stack_and_lock_table() {
    let rt = Runtime::builder()
        .stack_size(32 * 1024)
        .num_locks(2)
        .conditions_per_lock(1)
        .finish();
    let id = rt.spawn(|_| 1u8);
    assert_eq!(*rt.join(id).unwrap().downcast_ref::<u8>().unwrap(), 1);
    rt.lock(1).unwrap();
    assert_eq!(rt.lock(2).unwrap_err(), RuntimeError::InvalidHandle);
}

#[test]
fn runtimes_are_independent() {
    let rt_a = Runtime::new();
    let rt_b = Runtime::new();

    let id_a = rt_a.spawn(|_| 'a');
    let id_b = rt_b.spawn(|_| 'b');
    assert_eq!(id_a, 1);
    assert_eq!(id_b, 1);

    rt_a.lock(0).unwrap();
    // rt_b's lock 0 is a different lock entirely.
    rt_b.lock(0).unwrap();
    assert_eq!(*rt_a.join(id_a).unwrap().downcast_ref::<char>().unwrap(), 'a');
    assert_eq!(*rt_b.join(id_b).unwrap().downcast_ref::<char>().unwrap(), 'b');
}

#[test]
fn many_threads_spawn_and_join() {
    let rt = Runtime::new();
    let counter = Rc::new(Cell::new(0u32));

    let ids: Vec<_> = (0..20)
        .map(|_| {
            let c = counter.clone();
            rt.spawn(move |s| {
                s.yield_now();
                c.set(c.get() + 1);
            })
        })
        .collect();
    for id in ids {
        rt.join(id).unwrap();
    }
    assert_eq!(counter.get(), 20);
}
