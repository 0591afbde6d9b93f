/*!
The `Context` owns every piece of simulation state and drives time forward.

State lives in *data plugins*: one value per type, created on first mutable
access. Time advances by executing *plans*, callbacks scheduled at a
simulation time, in order of time, then phase, then insertion. Events are
delivered to subscribers as queued callbacks that run before the next plan.
*/

use crate::type_of;
use crate::HashMap;
use log::trace;
use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::rc::Rc;

/// A type that can live in the `Context` as a data plugin.
pub trait DataPlugin: Any {
    fn init() -> Self
    where
        Self: Sized;
}

impl<T: 'static> DataPlugin for Vec<T> {
    fn init() -> Self {
        Vec::new()
    }
}

/// Events are small values copied to every subscriber.
pub trait Event: Copy + 'static {}

/// Plans scheduled for the same time run in phase order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExecutionPhase {
    First,
    #[default]
    Normal,
    Last,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlanId(u64);

type Callback = Box<dyn FnOnce(&mut Context)>;
type EventHandler<E> = Rc<dyn Fn(&mut Context, E)>;

struct PlanEntry {
    time: f64,
    phase: ExecutionPhase,
    id: u64,
}

impl PartialEq for PlanEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PlanEntry {}

impl PartialOrd for PlanEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PlanEntry {
    // Reversed so the `BinaryHeap` pops the earliest plan.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.phase.cmp(&self.phase))
            .then_with(|| other.id.cmp(&self.id))
    }
}

#[derive(Default)]
struct PlanQueue {
    queue: BinaryHeap<PlanEntry>,
    callbacks: HashMap<u64, Callback>,
    next_id: u64,
}

impl PlanQueue {
    fn add_plan(&mut self, time: f64, phase: ExecutionPhase, callback: Callback) -> PlanId {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push(PlanEntry { time, phase, id });
        self.callbacks.insert(id, callback);
        PlanId(id)
    }

    fn cancel_plan(&mut self, id: PlanId) -> bool {
        self.callbacks.remove(&id.0).is_some()
    }

    /// Pops the next plan that has not been cancelled.
    fn next_plan(&mut self) -> Option<(f64, Callback)> {
        while let Some(entry) = self.queue.pop() {
            if let Some(callback) = self.callbacks.remove(&entry.id) {
                return Some((entry.time, callback));
            }
        }
        None
    }

    fn len(&self) -> usize {
        self.callbacks.len()
    }
}

pub struct Context {
    // This is actually a `HashMap<TypeId, Box<dyn DataPlugin>>` but must be declared this way to
    // be able to downcast without an `as_any()` method on every plugin.
    data_plugins: HashMap<TypeId, Box<dyn Any>>,
    event_handlers: HashMap<TypeId, Box<dyn Any>>,
    plan_queue: PlanQueue,
    callback_queue: VecDeque<Callback>,
    current_time: f64,
    shutdown_requested: bool,
}

impl Context {
    pub fn new() -> Self {
        Context {
            data_plugins: HashMap::default(),
            event_handlers: HashMap::default(),
            plan_queue: PlanQueue::default(),
            callback_queue: VecDeque::new(),
            current_time: 0.0,
            shutdown_requested: false,
        }
    }

    /// Returns a mutable reference for the data container for `T`, creating it if it doesn't exist yet.
    pub fn get_data_container_mut<T: DataPlugin>(&mut self) -> &mut T {
        self.data_plugins
            .entry(type_of::<T>())
            .or_insert_with(|| Box::new(T::init()))
            .downcast_mut::<T>()
            .unwrap() // Will never panic as data container has the matching type
    }

    /// Returns a reference to the data container for `T` if it exists.
    /// If you need a mutable reference or lazy instantiation, use `Context::get_data_container_mut()`.
    pub fn get_data_container<T: DataPlugin>(&self) -> Option<&T> {
        if let Some(data) = self.data_plugins.get(&type_of::<T>()) {
            data.downcast_ref::<T>()
        } else {
            None
        }
    }

    /// Schedules `callback` to run at `time`.
    ///
    /// # Panics
    ///
    /// Panics if `time` is earlier than the current time or is NaN.
    pub fn add_plan(&mut self, time: f64, callback: impl FnOnce(&mut Context) + 'static) -> PlanId {
        self.add_plan_with_phase(time, callback, ExecutionPhase::Normal)
    }

    pub fn add_plan_with_phase(
        &mut self,
        time: f64,
        callback: impl FnOnce(&mut Context) + 'static,
        phase: ExecutionPhase,
    ) -> PlanId {
        assert!(
            !time.is_nan() && time >= self.current_time,
            "plan time {time} is in the past (now {})",
            self.current_time
        );
        self.plan_queue.add_plan(time, phase, Box::new(callback))
    }

    /// Cancels a plan. Returns `false` if it already ran or was cancelled.
    pub fn cancel_plan(&mut self, id: PlanId) -> bool {
        self.plan_queue.cancel_plan(id)
    }

    pub fn remaining_plan_count(&self) -> usize {
        self.plan_queue.len()
    }

    /// Runs `callback` before the next plan.
    pub fn queue_callback(&mut self, callback: impl FnOnce(&mut Context) + 'static) {
        self.callback_queue.push_back(Box::new(callback));
    }

    pub fn subscribe_to_event<E: Event>(&mut self, handler: impl Fn(&mut Context, E) + 'static) {
        self.event_handlers
            .entry(type_of::<E>())
            .or_insert_with(|| Box::<Vec<EventHandler<E>>>::default())
            .downcast_mut::<Vec<EventHandler<E>>>()
            .unwrap()
            .push(Rc::new(handler));
    }

    /// Queues every handler subscribed to `E`.
    pub fn emit_event<E: Event>(&mut self, event: E) {
        let Some(handlers) = self
            .event_handlers
            .get(&type_of::<E>())
            .and_then(|handlers| handlers.downcast_ref::<Vec<EventHandler<E>>>())
        else {
            return;
        };
        for handler in handlers.clone() {
            self.callback_queue
                .push_back(Box::new(move |context| handler(context, event)));
        }
    }

    #[must_use]
    pub fn get_current_time(&self) -> f64 {
        self.current_time
    }

    /// Stops `execute` after the running callback returns.
    pub fn shutdown(&mut self) {
        trace!("shutdown requested at {:.3}", self.current_time);
        self.shutdown_requested = true;
    }

    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    /// Runs queued callbacks and plans until nothing is left or `shutdown` is called.
    pub fn execute(&mut self) {
        self.shutdown_requested = false;
        loop {
            if self.shutdown_requested {
                break;
            }
            if let Some(callback) = self.callback_queue.pop_front() {
                callback(self);
                continue;
            }
            match self.plan_queue.next_plan() {
                Some((time, callback)) => {
                    self.current_time = time;
                    callback(self);
                }
                None => break,
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Copy, Clone, Debug, PartialEq)]
    struct Ping(u32);
    impl Event for Ping {}

    #[test]
    fn test_context_creation() {
        let mut context = Context::new();
        {
            // If you specify the type of the variable the compiler can infer the generic type.
            let byte_vector: &mut Vec<u8> = context.get_data_container_mut();
            byte_vector.extend([1, 2, 3]);
        }
        {
            let str_vector: &mut Vec<&str> = context.get_data_container_mut();
            str_vector.extend(["4", "5", "6"]);
        }

        assert_eq!(context.get_data_container::<Vec<u8>>(), Some(&vec![1, 2, 3]));
        assert_eq!(
            context.get_data_container::<Vec<&str>>(),
            Some(&vec!["4", "5", "6"])
        );
        assert!(context.get_data_container::<Vec<u64>>().is_none());
    }

    #[test]
    fn plans_run_in_time_then_phase_order() {
        let mut context = Context::new();
        context.add_plan(2.0, |context| context.get_data_container_mut::<Vec<u32>>().push(3));
        context.add_plan_with_phase(
            1.0,
            |context| context.get_data_container_mut::<Vec<u32>>().push(2),
            ExecutionPhase::Last,
        );
        context.add_plan_with_phase(
            1.0,
            |context| context.get_data_container_mut::<Vec<u32>>().push(1),
            ExecutionPhase::First,
        );
        context.execute();

        assert_eq!(context.get_data_container::<Vec<u32>>(), Some(&vec![1, 2, 3]));
        assert!((context.get_current_time() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cancelled_plan_does_not_run() {
        let mut context = Context::new();
        let id = context.add_plan(1.0, |context| context.get_data_container_mut::<Vec<u32>>().push(1));
        assert!(context.cancel_plan(id));
        assert!(!context.cancel_plan(id));
        context.execute();
        assert!(context.get_data_container::<Vec<u32>>().is_none());
    }

    #[test]
    fn shutdown_stops_execution() {
        let mut context = Context::new();
        context.add_plan(1.0, Context::shutdown);
        context.add_plan(2.0, |context| context.get_data_container_mut::<Vec<u32>>().push(1));
        context.execute();
        assert!(context.get_data_container::<Vec<u32>>().is_none());
        assert_eq!(context.remaining_plan_count(), 1);
    }

    #[test]
    fn events_reach_subscribers_before_next_plan() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut context = Context::new();
        let sink = Rc::clone(&seen);
        context.subscribe_to_event(move |_, event: Ping| sink.borrow_mut().push(event.0));
        let sink = Rc::clone(&seen);
        context.add_plan(1.0, |context| context.emit_event(Ping(7)));
        context.add_plan(1.0, move |_| sink.borrow_mut().push(100));
        context.execute();
        assert_eq!(*seen.borrow(), vec![7, 100]);
    }

    #[test]
    #[should_panic(expected = "in the past")]
    fn plan_in_the_past_panics() {
        let mut context = Context::new();
        context.add_plan(5.0, |context| {
            context.add_plan(1.0, |_| {});
        });
        context.execute();
    }
}
