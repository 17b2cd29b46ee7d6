//! The `Context` that owns one simulation episode.
//!
//! Everything an episode needs lives in a `Context`: the queue of plans for the
//! timesteps still to run, and the data containers ("plugins") that hold model
//! state such as the population, the contact graph and the random streams.
//! Model modules add behavior by defining extension traits on `Context`.
//!
//! Time advances in whole timesteps. Within one timestep, plans run in the
//! order of their [`ExecutionPhase`], which fixes the sub-step order of the
//! model: transmission, then disease progression, then the intervention
//! strategy, then observation of the resulting counts.
use std::{
    any::{Any, TypeId},
    rc::Rc,
};

use log::trace;
use rustc_hash::FxHashMap;

use crate::plan::{PlanId, Queue, Timestep};

/// The sub-step of a timestep in which a plan runs. Plans scheduled for the
/// same timestep run in this order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExecutionPhase {
    Transmission,
    Progression,
    Intervention,
    Observation,
}

/// A type that names a data container stored in a `Context`.
pub trait DataPlugin: Any {
    type DataContainer;

    fn create_data_container() -> Self::DataContainer;
}

/// Defines a unit struct naming a data container with a default value.
#[macro_export]
macro_rules! define_data_plugin {
    ($plugin:ident, $data_container:ty, $default: expr) => {
        #[derive(Copy, Clone)]
        struct $plugin;

        impl $crate::context::DataPlugin for $plugin {
            type DataContainer = $data_container;

            fn create_data_container() -> Self::DataContainer {
                $default
            }
        }
    };
}
pub use define_data_plugin;

type Callback = dyn FnOnce(&mut Context);

/// Owns the plan queue and data plugins of one episode.
///
/// A `Context` is deliberately not `Send`: each episode is created and run
/// entirely on one thread.
pub struct Context {
    plan_queue: Queue<Box<Callback>, ExecutionPhase>,
    data_plugins: FxHashMap<TypeId, Box<dyn Any>>,
    current_step: Timestep,
    shutdown_requested: bool,
}

impl Context {
    #[must_use]
    pub fn new() -> Context {
        Context {
            plan_queue: Queue::new(),
            data_plugins: FxHashMap::default(),
            current_step: 0,
            shutdown_requested: false,
        }
    }

    /// Schedule `callback` to run at `timestep` during `phase`.
    ///
    /// # Panics
    ///
    /// Panics if `timestep` is earlier than the current timestep.
    pub fn add_plan_with_phase(
        &mut self,
        timestep: Timestep,
        callback: impl FnOnce(&mut Context) + 'static,
        phase: ExecutionPhase,
    ) -> PlanId {
        assert!(
            timestep >= self.current_step,
            "Invalid timestep {timestep}: current timestep is {}",
            self.current_step
        );
        self.plan_queue.add_plan(timestep, Box::new(callback), phase)
    }

    /// Schedule `callback` to run at `timestep` during the intervention phase.
    ///
    /// # Panics
    ///
    /// Panics if `timestep` is earlier than the current timestep.
    pub fn add_plan(
        &mut self,
        timestep: Timestep,
        callback: impl FnOnce(&mut Context) + 'static,
    ) -> PlanId {
        self.add_plan_with_phase(timestep, callback, ExecutionPhase::Intervention)
    }

    /// Schedule `callback` to run during `phase` of every timestep starting at
    /// `start`, until the context shuts down.
    pub fn add_periodic_plan_with_phase(
        &mut self,
        start: Timestep,
        callback: impl Fn(&mut Context) + 'static,
        phase: ExecutionPhase,
    ) {
        self.schedule_periodic(start, phase, Rc::new(callback));
    }

    fn schedule_periodic(
        &mut self,
        timestep: Timestep,
        phase: ExecutionPhase,
        callback: Rc<dyn Fn(&mut Context)>,
    ) {
        self.add_plan_with_phase(
            timestep,
            move |context| {
                callback(context);
                if !context.shutdown_requested {
                    context.schedule_periodic(timestep + 1, phase, callback);
                }
            },
            phase,
        );
    }

    pub fn cancel_plan(&mut self, id: PlanId) -> bool {
        self.plan_queue.cancel_plan(id)
    }

    /// Stop execution once the running plan returns. Plans still in the queue
    /// are never run.
    pub fn shutdown(&mut self) {
        trace!("shutdown requested at timestep {}", self.current_step);
        self.shutdown_requested = true;
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_requested
    }

    #[must_use]
    pub fn get_current_step(&self) -> Timestep {
        self.current_step
    }

    /// Returns the data container for `plugin`, creating it on first access.
    pub fn get_data_mut<T: DataPlugin>(&mut self, _plugin: T) -> &mut T::DataContainer {
        self.data_plugins
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::create_data_container()))
            .downcast_mut::<T::DataContainer>()
            .expect("data plugin holds a container of the wrong type")
    }

    /// Returns the data container for `plugin` if it has been created.
    #[must_use]
    pub fn get_data<T: DataPlugin>(&self, _plugin: T) -> Option<&T::DataContainer> {
        self.data_plugins
            .get(&TypeId::of::<T>())
            .and_then(|container| container.downcast_ref::<T::DataContainer>())
    }

    /// Run plans in order until the queue is empty or `shutdown` is called.
    pub fn execute(&mut self) {
        trace!("entering event loop");
        while !self.shutdown_requested {
            let Some(plan) = self.plan_queue.get_next_plan() else {
                break;
            };
            self.current_step = plan.timestep;
            (plan.data)(self);
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

    define_data_plugin!(ComponentA, Vec<u32>, vec![]);

    fn add_plan(
        context: &mut Context,
        timestep: Timestep,
        phase: ExecutionPhase,
        value: u32,
    ) -> PlanId {
        context.add_plan_with_phase(
            timestep,
            move |context| {
                context.get_data_mut(ComponentA).push(value);
            },
            phase,
        )
    }

    fn recorded(context: &Context) -> Vec<u32> {
        context.get_data(ComponentA).cloned().unwrap_or_default()
    }

    #[test]
    fn empty_context() {
        let mut context = Context::new();
        context.execute();
        assert_eq!(context.get_current_step(), 0);
        assert!(context.get_data(ComponentA).is_none());
    }

    #[test]
    #[should_panic(expected = "Invalid timestep")]
    fn plan_in_the_past() {
        let mut context = Context::new();
        context.add_plan_with_phase(
            2,
            |context| {
                add_plan(context, 1, ExecutionPhase::Observation, 0);
            },
            ExecutionPhase::Observation,
        );
        context.execute();
    }

    #[test]
    fn phases_order_plans_within_a_timestep() {
        let mut context = Context::new();
        add_plan(&mut context, 1, ExecutionPhase::Observation, 4);
        add_plan(&mut context, 1, ExecutionPhase::Intervention, 3);
        add_plan(&mut context, 1, ExecutionPhase::Transmission, 1);
        add_plan(&mut context, 1, ExecutionPhase::Progression, 2);
        add_plan(&mut context, 0, ExecutionPhase::Observation, 0);
        context.execute();
        assert_eq!(recorded(&context), vec![0, 1, 2, 3, 4]);
        assert_eq!(context.get_current_step(), 1);
    }

    #[test]
    fn add_plan_runs_between_progression_and_observation() {
        let mut context = Context::new();
        add_plan(&mut context, 3, ExecutionPhase::Observation, 3);
        add_plan(&mut context, 3, ExecutionPhase::Progression, 1);
        context.add_plan(3, |context| {
            context.get_data_mut(ComponentA).push(2);
        });
        context.execute();
        assert_eq!(recorded(&context), vec![1, 2, 3]);
    }

    #[test]
    fn cancel_plan() {
        let mut context = Context::new();
        let to_cancel = add_plan(&mut context, 2, ExecutionPhase::Progression, 1);
        context.add_plan_with_phase(
            1,
            move |context| {
                context.cancel_plan(to_cancel);
            },
            ExecutionPhase::Progression,
        );
        context.execute();
        assert_eq!(context.get_current_step(), 1);
        assert!(recorded(&context).is_empty());
    }

    #[test]
    fn periodic_plan_runs_until_shutdown() {
        let mut context = Context::new();
        context.add_periodic_plan_with_phase(
            1,
            |context| {
                let step = u32::try_from(context.get_current_step()).unwrap();
                context.get_data_mut(ComponentA).push(step);
            },
            ExecutionPhase::Progression,
        );
        context.add_plan_with_phase(4, Context::shutdown, ExecutionPhase::Observation);
        context.execute();
        assert_eq!(recorded(&context), vec![1, 2, 3, 4]);
        assert!(context.is_shutdown());
    }

    #[test]
    fn shutdown_skips_remaining_plans() {
        let mut context = Context::new();
        add_plan(&mut context, 1, ExecutionPhase::Transmission, 1);
        context.add_plan_with_phase(1, Context::shutdown, ExecutionPhase::Progression);
        add_plan(&mut context, 1, ExecutionPhase::Intervention, 2);
        add_plan(&mut context, 2, ExecutionPhase::Transmission, 3);
        context.execute();
        assert_eq!(recorded(&context), vec![1]);
    }
}
