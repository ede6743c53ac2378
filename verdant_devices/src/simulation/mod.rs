//! Simulated peripherals and controllers.
//!
//! These actors stand in for real hardware during development and on test
//! benches. They share the bus lock and mirror their namespaces exactly like
//! hardware-backed actors would.

mod relay;
mod sensor;

pub use relay::SetpointRelay;
pub use sensor::SimulatedSensor;

use crate::context::DynamicActorContext;
use crate::registry::ActorRegistry;
use verdant_common::actor::{Actor, ManagedActor, PeriodicActor};

/// Register every simulation actor.
pub fn register(registry: &mut ActorRegistry) {
    registry.register("simulation.SimulatedSensor", create_sensor);
    registry.register("simulation.SetpointRelay", create_relay);
}

/// Factory for `simulation.SimulatedSensor`.
pub fn create_sensor(context: DynamicActorContext) -> Box<dyn ManagedActor> {
    let name = context.name().to_string();
    let namespace = context.namespace();
    let state = context.state.clone();
    let tick = context.tick;
    let duty = SimulatedSensor::new(&context);
    Box::new(Actor::new(PeriodicActor::new(name, namespace, state, tick, duty)))
}

/// Factory for `simulation.SetpointRelay`.
pub fn create_relay(context: DynamicActorContext) -> Box<dyn ManagedActor> {
    let name = context.name().to_string();
    let namespace = context.namespace();
    let state = context.state.clone();
    let tick = context.tick;
    let duty = SetpointRelay::new(&context);
    Box::new(Actor::new(PeriodicActor::new(name, namespace, state, tick, duty)))
}
