// Domain layer: the series model, the declared-series registry and the ports
// (interfaces) the core talks through.

pub mod bindings;
pub mod model;
pub mod ports;
pub mod registry;
