// Domain layer: request models and ports (interfaces). No adapter code here.

pub mod model;
pub mod ports;
