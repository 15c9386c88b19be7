// Server routing unit (the `servers[]` entries of the relay configuration)

pub mod routing;
