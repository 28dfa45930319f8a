//! Adapters to the outside world: the parameter store, the identity pool
//! and the local credential cache.

pub mod awsfed;
pub mod filecache;
pub mod ssm;
