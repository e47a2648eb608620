pub mod shared;
pub mod sla;
pub mod tickets;
