pub mod core;
pub mod snapshots;
pub mod students;
pub mod terms;
