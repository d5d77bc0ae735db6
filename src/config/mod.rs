//! Component A: Config Loader.

pub mod duration;
pub mod loader;
pub mod model;

pub use model::{AliasTarget, CacheSpec, Config, Profile, Task, TaskDef, Workspace};
