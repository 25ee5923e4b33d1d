//! Sub-agent workers for delegated assessment tasks

pub mod playbook;
pub mod role;
pub mod worker;

pub use playbook::{Playbook, PlannedCall, StaticPlaybook};
pub use role::{AgentRole, RoleConfig};
pub use worker::{SubAgent, TaskDelegation};
