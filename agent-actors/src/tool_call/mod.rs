//! The Tool Call actor family: one [`capability::ToolCapabilityActor`] per
//! registered tool, an [`executor`] layer that decodes/reports/classifies
//! each call, and [`actor::ToolCallActor`] that fans a batch out across them.

pub mod actor;
pub mod capability;
pub mod executor;

pub use actor::{HandleToolCallsResponse, ToolCallActor, ToolCallMessage};
pub use capability::{CapabilityMessage, ExecuteOutcome, ToolCapabilityActor};
pub use executor::{execute_one, BeforeToolExecutionHook, ToolExecutionRecord};
