//! Ports: the seams between the dispatch core and its collaborators.

pub mod invoker;
pub mod plan;
pub mod session;

pub use invoker::{invoke_typed, ClientError, Invoker};
pub use plan::{MethodFuture, MethodHandler, Plan, PlanError, PlanTable};
pub use session::{ResolverFn, SessionResolver, StaticSessionResolver};
