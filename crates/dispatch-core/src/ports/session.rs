//! Session resolution: transport context to [`AuthContext`].

use crate::domain::AuthContext;
use async_trait::async_trait;

/// Maps a transport-specific context to the caller's identity.
///
/// `None` means the caller is unauthenticated; the registry turns that into
/// `UNAUTHORIZED`.
#[async_trait]
pub trait SessionResolver<C: ?Sized + Sync>: Send + Sync {
    async fn resolve(&self, context: &C) -> Option<AuthContext>;
}

/// Resolves every context to the same identity (or to none).
#[derive(Debug, Clone, Default)]
pub struct StaticSessionResolver {
    context: Option<AuthContext>,
}

impl StaticSessionResolver {
    pub fn new(context: Option<AuthContext>) -> Self {
        Self { context }
    }

    pub fn anonymous() -> Self {
        Self { context: None }
    }
}

#[async_trait]
impl<C: ?Sized + Sync> SessionResolver<C> for StaticSessionResolver {
    async fn resolve(&self, _context: &C) -> Option<AuthContext> {
        self.context.clone()
    }
}

/// Adapts a synchronous closure into a [`SessionResolver`].
pub struct ResolverFn<F>(pub F);

#[async_trait]
impl<C, F> SessionResolver<C> for ResolverFn<F>
where
    C: ?Sized + Sync,
    F: Fn(&C) -> Option<AuthContext> + Send + Sync,
{
    async fn resolve(&self, context: &C) -> Option<AuthContext> {
        (self.0)(context)
    }
}
