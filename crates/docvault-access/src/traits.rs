//! Access policy trait.

use std::sync::Arc;

use async_trait::async_trait;

use crate::result::AccessDecision;

/// Decides whether a user may view a document.
///
/// Implementations must be thread-safe (`Send + Sync`) as they may be
/// called concurrently from multiple requests. Both methods are
/// infallible: backend failures are folded into the returned decision.
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    /// Check access and, on the metered path, record the view.
    async fn evaluate(&self, user_id: &str, document_id: &str) -> AccessDecision;

    /// Read-only preflight check; never records a view.
    async fn can_view_document(&self, user_id: &str, document_id: &str) -> AccessDecision;
}

#[async_trait]
impl<P: AccessPolicy + ?Sized> AccessPolicy for Arc<P> {
    #[inline]
    async fn evaluate(&self, user_id: &str, document_id: &str) -> AccessDecision {
        (**self).evaluate(user_id, document_id).await
    }

    #[inline]
    async fn can_view_document(&self, user_id: &str, document_id: &str) -> AccessDecision {
        (**self).can_view_document(user_id, document_id).await
    }
}

#[async_trait]
impl<P: AccessPolicy + ?Sized> AccessPolicy for Box<P> {
    #[inline]
    async fn evaluate(&self, user_id: &str, document_id: &str) -> AccessDecision {
        (**self).evaluate(user_id, document_id).await
    }

    #[inline]
    async fn can_view_document(&self, user_id: &str, document_id: &str) -> AccessDecision {
        (**self).can_view_document(user_id, document_id).await
    }
}
