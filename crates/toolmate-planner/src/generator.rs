//! The generation-backend seam.
//!
//! The planner never talks to a model directly; it hands an assembled prompt
//! to a [`Generator`] and parses whatever text comes back.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// A text-generation backend: one prompt in, one completion out.
///
/// Implementations report every failure (transport, status, empty output) as
/// [`crate::PlannerError::BackendFailure`].  The planner does not retry.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Arc<G> {
    async fn generate(&self, prompt: &str) -> Result<String> {
        (**self).generate(prompt).await
    }
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Box<G> {
    async fn generate(&self, prompt: &str) -> Result<String> {
        (**self).generate(prompt).await
    }
}
