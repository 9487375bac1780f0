//! Runtime for executing agents with dependency injection
//!
//! The AgentRuntime owns the shared resources every agent task needs: the
//! LLM provider, the upstream registry (token buckets and circuit breakers),
//! and the usage recorder. Agent tasks get their [`AgentExecutor`] from here.

use agent_core::Result;
use agent_llm::{LLMProvider, NoopUsageRecorder, UsageRecorder};
use std::sync::Arc;
use tracing::debug;

use crate::executor::AgentExecutor;
use crate::registry::{UpstreamPolicy, UpstreamRegistry};

/// Runtime for executing agents with dependency injection
///
/// # Example
///
/// ```no_run
/// use agent_runtime::AgentRuntime;
/// # use std::sync::Arc;
/// # fn example(provider: Arc<dyn agent_llm::LLMProvider>) -> agent_core::Result<()> {
/// let runtime = AgentRuntime::builder()
///     .provider(provider)
///     .build()?;
///
/// let executor = runtime.executor();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AgentRuntime {
    provider: Arc<dyn LLMProvider>,
    registry: Arc<UpstreamRegistry>,
    usage: Arc<dyn UsageRecorder>,
}

impl AgentRuntime {
    /// Create a new runtime
    ///
    /// The upstream id travels with each [`CallSpec`](crate::CallSpec); model
    /// and sampling settings travel with each completion request.
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        registry: Arc<UpstreamRegistry>,
        usage: Arc<dyn UsageRecorder>,
    ) -> Self {
        debug!(provider = provider.name(), "agent runtime created");
        Self {
            provider,
            registry,
            usage,
        }
    }

    /// Create a builder for the runtime
    pub fn builder() -> AgentRuntimeBuilder {
        AgentRuntimeBuilder::new()
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    pub fn registry(&self) -> &Arc<UpstreamRegistry> {
        &self.registry
    }

    /// Executor sharing this runtime's provider, registry and recorder
    pub fn executor(&self) -> AgentExecutor {
        AgentExecutor::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.registry),
            Arc::clone(&self.usage),
        )
    }
}

/// Builder for AgentRuntime
pub struct AgentRuntimeBuilder {
    provider: Option<Arc<dyn LLMProvider>>,
    registry: Option<Arc<UpstreamRegistry>>,
    usage: Option<Arc<dyn UsageRecorder>>,
}

impl AgentRuntimeBuilder {
    /// Create a new runtime builder
    pub fn new() -> Self {
        Self {
            provider: None,
            registry: None,
            usage: None,
        }
    }

    /// Set the LLM provider
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use a private registry instead of the process-wide one
    pub fn registry(mut self, registry: Arc<UpstreamRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use a fresh private registry with the given default policy
    pub fn upstream_policy(mut self, policy: UpstreamPolicy) -> Self {
        self.registry = Some(Arc::new(UpstreamRegistry::new(policy)));
        self
    }

    /// Set the usage recorder
    pub fn usage_recorder(mut self, usage: Arc<dyn UsageRecorder>) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Build the runtime
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is not set
    pub fn build(self) -> Result<AgentRuntime> {
        let provider = self.provider.ok_or_else(|| {
            agent_core::Error::Configuration("Provider not set".to_string())
        })?;

        let registry = self.registry.unwrap_or_else(UpstreamRegistry::global);
        let usage = self
            .usage
            .unwrap_or_else(|| Arc::new(NoopUsageRecorder) as Arc<dyn UsageRecorder>);

        Ok(AgentRuntime::new(provider, registry, usage))
    }
}

impl Default for AgentRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_llm::{CompletionRequest, CompletionResponse};

    struct MockProvider;

    #[async_trait::async_trait]
    impl LLMProvider for MockProvider {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> agent_llm::Result<CompletionResponse> {
            Err(agent_llm::LLMError::ProviderError("not wired".to_string()))
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    #[test]
    fn test_build_without_provider_fails() {
        let result = AgentRuntime::builder().build();
        assert!(matches!(result, Err(agent_core::Error::Configuration(_))));
    }

    #[test]
    fn test_default_registry_is_global() {
        let runtime = AgentRuntime::builder()
            .provider(Arc::new(MockProvider))
            .build()
            .unwrap();
        assert!(Arc::ptr_eq(runtime.registry(), &UpstreamRegistry::global()));

        let private = AgentRuntime::builder()
            .provider(Arc::new(MockProvider))
            .upstream_policy(UpstreamPolicy::default())
            .build()
            .unwrap();
        assert!(!Arc::ptr_eq(private.registry(), &UpstreamRegistry::global()));
        assert!(Arc::ptr_eq(
            private.executor().registry(),
            private.registry()
        ));
    }

    #[test]
    fn test_explicit_registry_is_used() {
        let registry = Arc::new(UpstreamRegistry::default());
        let runtime = AgentRuntime::builder()
            .provider(Arc::new(MockProvider))
            .registry(Arc::clone(&registry))
            .build()
            .unwrap();
        assert!(Arc::ptr_eq(runtime.registry(), &registry));
        assert_eq!(runtime.provider().name(), "mock");
    }
}
