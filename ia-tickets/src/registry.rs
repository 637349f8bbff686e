use crate::traits::RemoteTicketSink;
use crate::types::{RemoteTicket, TicketSystem};
use std::collections::HashMap;
use std::sync::Arc;

/// The configured sinks, keyed by system. Systems without credentials are
/// simply absent, so pushing to them is a no-op.
#[derive(Clone, Default)]
pub struct TicketIntegrations {
    sinks: HashMap<TicketSystem, Arc<dyn RemoteTicketSink>>,
}

impl TicketIntegrations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sink: Arc<dyn RemoteTicketSink>) {
        let system = sink.system();
        if self.sinks.insert(system, sink).is_some() {
            tracing::warn!(%system, "replacing ticket integration");
        }
    }

    pub fn is_configured(&self, system: TicketSystem) -> bool {
        self.sinks.contains_key(&system)
    }

    pub fn configured(&self) -> Vec<TicketSystem> {
        TicketSystem::ALL
            .into_iter()
            .filter(|s| self.sinks.contains_key(s))
            .collect()
    }

    /// Best-effort push. Every failure is logged and swallowed.
    pub async fn push(
        &self,
        system: TicketSystem,
        title: &str,
        description: &str,
    ) -> Option<RemoteTicket> {
        let Some(sink) = self.sinks.get(&system) else {
            tracing::info!(%system, "ticket integration not configured; keeping ticket local");
            return None;
        };
        match sink.create_ticket(title, description).await {
            Ok(Some(remote)) => {
                tracing::info!(%system, external_id = %remote.external_id, "remote ticket created");
                Some(remote)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(%system, error = %e, "ticket integration failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for TicketIntegrations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketIntegrations")
            .field("configured", &self.configured())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};

    struct FixedSink {
        system: TicketSystem,
        outcome: std::result::Result<Option<&'static str>, &'static str>,
    }

    #[async_trait::async_trait]
    impl RemoteTicketSink for FixedSink {
        fn system(&self) -> TicketSystem {
            self.system
        }

        async fn create_ticket(&self, _title: &str, _description: &str) -> Result<Option<RemoteTicket>> {
            match self.outcome {
                Ok(id) => Ok(id.map(|id| RemoteTicket {
                    external_id: id.to_string(),
                    external_url: None,
                })),
                Err(msg) => Err(anyhow!(msg)),
            }
        }
    }

    fn integrations() -> TicketIntegrations {
        let mut out = TicketIntegrations::new();
        out.register(Arc::new(FixedSink {
            system: TicketSystem::Github,
            outcome: Ok(Some("17")),
        }));
        out.register(Arc::new(FixedSink {
            system: TicketSystem::Jira,
            outcome: Err("connection refused"),
        }));
        out
    }

    #[test]
    fn lists_configured_systems_in_fixed_order() {
        let integrations = integrations();
        assert_eq!(
            integrations.configured(),
            vec![TicketSystem::Github, TicketSystem::Jira]
        );
        assert!(!integrations.is_configured(TicketSystem::Trello));
    }

    #[tokio::test]
    async fn push_returns_remote_ticket_on_success() {
        let remote = integrations()
            .push(TicketSystem::Github, "t", "d")
            .await
            .expect("remote ticket");
        assert_eq!(remote.external_id, "17");
    }

    #[tokio::test]
    async fn failures_and_unconfigured_systems_are_swallowed() {
        let integrations = integrations();
        assert!(integrations.push(TicketSystem::Jira, "t", "d").await.is_none());
        assert!(integrations.push(TicketSystem::Trello, "t", "d").await.is_none());
    }
}
