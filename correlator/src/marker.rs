use trace_model::{EventId, EventKind, TraceEvent};

use crate::source::{Platform, ProviderBinding};

/// Binds one provider marker against a source's capability so parsers
/// depend on neither platform nor event shape. The same marker is known
/// by name on the named-event path and by numeric ID on the other.
#[derive(Debug, Clone)]
pub struct MarkerMatcher {
    provider: String,
    key: EventId,
}

impl MarkerMatcher {
    pub fn bind(platform: Platform, provider: &str, name: &str, numeric: u16) -> Self {
        let key = match platform.binding() {
            ProviderBinding::Named => EventId::Named(name.to_string()),
            ProviderBinding::Numeric => EventId::Numeric(numeric),
        };
        MarkerMatcher {
            provider: provider.to_string(),
            key,
        }
    }

    /// Matches named markers regardless of platform; for trace formats
    /// that always carry event names (in-process providers).
    pub fn named(provider: &str, name: &str) -> Self {
        MarkerMatcher {
            provider: provider.to_string(),
            key: EventId::Named(name.to_string()),
        }
    }

    pub fn matches(&self, event: &TraceEvent) -> bool {
        match &event.kind {
            EventKind::Provider { provider, event } => {
                provider == &self.provider && event == &self.key
            }
            _ => false,
        }
    }
}
