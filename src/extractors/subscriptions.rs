use anyhow::Result;
use regex::Regex;
use std::sync::Arc;

use super::{alternation, FactExtractor, SourceUnit};
use crate::config::IndicatorSets;
use crate::core::{SubscriptionKind, SubscriptionRecord, UnitFacts};

/// Finds handler registrations in the dependency container and direct
/// event-bus subscriptions.
pub struct SubscriptionExtractor {
    indicators: Arc<IndicatorSets>,
    /// `AddScoped|AddTransient|AddSingleton<IIntegrationEventHandler<T>, ...>`
    registration: Regex,
    /// `Subscribe<T, ...>` or `SubscribeAsync<T, ...>`
    bus_subscription: Regex,
}

impl SubscriptionExtractor {
    pub fn new(indicators: Arc<IndicatorSets>) -> Result<Self> {
        let interfaces = alternation(&indicators.handler_interfaces);
        let registration = Regex::new(&format!(
            r"\bAdd(?:Scoped|Transient|Singleton)\s*<\s*(?:[A-Za-z_]\w*\.)*(?:{interfaces})\s*<\s*(?:[A-Za-z_]\w*\.)*([A-Za-z_]\w*)\s*>"
        ))?;
        let bus_subscription = Regex::new(
            r"\.\s*Subscribe(?:Async)?\s*<\s*(?:[A-Za-z_]\w*\.)*([A-Za-z_]\w*)\s*[,>]",
        )?;
        Ok(Self {
            indicators,
            registration,
            bus_subscription,
        })
    }

    pub fn extract_subscriptions(&self, unit: &SourceUnit) -> Vec<SubscriptionRecord> {
        let in_background_job = unit.mentions_background_job(&self.indicators);
        let mut records = Vec::new();

        for (index, line) in unit.text.lines().enumerate() {
            let patterns = [
                (&self.registration, SubscriptionKind::DependencyRegistration),
                (&self.bus_subscription, SubscriptionKind::EventBusSubscription),
            ];
            for (pattern, kind) in patterns {
                for caps in pattern.captures_iter(line) {
                    records.push(
                        SubscriptionRecord::new(caps[1].to_string(), &unit.origin, kind, index + 1)
                            .with_context(line.trim().to_string())
                            .with_background_job(in_background_job),
                    );
                }
            }
        }

        records
    }
}

impl FactExtractor for SubscriptionExtractor {
    fn extract(&self, unit: &SourceUnit, facts: &mut UnitFacts) {
        facts.subscriptions.extend(self.extract_subscriptions(unit));
    }

    fn extractor_name(&self) -> &'static str {
        "subscriptions"
    }
}
