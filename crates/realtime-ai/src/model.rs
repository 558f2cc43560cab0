//! Model tiers and audio-token pricing

use serde::{Deserialize, Serialize};

use crate::error::{AiError, Result};

/// The two model tiers the platform switches between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Cheap default model
    Mini,
    /// Higher-quality model, switched to on request
    Premium,
}

impl ModelTier {
    /// Parse a user-facing tier name
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mini" => Ok(ModelTier::Mini),
            "premium" => Ok(ModelTier::Premium),
            other => Err(AiError::Config {
                reason: format!("unknown model tier: {other}"),
            }),
        }
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelTier::Mini => write!(f, "mini"),
            ModelTier::Premium => write!(f, "premium"),
        }
    }
}

/// Cents per 1000 audio tokens, by tier and direction.
///
/// The values come from configuration; the defaults are placeholders the
/// operator is expected to override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTable {
    /// Mini tier, input audio tokens
    pub mini_input: f64,
    /// Mini tier, output audio tokens
    pub mini_output: f64,
    /// Premium tier, input audio tokens
    pub premium_input: f64,
    /// Premium tier, output audio tokens
    pub premium_output: f64,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            mini_input: 10.0,
            mini_output: 20.0,
            premium_input: 40.0,
            premium_output: 80.0,
        }
    }
}

impl PriceTable {
    /// Cost in cents for the given token counts at a tier
    pub fn cost_cents(&self, tier: ModelTier, input_tokens: u64, output_tokens: u64) -> f64 {
        let (input_rate, output_rate) = match tier {
            ModelTier::Mini => (self.mini_input, self.mini_output),
            ModelTier::Premium => (self.premium_input, self.premium_output),
        };
        input_tokens as f64 / 1000.0 * input_rate + output_tokens as f64 / 1000.0 * output_rate
    }
}

/// Connection settings for the realtime endpoint
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Bearer key for the Authorization header
    pub api_key: String,
    /// Websocket base URL, model id appended as a query parameter
    pub base_url: String,
    /// TTS voice name
    pub voice: String,
    /// Model id behind the mini tier
    pub mini_model: String,
    /// Model id behind the premium tier
    pub premium_model: String,
    /// Audio-token prices
    pub prices: PriceTable,
}

impl RealtimeConfig {
    /// The concrete model id for a tier
    pub fn model_id(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Mini => &self.mini_model,
            ModelTier::Premium => &self.premium_model,
        }
    }

    /// The websocket URL for a tier
    pub fn url(&self, tier: ModelTier) -> String {
        format!("{}?model={}", self.base_url, self.model_id(tier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_parsing() {
        assert_eq!(ModelTier::parse("mini").unwrap(), ModelTier::Mini);
        assert_eq!(ModelTier::parse(" Premium ").unwrap(), ModelTier::Premium);
        assert!(ModelTier::parse("turbo").is_err());
    }

    #[test]
    fn cost_scales_with_tokens_and_tier() {
        let prices = PriceTable::default();
        let mini = prices.cost_cents(ModelTier::Mini, 1000, 1000);
        let premium = prices.cost_cents(ModelTier::Premium, 1000, 1000);
        assert_eq!(mini, 30.0);
        assert_eq!(premium, 120.0);
        assert_eq!(prices.cost_cents(ModelTier::Mini, 0, 0), 0.0);
    }

    #[test]
    fn url_carries_model_id() {
        let config = RealtimeConfig {
            api_key: "k".into(),
            base_url: "wss://api.example.com/v1/realtime".into(),
            voice: "alloy".into(),
            mini_model: "gpt-4o-mini-realtime".into(),
            premium_model: "gpt-4o-realtime".into(),
            prices: PriceTable::default(),
        };
        assert_eq!(
            config.url(ModelTier::Premium),
            "wss://api.example.com/v1/realtime?model=gpt-4o-realtime"
        );
    }
}
