//! AI commentary on wallet activity.
//!
//! The model service is an external collaborator: it turns a prompt into free
//! text. Prompt building and the fallback policy live here so they stay
//! deterministic; the trigger probability is a parameter with an injected RNG.

use chrono::{TimeZone, Utc};
use rand::Rng;
use tracing::warn;

use crate::wallet::Transaction;

pub const NO_KEY_WISDOM: &str = "Daily wisdom requires an API Key.";
pub const NO_KEY_ANALYSIS: &str = "AI analysis unavailable without API Key.";
pub const FALLBACK_WISDOM: &str = "Keep building your stack, one day at a time!";
pub const FALLBACK_ANALYSIS: &str = "Your wallet looks active! Keep managing your assets wisely.";

/// Transactions included in an analysis prompt.
pub const ANALYSIS_WINDOW: usize = 10;

/// Default chance that a transfer triggers an activity analysis.
pub const DEFAULT_ANALYSIS_PROBABILITY: f64 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error("model request failed: {0}")]
    Request(String),
    #[error("model returned no text")]
    EmptyResponse,
}

/// A text-generation backend.
#[allow(async_fn_in_trait)]
pub trait Advisor {
    async fn generate(&self, prompt: &str) -> Result<String, AdvisorError>;
}

pub fn wisdom_prompt(streak: usize) -> String {
    format!(
        "Generate a short, motivational, and fun \"Crypto Fortune Cookie\" style quote for a user \
         who has just checked in to their wallet app. Their current check-in streak is \
         (hypothetically) {streak} days. Keep it under 30 words. No financial advice, just fun \
         vibes about holding, saving, or mooning."
    )
}

pub fn analysis_prompt(transactions: &[Transaction], balance: f64) -> String {
    let recent: Vec<String> = transactions
        .iter()
        .take(ANALYSIS_WINDOW)
        .map(|tx| {
            let day = Utc
                .timestamp_millis_opt(tx.timestamp)
                .single()
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "unknown date".to_string());
            format!("{} of {} tokens on {day}", tx.kind.label(), tx.amount)
        })
        .collect();

    format!(
        "You are a witty AI Wallet Assistant.\n\
         Current Balance: {balance} STX (Simulated).\n\
         Recent Activity:\n{}\n\n\
         Analyze the user's recent behavior in 2 sentences.\n\
         If they are saving (more deposits/check-ins), praise them.\n\
         If they are spending (withdrawals), give a playful warning or spending tip.\n\
         Output plain text only.",
        recent.join("\n")
    )
}

/// Motivational quote after a check-in. Never fails.
pub async fn daily_wisdom<A: Advisor>(advisor: &A, streak: usize) -> String {
    resolve(advisor.generate(&wisdom_prompt(streak)).await, NO_KEY_WISDOM, FALLBACK_WISDOM)
}

/// Two-sentence review of recent activity. Never fails.
pub async fn analyze_activity<A: Advisor>(
    advisor: &A,
    transactions: &[Transaction],
    balance: f64,
) -> String {
    resolve(
        advisor.generate(&analysis_prompt(transactions, balance)).await,
        NO_KEY_ANALYSIS,
        FALLBACK_ANALYSIS,
    )
}

fn resolve(result: Result<String, AdvisorError>, no_key: &str, fallback: &str) -> String {
    match result {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => fallback.to_string(),
        Err(AdvisorError::MissingApiKey) => no_key.to_string(),
        Err(e) => {
            warn!("Advisor error: {e}");
            fallback.to_string()
        }
    }
}

/// Decides whether a transfer triggers an activity analysis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnalysisTrigger {
    probability: f64,
}

impl AnalysisTrigger {
    /// Probability is clamped into `[0, 1]`; NaN disables the trigger.
    pub fn new(probability: f64) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self { probability }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn should_analyze<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen_bool(self.probability)
    }
}

impl Default for AnalysisTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_ANALYSIS_PROBABILITY)
    }
}
