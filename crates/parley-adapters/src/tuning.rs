use serde::{Deserialize, Serialize};

/// Sampling parameters sent with each request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationParams {
    pub fn new(temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            temperature,
            max_output_tokens,
        }
    }

    /// Clamp into a backend's legal ranges.
    ///
    /// A non-finite temperature is replaced by `fallback_temperature`.
    pub fn clamp_for_backend(
        self,
        temperature_range: (f32, f32),
        max_tokens_limit: u32,
        fallback_temperature: f32,
    ) -> Self {
        let temperature = if self.temperature.is_finite() {
            self.temperature
        } else {
            fallback_temperature
        };
        Self {
            temperature: temperature.clamp(temperature_range.0, temperature_range.1),
            max_output_tokens: self.max_output_tokens.clamp(1, max_tokens_limit),
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        DEFAULT_PARAMS
    }
}

const DEFAULT_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.7,
    max_output_tokens: 1024,
};

const LATENCY_OPTIMIZED: GenerationParams = GenerationParams {
    temperature: 0.6,
    max_output_tokens: 800,
};

const HIGH_CAPACITY: GenerationParams = GenerationParams {
    temperature: 0.8,
    max_output_tokens: 2048,
};

// First match wins; latency markers are checked first so "...-70b-turbo"
// is treated as a fast variant. "-mini" keeps its hyphen so "gemini" does
// not match.
const TUNING_TABLE: &[(&str, GenerationParams)] = &[
    ("flash", LATENCY_OPTIMIZED),
    ("turbo", LATENCY_OPTIMIZED),
    ("-mini", LATENCY_OPTIMIZED),
    ("-lite", LATENCY_OPTIMIZED),
    ("pro", HIGH_CAPACITY),
    ("70b", HIGH_CAPACITY),
    ("405b", HIGH_CAPACITY),
    ("large", HIGH_CAPACITY),
];

/// Backend defaults for a concrete model, keyed by model-name substring
pub fn tuned_params(model: &str) -> GenerationParams {
    let model = model.to_ascii_lowercase();
    TUNING_TABLE
        .iter()
        .find(|(marker, _)| model.contains(marker))
        .map(|(_, params)| *params)
        .unwrap_or(DEFAULT_PARAMS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_variants_run_cooler_and_shorter() {
        let params = tuned_params("gemini-1.5-flash");
        assert_eq!(params, LATENCY_OPTIMIZED);
        assert!(params.temperature < DEFAULT_PARAMS.temperature);

        assert_eq!(tuned_params("meta-llama/Llama-3.3-70B-Instruct-Turbo"), LATENCY_OPTIMIZED);
    }

    #[test]
    fn test_high_capacity_variants_get_larger_budget() {
        let params = tuned_params("gemini-1.5-pro");
        assert_eq!(params, HIGH_CAPACITY);
        assert!(params.max_output_tokens > DEFAULT_PARAMS.max_output_tokens);

        assert_eq!(tuned_params("gpt-4o-mini"), LATENCY_OPTIMIZED);
    }

    #[test]
    fn test_unknown_model_uses_defaults() {
        assert_eq!(tuned_params("some-new-model"), GenerationParams::default());
    }

    #[test]
    fn test_clamping() {
        let params = GenerationParams::new(3.5, 100_000).clamp_for_backend((0.0, 2.0), 4096, 0.7);
        assert_eq!(params.temperature, 2.0);
        assert_eq!(params.max_output_tokens, 4096);

        let params = GenerationParams::new(-1.0, 0).clamp_for_backend((0.0, 2.0), 4096, 0.7);
        assert_eq!(params.temperature, 0.0);
        assert_eq!(params.max_output_tokens, 1);

        let params = GenerationParams::new(f32::NAN, 10).clamp_for_backend((0.0, 1.0), 4096, 0.7);
        assert_eq!(params.temperature, 0.7);
    }
}
