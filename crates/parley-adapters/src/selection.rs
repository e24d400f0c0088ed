use tracing::{debug, info, warn};

/// Walk an ordered list of model identifiers and keep the first one whose
/// initializer succeeds.
///
/// Runs once when an adapter is built; the chosen model is fixed for the
/// adapter's lifetime.
pub fn select_model<T, F>(family: &str, candidates: &[String], mut init: F) -> Option<(String, T)>
where
    F: FnMut(&str) -> Option<T>,
{
    for (attempt, candidate) in candidates.iter().enumerate() {
        let candidate = candidate.trim();
        debug!(family, model = candidate, attempt = attempt + 1, "Trying model");

        match init(candidate) {
            Some(client) => {
                info!(family, model = candidate, "Selected model");
                return Some((candidate.to_string(), client));
            }
            None => warn!(family, model = candidate, "Model could not be initialized"),
        }
    }

    warn!(family, candidates = candidates.len(), "No usable model candidate");
    None
}

/// Basic shape check shared by the HTTP adapters
pub(crate) fn is_plausible_model_id(model: &str) -> bool {
    !model.is_empty() && !model.chars().any(char::is_whitespace)
}
