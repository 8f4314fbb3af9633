//! Selectable model list: curation of the live model listing, query
//! filtering, and the built-in fallback set.

use proto::SelectableModel;

use crate::config::ProviderKind;

const GPT4_DESCRIPTION: &str = "Most capable model, best for complex tasks";
const GPT35_DESCRIPTION: &str = "Faster and cheaper, good for simpler tasks";
const GENERIC_DESCRIPTION: &str = "GPT model";
const CLAUDE_DESCRIPTION: &str = "Claude model";

/// Models offered when the live listing is unavailable or empty.
pub fn fallback_models(provider: ProviderKind) -> Vec<SelectableModel> {
    match provider {
        ProviderKind::OpenAi => vec![
            SelectableModel::new("gpt-4", "Most capable model, best at complex tasks"),
            SelectableModel::new("gpt-4-turbo-preview", "Latest GPT-4 model with lower cost"),
            SelectableModel::new("gpt-3.5-turbo", GPT35_DESCRIPTION),
        ],
        ProviderKind::Anthropic => vec![
            SelectableModel::new("claude-sonnet-4-5", "Balanced intelligence and speed"),
            SelectableModel::new("claude-opus-4-1", "Most capable Claude model"),
            SelectableModel::new("claude-3-5-haiku-latest", "Fastest and cheapest Claude model"),
        ],
    }
}

/// Reduces a raw model listing to the provider's chat models.
pub fn curate(provider: ProviderKind, raw: Vec<SelectableModel>) -> Vec<SelectableModel> {
    match provider {
        ProviderKind::OpenAi => curate_gpt(raw),
        ProviderKind::Anthropic => curate_claude(raw),
    }
}

/// GPT-4 family first, then by id.
fn curate_gpt(raw: Vec<SelectableModel>) -> Vec<SelectableModel> {
    let mut models: Vec<SelectableModel> = raw
        .into_iter()
        .filter(|m| is_gpt4(&m.id) || is_gpt35(&m.id))
        .map(|m| {
            let description = describe(&m.id);
            SelectableModel::new(m.id, description)
        })
        .collect();

    models.sort_by(|a, b| {
        is_gpt4(&b.id)
            .cmp(&is_gpt4(&a.id))
            .then_with(|| a.id.cmp(&b.id))
    });
    models.dedup_by(|a, b| a.id == b.id);
    models
}

/// Keeps the listing order (newest first) and the listed display names.
fn curate_claude(raw: Vec<SelectableModel>) -> Vec<SelectableModel> {
    let mut models: Vec<SelectableModel> = Vec::new();
    for m in raw.into_iter().filter(|m| m.id.starts_with("claude")) {
        if models.iter().any(|kept| kept.id == m.id) {
            continue;
        }
        let description = if m.description.trim().is_empty() {
            CLAUDE_DESCRIPTION.to_string()
        } else {
            m.description
        };
        models.push(SelectableModel::new(m.id, description));
    }
    models
}

/// Candidates for the selector given the outcome of a live fetch.
///
/// Never empty.
pub fn candidates_from(
    provider: ProviderKind,
    result: Result<Vec<SelectableModel>, String>,
) -> (Vec<SelectableModel>, Option<String>) {
    match result {
        Ok(raw) => {
            let curated = curate(provider, raw);
            if curated.is_empty() {
                let family = match provider {
                    ProviderKind::OpenAi => "GPT",
                    ProviderKind::Anthropic => "Claude",
                };
                (
                    fallback_models(provider),
                    Some(format!("No {family} models listed; showing defaults")),
                )
            } else {
                (curated, None)
            }
        }
        Err(err) => (
            fallback_models(provider),
            Some(format!("Could not fetch models ({}); showing defaults", sanitize_error(&err))),
        ),
    }
}

/// Entries whose id or description contains `query`, case-insensitively.
pub fn filtered<'a>(models: &'a [SelectableModel], query: &str) -> Vec<&'a SelectableModel> {
    models
        .iter()
        .filter(|m| matches_query(&m.id, query) || matches_query(&m.description, query))
        .collect()
}

fn describe(id: &str) -> &'static str {
    if is_gpt4(id) {
        GPT4_DESCRIPTION
    } else if is_gpt35(id) {
        GPT35_DESCRIPTION
    } else {
        GENERIC_DESCRIPTION
    }
}

fn is_gpt4(id: &str) -> bool {
    id.contains("gpt-4")
}

fn is_gpt35(id: &str) -> bool {
    id.contains("gpt-3.5")
}

fn matches_query(haystack: &str, query: &str) -> bool {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return true;
    }
    haystack
        .to_ascii_lowercase()
        .contains(&trimmed.to_ascii_lowercase())
}

fn sanitize_error(err: &str) -> String {
    err.replace('\n', " ")
}
