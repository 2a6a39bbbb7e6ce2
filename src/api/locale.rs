use std::collections::HashMap;
use std::future::Future;

use axum::{
    extract::{Request, State},
    http::header::ACCEPT_LANGUAGE,
    middleware::Next,
    response::Response,
};
use once_cell::sync::Lazy;

use crate::state::AppState;

tokio::task_local! {
    static REQUEST_LOCALE: String;
}

/// Embedded `locales/<lang>.json` files: result-code key to message.
const EMBEDDED: &[(&str, &str)] = &[("id", include_str!("../../locales/id.json"))];

pub struct Catalog {
    messages: HashMap<String, HashMap<String, String>>,
}

impl Catalog {
    fn embedded() -> Self {
        let mut messages = HashMap::new();
        for (locale, source) in EMBEDDED {
            match serde_json::from_str::<HashMap<String, String>>(source) {
                Ok(table) => {
                    messages.insert(locale.to_string(), table);
                }
                Err(e) => tracing::error!("Ignoring malformed translation catalog '{}': {}", locale, e),
            }
        }
        Self { messages }
    }

    pub fn translate(&self, locale: &str, key: &str) -> Option<&str> {
        self.messages.get(locale)?.get(key).map(String::as_str)
    }
}

static CATALOG: Lazy<Catalog> = Lazy::new(Catalog::embedded);

pub fn catalog() -> &'static Catalog {
    &CATALOG
}

/// Locale selected for the request being handled, if any.
pub fn current_locale() -> Option<String> {
    REQUEST_LOCALE.try_with(|locale| locale.clone()).ok()
}

/// Runs `fut` with `locale` as the request locale.
pub async fn with_locale<F: Future>(locale: String, fut: F) -> F::Output {
    REQUEST_LOCALE.scope(locale, fut).await
}

/// First language tag's primary subtag: `id-ID,id;q=0.9,en;q=0.8` -> `id`.
pub fn parse_accept_language(header: &str) -> Option<String> {
    let first = header.split(',').next()?;
    let tag = first.split(';').next()?.trim();
    let primary = tag.split(['-', '_']).next()?.trim();
    if primary.is_empty() || primary == "*" || !primary.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(primary.to_ascii_lowercase())
}

pub async fn localize(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let locale = req
        .headers()
        .get(ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_accept_language)
        .unwrap_or_else(|| state.config.locale.default_locale.clone());

    with_locale(locale, next.run(req)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_primary_subtag_of_first_language() {
        assert_eq!(parse_accept_language("id-ID,id;q=0.9,en;q=0.8").as_deref(), Some("id"));
        assert_eq!(parse_accept_language("EN").as_deref(), Some("en"));
        assert_eq!(parse_accept_language("fr;q=0.5").as_deref(), Some("fr"));
        assert_eq!(parse_accept_language("*"), None);
        assert_eq!(parse_accept_language(""), None);
    }

    #[test]
    fn embedded_catalog_is_loaded() {
        assert_eq!(catalog().translate("id", "1001"), Some("Login berhasil"));
        assert_eq!(catalog().translate("id", "9999"), None);
        assert_eq!(catalog().translate("xx", "1001"), None);
    }

    #[tokio::test]
    async fn locale_is_scoped_to_the_future() {
        assert_eq!(current_locale(), None);
        let seen = with_locale("id".to_string(), async { current_locale() }).await;
        assert_eq!(seen.as_deref(), Some("id"));
        assert_eq!(current_locale(), None);
    }
}
