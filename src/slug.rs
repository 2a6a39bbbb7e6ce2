//! Slug and SKU derivation for catalog rows.
//!
//! Collisions are resolved with a second-resolution timestamp suffix. The
//! check and the later write are not atomic; the storage unique constraint
//! stays authoritative and a lost race surfaces as a conflict error.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::database::models::Entity;
use crate::database::{Repository, StoreError};

/// Lowercase ASCII words joined by `-`: `"Crème Brûlée @ Home"` -> `"creme-brulee-at-home"`.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        let folded: &str = match ch {
            '@' => " at ",
            '&' => " and ",
            _ => "",
        };
        let mut push = |c: char| {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        };
        if !folded.is_empty() {
            folded.chars().for_each(&mut push);
        } else if let Some(ascii) = fold_latin(ch) {
            ascii.chars().for_each(&mut push);
        } else {
            push(ch);
        }
    }
    out
}

fn fold_latin(ch: char) -> Option<&'static str> {
    Some(match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "a",
        'æ' | 'Æ' => "ae",
        'ç' | 'Ç' => "c",
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => "i",
        'ñ' | 'Ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => "o",
        'œ' | 'Œ' => "oe",
        'ß' => "ss",
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => "u",
        'ý' | 'ÿ' | 'Ý' => "y",
        _ => return None,
    })
}

/// Existence check for a slug among active rows, optionally ignoring one row.
#[async_trait]
pub trait SlugLookup: Send + Sync {
    async fn slug_taken(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool, StoreError>;
}

#[async_trait]
impl<T: Entity> SlugLookup for Repository<T> {
    async fn slug_taken(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool, StoreError> {
        let clause = match exclude_id {
            Some(id) => json!({ "slug": slug, "id": { "$ne": id } }),
            None => json!({ "slug": slug }),
        };
        self.exists(clause).await
    }
}

#[async_trait]
impl SlugLookup for HashSet<String> {
    async fn slug_taken(&self, slug: &str, _exclude_id: Option<i64>) -> Result<bool, StoreError> {
        Ok(self.contains(slug))
    }
}

/// Base slug of `name`, or the base plus `-<unix seconds>` when it is taken.
pub async fn resolve_slug<L>(name: &str, lookup: &L, exclude_id: Option<i64>) -> Result<String, StoreError>
where
    L: SlugLookup + ?Sized,
{
    let mut base = slugify(name);
    if base.is_empty() {
        base = Uuid::new_v4().simple().to_string()[..8].to_string();
    }
    if !lookup.slug_taken(&base, exclude_id).await? {
        return Ok(base);
    }
    Ok(format!("{}-{}", base, Utc::now().timestamp()))
}

/// `"Red T-Shirt"` -> `"RED-<32 hex digits>"`. The prefix is the first three
/// alphanumeric characters of the name, or `SKU` when there are none.
pub fn generate_sku(name: &str) -> String {
    let prefix: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_ascii_uppercase();
    let prefix = if prefix.is_empty() { "SKU".to_string() } else { prefix };
    format!("{}-{}", prefix, Uuid::new_v4().simple().to_string().to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_normalizes_names() {
        assert_eq!(slugify("Red T-Shirt"), "red-t-shirt");
        assert_eq!(slugify("  Summer   Sale!! 2024 "), "summer-sale-2024");
        assert_eq!(slugify("Crème Brûlée @ Home"), "creme-brulee-at-home");
        assert_eq!(slugify("Salt & Pepper"), "salt-and-pepper");
        assert_eq!(slugify("---"), "");
        assert_eq!(slugify("日本"), "");
    }

    #[tokio::test]
    async fn free_slug_is_returned_unchanged() {
        let existing: HashSet<String> = HashSet::new();
        assert_eq!(resolve_slug("Red T-Shirt", &existing, None).await.unwrap(), "red-t-shirt");
    }

    #[tokio::test]
    async fn taken_slug_gets_timestamp_suffix() {
        let existing: HashSet<String> = ["red-t-shirt".to_string()].into_iter().collect();
        let slug = resolve_slug("Red T-Shirt", &existing, None).await.unwrap();
        assert!(slug.starts_with("red-t-shirt-"));
        assert_ne!(slug, "red-t-shirt");
        assert!(slug["red-t-shirt-".len()..].chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn unsluggable_name_falls_back_to_random_token() {
        let existing: HashSet<String> = HashSet::new();
        let slug = resolve_slug("!!!", &existing, None).await.unwrap();
        assert_eq!(slug.len(), 8);
    }

    #[test]
    fn sku_has_prefix_and_unique_suffix() {
        let a = generate_sku("Red T-Shirt");
        let b = generate_sku("Red T-Shirt");
        assert!(a.starts_with("RED-"));
        assert_eq!(a.len(), 4 + 32);
        assert_ne!(a, b);
        assert!(generate_sku("é!").starts_with("SKU-"));
        assert!(generate_sku("A B").starts_with("AB-"));
    }
}
