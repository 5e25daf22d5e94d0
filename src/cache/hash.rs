// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Deterministic cache-key hashing
//!
//! Uses BLAKE3 through a seeded accumulator so keys are stable across
//! process runs. Every variable-length field is length-framed before
//! hashing to keep adjacent fields from aliasing.

use blake3::Hasher;

use crate::config::Settings;
use crate::document::Document;
use crate::errors::SiteflowResult;
use crate::meta::Value;
use crate::pipeline::Phase;

/// Deterministic accumulator for cache keys
pub struct CacheCode {
    hasher: Hasher,
}

impl CacheCode {
    pub fn new() -> Self {
        Self {
            hasher: Hasher::new(),
        }
    }

    pub fn update_bytes(&mut self, data: &[u8]) {
        self.hasher.update(&(data.len() as u64).to_le_bytes());
        self.hasher.update(data);
    }

    pub fn update_str(&mut self, s: &str) {
        self.update_bytes(s.as_bytes());
    }

    pub fn update_u64(&mut self, v: u64) {
        self.hasher.update(&v.to_le_bytes());
    }

    pub fn update_i64(&mut self, v: i64) {
        self.hasher.update(&v.to_le_bytes());
    }

    pub fn update_bool(&mut self, v: bool) {
        self.hasher.update(&[u8::from(v)]);
    }

    /// Hash an expanded metadata value. Deferred variants contribute only a
    /// tag: lazy values are expanded by callers before hashing and script
    /// values are never part of a cache key.
    pub fn update_value(&mut self, value: &Value) {
        self.update_str(value.type_name());
        match value {
            Value::Null => {}
            Value::Bool(b) => self.update_bool(*b),
            Value::Int(i) => self.update_i64(*i),
            Value::Float(x) => self.update_u64(x.to_bits()),
            Value::Str(s) => self.update_str(s),
            Value::Seq(items) => {
                self.update_u64(items.len() as u64);
                for item in items {
                    self.update_value(item);
                }
            }
            Value::Document(doc) => {
                self.update_str(&doc.source().map(|p| p.display().to_string()).unwrap_or_default());
                self.update_str(
                    &doc.destination()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default(),
                );
            }
            Value::Lazy(_) | Value::Script(_) => {}
        }
    }

    /// Finalize to a hex key
    pub fn finalize(self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }
}

impl Default for CacheCode {
    fn default() -> Self {
        Self::new()
    }
}

/// Content + metadata fingerprint of a document
///
/// Lazy values are expanded before hashing; script values are skipped
/// (they are re-evaluated on every access and never cached).
pub async fn document_fingerprint(doc: &Document) -> SiteflowResult<String> {
    let mut code = CacheCode::new();

    code.update_str(&doc.source().map(|p| p.display().to_string()).unwrap_or_default());
    code.update_str(
        &doc.destination()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
    );
    code.update_bytes(&doc.content().bytes().await?);

    let mut keys: Vec<&str> = doc
        .metadata()
        .iter()
        .filter(|(_, v)| !matches!(v, Value::Script(_)))
        .map(|(k, _)| k)
        .collect();
    keys.sort_by_key(|k| k.to_lowercase());

    code.update_u64(keys.len() as u64);
    for key in keys {
        code.update_str(&key.to_lowercase());
        let value = doc.metadata().get_value(key).unwrap_or(Value::Null);
        code.update_value(&value);
    }

    Ok(code.finalize())
}

/// Cache key for one module step: module identity, input fingerprints, and
/// the settings the module declared cache-relevant
pub async fn module_cache_key(
    pipeline: &str,
    phase: Phase,
    module_name: &str,
    cache_settings: &[String],
    inputs: &[Document],
    settings: &Settings,
) -> SiteflowResult<String> {
    let mut code = CacheCode::new();

    code.update_str(&pipeline.to_lowercase());
    code.update_str(&phase.to_string());
    code.update_str(module_name);

    code.update_u64(inputs.len() as u64);
    for doc in inputs {
        code.update_str(&document_fingerprint(doc).await?);
    }

    code.update_u64(cache_settings.len() as u64);
    for key in cache_settings {
        code.update_str(&key.to_lowercase());
        match settings.get_value(key) {
            Some(value) => code.update_value(value),
            None => code.update_value(&Value::Null),
        }
    }

    Ok(code.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Content;
    use crate::meta::Metadata;

    #[tokio::test]
    async fn test_fingerprint_is_deterministic() {
        let doc = Document::new(
            Content::from_string("body"),
            Metadata::from_pairs([("Title", "T"), ("Author", "A")]),
        )
        .with_source("a.md");

        let f1 = document_fingerprint(&doc).await.unwrap();
        let f2 = document_fingerprint(&doc).await.unwrap();
        assert_eq!(f1, f2);
    }

    #[tokio::test]
    async fn test_fingerprint_changes_with_content_and_metadata() {
        let doc = Document::new(Content::from_string("body"), Metadata::new());

        let base = document_fingerprint(&doc).await.unwrap();
        let changed_content = document_fingerprint(&doc.with_content(Content::from_string("other")))
            .await
            .unwrap();
        let changed_meta = document_fingerprint(&doc.with_metadata([("K", 1i64)]))
            .await
            .unwrap();

        assert_ne!(base, changed_content);
        assert_ne!(base, changed_meta);
    }

    #[tokio::test]
    async fn test_fingerprint_ignores_key_casing_and_insertion_order() {
        let a = Document::new(
            Content::Empty,
            Metadata::from_pairs([("Alpha", 1i64), ("Beta", 2i64)]),
        );
        let b = a
            .with_metadata([("beta", 2i64)])
            .with_metadata([("ALPHA", 1i64)]);

        assert_eq!(
            document_fingerprint(&a).await.unwrap(),
            document_fingerprint(&b).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_module_key_depends_on_declared_settings_only() {
        let doc = Document::new(Content::from_string("x"), Metadata::new());
        let declared = vec!["BaseUrl".to_string()];

        let s1 = Settings::new().with("BaseUrl", "a").with("Unrelated", 1i64);
        let s2 = Settings::new().with("BaseUrl", "a").with("Unrelated", 2i64);
        let s3 = Settings::new().with("BaseUrl", "b");

        let k1 = module_cache_key("p", Phase::Process, "m", &declared, &[doc.clone()], &s1)
            .await
            .unwrap();
        let k2 = module_cache_key("p", Phase::Process, "m", &declared, &[doc.clone()], &s2)
            .await
            .unwrap();
        let k3 = module_cache_key("p", Phase::Process, "m", &declared, &[doc], &s3)
            .await
            .unwrap();

        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[test]
    fn test_framing_prevents_aliasing() {
        let mut a = CacheCode::new();
        a.update_str("ab");
        a.update_str("c");

        let mut b = CacheCode::new();
        b.update_str("a");
        b.update_str("bc");

        assert_ne!(a.finalize(), b.finalize());
    }
}
