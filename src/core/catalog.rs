//! Product catalog lookup
//!
//! Maps a normalized payload to a human-readable product label. The lookup
//! is total: unknown payloads resolve to the configured "unassigned" label.

use std::collections::BTreeMap;

use crate::core::config::CatalogConfig;

/// Label returned for payloads that are not in the catalog
pub const DEFAULT_UNASSIGNED_LABEL: &str = "Producto no asignado";

/// Built-in product table
const BUILTIN_PRODUCTS: &[(&str, &str)] = &[
    ("12345678", "Libreta Profesional"),
    ("87654321", "Crema de Manos Hidratante"),
    ("4005900114008", "Nivea Soft Cream"),
    ("7501055301323", "Coca Cola 600ml"),
    ("7501030400034", "Papas Sabritas Original"),
    ("8426307429887", "Libreta Azul"),
    ("8411047104118", "Crema de manos"),
    ("8431775035614", "Caja de camara"),
    ("3574660085587", "lapiz labial"),
];

/// Anything that can resolve a payload to a label
pub trait CatalogLookup: Send + Sync {
    /// Resolve `payload` to a label. Never fails.
    fn lookup(&self, payload: &str) -> String;
}

/// Static payload → label table
#[derive(Debug, Clone)]
pub struct Catalog {
    products: BTreeMap<String, String>,
    unassigned_label: String,
}

impl Catalog {
    /// Catalog holding only the built-in products
    pub fn builtin() -> Self {
        Self {
            products: BUILTIN_PRODUCTS
                .iter()
                .map(|(code, label)| (code.to_string(), label.to_string()))
                .collect(),
            unassigned_label: DEFAULT_UNASSIGNED_LABEL.to_string(),
        }
    }

    /// Built-in products with configured entries layered on top
    pub fn from_config(config: &CatalogConfig) -> Self {
        let mut catalog = Self::builtin();
        for (code, label) in &config.products {
            catalog.products.insert(code.clone(), label.clone());
        }
        if !config.unassigned_label.trim().is_empty() {
            catalog.unassigned_label = config.unassigned_label.clone();
        }
        catalog
    }

    /// Add or replace one entry
    pub fn insert(&mut self, payload: &str, label: &str) {
        self.products.insert(payload.to_string(), label.to_string());
    }

    /// Iterate entries ordered by payload
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.products.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn unassigned_label(&self) -> &str {
        &self.unassigned_label
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CatalogLookup for Catalog {
    fn lookup(&self, payload: &str) -> String {
        self.products
            .get(payload)
            .cloned()
            .unwrap_or_else(|| self.unassigned_label.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.lookup("7501055301323"), "Coca Cola 600ml");
        assert_eq!(catalog.lookup("12345678"), "Libreta Profesional");
    }

    #[test]
    fn test_unknown_payload_uses_fallback() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.lookup("0000"), DEFAULT_UNASSIGNED_LABEL);
        assert_eq!(catalog.lookup(""), DEFAULT_UNASSIGNED_LABEL);
    }

    #[test]
    fn test_config_overrides() {
        let mut config = CatalogConfig::default();
        config
            .products
            .insert("12345678".to_string(), "Cuaderno".to_string());
        config
            .products
            .insert("A".to_string(), "Widget".to_string());
        config.unassigned_label = "Unassigned".to_string();

        let catalog = Catalog::from_config(&config);
        assert_eq!(catalog.lookup("12345678"), "Cuaderno");
        assert_eq!(catalog.lookup("A"), "Widget");
        assert_eq!(catalog.lookup("nope"), "Unassigned");
        assert_eq!(catalog.len(), BUILTIN_PRODUCTS.len() + 1);
    }

    #[test]
    fn test_blank_unassigned_label_keeps_default() {
        let config = CatalogConfig {
            unassigned_label: "   ".to_string(),
            ..Default::default()
        };
        let catalog = Catalog::from_config(&config);
        assert_eq!(catalog.unassigned_label(), DEFAULT_UNASSIGNED_LABEL);
    }
}
