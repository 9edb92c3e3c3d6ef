//! Persona catalog
//!
//! A persona is a named behavior profile: instructions embedded in the
//! system prompt plus the tools it may use. The catalog is data, shipped as
//! embedded TOML and optionally replaced by a user file with the same schema:
//!
//! ```toml
//! [[persona]]
//! name = "Pesquisador Web"
//! description = "You are a research agent ..."
//! tools = ["web_search"]
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{GascError, Result};

/// Persona used when the selection is empty.
pub const DEFAULT_PERSONA: &str = "Especialista em IA";

/// Persona that unlocks web search.
pub const WEB_RESEARCHER: &str = "Pesquisador Web";

const BUILTIN_CATALOG: &str = include_str!("catalog.toml");

/// A named behavior profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Persona {
    pub name: String,
    pub description: String,
    #[serde(default, rename = "tools")]
    pub allowed_tools: Vec<String>,
}

impl Persona {
    pub fn new(name: &str, description: &str, allowed_tools: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            allowed_tools: allowed_tools.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn allows(&self, tool: &str) -> bool {
        self.allowed_tools.iter().any(|t| t == tool)
    }
}

#[derive(Deserialize)]
struct Catalog {
    #[serde(default)]
    persona: Vec<Persona>,
}

/// Fixed mapping of persona name to persona, in catalog order.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: Vec<Persona>,
}

impl PersonaRegistry {
    /// Registry holding the built-in catalog.
    pub fn builtin() -> Self {
        Self::from_toml(BUILTIN_CATALOG).expect("embedded persona catalog")
    }

    /// Parse a catalog document.
    ///
    /// Names must be unique and non-empty, and the catalog must contain at
    /// least one persona.
    pub fn from_toml(content: &str) -> Result<Self> {
        let catalog: Catalog = toml::from_str(content)?;
        let mut personas: Vec<Persona> = Vec::with_capacity(catalog.persona.len());

        for persona in catalog.persona {
            if persona.name.trim().is_empty() {
                return Err(GascError::Config("persona name cannot be empty".into()));
            }
            if personas.iter().any(|p| p.name == persona.name) {
                return Err(GascError::Config(format!(
                    "duplicate persona: {}",
                    persona.name
                )));
            }
            personas.push(persona);
        }

        if personas.is_empty() {
            return Err(GascError::Config("persona catalog is empty".into()));
        }

        Ok(Self { personas })
    }

    /// Load a catalog file.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let registry = Self::from_toml(&content)
            .map_err(|e| GascError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), personas = registry.len(), "Loaded persona catalog");
        Ok(registry)
    }

    /// Look up `names`, preserving the requested order.
    ///
    /// Repeated names resolve once, at their first position. Fails on the
    /// first name that is not in the catalog.
    pub fn get<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Persona>> {
        let mut selected: Vec<Persona> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let persona = self
                .find(name)
                .ok_or_else(|| GascError::UnknownPersona(name.to_string()))?;
            if !selected.iter().any(|p| p.name == persona.name) {
                selected.push(persona.clone());
            }
        }
        Ok(selected)
    }

    /// Like [`get`](Self::get), but an empty selection yields the default persona.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Persona>> {
        if names.is_empty() {
            return self.get(&[self.default_name()]);
        }
        self.get(names)
    }

    /// Name of the fallback persona: [`DEFAULT_PERSONA`] when present,
    /// otherwise the first catalog entry.
    pub fn default_name(&self) -> &str {
        self.find(DEFAULT_PERSONA)
            .or_else(|| self.personas.first())
            .map(|p| p.name.as_str())
            .unwrap_or(DEFAULT_PERSONA)
    }

    pub fn find(&self, name: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.personas.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Persona> {
        self.personas.iter()
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::WEB_SEARCH_TOOL;

    #[test]
    fn test_builtin_catalog_parses() {
        let registry = PersonaRegistry::from_toml(BUILTIN_CATALOG).unwrap();
        assert_eq!(
            registry.names(),
            vec!["Especialista em IA", "Consultor Criativo", "Pesquisador Web"]
        );
        for persona in registry.iter() {
            assert!(!persona.description.is_empty());
            assert!(!persona.description.contains('\n'));
            assert_eq!(persona.allowed_tools.len(), 2);
        }
    }

    #[test]
    fn test_only_web_researcher_searches() {
        let registry = PersonaRegistry::builtin();
        let searchers: Vec<_> = registry
            .iter()
            .filter(|p| p.allows(WEB_SEARCH_TOOL))
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(searchers, vec![WEB_RESEARCHER]);
    }

    #[test]
    fn test_get_preserves_selection_order() {
        let registry = PersonaRegistry::builtin();
        let selected = registry
            .get(&["Pesquisador Web", "Especialista em IA"])
            .unwrap();
        assert_eq!(selected[0].name, "Pesquisador Web");
        assert_eq!(selected[1].name, "Especialista em IA");
    }

    #[test]
    fn test_get_collapses_duplicates() {
        let registry = PersonaRegistry::builtin();
        let selected = registry
            .get(&["Consultor Criativo", "Pesquisador Web", "Consultor Criativo"])
            .unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].name, "Consultor Criativo");
    }

    #[test]
    fn test_get_unknown_persona() {
        let registry = PersonaRegistry::builtin();
        let err = registry
            .get(&["Especialista em IA", "Astrologer"])
            .unwrap_err();
        assert!(matches!(err, GascError::UnknownPersona(ref n) if n == "Astrologer"));
    }

    #[test]
    fn test_select_empty_falls_back_to_default() {
        let registry = PersonaRegistry::builtin();
        let none: [&str; 0] = [];
        let selected = registry.select(&none).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, DEFAULT_PERSONA);
    }

    #[test]
    fn test_custom_catalog_default_is_first_entry() {
        let registry = PersonaRegistry::from_toml(
            r#"
            [[persona]]
            name = "Reviewer"
            description = "Review code."
            tools = []
            "#,
        )
        .unwrap();
        assert_eq!(registry.default_name(), "Reviewer");
        let none: [String; 0] = [];
        assert_eq!(registry.select(&none).unwrap()[0].name, "Reviewer");
    }

    #[test]
    fn test_catalog_validation() {
        assert!(PersonaRegistry::from_toml("").is_err());
        assert!(PersonaRegistry::from_toml(
            "[[persona]]\nname = \"\"\ndescription = \"x\"\n"
        )
        .is_err());
        let dup = "[[persona]]\nname = \"A\"\ndescription = \"x\"\n[[persona]]\nname = \"A\"\ndescription = \"y\"\n";
        assert!(matches!(
            PersonaRegistry::from_toml(dup).unwrap_err(),
            GascError::Config(ref m) if m.contains("duplicate")
        ));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("personas.toml");
        std::fs::write(&path, "[[persona]]\nname = \"Tutor\"\ndescription = \"Teach.\"\n").unwrap();
        let registry = PersonaRegistry::load_file(&path).unwrap();
        assert!(registry.contains("Tutor"));
        assert!(registry.find("Tutor").unwrap().allowed_tools.is_empty());
    }
}
