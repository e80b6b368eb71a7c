use crate::error::SkillError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Level 1: what a skill is and where its document lives
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CatalogEntry {
    pub name: String,

    #[serde(rename = "description")]
    pub short_description: String,

    #[serde(rename = "path")]
    pub storage_path: PathBuf,

    pub category: String,

    pub priority: u32,

    #[serde(rename = "tokens_estimate")]
    pub token_estimate: u32,

    /// Advisory only; any reference under the skill directory may be read.
    #[serde(default)]
    pub references: Vec<String>,
}

impl CatalogEntry {
    /// Directory holding the skill document and its `references/` folder
    pub fn skill_dir(&self) -> &Path {
        self.storage_path.parent().unwrap_or(Path::new(""))
    }

    pub fn reference_path(&self, reference_name: &str) -> PathBuf {
        self.skill_dir().join("references").join(reference_name)
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    version: String,
    #[serde(default)]
    updated: Option<String>,
    #[serde(default)]
    total_skills: Option<usize>,
    skills: Vec<CatalogEntry>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    pub version: String,
    pub updated: Option<String>,
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Parse and structurally validate a skills manifest
    pub fn parse(content: &str) -> Result<Self, SkillError> {
        let manifest: Manifest = serde_yaml::from_str(content)
            .map_err(|e| SkillError::CatalogMalformed(e.to_string()))?;

        let mut seen = HashSet::new();
        for entry in &manifest.skills {
            if entry.name.trim().is_empty() {
                return Err(SkillError::CatalogMalformed(
                    "skill with empty name".to_string(),
                ));
            }
            if entry.storage_path.as_os_str().is_empty() {
                return Err(SkillError::CatalogMalformed(format!(
                    "skill '{}' has an empty path",
                    entry.name
                )));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(SkillError::CatalogMalformed(format!(
                    "duplicate skill '{}'",
                    entry.name
                )));
            }
        }

        if let Some(total) = manifest.total_skills {
            if total != manifest.skills.len() {
                warn!(
                    "Manifest declares {} skills but lists {}",
                    total,
                    manifest.skills.len()
                );
            }
        }

        Ok(Self {
            version: manifest.version,
            updated: manifest.updated,
            entries: manifest.skills,
        })
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Level 1 block handed to the reasoner so it knows what exists
    pub fn describe(&self) -> String {
        let mut out = String::from("# Available Skills\n\n");
        out.push_str("You have access to the following skills:\n\n");
        for entry in &self.entries {
            out.push_str(&format!("## {}\n", entry.name));
            out.push_str(entry.short_description.trim());
            out.push('\n');
            out.push_str(&format!(
                "Category: {} | Priority: {}\n\n",
                entry.category, entry.priority
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
version: "1.0"
updated: "2025-01-10"
total_skills: 2
skills:
  - name: zoning-analysis
    description: Zoning district lookup
    path: skills/zoning-analysis/SKILL.md
    category: zoning
    priority: 1
    tokens_estimate: 1500
    references: [malabar-zoning.md]
  - name: sun-analysis
    description: Sun and shadow
    path: skills/sun-analysis/SKILL.md
    category: visualization
    priority: 3
    tokens_estimate: 900
"#;

    #[test]
    fn test_parse_manifest() {
        let catalog = Catalog::parse(MANIFEST).unwrap();
        assert_eq!(catalog.version, "1.0");
        assert_eq!(catalog.entries().len(), 2);

        let zoning = catalog.get("zoning-analysis").unwrap();
        assert_eq!(zoning.token_estimate, 1500);
        assert_eq!(zoning.references, vec!["malabar-zoning.md"]);
        assert_eq!(
            zoning.reference_path("malabar-zoning.md"),
            PathBuf::from("skills/zoning-analysis/references/malabar-zoning.md")
        );
        assert!(catalog.get("sun-analysis").unwrap().references.is_empty());
        assert!(catalog.get("nope").is_none());
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let bad = r#"
version: "1.0"
skills:
  - name: zoning-analysis
    path: skills/zoning-analysis/SKILL.md
"#;
        assert!(matches!(
            Catalog::parse(bad),
            Err(SkillError::CatalogMalformed(_))
        ));
    }

    #[test]
    fn test_wrong_type_is_malformed() {
        let bad = r#"
version: "1.0"
skills:
  - name: zoning-analysis
    description: d
    path: skills/zoning-analysis/SKILL.md
    category: zoning
    priority: high
    tokens_estimate: 10
"#;
        assert!(matches!(
            Catalog::parse(bad),
            Err(SkillError::CatalogMalformed(_))
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let dup = format!(
            "{}\n  - name: sun-analysis\n    description: again\n    path: x/SKILL.md\n    category: c\n    priority: 1\n    tokens_estimate: 1\n",
            MANIFEST.trim_end()
        );
        let err = Catalog::parse(&dup).unwrap_err();
        assert!(err.to_string().contains("duplicate skill 'sun-analysis'"));
    }

    #[test]
    fn test_describe_lists_every_skill() {
        let catalog = Catalog::parse(MANIFEST).unwrap();
        let text = catalog.describe();
        assert!(text.starts_with("# Available Skills"));
        assert!(text.contains("## zoning-analysis\nZoning district lookup\n"));
        assert!(text.contains("Category: visualization | Priority: 3"));
    }
}
