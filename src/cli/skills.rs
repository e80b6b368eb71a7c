use crate::cli::{load_config, SkillsArgs, SkillsCommand};
use crate::config::Config;
use crate::skills::{FsDocumentStore, SkillCache, SkillSource};
use crate::telemetry::NoopSink;
use std::sync::Arc;

/// Skill documents under the configured skills root
pub fn skill_source(config: &Config) -> SkillSource {
    let store = Arc::new(FsDocumentStore::new(&config.skills.root));
    SkillSource::new(store, &config.skills.manifest)
}

fn open(args: &SkillsArgs) -> anyhow::Result<SkillCache> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(root) = &args.skills_root {
        config.skills.root = root.clone();
    }
    config.validate()?;
    Ok(skill_source(&config).open(Arc::new(NoopSink)))
}

pub async fn execute(command: SkillsCommand) -> anyhow::Result<()> {
    match command {
        SkillsCommand::List(args) => {
            let cache = open(&args)?;
            let catalog = cache.resolve_catalog().await?;
            for entry in catalog.entries() {
                println!(
                    "{:<24} {:<14} p{}  ~{} tokens",
                    entry.name, entry.category, entry.priority, entry.token_estimate
                );
                println!("    {}", entry.short_description.trim());
                if !entry.references.is_empty() {
                    println!("    references: {}", entry.references.join(", "));
                }
            }
            let updated = catalog
                .updated
                .as_deref()
                .map(|u| format!(", updated {}", u))
                .unwrap_or_default();
            println!(
                "\n{} skills (manifest v{}{})",
                catalog.entries().len(),
                catalog.version,
                updated
            );
        }
        SkillsCommand::Show { name, args } => {
            let cache = open(&args)?;
            let doc = cache.load_capability(&name).await?;
            if !doc.front_matter.is_empty() {
                println!("---\n{}---\n", serde_yaml::to_string(&doc.front_matter)?);
            }
            println!("{}", doc.body);
        }
        SkillsCommand::Reference {
            name,
            reference,
            args,
        } => {
            let cache = open(&args)?;
            let doc = cache.load_reference(&name, &reference).await?;
            println!("{}", doc.content);
        }
    }
    Ok(())
}
