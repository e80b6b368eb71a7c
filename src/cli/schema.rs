use crate::config::Config;
use crate::provider::FixtureFile;
use clap::ValueEnum;
use schemars::schema_for;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum SchemaTarget {
    /// `zonewise.yaml`
    #[default]
    Config,
    /// Canned responses read by the fixture provider
    Fixture,
}

pub fn execute(target: SchemaTarget) -> anyhow::Result<()> {
    let schema = match target {
        SchemaTarget::Config => schema_for!(Config),
        SchemaTarget::Fixture => schema_for!(FixtureFile),
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
