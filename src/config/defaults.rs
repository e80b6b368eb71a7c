use std::path::PathBuf;

pub fn default_version() -> u32 {
    1
}

pub fn default_skills_root() -> PathBuf {
    PathBuf::from("zonewise")
}

pub fn default_manifest() -> PathBuf {
    PathBuf::from("skills/skills-manifest.yaml")
}

pub fn default_timeout_sec() -> u64 {
    300
}

pub fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

pub fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from(".zonewise/checkpoints")
}

pub fn default_claude_binary() -> PathBuf {
    // Check common install location first
    if let Some(home) = std::env::var_os("HOME") {
        let local_path = PathBuf::from(home).join(".claude/local/claude");
        if local_path.exists() {
            return local_path;
        }
    }
    // Fall back to PATH lookup
    PathBuf::from("claude")
}

pub fn default_claude_model() -> String {
    "sonnet".to_string()
}

pub fn default_permission_mode() -> String {
    "default".to_string()
}

pub fn default_codex_binary() -> PathBuf {
    PathBuf::from("codex")
}

pub fn default_codex_model() -> String {
    "gpt-4.1".to_string()
}

pub fn default_repair_estimate() -> f64 {
    30_000.0
}
