// ─── Version File ───
// Typed view over a resolved (inheritance-merged) version descriptor.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::rules::{rules_allow, PlatformContext, Rule};

/// Runtime used when a descriptor does not declare `javaVersion`.
pub const LEGACY_RUNTIME_COMPONENT: &str = "jre-legacy";

/// Asset index id used by descriptors that predate `assetIndex`.
pub const LEGACY_ASSET_INDEX: &str = "pre-1.6";

/// A fully resolved version descriptor.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDescriptor {
    pub id: String,
    #[serde(default)]
    pub inherits_from: Option<String>,
    #[serde(default, rename = "type")]
    pub version_type: Option<String>,
    #[serde(default)]
    pub main_class: Option<String>,
    #[serde(default)]
    pub release_time: Option<String>,
    #[serde(default)]
    pub libraries: Vec<Library>,
    #[serde(default)]
    pub downloads: HashMap<String, Artifact>,
    #[serde(default)]
    pub asset_index: Option<AssetIndexInfo>,
    /// Bare asset index id (`"legacy"`, `"pre-1.6"`, ...).
    #[serde(default)]
    pub assets: Option<String>,
    #[serde(default)]
    pub arguments: Option<Arguments>,
    /// Legacy `minecraftArguments` field (pre-1.13).
    #[serde(default)]
    pub minecraft_arguments: Option<String>,
    #[serde(default)]
    pub java_version: Option<JavaVersionInfo>,

    /// Folder under `versions/` that backs this descriptor (the root-most
    /// parent's folder). Filled in by the resolver.
    #[serde(skip)]
    pub folder: String,
}

/// A single remote file with integrity metadata.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Artifact {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexInfo {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub total_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersionInfo {
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub major_version: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<Argument>,
    #[serde(default)]
    pub jvm: Vec<Argument>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Argument {
    Plain(String),
    Conditional {
        #[serde(default)]
        rules: Vec<Rule>,
        value: ArgumentValue,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    One(String),
    Many(Vec<String>),
}

// ─── Library Entry ───

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Library {
    pub name: String,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default)]
    pub rules: Option<Vec<Rule>>,
    /// OS name → classifier (may contain `${arch}`).
    #[serde(default)]
    pub natives: Option<HashMap<String, String>>,
    #[serde(default)]
    pub extract: Option<ExtractRules>,
    /// Maven repository base for libraries without `downloads`.
    #[serde(default)]
    pub url: Option<String>,
    /// Acceptable sha1 values for libraries without `downloads`.
    #[serde(default)]
    pub checksums: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LibraryDownloads {
    #[serde(default)]
    pub artifact: Option<Artifact>,
    #[serde(default)]
    pub classifiers: Option<HashMap<String, Artifact>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExtractRules {
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Library {
    pub fn is_active(&self, ctx: &PlatformContext) -> bool {
        rules_allow(self.rules.as_deref(), ctx)
    }

    /// Native classifier for the given platform, with `${arch}` expanded.
    pub fn native_classifier(&self, ctx: &PlatformContext) -> Option<String> {
        let natives = self.natives.as_ref()?;
        natives
            .get(&ctx.os)
            .map(|c| c.replace("${arch}", ctx.pointer_width()))
    }
}

impl VersionDescriptor {
    /// Asset index reference, or a bare legacy id when the descriptor has none.
    pub fn asset_index_id(&self) -> String {
        self.asset_index
            .as_ref()
            .map(|ai| ai.id.clone())
            .or_else(|| self.assets.clone())
            .unwrap_or_else(|| LEGACY_ASSET_INDEX.to_string())
    }

    /// Runtime component (`java-runtime-gamma`, `jre-legacy`, ...).
    pub fn runtime_component(&self) -> String {
        self.java_version
            .as_ref()
            .and_then(|j| j.component.clone())
            .unwrap_or_else(|| LEGACY_RUNTIME_COMPONENT.to_string())
    }

    /// Active game arguments for `ctx`.
    pub fn game_arguments(&self, ctx: &PlatformContext) -> Vec<String> {
        match &self.arguments {
            Some(args) if !args.game.is_empty() => resolve_arguments(&args.game, ctx),
            _ => self
                .minecraft_arguments
                .as_deref()
                .map(|s| s.split_whitespace().map(ToString::to_string).collect())
                .unwrap_or_default(),
        }
    }

    /// Active JVM arguments for `ctx`.
    pub fn jvm_arguments(&self, ctx: &PlatformContext) -> Vec<String> {
        self.arguments
            .as_ref()
            .map(|args| resolve_arguments(&args.jvm, ctx))
            .unwrap_or_default()
    }
}

/// Flatten an argument list, dropping conditional entries whose rules fail.
pub fn resolve_arguments(args: &[Argument], ctx: &PlatformContext) -> Vec<String> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Argument::Plain(value) => out.push(value.clone()),
            Argument::Conditional { rules, value } => {
                if !rules_allow(Some(rules), ctx) {
                    continue;
                }
                match value {
                    ArgumentValue::One(v) => out.push(v.clone()),
                    ArgumentValue::Many(vs) => out.extend(vs.iter().cloned()),
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux() -> PlatformContext {
        PlatformContext::new("linux", "x64", "6.1")
    }

    #[test]
    fn argument_object_rules_apply_to_platform() {
        let parsed: VersionDescriptor = serde_json::from_value(serde_json::json!({
            "id": "test",
            "mainClass": "net.minecraft.client.main.Main",
            "arguments": {
                "game": [
                    "--username",
                    "Player",
                    {
                        "rules": [{"action": "allow", "os": {"name": "linux"}}],
                        "value": ["--demo"]
                    },
                    {
                        "rules": [{"action": "allow", "os": {"name": "windows"}}],
                        "value": "--should-not-appear"
                    }
                ]
            }
        }))
        .unwrap();

        let game_args = parsed.game_arguments(&linux());
        assert_eq!(game_args, vec!["--username", "Player", "--demo"]);
    }

    #[test]
    fn legacy_arguments_split_on_whitespace() {
        let parsed: VersionDescriptor = serde_json::from_value(serde_json::json!({
            "id": "1.7.10",
            "minecraftArguments": "--username ${auth_player_name}  --version ${version_name}"
        }))
        .unwrap();
        assert_eq!(parsed.game_arguments(&linux()).len(), 4);
        assert!(parsed.jvm_arguments(&linux()).is_empty());
    }

    #[test]
    fn native_classifier_expands_arch() {
        let lib: Library = serde_json::from_value(serde_json::json!({
            "name": "org.lwjgl.lwjgl:lwjgl-platform:2.9.4",
            "natives": {"linux": "natives-linux", "windows": "natives-windows-${arch}"}
        }))
        .unwrap();
        assert_eq!(lib.native_classifier(&linux()).as_deref(), Some("natives-linux"));
        let win32 = PlatformContext::new("windows", "x86", "10.0");
        assert_eq!(
            lib.native_classifier(&win32).as_deref(),
            Some("natives-windows-32")
        );
    }

    #[test]
    fn defaults_for_missing_sections() {
        let parsed: VersionDescriptor =
            serde_json::from_value(serde_json::json!({"id": "rd-132211"})).unwrap();
        assert_eq!(parsed.asset_index_id(), LEGACY_ASSET_INDEX);
        assert_eq!(parsed.runtime_component(), LEGACY_RUNTIME_COMPONENT);
        assert!(parsed.libraries.is_empty());
    }
}
