// ─── Rules ───
// Conditional gates on libraries and launch arguments.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OsRule {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
    /// Regular expression matched against the host OS version string.
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: Option<OsRule>,
    #[serde(default)]
    pub features: Option<HashMap<String, bool>>,
}

/// Host description the rules are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformContext {
    /// `windows`, `osx` or `linux`.
    pub os: String,
    /// `x64`, `x86`, `arm64` or `arm`.
    pub arch: String,
    pub os_version: String,
    pub features: HashMap<String, bool>,
}

impl PlatformContext {
    /// Detect the running host.
    pub fn current() -> Self {
        let os_version = sysinfo::System::os_version()
            .or_else(sysinfo::System::kernel_version)
            .unwrap_or_default();

        Self {
            os: current_os_name().to_string(),
            arch: current_arch_name().to_string(),
            os_version,
            features: HashMap::new(),
        }
    }

    pub fn new(
        os: impl Into<String>,
        arch: impl Into<String>,
        os_version: impl Into<String>,
    ) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
            os_version: os_version.into(),
            features: HashMap::new(),
        }
    }

    pub fn with_feature(mut self, flag: impl Into<String>, enabled: bool) -> Self {
        self.features.insert(flag.into(), enabled);
        self
    }

    fn feature_enabled(&self, flag: &str) -> bool {
        self.features.get(flag).copied().unwrap_or(false)
    }

    /// Pointer width used to expand `${arch}` in native classifiers.
    pub fn pointer_width(&self) -> &'static str {
        match self.arch.as_str() {
            "x86" | "arm" => "32",
            _ => "64",
        }
    }
}

impl OsRule {
    fn matches(&self, ctx: &PlatformContext) -> bool {
        if let Some(name) = &self.name {
            if name != &ctx.os {
                return false;
            }
        }
        if let Some(arch) = &self.arch {
            if arch != &ctx.arch {
                return false;
            }
        }
        if let Some(pattern) = &self.version {
            match Regex::new(pattern) {
                Ok(re) => {
                    if !re.is_match(&ctx.os_version) {
                        return false;
                    }
                }
                Err(e) => {
                    warn!("Ignoring rule with invalid os.version pattern {:?}: {}", pattern, e);
                    return false;
                }
            }
        }
        true
    }
}

/// Evaluate a non-empty rule list.
///
/// Allow-list first, veto second: the result is true only when at least one
/// `allow` rule matched and nothing vetoed. A `disallow` whose OS clause
/// matches vetoes, and so does any required feature the context lacks.
pub fn evaluate(rules: &[Rule], ctx: &PlatformContext) -> bool {
    let mut permitted = true;
    let mut saw_allow = false;

    for rule in rules {
        if let Some(features) = &rule.features {
            if features
                .iter()
                .any(|(flag, required)| *required && !ctx.feature_enabled(flag))
            {
                permitted = false;
            }
        }

        let os_matches = rule.os.as_ref().map_or(true, |os| os.matches(ctx));
        if !os_matches {
            continue;
        }

        match rule.action {
            RuleAction::Disallow => permitted = false,
            RuleAction::Allow => saw_allow = true,
        }
    }

    permitted && saw_allow
}

/// Absent or empty rule lists mean "always active".
pub fn rules_allow(rules: Option<&[Rule]>, ctx: &PlatformContext) -> bool {
    match rules {
        None => true,
        Some(rules) if rules.is_empty() => true,
        Some(rules) => evaluate(rules, ctx),
    }
}

/// Get the Mojang OS name for the current platform.
pub fn current_os_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}

/// Get the rule-style architecture name for the current platform.
pub fn current_arch_name() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "x64",
        "x86" => "x86",
        "aarch64" => "arm64",
        "arm" => "arm",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux() -> PlatformContext {
        PlatformContext::new("linux", "x64", "6.1.0-13-amd64")
    }

    fn allow_os(name: &str) -> Rule {
        Rule {
            action: RuleAction::Allow,
            os: Some(OsRule {
                name: Some(name.into()),
                ..Default::default()
            }),
            features: None,
        }
    }

    #[test]
    fn allow_matching_os_is_true() {
        assert!(evaluate(&[allow_os("linux")], &linux()));
    }

    #[test]
    fn allow_other_os_is_false() {
        assert!(!evaluate(&[allow_os("osx")], &linux()));
    }

    #[test]
    fn later_disallow_overrides_allow() {
        let rules = vec![
            Rule {
                action: RuleAction::Allow,
                os: None,
                features: None,
            },
            Rule {
                action: RuleAction::Disallow,
                os: Some(OsRule {
                    name: Some("linux".into()),
                    ..Default::default()
                }),
                features: None,
            },
        ];
        assert!(!evaluate(&rules, &linux()));
    }

    #[test]
    fn disallow_alone_never_permits() {
        let rules = vec![Rule {
            action: RuleAction::Disallow,
            os: Some(OsRule {
                name: Some("osx".into()),
                ..Default::default()
            }),
            features: None,
        }];
        assert!(!evaluate(&rules, &linux()));
    }

    #[test]
    fn os_version_is_a_regex() {
        let rule = Rule {
            action: RuleAction::Allow,
            os: Some(OsRule {
                name: Some("linux".into()),
                version: Some(r"^6\.".into()),
                ..Default::default()
            }),
            features: None,
        };
        assert!(evaluate(&[rule.clone()], &linux()));
        let old = PlatformContext::new("linux", "x64", "5.10.0");
        assert!(!evaluate(&[rule], &old));
    }

    #[test]
    fn arch_must_match_when_present() {
        let rule = Rule {
            action: RuleAction::Allow,
            os: Some(OsRule {
                arch: Some("x86".into()),
                ..Default::default()
            }),
            features: None,
        };
        assert!(!evaluate(&[rule], &linux()));
    }

    #[test]
    fn missing_required_feature_vetoes() {
        let rule: Rule = serde_json::from_value(serde_json::json!({
            "action": "allow",
            "features": { "is_demo_user": true }
        }))
        .unwrap();
        assert!(!evaluate(&[rule.clone()], &linux()));
        assert!(evaluate(&[rule], &linux().with_feature("is_demo_user", true)));
    }

    #[test]
    fn feature_veto_applies_even_when_os_does_not_match() {
        let rules: Vec<Rule> = serde_json::from_value(serde_json::json!([
            { "action": "allow" },
            { "action": "allow", "os": { "name": "osx" }, "features": { "has_custom_resolution": true } }
        ]))
        .unwrap();
        assert!(!evaluate(&rules, &linux()));
    }

    #[test]
    fn absent_rules_are_always_active() {
        assert!(rules_allow(None, &linux()));
        assert!(rules_allow(Some(&[]), &linux()));
    }

    #[test]
    fn pointer_width_follows_arch() {
        assert_eq!(linux().pointer_width(), "64");
        assert_eq!(PlatformContext::new("windows", "x86", "10").pointer_width(), "32");
    }
}
