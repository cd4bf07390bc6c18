pub mod manifest;
pub mod merge;
pub mod resolver;
pub mod rules;
pub mod version_file;

pub use manifest::{runtime_platform_key, ManifestEntry, ManifestIndex};
pub use merge::merge_descriptors;
pub use resolver::ManifestResolver;
pub use rules::{evaluate, rules_allow, OsRule, PlatformContext, Rule, RuleAction};
pub use version_file::{
    Argument, ArgumentValue, Arguments, Artifact, AssetIndexInfo, ExtractRules, JavaVersionInfo,
    Library, LibraryDownloads, VersionDescriptor, LEGACY_ASSET_INDEX, LEGACY_RUNTIME_COMPONENT,
};
