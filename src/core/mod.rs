// ─── launchkit Core ───
// Version manifest resolution and download orchestration.
//
// Architecture:
//   core/
//     version/     Manifest index, rules, descriptor merge + resolver
//     maven/       Artifact coordinates and repository paths
//     planner/     Descriptor → download tasks (libraries, assets, runtime, jar)
//     downloader/  Engine, workers, integrity checks, post-processing
//     install/     End-to-end install of one version
//     state/       Settings and the immutable launcher context
//     events       Download event bus

pub mod downloader;
pub mod error;
pub mod events;
pub mod install;
pub mod maven;
pub mod planner;
pub mod state;
pub mod version;
