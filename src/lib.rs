//! asset-relations-explorer: asset reference and build-inclusion analysis
//!
//! Load a content repository (a JSON manifest of assets, their objects and
//! dependencies), build the reference and usage graphs over it, and query
//! them through a small filter language.
//!
//! # Features
//! - Reference graph: which container roots (prefabs) reference which
//!   assets, down to hierarchy node, component and property
//! - Usage graph with build inclusion: explicit rules plus cycle-safe
//!   reachability from included users
//! - Filter expressions such as `hero mat:skin t:texture`
//! - Texture density assessment in pixels per meter
//!
//! # Quickstart (Library)
//! ```no_run
//! use asset_relations_explorer::describe::AssetDescriber;
//! use asset_relations_explorer::graph::{Analysis, ScanRules};
//! use asset_relations_explorer::progress::NullProgress;
//! use asset_relations_explorer::query::{FilterQuery, PrefabReferencesQuery, Query};
//! use asset_relations_explorer::repository::ManifestRepository;
//!
//! let repo = ManifestRepository::load_json(std::path::Path::new("repo.json"))
//!     .expect("load manifest");
//! let analysis = Analysis::build(&repo, &ScanRules::default(), &AssetDescriber::default(), &mut NullProgress)
//!     .expect("build analysis");
//! let filter = FilterQuery::parse("mat:skin").expect("filter");
//! let view = PrefabReferencesQuery::new(&filter).run(&analysis);
//! println!("{} prefabs, {} rows", view.len(), view.layout.total_rows());
//! ```
//!
//! # Quickstart (CLI)
//! ```text
//! asset-relations-explorer usages --manifest repo.json --filter "t:texture" --included excluded
//! asset-relations-explorer references --manifest repo.json --format json
//! asset-relations-explorer included Assets/Textures/Hero.png --manifest repo.json
//! ```
//!
//! # Logging
//! Set `ASSET_EXPLORER_LOG` (an `EnvFilter` directive such as `debug`) or
//! pass `-v` / `-vv`.
pub mod app;
pub mod cli;
pub mod density;
pub mod describe;
pub mod errors;
pub mod graph;
pub mod parser;
pub mod progress;
pub mod query;
pub mod repository;
pub mod utils;
