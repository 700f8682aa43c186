use crate::cli::{Cli, Commands, CommonArgs, InclusionArg, OnOffArg, OutputFormat};
use crate::density::{ContainerDensity, DensityGrade, DensityLevel, MaterialDensity};
use crate::describe::{AssetDescriber, Descriptor, StorageSizes};
use crate::graph::{
    Analysis, AssetId, ComponentReferences, InclusionReason, NodeReferences, PropertyReference,
    ScanRules,
};
use crate::progress::TracingProgress;
use crate::query::Session;
use crate::repository::{ContentRepository, ManifestRepository};
use crate::utils::config::{self, Config};
use crate::utils::prefs::{self, InclusionFilter, Preferences};
use crate::utils::table;
use clap::CommandFactory;
use clap_complete::generate;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

/// Run the CLI logic in-process.
///
/// Returns an exit code: 0 on success, 1 when loading or analysis fails,
/// 2 for invalid arguments, configuration or filter expressions.
#[must_use]
pub fn run_cli(cli: Cli) -> i32 {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = env!("CARGO_PKG_NAME");
            let mut out = io::stdout();
            generate(shell, &mut cmd, bin_name, &mut out);
            0
        }
        Commands::Prefs { manifest, included, ignore_scripts, density_level, reset } => {
            let dir = manifest.as_deref().map_or_else(|| PathBuf::from("."), manifest_dir);
            let mut p = if reset {
                prefs::clear_prefs(&dir);
                Preferences::default()
            } else {
                prefs::load_prefs(&dir)
            };
            let before = p;
            apply_overrides(&mut p, included, ignore_scripts);
            if let Some(level) = density_level {
                p.density_level = DensityLevel::new(level);
            }
            if p != before {
                if let Err(e) = prefs::save_prefs(&dir, &p) {
                    eprintln!("Failed to save preferences in {}: {e}", dir.display());
                    return 1;
                }
            }
            println!("inclusion: {}", inclusion_label(p.inclusion));
            println!("ignore_scripts: {}", p.ignore_scripts);
            println!(
                "density_level: {} ({} px per meter)",
                p.density_level.get(),
                p.density_level.standard_dpx()
            );
            0
        }
        Commands::Usages { common, included, ignore_scripts } => {
            let mut ctx = match Context::open(&common) {
                Ok(c) => c,
                Err(code) => return code,
            };
            let mut p = ctx.session.preferences();
            apply_overrides(&mut p, included, ignore_scripts);
            ctx.session.set_preferences(p);
            print_usages(&mut ctx, quiet)
        }
        Commands::References { common } => match Context::open(&common) {
            Ok(mut ctx) => print_references(&mut ctx, quiet),
            Err(code) => code,
        },
        Commands::ReferencedBy { common } => match Context::open(&common) {
            Ok(mut ctx) => print_referenced_by(&mut ctx, quiet),
            Err(code) => code,
        },
        Commands::Density { common, level } => {
            let mut ctx = match Context::open(&common) {
                Ok(c) => c,
                Err(code) => return code,
            };
            if let Some(level) = level {
                let mut p = ctx.session.preferences();
                p.density_level = DensityLevel::new(level);
                ctx.session.set_preferences(p);
            }
            print_density(&mut ctx, quiet)
        }
        Commands::Included { path, common } => {
            let ctx = match Context::open(&common) {
                Ok(c) => c,
                Err(code) => return code,
            };
            let analysis = ctx.session.analysis();
            let Some(node) = analysis.assets.by_path(&path) else {
                eprintln!("Unknown asset '{path}'.");
                return 1;
            };
            let included = analysis.usages.is_included(node.id);
            if matches!(ctx.format, OutputFormat::Json) {
                #[derive(Serialize)]
                struct Row<'a> {
                    path: &'a str,
                    included: bool,
                    reason: InclusionReason,
                }
                return emit_json(&Row { path: &node.path, included, reason: node.inclusion });
            }
            let how = match (included, node.inclusion) {
                (true, InclusionReason::NotIncluded) => "used by an included asset".to_string(),
                (_, reason) => reason_label(reason).to_string(),
            };
            println!(
                "{}: {} ({how})",
                node.path,
                if included { "included" } else { "not included" }
            );
            0
        }
    }
}

/// Everything a view command needs after loading.
struct Context {
    session: Session,
    format: OutputFormat,
    offset: usize,
    limit: Option<usize>,
}

impl Context {
    fn open(common: &CommonArgs) -> Result<Self, i32> {
        let explicit_cfg = match &common.config {
            Some(p) => match config::load_config_at(p) {
                Some(c) => Some(c),
                None => {
                    eprintln!("Failed to load config {}", p.display());
                    return Err(2);
                }
            },
            None => None,
        };
        // A manifest named in a config file is relative to that file.
        let from_config = common.config.as_deref().zip(explicit_cfg.as_ref()).and_then(|(p, c)| {
            c.manifest.as_ref().map(|m| manifest_dir(p).join(m))
        });
        let manifest = common.manifest.clone().or(from_config);
        let Some(manifest) = manifest else {
            eprintln!("Missing manifest. Provide --manifest <path>.");
            return Err(2);
        };
        let dir = manifest_dir(&manifest);
        let cfg: Config =
            explicit_cfg.or_else(|| config::load_config_near(&dir)).unwrap_or_default();

        let rules = match ScanRules::from_config(cfg.analysis.as_ref()) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("{e}");
                return Err(2);
            }
        };
        let repo = match ManifestRepository::load_json(&manifest) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Load manifest failed: {e}");
                return Err(1);
            }
        };
        let describer = AssetDescriber::new(StorageSizes::new(repo.storage_sizes()));
        let analysis =
            match Analysis::build(&repo, &rules, &describer, &mut TracingProgress::default()) {
                Ok(a) => a,
                Err(e) => {
                    eprintln!("Analysis failed: {e}");
                    return Err(1);
                }
            };

        let query_cfg = cfg.query.unwrap_or_default();
        let mut session = Session::new(analysis, prefs::load_prefs(&dir));
        if let Some(filter) = common.filter.as_ref().or(query_cfg.default_filter.as_ref()) {
            session.set_filter_string(filter);
            if let Some(e) = session.filter_error() {
                eprintln!("Invalid filter: {e}");
                return Err(2);
            }
        }
        let format = common
            .format
            .or(match query_cfg.default_format.as_deref() {
                Some("json") => Some(OutputFormat::Json),
                Some("text") => Some(OutputFormat::Text),
                _ => None,
            })
            .unwrap_or(OutputFormat::Text);
        Ok(Self { session, format, offset: common.offset, limit: common.limit })
    }
}

fn manifest_dir(manifest: &Path) -> PathBuf {
    match manifest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn apply_overrides(p: &mut Preferences, included: Option<InclusionArg>, scripts: Option<OnOffArg>) {
    if let Some(inc) = included {
        p.inclusion = match inc {
            InclusionArg::All => InclusionFilter::All,
            InclusionArg::Included => InclusionFilter::IncludedOnly,
            InclusionArg::Excluded => InclusionFilter::ExcludedOnly,
        };
    }
    if let Some(s) = scripts {
        p.ignore_scripts = matches!(s, OnOffArg::On);
    }
}

fn inclusion_label(f: InclusionFilter) -> &'static str {
    match f {
        InclusionFilter::All => "all",
        InclusionFilter::IncludedOnly => "included",
        InclusionFilter::ExcludedOnly => "excluded",
    }
}

fn reason_label(r: InclusionReason) -> &'static str {
    match r {
        InclusionReason::BuildScene => "build scene",
        InclusionReason::AlwaysIncludedLocation => "always-included location",
        InclusionReason::BinaryModule => "binary module",
        InclusionReason::Script => "script",
        InclusionReason::NotIncluded => "not used by any included asset",
    }
}

fn emit_json<T: Serialize + ?Sized>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(s) => {
            println!("{s}");
            0
        }
        Err(e) => {
            eprintln!("JSON encode error: {e}");
            1
        }
    }
}

fn summary(quiet: bool, shown: usize, total: usize, rows: usize) {
    if !quiet {
        println!("{shown} of {total} entries ({rows} rows)");
    }
}

fn path_of(analysis: &Analysis, id: AssetId) -> &str {
    analysis.assets.get(id).map_or("", |n| n.path.as_str())
}

/// Referenced object shown as its asset path, with the object name when it
/// is not the asset's main object. Unresolvable targets render blank.
fn target_label(analysis: &Analysis, prop: &PropertyReference) -> String {
    let Some((id, object)) = analysis.assets.resolve(prop.object) else {
        return String::new();
    };
    let path = path_of(analysis, id);
    let is_main = analysis
        .assets
        .get(id)
        .and_then(|n| n.main.as_ref())
        .is_some_and(|m| m.handle == object.handle);
    if is_main {
        path.to_string()
    } else {
        format!("{path} ({})", object.name)
    }
}

fn flatten(
    nodes: &[NodeReferences],
) -> impl Iterator<Item = (&NodeReferences, &ComponentReferences, &PropertyReference)> {
    nodes.iter().flat_map(|n| {
        n.components.iter().flat_map(move |c| c.properties.iter().map(move |p| (n, c, p)))
    })
}

#[derive(Serialize)]
struct ReferenceJson<'a> {
    node: &'a str,
    component: &'a str,
    component_index: usize,
    property: &'a str,
    target: String,
    descriptor: &'a Descriptor,
}

fn references_json<'a>(analysis: &Analysis, nodes: &'a [NodeReferences]) -> Vec<ReferenceJson<'a>> {
    flatten(nodes)
        .map(|(n, c, p)| ReferenceJson {
            node: &n.hierarchy_path,
            component: &c.type_name,
            component_index: c.component_index,
            property: &p.property_path,
            target: target_label(analysis, p),
            descriptor: &p.descriptor,
        })
        .collect()
}

fn print_usages(ctx: &mut Context, quiet: bool) -> i32 {
    let view = ctx.session.usages().clone();
    let analysis = ctx.session.analysis();
    let page = view.page(ctx.offset, ctx.limit);
    let usages = &analysis.usages;

    let sub_label = |id: AssetId, k: usize| -> String {
        let (Some(node), Some(sub)) = (analysis.assets.get(id), usages.sub_assets(id).get(k)) else {
            return String::new();
        };
        let Some(obj) = node.object(sub.slot) else {
            return String::new();
        };
        format!("{} ({}) {}", obj.name, obj.object_type, sub.descriptor.text).trim_end().to_string()
    };

    if matches!(ctx.format, OutputFormat::Json) {
        #[derive(Serialize)]
        struct SubJson<'a> {
            name: &'a str,
            r#type: String,
            descriptor: &'a Descriptor,
        }
        #[derive(Serialize)]
        struct Row<'a> {
            path: &'a str,
            included: bool,
            reason: InclusionReason,
            sub_assets: Vec<SubJson<'a>>,
            used_by: Vec<&'a str>,
        }
        let out: Vec<Row> = page
            .iter()
            .filter_map(|e| {
                let node = analysis.assets.get(e.asset)?;
                Some(Row {
                    path: &node.path,
                    included: e.included,
                    reason: node.inclusion,
                    sub_assets: usages
                        .sub_assets(e.asset)
                        .iter()
                        .filter_map(|s| {
                            node.object(s.slot).map(|o| SubJson {
                                name: &o.name,
                                r#type: o.object_type.to_string(),
                                descriptor: &s.descriptor,
                            })
                        })
                        .collect(),
                    used_by: usages.usages(e.asset).iter().map(|u| path_of(analysis, *u)).collect(),
                })
            })
            .collect();
        return emit_json(&out);
    }

    let mut rows = Vec::new();
    for e in page {
        let users = usages.usages(e.asset);
        let n = users.len().max(usages.sub_assets(e.asset).len());
        for k in 0..n {
            let first = k == 0;
            rows.push(vec![
                if first { path_of(analysis, e.asset).to_string() } else { String::new() },
                match (first, e.included) {
                    (false, _) => String::new(),
                    (true, true) => "yes".to_string(),
                    (true, false) => "no".to_string(),
                },
                sub_label(e.asset, k),
                users.get(k).map(|u| path_of(analysis, *u).to_string()).unwrap_or_default(),
            ]);
        }
    }
    println!("{}", table::render(&["Asset", "Included", "Sub-assets", "Used by"], &rows));
    summary(quiet, page.len(), view.len(), view.layout.total_rows());
    0
}

fn print_references(ctx: &mut Context, quiet: bool) -> i32 {
    let view = ctx.session.prefab_references().clone();
    let analysis = ctx.session.analysis();
    let page = view.page(ctx.offset, ctx.limit);
    let records: Vec<_> = page.iter().filter_map(|id| analysis.references.forward(*id)).collect();

    if matches!(ctx.format, OutputFormat::Json) {
        #[derive(Serialize)]
        struct Row<'a> {
            root: &'a str,
            references: Vec<ReferenceJson<'a>>,
        }
        let out: Vec<Row> = records
            .iter()
            .map(|r| Row { root: path_of(analysis, r.root), references: references_json(analysis, &r.nodes) })
            .collect();
        return emit_json(&out);
    }

    let mut rows = Vec::new();
    for record in records {
        let root = path_of(analysis, record.root);
        let before = rows.len();
        for (i, (n, c, p)) in flatten(&record.nodes).enumerate() {
            rows.push(vec![
                if i == 0 { root.to_string() } else { String::new() },
                n.hierarchy_path.to_string(),
                c.type_name.clone(),
                p.property_path.clone(),
                target_label(analysis, p),
                p.descriptor.text.clone(),
            ]);
        }
        if rows.len() == before {
            rows.push(vec![root.to_string()]);
        }
    }
    println!(
        "{}",
        table::render(&["Prefab", "Node", "Component", "Property", "Target", "Info"], &rows)
    );
    summary(quiet, page.len(), view.len(), view.layout.total_rows());
    0
}

fn print_referenced_by(ctx: &mut Context, quiet: bool) -> i32 {
    let view = ctx.session.referenced_by().clone();
    let analysis = ctx.session.analysis();
    let page = view.page(ctx.offset, ctx.limit);
    let records: Vec<_> = page.iter().filter_map(|id| analysis.references.reverse(*id)).collect();

    if matches!(ctx.format, OutputFormat::Json) {
        #[derive(Serialize)]
        struct Group<'a> {
            root: &'a str,
            references: Vec<ReferenceJson<'a>>,
        }
        #[derive(Serialize)]
        struct Row<'a> {
            asset: &'a str,
            referenced_by: Vec<Group<'a>>,
        }
        let out: Vec<Row> = records
            .iter()
            .map(|r| Row {
                asset: path_of(analysis, r.asset),
                referenced_by: r
                    .referenced_by
                    .iter()
                    .map(|g| Group {
                        root: path_of(analysis, g.root),
                        references: references_json(analysis, &g.nodes),
                    })
                    .collect(),
            })
            .collect();
        return emit_json(&out);
    }

    let mut rows = Vec::new();
    for record in records {
        let mut first_row = true;
        for group in &record.referenced_by {
            let root = path_of(analysis, group.root);
            for (i, (n, c, p)) in flatten(&group.nodes).enumerate() {
                rows.push(vec![
                    if first_row { path_of(analysis, record.asset).to_string() } else { String::new() },
                    if i == 0 { root.to_string() } else { String::new() },
                    n.hierarchy_path.to_string(),
                    c.type_name.clone(),
                    p.property_path.clone(),
                ]);
                first_row = false;
            }
        }
    }
    println!(
        "{}",
        table::render(&["Asset", "Referenced by", "Node", "Component", "Property"], &rows)
    );
    summary(quiet, page.len(), view.len(), view.layout.total_rows());
    0
}

fn grade_label(grade: DensityGrade, severity: f32) -> String {
    match grade {
        DensityGrade::Ok => "ok".to_string(),
        DensityGrade::High => format!("high {severity:.2}"),
        DensityGrade::Excessive => format!("excessive {severity:.2}"),
    }
}

fn material_rows(
    analysis: &Analysis,
    md: &MaterialDensity,
    level: DensityLevel,
    lead: [String; 2],
    rows: &mut Vec<Vec<String>>,
) {
    let material = md.material.map(|m| path_of(analysis, m).to_string()).unwrap_or_default();
    let uv = md.uv.map(|u| u.info()).unwrap_or_default();
    if md.textures.is_empty() {
        rows.push(vec![lead[0].clone(), lead[1].clone(), material, uv]);
        return;
    }
    for (i, td) in md.textures.iter().enumerate() {
        let (lead0, lead1, mat, uvs) = if i == 0 {
            (lead[0].clone(), lead[1].clone(), material.clone(), uv.clone())
        } else {
            (String::new(), String::new(), String::new(), String::new())
        };
        let size = td.size.map_or_else(|| "?x?".to_string(), |(w, h)| format!("{w}x{h}"));
        rows.push(vec![
            lead0,
            lead1,
            mat,
            uvs,
            path_of(analysis, td.texture).to_string(),
            size,
            td.dpx.map(|d| d.info()).unwrap_or_default(),
            td.rating(level).map(|r| grade_label(r.grade, r.severity)).unwrap_or_default(),
        ]);
    }
}

fn print_density(ctx: &mut Context, quiet: bool) -> i32 {
    let view = match ctx.session.density(&mut TracingProgress::default()) {
        Ok(v) => v.clone(),
        Err(e) => {
            eprintln!("Density assessment failed: {e}");
            return 1;
        }
    };
    let level = ctx.session.preferences().density_level;
    let analysis = ctx.session.analysis();
    let reports = ctx.session.density_reports();
    let page: Vec<&ContainerDensity> =
        view.page(ctx.offset, ctx.limit).iter().filter_map(|&i| reports.get(i)).collect();

    if matches!(ctx.format, OutputFormat::Json) {
        #[derive(Serialize)]
        struct TextureJson<'a> {
            texture: &'a str,
            size: Option<(u32, u32)>,
            mip_count: u32,
            dpx: Option<crate::density::UvStats>,
            rating: Option<crate::density::DensityRating>,
        }
        #[derive(Serialize)]
        struct MaterialJson<'a> {
            submesh: usize,
            material: Option<&'a str>,
            uv: Option<crate::density::UvStats>,
            textures: Vec<TextureJson<'a>>,
        }
        #[derive(Serialize)]
        struct RendererJson<'a> {
            node: &'a str,
            component: &'a str,
            mesh: &'a str,
            materials: Vec<MaterialJson<'a>>,
        }
        #[derive(Serialize)]
        struct Row<'a> {
            root: &'a str,
            standard_dpx: f32,
            renderers: Vec<RendererJson<'a>>,
        }
        let out: Vec<Row> = page
            .iter()
            .map(|c| Row {
                root: path_of(analysis, c.root),
                standard_dpx: level.standard_dpx(),
                renderers: c
                    .renderers
                    .iter()
                    .map(|r| RendererJson {
                        node: &r.hierarchy_path,
                        component: &r.type_name,
                        mesh: &r.mesh_name,
                        materials: r
                            .materials
                            .iter()
                            .map(|m| MaterialJson {
                                submesh: m.submesh,
                                material: m.material.map(|id| path_of(analysis, id)),
                                uv: m.uv,
                                textures: m
                                    .textures
                                    .iter()
                                    .map(|t| TextureJson {
                                        texture: path_of(analysis, t.texture),
                                        size: t.size,
                                        mip_count: t.mip_count,
                                        dpx: t.dpx,
                                        rating: t.rating(level),
                                    })
                                    .collect(),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();
        return emit_json(&out);
    }

    let mut rows = Vec::new();
    for c in page.iter().copied() {
        let mut first = true;
        for r in &c.renderers {
            let mut first_material = true;
            for md in &r.materials {
                let lead = [
                    if first { path_of(analysis, c.root).to_string() } else { String::new() },
                    if first_material { r.hierarchy_path.to_string() } else { String::new() },
                ];
                material_rows(analysis, md, level, lead, &mut rows);
                first = false;
                first_material = false;
            }
        }
    }
    println!(
        "{}",
        table::render(
            &[
                "Prefab",
                "Renderer",
                "Material",
                "UV per meter (min max avg)",
                "Texture",
                "Size",
                "Px per meter (min max avg)",
                "Grade",
            ],
            &rows
        )
    );
    if !quiet {
        println!("Density level {} ({} px per meter)", level.get(), level.standard_dpx());
    }
    summary(quiet, page.len(), view.len(), view.layout.total_rows());
    0
}
