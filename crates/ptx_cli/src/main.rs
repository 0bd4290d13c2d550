use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ptx_core::scene::NativeFileType;
use ptx_core::{
    apps, AssetDetail, AssetInfo, FrameRange, HostScene, MemoryScene, NodeId, PipelineConfig, ProcessRegistry,
    Publish, PublishArgs, PublishOptions, Session, ShaderInfo,
};
use ptx_factory::ProcessStatus;
use ptx_usd::{compose_asset, parse_looks_info, ComposeRequest, ShaderRegistry};

/// Asset publishing and USD look composition
#[derive(Parser, Debug)]
#[command(name = "ptx")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compose the payload, asset and look layers of an asset
    Compose {
        /// Looks-info JSON written by a look publish
        looks_info: PathBuf,
        /// Alembic cache referenced by the payload layer
        alembic: String,
        /// Directory receiving the layers
        usd_base_dir: PathBuf,
        asset_type: String,
        asset_name: String,
        /// Prim of the alembic to reference
        base_prim_path: String,

        /// Shader table to use instead of the built-in one
        #[arg(long)]
        shaders: Option<PathBuf>,
    },

    /// List the process table
    Processes {
        /// Process table to list instead of the configured one
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run a publish against a scene snapshot and save the scene
    Publish {
        /// Application (MAYA, BLENDER)
        #[arg(long)]
        app: String,

        /// Publish type (MDLA, MDLP, PRXC, WRKS, LUKP)
        #[arg(long = "type")]
        publish_type: String,

        /// Scene snapshot to publish from
        #[arg(long)]
        scene: PathBuf,

        /// Asset name
        #[arg(long)]
        name: String,

        #[arg(long)]
        asset_type: String,

        #[arg(long)]
        version: String,

        /// Asset process (MDL, LUK, ...), the first three letters of the publish type by default
        #[arg(long)]
        asset_process: Option<String>,

        /// Process table entry (abc, usd, mae)
        #[arg(long, default_value = "abc")]
        process: String,

        /// Artifact path, derived from the scene when omitted
        #[arg(long)]
        export_path: Option<String>,

        /// Also export an alembic when publishing another format
        #[arg(long)]
        fallback_alembic: bool,

        /// Current lock owner of the asset
        #[arg(long)]
        lock_owner: Option<String>,

        /// First and last frame
        #[arg(long, num_args = 2, value_names = ["START", "END"])]
        frame_range: Option<Vec<i32>>,

        /// Native file type for work scene exports (mayaAscii, mayaBinary)
        #[arg(long, default_value = "mayaAscii")]
        file_type: String,

        /// Looks-info document holding the shaders of a look publish
        #[arg(long)]
        looks_info: Option<PathBuf>,

        /// Node a proxy replaces (repeatable)
        #[arg(long = "orig-node", value_name = "NODE")]
        orig_nodes: Vec<String>,

        /// Node to export on its own in a work scene publish (repeatable)
        #[arg(long = "select", value_name = "NODE")]
        nodes_to_select: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Compose {
            looks_info,
            alembic,
            usd_base_dir,
            asset_type,
            asset_name,
            base_prim_path,
            shaders,
        } => {
            let request = ComposeRequest {
                looks_info_path: looks_info,
                alembic_path: alembic,
                usd_base_location: usd_base_dir,
                asset_type,
                asset_name,
                base_prim_path,
            };
            cmd_compose(&request, shaders.as_deref())
        }
        Commands::Processes { config } => cmd_processes(config.as_deref()),
        Commands::Publish {
            app,
            publish_type,
            scene,
            name,
            asset_type,
            version,
            asset_process,
            process,
            export_path,
            fallback_alembic,
            lock_owner,
            frame_range,
            file_type,
            looks_info,
            orig_nodes,
            nodes_to_select,
        } => {
            let native_file_type = NativeFileType::from_name(&file_type)
                .with_context(|| format!("Unknown native file type '{}'", file_type))?;
            let frame_range = match frame_range.as_deref() {
                Some([start, end]) => FrameRange::new(*start, *end),
                Some(_) => bail!("--frame-range takes a start and an end frame"),
                None => FrameRange::default(),
            };

            let asset_process = asset_process.unwrap_or_else(|| default_asset_process(&publish_type));
            let mut asset = AssetInfo::new(name, asset_type, asset_process, version);
            asset.lock_owner = lock_owner;
            if let Some(path) = &looks_info {
                asset.detail = look_detail(path)?;
            }

            let args = PublishArgs::new(asset).with_options(PublishOptions {
                export_path: export_path.unwrap_or_default(),
                use_process: process,
                frame_range,
                fallback_alembic,
                native_file_type,
                ..PublishOptions::default()
            });

            let nodes = NodeNames {
                orig: orig_nodes,
                select: nodes_to_select,
            };
            let status = cmd_publish(&app, &publish_type, &scene, args, &nodes)?;
            if status == ProcessStatus::Failed {
                bail!("{} {} publish failed", app, publish_type);
            }
            Ok(())
        }
    }
}

fn cmd_compose(request: &ComposeRequest, shaders: Option<&Path>) -> Result<()> {
    let shaders = match shaders {
        Some(path) => ShaderRegistry::load(path)
            .with_context(|| format!("Failed to load shader table {}", path.display()))?,
        None => ShaderRegistry::builtin().context("Failed to load the built-in shader table")?,
    };

    let composed = compose_asset(request, &shaders).context("Composition failed")?;

    println!("payload: {}", composed.payload_path.display());
    println!("asset:   {}", composed.asset_path.display());
    println!("looks:   {}", composed.looks_path.display());
    for material in &composed.materials {
        println!("  {}", material);
    }
    Ok(())
}

fn cmd_processes(config: Option<&Path>) -> Result<()> {
    let processes = match config {
        Some(path) => ProcessRegistry::load(path)
            .with_context(|| format!("Failed to load process table {}", path.display()))?,
        None => PipelineConfig::from_env()
            .process_registry()
            .context("Failed to load the process table")?,
    };

    let registry = processes.registry();
    println!("{}", registry.source());
    for category in registry.categories() {
        println!("{}", category);
        for (name, locator) in registry.entries(category)? {
            println!("  {:<6} {}", name, locator);
        }
    }
    Ok(())
}

/// Scene nodes named on the command line, resolved once the scene is open.
#[derive(Debug, Default)]
struct NodeNames {
    orig: Vec<String>,
    select: Vec<String>,
}

fn resolve_nodes(scene: &MemoryScene, names: &[String]) -> Result<Vec<NodeId>> {
    names
        .iter()
        .map(|name| {
            scene
                .find_node(name)
                .with_context(|| format!("No node named '{}' in the scene", name))
        })
        .collect()
}

/// `MDLP` publishes the `MDL` process of an asset.
fn default_asset_process(publish_type: &str) -> String {
    publish_type.chars().take(3).collect()
}

fn cmd_publish(
    app: &str,
    publish_type: &str,
    scene_path: &Path,
    mut args: PublishArgs,
    nodes: &NodeNames,
) -> Result<ProcessStatus> {
    let config = PipelineConfig::from_env();
    let processes = config
        .process_registry()
        .context("Failed to load the process table")?;

    let mut scene = MemoryScene::open(scene_path)
        .with_context(|| format!("Failed to open scene {}", scene_path.display()))?;

    args.options.orig_nodes = resolve_nodes(&scene, &nodes.orig)?;
    if !nodes.select.is_empty() {
        args.options.nodes_to_select = Some(resolve_nodes(&scene, &nodes.select)?);
    }

    let mut factory = apps::default_factory();
    let publish = factory.create(app, publish_type, args)?;

    let status = {
        let mut session = Session::new(&mut scene, &processes, config.user.clone());
        publish.borrow_mut().publish(&mut session)?
    };

    scene
        .save()
        .with_context(|| format!("Failed to save scene {}", scene_path.display()))?;

    let finished = publish.borrow();
    let state = finished.state();
    for diagnostic in state.report.diagnostics() {
        println!("[{}] {}", diagnostic.severity, diagnostic.message);
    }
    if let Some(out_file) = &state.out_file {
        println!("output: {}", out_file.display());
    }
    if !state.publish_info.is_empty() {
        println!("{}", serde_json::to_string_pretty(&state.publish_info)?);
    }
    println!("{}/{}: {}", app, publish_type, status);

    Ok(status)
}

/// Shaders of a look publish, read from a looks-info document.
fn look_detail(path: &Path) -> Result<AssetDetail> {
    let materials =
        parse_looks_info(path).with_context(|| format!("Failed to read looks info {}", path.display()))?;
    Ok(AssetDetail::Look {
        shaders: materials.into_iter().map(ShaderInfo::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptx_core::publish::{CREATE_PROXY, LOOK_PUBLISH, MODEL_PASSIVE};
    use ptx_core::NodeType;
    use tempfile::tempdir;

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["ptx", "-vv", "processes"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Processes { config: None }));
    }

    #[test]
    fn test_cli_parse_publish() {
        let cli = Cli::try_parse_from([
            "ptx",
            "publish",
            "--app",
            "MAYA",
            "--type",
            MODEL_PASSIVE,
            "--scene",
            "alien.json",
            "--name",
            "Alien",
            "--asset-type",
            "Character",
            "--version",
            "v003",
            "--process",
            "usd",
            "--fallback-alembic",
            "--frame-range",
            "1001",
            "1010",
        ])
        .unwrap();

        match cli.command {
            Commands::Publish {
                publish_type,
                process,
                fallback_alembic,
                frame_range,
                export_path,
                ..
            } => {
                assert_eq!(publish_type, MODEL_PASSIVE);
                assert_eq!(process, "usd");
                assert!(fallback_alembic);
                assert_eq!(frame_range, Some(vec![1001, 1010]));
                assert_eq!(export_path, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_compose() {
        let cli = Cli::try_parse_from([
            "ptx",
            "compose",
            "looks.json",
            "./Alien.abc",
            "usd",
            "Character",
            "Alien",
            "/render_GRP",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Compose { shaders: None, .. }));
    }

    #[test]
    fn test_publish_saves_scene() {
        let dir = tempdir().unwrap();
        let scene_path = dir.path().join("alien_mdl_v003.json");

        let mut scene = MemoryScene::new();
        let root = scene.create_node(NodeType::Transform, "Alien", None).unwrap();
        scene.create_node(NodeType::Mesh, "bodyShape", Some(root)).unwrap();
        scene.save_as(&scene_path).unwrap();

        let args = PublishArgs::new(AssetInfo::new("Alien", "Character", "MDL", "v003"));
        let status = cmd_publish(apps::MAYA, MODEL_PASSIVE, &scene_path, args, &NodeNames::default()).unwrap();
        assert_eq!(status, ProcessStatus::Warning);

        let reopened = MemoryScene::open(&scene_path).unwrap();
        assert!(reopened.find_node("alien_mdl_v003GpuCacheShape").is_some());
        assert!(dir.path().join("alien_mdl_v003.abc").exists());
    }

    #[test]
    fn test_cli_parse_node_flags() {
        let cli = Cli::try_parse_from([
            "ptx", "publish", "--app", "MAYA", "--type", "PRXC", "--scene", "alien.json", "--name", "Alien",
            "--asset-type", "Character", "--version", "v001", "--orig-node", "Alien", "--orig-node", "|Props",
        ])
        .unwrap();

        match cli.command {
            Commands::Publish {
                orig_nodes,
                nodes_to_select,
                asset_process,
                ..
            } => {
                assert_eq!(orig_nodes, vec!["Alien".to_string(), "|Props".to_string()]);
                assert!(nodes_to_select.is_empty());
                assert_eq!(asset_process, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(default_asset_process("PRXC"), "PRX");
        assert_eq!(default_asset_process(MODEL_PASSIVE), "MDL");
    }

    #[test]
    fn test_publish_resolves_named_nodes() {
        let dir = tempdir().unwrap();
        let scene_path = dir.path().join("alien_mdl_v001.json");

        let mut scene = MemoryScene::new();
        let root = scene.create_node(NodeType::Transform, "Alien", None).unwrap();
        scene.create_node(NodeType::Mesh, "bodyShape", Some(root)).unwrap();
        scene.save_as(&scene_path).unwrap();

        let export = dir.path().join("Alien.abc");
        let args = PublishArgs::new(AssetInfo::new("Alien", "Character", "PRX", "v001")).with_options(PublishOptions {
            export_path: export.to_string_lossy().into_owned(),
            ..PublishOptions::default()
        });
        let nodes = NodeNames {
            orig: vec!["|Alien".to_string()],
            select: Vec::new(),
        };
        let status = cmd_publish(apps::MAYA, CREATE_PROXY, &scene_path, args, &nodes).unwrap();
        assert_eq!(status, ProcessStatus::Succeeded);

        let reopened = MemoryScene::open(&scene_path).unwrap();
        assert_eq!(reopened.find_node("bodyShape"), None);
        assert!(reopened.find_node("AlienGpuCacheShape").is_some());

        let args = PublishArgs::new(AssetInfo::new("Alien", "Character", "PRX", "v001"));
        let nodes = NodeNames {
            orig: vec!["Ship".to_string()],
            select: Vec::new(),
        };
        assert!(cmd_publish(apps::MAYA, CREATE_PROXY, &scene_path, args, &nodes).is_err());
    }

    #[test]
    fn test_unknown_publish_type_is_an_error() {
        let dir = tempdir().unwrap();
        let scene_path = dir.path().join("scene.json");
        MemoryScene::new().save_as(&scene_path).unwrap();

        let args = PublishArgs::new(AssetInfo::new("Alien", "Character", "LUK", "v001"));
        assert!(cmd_publish(apps::BLENDER, LOOK_PUBLISH, &scene_path, args, &NodeNames::default()).is_err());
    }
}
