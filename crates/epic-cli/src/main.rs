use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use epic_lib::{
    config::{read_config, ViewConfig},
    control::TreeController,
    criteria::{MissingPolicy, SplitValue},
    io::{self as epic_io, csv::write_selected_csv, LoadOptions},
    synth::{synthesize, SynthSpec},
    tree::EpochTree,
};
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "epic",
    version,
    about = "Epoch tree tools: group, inspect and extract recorded epochs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum MissingArg {
    Sentinel,
    Fail,
}

impl From<MissingArg> for MissingPolicy {
    fn from(arg: MissingArg) -> Self {
        match arg {
            MissingArg::Sentinel => MissingPolicy::Sentinel,
            MissingArg::Fail => MissingPolicy::Fail,
        }
    }
}

#[derive(Args)]
struct TreeArgs {
    /// Epoch JSON: a flat record array or a nested experiment export
    #[arg(long)]
    input: PathBuf,
    /// View configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Split criteria in order, overriding the config (comma separated key paths)
    #[arg(long, value_delimiter = ',')]
    split_by: Vec<String>,
    #[arg(long, value_enum)]
    missing: Option<MissingArg>,
    /// Rewrite shorthand cell types (OnP, RB, ...) to descriptive names
    #[arg(long)]
    expand_cell_types: bool,
    /// Split values from the root to the node to act on; repeat per level
    #[arg(long = "path")]
    path: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a seeded synthetic epoch set as a flat JSON array
    Synth {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 12)]
        repeats: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long)]
        shuffle: bool,
    },
    /// Print the subtree below a node as an indented outline
    Outline {
        #[command(flatten)]
        tree: TreeArgs,
        #[arg(long, default_value_t = usize::MAX)]
        depth: usize,
    },
    /// Print a node's metadata as JSON
    Info {
        #[command(flatten)]
        tree: TreeArgs,
    },
    /// List the leaves below a node, one JSON object per line
    Leaves {
        #[command(flatten)]
        tree: TreeArgs,
    },
    /// Write the selected epochs' response rows below a node to CSV
    Extract {
        #[command(flatten)]
        tree: TreeArgs,
        #[arg(long)]
        stream: Option<String>,
        /// Epoch indices to deselect before extracting (comma separated)
        #[arg(long, value_delimiter = ',')]
        deselect: Vec<usize>,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Serialize)]
struct LeafSummary {
    path: Vec<String>,
    epoch_count: usize,
    selected_count: usize,
}

#[derive(Serialize)]
struct ExtractSummary {
    rows: usize,
    fs: Option<f64>,
    stream: String,
    out: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Synth {
            out,
            repeats,
            seed,
            shuffle,
        } => cmd_synth(&out, repeats, seed, shuffle)?,
        Commands::Outline { tree, depth } => cmd_outline(&tree, depth)?,
        Commands::Info { tree } => cmd_info(&tree)?,
        Commands::Leaves { tree } => cmd_leaves(&tree)?,
        Commands::Extract {
            tree,
            stream,
            deselect,
            out,
        } => cmd_extract(&tree, stream, &deselect, &out)?,
    }
    Ok(())
}

fn load_config(args: &TreeArgs) -> Result<ViewConfig> {
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => ViewConfig::default(),
    };
    if !args.split_by.is_empty() {
        config.split_by = args.split_by.clone();
    }
    if let Some(missing) = args.missing {
        config.missing = missing.into();
    }
    Ok(config)
}

fn open_tree(args: &TreeArgs) -> Result<(TreeController, ViewConfig)> {
    let config = load_config(args)?;
    let options = LoadOptions {
        expand_cell_types: args.expand_cell_types,
        prefix_rgc: true,
    };
    let store = epic_io::read_epochs(&args.input, &options)?;
    let tree = EpochTree::build(store, &config.builder()).context("building epoch tree")?;
    let mut controller = TreeController::new(
        tree,
        config.trunk_label.clone(),
        config.pool_size,
        config.expansion(),
    );
    if !args.path.is_empty() {
        let values: Vec<SplitValue> = args.path.iter().map(|v| SplitValue::parse(v)).collect();
        controller
            .go_path(&values)
            .ok_or_else(|| anyhow!("no node at path {}", args.path.join(" / ")))?;
    }
    Ok((controller, config))
}

fn cmd_synth(out: &Path, repeats: usize, seed: u64, shuffle: bool) -> Result<()> {
    let spec = SynthSpec {
        repeats,
        seed,
        shuffle,
        ..SynthSpec::default()
    };
    let store = synthesize(&spec);
    epic_io::write_records(out, &store)?;
    info!("wrote {} epochs to {}", store.len(), out.display());
    Ok(())
}

fn cmd_outline(args: &TreeArgs, depth: usize) -> Result<()> {
    let (controller, _) = open_tree(args)?;
    print!("{}", controller.print_subtree(depth));
    Ok(())
}

fn cmd_info(args: &TreeArgs) -> Result<()> {
    let (controller, _) = open_tree(args)?;
    println!("{}", serde_json::to_string(&controller.metadata())?);
    Ok(())
}

fn cmd_leaves(args: &TreeArgs) -> Result<()> {
    let (controller, _) = open_tree(args)?;
    for leaf in controller.current().leaf_nodes() {
        let summary = LeafSummary {
            path: leaf.path().iter().map(|v| v.to_string()).collect(),
            epoch_count: leaf.epoch_count(),
            selected_count: leaf.selected_count(),
        };
        println!("{}", serde_json::to_string(&summary)?);
    }
    Ok(())
}

fn cmd_extract(args: &TreeArgs, stream: Option<String>, deselect: &[usize], out: &Path) -> Result<()> {
    let (mut controller, config) = open_tree(args)?;
    for index in deselect {
        let epoch = controller
            .tree()
            .store()
            .id_at(*index)
            .ok_or_else(|| anyhow!("no epoch at index {}", index))?;
        controller.set_epoch_selected(epoch, false)?;
    }
    let stream = stream.unwrap_or(config.stream);
    let data = controller.extract_selected(&stream)?;
    write_selected_csv(out, &data)?;
    let summary = ExtractSummary {
        rows: data.rows(),
        fs: data.fs,
        stream,
        out: out.to_path_buf(),
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
