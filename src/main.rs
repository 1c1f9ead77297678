//! `coverboard`: edit cover boards from the command line.
//!
//! Each invocation loads one named save from the data directory, applies a
//! single command through the board engine, and writes the save back when
//! the board changed. Search commands fan out to the public catalogues in
//! `providers`.

mod config;
mod output;
mod providers;
mod storage;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use board::connect::ConnectOutcome;
use board::consts::DEFAULT_SAVE_ID;
use board::csv::{self, CsvError};
use board::doc::{
    ArrowPatch, ConfigPatch, Cover, CoverPatch, Dir, Group, GroupPatch, LabelPatch, Media, RatingPatch, Scale,
    SearchLabelPatch, snap_stars,
};
use board::engine::BoardEngine;
use board::geometry::Point;
use board::schema::{self, ImportError};
use board::search::{self, SearchError};
use board::storage::{Saves, StorageError};
use board::validation::ValidationError;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::storage::FileStorage;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{}", .0.user_message())]
    Import(#[from] ImportError),
    #[error("{}", .0.primary_message())]
    Invalid(#[from] ValidationError),
    #[error("csv: {0}")]
    Csv(#[from] CsvError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error("http client build failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("export encode failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("cannot read {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("cannot write {path}: {source}")]
    Write { path: String, source: std::io::Error },
    #[error("no cover, group, or arrow with id {0}")]
    NotFound(Uuid),
    #[error("nothing to change; pass at least one option")]
    EmptyPatch,
    #[error("{0} cannot connect to itself")]
    SelfConnect(Uuid),
}

impl CliError {
    /// Every validation issue, for errors that carry more than one.
    fn details(&self) -> Vec<String> {
        let issues = match self {
            Self::Invalid(e) | Self::Import(ImportError::Invalid(e)) => e.issues(),
            _ => return Vec::new(),
        };
        issues.iter().map(ToString::to_string).collect()
    }
}

#[derive(Parser, Debug)]
#[command(name = "coverboard", about = "Arrange media covers into groups and connect them with arrows")]
struct Cli {
    /// Directory holding one JSON file per save.
    #[arg(long, env = "COVERBOARD_DATA_DIR", default_value = ".coverboard")]
    data_dir: PathBuf,

    /// Save to load and write back.
    #[arg(long, env = "COVERBOARD_SAVE", default_value = DEFAULT_SAVE_ID)]
    save: String,

    /// Raise log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Saves(SavesCommand),
    /// List everything on the board.
    Show,
    /// Write the board as a JSON record.
    Export {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Replace the board with a JSON record or bare state.
    Import {
        file: PathBuf,
    },
    /// Check a JSON file without touching the save.
    Validate {
        file: PathBuf,
    },
    /// Clear the board.
    Reset,
    Cover(CoverCommand),
    Group(GroupCommand),
    /// Connect two covers or groups, or re-side an existing arrow between them.
    Connect {
        origin: Uuid,
        origin_dir: Dir,
        target: Uuid,
        target_dir: Dir,
    },
    Arrow(ArrowCommand),
    Config(ConfigCommand),
    Csv(CsvCommand),
}

#[derive(Args, Debug)]
struct SavesCommand {
    #[command(subcommand)]
    command: SavesSubcommand,
}

#[derive(Subcommand, Debug)]
enum SavesSubcommand {
    List,
    Delete { id: String },
}

#[derive(Args, Debug)]
struct CoverCommand {
    #[command(subcommand)]
    command: CoverSubcommand,
}

#[derive(Subcommand, Debug)]
enum CoverSubcommand {
    Add {
        title: String,
        #[arg(long, default_value = "")]
        subtitle: String,
        #[arg(long, default_value = "")]
        link: String,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        x: f64,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        y: f64,
        #[arg(long)]
        stars: Option<f64>,
    },
    Update {
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        subtitle: Option<String>,
        #[arg(long)]
        link: Option<String>,
        #[arg(long)]
        stars: Option<f64>,
        #[arg(long)]
        title_dir: Option<Dir>,
        #[arg(long)]
        subtitle_dir: Option<Dir>,
        #[arg(long)]
        star_dir: Option<Dir>,
    },
    Move {
        id: Uuid,
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
    },
    Remove {
        id: Uuid,
    },
    /// Draw this cover above the others.
    Front {
        id: Uuid,
    },
}

#[derive(Args, Debug)]
struct GroupCommand {
    #[command(subcommand)]
    command: GroupSubcommand,
}

#[derive(Subcommand, Debug)]
enum GroupSubcommand {
    Add {
        title: String,
        #[arg(long, default_value = "")]
        subtitle: String,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        x: f64,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        y: f64,
        #[arg(long, default_value_t = 2.0)]
        scale_x: f64,
        #[arg(long, default_value_t = 2.0)]
        scale_y: f64,
    },
    Update {
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        subtitle: Option<String>,
        #[arg(long)]
        title_dir: Option<Dir>,
        #[arg(long)]
        subtitle_dir: Option<Dir>,
    },
    /// Move a group with everything inside it.
    Move {
        id: Uuid,
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
    },
    Scale {
        id: Uuid,
        x: f64,
        y: f64,
    },
    /// Delete a group and everything inside it.
    Remove {
        id: Uuid,
    },
    Front {
        id: Uuid,
    },
}

#[derive(Args, Debug)]
struct ArrowCommand {
    #[command(subcommand)]
    command: ArrowSubcommand,
}

#[derive(Subcommand, Debug)]
enum ArrowSubcommand {
    Update {
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        title_dir: Option<Dir>,
        #[arg(long)]
        origin_dir: Option<Dir>,
        #[arg(long)]
        target_dir: Option<Dir>,
    },
    Remove {
        id: Uuid,
    },
}

#[derive(Args, Debug)]
struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand, Debug)]
enum ConfigSubcommand {
    Set(ConfigArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[arg(long)]
    title: Option<String>,
    /// Cover size multiplier.
    #[arg(long)]
    size: Option<f64>,
    #[arg(long)]
    media: Option<Media>,
    #[arg(long)]
    color: Option<String>,
    #[arg(long)]
    background: Option<String>,
    #[arg(long)]
    show_main_title: Option<bool>,
    #[arg(long)]
    show_title: Option<bool>,
    #[arg(long)]
    show_subtitle: Option<bool>,
    #[arg(long)]
    show_stars: Option<bool>,
    #[arg(long)]
    show_arrows: Option<bool>,
    #[arg(long)]
    title_dir: Option<Dir>,
    #[arg(long)]
    subtitle_dir: Option<Dir>,
    #[arg(long)]
    star_dir: Option<Dir>,
    #[arg(long)]
    group_title_dir: Option<Dir>,
    #[arg(long)]
    group_subtitle_dir: Option<Dir>,
    #[arg(long)]
    arrow_dir: Option<Dir>,
}

impl From<ConfigArgs> for ConfigPatch {
    fn from(args: ConfigArgs) -> Self {
        Self {
            title: args.title,
            size: args.size,
            media: args.media,
            color: args.color,
            background: args.background,
            show_main_title: args.show_main_title,
            show_title: args.show_title,
            show_subtitle: args.show_subtitle,
            show_stars: args.show_stars,
            show_arrows: args.show_arrows,
            title_dir: args.title_dir,
            subtitle_dir: args.subtitle_dir,
            star_dir: args.star_dir,
            group_title_dir: args.group_title_dir,
            group_subtitle_dir: args.group_subtitle_dir,
            arrow_dir: args.arrow_dir,
        }
    }
}

#[derive(Args, Debug)]
struct CsvCommand {
    #[command(subcommand)]
    command: CsvSubcommand,
}

#[derive(Subcommand, Debug)]
enum CsvSubcommand {
    /// Write every cover as a `title,subtitle` row.
    Export {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Look up each `title,subtitle` row and add the covers found.
    Search {
        file: PathBuf,
        /// Catalogue to search; defaults to the board's media.
        #[arg(long)]
        media: Option<Media>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(e) = dotenvy::dotenv() {
        debug!(error = %e, "no .env loaded");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            for line in e.details().iter().skip(1) {
                eprintln!("  {line}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    if let Command::Validate { file } = &cli.command {
        return run_validate(file);
    }
    let mut saves = Saves::new(FileStorage::open(&cli.data_dir)?);
    let save = cli.save.as_str();
    let command = match cli.command {
        Command::Saves(saves_cmd) => return run_saves(&mut saves, saves_cmd),
        other => other,
    };

    let mut engine = BoardEngine::from_board(saves.load(Some(save))?);
    let changed = match command {
        Command::Saves(_) | Command::Validate { .. } => false,
        Command::Show => {
            print!("{}", output::render_board(engine.board()));
            false
        }
        Command::Export { output } => {
            let json = engine.export_json()?;
            write_output(output.as_deref(), &json)?;
            false
        }
        Command::Import { file } => {
            engine.import_json(&read_file(&file)?)?;
            true
        }
        Command::Reset => engine.reset(),
        Command::Cover(cover) => run_cover(&mut engine, cover)?,
        Command::Group(group) => run_group(&mut engine, group)?,
        Command::Connect { origin, origin_dir, target, target_dir } => {
            run_connect(&mut engine, (origin, origin_dir), (target, target_dir))?
        }
        Command::Arrow(arrow) => run_arrow(&mut engine, arrow)?,
        Command::Config(ConfigCommand { command: ConfigSubcommand::Set(args) }) => {
            let patch = ConfigPatch::from(args);
            if patch == ConfigPatch::default() {
                return Err(CliError::EmptyPatch);
            }
            engine.update_config(&patch)?
        }
        Command::Csv(csv_cmd) => run_csv(&mut engine, csv_cmd).await?,
    };

    if changed {
        saves.store(Some(save), engine.board())?;
    } else {
        debug!(save, "board unchanged; not saving");
    }
    Ok(())
}

// =============================================================================
// SAVES / FILES
// =============================================================================

fn run_saves(saves: &mut Saves<FileStorage>, cmd: SavesCommand) -> Result<(), CliError> {
    match cmd.command {
        SavesSubcommand::List => {
            for id in saves.list()? {
                println!("{id}");
            }
        }
        SavesSubcommand::Delete { id } => {
            if saves.delete(&id)? {
                println!("deleted {id}");
            } else {
                warn!(%id, "no such save");
            }
        }
    }
    Ok(())
}

fn run_validate(file: &Path) -> Result<(), CliError> {
    let board = schema::import_json(&read_file(file)?)?;
    println!(
        "valid: {} covers, {} groups, {} arrows",
        board.covers.len(),
        board.groups.len(),
        board.arrows.len()
    );
    Ok(())
}

fn read_file(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read { path: path.display().to_string(), source })
}

/// Write `text` to `path`, or to stdout when no path is given.
fn write_output(path: Option<&Path>, text: &str) -> Result<(), CliError> {
    match path {
        Some(path) => {
            fs::write(path, text).map_err(|source| CliError::Write { path: path.display().to_string(), source })?;
            info!(path = %path.display(), bytes = text.len(), "wrote file");
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn found(changed: bool, exists: bool, id: Uuid) -> Result<bool, CliError> {
    if exists { Ok(changed) } else { Err(CliError::NotFound(id)) }
}

// =============================================================================
// COVERS / GROUPS / ARROWS
// =============================================================================

fn run_cover(engine: &mut BoardEngine, cmd: CoverCommand) -> Result<bool, CliError> {
    match cmd.command {
        CoverSubcommand::Add { title, subtitle, link, x, y, stars } => {
            let mut cover = Cover::new(&title, &subtitle, &link, Point::new(x, y), &engine.board().configs);
            if let Some(stars) = stars {
                cover.star.count = snap_stars(stars);
            }
            let id = cover.id;
            engine.add_covers(vec![cover])?;
            println!("{id}");
            Ok(true)
        }
        CoverSubcommand::Update { id, title, subtitle, link, stars, title_dir, subtitle_dir, star_dir } => {
            let patch = CoverPatch {
                pos: None,
                link,
                title: search_label_patch(title, title_dir),
                subtitle: search_label_patch(subtitle, subtitle_dir),
                star: (stars.is_some() || star_dir.is_some()).then_some(RatingPatch { count: stars, dir: star_dir }),
            };
            if patch == CoverPatch::default() {
                return Err(CliError::EmptyPatch);
            }
            let exists = engine.board().covers.exists(id);
            found(engine.update_cover(id, &patch)?, exists, id)
        }
        CoverSubcommand::Move { id, x, y } => {
            let exists = engine.board().covers.exists(id);
            found(engine.move_cover(id, Point::new(x, y)), exists, id)
        }
        CoverSubcommand::Remove { id } => {
            let exists = engine.board().covers.exists(id);
            found(engine.remove_cover(id), exists, id)
        }
        CoverSubcommand::Front { id } => {
            let exists = engine.board().covers.exists(id);
            found(engine.refresh_cover(id), exists, id)
        }
    }
}

/// A label patch that also updates the search text, so a renamed cover
/// searches for its new name.
fn search_label_patch(text: Option<String>, dir: Option<Dir>) -> Option<SearchLabelPatch> {
    (text.is_some() || dir.is_some()).then(|| SearchLabelPatch { search: text.clone(), text, dir })
}

fn label_patch(text: Option<String>, dir: Option<Dir>) -> Option<LabelPatch> {
    (text.is_some() || dir.is_some()).then_some(LabelPatch { text, dir })
}

fn run_group(engine: &mut BoardEngine, cmd: GroupCommand) -> Result<bool, CliError> {
    match cmd.command {
        GroupSubcommand::Add { title, subtitle, x, y, scale_x, scale_y } => {
            let mut group =
                Group::new(&title, Point::new(x, y), Scale::new(scale_x, scale_y), &engine.board().configs);
            group.subtitle.text = subtitle;
            let id = group.id;
            engine.add_groups(vec![group])?;
            println!("{id}");
            Ok(true)
        }
        GroupSubcommand::Update { id, title, subtitle, title_dir, subtitle_dir } => {
            let patch = GroupPatch {
                title: label_patch(title, title_dir),
                subtitle: label_patch(subtitle, subtitle_dir),
                ..GroupPatch::default()
            };
            if patch == GroupPatch::default() {
                return Err(CliError::EmptyPatch);
            }
            let exists = engine.board().groups.exists(id);
            found(engine.update_group(id, &patch)?, exists, id)
        }
        GroupSubcommand::Move { id, x, y } => {
            let exists = engine.board().groups.exists(id);
            found(engine.move_group(id, Point::new(x, y)), exists, id)
        }
        GroupSubcommand::Scale { id, x, y } => {
            let exists = engine.board().groups.exists(id);
            found(engine.rescale_group(id, Scale::new(x, y)), exists, id)
        }
        GroupSubcommand::Remove { id } => {
            let exists = engine.board().groups.exists(id);
            found(engine.remove_group(id), exists, id)
        }
        GroupSubcommand::Front { id } => {
            let exists = engine.board().groups.exists(id);
            found(engine.refresh_group(id), exists, id)
        }
    }
}

fn run_arrow(engine: &mut BoardEngine, cmd: ArrowCommand) -> Result<bool, CliError> {
    match cmd.command {
        ArrowSubcommand::Update { id, title, title_dir, origin_dir, target_dir } => {
            let patch = ArrowPatch { title: label_patch(title, title_dir), origin_dir, target_dir };
            if patch == ArrowPatch::default() {
                return Err(CliError::EmptyPatch);
            }
            let exists = engine.board().arrows.exists(id);
            found(engine.update_arrow(id, &patch)?, exists, id)
        }
        ArrowSubcommand::Remove { id } => {
            let exists = engine.board().arrows.exists(id);
            found(engine.remove_arrow(id), exists, id)
        }
    }
}

/// Drive the two-click connect protocol with both clicks at once.
fn run_connect(engine: &mut BoardEngine, origin: (Uuid, Dir), target: (Uuid, Dir)) -> Result<bool, CliError> {
    if origin.0 == target.0 {
        return Err(CliError::SelfConnect(origin.0));
    }
    for (id, _) in [origin, target] {
        if engine.resolve(id).is_none() {
            return Err(CliError::NotFound(id));
        }
    }
    engine.click_anchor(origin.0, origin.1)?;
    match engine.click_anchor(target.0, target.1)? {
        ConnectOutcome::Created(id) => {
            println!("{id}");
            Ok(true)
        }
        ConnectOutcome::Updated(id) => {
            println!("updated {id}");
            Ok(true)
        }
        ConnectOutcome::Duplicate(id) => {
            println!("already connected by {id}");
            Ok(false)
        }
        other => {
            debug!(?other, "connection not made");
            Ok(false)
        }
    }
}

// =============================================================================
// CSV / SEARCH
// =============================================================================

async fn run_csv(engine: &mut BoardEngine, cmd: CsvCommand) -> Result<bool, CliError> {
    match cmd.command {
        CsvSubcommand::Export { output } => {
            let text = csv::write_covers(engine.board().covers.list());
            write_output(output.as_deref(), text.trim_end_matches('\n'))?;
            Ok(false)
        }
        CsvSubcommand::Search { file, media } => {
            let queries = csv::parse_queries(&read_file(&file)?)?;
            let media = media.unwrap_or(engine.board().configs.media);
            let config = SearchConfig::from_env();
            let registry = providers::registry(&config)?;
            let provider = registry.get(media)?;
            let secret = match media {
                Media::Game => config.rawg_api_key.as_deref(),
                _ => None,
            };

            info!(%media, queries = queries.len(), "searching covers");
            let settled = search::search_all(provider.as_ref(), &queries, secret).await;
            for (query, result) in queries.iter().zip(&settled) {
                if let Err(e) = result {
                    eprintln!("skipped {:?} / {:?}: {e}", query.title, query.subtitle);
                }
            }
            let hits = search::successes(settled);
            if hits.is_empty() {
                return Ok(false);
            }
            let ingest = engine.add_search_results(&hits)?;
            for (index, err) in &ingest.rejected {
                if let Some(query) = queries.get(*index) {
                    eprintln!("skipped {:?} / {:?}: {}", query.title, query.subtitle, err.primary_message());
                }
            }
            for id in &ingest.added {
                println!("{id}");
            }
            Ok(!ingest.added.is_empty())
        }
    }
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
