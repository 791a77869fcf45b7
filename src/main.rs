use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tanakh_gal::builder::{self, Strategy};
use tanakh_gal::catalog::{self, Catalog};
use tanakh_gal::config::{self, ProjectConfig};
use tanakh_gal::generate::{self, HtmlBundleSink};
use tanakh_gal::normalize::normalize;
use tanakh_gal::output;
use tanakh_gal::placement::{self, PlacementMap};
use tanakh_gal::plan::{self, DocumentPlan, TEST_CHAPTER_LIMIT};
use tanakh_gal::reference::{self, Reference};
use tanakh_gal::registry::Registry;
use tanakh_gal::selector::Selector;
use tanakh_gal::text::{DirectorySource, PacedFetcher};

/// Shared flags for commands that plan a document.
#[derive(clap::Args, Clone)]
struct PlanArgs {
    /// Test mode: only the first few chapters of each book
    #[arg(long)]
    test: bool,

    /// Chapters per book (implies --test)
    #[arg(long)]
    chapters: Option<u32>,
}

impl PlanArgs {
    fn chapter_limit(&self) -> Option<u32> {
        self.chapters.or(self.test.then_some(TEST_CHAPTER_LIMIT))
    }
}

#[derive(Parser)]
#[command(name = "tanakh-gal")]
#[command(about = "Place Bible artwork into Tanakh chapters and build illustrated bundles")]
#[command(long_about = "\
Place Bible artwork into Tanakh chapters and build illustrated bundles

Images are listed in a catalog, placed into \"Book Chapter\" references in a
persisted placement map, and selected so each image appears at most once in
a generated document.

Project structure:

  project/
  ├── config.toml                    # Project config (optional)
  ├── chagall_download_config.json   # Catalog: filename, title, book, url
  ├── chagall_placement_map.json     # filename -> [\"Genesis 22\"]
  ├── images/                        # Image files named in the catalog
  └── texts/                         # Chapter text: Genesis.1.json, ...

Typical workflow:
  suggest --accept   place images whose titles cite a chapter
  build-map          place everything else by book
  normalize          repair out-of-range and shared chapters
  plan               preview the image for every intro and chapter
  generate           render the HTML bundle

Run 'tanakh-gal gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Project directory
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show ranked chapter suggestions for catalog images
    Suggest {
        /// 1-based catalog position to start from
        #[arg(long, default_value_t = 1)]
        start: usize,
        /// Maximum number of images to show
        #[arg(long)]
        limit: Option<usize>,
        /// Skip images that already have a placement
        #[arg(long)]
        only_unmapped: bool,
        /// Place the top suggestion when it meets placement.accept_threshold
        #[arg(long)]
        accept: bool,
    },
    /// Place one image at a chapter, moving it if the chapter is taken
    Assign {
        filename: String,
        /// Reference such as "Genesis 22"
        reference: String,
    },
    /// Build a placement map from the catalog
    BuildMap {
        #[arg(long, value_enum, default_value_t = Strategy::Combined)]
        strategy: Strategy,
        /// Keep existing placements and add only new images
        #[arg(long)]
        merge: bool,
    },
    /// Repair out-of-range chapters and chapters shared by several images
    Normalize {
        /// Report changes without saving the map
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the image chosen for every book intro and chapter
    Plan(PlanArgs),
    /// Render the illustrated HTML bundle
    Generate {
        /// Output directory
        #[arg(long, default_value = "dist")]
        output: PathBuf,
        #[command(flatten)]
        plan: PlanArgs,
    },
    /// Validate catalog, image files and placement map
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let root = cli.root.as_path();

    match cli.command {
        Command::Suggest {
            start,
            limit,
            only_unmapped,
            accept,
        } => {
            let config = config::load_config(root)?;
            let registry = Registry::tanakh();
            let catalog = load_catalog(&config, root)?;
            let map_path = config.map_path(root);
            let mut map = PlacementMap::load_or_default(&map_path)?;
            let mut accepted = 0;

            let shown = catalog
                .images()
                .iter()
                .enumerate()
                .skip(start.saturating_sub(1))
                .filter(|(_, img)| !only_unmapped || !map.contains(&img.filename))
                .take(limit.unwrap_or(usize::MAX))
                .collect::<Vec<_>>();
            for (i, img) in shown {
                let suggestions = reference::parse(&img.title, &img.filename, &registry);
                output::print_suggestions(i + 1, img, map.refs(&img.filename), &suggestions);
                if accept
                    && !img.is_cover_like()
                    && let Some(top) = suggestions.first()
                    && top.confidence >= config.placement.accept_threshold
                {
                    let placed = map.assign(&img.filename, top.reference.clone(), &registry);
                    println!("    Accepted: {}", placed);
                    accepted += 1;
                }
            }
            if accepted > 0 {
                map.save(&map_path)?;
                println!("==> Accepted {} placements \u{2192} {}", accepted, map_path.display());
            }
        }
        Command::Assign {
            filename,
            reference,
        } => {
            let config = config::load_config(root)?;
            let registry = Registry::tanakh();
            let desired = Reference::parse(&reference)?;
            let map_path = config.map_path(root);
            let mut map = PlacementMap::load_or_default(&map_path)?;
            map.assign(&filename, desired, &registry);
            map.save(&map_path)?;
            output::print_assignment(&filename, &map);
        }
        Command::BuildMap { strategy, merge } => {
            let config = config::load_config(root)?;
            let registry = Registry::tanakh();
            let catalog = load_catalog(&config, root)?;
            let map_path = config.map_path(root);

            println!("==> Building placement map ({:?})", strategy);
            let outcome = builder::build(catalog.images(), &registry, strategy);
            output::print_build_outcome(&outcome);

            let map = if merge {
                let mut existing = PlacementMap::load_or_default(&map_path)?;
                let added = existing.merge_missing(&outcome.map);
                println!("Merged {} new placements", added);
                existing
            } else {
                outcome.map
            };
            map.save(&map_path)?;
            println!("==> Saved {}", map_path.display());
        }
        Command::Normalize { dry_run } => {
            let config = config::load_config(root)?;
            let map_path = config.map_path(root);
            let map = PlacementMap::load(&map_path)?;

            println!("==> Normalizing {}", map_path.display());
            let outcome = normalize(&map, &Registry::tanakh());
            output::print_normalize_report(&outcome, config.placement.change_log_limit);
            if !dry_run && !outcome.is_unchanged() {
                outcome.map.save(&map_path)?;
                println!("==> Saved {}", map_path.display());
            }
        }
        Command::Plan(args) => {
            let config = config::load_config(root)?;
            let catalog = load_catalog(&config, root)?;
            let registry = config.registry();
            let plan = build_plan(&config, root, &registry, &catalog, &args)?;
            output::print_plan(&plan);
        }
        Command::Generate {
            output: out_dir,
            plan: args,
        } => {
            let config = config::load_config(root)?;
            let catalog = load_catalog(&config, root)?;
            let registry = config.registry();

            println!("==> Stage 1: Planning {} books", registry.len());
            let plan = build_plan(&config, root, &registry, &catalog, &args)?;

            println!("==> Stage 2: Generating HTML \u{2192} {}", out_dir.display());
            let source = DirectorySource::new(config.text_dir(root));
            let mut fetcher = PacedFetcher::new(&source, config.retry_policy());
            let mut fetch = |book: &str, chapter: u32| fetcher.fetch(book, chapter);
            let mut sink = HtmlBundleSink::new(&out_dir, &config.output.title, &config.output.language);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_generate_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let summary = generate::generate(
                &plan,
                &registry,
                &catalog,
                &config.output.language,
                &mut fetch,
                &mut sink,
                Some(tx),
            )?;
            printer.join().unwrap();
            output::print_generate_summary(&summary);
            println!("==> Build complete: {}", out_dir.display());
        }
        Command::Check => {
            let config = config::load_config(root)?;
            println!("==> Checking {}", root.display());
            let catalog = load_catalog(&config, root)?;
            let map = PlacementMap::load_or_default(&config.map_path(root))?;

            let assets = catalog::check_assets(&catalog, &config.images_dir(root));
            let audit = placement::audit(&map, &Registry::tanakh(), |f| catalog.contains(f));
            output::print_check_report(&assets, &audit);
            if !assets.is_clean() || !audit.is_clean() {
                return Err("check found problems".into());
            }
            println!("==> Project is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn load_catalog(config: &ProjectConfig, root: &Path) -> Result<Catalog, catalog::CatalogError> {
    catalog::load_catalog(&config.catalog_path(root), &config.images_dir(root))
}

/// Select every image for the document in canonical order.
fn build_plan(
    config: &ProjectConfig,
    root: &Path,
    registry: &Registry,
    catalog: &Catalog,
    args: &PlanArgs,
) -> Result<DocumentPlan, Box<dyn std::error::Error>> {
    let map = PlacementMap::load_or_default(&config.map_path(root))?;
    let slots = builder::unplaced_slots(catalog, registry, &map);
    let mut selector = Selector::new(registry, catalog, &map, slots, config.selection_rules()?);
    Ok(plan::plan_document(registry, &mut selector, args.chapter_limit())?)
}
