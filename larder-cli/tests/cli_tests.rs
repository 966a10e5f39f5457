//! End-to-end tests for the larder commands
//!
//! Every test passes --book and --config explicitly so the environment and
//! the user's real files never take part.

use clap::Parser;
use larder_cli::{run, Cli};
use larder_common::config::TomlConfig;
use larder_common::store::ListEntry;
use larder_common::{Book, BookFile, EntityRef, EventBus, GroupId, IngredientId, Taxonomy};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn book_path(&self) -> PathBuf {
        self.dir.path().join("recipes.json")
    }

    fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    async fn invoke(&self, args: &[&str]) -> anyhow::Result<String> {
        let book = self.book_path();
        let config = self.config_path();
        let mut argv = vec![
            "larder",
            "--book",
            book.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
        ];
        argv.extend_from_slice(args);

        let cli = Cli::try_parse_from(argv)?;
        let mut out = Vec::new();
        run(cli, TomlConfig::default(), &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    async fn load(&self) -> Book {
        BookFile::new(self.book_path())
            .load(Arc::new(Taxonomy::builtin()), EventBus::new(16))
            .await
            .unwrap()
    }
}

/// A book with one drifted counter and one unused ingredient
async fn write_messy_book(path: &Path) {
    let mut book = Book::with_builtin_taxonomy();
    let g = book.insert_unit("g").unwrap();
    let flour = book.insert_ingredient("Flour", GroupId(1)).unwrap();
    book.insert_ingredient("Saffron", GroupId(10)).unwrap();
    let bread = book.create_recipe("Bread").unwrap();
    let mut draft = book.recipes().at(bread).unwrap().draft();
    draft.ingredients = vec![ListEntry::ingredient(500.0, g, flour, "")];
    book.update_recipe(bread, draft).unwrap();
    book.overwrite_usage(EntityRef::Ingredient(flour), 5).unwrap();

    BookFile::new(path).save(&book).await.unwrap();
}

#[tokio::test]
async fn test_stats_on_missing_book() {
    let fx = Fixture::new();
    let text = fx.invoke(&["stats"]).await.unwrap();
    assert!(text.contains("Units:        0"));
    assert!(text.contains("Ingredients:  0 (0 provisional)"));
    assert!(!fx.book_path().exists());
}

#[tokio::test]
async fn test_check_reports_findings() {
    let fx = Fixture::new();
    write_messy_book(&fx.book_path()).await;

    let text = fx.invoke(&["check"]).await.unwrap();
    assert!(text.contains("ingredient #1 \"Flour\": declared 5, observed 1 (-4)"));
    assert!(text.contains("ingredient #2 \"Saffron\""));
    assert!(text.ends_with("2 finding(s)\n"));

    let json = fx.invoke(&["check", "--json"]).await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["ingredient_drift"].as_array().unwrap().len(), 1);
    assert_eq!(value["dead_ingredients"], serde_json::json!([2]));
}

#[tokio::test]
async fn test_repair_without_selection_is_refused() {
    let fx = Fixture::new();
    write_messy_book(&fx.book_path()).await;
    let err = fx.invoke(&["repair"]).await.unwrap_err();
    assert!(err.to_string().contains("Nothing selected"));
}

#[tokio::test]
async fn test_repair_all_saves_with_backup() {
    let fx = Fixture::new();
    write_messy_book(&fx.book_path()).await;
    let before = std::fs::read_to_string(fx.book_path()).unwrap();

    let text = fx.invoke(&["repair", "--all"]).await.unwrap();
    assert!(text.contains("Fixed 1 counter(s)"));
    assert!(text.contains("Deleted 1 unused entity(ies)"));

    let book = fx.load().await;
    assert_eq!(book.ingredients().at(IngredientId(1)).unwrap().used, 1);
    assert!(!book.ingredients().contains(IngredientId(2)));

    let backup = BookFile::new(fx.book_path()).backup_path();
    assert_eq!(std::fs::read_to_string(backup).unwrap(), before);

    let text = fx.invoke(&["check"]).await.unwrap();
    assert_eq!(text, "No findings\n");
}

#[tokio::test]
async fn test_repair_dry_run_leaves_file_alone() {
    let fx = Fixture::new();
    write_messy_book(&fx.book_path()).await;
    let before = std::fs::read_to_string(fx.book_path()).unwrap();

    let text = fx.invoke(&["repair", "--counts", "--dry-run"]).await.unwrap();
    assert!(text.contains("Would fix 1 counter(s)"));
    assert!(text.contains("Dry run: book not saved"));
    assert_eq!(std::fs::read_to_string(fx.book_path()).unwrap(), before);
    assert!(!BookFile::new(fx.book_path()).backup_path().exists());
}

#[tokio::test]
async fn test_plan_creates_window_days() {
    let fx = Fixture::new();
    let text = fx.invoke(&["plan", "--days", "3"]).await.unwrap();
    assert_eq!(text.lines().count(), 3);

    let book = fx.load().await;
    assert_eq!(book.planning().len(), 3);

    // Second refresh has nothing to add
    fx.invoke(&["plan", "--days", "3"]).await.unwrap();
    assert!(!BookFile::new(fx.book_path()).backup_path().exists());
}

#[tokio::test]
async fn test_config_init_refuses_to_overwrite() {
    let fx = Fixture::new();
    let target = fx.dir.path().join("generated.toml");
    let target_arg = target.to_str().unwrap();

    let text = fx.invoke(&["config", "init", target_arg]).await.unwrap();
    assert!(text.starts_with("Wrote default configuration"));
    assert_eq!(TomlConfig::load(&target).unwrap(), TomlConfig::default());

    let err = fx.invoke(&["config", "init", target_arg]).await.unwrap_err();
    assert!(err.to_string().contains("already exists"));

    fx.invoke(&["config", "init", target_arg, "--force"]).await.unwrap();
}

#[test]
fn test_repair_flags_parse() {
    let cli = Cli::try_parse_from(["larder", "repair", "--homonyms", "--dead"]).unwrap();
    assert!(matches!(
        cli.command,
        larder_cli::Command::Repair {
            homonyms: true,
            dead: true,
            counts: false,
            ..
        }
    ));
    assert!(Cli::try_parse_from(["larder", "frobnicate"]).is_err());
}
