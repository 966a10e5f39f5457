//! Plain-text reports

use chrono::{Duration, NaiveDate};
use larder_common::repair::{CountDrift, HomonymGroup, RepairReport};
use larder_common::store::{PlanItem, Slot};
use larder_common::time::format_date;
use larder_common::{Book, Identifier, IngredientId, RecipeId, RepairAnalysis, UnitId};
use std::io::{self, Write};

fn unit_name(book: &Book, id: UnitId) -> String {
    book.units()
        .get(id)
        .map_or_else(|| id.to_string(), |u| u.text.clone())
}

fn ingredient_name(book: &Book, id: IngredientId) -> String {
    book.ingredients()
        .get(id)
        .map_or_else(|| id.to_string(), |i| i.text.clone())
}

fn recipe_name(book: &Book, id: RecipeId) -> String {
    book.recipes()
        .get(id)
        .map_or_else(|| format!("{} (missing)", id), |r| r.title.clone())
}

pub fn write_stats(out: &mut impl Write, book: &Book) -> io::Result<()> {
    let provisional = book
        .ingredients()
        .iter()
        .filter(|i| i.is_provisional())
        .count();
    let planned = book.planning().days().filter(|d| !d.is_empty()).count();

    writeln!(out, "Units:        {}", book.units().len())?;
    writeln!(
        out,
        "Ingredients:  {} ({} provisional)",
        book.ingredients().len(),
        provisional
    )?;
    writeln!(out, "Recipes:      {}", book.recipes().len())?;
    writeln!(
        out,
        "Planned days: {} of {}",
        planned,
        book.planning().len()
    )?;
    Ok(())
}

fn write_drift<I: Identifier>(
    out: &mut impl Write,
    drift: &[CountDrift<I>],
    name: impl Fn(I) -> String,
) -> io::Result<()> {
    for d in drift {
        writeln!(
            out,
            "  {} \"{}\": declared {}, observed {} ({:+})",
            d.id,
            name(d.id),
            d.declared,
            d.observed,
            d.variation
        )?;
    }
    Ok(())
}

fn write_homonyms<I: Identifier>(
    out: &mut impl Write,
    book: &Book,
    kind: &str,
    groups: &[HomonymGroup<I>],
) -> io::Result<()> {
    for group in groups {
        let scope = group
            .group
            .and_then(|g| book.taxonomy().groups.at(g).ok())
            .map(|g| format!(" in {}", g.text))
            .unwrap_or_default();
        writeln!(out, "  {} \"{}\"{}:", kind, group.key, scope)?;
        for member in &group.members {
            let usage = if member.referenced_by.is_empty() {
                "unused".to_string()
            } else {
                let titles: Vec<String> = member
                    .referenced_by
                    .iter()
                    .map(|r| recipe_name(book, *r))
                    .collect();
                format!("used {} in {}", member.used, titles.join(", "))
            };
            writeln!(out, "    {} \"{}\" ({})", member.id, member.text, usage)?;
        }
    }
    Ok(())
}

pub fn write_analysis(
    out: &mut impl Write,
    book: &Book,
    analysis: &RepairAnalysis,
) -> io::Result<()> {
    let summary = analysis.summary();
    if analysis.is_clean() {
        writeln!(out, "No findings")?;
        return Ok(());
    }

    if analysis.has_drift() {
        writeln!(out, "Usage drift:")?;
        write_drift(out, &analysis.recipe_drift, |id| recipe_name(book, id))?;
        write_drift(out, &analysis.ingredient_drift, |id| ingredient_name(book, id))?;
        write_drift(out, &analysis.unit_drift, |id| unit_name(book, id))?;
    }

    if summary.ingredient_homonyms + summary.unit_homonyms > 0 {
        writeln!(out, "Homonyms:")?;
        write_homonyms(out, book, "ingredient", &analysis.ingredient_homonyms)?;
        write_homonyms(out, book, "unit", &analysis.unit_homonyms)?;
    }

    if summary.dead_ingredients + summary.dead_units > 0 {
        writeln!(out, "Dead entities:")?;
        for id in &analysis.dead_ingredients {
            writeln!(out, "  {} \"{}\"", id, ingredient_name(book, *id))?;
        }
        for id in &analysis.dead_units {
            writeln!(out, "  {} \"{}\"", id, unit_name(book, *id))?;
        }
    }

    if summary.orphan_plan_items > 0 {
        writeln!(out, "Orphan plan items:")?;
        for item in &analysis.orphan_plan_items {
            writeln!(
                out,
                "  {} {}: {}",
                format_date(item.date),
                item.slot.label(),
                item.recipe
            )?;
        }
    }

    writeln!(out, "{} finding(s)", summary.total())?;
    Ok(())
}

pub fn write_repair(out: &mut impl Write, report: &RepairReport, dry_run: bool) -> io::Result<()> {
    let verb = if dry_run { "Would fix" } else { "Fixed" };
    writeln!(out, "{} {} counter(s)", verb, report.counters_fixed)?;
    writeln!(out, "Merged {} duplicate(s)", report.entities_merged)?;
    writeln!(out, "Deleted {} unused entity(ies)", report.entities_deleted)?;
    writeln!(out, "Removed {} orphan plan item(s)", report.plan_items_removed)?;
    if dry_run {
        writeln!(out, "Dry run: book not saved")?;
    }
    Ok(())
}

fn describe_item(book: &Book, item: &PlanItem) -> String {
    match item {
        PlanItem::Recipe(id) => recipe_name(book, *id),
        PlanItem::Text(text) => text.clone(),
    }
}

/// Every day of `[today, today + window)` with its planned items
pub fn write_plan(
    out: &mut impl Write,
    book: &Book,
    today: NaiveDate,
    window: u32,
) -> io::Result<()> {
    for offset in 0..i64::from(window) {
        let date = today + Duration::days(offset);
        let mut slots = Vec::new();
        if let Some(day) = book.planning().day(date) {
            for slot in Slot::ALL {
                let items: Vec<String> = day
                    .slot(slot)
                    .iter()
                    .map(|item| describe_item(book, item))
                    .collect();
                if !items.is_empty() {
                    slots.push(format!("{}: {}", slot.label(), items.join(", ")));
                }
            }
        }
        if slots.is_empty() {
            writeln!(out, "{}  -", format_date(date))?;
        } else {
            writeln!(out, "{}  {}", format_date(date), slots.join("; "))?;
        }
    }
    Ok(())
}
