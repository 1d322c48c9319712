use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use kobiri_core::models::{Category, MarketListItem, Recipe, RecipeIngredient, RecipeSummary};

/// Read one line from stdin after printing `label` to stderr.
pub(crate) fn prompt_line(label: &str) -> Result<String> {
    eprint!("{label}: ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    Ok(line.trim().to_string())
}

/// Parse `"name:amount"`; the amount is optional.
pub(crate) fn parse_ingredient(s: &str) -> Result<RecipeIngredient> {
    let (name, amount) = s.split_once(':').unwrap_or((s, ""));
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid ingredient '{s}'. Use 'name:amount' (e.g. 'Rice:2 cups')");
    }
    Ok(RecipeIngredient::new(name, amount.trim()))
}

pub(crate) fn print_recipe_table(recipes: &[RecipeSummary]) {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Source")]
        source: String,
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .enumerate()
        .map(|(i, r)| RecipeRow {
            idx: i + 1,
            id: truncate(&r.id, 40),
            title: truncate(&r.title, 40),
            category: r.category.as_deref().map(|c| truncate(c, 20)).unwrap_or_default(),
            source: r.source.to_string(),
        })
        .collect();

    println!("{}", Table::new(&rows).with(Style::rounded()));
}

pub(crate) fn print_category_table(categories: &[Category]) {
    #[derive(Tabled)]
    struct CategoryRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Description")]
        description: String,
    }

    let rows: Vec<CategoryRow> = categories
        .iter()
        .map(|c| CategoryRow {
            name: c.name.clone(),
            description: truncate(c.description.lines().next().unwrap_or_default(), 60),
        })
        .collect();

    println!("{}", Table::new(&rows).with(Style::rounded()));
}

/// Market list grouped by category, in first-seen category order.
pub(crate) fn print_market_list(items: &[MarketListItem]) {
    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = " ")]
        checked: &'static str,
        #[tabled(rename = "Item")]
        name: String,
        #[tabled(rename = "Amount")]
        amount: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "From")]
        from_recipe: String,
    }

    let mut order: Vec<&str> = Vec::new();
    for item in items {
        let category = item.category.as_deref().unwrap_or("Uncategorized");
        if !order.contains(&category) {
            order.push(category);
        }
    }

    let rows: Vec<ItemRow> = order
        .iter()
        .flat_map(|cat| {
            items
                .iter()
                .filter(move |i| i.category.as_deref().unwrap_or("Uncategorized") == *cat)
        })
        .map(|i| ItemRow {
            id: i.id.clone(),
            checked: if i.checked { "[x]" } else { "[ ]" },
            name: truncate(&i.name, 30),
            amount: truncate(&i.amount, 25),
            category: i.category.clone().unwrap_or_default(),
            from_recipe: i.from_recipe.as_deref().map(|f| truncate(f, 35)).unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_recipe(recipe: &Recipe, is_favorite: bool) {
    let name = &recipe.name;
    let star = if is_favorite { " *" } else { "" };
    println!("=== {name}{star} ===");
    if !recipe.description.is_empty() {
        println!("  {}", recipe.description);
    }

    let field = |v: &Option<String>| v.as_deref().unwrap_or("-").to_string();
    let difficulty = recipe.difficulty.map_or("-".to_string(), |d| d.to_string());
    println!(
        "  Prep: {}  |  Cook: {}  |  Serves: {}  |  {difficulty}  |  {}\n",
        field(&recipe.prep_time),
        field(&recipe.cook_time),
        field(&recipe.servings),
        recipe.source,
    );

    println!("  INGREDIENTS:");
    for ing in &recipe.ingredients {
        if ing.amount.is_empty() {
            println!("    {}", ing.name);
        } else {
            println!("    {} - {}", ing.name, ing.amount);
        }
    }

    println!("\n  INSTRUCTIONS:");
    for inst in &recipe.instructions {
        println!("    {}. {}", inst.step, inst.description);
    }
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
