mod commands;
mod config;
mod gemini;
mod mealdb;
mod pages;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    RecipeDraft, cmd_categories, cmd_category, cmd_chef_ask, cmd_chef_enhance, cmd_chef_generate,
    cmd_cookbook, cmd_favorite_list, cmd_favorite_toggle, cmd_home, cmd_list_add,
    cmd_list_add_recipe, cmd_list_check, cmd_list_clear, cmd_list_organize, cmd_list_remove,
    cmd_list_show, cmd_login, cmd_logout, cmd_oauth, cmd_recipe_add, cmd_search, cmd_show,
    cmd_signup, cmd_whoami, open_session,
};
use crate::config::Config;
use crate::gemini::GeminiClient;
use crate::mealdb::MealDbClient;
use kobiri_core::db::Database;
use kobiri_core::models::RecipeSource;

#[derive(Parser)]
#[command(
    name = "kobiri",
    version,
    about = "Discover recipes, keep a cookbook, and build your market list",
    long_about = "\n\n  _  __     _     _      _
 | |/ /___ | |__ (_)_ __(_)
 | ' // _ \\| '_ \\| | '__| |
 | . \\ (_) | |_) | | |  | |
 |_|\\_\\___/|_.__/|_|_|  |_|
     cook something good.
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Signup {
        /// Email address
        email: String,
        /// Password (prompted for when omitted)
        #[arg(long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sign in with email and password
    Login {
        /// Email address
        email: String,
        /// Password (prompted for when omitted)
        #[arg(long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the authorization URL for an OAuth provider (e.g. google)
    Oauth {
        /// Provider name
        provider: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sign out and forget the saved session
    Logout {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the signed-in user
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the home page: Kobiri recipes, African dishes, random picks, categories
    Home {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Browse recipe categories
    Categories {
        /// Category to list recipes for (omit to list categories)
        name: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search `TheMealDB` for recipes
    Search {
        /// Search query
        query: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe in full
    Show {
        /// Recipe source: kobiri, themealdb, ai
        source: RecipeSource,
        /// Recipe ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show your cookbook: your own recipes and saved favorites
    Cookbook {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage favorites
    Favorite {
        #[command(subcommand)]
        command: FavoriteCommands,
    },
    /// Manage the market (shopping) list
    List {
        #[command(subcommand)]
        command: ListCommands,
    },
    /// Ask the AI chef
    Chef {
        #[command(subcommand)]
        command: ChefCommands,
    },
    /// Manage your own recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
}

#[derive(Subcommand)]
enum FavoriteCommands {
    /// Save a recipe, or remove it if already saved
    Toggle {
        /// Recipe source: kobiri, themealdb, ai
        source: RecipeSource,
        /// Recipe ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List saved favorites
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ListCommands {
    /// Show the market list grouped by category
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an item by name
    Add {
        /// Item name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add every ingredient of a recipe, merging with items already listed
    AddRecipe {
        /// Recipe source: kobiri, themealdb, ai
        source: RecipeSource,
        /// Recipe ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check or uncheck an item
    Check {
        /// Item ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an item
    Remove {
        /// Item ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove every item
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Group items into categories with the AI chef
    Organize {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ChefCommands {
    /// Generate recipe ideas from ingredients you have
    Generate {
        /// Ingredients, comma separated (e.g. "rice, eggs, spring onions")
        ingredients: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ask a cooking question about a recipe step
    Ask {
        /// Recipe source: kobiri, themealdb, ai
        source: RecipeSource,
        /// Recipe ID
        id: String,
        /// Your question
        question: String,
        /// Step you are on
        #[arg(short, long, default_value = "1")]
        step: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Get a step explained in more detail
    Enhance {
        /// Recipe source: kobiri, themealdb, ai
        source: RecipeSource,
        /// Recipe ID
        id: String,
        /// Step number
        step: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// Add a recipe to your cookbook
    Add {
        /// Recipe name
        name: String,
        /// Short description
        #[arg(long)]
        description: Option<String>,
        /// Prep time (e.g. "15 mins")
        #[arg(long)]
        prep: Option<String>,
        /// Cook time (e.g. "1 hour")
        #[arg(long)]
        cook: Option<String>,
        /// Servings
        #[arg(long)]
        servings: Option<String>,
        /// Difficulty: easy, medium, hard (default: medium)
        #[arg(long)]
        difficulty: Option<String>,
        /// Category (e.g. "Soup")
        #[arg(long)]
        category: Option<String>,
        /// Ingredient as "name:amount" (repeatable)
        #[arg(short, long = "ingredient")]
        ingredients: Vec<String>,
        /// Instruction step (repeatable, in order)
        #[arg(short, long = "step")]
        steps: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // The server logs its lifecycle; one-shot commands only surface problems.
    let default_filter = if matches!(cli.command, Commands::Serve { .. }) {
        "kobiri=info,kobiri_core=info,tower_http=info"
    } else {
        "kobiri=warn,kobiri_core=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::open(&config.db_path)?;
    let mealdb = MealDbClient::new(&config.mealdb_url)?;
    let gemini = GeminiClient::new(config.gemini_api_key.clone(), &config.gemini_model)?;

    match cli.command {
        Commands::Signup {
            email,
            password,
            json,
        } => cmd_signup(&db, &config, &email, password, json),
        Commands::Login {
            email,
            password,
            json,
        } => cmd_login(&db, &config, &email, password, json),
        Commands::Oauth { provider, json } => cmd_oauth(&db, &config, &provider, json),
        Commands::Logout { json } => cmd_logout(&db, &config, json),
        Commands::Whoami { json } => cmd_whoami(&db, &config, json),
        Commands::Home { json } => {
            let session = open_session(&db, &config)?;
            cmd_home(&db, &session, &mealdb, json).await
        }
        Commands::Categories { name, json } => match name {
            Some(name) => cmd_category(&mealdb, &name, json).await,
            None => cmd_categories(&mealdb, json).await,
        },
        Commands::Search { query, json } => cmd_search(&mealdb, &query, json).await,
        Commands::Show { source, id, json } => {
            let session = open_session(&db, &config)?;
            cmd_show(&db, &session, &mealdb, &gemini, source, &id, json).await
        }
        Commands::Cookbook { json } => {
            let session = open_session(&db, &config)?;
            cmd_cookbook(&db, &session, json)
        }
        Commands::Favorite { command } => {
            let mut session = open_session(&db, &config)?;
            match command {
                FavoriteCommands::Toggle { source, id, json } => {
                    cmd_favorite_toggle(&db, &mut session, &mealdb, &gemini, source, &id, json)
                        .await
                }
                FavoriteCommands::List { json } => cmd_favorite_list(&session, json),
            }
        }
        Commands::List { command } => {
            let mut session = open_session(&db, &config)?;
            match command {
                ListCommands::Show { json } => cmd_list_show(&db, &mut session, json),
                ListCommands::Add { name, json } => cmd_list_add(&db, &mut session, &name, json),
                ListCommands::AddRecipe { source, id, json } => {
                    cmd_list_add_recipe(&db, &mut session, &mealdb, &gemini, source, &id, json)
                        .await
                }
                ListCommands::Check { id, json } => cmd_list_check(&db, &mut session, &id, json),
                ListCommands::Remove { id, json } => cmd_list_remove(&db, &mut session, &id, json),
                ListCommands::Clear { json } => cmd_list_clear(&db, &mut session, json),
                ListCommands::Organize { json } => {
                    cmd_list_organize(&db, &mut session, &gemini, json).await
                }
            }
        }
        Commands::Chef { command } => {
            let session = open_session(&db, &config)?;
            match command {
                ChefCommands::Generate { ingredients, json } => {
                    cmd_chef_generate(&db, &session, &gemini, &ingredients, json).await
                }
                ChefCommands::Ask {
                    source,
                    id,
                    question,
                    step,
                    json,
                } => {
                    cmd_chef_ask(
                        &db, &session, &mealdb, &gemini, source, &id, step, &question, json,
                    )
                    .await
                }
                ChefCommands::Enhance {
                    source,
                    id,
                    step,
                    json,
                } => cmd_chef_enhance(&db, &session, &mealdb, &gemini, source, &id, step, json).await,
            }
        }
        Commands::Recipe { command } => match command {
            RecipeCommands::Add {
                name,
                description,
                prep,
                cook,
                servings,
                difficulty,
                category,
                ingredients,
                steps,
                json,
            } => {
                let session = open_session(&db, &config)?;
                let draft = RecipeDraft {
                    name,
                    description,
                    prep_time: prep,
                    cook_time: cook,
                    servings,
                    difficulty,
                    category,
                    ingredients,
                    steps,
                };
                cmd_recipe_add(&db, &session, draft, json)
            }
        },
        Commands::Serve { port, bind } => {
            server::start_server(db, mealdb, gemini, config.oauth.clone(), port, &bind).await
        }
    }
}
