use anyhow::Result;
use std::process;

use crate::config::Config;
use kobiri_core::db::Database;
use kobiri_core::models::Session;

use super::helpers::{json_error, prompt_line};
use super::open_session;

fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(p) => Ok(p),
        None => prompt_line("Password"),
    }
}

fn print_signed_in(session: &Session, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(session)?);
    } else {
        println!("Signed in as {}", session.user.email);
    }
    Ok(())
}

pub(crate) fn cmd_signup(
    db: &Database,
    config: &Config,
    email: &str,
    password: Option<String>,
    json: bool,
) -> Result<()> {
    let password = password_or_prompt(password)?;
    let mut app = open_session(db, config)?;
    let session = app.sign_up(db, email, &password)?;
    config.save_session_token(&session.access_token)?;
    print_signed_in(&session, json)
}

pub(crate) fn cmd_login(
    db: &Database,
    config: &Config,
    email: &str,
    password: Option<String>,
    json: bool,
) -> Result<()> {
    let password = password_or_prompt(password)?;
    let mut app = open_session(db, config)?;
    if app.is_logged_in() {
        app.sign_out(db)?;
    }
    let session = app.sign_in_with_password(db, email, &password)?;
    config.save_session_token(&session.access_token)?;
    print_signed_in(&session, json)
}

pub(crate) fn cmd_logout(db: &Database, config: &Config, json: bool) -> Result<()> {
    let mut app = open_session(db, config)?;
    let email = app.user().map(|u| u.email.clone());
    app.sign_out(db)?;
    config.clear_session_token()?;

    if json {
        println!("{}", serde_json::json!({ "signed_out": email }));
    } else if let Some(email) = email {
        println!("Signed out {email}");
    } else {
        println!("Not signed in");
    }
    Ok(())
}

pub(crate) fn cmd_whoami(db: &Database, config: &Config, json: bool) -> Result<()> {
    let app = open_session(db, config)?;
    let Some(user) = app.user() else {
        if json {
            println!("{}", json_error("Not signed in"));
        } else {
            eprintln!("Not signed in. Use: kobiri login <email>");
        }
        process::exit(2);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(user)?);
    } else {
        let favorites = app.favorites().len();
        let items = app.market_list().len();
        println!("{} ({favorites} favorite(s), {items} market list item(s))", user.email);
    }
    Ok(())
}

pub(crate) fn cmd_oauth(db: &Database, config: &Config, provider: &str, json: bool) -> Result<()> {
    let app = open_session(db, config)?;
    let url = app.sign_in_with_oauth(provider)?;
    if json {
        println!("{}", serde_json::json!({ "provider": provider, "url": url }));
    } else {
        println!("Open this URL to continue signing in with {provider}:");
        println!("{url}");
    }
    Ok(())
}
