//! Non-interactive subcommands: `login`, `register`, `logout`, `status`, `whoami`.
//!
//! These share the session store with the TUI, so a login here is picked up
//! by a running TUI on its next tick.

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use keyhold_core::{
    AuthClient, Config, Destination, LoginForm, RegisterForm, Session, SessionHolder,
};

/// Names accepted as the first argument
pub const COMMANDS: [&str; 5] = ["login", "register", "logout", "status", "whoami"];

pub fn is_command(arg: &str) -> bool {
    COMMANDS.contains(&arg)
}

pub async fn run(command: &str) -> Result<()> {
    let mut config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });
    let mut holder = SessionHolder::open(config.open_store()?);
    let client = AuthClient::new(config.api_base_url())?;

    match command {
        "login" => login(&mut config, &client, &mut holder).await,
        "register" => register(&mut config, &client, &mut holder).await,
        "logout" => logout(&mut holder),
        "status" => {
            status(&holder);
            Ok(())
        }
        "whoami" => whoami(&client, &holder).await,
        other => bail!("Unknown command: {}", other),
    }
}

async fn login(config: &mut Config, client: &AuthClient, holder: &mut SessionHolder) -> Result<()> {
    let mut form = LoginForm::login();
    form.draft.email = prompt_with_default("Email", config.last_email.as_deref())?;
    form.draft.password = prompt_password()?;

    match form.submit(client, holder).await {
        Some(Destination::Home) => {
            remember_email(config, holder);
            println!("Login successful!");
            print_session(holder.session());
            Ok(())
        }
        _ => bail!(form.error().unwrap_or("Login failed").to_string()),
    }
}

async fn register(
    config: &mut Config,
    client: &AuthClient,
    holder: &mut SessionHolder,
) -> Result<()> {
    let mut form = RegisterForm::register();
    form.draft.name = prompt("Name")?;
    form.draft.email = prompt("Email")?;
    form.draft.password = prompt_password()?;

    match form.submit(client, holder).await {
        Some(Destination::Home) => {
            remember_email(config, holder);
            println!("Account created.");
            print_session(holder.session());
            Ok(())
        }
        Some(Destination::Login) => {
            // Account exists but no session came back
            config.last_email = Some(form.draft.email.clone());
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            println!("{}", form.error().unwrap_or_default());
            println!("Run `keyhold login` to sign in.");
            Ok(())
        }
        None => bail!(form.error().unwrap_or("Registration failed").to_string()),
    }
}

fn logout(holder: &mut SessionHolder) -> Result<()> {
    let was_signed_in = holder.is_authenticated();
    holder
        .logout()
        .context("Signed out, but the saved session could not be removed")?;
    if was_signed_in {
        println!("Signed out.");
    } else {
        println!("Not signed in.");
    }
    Ok(())
}

fn status(holder: &SessionHolder) {
    match holder.session() {
        Some(session) => print_session(Some(session)),
        None => println!("Not signed in."),
    }
}

async fn whoami(client: &AuthClient, holder: &SessionHolder) -> Result<()> {
    let Some(session) = holder.session() else {
        bail!("Not signed in. Run `keyhold login` first.");
    };
    let profile = client
        .fetch_user(&holder.request_context(), &session.user_id)
        .await?;

    println!("{}", profile.display_name());
    if let Some(ref email) = profile.email {
        println!("  Email:  {}", email);
    }
    if let Some(ref phone) = profile.phone_number {
        println!("  Phone:  {}", phone);
    }
    if !profile.roles.is_empty() {
        println!("  Roles:  {}", profile.roles.join(", "));
    }
    if let Some(ref created) = profile.created_date {
        println!("  Since:  {}", created);
    }
    Ok(())
}

fn print_session(session: Option<&Session>) {
    if let Some(session) = session {
        println!("Signed in as {} <{}>", session.name, session.email);
        println!("  User ID: {}", session.user_id);
        println!("  Access:  {}", session.access_level);
    }
}

fn remember_email(config: &mut Config, holder: &SessionHolder) {
    if let Some(session) = holder.session() {
        config.last_email = Some(session.email.clone());
        match config.save() {
            Ok(()) => info!("Saved last email to config"),
            Err(e) => warn!(error = %e, "Failed to save config"),
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_with_default(label: &str, default: Option<&str>) -> Result<String> {
    match default.filter(|d| !d.is_empty()) {
        Some(default) => {
            let value = prompt(&format!("{} [{}]", label, default))?;
            Ok(if value.is_empty() {
                default.to_string()
            } else {
                value
            })
        }
        None => prompt(label),
    }
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    Ok(password)
}
