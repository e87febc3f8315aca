use std::env;
use std::sync::Arc;

use dotenv::dotenv;
use log::info;

use castgate::prelude::*;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv().ok();
    pretty_env_logger::init();

    let gate = CastGate::from_env(GateOptions::default())?;
    let start = env::var("DEMO_START_PATH").unwrap_or_else(|_| "/".to_string());
    let navigator = MemoryNavigator::new(&start);
    let ctx = gate.mount(Arc::new(navigator.clone()));

    println!("Starting session demo at {}", start);

    let state = ctx.loaded().await?;
    println!(
        "Initial session: {}",
        state
            .user
            .as_ref()
            .map(|u| u.id.as_str())
            .unwrap_or("none")
    );

    let credentials = (env::var("DEMO_EMAIL"), env::var("DEMO_PASSWORD"));
    if let (Ok(email), Ok(password)) = credentials {
        println!("\nSigning in as {}", email);
        ctx.sign_in(&email, &password).await?;

        let state = ctx
            .wait_for(|s| s.session.is_some() && !s.profile_status.is_pending())
            .await?;
        println!("Role: {:?}, profile: {:?}", state.role, state.profile_status);

        if state.needs_profile_setup() {
            println!("Profile missing, retrying setup");
            ctx.retry_profile_setup().await?;
        }

        match ctx.converge() {
            Some(terminal) => println!("Terminal: {}", terminal),
            None => println!("Profile still loading"),
        }
        println!("Gate for /admin/dashboard: {:?}", ctx.gate("/admin/dashboard"));

        println!("\nSigning out");
        if let Err(e) = ctx.sign_out().await {
            println!("Remote sign-out failed, signed out locally: {}", e);
        }
    } else {
        info!("DEMO_EMAIL and DEMO_PASSWORD not set, skipping sign-in");
        println!("Gate for /client/dashboard: {:?}", ctx.gate("/client/dashboard"));
    }

    println!("\nNavigation history:");
    for entry in navigator.history() {
        println!("  {:?} {}", entry.kind, entry.path);
    }

    ctx.unmount().await;
    println!("Session demo completed");

    Ok(())
}
