//!
//! freelancekz session shell
//! -------------------------
//! Interactive client for the marketplace API. One process is one browsing
//! session: the durable scope lives under the state directory, the volatile scope
//! in memory. Pasting the provider's callback query into `callback` resumes an
//! eGov.kz handshake started with `verify`.

use std::env;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::{fmt, EnvFilter};

use freelancekz::config::AppConfig;
use freelancekz::egov::{CallbackParams, EgovAuthService, FlowIntent, VerificationFlow, VerificationOutcome};
use freelancekz::error::AppError;
use freelancekz::gamification::Standing;
use freelancekz::gateway::ApiClient;
use freelancekz::identity::{self, AuthSession, Role, SignInForm, SignUpForm};
use freelancekz::navigation::{guard, visible_links, Capabilities, GuardDecision, Page};
use freelancekz::preferences::Preferences;
use freelancekz::storage::SessionStore;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--api <url>] [--state-dir <dir>] [--timeout-ms <ms>]\n\nEnvironment:\n  FREELANCEKZ_API_BASE_URL, FREELANCEKZ_STATE_DIR, FREELANCEKZ_TIMEOUT_MS, EGOV_CLIENT_ID, EGOV_REDIRECT_URI\n\nType 'help' inside the shell for commands."
    );
}

const HELP: &str = "Commands:
  status                                       show session state
  signin <email> <password>                    sign in with credentials
  signup <role> <email> <password> <iin|-> <full name>
                                               create an account (role: freelancer|client|both)
  logout                                       end the session
  refresh                                      re-fetch the profile
  caps                                         show role capabilities and visible links
  open <path>                                  check the page guard for a route
  level                                        show professionalism level
  level up [amount]                            complete a test and earn XP (default 1)
  verify [login|verify]                        start eGov.kz handshake, prints the URL to open
  callback <query>                             finish the handshake with the callback query string
  skill add|rm <name>                          edit freelancer skills
  theme [light|dark|toggle]                    show or set theme
  locale [en|ru|kz]                            show or set locale
  help                                         show this help
  quit | exit                                  leave the shell";

fn report(err: &AppError) {
    eprintln!("error: {}", err.user_message());
    for (field, msg) in err.field_errors() {
        eprintln!("  {}: {}", field, msg);
    }
}

fn print_status(session: &AuthSession) {
    let snap = session.snapshot();
    println!("status: {:?}", snap.status);
    if let Some(u) = &snap.user {
        println!(
            "user:   {} <{}> role={} verified={}",
            u.full_name.as_deref().unwrap_or("-"),
            u.email.as_deref().unwrap_or("-"),
            Role::effective(u.role),
            u.egov_auth
        );
    }
    if let Some(f) = &snap.freelancer {
        let skills: Vec<&str> = f.skills.iter().map(String::as_str).collect();
        println!("profile: {} | skills: {}", f.title.as_deref().unwrap_or("-"), skills.join(", "));
    }
}

async fn dispatch(
    line: &str,
    session: &AuthSession,
    egov: &EgovAuthService,
) -> std::result::Result<bool, AppError> {
    let mut parts = line.split_whitespace();
    let cmd = parts.next().unwrap_or("").to_ascii_lowercase();
    let rest: Vec<&str> = parts.collect();
    match cmd.as_str() {
        "" => {}
        "quit" | "exit" => return Ok(false),
        "help" => println!("{}", HELP),
        "status" => print_status(session),
        "signin" => {
            let form = SignInForm::new(rest.first().copied().unwrap_or(""), rest.get(1).copied().unwrap_or(""));
            let user = identity::sign_in(session, &form).await?;
            println!("signed in as {}", user.email.as_deref().unwrap_or(&user.id));
        }
        "signup" => {
            let form = SignUpForm {
                role: rest.first().map(|r| r.parse::<Role>().unwrap_or_default()).filter(|r| r.is_selectable()),
                email: rest.get(1).copied().unwrap_or("").to_string(),
                password: rest.get(2).copied().unwrap_or("").to_string(),
                iin: rest.get(3).filter(|v| **v != "-").map(|v| v.to_string()),
                full_name: rest.get(4..).map(|w| w.join(" ")).unwrap_or_default(),
            };
            let user = identity::register(session, &form).await?;
            println!("account created: {}", user.id);
        }
        "logout" => {
            session.logout()?;
            println!("signed out");
        }
        "refresh" => {
            session.refresh_profile().await;
            print_status(session);
        }
        "caps" => {
            let snap = session.snapshot();
            let caps = Capabilities::for_session(&snap);
            println!(
                "role={} browse_talent={} browse_jobs={} post_job={}",
                snap.role(),
                caps.browse_talent,
                caps.browse_jobs,
                caps.post_job
            );
            let links: Vec<&str> = visible_links(&snap).iter().map(|p| p.path()).collect();
            println!("links: {}", links.join("  "));
        }
        "open" => {
            let path = rest.first().copied().unwrap_or("/");
            match path.parse::<Page>() {
                Ok(page) => match guard(page, &session.snapshot()) {
                    GuardDecision::Allow => println!("{} ok", page),
                    GuardDecision::Wait => println!("{} waiting for session", page),
                    GuardDecision::Redirect { to, notice } => {
                        if let Some(n) = notice {
                            println!("access denied: {}", n);
                        }
                        println!("{} -> {}", page, to);
                    }
                },
                Err(e) => println!("{}", e),
            }
        }
        "level" => {
            if rest.first().copied() == Some("up") {
                let amount = match rest.get(1) {
                    Some(v) => v.parse::<u32>().map_err(|_| {
                        AppError::internal("bad_amount".to_string(), format!("'{}' is not a number", v))
                    })?,
                    None => 1,
                };
                session.add_xp(amount).await?;
                println!("+{} XP", amount);
            }
            let snap = session.snapshot();
            let s = Standing::derive(snap.user.as_ref(), snap.freelancer.as_ref());
            println!("{} ({}%) xp={} projects={} rating={:.1}", s.level.label(), s.progress, s.xp, s.completed_projects, s.rating);
        }
        "verify" => {
            let intent = match rest.first() {
                Some(s) => s.parse::<FlowIntent>()?,
                None => FlowIntent::Verify,
            };
            let url = VerificationFlow::new(session, egov).begin(intent)?;
            println!("open in a browser, then paste the callback query:\n  {}", url);
        }
        "callback" => {
            let params = CallbackParams::from_query(rest.first().copied().unwrap_or(""));
            match VerificationFlow::new(session, egov).handle_callback(&params).await {
                VerificationOutcome::Verified { identity, redirect, .. } => {
                    println!("verified: {}", identity.full_name.as_deref().unwrap_or("identity confirmed"));
                    if let Some(iin) = identity.masked_iin() {
                        println!("IIN: {}", iin);
                    }
                    redirect.wait().await;
                    println!("-> {}", redirect.to);
                }
                VerificationOutcome::Failed { message } => eprintln!("verification failed: {}", message),
            }
        }
        "skill" => {
            let name = rest.get(1..).map(|w| w.join(" ")).unwrap_or_default();
            match rest.first().copied() {
                Some("add") if !name.is_empty() => session.add_skill(&name).await?,
                Some("rm") if !name.is_empty() => session.remove_skill(&name).await?,
                _ => println!("usage: skill add|rm <name>"),
            }
        }
        "theme" => {
            let prefs = Preferences::new(session.store());
            match rest.first().copied() {
                None => println!("{}", prefs.theme()),
                Some("toggle") => println!("{}", prefs.toggle_theme()?),
                Some(v) => prefs.set_theme(v.parse()?)?,
            }
        }
        "locale" => {
            let prefs = Preferences::new(session.store());
            match rest.first() {
                None => println!("{}", prefs.locale()),
                Some(v) => prefs.set_locale(v.parse()?)?,
            }
        }
        other => println!("unknown command '{}'; type 'help'", other),
    }
    Ok(true)
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("warn"))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);
    let mut cfg = AppConfig::from_env();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--api" | "--state-dir" | "--timeout-ms" if i + 1 >= args.len() => {
                eprintln!("{} requires a value", args[i]);
                print_usage(&program);
                std::process::exit(2);
            }
            "--api" => { cfg.api_base_url = Some(args[i + 1].trim_end_matches('/').to_string()); i += 2; }
            "--state-dir" => { cfg.state_dir = args[i + 1].clone().into(); i += 2; }
            "--timeout-ms" => {
                let ms: u64 = args[i + 1].parse().context("--timeout-ms expects milliseconds")?;
                cfg.request_timeout = std::time::Duration::from_millis(ms.max(1));
                i += 2;
            }
            "-h" | "--help" => { print_usage(&program); return Ok(()); }
            unk => {
                eprintln!("Unrecognized argument: {}", unk);
                print_usage(&program);
                std::process::exit(2);
            }
        }
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    let store = SessionStore::open(&cfg.state_dir)
        .with_context(|| format!("Failed to open session store in {}", cfg.state_dir.display()))?;
    store.sanitize().context("Failed to sanitize session store")?;
    let api = ApiClient::from_config(&cfg)?;
    let egov = EgovAuthService::new(cfg.egov.public())?;
    let session = rt.block_on(AuthSession::boot(store, api));

    println!("freelancekz shell. Type 'help' for commands.");
    print_status(&session);

    let mut rl = DefaultEditor::new()?;
    loop {
        match rl.readline("freelancekz> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);
                match rt.block_on(dispatch(line, &session, &egov)) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => report(&e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
