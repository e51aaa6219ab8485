//! Fomio - command-line client for a Fomio (Discourse) forum
#![allow(clippy::uninlined_format_args)]

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use fomio::api::{DiscourseClient, ForumApi};
use fomio::auth::{self, ApiCredentials, AuthEvent, AuthEvents};
use fomio::compose::{DraftController, SaveOutcome};
use fomio::feed::{CommentThread, ReplyTarget};
use fomio::models::{Comment, find_teret, group_hubs};
use fomio::{Config, DeviceStore, PostActions, Route};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (RUST_LOG=debug for verbose output)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = parse_args(&args)?;
    let config = Config::load()?;

    let _session = AuthEvents::global().subscribe(|event| match event {
        AuthEvent::SessionExpired => {
            eprintln!("Your session has expired. Run 'fomio auth' to sign in again.");
        }
        AuthEvent::SignedIn { username } => println!("✓ Signed in as @{}", username),
        AuthEvent::SignedOut => println!("✓ Signed out"),
    });

    match command {
        Command::Auth { api_key, username } => auth_flow(&config, api_key, username).await,
        Command::Logout => logout(&config),
        Command::Whoami => whoami(&config).await,
        Command::Hubs => list_hubs(&config).await,
        Command::Topic { target } => show_topic(&config, &target).await,
        Command::Reply { target, text, to } => reply(&config, &target, &text, to.as_deref()).await,
        Command::Like { target, post_id } => toggle(&config, &target, post_id, false).await,
        Command::Bookmark { target, post_id } => toggle(&config, &target, post_id, true).await,
        Command::Compose {
            title,
            body,
            teret,
            post,
            draft_key,
        } => compose(&config, title, body, teret, post, draft_key.as_deref()).await,
        Command::Draft { clear, draft_key } => draft(&config, clear, draft_key.as_deref()).await,
        Command::Link { link } => open_link(&config, &link).await,
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Version => {
            print_version();
            Ok(())
        }
    }
}

/// CLI commands
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Auth {
        api_key: Option<String>,
        username: Option<String>,
    },
    Logout,
    Whoami,
    Hubs,
    Topic {
        target: String,
    },
    Reply {
        target: String,
        text: String,
        to: Option<String>,
    },
    Like {
        target: String,
        post_id: u64,
    },
    Bookmark {
        target: String,
        post_id: u64,
    },
    Compose {
        title: Option<String>,
        body: Option<String>,
        teret: Option<u64>,
        post: bool,
        draft_key: Option<String>,
    },
    Draft {
        clear: bool,
        draft_key: Option<String>,
    },
    Link {
        link: String,
    },
    Help,
    Version,
}

fn flag(args: &[String], names: &[&str]) -> Option<String> {
    args.iter()
        .position(|a| names.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn positional(args: &[String], index: usize, what: &str) -> Result<String> {
    args.get(index)
        .filter(|a| !a.starts_with('-'))
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Missing {}\nRun 'fomio --help' for usage", what))
}

fn parse_args(args: &[String]) -> Result<Command> {
    if args.len() <= 1 {
        return Ok(Command::Help);
    }

    match args[1].as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help),
        "-v" | "--version" | "version" => Ok(Command::Version),

        "auth" | "login" => Ok(Command::Auth {
            api_key: flag(args, &["--key", "-k"]),
            username: flag(args, &["--username", "-u"]),
        }),
        "logout" => Ok(Command::Logout),
        "whoami" => Ok(Command::Whoami),
        "hubs" => Ok(Command::Hubs),

        "topic" | "byte" | "t" => Ok(Command::Topic {
            target: positional(args, 2, "topic id or link")?,
        }),

        "reply" => Ok(Command::Reply {
            target: positional(args, 2, "topic id or link")?,
            text: positional(args, 3, "comment text")?,
            to: flag(args, &["--to"]),
        }),

        "like" | "bookmark" => {
            let target = positional(args, 2, "topic id or link")?;
            let post_id = positional(args, 3, "post id")?
                .parse()
                .context("Post id must be a number")?;
            if args[1] == "like" {
                Ok(Command::Like { target, post_id })
            } else {
                Ok(Command::Bookmark { target, post_id })
            }
        }

        "compose" | "new" => Ok(Command::Compose {
            title: flag(args, &["--title", "-t"]),
            body: flag(args, &["--body", "-b"]),
            teret: flag(args, &["--teret", "-c"])
                .map(|s| s.parse().context("Teret id must be a number"))
                .transpose()?,
            post: args.iter().any(|a| a == "--post"),
            draft_key: flag(args, &["--draft", "-d"]),
        }),

        "draft" => {
            let clear = match args.get(2).map(String::as_str) {
                None | Some("show") => false,
                Some(option) if option.starts_with('-') => false,
                Some("clear") => true,
                Some(other) => anyhow::bail!("Unknown draft action: {other}"),
            };
            Ok(Command::Draft {
                clear,
                draft_key: flag(args, &["--draft", "-d"]),
            })
        }

        "link" | "open" => Ok(Command::Link {
            link: positional(args, 2, "link")?,
        }),

        other => Err(anyhow::anyhow!(
            "Unknown command: {other}\nRun 'fomio --help' for usage"
        )),
    }
}

fn print_help() {
    let config_path = Config::default_path()
        .map_or_else(|_| "Unknown".to_string(), |p| p.display().to_string());

    println!(
        r#"{}
Fomio - a forum client for Discourse

USAGE:
    fomio [COMMAND]

COMMANDS:
    auth [OPTIONS]                     Sign in with an API key
      Options:
        -k, --key <key>                API key (prompted if omitted)
        -u, --username <name>          Username the key acts as
                                       (omit for a User API key)
    logout                             Remove stored credentials
    whoami                             Show the signed-in user

    hubs                               List Hubs and their Terets
    topic <id|link>                    Show a Byte and its comments
    reply <id|link> <text> [--to <comment>]
                                       Comment on a Byte
    like <id|link> <post>              Toggle a like
    bookmark <id|link> <post>          Toggle a bookmark

    compose [OPTIONS]                  Edit the new-topic draft
      Options:
        -t, --title <title>            Set the title
        -b, --body <body>              Set the body
        -c, --teret <id>               Choose the Teret
        -d, --draft <key>              Draft slot (default from config)
        --post                         Publish the draft
      Examples:
        fomio compose --title "Hello Fomio" --teret 12
        fomio compose --body "A longer first post" --post
        fomio compose --draft topic_12 --title "Second thoughts"

    draft [show|clear] [--draft <key>] Show or discard a saved draft
    link <url>                         Open a fomio:// or web link

OPTIONS:
    -h, --help                         Show this help message
    -v, --version                      Show version information

CONFIG:
    {}
"#,
        fomio::LOGO,
        config_path
    );
}

fn print_version() {
    println!("fomio {}", fomio::VERSION);
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn client(config: &Config) -> Result<Arc<DiscourseClient>> {
    Ok(Arc::new(fomio::api::connect(config)?))
}

fn open_store(config: &Config) -> Option<Arc<DeviceStore>> {
    match DeviceStore::open() {
        Ok(store) => {
            if let Err(e) = store.clear_old_cache(config.cache_max_age_hours) {
                tracing::warn!("Failed to evict cached topics: {}", e);
            }
            Some(Arc::new(store))
        }
        Err(e) => {
            tracing::warn!("Device storage unavailable: {:#}", e);
            None
        }
    }
}

async fn auth_flow(config: &Config, api_key: Option<String>, username: Option<String>) -> Result<()> {
    let site = config.site();

    let key = match api_key {
        Some(key) => key,
        None => {
            let url = format!("{}/my/preferences/apps", site);
            println!("🔑 Signing in to {}", site);
            println!("\nCreate an API key, then paste it here:\n\n  {}\n", url);
            if config.open_browser {
                let _ = open::that(&url);
            }
            prompt("API key")?
        }
    };
    if key.is_empty() {
        anyhow::bail!("No API key given");
    }

    let credentials = match username.filter(|u| !u.is_empty()) {
        Some(username) => ApiCredentials::ApiKey { key, username },
        None => ApiCredentials::UserApiKey {
            key,
            client_id: None,
        },
    };

    let client = DiscourseClient::new(site, Some(credentials.clone()));
    let user = client
        .current_user()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .context("The key was rejected")?;

    auth::store_credentials(site, &credentials)?;
    AuthEvents::global().emit(&AuthEvent::SignedIn {
        username: user.username,
    });
    Ok(())
}

fn logout(config: &Config) -> Result<()> {
    auth::delete_credentials(config.site())?;
    AuthEvents::global().emit(&AuthEvent::SignedOut);
    Ok(())
}

async fn whoami(config: &Config) -> Result<()> {
    let client = client(config)?;
    if !client.is_authenticated() {
        println!("Not signed in. Run: fomio auth");
        return Ok(());
    }

    let user = client.current_user().await?;
    println!("{} (@{}) on {}", user.display_name(), user.username, config.site());
    Ok(())
}

async fn list_hubs(config: &Config) -> Result<()> {
    let client = client(config)?;
    let hubs = group_hubs(client.categories().await?);

    if hubs.is_empty() {
        println!("No Hubs found on {}", config.site());
        return Ok(());
    }

    for hub in hubs {
        println!("\n{} ({} Terets)", hub.category.name, hub.terets.len());
        for teret in &hub.terets {
            println!(
                "  [{}] {} · {} Bytes",
                teret.category.id, teret.category.name, teret.category.topic_count
            );
        }
    }
    Ok(())
}

fn topic_id(config: &Config, target: &str) -> Result<u64> {
    if let Ok(id) = target.parse() {
        return Ok(id);
    }
    match Route::parse(target, config.site())? {
        Route::Byte { id, .. } => Ok(id),
        other => Err(anyhow::anyhow!("Not a Byte link: {:?}", other)),
    }
}

async fn load_thread(config: &Config, target: &str) -> Result<CommentThread<DiscourseClient>> {
    let mut thread = CommentThread::new(client(config)?, topic_id(config, target)?)
        .with_settle(config.scroll_settle());
    if let Some(store) = open_store(config) {
        thread = thread.with_cache(store);
    }

    if let fomio::feed::LoadSource::Cache(at) = thread.load().await? {
        println!("(offline, showing copy from {})", at.format("%Y-%m-%d %H:%M"));
    }
    Ok(thread)
}

fn print_comment(comment: &Comment, width: usize) {
    let indent = if comment.is_reply { "    " } else { "" };
    println!(
        "\n{}#{} @{} · {}  [post {}]",
        indent,
        comment.post_number,
        comment.author_username,
        comment.relative_time(),
        comment.id
    );
    let options = textwrap::Options::new(width.saturating_sub(indent.len()).max(20))
        .initial_indent(indent)
        .subsequent_indent(indent);
    println!("{}", textwrap::fill(&comment.content, options));
    let liked = if comment.liked { "♥" } else { "♡" };
    let saved = if comment.bookmark_id.is_some() { "  🔖" } else { "" };
    println!("{}{} {}{}", indent, liked, comment.likes, saved);
}

async fn show_topic(config: &Config, target: &str) -> Result<()> {
    let thread = load_thread(config, target).await?;
    let Some(topic) = thread.topic() else {
        return Ok(());
    };

    println!("{}", topic.title);
    println!("{}", topic.url(config.site()));
    println!("{}", "─".repeat(config.wrap_width.min(80)));

    if let Some(opening) = &topic.opening {
        println!("{}", textwrap::fill(&opening.content, config.wrap_width));
    }
    for comment in thread.comments() {
        print_comment(&comment, config.wrap_width);
    }
    Ok(())
}

async fn reply(config: &Config, target: &str, text: &str, to: Option<&str>) -> Result<()> {
    let thread = load_thread(config, target).await?;

    if let Some(comment_id) = to
        && let ReplyTarget::Notice(notice) = thread.reply_to(comment_id)
    {
        println!("{}", notice);
        return Ok(());
    }

    match thread.submit_comment(text).await {
        Ok(created) => {
            println!("✓ Posted as #{}", created.post_number);
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("{}", e)),
    }
}

async fn toggle(config: &Config, target: &str, post_id: u64, bookmark: bool) -> Result<()> {
    let thread = load_thread(config, target).await?;
    let actions = PostActions::new(client(config)?);
    actions.track(&thread.comments());

    if bookmark {
        let toggle = actions.toggle_bookmark(post_id).await?;
        let state = if toggle.is_active() { "Bookmarked" } else { "Removed bookmark from" };
        println!("✓ {} post {}", state, post_id);
    } else {
        let toggle = actions.toggle_like(post_id).await?;
        let state = if toggle.is_active() { "Liked" } else { "Unliked" };
        println!("✓ {} post {} ({} likes)", state, post_id, toggle.count().unwrap_or(0));
    }
    Ok(())
}

async fn composer(config: &Config, draft_key: Option<&str>) -> Result<DraftController<DiscourseClient>> {
    let Some(store) = open_store(config) else {
        anyhow::bail!("Drafts need device storage");
    };
    let store: Arc<dyn fomio::store::DraftMetaStore> = store;
    let controller = DraftController::new(client(config)?, store)
        .with_debounce(config.draft_debounce())
        .with_default_key(&config.default_draft_key);
    controller.hydrate(draft_key).await;
    if let Some(error) = controller.snapshot().error {
        println!("(couldn't load the saved draft: {})", error);
    }
    Ok(controller)
}

async fn compose(
    config: &Config,
    title: Option<String>,
    body: Option<String>,
    teret: Option<u64>,
    post: bool,
    draft_key: Option<&str>,
) -> Result<()> {
    let api = client(config)?;
    let controller = composer(config, draft_key).await?;

    if let Some(title) = title {
        controller.edit_title(&title);
    }
    if let Some(body) = body {
        controller.edit_body(&body);
    }
    if let Some(id) = teret {
        let hubs = group_hubs(api.categories().await?);
        let teret = find_teret(&hubs, id)
            .ok_or_else(|| anyhow::anyhow!("{} is not a Teret you can post in", id))?;
        controller.select_teret(teret);
    }

    if !post {
        match controller.save_now().await? {
            SaveOutcome::Saved { sequence } => println!("✓ Draft saved (sequence {})", sequence),
            SaveOutcome::Deleted => println!("✓ Empty draft discarded"),
            SaveOutcome::SkippedEmpty | SaveOutcome::Unchanged => println!("Nothing to save"),
        }
        return Ok(());
    }

    let thresholds = api.validation_thresholds().await?;
    if thresholds.is_default() {
        println!(
            "(site settings unavailable, using default minimums: title {}, post {} characters)",
            thresholds.min_title, thresholds.min_post
        );
    }
    let created = controller.submit(thresholds).await?;
    println!("✓ Posted: {}/t/{}/{}", config.site(), created.topic_slug, created.topic_id);
    Ok(())
}

async fn draft(config: &Config, clear: bool, draft_key: Option<&str>) -> Result<()> {
    let controller = composer(config, draft_key).await?;

    if clear {
        controller.edit_title("");
        controller.edit_body("");
        for image in controller.snapshot().content.images {
            controller.remove_image(image.id);
        }
        controller.save_now().await?;
        println!("✓ Draft cleared");
        return Ok(());
    }

    let snapshot = controller.snapshot();
    if snapshot.content.is_empty() {
        println!("No saved draft ({})", snapshot.draft_key);
        return Ok(());
    }

    println!("Draft {} (sequence {})", snapshot.draft_key, snapshot.sequence);
    println!("Title: {}", snapshot.content.title);
    if let Some(id) = snapshot.content.category_id {
        println!("Teret: {}", id);
    }
    println!("\n{}", textwrap::fill(&snapshot.content.body, config.wrap_width));
    Ok(())
}

async fn open_link(config: &Config, link: &str) -> Result<()> {
    let route = Route::parse(link, config.site())?;
    match route {
        Route::Byte { id, .. } => show_topic(config, &id.to_string()).await,
        Route::Compose { draft_key } => draft(config, false, draft_key.as_deref()).await,
        other => {
            println!("{:?}\n{}", other, other.to_link());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        std::iter::once("fomio")
            .chain(line.split_whitespace())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_compose_draft_key() {
        let command = parse_args(&args("compose --draft topic_5 --title Hello --post")).unwrap();
        assert_eq!(
            command,
            Command::Compose {
                title: Some("Hello".to_string()),
                body: None,
                teret: None,
                post: true,
                draft_key: Some("topic_5".to_string()),
            }
        );

        let command = parse_args(&args("compose -t Hello")).unwrap();
        assert!(matches!(command, Command::Compose { draft_key: None, .. }));
    }

    #[test]
    fn test_draft_key_with_action() {
        assert_eq!(
            parse_args(&args("draft show --draft x")).unwrap(),
            Command::Draft {
                clear: false,
                draft_key: Some("x".to_string()),
            }
        );
        assert_eq!(
            parse_args(&args("draft --draft x")).unwrap(),
            Command::Draft {
                clear: false,
                draft_key: Some("x".to_string()),
            }
        );
        assert_eq!(
            parse_args(&args("draft clear -d topic_9")).unwrap(),
            Command::Draft {
                clear: true,
                draft_key: Some("topic_9".to_string()),
            }
        );
        assert!(parse_args(&args("draft archive")).is_err());
    }

    #[test]
    fn test_compose_link_carries_draft_key() {
        let route = Route::parse("fomio://compose?draft=topic_5", "https://meta.fomio.app").unwrap();
        assert_eq!(
            route,
            Route::Compose {
                draft_key: Some("topic_5".to_string())
            }
        );
    }
}
