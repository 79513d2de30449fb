use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    feeds::{
        NewsFeed, PaymentHistoryFeed, PendingPaymentFeed, SearchFeed, SourceFeed, TaskFeed,
    },
    load_settings, to_pretty_json, ClientSettings, DashboardClient, FetchMode,
    ListFetchController, NewsQuery, SearchQuery, SourceFilter,
};
use shared::{
    domain::{ExportFormat, PaymentId, PaymentMethod, PlanId, SortOrder, SourceId},
    protocol::{NewTask, PaymentCheckout, SourceUpdate},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod listing;

#[derive(Parser, Debug)]
#[command(name = "newsdesk", about = "Terminal client for the news scraping dashboard")]
struct Cli {
    /// Backend root, e.g. http://localhost:8001
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Bearer token from a previous `login`.
    #[arg(long, global = true)]
    token: Option<String>,
    #[arg(long, global = true)]
    page_size: Option<usize>,
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Show only the last page fetched.
    Pages,
    /// Accumulate every page fetched.
    Scroll,
}

impl From<Mode> for FetchMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Pages => FetchMode::Replace,
            Mode::Scroll => FetchMode::Append,
        }
    }
}

#[derive(clap::Args, Debug)]
struct Paging {
    /// How many pages to fetch.
    #[arg(long, default_value_t = 1)]
    pages: usize,
    #[arg(long, value_enum, default_value = "scroll")]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        username: String,
        #[arg(long, env = "NEWSDESK_PASSWORD")]
        password: String,
    },
    Register {
        username: String,
        email: String,
        #[arg(long, env = "NEWSDESK_PASSWORD")]
        password: String,
    },
    Profile,
    /// Saved news, newest first.
    News {
        #[arg(long)]
        source: Option<i64>,
        #[arg(long)]
        category: Option<String>,
        #[command(flatten)]
        paging: Paging,
    },
    Count,
    Categories,
    Search {
        text: Option<String>,
        #[arg(long)]
        source: Option<i64>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long, default_value = "desc")]
        order: SortOrder,
        #[command(flatten)]
        paging: Paging,
    },
    Keywords {
        #[arg(required = true)]
        words: Vec<String>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    Export {
        #[arg(long, default_value = "json")]
        format: ExportFormat,
        #[arg(long, default_value_t = 100)]
        limit: u32,
        #[arg(long)]
        source: Option<i64>,
        /// Defaults to `noticias.<format>` in the working directory.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Deletes every saved article.
    ClearNews {
        #[arg(long)]
        yes: bool,
    },
    Scrape {
        #[arg(long, default_value_t = 5)]
        limit: u32,
        #[arg(long)]
        source: Option<i64>,
    },
    Quota,
    Sources {
        #[command(subcommand)]
        command: SourceCommand,
    },
    Tasks {
        #[command(subcommand)]
        command: TaskCommand,
    },
    Stats {
        #[arg(long)]
        trend_days: Option<u32>,
        #[arg(long)]
        top: Option<u32>,
    },
    Plans,
    MyPlan,
    /// Starts a payment for a plan and prints the next step.
    Subscribe {
        plan_id: i64,
        #[arg(long, default_value = "yape")]
        method: PaymentMethod,
    },
    ChangePlan {
        plan_id: i64,
        payment_id: i64,
    },
    VerifyYape {
        payment_id: i64,
        #[arg(long)]
        receipt: Option<PathBuf>,
    },
    Payments {
        #[command(flatten)]
        paging: Paging,
    },
    Admin {
        #[command(subcommand)]
        command: AdminCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SourceCommand {
    List {
        #[arg(long)]
        active: bool,
        #[command(flatten)]
        paging: Paging,
    },
    Show {
        id: i64,
    },
    Add {
        name: String,
        url: String,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },
    Remove {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    List {
        #[command(flatten)]
        paging: Paging,
    },
    Show {
        name: String,
    },
    Create {
        name: String,
        /// Interval in minutes.
        #[arg(long)]
        every: u32,
        #[arg(long)]
        source: Option<i64>,
        #[arg(long, default_value_t = 5)]
        limit: u32,
    },
    Pause {
        name: String,
    },
    Resume {
        name: String,
    },
    Remove {
        name: String,
    },
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    Pending {
        #[command(flatten)]
        paging: Paging,
    },
    Approve {
        payment_id: i64,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("newsdesk=info,client_core=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_settings(cli: &Cli) -> ClientSettings {
    let mut settings = load_settings();
    if let Some(api_url) = &cli.api_url {
        settings.api_url = api_url.clone();
    }
    if let Some(token) = &cli.token {
        settings.token = Some(token.clone());
    }
    if let Some(page_size) = cli.page_size {
        settings.page_size = page_size.max(1);
    }
    if let Some(timeout) = cli.timeout_secs {
        settings.request_timeout_secs = timeout;
    }
    settings
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = resolve_settings(&cli);
    info!(api_url = %settings.api_url, page_size = settings.page_size, "starting");

    let client = Arc::new(
        DashboardClient::from_settings(&settings).context("invalid client settings")?,
    );
    run(cli.command, client, settings.page_size).await
}

async fn run(command: Command, client: Arc<DashboardClient>, page_size: usize) -> Result<()> {
    match command {
        Command::Login { username, password } => {
            let user = client.login(&username, &password).await?;
            let session = client.session().await;
            println!("signed in as {} ({:?})", user.username, user.role);
            if let Some(token) = session.token() {
                println!("export NEWSDESK_TOKEN={token}");
            }
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let user = client.register(&username, &email, &password).await?;
            println!("registered {} (id {})", user.username, user.id);
            if let Some(token) = client.session().await.token() {
                println!("export NEWSDESK_TOKEN={token}");
            }
        }
        Command::Profile => {
            let user = client.profile().await?;
            println!("{}", to_pretty_json(&user));
        }
        Command::News {
            source,
            category,
            paging,
        } => {
            let feed = ListFetchController::new(
                Arc::new(NewsFeed::new(client)),
                paging.mode.into(),
                page_size,
            );
            let query = NewsQuery {
                source_id: source.map(SourceId),
                category,
            };
            listing::print_pages(feed, query, paging.pages, listing::article_line).await?;
        }
        Command::Count => println!("{}", client.count_news().await?),
        Command::Categories => {
            for category in client.categories().await? {
                println!("{category}");
            }
        }
        Command::Search {
            text,
            source,
            from,
            to,
            order,
            paging,
        } => {
            let feed = ListFetchController::new(
                Arc::new(SearchFeed::new(client)),
                paging.mode.into(),
                page_size,
            );
            let query = SearchQuery {
                text,
                source_id: source.map(SourceId),
                date_from: from,
                date_to: to,
                order,
            };
            listing::print_pages(feed, query, paging.pages, listing::article_line).await?;
        }
        Command::Keywords { words, limit } => {
            let response = client.search_keywords(&words, limit).await?;
            for article in &response.results {
                println!("{}", listing::article_line(article));
            }
            println!("-- {} matches", response.total);
        }
        Command::Export {
            format,
            limit,
            source,
            out,
        } => {
            let bytes = client
                .export_news(format, limit, source.map(SourceId))
                .await?;
            let out =
                out.unwrap_or_else(|| PathBuf::from(format!("noticias.{}", format.extension())));
            tokio::fs::write(&out, &bytes)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("wrote {} bytes to {}", bytes.len(), out.display());
        }
        Command::ClearNews { yes } => {
            if !yes {
                bail!("refusing to delete every saved article without --yes");
            }
            let message = client.clear_news().await?;
            println!("{}", message.unwrap_or_else(|| "news cleared".into()));
        }
        Command::Scrape { limit, source } => {
            let response = client.run_scraping(limit, source.map(SourceId)).await?;
            for article in &response.articles {
                println!("{}", listing::article_line(article));
            }
            println!(
                "-- scraped {} (saved: {})",
                response.total, response.persisted
            );
        }
        Command::Quota => println!("{}", to_pretty_json(&client.scraping_stats().await?)),
        Command::Sources { command } => run_sources(command, client, page_size).await?,
        Command::Tasks { command } => run_tasks(command, client, page_size).await?,
        Command::Stats { trend_days, top } => {
            println!("{}", to_pretty_json(&client.general_stats().await?));
            if let Some(days) = trend_days {
                println!("{}", to_pretty_json(&client.trends(days).await?));
            }
            if let Some(limit) = top {
                println!("{}", to_pretty_json(&client.top_sources(limit).await?));
            }
        }
        Command::Plans => {
            for plan in client.list_plans().await? {
                let sources = if plan.has_unlimited_sources() {
                    "unlimited sources".to_string()
                } else {
                    format!("{} sources", plan.source_limit)
                };
                println!("[{}] {} {:.2} ({sources})", plan.id, plan.name, plan.price);
            }
        }
        Command::MyPlan => println!("{}", to_pretty_json(&client.my_plan().await?)),
        Command::Subscribe { plan_id, method } => {
            let checkout = client.create_payment(PlanId(plan_id), method).await?;
            match &checkout {
                PaymentCheckout::Yape { payment_id, .. } => println!(
                    "payment {payment_id} created; pay with Yape, then run `newsdesk verify-yape {payment_id} --receipt <image>`"
                ),
                PaymentCheckout::Paypal {
                    payment_id,
                    approval_url,
                    ..
                } => println!("payment {payment_id} created; approve it at {approval_url}"),
                PaymentCheckout::Stripe {
                    payment_id,
                    checkout_url,
                    ..
                } => println!("payment {payment_id} created; pay at {checkout_url}"),
            }
            println!("{}", to_pretty_json(&checkout));
        }
        Command::ChangePlan {
            plan_id,
            payment_id,
        } => {
            let response = client
                .change_plan(PlanId(plan_id), PaymentId(payment_id))
                .await?;
            println!("{}", to_pretty_json(&response));
        }
        Command::VerifyYape {
            payment_id,
            receipt,
        } => {
            let image = match &receipt {
                Some(path) => Some(
                    tokio::fs::read(path)
                        .await
                        .with_context(|| format!("failed to read {}", path.display()))?,
                ),
                None => None,
            };
            let response = client
                .verify_yape(PaymentId(payment_id), image.as_deref())
                .await?;
            println!("payment {} is now {:?}", response.payment_id, response.status);
        }
        Command::Payments { paging } => {
            let feed = ListFetchController::new(
                Arc::new(PaymentHistoryFeed::new(client)),
                paging.mode.into(),
                page_size,
            );
            listing::print_pages(feed, (), paging.pages, listing::payment_line).await?;
        }
        Command::Admin { command } => match command {
            AdminCommand::Pending { paging } => {
                let feed = ListFetchController::new(
                    Arc::new(PendingPaymentFeed::new(client)),
                    paging.mode.into(),
                    page_size,
                );
                listing::print_pages(feed, (), paging.pages, listing::payment_line).await?;
            }
            AdminCommand::Approve { payment_id } => {
                let message = client.approve_payment(PaymentId(payment_id)).await?;
                println!("{}", message.unwrap_or_else(|| "payment approved".into()));
            }
        },
    }

    Ok(())
}

async fn run_sources(
    command: SourceCommand,
    client: Arc<DashboardClient>,
    page_size: usize,
) -> Result<()> {
    match command {
        SourceCommand::List { active, paging } => {
            let feed = ListFetchController::new(
                Arc::new(SourceFeed::new(client)),
                paging.mode.into(),
                page_size,
            );
            let filter = SourceFilter {
                active_only: active,
            };
            listing::print_pages(feed, filter, paging.pages, listing::source_line).await?;
        }
        SourceCommand::Show { id } => {
            let source = client.get_source(SourceId(id)).await?;
            println!("{}", listing::source_line(&source));
        }
        SourceCommand::Add { name, url } => {
            let source = client.create_source(&name, &url).await?;
            println!("created {}", listing::source_line(&source));
        }
        SourceCommand::Update {
            id,
            name,
            url,
            active,
        } => {
            let update = SourceUpdate { name, url, active };
            let source = client.update_source(SourceId(id), &update).await?;
            println!("updated {}", listing::source_line(&source));
        }
        SourceCommand::Remove { id } => {
            let message = client.delete_source(SourceId(id)).await?;
            println!("{}", message.unwrap_or_else(|| format!("source {id} removed")));
        }
    }
    Ok(())
}

async fn run_tasks(
    command: TaskCommand,
    client: Arc<DashboardClient>,
    page_size: usize,
) -> Result<()> {
    match command {
        TaskCommand::List { paging } => {
            let feed = ListFetchController::new(
                Arc::new(TaskFeed::new(client)),
                paging.mode.into(),
                page_size,
            );
            listing::print_pages(feed, (), paging.pages, listing::task_line).await?;
        }
        TaskCommand::Show { name } => {
            let task = client.get_task(&name).await?;
            println!("{}", listing::task_line(&task));
        }
        TaskCommand::Create {
            name,
            every,
            source,
            limit,
        } => {
            let task = NewTask {
                name,
                interval_minutes: every,
                source_id: source.map(SourceId),
                limit,
            };
            let created = client.create_task(&task).await?;
            println!("scheduled {}", listing::task_line(&created));
        }
        TaskCommand::Pause { name } => {
            let message = client.pause_task(&name).await?;
            println!("{}", message.unwrap_or_else(|| format!("{name} paused")));
        }
        TaskCommand::Resume { name } => {
            let message = client.resume_task(&name).await?;
            println!("{}", message.unwrap_or_else(|| format!("{name} resumed")));
        }
        TaskCommand::Remove { name } => {
            let message = client.delete_task(&name).await?;
            println!("{}", message.unwrap_or_else(|| format!("{name} removed")));
        }
    }
    Ok(())
}
