use anyhow::{bail, Result};
use client_core::{FetchMode, FetchOutcome, FetchState, ListFetchController, PageSource};
use shared::protocol::{Article, Payment, ScheduledTask, Source};
use tracing::debug;

/// Drives `feed` through `pages` pages and prints what ends up visible.
/// Items fetched before a failure are still printed; the failure is
/// returned afterwards.
pub async fn print_pages<S, F>(
    feed: ListFetchController<S>,
    params: S::Params,
    pages: usize,
    render: F,
) -> Result<()>
where
    S: PageSource,
    F: Fn(&S::Item) -> String,
{
    let mut outcome = feed.load(params).await;
    for _ in 1..pages.max(1) {
        if outcome != FetchOutcome::Applied {
            break;
        }
        outcome = feed.load_more().await;
        debug!(?outcome, "next page");
    }

    let state = feed.state();
    println!("{}", render_state(&state, feed.mode(), feed.page_size(), render));
    match &state.error {
        Some(error) if error.requires_reauth() => {
            bail!("{} (sign in with `newsdesk login`)", error.message)
        }
        Some(error) => bail!("{}", error.message),
        None => Ok(()),
    }
}

fn render_state<T, F>(state: &FetchState<T>, mode: FetchMode, page_size: usize, render: F) -> String
where
    F: Fn(&T) -> String,
{
    let mut lines: Vec<String> = state.items.iter().map(render).collect();
    if lines.is_empty() && state.error.is_none() {
        lines.push("(nothing to show)".to_string());
    }
    lines.push(footer(state, mode, page_size));
    lines.join("\n")
}

fn footer<T>(state: &FetchState<T>, mode: FetchMode, page_size: usize) -> String {
    let total = state
        .total
        .map_or_else(|| "?".to_string(), |total| total.to_string());
    let more = if state.has_more { "more available" } else { "end of list" };
    match mode {
        FetchMode::Append => format!("-- {} shown of {total}, {more}", state.items.len()),
        FetchMode::Replace => {
            let pages = state
                .total_pages(page_size)
                .map_or_else(|| "?".to_string(), |pages| pages.max(1).to_string());
            format!(
                "-- page {}/{pages}, {total} total, {more}",
                state.current_page(page_size)
            )
        }
    }
}

pub fn article_line(article: &Article) -> String {
    let id = article
        .id
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    let mut line = format!("[{id}] {}", article.title);
    if let Some(category) = &article.category {
        line.push_str(&format!(" ({category})"));
    }
    if let Some(source) = &article.source_name {
        line.push_str(&format!(" - {source}"));
    }
    if let Some(published) = &article.published_at {
        line.push_str(&format!(" @ {published}"));
    }
    line.push_str(&format!("\n    {}", article.url));
    line
}

pub fn source_line(source: &Source) -> String {
    let status = if source.active { "active" } else { "inactive" };
    format!("[{}] {} <{}> {status}", source.id, source.name, source.url)
}

pub fn task_line(task: &ScheduledTask) -> String {
    let status = if task.active { "active" } else { "paused" };
    let source = task
        .source_id
        .map_or_else(|| "all sources".to_string(), |id| format!("source {id}"));
    let next = task.next_run.as_deref().unwrap_or("not scheduled");
    format!(
        "{} every {}m, {source}, limit {} [{status}] next: {next}",
        task.name, task.interval_minutes, task.limit
    )
}

pub fn payment_line(payment: &Payment) -> String {
    let who = payment.username.as_deref().unwrap_or("-");
    let plan = payment
        .plan_name
        .clone()
        .unwrap_or_else(|| format!("plan {}", payment.plan_id));
    format!(
        "[{}] {plan} {:.2} via {:?} {:?} by {who}",
        payment.id, payment.amount, payment.method, payment.status
    )
}
