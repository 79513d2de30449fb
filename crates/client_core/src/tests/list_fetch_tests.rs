use super::*;

use std::{collections::VecDeque, sync::Mutex as StdMutex};

use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq)]
struct Filter {
    category: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
struct Call {
    category: &'static str,
    offset: usize,
    limit: usize,
}

struct Reply {
    result: Result<Page<String>, ClientError>,
    started: Option<oneshot::Sender<()>>,
    release: Option<oneshot::Receiver<()>>,
}

/// Answers fetches in call order from a queue of scripted replies. Gated
/// replies signal when the fetch starts and hold until released.
#[derive(Default)]
struct ScriptedSource {
    calls: StdMutex<Vec<Call>>,
    replies: StdMutex<VecDeque<Reply>>,
}

impl ScriptedSource {
    fn reply(&self, result: Result<Page<String>, ClientError>) {
        self.replies.lock().expect("replies").push_back(Reply {
            result,
            started: None,
            release: None,
        });
    }

    fn gated_reply(
        &self,
        result: Result<Page<String>, ClientError>,
    ) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.replies.lock().expect("replies").push_back(Reply {
            result,
            started: Some(started_tx),
            release: Some(release_rx),
        });
        (started_rx, release_tx)
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls").clone()
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    type Params = Filter;
    type Item = String;

    async fn fetch_page(
        &self,
        params: &Filter,
        offset: usize,
        limit: usize,
    ) -> Result<Page<String>, ClientError> {
        self.calls.lock().expect("calls").push(Call {
            category: params.category,
            offset,
            limit,
        });
        let reply = self
            .replies
            .lock()
            .expect("replies")
            .pop_front()
            .expect("unexpected fetch");
        if let Some(started) = reply.started {
            let _ = started.send(());
        }
        if let Some(release) = reply.release {
            let _ = release.await;
        }
        reply.result
    }
}

fn page(items: &[&str], total: u64, has_more: bool) -> Result<Page<String>, ClientError> {
    Ok(Page {
        items: items.iter().map(|item| item.to_string()).collect(),
        total,
        has_more,
    })
}

fn tech() -> Filter {
    Filter { category: "tech" }
}

fn sports() -> Filter {
    Filter { category: "sports" }
}

fn controller(
    source: &Arc<ScriptedSource>,
    mode: FetchMode,
    page_size: usize,
) -> Arc<ListFetchController<ScriptedSource>> {
    Arc::new(ListFetchController::new(Arc::clone(source), mode, page_size))
}

#[tokio::test]
async fn short_page_in_append_mode_ends_the_feed() {
    let source = Arc::new(ScriptedSource::default());
    source.reply(page(&["a", "b", "c"], 50, true));
    source.reply(page(&["d", "e"], 50, false));
    let feed = controller(&source, FetchMode::Append, 3);

    assert_eq!(feed.load(tech()).await, FetchOutcome::Applied);
    let state = feed.state();
    assert_eq!(state.items, vec!["a", "b", "c"]);
    assert_eq!(state.offset, 3);
    assert!(state.has_more);
    assert_eq!(state.total, Some(50));

    assert_eq!(feed.load_more().await, FetchOutcome::Applied);
    let state = feed.state();
    assert_eq!(state.items, vec!["a", "b", "c", "d", "e"]);
    assert_eq!(state.offset, 5);
    assert!(!state.has_more);

    assert_eq!(feed.load_more().await, FetchOutcome::Skipped);
    assert_eq!(
        source.calls(),
        vec![
            Call {
                category: "tech",
                offset: 0,
                limit: 3
            },
            Call {
                category: "tech",
                offset: 3,
                limit: 3
            },
        ]
    );
}

#[tokio::test]
async fn slow_response_for_superseded_params_is_discarded() {
    let source = Arc::new(ScriptedSource::default());
    let (tech_started, release_tech) = source.gated_reply(page(&["t1", "t2"], 2, false));
    source.reply(page(&["s1"], 1, false));
    let feed = controller(&source, FetchMode::Replace, 10);

    let stale_load = tokio::spawn({
        let feed = Arc::clone(&feed);
        async move { feed.load(tech()).await }
    });
    tech_started.await.expect("tech fetch started");

    assert_eq!(feed.load(sports()).await, FetchOutcome::Applied);
    release_tech.send(()).expect("release tech");
    assert_eq!(stale_load.await.expect("join"), FetchOutcome::Stale);

    let state = feed.state();
    assert_eq!(state.items, vec!["s1"]);
    assert_eq!(state.offset, 1);
    assert!(!state.loading);
    assert_eq!(feed.params().await, Some(sports()));
}

#[tokio::test]
async fn load_more_while_one_is_outstanding_fetches_once() {
    let source = Arc::new(ScriptedSource::default());
    source.reply(page(&["a", "b"], 10, true));
    let (next_started, release_next) = source.gated_reply(page(&["c", "d"], 10, true));
    let feed = controller(&source, FetchMode::Append, 2);
    feed.load(tech()).await;

    let first = tokio::spawn({
        let feed = Arc::clone(&feed);
        async move { feed.load_more().await }
    });
    next_started.await.expect("next page started");

    assert!(feed.state().loading_more);
    assert_eq!(feed.load_more().await, FetchOutcome::Skipped);

    release_next.send(()).expect("release");
    assert_eq!(first.await.expect("join"), FetchOutcome::Applied);
    assert_eq!(source.calls().len(), 2);
    assert_eq!(feed.state().items, vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn full_pages_advance_offset_by_page_size() {
    let source = Arc::new(ScriptedSource::default());
    source.reply(page(&["1", "2"], 100, true));
    source.reply(page(&["3", "4"], 100, true));
    source.reply(page(&["5", "6"], 100, true));
    source.reply(page(&["7", "8"], 100, true));
    let feed = controller(&source, FetchMode::Append, 2);

    feed.load(tech()).await;
    for _ in 0..3 {
        assert_eq!(feed.load_more().await, FetchOutcome::Applied);
    }

    let state = feed.state();
    assert_eq!(state.offset, 8);
    assert_eq!(state.items.len(), 8);
    assert!(state.has_more);
    let offsets: Vec<usize> = source.calls().iter().map(|call| call.offset).collect();
    assert_eq!(offsets, vec![0, 2, 4, 6]);
}

#[tokio::test]
async fn replace_mode_swaps_items_and_stops_after_short_page() {
    let source = Arc::new(ScriptedSource::default());
    source.reply(page(&["a", "b", "c"], 4, true));
    source.reply(page(&["d"], 4, true));
    let feed = controller(&source, FetchMode::Replace, 3);

    feed.load(tech()).await;
    assert_eq!(feed.state().current_page(3), 1);
    assert_eq!(feed.state().total_pages(3), Some(2));

    assert_eq!(feed.load_more().await, FetchOutcome::Applied);
    let state = feed.state();
    assert_eq!(state.items, vec!["d"]);
    assert_eq!(state.offset, 4);
    assert!(!state.has_more);
    assert_eq!(state.current_page(3), 2);

    assert_eq!(feed.load_more().await, FetchOutcome::Skipped);
    assert_eq!(source.calls().len(), 2);
}

#[tokio::test]
async fn server_can_end_the_list_with_a_full_page() {
    let source = Arc::new(ScriptedSource::default());
    source.reply(page(&["a", "b"], 2, false));
    let feed = controller(&source, FetchMode::Append, 2);

    feed.load(tech()).await;
    assert!(!feed.state().has_more);
    assert_eq!(feed.load_more().await, FetchOutcome::Skipped);
}

#[tokio::test]
async fn failure_keeps_items_and_reload_recovers() {
    let source = Arc::new(ScriptedSource::default());
    source.reply(page(&["a", "b"], 10, true));
    source.reply(Err(ClientError::Network("connection refused".into())));
    source.reply(page(&["a2", "b2"], 10, true));
    let feed = controller(&source, FetchMode::Append, 2);

    feed.load(tech()).await;
    assert_eq!(feed.load_more().await, FetchOutcome::Failed);

    let state = feed.state();
    assert_eq!(state.items, vec!["a", "b"]);
    assert_eq!(state.offset, 2);
    assert!(!state.loading_more);
    assert_eq!(state.phase(), FetchPhase::Errored);
    let error = state.error.expect("error recorded");
    assert!(error.message.contains("connection refused"));
    assert_eq!(error.status, None);

    assert_eq!(feed.reload().await, FetchOutcome::Applied);
    let state = feed.state();
    assert_eq!(state.error, None);
    assert_eq!(state.items, vec!["a2", "b2"]);
    assert_eq!(state.offset, 2);
    assert_eq!(state.phase(), FetchPhase::Loaded);
}

#[tokio::test]
async fn reload_keeps_items_visible_until_the_page_lands() {
    let source = Arc::new(ScriptedSource::default());
    source.reply(page(&["a", "b"], 2, false));
    let (reload_started, release_reload) =
        source.gated_reply(Err(ClientError::server(500, "Error obteniendo noticias")));
    let feed = controller(&source, FetchMode::Replace, 5);
    feed.load(tech()).await;

    let reload = tokio::spawn({
        let feed = Arc::clone(&feed);
        async move { feed.reload().await }
    });
    reload_started.await.expect("reload started");
    let state = feed.state();
    assert!(state.loading);
    assert_eq!(state.items, vec!["a", "b"]);

    release_reload.send(()).expect("release");
    assert_eq!(reload.await.expect("join"), FetchOutcome::Failed);
    let state = feed.state();
    assert_eq!(state.items, vec!["a", "b"]);
    assert_eq!(state.error.expect("error").status, Some(500));
}

#[tokio::test]
async fn set_params_is_idempotent_for_equal_params() {
    let source = Arc::new(ScriptedSource::default());
    source.reply(page(&["a"], 1, false));
    let feed = controller(&source, FetchMode::Replace, 5);

    assert_eq!(feed.set_params(tech()).await, FetchOutcome::Applied);
    assert_eq!(feed.set_params(tech()).await, FetchOutcome::Skipped);
    assert_eq!(source.calls().len(), 1);
}

#[tokio::test]
async fn set_params_resets_pagination_before_first_page_arrives() {
    let source = Arc::new(ScriptedSource::default());
    source.reply(page(&["a", "b"], 9, true));
    source.reply(page(&["c", "d"], 9, true));
    let (sports_started, release_sports) = source.gated_reply(page(&["s1"], 1, false));
    let feed = controller(&source, FetchMode::Append, 2);
    feed.set_params(tech()).await;
    feed.load_more().await;
    assert_eq!(feed.state().offset, 4);

    let switch = tokio::spawn({
        let feed = Arc::clone(&feed);
        async move { feed.set_params(sports()).await }
    });
    sports_started.await.expect("sports started");

    let pending = feed.state();
    assert_eq!(pending.offset, 0);
    assert!(pending.has_more);
    assert!(pending.items.is_empty());
    assert!(pending.loading);
    assert_eq!(pending.total, None);

    release_sports.send(()).expect("release");
    assert_eq!(switch.await.expect("join"), FetchOutcome::Applied);
    assert_eq!(feed.state().items, vec!["s1"]);
}

#[tokio::test]
async fn load_supersedes_an_outstanding_load_more() {
    let source = Arc::new(ScriptedSource::default());
    source.reply(page(&["a", "b"], 9, true));
    let (more_started, release_more) = source.gated_reply(page(&["c", "d"], 9, true));
    source.reply(page(&["s1", "s2"], 2, false));
    let feed = controller(&source, FetchMode::Append, 2);
    feed.load(tech()).await;

    let more = tokio::spawn({
        let feed = Arc::clone(&feed);
        async move { feed.load_more().await }
    });
    more_started.await.expect("load more started");

    assert_eq!(feed.load(sports()).await, FetchOutcome::Applied);
    release_more.send(()).expect("release");
    assert_eq!(more.await.expect("join"), FetchOutcome::Stale);

    let state = feed.state();
    assert_eq!(state.items, vec!["s1", "s2"]);
    assert_eq!(state.offset, 2);
    assert!(!state.loading_more);
}

#[tokio::test]
async fn commands_before_first_load_are_noops() {
    let source = Arc::new(ScriptedSource::default());
    let feed = controller(&source, FetchMode::Append, 2);

    assert_eq!(feed.state().phase(), FetchPhase::Idle);
    assert_eq!(feed.load_more().await, FetchOutcome::Skipped);
    assert_eq!(feed.reload().await, FetchOutcome::Skipped);
    assert!(source.calls().is_empty());
}

#[tokio::test]
async fn empty_result_is_a_loaded_state() {
    let source = Arc::new(ScriptedSource::default());
    source.reply(Ok(Page::empty()));
    let feed = controller(&source, FetchMode::Append, 12);

    assert_eq!(feed.load(tech()).await, FetchOutcome::Applied);
    let state = feed.state();
    assert_eq!(state.phase(), FetchPhase::Loaded);
    assert!(state.items.is_empty());
    assert!(!state.has_more);
    assert_eq!(state.error, None);
}

#[tokio::test]
async fn unauthorized_failure_asks_for_reauth() {
    let source = Arc::new(ScriptedSource::default());
    source.reply(Err(ClientError::server(401, "Token expirado")));
    let feed = controller(&source, FetchMode::Replace, 12);

    assert_eq!(feed.load(tech()).await, FetchOutcome::Failed);
    let error = feed.state().error.expect("error");
    assert!(error.requires_reauth());
}

#[tokio::test]
async fn subscribers_see_each_transition() {
    let source = Arc::new(ScriptedSource::default());
    let (started, release) = source.gated_reply(page(&["a"], 1, false));
    let feed = controller(&source, FetchMode::Replace, 12);
    let mut updates = feed.subscribe();

    let load = tokio::spawn({
        let feed = Arc::clone(&feed);
        async move { feed.load(tech()).await }
    });
    started.await.expect("started");
    assert!(updates.borrow_and_update().loading);

    release.send(()).expect("release");
    updates.changed().await.expect("update");
    let state = updates.borrow_and_update().clone();
    assert!(!state.loading);
    assert_eq!(state.items, vec!["a"]);
    assert_eq!(load.await.expect("join"), FetchOutcome::Applied);
}

#[test]
fn slicing_reports_remaining_items() {
    let all: Vec<u32> = (1..=5).collect();

    let first = Page::from_slice(all.clone(), 0, 2);
    assert_eq!(first.items, vec![1, 2]);
    assert_eq!(first.total, 5);
    assert!(first.has_more);

    let last = Page::from_slice(all.clone(), 4, 2);
    assert_eq!(last.items, vec![5]);
    assert!(!last.has_more);

    let past_end = Page::from_slice(all, 9, 2);
    assert!(past_end.items.is_empty());
    assert!(!past_end.has_more);
}
