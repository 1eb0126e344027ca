//! Integration Tests for Asynchronous Resolution
//!
//! These tests run on a paused tokio clock, so timings are exact and the
//! tests finish instantly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::sleep;

use graph_state_core::reactive::{Context, GraphNode, Listener, Resolved, Store};
use graph_state_core::resource::{async_node, resource, Resource, SwrNode};
use graph_state_core::{GraphError, SwrConfig};

fn recorder<T>() -> (Arc<Mutex<Vec<T>>>, Listener<T>)
where
    T: Clone + Send + Sync + 'static,
{
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let listener = Listener::new(move |value: &Resolved<T>| {
        if let Ok(value) = value {
            seen_clone.lock().push(value.clone());
        }
    });
    (seen, listener)
}

/// Test a node that changes its own value from a timer.
#[tokio::test(start_paused = true)]
async fn node_mutates_itself_after_delay() {
    let status = GraphNode::derived(|ctx: &mut Context<'_, String>| {
        let handle = ctx.handle();
        ctx.spawn(async move {
            sleep(Duration::from_millis(1000)).await;
            let _ = handle.mutate(String::from("Changed"));
        })?;
        Ok(String::from("Initial"))
    });

    let store = Store::new();
    let (seen, listener) = recorder();
    assert_eq!(store.get_state(&status).unwrap(), "Initial");
    store.add_listener(&status, &listener).unwrap();

    sleep(Duration::from_millis(999)).await;
    assert!(seen.lock().is_empty());

    sleep(Duration::from_millis(2)).await;
    assert_eq!(store.get_state(&status).unwrap(), "Changed");
    assert_eq!(*seen.lock(), vec![String::from("Changed")]);
}

/// Test a pending computation exposed as a resource.
#[tokio::test(start_paused = true)]
async fn resource_is_pending_then_settles_once() {
    let source = async_node(|_| async {
        sleep(Duration::from_millis(1000)).await;
        Ok(String::from("Changed"))
    });
    let value = resource(&source);

    let store = Store::new();
    let (seen, listener) = recorder();

    assert_eq!(store.get_state(&value).unwrap(), Resource::Pending { stale: None });
    store.add_listener(&value, &listener).unwrap();

    sleep(Duration::from_millis(1001)).await;

    assert_eq!(store.get_state(&value).unwrap(), Resource::Success(String::from("Changed")));
    assert_eq!(*seen.lock(), vec![Resource::Success(String::from("Changed"))]);
}

/// Test that concurrent readers share one computation.
#[tokio::test(start_paused = true)]
async fn readers_share_one_computation() {
    let runs = Arc::new(AtomicUsize::new(0));
    let source = async_node({
        let runs = runs.clone();
        move |_| {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(100)).await;
                Ok(7)
            }
        }
    });
    let first = resource(&source);
    let second = resource(&source);

    let store = Store::new();
    store.get_state(&first).unwrap();
    store.get_state(&second).unwrap();
    store.get_state(&source).unwrap();

    sleep(Duration::from_millis(150)).await;

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(store.get_state(&first).unwrap(), Resource::Success(7));
    assert_eq!(store.get_state(&second).unwrap(), Resource::Success(7));
}

/// Test that a result for a superseded promise is dropped and the stale
/// value is kept while the new one runs.
#[tokio::test(start_paused = true)]
async fn superseded_promise_result_is_discarded() {
    let query = GraphNode::constant(String::from("slow"));
    let source = async_node({
        let query = query.clone();
        move |ctx| {
            let query = ctx.get(&query);
            async move {
                let query = query?;
                let delay = if query == "slow" { 500 } else { 100 };
                sleep(Duration::from_millis(delay)).await;
                Ok(query)
            }
        }
    });
    let value = resource(&source);

    let store = Store::new();
    let (seen, listener) = recorder();
    store.get_state(&value).unwrap();
    store.add_listener(&value, &listener).unwrap();

    store.update_state(&query, String::from("fast")).unwrap();
    sleep(Duration::from_millis(600)).await;

    assert_eq!(store.get_state(&value).unwrap(), Resource::Success(String::from("fast")));
    assert_eq!(*seen.lock(), vec![Resource::Success(String::from("fast"))]);

    store.update_state(&query, String::from("again")).unwrap();
    assert_eq!(
        store.get_state(&value).unwrap(),
        Resource::Pending {
            stale: Some(String::from("fast"))
        }
    );
}

/// Test that a failed computation surfaces as a failed resource.
#[tokio::test(start_paused = true)]
async fn failed_computation_becomes_failure() {
    let source = async_node(|_| async {
        sleep(Duration::from_millis(10)).await;
        Err::<u32, _>(GraphError::msg("connection refused"))
    });
    let value = resource(&source);

    let store = Store::new();
    store.get_state(&value).unwrap();
    sleep(Duration::from_millis(20)).await;

    let settled = store.get_state(&value).unwrap();
    assert!(settled.error().is_some());
    assert!(settled.data().is_none());
}

/// Test stale-while-revalidate when a dependency of the fetch changes.
#[tokio::test(start_paused = true)]
async fn swr_serves_stale_data_while_revalidating() {
    let user_id = GraphNode::constant(1_u32);
    let profile = SwrNode::new("profile", SwrConfig::default(), {
        let user_id = user_id.clone();
        move |ctx| {
            let id = ctx.get(&user_id);
            async move {
                let id = id?;
                sleep(Duration::from_millis(100)).await;
                Ok(format!("user-{id}"))
            }
        }
    });

    let store = Store::new();
    let (seen, listener) = recorder();

    assert_eq!(profile.get(&store).unwrap(), Resource::Pending { stale: None });
    store.add_listener(profile.node(), &listener).unwrap();
    sleep(Duration::from_millis(150)).await;
    assert_eq!(profile.get(&store).unwrap(), Resource::Success(String::from("user-1")));

    store.update_state(&user_id, 2).unwrap();
    assert_eq!(
        profile.get(&store).unwrap(),
        Resource::Pending {
            stale: Some(String::from("user-1"))
        }
    );

    sleep(Duration::from_millis(150)).await;
    assert_eq!(profile.get(&store).unwrap(), Resource::Success(String::from("user-2")));
    assert_eq!(
        *seen.lock(),
        vec![
            Resource::Success(String::from("user-1")),
            Resource::Pending {
                stale: Some(String::from("user-1"))
            },
            Resource::Success(String::from("user-2")),
        ]
    );
}

/// Test that only the most recently started fetch commits.
#[tokio::test(start_paused = true)]
async fn swr_discards_out_of_order_fetches() {
    let calls = Arc::new(AtomicUsize::new(0));
    let feed = SwrNode::new("feed", SwrConfig::default(), {
        let calls = calls.clone();
        move |_| {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                let delay = if call == 2 { 300 } else { 50 };
                sleep(Duration::from_millis(delay)).await;
                Ok(call)
            }
        }
    });

    let store = Store::new();
    feed.get(&store).unwrap();
    sleep(Duration::from_millis(60)).await;
    assert_eq!(feed.get(&store).unwrap(), Resource::Success(1));

    // Second fetch is slow, third is fast and starts later.
    feed.trigger(&store).unwrap();
    sleep(Duration::from_millis(10)).await;
    feed.trigger(&store).unwrap();
    sleep(Duration::from_millis(60)).await;
    assert_eq!(feed.get(&store).unwrap(), Resource::Success(3));

    sleep(Duration::from_millis(300)).await;
    assert_eq!(feed.get(&store).unwrap(), Resource::Success(3));
    assert_eq!(feed.entry(&store).unwrap().data(), Some(3));
}

/// Test that fresh cache data is served without fetching again.
#[tokio::test(start_paused = true)]
async fn swr_fresh_data_skips_fetch() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let config = SwrConfig {
        fresh_age: Duration::from_secs(5),
        stale_age: Duration::from_secs(60),
    };
    let settings = SwrNode::new("settings", config, {
        let fetches = fetches.clone();
        move |_| {
            let fetches = fetches.clone();
            async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
        }
    });

    let store = Store::new();
    settings.get(&store).unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    store.reset_state(settings.node()).unwrap();
    assert_eq!(settings.get(&store).unwrap(), Resource::Success(true));
    sleep(Duration::from_millis(10)).await;
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    sleep(Duration::from_secs(6)).await;
    store.reset_state(settings.node()).unwrap();
    assert_eq!(
        settings.get(&store).unwrap(),
        Resource::Pending { stale: Some(true) }
    );
    sleep(Duration::from_millis(10)).await;
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

/// Test seeding and evicting cache entries directly.
#[tokio::test(start_paused = true)]
async fn swr_cache_can_be_seeded() {
    let store = Store::new();
    store.swr().set("token", String::from("seeded"), false).unwrap();

    let token = SwrNode::new("token", SwrConfig::default(), |_| async {
        Ok(String::from("fetched"))
    });
    assert_eq!(token.get(&store).unwrap(), Resource::Success(String::from("seeded")));

    assert!(store.swr().evict("token"));
    assert!(!store.swr().contains("token"));
    assert!(matches!(
        store.swr().entry::<u32>("other").and_then(|_| store.swr().entry::<String>("other")),
        Err(GraphError::KeyTypeMismatch { .. })
    ));
}
